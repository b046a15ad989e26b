use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Instruments applications with OpenTelemetry and runs them in containers
#[derive(Parser, Debug)]
#[command(
    name = "tracepack",
    about = "Instrument applications with OpenTelemetry and run them in containers",
    version,
    long_about = "tracepack ingests an application from an archive, a git repository or a \
                  local directory, detects its language, applies auto-instrumentation, \
                  generates container descriptors and starts the service attached to a \
                  telemetry network."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only errors are logged"
    )]
    pub quiet: bool,

    #[arg(
        short = 'f',
        long,
        global = true,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Create a workspace from an archive, git repository or directory",
        long_about = "Creates a fresh workspace and populates it from exactly one source.\n\n\
                      Examples:\n  \
                      tracepack ingest --archive app.zip\n  \
                      tracepack ingest --repo https://github.com/org/app.git --branch develop\n  \
                      tracepack ingest --dir ./my-service"
    )]
    Ingest(IngestArgs),

    #[command(about = "Detect the application's language")]
    Detect(DetectArgs),

    #[command(about = "Apply instrumentation and generate container descriptors")]
    Instrument(AppArgs),

    #[command(about = "Start the containerized application")]
    Run(AppArgs),

    #[command(
        about = "Detect, instrument and run in one go",
        long_about = "Runs every remaining stage in order, skipping the ones already completed.\n\n\
                      Example:\n  \
                      tracepack deploy 5f0c2a6e-3b9d-4c1e-9a27-0d8e4b1f6c33"
    )]
    Deploy(AppArgs),

    #[command(about = "Show an application's lifecycle state")]
    Status(AppArgs),

    #[command(about = "List all known applications")]
    List,

    #[command(about = "Print the bounded context digest for an application")]
    Digest(AppArgs),

    #[command(about = "Ask the advisory service for observability suggestions")]
    Suggest(AppArgs),

    #[command(about = "Delete an application's workspace and state")]
    Remove(AppArgs),

    #[command(about = "Show the effective configuration")]
    Config,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("source").required(true).args(["archive", "repo", "dir"])))]
pub struct IngestArgs {
    #[arg(long, value_name = "FILE", help = "Archive to extract (.zip, .tar, .tar.gz)")]
    pub archive: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "Git repository to clone")]
    pub repo: Option<String>,

    #[arg(long, value_name = "DIR", help = "Local directory to copy")]
    pub dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "BRANCH",
        requires = "repo",
        help = "Branch to clone (defaults to main, falling back to master)"
    )]
    pub branch: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AppArgs {
    #[arg(value_name = "ID", help = "Application identifier")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    #[arg(value_name = "ID", help = "Application identifier")]
    pub id: String,

    #[arg(long, help = "Re-run detection even if a language is already known")]
    pub force: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => super::output::OutputFormat::Human,
            OutputFormatArg::Json => super::output::OutputFormat::Json,
        }
    }
}
