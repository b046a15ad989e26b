//! Command handlers
//!
//! Each handler returns the process exit code. Pipeline errors map to the
//! code of their [`ErrorKind`](crate::error::ErrorKind).

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, error};

use super::commands::{Commands, IngestArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::config::TracepackConfig;
use crate::error::PipelineError;
use crate::executor::TokioProcessRunner;
use crate::llm::{select_llm_client, LLMClient};
use crate::pipeline::PipelineController;
use crate::source::SourceSpec;
use crate::workspace::AppId;

/// Exit code for invalid invocations and configuration
pub const EXIT_USAGE: i32 = 64;

/// Exit code for failures outside the pipeline taxonomy
pub const EXIT_INTERNAL: i32 = 1;

fn parse_id(raw: &str) -> Result<AppId, PipelineError> {
    raw.trim().parse()
}

fn source_from(args: &IngestArgs) -> Result<SourceSpec> {
    match (&args.archive, &args.repo, &args.dir) {
        (Some(path), None, None) => Ok(SourceSpec::Archive { path: path.clone() }),
        (None, Some(url), None) => Ok(SourceSpec::Git {
            url: url.clone(),
            branch: args.branch.clone(),
        }),
        (None, None, Some(path)) => Ok(SourceSpec::Directory { path: path.clone() }),
        _ => bail!("exactly one of --archive, --repo or --dir is required"),
    }
}

fn print_output(output: &str) {
    if output.ends_with('\n') {
        print!("{}", output);
    } else {
        println!("{}", output);
    }
}

fn report(formatter: &OutputFormatter, err: &anyhow::Error) -> i32 {
    let Some(pipeline_err) = err.downcast_ref::<PipelineError>() else {
        error!(error = %err, "Command failed");
        eprintln!("Error: {:#}", err);
        return EXIT_INTERNAL;
    };

    match formatter.format_error(pipeline_err) {
        Ok(rendered) if formatter.format() == OutputFormat::Json => print_output(&rendered),
        Ok(rendered) => eprint!("{}", rendered),
        Err(format_err) => eprintln!("Error: {} ({:#})", pipeline_err, format_err),
    }
    pipeline_err.kind().exit_code()
}

async fn advisory_client(command: &Commands, config: &TracepackConfig) -> Option<Arc<dyn LLMClient>> {
    if !matches!(command, Commands::Suggest(_)) {
        return None;
    }
    let selected = select_llm_client(config).await?;
    debug!(client = %selected.description, "Advisory client selected");
    Some(selected.client)
}

async fn execute(
    controller: &PipelineController,
    command: &Commands,
    formatter: &OutputFormatter,
) -> Result<String> {
    let output = match command {
        Commands::Ingest(args) => {
            let app = controller.ingest(source_from(args)?).await?;
            formatter.format_application(&app)?
        }
        Commands::Detect(args) => {
            let app = controller.detect_language(&parse_id(&args.id)?, args.force).await?;
            formatter.format_application(&app)?
        }
        Commands::Instrument(args) => {
            let app = controller.instrument(&parse_id(&args.id)?).await?;
            formatter.format_application(&app)?
        }
        Commands::Run(args) => {
            let app = controller.run(&parse_id(&args.id)?).await?;
            formatter.format_application(&app)?
        }
        Commands::Deploy(args) => {
            let app = controller.deploy(&parse_id(&args.id)?).await?;
            formatter.format_application(&app)?
        }
        Commands::Status(args) => {
            let app = controller.status(&parse_id(&args.id)?)?;
            formatter.format_application(&app)?
        }
        Commands::List => formatter.format_applications(&controller.list()?)?,
        Commands::Digest(args) => {
            let digest = controller.digest(&parse_id(&args.id)?).await?;
            formatter.format_digest(&digest)?
        }
        Commands::Suggest(args) => {
            let advice = controller.suggest(&parse_id(&args.id)?).await?;
            formatter.format_advice(&advice)?
        }
        Commands::Remove(args) => {
            let id = parse_id(&args.id)?;
            controller.remove(&id).await?;
            formatter.format_removed(&id.to_string())?
        }
        Commands::Config => bail!("config is handled before the pipeline is built"),
    };
    Ok(output)
}

/// Loads configuration, builds the controller and runs one command
pub async fn handle_command(command: &Commands, format: OutputFormat) -> i32 {
    let formatter = OutputFormatter::new(format);

    let config = match TracepackConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return EXIT_USAGE;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        return EXIT_USAGE;
    }

    if let Commands::Config = command {
        return match formatter.format_config(&config) {
            Ok(rendered) => {
                print_output(&rendered);
                0
            }
            Err(e) => report(&formatter, &e),
        };
    }

    let llm = advisory_client(command, &config).await;
    let controller = match PipelineController::new(&config, Arc::new(TokioProcessRunner::new()), llm) {
        Ok(controller) => controller,
        Err(e) => return report(&formatter, &anyhow::Error::from(e)),
    };

    match execute(&controller, command, &formatter).await {
        Ok(rendered) => {
            print_output(&rendered);
            0
        }
        Err(e) => report(&formatter, &e),
    }
}
