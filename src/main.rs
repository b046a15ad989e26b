use tracepack::cli::commands::CliArgs;
use tracepack::cli::handlers::{handle_command, EXIT_USAGE};
use tracepack::util::logging::{config_from_env, init_logging, parse_level};
use tracepack::VERSION;

use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    init_logging_from_args(&args);

    debug!("tracepack v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = handle_command(&args.command, args.format.into()).await;
    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = config_from_env();
    config.level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        config.level
    };
    init_logging(config);
}
