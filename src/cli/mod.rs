pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{AppArgs, CliArgs, Commands, DetectArgs, IngestArgs, OutputFormatArg};
pub use handlers::{handle_command, EXIT_INTERNAL, EXIT_USAGE};
pub use output::{OutputFormat, OutputFormatter};
