mod cli;
mod reader;

use std::process::ExitCode;

use clap::Parser;
use nt_core::logging::{init_logging, LogTarget};
use nt_core::Error;
use tracing::debug;

use cli::{Cli, Commands};

/// Exit status for bad user input, such as a non-numeric article id.
const EXIT_INVALID_INPUT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let mut cli = Cli::parse();
    let command = cli.command.take().unwrap_or(Commands::Tui);
    let config = cli.client_config();

    // The reader owns the terminal, so it only logs to a file.
    let target = match (&command, &cli.log_file) {
        (_, Some(path)) => LogTarget::File(path.clone()),
        (Commands::Tui, None) => LogTarget::Disabled,
        (_, None) => LogTarget::Stderr,
    };
    if let Err(e) = init_logging(config.log_level, target) {
        eprintln!("Error: could not set up logging: {}", e);
        return ExitCode::FAILURE;
    }
    debug!("⚙️ Using API at {}", config.api_url);

    let result = match nt_client::create_backend(&cli.backend, &config) {
        Ok(backend) => cli::execute(command, &backend, &config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<Error>() {
                Some(Error::InvalidInput(_)) => ExitCode::from(EXIT_INVALID_INPUT),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
