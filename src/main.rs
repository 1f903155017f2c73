use clap::Parser;
use scoreboard_readiness::commands::{run_probe, run_serve, Cli, Commands};
use scoreboard_readiness::utils::logger::init_logger;
use std::process::ExitCode;

// Exit codes for `probe`: ready, not ready, could not evaluate
const EXIT_READY: u8 = 0;
const EXIT_NOT_READY: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logger(cli.log_level.as_deref(), cli.log_file.clone()) {
        eprintln!("failed to initialize logging: {err:#}");
        return ExitCode::from(EXIT_ERROR);
    }

    match main_impl(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn main_impl(cli: Cli) -> Result<ExitCode, String> {
    let config = cli.resolve_config().map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Probe { json, .. } => {
            let response = run_probe(&config, json).map_err(|e| e.to_string())?;
            println!("{}", response.body);
            if response.status.code() == 200 {
                Ok(ExitCode::from(EXIT_READY))
            } else {
                Ok(ExitCode::from(EXIT_NOT_READY))
            }
        }
        Commands::Serve { .. } => {
            run_serve(&config).await.map_err(|e| e.to_string())?;
            Ok(ExitCode::from(EXIT_READY))
        }
    }
}
