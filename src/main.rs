use std::process::ExitCode;
use tml_build::{LogConfig, cli, config::Config, setup_logging};
use tracing::error;

fn main() -> ExitCode {
    let args = cli::parse_args();

    let logging_ready = match setup_logging(LogConfig::new(args.debug, args.color)) {
        Ok(()) => true,
        Err(e) => {
            println!("{e:#}");
            false
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if logging_ready {
                error!("{e:#}");
            } else {
                println!("{e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &cli::Args) -> anyhow::Result<()> {
    let config = Config::from_args(args)?;
    cli::execute(&config)?;
    Ok(())
}
