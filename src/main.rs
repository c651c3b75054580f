use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use textgrab::app::Engine;
use textgrab::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so extracted text can be piped
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Commands::InitConfig { force } = cli.command {
        commands::init_config(cli.config.as_deref(), force)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch {
            url,
            hint,
            deadline_secs,
            json,
        } => {
            let engine = Engine::start(config).await?;
            let result = commands::fetch(&engine, &url, hint, deadline_secs, json).await?;
            if !result.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Check => {
            let engine = Engine::new(config)?;
            commands::check(&engine).await?;
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(ExitCode::SUCCESS)
}
