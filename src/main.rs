use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = facilito_dl::cli::Cli::parse();
    facilito_dl::logging::init(cli.verbose).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        facilito_dl::cli::Command::Download(args) => {
            facilito_dl::download::run(args).await.context("download")?;
        }
        facilito_dl::cli::Command::Inspect(args) => {
            facilito_dl::inspect::run(args).await.context("inspect")?;
        }
    }

    Ok(())
}
