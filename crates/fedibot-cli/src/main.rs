mod bootstrap_helpers;
mod cli_args;
mod startup;

use anyhow::Result;
use clap::Parser;

use crate::bootstrap_helpers::{init_tracing, load_dotenv};
use crate::cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = load_dotenv();
    init_tracing();
    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Ok(None) => {}
        Err(error) => tracing::warn!(error = %error, "failed to load .env file"),
    }

    let cli = Cli::parse();
    startup::run(cli).await
}
