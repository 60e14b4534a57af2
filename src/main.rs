//! Buildrelay CLI entry point.

use clap::Parser;

use buildrelay::cli::{self, commands, Cli, CliContext, Commands};
use buildrelay::infrastructure::logging::LoggerImpl;

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli::load_config(cli.config.as_deref())?;
    let _logger = LoggerImpl::init(&config.logging)?;
    let ctx = CliContext::new(config)?;

    match cli.command {
        Commands::Agents => commands::agents::execute(&ctx, cli.json).await,
        Commands::Status { request_id } => {
            commands::status::execute(&ctx, request_id, cli.json).await
        }
        Commands::Compile(args) => commands::compile::execute(&ctx, args, cli.json).await,
        Commands::Fetch(args) => commands::fetch::execute(&ctx, args, cli.json).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        cli::handle_error(err, json);
    }
}
