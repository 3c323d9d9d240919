mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, port, namespace, ephemeral, store_path, rotate_token, config } => {
            commands::serve(bind, port, namespace, ephemeral, store_path, rotate_token, config).await
        }
        Command::Get { resource_type, namespace, id } => {
            commands::get(resource_type, namespace, id, cli.remote, cli.token).await
        }
        Command::List { resource_type, namespace, label_selector } => {
            commands::list(resource_type, namespace, label_selector, cli.remote, cli.token).await
        }
        Command::Watch { resource_type, namespace, label_selector } => {
            commands::watch(resource_type, namespace, label_selector, cli.remote, cli.token).await
        }
        Command::Controllers => commands::controllers(cli.remote, cli.token).await,
        Command::DependencyGraph { output } => commands::dependency_graph(output, cli.remote, cli.token).await,
    }
}
