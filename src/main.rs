//! Foreman CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use foreman::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let root = cli.root.clone();
    let json = cli.json;

    let result = match cli.command {
        Commands::Init(args) => foreman::cli::commands::init::execute(&root, args, json).await,
        Commands::Plan(args) => foreman::cli::commands::plan::execute(&root, args, json).await,
        Commands::Phase(args) => foreman::cli::commands::phase::execute(&root, args, json).await,
        Commands::Run(args) => foreman::cli::commands::run::execute(&root, args, json).await,
        Commands::Status(args) => foreman::cli::commands::status::execute(&root, args, json).await,
        Commands::Task(args) => foreman::cli::commands::task::execute(&root, args, json).await,
    };

    if let Err(err) = result {
        foreman::cli::handle_error(&err, json);
    }
}
