mod cli;

use chapterbox::config::Config;
use chapterbox::observability;
use clap::Parser;
use cli::{Cli, Commands};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            info!("Loading configuration");
            let config = match &args.config {
                Some(path) => Config::load_from_path(path)?,
                None => Config::load()?,
            };
            chapterbox::api::run(config, args.address).await?
        }
    }

    Ok(())
}
