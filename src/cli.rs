use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chapterbox")]
#[command(about = "Comic chapter downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API and the download workers
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to, overrides `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file, overrides CHAPTERBOX_CONFIG
    #[arg(long)]
    pub config: Option<PathBuf>,
}
