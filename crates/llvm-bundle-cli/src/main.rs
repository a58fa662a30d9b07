//! llvm-bundle - libclang and clangd release bundler

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use llvm_bundle_cli::cmd;
use llvm_bundle_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bundle(args) => cmd::bundle::bundle(args).await,
        Commands::InstallTree(args) => cmd::install_tree::install_tree(args).await,
    }
}
