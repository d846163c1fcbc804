mod archive;
mod cli;
mod commands;
mod transfer;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Upload { src, dest } => commands::run_upload(&cli, src, dest.as_deref()),
        Command::Download { src, dest } => commands::run_download(&cli, src, dest),
        Command::List { path, recursive } => commands::run_list(&cli, path, *recursive),
        Command::Delete { path } => commands::run_delete(&cli, path),
    };

    if let Err(err) = result {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
    Ok(())
}
