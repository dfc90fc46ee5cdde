//! Oya CLI - generate a repository wiki and ask grounded questions about it.

use clap::Parser;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Generate(args) => cli::generate_command(args).await?,
        Commands::Ask(args) => cli::ask_command(args).await?,
        Commands::Note(args) => cli::note_command(args)?,
        Commands::Status(args) => cli::status_command(args)?,
        Commands::PrintDefaultConfig => cli::print_default_config()?,
        Commands::InitConfig(args) => cli::init_config(args)?,
    }

    Ok(())
}
