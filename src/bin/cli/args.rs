//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Repository wiki generator with grounded Q&A
#[derive(Parser)]
#[command(name = "oya")]
#[command(version = VERSION)]
#[command(about = "Generate a navigable wiki for a source repository and ask questions about it")]
#[command(long_about = "
Generate a searchable wiki for any source repository, then ask questions
answered from the generated pages with citations.

Common usage:

  # Generate (or incrementally refresh) the wiki for the current directory
  oya generate

  # Ask a question grounded in the wiki
  oya ask \"how are requests routed?\"

  # Record a correction that future regenerations must honor
  oya note add --scope file --target src/router.py \"The router also serves websockets.\"

  # Inspect the last run
  oya status
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate or refresh the wiki
    Generate(GenerateArgs),
    /// Ask a question grounded in the generated wiki
    Ask(AskArgs),
    /// Manage developer-correction notes
    Note(NoteArgs),
    /// Show the last generation marker and page counts
    Status(StatusArgs),
    /// Print the default configuration as YAML
    PrintDefaultConfig,
    /// Write a default .oya.yml into the repository
    InitConfig(InitConfigArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Repository root to document
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Regenerate every page regardless of stored hashes
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct AskArgs {
    /// The question to answer
    pub question: String,

    /// Repository root whose wiki should be queried
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Answer even when the evidence gate fails
    #[arg(long)]
    pub loose: bool,
}

#[derive(Args)]
pub struct NoteArgs {
    #[command(subcommand)]
    pub command: NoteCommands,

    /// Repository root the notes belong to
    #[arg(long, default_value = ".")]
    pub path: PathBuf,
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Add a correction note
    Add {
        /// Note scope: file, directory, workflow, or general
        #[arg(long)]
        scope: String,
        /// Target path (required for every scope except general)
        #[arg(long, default_value = "")]
        target: String,
        /// Optional author tag
        #[arg(long)]
        author: Option<String>,
        /// Markdown body of the note
        text: String,
    },
    /// List notes, optionally filtered by target
    List {
        /// Only show notes for this target
        #[arg(long)]
        target: Option<String>,
    },
    /// Delete a note by id
    Remove {
        /// Note id as shown by `note list`
        id: String,
    },
}

#[derive(Args)]
pub struct StatusArgs {
    /// Repository root to inspect
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Repository root to write .oya.yml into
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}
