//! Command implementations.

use std::sync::Arc;

use anyhow::{bail, Context};

use oya_rs::core::config::{CONFIG_FILE, GateMode};
use oya_rs::core::repository::WikiLayout;
use oya_rs::llm::HttpLlmClient;
use oya_rs::orchestrator::{GenerationMarker, ProgressSender};
use oya_rs::store::notes::{NoteScope, NotesStore};
use oya_rs::store::pages::PageStore;
use oya_rs::{GenerationOrchestrator, OyaConfig, QaEngine, Repository};

use super::args::{AskArgs, GenerateArgs, InitConfigArgs, NoteArgs, NoteCommands, StatusArgs};

fn load(path: &std::path::Path) -> anyhow::Result<(Repository, OyaConfig)> {
    let repo = Repository::open(path)?;
    let config = OyaConfig::discover(&repo.root)?;
    Ok((repo, config))
}

/// `oya generate`
pub async fn generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let (repo, config) = load(&args.path)?;
    let llm = Arc::new(HttpLlmClient::from_config(
        config.llm.clone(),
        config.generation.llm_timeout_secs,
    )?);

    let (progress, mut events) = ProgressSender::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!(
                "[{}] {}/{} {}",
                event.phase, event.step, event.total_steps, event.message
            );
        }
    });

    let orchestrator = GenerationOrchestrator::new(repo, config, llm)?
        .with_progress(progress)
        .with_force(args.force);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancellation requested, finishing in-flight work...");
            cancel.cancel();
        }
    });

    let report = orchestrator.run().await?;
    let _ = printer.await;

    if report.unchanged {
        println!("wiki unchanged ({:.1}s)", report.elapsed_secs);
    } else {
        println!(
            "wiki updated in {:.1}s: {} file pages, {} directory pages, {} derived pages, {} indexed ({} index failures)",
            report.elapsed_secs,
            report.files.regenerated,
            report.directories.regenerated,
            report.derived_pages,
            report.indexed_pages,
            report.failed_index_pages,
        );
        if report.files.failed + report.directories.failed > 0 {
            println!(
                "warning: {} targets failed and were skipped",
                report.files.failed + report.directories.failed
            );
        }
    }
    Ok(())
}

/// `oya ask`
pub async fn ask_command(args: AskArgs) -> anyhow::Result<()> {
    let (repo, mut config) = load(&args.path)?;
    if args.loose {
        config.retrieval.gate_mode = GateMode::Loose;
    }
    let llm = Arc::new(HttpLlmClient::from_config(
        config.llm.clone(),
        config.generation.llm_timeout_secs,
    )?);

    let engine = QaEngine::open(&repo, config, llm)?;
    let answer = engine.ask(&args.question).await?;

    for warning in &answer.warnings {
        eprintln!("warning: {warning}");
    }
    println!("{}", answer.answer);
    if let Some(disclaimer) = &answer.disclaimer {
        println!("\n> {disclaimer}");
    }
    if !answer.citations.is_empty() {
        println!("\nSources:");
        for citation in &answer.citations {
            match citation.lines {
                Some((start, end)) => println!("  - {} (lines {start}-{end})", citation.path),
                None => println!("  - {}", citation.path),
            }
        }
    }
    println!(
        "\nconfidence: {} | search quality: {}",
        answer.confidence.as_str(),
        answer.search_quality.as_str()
    );
    Ok(())
}

/// `oya note`
pub fn note_command(args: NoteArgs) -> anyhow::Result<()> {
    let (repo, _config) = load(&args.path)?;
    let layout = WikiLayout::new(repo.production_dir());
    let store = NotesStore::new(layout.notes_dir());

    match args.command {
        NoteCommands::Add {
            scope,
            target,
            author,
            text,
        } => {
            let Some(scope) = NoteScope::parse(&scope) else {
                bail!("unknown scope '{scope}'; expected file, directory, workflow, or general");
            };
            let note = store.add(scope, &target, &text, author.as_deref())?;
            println!("note recorded: {}", note.id);
            println!("the targeted page will regenerate on the next `oya generate`");
        }
        NoteCommands::List { target } => {
            let notes = store.all()?;
            let filtered: Vec<_> = notes
                .iter()
                .filter(|note| target.as_deref().is_none_or(|t| note.target == t))
                .collect();
            if filtered.is_empty() {
                println!("no notes");
            }
            for note in filtered {
                println!(
                    "{}  [{}] {}  {}",
                    note.created_at.to_rfc3339(),
                    note.scope,
                    if note.target.is_empty() {
                        "(general)"
                    } else {
                        &note.target
                    },
                    note.id
                );
                println!("    {}", note.content.replace('\n', "\n    "));
            }
        }
        NoteCommands::Remove { id } => {
            if store.delete(&id)? {
                println!("note {id} deleted");
            } else {
                bail!("no note with id {id}");
            }
        }
    }
    Ok(())
}

/// `oya status`
pub fn status_command(args: StatusArgs) -> anyhow::Result<()> {
    let (repo, _config) = load(&args.path)?;
    let production = WikiLayout::new(repo.production_dir());
    let staging = WikiLayout::new(repo.staging_dir());

    println!("repository: {} ({})", repo.root.display(), repo.branch);
    println!("head: {} {}", repo.head_revision, repo.head_message);

    match GenerationMarker::read(&production.marker_file())
        .or_else(|| GenerationMarker::read(&staging.marker_file()))
    {
        Some(marker) => {
            println!(
                "last run: {:?} started {} (last phase: {})",
                marker.status,
                marker.started_at.to_rfc3339(),
                marker
                    .last_phase
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_else(|| "none".to_string()),
            );
        }
        None => println!("last run: no generation recorded"),
    }

    if production.pages_db().is_file() {
        let store = PageStore::open(&production)?;
        println!("pages: {}", store.page_count()?);
    } else {
        println!("pages: wiki not generated yet");
    }

    match oya_rs::index::EmbeddingMetadata::read(&production.embedding_metadata_file()) {
        Some(meta) => println!(
            "index: {}/{} at {}",
            meta.provider,
            meta.model,
            meta.indexed_at.to_rfc3339()
        ),
        None => println!("index: not built"),
    }
    Ok(())
}

/// `oya print-default-config`
pub fn print_default_config() -> anyhow::Result<()> {
    let config = OyaConfig::default();
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

/// `oya init-config`
pub fn init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    let target = args.path.join(CONFIG_FILE);
    if target.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            target.display()
        );
    }
    OyaConfig::default()
        .to_yaml_file(&target)
        .context("failed to write config")?;
    println!("wrote {}", target.display());
    Ok(())
}
