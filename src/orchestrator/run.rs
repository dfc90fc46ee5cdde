//! The generation run driver.
//!
//! Phases are strictly serialized; within the Files and Directories phases
//! targets fan out through a bounded buffered stream that preserves input
//! order on aggregation. Cascade flags are monotonic and fixed before
//! Synthesis begins. All writes land in the staging mirror; promotion is an
//! atomic directory swap.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::config::OyaConfig;
use crate::core::errors::{OyaError, Result};
use crate::core::repository::{Repository, WikiLayout};
use crate::index::fts::FtsIndex;
use crate::index::indexer::{EmbeddingMetadata, Indexer};
use crate::index::vector::VectorStore;
use crate::llm::LlmClient;
use crate::orchestrator::cascade::{
    directory_needs_regen, directory_signature, file_needs_regen, CascadeFlags,
};
use crate::orchestrator::lock::RunLock;
use crate::orchestrator::marker::{GenerationMarker, RunStatus};
use crate::orchestrator::progress::{Phase, ProgressSender};
use crate::orchestrator::staging::StagingArea;
use crate::parse::registry::ParserRegistry;
use crate::parse::symbols::ParsedSymbol;
use crate::phases::directories::{generate_directory_page, DirectoryPhaseInput};
use crate::phases::files::{generate_file_page, FilePhaseInput};
use crate::phases::overview::generate_overview_page;
use crate::phases::workflows::{generate_workflow_page, group_entry_points};
use crate::phases::{architecture::generate_architecture_page, PhaseContext};
use crate::prompt::renderer::PromptRenderer;
use crate::scan::scanner::{content_hash, RepositoryScanner};
use crate::store::notes::{NoteScope, NotesSnapshot, NotesStore};
use crate::store::pages::PageStore;
use crate::summary::schema::{DirectorySummary, FileSummary, PageType, SynthesisMap};
use crate::synthesis::builder::SynthesisBuilder;
use crate::synthesis::{load_synthesis, save_synthesis, PersistedSynthesis};

/// Name of the per-repository run lock file.
const LOCK_FILE: &str = ".oya.lock";

/// Per-run analysis artifact: scan output plus extracted symbols. Discarded
/// after Indexing.
#[derive(Debug, Default)]
pub struct AnalysisResult {
    /// Deterministically ordered relative file paths
    pub files: Vec<String>,
    /// File path to raw content
    pub contents: HashMap<String, String>,
    /// File path to ordered symbols
    pub symbols: HashMap<String, Vec<ParsedSymbol>>,
    /// File path to imports
    pub imports: HashMap<String, Vec<String>>,
    /// File-tree rendering used as prompt context
    pub file_tree: String,
}

/// Regeneration counters for one phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseCount {
    /// Pages regenerated
    pub regenerated: usize,
    /// Targets skipped as up to date
    pub skipped: usize,
    /// Targets that failed and were skipped with a warning
    pub failed: usize,
    /// Pages pruned because their target disappeared
    pub pruned: usize,
}

impl PhaseCount {
    /// Whether this phase changed the page set.
    pub fn changed(&self) -> bool {
        self.regenerated > 0 || self.pruned > 0
    }
}

/// Summary of a completed (or unchanged) run.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Run identifier
    pub run_id: String,
    /// Files phase counters
    pub files: PhaseCount,
    /// Directories phase counters
    pub directories: PhaseCount,
    /// Whether the synthesis map was rebuilt
    pub synthesis_regenerated: bool,
    /// Architecture / overview / workflow pages rewritten
    pub derived_pages: usize,
    /// Pages written to the indexes
    pub indexed_pages: usize,
    /// Pages that failed indexing
    pub failed_index_pages: usize,
    /// True when the run found nothing to regenerate
    pub unchanged: bool,
    /// Wall-clock seconds
    pub elapsed_secs: f64,
}

impl GenerationReport {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            files: PhaseCount::default(),
            directories: PhaseCount::default(),
            synthesis_regenerated: false,
            derived_pages: 0,
            indexed_pages: 0,
            failed_index_pages: 0,
            unchanged: false,
            elapsed_secs: 0.0,
        }
    }

    /// Whether anything was rebuilt this run.
    pub fn any_regenerated(&self) -> bool {
        self.files.changed() || self.directories.changed() || self.synthesis_regenerated
    }
}

/// Drives the 8-phase generation pipeline for one repository.
pub struct GenerationOrchestrator {
    repo: Repository,
    config: OyaConfig,
    llm: Arc<dyn LlmClient>,
    renderer: PromptRenderer,
    progress: ProgressSender,
    cancel: CancellationToken,
    force: bool,
}

impl GenerationOrchestrator {
    /// Create an orchestrator over the repository and LLM client.
    pub fn new(repo: Repository, config: OyaConfig, llm: Arc<dyn LlmClient>) -> Result<Self> {
        let renderer =
            PromptRenderer::new(config.generation.language.clone(), config.firewall.clone())?;
        Ok(Self {
            repo,
            config,
            llm,
            renderer,
            progress: ProgressSender::disabled(),
            cancel: CancellationToken::new(),
            force: false,
        })
    }

    /// Attach a progress subscriber.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = progress;
        self
    }

    /// Regenerate everything regardless of stored hashes.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Token that cancels the run cooperatively.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute a full run. On success the staging area has been promoted (or
    /// discarded for an unchanged run); on cancellation or auth failure the
    /// staging area is retained with an `incomplete` marker; on any other
    /// failure staging is discarded.
    pub async fn run(&self) -> Result<GenerationReport> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, repo = %self.repo.root.display(), "starting generation run");

        let _lock = RunLock::acquire(self.repo.root.join(LOCK_FILE))?;

        // Crash detection: a `running` marker with no live worker (the lock
        // was acquirable) becomes `incomplete` before we start over.
        let stale_layout = WikiLayout::new(self.repo.staging_dir());
        if let Some(mut stale) = GenerationMarker::read(&stale_layout.marker_file()) {
            if stale.status == RunStatus::Running {
                warn!("previous run crashed mid-flight; marking incomplete");
                stale.status = RunStatus::Incomplete;
                stale.write(&stale_layout.marker_file())?;
            }
        }

        let staging = StagingArea::prepare(&self.repo)?;
        let mut marker = GenerationMarker::running();
        marker.write(&staging.layout.marker_file())?;

        let outcome = self
            .run_phases(&staging.layout, &mut marker, run_id.clone())
            .await;

        match outcome {
            Ok(mut report) => {
                report.elapsed_secs = started.elapsed().as_secs_f64();
                if report.any_regenerated() {
                    marker.status = RunStatus::Complete;
                    marker.write(&staging.layout.marker_file())?;
                    staging.promote()?;
                    info!(run_id = %report.run_id, "run complete, staging promoted");
                } else {
                    report.unchanged = true;
                    self.progress
                        .emit(Phase::Indexing, 1, 1, "unchanged; nothing to regenerate");
                    staging.discard()?;
                    info!(run_id = %report.run_id, "run complete, repository unchanged");
                }
                Ok(report)
            }
            Err(err) => {
                match &err {
                    OyaError::Cancelled | OyaError::LlmAuth { .. } => {
                        marker.status = RunStatus::Incomplete;
                        let _ = marker.write(&staging.layout.marker_file());
                        warn!(error = %err, "run stopped; staging retained as incomplete");
                    }
                    _ => {
                        let _ = staging.discard();
                        warn!(error = %err, "run failed; staging discarded");
                    }
                }
                Err(err)
            }
        }
    }

    async fn run_phases(
        &self,
        layout: &WikiLayout,
        marker: &mut GenerationMarker,
        run_id: String,
    ) -> Result<GenerationReport> {
        let mut report = GenerationReport::new(run_id);
        let mut flags = CascadeFlags::default();

        // Phase 1: Analysis.
        self.progress.emit(Phase::Analysis, 1, 2, "scanning repository");
        let analysis = self.analyze(layout)?;
        self.progress.emit(
            Phase::Analysis,
            2,
            2,
            format!("analyzed {} files", analysis.files.len()),
        );
        self.finish_phase(marker, layout, Phase::Analysis)?;

        let store = PageStore::open(layout)?;
        let notes_store = NotesStore::new(layout.notes_dir());
        let ctx = PhaseContext {
            repo: &self.repo,
            config: &self.config,
            llm: self.llm.as_ref(),
            renderer: &self.renderer,
            cancel: self.cancel.clone(),
        };

        // Phase 2: Files.
        let hashes: HashMap<String, String> = analysis
            .files
            .iter()
            .map(|path| (path.clone(), content_hash(&analysis.contents[path])))
            .collect();
        let file_summaries = self
            .files_phase(&ctx, &store, &notes_store, &analysis, &hashes, &mut report)
            .await?;
        flags.files_regenerated = report.files.changed();
        self.finish_phase(marker, layout, Phase::Files)?;

        // Phase 3: Directories.
        let (dir_list, dir_summaries) = self
            .directories_phase(
                &ctx,
                &store,
                &notes_store,
                &analysis,
                &hashes,
                &file_summaries,
                &mut report,
            )
            .await?;
        flags.directories_regenerated = report.directories.changed();
        self.finish_phase(marker, layout, Phase::Directories)?;

        // Phase 4: Synthesis. Cascade flags are final from here on.
        let (persisted, synthesis_regenerated) = self
            .synthesis_phase(layout, &analysis, &dir_list, &file_summaries, &dir_summaries, &flags)
            .await?;
        report.synthesis_regenerated = synthesis_regenerated;
        self.finish_phase(marker, layout, Phase::Synthesis)?;

        // Phases 5-7: Architecture, Overview, Workflows.
        if synthesis_regenerated {
            self.derived_phases(&ctx, layout, &store, &notes_store, &analysis, &persisted, marker, &mut report)
                .await?;
        }

        // Phase 8: Indexing runs on any regenerated run.
        if report.any_regenerated() {
            self.checkpoint()?;
            let vector = VectorStore::open(&layout.vector_dir())?;
            let fts = FtsIndex::open(&layout.fts_db())?;
            let indexer = Indexer::new(
                &vector,
                &fts,
                self.llm.as_ref(),
                self.config.generation.max_retries,
            );
            let total = store.page_count().unwrap_or(0);
            let mut tracker = self.progress.phase_tracker(Phase::Indexing, total);
            let stats = indexer
                .index_wiki(&layout.wiki_dir(), &self.cancel, &mut tracker)
                .await?;
            report.indexed_pages = stats.indexed;
            report.failed_index_pages = stats.failed;

            EmbeddingMetadata {
                provider: self.llm.provider().to_string(),
                model: self.llm.embedding_model().to_string(),
                indexed_at: chrono::Utc::now(),
            }
            .write(&layout.embedding_metadata_file())?;
            self.finish_phase(marker, layout, Phase::Indexing)?;
        }

        Ok(report)
    }

    /// Phase 1 body: scan and parse. CPU-bound, no suspension points.
    fn analyze(&self, layout: &WikiLayout) -> Result<AnalysisResult> {
        let scanner = RepositoryScanner::new(
            &self.repo.root,
            &layout.ignore_file(),
            self.config.generation.max_file_size_kb,
        )?;
        let scan = scanner.scan()?;

        let registry = ParserRegistry::new();
        let mut symbols = HashMap::new();
        let mut imports = HashMap::new();
        for path in &scan.files {
            let (syms, imps) = registry.parse(path, &scan.contents[path]);
            symbols.insert(path.clone(), syms);
            imports.insert(path.clone(), imps);
        }

        Ok(AnalysisResult {
            file_tree: scan.file_tree(),
            files: scan.files,
            contents: scan.contents,
            symbols,
            imports,
        })
    }

    async fn files_phase(
        &self,
        ctx: &PhaseContext<'_>,
        store: &PageStore,
        notes_store: &NotesStore,
        analysis: &AnalysisResult,
        hashes: &HashMap<String, String>,
        report: &mut GenerationReport,
    ) -> Result<HashMap<String, FileSummary>> {
        self.checkpoint()?;
        let notes = notes_store.snapshot();

        let mut summaries: HashMap<String, FileSummary> = HashMap::new();
        let mut to_regen: Vec<String> = Vec::new();

        for path in &analysis.files {
            let record = store.record_for_target(PageType::File, path)?;
            let latest_note = notes.latest_for(NoteScope::File, path);
            if self.force || file_needs_regen(record.as_ref(), &hashes[path], latest_note) {
                to_regen.push(path.clone());
            } else {
                report.files.skipped += 1;
                let summary = record
                    .and_then(|r| r.file_summary())
                    .unwrap_or_else(|| FileSummary::fallback(path));
                summaries.insert(path.clone(), summary);
            }
        }

        let results: Vec<(String, Result<_>)> = stream::iter(to_regen.iter().map(|path| {
            let input = FilePhaseInput {
                path,
                content: &analysis.contents[path],
                symbols: &analysis.symbols[path],
                imports: &analysis.imports[path],
                file_tree: &analysis.file_tree,
                content_hash: hashes[path].clone(),
                corrections: NotesSnapshot::corrections_text(
                    &notes.for_target(NoteScope::File, path),
                ),
            };
            async move { (path.clone(), generate_file_page(ctx, input).await) }
        }))
        .buffered(self.config.generation.parallel_limit)
        .collect()
        .await;

        // Append-in-batch, write-at-end: aggregation follows input order.
        let mut tracker = self.progress.phase_tracker(Phase::Files, to_regen.len());
        for (step, (path, result)) in results.into_iter().enumerate() {
            match result {
                Ok((page, summary)) => {
                    store.write_page(&page, Some(serde_json::to_string(&summary).unwrap_or_default()))?;
                    summaries.insert(path.clone(), summary);
                    report.files.regenerated += 1;
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(file = %path, error = %err, "file page generation failed, skipping target");
                    report.files.failed += 1;
                    summaries.insert(path.clone(), FileSummary::fallback(&path));
                }
            }
            tracker.step(step + 1, format!("documented {path}"));
        }

        let live: HashSet<String> = analysis.files.iter().cloned().collect();
        for target in store.prune_removed(PageType::File, &live)? {
            info!(target = %target, "pruned page for removed file");
            report.files.pruned += 1;
        }

        Ok(summaries)
    }

    #[allow(clippy::too_many_arguments)]
    async fn directories_phase(
        &self,
        ctx: &PhaseContext<'_>,
        store: &PageStore,
        notes_store: &NotesStore,
        analysis: &AnalysisResult,
        hashes: &HashMap<String, String>,
        file_summaries: &HashMap<String, FileSummary>,
        report: &mut GenerationReport,
    ) -> Result<(Vec<String>, HashMap<String, DirectorySummary>)> {
        self.checkpoint()?;
        let notes = notes_store.snapshot();

        // Every ancestor directory of every file, including the root.
        let mut dirs: BTreeSet<String> = BTreeSet::new();
        dirs.insert(String::new());
        for path in &analysis.files {
            let mut current = path.as_str();
            while let Some((parent, _)) = current.rsplit_once('/') {
                dirs.insert(parent.to_string());
                current = parent;
            }
        }
        let dir_list: Vec<String> = dirs.into_iter().collect();

        let children = |dir: &str| -> Vec<&String> {
            analysis
                .files
                .iter()
                .filter(|path| parent_of(path) == dir)
                .collect()
        };

        let mut summaries: HashMap<String, DirectorySummary> = HashMap::new();
        let mut to_regen: Vec<(String, String)> = Vec::new();

        for dir in &dir_list {
            let pairs: Vec<(String, String)> = children(dir)
                .into_iter()
                .map(|path| (file_name_of(path).to_string(), hashes[path].clone()))
                .collect();
            let signature = directory_signature(&pairs);

            let record = store.record_for_target(PageType::Directory, dir)?;
            let latest_note = notes.latest_for(NoteScope::Directory, dir);
            if self.force || directory_needs_regen(record.as_ref(), &signature, latest_note) {
                to_regen.push((dir.clone(), signature));
            } else {
                report.directories.skipped += 1;
                let contains: Vec<String> = children(dir)
                    .into_iter()
                    .map(|p| file_name_of(p).to_string())
                    .collect();
                let summary = record
                    .and_then(|r| r.directory_summary())
                    .unwrap_or_else(|| DirectorySummary::fallback(dir, contains));
                summaries.insert(dir.clone(), summary);
            }
        }

        let results: Vec<(String, Result<_>)> =
            stream::iter(to_regen.iter().map(|(dir, signature)| {
                let child_paths = children(dir);
                let input = DirectoryPhaseInput {
                    path: dir,
                    contains: child_paths
                        .iter()
                        .map(|p| file_name_of(p).to_string())
                        .collect(),
                    file_summaries: child_paths
                        .iter()
                        .filter_map(|p| file_summaries.get(p.as_str()))
                        .collect(),
                    signature: signature.clone(),
                    corrections: NotesSnapshot::corrections_text(
                        &notes.for_target(NoteScope::Directory, dir),
                    ),
                };
                async move { (dir.clone(), generate_directory_page(ctx, input).await) }
            }))
            .buffered(self.config.generation.parallel_limit)
            .collect()
            .await;

        let mut tracker = self
            .progress
            .phase_tracker(Phase::Directories, to_regen.len());
        for (step, (dir, result)) in results.into_iter().enumerate() {
            match result {
                Ok((page, summary)) => {
                    store.write_page(
                        &page,
                        Some(serde_json::to_string(&summary).unwrap_or_default()),
                    )?;
                    summaries.insert(dir.clone(), summary);
                    report.directories.regenerated += 1;
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(directory = %dir, error = %err, "directory page generation failed, skipping target");
                    report.directories.failed += 1;
                    let contains: Vec<String> = children(&dir)
                        .into_iter()
                        .map(|p| file_name_of(p).to_string())
                        .collect();
                    summaries.insert(dir.clone(), DirectorySummary::fallback(&dir, contains));
                }
            }
            tracker.step(step + 1, format!("documented {}", display_dir(&dir)));
        }

        let live: HashSet<String> = dir_list.iter().cloned().collect();
        for target in store.prune_removed(PageType::Directory, &live)? {
            info!(target = %display_dir(&target), "pruned page for removed directory");
            report.directories.pruned += 1;
        }

        Ok((dir_list, summaries))
    }

    async fn synthesis_phase(
        &self,
        layout: &WikiLayout,
        analysis: &AnalysisResult,
        dir_list: &[String],
        file_summaries: &HashMap<String, FileSummary>,
        dir_summaries: &HashMap<String, DirectorySummary>,
        flags: &CascadeFlags,
    ) -> Result<(PersistedSynthesis, bool)> {
        self.checkpoint()?;
        let synthesis_exists = layout.synthesis_file().is_file();

        if !flags.synthesis_needs_regen(synthesis_exists) {
            match load_synthesis(&layout.synthesis_file()) {
                Ok(Some(persisted)) => return Ok((persisted, false)),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "stored synthesis unreadable, rebuilding"),
            }
        }

        self.progress
            .emit(Phase::Synthesis, 1, 1, "building synthesis map");

        let ordered_files: Vec<FileSummary> = analysis
            .files
            .iter()
            .filter_map(|path| file_summaries.get(path).cloned())
            .collect();
        let ordered_dirs: Vec<DirectorySummary> = dir_list
            .iter()
            .filter_map(|dir| dir_summaries.get(dir).cloned())
            .collect();

        let builder = SynthesisBuilder::new(
            &self.repo,
            &self.config,
            self.llm.as_ref(),
            &self.renderer,
            self.cancel.clone(),
        );
        let map: SynthesisMap = builder.build(&ordered_files, &ordered_dirs).await?;
        let persisted = save_synthesis(&layout.synthesis_file(), &map)?;
        Ok((persisted, true))
    }

    #[allow(clippy::too_many_arguments)]
    async fn derived_phases(
        &self,
        ctx: &PhaseContext<'_>,
        layout: &WikiLayout,
        store: &PageStore,
        notes_store: &NotesStore,
        analysis: &AnalysisResult,
        persisted: &PersistedSynthesis,
        marker: &mut GenerationMarker,
        report: &mut GenerationReport,
    ) -> Result<()> {
        let hash = &persisted.synthesis_hash;

        self.checkpoint()?;
        self.progress
            .emit(Phase::Architecture, 1, 1, "writing architecture page");
        let page = generate_architecture_page(ctx, &persisted.map, hash).await?;
        store.write_page(&page, None)?;
        report.derived_pages += 1;
        self.finish_phase(marker, layout, Phase::Architecture)?;

        self.checkpoint()?;
        self.progress
            .emit(Phase::Overview, 1, 1, "writing overview page");
        let notes = notes_store.snapshot();
        let corrections = NotesSnapshot::corrections_text(&notes.general());
        let page = generate_overview_page(
            ctx,
            &persisted.map,
            &analysis.file_tree,
            hash,
            corrections,
        )
        .await?;
        store.write_page(&page, None)?;
        report.derived_pages += 1;
        self.finish_phase(marker, layout, Phase::Overview)?;

        self.checkpoint()?;
        let notes = notes_store.snapshot();
        let all_symbols: Vec<ParsedSymbol> = analysis
            .files
            .iter()
            .flat_map(|path| analysis.symbols[path].iter().cloned())
            .collect();
        let groups = group_entry_points(&all_symbols);
        let mut tracker = self.progress.phase_tracker(Phase::Workflows, groups.len());
        for (step, group) in groups.iter().enumerate() {
            self.checkpoint()?;
            let corrections = NotesSnapshot::corrections_text(
                &notes.for_target(NoteScope::Workflow, &group.key),
            );
            let page =
                generate_workflow_page(ctx, &persisted.map, group, hash, corrections).await?;
            store.write_page(&page, None)?;
            report.derived_pages += 1;
            tracker.step(step + 1, format!("documented workflows/{}", group.key));
        }
        let live: HashSet<String> = groups.iter().map(|g| g.key.clone()).collect();
        store.prune_removed(PageType::Workflow, &live)?;
        self.finish_phase(marker, layout, Phase::Workflows)?;

        Ok(())
    }

    /// Observe cancellation between suspension points.
    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(OyaError::Cancelled);
        }
        Ok(())
    }

    fn finish_phase(
        &self,
        marker: &mut GenerationMarker,
        layout: &WikiLayout,
        phase: Phase,
    ) -> Result<()> {
        marker.last_phase = Some(phase);
        marker.write(&layout.marker_file())
    }
}

/// Parent directory of a repo-relative path; empty string at the root.
fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// File name component of a repo-relative path.
fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Root-aware display form of a directory path.
fn display_dir(dir: &str) -> &str {
    if dir.is_empty() {
        "(root)"
    } else {
        dir
    }
}
