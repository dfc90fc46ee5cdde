//! Generation orchestration: the 8-phase pipeline with cascade-correct
//! incremental regeneration, bounded fan-out, cooperative cancellation, and
//! atomic staging/promotion.

pub mod cascade;
pub mod lock;
pub mod marker;
pub mod progress;
pub mod run;
pub mod staging;

pub use cascade::{directory_signature, CascadeFlags};
pub use marker::{GenerationMarker, RunStatus};
pub use progress::{Phase, ProgressEvent, ProgressSender};
pub use run::{AnalysisResult, GenerationOrchestrator, GenerationReport, PhaseCount};
