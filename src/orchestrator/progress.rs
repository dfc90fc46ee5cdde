//! Progress events for generation runs.
//!
//! Consumers subscribe to an unbounded channel of `{phase, step, total,
//! message}` events. Per-item updates are coalesced to at most one event per
//! ten items per phase; phase boundaries and final steps always emit.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Coalescing interval for per-item progress.
const COALESCE_EVERY: usize = 10;

/// The eight pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Analysis,
    Files,
    Directories,
    Synthesis,
    Architecture,
    Overview,
    Workflows,
    Indexing,
}

impl Phase {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Files => "files",
            Self::Directories => "directories",
            Self::Synthesis => "synthesis",
            Self::Architecture => "architecture",
            Self::Overview => "overview",
            Self::Workflows => "workflows",
            Self::Indexing => "indexing",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Phase the update belongs to
    pub phase: Phase,
    /// Current step within the phase (1-based)
    pub step: usize,
    /// Total steps in the phase
    pub total_steps: usize,
    /// Human-readable message
    pub message: String,
}

/// Sending side of the progress channel. Cheap to clone; dropping every
/// receiver silently disables emission.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSender {
    /// A sender with no subscriber.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a connected sender/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Emit one event. Send failures (receiver dropped) are ignored.
    pub fn emit(&self, phase: Phase, step: usize, total_steps: usize, message: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ProgressEvent {
                phase,
                step,
                total_steps,
                message: message.into(),
            });
        }
    }

    /// Start a coalescing tracker for a phase of `total` items.
    pub fn phase_tracker(&self, phase: Phase, total: usize) -> PhaseTracker {
        PhaseTracker {
            sender: self.clone(),
            phase,
            total,
            last_emitted: 0,
        }
    }
}

/// Coalesces per-item progress within one phase.
#[derive(Debug)]
pub struct PhaseTracker {
    sender: ProgressSender,
    phase: Phase,
    total: usize,
    last_emitted: usize,
}

impl PhaseTracker {
    /// Record completion of item `step` (1-based). Emits on the first item,
    /// every tenth item, and the final item.
    pub fn step(&mut self, step: usize, message: impl Into<String>) {
        let due = self.last_emitted == 0
            || step >= self.last_emitted + COALESCE_EVERY
            || step == self.total;
        if due {
            self.sender.emit(self.phase, step, self.total, message);
            self.last_emitted = step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalescing_limits_event_rate() {
        let (sender, mut rx) = ProgressSender::channel();
        let mut tracker = sender.phase_tracker(Phase::Files, 35);
        for step in 1..=35 {
            tracker.step(step, format!("file {step}"));
        }
        drop(sender);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        // Steps 1, 11, 21, 31, 35.
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].step, 1);
        assert_eq!(events.last().map(|e| e.step), Some(35));
    }

    #[test]
    fn test_step_monotonic_order() {
        let (sender, mut rx) = ProgressSender::channel();
        let mut tracker = sender.phase_tracker(Phase::Directories, 25);
        for step in 1..=25 {
            tracker.step(step, "dir");
        }
        drop(sender);

        let mut last = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(event.step > last);
            last = event.step;
        }
    }

    #[test]
    fn test_disabled_sender_is_silent() {
        let sender = ProgressSender::disabled();
        sender.emit(Phase::Analysis, 1, 1, "no-op");
        let mut tracker = sender.phase_tracker(Phase::Files, 3);
        tracker.step(1, "x");
    }
}
