//! Health recording and publication
//!
//! The [`HealthRecorder`] owns the single durable piece of state in the
//! system: a [`HealthSnapshot`] describing the reconciler's own operation.
//! Every cycle outcome is folded into the snapshot and the result is
//! published wholesale through a [`HealthPublisher`] — there is no history,
//! no append log, and no ambient global; the atomic publication is the only
//! externally observable effect.

pub mod file;

pub use file::FileHealthPublisher;

use crate::reconciler::CycleOutcome;
use crate::traits::HealthPublisher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The health document external probes read.
///
/// Serialized as a flat JSON object that always contains every field;
/// probes treat a missing or malformed document as unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Whether the reconciler considers itself healthy
    pub healthy: bool,

    /// Process start time
    pub started_at: DateTime<Utc>,

    /// When the most recent cycle finished
    pub last_check: DateTime<Utc>,

    /// When a port correction last took effect, if one ever has
    pub last_port_change: Option<DateTime<Utc>>,

    /// The last port confirmed active on the downstream sink.
    ///
    /// Only a successful, verified cycle advances this; a failed write
    /// leaves it at its previous value.
    pub current_port: Option<u16>,

    /// Description of the most recent failure, cleared on success
    pub last_error: Option<String>,

    /// Failed cycles since the last successful one
    pub consecutive_failures: u32,
}

impl HealthSnapshot {
    fn startup() -> Self {
        let now = Utc::now();
        Self {
            healthy: true,
            started_at: now,
            last_check: now,
            last_port_change: None,
            current_port: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

/// Accumulates cycle outcomes into the health snapshot and publishes it.
///
/// Owned by the reconciler; mutated once per cycle. The failure threshold
/// controls how many consecutive failed cycles are tolerated before
/// `healthy` flips to false — 1 (the default) means any single failure is
/// immediately unhealthy.
pub struct HealthRecorder {
    snapshot: HealthSnapshot,
    failure_threshold: u32,
    publisher: Box<dyn HealthPublisher>,
}

impl HealthRecorder {
    /// Create a recorder that starts healthy with `started_at = now`
    pub fn new(failure_threshold: u32, publisher: Box<dyn HealthPublisher>) -> Self {
        Self {
            snapshot: HealthSnapshot::startup(),
            failure_threshold: failure_threshold.max(1),
            publisher,
        }
    }

    /// Fold one cycle outcome into the snapshot and publish it
    pub async fn record(&mut self, outcome: &CycleOutcome) -> Result<(), crate::Error> {
        let now = Utc::now();
        self.snapshot.last_check = now;

        match outcome {
            CycleOutcome::NoChangeNeeded { port } => {
                self.snapshot.healthy = true;
                self.snapshot.current_port = Some(*port);
                self.snapshot.last_error = None;
                self.snapshot.consecutive_failures = 0;
            }
            CycleOutcome::PortUpdated { to, .. } => {
                self.snapshot.healthy = true;
                self.snapshot.current_port = Some(*to);
                self.snapshot.last_port_change = Some(now);
                self.snapshot.last_error = None;
                self.snapshot.consecutive_failures = 0;
            }
            CycleOutcome::Failed { stage, message, .. } => {
                // current_port deliberately untouched: it tracks the last
                // confirmed downstream port, not the last attempt.
                self.snapshot.consecutive_failures =
                    self.snapshot.consecutive_failures.saturating_add(1);
                self.snapshot.last_error = Some(format!("{stage}: {message}"));
                if self.snapshot.consecutive_failures >= self.failure_threshold {
                    self.snapshot.healthy = false;
                }
            }
        }

        self.publisher.publish(&self.snapshot).await
    }

    /// Best-effort final publication on graceful shutdown.
    ///
    /// Marks the snapshot unhealthy so probes fail closed while the process
    /// is going away, which also keeps the published document well-formed
    /// through teardown.
    pub async fn record_shutdown(&mut self) -> Result<(), crate::Error> {
        self.snapshot.healthy = false;
        self.snapshot.last_check = Utc::now();
        self.snapshot.last_error = Some("shutting down".to_string());
        self.publisher.publish(&self.snapshot).await
    }

    /// Current snapshot, for introspection and testing
    pub fn snapshot(&self) -> &HealthSnapshot {
        &self.snapshot
    }
}
