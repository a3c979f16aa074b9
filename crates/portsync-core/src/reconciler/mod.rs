//! Core reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Fetching the forwarded port via ForwardedPortSource
//! - Comparing it against the sink's configured port
//! - Correcting drift via PortSink (write + verify)
//! - Folding each cycle's outcome into the HealthRecorder
//!
//! ## Cycle Flow
//!
//! ```text
//! ┌──────────────────────┐       ┌────────────────┐
//! │ ForwardedPortSource  │──────▶│   Reconciler   │
//! └──────────────────────┘ read  └────────────────┘
//!                                    │         │
//!                         read/write │         │ record
//!                                    ▼         ▼
//!                           ┌──────────┐  ┌────────────────┐
//!                           │ PortSink │  │ HealthRecorder │
//!                           └──────────┘  └────────────────┘
//! ```
//!
//! One observe → compare → correct pass per tick. The loop carries no state
//! across cycles beyond what the HealthRecorder holds, so a transient
//! failure degrades exactly one cycle and self-heals on the next tick.
//! Retry policy lives here and only here: sources and sinks are single-shot.

use crate::health::HealthRecorder;
use crate::traits::{ForwardedPortSource, PortSink};
use crate::{Error, ErrorKind, Result};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Stage of the cycle a failure occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Querying the upstream forwarded port
    Upstream,
    /// Reading the sink's configured port
    DownstreamRead,
    /// Writing (and verifying) the corrected port
    DownstreamWrite,
}

impl Stage {
    /// Stable name used in health snapshots and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Upstream => "upstream",
            Stage::DownstreamRead => "downstream-read",
            Stage::DownstreamWrite => "downstream-write",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Upstream and downstream already agree
    NoChangeNeeded {
        /// The agreed port
        port: u16,
    },

    /// Drift was detected and corrected
    PortUpdated {
        /// Port the sink was configured with before the correction
        from: u16,
        /// Port the sink is now confirmed to listen on
        to: u16,
    },

    /// The cycle failed at some stage; later stages were skipped
    Failed {
        /// Stage the failure occurred in
        stage: Stage,
        /// Classified error kind
        kind: ErrorKind,
        /// Human-readable failure description
        message: String,
    },
}

impl CycleOutcome {
    fn failed(stage: Stage, err: &Error) -> Self {
        CycleOutcome::Failed {
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The control loop.
///
/// Owns the source, the sink, and the health recorder outright. Everything
/// runs on one cooperative task: network calls are awaited inline and cycle
/// N+1 never starts before cycle N's health publication has completed.
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Start with [`Reconciler::run()`] (or [`run_with_shutdown`] in tests)
/// 3. The loop runs until a shutdown signal arrives, observed only between
///    cycles — never mid-write
/// 4. A best-effort final health publication records the shutdown before
///    the loop returns
pub struct Reconciler {
    /// Upstream forwarded-port source
    source: Box<dyn ForwardedPortSource>,

    /// Downstream port sink
    sink: Box<dyn PortSink>,

    /// Health state owner and publisher
    health: HealthRecorder,

    /// Sleep between cycles
    poll_interval: Duration,

    /// First-cycle flag, only used to raise the initial "already in sync"
    /// log to info
    first_cycle: bool,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        source: Box<dyn ForwardedPortSource>,
        sink: Box<dyn PortSink>,
        health: HealthRecorder,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            health,
            poll_interval,
            first_cycle: true,
        }
    }

    /// Run the loop until the process receives an interrupt signal.
    ///
    /// Never returns an error from a cycle failure; the loop is designed to
    /// run indefinitely and self-heal.
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the loop with an injectable shutdown channel.
    ///
    /// This is `pub` so the daemon can bridge OS signals to the loop and so
    /// contract tests can shut the loop down deterministically. Pass `None`
    /// to fall back to interrupt-signal handling.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        info!(
            source = self.source.source_name(),
            sink = self.sink.sink_name(),
            interval_secs = self.poll_interval.as_secs(),
            "starting reconciliation loop"
        );

        if let Some(mut rx) = shutdown_rx {
            loop {
                self.tick().await;

                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = &mut rx => {
                        info!("shutdown signal received");
                        break;
                    }
                }
            }
        } else {
            loop {
                self.tick().await;

                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("shutdown signal received");
                        break;
                    }
                }
            }
        }

        // Best-effort: probes should fail closed while we are going away.
        if let Err(e) = self.health.record_shutdown().await {
            warn!("final health publication failed: {}", e);
        }
        info!("reconciliation loop stopped");

        Ok(())
    }

    /// Run exactly one cycle: observe, compare, correct, record.
    ///
    /// This is `pub` for contract tests and embedders that drive the loop
    /// on their own cadence; [`run`](Reconciler::run) is `tick` plus sleep.
    pub async fn tick(&mut self) -> CycleOutcome {
        let outcome = self.run_cycle().await;
        self.log_outcome(&outcome);

        // A failed publication degrades observability but must not stop
        // reconciliation.
        if let Err(e) = self.health.record(&outcome).await {
            error!("failed to publish health snapshot: {}", e);
        }

        self.first_cycle = false;
        outcome
    }

    /// Snapshot accessor, for introspection and testing
    pub fn health(&self) -> &HealthRecorder {
        &self.health
    }

    async fn run_cycle(&self) -> CycleOutcome {
        let observation = match self.source.forwarded_port().await {
            Ok(observation) => observation,
            Err(e) => return CycleOutcome::failed(Stage::Upstream, &e),
        };

        let configured = match self.sink.current_port().await {
            Ok(port) => port,
            Err(e) => return CycleOutcome::failed(Stage::DownstreamRead, &e),
        };

        if configured == observation.port {
            return CycleOutcome::NoChangeNeeded { port: configured };
        }

        match self.sink.set_port(observation.port).await {
            Ok(()) => CycleOutcome::PortUpdated {
                from: configured,
                to: observation.port,
            },
            Err(e) => CycleOutcome::failed(Stage::DownstreamWrite, &e),
        }
    }

    fn log_outcome(&self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::NoChangeNeeded { port } => {
                if self.first_cycle {
                    info!(port, "port already in sync");
                } else {
                    debug!(port, "port already in sync");
                }
            }
            CycleOutcome::PortUpdated { from, to } => {
                info!(from, to, "forwarded port changed, sink updated");
            }
            CycleOutcome::Failed {
                stage,
                kind,
                message,
            } => match kind {
                // The sidecar warming up is routine, not an incident.
                ErrorKind::UpstreamUnavailable => {
                    info!(stage = %stage, "{}", message);
                }
                ErrorKind::Transport => {
                    warn!(stage = %stage, "cycle failed: {}", message);
                }
                // Bad credentials, version mismatches, and unverified
                // writes do not self-heal; say so loudly.
                ErrorKind::Authentication
                | ErrorKind::Protocol
                | ErrorKind::Verification
                | ErrorKind::Other => {
                    error!(stage = %stage, "cycle failed: {}", message);
                }
            },
        }
    }
}
