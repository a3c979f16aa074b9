// # Forwarded Port Source Trait
//
// Defines the interface for querying the upstream forwarded port.
//
// ## Implementations
//
// - gluetun control server: `portsync-source-gluetun` crate
//
// Implementations are single-shot: one query per call, full error
// propagation, no retry or backoff of their own. The reconciler owns the
// cadence, so one failed fetch never blocks the health-reporting cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of one successful forwarded-port query.
///
/// Consumed immediately by the reconciler; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortObservation {
    /// The forwarded port. Always nonzero; a sidecar reporting port 0 is
    /// surfaced as [`Error::UpstreamUnavailable`](crate::Error) instead.
    pub port: u16,

    /// When the observation was made
    pub observed_at: DateTime<Utc>,
}

impl PortObservation {
    /// Create an observation stamped with the current time
    pub fn now(port: u16) -> Self {
        Self {
            port,
            observed_at: Utc::now(),
        }
    }
}

/// Trait for upstream forwarded-port sources.
///
/// # Error Contract
///
/// Implementations map failures into the crate taxonomy rather than
/// returning transport-library errors:
///
/// - `Transport`: connection refused, timeout
/// - `Authentication`: the control server rejected the credential
/// - `Protocol`: response shape or status the implementation does not
///   understand (usually a version mismatch)
/// - `UpstreamUnavailable`: the sidecar itself reports port forwarding as
///   not ready — "ask again later", not "fix credentials"
///
/// # Retry Policy
///
/// None here. Implementations make exactly one request per call; the
/// reconciler retries on its own cadence.
#[async_trait]
pub trait ForwardedPortSource: Send + Sync {
    /// Query the currently forwarded port
    async fn forwarded_port(&self) -> Result<PortObservation, crate::Error>;

    /// Short name for logging (e.g. "gluetun")
    fn source_name(&self) -> &'static str;
}
