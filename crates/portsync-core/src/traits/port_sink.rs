// # Port Sink Trait
//
// Defines the interface for reading and correcting the downstream
// listening-port configuration.
//
// ## Implementations
//
// - qBittorrent WebUI API: `portsync-sink-qbittorrent` crate
//
// ## Session Ownership
//
// A sink owns its authenticated session outright. Login happens lazily on
// first use; an authorization-rejected response invalidates the session and
// the failing call is retried exactly once with a fresh login before the
// error surfaces. Callers never see session churn.

use async_trait::async_trait;

/// Trait for downstream port sinks.
///
/// # Error Contract
///
/// - `Transport`: connection refused, timeout (retryable next cycle)
/// - `Authentication`: login rejected with the configured credentials
///   (surfaced after the single re-login attempt; unlikely to self-heal)
/// - `Protocol`: response shape the implementation does not understand
/// - `Verification`: only from [`set_port`](PortSink::set_port) — the write
///   was accepted but the read-back disagrees. Distinct from a rejected
///   write because a silently ineffective write is the more severe
///   condition.
///
/// # Retry Policy
///
/// Apart from the single transparent re-login on session expiry,
/// implementations make no retries. The reconciler owns the cadence.
#[async_trait]
pub trait PortSink: Send + Sync {
    /// Read the currently configured listening port
    async fn current_port(&self) -> Result<u16, crate::Error>;

    /// Write the listening port, then verify it took effect by re-reading.
    ///
    /// Returns `Ok(())` only when the read-back equals `port`.
    async fn set_port(&self, port: u16) -> Result<(), crate::Error>;

    /// Short name for logging (e.g. "qbittorrent")
    fn sink_name(&self) -> &'static str;
}
