// # Health Publisher Trait
//
// Defines the interface for publishing the health snapshot to wherever an
// external probe reads it.
//
// ## Implementations
//
// - Atomic file publication: `crate::health::FileHealthPublisher`
//
// Publication must be atomic with respect to a concurrent reader: a probe
// reading mid-publish must see either the previous document or the new
// one, never a truncated or interleaved mix.

use crate::health::HealthSnapshot;
use async_trait::async_trait;

/// Trait for health snapshot publication.
///
/// The [`HealthRecorder`](crate::health::HealthRecorder) owns the snapshot
/// and folds cycle outcomes into it; publishers only serialize and emit
/// whatever snapshot they are handed. Implementations must not buffer —
/// when `publish` returns, the new document is what an external reader
/// observes.
#[async_trait]
pub trait HealthPublisher: Send + Sync {
    /// Publish the snapshot, replacing any previous publication wholesale
    async fn publish(&self, snapshot: &HealthSnapshot) -> Result<(), crate::Error>;
}
