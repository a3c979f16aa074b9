// # portsync-core
//
// Core library for the forwarded-port reconciliation system.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping a torrent
// client's listening port synchronized with a VPN sidecar's forwarded port:
//
// - **ForwardedPortSource**: Trait for querying the upstream forwarded port
// - **PortSink**: Trait for reading and correcting the downstream port
// - **Reconciler**: Control loop running the observe → compare → correct
//   cycle on a fixed cadence
// - **HealthRecorder**: Folds cycle outcomes into a health snapshot and
//   publishes it atomically for external probes
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from the HTTP
//    implementations (`portsync-source-gluetun`, `portsync-sink-qbittorrent`)
// 2. **Single Loop**: One cooperative task; cycles execute strictly
//    sequentially, health published before the next cycle starts
// 3. **Engine-Owned Retries**: Sources and sinks are single-shot; the loop
//    cadence is the retry policy, so no failure is fatal
// 4. **Observable Failure**: Every error funnels into the health snapshot;
//    logs are a secondary channel

pub mod config;
pub mod error;
pub mod health;
pub mod reconciler;
pub mod traits;

// Re-export core types for convenience
pub use config::{Credential, DownstreamConfig, EngineConfig, HealthConfig, SyncConfig, UpstreamConfig};
pub use error::{Error, ErrorKind, Result};
pub use health::{FileHealthPublisher, HealthRecorder, HealthSnapshot};
pub use reconciler::{CycleOutcome, Reconciler, Stage};
pub use traits::{ForwardedPortSource, HealthPublisher, PortObservation, PortSink};
