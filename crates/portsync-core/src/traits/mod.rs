//! Core traits for the port synchronization system
//!
//! This module defines the abstract interfaces that all implementations
//! must follow.
//!
//! - [`ForwardedPortSource`]: Query the upstream forwarded port
//! - [`PortSink`]: Read and correct the downstream listening port
//! - [`HealthPublisher`]: Publish the health snapshot atomically

pub mod health_publisher;
pub mod port_sink;
pub mod port_source;

pub use health_publisher::HealthPublisher;
pub use port_sink::PortSink;
pub use port_source::{ForwardedPortSource, PortObservation};
