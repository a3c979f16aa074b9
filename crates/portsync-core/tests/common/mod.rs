//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal, fully deterministic doubles: a scripted
//! port source, a recording port sink, and a capturing health publisher.
//! All of them share state through `Arc` so tests can keep handles after
//! moving clones into the reconciler.

#![allow(dead_code)]

use portsync_core::health::HealthSnapshot;
use portsync_core::traits::{ForwardedPortSource, HealthPublisher, PortObservation, PortSink};
use portsync_core::{Error, HealthRecorder, Reconciler};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Failure kinds a scripted double can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Transport,
    Authentication,
    Protocol,
    UpstreamUnavailable,
}

impl ScriptedFailure {
    pub fn to_error(self) -> Error {
        match self {
            ScriptedFailure::Transport => Error::transport("connection refused"),
            ScriptedFailure::Authentication => Error::auth("credentials rejected"),
            ScriptedFailure::Protocol => Error::protocol("unexpected response"),
            ScriptedFailure::UpstreamUnavailable => {
                Error::upstream_unavailable("not ready")
            }
        }
    }
}

/// A port source that replays a script of responses.
///
/// The last entry repeats forever, so a one-entry script models an
/// unchanged upstream across arbitrarily many cycles.
#[derive(Clone)]
pub struct ScriptedPortSource {
    script: Arc<Mutex<VecDeque<Result<u16, ScriptedFailure>>>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedPortSource {
    pub fn new(script: Vec<Result<u16, ScriptedFailure>>) -> Self {
        assert!(!script.is_empty(), "script cannot be empty");
        Self {
            script: Arc::new(Mutex::new(script.into())),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that reports the same port every cycle
    pub fn steady(port: u16) -> Self {
        Self::new(vec![Ok(port)])
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ForwardedPortSource for ScriptedPortSource {
    async fn forwarded_port(&self) -> Result<PortObservation, Error> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let mut script = self.script.lock().unwrap();
        let response = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            *script.front().unwrap()
        };

        match response {
            Ok(port) => Ok(PortObservation::now(port)),
            Err(failure) => Err(failure.to_error()),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A port sink that records reads and writes against an in-memory port.
#[derive(Clone)]
pub struct RecordingPortSink {
    current: Arc<Mutex<u16>>,
    writes: Arc<Mutex<Vec<u16>>>,
    read_count: Arc<AtomicUsize>,
    fail_reads: Arc<Mutex<Option<ScriptedFailure>>>,
    fail_writes: Arc<Mutex<Option<ScriptedFailure>>>,
    verification_mismatch: Arc<Mutex<bool>>,
}

impl RecordingPortSink {
    pub fn new(initial_port: u16) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial_port)),
            writes: Arc::new(Mutex::new(Vec::new())),
            read_count: Arc::new(AtomicUsize::new(0)),
            fail_reads: Arc::new(Mutex::new(None)),
            fail_writes: Arc::new(Mutex::new(None)),
            verification_mismatch: Arc::new(Mutex::new(false)),
        }
    }

    pub fn writes(&self) -> Vec<u16> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }

    pub fn configured_port(&self) -> u16 {
        *self.current.lock().unwrap()
    }

    /// Make subsequent reads fail with the given kind
    pub fn fail_reads_with(&self, failure: ScriptedFailure) {
        *self.fail_reads.lock().unwrap() = Some(failure);
    }

    /// Make subsequent writes fail with the given kind
    pub fn fail_writes_with(&self, failure: ScriptedFailure) {
        *self.fail_writes.lock().unwrap() = Some(failure);
    }

    /// Make subsequent writes be accepted but not take effect
    pub fn make_writes_silently_ineffective(&self) {
        *self.verification_mismatch.lock().unwrap() = true;
    }
}

#[async_trait::async_trait]
impl PortSink for RecordingPortSink {
    async fn current_port(&self) -> Result<u16, Error> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.fail_reads.lock().unwrap() {
            return Err(failure.to_error());
        }
        Ok(*self.current.lock().unwrap())
    }

    async fn set_port(&self, port: u16) -> Result<(), Error> {
        self.writes.lock().unwrap().push(port);

        if let Some(failure) = *self.fail_writes.lock().unwrap() {
            return Err(failure.to_error());
        }

        if *self.verification_mismatch.lock().unwrap() {
            // The write was accepted but the configured port never moved
            let actual = *self.current.lock().unwrap();
            return Err(Error::verification(port, actual));
        }

        *self.current.lock().unwrap() = port;
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "recording"
    }
}

/// A health publisher that captures every published snapshot.
#[derive(Clone, Default)]
pub struct CapturingPublisher {
    published: Arc<Mutex<Vec<HealthSnapshot>>>,
}

impl CapturingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<HealthSnapshot> {
        self.published.lock().unwrap().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<HealthSnapshot> {
        self.published.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl HealthPublisher for CapturingPublisher {
    async fn publish(&self, snapshot: &HealthSnapshot) -> Result<(), Error> {
        self.published.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

/// Assemble a reconciler around the given doubles with a short interval
pub fn reconciler(
    source: &ScriptedPortSource,
    sink: &RecordingPortSink,
    publisher: &CapturingPublisher,
    failure_threshold: u32,
) -> Reconciler {
    let health = HealthRecorder::new(failure_threshold, Box::new(publisher.clone()));
    Reconciler::new(
        Box::new(source.clone()),
        Box::new(sink.clone()),
        health,
        Duration::from_millis(10),
    )
}
