//! Configuration types for the port synchronization system
//!
//! This module defines all configuration structures used throughout the
//! crate. The daemon fills them from environment variables; embedders can
//! construct them directly. Validation fails fast at startup so that bad
//! values never reach the reconciliation loop.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Credential for the upstream control API.
///
/// Closed set of authentication schemes; the source implementation matches
/// exhaustively on this when building the request so a new variant cannot
/// silently skip auth.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// `X-Api-Key` header authentication
    ApiKey {
        /// The API key value
        key: String,
    },

    /// HTTP basic authentication
    Basic {
        /// Basic auth username
        username: String,
        /// Basic auth password
        password: String,
    },
}

// Secret values never appear in Debug output
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey { .. } => f
                .debug_struct("ApiKey")
                .field("key", &"<redacted>")
                .finish(),
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl Credential {
    /// Validate the credential
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            Credential::ApiKey { key } => {
                if key.is_empty() {
                    return Err(crate::Error::config("API key cannot be empty"));
                }
                Ok(())
            }
            Credential::Basic { username, .. } => {
                if username.is_empty() {
                    return Err(crate::Error::config(
                        "basic auth username cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Upstream (VPN sidecar control server) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Control server hostname
    #[serde(default = "default_upstream_host")]
    pub host: String,

    /// Control server port
    #[serde(default = "default_upstream_port")]
    pub port: u16,

    /// Path of the forwarded-port endpoint.
    ///
    /// gluetun has shipped two variants: the legacy
    /// `/v1/openvpn/portforwarded` and the unified `/v1/portforwarded`.
    /// Which one a deployment needs is configuration, not code.
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Credential attached to forwarded-port requests
    pub credential: Credential,
}

impl UpstreamConfig {
    /// Validate the upstream configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config("upstream host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("upstream port cannot be 0"));
        }
        if !self.api_path.starts_with('/') {
            return Err(crate::Error::config(format!(
                "upstream API path must start with '/': {}",
                self.api_path
            )));
        }
        self.credential.validate()
    }

    /// Base URL of the control server (always plain HTTP)
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Downstream (torrent client management API) configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Management API hostname
    #[serde(default = "default_downstream_host")]
    pub host: String,

    /// Management API port
    #[serde(default = "default_downstream_port")]
    pub port: u16,

    /// Login username
    #[serde(default = "default_downstream_user")]
    pub username: String,

    /// Login password
    #[serde(default = "default_downstream_pass")]
    pub password: String,

    /// Connect over HTTPS instead of HTTP
    #[serde(default)]
    pub use_https: bool,

    /// Verify TLS certificates when HTTPS is enabled.
    ///
    /// Off by default: self-hosted deployments commonly run the client
    /// behind a self-signed certificate on an already-trusted network.
    /// Turning this on tightens to full verification.
    #[serde(default)]
    pub verify_certs: bool,
}

impl std::fmt::Debug for DownstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownstreamConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_https", &self.use_https)
            .field("verify_certs", &self.verify_certs)
            .finish()
    }
}

impl DownstreamConfig {
    /// Validate the downstream configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config("downstream host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("downstream port cannot be 0"));
        }
        if self.username.is_empty() {
            return Err(crate::Error::config(
                "downstream username cannot be empty",
            ));
        }
        Ok(())
    }

    /// Base URL of the management API
    pub fn base_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Health snapshot publication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Filesystem path of the health snapshot document
    #[serde(default = "default_health_file")]
    pub file_path: PathBuf,

    /// Consecutive failed cycles before `healthy` flips to false.
    ///
    /// 1 means any single failed cycle is immediately unhealthy.
    /// Deployments that tolerate transient blips raise this.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl HealthConfig {
    /// Validate the health configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.failure_threshold == 0 {
            return Err(crate::Error::config(
                "failure threshold must be at least 1",
            ));
        }
        if self.file_path.as_os_str().is_empty() {
            return Err(crate::Error::config("health file path cannot be empty"));
        }
        Ok(())
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            file_path: default_health_file(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

/// Reconciliation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between reconciliation cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-HTTP-request timeout in seconds. Always finite; an unbounded
    /// request would stall the whole loop.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=3600).contains(&self.poll_interval_secs) {
            return Err(crate::Error::config(format!(
                "poll interval must be between 1 and 3600 seconds, got {}",
                self.poll_interval_secs
            )));
        }
        if !(1..=300).contains(&self.request_timeout_secs) {
            return Err(crate::Error::config(format!(
                "request timeout must be between 1 and 300 seconds, got {}",
                self.request_timeout_secs
            )));
        }
        Ok(())
    }

    /// Poll interval as a [`std::time::Duration`]
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    /// Request timeout as a [`std::time::Duration`]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Aggregate configuration for the whole system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upstream control server settings
    pub upstream: UpstreamConfig,

    /// Downstream management API settings
    pub downstream: DownstreamConfig,

    /// Health publication settings
    #[serde(default)]
    pub health: HealthConfig,

    /// Loop settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Validate the whole configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.upstream.validate()?;
        self.downstream.validate()?;
        self.health.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

fn default_upstream_host() -> String {
    "localhost".to_string()
}

fn default_upstream_port() -> u16 {
    8000
}

fn default_api_path() -> String {
    "/v1/openvpn/portforwarded".to_string()
}

fn default_downstream_host() -> String {
    "localhost".to_string()
}

fn default_downstream_port() -> u16 {
    8080
}

fn default_downstream_user() -> String {
    "admin".to_string()
}

fn default_downstream_pass() -> String {
    "adminadmin".to_string()
}

fn default_health_file() -> PathBuf {
    PathBuf::from("/tmp/portsync-health.json")
}

fn default_failure_threshold() -> u32 {
    1
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}
