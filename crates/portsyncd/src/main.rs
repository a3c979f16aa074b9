// # portsyncd - Port Synchronization Daemon
//
// Thin integration layer only: reads configuration from environment
// variables, initializes tracing, wires the gluetun source and qBittorrent
// sink into the reconciler, and bridges OS signals to its shutdown
// channel. All reconciliation logic lives in portsync-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Downstream (qBittorrent)
// - `QBITTORRENT_HOST`: WebUI hostname (default: localhost)
// - `QBITTORRENT_PORT`: WebUI port (default: 8080)
// - `QBITTORRENT_USER`: WebUI username (default: admin)
// - `QBITTORRENT_PASS`: WebUI password (default: adminadmin)
// - `QBITTORRENT_HTTPS`: connect over HTTPS (default: false)
// - `QBITTORRENT_VERIFY_CERTS`: verify TLS certificates; off by default so
//   self-signed deployments work out of the box
//
// ### Upstream (gluetun control server)
// - `GLUETUN_HOST`: control server hostname (default: localhost)
// - `GLUETUN_PORT`: control server port (default: 8000)
// - `GLUETUN_AUTH_TYPE`: apikey or basic (default: apikey)
// - `GLUETUN_APIKEY`: API key (required for apikey auth)
// - `GLUETUN_USERNAME` / `GLUETUN_PASSWORD`: basic auth credentials
// - `GLUETUN_API_PATH`: forwarded-port endpoint path
//   (default: /v1/openvpn/portforwarded; newer sidecars use /v1/portforwarded)
//
// ### Loop & Health
// - `CHECK_INTERVAL`: seconds between cycles (default: 30)
// - `REQUEST_TIMEOUT`: per-request timeout in seconds (default: 10)
// - `FAILURE_THRESHOLD`: consecutive failed cycles before the health file
//   reports unhealthy (default: 1)
// - `HEALTH_FILE`: health snapshot path (default: /tmp/portsync-health.json)
// - `LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export GLUETUN_HOST=gluetun
// export GLUETUN_APIKEY=your_key
// export QBITTORRENT_HOST=qbittorrent
// export QBITTORRENT_PASS=your_password
// export CHECK_INTERVAL=30
//
// portsyncd
// ```

use anyhow::Result;
use portsync_core::config::{
    Credential, DownstreamConfig, EngineConfig, HealthConfig, SyncConfig, UpstreamConfig,
};
use portsync_core::{FileHealthPublisher, HealthRecorder, Reconciler};
use portsync_sink_qbittorrent::QbitPortSink;
use portsync_source_gluetun::GluetunPortSource;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Build the configuration from a key lookup (the environment in
/// production, a map in tests). Invalid values fail here, before the loop
/// ever starts.
fn config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<(SyncConfig, Level)> {
    let credential = match lookup("GLUETUN_AUTH_TYPE")
        .unwrap_or_else(|| "apikey".to_string())
        .to_lowercase()
        .as_str()
    {
        "apikey" => Credential::ApiKey {
            key: lookup("GLUETUN_APIKEY").unwrap_or_default(),
        },
        "basic" => Credential::Basic {
            username: lookup("GLUETUN_USERNAME").unwrap_or_default(),
            password: lookup("GLUETUN_PASSWORD").unwrap_or_default(),
        },
        other => anyhow::bail!(
            "GLUETUN_AUTH_TYPE '{}' is not supported. Supported types: apikey, basic",
            other
        ),
    };

    let config = SyncConfig {
        upstream: UpstreamConfig {
            host: lookup("GLUETUN_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parsed(&lookup, "GLUETUN_PORT", 8000)?,
            api_path: lookup("GLUETUN_API_PATH")
                .unwrap_or_else(|| "/v1/openvpn/portforwarded".to_string()),
            credential,
        },
        downstream: DownstreamConfig {
            host: lookup("QBITTORRENT_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parsed(&lookup, "QBITTORRENT_PORT", 8080)?,
            username: lookup("QBITTORRENT_USER").unwrap_or_else(|| "admin".to_string()),
            password: lookup("QBITTORRENT_PASS").unwrap_or_else(|| "adminadmin".to_string()),
            use_https: parsed_bool(&lookup, "QBITTORRENT_HTTPS", false)?,
            verify_certs: parsed_bool(&lookup, "QBITTORRENT_VERIFY_CERTS", false)?,
        },
        health: HealthConfig {
            file_path: lookup("HEALTH_FILE")
                .unwrap_or_else(|| "/tmp/portsync-health.json".to_string())
                .into(),
            failure_threshold: parsed(&lookup, "FAILURE_THRESHOLD", 1)?,
        },
        engine: EngineConfig {
            poll_interval_secs: parsed(&lookup, "CHECK_INTERVAL", 30)?,
            request_timeout_secs: parsed(&lookup, "REQUEST_TIMEOUT", 10)?,
        },
    };

    let level = parse_log_level(
        &lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
    )?;

    config.validate()?;
    Ok((config, level))
}

/// Parse an optional variable, failing on malformed values instead of
/// silently falling back to the default.
fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

fn parsed_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool> {
    match lookup(name) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => anyhow::bail!(
                "{} has invalid value '{}'. Expected true/false, 1/0, or yes/no",
                name,
                raw
            ),
        },
        None => Ok(default),
    }
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => anyhow::bail!(
            "LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            other
        ),
    }
}

fn main() -> ExitCode {
    // Load and validate configuration from the environment
    let (config, log_level) = match config_from_lookup(|key| env::var(key).ok()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    info!("starting portsyncd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("daemon error: {}", e);
            SyncExitCode::RuntimeError
        } else {
            SyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Wire components together and run the loop until a signal arrives
async fn run_daemon(config: SyncConfig) -> Result<()> {
    let timeout = config.engine.request_timeout();

    let source = GluetunPortSource::new(&config.upstream, timeout)?;
    let sink = QbitPortSink::new(&config.downstream, timeout)?;
    let publisher = FileHealthPublisher::new(&config.health.file_path).await?;
    let health = HealthRecorder::new(config.health.failure_threshold, Box::new(publisher));

    let mut reconciler = Reconciler::new(
        Box::new(source),
        Box::new(sink),
        health,
        config.engine.poll_interval(),
    );

    // Bridge OS signals into the reconciler's shutdown channel so the loop
    // only ever observes shutdown between cycles.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("received {}", signal),
            Err(e) => error!("signal handler error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    reconciler.run_with_shutdown(Some(shutdown_rx)).await?;
    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for CTRL-C (non-Unix platforms)
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
