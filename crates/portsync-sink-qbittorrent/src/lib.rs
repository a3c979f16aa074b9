// # qBittorrent Port Sink
//
// This crate provides a PortSink implementation against the qBittorrent
// WebUI API.
//
// ## Endpoints
//
// - `POST /api/v2/auth/login` — form-encoded username/password; success is
//   HTTP 200 with body `Ok.` and an `SID` session cookie. Wrong credentials
//   come back as HTTP 200 with body `Fails.`; a banned client gets 403.
// - `GET /api/v2/app/preferences` — JSON object with `listen_port`
// - `POST /api/v2/app/setPreferences` — form field `json` holding a partial
//   preferences update, here `{"listen_port": N}`
//
// ## Session Lifecycle
//
// The sink owns its session outright: the SID cookie is captured at login,
// attached to every API call, dropped on an authorization-rejected
// response, and re-established lazily. An expired session costs the caller
// nothing — the failing call is retried exactly once with a fresh login
// before any error surfaces. Rejected credentials at login are surfaced
// immediately; retrying the same credentials inside a cycle cannot help.
//
// ## Verification
//
// `set_port` re-reads the preferences after the write and only reports
// success when the read-back matches. A write that was accepted but did
// not take effect surfaces as `Verification`, distinct from a rejected
// write — it points at a race or non-idempotent remote state rather than
// at anything the next cycle could fix by itself.

use portsync_core::config::DownstreamConfig;
use portsync_core::traits::PortSink;
use portsync_core::{Error, Result};
use reqwest::header;
use std::time::Duration;
use tokio::sync::Mutex;

/// An authenticated qBittorrent WebUI session
struct Session {
    /// Opaque SID cookie value from the login response
    sid: String,
}

/// Reads and corrects the qBittorrent listening port.
pub struct QbitPortSink {
    /// `http(s)://host:port`
    base_url: String,

    /// Login username
    username: String,

    /// Login password
    password: String,

    /// HTTP client with the configured request timeout
    client: reqwest::Client,

    /// Current session, `None` until first login or after invalidation.
    /// The mutex is uncontended in the single-loop model; it exists so the
    /// trait methods take `&self` and so a parallelized caller would
    /// inherit mutual exclusion.
    session: Mutex<Option<Session>>,
}

// Credentials never appear in Debug output
impl std::fmt::Debug for QbitPortSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QbitPortSink")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl QbitPortSink {
    /// Create a sink from the downstream configuration.
    ///
    /// When HTTPS is enabled and certificate verification is not, the
    /// client accepts self-signed certificates — the default posture for
    /// self-hosted deployments behind an already-trusted network.
    pub fn new(config: &DownstreamConfig, timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if config.use_https && !config.verify_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
            session: Mutex::new(None),
        })
    }

    /// Return the current session's SID, logging in first if there is none
    async fn ensure_session(&self) -> Result<String> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.sid.clone());
        }

        let sid = self.login().await?;
        tracing::debug!("logged in to qBittorrent");
        *guard = Some(Session { sid: sid.clone() });
        Ok(sid)
    }

    /// Drop the current session so the next call re-authenticates
    async fn invalidate_session(&self) {
        *self.session.lock().await = None;
    }

    async fn login(&self) -> Result<String> {
        let url = format!("{}/api/v2/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::transport(format!("login request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 403 {
            return Err(Error::auth(
                "login rejected (HTTP 403, client address may be banned)",
            ));
        }
        if !status.is_success() {
            return Err(Error::protocol(format!(
                "unexpected login status {}",
                status.as_u16()
            )));
        }

        // The SID cookie must be captured before the body consumes the
        // response.
        let sid = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(extract_sid);

        let body = response
            .text()
            .await
            .map_err(|e| Error::protocol(format!("failed to read login response: {}", e)))?;

        // qBittorrent reports bad credentials as 200 "Fails."
        if body.trim() != "Ok." {
            return Err(Error::auth("login rejected: wrong username or password"));
        }

        sid.ok_or_else(|| Error::protocol("login succeeded but no SID cookie was set"))
    }

    async fn fetch_listen_port(&self, sid: &str) -> Result<u16> {
        let url = format!("{}/api/v2/app/preferences", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(header::COOKIE, format!("SID={}", sid))
            .send()
            .await
            .map_err(|e| Error::transport(format!("preferences read failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            200 => {}
            401 | 403 => {
                return Err(Error::auth(format!(
                    "preferences read rejected (HTTP {})",
                    status.as_u16()
                )));
            }
            _ => {
                return Err(Error::protocol(format!(
                    "unexpected preferences status {}",
                    status.as_u16()
                )));
            }
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::protocol(format!("preferences are not valid JSON: {}", e)))?;

        let port = body
            .get("listen_port")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                Error::protocol("preferences are missing an integer `listen_port` field")
            })?;

        if port == 0 {
            return Err(Error::protocol("preferences report listen_port 0"));
        }
        u16::try_from(port)
            .map_err(|_| Error::protocol(format!("listen_port {} out of range", port)))
    }

    async fn push_listen_port(&self, sid: &str, port: u16) -> Result<()> {
        let url = format!("{}/api/v2/app/setPreferences", self.base_url);
        let payload = serde_json::json!({ "listen_port": port }).to_string();
        let response = self
            .client
            .post(&url)
            .header(header::COOKIE, format!("SID={}", sid))
            .form(&[("json", payload.as_str())])
            .send()
            .await
            .map_err(|e| Error::transport(format!("preferences write failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            200 => Ok(()),
            401 | 403 => Err(Error::auth(format!(
                "preferences write rejected (HTTP {})",
                status.as_u16()
            ))),
            _ => Err(Error::protocol(format!(
                "unexpected preferences write status {}",
                status.as_u16()
            ))),
        }
    }
}

/// Pull the SID value out of a `Set-Cookie` header
fn extract_sid(set_cookie: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name == "SID" && !value.is_empty()).then(|| value.to_string())
}

#[async_trait::async_trait]
impl PortSink for QbitPortSink {
    async fn current_port(&self) -> Result<u16> {
        let sid = self.ensure_session().await?;
        match self.fetch_listen_port(&sid).await {
            Err(Error::Authentication(_)) => {
                // Expired session; retry exactly once with a fresh login
                tracing::debug!("session rejected, re-establishing");
                self.invalidate_session().await;
                let sid = self.ensure_session().await?;
                self.fetch_listen_port(&sid).await
            }
            other => other,
        }
    }

    async fn set_port(&self, port: u16) -> Result<()> {
        let sid = self.ensure_session().await?;
        match self.push_listen_port(&sid, port).await {
            Err(Error::Authentication(_)) => {
                tracing::debug!("session rejected, re-establishing");
                self.invalidate_session().await;
                let sid = self.ensure_session().await?;
                self.push_listen_port(&sid, port).await
            }
            other => other,
        }?;

        // An accepted write is not a landed write; only the read-back
        // counts.
        let actual = self.current_port().await?;
        if actual != port {
            return Err(Error::verification(port, actual));
        }

        tracing::debug!(port, "listening port updated and verified");
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "qbittorrent"
    }
}
