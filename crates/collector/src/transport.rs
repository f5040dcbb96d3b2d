//! Network seam for reading equipment logs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SourceError;

/// Default timeout for a single log read.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads the raw text of an equipment log.
#[async_trait]
pub trait LogTransport: Send + Sync {
    /// Perform one read of `endpoint`. No retries at this level.
    async fn fetch_text(&self, endpoint: &str) -> Result<String, SourceError>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// Reads logs over HTTP(S) with a bounded per-request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

fn map_reqwest(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else if err.is_decode() {
        SourceError::Malformed(err.to_string())
    } else {
        SourceError::Network(err.to_string())
    }
}

#[async_trait]
impl LogTransport for HttpTransport {
    async fn fetch_text(&self, endpoint: &str) -> Result<String, SourceError> {
        let response = self.client.get(endpoint).send().await.map_err(map_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Network(format!("HTTP {}", status.as_u16())));
        }
        let body = response.bytes().await.map_err(map_reqwest)?;
        String::from_utf8(body.to_vec()).map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Script {
    body: Option<String>,
    failure: Option<SourceError>,
    /// Calls that still fail before `body` is served.
    failures_left: usize,
    delay: Duration,
    calls: usize,
}

/// Scripted in-process transport keyed by endpoint.
///
/// Endpoints without a script fail with [`SourceError::Network`].
#[derive(Debug, Default)]
pub struct MemoryTransport {
    scripts: Mutex<HashMap<String, Script>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<R>(&self, endpoint: &str, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        f(scripts.entry(endpoint.to_string()).or_default())
    }

    /// Serve `body` on every call.
    pub fn respond(&self, endpoint: &str, body: impl Into<String>) {
        self.with_script(endpoint, |s| {
            s.body = Some(body.into());
            s.failure = None;
            s.failures_left = 0;
        });
    }

    /// Fail every call with `error`.
    pub fn fail(&self, endpoint: &str, error: SourceError) {
        self.with_script(endpoint, |s| {
            s.body = None;
            s.failure = Some(error);
            s.failures_left = 0;
        });
    }

    /// Fail the next `times` calls with `error`, then serve `body`.
    pub fn fail_then_respond(
        &self,
        endpoint: &str,
        times: usize,
        error: SourceError,
        body: impl Into<String>,
    ) {
        self.with_script(endpoint, |s| {
            s.body = Some(body.into());
            s.failure = Some(error);
            s.failures_left = times;
        });
    }

    /// Delay every response from `endpoint`.
    pub fn set_delay(&self, endpoint: &str, delay: Duration) {
        self.with_script(endpoint, |s| s.delay = delay);
    }

    /// Number of reads issued against `endpoint` so far.
    pub fn calls(&self, endpoint: &str) -> usize {
        self.with_script(endpoint, |s| s.calls)
    }
}

#[async_trait]
impl LogTransport for MemoryTransport {
    async fn fetch_text(&self, endpoint: &str) -> Result<String, SourceError> {
        let (delay, outcome) = self.with_script(endpoint, |s| {
            s.calls += 1;
            let outcome = if s.failures_left > 0 {
                s.failures_left -= 1;
                Err(s.failure.clone().unwrap_or(SourceError::Timeout))
            } else {
                match (&s.body, &s.failure) {
                    (Some(body), _) => Ok(body.clone()),
                    (None, Some(failure)) => Err(failure.clone()),
                    (None, None) => Err(SourceError::Network(format!("no route to {endpoint}"))),
                }
            };
            (s.delay, outcome)
        });

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
