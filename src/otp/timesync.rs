//! Trusted-time fetch and clock-drift correction.
//!
//! A `TimeSource` hands back the raw `Date` header of a trusted server;
//! `TimeCorrector` turns it into a persisted signed offset against the
//! local clock and supplies corrected "now" readings. An unsynchronized
//! clock reads as raw local time and is observable through
//! `has_synchronized`; failures are surfaced, never retried here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::otp::dateparse;
use crate::otp::store::ClockOffsetStore;
use crate::otp::types::{TotpError, TotpErrorKind};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Clocks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Local-time provider, injectable for tests.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Wall-clock backed by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Time source
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default endpoint queried for a trusted `Date` header.
pub const DEFAULT_TIME_URL: &str = "http://www.google.com";

/// Transport timeouts; a hung connection must not stall a sync forever.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Supplier of a trusted raw date string.
#[async_trait]
pub trait TimeSource: Send + Sync {
    /// Fetch the server's `Date` header verbatim.
    async fn fetch_date_header(&self) -> Result<String, TotpError>;
}

/// `TimeSource` issuing a HEAD request and reading the `Date` response
/// header. Redirects are not followed; the first hop's clock is the one
/// we trust.
pub struct HttpTimeSource {
    client: reqwest::Client,
    url: String,
}

impl HttpTimeSource {
    pub fn new() -> Result<Self, TotpError> {
        Self::with_url(DEFAULT_TIME_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, TotpError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| {
                TotpError::new(TotpErrorKind::Network, "Cannot build HTTP client")
                    .with_detail(e.to_string())
            })?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl TimeSource for HttpTimeSource {
    async fn fetch_date_header(&self) -> Result<String, TotpError> {
        let response = self.client.head(&self.url).send().await.map_err(|e| {
            log::warn!("Time fetch from {} failed: {}", self.url, e);
            TotpError::new(TotpErrorKind::Network, "Time server unreachable")
                .with_detail(e.to_string())
        })?;
        let header = response
            .headers()
            .get(reqwest::header::DATE)
            .ok_or_else(|| {
                TotpError::new(TotpErrorKind::MissingDateHeader, "Response has no Date header")
            })?;
        header
            .to_str()
            .map(str::to_owned)
            .map_err(|e| {
                TotpError::new(TotpErrorKind::MissingDateHeader, "Date header is not text")
                    .with_detail(e.to_string())
            })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Corrector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Computes and applies the trusted-vs-local clock offset.
pub struct TimeCorrector {
    store: Arc<ClockOffsetStore>,
}

impl TimeCorrector {
    pub fn new(store: Arc<ClockOffsetStore>) -> Self {
        Self { store }
    }

    /// Fetch trusted time, compute `trusted − local` and persist it.
    ///
    /// Transport and parse failures propagate untouched; retry policy
    /// belongs to the caller. Returns the stored offset.
    pub async fn synchronize(
        &self,
        source: &dyn TimeSource,
        clock: &dyn Clock,
    ) -> Result<i64, TotpError> {
        let raw = source.fetch_date_header().await?;
        let trusted = dateparse::parse_http_date(&raw)?;
        let offset = trusted - clock.now_millis();
        self.store.set(offset)?;
        log::debug!("Clock offset synchronized: {} ms", offset);
        Ok(offset)
    }

    /// Local time corrected by the stored offset.
    ///
    /// Before the first successful sync this equals raw local time;
    /// callers can tell the two trust levels apart via
    /// [`has_synchronized`](Self::has_synchronized).
    pub fn corrected_now(&self, clock: &dyn Clock) -> Result<i64, TotpError> {
        Ok(clock.now_millis() + self.store.get()?.unwrap_or(0))
    }

    /// Whether a successful synchronization has ever happened.
    pub fn has_synchronized(&self) -> Result<bool, TotpError> {
        self.store.has_offset()
    }
}

/// `Clock` view over a corrector, for components that only want "now".
///
/// A storage failure falls back to the raw local clock so that reading
/// time stays infallible; the failure is logged.
pub struct CorrectedClock {
    corrector: Arc<TimeCorrector>,
    local: Arc<dyn Clock>,
}

impl CorrectedClock {
    pub fn new(corrector: Arc<TimeCorrector>, local: Arc<dyn Clock>) -> Self {
        Self { corrector, local }
    }
}

impl Clock for CorrectedClock {
    fn now_millis(&self) -> i64 {
        match self.corrector.corrected_now(&*self.local) {
            Ok(now) => now,
            Err(e) => {
                log::warn!("Offset read failed, using raw local time: {}", e);
                self.local.now_millis()
            }
        }
    }
}
