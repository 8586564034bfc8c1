//! High-level orchestrator — owns the configuration, the corrector and
//! the scheduler, and exposes the surface a host application calls.

use std::sync::Arc;

use crate::otp::core;
use crate::otp::scheduler::{self, CodeScheduler, CodeSink, InlineUiExecutor, UiExecutor};
use crate::otp::store::ClockOffsetStore;
use crate::otp::timesync::{Clock, CorrectedClock, SystemClock, TimeCorrector, TimeSource};
use crate::otp::types::{GeneratedCode, TotpConfig, TotpError};

/// Central TOTP authenticator.
///
/// Every code computation and validation goes through the corrected
/// clock, so a synchronized device produces the same codes a
/// server-side verifier would even when the local clock is off.
pub struct TotpAuthenticator {
    config: TotpConfig,
    scheduler: CodeScheduler,
    corrector: Arc<TimeCorrector>,
    local_clock: Arc<dyn Clock>,
    ui: Arc<dyn UiExecutor>,
}

impl std::fmt::Debug for TotpAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpAuthenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TotpAuthenticator {
    /// Create an authenticator over the given offset store. Fails when
    /// the configuration violates its invariants.
    pub fn new(config: TotpConfig, store: Arc<ClockOffsetStore>) -> Result<Self, TotpError> {
        config.validate()?;
        Ok(Self {
            config,
            scheduler: CodeScheduler::new(),
            corrector: Arc::new(TimeCorrector::new(store)),
            local_clock: Arc::new(SystemClock),
            ui: Arc::new(InlineUiExecutor),
        })
    }

    /// Builder: replace the local clock (tests, embedded hosts).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.local_clock = clock;
        self
    }

    /// Builder: install the host's UI-thread dispatcher.
    pub fn with_ui_executor(mut self, ui: Arc<dyn UiExecutor>) -> Self {
        self.ui = ui;
        self
    }

    /// The immutable configuration this instance was built with.
    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Codes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Compute the code valid right now (corrected time).
    pub fn current_code(&self, secret: &str) -> Result<GeneratedCode, TotpError> {
        let now = self.corrector.corrected_now(&*self.local_clock)?;
        core::compute_code(secret, now, &self.config)
    }

    /// Validate a presented code at corrected "now" using the
    /// configured window size.
    pub fn validate(&self, secret: &str, presented: &str) -> Result<bool, TotpError> {
        let now = self.corrector.corrected_now(&*self.local_clock)?;
        core::validate_code(secret, presented, now, self.config.window_size, &self.config)
    }

    /// Compute the current code once and deliver it to the listener.
    pub fn deliver_current(&self, secret: &str, sink: &Arc<dyn CodeSink>) -> Result<(), TotpError> {
        let clock = self.corrected_clock();
        scheduler::deliver_once(secret, &self.config, &*clock, sink, &self.ui)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Code stream
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Start delivering a fresh code at every step boundary. Replaces
    /// any stream already running on this instance.
    pub fn start_code_stream(&self, secret: impl Into<String>, sink: Arc<dyn CodeSink>) {
        self.scheduler.start(
            secret,
            self.config.clone(),
            self.corrected_clock(),
            sink,
            Arc::clone(&self.ui),
        );
    }

    /// Stop the running code stream, if any.
    pub fn stop_code_stream(&self) {
        self.scheduler.stop();
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Time correction
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Synchronize against a trusted time source and persist the
    /// resulting offset. Returns the offset in milliseconds.
    pub async fn synchronize_time(&self, source: &dyn TimeSource) -> Result<i64, TotpError> {
        self.corrector.synchronize(source, &*self.local_clock).await
    }

    /// Corrected "now" in epoch milliseconds.
    pub fn corrected_now(&self) -> Result<i64, TotpError> {
        self.corrector.corrected_now(&*self.local_clock)
    }

    /// Whether any successful time synchronization has happened.
    pub fn has_synchronized(&self) -> Result<bool, TotpError> {
        self.corrector.has_synchronized()
    }

    fn corrected_clock(&self) -> Arc<dyn Clock> {
        Arc::new(CorrectedClock::new(
            Arc::clone(&self.corrector),
            Arc::clone(&self.local_clock),
        ))
    }
}
