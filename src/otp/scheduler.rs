//! Recurring code delivery — one fresh code per time step.
//!
//! The scheduler drives the engine at each step boundary and hands the
//! result to a listener twice: synchronously on the scheduler's own
//! task, and marshalled through a host-supplied UI executor. The timer
//! re-arms with a freshly computed remaining time after every firing,
//! and each firing re-reads the corrected clock, so neither scheduling
//! jitter nor a clock correction between firings accumulates drift.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::otp::core;
use crate::otp::timesync::Clock;
use crate::otp::types::{GeneratedCode, TotpConfig, TotpError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Listener contracts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Receiver of newly computed codes.
///
/// Both callbacks carry the same values for the same firing;
/// `on_token_changed` runs on the scheduler's execution context,
/// `on_token_changed_ui` is marshalled through the [`UiExecutor`].
pub trait CodeSink: Send + Sync + 'static {
    fn on_token_changed(&self, code: &str, remaining_millis: i64);
    fn on_token_changed_ui(&self, code: &str, remaining_millis: i64);
}

/// Capability to run a job on the host's UI-equivalent context.
pub trait UiExecutor: Send + Sync + 'static {
    fn execute(&self, job: Box<dyn FnOnce() + Send>);
}

/// Runs UI jobs inline on the calling thread. Hosts with a real main
/// thread inject their own dispatcher instead.
#[derive(Debug, Default)]
pub struct InlineUiExecutor;

impl UiExecutor for InlineUiExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  One-shot delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the code for "now" and deliver it through both callbacks.
pub fn deliver_once(
    secret: &str,
    config: &TotpConfig,
    clock: &dyn Clock,
    sink: &Arc<dyn CodeSink>,
    ui: &Arc<dyn UiExecutor>,
) -> Result<(), TotpError> {
    let generated = core::compute_code(secret, clock.now_millis(), config)?;
    deliver(sink, ui, &generated);
    Ok(())
}

fn deliver(sink: &Arc<dyn CodeSink>, ui: &Arc<dyn UiExecutor>, generated: &GeneratedCode) {
    sink.on_token_changed(&generated.code, generated.remaining_millis);
    let sink = Arc::clone(sink);
    let code = generated.code.clone();
    let remaining = generated.remaining_millis;
    ui.execute(Box::new(move || sink.on_token_changed_ui(&code, remaining)));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Recurring code generator. At most one schedule is active per
/// instance; `start` atomically replaces any running one.
#[derive(Default)]
pub struct CodeScheduler {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CodeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin delivering codes: one immediately, then one at every step
    /// boundary of the supplied clock.
    ///
    /// Any prior schedule on this instance is cancelled first, so
    /// calling `start` twice never leaves two timers driving the same
    /// listener. Must be called within a tokio runtime. If computing a
    /// code fails (for example a malformed secret), the failure is
    /// logged and the schedule ends.
    pub fn start(
        &self,
        secret: impl Into<String>,
        config: TotpConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn CodeSink>,
        ui: Arc<dyn UiExecutor>,
    ) {
        let secret = secret.into();
        let handle = tokio::spawn(async move {
            loop {
                let now = clock.now_millis();
                match core::compute_code(&secret, now, &config) {
                    Ok(generated) => {
                        let sleep_millis = generated.remaining_millis.max(1) as u64;
                        deliver(&sink, &ui, &generated);
                        tokio::time::sleep(Duration::from_millis(sleep_millis)).await;
                    }
                    Err(e) => {
                        log::error!("Stopping code schedule: {}", e);
                        break;
                    }
                }
            }
        });

        // Cancel-then-replace under one lock.
        let mut task = self.lock();
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the running schedule; a no-op when none is active.
    pub fn stop(&self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
    }

    /// Whether a schedule is currently armed.
    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for CodeScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
