//! OTP crate: sub-modules.

pub mod types;
pub mod codec;
pub mod core;
pub mod dateparse;
pub mod store;
pub mod timesync;
pub mod scheduler;
pub mod service;

// Re-export top-level items for convenience.
pub use types::*;
pub use scheduler::{CodeScheduler, CodeSink, InlineUiExecutor, UiExecutor};
pub use service::TotpAuthenticator;
pub use store::{ClockOffsetStore, FileOffsetBackend, MemoryOffsetBackend, OffsetBackend};
pub use timesync::{Clock, CorrectedClock, HttpTimeSource, SystemClock, TimeCorrector, TimeSource};
