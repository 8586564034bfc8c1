//! # totp-drift – TOTP engine with clock-drift correction
//!
//! Time-based one-time passwords that stay correct on devices with an
//! inaccurate clock:
//!
//! - **RFC 4226 / 6238** – TOTP generation with SHA-1, SHA-256, SHA-512
//! - **Drift-window validation** – configurable adjacent-step tolerance
//! - **Trusted-time sync** – HEAD request to a configurable endpoint,
//!   `Date` header parsed under the RFC 1036 / RFC 1123 / asctime grammars
//! - **Persisted clock offset** – read-through cached, pluggable backend
//! - **Recurring delivery** – one fresh code per time step, with a
//!   scheduler-context callback and a UI-marshalled callback
//!
//! The engine and parser are pure and thread-safe; scheduling and the
//! network fetch run on tokio.

pub mod otp;
