//! # ivimon-core - Core Domain Types
//!
//! Foundation crate for the IVI logcat monitor. Provides the record and
//! filter vocabulary, anomaly scanning, session state types, error
//! handling, and logging bootstrap.
//!
//! This crate has **zero internal dependencies** -- it only depends on
//! external crates (serde, chrono, thiserror, regex, tracing).
//!
//! ## Public API
//!
//! ### Records (`record`)
//! - [`LogRecord`] - One parsed logcat line (timestamp, level, pid, tid, tag, message)
//! - [`LogLevel`] - Severity with logcat letter codes and ordinal comparison
//!
//! ### Filtering (`filter`)
//! - [`FilterCriteria`] - Level floor, pid/tid allowlist, tag/message regexes
//!
//! ### Live View (`buffer`)
//! - [`RingBuffer`] - Fixed-capacity FIFO with eviction on push
//!
//! ### Anomalies (`anomaly`)
//! - [`AnomalyKind`] - Crash vs ANR classification
//! - [`scan()`] - Marker scan over a raw line
//!
//! ### Sessions (`session`)
//! - [`SessionPhase`] - Idle / Starting / Running / Stopping
//! - [`SessionCounters`], [`SessionSnapshot`] - Session totals and point-in-time state
//!
//! ### Events (`events`)
//! - [`MonitorEvent`] - Side-channel events, NDJSON-serializable
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use ivimon_core::prelude::*;
//! ```

pub mod anomaly;
pub mod buffer;
pub mod error;
pub mod events;
pub mod filter;
pub mod logging;
pub mod record;
pub mod session;

/// Prelude for common imports used throughout all monitor crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use anomaly::{scan, AnomalyKind, ANOMALY_MARKERS};
pub use buffer::{RingBuffer, DEFAULT_LIVE_CAPACITY};
pub use error::{Error, Result, ResultExt};
pub use events::MonitorEvent;
pub use filter::FilterCriteria;
pub use record::{LogLevel, LogRecord, UNPARSED_PID};
pub use session::{SessionCounters, SessionPhase, SessionSnapshot};
