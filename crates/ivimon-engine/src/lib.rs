//! # ivimon-engine - Ingestion Pipeline and Session Lifecycle
//!
//! Drives a logcat stream end to end: the [`worker::IngestWorker`] pulls raw
//! lines from a spawned process, scans them for crash markers, archives them,
//! parses and filters them into the live buffer, and reports everything as
//! [`ivimon_core::MonitorEvent`]s. The [`controller::SessionController`] owns
//! the lifecycle around it.
//!
//! ## Public API
//!
//! ### Sessions
//! - [`SessionController`] - start/stop sessions, apply filters, take snapshots
//! - [`ControlMsg`], [`IngestWorker`], [`WorkerParams`] - the worker seam
//!
//! ### Archival
//! - [`ArchiveWriter`] - size-rotated raw line archive
//! - [`Rotation`], [`DEFAULT_ROTATE_MB`]
//!
//! ### Configuration
//! - [`Settings`] - `~/.config/ivimon/config.toml`, load/save with defaults

pub mod archive;
pub mod config;
pub mod controller;
pub mod worker;

pub use archive::{ArchiveWriter, Rotation, DEFAULT_ROTATE_MB};
pub use config::{ArchiveSettings, LiveViewSettings, LogcatSettings, Settings};
pub use controller::SessionController;
pub use worker::{ControlMsg, IngestWorker, WorkerParams};
