//! # ivimon-adb - Device Transport and Logcat Streaming
//!
//! Everything that touches the `adb` binary: device discovery, one-shot
//! maintenance commands, the streaming logcat child process, and the
//! threadtime line parser.
//!
//! Depends on [`ivimon_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Device Discovery
//! - [`Device`] - Connected device as listed by `adb devices -l`
//! - [`list_devices()`] - Discover connected devices
//! - [`resolve_device()`] - Pick the device a session should attach to
//!
//! ### One-shot Commands
//! - [`clear_log_buffer()`] - Flush the device-side log buffer (`logcat -c`)
//! - [`set_log_buffer_size()`] - Resize the device-side buffer (`logcat -G`)
//!
//! ### Streaming
//! - [`LogcatProcess`] - Spawn and manage the `logcat -v threadtime` child
//! - [`StreamEvent`] - Raw stdout/stderr/exit output of the child
//! - [`logcat_command()`] - Build the streaming command line
//!
//! ### Line Parsing
//! - [`LineParser`] - Stateful threadtime parser with year tracking
//! - [`parse_line()`] - Parse a single line against a fixed reference year

pub mod devices;
pub mod parser;
pub mod process;
pub mod transport;

// Public API re-exports
pub use devices::{
    list_devices, list_devices_with_timeout, parse_devices_output, resolve_device, Device,
    DeviceDiscoveryResult, DeviceState, DEVICE_DISCOVERY_TIMEOUT,
};
pub use parser::{parse_line, LineParser};
pub use process::{
    logcat_command, LogcatProcess, StreamEvent, GRACEFUL_STOP_TIMEOUT, STREAM_CHANNEL_CAPACITY,
};
pub use transport::{clear_log_buffer, set_log_buffer_size, CLEAR_TIMEOUT};
