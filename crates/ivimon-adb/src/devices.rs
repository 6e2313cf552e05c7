//! Connected device discovery via `adb devices -l`

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;

use ivimon_core::prelude::*;

/// Default timeout for device discovery
pub const DEVICE_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection state reported by adb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// Connected and ready for commands
    Device,
    Offline,
    Unauthorized,
    Recovery,
    Sideload,
    Unknown,
}

impl DeviceState {
    fn parse(s: &str) -> Self {
        match s {
            "device" => DeviceState::Device,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            "recovery" => DeviceState::Recovery,
            "sideload" => DeviceState::Sideload,
            _ => DeviceState::Unknown,
        }
    }

    /// Whether the device can accept a logcat session
    pub fn is_ready(&self) -> bool {
        matches!(self, DeviceState::Device)
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            DeviceState::Device => "device",
            DeviceState::Offline => "offline",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::Recovery => "recovery",
            DeviceState::Sideload => "sideload",
            DeviceState::Unknown => "unknown",
        })
    }
}

/// One row of `adb devices -l`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub serial: String,
    pub state: DeviceState,
    /// `model:` property; adb encodes spaces as underscores
    pub model: Option<String>,
    pub product: Option<String>,
    pub transport_id: Option<u32>,
}

impl Device {
    /// Human-readable name: model plus serial when the model is known
    pub fn display_name(&self) -> String {
        match &self.model {
            Some(model) => format!("{} ({})", model.replace('_', " "), self.serial),
            None => self.serial.clone(),
        }
    }

    /// Match against a user-supplied specifier: exact serial first, then a
    /// case-insensitive substring of the model
    pub fn matches(&self, specifier: &str) -> bool {
        if self.serial == specifier {
            return true;
        }
        if let Some(model) = &self.model {
            return model
                .to_lowercase()
                .contains(&specifier.to_lowercase().replace(' ', "_"));
        }
        false
    }

    pub fn is_emulator(&self) -> bool {
        self.serial.starts_with("emulator-")
    }
}

/// Result of device discovery with optional warning
#[derive(Debug, Clone)]
pub struct DeviceDiscoveryResult {
    pub devices: Vec<Device>,
    /// Set when adb exited nonzero but still produced usable output
    pub warning: Option<String>,
    pub elapsed: Duration,
}

/// List connected devices with the default timeout
pub async fn list_devices(adb_path: &str) -> Result<DeviceDiscoveryResult> {
    list_devices_with_timeout(adb_path, DEVICE_DISCOVERY_TIMEOUT).await
}

/// List connected devices with a custom timeout
pub async fn list_devices_with_timeout(
    adb_path: &str,
    duration: Duration,
) -> Result<DeviceDiscoveryResult> {
    let start = Instant::now();

    let (devices, warning) = timeout(duration, run_adb_devices(adb_path))
        .await
        .map_err(|_| Error::process("Device discovery timed out"))??;

    let elapsed = start.elapsed();
    debug!(
        "adb devices found {} device(s) in {:?}",
        devices.len(),
        elapsed
    );

    Ok(DeviceDiscoveryResult {
        devices,
        warning,
        elapsed,
    })
}

async fn run_adb_devices(adb_path: &str) -> Result<(Vec<Device>, Option<String>)> {
    let output = Command::new(adb_path)
        .args(["devices", "-l"])
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::adb_not_found(adb_path),
            _ => Error::process(format!("Failed to run adb: {}", e)),
        })?;

    // adb can exit nonzero while still listing devices (e.g. server
    // restart chatter). Treat that as a warning, not a failure.
    let warning = if output.status.success() {
        None
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = format!(
            "adb devices exited with {}: {}",
            output.status,
            stderr.trim()
        );
        warn!("{}", message);
        Some(message)
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok((parse_devices_output(&stdout), warning))
}

/// Parse the output of `adb devices -l`
///
/// Skips the header line, blank lines, and `* daemon ...` server banners.
pub fn parse_devices_output(output: &str) -> Vec<Device> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("List of devices"))
        .filter(|line| !line.starts_with('*'))
        .filter_map(parse_device_line)
        .collect()
}

fn parse_device_line(line: &str) -> Option<Device> {
    let mut parts = line.split_whitespace();
    let serial = parts.next()?.to_string();
    let state = DeviceState::parse(parts.next()?);

    let mut model = None;
    let mut product = None;
    let mut transport_id = None;
    for prop in parts {
        if let Some((key, value)) = prop.split_once(':') {
            match key {
                "model" => model = Some(value.to_string()),
                "product" => product = Some(value.to_string()),
                "transport_id" => transport_id = value.parse().ok(),
                _ => {}
            }
        }
    }

    Some(Device {
        serial,
        state,
        model,
        product,
        transport_id,
    })
}

/// Pick the device a session should attach to
///
/// With a specifier: the first matching device, in any state (attaching to
/// an offline device fails later with adb's own message). Without one: the
/// single ready device, or an error naming the choices.
pub fn resolve_device(devices: &[Device], specifier: Option<&str>) -> Result<Device> {
    if let Some(spec) = specifier {
        return devices
            .iter()
            .find(|d| d.matches(spec))
            .cloned()
            .ok_or_else(|| Error::device_not_found(spec));
    }

    let ready: Vec<&Device> = devices.iter().filter(|d| d.state.is_ready()).collect();
    match ready.as_slice() {
        [] => Err(Error::NoDevices),
        [single] => Ok((*single).clone()),
        many => Err(Error::MultipleDevices {
            serials: many.iter().map(|d| d.serial.clone()).collect(),
        }),
    }
}
