//! Linux stats source backed by `/proc`, `/sys`, `statvfs` and sockets.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fs;
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::errors::{PanelError, Result};

use super::{StatMethod, StatsSource};

const PROBE_ADDR: &str = "1.1.1.1:53";
const INTERNET_TIMEOUT: Duration = Duration::from_secs(2);
const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Memory totals parsed from `/proc/meminfo`, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Filesystem totals for one mount, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// Filesystem locations read by [`LinuxStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatPaths {
    pub proc_root: PathBuf,
    pub thermal_zone: PathBuf,
    pub os_release: PathBuf,
    pub disk_mount: PathBuf,
}

impl Default for StatPaths {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            thermal_zone: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            os_release: PathBuf::from("/etc/os-release"),
            disk_mount: PathBuf::from("/"),
        }
    }
}

/// Production [`StatsSource`].
#[derive(Debug, Clone, Default)]
pub struct LinuxStats {
    paths: StatPaths,
}

impl LinuxStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_paths(paths: StatPaths) -> Self {
        Self { paths }
    }

    fn proc_file(&self, name: &str) -> Result<String> {
        read(&self.paths.proc_root.join(name))
    }

    fn memory_info(&self) -> Result<MemoryInfo> {
        parse_meminfo(&self.proc_file("meminfo")?)
    }

    fn load_average(&self) -> Result<f64> {
        parse_loadavg(&self.proc_file("loadavg")?)
    }

    #[cfg(unix)]
    fn disk_space(&self) -> Result<DiskSpace> {
        let path = &self.paths.disk_mount;
        let stat = nix::sys::statvfs::statvfs(path).map_err(|error| PanelError::StatUnavailable {
            stat: "disk",
            details: format!("statvfs {}: {error}", path.display()),
        })?;
        let fragment = u64::from(stat.fragment_size());
        Ok(DiskSpace {
            total_bytes: u64::from(stat.blocks()).saturating_mul(fragment),
            free_bytes: u64::from(stat.blocks_free()).saturating_mul(fragment),
        })
    }

    #[cfg(not(unix))]
    fn disk_space(&self) -> Result<DiskSpace> {
        Err(PanelError::StatUnavailable {
            stat: "disk",
            details: "statvfs is only available on unix".to_string(),
        })
    }
}

impl StatsSource for LinuxStats {
    fn stat(&self, method: StatMethod) -> Result<String> {
        match method {
            StatMethod::Ip => local_ip(),
            StatMethod::Hostname => hostname(),
            StatMethod::CpuTemp => format_cpu_temp(&read(&self.paths.thermal_zone)?),
            StatMethod::CpuUsage => {
                let cpus = std::thread::available_parallelism().map_or(1, usize::from);
                Ok(format_cpu_usage(self.load_average()?, cpus))
            }
            StatMethod::CpuLoad => Ok(format!("{:.2}", self.load_average()?)),
            StatMethod::MemoryUsage => format_memory_usage(self.memory_info()?),
            StatMethod::MemoryInfo => Ok(format_memory_info(self.memory_info()?)),
            StatMethod::DiskUsage => format_disk_usage(self.disk_space()?),
            StatMethod::DiskInfo => Ok(format_disk_info(self.disk_space()?)),
            StatMethod::Uptime => Ok(format_uptime(parse_uptime(&self.proc_file("uptime")?)?)),
            StatMethod::OsInfo => parse_os_release(&read(&self.paths.os_release)?),
            StatMethod::Kernel => parse_kernel_version(&self.proc_file("version")?),
            StatMethod::CheckInternet => Ok(check_internet()),
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| PanelError::io(path, source))
}

fn unavailable(stat: &'static str, details: impl Into<String>) -> PanelError {
    PanelError::StatUnavailable {
        stat,
        details: details.into(),
    }
}

// ──────────────────── network ────────────────────

/// Address of the interface that routes to the public internet. No packet is
/// sent; connecting a UDP socket only selects the route.
fn local_ip() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| unavailable("ip", e.to_string()))?;
    socket
        .connect("1.1.1.1:1")
        .map_err(|e| unavailable("ip", e.to_string()))?;
    let addr = socket
        .local_addr()
        .map_err(|e| unavailable("ip", e.to_string()))?;
    if addr.ip().is_unspecified() {
        return Err(unavailable("ip", "no routable interface"));
    }
    Ok(addr.ip().to_string())
}

fn check_internet() -> String {
    let Ok(addr) = PROBE_ADDR.parse::<SocketAddr>() else {
        return "Offline".to_string();
    };
    match TcpStream::connect_timeout(&addr, INTERNET_TIMEOUT) {
        Ok(_) => "Online".to_string(),
        Err(_) => "Offline".to_string(),
    }
}

#[cfg(unix)]
fn hostname() -> Result<String> {
    let name = nix::unistd::gethostname().map_err(|e| unavailable("hostname", e.to_string()))?;
    Ok(name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn hostname() -> Result<String> {
    std::env::var("COMPUTERNAME").map_err(|e| unavailable("hostname", e.to_string()))
}

// ──────────────────── parsers ────────────────────

fn format_cpu_temp(raw: &str) -> Result<String> {
    let millidegrees = raw
        .trim()
        .parse::<i64>()
        .map_err(|e| unavailable("cpu_temp", format!("{raw:?}: {e}")))?;
    #[allow(clippy::cast_precision_loss)]
    let celsius = millidegrees as f64 / 1000.0;
    Ok(format!("{celsius:.1}C"))
}

/// First field of `/proc/loadavg`.
pub fn parse_loadavg(raw: &str) -> Result<f64> {
    raw.split_whitespace()
        .next()
        .and_then(|field| field.parse::<f64>().ok())
        .ok_or_else(|| unavailable("cpu_load", format!("malformed loadavg: {raw:?}")))
}

/// One-minute load as a percentage of available CPUs, capped at 100.
#[must_use]
pub fn format_cpu_usage(load1: f64, cpus: usize) -> String {
    #[allow(clippy::cast_precision_loss)]
    let pct = (load1 / cpus.max(1) as f64 * 100.0).min(100.0);
    format!("{pct:.1}%")
}

/// Parse `/proc/meminfo`; values are reported in kB and returned in bytes.
pub fn parse_meminfo(raw: &str) -> Result<MemoryInfo> {
    let mut values = HashMap::<&str, u64>::new();

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((key, rest)) = line.split_once(':') else {
            return Err(unavailable(
                "memory",
                format!("invalid meminfo line (missing ':'): {line}"),
            ));
        };
        let mut parts = rest.split_whitespace();
        let Some(value) = parts.next().and_then(|v| v.parse::<u64>().ok()) else {
            return Err(unavailable(
                "memory",
                format!("invalid meminfo value in line: {line}"),
            ));
        };
        let bytes = match parts.next() {
            None => value,
            Some("kB") => value.saturating_mul(1024),
            Some(unit) => {
                return Err(unavailable(
                    "memory",
                    format!("unsupported meminfo unit in line {line:?}: {unit}"),
                ));
            }
        };
        values.insert(key.trim(), bytes);
    }

    let required = |key: &str| {
        values
            .get(key)
            .copied()
            .ok_or_else(|| unavailable("memory", format!("missing meminfo field: {key}")))
    };

    Ok(MemoryInfo {
        total_bytes: required("MemTotal")?,
        available_bytes: required("MemAvailable")?,
    })
}

fn format_memory_usage(info: MemoryInfo) -> Result<String> {
    if info.total_bytes == 0 {
        return Err(unavailable("memory_usage", "MemTotal is zero"));
    }
    let used = info.total_bytes.saturating_sub(info.available_bytes);
    #[allow(clippy::cast_precision_loss)]
    let pct = used as f64 * 100.0 / info.total_bytes as f64;
    Ok(format!("{pct:.1}%"))
}

fn format_memory_info(info: MemoryInfo) -> String {
    let used = info.total_bytes.saturating_sub(info.available_bytes);
    format!(
        "{}/{}MB",
        used / BYTES_PER_MB,
        info.total_bytes / BYTES_PER_MB
    )
}

fn format_disk_usage(space: DiskSpace) -> Result<String> {
    if space.total_bytes == 0 {
        return Err(unavailable("disk_usage", "filesystem reports zero size"));
    }
    let used = space.total_bytes.saturating_sub(space.free_bytes);
    #[allow(clippy::cast_precision_loss)]
    let pct = used as f64 * 100.0 / space.total_bytes as f64;
    Ok(format!("{pct:.1}%"))
}

fn format_disk_info(space: DiskSpace) -> String {
    let used = space.total_bytes.saturating_sub(space.free_bytes);
    #[allow(clippy::cast_precision_loss)]
    let (used_gb, total_gb) = (
        used as f64 / BYTES_PER_GB,
        space.total_bytes as f64 / BYTES_PER_GB,
    );
    format!("{used_gb:.1}/{total_gb:.1}GB")
}

/// Whole seconds since boot from `/proc/uptime`.
pub fn parse_uptime(raw: &str) -> Result<u64> {
    let secs = raw
        .split_whitespace()
        .next()
        .and_then(|field| field.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .ok_or_else(|| unavailable("uptime", format!("malformed uptime: {raw:?}")))?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(secs as u64)
}

/// `Xd Yh`, `Xh Ym` or `Xm`, whichever is the largest unit that applies.
#[must_use]
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// `PRETTY_NAME` from os-release, with the Raspberry Pi prefix shortened.
pub fn parse_os_release(raw: &str) -> Result<String> {
    raw.lines()
        .filter_map(|line| line.trim().strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches('"'))
        .find(|value| !value.is_empty())
        .map(|value| value.replace("Raspberry Pi OS", "Pi OS"))
        .ok_or_else(|| unavailable("os_info", "PRETTY_NAME not found"))
}

/// Release string from `/proc/version` (`Linux version <release> ...`).
pub fn parse_kernel_version(raw: &str) -> Result<String> {
    raw.strip_prefix("Linux version ")
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .ok_or_else(|| unavailable("kernel", format!("unexpected /proc/version: {raw:?}")))
}
