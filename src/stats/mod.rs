//! System statistics: the allow-listed stat methods and the collaborator trait
//! that produces their display strings.

#![allow(missing_docs)]

pub mod linux;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{PanelError, Result};

pub use linux::LinuxStats;

/// Fixed allow-list of statistics a menu item or dashboard line may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatMethod {
    Ip,
    Hostname,
    CpuTemp,
    CpuUsage,
    CpuLoad,
    MemoryUsage,
    MemoryInfo,
    DiskUsage,
    DiskInfo,
    Uptime,
    OsInfo,
    Kernel,
    CheckInternet,
}

impl StatMethod {
    pub const ALL: [Self; 13] = [
        Self::Ip,
        Self::Hostname,
        Self::CpuTemp,
        Self::CpuUsage,
        Self::CpuLoad,
        Self::MemoryUsage,
        Self::MemoryInfo,
        Self::DiskUsage,
        Self::DiskInfo,
        Self::Uptime,
        Self::OsInfo,
        Self::Kernel,
        Self::CheckInternet,
    ];

    /// Bare stat name, e.g. `cpu_temp`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Hostname => "hostname",
            Self::CpuTemp => "cpu_temp",
            Self::CpuUsage => "cpu_usage",
            Self::CpuLoad => "cpu_load",
            Self::MemoryUsage => "memory_usage",
            Self::MemoryInfo => "memory_info",
            Self::DiskUsage => "disk_usage",
            Self::DiskInfo => "disk_info",
            Self::Uptime => "uptime",
            Self::OsInfo => "os_info",
            Self::Kernel => "kernel",
            Self::CheckInternet => "check_internet",
        }
    }

    /// Getter spelling used in configuration files, e.g. `get_cpu_temp`.
    #[must_use]
    pub fn getter_name(self) -> String {
        match self {
            Self::CheckInternet => self.name().to_string(),
            other => format!("get_{}", other.name()),
        }
    }

    /// Look up a method by either its getter spelling or its bare name.
    #[must_use]
    pub fn from_name(raw: &str) -> Option<Self> {
        let bare = raw.strip_prefix("get_").unwrap_or(raw);
        Self::ALL.into_iter().find(|method| method.name() == bare)
    }

    /// Text shown when the lookup fails.
    #[must_use]
    pub const fn fallback_text(self) -> &'static str {
        match self {
            Self::Ip => "No IP",
            Self::OsInfo => "Linux",
            Self::CheckInternet => "Offline",
            _ => "N/A",
        }
    }
}

impl fmt::Display for StatMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StatMethod {
    type Err = PanelError;

    fn from_str(raw: &str) -> Result<Self> {
        Self::from_name(raw.trim()).ok_or_else(|| PanelError::UnknownStatMethod {
            name: raw.to_string(),
        })
    }
}

/// Source of stat strings. Implementations must be cheap enough to call from
/// the control loop; slow probes carry their own short timeouts.
pub trait StatsSource: Send + Sync {
    fn stat(&self, method: StatMethod) -> Result<String>;
}

/// In-memory stats for deterministic tests and the `--terminal` demo.
#[derive(Debug, Default)]
pub struct StaticStats {
    values: Mutex<HashMap<StatMethod, String>>,
    calls: Mutex<Vec<StatMethod>>,
}

impl StaticStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(self, method: StatMethod, value: impl Into<String>) -> Self {
        self.set(method, value);
        self
    }

    pub fn set(&self, method: StatMethod, value: impl Into<String>) {
        self.values.lock().insert(method, value.into());
    }

    /// Every method requested so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<StatMethod> {
        self.calls.lock().clone()
    }
}

impl StatsSource for StaticStats {
    fn stat(&self, method: StatMethod) -> Result<String> {
        self.calls.lock().push(method);
        self.values
            .lock()
            .get(&method)
            .cloned()
            .ok_or_else(|| PanelError::StatUnavailable {
                stat: method.name(),
                details: "no value configured".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getter_and_bare_spellings_resolve_to_the_same_method() {
        for method in StatMethod::ALL {
            assert_eq!(StatMethod::from_name(method.name()), Some(method));
            assert_eq!(StatMethod::from_name(&method.getter_name()), Some(method));
        }
    }

    #[test]
    fn check_internet_getter_has_no_get_prefix() {
        assert_eq!(StatMethod::CheckInternet.getter_name(), "check_internet");
        assert_eq!(StatMethod::CpuTemp.getter_name(), "get_cpu_temp");
    }

    #[test]
    fn unknown_names_are_rejected() {
        for raw in ["", "get_", "secrets", "get_secrets", "__init__", "get_get_ip"] {
            assert!(StatMethod::from_name(raw).is_none(), "{raw:?} must not resolve");
        }
        let err = "rm_rf".parse::<StatMethod>().unwrap_err();
        assert_eq!(err.code(), "LCD-2001");
    }

    #[test]
    fn static_stats_records_calls_and_reports_missing_values() {
        let stats = StaticStats::new().with(StatMethod::Hostname, "pi");
        assert_eq!(stats.stat(StatMethod::Hostname).unwrap(), "pi");
        let err = stats.stat(StatMethod::Ip).unwrap_err();
        assert_eq!(err.code(), "LCD-2004");
        assert_eq!(stats.calls(), vec![StatMethod::Hostname, StatMethod::Ip]);
    }

    #[test]
    fn serde_uses_bare_names() {
        let json = serde_json::to_string(&StatMethod::CpuTemp).unwrap();
        assert_eq!(json, "\"cpu_temp\"");
    }
}
