//! Configuration system: YAML (or TOML) file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{PanelError, Result};
use crate::menu::resolver::{ResolvedAction, resolve};
use crate::menu::tree::MenuTree;

/// Upper bound for every timing setting. Deadlines are computed as
/// `Instant + Duration`, which must not overflow.
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Full panel configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub hardware: HardwareConfig,
    pub execution: ExecutionConfig,
    pub logging: LoggingConfig,
    pub menu: Vec<MenuItemConfig>,
    pub dashboard: DashboardConfig,
    pub quick_launch: QuickLaunchConfig,
    /// Where this config was loaded from; not part of the document.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HardwareConfig {
    pub i2c: I2cConfig,
    pub display: DisplayConfig,
}

/// Character display bus settings. Only the geometry is used by the panel
/// itself; address and port are passed through to the display driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct I2cConfig {
    pub address: u16,
    pub port: u8,
    pub cols: usize,
    pub rows: usize,
}

/// Idle, dashboard and backlight timing, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub idle_timeout: f64,
    pub dashboard_cycle_time: f64,
    /// Zero disables the backlight timeout.
    pub backlight_timeout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub timeout_secs: f64,
    pub result_flash_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub jsonl_log: PathBuf,
    pub verbose: bool,
}

/// One entry of the `menu:` list. Branches carry `items`, leaves carry `action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MenuItemConfig {
    pub label: String,
    pub action: Option<String>,
    pub wait_for_key: bool,
    pub items: Vec<MenuItemConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub pages: Vec<Vec<DashboardItemConfig>>,
}

/// One dashboard line: fixed label followed by a `stat:` wildcard value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DashboardItemConfig {
    pub label: String,
    pub stat: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct QuickLaunchConfig {
    pub command: Option<String>,
    pub wait_for_key: bool,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            address: 0x27,
            port: 1,
            cols: 16,
            rows: 2,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            idle_timeout: 15.0,
            dashboard_cycle_time: 5.0,
            backlight_timeout: 0.0,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5.0,
            result_flash_ms: 2_000,
            poll_interval_ms: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            jsonl_log: PathBuf::from("/var/log/lcdc/activity.jsonl"),
            verbose: false,
        }
    }
}

impl DisplayConfig {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        seconds(self.idle_timeout)
    }

    #[must_use]
    pub fn dashboard_cycle(&self) -> Duration {
        seconds(self.dashboard_cycle_time)
    }

    /// `None` when the backlight never switches off.
    #[must_use]
    pub fn backlight_timeout(&self) -> Option<Duration> {
        Some(seconds(self.backlight_timeout))
            .filter(|timeout| !timeout.is_zero())
    }
}

impl ExecutionConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        seconds(self.timeout_secs)
    }

    #[must_use]
    pub fn result_flash(&self) -> Duration {
        Duration::from_millis(self.result_flash_ms).min(MAX_INTERVAL)
    }
}

impl QuickLaunchConfig {
    /// Configured command, ignoring blank strings.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.yaml")
    }

    /// Load config from an explicit path (or `config.yaml`), apply env
    /// overrides and validate. The file must exist: a panel without a menu
    /// has nothing to show.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        if !path_buf.exists() {
            return Err(PanelError::MissingConfig { path: path_buf });
        }
        let raw =
            fs::read_to_string(&path_buf).map_err(|source| PanelError::io(&path_buf, source))?;

        let mut cfg = if is_toml(&path_buf) {
            Self::from_toml_str(&raw)?
        } else {
            Self::from_yaml_str(&raw)?
        };
        cfg.source = Some(path_buf);
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a YAML document without env overrides or validation.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        // An empty document deserializes to unit; treat it as all defaults.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Parse a TOML document without env overrides or validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// Uses FNV-1a so the value is stable across processes and Rust releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Dashboard pages with empty pages dropped.
    pub fn non_empty_pages(&self) -> impl Iterator<Item = &Vec<DashboardItemConfig>> {
        self.dashboard.pages.iter().filter(|page| !page.is_empty())
    }

    /// Apply `LCDC_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let display = &mut self.hardware.display;
        set_f64(&mut lookup, "LCDC_IDLE_TIMEOUT", &mut display.idle_timeout)?;
        set_f64(
            &mut lookup,
            "LCDC_DASHBOARD_CYCLE_TIME",
            &mut display.dashboard_cycle_time,
        )?;
        set_f64(
            &mut lookup,
            "LCDC_BACKLIGHT_TIMEOUT",
            &mut display.backlight_timeout,
        )?;

        let execution = &mut self.execution;
        set_f64(&mut lookup, "LCDC_EXEC_TIMEOUT_SECS", &mut execution.timeout_secs)?;
        set_u64(&mut lookup, "LCDC_RESULT_FLASH_MS", &mut execution.result_flash_ms)?;
        set_u64(
            &mut lookup,
            "LCDC_POLL_INTERVAL_MS",
            &mut execution.poll_interval_ms,
        )?;

        if let Some(raw) = lookup("LCDC_JSONL_LOG") {
            self.logging.jsonl_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("LCDC_VERBOSE") {
            self.logging.verbose = parse_bool("LCDC_VERBOSE", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let i2c = &self.hardware.i2c;
        if !matches!(i2c.cols, 16 | 20) {
            return Err(invalid(format!(
                "hardware.i2c.cols must be 16 or 20, got {}",
                i2c.cols
            )));
        }
        if !matches!(i2c.rows, 2 | 4) {
            return Err(invalid(format!(
                "hardware.i2c.rows must be 2 or 4, got {}",
                i2c.rows
            )));
        }

        let display = &self.hardware.display;
        for (name, value) in [
            ("hardware.display.idle_timeout", display.idle_timeout),
            (
                "hardware.display.dashboard_cycle_time",
                display.dashboard_cycle_time,
            ),
            ("execution.timeout_secs", self.execution.timeout_secs),
        ] {
            if checked_interval(name, value)?.is_zero() {
                return Err(invalid(format!("{name} must be positive, got {value}")));
            }
        }
        checked_interval(
            "hardware.display.backlight_timeout",
            display.backlight_timeout,
        )?;
        if Duration::from_millis(self.execution.result_flash_ms) > MAX_INTERVAL {
            return Err(invalid(format!(
                "execution.result_flash_ms must be at most {}, got {}",
                MAX_INTERVAL.as_millis(),
                self.execution.result_flash_ms
            )));
        }
        if self.execution.poll_interval_ms == 0 {
            return Err(invalid("execution.poll_interval_ms must be > 0"));
        }

        MenuTree::load(&self.menu)?;

        if let Some(raw) = &self.quick_launch.command
            && raw.trim().is_empty()
        {
            return Err(invalid("quick_launch.command must not be blank"));
        }

        for (page_idx, page) in self.dashboard.pages.iter().enumerate() {
            if page.len() > i2c.rows {
                return Err(invalid(format!(
                    "dashboard.pages[{page_idx}] has {} entries but the display has {} rows",
                    page.len(),
                    i2c.rows
                )));
            }
            for (item_idx, item) in page.iter().enumerate() {
                let location = format!("dashboard.pages[{page_idx}][{item_idx}]");
                match resolve(&item.stat) {
                    Ok(ResolvedAction::StatLookup(_)) => {}
                    Ok(ResolvedAction::ShellCommand(_)) => {
                        return Err(invalid(format!(
                            "{location}.stat must be a stat: wildcard, got {:?}",
                            item.stat
                        )));
                    }
                    Err(err) => {
                        return Err(invalid(format!("{location}.stat: {err}")));
                    }
                }
            }
        }

        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Convert a seconds setting, rejecting negatives, NaN and anything past
/// [`MAX_INTERVAL`].
fn checked_interval(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|interval| *interval <= MAX_INTERVAL)
        .ok_or_else(|| {
            invalid(format!(
                "{name} must be between 0 and {}s, got {value}",
                MAX_INTERVAL.as_secs()
            ))
        })
}

/// Saturating conversion for values that already passed validation.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0))
        .map_or(MAX_INTERVAL, |interval| interval.min(MAX_INTERVAL))
}

fn invalid(details: impl Into<String>) -> PanelError {
    PanelError::InvalidConfig {
        details: details.into(),
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_f64<F>(lookup: &mut F, name: &str, slot: &mut f64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse::<f64>().map_err(|error| PanelError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse::<u64>().map_err(|error| PanelError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PanelError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, MAX_INTERVAL, PanelError};
    use std::time::Duration;
    use std::collections::HashMap;
    use std::path::Path;

    const SAMPLE: &str = r#"
hardware:
  i2c: { address: 0x27, port: 1, cols: 16, rows: 2 }
  display: { idle_timeout: 10.0, dashboard_cycle_time: 3.0, backlight_timeout: 60.0 }
  inputs:
    encoder: { clk: 12, dt: 6 }
menu:
  - label: System Info
    items:
      - label: IP Address
        action: "stat:get_ip"
        wait_for_key: true
  - label: Reboot
    action: sudo reboot
dashboard:
  pages:
    - - { label: "IP: ", stat: "stat:get_ip" }
      - { label: "Host: ", stat: "stat:get_hostname" }
    - []
quick_launch:
  command: uptime
  wait_for_key: true
"#;

    fn sample() -> Config {
        Config::from_yaml_str(SAMPLE).expect("sample parses")
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn sample_config_is_valid() {
        let cfg = sample();
        cfg.validate().expect("sample validates");
        assert_eq!(cfg.hardware.i2c.address, 0x27);
        assert!((cfg.hardware.display.idle_timeout - 10.0).abs() < f64::EPSILON);
        assert_eq!(cfg.menu.len(), 2);
        assert_eq!(cfg.menu[0].items[0].action.as_deref(), Some("stat:get_ip"));
        assert_eq!(cfg.quick_launch.command(), Some("uptime"));
        assert_eq!(cfg.non_empty_pages().count(), 1);
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = Config::from_yaml_str("menu:\n  - { label: A, action: 'true' }\n").unwrap();
        assert_eq!(cfg.hardware.i2c.cols, 16);
        assert_eq!(cfg.hardware.i2c.rows, 2);
        assert!((cfg.hardware.display.idle_timeout - 15.0).abs() < f64::EPSILON);
        assert!((cfg.hardware.display.dashboard_cycle_time - 5.0).abs() < f64::EPSILON);
        assert!(cfg.hardware.display.backlight_timeout.abs() < f64::EPSILON);
        assert!((cfg.execution.timeout_secs - 5.0).abs() < f64::EPSILON);
        assert_eq!(cfg.execution.result_flash_ms, 2_000);
        assert!(cfg.quick_launch.command().is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn empty_menu_is_rejected() {
        let err = Config::default().validate().expect_err("no menu");
        assert_eq!(err.code(), "LCD-1004");
    }

    #[test]
    fn geometry_outside_supported_set_rejected() {
        let mut cfg = sample();
        cfg.hardware.i2c.cols = 24;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("cols"));

        let mut cfg = sample();
        cfg.hardware.i2c.rows = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_timeouts_rejected() {
        let mut cfg = sample();
        cfg.hardware.display.idle_timeout = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.execution.timeout_secs = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.hardware.display.backlight_timeout = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_timeouts_rejected() {
        for field in 0..4 {
            let mut cfg = sample();
            let slot = match field {
                0 => &mut cfg.hardware.display.idle_timeout,
                1 => &mut cfg.hardware.display.dashboard_cycle_time,
                2 => &mut cfg.hardware.display.backlight_timeout,
                _ => &mut cfg.execution.timeout_secs,
            };
            *slot = 1e20;
            let err = cfg.validate().unwrap_err();
            assert_eq!(err.code(), "LCD-1001", "field {field}");
        }

        let mut cfg = sample();
        cfg.hardware.display.idle_timeout = MAX_INTERVAL.as_secs_f64() + 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.execution.result_flash_ms = u64::MAX;
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.execution.result_flash(), MAX_INTERVAL);
    }

    #[test]
    fn duration_accessors_saturate_instead_of_panicking() {
        let mut cfg = sample();
        cfg.hardware.display.idle_timeout = 1e20;
        cfg.hardware.display.dashboard_cycle_time = f64::INFINITY;
        cfg.execution.timeout_secs = f64::NAN;
        cfg.hardware.display.backlight_timeout = -3.0;

        assert_eq!(cfg.hardware.display.idle_timeout(), MAX_INTERVAL);
        assert_eq!(cfg.hardware.display.dashboard_cycle(), MAX_INTERVAL);
        assert_eq!(cfg.execution.timeout(), Duration::ZERO);
        assert_eq!(cfg.hardware.display.backlight_timeout(), None);

        let cfg = sample();
        assert_eq!(cfg.hardware.display.idle_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn dashboard_stat_outside_allow_list_is_fatal() {
        let mut cfg = sample();
        cfg.dashboard.pages[0][0].stat = "stat:get_secrets".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("get_secrets"), "{err}");

        let mut cfg = sample();
        cfg.dashboard.pages[0][0].stat = "cat /etc/shadow".to_string();
        assert!(matches!(
            cfg.validate().unwrap_err(),
            PanelError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn dashboard_page_longer_than_rows_rejected() {
        let mut cfg = sample();
        let extra = cfg.dashboard.pages[0][0].clone();
        cfg.dashboard.pages[0].push(extra);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("rows"), "{err}");
    }

    #[test]
    fn blank_quick_launch_rejected() {
        let mut cfg = sample();
        cfg.quick_launch.command = Some("   ".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("LCDC_IDLE_TIMEOUT", "30"),
            ("LCDC_EXEC_TIMEOUT_SECS", "1.5"),
            ("LCDC_RESULT_FLASH_MS", "500"),
            ("LCDC_JSONL_LOG", "/tmp/lcdc.jsonl"),
            ("LCDC_VERBOSE", "yes"),
        ]);
        let mut cfg = sample();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .expect("overrides apply");
        assert!((cfg.hardware.display.idle_timeout - 30.0).abs() < f64::EPSILON);
        assert!((cfg.execution.timeout_secs - 1.5).abs() < f64::EPSILON);
        assert_eq!(cfg.execution.result_flash_ms, 500);
        assert_eq!(cfg.logging.jsonl_log, Path::new("/tmp/lcdc.jsonl"));
        assert!(cfg.logging.verbose);
    }

    #[test]
    fn env_invalid_number_rejected() {
        let env = vars(&[("LCDC_POLL_INTERVAL_MS", "fast")]);
        let mut cfg = sample();
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .expect_err("invalid number");
        assert_eq!(err.code(), "LCD-1003");
        assert!(err.to_string().contains("LCDC_POLL_INTERVAL_MS"));
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let err = Config::load(Some(Path::new("/nonexistent/lcdc/config.yaml"))).unwrap_err();
        assert!(matches!(err, PanelError::MissingConfig { .. }));
    }

    #[test]
    fn load_reads_yaml_and_toml_files() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("panel.yaml");
        std::fs::write(&yaml, SAMPLE).unwrap();
        let cfg = Config::load(Some(&yaml)).expect("yaml loads");
        assert_eq!(cfg.source.as_deref(), Some(yaml.as_path()));

        let toml_path = dir.path().join("panel.toml");
        std::fs::write(
            &toml_path,
            "[hardware.i2c]\ncols = 20\nrows = 4\n\n[[menu]]\nlabel = \"Uptime\"\naction = \"uptime\"\n",
        )
        .unwrap();
        let cfg = Config::load(Some(&toml_path)).expect("toml loads");
        assert_eq!(cfg.hardware.i2c.cols, 20);
        assert_eq!(cfg.menu[0].label, "Uptime");
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = Config::from_yaml_str("menu: [unclosed").unwrap_err();
        assert_eq!(err.code(), "LCD-1003");
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = sample();
        let before = cfg.stable_hash().expect("hash");
        assert_eq!(before, cfg.stable_hash().expect("hash"));
        let mut modified = sample();
        modified.hardware.display.idle_timeout += 1.0;
        assert_ne!(before, modified.stable_hash().expect("hash"));
    }
}
