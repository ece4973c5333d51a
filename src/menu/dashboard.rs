//! Idle dashboard: cycles through pages of live stats while nobody is using
//! the panel.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use crate::core::config::{Config, DashboardItemConfig};
use crate::core::errors::{PanelError, Result};
use crate::hal::display::{Frame, Geometry};
use crate::menu::resolver::{ResolvedAction, resolve};
use crate::stats::{StatMethod, StatsSource};

/// Value shown when a stat lookup fails.
pub const UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardLine {
    pub label: String,
    pub stat: StatMethod,
}

/// One screenful of `label + value` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardPage {
    pub lines: Vec<DashboardLine>,
}

impl DashboardPage {
    fn parse(items: &[DashboardItemConfig]) -> Result<Self> {
        let lines = items
            .iter()
            .map(|item| match resolve(&item.stat)? {
                ResolvedAction::StatLookup(stat) => Ok(DashboardLine {
                    label: item.label.clone(),
                    stat,
                }),
                ResolvedAction::ShellCommand(command) => Err(PanelError::InvalidConfig {
                    details: format!("dashboard stat must be a stat: wildcard, got {command:?}"),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { lines })
    }

    /// Look up every stat and render the page.
    pub fn render(&self, stats: &dyn StatsSource, geometry: Geometry) -> Frame {
        Frame::new(
            geometry,
            self.lines.iter().map(|line| {
                let value = stats
                    .stat(line.stat)
                    .unwrap_or_else(|_| UNAVAILABLE.to_string());
                format!("{}{value}", line.label)
            }),
        )
    }
}

/// Pages shown when the configuration defines none.
#[must_use]
pub fn default_pages() -> Vec<DashboardPage> {
    let page = |entries: [(&str, StatMethod); 2]| DashboardPage {
        lines: entries
            .into_iter()
            .map(|(label, stat)| DashboardLine {
                label: label.to_string(),
                stat,
            })
            .collect(),
    };
    vec![
        page([("IP: ", StatMethod::Ip), ("Host: ", StatMethod::Hostname)]),
        page([
            ("Temp: ", StatMethod::CpuTemp),
            ("Net: ", StatMethod::CheckInternet),
        ]),
    ]
}

/// Build pages from configuration: empty pages are skipped, and when nothing
/// remains the default dashboard is used.
pub fn pages_from_config(cfg: &Config) -> Result<Vec<DashboardPage>> {
    let pages = cfg
        .non_empty_pages()
        .map(|items| DashboardPage::parse(items))
        .collect::<Result<Vec<_>>>()?;
    if pages.is_empty() {
        return Ok(default_pages());
    }
    Ok(pages)
}

/// Time-driven page cycler.
#[derive(Debug, Clone)]
pub struct DashboardCycler {
    pages: Vec<DashboardPage>,
    cycle: Duration,
    geometry: Geometry,
    started: Option<Instant>,
    current_page: Option<usize>,
    last_render: Option<Instant>,
}

impl DashboardCycler {
    /// An empty `pages` list is replaced by the default pages.
    #[must_use]
    pub fn new(pages: Vec<DashboardPage>, cycle: Duration, geometry: Geometry) -> Self {
        let pages = if pages.is_empty() {
            default_pages()
        } else {
            pages
        };
        Self {
            pages,
            cycle: cycle.max(Duration::from_millis(1)),
            geometry,
            started: None,
            current_page: None,
            last_render: None,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(
            pages_from_config(cfg)?,
            cfg.hardware.display.dashboard_cycle(),
            Geometry::from(&cfg.hardware.i2c),
        ))
    }

    #[must_use]
    pub fn pages(&self) -> &[DashboardPage] {
        &self.pages
    }

    /// Page shown most recently, if any.
    #[must_use]
    pub const fn current_page(&self) -> Option<usize> {
        self.current_page
    }

    /// Restart cycling from the first page; the next tick renders.
    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
        self.current_page = None;
        self.last_render = None;
    }

    /// Index of the page due at `now`.
    #[must_use]
    pub fn page_at(&self, now: Instant) -> usize {
        let Some(started) = self.started else {
            return 0;
        };
        let elapsed = now.saturating_duration_since(started);
        let cycles = elapsed.as_nanos() / self.cycle.as_nanos().max(1);
        // `pages` is never empty.
        usize::try_from(cycles % self.pages.len() as u128).unwrap_or(0)
    }

    /// Render when the page changes; a single page refreshes once per cycle.
    pub fn tick(&mut self, now: Instant, stats: &dyn StatsSource) -> Option<Frame> {
        self.started?;
        let page = self.page_at(now);
        let due = match (self.current_page, self.last_render) {
            (Some(_), Some(last)) if self.pages.len() == 1 => {
                now.saturating_duration_since(last) >= self.cycle
            }
            (Some(current), _) => current != page,
            (None, _) => true,
        };
        if !due {
            return None;
        }
        self.current_page = Some(page);
        self.last_render = Some(now);
        Some(self.pages[page].render(stats, self.geometry))
    }
}
