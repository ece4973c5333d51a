//! Character display abstraction: geometry, frames and the render adapter trait.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::I2cConfig;
use crate::core::errors::Result;

/// Rows × columns of a character display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub rows: usize,
    pub cols: usize,
}

impl Geometry {
    pub const LCD_1602: Self = Self { rows: 2, cols: 16 };
    pub const LCD_2004: Self = Self { rows: 4, cols: 20 };

    #[must_use]
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

impl From<&I2cConfig> for Geometry {
    fn from(cfg: &I2cConfig) -> Self {
        Self::new(cfg.rows, cfg.cols)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// One full screen: exactly `rows` lines of at most `cols` characters each.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    lines: Vec<String>,
}

impl Frame {
    /// Fit `lines` to `geometry`: extra lines and characters are dropped,
    /// missing lines are blank. Never wraps.
    #[must_use]
    pub fn new<I, S>(geometry: Geometry, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fitted: Vec<String> = lines
            .into_iter()
            .take(geometry.rows)
            .map(|line| truncate_chars(line.as_ref(), geometry.cols))
            .collect();
        fitted.resize(geometry.rows, String::new());
        Self { lines: fitted }
    }

    /// Fit multi-line text to `geometry`.
    #[must_use]
    pub fn text(geometry: Geometry, text: &str) -> Self {
        Self::new(geometry, text.lines())
    }

    #[must_use]
    pub fn blank(geometry: Geometry) -> Self {
        Self::new(geometry, std::iter::empty::<&str>())
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines joined with `\n`, trailing blank lines kept.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }
}

/// First `max` characters of `line` (by `char`, not byte).
#[must_use]
pub fn truncate_chars(line: &str, max: usize) -> String {
    line.chars().take(max).collect()
}

/// Render adapter for the physical (or emulated) display.
pub trait CharDisplay: Send {
    fn geometry(&self) -> Geometry;
    /// Overwrite the whole screen.
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;
    fn set_backlight(&mut self, on: bool) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryDisplayState {
    frames: Vec<Frame>,
    backlight: Vec<bool>,
    backlight_on: bool,
    clears: usize,
}

/// Recording display for tests. Clones share the same history.
#[derive(Debug, Clone)]
pub struct MemoryDisplay {
    geometry: Geometry,
    state: Arc<Mutex<MemoryDisplayState>>,
}

impl MemoryDisplay {
    #[must_use]
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            state: Arc::new(Mutex::new(MemoryDisplayState {
                backlight_on: true,
                ..MemoryDisplayState::default()
            })),
        }
    }

    /// Every frame written so far.
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.state.lock().frames.clone()
    }

    #[must_use]
    pub fn last_frame(&self) -> Option<Frame> {
        self.state.lock().frames.last().cloned()
    }

    /// Every backlight change requested so far.
    #[must_use]
    pub fn backlight_changes(&self) -> Vec<bool> {
        self.state.lock().backlight.clone()
    }

    #[must_use]
    pub fn backlight_on(&self) -> bool {
        self.state.lock().backlight_on
    }

    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.state.lock().clears
    }
}

impl CharDisplay for MemoryDisplay {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.state.lock().frames.push(frame.clone());
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.backlight.push(on);
        state.backlight_on = on;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.clears += 1;
        state.frames.push(Frame::blank(self.geometry));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_pads_and_truncates_to_geometry() {
        let frame = Frame::new(
            Geometry::LCD_1602,
            ["a line that is definitely too long", "two", "three"],
        );
        assert_eq!(frame.lines(), ["a line that is d", "two"]);

        let short = Frame::text(Geometry::LCD_2004, "only one");
        assert_eq!(short.lines().len(), 4);
        assert_eq!(short.lines()[0], "only one");
        assert!(short.lines()[1..].iter().all(String::is_empty));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let frame = Frame::text(Geometry::new(2, 16), "température: 45°C ok");
        assert_eq!(frame.lines()[0].chars().count(), 16);
        assert_eq!(frame.lines()[0], "température: 45°");
    }

    #[test]
    fn memory_display_records_history_across_clones() {
        let display = MemoryDisplay::new(Geometry::LCD_1602);
        let mut handle = display.clone();
        handle
            .write_frame(&Frame::text(Geometry::LCD_1602, "hello"))
            .unwrap();
        handle.set_backlight(false).unwrap();
        handle.clear().unwrap();

        assert_eq!(display.frames().len(), 2);
        assert_eq!(display.last_frame(), Some(Frame::blank(Geometry::LCD_1602)));
        assert_eq!(display.backlight_changes(), vec![false]);
        assert!(!display.backlight_on());
        assert_eq!(display.clear_count(), 1);
    }

    #[test]
    fn geometry_displays_as_cols_by_rows() {
        assert_eq!(Geometry::LCD_2004.to_string(), "20x4");
    }
}
