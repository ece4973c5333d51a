//! Headless panel: frames printed to a writer, input events read as lines.
//!
//! Used by `lcdc run` without `--terminal`, so the panel can be driven from a
//! pipe (`printf 'select\nback\n' | lcdc run`) or a supervisor's stdin.

#![allow(missing_docs)]

use std::io::{BufRead, Write};
use std::thread::JoinHandle;

use crate::core::errors::{PanelError, Result};
use crate::hal::display::{CharDisplay, Frame, Geometry};
use crate::hal::input::{InputEvent, InputSender};

/// Writes every frame as a small box of text.
pub struct StreamDisplay<W: Write + Send> {
    geometry: Geometry,
    out: W,
    backlight: bool,
}

impl<W: Write + Send> StreamDisplay<W> {
    pub fn new(geometry: Geometry, out: W) -> Self {
        Self {
            geometry,
            out,
            backlight: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|e| PanelError::Display {
                details: e.to_string(),
            })
    }
}

/// Boxed text rendering of a frame.
#[must_use]
pub fn boxed(frame: &Frame, geometry: Geometry) -> String {
    let border = "-".repeat(geometry.cols);
    let mut text = format!("+{border}+\n");
    for line in frame.lines() {
        let pad = geometry.cols.saturating_sub(line.chars().count());
        text.push_str(&format!("|{line}{}|\n", " ".repeat(pad)));
    }
    text.push_str(&format!("+{border}+\n"));
    text
}

impl<W: Write + Send> CharDisplay for StreamDisplay<W> {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let text = boxed(frame, self.geometry);
        self.emit(&text)
    }

    fn set_backlight(&mut self, on: bool) -> Result<()> {
        if self.backlight == on {
            return Ok(());
        }
        self.backlight = on;
        self.emit(if on { "[backlight on]\n" } else { "[backlight off]\n" })
    }

    fn clear(&mut self) -> Result<()> {
        let blank = Frame::blank(self.geometry);
        self.write_frame(&blank)
    }
}

/// Spawn a thread turning lines of `reader` into input events. Blank lines
/// are skipped; unknown names are reported as device errors. `on_eof` runs
/// once the reader is exhausted.
///
/// # Errors
/// Returns [`PanelError::InputDevice`] when the thread cannot be spawned.
pub fn spawn_line_reader<R, F>(reader: R, sender: InputSender, on_eof: F) -> Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name("lcdc-lines".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        sender.report_error(format!("input read failed: {e}"));
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<InputEvent>() {
                    Ok(event) => {
                        sender.send(event);
                    }
                    Err(e) => {
                        sender.report_error(e.to_string());
                    }
                }
            }
            on_eof();
        })
        .map_err(|e| PanelError::InputDevice {
            details: format!("failed to spawn line reader: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::input::{InputSignal, input_channel};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn frames_are_boxed_and_padded() {
        let geometry = Geometry::LCD_1602;
        let mut display = StreamDisplay::new(geometry, Vec::new());
        display
            .write_frame(&Frame::new(geometry, [">System Info", " Reboot"]))
            .unwrap();
        let text = String::from_utf8(display.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "+----------------+");
        assert_eq!(lines[1], "|>System Info    |");
        assert_eq!(lines[2], "| Reboot         |");
    }

    #[test]
    fn backlight_changes_are_reported_once() {
        let mut display = StreamDisplay::new(Geometry::LCD_1602, Vec::new());
        display.set_backlight(true).unwrap();
        display.set_backlight(false).unwrap();
        display.set_backlight(false).unwrap();
        let text = String::from_utf8(display.into_inner()).unwrap();
        assert_eq!(text, "[backlight off]\n");
    }

    #[test]
    fn line_reader_parses_events_and_reports_eof() {
        let (tx, queue) = input_channel(16);
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let reader = Cursor::new("select\n\nwiggle\nback\n");
        let handle =
            spawn_line_reader(reader, tx, move || flag.store(true, Ordering::SeqCst)).unwrap();
        handle.join().unwrap();

        assert!(finished.load(Ordering::SeqCst));
        let signals: Vec<InputSignal> = queue.receiver().try_iter().collect();
        assert_eq!(signals.len(), 3);
        assert_eq!(signals[0], InputSignal::Event(InputEvent::Select));
        assert!(matches!(
            &signals[1],
            InputSignal::DeviceError(details) if details.contains("wiggle")
        ));
        assert_eq!(signals[2], InputSignal::Event(InputEvent::Back));
    }
}
