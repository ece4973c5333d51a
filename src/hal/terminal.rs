//! Terminal emulation of the panel: a boxed `rows × cols` screen drawn with
//! `crossterm`, and a key reader thread that feeds the input queue.
//!
//! [`TerminalDisplay`] enters raw mode and the alternate screen on
//! construction and restores the terminal on [`Drop`]. A panic hook restores
//! the terminal before the panic message is printed.

#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation)]

use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use crate::core::errors::{PanelError, Result};
use crate::daemon::signals::SignalHandler;
use crate::hal::display::{CharDisplay, Frame, Geometry};
use crate::hal::input::{InputEvent, InputSender};

/// Set while raw mode is active; checked by the panic hook.
static RAW_MODE_ACTIVE: AtomicBool = AtomicBool::new(false);

const KEY_POLL: Duration = Duration::from_millis(50);
const HELP_LINE: &str = "↑↓ scroll  ⏎ select  ⌫ back  g home  space quick  q quit";

// ──────────────────── display ────────────────────

/// The panel drawn inside a box at the top-left of the terminal.
pub struct TerminalDisplay {
    geometry: Geometry,
    backlight: bool,
    last: Frame,
    hook_installed: bool,
}

impl TerminalDisplay {
    /// Enter raw mode and the alternate screen.
    ///
    /// # Errors
    /// Returns [`PanelError::Display`] when the terminal cannot be set up.
    pub fn new(geometry: Geometry) -> Result<Self> {
        terminal::enable_raw_mode().map_err(display_error)?;
        RAW_MODE_ACTIVE.store(true, Ordering::SeqCst);

        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal_best_effort();
            prev(info);
        }));

        let mut display = Self {
            geometry,
            backlight: true,
            last: Frame::blank(geometry),
            hook_installed: true,
        };
        execute!(io::stdout(), EnterAlternateScreen, Hide).map_err(display_error)?;
        display.draw()?;
        Ok(display)
    }

    fn draw(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        let border = "─".repeat(self.geometry.cols);
        let text_color = if self.backlight {
            Color::Green
        } else {
            Color::DarkGrey
        };

        queue!(stdout, Clear(ClearType::All), MoveTo(0, 0)).map_err(display_error)?;
        write!(stdout, "┌{border}┐").map_err(display_error)?;

        for (row, line) in self.last.lines().iter().enumerate() {
            let shown = if self.backlight { line.as_str() } else { "" };
            let pad = self.geometry.cols.saturating_sub(shown.chars().count());
            queue!(stdout, MoveTo(0, row as u16 + 1)).map_err(display_error)?;
            write!(stdout, "│").map_err(display_error)?;
            queue!(stdout, SetForegroundColor(text_color), SetAttribute(Attribute::Bold))
                .map_err(display_error)?;
            write!(stdout, "{shown}{}", " ".repeat(pad)).map_err(display_error)?;
            queue!(stdout, SetAttribute(Attribute::Reset)).map_err(display_error)?;
            write!(stdout, "│").map_err(display_error)?;
        }

        let bottom = self.geometry.rows as u16 + 1;
        queue!(stdout, MoveTo(0, bottom)).map_err(display_error)?;
        write!(stdout, "└{border}┘").map_err(display_error)?;
        queue!(
            stdout,
            MoveTo(0, bottom + 2),
            SetForegroundColor(Color::DarkGrey)
        )
        .map_err(display_error)?;
        write!(stdout, "{HELP_LINE}").map_err(display_error)?;
        queue!(stdout, SetAttribute(Attribute::Reset)).map_err(display_error)?;
        stdout.flush().map_err(display_error)
    }
}

impl CharDisplay for TerminalDisplay {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.last = frame.clone();
        self.draw()
    }

    fn set_backlight(&mut self, on: bool) -> Result<()> {
        self.backlight = on;
        self.draw()
    }

    fn clear(&mut self) -> Result<()> {
        self.last = Frame::blank(self.geometry);
        self.draw()
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        if self.hook_installed {
            let _ = panic::take_hook();
        }
        restore_terminal_best_effort();
    }
}

/// Best-effort restoration. Safe to call more than once.
fn restore_terminal_best_effort() {
    if RAW_MODE_ACTIVE.swap(false, Ordering::SeqCst) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = stdout.flush();
    }
}

fn display_error(err: io::Error) -> PanelError {
    PanelError::Display {
        details: err.to_string(),
    }
}

// ──────────────────── keys ────────────────────

/// What a key press means to the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Input(InputEvent),
    Quit,
    Ignore,
}

/// Map a terminal key to a panel input.
#[must_use]
pub fn map_key(key: KeyEvent) -> KeyAction {
    if key.kind == KeyEventKind::Release {
        return KeyAction::Ignore;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Up | KeyCode::Char('k') => KeyAction::Input(InputEvent::ScrollUp),
        KeyCode::Down | KeyCode::Char('j') => KeyAction::Input(InputEvent::ScrollDown),
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
            KeyAction::Input(InputEvent::Select)
        }
        KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h') => {
            KeyAction::Input(InputEvent::Back)
        }
        KeyCode::Home | KeyCode::Char('g') => KeyAction::Input(InputEvent::Home),
        KeyCode::Char(' ') => KeyAction::Input(InputEvent::QuickLaunch),
        _ => KeyAction::Ignore,
    }
}

/// Spawn the key reader. It stops when `signals` requests shutdown; a quit
/// key requests it.
///
/// # Errors
/// Returns [`PanelError::InputDevice`] when the thread cannot be spawned.
pub fn spawn_key_reader(sender: InputSender, signals: SignalHandler) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("lcdc-keys".to_string())
        .spawn(move || {
            while !signals.should_shutdown() {
                match event::poll(KEY_POLL) {
                    Ok(false) => {}
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) => match map_key(key) {
                            KeyAction::Input(input) => {
                                sender.send(input);
                            }
                            KeyAction::Quit => signals.request_shutdown(),
                            KeyAction::Ignore => {}
                        },
                        Ok(_) => {}
                        Err(e) => {
                            sender.report_error(format!("terminal read failed: {e}"));
                        }
                    },
                    Err(e) => {
                        sender.report_error(format!("terminal poll failed: {e}"));
                        std::thread::sleep(KEY_POLL);
                    }
                }
            }
        })
        .map_err(|e| PanelError::InputDevice {
            details: format!("failed to spawn key reader: {e}"),
        })
}
