//! The panel control loop.
//!
//! One thread owns the [`MenuSession`] and everything that touches the
//! display. Each iteration:
//! 1. checks the shutdown flag,
//! 2. waits up to `poll_interval` for one input signal and applies it,
//! 3. ticks the session, the dashboard (while Idle) and the backlight policy,
//! 4. sends the watchdog heartbeat.
//!
//! Shell actions run inline and block the loop for at most the executor
//! timeout. Input that piled up meanwhile is discarded.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;

use crate::core::config::Config;
use crate::core::errors::{PanelError, Result};
use crate::daemon::signals::{
    ShutdownCoordinator, SignalHandler, WatchdogHeartbeat, notify_ready,
};
use crate::hal::display::{CharDisplay, Frame, Geometry};
use crate::hal::input::{InputEvent, InputQueue, InputSignal};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::menu::dashboard::DashboardCycler;
use crate::menu::executor::CommandExecutor;
use crate::menu::navigation::{
    ActionOrigin, MenuSession, Mode, SessionCmd, SessionMsg, SessionOptions, update,
};
use crate::menu::tree::MenuTree;
use crate::stats::StatsSource;

pub const EXECUTING_TEXT: &str = "Executing...";
pub const SHUTDOWN_TEXT: &str = "Shutdown";

/// Arguments for `lcdc run`.
#[derive(Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Systemd watchdog timeout in seconds (0 = disabled).
    pub watchdog_sec: u64,
}

/// Collaborators the daemon is built from.
pub struct PanelParts<D: CharDisplay> {
    pub display: D,
    pub stats: Arc<dyn StatsSource>,
    pub inputs: InputQueue,
    pub logger: ActivityLoggerHandle,
    pub logger_join: Option<thread::JoinHandle<()>>,
    pub signals: SignalHandler,
}

// ──────────────────── main daemon struct ────────────────────

pub struct PanelDaemon<D: CharDisplay> {
    config: Config,
    display: D,
    session: MenuSession,
    executor: CommandExecutor,
    cycler: DashboardCycler,
    stats: Arc<dyn StatsSource>,
    inputs: InputQueue,
    logger_handle: ActivityLoggerHandle,
    logger_join: Option<thread::JoinHandle<()>>,
    signal_handler: SignalHandler,
    watchdog: WatchdogHeartbeat,
    poll_interval: Duration,
    backlight_timeout: Option<Duration>,
    backlight_on: bool,
    last_input: Instant,
    start_time: Instant,
    started: bool,
}

impl<D: CharDisplay> PanelDaemon<D> {
    /// Build the daemon from a validated configuration.
    pub fn init(config: Config, parts: PanelParts<D>, args: &DaemonArgs) -> Result<Self> {
        let now = Instant::now();
        let geometry = Geometry::from(&config.hardware.i2c);
        if parts.display.geometry() != geometry {
            return Err(PanelError::InvalidConfig {
                details: format!(
                    "display is {} but hardware.i2c describes {geometry}",
                    parts.display.geometry()
                ),
            });
        }

        let tree = MenuTree::load(&config.menu)?;
        let session = MenuSession::new(tree, SessionOptions::from_config(&config), now);
        let executor = CommandExecutor::new(
            Arc::clone(&parts.stats),
            config.execution.timeout(),
            geometry,
        );

        let skipped = config.dashboard.pages.len() - config.non_empty_pages().count();
        if skipped > 0 {
            eprintln!("[LCDC-CONFIG] skipping {skipped} empty dashboard page(s)");
        }
        let cycler = DashboardCycler::from_config(&config)?;

        let backlight_timeout = config.hardware.display.backlight_timeout();

        Ok(Self {
            poll_interval: Duration::from_millis(config.execution.poll_interval_ms.max(1)),
            config,
            display: parts.display,
            session,
            executor,
            cycler,
            stats: parts.stats,
            inputs: parts.inputs,
            logger_handle: parts.logger,
            logger_join: parts.logger_join,
            signal_handler: parts.signals,
            watchdog: WatchdogHeartbeat::new(args.watchdog_sec),
            backlight_timeout,
            backlight_on: true,
            last_input: now,
            start_time: now,
            started: false,
        })
    }

    #[must_use]
    pub const fn session(&self) -> &MenuSession {
        &self.session
    }

    #[must_use]
    pub const fn display(&self) -> &D {
        &self.display
    }

    #[must_use]
    pub const fn cycler(&self) -> &DashboardCycler {
        &self.cycler
    }

    /// Run until shutdown is requested.
    pub fn run(&mut self) -> Result<()> {
        self.start(Instant::now());
        notify_ready();

        // ──────── main control loop ────────
        loop {
            if self.signal_handler.should_shutdown() {
                eprintln!("[LCDC-DAEMON] shutdown requested");
                break;
            }

            match self.inputs.receiver().recv_timeout(self.poll_interval) {
                Ok(signal) => self.handle_signal(signal, Instant::now()),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(self.poll_interval),
            }

            self.tick(Instant::now());
            self.watchdog.maybe_notify(self.session.mode().as_str());
        }

        self.shutdown();
        Ok(())
    }

    /// Log startup and hand the display to the dashboard. Runs once.
    pub fn start(&mut self, now: Instant) {
        if self.started {
            return;
        }
        self.started = true;
        self.logger_handle.send(ActivityEvent::DaemonStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: self.config.stable_hash().unwrap_or_default(),
            geometry: self.display.geometry().to_string(),
        });
        self.logger_handle.send(ActivityEvent::ConfigLoaded {
            source: self
                .config
                .source
                .as_ref()
                .map_or_else(|| "<inline>".to_string(), |p| p.display().to_string()),
            leaves: self.session.tree().leaf_count(),
            dashboard_pages: self.cycler.pages().len(),
        });
        if self.config.logging.verbose {
            eprintln!(
                "[LCDC-DAEMON] started: {} display, {} menu actions, {} dashboard pages",
                self.display.geometry(),
                self.session.tree().leaf_count(),
                self.cycler.pages().len()
            );
        }
        if let Err(e) = self.display.clear() {
            self.report(&e);
        }
        self.dispatch(SessionCmd::StartDashboard, now);
    }

    /// Apply one signal from the input queue.
    pub fn handle_signal(&mut self, signal: InputSignal, now: Instant) {
        match signal {
            InputSignal::Event(event) => {
                self.last_input = now;
                if !self.backlight_on {
                    self.set_backlight(true);
                }
                if event == InputEvent::QuickLaunch
                    && self.session.quick_launch().is_none()
                    && self.session.mode() != Mode::Idle
                    && self.session.state().pending.is_none()
                {
                    self.logger_handle.send(ActivityEvent::QuickLaunchUnset);
                }
                self.apply(SessionMsg::Input(event, now), now);
            }
            InputSignal::DeviceError(details) => {
                if self.config.logging.verbose {
                    eprintln!("[LCDC-INPUT] {details}");
                }
                self.logger_handle.send(ActivityEvent::InputError { details });
            }
        }
    }

    /// Time-driven work: idle timeout, flash expiry, dashboard pages and the
    /// backlight.
    pub fn tick(&mut self, now: Instant) {
        let overflowed = self.inputs.take_dropped();
        if overflowed > 0 {
            self.logger_handle.send(ActivityEvent::InputsOverflowed { count: overflowed });
        }

        self.apply(SessionMsg::Tick(now), now);

        if self.session.mode() == Mode::Idle
            && let Some(frame) = self.cycler.tick(now, self.stats.as_ref())
        {
            self.show(&frame);
        }

        if let Some(timeout) = self.backlight_timeout
            && self.backlight_on
            && now.saturating_duration_since(self.last_input) >= timeout
        {
            self.set_backlight(false);
        }
    }

    fn apply(&mut self, msg: SessionMsg, now: Instant) {
        let before = self.session.mode();
        let cmd = update(&mut self.session, msg);
        let after = self.session.mode();
        if before != after {
            self.logger_handle.send(ActivityEvent::ModeChanged {
                from: before,
                to: after,
            });
        }
        self.dispatch(cmd, now);
    }

    fn dispatch(&mut self, cmd: SessionCmd, now: Instant) {
        for cmd in cmd.into_vec() {
            match cmd {
                SessionCmd::Render(frame) => self.show(&frame),
                SessionCmd::Execute { action, origin, .. } => self.execute(&action, origin),
                SessionCmd::StartDashboard => {
                    self.cycler.start(now);
                    if let Some(frame) = self.cycler.tick(now, self.stats.as_ref()) {
                        self.show(&frame);
                    }
                }
                SessionCmd::None | SessionCmd::Batch(_) => {}
            }
        }
    }

    fn execute(&mut self, action: &str, origin: ActionOrigin) {
        let menu_path = match origin {
            ActionOrigin::Menu => self.session.breadcrumb().join(" > "),
            ActionOrigin::QuickLaunch => String::new(),
        };
        let geometry = self.display.geometry();
        self.show(&Frame::text(geometry, EXECUTING_TEXT));

        let result = self.executor.run(action);
        self.logger_handle.send(ActivityEvent::ActionFinished {
            action: action.to_string(),
            origin,
            menu_path,
            result: result.clone(),
        });

        let discarded = self.inputs.drain();
        if discarded > 0 {
            self.logger_handle.send(ActivityEvent::InputsDiscarded { count: discarded });
        }

        let finished = Instant::now();
        self.last_input = self.last_input.max(finished);
        self.apply(SessionMsg::ActionFinished(result, finished), finished);
    }

    fn show(&mut self, frame: &Frame) {
        if let Err(e) = self.display.write_frame(frame) {
            self.report(&e);
        }
    }

    fn set_backlight(&mut self, on: bool) {
        match self.display.set_backlight(on) {
            Ok(()) => self.backlight_on = on,
            Err(e) => self.report(&e),
        }
    }

    fn report(&self, err: &PanelError) {
        eprintln!("[LCDC-DAEMON] {err}");
        self.logger_handle.send(ActivityEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }

    // ──────────────────── shutdown ────────────────────

    fn shutdown(&mut self) {
        let uptime_secs = self.start_time.elapsed().as_secs();

        if !self.backlight_on {
            self.set_backlight(true);
        }
        let frame = Frame::text(self.display.geometry(), SHUTDOWN_TEXT);
        self.show(&frame);

        self.logger_handle.send(ActivityEvent::DaemonStopped {
            reason: "clean shutdown".to_string(),
            uptime_secs,
        });

        let logger = self.logger_handle.clone();
        let logger_join = Mutex::new(self.logger_join.take());
        let flush_log = || {
            logger.shutdown();
            logger_join
                .lock()
                .take()
                .is_none_or(|join| join.join().is_ok())
        };
        let tasks: [(&str, &dyn Fn() -> bool); 1] = [("flush activity log", &flush_log)];
        ShutdownCoordinator::new().execute(&tasks);

        eprintln!("[LCDC-DAEMON] shutdown complete (uptime={uptime_secs}s)");
    }
}
