//! Signal handling (SIGTERM/SIGINT graceful shutdown) and the systemd
//! watchdog heartbeat.
//!
//! Uses `signal-hook` flags; the control loop polls [`SignalHandler`] once per
//! iteration instead of blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};

// ──────────────────── signal handler ────────────────────

/// Shutdown flag shared between signal hooks, the control loop and anything
/// else that wants the panel to stop.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// New handler with SIGTERM and SIGINT registered. Registration failures
    /// are reported on stderr and otherwise ignored.
    pub fn new() -> Self {
        let handler = Self::detached();
        for (signal, name) in [(SIGTERM, "SIGTERM"), (SIGINT, "SIGINT")] {
            if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&handler.shutdown_flag))
            {
                eprintln!("[LCDC-SIGNAL] failed to register {name}: {e}");
            }
        }
        handler
    }

    /// Handler with no OS hooks; shutdown only via [`Self::request_shutdown`].
    #[must_use]
    pub fn detached() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────── shutdown coordinator ────────────────────

/// Runs named shutdown steps in order within an overall time budget.
pub struct ShutdownCoordinator {
    pub timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }

    /// Run every task; returns `true` when all succeeded in time.
    pub fn execute(&self, shutdown_tasks: &[(&str, &dyn Fn() -> bool)]) -> bool {
        let start = Instant::now();
        let mut all_ok = true;

        for (name, task) in shutdown_tasks {
            if start.elapsed() > self.timeout {
                eprintln!("[LCDC-SHUTDOWN] timeout reached, abandoning remaining tasks");
                return false;
            }
            if !task() {
                eprintln!("[LCDC-SHUTDOWN] {name}: failed");
                all_ok = false;
            }
        }

        all_ok
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────── watchdog heartbeat ────────────────────

/// Sends `WATCHDOG=1` to systemd at half the configured watchdog interval.
pub struct WatchdogHeartbeat {
    interval: Duration,
    last_beat: Instant,
    enabled: bool,
}

impl WatchdogHeartbeat {
    /// `watchdog_sec` is systemd's `WatchdogSec`; zero disables the heartbeat.
    pub fn new(watchdog_sec: u64) -> Self {
        Self {
            interval: Duration::from_millis(watchdog_sec.saturating_mul(500)),
            last_beat: Instant::now(),
            enabled: watchdog_sec > 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Send a heartbeat if one is due. Returns `true` when sent.
    pub fn maybe_notify(&mut self, status: &str) -> bool {
        if !self.enabled || self.last_beat.elapsed() < self.interval {
            return false;
        }
        self.last_beat = Instant::now();
        sd_notify(&format!("WATCHDOG=1\nSTATUS={status}\n"));
        true
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Tell systemd the service finished starting.
pub fn notify_ready() {
    sd_notify("READY=1\n");
}

/// Datagram to `$NOTIFY_SOCKET`; a no-op outside systemd.
fn sd_notify(message: &str) {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::net::UnixDatagram;

        let Some(socket_path) = std::env::var_os("NOTIFY_SOCKET").filter(|p| !p.is_empty()) else {
            return;
        };
        if let Ok(sock) = UnixDatagram::unbound() {
            let _ = sock.send_to(message.as_bytes(), socket_path);
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = message;
    }
}
