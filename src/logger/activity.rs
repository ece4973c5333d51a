//! Activity logger thread.
//!
//! A dedicated thread owns the [`JsonlWriter`]. The control loop and input
//! producers send [`ActivityEvent`]s through a bounded crossbeam channel with
//! `try_send()`, so a slow disk never delays a button press.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{PanelError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::menu::executor::ExecutionResult;
use crate::menu::navigation::{ActionOrigin, Mode};

const CHANNEL_CAPACITY: usize = 256;
/// How often a degraded writer retries the primary log path.
const RECOVERY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub enum ActivityEvent {
    DaemonStarted {
        version: String,
        config_hash: String,
        geometry: String,
    },
    DaemonStopped {
        reason: String,
        uptime_secs: u64,
    },
    ConfigLoaded {
        source: String,
        leaves: usize,
        dashboard_pages: usize,
    },
    ModeChanged {
        from: Mode,
        to: Mode,
    },
    ActionFinished {
        action: String,
        origin: ActionOrigin,
        menu_path: String,
        result: ExecutionResult,
    },
    /// Quick-launch pressed with nothing configured.
    QuickLaunchUnset,
    InputError {
        details: String,
    },
    InputsDiscarded {
        count: usize,
    },
    /// Producers found the input queue full.
    InputsOverflowed {
        count: u64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Stop the logger thread after flushing.
    Shutdown,
}

/// Cheaply cloneable, non-blocking handle to the logger thread.
#[derive(Debug, Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Queue an event; counted as dropped when the channel is full.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Blocks only if the queue is full.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// Handle whose events go nowhere; for one-shot commands and tests.
    #[must_use]
    pub fn disconnected() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Spawn the logger thread writing to `config`.
pub fn spawn_logger(
    config: JsonlConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let join = thread::Builder::new()
        .name("lcdc-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped))
        .map_err(|e| PanelError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);
    let mut last_recovery = Instant::now();

    while let Ok(event) = rx.recv() {
        if jsonl.state() != "normal" && last_recovery.elapsed() >= RECOVERY_INTERVAL {
            jsonl.try_recover();
            last_recovery = Instant::now();
        }

        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            jsonl.write_entry(
                &LogEntry::new(EventType::Error, Severity::Warning)
                    .with_details(format!("{lost} log events dropped due to back-pressure")),
            );
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
        jsonl.flush();
    }

    jsonl.fsync();
}

fn origin_name(origin: ActionOrigin) -> &'static str {
    match origin {
        ActionOrigin::Menu => "menu",
        ActionOrigin::QuickLaunch => "quick_launch",
    }
}

/// JSONL representation of an event.
pub fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DaemonStarted {
            version,
            config_hash,
            geometry,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStart, Severity::Info)
                .with_details(format!(
                    "version={version} config_hash={config_hash} display={geometry}"
                ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DaemonStopped {
            reason,
            uptime_secs,
        } => LogEntry::new(EventType::DaemonStop, Severity::Info)
            .with_details(format!("reason={reason} uptime={uptime_secs}s")),
        ActivityEvent::ConfigLoaded {
            source,
            leaves,
            dashboard_pages,
        } => LogEntry::new(EventType::ConfigLoaded, Severity::Info).with_details(format!(
            "source={source} leaves={leaves} dashboard_pages={dashboard_pages}"
        )),
        ActivityEvent::ModeChanged { from, to } => {
            let mut e = LogEntry::new(EventType::ModeChange, Severity::Info);
            e.from_mode = Some(from.as_str().to_string());
            e.to_mode = Some(to.as_str().to_string());
            e
        }
        ActivityEvent::ActionFinished {
            action,
            origin,
            menu_path,
            result,
        } => {
            let (event, severity) = if result.succeeded {
                (EventType::ActionExecuted, Severity::Info)
            } else {
                (EventType::ActionFailed, Severity::Warning)
            };
            let mut e = LogEntry::new(event, severity);
            e.action = Some(action.clone());
            e.origin = Some(origin_name(*origin).to_string());
            e.menu_path = (!menu_path.is_empty()).then(|| menu_path.clone());
            e.ok = Some(result.succeeded);
            e.duration_ms = Some(u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX));
            e.output = Some(result.output_text.clone());
            e.error_message.clone_from(&result.error_message);
            e
        }
        ActivityEvent::QuickLaunchUnset => LogEntry::new(EventType::QuickLaunch, Severity::Warning)
            .with_details("no quick_launch command configured"),
        ActivityEvent::InputError { details } => {
            let mut e = LogEntry::new(EventType::InputError, Severity::Warning);
            e.error_code = Some("LCD-3001".to_string());
            e.error_message = Some(details.clone());
            e
        }
        ActivityEvent::InputsDiscarded { count } => {
            LogEntry::new(EventType::InputDropped, Severity::Info)
                .with_details(format!("{count} inputs discarded while an action ran"))
        }
        ActivityEvent::InputsOverflowed { count } => {
            LogEntry::new(EventType::InputDropped, Severity::Warning)
                .with_details(format!("{count} inputs dropped on a full input queue"))
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::DaemonStop, Severity::Info),
    }
}
