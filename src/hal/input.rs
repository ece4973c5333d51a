//! Discrete input events and the bounded queue producers push them into.
//!
//! GPIO callbacks and the terminal key reader run on their own threads. They
//! only hold an [`InputSender`]; the control loop owns the receiving end, so
//! producers never touch navigation state. `try_send()` keeps producers from
//! blocking when the loop is busy running a command.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};

use crate::core::errors::PanelError;

/// Default input queue capacity.
pub const INPUT_QUEUE_CAPACITY: usize = 64;

/// One control actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEvent {
    ScrollUp,
    ScrollDown,
    Select,
    Back,
    Home,
    QuickLaunch,
}

impl InputEvent {
    pub const ALL: [Self; 6] = [
        Self::ScrollUp,
        Self::ScrollDown,
        Self::Select,
        Self::Back,
        Self::Home,
        Self::QuickLaunch,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ScrollUp => "scroll_up",
            Self::ScrollDown => "scroll_down",
            Self::Select => "select",
            Self::Back => "back",
            Self::Home => "home",
            Self::QuickLaunch => "quick_launch",
        }
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputEvent {
    type Err = PanelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == normalized)
            .ok_or_else(|| PanelError::InputDevice {
                details: format!("unknown input event {raw:?}"),
            })
    }
}

/// What an input producer can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSignal {
    Event(InputEvent),
    /// Transient device failure; logged and otherwise ignored.
    DeviceError(String),
}

/// Cloneable, non-blocking producer handle.
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: Sender<InputSignal>,
    dropped: Arc<AtomicU64>,
}

impl InputSender {
    /// Queue an event. Returns `false` when the queue is full (the event is
    /// counted as dropped) or the control loop has gone away.
    pub fn send(&self, event: InputEvent) -> bool {
        self.push(InputSignal::Event(event))
    }

    pub fn report_error(&self, details: impl Into<String>) -> bool {
        self.push(InputSignal::DeviceError(details.into()))
    }

    fn push(&self, signal: InputSignal) -> bool {
        match self.tx.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Receiving end owned by the control loop.
#[derive(Debug)]
pub struct InputQueue {
    rx: Receiver<InputSignal>,
    dropped: Arc<AtomicU64>,
}

impl InputQueue {
    #[must_use]
    pub const fn receiver(&self) -> &Receiver<InputSignal> {
        &self.rx
    }

    /// Discard everything currently queued; returns how many signals were dropped.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Signals producers dropped on a full queue since the last call.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

/// Create a bounded input queue.
#[must_use]
pub fn input_channel(capacity: usize) -> (InputSender, InputQueue) {
    let (tx, rx) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        InputSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        InputQueue { rx, dropped },
    )
}
