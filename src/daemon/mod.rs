//! Daemon subsystem: the panel control loop and signal/watchdog integration.

pub mod loop_main;
pub mod signals;
