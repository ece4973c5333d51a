#![forbid(unsafe_code)]

//! LCD Commander (lcdc): a menu-driven control panel for character LCDs on
//! headless machines.
//!
//! A static menu tree is navigated with six discrete inputs. Leaves run either
//! a shell command or a whitelisted `stat:` lookup and show the result on the
//! display; after a period of inactivity a cycling stats dashboard takes over.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use lcd_commander::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use lcd_commander::core::config::Config;
//! use lcd_commander::menu::navigation::{MenuSession, update};
//! ```

pub mod prelude;

pub mod core;
#[cfg(feature = "daemon")]
pub mod daemon;
pub mod hal;
pub mod logger;
pub mod menu;
pub mod stats;
