//! Hardware boundary: the character display, input events and the terminal
//! emulation of both.

pub mod display;
pub mod input;
pub mod stream;
#[cfg(feature = "cli")]
pub mod terminal;
