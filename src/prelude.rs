//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use lcd_commander::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{PanelError, Result};

// Hardware boundary
pub use crate::hal::display::{CharDisplay, Frame, Geometry, MemoryDisplay};
pub use crate::hal::input::{InputEvent, InputQueue, InputSender, InputSignal, input_channel};

// Menu engine
pub use crate::menu::dashboard::{DashboardCycler, DashboardPage};
pub use crate::menu::executor::{CommandExecutor, ExecutionResult};
pub use crate::menu::navigation::{
    MenuSession, Mode, SessionCmd, SessionMsg, SessionOptions, update,
};
pub use crate::menu::resolver::{ResolvedAction, resolve};
pub use crate::menu::tree::{MenuNode, MenuTree};

// Stats
pub use crate::stats::{LinuxStats, StatMethod, StaticStats, StatsSource};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};

// Daemon
#[cfg(feature = "daemon")]
pub use crate::daemon::loop_main::{DaemonArgs, PanelDaemon, PanelParts};
