//! Menu engine: tree, action resolution, execution, navigation and the idle
//! dashboard.

pub mod dashboard;
pub mod executor;
pub mod navigation;
pub mod resolver;
pub mod tree;
