//! Activity logging: JSONL writer and the logger thread that feeds it.

pub mod activity;
pub mod jsonl;
