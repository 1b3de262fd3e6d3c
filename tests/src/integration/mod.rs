//! Cross-crate properties of the consensus index, checked on forged chains.

pub mod determinism;
pub mod fork_switch;
pub mod quick_sync;
pub mod revert;
pub mod scenarios;
pub mod trimming;
