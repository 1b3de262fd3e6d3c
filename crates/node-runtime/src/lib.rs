//! # Node Runtime Library
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! - `container/` - configuration and service wiring
//! - `replay` - chain file replay (full checks or quick sync)

pub mod container;
pub mod replay;

pub use container::{create_dependencies, ConfigError, NodeConfig, NodeService};
pub use replay::{load_chain, replay, ReplaySummary};
