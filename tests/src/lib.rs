//! # Currency Node Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs    # Signed members and the block forge
//! │   └── integration/   # Cross-crate properties of the consensus index
//! └── benches/           # Distance check and block validation
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p lc-tests
//!
//! # By category
//! cargo test -p lc-tests integration::quick_sync
//!
//! # Benchmarks
//! cargo bench -p lc-tests
//! ```

pub mod fixtures;
pub mod integration;
