//! Domain layer: graph, distance computation and reversible overlays.

pub mod distance;
pub mod errors;
pub mod graph;
pub mod overlay;

pub use distance::*;
pub use errors::*;
pub use graph::*;
pub use overlay::*;
