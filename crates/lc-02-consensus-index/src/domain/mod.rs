//! Domain layer: entries, reduction, HEAD derivation and the pure rules.

mod builder;
mod config;
mod entries;
mod error;
mod generators;
mod head;
mod reducer;
mod rules;
mod unlock;

pub use builder::*;
pub use config::*;
pub use entries::*;
pub use error::*;
pub use generators::*;
pub use head::*;
pub use reducer::*;
pub use rules::*;
pub use unlock::*;
