//! # lc-01-web-of-trust
//!
//! Web of trust of the currency: members are nodes, certifications are
//! directed links from issuer to receiver.
//!
//! ## Architecture
//!
//! The graph is an owned value. Nothing in this crate keeps a global instance:
//! the node service holds the authoritative [`TrustGraph`] and passes it by
//! reference to whoever needs it.
//!
//! ```text
//!             ┌──────────────────────────┐
//!             │  TrustGraph (canonical)  │  mutated only by block apply/revert
//!             └────────────┬─────────────┘
//!                          │ &TrustGraph
//!                          ↓
//!             ┌──────────────────────────┐
//!             │   WotDistanceChecker     │
//!             │  memcopy → GraphOverlay  │  temporary nodes/links on a private copy
//!             │  → distance per candidate│
//!             │  → overlay undone on drop│
//!             └──────────────────────────┘
//! ```
//!
//! ## Distance Rule
//!
//! A node is a *sentry* when it is enabled and has issued and received at
//! least `dSen = ceil(membersCount^(1/stepMax))` links. A candidate passes
//! when at least `xpercent` of the sentries reach it in `stepMax` steps or
//! fewer.

pub mod checker;
pub mod domain;

pub use checker::{GraphExtension, NodeRef, WotDistanceChecker};
pub use domain::{
    compute_distance, sentry_requirement, DistanceParameters, GraphOverlay, TrustGraph, WotDistance,
    WotError, WotId, WotResult,
};
