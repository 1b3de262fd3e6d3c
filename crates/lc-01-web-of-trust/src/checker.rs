//! # WoT Distance Checker
//!
//! Answers "would any candidate be outdistanced if these newcomers and links
//! were written?" without touching the canonical graph.

use crate::domain::{
    compute_distance, sentry_requirement, DistanceParameters, GraphOverlay, TrustGraph, WotError,
    WotId, WotResult,
};
use tracing::debug;

/// Node referenced by a pending block: either already in the graph or a
/// newcomer declared by the block (index into the newcomer list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Existing(WotId),
    Newcomer(usize),
}

/// Nodes and links a pending block would add to the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphExtension {
    pub newcomers: usize,
    /// `(issuer, receiver)` pairs.
    pub links: Vec<(NodeRef, NodeRef)>,
}

/// Distance check against a private copy of the canonical graph.
pub struct WotDistanceChecker<'a> {
    graph: &'a TrustGraph,
    members_count: u64,
    step_max: u32,
    x_percent: f64,
    sig_stock: usize,
}

impl<'a> WotDistanceChecker<'a> {
    pub fn new(
        graph: &'a TrustGraph,
        members_count: u64,
        step_max: u32,
        x_percent: f64,
        sig_stock: usize,
    ) -> Self {
        Self {
            graph,
            members_count,
            step_max,
            x_percent,
            sig_stock,
        }
    }

    /// `true` as soon as one candidate is outdistanced once `extension` is applied.
    ///
    /// A candidate that cannot be resolved to a node counts as outdistanced.
    pub fn is_any_outdistanced(
        &self,
        candidates: &[NodeRef],
        extension: &GraphExtension,
    ) -> WotResult<bool> {
        let mut working = self.graph.memcopy();
        let mut overlay = GraphOverlay::new(&mut working);

        let newcomers = (0..extension.newcomers)
            .map(|_| overlay.add_node(false))
            .collect::<WotResult<Vec<WotId>>>()?;
        let resolve = |node: NodeRef| -> WotResult<WotId> {
            match node {
                NodeRef::Existing(id) => Ok(id),
                NodeRef::Newcomer(i) => newcomers
                    .get(i)
                    .copied()
                    .ok_or(WotError::UnknownNode(WotId(usize::MAX))),
            }
        };

        overlay.set_max_links(self.sig_stock.saturating_add(extension.links.len()));
        for &(issuer, receiver) in &extension.links {
            overlay.add_link(resolve(issuer)?, resolve(receiver)?)?;
        }

        let params = DistanceParameters {
            sentry_requirement: sentry_requirement(self.members_count, self.step_max),
            step_max: self.step_max,
            x_percent: self.x_percent,
        };
        for &candidate in candidates {
            let node = resolve(candidate)?;
            let outdistanced = compute_distance(overlay.graph(), node, params)
                .map(|d| d.outdistanced)
                .unwrap_or(true);
            if outdistanced {
                debug!("[lc-01] candidate {:?} is outdistanced", candidate);
                return Ok(true);
            }
        }
        overlay.undo();
        Ok(false)
    }
}
