//! # Reversible Overlay
//!
//! Temporary nodes and links recorded on top of a graph. Every recorded
//! mutation is undone, links first and then nodes, when the overlay is
//! dropped, whatever path leads to the drop.

use crate::domain::errors::WotResult;
use crate::domain::graph::{TrustGraph, WotId};
use tracing::error;

pub struct GraphOverlay<'g> {
    graph: &'g mut TrustGraph,
    added_nodes: Vec<WotId>,
    added_links: Vec<(WotId, WotId)>,
    original_max_links: usize,
}

impl<'g> GraphOverlay<'g> {
    pub fn new(graph: &'g mut TrustGraph) -> Self {
        let original_max_links = graph.max_links();
        Self {
            graph,
            added_nodes: Vec::new(),
            added_links: Vec::new(),
            original_max_links,
        }
    }

    /// Temporary node. Newcomers are added disabled since they are not members yet.
    pub fn add_node(&mut self, enabled: bool) -> WotResult<WotId> {
        let id = self.graph.add_node();
        self.added_nodes.push(id);
        self.graph.set_enabled(id, enabled)?;
        Ok(id)
    }

    /// Temporary link. A link that already exists is not recorded, so undoing
    /// the overlay leaves it in place.
    pub fn add_link(&mut self, issuer: WotId, receiver: WotId) -> WotResult<()> {
        if self.graph.has_link(issuer, receiver) {
            return Ok(());
        }
        self.graph.add_link(issuer, receiver)?;
        self.added_links.push((issuer, receiver));
        Ok(())
    }

    pub fn graph(&self) -> &TrustGraph {
        self.graph
    }

    pub fn set_max_links(&mut self, max_links: usize) {
        self.graph.set_max_links(max_links);
    }

    /// Undo every recorded mutation now instead of at drop time.
    pub fn undo(mut self) {
        self.rollback();
    }

    fn rollback(&mut self) {
        while let Some((issuer, receiver)) = self.added_links.pop() {
            if let Err(e) = self.graph.remove_link(issuer, receiver) {
                error!("[lc-01] overlay link {} -> {} could not be undone: {}", issuer, receiver, e);
            }
        }
        while self.added_nodes.pop().is_some() {
            if let Err(e) = self.graph.remove_node() {
                error!("[lc-01] overlay node could not be undone: {}", e);
            }
        }
        self.graph.set_max_links(self.original_max_links);
    }
}

impl Drop for GraphOverlay<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}
