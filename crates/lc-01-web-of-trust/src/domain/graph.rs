//! # Trust Graph
//!
//! Directed certification graph. Node ids are dense indexes assigned in
//! insertion order; only the last node can be removed, so ids are never
//! reassigned while the node they denote exists.

use crate::domain::errors::{WotError, WotResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Stable identifier of a node in the trust graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WotId(pub usize);

impl fmt::Display for WotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct WotNode {
    enabled: bool,
    /// Issuers of the links received by this node.
    sources: HashSet<WotId>,
    /// Number of links issued by this node.
    issued: usize,
}

impl WotNode {
    fn new() -> Self {
        Self {
            enabled: true,
            sources: HashSet::new(),
            issued: 0,
        }
    }
}

/// Certification graph of the currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustGraph {
    nodes: Vec<WotNode>,
    max_links: usize,
}

impl Default for TrustGraph {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl TrustGraph {
    /// Create an empty graph where each node may issue at most `max_links` links.
    pub fn new(max_links: usize) -> Self {
        Self {
            nodes: Vec::new(),
            max_links,
        }
    }

    pub fn max_links(&self) -> usize {
        self.max_links
    }

    pub fn set_max_links(&mut self, max_links: usize) {
        self.max_links = max_links;
    }

    /// Number of nodes, enabled or not.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of links.
    pub fn link_count(&self) -> usize {
        self.nodes.iter().map(|n| n.sources.len()).sum()
    }

    pub fn enabled_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.enabled).count()
    }

    /// Private working copy of the whole graph.
    pub fn memcopy(&self) -> TrustGraph {
        self.clone()
    }

    /// Drop every node and link.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    // === NODES ===

    /// Append an enabled node and return its id.
    pub fn add_node(&mut self) -> WotId {
        self.nodes.push(WotNode::new());
        WotId(self.nodes.len() - 1)
    }

    /// Remove the last node along with every link touching it.
    pub fn remove_node(&mut self) -> WotResult<WotId> {
        let removed = self.nodes.pop().ok_or(WotError::EmptyGraph)?;
        let id = WotId(self.nodes.len());
        for issuer in &removed.sources {
            if let Some(node) = self.nodes.get_mut(issuer.0) {
                node.issued = node.issued.saturating_sub(1);
            }
        }
        if removed.issued > 0 {
            for node in &mut self.nodes {
                node.sources.remove(&id);
            }
        }
        Ok(id)
    }

    pub fn is_enabled(&self, id: WotId) -> Option<bool> {
        self.nodes.get(id.0).map(|n| n.enabled)
    }

    pub fn set_enabled(&mut self, id: WotId, enabled: bool) -> WotResult<()> {
        let node = self
            .nodes
            .get_mut(id.0)
            .ok_or(WotError::UnknownNode(id))?;
        node.enabled = enabled;
        Ok(())
    }

    // === LINKS ===

    /// Add a link `issuer → receiver`. Returns the receiver's incoming link count.
    pub fn add_link(&mut self, issuer: WotId, receiver: WotId) -> WotResult<usize> {
        if issuer == receiver {
            return Err(WotError::SelfLink(issuer));
        }
        self.check_node(issuer)?;
        self.check_node(receiver)?;
        if self.nodes[issuer.0].issued >= self.max_links {
            return Err(WotError::AllCertificationsUsed {
                issuer,
                max: self.max_links,
            });
        }
        if self.nodes[receiver.0].sources.insert(issuer) {
            self.nodes[issuer.0].issued += 1;
        }
        Ok(self.nodes[receiver.0].sources.len())
    }

    /// Remove the link `issuer → receiver`. Returns the receiver's incoming link count.
    pub fn remove_link(&mut self, issuer: WotId, receiver: WotId) -> WotResult<usize> {
        self.check_node(issuer)?;
        self.check_node(receiver)?;
        if !self.nodes[receiver.0].sources.remove(&issuer) {
            return Err(WotError::UnknownLink { issuer, receiver });
        }
        self.nodes[issuer.0].issued -= 1;
        Ok(self.nodes[receiver.0].sources.len())
    }

    pub fn has_link(&self, issuer: WotId, receiver: WotId) -> bool {
        self.nodes
            .get(receiver.0)
            .map(|n| n.sources.contains(&issuer))
            .unwrap_or(false)
    }

    /// Issuers of the links received by `id`.
    pub fn sources_of(&self, id: WotId) -> Option<&HashSet<WotId>> {
        self.nodes.get(id.0).map(|n| &n.sources)
    }

    pub fn issued_count(&self, id: WotId) -> Option<usize> {
        self.nodes.get(id.0).map(|n| n.issued)
    }

    // === SENTRIES ===

    pub fn is_sentry(&self, id: WotId, requirement: usize) -> Option<bool> {
        self.nodes.get(id.0).map(|n| Self::node_is_sentry(n, requirement))
    }

    /// Every enabled node that issued and received at least `requirement` links.
    pub fn sentries(&self, requirement: usize) -> Vec<WotId> {
        self.nodes
            .par_iter()
            .enumerate()
            .filter(|(_, n)| Self::node_is_sentry(n, requirement))
            .map(|(i, _)| WotId(i))
            .collect()
    }

    fn node_is_sentry(node: &WotNode, requirement: usize) -> bool {
        node.enabled && node.issued >= requirement && node.sources.len() >= requirement
    }

    fn check_node(&self, id: WotId) -> WotResult<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(WotError::UnknownNode(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_graph(size: usize) -> TrustGraph {
        let mut graph = TrustGraph::new(10);
        for _ in 0..size {
            graph.add_node();
        }
        graph
    }

    #[test]
    fn test_add_node_assigns_dense_ids() {
        let mut graph = TrustGraph::default();
        assert_eq!(graph.add_node(), WotId(0));
        assert_eq!(graph.add_node(), WotId(1));
        assert_eq!(graph.size(), 2);
        assert_eq!(graph.is_enabled(WotId(1)), Some(true));
    }

    #[test]
    fn test_links_and_counts() {
        let mut graph = create_graph(3);
        assert_eq!(graph.add_link(WotId(0), WotId(1)), Ok(1));
        assert_eq!(graph.add_link(WotId(2), WotId(1)), Ok(2));
        assert!(graph.has_link(WotId(0), WotId(1)));
        assert_eq!(graph.issued_count(WotId(0)), Some(1));
        assert_eq!(graph.link_count(), 2);

        assert_eq!(graph.remove_link(WotId(0), WotId(1)), Ok(1));
        assert_eq!(graph.issued_count(WotId(0)), Some(0));
        assert_eq!(
            graph.remove_link(WotId(0), WotId(1)),
            Err(WotError::UnknownLink {
                issuer: WotId(0),
                receiver: WotId(1)
            })
        );
    }

    #[test]
    fn test_link_errors() {
        let mut graph = create_graph(2);
        assert_eq!(graph.add_link(WotId(0), WotId(0)), Err(WotError::SelfLink(WotId(0))));
        assert_eq!(
            graph.add_link(WotId(0), WotId(5)),
            Err(WotError::UnknownNode(WotId(5)))
        );

        graph.set_max_links(1);
        graph.add_node();
        graph.add_link(WotId(0), WotId(1)).unwrap();
        assert!(matches!(
            graph.add_link(WotId(0), WotId(2)),
            Err(WotError::AllCertificationsUsed { .. })
        ));
    }

    #[test]
    fn test_duplicate_link_is_not_counted_twice() {
        let mut graph = create_graph(2);
        graph.add_link(WotId(0), WotId(1)).unwrap();
        graph.add_link(WotId(0), WotId(1)).unwrap();
        assert_eq!(graph.issued_count(WotId(0)), Some(1));
    }

    #[test]
    fn test_remove_node_drops_its_links() {
        let mut graph = create_graph(3);
        graph.add_link(WotId(0), WotId(2)).unwrap();
        graph.add_link(WotId(2), WotId(1)).unwrap();

        assert_eq!(graph.remove_node(), Ok(WotId(2)));
        assert_eq!(graph.issued_count(WotId(0)), Some(0));
        assert!(graph.sources_of(WotId(1)).unwrap().is_empty());
        assert_eq!(graph.link_count(), 0);

        graph.clear();
        assert_eq!(graph.remove_node(), Err(WotError::EmptyGraph));
    }

    #[test]
    fn test_sentries_require_enabled_and_both_directions() {
        let mut graph = create_graph(3);
        graph.add_link(WotId(0), WotId(1)).unwrap();
        graph.add_link(WotId(1), WotId(0)).unwrap();
        graph.add_link(WotId(2), WotId(0)).unwrap();

        let mut sentries = graph.sentries(1);
        sentries.sort();
        assert_eq!(sentries, vec![WotId(0), WotId(1)]);

        graph.set_enabled(WotId(0), false).unwrap();
        assert_eq!(graph.sentries(1), vec![WotId(1)]);
        assert_eq!(graph.is_sentry(WotId(2), 1), Some(false));
    }

    #[test]
    fn test_serde_roundtrip_preserves_graph() {
        let mut graph = create_graph(2);
        graph.add_link(WotId(0), WotId(1)).unwrap();
        let json = serde_json::to_string(&graph).unwrap();
        let back: TrustGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }
}
