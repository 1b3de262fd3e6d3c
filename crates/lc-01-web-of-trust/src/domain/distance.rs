//! # Distance Rule
//!
//! Breadth-first walk along incoming links: step `k` reaches every issuer that
//! certified a node reached at step `k - 1`.

use crate::domain::graph::{TrustGraph, WotId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Parameters of one distance evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceParameters {
    /// Minimum issued and received links for a node to be a sentry.
    pub sentry_requirement: usize,
    /// Maximum number of steps between a sentry and the evaluated node.
    pub step_max: u32,
    /// Fraction of sentries that must reach the evaluated node.
    pub x_percent: f64,
}

/// Outcome of a distance evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WotDistance {
    /// Number of sentries, excluding the evaluated node itself.
    pub sentries: u32,
    /// Sentries reached within `step_max` steps.
    pub success: u32,
    /// Sentries reached exactly at the last step.
    pub success_at_border: u32,
    /// Nodes reached, excluding the evaluated node.
    pub reached: u32,
    /// Nodes reached exactly at the last step.
    pub reached_at_border: u32,
    pub outdistanced: bool,
}

/// `dSen = ceil(membersCount^(1/stepMax))`.
pub fn sentry_requirement(members_count: u64, step_max: u32) -> usize {
    if step_max == 0 {
        return members_count as usize;
    }
    (members_count as f64).powf(1.0 / f64::from(step_max)).ceil() as usize
}

/// Evaluate the distance of `node` to the sentries. `None` when the node does not exist.
pub fn compute_distance(
    graph: &TrustGraph,
    node: WotId,
    params: DistanceParameters,
) -> Option<WotDistance> {
    let own_sentry = graph.is_sentry(node, params.sentry_requirement)?;

    let mut area: HashSet<WotId> = HashSet::from([node]);
    let mut border: HashSet<WotId> = HashSet::from([node]);

    for _ in 0..params.step_max {
        border = border
            .par_iter()
            .filter_map(|&id| graph.sources_of(id))
            .flat_map_iter(|sources| sources.iter().copied())
            .filter(|source| !area.contains(source))
            .collect();
        if border.is_empty() {
            break;
        }
        area.extend(border.iter().copied());
    }

    let sentries: HashSet<WotId> = graph
        .sentries(params.sentry_requirement)
        .into_iter()
        .collect();
    let mut success = area.iter().filter(|n| sentries.contains(n)).count() as u32;
    let success_at_border = border.iter().filter(|n| sentries.contains(n)).count() as u32;
    let mut sentry_count = sentries.len() as u32;
    if own_sentry {
        sentry_count -= 1;
        success -= 1;
    }

    Some(WotDistance {
        sentries: sentry_count,
        success,
        success_at_border,
        reached: area.len() as u32 - 1,
        reached_at_border: border.len() as u32,
        outdistanced: f64::from(success) < params.x_percent * f64::from(sentry_count),
    })
}

impl TrustGraph {
    /// `Some(true)` when `node` is reached by fewer than `x_percent` of the sentries.
    pub fn is_outdistanced(&self, node: WotId, params: DistanceParameters) -> Option<bool> {
        compute_distance(self, node, params).map(|d| d.outdistanced)
    }
}
