//! Error types for graph mutation.

use crate::domain::WotId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WotError {
    #[error("Unknown node {0}")]
    UnknownNode(WotId),

    #[error("Node {0} cannot certify itself")]
    SelfLink(WotId),

    #[error("Node {issuer} already issued {max} certifications")]
    AllCertificationsUsed { issuer: WotId, max: usize },

    #[error("No link from {issuer} to {receiver}")]
    UnknownLink { issuer: WotId, receiver: WotId },

    #[error("Cannot remove a node from an empty graph")]
    EmptyGraph,
}

pub type WotResult<T> = Result<T, WotError>;
