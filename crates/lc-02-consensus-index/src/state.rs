use lc_01_web_of_trust::TrustGraph;
use parking_lot::RwLock;

/// Mutable state of the blockchain service besides the store.
///
/// The trust graph mirrors the written certification index. `halted` holds
/// the reason of a failed revert; while it is set, no revert is attempted.
/// `trim_failure` holds the last trimming error until a trim succeeds again.
pub struct ChainState {
    pub graph: RwLock<TrustGraph>,
    halted: RwLock<Option<String>>,
    trim_failure: RwLock<Option<String>>,
}

impl ChainState {
    pub fn new(graph: TrustGraph) -> Self {
        Self {
            graph: RwLock::new(graph),
            halted: RwLock::new(None),
            trim_failure: RwLock::new(None),
        }
    }

    pub fn halted(&self) -> Option<String> {
        self.halted.read().clone()
    }

    pub fn halt(&self, reason: impl Into<String>) {
        *self.halted.write() = Some(reason.into());
    }

    /// Operator acknowledgement after a halted revert was repaired.
    pub fn resume(&self) {
        *self.halted.write() = None;
    }

    pub fn trim_failure(&self) -> Option<String> {
        self.trim_failure.read().clone()
    }

    pub fn set_trim_failure(&self, failure: Option<String>) {
        *self.trim_failure.write() = failure;
    }
}
