//! Currency parameters
//!
//! Fixed for the lifetime of a currency. Field names follow the protocol
//! (`sigQty`, `msValidity`, ...) on the wire.

use crate::domain::error::{ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};

/// Monetary and web of trust parameters of the currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrencyParameters {
    pub currency: String,
    /// Relative growth of the universal dividend per `dtReeval`.
    pub c: f64,
    /// Seconds between two dividends.
    pub dt: u64,
    /// Seconds between two dividend re-evaluations.
    pub dt_reeval: u64,
    /// First dividend amount.
    pub ud0: u64,
    #[serde(rename = "udTime0")]
    pub ud_time0: u64,
    #[serde(rename = "udReevalTime0")]
    pub ud_reeval_time0: u64,
    /// Minimum delay between two certifications of the same issuer.
    pub sig_period: u64,
    /// Maximum number of valid certifications issued by one member.
    pub sig_stock: u64,
    /// Maximum age of a certification reference block.
    pub sig_window: u64,
    pub sig_validity: u64,
    /// Certifications required to become or stay a member.
    pub sig_qty: u64,
    pub idty_window: u64,
    pub ms_window: u64,
    /// Minimum delay between two memberships of the same member.
    pub ms_period: u64,
    pub ms_validity: u64,
    #[serde(rename = "xpercent")]
    pub x_percent: f64,
    pub step_max: u32,
    pub median_time_blocks: u64,
    pub avg_gen_time: u64,
    pub dt_diff_eval: u64,
    pub percent_rot: f64,
    /// Blocks that can be reverted by a fork switch.
    pub fork_window_size: u64,
}

impl Default for CurrencyParameters {
    fn default() -> Self {
        Self {
            currency: "g1".to_string(),
            c: 0.0488,
            dt: 86_400,
            dt_reeval: 15_778_800,
            ud0: 1_000,
            ud_time0: 1_488_970_800,
            ud_reeval_time0: 1_490_094_000,
            sig_period: 432_000,
            sig_stock: 100,
            sig_window: 5_259_600,
            sig_validity: 63_115_200,
            sig_qty: 5,
            idty_window: 5_259_600,
            ms_window: 5_259_600,
            ms_period: 5_259_600,
            ms_validity: 31_557_600,
            x_percent: 0.8,
            step_max: 5,
            median_time_blocks: 24,
            avg_gen_time: 300,
            dt_diff_eval: 12,
            percent_rot: 0.67,
            fork_window_size: 100,
        }
    }
}

impl CurrencyParameters {
    /// Reject parameters that would make HEAD derivation divide by zero or
    /// produce meaningless ratios.
    pub fn validate(&self) -> ConsensusResult<()> {
        let invalid = |reason: &str| Err(ConsensusError::InvalidParameters(reason.to_string()));
        if self.currency.is_empty() {
            return invalid("currency name is empty");
        }
        if self.step_max == 0 {
            return invalid("stepMax must be positive");
        }
        if self.dt == 0 || self.dt_reeval == 0 {
            return invalid("dt and dtReeval must be positive");
        }
        if self.avg_gen_time == 0 {
            return invalid("avgGenTime must be positive");
        }
        if !(0.0..=1.0).contains(&self.x_percent) {
            return invalid("xpercent must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.percent_rot) {
            return invalid("percentRot must be within [0, 1]");
        }
        Ok(())
    }

    /// Number of HEADs kept in history:
    /// `forkWindowSize + max(issuersCount, issuersFrame, medianTimeBlocks, dtDiffEval)`,
    /// and never less than twice that maximum.
    pub fn bindex_size(&self, issuers_count: u64, issuers_frame: u64) -> u64 {
        let window = issuers_count
            .max(issuers_frame)
            .max(self.median_time_blocks)
            .max(self.dt_diff_eval);
        (self.fork_window_size + window).max(2 * window)
    }
}
