//! # HEAD Derivation
//!
//! HEAD is the summary of the chain state at one block. It is derived from
//! the block, its local identity entries, and a window of previous HEADs
//! (newest first, `history[0]` being HEAD_1).
//!
//! The derivation is pure. Both the full validation path (history read from
//! the store) and quick sync (history kept in a rolling in-memory window) go
//! through [`derive_head`], so they agree on identical input history.
//!
//! ```text
//!   G01-G03 number, previous hash/issuer      G11-G15 dividend schedule, unit base, mass
//!   G04-G07 issuers count/frame, avg size     G16-G17 speed, powMin
//!   G08     median time                       G18     personalized difficulty
//!   G09-G10 difficulty step, members count
//! ```
//!
//! `issuerIsMember` needs the identity index and is set by the caller.

use crate::domain::config::CurrencyParameters;
use crate::domain::entries::IdentityEntry;
use serde::{Deserialize, Serialize};
use shared_types::constants::{NB_DIGITS_UD, POW_DIFFICULTY_RANGE_RATIO};
use shared_types::{Block, Blockstamp};
use std::collections::{HashMap, HashSet};

/// Chain state summary at one block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Head {
    pub version: u32,
    pub currency: String,
    pub number: u64,
    pub hash: String,
    pub previous_hash: Option<String>,
    pub previous_issuer: Option<String>,
    pub issuer: String,
    pub issuer_is_member: bool,
    pub time: u64,
    pub median_time: u64,
    pub bsize: u64,
    pub avg_block_size: u64,
    pub issuers_count: u64,
    pub issuers_frame: u64,
    pub issuers_frame_var: i64,
    pub diff_number: u64,
    pub speed: f64,
    pub pow_min: u32,
    pub issuer_diff: u32,
    pub pow_zeros: u32,
    pub pow_remainder: u32,
    pub members_count: u64,
    pub ud_time: u64,
    pub ud_reeval_time: u64,
    pub dividend: u64,
    /// Dividend created by this block, if it creates one.
    pub new_dividend: Option<u64>,
    pub unit_base: u32,
    pub mass: u64,
    pub mass_reeval: u64,
}

impl Head {
    pub fn blockstamp(&self) -> Blockstamp {
        Blockstamp::new(self.number, self.hash.clone())
    }
}

/// Number of previous HEADs [`derive_head`] reads after `head_1`.
pub fn history_depth(head_1: Option<&Head>, params: &CurrencyParameters) -> usize {
    match head_1 {
        None => 0,
        Some(head_1) => head_1
            .issuers_frame
            .max(head_1.issuers_count)
            .max(params.median_time_blocks)
            .max(params.dt_diff_eval) as usize,
    }
}

/// Derive the HEAD of `block` on top of `history`.
pub fn derive_head(
    block: &Block,
    params: &CurrencyParameters,
    iindex: &[IdentityEntry],
    history: &[Head],
) -> Head {
    let mut head = Head {
        version: block.version,
        hash: block.hash.clone(),
        issuer: block.issuer.clone(),
        time: block.time,
        bsize: block.size(),
        pow_min: block.pow_min,
        ..Head::default()
    };

    let joined = iindex.iter().filter(|e| e.member == Some(true)).count() as u64;
    let left = iindex.iter().filter(|e| e.member == Some(false)).count() as u64;

    match history.first() {
        None => derive_genesis(&mut head, block, params, joined),
        Some(head_1) => derive_next(&mut head, head_1, history, params, joined, left),
    }

    prepare_personalized_pow(&mut head, history, params);
    head
}

fn derive_genesis(head: &mut Head, block: &Block, params: &CurrencyParameters, joined: u64) {
    head.currency = block.currency.clone();
    head.number = 0;
    head.issuers_count = 0;
    head.issuers_frame = 1;
    head.issuers_frame_var = 0;
    head.avg_block_size = 0;
    head.median_time = block.time;
    head.diff_number = params.dt_diff_eval;
    head.members_count = joined;
    head.ud_time = params.ud_time0;
    head.ud_reeval_time = params.ud_reeval_time0;
    head.unit_base = 0;
    head.dividend = params.ud0;
    head.new_dividend = None;
    head.mass = 0;
    head.mass_reeval = 0;
    head.speed = 0.0;
    prepare_unit_base(head);
}

fn derive_next(
    head: &mut Head,
    head_1: &Head,
    history: &[Head],
    params: &CurrencyParameters,
    joined: u64,
    left: u64,
) {
    // BR_G01 - BR_G03, BR_G99
    head.number = head_1.number + 1;
    head.previous_hash = Some(head_1.hash.clone());
    head.previous_issuer = Some(head_1.issuer.clone());
    head.currency = params.currency.clone();

    // BR_G04
    let frame = range(history, head_1.issuers_frame);
    head.issuers_count = frame
        .iter()
        .map(|h| h.issuer.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    // BR_G05
    head.issuers_frame = match head_1.issuers_frame_var {
        v if v > 0 => head_1.issuers_frame + 1,
        v if v < 0 => head_1.issuers_frame.saturating_sub(1),
        _ => head_1.issuers_frame,
    };

    // BR_G06
    let issuers_var = head.issuers_count as i64 - head_1.issuers_count as i64;
    head.issuers_frame_var = match head_1.issuers_frame_var {
        v if v > 0 => v + 5 * issuers_var - 1,
        v if v < 0 => v + 5 * issuers_var + 1,
        v => v + 5 * issuers_var,
    };

    // BR_G07
    head.avg_block_size = floor_average(
        range(history, head.issuers_count)
            .iter()
            .map(|h| h.bsize),
    );

    // BR_G08
    let times = range(history, params.median_time_blocks.min(head.number))
        .iter()
        .map(|h| h.time);
    head.median_time = head_1.median_time.max(floor_average(times));

    // BR_G09
    head.diff_number = if head_1.diff_number <= head.number {
        head_1.diff_number + params.dt_diff_eval
    } else {
        head_1.diff_number
    };

    // BR_G10
    head.members_count = (head_1.members_count + joined).saturating_sub(left);

    // BR_G11
    head.ud_time = if head_1.ud_time <= head.median_time {
        head_1.ud_time + params.dt
    } else {
        head_1.ud_time
    };
    head.ud_reeval_time = if head_1.ud_reeval_time <= head.median_time {
        head_1.ud_reeval_time + params.dt_reeval
    } else {
        head_1.ud_reeval_time
    };

    // BR_G12
    head.unit_base = head_1.unit_base;

    // BR_G13
    head.dividend = if head.ud_reeval_time != head_1.ud_reeval_time && head.members_count > 0 {
        reevaluated_dividend(head_1, head.members_count, params)
    } else {
        head_1.dividend
    };
    head.new_dividend = if head.ud_time != head_1.ud_time {
        Some(head.dividend)
    } else {
        None
    };

    // BR_G14, then BR_G15 on the rolled over dividend
    let creates_dividend = head.ud_time != head_1.ud_time;
    let reevaluates = head.ud_reeval_time != head_1.ud_reeval_time;
    prepare_unit_base(head);
    head.mass = if creates_dividend {
        head_1.mass + head.dividend * 10u64.pow(head.unit_base) * head.members_count
    } else {
        head_1.mass
    };
    head.mass_reeval = if reevaluates {
        head_1.mass
    } else {
        head_1.mass_reeval
    };

    // BR_G16
    let quantity = params.dt_diff_eval.min(head.number);
    let reference = if quantity == 0 {
        None
    } else {
        history
            .get(quantity as usize - 1)
            .or_else(|| history.last())
    };
    let elapsed = reference
        .map(|r| head.median_time.saturating_sub(r.median_time))
        .unwrap_or(0);
    head.speed = if elapsed == 0 {
        100.0
    } else {
        quantity as f64 / elapsed as f64
    };

    // BR_G17
    head.pow_min = next_pow_min(head, head_1, params);
}

/// `ceil(UD(t-1) + c² × ceil(M(t-1) / 10^base) / N / (dtReeval / dt))`
fn reevaluated_dividend(head_1: &Head, members_count: u64, params: &CurrencyParameters) -> u64 {
    let mass = (head_1.mass_reeval as f64 / 10f64.powi(head_1.unit_base as i32)).ceil();
    let periods = params.dt_reeval as f64 / params.dt as f64;
    (head_1.dividend as f64 + params.c * params.c * mass / members_count as f64 / periods).ceil()
        as u64
}

// BR_G14
fn prepare_unit_base(head: &mut Head) {
    if head.dividend >= 10u64.pow(NB_DIGITS_UD) {
        head.dividend = head.dividend.div_ceil(10);
        head.new_dividend = Some(head.dividend);
        head.unit_base += 1;
    }
}

fn next_pow_min(head: &Head, head_1: &Head, params: &CurrencyParameters) -> u32 {
    let max_gen_time = (params.avg_gen_time as f64 * POW_DIFFICULTY_RANGE_RATIO).ceil();
    let min_gen_time = (params.avg_gen_time as f64 / POW_DIFFICULTY_RANGE_RATIO).floor();
    let min_speed = 1.0 / max_gen_time;
    let max_speed = 1.0 / min_gen_time;
    let p = head_1.pow_min;

    if head.diff_number == head_1.diff_number {
        p
    } else if head.speed >= max_speed {
        if (p + 2) % 16 == 0 {
            p + 2
        } else {
            p + 1
        }
    } else if head.speed <= min_speed {
        if p % 16 == 0 {
            p.saturating_sub(2)
        } else {
            p.saturating_sub(1)
        }
    } else {
        p
    }
}

// BR_G18
fn prepare_personalized_pow(head: &mut Head, history: &[Head], params: &CurrencyParameters) {
    let mut nb_personal_blocks = 0usize;
    let mut median_of_blocks = 1.0;
    let mut nb_previous_issuers = 0u64;
    let mut nb_blocks_since = 0u64;

    if let Some(head_1) = history.first() {
        let in_frame: Vec<&Head> = range(history, head_1.issuers_frame)
            .iter()
            .filter(|h| h.number <= head_1.number)
            .collect();
        let mut per_issuer: HashMap<&str, u64> = HashMap::new();
        for h in &in_frame {
            *per_issuer.entry(h.issuer.as_str()).or_default() += 1;
        }
        let mut counts: Vec<u64> = per_issuer.into_values().collect();
        median_of_blocks = median(&mut counts).max(1.0);

        let mut of_issuer = in_frame.iter().filter(|h| h.issuer == head.issuer);
        if let Some(last) = of_issuer.next() {
            nb_personal_blocks = 1 + of_issuer.count();
            nb_previous_issuers = last.issuers_count;
            nb_blocks_since = head_1.number - last.number;
        }
    }

    let excess = ((nb_personal_blocks as f64 + 1.0) / median_of_blocks - 1.0).max(0.0);
    let handicap = ((1.0 + excess).ln() / POW_DIFFICULTY_RANGE_RATIO.ln()).floor() as u32;
    let rotation = (params.percent_rot * nb_previous_issuers as f64 / (1 + nb_blocks_since) as f64)
        .floor() as u32;
    let mut issuer_diff = head.pow_min.max(head.pow_min * rotation) + handicap;
    if (issuer_diff + 1) % 16 == 0 {
        issuer_diff += 1;
    }
    head.issuer_diff = issuer_diff;
    head.pow_remainder = issuer_diff % 16;
    head.pow_zeros = (issuer_diff - head.pow_remainder) / 16;
}

/// The `n` HEADs before the current one.
fn range(history: &[Head], n: u64) -> &[Head] {
    let n = (n as usize).min(history.len());
    &history[..n]
}

fn floor_average(values: impl Iterator<Item = u64>) -> u64 {
    let (sum, count) = values.fold((0u64, 0u64), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0
    } else {
        sum / count
    }
}

/// Median; the mean of the two central values for an even count, 0 when empty.
fn median(values: &mut [u64]) -> f64 {
    values.sort_unstable();
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 0 {
        (values[n / 2 - 1] as f64 + values[n / 2] as f64) / 2.0
    } else {
        values[n / 2] as f64
    }
}
