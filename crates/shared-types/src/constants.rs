//! # Protocol Constants
//!
//! Values fixed by the protocol. Changing any of them forks the network.

/// Version of the canonical raw documents.
pub const DOCUMENTS_VERSION: u32 = 10;

/// SHA-256 of the empty string, used as the hash of the virtual block preceding genesis.
pub const SPECIAL_HASH: &str = "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855";

/// Blockstamp referenced by documents issued before the genesis block exists.
pub const SPECIAL_BLOCK: &str =
    "0-E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855";

/// Multiplier applied to `msValidity` to compute `revokes_on`.
pub const REVOCATION_FACTOR: u64 = 2;

/// Maximum age of a transaction reference block (one week).
pub const TX_WINDOW: u64 = 3600 * 24 * 7;

/// Number of digits a dividend may have before the unit base is raised.
pub const NB_DIGITS_UD: u32 = 4;

/// Ratio between two successive difficulty levels, close to 16^(1/16).
pub const POW_DIFFICULTY_RANGE_RATIO: f64 = 1.189;

/// Minimum account balance, in units of the current base, below which sources are destroyed.
pub const ACCOUNT_MINIMUM_CURRENT_BASED_AMOUNT: i64 = 100;

/// Minimum value of the maximum block size.
pub const MIN_MAX_BLOCK_SIZE: u64 = 500;

/// Median time from which membership chainability is enforced.
pub const MEMBERSHIP_PERIOD_ACTIVATION_TIME: u64 = 1_498_860_000;

/// Highest accepted hexadecimal character after the required leading zeros,
/// indexed by the difficulty remainder. Remainder 15 never occurs, it shares the bound of 14.
pub const POW_UPPER_BOUND: [char; 16] = [
    'F', 'E', 'D', 'C', 'B', 'A', '9', '8', '7', '6', '5', '4', '3', '2', '1', '1',
];
