//! # Output Conditions
//!
//! Grammar of the conditions locking a source, and their evaluation against
//! the proofs supplied by a spending transaction.
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := primary ( "&&" primary )*
//! primary := "(" expr ")" | SIG(pubkey) | XHX(hash) | CSV(seconds) | CLTV(time)
//! ```
//!
//! `&&` binds tighter than `||`. Anything that does not parse fails closed:
//! [`source_unlocks`] answers `false`.

use crate::domain::error::{ConsensusError, ConsensusResult};
use shared_types::ParseError;
use std::str::FromStr;

/// Deepest parenthesis nesting accepted.
const MAX_DEPTH: usize = 32;

/// Parsed output condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Signature of the given public key.
    Sig(String),
    /// Preimage of the given uppercase SHA-256 hash.
    Xhx(String),
    /// Relative lock: seconds elapsed since the source was written.
    Csv(u64),
    /// Absolute lock: median time reached.
    Cltv(u64),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

/// Proofs a transaction input offers, already checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockProofs {
    /// Issuers whose `SIG(i)` parameter is present and whose signature verifies.
    pub signers: Vec<String>,
    /// Uppercase SHA-256 of every `XHX(x)` parameter.
    pub preimage_hashes: Vec<String>,
    /// Seconds between the source write and the current median time.
    pub elapsed: u64,
    /// Current median time.
    pub current_time: u64,
}

impl Condition {
    pub fn evaluate(&self, proofs: &UnlockProofs) -> bool {
        match self {
            Condition::Sig(pubkey) => proofs.signers.iter().any(|s| s == pubkey),
            Condition::Xhx(hash) => proofs.preimage_hashes.iter().any(|h| h == hash),
            Condition::Csv(delay) => proofs.elapsed >= *delay,
            Condition::Cltv(time) => proofs.current_time >= *time,
            Condition::And(left, right) => left.evaluate(proofs) && right.evaluate(proofs),
            Condition::Or(left, right) => left.evaluate(proofs) || right.evaluate(proofs),
        }
    }
}

impl FromStr for Condition {
    type Err = ConsensusError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(raw)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            raw,
        };
        let condition = parser.expr(0)?;
        if parser.pos != tokens.len() {
            return Err(parser.error());
        }
        Ok(condition)
    }
}

/// `true` when `conditions` parses and holds under `proofs`.
pub fn source_unlocks(conditions: &str, proofs: &UnlockProofs) -> bool {
    conditions
        .parse::<Condition>()
        .map(|c| c.evaluate(proofs))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Call(Function, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Sig,
    Xhx,
    Csv,
    Cltv,
}

fn malformed(raw: &str) -> ConsensusError {
    ConsensusError::Structural(ParseError::InvalidUnlock(raw.to_string()))
}

fn tokenize(raw: &str) -> ConsensusResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = raw.trim_start();
    while !rest.is_empty() {
        if let Some(r) = rest.strip_prefix("&&") {
            tokens.push(Token::And);
            rest = r;
        } else if let Some(r) = rest.strip_prefix("||") {
            tokens.push(Token::Or);
            rest = r;
        } else if let Some(r) = rest.strip_prefix('(') {
            tokens.push(Token::Open);
            rest = r;
        } else if let Some(r) = rest.strip_prefix(')') {
            tokens.push(Token::Close);
            rest = r;
        } else {
            let (function, after) = [
                ("SIG(", Function::Sig),
                ("XHX(", Function::Xhx),
                ("CSV(", Function::Csv),
                ("CLTV(", Function::Cltv),
            ]
            .iter()
            .find_map(|(prefix, f)| rest.strip_prefix(prefix).map(|r| (*f, r)))
            .ok_or_else(|| malformed(raw))?;
            let end = after.find(')').ok_or_else(|| malformed(raw))?;
            let arg = &after[..end];
            if arg.is_empty() || !arg.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(malformed(raw));
            }
            tokens.push(Token::Call(function, arg.to_string()));
            rest = &after[end + 1..];
        }
        rest = rest.trim_start();
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    raw: &'a str,
}

impl Parser<'_> {
    fn error(&self) -> ConsensusError {
        malformed(self.raw)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self, depth: usize) -> ConsensusResult<Condition> {
        let mut left = self.and(depth)?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and(depth)?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self, depth: usize) -> ConsensusResult<Condition> {
        let mut left = self.primary(depth)?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.primary(depth)?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self, depth: usize) -> ConsensusResult<Condition> {
        let token = self.peek().cloned().ok_or_else(|| self.error())?;
        self.pos += 1;
        match token {
            Token::Open => {
                if depth >= MAX_DEPTH {
                    return Err(self.error());
                }
                let inner = self.expr(depth + 1)?;
                if self.peek() != Some(&Token::Close) {
                    return Err(self.error());
                }
                self.pos += 1;
                Ok(inner)
            }
            Token::Call(function, arg) => self.call(function, arg),
            Token::Close | Token::And | Token::Or => Err(self.error()),
        }
    }

    fn call(&self, function: Function, arg: String) -> ConsensusResult<Condition> {
        let number = |arg: &str| arg.parse::<u64>().map_err(|_| self.error());
        Ok(match function {
            Function::Sig => Condition::Sig(arg),
            Function::Xhx => Condition::Xhx(arg),
            Function::Csv => Condition::Csv(number(&arg)?),
            Function::Cltv => Condition::Cltv(number(&arg)?),
        })
    }
}
