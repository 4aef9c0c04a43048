//! Deciding a single match.
//!
//! [`resolve`] is pure: it looks only at the participants and their moves. Ties
//! are handed to a [`TieBreaker`], which may consult outside data.

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{GameError, Move, UserId};
use crate::clients::TieBreakOracle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Winner(UserId),
    /// Both players threw the same move.
    Tie { a: UserId, b: UserId },
}

/// Decide a match from its participants and their moves.
///
/// A missing participant means the other one advances, and a missing move
/// forfeits to a present one. When neither player moved, slot A advances.
pub fn resolve(
    a: Option<UserId>,
    move_a: Option<Move>,
    b: Option<UserId>,
    move_b: Option<Move>,
) -> Result<Verdict, GameError> {
    let (a, b) = match (a, b) {
        (None, None) => return Err(GameError::InvalidMatch),
        (Some(a), None) => return Ok(Verdict::Winner(a)),
        (None, Some(b)) => return Ok(Verdict::Winner(b)),
        (Some(a), Some(b)) => (a, b),
    };

    let verdict = match (move_a, move_b) {
        (None, None) | (Some(_), None) => Verdict::Winner(a),
        (None, Some(_)) => Verdict::Winner(b),
        (Some(x), Some(y)) if x == y => Verdict::Tie { a, b },
        (Some(x), Some(y)) if x.beats(y) => Verdict::Winner(a),
        (Some(_), Some(_)) => Verdict::Winner(b),
    };
    Ok(verdict)
}

/// One side of a tied match, with the signal captured at registration time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contender {
    pub user_id: UserId,
    pub registration_signal: Option<f64>,
}

#[async_trait]
pub trait TieBreaker: Send + Sync {
    /// Pick the winner of a tied match. Never fails; `a` is the fallback.
    async fn break_tie(&self, a: Contender, b: Contender) -> UserId;
}

/// Deterministic policy: the first-seeded player wins every tie.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSeedWins;

#[async_trait]
impl TieBreaker for FirstSeedWins {
    async fn break_tie(&self, a: Contender, _b: Contender) -> UserId {
        a.user_id
    }
}

/// The player with the higher oracle signal wins. A failed lookup falls back
/// to the registration snapshot, and equal or missing signals favor `a`.
pub struct OracleTieBreak {
    oracle: Arc<dyn TieBreakOracle>,
}

impl OracleTieBreak {
    pub fn new(oracle: Arc<dyn TieBreakOracle>) -> Self {
        Self { oracle }
    }

    async fn signal(&self, contender: Contender) -> Option<f64> {
        match self.oracle.tie_break_signal(contender.user_id).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "Tie-break lookup failed for user {}, using registration snapshot: {}",
                    contender.user_id, e
                );
                contender.registration_signal
            }
        }
    }
}

#[async_trait]
impl TieBreaker for OracleTieBreak {
    async fn break_tie(&self, a: Contender, b: Contender) -> UserId {
        let (signal_a, signal_b) = tokio::join!(self.signal(a), self.signal(b));
        debug!(
            "Tie between {} ({:?}) and {} ({:?})",
            a.user_id, signal_a, b.user_id, signal_b
        );

        match (signal_a, signal_b) {
            (Some(x), Some(y)) if y > x => b.user_id,
            _ => a.user_id,
        }
    }
}

/// Which tie-break rule a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiePolicy {
    #[default]
    FirstSeed,
    Oracle,
}

impl FromStr for TiePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_seed" | "first-seed" => Ok(TiePolicy::FirstSeed),
            "oracle" => Ok(TiePolicy::Oracle),
            other => Err(format!("Unknown tie policy: {}", other)),
        }
    }
}

impl TiePolicy {
    /// Build the breaker for this policy. `Oracle` degrades to `FirstSeed` without an oracle.
    pub fn build(self, oracle: Option<Arc<dyn TieBreakOracle>>) -> Arc<dyn TieBreaker> {
        match (self, oracle) {
            (TiePolicy::Oracle, Some(oracle)) => Arc::new(OracleTieBreak::new(oracle)),
            (TiePolicy::Oracle, None) => {
                warn!("Oracle tie policy configured without an oracle; first seed wins ties");
                Arc::new(FirstSeedWins)
            }
            (TiePolicy::FirstSeed, _) => Arc::new(FirstSeedWins),
        }
    }
}
