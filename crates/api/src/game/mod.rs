pub mod bracket;
pub mod engine;
pub mod error;
pub mod moves;
pub mod resolver;

pub use engine::{ProcessOutcome, StartOutcome, TournamentEngine};
pub use error::GameError;
pub use moves::Move;
pub use resolver::{Contender, FirstSeedWins, OracleTieBreak, TieBreaker, TiePolicy, Verdict};

/// Users are identified by their social-graph id.
pub type UserId = i64;
