use serde::{Deserialize, Serialize};

use super::GameError;

/// The three throws. Each one beats the throw two steps after it, modulo 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Move {
    Rock = 0,
    Paper = 1,
    Scissors = 2,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn value(self) -> i16 {
        self as i16
    }

    pub fn beats(self, other: Move) -> bool {
        (self.value() + 2) % 3 == other.value()
    }

    pub fn name(self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }

    /// Decode a stored move column.
    pub fn from_stored(value: Option<i16>) -> Result<Option<Move>, GameError> {
        value.map(|v| Move::try_from(i64::from(v))).transpose()
    }
}

impl TryFrom<i64> for Move {
    type Error = GameError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Move::Rock),
            1 => Ok(Move::Paper),
            2 => Ok(Move::Scissors),
            other => Err(GameError::InvalidMove(other)),
        }
    }
}
