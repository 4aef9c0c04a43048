use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Lifecycle of a tournament. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "tournament_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    Created,
    Registering,
    Active,
    Completed,
}

impl TournamentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentState::Created => "created",
            TournamentState::Registering => "registering",
            TournamentState::Active => "active",
            TournamentState::Completed => "completed",
        }
    }

    /// Numeric code exposed to frame clients.
    pub fn code(&self) -> u8 {
        match self {
            TournamentState::Created => 0,
            TournamentState::Registering => 1,
            TournamentState::Active => 2,
            TournamentState::Completed => 3,
        }
    }
}

impl FromStr for TournamentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TournamentState::Created),
            "registering" => Ok(TournamentState::Registering),
            "active" => Ok(TournamentState::Active),
            "completed" => Ok(TournamentState::Completed),
            _ => Err(format!("Unknown tournament state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TournamentRow {
    pub id: i64,
    pub registration_start: DateTime<Utc>,
    pub scheduled_start: DateTime<Utc>,
    pub round_length_minutes: i32,
    pub max_rounds: i32,
    pub state: TournamentState,
    pub current_round_id: Option<i64>,
    pub completed: bool,
    pub winner_id: Option<i64>,
    pub sponsor_id: Option<i64>,
    pub winner_reward: Option<i64>,
    pub deposit_id: Option<String>,
    pub announcement_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TournamentRow {
    /// Number of bracket slots the configured round budget allows.
    pub fn capacity(&self) -> i64 {
        1i64 << self.max_rounds.clamp(0, 62)
    }

    /// Registration is open while the tournament is registering and no round has started.
    pub fn accepts_registrations(&self) -> bool {
        self.state == TournamentState::Registering && self.current_round_id.is_none()
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoundRow {
    pub id: i64,
    pub tournament_id: i64,
    pub round_number: i32,
    pub deadline: DateTime<Utc>,
}

/// Which side of a match a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSlot {
    A,
    B,
}

impl MatchSlot {
    pub fn move_column(&self) -> &'static str {
        match self {
            MatchSlot::A => "move_a",
            MatchSlot::B => "move_b",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MatchRow {
    pub id: i64,
    pub round_id: i64,
    pub player_a: i64,
    pub player_b: Option<i64>,
    pub move_a: Option<i16>,
    pub move_b: Option<i16>,
    pub winner_id: Option<i64>,
}

impl MatchRow {
    pub fn slot_of(&self, user_id: i64) -> Option<MatchSlot> {
        if self.player_a == user_id {
            Some(MatchSlot::A)
        } else if self.player_b == Some(user_id) {
            Some(MatchSlot::B)
        } else {
            None
        }
    }

    pub fn move_in(&self, slot: MatchSlot) -> Option<i16> {
        match slot {
            MatchSlot::A => self.move_a,
            MatchSlot::B => self.move_b,
        }
    }

    /// The other participant, if `user_id` plays in this match.
    pub fn opponent_of(&self, user_id: i64) -> Option<i64> {
        match self.slot_of(user_id)? {
            MatchSlot::A => self.player_b,
            MatchSlot::B => Some(self.player_a),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RegistrationRow {
    pub id: i64,
    pub tournament_id: i64,
    pub user_id: i64,
    pub registered_at: DateTime<Utc>,
    pub token_balance: Option<f64>,
    pub forced: bool,
}

/// A registration joined with the registrant's last activity, used for seeding.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ParticipantRow {
    pub registration_id: i64,
    pub user_id: i64,
    pub registered_at: DateTime<Utc>,
    pub token_balance: Option<f64>,
    pub last_played: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub image: Option<String>,
    pub last_played: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTournament {
    pub registration_start: DateTime<Utc>,
    pub scheduled_start: DateTime<Utc>,
    pub round_length_minutes: i32,
    pub max_rounds: i32,
    pub sponsor_id: Option<i64>,
    pub winner_reward: Option<i64>,
    pub deposit_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRound {
    pub round_number: i32,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewMatch {
    pub player_a: i64,
    pub player_b: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub tournament_id: i64,
    pub user_id: i64,
    pub registered_at: DateTime<Utc>,
    pub token_balance: Option<f64>,
    pub forced: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub image: Option<String>,
}
