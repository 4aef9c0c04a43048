//! Storage seam of the tournament core.
//!
//! Every state-advancing write (`activate`, `advance_round`, `complete`,
//! `record_move`, `record_winner`) is a single conditional update guarded by the
//! expected prior state, and reports `false` instead of overwriting when the
//! guard no longer holds. Match batches are created at most once per round.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::Db;
use crate::models::{
    MatchRow, MatchSlot, NewMatch, NewRegistration, NewRound, NewTournament, NewUser,
    ParticipantRow, RegistrationRow, RoundRow, TournamentRow, TournamentState, UserRow,
};
use crate::repos::{matches, rounds, tournament_registrations, tournaments, users};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(sqlx::Error),

    /// A uniqueness guard rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Db(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TournamentStore: Send + Sync {
    /// Cheap liveness probe.
    async fn ping(&self) -> StoreResult<()>;

    async fn create_tournament(&self, data: NewTournament) -> StoreResult<TournamentRow>;
    async fn get_tournament(&self, id: i64) -> StoreResult<Option<TournamentRow>>;
    async fn get_tournament_by_deposit(&self, deposit_id: &str)
        -> StoreResult<Option<TournamentRow>>;
    async fn list_tournaments_by_state(
        &self,
        state: TournamentState,
    ) -> StoreResult<Vec<TournamentRow>>;
    async fn list_ready_to_start(&self, now: DateTime<Utc>) -> StoreResult<Vec<TournamentRow>>;
    async fn list_due_for_processing(&self, now: DateTime<Utc>)
        -> StoreResult<Vec<TournamentRow>>;

    /// created -> registering for the sponsoring user; `None` if the guard failed.
    async fn open_registration(
        &self,
        id: i64,
        sponsor_id: i64,
        announcement_ref: &str,
    ) -> StoreResult<Option<TournamentRow>>;
    async fn activate(&self, id: i64, round_id: i64) -> StoreResult<bool>;
    async fn advance_round(&self, id: i64, from_round_id: i64, to_round_id: i64)
        -> StoreResult<bool>;
    async fn complete(&self, id: i64, from_round_id: Option<i64>, winner_id: i64)
        -> StoreResult<bool>;
    async fn set_announcement_ref(&self, id: i64, announcement_ref: &str) -> StoreResult<()>;

    /// Insert a batch of rounds; a duplicate round number is a `Conflict`.
    async fn create_rounds(&self, tournament_id: i64, rounds: &[NewRound])
        -> StoreResult<Vec<RoundRow>>;
    async fn get_round(&self, id: i64) -> StoreResult<Option<RoundRow>>;
    async fn list_rounds(&self, tournament_id: i64) -> StoreResult<Vec<RoundRow>>;

    /// Insert the matches of a round; a round that already has matches is a `Conflict`.
    async fn create_matches(&self, round_id: i64, seeds: &[NewMatch]) -> StoreResult<Vec<MatchRow>>;
    async fn get_match(&self, id: i64) -> StoreResult<Option<MatchRow>>;
    async fn list_matches(&self, round_id: i64) -> StoreResult<Vec<MatchRow>>;
    async fn record_move(&self, match_id: i64, slot: MatchSlot, value: i16) -> StoreResult<bool>;
    async fn record_winner(&self, match_id: i64, winner_id: i64) -> StoreResult<bool>;

    /// `Ok(None)` when `capacity` is already reached; a duplicate pair is a `Conflict`.
    async fn create_registration(
        &self,
        data: NewRegistration,
        capacity: Option<i64>,
    ) -> StoreResult<Option<RegistrationRow>>;
    async fn get_registration(
        &self,
        tournament_id: i64,
        user_id: i64,
    ) -> StoreResult<Option<RegistrationRow>>;
    async fn count_registrations(&self, tournament_id: i64) -> StoreResult<i64>;
    async fn list_participants(&self, tournament_id: i64) -> StoreResult<Vec<ParticipantRow>>;

    async fn get_user(&self, id: i64) -> StoreResult<Option<UserRow>>;
    async fn insert_user_if_missing(&self, data: NewUser) -> StoreResult<UserRow>;
    async fn touch_last_played(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;
    async fn list_user_ids(&self) -> StoreResult<Vec<i64>>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Db {
        &self.pool
    }
}

#[async_trait]
impl TournamentStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        let _one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn create_tournament(&self, data: NewTournament) -> StoreResult<TournamentRow> {
        Ok(tournaments::create(&self.pool, data).await?)
    }

    async fn get_tournament(&self, id: i64) -> StoreResult<Option<TournamentRow>> {
        Ok(tournaments::get_by_id(&self.pool, id).await?)
    }

    async fn get_tournament_by_deposit(
        &self,
        deposit_id: &str,
    ) -> StoreResult<Option<TournamentRow>> {
        Ok(tournaments::get_by_deposit_id(&self.pool, deposit_id).await?)
    }

    async fn list_tournaments_by_state(
        &self,
        state: TournamentState,
    ) -> StoreResult<Vec<TournamentRow>> {
        Ok(tournaments::list_by_state(&self.pool, state).await?)
    }

    async fn list_ready_to_start(&self, now: DateTime<Utc>) -> StoreResult<Vec<TournamentRow>> {
        Ok(tournaments::list_ready_to_start(&self.pool, now).await?)
    }

    async fn list_due_for_processing(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<TournamentRow>> {
        Ok(tournaments::list_due_for_processing(&self.pool, now).await?)
    }

    async fn open_registration(
        &self,
        id: i64,
        sponsor_id: i64,
        announcement_ref: &str,
    ) -> StoreResult<Option<TournamentRow>> {
        Ok(tournaments::open_registration(&self.pool, id, sponsor_id, announcement_ref).await?)
    }

    async fn activate(&self, id: i64, round_id: i64) -> StoreResult<bool> {
        Ok(tournaments::activate(&self.pool, id, round_id).await?)
    }

    async fn advance_round(
        &self,
        id: i64,
        from_round_id: i64,
        to_round_id: i64,
    ) -> StoreResult<bool> {
        Ok(tournaments::advance_round(&self.pool, id, from_round_id, to_round_id).await?)
    }

    async fn complete(
        &self,
        id: i64,
        from_round_id: Option<i64>,
        winner_id: i64,
    ) -> StoreResult<bool> {
        Ok(tournaments::complete(&self.pool, id, from_round_id, winner_id).await?)
    }

    async fn set_announcement_ref(&self, id: i64, announcement_ref: &str) -> StoreResult<()> {
        Ok(tournaments::set_announcement_ref(&self.pool, id, announcement_ref).await?)
    }

    async fn create_rounds(
        &self,
        tournament_id: i64,
        new_rounds: &[NewRound],
    ) -> StoreResult<Vec<RoundRow>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(new_rounds.len());
        for round in new_rounds {
            created.push(rounds::create(&mut *tx, tournament_id, round).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn get_round(&self, id: i64) -> StoreResult<Option<RoundRow>> {
        Ok(rounds::get_by_id(&self.pool, id).await?)
    }

    async fn list_rounds(&self, tournament_id: i64) -> StoreResult<Vec<RoundRow>> {
        Ok(rounds::list_by_tournament(&self.pool, tournament_id).await?)
    }

    async fn create_matches(
        &self,
        round_id: i64,
        seeds: &[NewMatch],
    ) -> StoreResult<Vec<MatchRow>> {
        let mut tx = self.pool.begin().await?;

        // Concurrent batch writers for the same round queue up on this lock.
        rounds::lock(&mut *tx, round_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("round {round_id}")))?;

        if matches::count_by_round(&mut *tx, round_id).await? > 0 {
            return Err(StoreError::Conflict(format!(
                "round {round_id} already has matches"
            )));
        }

        let mut created = Vec::with_capacity(seeds.len());
        for seed in seeds {
            created.push(matches::create(&mut *tx, round_id, seed).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn get_match(&self, id: i64) -> StoreResult<Option<MatchRow>> {
        Ok(matches::get_by_id(&self.pool, id).await?)
    }

    async fn list_matches(&self, round_id: i64) -> StoreResult<Vec<MatchRow>> {
        Ok(matches::list_by_round(&self.pool, round_id).await?)
    }

    async fn record_move(&self, match_id: i64, slot: MatchSlot, value: i16) -> StoreResult<bool> {
        Ok(matches::record_move(&self.pool, match_id, slot, value).await?)
    }

    async fn record_winner(&self, match_id: i64, winner_id: i64) -> StoreResult<bool> {
        Ok(matches::record_winner(&self.pool, match_id, winner_id).await?)
    }

    async fn create_registration(
        &self,
        data: NewRegistration,
        capacity: Option<i64>,
    ) -> StoreResult<Option<RegistrationRow>> {
        let mut tx = self.pool.begin().await?;

        // The capacity count below is only exact while the tournament row is held.
        tournaments::lock(&mut *tx, data.tournament_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("tournament {}", data.tournament_id)))?;

        let created = tournament_registrations::create(&mut *tx, data, capacity).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_registration(
        &self,
        tournament_id: i64,
        user_id: i64,
    ) -> StoreResult<Option<RegistrationRow>> {
        Ok(
            tournament_registrations::get_by_tournament_and_user(&self.pool, tournament_id, user_id)
                .await?,
        )
    }

    async fn count_registrations(&self, tournament_id: i64) -> StoreResult<i64> {
        Ok(tournament_registrations::count_by_tournament(&self.pool, tournament_id).await?)
    }

    async fn list_participants(&self, tournament_id: i64) -> StoreResult<Vec<ParticipantRow>> {
        Ok(tournament_registrations::list_participants(&self.pool, tournament_id).await?)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<UserRow>> {
        Ok(users::get_by_id(&self.pool, id).await?)
    }

    async fn insert_user_if_missing(&self, data: NewUser) -> StoreResult<UserRow> {
        Ok(users::insert_if_missing(&self.pool, data).await?)
    }

    async fn touch_last_played(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        Ok(users::touch_last_played(&self.pool, id, at).await?)
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<i64>> {
        Ok(users::list_ids(&self.pool).await?)
    }
}
