//! In-process store with the same guard semantics as the Postgres one.
//! Used when no `DATABASE_URL` is configured and by the test suites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

use crate::models::{
    MatchRow, MatchSlot, NewMatch, NewRegistration, NewRound, NewTournament, NewUser,
    ParticipantRow, RegistrationRow, RoundRow, TournamentRow, TournamentState, UserRow,
};
use crate::store::{StoreError, StoreResult, TournamentStore};

/// Store operations that can be made to fail once, to exercise recovery paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateRounds,
    CreateMatches,
    Activate,
    AdvanceRound,
    Complete,
    RecordWinner,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    tournaments: BTreeMap<i64, TournamentRow>,
    rounds: BTreeMap<i64, RoundRow>,
    matches: BTreeMap<i64, MatchRow>,
    registrations: BTreeMap<i64, RegistrationRow>,
    users: BTreeMap<i64, UserRow>,
    fail_points: HashSet<FailPoint>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn trip(&mut self, point: FailPoint) -> StoreResult<()> {
        if self.fail_points.remove(&point) {
            return Err(StoreError::Unavailable(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn tournament_mut(&mut self, id: i64) -> StoreResult<&mut TournamentRow> {
        self.tournaments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("tournament {id}")))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `point` fail with `StoreError::Unavailable`.
    pub fn fail_next(&self, point: FailPoint) {
        self.tables.lock().fail_points.insert(point);
    }
}

#[async_trait]
impl TournamentStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_tournament(&self, data: NewTournament) -> StoreResult<TournamentRow> {
        let mut t = self.tables.lock();
        if let Some(deposit_id) = &data.deposit_id {
            if t.tournaments
                .values()
                .any(|row| row.deposit_id.as_ref() == Some(deposit_id))
            {
                return Err(StoreError::Conflict(format!("deposit {deposit_id} already used")));
            }
        }

        let id = t.next_id();
        let row = TournamentRow {
            id,
            registration_start: data.registration_start,
            scheduled_start: data.scheduled_start,
            round_length_minutes: data.round_length_minutes,
            max_rounds: data.max_rounds,
            state: TournamentState::Created,
            current_round_id: None,
            completed: false,
            winner_id: None,
            sponsor_id: data.sponsor_id,
            winner_reward: data.winner_reward,
            deposit_id: data.deposit_id,
            announcement_ref: None,
            created_at: Utc::now(),
        };
        t.tournaments.insert(id, row.clone());
        Ok(row)
    }

    async fn get_tournament(&self, id: i64) -> StoreResult<Option<TournamentRow>> {
        Ok(self.tables.lock().tournaments.get(&id).cloned())
    }

    async fn get_tournament_by_deposit(
        &self,
        deposit_id: &str,
    ) -> StoreResult<Option<TournamentRow>> {
        Ok(self
            .tables
            .lock()
            .tournaments
            .values()
            .find(|row| row.deposit_id.as_deref() == Some(deposit_id))
            .cloned())
    }

    async fn list_tournaments_by_state(
        &self,
        state: TournamentState,
    ) -> StoreResult<Vec<TournamentRow>> {
        let t = self.tables.lock();
        let mut rows: Vec<TournamentRow> = t
            .tournaments
            .values()
            .filter(|row| row.state == state)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.scheduled_start, row.id));
        Ok(rows)
    }

    async fn list_ready_to_start(&self, now: DateTime<Utc>) -> StoreResult<Vec<TournamentRow>> {
        let t = self.tables.lock();
        let mut rows: Vec<TournamentRow> = t
            .tournaments
            .values()
            .filter(|row| {
                row.state == TournamentState::Registering
                    && row.current_round_id.is_none()
                    && row.scheduled_start <= now
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.scheduled_start, row.id));
        Ok(rows)
    }

    async fn list_due_for_processing(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<TournamentRow>> {
        let t = self.tables.lock();
        let mut due: Vec<(DateTime<Utc>, TournamentRow)> = t
            .tournaments
            .values()
            .filter(|row| row.state == TournamentState::Active && !row.completed)
            .filter_map(|row| {
                let round = t.rounds.get(&row.current_round_id?)?;
                (round.deadline <= now).then(|| (round.deadline, row.clone()))
            })
            .collect();
        due.sort_by_key(|(deadline, row)| (*deadline, row.id));
        Ok(due.into_iter().map(|(_, row)| row).collect())
    }

    async fn open_registration(
        &self,
        id: i64,
        sponsor_id: i64,
        announcement_ref: &str,
    ) -> StoreResult<Option<TournamentRow>> {
        let mut t = self.tables.lock();
        let Some(row) = t.tournaments.get_mut(&id) else {
            return Ok(None);
        };
        if row.state != TournamentState::Created || row.sponsor_id != Some(sponsor_id) {
            return Ok(None);
        }
        row.state = TournamentState::Registering;
        row.announcement_ref = Some(announcement_ref.to_string());
        Ok(Some(row.clone()))
    }

    async fn activate(&self, id: i64, round_id: i64) -> StoreResult<bool> {
        let mut t = self.tables.lock();
        t.trip(FailPoint::Activate)?;
        let row = t.tournament_mut(id)?;
        if row.state != TournamentState::Registering || row.current_round_id.is_some() {
            return Ok(false);
        }
        row.state = TournamentState::Active;
        row.current_round_id = Some(round_id);
        Ok(true)
    }

    async fn advance_round(
        &self,
        id: i64,
        from_round_id: i64,
        to_round_id: i64,
    ) -> StoreResult<bool> {
        let mut t = self.tables.lock();
        t.trip(FailPoint::AdvanceRound)?;
        let row = t.tournament_mut(id)?;
        if row.state != TournamentState::Active || row.current_round_id != Some(from_round_id) {
            return Ok(false);
        }
        row.current_round_id = Some(to_round_id);
        Ok(true)
    }

    async fn complete(
        &self,
        id: i64,
        from_round_id: Option<i64>,
        winner_id: i64,
    ) -> StoreResult<bool> {
        let mut t = self.tables.lock();
        t.trip(FailPoint::Complete)?;
        let row = t.tournament_mut(id)?;
        let open = matches!(
            row.state,
            TournamentState::Registering | TournamentState::Active
        );
        if row.completed || !open || row.current_round_id != from_round_id {
            return Ok(false);
        }
        row.state = TournamentState::Completed;
        row.completed = true;
        row.winner_id = Some(winner_id);
        row.current_round_id = None;
        Ok(true)
    }

    async fn set_announcement_ref(&self, id: i64, announcement_ref: &str) -> StoreResult<()> {
        let mut t = self.tables.lock();
        t.tournament_mut(id)?.announcement_ref = Some(announcement_ref.to_string());
        Ok(())
    }

    async fn create_rounds(
        &self,
        tournament_id: i64,
        new_rounds: &[NewRound],
    ) -> StoreResult<Vec<RoundRow>> {
        let mut t = self.tables.lock();
        t.trip(FailPoint::CreateRounds)?;
        let taken: HashSet<i32> = t
            .rounds
            .values()
            .filter(|round| round.tournament_id == tournament_id)
            .map(|round| round.round_number)
            .collect();
        if let Some(dup) = new_rounds.iter().find(|r| taken.contains(&r.round_number)) {
            return Err(StoreError::Conflict(format!(
                "round {} of tournament {tournament_id} already exists",
                dup.round_number
            )));
        }

        let mut created = Vec::with_capacity(new_rounds.len());
        for round in new_rounds {
            let id = t.next_id();
            let row = RoundRow {
                id,
                tournament_id,
                round_number: round.round_number,
                deadline: round.deadline,
            };
            t.rounds.insert(id, row.clone());
            created.push(row);
        }
        Ok(created)
    }

    async fn get_round(&self, id: i64) -> StoreResult<Option<RoundRow>> {
        Ok(self.tables.lock().rounds.get(&id).cloned())
    }

    async fn list_rounds(&self, tournament_id: i64) -> StoreResult<Vec<RoundRow>> {
        let t = self.tables.lock();
        let mut rows: Vec<RoundRow> = t
            .rounds
            .values()
            .filter(|round| round.tournament_id == tournament_id)
            .cloned()
            .collect();
        rows.sort_by_key(|round| round.round_number);
        Ok(rows)
    }

    async fn create_matches(
        &self,
        round_id: i64,
        seeds: &[NewMatch],
    ) -> StoreResult<Vec<MatchRow>> {
        let mut t = self.tables.lock();
        t.trip(FailPoint::CreateMatches)?;
        if !t.rounds.contains_key(&round_id) {
            return Err(StoreError::NotFound(format!("round {round_id}")));
        }
        if t.matches.values().any(|m| m.round_id == round_id) {
            return Err(StoreError::Conflict(format!(
                "round {round_id} already has matches"
            )));
        }

        let mut created = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let id = t.next_id();
            let row = MatchRow {
                id,
                round_id,
                player_a: seed.player_a,
                player_b: seed.player_b,
                move_a: None,
                move_b: None,
                winner_id: None,
            };
            t.matches.insert(id, row.clone());
            created.push(row);
        }
        Ok(created)
    }

    async fn get_match(&self, id: i64) -> StoreResult<Option<MatchRow>> {
        Ok(self.tables.lock().matches.get(&id).cloned())
    }

    async fn list_matches(&self, round_id: i64) -> StoreResult<Vec<MatchRow>> {
        // BTreeMap iteration is already ascending by id.
        Ok(self
            .tables
            .lock()
            .matches
            .values()
            .filter(|m| m.round_id == round_id)
            .cloned()
            .collect())
    }

    async fn record_move(&self, match_id: i64, slot: MatchSlot, value: i16) -> StoreResult<bool> {
        let mut t = self.tables.lock();
        let Some(row) = t.matches.get_mut(&match_id) else {
            return Ok(false);
        };
        if row.winner_id.is_some() {
            return Ok(false);
        }
        let target = match slot {
            MatchSlot::A => &mut row.move_a,
            MatchSlot::B => &mut row.move_b,
        };
        if target.is_some() {
            return Ok(false);
        }
        *target = Some(value);
        Ok(true)
    }

    async fn record_winner(&self, match_id: i64, winner_id: i64) -> StoreResult<bool> {
        let mut t = self.tables.lock();
        t.trip(FailPoint::RecordWinner)?;
        let Some(row) = t.matches.get_mut(&match_id) else {
            return Ok(false);
        };
        if row.winner_id.is_some() {
            return Ok(false);
        }
        row.winner_id = Some(winner_id);
        Ok(true)
    }

    async fn create_registration(
        &self,
        data: NewRegistration,
        capacity: Option<i64>,
    ) -> StoreResult<Option<RegistrationRow>> {
        let mut t = self.tables.lock();
        let existing: Vec<&RegistrationRow> = t
            .registrations
            .values()
            .filter(|r| r.tournament_id == data.tournament_id)
            .collect();
        if existing.iter().any(|r| r.user_id == data.user_id) {
            return Err(StoreError::Conflict(format!(
                "user {} already registered for tournament {}",
                data.user_id, data.tournament_id
            )));
        }
        if let Some(capacity) = capacity {
            if existing.len() as i64 >= capacity {
                return Ok(None);
            }
        }

        let id = t.next_id();
        let row = RegistrationRow {
            id,
            tournament_id: data.tournament_id,
            user_id: data.user_id,
            registered_at: data.registered_at,
            token_balance: data.token_balance,
            forced: data.forced,
        };
        t.registrations.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn get_registration(
        &self,
        tournament_id: i64,
        user_id: i64,
    ) -> StoreResult<Option<RegistrationRow>> {
        Ok(self
            .tables
            .lock()
            .registrations
            .values()
            .find(|r| r.tournament_id == tournament_id && r.user_id == user_id)
            .cloned())
    }

    async fn count_registrations(&self, tournament_id: i64) -> StoreResult<i64> {
        Ok(self
            .tables
            .lock()
            .registrations
            .values()
            .filter(|r| r.tournament_id == tournament_id)
            .count() as i64)
    }

    async fn list_participants(&self, tournament_id: i64) -> StoreResult<Vec<ParticipantRow>> {
        let t = self.tables.lock();
        let mut rows: Vec<ParticipantRow> = t
            .registrations
            .values()
            .filter(|r| r.tournament_id == tournament_id)
            .map(|r| ParticipantRow {
                registration_id: r.id,
                user_id: r.user_id,
                registered_at: r.registered_at,
                token_balance: r.token_balance,
                last_played: t.users.get(&r.user_id).and_then(|u| u.last_played),
            })
            .collect();
        rows.sort_by_key(|p| (p.registered_at, p.registration_id));
        Ok(rows)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<UserRow>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn insert_user_if_missing(&self, data: NewUser) -> StoreResult<UserRow> {
        let mut t = self.tables.lock();
        let row = t.users.entry(data.id).or_insert_with(|| UserRow {
            id: data.id,
            name: data.name,
            display_name: data.display_name,
            image: data.image,
            last_played: None,
            created_at: Utc::now(),
        });
        Ok(row.clone())
    }

    async fn touch_last_played(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = self.tables.lock().users.get_mut(&id) {
            user.last_played = Some(at);
        }
        Ok(())
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<i64>> {
        Ok(self.tables.lock().users.keys().copied().collect())
    }
}
