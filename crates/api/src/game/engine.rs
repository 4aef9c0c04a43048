//! Tournament lifecycle: starting a bracket and advancing it round by round.
//!
//! Every transition follows the same shape: read, compute, write the derived
//! rows (rounds, matches, winners) so that a retry can reuse them, then commit
//! the state change with one conditional update. Losing that final update to a
//! concurrent caller is reported as an error and changes nothing.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::bracket::{
    build_first_round_matches, build_next_round_matches, compute_round_count, seed_participants,
    slot_count,
};
use super::resolver::{resolve, Contender, TieBreaker, Verdict};
use super::{GameError, Move, UserId};
use crate::services::announcements::Broadcaster;
use infra::models::{MatchRow, NewMatch, NewRound, RoundRow, TournamentRow, TournamentState};
use infra::{StoreError, TournamentStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Scheduled start not reached yet.
    NotDue,
    Started { round_id: i64, matches: usize },
    /// A single registrant wins without playing.
    Walkover { winner_id: UserId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Current round deadline not reached yet.
    NotDue,
    Advanced { from_round: i32, to_round: i32 },
    Completed { winner_id: UserId },
}

pub struct TournamentEngine {
    store: Arc<dyn TournamentStore>,
    tie_breaker: Arc<dyn TieBreaker>,
    broadcaster: Broadcaster,
}

impl TournamentEngine {
    pub fn new(
        store: Arc<dyn TournamentStore>,
        tie_breaker: Arc<dyn TieBreaker>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            store,
            tie_breaker,
            broadcaster,
        }
    }

    async fn load_tournament(&self, id: i64) -> Result<TournamentRow, GameError> {
        self.store
            .get_tournament(id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("tournament {}", id)))
    }

    /// Build the bracket and open round 1 once the scheduled start has passed.
    pub async fn start_if_ready(
        &self,
        tournament_id: i64,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome, GameError> {
        let tournament = self.load_tournament(tournament_id).await?;
        if tournament.state != TournamentState::Registering
            || tournament.current_round_id.is_some()
        {
            return Err(GameError::InvalidState(format!(
                "tournament {} is {} and cannot start",
                tournament_id,
                tournament.state.as_str()
            )));
        }
        if now < tournament.scheduled_start {
            return Ok(StartOutcome::NotDue);
        }

        let participants = self.store.list_participants(tournament_id).await?;
        let max_rounds = u32::try_from(tournament.max_rounds).unwrap_or(0);
        let computed = compute_round_count(participants.len(), max_rounds)?;

        if computed == 0 {
            return self.finish_by_walkover(&tournament, &participants).await;
        }

        let rounds = self.ensure_rounds(&tournament, computed).await?;
        let actual_rounds = rounds.len() as u32;
        let first = rounds
            .first()
            .ok_or_else(|| GameError::InvalidState(format!("tournament {} has no rounds", tournament_id)))?;

        let seeded = seed_participants(&participants, slot_count(actual_rounds));
        let seeds = build_first_round_matches(&seeded, actual_rounds);
        let matches = self.ensure_matches(first.id, &seeds).await?;

        if !self.store.activate(tournament_id, first.id).await? {
            return Err(GameError::InvalidState(format!(
                "tournament {} was started concurrently",
                tournament_id
            )));
        }

        info!(
            "Tournament {} started: {} players, {} rounds, {} first-round matches",
            tournament_id,
            seeded.len(),
            actual_rounds,
            matches.len()
        );
        self.broadcaster
            .round_started(&tournament, first, &matches)
            .await;

        Ok(StartOutcome::Started {
            round_id: first.id,
            matches: matches.len(),
        })
    }

    async fn finish_by_walkover(
        &self,
        tournament: &TournamentRow,
        participants: &[infra::models::ParticipantRow],
    ) -> Result<StartOutcome, GameError> {
        let winner_id = seed_participants(participants, 1)
            .first()
            .copied()
            .ok_or(GameError::EmptyField)?;

        if !self.store.complete(tournament.id, None, winner_id).await? {
            return Err(GameError::InvalidState(format!(
                "tournament {} was started concurrently",
                tournament.id
            )));
        }

        info!("Tournament {} won by walkover by {}", tournament.id, winner_id);
        self.broadcaster
            .tournament_completed(tournament, winner_id)
            .await;
        Ok(StartOutcome::Walkover { winner_id })
    }

    /// Rounds left behind by an interrupted start are reused as they are.
    async fn ensure_rounds(
        &self,
        tournament: &TournamentRow,
        count: u32,
    ) -> Result<Vec<RoundRow>, GameError> {
        let existing = self.store.list_rounds(tournament.id).await?;
        if !existing.is_empty() {
            return check_contiguous(tournament.id, existing);
        }

        let round_length = Duration::minutes(i64::from(tournament.round_length_minutes));
        let new_rounds: Vec<NewRound> = (1..=count as i32)
            .map(|number| NewRound {
                round_number: number,
                deadline: tournament.scheduled_start + round_length * number,
            })
            .collect();

        match self.store.create_rounds(tournament.id, &new_rounds).await {
            Ok(rounds) => Ok(rounds),
            Err(StoreError::Conflict(_)) => {
                debug!("Rounds of tournament {} created concurrently", tournament.id);
                let rounds = self.store.list_rounds(tournament.id).await?;
                check_contiguous(tournament.id, rounds)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a round's matches, or return the ones already there.
    async fn ensure_matches(
        &self,
        round_id: i64,
        seeds: &[NewMatch],
    ) -> Result<Vec<MatchRow>, GameError> {
        match self.store.create_matches(round_id, seeds).await {
            Ok(matches) => Ok(matches),
            Err(StoreError::Conflict(_)) => {
                debug!("Reusing existing matches of round {}", round_id);
                Ok(self.store.list_matches(round_id).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Process the current round once its deadline has passed.
    pub async fn process_active_if_due(
        &self,
        tournament_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, GameError> {
        let tournament = self.load_tournament(tournament_id).await?;
        if tournament.state != TournamentState::Active {
            return Err(GameError::InvalidState(format!(
                "tournament {} is {}, not active",
                tournament_id,
                tournament.state.as_str()
            )));
        }
        let round_id = tournament.current_round_id.ok_or_else(|| {
            GameError::InvalidState(format!("active tournament {} has no current round", tournament_id))
        })?;
        let round = self
            .store
            .get_round(round_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("round {}", round_id)))?;

        if now < round.deadline {
            return Ok(ProcessOutcome::NotDue);
        }
        self.resolve_round(&tournament, &round).await
    }

    /// Resolve every match of a round and advance or complete the tournament.
    pub async fn process_round(&self, round_id: i64) -> Result<ProcessOutcome, GameError> {
        let round = self
            .store
            .get_round(round_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("round {}", round_id)))?;
        let tournament = self.load_tournament(round.tournament_id).await?;
        self.resolve_round(&tournament, &round).await
    }

    async fn resolve_round(
        &self,
        tournament: &TournamentRow,
        round: &RoundRow,
    ) -> Result<ProcessOutcome, GameError> {
        let matches = self.store.list_matches(round.id).await?;

        if tournament.current_round_id != Some(round.id) {
            if !matches.is_empty() && matches.iter().all(|m| m.winner_id.is_some()) {
                return Err(GameError::AlreadyProcessed(round.id));
            }
            return Err(GameError::InvalidState(format!(
                "round {} is not the current round of tournament {}",
                round.id, tournament.id
            )));
        }

        let snapshots: HashMap<UserId, Option<f64>> = self
            .store
            .list_participants(tournament.id)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p.token_balance))
            .collect();

        let mut winners = Vec::with_capacity(matches.len());
        for m in &matches {
            let winner = match m.winner_id {
                Some(winner) => winner,
                None => self.settle_match(m, &snapshots).await?,
            };
            winners.push(winner);
        }

        match winners.as_slice() {
            [] => Err(GameError::NoWinner(round.id)),
            [champion] => {
                let champion = *champion;
                if !self
                    .store
                    .complete(tournament.id, Some(round.id), champion)
                    .await?
                {
                    return Err(GameError::AlreadyProcessed(round.id));
                }
                info!("Tournament {} completed, winner {}", tournament.id, champion);
                self.broadcaster
                    .tournament_completed(tournament, champion)
                    .await;
                Ok(ProcessOutcome::Completed {
                    winner_id: champion,
                })
            }
            _ => {
                let next_number = round.round_number + 1;
                let next = self
                    .store
                    .list_rounds(tournament.id)
                    .await?
                    .into_iter()
                    .find(|r| r.round_number == next_number)
                    .ok_or_else(|| {
                        GameError::NotFound(format!(
                            "round {} of tournament {}",
                            next_number, tournament.id
                        ))
                    })?;

                let seeds = build_next_round_matches(&winners)?;
                let next_matches = self.ensure_matches(next.id, &seeds).await?;

                if !self
                    .store
                    .advance_round(tournament.id, round.id, next.id)
                    .await?
                {
                    return Err(GameError::AlreadyProcessed(round.id));
                }
                info!(
                    "Tournament {} advanced from round {} to round {}",
                    tournament.id, round.round_number, next.round_number
                );
                self.broadcaster
                    .round_started(tournament, &next, &next_matches)
                    .await;
                Ok(ProcessOutcome::Advanced {
                    from_round: round.round_number,
                    to_round: next.round_number,
                })
            }
        }
    }

    /// Decide one unresolved match and record its winner.
    async fn settle_match(
        &self,
        m: &MatchRow,
        snapshots: &HashMap<UserId, Option<f64>>,
    ) -> Result<UserId, GameError> {
        let verdict = resolve(
            Some(m.player_a),
            Move::from_stored(m.move_a)?,
            m.player_b,
            Move::from_stored(m.move_b)?,
        )?;

        let winner = match verdict {
            Verdict::Winner(winner) => winner,
            Verdict::Tie { a, b } => {
                let contender = |user_id| Contender {
                    user_id,
                    registration_signal: snapshots.get(&user_id).copied().flatten(),
                };
                self.tie_breaker
                    .break_tie(contender(a), contender(b))
                    .await
            }
        };

        if self.store.record_winner(m.id, winner).await? {
            return Ok(winner);
        }

        // Someone else settled it first; their result stands.
        let stored = self
            .store
            .get_match(m.id)
            .await?
            .and_then(|m| m.winner_id)
            .ok_or_else(|| GameError::InvalidState(format!("match {} lost its winner", m.id)))?;
        if stored != winner {
            warn!(
                "Match {} already settled for {}, computed {}",
                m.id, stored, winner
            );
        }
        Ok(stored)
    }
}

fn check_contiguous(tournament_id: i64, rounds: Vec<RoundRow>) -> Result<Vec<RoundRow>, GameError> {
    let contiguous = rounds
        .iter()
        .enumerate()
        .all(|(i, r)| r.round_number == i as i32 + 1);
    if rounds.is_empty() || !contiguous {
        return Err(GameError::InvalidState(format!(
            "rounds of tournament {} are not numbered 1..n",
            tournament_id
        )));
    }
    Ok(rounds)
}
