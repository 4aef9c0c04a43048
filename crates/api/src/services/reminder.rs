use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tokio::time::{interval, Interval};
use tracing::{error, info};

use crate::game::GameError;
use crate::AppState;
use infra::models::TournamentState;

pub struct ReminderService {
    state: AppState,
    interval: Interval,
    reminded_tournaments: HashSet<i64>,
}

impl ReminderService {
    pub fn new(state: AppState) -> Self {
        let interval = interval(state.config().reminder_interval);

        Self {
            state,
            interval,
            reminded_tournaments: HashSet::new(),
        }
    }

    /// Start the background reminder service
    pub async fn run(&mut self) {
        info!("Starting registration reminder service");

        loop {
            self.interval.tick().await;

            if let Err(e) = self.remind_upcoming(Utc::now()).await {
                error!("Error sending registration reminders: {}", e);
            }
        }
    }

    /// Remind users who have not registered yet, once per tournament, when its
    /// start falls inside the reminder window. Returns the tournaments reminded.
    pub async fn remind_upcoming(&mut self, now: DateTime<Utc>) -> Result<Vec<i64>, GameError> {
        let window = Duration::minutes(self.state.config().reminder_window_minutes);
        let registering = self
            .state
            .store
            .list_tournaments_by_state(TournamentState::Registering)
            .await?;

        let mut reminded = Vec::new();
        for tournament in &registering {
            let starts_in = tournament.scheduled_start - now;
            if starts_in <= Duration::zero() || starts_in > window {
                continue;
            }
            if self.reminded_tournaments.contains(&tournament.id) {
                continue;
            }

            let registered: HashSet<i64> = self
                .state
                .store
                .list_participants(tournament.id)
                .await?
                .into_iter()
                .map(|p| p.user_id)
                .collect();
            let recipients: Vec<i64> = self
                .state
                .store
                .list_user_ids()
                .await?
                .into_iter()
                .filter(|id| !registered.contains(id))
                .collect();

            info!(
                "Sending registration reminders for tournament {} to {} users",
                tournament.id,
                recipients.len()
            );
            self.state
                .broadcaster
                .registration_reminder(tournament, &recipients, starts_in.num_minutes())
                .await;

            self.reminded_tournaments.insert(tournament.id);
            reminded.push(tournament.id);
        }

        // Forget tournaments that are no longer registering
        let still_registering: HashSet<i64> = registering.iter().map(|t| t.id).collect();
        self.reminded_tournaments
            .retain(|id| still_registering.contains(id));

        Ok(reminded)
    }
}

/// Spawn the reminder service as a background task
pub fn spawn_reminder_service(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut service = ReminderService::new(state);
        service.run().await;
    })
}
