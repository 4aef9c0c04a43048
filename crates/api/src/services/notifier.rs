use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::DirectMessenger;
use crate::game::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A sponsor opened registration for a new tournament.
    NewTournament,
    RegistrationReminder,
    RoundStarted,
    TournamentWon,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationContext {
    pub tournament_id: i64,
    pub round_number: Option<i32>,
    pub minutes_left: Option<i64>,
    /// Link to the frame or feed post the message points at.
    pub link: String,
    pub sponsor_handle: Option<String>,
}

impl NotificationContext {
    /// Repeated sends with the same key are delivered once by the channel.
    pub fn idempotency_key(&self, kind: NotificationKind) -> String {
        match kind {
            NotificationKind::NewTournament => format!("game_{}_open", self.tournament_id),
            NotificationKind::RegistrationReminder => format!("game_{}", self.tournament_id),
            NotificationKind::RoundStarted => format!(
                "game_{}_round_{}",
                self.tournament_id,
                self.round_number.unwrap_or_default()
            ),
            NotificationKind::TournamentWon => format!("game_{}_final", self.tournament_id),
        }
    }

    pub fn message(&self, kind: NotificationKind) -> String {
        match kind {
            NotificationKind::NewTournament => format!(
                "@{} has sponsored a new tournament! {}",
                self.sponsor_handle.as_deref().unwrap_or("someone"),
                self.link
            ),
            NotificationKind::RegistrationReminder => format!(
                "Tournament #{} is starting in {}. Register in the frame below! {}",
                self.tournament_id,
                format_time_remaining(self.minutes_left.unwrap_or_default()),
                self.link
            ),
            NotificationKind::RoundStarted => format!(
                "Round {} has begun! You have {} minutes to select Rock, Paper, or Scissors! {}",
                self.round_number.unwrap_or_default(),
                self.minutes_left.unwrap_or_default(),
                self.link
            ),
            NotificationKind::TournamentWon => format!("We have a winner! {}", self.link),
        }
    }
}

/// "N hours M minutes", dropping zero parts and pluralising.
pub fn format_time_remaining(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let rest = minutes % 60;
    let minute_part = format!("{} {}", rest, if rest == 1 { "minute" } else { "minutes" });

    match (hours, rest) {
        (0, _) => minute_part,
        (1, 0) => "1 hour".to_string(),
        (1, _) => format!("1 hour {}", minute_part),
        (h, 0) => format!("{} hours", h),
        (h, _) => format!("{} hours {}", h, minute_part),
    }
}

/// Per-recipient outcome of a fan-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: Vec<(UserId, String)>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Best-effort: one recipient failing never affects the others.
    async fn notify_many(
        &self,
        user_ids: &[UserId],
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> FanOutReport;
}

/// Sends one direct message per recipient, at most `concurrency` at a time.
pub struct DirectCastNotifier {
    messenger: Arc<dyn DirectMessenger>,
    concurrency: usize,
}

impl DirectCastNotifier {
    pub fn new(messenger: Arc<dyn DirectMessenger>, concurrency: usize) -> Self {
        Self {
            messenger,
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
impl Notifier for DirectCastNotifier {
    async fn notify_many(
        &self,
        user_ids: &[UserId],
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> FanOutReport {
        let key = context.idempotency_key(kind);
        let message = context.message(kind);

        let outcomes: Vec<_> = stream::iter(user_ids.iter().copied())
            .map(|user_id| {
                let messenger = self.messenger.clone();
                let key = key.as_str();
                let message = message.as_str();
                async move { (user_id, messenger.send_direct(user_id, key, message).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = FanOutReport::default();
        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Failed to notify user {} ({:?}): {}", user_id, kind, e);
                    report.failed.push((user_id, e.to_string()));
                }
            }
        }

        info!(
            "{:?} notifications for tournament {}: {} delivered, {} failed",
            kind,
            context.tournament_id,
            report.delivered,
            report.failed.len()
        );
        report
    }
}
