//! Public posts and private messages that follow a committed transition.
//!
//! Nothing here can fail the caller: the state change has already happened, so
//! collaborator errors are logged and dropped.

use rand::seq::IndexedRandom;
use std::sync::Arc;
use tracing::{info, warn};

use super::notifier::{NotificationContext, NotificationKind, Notifier};
use super::profiles::ProfileService;
use crate::clients::{Announcer, CompletionAnnouncement, Pairing, Renderer, RoundAnnouncement};
use crate::game::UserId;
use infra::models::{MatchRow, RoundRow, TournamentRow};
use infra::TournamentStore;

const COMMENTARY: &[&str] = &[
    "May the odds be ever in someone's favor",
    "Hope you're ready to entertain us - this should be good",
    "Good luck! Try not to embarrass yourselves too badly out there",
    "Let's see if either of you can actually live up to the hype",
    "We're all here for the drama, so don't disappoint",
    "I've got my popcorn ready - don't make this boring",
    "May the least terrible player win!",
    "Show us what you've got... if anything",
    "This should be... educational",
    "Time to separate the pros from the pretenders",
    "Prepare for glory... or something like it",
    "The stage is set for either brilliance or disaster",
    "Prepare to be whelmed",
    "Today's forecast: light gameplay with scattered disappointment",
    "Witness the clash of the somewhat-trying!",
    "Buckle up for some thoroughly average entertainment",
    "Ah yes, the classic battle between bad and slightly less bad",
    "Let's see who manages to lose less embarrassingly",
    "Remember, we're all judging you. Harshly.",
    "One of you will win, but none of us will be impressed",
];

/// A random one-liner for a round announcement.
pub fn pick_commentary() -> Option<String> {
    COMMENTARY.choose(&mut rand::rng()).map(|s| s.to_string())
}

#[derive(Clone)]
pub struct Broadcaster {
    store: Arc<dyn TournamentStore>,
    profiles: ProfileService,
    announcer: Arc<dyn Announcer>,
    renderer: Option<Arc<dyn Renderer>>,
    notifier: Arc<dyn Notifier>,
    frame_base_url: String,
    feed_base_url: String,
}

impl Broadcaster {
    pub fn new(
        store: Arc<dyn TournamentStore>,
        profiles: ProfileService,
        announcer: Arc<dyn Announcer>,
        renderer: Option<Arc<dyn Renderer>>,
        notifier: Arc<dyn Notifier>,
        frame_base_url: String,
        feed_base_url: String,
    ) -> Self {
        Self {
            store,
            profiles,
            announcer,
            renderer,
            notifier,
            frame_base_url: frame_base_url.trim_end_matches('/').to_string(),
            feed_base_url: feed_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn frame_link(&self, tournament_id: i64) -> String {
        format!("{}/{}", self.frame_base_url, tournament_id)
    }

    fn post_link(&self, handle: &str, post_ref: &str) -> String {
        format!("{}/{}/{}", self.feed_base_url, handle, post_ref)
    }

    /// Announce a round that just became current and tell its players.
    pub async fn round_started(&self, tournament: &TournamentRow, round: &RoundRow, matches: &[MatchRow]) {
        let mut pairings = Vec::with_capacity(matches.len());
        for m in matches {
            let player_a = self.profiles.handle(m.player_a).await;
            let player_b = match m.player_b {
                Some(b) => Some(self.profiles.handle(b).await),
                None => None,
            };
            pairings.push(Pairing { player_a, player_b });
        }

        let image_url = match &self.renderer {
            Some(renderer) => match renderer
                .render_bracket_image(tournament.id, round.round_number)
                .await
            {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(
                        "Bracket render failed for tournament {} round {}: {}",
                        tournament.id, round.round_number, e
                    );
                    None
                }
            },
            None => None,
        };

        let post = RoundAnnouncement {
            tournament_id: tournament.id,
            round_number: round.round_number,
            pairings,
            image_url,
            commentary: pick_commentary(),
            parent_ref: tournament.announcement_ref.clone(),
        };
        self.publish(tournament.id, self.announcer.announce_round_start(&post).await)
            .await;

        let players: Vec<UserId> = matches
            .iter()
            .flat_map(|m| std::iter::once(m.player_a).chain(m.player_b))
            .collect();
        let context = NotificationContext {
            tournament_id: tournament.id,
            round_number: Some(round.round_number),
            minutes_left: Some(i64::from(tournament.round_length_minutes)),
            link: self.frame_link(tournament.id),
            sponsor_handle: None,
        };
        self.notifier
            .notify_many(&players, NotificationKind::RoundStarted, &context)
            .await;
    }

    pub async fn tournament_completed(&self, tournament: &TournamentRow, winner_id: UserId) {
        let post = CompletionAnnouncement {
            tournament_id: tournament.id,
            winner_handle: self.profiles.handle(winner_id).await,
            winner_reward: tournament.winner_reward,
            parent_ref: tournament.announcement_ref.clone(),
        };
        self.publish(tournament.id, self.announcer.announce_completion(&post).await)
            .await;

        let context = NotificationContext {
            tournament_id: tournament.id,
            link: self.frame_link(tournament.id),
            ..Default::default()
        };
        self.notifier
            .notify_many(&[winner_id], NotificationKind::TournamentWon, &context)
            .await;
    }

    /// Tell every known user that a sponsor opened a new tournament.
    pub async fn registration_opened(&self, tournament: &TournamentRow, sponsor_id: UserId, post_ref: &str) {
        let recipients = match self.store.list_user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not list users to announce tournament {}: {}", tournament.id, e);
                return;
            }
        };

        let sponsor = self.profiles.handle(sponsor_id).await;
        let context = NotificationContext {
            tournament_id: tournament.id,
            link: self.post_link(&sponsor, post_ref),
            sponsor_handle: Some(sponsor),
            ..Default::default()
        };
        self.notifier
            .notify_many(&recipients, NotificationKind::NewTournament, &context)
            .await;
    }

    pub async fn registration_reminder(
        &self,
        tournament: &TournamentRow,
        recipients: &[UserId],
        minutes_left: i64,
    ) {
        let context = NotificationContext {
            tournament_id: tournament.id,
            minutes_left: Some(minutes_left),
            link: self.frame_link(tournament.id),
            ..Default::default()
        };
        self.notifier
            .notify_many(recipients, NotificationKind::RegistrationReminder, &context)
            .await;
    }

    /// Keep the newest post as the thread root for the next one.
    async fn publish(&self, tournament_id: i64, posted: Result<String, crate::clients::ClientError>) {
        match posted {
            Ok(post_ref) => {
                info!("Announced tournament {} update as {}", tournament_id, post_ref);
                if let Err(e) = self.store.set_announcement_ref(tournament_id, &post_ref).await {
                    warn!(
                        "Could not store announcement reference for tournament {}: {}",
                        tournament_id, e
                    );
                }
            }
            Err(e) => warn!("Announcement failed for tournament {}: {}", tournament_id, e),
        }
    }
}
