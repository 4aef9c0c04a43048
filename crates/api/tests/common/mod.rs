#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use api::clients::{
    Announcer, ClientError, CompletionAnnouncement, DirectMessenger, PlaceholderProfiles, Profile,
    ProfileLookup, RoundAnnouncement, TieBreakOracle,
};
use api::game::UserId;
use api::services::{
    register, FanOutReport, NotificationContext, NotificationKind, Notifier, RegisterParams,
};
use api::{AppConfig, AppState, Collaborators};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use infra::models::{NewTournament, TournamentRow};
use infra::{MemoryStore, TournamentStore};
use parking_lot::Mutex;

pub const SPONSOR: UserId = 9000;
pub const ADMIN_KEY: &str = "admin-key";
pub const SERVER_KEY: &str = "server-key";

/// Scheduled start of every fixture tournament.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 1, 12, 0, 0).unwrap()
}

pub fn test_config() -> AppConfig {
    AppConfig {
        admin_api_key: Some(ADMIN_KEY.to_string()),
        server_api_key: Some(SERVER_KEY.to_string()),
        ..AppConfig::default()
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    pub rounds: Mutex<Vec<RoundAnnouncement>>,
    pub completions: Mutex<Vec<CompletionAnnouncement>>,
    pub fail: AtomicBool,
    /// Simulated feed latency for round announcements.
    pub delay: Mutex<std::time::Duration>,
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce_round_start(&self, post: &RoundAnnouncement) -> Result<String, ClientError> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Network("feed down".to_string()));
        }
        self.rounds.lock().push(post.clone());
        Ok(format!("0xround{}", post.round_number))
    }

    async fn announce_completion(
        &self,
        post: &CompletionAnnouncement,
    ) -> Result<String, ClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Network("feed down".to_string()));
        }
        self.completions.lock().push(post.clone());
        Ok("0xfinal".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub kind: NotificationKind,
    pub recipients: Vec<UserId>,
    pub context: NotificationContext,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn of_kind(&self, kind: NotificationKind) -> Vec<SentNotification> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_many(
        &self,
        user_ids: &[UserId],
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> FanOutReport {
        self.sent.lock().push(SentNotification {
            kind,
            recipients: user_ids.to_vec(),
            context: context.clone(),
        });
        FanOutReport {
            delivered: user_ids.len(),
            failed: Vec::new(),
        }
    }
}

/// Messenger that fails for a chosen set of recipients.
#[derive(Default)]
pub struct FlakyMessenger {
    pub failing: HashSet<UserId>,
    pub delivered: Mutex<Vec<(UserId, String, String)>>,
}

#[async_trait]
impl DirectMessenger for FlakyMessenger {
    async fn send_direct(
        &self,
        recipient: UserId,
        idempotency_key: &str,
        message: &str,
    ) -> Result<(), ClientError> {
        if self.failing.contains(&recipient) {
            return Err(ClientError::Api {
                service: "warpcast",
                status: 500,
                body: "boom".to_string(),
            });
        }
        self.delivered
            .lock()
            .push((recipient, idempotency_key.to_string(), message.to_string()));
        Ok(())
    }
}

/// Oracle with fixed balances; users in `failing` make the lookup error.
#[derive(Default)]
pub struct FixedOracle {
    pub balances: HashMap<UserId, f64>,
    pub failing: HashSet<UserId>,
}

#[async_trait]
impl TieBreakOracle for FixedOracle {
    async fn tie_break_signal(&self, user_id: UserId) -> Result<f64, ClientError> {
        if self.failing.contains(&user_id) {
            return Err(ClientError::Network("oracle down".to_string()));
        }
        Ok(self.balances.get(&user_id).copied().unwrap_or(0.0))
    }
}

/// Profiles named `player<id>`.
pub struct NamedProfiles;

#[async_trait]
impl ProfileLookup for NamedProfiles {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Profile, ClientError> {
        Ok(Profile {
            name: format!("player{}", user_id),
            display_name: format!("Player {}", user_id),
            image: Some(format!("https://img.test/{}.png", user_id)),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub announcer: Arc<RecordingAnnouncer>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn setup() -> TestApp {
    setup_with(test_config(), None, None)
}

/// Build an app on the in-process store. `notifier` replaces the recording
/// notifier (which then stays empty); `oracle` enables balance lookups.
pub fn setup_with(
    config: AppConfig,
    notifier: Option<Arc<dyn Notifier>>,
    oracle: Option<Arc<dyn TieBreakOracle>>,
) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let announcer = Arc::new(RecordingAnnouncer::default());
    let recording = Arc::new(RecordingNotifier::default());

    let collaborators = Collaborators {
        announcer: announcer.clone(),
        notifier: notifier.unwrap_or_else(|| recording.clone() as Arc<dyn Notifier>),
        renderer: None,
        profiles: Arc::new(NamedProfiles),
        oracle,
    };
    let state = AppState::new(config, store.clone(), collaborators);

    TestApp {
        state,
        store,
        announcer,
        notifier: recording,
    }
}

/// Collaborators that only log, as in a deployment without credentials.
pub fn logging_collaborators() -> Collaborators {
    Collaborators {
        announcer: Arc::new(api::clients::LoggingAnnouncer),
        notifier: Arc::new(api::services::DirectCastNotifier::new(
            Arc::new(api::clients::LoggingMessenger),
            4,
        )),
        renderer: None,
        profiles: Arc::new(PlaceholderProfiles),
        oracle: None,
    }
}

/// A tournament open for registration, starting at `t0()`.
pub async fn create_registering_tournament(
    app: &TestApp,
    max_rounds: i32,
    round_length_minutes: i32,
) -> TournamentRow {
    let created = app
        .store
        .create_tournament(NewTournament {
            registration_start: t0() - Duration::hours(1),
            scheduled_start: t0(),
            round_length_minutes,
            max_rounds,
            sponsor_id: Some(SPONSOR),
            winner_reward: Some(1000),
            deposit_id: None,
        })
        .await
        .expect("Failed to create tournament");

    app.store
        .open_registration(created.id, SPONSOR, "0xroot")
        .await
        .expect("Failed to open registration")
        .expect("Tournament should move to registering")
}

/// Register players in the given order, one second apart.
pub async fn register_players(app: &TestApp, tournament_id: i64, players: &[UserId]) {
    for (i, &user_id) in players.iter().enumerate() {
        register(
            &app.state,
            RegisterParams {
                tournament_id,
                user_id,
                force: false,
            },
            t0() - Duration::minutes(30) + Duration::seconds(i as i64),
        )
        .await
        .expect("Registration should succeed");
    }
}

pub async fn tournament(app: &TestApp, id: i64) -> TournamentRow {
    app.store
        .get_tournament(id)
        .await
        .unwrap()
        .expect("Tournament should exist")
}

/// Pairings of a round as (player_a, player_b).
pub async fn pairings(app: &TestApp, round_id: i64) -> Vec<(UserId, Option<UserId>)> {
    app.store
        .list_matches(round_id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| (m.player_a, m.player_b))
        .collect()
}
