use std::sync::Arc;
use tracing::info;

use crate::clients::{
    AirstackClient, AirstackConfig, Announcer, DirectMessenger, HttpClient, HttpRenderer,
    LoggingAnnouncer, LoggingMessenger, NeynarClient, NeynarConfig, PlaceholderProfiles,
    ProfileLookup, Renderer, RendererConfig, TieBreakOracle, WarpcastClient, WarpcastConfig,
};
use crate::config::AppConfig;
use crate::game::TournamentEngine;
use crate::services::announcements::Broadcaster;
use crate::services::notifier::{DirectCastNotifier, Notifier};
use crate::services::profiles::ProfileService;
use crate::services::scheduler::InFlight;
use infra::TournamentStore;

/// External collaborators the core talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub announcer: Arc<dyn Announcer>,
    pub notifier: Arc<dyn Notifier>,
    pub renderer: Option<Arc<dyn Renderer>>,
    pub profiles: Arc<dyn ProfileLookup>,
    pub oracle: Option<Arc<dyn TieBreakOracle>>,
}

impl Collaborators {
    /// Real adapters where credentials are configured, logging stand-ins elsewhere.
    pub fn from_env(config: &AppConfig, http: &HttpClient) -> Self {
        let messenger: Arc<dyn DirectMessenger> = match WarpcastConfig::from_env() {
            Some(cfg) => Arc::new(WarpcastClient::new(cfg, http.clone())),
            None => {
                info!("Direct casts disabled; messages will be logged");
                Arc::new(LoggingMessenger)
            }
        };

        let announcer: Arc<dyn Announcer> = match NeynarConfig::from_env() {
            Some(cfg) => Arc::new(NeynarClient::new(cfg, http.clone())),
            None => {
                info!("Feed credentials missing; announcements will be logged");
                Arc::new(LoggingAnnouncer)
            }
        };

        let renderer = RendererConfig::from_env()
            .map(|cfg| Arc::new(HttpRenderer::new(cfg, http.clone())) as Arc<dyn Renderer>);

        let (profiles, oracle): (Arc<dyn ProfileLookup>, Option<Arc<dyn TieBreakOracle>>) =
            match AirstackConfig::from_env() {
                Some(cfg) => {
                    let client = Arc::new(AirstackClient::new(cfg, http.clone()));
                    let oracle: Arc<dyn TieBreakOracle> = client.clone();
                    (client as Arc<dyn ProfileLookup>, Some(oracle))
                }
                None => (Arc::new(PlaceholderProfiles) as Arc<dyn ProfileLookup>, None),
            };

        Self {
            announcer,
            notifier: Arc::new(DirectCastNotifier::new(messenger, config.notify_concurrency)),
            renderer,
            profiles,
            oracle,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TournamentStore>,
    pub engine: Arc<TournamentEngine>,
    pub broadcaster: Broadcaster,
    pub profiles: ProfileService,
    pub oracle: Option<Arc<dyn TieBreakOracle>>,
    pub in_flight: InFlight,
    config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn TournamentStore>,
        collaborators: Collaborators,
    ) -> Self {
        let profiles = ProfileService::new(store.clone(), collaborators.profiles);
        let broadcaster = Broadcaster::new(
            store.clone(),
            profiles.clone(),
            collaborators.announcer,
            collaborators.renderer,
            collaborators.notifier,
            config.frame_base_url.clone(),
            config.feed_base_url.clone(),
        );
        let tie_breaker = config.tie_policy.build(collaborators.oracle.clone());
        let engine = TournamentEngine::new(store.clone(), tie_breaker, broadcaster.clone());

        Self {
            store,
            engine: Arc::new(engine),
            broadcaster,
            profiles,
            oracle: collaborators.oracle,
            in_flight: InFlight::default(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
