//! Outbound collaborators: social feed, direct messages, profile and balance
//! lookups, and the bracket image renderer.
//!
//! Each one sits behind a trait so the core can run against logging stand-ins
//! when credentials are not configured, and against fakes in tests.

pub mod airstack;
pub mod farcaster;
pub mod http;
pub mod renderer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::UserId;

pub use airstack::{AirstackClient, AirstackConfig};
pub use farcaster::{
    LoggingAnnouncer, LoggingMessenger, NeynarClient, NeynarConfig, WarpcastClient,
    WarpcastConfig,
};
pub use http::HttpClient;
pub use renderer::{HttpRenderer, RendererConfig};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("{service} responded with {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

/// Public-facing identity of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub display_name: String,
    pub image: Option<String>,
}

impl Profile {
    /// Stand-in used when no lookup is available or it failed.
    pub fn placeholder(user_id: UserId) -> Self {
        Self {
            name: format!("fid:{}", user_id),
            display_name: format!("Player {}", user_id),
            image: None,
        }
    }
}

/// A first-round or later pairing, already resolved to display handles.
#[derive(Debug, Clone, PartialEq)]
pub struct Pairing {
    pub player_a: String,
    /// `None` for a bye.
    pub player_b: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundAnnouncement {
    pub tournament_id: i64,
    pub round_number: i32,
    pub pairings: Vec<Pairing>,
    pub image_url: Option<String>,
    pub commentary: Option<String>,
    /// Reference of the post this one replies to.
    pub parent_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionAnnouncement {
    pub tournament_id: i64,
    pub winner_handle: String,
    pub winner_reward: Option<i64>,
    pub parent_ref: Option<String>,
}

/// Public feed. Returns an opaque reference to the published post.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce_round_start(&self, post: &RoundAnnouncement) -> Result<String, ClientError>;
    async fn announce_completion(
        &self,
        post: &CompletionAnnouncement,
    ) -> Result<String, ClientError>;
}

/// Private message channel to a single user.
#[async_trait]
pub trait DirectMessenger: Send + Sync {
    async fn send_direct(
        &self,
        recipient: UserId,
        idempotency_key: &str,
        message: &str,
    ) -> Result<(), ClientError>;
}

#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Profile, ClientError>;
}

/// External numeric signal consulted to break ties (a token balance).
#[async_trait]
pub trait TieBreakOracle: Send + Sync {
    async fn tie_break_signal(&self, user_id: UserId) -> Result<f64, ClientError>;
}

/// Produces a shareable bracket image and returns its URL.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render_bracket_image(
        &self,
        tournament_id: i64,
        round_number: i32,
    ) -> Result<String, ClientError>;
}

/// Lookup used when no profile provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderProfiles;

#[async_trait]
impl ProfileLookup for PlaceholderProfiles {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Profile, ClientError> {
        Ok(Profile::placeholder(user_id))
    }
}
