use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::http::{check_status, HttpClient};
use super::{
    Announcer, ClientError, CompletionAnnouncement, DirectMessenger, RoundAnnouncement,
};
use crate::game::UserId;

const DIRECT_CAST_URL: &str = "https://api.warpcast.com/v2/ext-send-direct-cast";
const NEYNAR_CAST_URL: &str = "https://api.neynar.com/v2/farcaster/cast";

// ── Direct casts ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct WarpcastConfig {
    pub api_key: String,
}

impl WarpcastConfig {
    /// `None` without a key, or when sending is switched off with `SEND_DIRECT_CASTS=false`.
    pub fn from_env() -> Option<Self> {
        let enabled = std::env::var("SEND_DIRECT_CASTS")
            .map(|v| v != "false")
            .unwrap_or(true);
        if !enabled {
            return None;
        }
        let api_key = std::env::var("DIRECT_CAST_API_KEY").ok()?;
        Some(Self { api_key })
    }
}

pub struct WarpcastClient {
    config: WarpcastConfig,
    http: HttpClient,
}

impl WarpcastClient {
    pub fn new(config: WarpcastConfig, http: HttpClient) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl DirectMessenger for WarpcastClient {
    async fn send_direct(
        &self,
        recipient: UserId,
        idempotency_key: &str,
        message: &str,
    ) -> Result<(), ClientError> {
        let body = json!({
            "recipientFid": recipient,
            "message": message,
            "idempotencyKey": idempotency_key,
        });

        let response = self
            .http
            .get()?
            .put(DIRECT_CAST_URL)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        check_status("warpcast", response).await?;

        info!("Direct cast sent to {}", recipient);
        Ok(())
    }
}

/// Messenger used when direct casts are disabled: logs instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMessenger;

#[async_trait]
impl DirectMessenger for LoggingMessenger {
    async fn send_direct(
        &self,
        recipient: UserId,
        _idempotency_key: &str,
        message: &str,
    ) -> Result<(), ClientError> {
        info!("Skipping direct cast to {}: {}", recipient, message);
        Ok(())
    }
}

// ── Feed posts ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct NeynarConfig {
    pub api_key: String,
    pub signer_uuid: String,
}

impl NeynarConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("NEYNAR_API_KEY").ok()?;
        let signer_uuid = std::env::var("SIGNER_UUID").ok()?;
        Some(Self {
            api_key,
            signer_uuid,
        })
    }
}

#[derive(Deserialize)]
struct PublishCastResponse {
    cast: PublishedCast,
}

#[derive(Deserialize)]
struct PublishedCast {
    hash: String,
}

pub struct NeynarClient {
    config: NeynarConfig,
    http: HttpClient,
}

impl NeynarClient {
    pub fn new(config: NeynarConfig, http: HttpClient) -> Self {
        Self { config, http }
    }

    async fn publish(
        &self,
        text: &str,
        image_url: Option<&str>,
        parent: Option<&str>,
    ) -> Result<String, ClientError> {
        let mut body = json!({
            "signer_uuid": self.config.signer_uuid,
            "text": text,
        });
        if let Some(url) = image_url {
            body["embeds"] = json!([{ "url": url }]);
        }
        if let Some(parent) = parent {
            body["parent"] = json!(parent);
        }

        let response = self
            .http
            .get()?
            .post(NEYNAR_CAST_URL)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let published: PublishCastResponse = check_status("neynar", response).await?.json().await?;

        info!("Published cast {}", published.cast.hash);
        Ok(published.cast.hash)
    }
}

#[async_trait]
impl Announcer for NeynarClient {
    async fn announce_round_start(&self, post: &RoundAnnouncement) -> Result<String, ClientError> {
        self.publish(
            &round_text(post),
            post.image_url.as_deref(),
            post.parent_ref.as_deref(),
        )
        .await
    }

    async fn announce_completion(
        &self,
        post: &CompletionAnnouncement,
    ) -> Result<String, ClientError> {
        self.publish(&completion_text(post), None, post.parent_ref.as_deref())
            .await
    }
}

/// Announcer used without feed credentials: logs the post and returns a local reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAnnouncer;

#[async_trait]
impl Announcer for LoggingAnnouncer {
    async fn announce_round_start(&self, post: &RoundAnnouncement) -> Result<String, ClientError> {
        info!("Skipping feed post: {}", round_text(post));
        Ok(format!("local:{}:round:{}", post.tournament_id, post.round_number))
    }

    async fn announce_completion(
        &self,
        post: &CompletionAnnouncement,
    ) -> Result<String, ClientError> {
        info!("Skipping feed post: {}", completion_text(post));
        Ok(format!("local:{}:final", post.tournament_id))
    }
}

pub fn round_text(post: &RoundAnnouncement) -> String {
    let mut text = format!(
        "Tournament #{} Round {} has begun!\n",
        post.tournament_id, post.round_number
    );
    for pairing in &post.pairings {
        match &pairing.player_b {
            Some(b) => text.push_str(&format!("\n@{} vs @{}", pairing.player_a, b)),
            None => text.push_str(&format!("\n@{} advances with a bye", pairing.player_a)),
        }
    }
    if let Some(commentary) = &post.commentary {
        text.push_str(&format!("\n\n{}", commentary));
    }
    text
}

pub fn completion_text(post: &CompletionAnnouncement) -> String {
    match post.winner_reward {
        Some(reward) => format!(
            "We have a winner! @{} takes Tournament #{} and {} tokens.",
            post.winner_handle, post.tournament_id, reward
        ),
        None => format!(
            "We have a winner! @{} takes Tournament #{}.",
            post.winner_handle, post.tournament_id
        ),
    }
}
