use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::http::{check_status, HttpClient};
use super::{ClientError, Renderer};

#[derive(Clone)]
pub struct RendererConfig {
    pub base_url: String,
}

impl RendererConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("RENDERER_BASE_URL").ok()?;
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct RenderResponse {
    url: String,
}

/// Bracket screenshots from an external rendering service.
pub struct HttpRenderer {
    config: RendererConfig,
    http: HttpClient,
}

impl HttpRenderer {
    pub fn new(config: RendererConfig, http: HttpClient) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render_bracket_image(
        &self,
        tournament_id: i64,
        round_number: i32,
    ) -> Result<String, ClientError> {
        let url = format!("{}/render", self.config.base_url);
        let response = self
            .http
            .get()?
            .post(&url)
            .json(&json!({ "tournamentId": tournament_id, "round": round_number }))
            .send()
            .await?;
        let rendered: RenderResponse = check_status("renderer", response).await?.json().await?;
        Ok(rendered.url)
    }
}
