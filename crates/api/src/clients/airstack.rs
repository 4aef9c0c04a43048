use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::http::{check_status, HttpClient};
use super::{ClientError, Profile, ProfileLookup, TieBreakOracle};
use crate::game::UserId;

const AIRSTACK_URL: &str = "https://api.airstack.xyz/gql";
const FAN_TOKEN_ADDRESS: &str = "0xf41f49a7cea54df54448b1c18ff429c7b332afb6";

#[derive(Clone)]
pub struct AirstackConfig {
    pub api_key: String,
}

impl AirstackConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("AIRSTACK_API_KEY").ok()?;
        Some(Self { api_key })
    }
}

/// Profile and balance lookups against the Airstack GraphQL API.
pub struct AirstackClient {
    config: AirstackConfig,
    http: HttpClient,
}

#[derive(Deserialize)]
struct GqlResponse {
    data: Option<Value>,
    errors: Option<Value>,
}

impl AirstackClient {
    pub fn new(config: AirstackConfig, http: HttpClient) -> Self {
        Self { config, http }
    }

    async fn query(&self, query: String) -> Result<Value, ClientError> {
        let response = self
            .http
            .get()?
            .post(AIRSTACK_URL)
            .header("Authorization", &self.config.api_key)
            .json(&json!({ "query": query }))
            .send()
            .await?;
        let body: GqlResponse = check_status("airstack", response).await?.json().await?;

        if let Some(errors) = body.errors {
            return Err(ClientError::Decode(errors.to_string()));
        }
        body.data
            .ok_or_else(|| ClientError::Decode("missing data".to_string()))
    }
}

#[async_trait]
impl ProfileLookup for AirstackClient {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Profile, ClientError> {
        let query = format!(
            r#"query Profile {{
                Socials(input: {{
                    filter: {{ dappName: {{ _eq: farcaster }}, identity: {{ _eq: "fc_fid:{user_id}" }} }}
                    blockchain: ethereum
                }}) {{
                    Social {{ profileDisplayName profileImage profileName }}
                }}
            }}"#
        );
        let data = self.query(query).await?;
        let social = data
            .pointer("/Socials/Social/0")
            .ok_or_else(|| ClientError::Decode(format!("no profile for user {}", user_id)))?;

        let name = social
            .get("profileName")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Decode("profileName missing".to_string()))?
            .to_string();
        let display_name = social
            .get("profileDisplayName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());
        let image = social
            .get("profileImage")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Profile {
            name,
            display_name,
            image,
        })
    }
}

#[async_trait]
impl TieBreakOracle for AirstackClient {
    /// Locked plus unlocked fan-token balance; zero when the user holds none.
    async fn tie_break_signal(&self, user_id: UserId) -> Result<f64, ClientError> {
        let query = format!(
            r#"query Balance {{
                MoxieUserPortfolios(input: {{
                    filter: {{ fanTokenAddress: {{ _eq: "{FAN_TOKEN_ADDRESS}" }}, fid: {{ _eq: "{user_id}" }} }}
                    blockchain: ALL
                }}) {{
                    MoxieUserPortfolio {{ totalLockedAmount totalUnlockedAmount }}
                }}
            }}"#
        );
        let data = self.query(query).await?;
        let Some(portfolio) = data.pointer("/MoxieUserPortfolios/MoxieUserPortfolio/0") else {
            return Ok(0.0);
        };

        let amount = |field: &str| portfolio.get(field).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(amount("totalLockedAmount") + amount("totalUnlockedAmount"))
    }
}
