// beech-core/src/tools/google_auth.rs

//! OAuth2 refresh-token flow shared by the Google Ads and Calendar clients.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const CLIENT_ID_ENV: &str = "GOOGLE_ADS_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "GOOGLE_ADS_CLIENT_SECRET";
pub const REFRESH_TOKEN_ENV: &str = "GOOGLE_ADS_REFRESH_TOKEN";

/// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl GoogleCredentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: required_env(CLIENT_ID_ENV)?,
            client_secret: required_env(CLIENT_SECRET_ENV)?,
            refresh_token: required_env(REFRESH_TOKEN_ENV)?,
        })
    }
}

pub(crate) fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(anyhow!("Environment variable {} is not set", name)),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Exchanges the refresh token for access tokens and caches them until
/// shortly before expiry.
pub struct GoogleAuth {
    http_client: Client,
    token_endpoint: String,
    credentials: GoogleCredentials,
    cache: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn new(http_client: Client, token_endpoint: String, credentials: GoogleCredentials) -> Self {
        Self {
            http_client,
            token_endpoint,
            credentials,
            cache: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
            debug!("Cached Google access token expired.");
        }

        let token = self.refresh().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        let access_token = token.access_token.clone();
        *cache = Some(CachedToken {
            access_token: token.access_token,
            refresh_at: Instant::now() + lifetime,
        });
        Ok(access_token)
    }

    async fn refresh(&self) -> Result<TokenResponse> {
        info!(endpoint = %self.token_endpoint, "Refreshing Google access token.");
        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to reach token endpoint {}", self.token_endpoint))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read token response body")?;
        if !status.is_success() {
            return Err(anyhow!("Token refresh failed with status {}: {}", status, body));
        }
        serde_json::from_str(&body).context("Failed to parse token response")
    }
}
