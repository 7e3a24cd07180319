//! REST client for the platform user directory.
//!
//! Lookups are anonymous unless a service account is configured, in which
//! case a session token is obtained once and reused until it nears expiry
//! (see [`SingleFlightTokenCache`]).

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::directory::token_cache::{CachedToken, SingleFlightTokenCache};
use crate::directory::{DirectoryUser, UserDirectory};
use crate::types::{HelplineError, Result};

/// Directory service account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct ApiUserDirectory {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    tokens: SingleFlightTokenCache,
}

impl ApiUserDirectory {
    pub fn new(
        base_url: &str,
        credentials: Option<Credentials>,
        token_margin: chrono::Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("helpline/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HelplineError::Directory(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            tokens: SingleFlightTokenCache::new(token_margin),
        })
    }

    /// Session token for authenticated lookups, or None when running
    /// anonymously.
    async fn bearer(&self) -> Result<Option<String>> {
        let Some(credentials) = self.credentials.clone() else {
            return Ok(None);
        };
        let http = self.http.clone();
        let url = format!("{}/api/sessions", self.base_url);
        let token = self
            .tokens
            .get_or_refresh(move || {
                open_session(http.clone(), url.clone(), credentials.clone())
            })
            .await?;
        Ok(Some(token.token))
    }
}

#[async_trait::async_trait]
impl UserDirectory for ApiUserDirectory {
    async fn lookup(&self, user_id: &str) -> Result<Option<DirectoryUser>> {
        let url = format!(
            "{}/api/users/{}",
            self.base_url,
            urlencoding::encode(user_id)
        );
        let mut request = self.http.get(&url);
        if let Some(token) = self.bearer().await? {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| HelplineError::Directory(format!("user lookup failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(HelplineError::Directory(format!(
                "user lookup returned {}",
                response.status()
            )));
        }

        let user: ApiUser = response
            .json()
            .await
            .map_err(|e| HelplineError::Directory(format!("user lookup body invalid: {}", e)))?;
        if user.id.is_empty() || user.username.is_empty() {
            return Ok(None);
        }
        Ok(Some(DirectoryUser {
            id: user.id,
            name: user.username,
        }))
    }

    async fn healthy(&self) -> bool {
        self.http.get(&self.base_url).send().await.is_ok()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ApiUser {
    id: String,
    username: String,
}

impl Default for ApiUser {
    fn default() -> Self {
        Self {
            id: String::new(),
            username: String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    token: String,
    expires: DateTime<Utc>,
}

/// One refresh cycle: POST the service account, get back a token and its
/// expiry. Runs detached; errors become strings for the shared waiters.
async fn open_session(
    http: reqwest::Client,
    url: String,
    credentials: Credentials,
) -> std::result::Result<CachedToken, String> {
    let response = http
        .post(&url)
        .json(&SessionRequest {
            username: &credentials.username,
            password: &credentials.password,
        })
        .send()
        .await
        .map_err(|e| format!("session open failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("session open returned {}", response.status()));
    }

    let session: SessionResponse = response
        .json()
        .await
        .map_err(|e| format!("session body invalid: {}", e))?;

    Ok(CachedToken {
        token: session.token,
        expires_at: session.expires,
    })
}
