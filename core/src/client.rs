use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthError;
use crate::auth::CredentialHandle;
use crate::auth::CredentialRefresher;
use crate::resilience::ResponseCache;
use crate::resilience::RetryPolicy;
use crate::resilience::cache::DEFAULT_CHARACTER_TTL;
use crate::roster::QueuedSkillEntry;
use crate::roster::TrainedSkill;

const USER_AGENT: &str = concat!("pilotdeck/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn create_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-retryable HTTP status other than 401/404.
    #[error("remote returned {status}: {body}")]
    Remote { status: u16, body: String },
    /// 404: the entity no longer exists. Callers may deny-list it.
    #[error("entity not found")]
    NotFound,
    /// 401 that survived one refresh attempt.
    #[error("credential rejected by the remote API")]
    Unauthorized,
    /// The refresh exchange itself failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Malformed payload. Retrying would not change its shape.
    #[error("malformed response payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("transport: {0}")]
    Network(#[from] reqwest::Error),
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether the backoff wrapper should spend another attempt on this.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Remote { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            FetchError::Network(err) => !err.is_builder(),
            _ => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Unauthorized | FetchError::Auth(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterIdentity {
    #[serde(rename = "CharacterID")]
    pub character_id: i64,
    #[serde(rename = "CharacterName")]
    pub character_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterSkills {
    #[serde(default)]
    pub skills: Vec<TrainedSkill>,
    #[serde(default)]
    pub total_sp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterLocation {
    pub solar_system_id: i64,
    #[serde(default)]
    pub station_id: Option<i64>,
}

/// Authenticated GET client for the game's data API.
///
/// One instance is shared by the whole roster pass; per-request state (the
/// retry loop, the refresh-once flag) lives on the stack of each call so one
/// character's backoff never delays another's.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    refresher: CredentialRefresher,
    policy: RetryPolicy,
    character_ttl: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, refresher: CredentialRefresher) -> Self {
        Self {
            http: create_http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            refresher,
            policy: RetryPolicy::default(),
            character_ttl: DEFAULT_CHARACTER_TTL,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_character_ttl(mut self, ttl: Duration) -> Self {
        self.character_ttl = ttl;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Authenticated GET with transparent refresh and bounded backoff.
    ///
    /// Transient server errors (500/502/503/504) and transport failures are
    /// retried up to the policy's attempt budget with jittered exponential
    /// delays; everything else surfaces immediately. `cancel` aborts the
    /// in-flight request and any pending backoff sleep.
    pub async fn fetch(
        &self,
        url: &str,
        credential: &CredentialHandle,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let mut attempt = 1u32;
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                result = self.fetch_once(url, credential) => result,
            };
            let err = match result {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };
            if !err.is_retryable() || attempt >= self.policy.max_attempts {
                return Err(err);
            }
            let delay = self.policy.jittered_delay_for(attempt);
            tracing::debug!(url, attempt, ?delay, "retrying after transient failure: {err}");
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    /// One request, with at most one credential refresh on 401.
    async fn fetch_once(
        &self,
        url: &str,
        credential: &CredentialHandle,
    ) -> Result<Bytes, FetchError> {
        let response = self.send_get(url, &credential.access_token()).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let refresh_token = credential.refresh_token();
            if refresh_token.is_empty() {
                return Err(FetchError::Unauthorized);
            }
            let fresh = self.refresher.refresh(&refresh_token).await?;
            credential.store(fresh);

            let retried = self.send_get(url, &credential.access_token()).await?;
            if retried.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(FetchError::Unauthorized);
            }
            return Self::read_body(retried).await;
        }

        Self::read_body(response).await
    }

    async fn send_get(&self, url: &str, token: &str) -> Result<reqwest::Response, FetchError> {
        let mut request = self.http.get(url);
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    async fn read_body(response: reqwest::Response) -> Result<Bytes, FetchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await?);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        let body = response.text().await.unwrap_or_default();
        Err(FetchError::Remote {
            status: status.as_u16(),
            body,
        })
    }

    /// Cache-through fetch: a fresh cache entry short-circuits the network;
    /// a miss fetches and then populates the cache with the same TTL.
    pub async fn fetch_cached(
        &self,
        cache: &Arc<ResponseCache>,
        url: &str,
        credential: &CredentialHandle,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        if let Some(hit) = cache.get(url) {
            return Ok(hit);
        }
        let body = self.fetch(url, credential, cancel).await?;
        cache.set(url, body.clone(), ttl);
        Ok(body)
    }

    pub async fn verify_identity(
        &self,
        credential: &CredentialHandle,
        cancel: &CancellationToken,
    ) -> Result<CharacterIdentity, FetchError> {
        let url = self.endpoint("verify");
        let body = self.fetch(&url, credential, cancel).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn character_skills(
        &self,
        cache: &Arc<ResponseCache>,
        character_id: i64,
        credential: &CredentialHandle,
        cancel: &CancellationToken,
    ) -> Result<CharacterSkills, FetchError> {
        let url = self.endpoint(&format!("characters/{character_id}/skills"));
        let body = self
            .fetch_cached(cache, &url, credential, self.character_ttl, cancel)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn skill_queue(
        &self,
        cache: &Arc<ResponseCache>,
        character_id: i64,
        credential: &CredentialHandle,
        cancel: &CancellationToken,
    ) -> Result<Vec<QueuedSkillEntry>, FetchError> {
        let url = self.endpoint(&format!("characters/{character_id}/skillqueue"));
        let body = self
            .fetch_cached(cache, &url, credential, self.character_ttl, cancel)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn character_location(
        &self,
        cache: &Arc<ResponseCache>,
        character_id: i64,
        credential: &CredentialHandle,
        cancel: &CancellationToken,
    ) -> Result<CharacterLocation, FetchError> {
        let url = self.endpoint(&format!("characters/{character_id}/location"));
        let body = self
            .fetch_cached(cache, &url, credential, self.character_ttl, cancel)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_client() -> ApiClient {
        let refresher = CredentialRefresher::new(
            create_http_client(),
            "https://login.example/token".to_string(),
            "client-id".to_string(),
        );
        ApiClient::new("https://api.example/v1/", refresher)
    }

    #[test]
    fn endpoint_join_normalizes_slashes() {
        let client = test_client();
        assert_eq!(client.base_url(), "https://api.example/v1");
        assert_eq!(
            client.endpoint("/characters/42/skills"),
            "https://api.example/v1/characters/42/skills"
        );
    }

    #[test]
    fn only_transient_statuses_are_retryable() {
        for status in [500u16, 502, 503, 504] {
            let err = FetchError::Remote {
                status,
                body: String::new(),
            };
            assert!(err.is_retryable(), "{status} should be retryable");
        }
        let teapot = FetchError::Remote {
            status: 418,
            body: String::new(),
        };
        assert!(!teapot.is_retryable());
        assert!(!FetchError::NotFound.is_retryable());
        assert!(!FetchError::Unauthorized.is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
    }
}
