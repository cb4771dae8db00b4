use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential has no refresh token")]
    NoRefreshToken,
    #[error("token endpoint returned {status}: {body}")]
    Refresh { status: u16, body: String },
    #[error("token endpoint transport: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Bearer credential for one account: a short-lived access token plus the
/// long-lived refresh token used to mint replacements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => expiry <= now,
            None => false,
        }
    }
}

/// Shared, replace-in-place view of one account's credential.
///
/// The fetch loop swaps in a refreshed credential through this handle so
/// that every later request for the same account picks it up, while
/// concurrent fetches for other characters keep reading their own handles.
#[derive(Debug, Clone, Default)]
pub struct CredentialHandle {
    inner: Arc<RwLock<Credential>>,
}

impl CredentialHandle {
    pub fn new(credential: Credential) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credential)),
        }
    }

    pub fn snapshot(&self) -> Credential {
        #[expect(clippy::unwrap_used)]
        self.inner.read().unwrap().clone()
    }

    pub fn access_token(&self) -> String {
        #[expect(clippy::unwrap_used)]
        self.inner.read().unwrap().access_token.clone()
    }

    pub fn refresh_token(&self) -> String {
        #[expect(clippy::unwrap_used)]
        self.inner.read().unwrap().refresh_token.clone()
    }

    /// Replaces the stored credential. An empty refresh token in `fresh`
    /// keeps the previous one, since the identity provider only rotates it
    /// sometimes.
    pub fn store(&self, fresh: Credential) {
        #[expect(clippy::unwrap_used)]
        let mut guard = self.inner.write().unwrap();
        let refresh_token = if fresh.refresh_token.is_empty() {
            guard.refresh_token.clone()
        } else {
            fresh.refresh_token
        };
        *guard = Credential {
            access_token: fresh.access_token,
            refresh_token,
            expires_at: fresh.expires_at,
        };
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Exchanges an expired bearer credential for a fresh one at the identity
/// provider's token endpoint. Stateless given its inputs; never retains the
/// tokens it sees.
#[derive(Debug, Clone)]
pub struct CredentialRefresher {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
}

impl CredentialRefresher {
    pub fn new(client: reqwest::Client, token_url: String, client_id: String) -> Self {
        Self {
            client,
            token_url,
            client_id,
        }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::NoRefreshToken);
        }
        let request = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
            client_id: &self.client_id,
        };
        let response = self
            .client
            .post(&self.token_url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Refresh {
                status: status.as_u16(),
                body,
            });
        }

        let decoded = response.json::<RefreshResponse>().await?;
        tracing::debug!("refreshed access token via {}", self.token_url);
        Ok(Credential {
            access_token: decoded.access_token,
            refresh_token: decoded.refresh_token.unwrap_or_default(),
            expires_at: decoded
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn store_keeps_old_refresh_token_when_provider_omits_it() {
        let handle = CredentialHandle::new(Credential {
            access_token: "stale".to_string(),
            refresh_token: "long-lived".to_string(),
            expires_at: None,
        });

        handle.store(Credential {
            access_token: "fresh".to_string(),
            refresh_token: String::new(),
            expires_at: None,
        });

        let stored = handle.snapshot();
        assert_eq!(stored.access_token, "fresh");
        assert_eq!(stored.refresh_token, "long-lived");
    }

    #[test]
    fn store_rotates_refresh_token_when_provided() {
        let handle = CredentialHandle::new(Credential {
            access_token: "stale".to_string(),
            refresh_token: "old".to_string(),
            expires_at: None,
        });

        handle.store(Credential {
            access_token: "fresh".to_string(),
            refresh_token: "rotated".to_string(),
            expires_at: None,
        });

        assert_eq!(handle.refresh_token(), "rotated");
    }

    #[test]
    fn expiry_check_uses_the_supplied_clock() {
        let now = Utc::now();
        let expired = Credential {
            access_token: "t".to_string(),
            refresh_token: String::new(),
            expires_at: Some(now - chrono::Duration::seconds(1)),
        };
        let live = Credential {
            access_token: "t".to_string(),
            refresh_token: String::new(),
            expires_at: Some(now + chrono::Duration::seconds(60)),
        };
        let unbounded = Credential::default();

        assert!(expired.is_expired(now));
        assert!(!live.is_expired(now));
        assert!(!unbounded.is_expired(now));
    }

    #[tokio::test]
    async fn refresh_without_token_is_rejected_before_any_io() {
        let refresher = CredentialRefresher::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/token".to_string(),
            "client".to_string(),
        );
        let result = refresher.refresh("").await;
        assert!(matches!(result, Err(AuthError::NoRefreshToken)));
    }
}
