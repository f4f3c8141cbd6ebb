//! OAuth2 token management for the Blogger v3 API. The library never
//! blocks on a browser: interactive consent is an injected strategy, and
//! everything else is cached-token reuse and silent refresh.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use tracing::debug;

use crate::credentials::CredentialsAccessor;
use crate::{Error, Result};

pub const BLOGGER_SCOPE: &str = "https://www.googleapis.com/auth/blogger";
/// Image uploads go through the Picasa-compatible media API, which has its
/// own scope.
pub const PICASA_SCOPE: &str = "https://picasaweb.google.com/data";

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth2 application identity. Read from the environment so published
/// builds do not embed a secret.
#[derive(Clone, Debug, Default)]
pub struct ApiSecrets {
    pub client_id: String,
    pub client_secret: String,
}

impl ApiSecrets {
    pub fn from_env() -> ApiSecrets {
        ApiSecrets {
            client_id: std::env::var("QUILL_GOOGLE_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("QUILL_GOOGLE_CLIENT_SECRET").unwrap_or_default(),
        }
    }
}

/// The token as held in the credentials token slot, serialized to JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// A token is worth keeping if it is still fresh or can be refreshed.
    pub fn is_valid(&self) -> bool {
        self.is_fresh() || self.refresh_token.is_some()
    }

    /// Usable as-is, with a safety margin for clock skew and request
    /// latency.
    pub fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::minutes(2) > Utc::now(),
            None => !self.access_token.is_empty(),
        }
    }
}

/// Interactive consent strategy. Implementations drive the browser round
/// trip and return the resulting token.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn authorize(&self, secrets: &ApiSecrets, scopes: &[&str]) -> Result<StoredToken>;
}

pub struct GoogleAuth {
    secrets: ApiSecrets,
    credentials: CredentialsAccessor,
    flow: Option<Arc<dyn AuthorizationFlow>>,
}

impl GoogleAuth {
    pub fn new(
        secrets: ApiSecrets,
        credentials: CredentialsAccessor,
        flow: Option<Arc<dyn AuthorizationFlow>>,
    ) -> GoogleAuth {
        GoogleAuth {
            secrets,
            credentials,
            flow,
        }
    }

    fn oauth_client(&self) -> Result<BasicClient> {
        Ok(BasicClient::new(
            ClientId::new(self.secrets.client_id.clone()),
            Some(ClientSecret::new(self.secrets.client_secret.clone())),
            AuthUrl::new(AUTH_URL.to_string())?,
            Some(TokenUrl::new(TOKEN_URL.to_string())?),
        ))
    }

    fn cached_token(&self) -> Option<StoredToken> {
        let serialized = self.credentials.token()?;
        serde_json::from_str(&serialized).ok()
    }

    fn store_token(&self, token: &StoredToken) {
        match serde_json::to_string(token) {
            Ok(serialized) => self.credentials.set_token(Some(serialized)),
            Err(_) => self.credentials.set_token(None),
        }
    }

    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or(Error::OperationCancelled)?;
        debug!("refreshing Google access token");
        let response = self
            .oauth_client()?
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| Error::authentication("oauth", format!("token refresh failed: {}", e)))?;
        let refreshed = StoredToken {
            access_token: response.access_token().secret().clone(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().clone())
                .or(Some(refresh_token)),
            expires_at: response
                .expires_in()
                .and_then(|d| Duration::from_std(d).ok())
                .map(|d| Utc::now() + d),
        };
        self.store_token(&refreshed);
        Ok(refreshed)
    }

    /// A usable access token: the cached one while fresh, a silent refresh
    /// when possible, the interactive flow as a last resort.
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            if token.is_fresh() {
                return Ok(token.access_token);
            }
            if token.refresh_token.is_some() {
                return Ok(self.refresh(&token).await?.access_token);
            }
        }
        match &self.flow {
            Some(flow) => {
                let token = flow
                    .authorize(&self.secrets, &[BLOGGER_SCOPE, PICASA_SCOPE])
                    .await?;
                self.store_token(&token);
                Ok(token.access_token)
            }
            None => Err(Error::OperationCancelled),
        }
    }

    /// Drops the access token but keeps the refresh token, forcing the
    /// next call to mint a new one. Used after a 403 that suggests an
    /// expired-but-not-yet-stale token.
    pub fn invalidate_access_token(&self) {
        if let Some(mut token) = self.cached_token() {
            token.access_token = String::new();
            token.expires_at = Some(Utc::now() - Duration::minutes(5));
            self.store_token(&token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(fresh: bool, refreshable: bool) -> StoredToken {
        StoredToken {
            access_token: "abc".to_string(),
            refresh_token: if refreshable {
                Some("rt".to_string())
            } else {
                None
            },
            expires_at: Some(if fresh {
                Utc::now() + Duration::hours(1)
            } else {
                Utc::now() - Duration::hours(1)
            }),
        }
    }

    #[test]
    fn expired_tokens_are_valid_only_with_a_refresh_token() {
        assert!(token(true, false).is_valid());
        assert!(token(false, true).is_valid());
        assert!(!token(false, false).is_valid());
        assert!(!token(false, true).is_fresh());
    }

    #[tokio::test]
    async fn no_token_and_no_flow_is_a_cancellation() {
        let auth = GoogleAuth::new(
            ApiSecrets::default(),
            CredentialsAccessor::new("ann", ""),
            None,
        );
        assert!(matches!(
            auth.access_token().await,
            Err(Error::OperationCancelled)
        ));
    }

    #[tokio::test]
    async fn cached_fresh_tokens_are_reused() {
        let credentials = CredentialsAccessor::new("ann", "");
        credentials.set_token(Some(
            serde_json::to_string(&token(true, false)).unwrap(),
        ));
        let auth = GoogleAuth::new(ApiSecrets::default(), credentials, None);
        assert_eq!(auth.access_token().await.unwrap(), "abc");
    }
}
