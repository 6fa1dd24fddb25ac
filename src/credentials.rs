//!
//! Credentials used to authenticate against a subscription
//!
use crate::{Error, Result};
use async_trait::async_trait;

const ENV_ACCESS_TOKEN: &str = "CONTAINERAPPS_ACCESS_TOKEN";

/// Bearer token for the resource manager
#[derive(Clone)]
pub struct AccessToken {
    /// The token
    pub token: String,
    /// When the token stops being valid, if known
    pub expires_on: Option<chrono::DateTime<chrono::Utc>>,
}

impl AccessToken {
    /// Token without a known expiry
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            expires_on: None,
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Source of credentials, one per subscription
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a token valid for requests against `subscription_id`
    async fn credential_for_subscription(&self, subscription_id: &str) -> Result<AccessToken>;
}

/// The same token for every subscription
#[derive(Clone, Debug)]
pub struct StaticCredential(AccessToken);

impl StaticCredential {
    /// Create from a raw bearer token
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self(AccessToken::new(token))
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn credential_for_subscription(&self, _subscription_id: &str) -> Result<AccessToken> {
        Ok(self.0.clone())
    }
}

/// Reads the token from `CONTAINERAPPS_ACCESS_TOKEN` on every call, so a refreshed
/// token is picked up without rebuilding the client.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvironmentCredential;

#[async_trait]
impl CredentialProvider for EnvironmentCredential {
    async fn credential_for_subscription(&self, subscription_id: &str) -> Result<AccessToken> {
        let token = std::env::var(ENV_ACCESS_TOKEN).map_err(|_| {
            Error::Credential(format!(
                "missing environment variable '{ENV_ACCESS_TOKEN}' for subscription {subscription_id}"
            ))
        })?;
        Ok(AccessToken::new(&token))
    }
}
