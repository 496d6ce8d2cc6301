//! Token verification against the external identity service
//!
//! The gateway only depends on the [`IdentityVerifier`] trait; the HTTP
//! implementation talks to the game's token endpoint.

use async_trait::async_trait;
use log::debug;
use reqwest::header::ORIGIN;
use reqwest::{StatusCode, Url};

use crate::config::VERIFY_ORIGIN;

/// Stable identifier issued by the identity service
pub type PlayerId = String;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The service answered but did not vouch for the token.
    #[error("token was not accepted")]
    Denied,

    #[error("verification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("verification service returned {0}")]
    Status(StatusCode),

    #[error("malformed verification response: {0}")]
    Malformed(String),

    #[error("verification timed out")]
    Timeout,

    #[error("invalid verification url: {0}")]
    InvalidUrl(String),
}

/// Resolves an opaque client token to a player identifier
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<PlayerId, VerifyError>;
}

/// Verifier backed by `GET {base_url}/{token}`
///
/// A successful response carries the player id in its `message` field.
pub struct HttpVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVerifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Appends `token` to the base URL as a single percent-encoded segment
    fn token_url(&self, token: &str) -> Result<Url, VerifyError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| VerifyError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| VerifyError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(token);
        Ok(url)
    }
}

#[async_trait]
impl IdentityVerifier for HttpVerifier {
    async fn verify(&self, token: &str) -> Result<PlayerId, VerifyError> {
        let response = self
            .client
            .get(self.token_url(token)?)
            .header(ORIGIN, VERIFY_ORIGIN)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::Status(status));
        }

        let body = response.text().await?;
        let payload: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| VerifyError::Malformed(e.to_string()))?;

        match payload.get("message").and_then(|m| m.as_str()) {
            Some(player_id) if !player_id.is_empty() => {
                debug!("Token resolved to player {}", player_id);
                Ok(player_id.to_string())
            }
            _ => Err(VerifyError::Denied),
        }
    }
}
