use reqwest::Client;
use serde::Deserialize;

use crate::{drive::types::TokenResponse, error::CredentialError};

pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_endpoint() -> String {
    TOKEN_URI.to_string()
}

/// Long-lived refresh credential, loaded once at startup and never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
}

/// Short-lived bearer token, owned by the single operation that derived it.
#[derive(Debug)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Credential {
    /// Exchanges the refresh token for a fresh access token. Called once per
    /// remote operation; tokens are never cached across requests.
    pub async fn obtain_access_token(&self, http: &Client) -> Result<AccessToken, CredentialError> {
        let token = http
            .post(&self.token_endpoint)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<TokenResponse>()
            .await?;

        tracing::debug!(expires_in = token.expires_in, "obtained drive access token");

        Ok(AccessToken(token.access_token))
    }
}
