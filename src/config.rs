use std::{env, fs};

use anyhow::Context;

use crate::{drive::Credential, error::CredentialError};

pub const DEFAULT_ROOT_FOLDER: &str = "BSCS1 - ATTENDANCE QR CODE";
const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub root_folder: String,
    pub credential: Credential,
}

impl AppConfig {
    /// Reads the full process configuration from the environment. A missing
    /// or malformed credential is fatal here, at startup, never later inside
    /// a request.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match env::var("PORT") {
            Ok(p) => p.parse::<u16>().with_context(|| format!("invalid PORT '{p}'"))?,
            Err(_) => DEFAULT_PORT,
        };

        let root_folder =
            env::var("DRIVE_ROOT_FOLDER").unwrap_or_else(|_| DEFAULT_ROOT_FOLDER.to_string());

        let credential = load_credential().context("loading drive credential")?;

        Ok(Self {
            port,
            root_folder,
            credential,
        })
    }
}

/// A JSON blob file takes precedence; otherwise the three
/// `GOOGLE_*` variables must all be present.
fn load_credential() -> anyhow::Result<Credential> {
    if let Ok(path) = env::var("DRIVE_CREDENTIALS_FILE") {
        let blob = fs::read_to_string(&path)
            .with_context(|| format!("reading credential blob '{path}'"))?;
        let credential: Credential = serde_json::from_str(&blob)
            .with_context(|| format!("malformed credential blob '{path}'"))?;
        return Ok(credential);
    }

    match (
        env::var("GOOGLE_CLIENT_ID"),
        env::var("GOOGLE_CLIENT_SECRET"),
        env::var("GOOGLE_REFRESH_TOKEN"),
    ) {
        (Ok(client_id), Ok(client_secret), Ok(refresh_token)) => Ok(Credential {
            client_id,
            client_secret,
            refresh_token,
            token_endpoint: env::var("GOOGLE_TOKEN_ENDPOINT")
                .unwrap_or_else(|_| crate::drive::TOKEN_URI.to_string()),
        }),
        _ => Err(CredentialError::Missing.into()),
    }
}
