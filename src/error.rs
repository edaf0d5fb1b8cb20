use thiserror::Error;

use crate::save::SavedFile;

/// Failures while obtaining an access token from the refresh credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no drive credential is configured")]
    Missing,
    #[error("access token refresh failed")]
    RefreshFailed(#[from] reqwest::Error),
}

/// Failures of the raw Drive primitives (list, create folder, upload).
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("drive request failed")]
    Transport(#[from] reqwest::Error),
    #[error("drive returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected drive response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum FolderError {
    #[error("could not look up folder '{name}'")]
    LookupFailed {
        name: String,
        #[source]
        source: RemoteError,
    },
    #[error("could not create folder '{name}'")]
    CreateFailed {
        name: String,
        #[source]
        source: RemoteError,
    },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    CredentialFailed(CredentialError),
    #[error("could not upload '{filename}'")]
    TransportFailed {
        filename: String,
        #[source]
        source: RemoteError,
    },
}

impl UploadError {
    /// Credential failures keep their own identity so callers can tell a
    /// revoked refresh token apart from a storage-side fault.
    pub fn from_remote(filename: String, err: RemoteError) -> Self {
        match err {
            RemoteError::Credential(e) => UploadError::CredentialFailed(e),
            e => UploadError::TransportFailed { filename, source: e },
        }
    }
}

/// Per-request failure surfaced to the HTTP caller.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("could not decode {field} image: {reason}")]
    Decode {
        field: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Folder(#[from] FolderError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// A later artifact failed after earlier uploads already landed on
    /// drive. Nothing is rolled back; `saved` names what remains stored.
    #[error("request failed after {} file(s) were already uploaded", .saved.len())]
    Partial {
        saved: Vec<SavedFile>,
        #[source]
        source: Box<SaveError>,
    },
}

impl SaveError {
    /// True for failures produced before any remote call, from the request
    /// payload alone.
    pub fn is_local(&self) -> bool {
        matches!(self, SaveError::Validation(_) | SaveError::Decode { .. })
    }
}

/// Renders `err: cause: cause` for the `{"error"}` response field.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
