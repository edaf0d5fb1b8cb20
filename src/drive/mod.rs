mod api;
mod oauth;
pub mod resolve;
mod types;

use async_trait::async_trait;

pub use api::GoogleDrive;
pub use oauth::{AccessToken, Credential, TOKEN_URI};
pub use types::{DriveFile, FOLDER_MIME};

use crate::error::RemoteError;

/// The three remote primitives the service depends on. Any hierarchical
/// store exposing list-by-name-and-parent, create-folder and create-file is
/// substitutable here; tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Non-trashed folders named `name` directly under `parent`. Order is
    /// whatever the remote returns; callers needing determinism must sort.
    async fn find_folders(&self, name: &str, parent: &str)
        -> Result<Vec<DriveFile>, RemoteError>;

    async fn create_folder(&self, name: &str, parent: &str) -> Result<DriveFile, RemoteError>;

    /// Creates a new file object; never replaces an existing one, so
    /// re-submitting the same artifact produces a duplicate.
    async fn upload_file(
        &self,
        filename: &str,
        mime_type: &str,
        parent: &str,
        content: Vec<u8>,
    ) -> Result<DriveFile, RemoteError>;
}
