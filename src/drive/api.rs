use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{AUTHORIZATION, LOCATION},
    Client, Response,
};

use crate::{
    drive::{
        oauth::Credential,
        types::{DriveFile, ListResponse, FOLDER_MIME},
        DriveApi,
    },
    error::RemoteError,
};

pub const RES_URI: &str = "https://www.googleapis.com/drive/v3/files";
pub const UPLOAD_URI: &str = "https://www.googleapis.com/upload/drive/v3/files";

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

lazy_static::lazy_static! {
    static ref FILE_FIELDS: String = DriveFile::fields().join(",");
    static ref LIST_FIELDS: String = format!("files({})", FILE_FIELDS.as_str());
}

/// Drive v3 client. Holds the immutable process credential and a shared
/// connection pool; a fresh access token is derived for every call.
pub struct GoogleDrive {
    http: Client,
    credential: Credential,
}

impl GoogleDrive {
    pub fn new(credential: Credential) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(Self { http, credential })
    }

    async fn auth_header(&self) -> Result<String, RemoteError> {
        let token = self.credential.obtain_access_token(&self.http).await?;
        Ok(format!("Bearer {}", token.as_str()))
    }
}

/// Non-2xx responses keep their body; Drive puts the useful detail there.
async fn checked(res: Response) -> Result<Response, RemoteError> {
    let status = res.status();
    if status.is_success() {
        Ok(res)
    } else {
        let body = res.text().await.unwrap_or_default();
        Err(RemoteError::Status { status, body })
    }
}

fn escape_query_term(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl DriveApi for GoogleDrive {
    async fn find_folders(
        &self,
        name: &str,
        parent: &str,
    ) -> Result<Vec<DriveFile>, RemoteError> {
        let q = format!(
            "name = '{}' and mimeType = '{}' and '{}' in parents and trashed = false",
            escape_query_term(name),
            FOLDER_MIME,
            escape_query_term(parent),
        );

        let res = self
            .http
            .get(RES_URI)
            .header(AUTHORIZATION, self.auth_header().await?.as_str())
            .query(&[
                ("q", q.as_str()),
                ("fields", LIST_FIELDS.as_str()),
                ("pageSize", "100"),
            ])
            .send()
            .await?;

        let list = checked(res).await?.json::<ListResponse>().await?;

        Ok(list.files)
    }

    async fn create_folder(&self, name: &str, parent: &str) -> Result<DriveFile, RemoteError> {
        let res = self
            .http
            .post(RES_URI)
            .header(AUTHORIZATION, self.auth_header().await?.as_str())
            .query(&[("fields", FILE_FIELDS.as_str())])
            .json(&serde_json::json!({
                "name": name,
                "parents": [parent],
                "mimeType": FOLDER_MIME,
            }))
            .send()
            .await?;

        let folder = checked(res).await?.json::<DriveFile>().await?;

        Ok(folder)
    }

    async fn upload_file(
        &self,
        filename: &str,
        mime_type: &str,
        parent: &str,
        content: Vec<u8>,
    ) -> Result<DriveFile, RemoteError> {
        let auth = self.auth_header().await?;

        // Open a resumable session for the metadata, then push the whole
        // payload with a single PUT; artifacts are small in-memory images.
        let res = self
            .http
            .post(UPLOAD_URI)
            .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS.as_str())])
            .header(AUTHORIZATION, auth.as_str())
            .json(&serde_json::json!({
                "name": filename,
                "parents": [parent],
                "mimeType": mime_type,
            }))
            .send()
            .await?;

        let session_url = checked(res)
            .await?
            .headers()
            .get(LOCATION)
            .ok_or_else(|| {
                RemoteError::Malformed("upload session response has no `Location` header".into())
            })?
            .to_str()
            .map_err(|_| RemoteError::Malformed("`Location` header is not valid UTF-8".into()))?
            .to_owned();

        let res = self
            .http
            .put(&session_url)
            .header(AUTHORIZATION, auth.as_str())
            .body(content)
            .send()
            .await?;

        let file = checked(res).await?.json::<DriveFile>().await?;

        Ok(file)
    }
}
