use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    drive::{resolve::resolve, DriveApi},
    error::{SaveError, UploadError},
};

/// Only fields carrying this marker are treated as artifacts; anything else
/// in `qr`/`photo` is ignored rather than rejected.
const DATA_IMAGE_MARKER: &str = "data:image";

fn default_id() -> String {
    "unknown".to_string()
}

fn default_name() -> String {
    "unknown".to_string()
}

fn default_last_name() -> String {
    "attendance".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(default = "default_id")]
    pub id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_last_name")]
    pub last_name: String,
    #[serde(default)]
    pub qr: String,
    #[serde(default)]
    pub photo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedFile {
    pub name: String,
    pub drive_id: String,
}

struct ImageData {
    mime: String,
    ext: String,
    bytes: Vec<u8>,
}

/// `data:image/<subtype>;base64,<payload>` → decoded bytes plus the mime
/// type and file extension the subtype dictates. `Ok(None)` means the field
/// is not an embedded image and is skipped entirely.
fn parse_artifact(field: &'static str, data: &str) -> Result<Option<ImageData>, SaveError> {
    if !data.starts_with(DATA_IMAGE_MARKER) {
        return Ok(None);
    }

    let rest = data
        .strip_prefix("data:image/")
        .ok_or_else(|| SaveError::Decode {
            field,
            reason: "missing image subtype".to_string(),
        })?;

    let (subtype, payload) = rest.split_once(";base64,").ok_or_else(|| SaveError::Decode {
        field,
        reason: "not a base64 data URI".to_string(),
    })?;

    if subtype.is_empty() {
        return Err(SaveError::Decode {
            field,
            reason: "missing image subtype".to_string(),
        });
    }

    let bytes = BASE64.decode(payload).map_err(|e| SaveError::Decode {
        field,
        reason: e.to_string(),
    })?;

    if bytes.is_empty() {
        return Err(SaveError::Decode {
            field,
            reason: "decoded image is empty".to_string(),
        });
    }

    Ok(Some(ImageData {
        mime: format!("image/{subtype}"),
        ext: subtype.to_string(),
        bytes,
    }))
}

/// Drives one request end to end: decode, resolve the student folder,
/// upload, aggregate. Holds the only piece of cross-request state besides
/// the credential itself: the lock that serializes find-or-create walks.
pub struct SaveService {
    drive: Arc<dyn DriveApi>,
    root_folder: String,
    resolve_lock: Mutex<()>,
}

impl SaveService {
    pub fn new(drive: Arc<dyn DriveApi>, root_folder: String) -> Self {
        Self {
            drive,
            root_folder,
            resolve_lock: Mutex::new(()),
        }
    }

    pub async fn save(&self, req: SaveRequest) -> Result<Vec<SavedFile>, SaveError> {
        tracing::info!(id = %req.id, student = %req.name, last_name = %req.last_name, "saving student artifacts");

        let mut saved = Vec::new();
        match self.process(&req, &mut saved).await {
            Ok(()) => Ok(saved),
            Err(e) if saved.is_empty() => Err(e),
            // Later stages failed after earlier uploads landed. The stored
            // objects stay on drive; the caller still gets an error.
            Err(e) => Err(SaveError::Partial {
                saved,
                source: Box::new(e),
            }),
        }
    }

    // The QR artifact runs to completion before the photo is even decoded.
    async fn process(
        &self,
        req: &SaveRequest,
        saved: &mut Vec<SavedFile>,
    ) -> Result<(), SaveError> {
        if let Some(image) = parse_artifact("qr", &req.qr)? {
            saved.push(self.upload_artifact(req, "qr", image).await?);
        }

        if let Some(image) = parse_artifact("photo", &req.photo)? {
            saved.push(self.upload_artifact(req, "photo", image).await?);
        }

        Ok(())
    }

    async fn upload_artifact(
        &self,
        req: &SaveRequest,
        kind: &'static str,
        image: ImageData,
    ) -> Result<SavedFile, SaveError> {
        let filename = format!("{}_{}_{}.{}", req.last_name, req.id, kind, image.ext);

        // Serialized so two concurrent requests for the same student cannot
        // both miss the lookup and create duplicate sibling folders.
        let folder_id = {
            let _guard = self.resolve_lock.lock().await;
            resolve(
                self.drive.as_ref(),
                &[self.root_folder.as_str(), req.last_name.as_str()],
            )
            .await?
        };

        let file = self
            .drive
            .upload_file(&filename, &image.mime, &folder_id, image.bytes)
            .await
            .map_err(|e| UploadError::from_remote(filename.clone(), e))?;

        tracing::info!(%filename, drive_id = %file.id, "artifact uploaded");

        Ok(SavedFile {
            name: filename,
            drive_id: file.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use reqwest::StatusCode;

    use super::*;
    use crate::{
        drive::{DriveFile, MockDriveApi, FOLDER_MIME},
        error::RemoteError,
    };

    const ROOT: &str = "BSCS1 - ATTENDANCE QR CODE";
    // 1x1 transparent PNG
    const PNG_BYTES: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1f, 0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78,
        0x9c, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    fn data_uri(subtype: &str, bytes: &[u8]) -> String {
        format!("data:image/{subtype};base64,{}", BASE64.encode(bytes))
    }

    fn folder(id: &str, name: &str) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: FOLDER_MIME.to_string(),
            parents: None,
        }
    }

    fn uploaded(id: &str, name: &str, mime: &str) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime.to_string(),
            parents: None,
        }
    }

    fn request(id: &str, last_name: &str, qr: &str, photo: &str) -> SaveRequest {
        SaveRequest {
            id: id.to_string(),
            name: "Ada".to_string(),
            last_name: last_name.to_string(),
            qr: qr.to_string(),
            photo: photo.to_string(),
        }
    }

    fn service(drive: MockDriveApi) -> SaveService {
        SaveService::new(Arc::new(drive), ROOT.to_string())
    }

    /// Expects one full path walk `ROOT -> last_name` over existing folders
    /// and returns the leaf id.
    fn expect_resolved_path(
        drive: &mut MockDriveApi,
        last_name: &'static str,
        leaf_id: &'static str,
        times: usize,
    ) {
        drive
            .expect_find_folders()
            .with(eq(ROOT), eq("root"))
            .times(times)
            .returning(|name, _| Ok(vec![folder("root-folder", name)]));
        drive
            .expect_find_folders()
            .with(eq(last_name), eq("root-folder"))
            .times(times)
            .returning(move |name, _| Ok(vec![folder(leaf_id, name)]));
    }

    #[tokio::test]
    async fn test_qr_only_request_uploads_single_artifact() -> anyhow::Result<()> {
        let mut drive = MockDriveApi::new();
        expect_resolved_path(&mut drive, "Lovelace", "leaf-1", 1);
        drive
            .expect_upload_file()
            .with(
                eq("Lovelace_007_qr.png"),
                eq("image/png"),
                eq("leaf-1"),
                eq(PNG_BYTES.to_vec()),
            )
            .times(1)
            .returning(|name, mime, _, _| Ok(uploaded("file-9", name, mime)));

        let req = request("007", "Lovelace", &data_uri("png", PNG_BYTES), "");
        let saved = service(drive).save(req).await?;

        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "Lovelace_007_qr.png");
        assert_eq!(saved[0].drive_id, "file-9");
        Ok(())
    }

    #[tokio::test]
    async fn test_no_image_fields_makes_no_remote_calls() -> anyhow::Result<()> {
        // no expectations: any remote call panics the mock
        let drive = MockDriveApi::new();

        let saved = service(drive)
            .save(request("007", "Lovelace", "", ""))
            .await?;
        assert!(saved.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_non_marker_fields_are_skipped() -> anyhow::Result<()> {
        let drive = MockDriveApi::new();

        let saved = service(drive)
            .save(request("007", "Lovelace", "hello", "also not an image"))
            .await?;
        assert!(saved.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_base64_fails_before_any_remote_call() {
        let drive = MockDriveApi::new();

        let res = service(drive)
            .save(request("007", "Lovelace", "data:image/png;base64,@@not-base64@@", ""))
            .await;
        assert!(matches!(res, Err(SaveError::Decode { field: "qr", .. })));
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_decode_failure() {
        let drive = MockDriveApi::new();

        let res = service(drive)
            .save(request("007", "Lovelace", "data:image/png;base64,", ""))
            .await;
        assert!(matches!(res, Err(SaveError::Decode { field: "qr", .. })));
    }

    #[tokio::test]
    async fn test_uploaded_content_matches_decoded_length() -> anyhow::Result<()> {
        let original: Vec<u8> = (0u8..=255).cycle().take(1337).collect();
        let expected = original.clone();

        let mut drive = MockDriveApi::new();
        expect_resolved_path(&mut drive, "Lovelace", "leaf-1", 1);
        drive
            .expect_upload_file()
            .withf(move |_, _, _, content| content.len() == 1337 && *content == expected)
            .times(1)
            .returning(|name, mime, _, _| Ok(uploaded("file-1", name, mime)));

        let req = request("007", "Lovelace", &data_uri("png", &original), "");
        service(drive).save(req).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_photo_transport_failure_after_qr_success_is_partial() {
        let mut drive = MockDriveApi::new();
        // both artifacts re-resolve the full path
        expect_resolved_path(&mut drive, "Lovelace", "leaf-1", 2);
        drive
            .expect_upload_file()
            .with(
                eq("Lovelace_007_qr.png"),
                eq("image/png"),
                eq("leaf-1"),
                eq(PNG_BYTES.to_vec()),
            )
            .times(1)
            .returning(|name, mime, _, _| Ok(uploaded("file-qr", name, mime)));
        // the trait has no delete primitive, so there is nothing the service
        // could roll the QR object back with
        drive
            .expect_upload_file()
            .with(
                eq("Lovelace_007_photo.png"),
                eq("image/png"),
                eq("leaf-1"),
                eq(PNG_BYTES.to_vec()),
            )
            .times(1)
            .returning(|_, _, _, _| {
                Err(RemoteError::Status {
                    status: StatusCode::BAD_GATEWAY,
                    body: "connection reset".into(),
                })
            });

        let req = request(
            "007",
            "Lovelace",
            &data_uri("png", PNG_BYTES),
            &data_uri("png", PNG_BYTES),
        );
        let res = service(drive).save(req).await;

        match res {
            Err(SaveError::Partial { saved, source }) => {
                assert_eq!(saved.len(), 1);
                assert_eq!(saved[0].drive_id, "file-qr");
                assert!(matches!(
                    *source,
                    SaveError::Upload(UploadError::TransportFailed { .. })
                ));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_photo_decode_failure_after_qr_success_is_partial() {
        let mut drive = MockDriveApi::new();
        expect_resolved_path(&mut drive, "Lovelace", "leaf-1", 1);
        drive
            .expect_upload_file()
            .times(1)
            .returning(|name, mime, _, _| Ok(uploaded("file-qr", name, mime)));

        let req = request(
            "007",
            "Lovelace",
            &data_uri("png", PNG_BYTES),
            "data:image/png;base64,***",
        );
        let res = service(drive).save(req).await;

        assert!(matches!(
            res,
            Err(SaveError::Partial { ref saved, ref source })
                if saved.len() == 1 && matches!(**source, SaveError::Decode { field: "photo", .. })
        ));
    }

    #[tokio::test]
    async fn test_mime_and_extension_follow_data_uri_subtype() -> anyhow::Result<()> {
        let mut drive = MockDriveApi::new();
        expect_resolved_path(&mut drive, "Curie", "leaf-2", 1);
        drive
            .expect_upload_file()
            .with(
                eq("Curie_12_photo.jpeg"),
                eq("image/jpeg"),
                eq("leaf-2"),
                eq(vec![0xffu8, 0xd8, 0xff]),
            )
            .times(1)
            .returning(|name, mime, _, _| Ok(uploaded("file-2", name, mime)));

        let req = request("12", "Curie", "", &data_uri("jpeg", &[0xff, 0xd8, 0xff]));
        let saved = service(drive).save(req).await?;
        assert_eq!(saved[0].name, "Curie_12_photo.jpeg");
        Ok(())
    }

    #[test]
    fn test_request_defaults() -> anyhow::Result<()> {
        let req: SaveRequest = serde_json::from_str("{}")?;
        assert_eq!(req.id, "unknown");
        assert_eq!(req.name, "unknown");
        assert_eq!(req.last_name, "attendance");
        assert!(req.qr.is_empty());
        assert!(req.photo.is_empty());

        let req: SaveRequest = serde_json::from_str(r#"{"lastName":"Lovelace"}"#)?;
        assert_eq!(req.last_name, "Lovelace");
        Ok(())
    }

    #[test]
    fn test_parse_artifact_rejects_marker_without_subtype() {
        let res = parse_artifact("qr", "data:image;base64,AAAA");
        assert!(matches!(res, Err(SaveError::Decode { field: "qr", .. })));
    }

    #[test]
    fn test_saved_file_serializes_drive_id_key() -> anyhow::Result<()> {
        let json = serde_json::to_string(&SavedFile {
            name: "Lovelace_007_qr.png".into(),
            drive_id: "abc".into(),
        })?;
        assert!(json.contains(r#""drive_id":"abc""#));
        Ok(())
    }
}
