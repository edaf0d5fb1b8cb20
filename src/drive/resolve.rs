use crate::{drive::DriveApi, error::FolderError};

/// Drive's alias for "no parent"; the first path segment resolves under it.
pub const ROOT_PARENT: &str = "root";

/// Walks `segments` left to right, adopting the id of an existing folder or
/// creating a missing one, and returns the leaf folder id. The walk runs in
/// full on every call; nothing is cached across requests.
///
/// Drive does not enforce name uniqueness among siblings. When the lookup
/// returns several matches the one with the lexicographically smallest id is
/// adopted, so repeated resolves of the same path agree regardless of the
/// order the remote happens to list them in.
pub async fn resolve(drive: &dyn DriveApi, segments: &[&str]) -> Result<String, FolderError> {
    let mut parent = ROOT_PARENT.to_string();

    for name in segments {
        let matches = drive
            .find_folders(name, &parent)
            .await
            .map_err(|source| FolderError::LookupFailed {
                name: name.to_string(),
                source,
            })?;

        parent = match matches.into_iter().min_by(|a, b| a.id.cmp(&b.id)) {
            Some(folder) => folder.id,
            None => {
                tracing::info!(folder = %name, parent = %parent, "creating drive folder");
                drive
                    .create_folder(name, &parent)
                    .await
                    .map_err(|source| FolderError::CreateFailed {
                        name: name.to_string(),
                        source,
                    })?
                    .id
            }
        };
    }

    Ok(parent)
}
