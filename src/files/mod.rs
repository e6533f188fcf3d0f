//! File manager
//!
//! User-scoped file operations over an object storage backend: upload,
//! list, rename, delete, download, and signed thumbnail/preview URLs.
//! Every operation enforces that the storage key is prefixed with the
//! caller's user id.

pub mod filename;
pub mod object_store;

pub use filename::sanitize_file_name;
pub use object_store::{HttpObjectStore, ImageTransform, MemoryObjectStore, ObjectInfo, ObjectStore};

use crate::auth::AuthUser;
use crate::config::StorageConfig;
use crate::error::{Result, WorkdeskError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Metadata key holding the original (pre-sanitization) filename
const ORIGINAL_NAME_KEY: &str = "originalName";

/// Listing page size
const LIST_LIMIT: usize = 100;

/// A user's file as surfaced by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFile {
    /// Identity; equals the storage path
    pub id: String,
    /// Display name (the original filename)
    pub name: String,
    /// Storage key, `{userId}/{sanitizedName}`
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    pub mime_type: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Public URL
    pub url: String,
}

/// File manager over an object storage backend
pub struct FileManager {
    store: Arc<dyn ObjectStore>,
    signed_url_ttl_seconds: u64,
    thumbnail: ImageTransform,
}

impl FileManager {
    /// Create a file manager
    ///
    /// # Arguments
    ///
    /// * `store` - Object storage backend
    /// * `config` - Storage section of the configuration
    pub fn new(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            signed_url_ttl_seconds: config.signed_url_ttl_seconds,
            thumbnail: ImageTransform::thumbnail(config.thumbnail.width, config.thumbnail.height),
        }
    }

    /// Reject paths that are not under the caller's folder
    fn ensure_owner(user: &AuthUser, path: &str) -> Result<()> {
        if path.starts_with(&format!("{}/", user.id)) {
            Ok(())
        } else {
            Err(WorkdeskError::Forbidden(format!(
                "not allowed to access this file: {}",
                path
            ))
            .into())
        }
    }

    fn user_file_from_info(&self, info: &ObjectInfo) -> UserFile {
        let display_name = info
            .metadata
            .get(ORIGINAL_NAME_KEY)
            .cloned()
            .unwrap_or_else(|| info.name.clone());
        UserFile {
            id: info.path.clone(),
            name: display_name,
            path: info.path.clone(),
            size: info.size,
            mime_type: info.mime_type.clone(),
            created_at: info.created_at,
            updated_at: info.updated_at,
            url: self.store.public_url(&info.path),
        }
    }

    /// Upload a file into the caller's folder
    ///
    /// The filename is sanitized for the storage key; the original name
    /// is preserved in object metadata and returned as the display name.
    /// Uploads overwrite an existing object at the same key.
    ///
    /// # Errors
    ///
    /// Returns storage errors unchanged
    pub async fn upload(
        &self,
        user: &AuthUser,
        filename: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UserFile> {
        let sanitized = sanitize_file_name(filename);
        let path = format!("{}/{}", user.id, sanitized);
        let size = bytes.len() as u64;

        let mut metadata = HashMap::new();
        metadata.insert(ORIGINAL_NAME_KEY.to_string(), filename.to_string());

        tracing::debug!("Uploading {} ({} bytes) to {}", filename, size, path);
        let result = self
            .store
            .put(&path, bytes, mime_type, metadata, true)
            .await;
        crate::metrics::record_file_operation("upload", result.is_ok());
        result?;

        let now = Utc::now();
        Ok(UserFile {
            id: path.clone(),
            name: filename.to_string(),
            path: path.clone(),
            size,
            mime_type: mime_type.to_string(),
            created_at: now,
            updated_at: now,
            url: self.store.public_url(&path),
        })
    }

    /// List the caller's files, newest first
    ///
    /// Display names come from the `originalName` metadata, falling back
    /// to the sanitized key leaf.
    pub async fn list(&self, user: &AuthUser) -> Result<Vec<UserFile>> {
        let infos = self.store.list(&user.id, LIST_LIMIT).await?;
        Ok(infos
            .iter()
            .map(|info| self.user_file_from_info(info))
            .collect())
    }

    /// Rename a file
    ///
    /// Copy first, verify the copy by checksum, and only then delete the
    /// source. A failed verification removes the copy and leaves the
    /// source untouched, so a retry starts from a clean state; a failed
    /// source delete leaves both objects and is logged, never fatal.
    ///
    /// # Errors
    ///
    /// - `WorkdeskError::Forbidden` when the caller does not own the path
    /// - `WorkdeskError::NotFound` when the source does not exist
    /// - `WorkdeskError::Storage` when the copied bytes fail verification
    pub async fn rename(
        &self,
        user: &AuthUser,
        old_path: &str,
        new_name: &str,
    ) -> Result<UserFile> {
        Self::ensure_owner(user, old_path)?;

        let bytes = self.store.get(old_path).await?;
        let info = self.store.head(old_path).await?;
        let checksum = Sha256::digest(&bytes);

        let sanitized = sanitize_file_name(new_name);
        let new_path = format!("{}/{}", user.id, sanitized);

        let mut metadata = HashMap::new();
        metadata.insert(ORIGINAL_NAME_KEY.to_string(), new_name.to_string());

        let size = bytes.len() as u64;
        self.store
            .put(&new_path, bytes, &info.mime_type, metadata, true)
            .await?;

        let copied = self.store.get(&new_path).await?;
        if Sha256::digest(&copied) != checksum {
            tracing::error!(
                "Rename verification failed for {} -> {}, removing copy",
                old_path,
                new_path
            );
            if let Err(e) = self.store.delete(&new_path).await {
                tracing::warn!("Failed to clean up unverified copy {}: {}", new_path, e);
            }
            crate::metrics::record_file_operation("rename", false);
            return Err(WorkdeskError::Storage(format!(
                "rename verification failed for {}",
                new_path
            ))
            .into());
        }

        if new_path != old_path {
            if let Err(e) = self.store.delete(old_path).await {
                tracing::warn!("Failed to delete old file {}: {}", old_path, e);
            }
        }
        crate::metrics::record_file_operation("rename", true);

        let now = Utc::now();
        Ok(UserFile {
            id: new_path.clone(),
            name: new_name.to_string(),
            path: new_path.clone(),
            size,
            mime_type: info.mime_type,
            created_at: now,
            updated_at: now,
            url: self.store.public_url(&new_path),
        })
    }

    /// Delete a file
    ///
    /// # Errors
    ///
    /// - `WorkdeskError::Forbidden` when the caller does not own the path
    /// - `WorkdeskError::NotFound` when the object does not exist
    pub async fn delete(&self, user: &AuthUser, path: &str) -> Result<()> {
        Self::ensure_owner(user, path)?;
        let result = self.store.delete(path).await;
        crate::metrics::record_file_operation("delete", result.is_ok());
        result
    }

    /// Download a file's bytes and MIME type
    ///
    /// # Errors
    ///
    /// - `WorkdeskError::Forbidden` when the caller does not own the path
    /// - `WorkdeskError::NotFound` when the object does not exist
    pub async fn download(&self, user: &AuthUser, path: &str) -> Result<(Vec<u8>, String)> {
        Self::ensure_owner(user, path)?;
        let bytes = self.store.get(path).await?;
        let info = self.store.head(path).await?;
        Ok((bytes, info.mime_type))
    }

    /// Time-limited signed URL for a small thumbnail of an image
    ///
    /// # Errors
    ///
    /// - `WorkdeskError::Forbidden` when the caller does not own the path
    pub async fn thumbnail_url(&self, user: &AuthUser, path: &str) -> Result<String> {
        Self::ensure_owner(user, path)?;
        self.store
            .signed_url(path, self.signed_url_ttl_seconds, Some(&self.thumbnail))
            .await
    }

    /// Time-limited signed URL for a full-size preview (no transform)
    ///
    /// # Errors
    ///
    /// - `WorkdeskError::Forbidden` when the caller does not own the path
    pub async fn preview_url(&self, user: &AuthUser, path: &str) -> Result<String> {
        Self::ensure_owner(user, path)?;
        self.store
            .signed_url(path, self.signed_url_ttl_seconds, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            email: None,
        }
    }

    fn manager() -> FileManager {
        FileManager::new(Arc::new(MemoryObjectStore::new()), &StorageConfig::default())
    }

    #[tokio::test]
    async fn test_upload_sanitizes_path_keeps_display_name() {
        let manager = manager();
        let file = manager
            .upload(&user("u1"), "a b.txt", "text/plain", Vec::new())
            .await
            .unwrap();
        assert_eq!(file.path, "u1/a_b.txt");
        assert_eq!(file.name, "a b.txt");
        assert_eq!(file.size, 0);
        assert!(!file.path.contains(' '));
    }

    #[tokio::test]
    async fn test_upload_then_list_round_trips_display_name() {
        let manager = manager();
        manager
            .upload(&user("u1"), "a b.txt", "text/plain", Vec::new())
            .await
            .unwrap();

        let files = manager.list(&user("u1")).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "a b.txt");
        assert_eq!(files[0].path, "u1/a_b.txt");
    }

    #[tokio::test]
    async fn test_list_is_scoped_per_user() {
        let manager = manager();
        manager
            .upload(&user("u1"), "mine.txt", "text/plain", vec![1])
            .await
            .unwrap();
        manager
            .upload(&user("u2"), "theirs.txt", "text/plain", vec![2])
            .await
            .unwrap();

        let files = manager.list(&user("u1")).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "mine.txt");
    }

    #[tokio::test]
    async fn test_mutations_reject_foreign_paths() {
        let manager = manager();
        manager
            .upload(&user("u2"), "target.txt", "text/plain", vec![1])
            .await
            .unwrap();
        let intruder = user("u1");

        for err in [
            manager
                .delete(&intruder, "u2/target.txt")
                .await
                .unwrap_err(),
            manager
                .rename(&intruder, "u2/target.txt", "stolen.txt")
                .await
                .unwrap_err(),
            manager
                .download(&intruder, "u2/target.txt")
                .await
                .unwrap_err(),
            manager
                .thumbnail_url(&intruder, "u2/target.txt")
                .await
                .unwrap_err(),
            manager
                .preview_url(&intruder, "u2/target.txt")
                .await
                .unwrap_err(),
        ] {
            assert!(matches!(
                err.downcast_ref::<WorkdeskError>(),
                Some(WorkdeskError::Forbidden(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_prefix_check_requires_separator() {
        let manager = manager();
        manager
            .upload(&user("u11"), "file.txt", "text/plain", vec![1])
            .await
            .unwrap();
        // "u1" must not be able to touch "u11/..." even though it is a
        // string prefix of the user id.
        let err = manager
            .delete(&user("u1"), "u11/file.txt")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkdeskError>(),
            Some(WorkdeskError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_twice_yields_not_found_not_panic() {
        let manager = manager();
        let owner = user("u1");
        manager
            .upload(&owner, "gone.txt", "text/plain", vec![1])
            .await
            .unwrap();

        manager.delete(&owner, "u1/gone.txt").await.unwrap();
        let err = manager.delete(&owner, "u1/gone.txt").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkdeskError>(),
            Some(WorkdeskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_copies_verifies_and_deletes_source() {
        let manager = manager();
        let owner = user("u1");
        manager
            .upload(&owner, "old name.txt", "text/plain", b"content".to_vec())
            .await
            .unwrap();

        let renamed = manager
            .rename(&owner, "u1/old_name.txt", "new name.txt")
            .await
            .unwrap();
        assert_eq!(renamed.path, "u1/new_name.txt");
        assert_eq!(renamed.name, "new name.txt");
        assert_eq!(renamed.mime_type, "text/plain");

        let files = manager.list(&owner).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "u1/new_name.txt");

        let (bytes, _) = manager.download(&owner, "u1/new_name.txt").await.unwrap();
        assert_eq!(bytes, b"content");
    }

    #[tokio::test]
    async fn test_rename_missing_source_is_not_found() {
        let manager = manager();
        let err = manager
            .rename(&user("u1"), "u1/missing.txt", "new.txt")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkdeskError>(),
            Some(WorkdeskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_verification_failure_cleans_up_copy() {
        /// Store that corrupts every written object, so the read-back
        /// checksum never matches.
        struct CorruptingStore {
            inner: MemoryObjectStore,
        }

        #[async_trait::async_trait]
        impl ObjectStore for CorruptingStore {
            async fn put(
                &self,
                path: &str,
                mut bytes: Vec<u8>,
                mime_type: &str,
                metadata: HashMap<String, String>,
                upsert: bool,
            ) -> Result<()> {
                bytes.push(0xFF);
                self.inner.put(path, bytes, mime_type, metadata, upsert).await
            }

            async fn get(&self, path: &str) -> Result<Vec<u8>> {
                self.inner.get(path).await
            }

            async fn head(&self, path: &str) -> Result<ObjectInfo> {
                self.inner.head(path).await
            }

            async fn delete(&self, path: &str) -> Result<()> {
                self.inner.delete(path).await
            }

            async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<ObjectInfo>> {
                self.inner.list(prefix, limit).await
            }

            fn public_url(&self, path: &str) -> String {
                self.inner.public_url(path)
            }

            async fn signed_url(
                &self,
                path: &str,
                ttl_secs: u64,
                transform: Option<&ImageTransform>,
            ) -> Result<String> {
                self.inner.signed_url(path, ttl_secs, transform).await
            }
        }

        let inner = MemoryObjectStore::new();
        inner
            .put(
                "u1/source.txt",
                b"content".to_vec(),
                "text/plain",
                HashMap::new(),
                true,
            )
            .await
            .unwrap();
        let store = Arc::new(CorruptingStore { inner });
        let manager = FileManager::new(store.clone(), &StorageConfig::default());

        let err = manager
            .rename(&user("u1"), "u1/source.txt", "renamed.txt")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkdeskError>(),
            Some(WorkdeskError::Storage(_))
        ));

        // Source intact, unverified copy removed.
        assert!(store.get("u1/source.txt").await.is_ok());
        assert!(store.get("u1/renamed.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_thumbnail_url_applies_transform_preview_does_not() {
        let manager = manager();
        let owner = user("u1");
        manager
            .upload(&owner, "pic.png", "image/png", vec![1, 2, 3])
            .await
            .unwrap();

        let thumb = manager.thumbnail_url(&owner, "u1/pic.png").await.unwrap();
        assert!(thumb.contains("width=128"));
        assert!(thumb.contains("resize=cover"));

        let preview = manager.preview_url(&owner, "u1/pic.png").await.unwrap();
        assert!(!preview.contains("width="));
        assert!(preview.contains("expires_in=3600"));
    }

    #[tokio::test]
    async fn test_download_returns_bytes_and_mime() {
        let manager = manager();
        let owner = user("u1");
        manager
            .upload(&owner, "doc.pdf", "application/pdf", vec![9, 9])
            .await
            .unwrap();
        let (bytes, mime) = manager.download(&owner, "u1/doc.pdf").await.unwrap();
        assert_eq!(bytes, vec![9, 9]);
        assert_eq!(mime, "application/pdf");
    }
}
