//! Object storage backends
//!
//! The `ObjectStore` trait abstracts the managed storage service the file
//! manager is built on. `HttpObjectStore` talks to a Supabase-style
//! storage REST API with a service key; `MemoryObjectStore` backs tests.

use crate::error::{Result, WorkdeskError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Metadata for one stored object
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Full storage key, `{userId}/{sanitizedName}`
    pub path: String,
    /// Key leaf (the sanitized filename)
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    pub mime_type: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// User metadata stored with the object (e.g. `originalName`)
    pub metadata: HashMap<String, String>,
}

/// Image transform applied when signing a URL
#[derive(Debug, Clone, Serialize)]
pub struct ImageTransform {
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// Resize mode understood by the storage service
    pub resize: String,
}

impl ImageTransform {
    /// The fixed small transform used for thumbnails
    pub fn thumbnail(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            resize: "cover".to_string(),
        }
    }
}

/// Object storage abstraction
///
/// Paths are opaque keys; ownership enforcement lives in the file
/// manager, not here.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object
    ///
    /// # Arguments
    ///
    /// * `path` - Storage key
    /// * `bytes` - Object content
    /// * `mime_type` - Content type
    /// * `metadata` - User metadata persisted with the object
    /// * `upsert` - Overwrite an existing object at the same key
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        metadata: HashMap<String, String>,
        upsert: bool,
    ) -> Result<()>;

    /// Retrieve an object's bytes
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::NotFound` for missing keys
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Retrieve an object's metadata without its content
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::NotFound` for missing keys
    async fn head(&self, path: &str) -> Result<ObjectInfo>;

    /// Delete an object
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::NotFound` for missing keys
    async fn delete(&self, path: &str) -> Result<()>;

    /// List objects under a prefix, sorted by creation time descending
    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<ObjectInfo>>;

    /// Public (unauthenticated) URL for an object
    fn public_url(&self, path: &str) -> String;

    /// Time-limited signed URL, optionally with an image transform
    async fn signed_url(
        &self,
        path: &str,
        ttl_secs: u64,
        transform: Option<&ImageTransform>,
    ) -> Result<String>;
}

/// Response row from the storage service's list endpoint
#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<ListedObjectMetadata>,
    #[serde(default, rename = "user_metadata")]
    user_metadata: Option<HashMap<String, String>>,
}

/// System metadata block in a listing row
#[derive(Debug, Default, Deserialize)]
struct ListedObjectMetadata {
    #[serde(default)]
    size: u64,
    #[serde(default)]
    mimetype: Option<String>,
}

/// Response from the storage service's sign endpoint
#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Storage backend speaking a Supabase-style REST API
///
/// Object routes live under `{endpoint}/storage/v1`: `object/{bucket}/..`
/// for content, `object/list/{bucket}` for listings, `object/info/...`
/// for metadata, and `object/sign/...` for signed URLs. The service key
/// authorizes every call; user metadata travels in the `x-metadata`
/// header as JSON.
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    service_key: String,
}

impl HttpObjectStore {
    /// Create a new storage client
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::Config` when the service key is missing,
    /// or a provider error if HTTP client initialization fails
    pub fn new(endpoint: &str, bucket: &str, service_key: Option<&str>) -> Result<Self> {
        let service_key = service_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                WorkdeskError::Config("storage service key is not configured".to_string())
            })?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("workdesk/0.1.0")
            .build()
            .map_err(|e| WorkdeskError::Storage(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.endpoint, self.bucket, path
        )
    }

    async fn check_status(response: reqwest::Response, path: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WorkdeskError::NotFound(path.to_string()).into());
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkdeskError::Storage(format!(
                "storage backend returned {}: {}",
                status, error_text
            ))
            .into());
        }
        Ok(response)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        metadata: HashMap<String, String>,
        upsert: bool,
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(&metadata)?;
        let response = self
            .client
            .post(self.object_url(path))
            .bearer_auth(&self.service_key)
            .header("content-type", mime_type)
            .header("cache-control", "3600")
            .header("x-upsert", if upsert { "true" } else { "false" })
            .header("x-metadata", metadata_json)
            .body(bytes)
            .send()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("upload failed: {}", e)))?;

        Self::check_status(response, path).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(path))
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("download failed: {}", e)))?;

        let response = Self::check_status(response, path).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("download body failed: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn head(&self, path: &str) -> Result<ObjectInfo> {
        let url = format!(
            "{}/storage/v1/object/info/{}/{}",
            self.endpoint, self.bucket, path
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("info failed: {}", e)))?;

        let response = Self::check_status(response, path).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("info body failed: {}", e)))?;

        let metadata = body
            .get("user_metadata")
            .and_then(Value::as_object)
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ObjectInfo {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            size: body
                .pointer("/metadata/size")
                .or_else(|| body.get("size"))
                .and_then(Value::as_u64)
                .unwrap_or(0),
            mime_type: body
                .pointer("/metadata/mimetype")
                .or_else(|| body.get("content_type"))
                .and_then(Value::as_str)
                .unwrap_or("application/octet-stream")
                .to_string(),
            created_at: body
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(Utc::now),
            updated_at: body
                .get("updated_at")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(Utc::now),
            metadata,
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.object_url(path))
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("delete failed: {}", e)))?;

        Self::check_status(response, path).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<ObjectInfo>> {
        let url = format!("{}/storage/v1/object/list/{}", self.endpoint, self.bucket);
        let prefix = prefix.trim_end_matches('/');
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.service_key)
            .json(&json!({
                "prefix": prefix,
                "limit": limit,
                "offset": 0,
                "sortBy": {"column": "created_at", "order": "desc"},
            }))
            .send()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("list failed: {}", e)))?;

        let response = Self::check_status(response, prefix).await?;
        let rows: Vec<ListedObject> = response
            .json()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("list body failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let system = row.metadata.unwrap_or_default();
                ObjectInfo {
                    path: format!("{}/{}", prefix, row.name),
                    name: row.name,
                    size: system.size,
                    mime_type: system
                        .mimetype
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    created_at: row.created_at.unwrap_or_else(Utc::now),
                    updated_at: row.updated_at.unwrap_or_else(Utc::now),
                    metadata: row.user_metadata.unwrap_or_default(),
                }
            })
            .collect())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.endpoint, self.bucket, path
        )
    }

    async fn signed_url(
        &self,
        path: &str,
        ttl_secs: u64,
        transform: Option<&ImageTransform>,
    ) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.endpoint, self.bucket, path
        );
        let mut body = json!({"expiresIn": ttl_secs});
        if let Some(transform) = transform {
            body["transform"] = serde_json::to_value(transform)?;
        }

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.service_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("sign failed: {}", e)))?;

        let response = Self::check_status(response, path).await?;
        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| WorkdeskError::Storage(format!("sign body failed: {}", e)))?;

        Ok(format!(
            "{}/storage/v1{}",
            self.endpoint,
            signed.signed_url
        ))
    }
}

/// In-memory store for tests
///
/// Signed URLs are fabricated but carry the path, TTL, and transform so
/// assertions can inspect them.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: std::sync::RwLock<HashMap<String, StoredObject>>,
    counter: std::sync::atomic::AtomicU64,
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    mime_type: String,
    metadata: HashMap<String, String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sequence: u64,
}

impl MemoryObjectStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        metadata: HashMap<String, String>,
        upsert: bool,
    ) -> Result<()> {
        let mut objects = self.objects.write().expect("lock poisoned");
        if !upsert && objects.contains_key(path) {
            return Err(
                WorkdeskError::Storage(format!("object already exists: {}", path)).into(),
            );
        }
        let now = Utc::now();
        let sequence = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let created_at = objects.get(path).map(|o| o.created_at).unwrap_or(now);
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                mime_type: mime_type.to_string(),
                metadata,
                created_at,
                updated_at: now,
                sequence,
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let objects = self.objects.read().expect("lock poisoned");
        objects
            .get(path)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| WorkdeskError::NotFound(path.to_string()).into())
    }

    async fn head(&self, path: &str) -> Result<ObjectInfo> {
        let objects = self.objects.read().expect("lock poisoned");
        objects
            .get(path)
            .map(|o| ObjectInfo {
                path: path.to_string(),
                name: path.rsplit('/').next().unwrap_or(path).to_string(),
                size: o.bytes.len() as u64,
                mime_type: o.mime_type.clone(),
                created_at: o.created_at,
                updated_at: o.updated_at,
                metadata: o.metadata.clone(),
            })
            .ok_or_else(|| WorkdeskError::NotFound(path.to_string()).into())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut objects = self.objects.write().expect("lock poisoned");
        objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| WorkdeskError::NotFound(path.to_string()).into())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<ObjectInfo>> {
        let objects = self.objects.read().expect("lock poisoned");
        let prefix = if prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{}/", prefix)
        };

        let mut entries: Vec<(u64, ObjectInfo)> = objects
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, o)| {
                (
                    o.sequence,
                    ObjectInfo {
                        path: path.clone(),
                        name: path.rsplit('/').next().unwrap_or(path).to_string(),
                        size: o.bytes.len() as u64,
                        mime_type: o.mime_type.clone(),
                        created_at: o.created_at,
                        updated_at: o.updated_at,
                        metadata: o.metadata.clone(),
                    },
                )
            })
            .collect();

        // Newest first; the insertion sequence breaks timestamp ties.
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|(_, info)| info)
            .collect())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://public/{}", path)
    }

    async fn signed_url(
        &self,
        path: &str,
        ttl_secs: u64,
        transform: Option<&ImageTransform>,
    ) -> Result<String> {
        {
            let objects = self.objects.read().expect("lock poisoned");
            if !objects.contains_key(path) {
                return Err(WorkdeskError::NotFound(path.to_string()).into());
            }
        }
        let transform_part = transform
            .map(|t| format!("&width={}&height={}&resize={}", t.width, t.height, t.resize))
            .unwrap_or_default();
        Ok(format!(
            "memory://signed/{}?expires_in={}{}",
            path, ttl_secs, transform_part
        ))
    }
}
