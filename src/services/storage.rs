//! Blob storage for photo uploads
//!
//! Objects are written with an HTTP `PUT {base_url}/object/{bucket}/{key}`
//! authenticated by a bearer key.

use std::time::Duration;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};
use crate::config::StorageConfig;
use crate::utils::errors::{CbxError, Result};
use crate::utils::helpers::{format_bytes, sanitize_filename};
use crate::utils::logging::log_api_error;

/// An object stored in the bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct BlobStorageService {
    client: Client,
    config: StorageConfig,
}

impl BlobStorageService {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("cbx-rentals/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.config.max_upload_bytes
    }

    /// Upload a photo for an attendee and return where it can be viewed
    pub async fn upload_photo(
        &self,
        attendee_id: i64,
        bytes: Vec<u8>,
        content_type: &str,
        filename: &str,
    ) -> Result<StoredObject> {
        let size_bytes = bytes.len() as u64;
        if size_bytes == 0 {
            return Err(CbxError::InvalidInput("photos.empty".to_string()));
        }
        if size_bytes > self.config.max_upload_bytes {
            return Err(CbxError::InvalidInput("photos.too_large".to_string()));
        }

        let key = object_key(attendee_id, filename);
        let url = self.object_url(&key);
        debug!(attendee_id, key = %key, size = %format_bytes(size_bytes), "Uploading photo");

        let response = self.client
            .put(&url)
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            log_api_error("storage", &error_text, Some(&key));
            return Err(CbxError::Storage(format!("HTTP {}: {}", status, error_text)));
        }

        info!(attendee_id, key = %key, "Photo uploaded");
        Ok(StoredObject {
            url: self.public_url(&key),
            key,
            content_type: content_type.to_string(),
            size_bytes,
        })
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        let response = self.client
            .delete(self.object_url(key))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            let status = response.status();
            return Err(CbxError::Storage(format!("HTTP {} deleting {}", status, key)));
        }

        debug!(key = %key, "Object deleted");
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            encode_key(key)
        )
    }

    /// Public link for an object
    pub fn public_url(&self, key: &str) -> String {
        match &self.config.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!(
                "{}/object/public/{}/{}",
                self.config.base_url.trim_end_matches('/'),
                self.config.bucket,
                key
            ),
        }
    }
}

/// Percent-encode each path segment of an object key
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `attendees/<id>/<uuid>-<name>`, unique per upload
pub fn object_key(attendee_id: i64, filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let name = sanitize_filename(base).trim_start_matches('.').to_string();
    let name = if name.is_empty() { "photo.jpg".to_string() } else { name };
    format!("attendees/{}/{}-{}", attendee_id, uuid::Uuid::new_v4().simple(), name)
}
