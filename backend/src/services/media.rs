//! Remote image hosting on a Cloudinary-compatible upload API.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{config::Config, models::media::ImageAsset};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media host is not configured")]
    Disabled,
    #[error("unsupported content type {0}")]
    UnsupportedType(String),
    #[error("media host rejected the request: {0}")]
    Upstream(String),
    #[error("media host request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A file received from a multipart form, ready to be uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Uploads one image into `folder` (relative to the configured root folder).
    async fn upload(&self, file: UploadFile, folder: &str) -> Result<ImageAsset, MediaError>;
    async fn delete(&self, public_id: &str) -> Result<(), MediaError>;
}

#[derive(Clone)]
pub struct CloudinaryStore {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    root_folder: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryStore {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(Self {
            client,
            cloud_name: config.media_cloud_name.clone(),
            api_key: config.media_api_key.clone(),
            api_secret: config.media_api_secret.clone(),
            root_folder: config.media_folder.trim_matches('/').to_string(),
            enabled: config.media_enabled(),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/{}",
            self.cloud_name, action
        )
    }

    fn full_folder(&self, folder: &str) -> String {
        let folder = folder.trim_matches('/');
        match (self.root_folder.is_empty(), folder.is_empty()) {
            (true, _) => folder.to_string(),
            (false, true) => self.root_folder.clone(),
            (false, false) => format!("{}/{}", self.root_folder, folder),
        }
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, file: UploadFile, folder: &str) -> Result<ImageAsset, MediaError> {
        if !self.enabled {
            return Err(MediaError::Disabled);
        }
        ensure_supported_type(&file.content_type)?;

        let folder = self.full_folder(folder);
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name)
            .mime_str(&file.content_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Upstream(format!("{}: {}", status, body)));
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::debug!(public_id = %uploaded.public_id, "Uploaded image");
        Ok(ImageAsset {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), MediaError> {
        if !self.enabled {
            return Err(MediaError::Disabled);
        }
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );
        let params = [
            ("public_id", public_id.to_string()),
            ("api_key", self.api_key.clone()),
            ("timestamp", timestamp),
            ("signature_algorithm", "sha256".to_string()),
            ("signature", signature),
        ];

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::Upstream(response.status().to_string()));
        }
        let body: DestroyResponse = response.json().await?;
        match body.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Upstream(other.to_string())),
        }
    }
}

pub fn ensure_supported_type(content_type: &str) -> Result<(), MediaError> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if ALLOWED_CONTENT_TYPES.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(MediaError::UnsupportedType(content_type.to_string()))
    }
}

/// Signs upload parameters: `k1=v1&k2=v2` sorted by key, followed by the
/// secret, hashed with SHA-256.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{}{}", joined, api_secret).as_bytes()))
}

/// Derives a cropped thumbnail URL from the public id. Without a cloud name the
/// original url is returned unchanged.
pub fn thumbnail_url(cloud_name: &str, image: &ImageAsset, width: u32, height: u32) -> String {
    if cloud_name.is_empty() || image.public_id.is_empty() {
        return image.url.clone();
    }
    format!(
        "https://res.cloudinary.com/{}/image/upload/c_fill,w_{},h_{},q_auto,f_auto/{}",
        cloud_name, width, height, image.public_id
    )
}

/// Deletes remote images in the background. Failures are logged and never
/// reach the caller.
pub fn spawn_delete(store: std::sync::Arc<dyn MediaStore>, public_ids: Vec<String>) {
    if public_ids.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for public_id in public_ids {
            if let Err(err) = store.delete(&public_id).await {
                tracing::warn!(error = %err, public_id = %public_id, "Failed to delete remote image");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_params_sorts_keys_before_hashing() {
        let a = sign_params(&[("timestamp", "1"), ("folder", "x")], "secret");
        let b = sign_params(&[("folder", "x"), ("timestamp", "1")], "secret");
        assert_eq!(a, b);
        assert_eq!(
            a,
            hex::encode(Sha256::digest(b"folder=x&timestamp=1secret"))
        );
    }

    #[test]
    fn thumbnail_url_uses_public_id() {
        let image = ImageAsset {
            url: "https://cdn.test/a.jpg".into(),
            public_id: "club/gallery/abc".into(),
        };
        assert_eq!(
            thumbnail_url("demo", &image, 400, 300),
            "https://res.cloudinary.com/demo/image/upload/c_fill,w_400,h_300,q_auto,f_auto/club/gallery/abc"
        );
        assert_eq!(thumbnail_url("", &image, 400, 300), "https://cdn.test/a.jpg");
    }

    #[test]
    fn ensure_supported_type_accepts_images_only() {
        assert!(ensure_supported_type("image/png").is_ok());
        assert!(ensure_supported_type("IMAGE/JPEG; charset=binary").is_ok());
        assert!(matches!(
            ensure_supported_type("application/pdf"),
            Err(MediaError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn spawn_delete_calls_store_for_each_id() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut store = MockMediaStore::new();
        store.expect_delete().times(2).returning(move |id| {
            let _ = tx.send(id.to_string());
            Err(MediaError::Upstream("boom".into()))
        });

        spawn_delete(std::sync::Arc::new(store), vec!["a".into(), "b".into()]);

        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
    }
}
