// src/media.rs
//! Image uploads are forwarded to an external media host; the service only
//! keeps the returned URL.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::config::MediaSettings;
use crate::error::{Result, SightingError};

/// An image received from a multipart form, not yet uploaded.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait::async_trait]
pub trait MediaHost: Send + Sync {
    /// Uploads the image and returns its public URL.
    async fn upload(&self, image: ImageUpload) -> Result<String>;
}

/// Used when no media host is configured: every upload is refused.
pub struct DisabledMediaHost;

#[async_trait::async_trait]
impl MediaHost for DisabledMediaHost {
    async fn upload(&self, _image: ImageUpload) -> Result<String> {
        Err(SightingError::validation("image uploads are not configured"))
    }
}

/// Cloudinary-style unsigned upload endpoint.
pub struct HttpMediaHost {
    upload_url: String,
    api_key: Option<String>,
    upload_preset: Option<String>,
    client: Client,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl HttpMediaHost {
    pub fn new(settings: &MediaSettings, upload_url: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building media host client")?;
        Ok(Self {
            upload_url,
            api_key: settings.api_key.clone(),
            upload_preset: settings.upload_preset.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl MediaHost for HttpMediaHost {
    async fn upload(&self, image: ImageUpload) -> Result<String> {
        let size = image.bytes.len();
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .map_err(|e| SightingError::validation(format!("bad image content type: {e}")))?;

        let mut form = Form::new().part("file", part);
        if let Some(preset) = &self.upload_preset {
            form = form.text("upload_preset", preset.clone());
        }
        if let Some(key) = &self.api_key {
            form = form.text("api_key", key.clone());
        }

        let resp = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SightingError::MediaUnavailable(format!("upload request: {e}")))?
            .error_for_status()
            .map_err(|e| SightingError::MediaUnavailable(format!("upload rejected: {e}")))?;

        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| SightingError::MediaUnavailable(format!("upload response: {e}")))?;

        let url = body
            .secure_url
            .or(body.url)
            .ok_or_else(|| SightingError::MediaUnavailable("upload response has no url".into()))?;
        tracing::debug!(target: "sightings::media", bytes = size, %url, "image uploaded");
        Ok(url)
    }
}

/// Picks the media host from settings.
pub fn from_settings(settings: &MediaSettings) -> anyhow::Result<Arc<dyn MediaHost>> {
    match settings.upload_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            Ok(Arc::new(HttpMediaHost::new(settings, url.to_string())?))
        }
        _ => {
            tracing::debug!(target: "sightings::media", "media host disabled (no MEDIA_UPLOAD_URL)");
            Ok(Arc::new(DisabledMediaHost))
        }
    }
}
