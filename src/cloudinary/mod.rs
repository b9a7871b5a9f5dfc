//! Cloudinary client module
//!
//! Thin client for the Cloudinary image upload API. Uploads are signed
//! multipart POSTs to `/v1_1/{cloud_name}/image/upload`; the response carries
//! the public id assigned by the service.
//!
//! # Example
//!
//! ```no_run
//! use shutterlift::cloudinary::{CloudinaryClient, CloudinaryClientConfig};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CloudinaryClientConfig {
//!     cloud_name: "demo".to_string(),
//!     api_key: "1234567890".to_string(),
//!     api_secret: "abcdef".to_string(),
//!     api_base: None,
//! };
//! let client = CloudinaryClient::new(config)?;
//!
//! let response = client.upload_image(Path::new("photo.jpg")).await?;
//! println!("public_id: {}", response.public_id);
//! # Ok(())
//! # }
//! ```

use crate::upload::{UploadError, UploadReceipt, Uploader};
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

/// Cloudinary client errors
#[derive(Error, Debug)]
pub enum CloudinaryError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Upload rejected ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Unexpected response body: {0}")]
    ResponseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Cloudinary client configuration
#[derive(Debug, Clone)]
pub struct CloudinaryClientConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: Option<String>,
}

impl From<&crate::config::CloudinaryConfig> for CloudinaryClientConfig {
    fn from(config: &crate::config::CloudinaryConfig) -> Self {
        Self {
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            api_base: config.api_base.clone(),
        }
    }
}

/// Successful upload response, reduced to the fields we consume
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub public_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ApiErrorMessage {
    message: String,
}

/// Cloudinary upload client
pub struct CloudinaryClient {
    config: CloudinaryClientConfig,
    http_client: reqwest::Client,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client
    pub fn new(config: CloudinaryClientConfig) -> Result<Self, CloudinaryError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| CloudinaryError::ConfigError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Get the account cloud name
    pub fn cloud_name(&self) -> &str {
        &self.config.cloud_name
    }

    /// Full image upload endpoint URL
    pub fn upload_url(&self) -> String {
        let base = self
            .config
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        format!("{}/v1_1/{}/image/upload", base, self.config.cloud_name)
    }

    /// Compute the request signature over the given parameters.
    ///
    /// Parameters are sorted by name, serialized as `key=value` pairs joined
    /// with `&`, concatenated with the API secret, and hashed with SHA-256
    /// (the account must be configured for the sha256 signature algorithm).
    /// `file`, `api_key` and `resource_type` are excluded by the API contract
    /// and must not be passed in.
    pub fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by_key(|(name, _)| *name);

        let to_sign = sorted
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Upload a single image file.
    ///
    /// Reads the file into memory and POSTs it as a signed multipart form.
    /// The upload options mirror what the service stores alongside the asset:
    /// public access, a backup copy, color analysis, and the original file
    /// name as the basis for the public id.
    #[tracing::instrument(
        name = "cloudinary.upload",
        skip(self),
        fields(
            cloudinary.cloud_name = %self.config.cloud_name,
            file.path = %path.display(),
            cloudinary.public_id = tracing::field::Empty,
        ),
        err
    )]
    pub async fn upload_image(&self, path: &Path) -> Result<UploadResponse, CloudinaryError> {
        let body = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.jpg".to_string());

        let timestamp = Utc::now().timestamp().to_string();
        let signed_params = [
            ("access_mode", "public".to_string()),
            ("backup", "true".to_string()),
            ("colors", "true".to_string()),
            ("timestamp", timestamp),
            ("use_filename", "true".to_string()),
        ];
        let signature = self.sign(&signed_params);

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(body).file_name(file_name),
            )
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);
        for (name, value) in signed_params {
            form = form.text(name, value);
        }

        let response = self
            .http_client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| CloudinaryError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(CloudinaryError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| CloudinaryError::ResponseError(e.to_string()))?;

        tracing::Span::current().record("cloudinary.public_id", parsed.public_id.as_str());

        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl Uploader for CloudinaryClient {
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError> {
        let response = self.upload_image(path).await.map_err(|e| match e {
            CloudinaryError::IoError(io) => UploadError::IoError(io),
            CloudinaryError::ApiError { .. } => UploadError::RemoteError(e.to_string()),
            other => UploadError::TransferError(other.to_string()),
        })?;

        Ok(UploadReceipt {
            public_id: response.public_id,
        })
    }
}
