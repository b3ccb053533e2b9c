use std::{sync::Arc, time::Duration};

use anyhow::Context;
use arbor_api::Error as ApiError;
use async_trait::async_trait;

pub const MAX_TEXT_FILE_SIZE: usize = 100 * 1024;
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UploadKind {
    Image,
    Raw,
}

impl UploadKind {
    pub(crate) fn as_path(&self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Raw => "raw",
        }
    }
}

/// The attachment-storage collaborator: hand it a blob, get back a
/// durable URL. The submission path treats any failure, including a
/// timeout, as `AttachmentError`.
#[async_trait]
pub trait Uploader {
    async fn upload(
        &self,
        data: Vec<u8>,
        file_name: &str,
        kind: UploadKind,
    ) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    base_url: Arc<String>,
    preset: Arc<String>,
}

impl HttpUploader {
    pub fn new(base_url: String, preset: String) -> anyhow::Result<HttpUploader> {
        // the client-level timeout bounds the whole upload call, so a
        // hung collaborator fails the submission instead of hanging it
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .context("building upload http client")?;
        Ok(HttpUploader {
            client,
            base_url: Arc::new(base_url),
            preset: Arc::new(preset),
        })
    }
}

#[derive(serde::Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(
        &self,
        data: Vec<u8>,
        file_name: &str,
        kind: UploadKind,
    ) -> anyhow::Result<String> {
        let part = reqwest::multipart::Part::bytes(data).file_name(file_name.to_owned());
        let form = reqwest::multipart::Form::new()
            .text("upload_preset", self.preset.as_str().to_owned())
            .part("file", part);
        let url = format!(
            "{}/{}/upload",
            self.base_url.trim_end_matches('/'),
            kind.as_path(),
        );
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("sending {} upload", kind.as_path()))?
            .error_for_status()
            .context("upload request rejected")?;
        let body: UploadResponse = resp.json().await.context("parsing upload response")?;
        Ok(body.secure_url)
    }
}

/// Images must be JPEG, PNG or GIF; sniffed from the magic bytes, the
/// client-supplied name and content type are not trusted.
pub fn validate_image(data: &[u8]) -> Result<(), ApiError> {
    let ok = data.starts_with(&[0xFF, 0xD8, 0xFF])
        || data.starts_with(b"\x89PNG\r\n\x1a\n")
        || data.starts_with(b"GIF87a")
        || data.starts_with(b"GIF89a");
    if ok {
        Ok(())
    } else {
        Err(ApiError::Attachment(String::from(
            "image must be a JPEG, PNG or GIF",
        )))
    }
}

pub fn validate_text_file(file_name: &str, data: &[u8]) -> Result<(), ApiError> {
    if !file_name.to_ascii_lowercase().ends_with(".txt") {
        return Err(ApiError::Attachment(String::from(
            "only .txt attachments are allowed",
        )));
    }
    if data.len() > MAX_TEXT_FILE_SIZE {
        return Err(ApiError::Attachment(String::from(
            "text file exceeds the 100 KB limit",
        )));
    }
    Ok(())
}
