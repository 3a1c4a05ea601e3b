//! The external processing service.

use crate::error::{Error, Result};
use crate::submit::SubmissionPayload;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use std::time::Duration;

/// Processed image returned by the service.
#[derive(Clone, Debug)]
pub struct ProcessedImage {
    /// Encoded image bytes behind the reference
    pub bytes: Vec<u8>,
    pub size: [u32; 2],
}

impl ProcessedImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let img = image::load_from_memory(&bytes)
            .map_err(|e| Error::malformed(format!("processed image does not decode: {e}")))?;
        Ok(Self {
            bytes,
            size: [img.width(), img.height()],
        })
    }

    /// File extension matching the encoded bytes.
    pub fn extension(&self) -> &'static str {
        image::guess_format(&self.bytes)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("png")
    }
}

pub trait Backend: Send + Sync {
    fn process(&self, payload: &SubmissionPayload) -> Result<ProcessedImage>;
}

#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
    processed_image: Option<String>,
    message: Option<String>,
    detail: Option<serde_json::Value>,
}

/// Turn a status code and body into the processed reference or an error.
pub fn interpret_response(status: u16, body: &str) -> Result<String> {
    let success = (200..300).contains(&status);
    let parsed: Option<ResponseBody> = serde_json::from_str(body).ok();
    // Empty strings count as absent
    let non_empty = |s: &String| !s.is_empty();

    if !success {
        let message = parsed.and_then(|b| {
            b.detail
                .map(|d| match d {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .filter(non_empty)
                .or(b.message.filter(non_empty))
        });
        return Err(match message {
            Some(message) => Error::Backend {
                status: Some(status),
                message,
            },
            None => Error::HttpStatus(status),
        });
    }

    let body = parsed.ok_or_else(|| Error::malformed("response is not a JSON object"))?;
    match body.processed_image {
        Some(reference) if !reference.is_empty() => Ok(reference),
        _ => Err(Error::Backend {
            status: None,
            message: body
                .message
                .filter(non_empty)
                .unwrap_or_else(|| "Failed to process image.".to_string()),
        }),
    }
}

/// Payload of a `data:<mime>;base64,<data>` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::malformed("not a data URL"))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::malformed("data URL has no payload"))?;
    if !meta.ends_with(";base64") {
        return Err(Error::malformed("only base64 data URLs are supported"));
    }
    BASE64
        .decode(data.trim())
        .map_err(|e| Error::malformed(format!("bad base64 payload: {e}")))
}

/// Multipart POST to the processing endpoint.
pub struct HttpBackend {
    client: Client,
    endpoint: reqwest::Url,
}

impl HttpBackend {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| Error::configuration(format!("invalid backend URL {endpoint:?}: {e}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    fn form(payload: &SubmissionPayload) -> Result<multipart::Form> {
        let file = &payload.image_file;
        let part = multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name())
            .mime_str(file.mime_type())?;
        Ok(multipart::Form::new()
            .part("image_file", part)
            .text("points", payload.points_json())
            .text("original_width", payload.original_width.to_string())
            .text("original_height", payload.original_height.to_string()))
    }

    /// Fetch the bytes behind a processed-image reference.
    fn resolve(&self, reference: &str) -> Result<Vec<u8>> {
        if reference.starts_with("data:") {
            return decode_data_url(reference);
        }
        let url = self
            .endpoint
            .join(reference)
            .map_err(|e| Error::malformed(format!("bad processed image link {reference:?}: {e}")))?;
        log::debug!("Fetching processed image from {url}");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl Backend for HttpBackend {
    fn process(&self, payload: &SubmissionPayload) -> Result<ProcessedImage> {
        log::info!(
            "POST {} ({}, {}x{}, points {})",
            self.endpoint,
            payload.image_file.file_name(),
            payload.original_width,
            payload.original_height,
            payload.points_json()
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(Self::form(payload)?)
            .send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        log::debug!("Backend answered {status} with {} bytes", body.len());

        let reference = interpret_response(status, &body)?;
        let bytes = self.resolve(&reference)?;
        ProcessedImage::from_bytes(bytes)
    }
}
