//! `data:` URL helpers for images carried inline in the graph.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::core::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Decode a `data:image/<kind>;base64,<payload>` URL.
    pub fn parse(url: &str) -> AppResult<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| AppError::InvalidInput("not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AppError::InvalidInput("data URL has no payload".to_string()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| AppError::InvalidInput("data URL is not base64 encoded".to_string()))?;
        if !mime.starts_with("image/") {
            return Err(AppError::InvalidInput(format!("data URL is not an image: {mime}")));
        }
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|err| AppError::InvalidInput(format!("invalid base64 payload: {err}")))?;
        Ok(Self::new(mime, bytes))
    }

    /// File extension for the MIME subtype (`png`, `jpeg`, ...).
    pub fn extension(&self) -> &str {
        self.mime
            .strip_prefix("image/")
            .map(|kind| kind.split('+').next().unwrap_or(kind))
            .unwrap_or("bin")
    }
}

/// MIME type for an embedded media part, keyed by its file extension.
pub fn mime_for_extension(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => "image/jpeg",
    }
}
