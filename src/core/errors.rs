use serde::ser::SerializeStruct;
use thiserror::Error;

/// Fatal pipeline failures. Recoverable, per-node problems never surface
/// here; they are absorbed into [`crate::core::types::ExtractionReport`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("xml error: {0}")]
    Xml(String),
    #[error("image error: {0}")]
    Image(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Io(_) => "IO_ERROR",
            Self::Pdf(_) => "PDF_ERROR",
            Self::Archive(_) => "ARCHIVE_ERROR",
            Self::Xml(_) => "XML_ERROR",
            Self::Image(_) => "IMAGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// True when the input itself cannot be handled, as opposed to a local
    /// environment problem such as an unreadable path.
    pub fn is_unsupported_input(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMediaType(_)
                | Self::InvalidInput(_)
                | Self::Pdf(_)
                | Self::Archive(_)
                | Self::Xml(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<lopdf::Error> for AppError {
    fn from(value: lopdf::Error) -> Self {
        Self::Pdf(value.to_string())
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::Archive(value.to_string())
    }
}

impl From<roxmltree::Error> for AppError {
    fn from(value: roxmltree::Error) -> Self {
        Self::Xml(value.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
