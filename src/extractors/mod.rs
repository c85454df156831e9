//! Format dispatch. Every extractor appends pages to a fresh
//! [`DocumentGraph`] and records recoverable problems in an
//! [`ExtractionReport`].

pub mod pdf;
pub mod pptx;
pub mod text;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::core::config::PipelineConfig;
use crate::core::errors::{AppError, AppResult};
use crate::core::types::{DocumentGraph, ExtractionReport, SourceType};

/// Map a declared media type onto a source type.
pub fn source_type_for(mime: &str) -> AppResult<SourceType> {
    let mime = mime.trim().to_ascii_lowercase();
    let essence = mime.split(';').next().unwrap_or_default().trim();
    if essence == "application/pdf" {
        Ok(SourceType::FixedLayout)
    } else if essence.contains("presentation") || essence.contains("powerpoint") {
        Ok(SourceType::SlideDeck)
    } else if matches!(essence, "text/plain" | "text/markdown" | "text/x-markdown") {
        Ok(SourceType::PlainText)
    } else {
        Err(AppError::UnsupportedMediaType(mime.to_string()))
    }
}

/// Guess a media type from a file extension.
pub fn mime_for_path(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "pptx" => Some("application/vnd.openxmlformats-officedocument.presentationml.presentation"),
        "txt" | "text" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        _ => None,
    }
}

pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Build the graph for one document.
pub fn extract(
    bytes: &[u8],
    mime: &str,
    original_name: &str,
    config: &PipelineConfig,
) -> AppResult<(DocumentGraph, ExtractionReport)> {
    let source_type = source_type_for(mime)?;
    if bytes.is_empty() {
        return Err(AppError::InvalidInput(format!("{original_name} is empty")));
    }

    let mut graph = DocumentGraph::new(source_type, original_name, mime, checksum(bytes));
    let mut report = ExtractionReport::default();
    match source_type {
        SourceType::FixedLayout => pdf::extract_pages(bytes, &mut graph, config, &mut report)?,
        SourceType::SlideDeck => pptx::extract_slides(bytes, &mut graph, config, &mut report)?,
        SourceType::PlainText => text::extract_text(bytes, &mut graph),
    }

    info!(
        document = %graph.document_id,
        source = source_type.as_str(),
        pages = graph.metadata().page_count,
        skipped_images = report.skipped_images,
        failed_pages = report.failed_pages,
        "extraction finished"
    );
    Ok((graph, report))
}
