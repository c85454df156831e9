//! End-to-end processing: extract the graph, then derive chunks, topics and
//! flat text from it.

use std::path::Path;

use tracing::info;

use crate::analysis::{chunk_document, flatten_text, segment_topics};
use crate::core::config::PipelineConfig;
use crate::core::errors::{AppError, AppResult};
use crate::core::types::{DocumentGraph, ExtractionReport, ProcessedDocument};
use crate::extractors;

pub use crate::extractors::extract;

pub fn process_document(
    bytes: &[u8],
    mime: &str,
    original_name: &str,
    config: &PipelineConfig,
) -> AppResult<ProcessedDocument> {
    let (graph, report) = extract(bytes, mime, original_name, config)?;
    Ok(derive(graph, report, config))
}

/// Read `path` and process it. The media type is guessed from the extension
/// when not given; the display name defaults to the file name.
pub fn process_file(
    path: &Path,
    mime: Option<&str>,
    display_name: Option<&str>,
    config: &PipelineConfig,
) -> AppResult<ProcessedDocument> {
    if !path.exists() {
        return Err(AppError::Io(format!("file {} not found", path.display())));
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document")
        .to_string();
    let mime = match mime {
        Some(mime) => mime.to_string(),
        None => extractors::mime_for_path(&file_name)
            .ok_or_else(|| AppError::UnsupportedMediaType(format!("cannot infer media type of {file_name}")))?
            .to_string(),
    };
    let bytes = std::fs::read(path).map_err(|err| AppError::Io(format!("cannot read {}: {err}", path.display())))?;
    process_document(&bytes, &mime, display_name.unwrap_or(&file_name), config)
}

/// Derive chunks, topics and flat text from an extracted graph.
pub fn derive(graph: DocumentGraph, report: ExtractionReport, config: &PipelineConfig) -> ProcessedDocument {
    let chunks = chunk_document(&graph, &config.chunker);
    let topics = segment_topics(&graph, &config.topics);
    let text = flatten_text(&graph);
    info!(
        document = %graph.document_id,
        chunks = chunks.len(),
        topics = topics.len(),
        partial = report.is_partial(),
        "document processed"
    );
    ProcessedDocument {
        graph,
        chunks,
        topics,
        text,
        report,
    }
}
