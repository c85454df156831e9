//! Turns PDF, PPTX and plain-text documents into a normalized content graph
//! of positioned text and image nodes, then derives retrieval chunks, topic
//! segments and a flat-text projection from it.

pub mod analysis;
pub mod core;
pub mod extractors;
pub mod pipeline;

pub use crate::core::config::{ChunkerConfig, PipelineConfig, TopicConfig};
pub use crate::core::errors::{AppError, AppResult};
pub use crate::core::types::{
    Chunk, ChunkMetadata, ContentNode, Dimensions, DocumentGraph, ExtractionReport, ImageNode,
    Page, PageKind, Position, ProcessedDocument, SourceType, TextNode, TextStyle, Topic,
};
pub use crate::pipeline::{extract, process_document, process_file};
