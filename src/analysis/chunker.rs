//! Page-structured chunking with bounded size and overlapping windows.
//!
//! Each page contributes the lines `[node-id] text` of its non-blank text
//! nodes. Pages that fit in one window become one chunk; longer pages are
//! split into windows that prefer to end on a line boundary and overlap
//! their predecessor. Lengths count `char`s.

use tracing::debug;

use crate::core::config::ChunkerConfig;
use crate::core::types::{Chunk, ChunkMetadata, DocumentGraph, Page};

pub fn chunk_document(graph: &DocumentGraph, config: &ChunkerConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in graph.pages() {
        let content = page_content(page);
        if content.is_empty() {
            continue;
        }
        let windows = split_windows(&content, config);
        debug!(page = page.index, windows = windows.len(), "chunked page");

        let multi = windows.len() > 1;
        for (sub_index, window) in windows.into_iter().enumerate() {
            chunks.push(Chunk {
                content: window,
                metadata: page_metadata(graph, page, multi.then_some(sub_index)),
            });
        }
    }
    chunks
}

/// `[id] text` for every non-blank text node, one per line.
pub fn page_content(page: &Page) -> String {
    page.text_nodes()
        .filter(|node| !node.text.trim().is_empty())
        .map(|node| format!("[{}] {}", node.id, node.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn page_metadata(graph: &DocumentGraph, page: &Page, sub_index: Option<usize>) -> ChunkMetadata {
    let images: Vec<String> = page.image_nodes().map(|image| image.url.clone()).collect();
    ChunkMetadata {
        document_id: graph.document_id.clone(),
        source_type: graph.source_type,
        page_index: page.index,
        page_kind: page.kind,
        node_ids: page.nodes.iter().map(|node| node.id().to_string()).collect(),
        text_node_count: page.text_nodes().count(),
        image_node_count: images.len(),
        image_urls: images,
        dimensions: page.dimensions,
        sub_index,
        slide_title: page.title.clone(),
    }
}

/// Split `content` into overlapping windows of at most
/// `config.max_chunk_size` chars.
pub fn split_windows(content: &str, config: &ChunkerConfig) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    let max = config.max_chunk_size.max(1);
    if len <= max {
        return vec![content.to_string()];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let mut end = (start + max).min(len);
        if end < len {
            // leave the last window at least `min_orphan` new chars
            if len - end < config.min_orphan {
                end = len.saturating_sub(config.min_orphan).max(start + 1);
            }
            let midpoint = start + max / 2;
            if let Some(newline) = (midpoint + 1..end).rev().find(|&i| chars[i] == '\n') {
                end = newline;
            }
        }
        windows.push(chars[start..end].iter().collect());
        if end >= len {
            break;
        }
        start = end.saturating_sub(config.overlap).max(start + 1);
    }
    windows
}
