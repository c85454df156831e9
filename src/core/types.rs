use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::geometry::Rect;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    FixedLayout,
    SlideDeck,
    PlainText,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedLayout => "fixed-layout",
            Self::SlideDeck => "slide-deck",
            Self::PlainText => "plain-text",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Page,
    Slide,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

/// Node placement as percentages of the page dimensions. Values outside
/// `[0, 100]` are legal for content that bleeds off the canvas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Position {
    /// Clip the box to the visible canvas.
    pub fn clamped(&self) -> Position {
        let x0 = self.x.clamp(0.0, 100.0);
        let y0 = self.y.clamp(0.0, 100.0);
        let x1 = (self.x + self.width).clamp(0.0, 100.0);
        let y1 = (self.y + self.height).clamp(0.0, 100.0);
        Position {
            x: x0,
            y: y0,
            width: (x1 - x0).max(0.0),
            height: (y1 - y0).max(0.0),
        }
    }
}

impl From<Rect> for Position {
    fn from(rect: Rect) -> Self {
        Position {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl NodeSource {
    pub fn for_page(kind: PageKind, index: usize) -> Self {
        match kind {
            PageKind::Page => Self {
                page: Some(index),
                ..Self::default()
            },
            PageKind::Slide => Self {
                slide: Some(index),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_size: f64,
    pub is_bold: bool,
    pub is_italic: bool,
    pub font_family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            is_bold: false,
            is_italic: false,
            font_family: String::new(),
            color: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub id: String,
    pub position: Position,
    pub source: NodeSource,
    pub text: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageNode {
    pub id: String,
    pub position: Position,
    pub source: NodeSource,
    /// Inline `data:` URL at extraction time; an opaque reference once a
    /// persistence step has swapped it.
    pub url: String,
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentNode {
    Text(TextNode),
    Image(ImageNode),
}

impl ContentNode {
    pub fn id(&self) -> &str {
        match self {
            Self::Text(node) => &node.id,
            Self::Image(node) => &node.id,
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            Self::Text(node) => &node.position,
            Self::Image(node) => &node.position,
        }
    }

    pub fn source(&self) -> &NodeSource {
        match self {
            Self::Text(node) => &node.source,
            Self::Image(node) => &node.source,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Self::Text(node) => Some(node),
            Self::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageNode> {
        match self {
            Self::Image(node) => Some(node),
            Self::Text(_) => None,
        }
    }
}

pub fn new_node_id() -> String {
    format!("n-{}", Uuid::new_v4())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub index: usize,
    pub kind: PageKind,
    pub dimensions: Dimensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub nodes: Vec<ContentNode>,
}

impl Page {
    pub fn new(index: usize, kind: PageKind, dimensions: Dimensions) -> Self {
        Self {
            index,
            kind,
            dimensions,
            title: None,
            nodes: Vec::new(),
        }
    }

    pub fn source(&self) -> NodeSource {
        NodeSource::for_page(self.kind, self.index)
    }

    pub fn push_text(&mut self, text: String, style: TextStyle, position: Position) -> String {
        let id = new_node_id();
        self.nodes.push(ContentNode::Text(TextNode {
            id: id.clone(),
            position,
            source: self.source(),
            text,
            style,
        }));
        id
    }

    pub fn push_image(&mut self, url: String, alt: String, position: Position) -> String {
        let id = new_node_id();
        self.nodes.push(ContentNode::Image(ImageNode {
            id: id.clone(),
            position,
            source: self.source(),
            url,
            alt,
            description: None,
        }));
        id
    }

    pub fn text_nodes(&self) -> impl Iterator<Item = &TextNode> {
        self.nodes.iter().filter_map(ContentNode::as_text)
    }

    pub fn image_nodes(&self) -> impl Iterator<Item = &ImageNode> {
        self.nodes.iter().filter_map(ContentNode::as_image)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OriginalFile {
    pub name: String,
    pub mime: String,
    pub checksum: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    pub page_count: usize,
    pub language: String,
}

/// Root of the normalized model. Pages are append-only through
/// [`DocumentGraph::push_page`], which keeps `metadata.pageCount` in sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentGraph {
    pub document_id: String,
    pub source_type: SourceType,
    pub original_file: OriginalFile,
    metadata: DocumentMetadata,
    pages: Vec<Page>,
}

impl DocumentGraph {
    pub fn new(source_type: SourceType, original_name: &str, mime: &str, checksum: String) -> Self {
        Self {
            document_id: Uuid::new_v4().to_string(),
            source_type,
            original_file: OriginalFile {
                name: original_name.to_string(),
                mime: mime.to_string(),
                checksum,
                processed_at: Utc::now(),
            },
            metadata: DocumentMetadata {
                title: original_name.to_string(),
                page_count: 0,
                language: "en".to_string(),
            },
            pages: Vec::new(),
        }
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if !title.trim().is_empty() {
            self.metadata.title = title.trim().to_string();
        }
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        let language = language.into();
        if !language.trim().is_empty() {
            self.metadata.language = language.trim().to_string();
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn next_page_index(&self) -> usize {
        self.pages.len()
    }

    pub fn last_page_index(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    pub fn push_page(&mut self, page: Page) {
        debug_assert_eq!(page.index, self.pages.len(), "pages must be contiguous");
        self.pages.push(page);
        self.metadata.page_count = self.pages.len();
    }

    /// All text nodes in document order.
    pub fn text_nodes(&self) -> impl Iterator<Item = &TextNode> {
        self.pages.iter().flat_map(Page::text_nodes)
    }

    pub fn has_inline_images(&self) -> bool {
        self.pages
            .iter()
            .flat_map(Page::image_nodes)
            .any(|image| image.url.starts_with("data:image/"))
    }

    /// Swap image URLs in place. The callback receives the page index and
    /// the node; returning `Some` replaces the URL. Returns the number of
    /// rewritten nodes.
    pub fn rewrite_image_urls<F>(&mut self, mut rewrite: F) -> usize
    where
        F: FnMut(usize, &ImageNode) -> Option<String>,
    {
        let mut rewritten = 0;
        for page in &mut self.pages {
            let page_index = page.index;
            for node in &mut page.nodes {
                if let ContentNode::Image(image) = node {
                    if let Some(url) = rewrite(page_index, image) {
                        image.url = url;
                        rewritten += 1;
                    }
                }
            }
        }
        rewritten
    }

    /// Attach a generated description to an image node. Returns `false` when
    /// no image with that id exists.
    pub fn set_image_description(&mut self, node_id: &str, description: impl Into<String>) -> bool {
        let description = description.into();
        for page in &mut self.pages {
            for node in &mut page.nodes {
                if let ContentNode::Image(image) = node {
                    if image.id == node_id {
                        image.description = Some(description);
                        return true;
                    }
                }
            }
        }
        false
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub document_id: String,
    pub source_type: SourceType,
    pub page_index: usize,
    pub page_kind: PageKind,
    pub node_ids: Vec<String>,
    pub text_node_count: usize,
    pub image_node_count: usize,
    pub image_urls: Vec<String>,
    pub dimensions: Dimensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub start_page: usize,
    pub end_page: usize,
    pub nodes: Vec<String>,
}

/// Recoverable events observed during one extraction pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub skipped_images: usize,
    pub background_images: usize,
    pub failed_pages: usize,
    pub approximated_transforms: usize,
    pub warnings: Vec<String>,
}

impl ExtractionReport {
    pub fn is_partial(&self) -> bool {
        self.skipped_images > 0 || self.failed_pages > 0
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    pub graph: DocumentGraph,
    pub chunks: Vec<Chunk>,
    pub topics: Vec<Topic>,
    pub text: String,
    pub report: ExtractionReport,
}
