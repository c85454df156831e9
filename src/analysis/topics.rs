//! Heading-driven topic segmentation.

use tracing::debug;

use crate::core::config::TopicConfig;
use crate::core::types::{DocumentGraph, TextNode, Topic};

const INTRO_ID: &str = "intro";
const INTRO_TITLE: &str = "Introduction";

/// Lower median of the positive, finite font sizes; `fallback` when none.
pub fn baseline_font_size(sizes: impl Iterator<Item = f64>, fallback: f64) -> f64 {
    let mut sizes: Vec<f64> = sizes.filter(|s| s.is_finite() && *s > 0.0).collect();
    if sizes.is_empty() {
        return fallback;
    }
    sizes.sort_by(f64::total_cmp);
    sizes[(sizes.len() - 1) / 2]
}

pub fn is_heading(node: &TextNode, baseline: f64, config: &TopicConfig) -> bool {
    let text = node.text.trim();
    let length = text.chars().count();
    if length == 0 || length >= config.heading_max_chars {
        return false;
    }
    let size = node.style.font_size;
    let bold = node.style.is_bold;
    size > baseline * config.strong_ratio
        || (size >= baseline * config.bold_ratio && bold)
        || (size >= baseline && bold && length < config.short_bold_max_chars)
}

/// Partition the text nodes into topics, in document order.
pub fn segment_topics(graph: &DocumentGraph, config: &TopicConfig) -> Vec<Topic> {
    let baseline = baseline_font_size(
        graph.text_nodes().map(|node| node.style.font_size),
        config.default_baseline,
    );
    let mut topics: Vec<Topic> = Vec::new();
    let mut headings = 0;

    for page in graph.pages() {
        for node in page.text_nodes() {
            if is_heading(node, baseline, config) {
                if let Some(open) = topics.last_mut() {
                    open.end_page = page.index;
                }
                headings += 1;
                topics.push(Topic {
                    id: format!("topic-{headings}"),
                    title: node.text.trim().lines().next().unwrap_or_default().trim().to_string(),
                    start_page: page.index,
                    end_page: page.index,
                    nodes: vec![node.id.clone()],
                });
                continue;
            }
            match topics.last_mut() {
                Some(open) => open.nodes.push(node.id.clone()),
                None => topics.push(Topic {
                    id: INTRO_ID.to_string(),
                    title: INTRO_TITLE.to_string(),
                    start_page: 0,
                    end_page: 0,
                    nodes: vec![node.id.clone()],
                }),
            }
        }
    }

    if let Some(last) = topics.last_mut() {
        last.end_page = graph.last_page_index();
    }
    debug!(baseline, topics = topics.len(), "segmented topics");
    topics
}
