//! Plain text and Markdown as a single page of paragraph nodes.
//!
//! Paragraphs are separated by blank lines and stacked top to bottom.
//! Markdown `#` headings are promoted to bold, larger text so the topic
//! segmenter sees them the way it sees headings in laid-out documents.

use tracing::info;

use crate::core::types::{Dimensions, DocumentGraph, Page, PageKind, Position, TextStyle};

const BODY_SIZE: f64 = 12.0;
const HEADING_MAX_LEN: usize = 120;
/// Nominal canvas; text has no layout of its own.
const CANVAS: Dimensions = Dimensions {
    width: 612.0,
    height: 792.0,
};

#[derive(Debug, Clone, PartialEq)]
struct Paragraph {
    text: String,
    style: TextStyle,
}

pub fn extract_text(bytes: &[u8], graph: &mut DocumentGraph) {
    let raw = String::from_utf8_lossy(bytes);
    let text = raw.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let paragraphs = split_paragraphs(&text);
    info!(paragraphs = paragraphs.len(), "extracting plain text");

    if let Some(title) = paragraphs
        .iter()
        .find(|p| p.style.font_size >= heading_size(1))
        .map(|p| p.text.clone())
    {
        graph.set_title(title);
    }

    let mut page = Page::new(graph.next_page_index(), PageKind::Page, CANVAS);
    let row = 100.0 / paragraphs.len().max(1) as f64;
    for (i, paragraph) in paragraphs.into_iter().enumerate() {
        let position = Position {
            x: 0.0,
            y: i as f64 * row,
            width: 100.0,
            height: row,
        };
        page.push_text(paragraph.text, paragraph.style, position);
    }
    graph.push_page(page);
}

fn split_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut paragraphs);
            continue;
        }
        // ATX headings stand alone even without surrounding blank lines
        if markdown_level(line).is_some() {
            flush(&mut current, &mut paragraphs);
            current.push(line);
            flush(&mut current, &mut paragraphs);
            continue;
        }
        current.push(line);
    }
    flush(&mut current, &mut paragraphs);
    paragraphs
}

fn flush(lines: &mut Vec<&str>, out: &mut Vec<Paragraph>) {
    if lines.is_empty() {
        return;
    }
    let joined = lines.join("\n");
    lines.clear();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        return;
    }

    let paragraph = match markdown_level(trimmed) {
        Some(level) => Paragraph {
            text: trimmed.trim_start_matches('#').trim().to_string(),
            style: TextStyle {
                font_size: heading_size(level),
                is_bold: true,
                ..TextStyle::default()
            },
        },
        None => Paragraph {
            text: trimmed.to_string(),
            style: TextStyle {
                font_size: BODY_SIZE,
                is_bold: looks_like_caps_heading(trimmed),
                ..TextStyle::default()
            },
        },
    };
    if !paragraph.text.is_empty() {
        out.push(paragraph);
    }
}

/// `#`..`######` followed by a space.
fn markdown_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    let rest = &trimmed[level..];
    ((1..=6).contains(&level) && (rest.is_empty() || rest.starts_with(' '))).then_some(level)
}

fn heading_size(level: usize) -> f64 {
    match level {
        1 => 24.0,
        2 => 20.0,
        3 => 18.0,
        _ => 16.0,
    }
}

/// Short single-line paragraphs in capitals, e.g. `INTRODUCTION`.
fn looks_like_caps_heading(para: &str) -> bool {
    if para.contains('\n') || para.chars().count() > HEADING_MAX_LEN {
        return false;
    }
    if para.ends_with('.') || para.ends_with('?') || para.ends_with('!') {
        return false;
    }
    let words = para.split_whitespace().count();
    if words == 0 || words > 12 {
        return false;
    }
    let alpha: Vec<char> = para.chars().filter(|c| c.is_alphabetic()).collect();
    if alpha.len() < 2 {
        return false;
    }
    let upper = alpha.iter().filter(|c| c.is_uppercase()).count();
    upper as f64 / alpha.len() as f64 > 0.65
}
