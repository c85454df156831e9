use std::io::Write;
use std::path::Path;

use docgraph::{process_document, process_file, PipelineConfig, SourceType};
use tempfile::Builder;

const NOTES: &str = "# Release Notes\n\nThe pipeline now reads slide decks.\n\n## Fixes\n\nBackground images are no longer indexed.\nLong pages are split with overlap.\n";

#[test]
fn test_markdown_is_processed_end_to_end() {
    let processed = process_document(NOTES.as_bytes(), "text/markdown", "notes.md", &PipelineConfig::default())
        .expect("markdown processes");

    let graph = &processed.graph;
    assert_eq!(graph.source_type, SourceType::PlainText);
    assert_eq!(graph.metadata().title, "Release Notes");
    assert_eq!(graph.metadata().page_count, 1);
    assert_eq!(graph.original_file.name, "notes.md");
    assert_eq!(graph.original_file.checksum.len(), 64);

    let texts: Vec<_> = graph.text_nodes().map(|n| n.text.as_str()).collect();
    assert_eq!(texts[0], "Release Notes");
    assert_eq!(texts.len(), 4);

    assert_eq!(processed.chunks.len(), 1);
    let titles: Vec<_> = processed.topics.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Release Notes", "Fixes"]);
    assert!(processed.text.starts_with("--- Page/Slide 0 ---\nRelease Notes\n"));
    assert!(!processed.report.is_partial());
}

#[test]
fn test_unsupported_media_type_is_rejected() {
    let err = process_document(b"GIF89a", "image/gif", "cat.gif", &PipelineConfig::default())
        .expect_err("images are not documents");
    assert_eq!(err.code(), "UNSUPPORTED_MEDIA_TYPE");
    assert!(err.is_unsupported_input());
}

#[test]
fn test_empty_input_is_invalid() {
    let err = process_document(b"", "application/pdf", "empty.pdf", &PipelineConfig::default())
        .expect_err("empty input");
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[test]
fn test_process_file_guesses_media_type_from_extension() {
    let mut file = Builder::new().suffix(".md").tempfile().expect("temp file");
    file.write_all(NOTES.as_bytes()).expect("write notes");

    let processed = process_file(file.path(), None, Some("release.md"), &PipelineConfig::default())
        .expect("file processes");
    assert_eq!(processed.graph.original_file.name, "release.md");
    assert_eq!(processed.graph.original_file.mime, "text/markdown");
    assert_eq!(processed.topics.len(), 2);
}

#[test]
fn test_process_file_without_known_extension_needs_a_mime() {
    let mut file = Builder::new().suffix(".bin").tempfile().expect("temp file");
    file.write_all(b"plain words").expect("write");

    let err = process_file(file.path(), None, None, &PipelineConfig::default())
        .expect_err("no media type");
    assert_eq!(err.code(), "UNSUPPORTED_MEDIA_TYPE");

    let processed = process_file(file.path(), Some("text/plain"), None, &PipelineConfig::default())
        .expect("explicit mime");
    assert_eq!(processed.graph.text_nodes().count(), 1);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let err = process_file(
        Path::new("/definitely/not/here.pdf"),
        None,
        None,
        &PipelineConfig::default(),
    )
    .expect_err("missing file");
    assert_eq!(err.code(), "IO_ERROR");
    assert!(!err.is_unsupported_input());
}

#[test]
fn test_output_serializes_in_camel_case() {
    let processed = process_document(NOTES.as_bytes(), "text/plain", "notes.txt", &PipelineConfig::default())
        .expect("text processes");
    let json = serde_json::to_value(&processed).expect("serialize");

    assert_eq!(json["graph"]["sourceType"], "plain-text");
    assert_eq!(json["graph"]["metadata"]["pageCount"], 1);
    assert_eq!(json["graph"]["pages"][0]["kind"], "page");
    assert_eq!(json["graph"]["pages"][0]["nodes"][0]["type"], "text");
    assert_eq!(json["graph"]["pages"][0]["nodes"][0]["style"]["fontSize"], 24.0);
    assert_eq!(json["graph"]["pages"][0]["nodes"][0]["source"]["page"], 0);
    assert!(json["chunks"][0]["metadata"]["nodeIds"].is_array());
    assert!(json["chunks"][0]["metadata"].get("subIndex").is_none());
    assert_eq!(json["report"]["skippedImages"], 0);
}

#[test]
fn test_error_serializes_code_and_message() {
    let err = process_document(b"x", "video/mp4", "clip.mp4", &PipelineConfig::default())
        .expect_err("unsupported");
    let json = serde_json::to_value(&err).expect("serialize error");
    assert_eq!(json["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert!(json["message"].as_str().is_some_and(|m| m.contains("video/mp4")));
}
