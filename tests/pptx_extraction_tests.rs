use std::io::{Cursor, Write};

use docgraph::core::inline_image::InlineImage;
use docgraph::{extract, DocumentGraph, ExtractionReport, PageKind, PipelineConfig};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// ── Test Helpers ──────────────────────────────────────────────────────────────

const PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const PNG_1X1: &[u8] = b"\x89PNG\r\n\x1a\nfake-png-payload";

fn build_pptx(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, body) in parts {
        zip.start_file(*name, options).expect("start zip entry");
        zip.write_all(body).expect("write zip entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

fn presentation(cx: u64, cy: u64) -> String {
    format!(r#"<p:presentation {NS}><p:sldSz cx="{cx}" cy="{cy}"/></p:presentation>"#)
}

fn slide(shapes: &str) -> String {
    format!(r#"<p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr/><p:grpSpPr/>{shapes}</p:spTree></p:cSld></p:sld>"#)
}

fn xfrm(x: i64, y: i64, cx: i64, cy: i64) -> String {
    format!(r#"<a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#)
}

fn text_shape(text: &str, x: i64, y: i64, cx: i64, cy: i64) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Body"/><p:nvPr/></p:nvSpPr><p:spPr>{}</p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:rPr sz="1400"/><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        xfrm(x, y, cx, cy)
    )
}

fn title_shape(text: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="1" name="Title"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr>{}</p:spPr><p:txBody><a:p><a:r><a:rPr sz="3600" b="1"/><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        xfrm(0, 0, 1000, 100)
    )
}

fn picture(rel_id: &str, descr: Option<&str>, x: i64, y: i64, cx: i64, cy: i64) -> String {
    let descr = descr.map(|d| format!(r#" descr="{d}""#)).unwrap_or_default();
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="Picture"{descr}/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rel_id}"/></p:blipFill><p:spPr>{}</p:spPr></p:pic>"#,
        xfrm(x, y, cx, cy)
    )
}

fn rels(entries: &[(&str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, target)| {
            format!(
                r#"<Relationship Id="{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="{target}"/>"#
            )
        })
        .collect();
    format!(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{body}</Relationships>"#)
}

fn run(bytes: &[u8]) -> (DocumentGraph, ExtractionReport) {
    extract(bytes, PPTX, "deck.pptx", &PipelineConfig::default()).expect("pptx extracts")
}

fn approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn test_group_scale_applies_to_child_offsets() {
    let group = format!(
        r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="3" name="Group"/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="100" y="100"/><a:ext cx="200" cy="200"/><a:chOff x="0" y="0"/><a:chExt cx="100" cy="100"/></a:xfrm></p:grpSpPr>{}</p:grpSp>"#,
        text_shape("Grouped", 10, 10, 5, 5)
    );
    let bytes = build_pptx(&[
        ("ppt/presentation.xml", presentation(1000, 1000).as_bytes()),
        ("ppt/slides/slide1.xml", slide(&group).as_bytes()),
    ]);
    let (graph, report) = run(&bytes);

    let node = graph.pages()[0].text_nodes().next().expect("grouped text");
    assert_eq!(node.text, "Grouped");
    // group offset + (10*2, 10*2), extent 5*2
    approx(node.position.x, 12.0);
    approx(node.position.y, 12.0);
    approx(node.position.width, 1.0);
    approx(node.position.height, 1.0);
    assert_eq!(report.approximated_transforms, 0);
}

#[test]
fn test_slides_are_ordered_numerically() {
    let bytes = build_pptx(&[
        ("ppt/presentation.xml", presentation(1000, 1000).as_bytes()),
        ("ppt/slides/slide10.xml", slide(&text_shape("ten", 0, 0, 10, 10)).as_bytes()),
        ("ppt/slides/slide2.xml", slide(&text_shape("two", 0, 0, 10, 10)).as_bytes()),
        ("ppt/slides/slide1.xml", slide(&text_shape("one", 0, 0, 10, 10)).as_bytes()),
    ]);
    let (graph, _) = run(&bytes);

    let texts: Vec<_> = graph.text_nodes().map(|n| n.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "ten"]);
    let indices: Vec<_> = graph.pages().iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(graph.pages().iter().all(|p| p.kind == PageKind::Slide));
    let node = graph.text_nodes().nth(2).expect("third slide text");
    assert_eq!(node.source.slide, Some(2));
    assert_eq!(node.source.page, None);
}

#[test]
fn test_title_placeholder_and_deck_title() {
    let shapes = format!("{}{}", title_shape("Roadmap 2025"), text_shape("Milestones", 0, 200, 500, 100));
    let core = r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Product Roadmap</dc:title></cp:coreProperties>"#;
    let bytes = build_pptx(&[
        ("ppt/presentation.xml", presentation(1000, 1000).as_bytes()),
        ("docProps/core.xml", core.as_bytes()),
        ("ppt/slides/slide1.xml", slide(&shapes).as_bytes()),
    ]);
    let (graph, _) = run(&bytes);

    assert_eq!(graph.metadata().title, "Product Roadmap");
    let page = &graph.pages()[0];
    assert_eq!(page.title.as_deref(), Some("Roadmap 2025"));
    let nodes: Vec<_> = page.text_nodes().collect();
    assert_eq!(nodes.len(), 2);
    assert!(nodes[0].style.is_bold);
    approx(nodes[0].style.font_size, 36.0);
    approx(nodes[1].style.font_size, 14.0);
}

#[test]
fn test_picture_is_inlined_as_data_url() {
    let shapes = format!(
        "{}{}",
        picture("rId2", Some("Team photo"), 500, 500, 250, 250),
        picture("rId3", None, 0, 0, 100, 100)
    );
    let slide_rels = rels(&[("rId2", "../media/image1.png"), ("rId3", "../media/image2.jpeg")]);
    let bytes = build_pptx(&[
        ("ppt/presentation.xml", presentation(1000, 1000).as_bytes()),
        ("ppt/slides/slide1.xml", slide(&shapes).as_bytes()),
        ("ppt/slides/_rels/slide1.xml.rels", slide_rels.as_bytes()),
        ("ppt/media/image1.png", PNG_1X1),
        ("ppt/media/image2.jpeg", b"\xff\xd8\xff\xe0jpeg".as_slice()),
    ]);
    let (graph, report) = run(&bytes);

    let images: Vec<_> = graph.pages()[0].image_nodes().collect();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].alt, "Team photo");
    approx(images[0].position.x, 50.0);
    approx(images[0].position.width, 25.0);
    let inline = InlineImage::parse(&images[0].url).expect("data url");
    assert_eq!(inline.mime, "image/png");
    assert_eq!(inline.bytes, PNG_1X1);

    assert_eq!(images[1].alt, "Slide Image");
    assert!(images[1].url.starts_with("data:image/jpeg;base64,"));
    assert_eq!(report.skipped_images, 0);
}

#[test]
fn test_missing_media_is_skipped_and_reported() {
    let slide_rels = rels(&[("rId2", "../media/gone.png")]);
    let bytes = build_pptx(&[
        ("ppt/presentation.xml", presentation(1000, 1000).as_bytes()),
        (
            "ppt/slides/slide1.xml",
            slide(&picture("rId2", None, 0, 0, 10, 10)).as_bytes(),
        ),
        ("ppt/slides/_rels/slide1.xml.rels", slide_rels.as_bytes()),
    ]);
    let (graph, report) = run(&bytes);

    assert_eq!(graph.pages()[0].image_nodes().count(), 0);
    assert_eq!(report.skipped_images, 1);
    assert!(report.is_partial());
}

#[test]
fn test_unreadable_slide_keeps_an_empty_placeholder() {
    let bytes = build_pptx(&[
        ("ppt/presentation.xml", presentation(1000, 1000).as_bytes()),
        ("ppt/slides/slide1.xml", slide(&text_shape("fine", 0, 0, 10, 10)).as_bytes()),
        ("ppt/slides/slide2.xml", b"<p:sld><unclosed>".as_slice()),
        ("ppt/slides/slide3.xml", slide(&text_shape("also fine", 0, 0, 10, 10)).as_bytes()),
    ]);
    let (graph, report) = run(&bytes);

    assert_eq!(graph.pages().len(), 3);
    assert!(graph.pages()[1].nodes.is_empty());
    assert_eq!(graph.pages()[2].text_nodes().count(), 1);
    assert_eq!(report.failed_pages, 1);
    assert!(report.warnings.iter().any(|w| w.starts_with("slide 1:")));
}

#[test]
fn test_default_slide_size_when_undeclared() {
    let bytes = build_pptx(&[(
        "ppt/slides/slide1.xml",
        slide(&text_shape("Centered", 4_572_000, 3_429_000, 914_400, 685_800)).as_bytes(),
    )]);
    let (graph, _) = run(&bytes);

    let page = &graph.pages()[0];
    assert_eq!(page.dimensions.width, 9_144_000.0);
    assert_eq!(page.dimensions.height, 6_858_000.0);
    let node = page.text_nodes().next().expect("text");
    approx(node.position.x, 50.0);
    approx(node.position.y, 50.0);
    approx(node.position.width, 10.0);
    approx(node.position.height, 10.0);
}

#[test]
fn test_rotated_group_is_counted_as_approximation() {
    let group = format!(
        r#"<p:grpSp><p:grpSpPr><a:xfrm rot="5400000"><a:off x="0" y="0"/><a:ext cx="100" cy="100"/><a:chOff x="0" y="0"/><a:chExt cx="100" cy="100"/></a:xfrm></p:grpSpPr>{}</p:grpSp>"#,
        text_shape("Tilted", 10, 10, 10, 10)
    );
    let bytes = build_pptx(&[
        ("ppt/presentation.xml", presentation(1000, 1000).as_bytes()),
        ("ppt/slides/slide1.xml", slide(&group).as_bytes()),
    ]);
    let (graph, report) = run(&bytes);

    assert_eq!(graph.pages()[0].text_nodes().count(), 1);
    assert_eq!(report.approximated_transforms, 1);
}

#[test]
fn test_not_a_zip_is_an_archive_error() {
    let err = extract(b"plainly not a zip", PPTX, "deck.pptx", &PipelineConfig::default())
        .expect_err("not an archive");
    assert_eq!(err.code(), "ARCHIVE_ERROR");
}

#[test]
fn test_unreadable_presentation_part_falls_back_to_default_size() {
    let bytes = build_pptx(&[
        ("ppt/presentation.xml", b"<p:presentation>\xff\xfe garbage".as_slice()),
        ("ppt/slides/slide1.xml", slide(&text_shape("Still here", 0, 0, 10, 10)).as_bytes()),
    ]);
    let (graph, report) = run(&bytes);

    assert_eq!(graph.pages().len(), 1);
    assert_eq!(graph.pages()[0].dimensions.width, 9_144_000.0);
    assert_eq!(graph.pages()[0].dimensions.height, 6_858_000.0);
    assert_eq!(graph.pages()[0].text_nodes().count(), 1);
    assert!(report.warnings.iter().any(|w| w.starts_with("ppt/presentation.xml:")));
    assert_eq!(report.failed_pages, 0);
}

#[test]
fn test_unreadable_core_properties_keep_the_file_name_title() {
    let bytes = build_pptx(&[
        ("ppt/presentation.xml", presentation(1000, 1000).as_bytes()),
        ("docProps/core.xml", b"\xc3\x28 bad".as_slice()),
        ("ppt/slides/slide1.xml", slide(&text_shape("Body", 0, 0, 10, 10)).as_bytes()),
    ]);
    let (graph, report) = run(&bytes);

    assert_eq!(graph.metadata().title, "deck.pptx");
    assert_eq!(graph.pages()[0].dimensions.width, 1000.0);
    assert!(report.warnings.iter().any(|w| w.starts_with("docProps/core.xml:")));
}
