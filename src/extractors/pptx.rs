//! Slide-deck extraction over `zip` + `roxmltree`.
//!
//! Slides are walked shape by shape. Group shapes rescale their children
//! (`ext / chExt`) and shift them by the child offset, so every walk step
//! carries an immutable [`GroupContext`] mapping local EMU into slide EMU.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use roxmltree::Node;
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::core::config::PipelineConfig;
use crate::core::errors::{AppError, AppResult};
use crate::core::geometry::{to_percentage, Rect};
use crate::core::inline_image::{mime_for_extension, InlineImage};
use crate::core::types::{
    Dimensions, DocumentGraph, ExtractionReport, Page, PageKind, Position, TextStyle,
};

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

const SLIDE_IMAGE_ALT: &str = "Slide Image";
const DEFAULT_FONT_SIZE: f64 = 18.0;

pub fn extract_slides(
    bytes: &[u8],
    graph: &mut DocumentGraph,
    config: &PipelineConfig,
    report: &mut ExtractionReport,
) -> AppResult<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let canvas = read_optional(&mut archive, "ppt/presentation.xml", report)
        .and_then(|xml| slide_size(&xml))
        .unwrap_or(config.default_slide_size);

    if let Some(title) = read_optional(&mut archive, "docProps/core.xml", report).and_then(|xml| core_title(&xml)) {
        graph.set_title(title);
    }

    let slides = slide_parts(archive.file_names());
    info!(slides = slides.len(), width = canvas.width, height = canvas.height, "extracting pptx");

    for part in slides {
        let index = graph.next_page_index();
        let page = match extract_slide(&mut archive, &part, index, canvas, report) {
            Ok(page) => page,
            Err(err) => {
                warn!(slide = %part, error = %err, "slide unreadable, keeping an empty slide");
                report.failed_pages += 1;
                report.warn(format!("slide {index}: {err}"));
                Page::new(index, PageKind::Slide, canvas)
            }
        };
        debug!(slide = index, nodes = page.nodes.len(), "slide extracted");
        graph.push_page(page);
    }
    Ok(())
}

// ── Archive access ────────────────────────────────────────────────────────────

fn read_bytes(archive: &mut Archive<'_>, name: &str) -> AppResult<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(Some(buf))
}

/// Package-level parts that only refine the output. An unreadable one is
/// reported and treated as absent.
fn read_optional(archive: &mut Archive<'_>, name: &str, report: &mut ExtractionReport) -> Option<String> {
    match read_text(archive, name) {
        Ok(text) => text,
        Err(err) => {
            warn!(part = name, error = %err, "ignoring unreadable package part");
            report.warn(format!("{name}: {err}"));
            None
        }
    }
}

fn read_text(archive: &mut Archive<'_>, name: &str) -> AppResult<Option<String>> {
    read_bytes(archive, name)?
        .map(|bytes| {
            String::from_utf8(bytes)
                .map(|text| text.trim_start_matches('\u{feff}').to_string())
                .map_err(|err| AppError::Xml(format!("{name} is not utf-8: {err}")))
        })
        .transpose()
}

/// `ppt/slides/slideN.xml` parts ordered by N.
fn slide_parts<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut slides: Vec<(u32, String)> = names
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);
    slides.into_iter().map(|(_, name)| name).collect()
}

fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Internal relationship targets keyed by id.
fn parse_rels(xml: &str) -> AppResult<HashMap<String, String>> {
    let doc = roxmltree::Document::parse(xml)?;
    Ok(doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
        .filter(|n| !n.attribute("TargetMode").is_some_and(|mode| mode.eq_ignore_ascii_case("External")))
        .filter_map(|n| Some((n.attribute("Id")?.to_string(), n.attribute("Target")?.to_string())))
        .collect())
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

// ── Presentation-level metadata ───────────────────────────────────────────────

fn slide_size(xml: &str) -> Option<Dimensions> {
    let doc = roxmltree::Document::parse(xml).ok()?;
    let size = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "sldSz")?;
    let width = attr_f64(size, "cx")?;
    let height = attr_f64(size, "cy")?;
    (width > 0.0 && height > 0.0).then_some(Dimensions { width, height })
}

fn core_title(xml: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(xml).ok()?;
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "title")
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

// ── Slide walk ────────────────────────────────────────────────────────────────

/// Mapping from a group's child coordinate space into slide EMU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupContext {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl GroupContext {
    pub const ROOT: GroupContext = GroupContext {
        offset_x: 0.0,
        offset_y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    /// Context for the children of a group placed by `xfrm`.
    pub fn child(&self, xfrm: &Xfrm) -> GroupContext {
        let scale_x = ratio(xfrm.cx, xfrm.ch_cx);
        let scale_y = ratio(xfrm.cy, xfrm.ch_cy);
        GroupContext {
            offset_x: self.offset_x + xfrm.x * self.scale_x - xfrm.ch_x * scale_x * self.scale_x,
            offset_y: self.offset_y + xfrm.y * self.scale_y - xfrm.ch_y * scale_y * self.scale_y,
            scale_x: scale_x * self.scale_x,
            scale_y: scale_y * self.scale_y,
        }
    }

    /// Slide-space box of a shape placed by `xfrm` inside this context.
    pub fn place(&self, xfrm: &Xfrm) -> Rect {
        Rect::new(
            self.offset_x + xfrm.x * self.scale_x,
            self.offset_y + xfrm.y * self.scale_y,
            xfrm.cx * self.scale_x,
            xfrm.cy * self.scale_y,
        )
    }
}

fn ratio(extent: f64, child_extent: f64) -> f64 {
    if child_extent == 0.0 || extent == 0.0 {
        1.0
    } else {
        extent / child_extent
    }
}

/// `a:xfrm` values in EMU. Missing children read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Xfrm {
    pub x: f64,
    pub y: f64,
    pub cx: f64,
    pub cy: f64,
    pub ch_x: f64,
    pub ch_y: f64,
    pub ch_cx: f64,
    pub ch_cy: f64,
    /// 60000ths of a degree.
    pub rot: f64,
}

impl Xfrm {
    fn parse(node: Node<'_, '_>) -> Self {
        let mut xfrm = Xfrm {
            rot: attr_f64(node, "rot").unwrap_or(0.0),
            ..Xfrm::default()
        };
        for part in node.children().filter(Node::is_element) {
            match part.tag_name().name() {
                "off" => {
                    xfrm.x = attr_f64(part, "x").unwrap_or(0.0);
                    xfrm.y = attr_f64(part, "y").unwrap_or(0.0);
                }
                "ext" => {
                    xfrm.cx = attr_f64(part, "cx").unwrap_or(0.0);
                    xfrm.cy = attr_f64(part, "cy").unwrap_or(0.0);
                }
                "chOff" => {
                    xfrm.ch_x = attr_f64(part, "x").unwrap_or(0.0);
                    xfrm.ch_y = attr_f64(part, "y").unwrap_or(0.0);
                }
                "chExt" => {
                    xfrm.ch_cx = attr_f64(part, "cx").unwrap_or(0.0);
                    xfrm.ch_cy = attr_f64(part, "cy").unwrap_or(0.0);
                }
                _ => {}
            }
        }
        xfrm
    }

    /// Transform under a shape-properties element (`p:spPr`, `p:grpSpPr`).
    fn under(node: Node<'_, '_>, properties: &str) -> Self {
        child(node, properties)
            .and_then(|pr| child(pr, "xfrm"))
            .map(Xfrm::parse)
            .unwrap_or_default()
    }
}

fn extract_slide(
    archive: &mut Archive<'_>,
    part: &str,
    index: usize,
    canvas: Dimensions,
    report: &mut ExtractionReport,
) -> AppResult<Page> {
    let xml = read_text(archive, part)?
        .ok_or_else(|| AppError::Archive(format!("{part} missing")))?;
    let rels = match read_text(archive, &rels_path(part))? {
        Some(rels_xml) => parse_rels(&rels_xml)?,
        None => HashMap::new(),
    };
    let doc = roxmltree::Document::parse(&xml)?;

    let tree = child(doc.root_element(), "cSld").and_then(|c_sld| child(c_sld, "spTree"));
    let mut walker = SlideWalker {
        archive,
        rels,
        base_dir: part.rsplit_once('/').map(|(dir, _)| dir.to_string()).unwrap_or_default(),
        canvas,
        page: Page::new(index, PageKind::Slide, canvas),
        report,
    };
    if let Some(tree) = tree {
        walker.walk(tree, GroupContext::ROOT);
    }
    Ok(walker.page)
}

struct SlideWalker<'w, 'z> {
    archive: &'w mut Archive<'z>,
    rels: HashMap<String, String>,
    base_dir: String,
    canvas: Dimensions,
    page: Page,
    report: &'w mut ExtractionReport,
}

impl SlideWalker<'_, '_> {
    fn walk(&mut self, parent: Node<'_, '_>, ctx: GroupContext) {
        for node in parent.children().filter(Node::is_element) {
            match node.tag_name().name() {
                "grpSp" => {
                    let xfrm = Xfrm::under(node, "grpSpPr");
                    if xfrm.rot != 0.0 {
                        warn!(
                            slide = self.page.index,
                            degrees = xfrm.rot / 60_000.0,
                            "rotated group placed without its rotation"
                        );
                        self.report.approximated_transforms += 1;
                    }
                    self.walk(node, ctx.child(&xfrm));
                }
                "sp" => self.text_shape(node, &ctx),
                "pic" => self.picture(node, &ctx),
                "AlternateContent" => {
                    if let Some(fallback) = child(node, "Fallback") {
                        self.walk(fallback, ctx);
                    }
                }
                _ => {}
            }
        }
    }

    fn percentages(&self, rect: &Rect) -> Position {
        to_percentage(rect, self.canvas.width, self.canvas.height).into()
    }

    fn text_shape(&mut self, node: Node<'_, '_>, ctx: &GroupContext) {
        let Some(body) = child(node, "txBody") else {
            return;
        };
        let text = shape_text(body);
        if text.is_empty() {
            return;
        }
        if self.page.title.is_none() && is_title_placeholder(node) {
            self.page.title = Some(text.lines().map(str::trim).collect::<Vec<_>>().join(" "));
        }
        let position = self.percentages(&ctx.place(&Xfrm::under(node, "spPr")));
        self.page.push_text(text, first_run_style(body), position);
    }

    fn picture(&mut self, node: Node<'_, '_>, ctx: &GroupContext) {
        let Some(rel_id) = child(node, "blipFill")
            .and_then(|fill| child(fill, "blip"))
            .and_then(|blip| attr_local(blip, "embed").or_else(|| attr_local(blip, "link")))
        else {
            return;
        };
        let position = self.percentages(&ctx.place(&Xfrm::under(node, "spPr")));

        let Some(target) = self.rels.get(rel_id).cloned() else {
            self.skip_image(rel_id, "relationship not found");
            return;
        };
        let Some(bytes) = self.media_bytes(&target) else {
            self.skip_image(rel_id, &format!("media part {target} missing"));
            return;
        };

        let url = InlineImage::new(mime_for_extension(&target), bytes).to_data_url();
        let alt = child(node, "nvPicPr")
            .and_then(|nv| child(nv, "cNvPr"))
            .and_then(|c| c.attribute("descr"))
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(SLIDE_IMAGE_ALT)
            .to_string();
        self.page.push_image(url, alt, position);
    }

    fn media_bytes(&mut self, target: &str) -> Option<Vec<u8>> {
        let file_name = target.rsplit('/').next().unwrap_or(target);
        let candidates = [
            resolve_target(&self.base_dir, target),
            format!("ppt/media/{file_name}"),
        ];
        for candidate in candidates {
            match read_bytes(self.archive, &candidate) {
                Ok(Some(bytes)) => return Some(bytes),
                Ok(None) => {}
                Err(err) => debug!(part = %candidate, error = %err, "media read failed"),
            }
        }
        None
    }

    fn skip_image(&mut self, rel_id: &str, reason: &str) {
        warn!(slide = self.page.index, rel = rel_id, reason, "skipping slide image");
        self.report.skipped_images += 1;
        self.report
            .warn(format!("slide {}: image {rel_id} skipped: {reason}", self.page.index));
    }
}

// ── Shape helpers ─────────────────────────────────────────────────────────────

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn attr_local<'a>(node: Node<'a, '_>, local: &str) -> Option<&'a str> {
    node.attributes().find(|a| a.name() == local).map(|a| a.value())
}

fn attr_f64(node: Node<'_, '_>, name: &str) -> Option<f64> {
    attr_local(node, name)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_title_placeholder(shape: Node<'_, '_>) -> bool {
    child(shape, "nvSpPr")
        .and_then(|nv| child(nv, "nvPr"))
        .and_then(|pr| child(pr, "ph"))
        .and_then(|ph| ph.attribute("type"))
        .is_some_and(|kind| kind == "title" || kind == "ctrTitle")
}

/// Paragraph text with a newline after every `a:p`, trimmed.
fn shape_text(body: Node<'_, '_>) -> String {
    let mut text = String::new();
    for paragraph in body.children().filter(|c| c.is_element() && c.tag_name().name() == "p") {
        for item in paragraph.children().filter(Node::is_element) {
            match item.tag_name().name() {
                "r" | "fld" => {
                    if let Some(t) = child(item, "t").and_then(|t| t.text()) {
                        text.push_str(t);
                    }
                }
                "br" => text.push('\n'),
                _ => {}
            }
        }
        text.push('\n');
    }
    text.trim().to_string()
}

fn first_run_style(body: Node<'_, '_>) -> TextStyle {
    let mut style = TextStyle {
        font_size: DEFAULT_FONT_SIZE,
        ..TextStyle::default()
    };
    let Some(props) = body
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "r")
        .and_then(|run| child(run, "rPr"))
    else {
        return style;
    };

    if let Some(size) = attr_f64(props, "sz").filter(|sz| *sz > 0.0) {
        style.font_size = size / 100.0;
    }
    let flag = |name: &str| matches!(props.attribute(name), Some("1") | Some("true"));
    style.is_bold = flag("b");
    style.is_italic = flag("i");
    if let Some(face) = child(props, "latin").and_then(|latin| latin.attribute("typeface")) {
        style.font_family = face.to_string();
    }
    style.color = child(props, "solidFill")
        .and_then(|fill| child(fill, "srgbClr"))
        .and_then(|clr| clr.attribute("val"))
        .filter(|val| val.len() == 6 && val.chars().all(|c| c.is_ascii_hexdigit()))
        .map(|val| format!("#{}", val.to_ascii_lowercase()));
    style
}
