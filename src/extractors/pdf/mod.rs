//! Fixed-layout extraction over `lopdf`.
//!
//! Each page is lowered to a paint-op list (fonts resolved, forms inlined),
//! walked with an explicit transform stack, and the resulting text runs and
//! image placements are flipped into top-left page coordinates and stored as
//! percentages of the MediaBox.

mod content;
mod fonts;
mod images;
mod objects;
mod walk;

use lopdf::{Document, ObjectId};
use tracing::{debug, info, warn};

use crate::core::config::PipelineConfig;
use crate::core::errors::AppResult;
use crate::core::geometry::{covers_canvas, to_percentage, unit_square_bounds, Matrix, Rect};
use crate::core::types::{
    Dimensions, DocumentGraph, ExtractionReport, Page, PageKind, Position, TextStyle,
};

use content::lower_page;
use images::ImageDecoder;
use objects::{number, resolve, resolve_dict, resolve_inherited, text_string};
use walk::{walk, PaintEvent, TextRun};

const US_LETTER: (f64, f64) = (612.0, 792.0);
const PAGE_IMAGE_ALT: &str = "Page Image";

/// MediaBox origin and size in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MediaBox {
    llx: f64,
    lly: f64,
    width: f64,
    height: f64,
}

impl MediaBox {
    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Top-left percentages for a user-space rectangle (y up, relative to
    /// the MediaBox origin).
    fn place(&self, rect: &Rect) -> Position {
        let flipped = Rect::new(rect.x, self.height - (rect.y + rect.height), rect.width, rect.height);
        to_percentage(&flipped, self.width, self.height).into()
    }
}

pub fn extract_pages(
    bytes: &[u8],
    graph: &mut DocumentGraph,
    config: &PipelineConfig,
    report: &mut ExtractionReport,
) -> AppResult<()> {
    let doc = Document::load_mem(bytes)?;

    if let Some(title) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| resolve_dict(&doc, info))
        .and_then(|info| text_string(&doc, info, b"Title"))
    {
        graph.set_title(title);
    }
    if let Some(lang) = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|root| resolve_dict(&doc, root))
        .and_then(|catalog| text_string(&doc, catalog, b"Lang"))
    {
        graph.set_language(lang);
    }

    let mut decoder = ImageDecoder::new(&doc);
    let pages = doc.get_pages();
    info!(pages = pages.len(), "extracting pdf");

    for (page_number, page_id) in pages {
        let index = graph.next_page_index();
        let media = media_box(&doc, page_id);
        let mut page = Page::new(index, PageKind::Page, media.dimensions());

        let resources = resolve_inherited(&doc, page_id, b"Resources").and_then(|obj| obj.as_dict().ok());
        match lower_page(&doc, page_id, resources, config.max_form_depth) {
            Ok(lowered) => {
                if lowered.skipped_forms > 0 {
                    report.warn(format!(
                        "page {index}: {} nested form(s) skipped",
                        lowered.skipped_forms
                    ));
                }
                let base = Matrix::translation(-media.llx, -media.lly);
                for event in walk(&lowered.ops, base) {
                    match event {
                        PaintEvent::Text(run) => push_run(&mut page, &media, run),
                        PaintEvent::Image { object, ctm } => {
                            push_image(&mut page, &media, object, &ctm, &mut decoder, config, report)
                        }
                    }
                }
            }
            Err(err) => {
                warn!(page = page_number, error = %err, "page content undecodable, keeping an empty page");
                report.failed_pages += 1;
                report.warn(format!("page {index}: {err}"));
            }
        }

        debug!(page = index, nodes = page.nodes.len(), "page extracted");
        graph.push_page(page);
    }
    Ok(())
}

fn media_box(doc: &Document, page_id: ObjectId) -> MediaBox {
    let corners: Option<Vec<f64>> = resolve_inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .map(|items| items.iter().filter_map(|item| number(resolve(doc, item))).collect());

    match corners.as_deref() {
        Some([x0, y0, x1, y1]) if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => MediaBox {
            llx: x0.min(*x1),
            lly: y0.min(*y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        },
        _ => MediaBox {
            llx: 0.0,
            lly: 0.0,
            width: US_LETTER.0,
            height: US_LETTER.1,
        },
    }
}

fn push_run(page: &mut Page, media: &MediaBox, run: TextRun) {
    let style = TextStyle {
        font_size: run.font_size,
        is_bold: run.style.bold,
        is_italic: run.style.italic,
        font_family: run.style.family,
        color: run.color,
    };
    page.push_text(run.text, style, media.place(&run.bounds));
}

fn push_image(
    page: &mut Page,
    media: &MediaBox,
    object: ObjectId,
    ctm: &Matrix,
    decoder: &mut ImageDecoder<'_>,
    config: &PipelineConfig,
    report: &mut ExtractionReport,
) {
    let bounds = unit_square_bounds(ctm);
    if covers_canvas(&bounds, media.width, media.height, config.background_coverage) {
        debug!(page = page.index, image = ?object, "skipping background image");
        report.background_images += 1;
        return;
    }
    match decoder.data_url(object) {
        Ok(url) => {
            page.push_image(url, PAGE_IMAGE_ALT.to_string(), media.place(&bounds));
        }
        Err(err) => {
            warn!(page = page.index, image = ?object, error = %err, "skipping undecodable image");
            report.skipped_images += 1;
            report.warn(format!("page {}: image {object:?} skipped: {err}", page.index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Object;
    use lopdf::dictionary;

    #[test]
    fn place_flips_relative_to_the_media_box() {
        let media = MediaBox {
            llx: 0.0,
            lly: 0.0,
            width: 200.0,
            height: 100.0,
        };
        let position = media.place(&Rect::new(20.0, 70.0, 40.0, 10.0));
        assert!((position.x - 10.0).abs() < 1e-9);
        assert!((position.y - 20.0).abs() < 1e-9);
        assert!((position.width - 20.0).abs() < 1e-9);
        assert!((position.height - 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_media_box_defaults_to_letter() {
        let doc = Document::with_version("1.5");
        let media = media_box(&doc, (1, 0));
        assert_eq!(media.dimensions(), Dimensions { width: 612.0, height: 792.0 });
    }

    #[test]
    fn inherited_media_box_is_normalized() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(lopdf::dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1i64,
                "MediaBox" => vec![Object::Integer(10), Object::Integer(800), Object::Integer(420), Object::Integer(0)],
            }),
        );
        let media = media_box(&doc, page_id);
        assert_eq!(media.llx, 10.0);
        assert_eq!(media.lly, 0.0);
        assert_eq!(media.width, 410.0);
        assert_eq!(media.height, 800.0);
    }
}
