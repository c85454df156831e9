//! Lowers lopdf content operations into a flat [`PaintOp`] list.
//!
//! Lowering resolves everything that needs the document: font dictionaries
//! are loaded (and cached per object) so show operations carry decoded
//! glyphs, and Form XObjects are inlined as `Save, Transform, body, Restore`.
//! The result can be walked without touching the document again.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use super::fonts::{FontInfo, FontStyle, Glyph};
use super::objects::{dict_entry, number, resolve, stream_bytes};
use crate::core::errors::{AppError, AppResult};
use crate::core::geometry::Matrix;

/// Piece of a show operation: decoded glyphs or a `TJ` position adjustment
/// in thousandths of text space.
#[derive(Debug, Clone, PartialEq)]
pub enum TextPiece {
    Glyphs(Vec<Glyph>),
    Adjust(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    Save,
    Restore,
    Transform(Matrix),
    FillColor(String),
    BeginText,
    EndText,
    SetFont { style: FontStyle, size: f64 },
    SetTextMatrix(Matrix),
    MoveText { tx: f64, ty: f64 },
    /// `TD`: move and set leading to `-ty`.
    MoveTextSetLeading { tx: f64, ty: f64 },
    NextLine,
    SetLeading(f64),
    SetCharSpacing(f64),
    SetWordSpacing(f64),
    SetHorizontalScale(f64),
    SetRise(f64),
    ShowText(Vec<TextPiece>),
    DrawImage(ObjectId),
}

/// Lowered content for one page.
#[derive(Debug, Default)]
pub struct LoweredPage {
    pub ops: Vec<PaintOp>,
    /// Forms skipped for exceeding the nesting limit or for referencing
    /// themselves.
    pub skipped_forms: usize,
}

pub fn lower_page(
    doc: &Document,
    page_id: ObjectId,
    resources: Option<&Dictionary>,
    max_form_depth: usize,
) -> AppResult<LoweredPage> {
    let bytes = doc
        .get_page_content(page_id)
        .map_err(|err| AppError::Pdf(format!("page {page_id:?} content unreadable: {err}")))?;
    let content = Content::decode(&bytes)
        .map_err(|err| AppError::Pdf(format!("page {page_id:?} content undecodable: {err}")))?;

    let mut lowering = Lowering::new(doc, max_form_depth);
    lowering.lower(&content.operations, resources, 0);
    Ok(LoweredPage {
        ops: lowering.ops,
        skipped_forms: lowering.skipped_forms,
    })
}

struct Lowering<'a> {
    doc: &'a Document,
    max_form_depth: usize,
    fonts: HashMap<ObjectId, Rc<FontInfo>>,
    current_font: Option<Rc<FontInfo>>,
    font_stack: Vec<Option<Rc<FontInfo>>>,
    /// Saves below this depth belong to an enclosing form; a stray `Q`
    /// cannot pop them.
    save_floor: usize,
    open_forms: Vec<ObjectId>,
    ops: Vec<PaintOp>,
    skipped_forms: usize,
}

impl<'a> Lowering<'a> {
    fn new(doc: &'a Document, max_form_depth: usize) -> Self {
        Self {
            doc,
            max_form_depth,
            fonts: HashMap::new(),
            current_font: None,
            font_stack: Vec::new(),
            save_floor: 0,
            open_forms: Vec::new(),
            ops: Vec::new(),
            skipped_forms: 0,
        }
    }

    fn lower(&mut self, operations: &[Operation], resources: Option<&Dictionary>, depth: usize) {
        for op in operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => self.save(),
                "Q" => self.restore(),
                "cm" => {
                    if let Some(m) = matrix_operands(operands) {
                        self.ops.push(PaintOp::Transform(m));
                    }
                }
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(color) = fill_color(operands) {
                        self.ops.push(PaintOp::FillColor(color));
                    }
                }
                "BT" => self.ops.push(PaintOp::BeginText),
                "ET" => self.ops.push(PaintOp::EndText),
                "Tf" => self.select_font(operands, resources),
                "Tm" => {
                    if let Some(m) = matrix_operands(operands) {
                        self.ops.push(PaintOp::SetTextMatrix(m));
                    }
                }
                "Td" | "TD" => {
                    if let [tx, ty] = numbers(operands).as_slice() {
                        let (tx, ty) = (*tx, *ty);
                        self.ops.push(if op.operator == "TD" {
                            PaintOp::MoveTextSetLeading { tx, ty }
                        } else {
                            PaintOp::MoveText { tx, ty }
                        });
                    }
                }
                "T*" => self.ops.push(PaintOp::NextLine),
                "TL" => self.push_scalar(operands, PaintOp::SetLeading),
                "Tc" => self.push_scalar(operands, PaintOp::SetCharSpacing),
                "Tw" => self.push_scalar(operands, PaintOp::SetWordSpacing),
                "Tz" => self.push_scalar(operands, PaintOp::SetHorizontalScale),
                "Ts" => self.push_scalar(operands, PaintOp::SetRise),
                "Tj" => {
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        let glyphs = self.decode(bytes);
                        self.ops.push(PaintOp::ShowText(vec![TextPiece::Glyphs(glyphs)]));
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let pieces = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(TextPiece::Glyphs(self.decode(bytes))),
                                other => number(other).map(TextPiece::Adjust),
                            })
                            .collect();
                        self.ops.push(PaintOp::ShowText(pieces));
                    }
                }
                "'" => {
                    self.ops.push(PaintOp::NextLine);
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        let glyphs = self.decode(bytes);
                        self.ops.push(PaintOp::ShowText(vec![TextPiece::Glyphs(glyphs)]));
                    }
                }
                "\"" => {
                    if let (Some(aw), Some(ac)) = (
                        operands.first().and_then(number),
                        operands.get(1).and_then(number),
                    ) {
                        self.ops.push(PaintOp::SetWordSpacing(aw));
                        self.ops.push(PaintOp::SetCharSpacing(ac));
                    }
                    self.ops.push(PaintOp::NextLine);
                    if let Some(bytes) = operands.get(2).and_then(string_bytes) {
                        let glyphs = self.decode(bytes);
                        self.ops.push(PaintOp::ShowText(vec![TextPiece::Glyphs(glyphs)]));
                    }
                }
                "Do" => self.paint_xobject(operands, resources, depth),
                _ => {}
            }
        }
    }

    fn save(&mut self) {
        self.font_stack.push(self.current_font.clone());
        self.ops.push(PaintOp::Save);
    }

    fn restore(&mut self) {
        if self.font_stack.len() <= self.save_floor {
            return;
        }
        if let Some(font) = self.font_stack.pop() {
            self.current_font = font;
        }
        self.ops.push(PaintOp::Restore);
    }

    fn push_scalar(&mut self, operands: &[Object], make: fn(f64) -> PaintOp) {
        if let Some(value) = operands.first().and_then(number) {
            self.ops.push(make(value));
        }
    }

    fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        match &self.current_font {
            Some(font) => font.decode(bytes),
            None => FontInfo::fallback().decode(bytes),
        }
    }

    fn select_font(&mut self, operands: &[Object], resources: Option<&Dictionary>) {
        let (Some(name), Some(size)) = (
            operands.first().and_then(|obj| obj.as_name().ok()),
            operands.get(1).and_then(number),
        ) else {
            return;
        };

        let doc = self.doc;
        let font = resources
            .and_then(|res| dict_entry(doc, res, b"Font"))
            .and_then(|fonts| fonts.get(name).ok())
            .map(|entry| self.load_font(entry))
            .unwrap_or_else(|| {
                debug!(font = %String::from_utf8_lossy(name), "font resource not found");
                Rc::new(FontInfo::fallback())
            });

        self.ops.push(PaintOp::SetFont {
            style: font.style.clone(),
            size,
        });
        self.current_font = Some(font);
    }

    fn load_font(&mut self, entry: &Object) -> Rc<FontInfo> {
        let doc = self.doc;
        match entry {
            Object::Reference(id) => {
                if let Some(font) = self.fonts.get(id) {
                    return Rc::clone(font);
                }
                let font = Rc::new(
                    doc.get_dictionary(*id)
                        .map(|dict| FontInfo::load(doc, dict))
                        .unwrap_or_else(|_| FontInfo::fallback()),
                );
                self.fonts.insert(*id, Rc::clone(&font));
                font
            }
            Object::Dictionary(dict) => Rc::new(FontInfo::load(doc, dict)),
            _ => Rc::new(FontInfo::fallback()),
        }
    }

    fn paint_xobject(&mut self, operands: &[Object], resources: Option<&Dictionary>, depth: usize) {
        let Some(name) = operands.first().and_then(|obj| obj.as_name().ok()) else {
            return;
        };
        let doc = self.doc;
        let Some(Object::Reference(id)) = resources
            .and_then(|res| dict_entry(doc, res, b"XObject"))
            .and_then(|xobjects| xobjects.get(name).ok())
        else {
            return;
        };
        let id = *id;
        let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
            return;
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => self.ops.push(PaintOp::DrawImage(id)),
            Ok(b"Form") => {
                if depth >= self.max_form_depth || self.open_forms.contains(&id) {
                    warn!(form = ?id, depth, "skipping nested form");
                    self.skipped_forms += 1;
                    return;
                }
                let body = match stream_bytes(stream).and_then(|bytes| {
                    Content::decode(&bytes).map_err(|err| AppError::Pdf(err.to_string()))
                }) {
                    Ok(content) => content,
                    Err(err) => {
                        warn!(form = ?id, error = %err, "form content undecodable");
                        self.skipped_forms += 1;
                        return;
                    }
                };
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .map(|obj| resolve(doc, obj))
                    .and_then(|obj| obj.as_array().ok())
                    .and_then(|items| matrix_operands(items))
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = dict_entry(doc, &stream.dict, b"Resources").or(resources);

                self.open_forms.push(id);
                self.save();
                self.ops.push(PaintOp::Transform(matrix));
                let outer_floor = self.save_floor;
                self.save_floor = self.font_stack.len();
                self.lower(&body.operations, form_resources, depth + 1);
                // close saves the form body left open
                while self.font_stack.len() > self.save_floor {
                    self.restore();
                }
                self.save_floor = outer_floor;
                self.restore();
                self.open_forms.pop();
            }
            _ => {}
        }
    }
}

fn numbers(operands: &[Object]) -> Vec<f64> {
    operands.iter().filter_map(number).collect()
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    match numbers(operands).as_slice() {
        [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)).filter(Matrix::is_finite),
        _ => None,
    }
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes.as_slice()),
        _ => None,
    }
}

/// `#rrggbb` for gray, RGB or CMYK fill operands. Pattern names are ignored.
fn fill_color(operands: &[Object]) -> Option<String> {
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let (r, g, b) = match numbers(operands).as_slice() {
        [gray] => (*gray, *gray, *gray),
        [r, g, b] => (*r, *g, *b),
        [c, m, y, k] => ((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)),
        _ => return None,
    };
    Some(format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_colors_map_to_hex() {
        assert_eq!(fill_color(&[Object::Real(0.0)]).as_deref(), Some("#000000"));
        assert_eq!(
            fill_color(&[Object::Integer(1), Object::Real(0.0), Object::Real(0.0)]).as_deref(),
            Some("#ff0000")
        );
        assert_eq!(
            fill_color(&[
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(1.0)
            ])
            .as_deref(),
            Some("#000000")
        );
        assert_eq!(fill_color(&[Object::Name(b"P0".to_vec())]), None);
    }

    #[test]
    fn matrix_operands_need_six_numbers() {
        let ops: Vec<Object> = [1, 0, 0, 1, 20, 30].into_iter().map(Object::Integer).collect();
        assert_eq!(matrix_operands(&ops), Some(Matrix::translation(20.0, 30.0)));
        assert_eq!(matrix_operands(&ops[..5]), None);

        let mut broken = ops.clone();
        broken[0] = Object::Real(f32::INFINITY);
        assert_eq!(matrix_operands(&broken), None);
    }
}
