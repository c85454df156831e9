//! Text-state and transform-stack walk over lowered paint operations.

use lopdf::ObjectId;

use super::content::{PaintOp, TextPiece};
use super::fonts::FontStyle;
use crate::core::geometry::{compose, unit_square_bounds, Matrix, Rect};

/// `TJ` adjustments more negative than this (thousandths of an em) read as
/// a word gap.
const WORD_GAP_ADJUSTMENT: f64 = -200.0;

/// Something painted on the page, in PDF user space (y up).
#[derive(Debug, Clone, PartialEq)]
pub enum PaintEvent {
    Text(TextRun),
    Image { object: ObjectId, ctm: Matrix },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub bounds: Rect,
    /// `Tf` size scaled by the vertical scale of `Tm × CTM`.
    pub font_size: f64,
    pub style: FontStyle,
    pub color: Option<String>,
}

/// Graphics state saved by `q` and restored by `Q`. Text state parameters
/// live here; the text matrices do not.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Option<String>,
    style: FontStyle,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: None,
            style: FontStyle::default(),
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Walk `ops` in paint order. `base` maps user space into the page frame
/// (identity for ordinary pages).
pub fn walk(ops: &[PaintOp], base: Matrix) -> Vec<PaintEvent> {
    let mut events = Vec::new();
    let mut state = GraphicsState {
        ctm: base,
        ..GraphicsState::default()
    };
    let mut stack: Vec<GraphicsState> = Vec::new();
    let mut tm = Matrix::IDENTITY;
    let mut tlm = Matrix::IDENTITY;

    for op in ops {
        match op {
            PaintOp::Save => stack.push(state.clone()),
            PaintOp::Restore => {
                // unbalanced Q keeps the current state
                if let Some(saved) = stack.pop() {
                    state = saved;
                }
            }
            PaintOp::Transform(m) => state.ctm = compose(&state.ctm, m),
            PaintOp::FillColor(color) => state.fill = Some(color.clone()),
            PaintOp::BeginText | PaintOp::EndText => {
                tm = Matrix::IDENTITY;
                tlm = Matrix::IDENTITY;
            }
            PaintOp::SetFont { style, size } => {
                state.style = style.clone();
                state.font_size = *size;
            }
            PaintOp::SetTextMatrix(m) => {
                tm = *m;
                tlm = *m;
            }
            PaintOp::MoveText { tx, ty } => {
                tlm = Matrix::translation(*tx, *ty).then(&tlm);
                tm = tlm;
            }
            PaintOp::MoveTextSetLeading { tx, ty } => {
                state.leading = -ty;
                tlm = Matrix::translation(*tx, *ty).then(&tlm);
                tm = tlm;
            }
            PaintOp::NextLine => {
                tlm = Matrix::translation(0.0, -state.leading).then(&tlm);
                tm = tlm;
            }
            PaintOp::SetLeading(v) => state.leading = *v,
            PaintOp::SetCharSpacing(v) => state.char_spacing = *v,
            PaintOp::SetWordSpacing(v) => state.word_spacing = *v,
            PaintOp::SetHorizontalScale(v) => state.horizontal_scale = v / 100.0,
            PaintOp::SetRise(v) => state.rise = *v,
            PaintOp::ShowText(pieces) => {
                let (run, advance) = show_text(pieces, &state, &tm);
                if let Some(run) = run {
                    events.push(PaintEvent::Text(run));
                }
                tm = Matrix::translation(advance, 0.0).then(&tm);
            }
            PaintOp::DrawImage(object) => events.push(PaintEvent::Image {
                object: *object,
                ctm: state.ctm,
            }),
        }
    }
    events
}

/// Lay out one show operation. Returns the run (if the text is not blank)
/// and the horizontal advance in text space.
fn show_text(pieces: &[TextPiece], state: &GraphicsState, tm: &Matrix) -> (Option<TextRun>, f64) {
    let size = state.font_size;
    let th = state.horizontal_scale;
    let mut text = String::new();
    let mut advance = 0.0;

    for piece in pieces {
        match piece {
            TextPiece::Glyphs(glyphs) => {
                for glyph in glyphs {
                    text.push_str(&glyph.text);
                    let word = if glyph.is_space { state.word_spacing } else { 0.0 };
                    advance += (glyph.width * size + state.char_spacing + word) * th;
                }
            }
            TextPiece::Adjust(amount) => {
                advance -= amount / 1000.0 * size * th;
                if *amount < WORD_GAP_ADJUSTMENT && !text.is_empty() && !text.ends_with(' ') {
                    text.push(' ');
                }
            }
        }
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return (None, advance);
    }

    let placement = tm.then(&state.ctm);
    let glyph_box = Matrix::new(advance, 0.0, 0.0, size, 0.0, state.rise).then(&placement);
    let run = TextRun {
        text: trimmed.to_string(),
        bounds: unit_square_bounds(&glyph_box),
        font_size: size * placement.vertical_scale(),
        style: state.style.clone(),
        color: state.fill.clone(),
    };
    (Some(run), advance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::pdf::fonts::Glyph;

    fn glyphs(text: &str) -> TextPiece {
        TextPiece::Glyphs(
            text.chars()
                .map(|c| Glyph {
                    text: c.to_string(),
                    width: 0.5,
                    is_space: c == ' ',
                })
                .collect(),
        )
    }

    fn font(size: f64) -> PaintOp {
        PaintOp::SetFont {
            style: FontStyle::default(),
            size,
        }
    }

    fn texts(events: &[PaintEvent]) -> Vec<&TextRun> {
        events
            .iter()
            .filter_map(|event| match event {
                PaintEvent::Text(run) => Some(run),
                PaintEvent::Image { .. } => None,
            })
            .collect()
    }

    #[test]
    fn text_run_uses_text_matrix_and_ctm() {
        let ops = vec![
            PaintOp::Save,
            PaintOp::Transform(Matrix::scale(2.0, 2.0)),
            PaintOp::BeginText,
            font(10.0),
            PaintOp::SetTextMatrix(Matrix::translation(50.0, 100.0)),
            PaintOp::ShowText(vec![glyphs("Hi")]),
            PaintOp::EndText,
            PaintOp::Restore,
        ];
        let events = walk(&ops, Matrix::IDENTITY);
        let runs = texts(&events);
        assert_eq!(runs.len(), 1);
        let run = runs[0];
        assert_eq!(run.text, "Hi");
        assert!((run.font_size - 20.0).abs() < 1e-9);
        // two glyphs of 0.5 em at 10pt, doubled by the CTM
        assert!((run.bounds.x - 100.0).abs() < 1e-9);
        assert!((run.bounds.y - 200.0).abs() < 1e-9);
        assert!((run.bounds.width - 20.0).abs() < 1e-9);
        assert!((run.bounds.height - 20.0).abs() < 1e-9);
    }

    #[test]
    fn restore_pops_transform_and_blank_runs_are_dropped() {
        let ops = vec![
            PaintOp::Save,
            PaintOp::Transform(Matrix::translation(100.0, 0.0)),
            PaintOp::Restore,
            PaintOp::BeginText,
            font(12.0),
            PaintOp::MoveText { tx: 10.0, ty: 700.0 },
            PaintOp::ShowText(vec![glyphs("   ")]),
            PaintOp::ShowText(vec![glyphs("x")]),
            PaintOp::EndText,
            PaintOp::Restore,
        ];
        let events = walk(&ops, Matrix::IDENTITY);
        let runs = texts(&events);
        assert_eq!(runs.len(), 1);
        // the blank run still advanced the pen by three spaces
        assert!((runs[0].bounds.x - (10.0 + 3.0 * 6.0)).abs() < 1e-9);
        assert!((runs[0].bounds.y - 700.0).abs() < 1e-9);
    }

    #[test]
    fn next_line_uses_leading() {
        let ops = vec![
            PaintOp::BeginText,
            font(12.0),
            PaintOp::MoveTextSetLeading { tx: 72.0, ty: -14.0 },
            PaintOp::ShowText(vec![glyphs("a")]),
            PaintOp::NextLine,
            PaintOp::ShowText(vec![glyphs("b")]),
        ];
        let events = walk(&ops, Matrix::IDENTITY);
        let runs = texts(&events);
        assert_eq!(runs.len(), 2);
        assert!((runs[0].bounds.y - -14.0).abs() < 1e-9);
        assert!((runs[1].bounds.y - -28.0).abs() < 1e-9);
        assert!((runs[1].bounds.x - 72.0).abs() < 1e-9);
    }

    #[test]
    fn large_tj_gap_becomes_a_space() {
        let ops = vec![
            PaintOp::BeginText,
            font(10.0),
            PaintOp::ShowText(vec![glyphs("Hello"), TextPiece::Adjust(-250.0), glyphs("world")]),
            PaintOp::ShowText(vec![glyphs("ke"), TextPiece::Adjust(-40.0), glyphs("rn")]),
        ];
        let events = walk(&ops, Matrix::IDENTITY);
        let runs = texts(&events);
        assert_eq!(runs[0].text, "Hello world");
        assert_eq!(runs[1].text, "kern");
    }

    #[test]
    fn images_capture_the_current_ctm() {
        let place = Matrix::new(200.0, 0.0, 0.0, 100.0, 50.0, 60.0);
        let ops = vec![
            PaintOp::Save,
            PaintOp::Transform(place),
            PaintOp::DrawImage((7, 0)),
            PaintOp::Restore,
            PaintOp::DrawImage((8, 0)),
        ];
        let events = walk(&ops, Matrix::IDENTITY);
        assert_eq!(
            events,
            vec![
                PaintEvent::Image { object: (7, 0), ctm: place },
                PaintEvent::Image {
                    object: (8, 0),
                    ctm: Matrix::IDENTITY
                },
            ]
        );
    }

    #[test]
    fn fill_color_is_part_of_saved_state() {
        let ops = vec![
            PaintOp::Save,
            PaintOp::FillColor("#ff0000".to_string()),
            PaintOp::BeginText,
            font(12.0),
            PaintOp::ShowText(vec![glyphs("red")]),
            PaintOp::EndText,
            PaintOp::Restore,
            PaintOp::BeginText,
            PaintOp::ShowText(vec![glyphs("plain")]),
        ];
        let events = walk(&ops, Matrix::IDENTITY);
        let runs = texts(&events);
        assert_eq!(runs[0].color.as_deref(), Some("#ff0000"));
        assert_eq!(runs[1].color, None);
        // font size is graphics state too
        assert_eq!(runs[1].font_size, 0.0);
    }
}
