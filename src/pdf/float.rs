//! Floating objects and footnote blocks.

use crate::model::{AnchorRelation, FloatingAnchor, Note, Shape, ShapeKind, hwp_to_pt};

use super::canvas::{Canvas, FontId, PageId, Stroke, TextPaint};
use super::layout::wrap_text;
use super::stroke_for;

pub(crate) const FOOTNOTE_SIZE: f32 = 9.0;
/// Footnote line pitch as a multiple of the footnote size.
pub(crate) const FOOTNOTE_PITCH: f32 = 1.35;
/// Gap between the footnote number and its text.
pub(crate) const FOOTNOTE_INDENT: f32 = 12.0;
/// Band above the first footnote of a page holding the separator rule.
pub(crate) const FOOTNOTE_BAND: f32 = 10.0;

/// Anchor offsets are stored unsigned; reinterpret the bits as two's complement.
pub fn signed_offset(raw: u32) -> i32 {
    raw as i32
}

/// Reference boxes a floating anchor can be positioned against, in points.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AnchorFrame {
    pub page_width: f32,
    pub page_height: f32,
    pub column_x: f32,
    pub body_top: f32,
    pub para_x: f32,
    pub para_top: f32,
}

/// Top-left corner of a `w` × `h` object, clamped onto the page.
pub(crate) fn place_float(anchor: &FloatingAnchor, frame: &AnchorFrame, w: f32, h: f32) -> (f32, f32) {
    let dx = hwp_to_pt(signed_offset(anchor.horz_offset));
    let dy = hwp_to_pt(signed_offset(anchor.vert_offset));
    let x = match anchor.horz_rel {
        AnchorRelation::Page => dx,
        AnchorRelation::Column => frame.column_x + dx,
        AnchorRelation::Paragraph => frame.para_x + dx,
    };
    let top = match anchor.vert_rel {
        AnchorRelation::Page => frame.page_height - dy,
        AnchorRelation::Column => frame.body_top - dy,
        AnchorRelation::Paragraph => frame.para_top - dy,
    };
    (
        x.clamp(0.0, (frame.page_width - w).max(0.0)),
        top.clamp(h.min(frame.page_height), frame.page_height),
    )
}

/// A numbered footnote wrapped for the footnote area.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FootnoteBlock {
    pub number: u32,
    pub lines: Vec<String>,
    pub height: f32,
}

pub(crate) fn footnote_block(canvas: &dyn Canvas, font: FontId, number: u32, note: &Note, width: f32) -> FootnoteBlock {
    let text = note
        .paragraphs
        .iter()
        .map(|p| p.plain_text())
        .collect::<Vec<_>>()
        .join("\n");
    let space = FOOTNOTE_SIZE * 0.25;
    let measure = |s: &str| -> f32 {
        s.chars()
            .map(|c| match c {
                ' ' => space,
                '\t' => space * 4.0,
                c => {
                    let mut buf = [0u8; 4];
                    canvas.text_width(c.encode_utf8(&mut buf), font, FOOTNOTE_SIZE)
                }
            })
            .sum()
    };
    let mut lines = wrap_text(&text, (width - FOOTNOTE_INDENT).max(FOOTNOTE_SIZE), measure);
    if lines.is_empty() {
        lines.push(String::new());
    }
    let height = lines.len() as f32 * FOOTNOTE_SIZE * FOOTNOTE_PITCH;
    FootnoteBlock { number, lines, height }
}

/// Draw a page's footnotes stacked upwards from `floor` with a short rule above them.
pub(crate) fn draw_footnotes(
    canvas: &mut dyn Canvas,
    page: PageId,
    font: FontId,
    blocks: &[FootnoteBlock],
    (left, width): (f32, f32),
    floor: f32,
) {
    if blocks.is_empty() {
        return;
    }
    let total: f32 = blocks.iter().map(|b| b.height).sum();
    let rule_y = floor + total + FOOTNOTE_BAND / 2.0;
    let rule = Stroke {
        width: 0.5,
        color: [0, 0, 0],
        dash: super::canvas::Dash::Solid,
    };
    canvas.draw_line(page, left, rule_y, left + width / 3.0, rule_y, &rule);

    let ascent = FOOTNOTE_SIZE * canvas.font_metrics(font).ascender_ratio;
    let pitch = FOOTNOTE_SIZE * FOOTNOTE_PITCH;
    let paint = TextPaint {
        color: [0, 0, 0],
        letter_spacing: 0.0,
    };
    let mut top = floor + total;
    for block in blocks {
        canvas.draw_text(page, &format!("{})", block.number), left, top - ascent, font, FOOTNOTE_SIZE, &paint);
        for line in &block.lines {
            if !line.is_empty() {
                canvas.draw_text(page, line, left + FOOTNOTE_INDENT, top - ascent, font, FOOTNOTE_SIZE, &paint);
            }
            top -= pitch;
        }
    }
}

/// Draw a shape in the box whose bottom-left corner is (x, y).
pub(crate) fn draw_shape(canvas: &mut dyn Canvas, page: PageId, shape: &Shape, x: f32, y: f32, w: f32, h: f32) {
    let stroke = stroke_for(&shape.line);
    match shape.kind {
        ShapeKind::Rectangle => canvas.draw_rect(page, x, y, w, h, shape.fill, stroke.as_ref()),
        ShapeKind::Ellipse => canvas.draw_ellipse(page, x, y, w, h, shape.fill, stroke.as_ref()),
        ShapeKind::Line => {
            if let Some(stroke) = stroke {
                canvas.draw_line(page, x, y + h, x + w, y, &stroke);
            }
        }
    }
}
