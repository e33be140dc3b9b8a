use crate::fonts::FontKey;
use crate::model::{
    Alignment, ColumnLayout, Control, FloatingAnchor, HeaderFooter, LineSeg, Paragraph, Picture,
    RunChild, Shape, Table, hwp_to_pt,
};
use crate::style::{ResolvedCharStyle, ResolvedParaStyle, paragraph_char_style, paragraph_style, run_style};

use super::Engine;
use super::canvas::{EmbeddedImage, ImageId, PageId};
use super::float::{FootnoteBlock, draw_shape, footnote_block};
use super::layout::{LineBox, LineRange, LinePlacement, SpanStyle, StyledText, break_lines, draw_line};
use super::table::TableGeometry;

/// Superscript marker size relative to the run.
const MARKER_SCALE: f32 = 0.6;
const MARKER_RISE: f32 = 0.4;
/// Pixel size of images without a declared size (96 dpi).
const PX_TO_PT: f32 = 0.75;

/// Per-call options for laying out a paragraph.
#[derive(Clone, Debug)]
pub(crate) struct ParaCtx {
    pub outline: Option<u32>,
    pub page_number: u32,
    /// Number footnote/endnote controls; off for headers and footers.
    pub notes: bool,
    /// Lay floating objects out inline (inside cells and header bands).
    pub floats_inline: bool,
    /// Height of a paragraph without visible content, as a fraction of a line.
    pub empty_ratio: f32,
    /// Text shown in place of a numbering prefix.
    pub lead: Option<String>,
    pub note_width: f32,
    /// Tallest object allowed, in points.
    pub max_height: f32,
}

pub(crate) enum Floating<'d> {
    Table(&'d Table, TableGeometry<'d>),
    Picture(EmbeddedImage, &'d FloatingAnchor, f32, f32),
    Shape(&'d Shape, f32, f32),
}

pub(crate) enum ItemKind<'d> {
    Line {
        text: usize,
        range: LineRange,
        x: f32,
        width: f32,
        ascent: f32,
        align: Alignment,
        stretch: bool,
        notes: Vec<FootnoteBlock>,
        /// The source placed this line above its predecessor: a column or page break.
        source_break: bool,
    },
    Table {
        geometry: TableGeometry<'d>,
        x: f32,
    },
    Image {
        image: ImageId,
        x: f32,
        width: f32,
    },
    Shape {
        shape: &'d Shape,
        x: f32,
        width: f32,
    },
    Float(Floating<'d>),
    ColumnDef(&'d ColumnLayout),
    HeaderFooter {
        header: bool,
        def: &'d HeaderFooter,
    },
}

pub(crate) struct Item<'d> {
    pub height: f32,
    pub kind: ItemKind<'d>,
}

pub(crate) struct ParaLayout<'d> {
    pub texts: Vec<StyledText>,
    pub items: Vec<Item<'d>>,
    /// Left edge of the paragraph inside its column.
    pub margin_left: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl Item<'_> {
    /// Height of the footnotes drawn along with this item, nested tables included.
    pub fn note_height(&self) -> f32 {
        match &self.kind {
            ItemKind::Line { notes, .. } => notes.iter().map(|n| n.height).sum(),
            ItemKind::Table { geometry, .. } => geometry.note_height(),
            _ => 0.0,
        }
    }
}

impl ParaLayout<'_> {
    pub fn height(&self) -> f32 {
        self.margin_top + self.items.iter().map(|i| i.height).sum::<f32>() + self.margin_bottom
    }
}

/// Laid-out paragraphs stacked top to bottom.
pub(crate) struct Block<'d> {
    pub paras: Vec<ParaLayout<'d>>,
    pub height: f32,
}

impl Block<'_> {
    pub fn note_height(&self) -> f32 {
        self.paras
            .iter()
            .flat_map(|p| &p.items)
            .map(|i| i.note_height())
            .sum()
    }
}

enum Seq<'d> {
    Text(usize),
    Object(&'d RunChild),
    Register(bool, &'d HeaderFooter),
}

struct TextPiece {
    text: StyledText,
    notes: Vec<(usize, FootnoteBlock)>,
}

fn flush(current: &mut TextPiece, pieces: &mut Vec<TextPiece>, seq: &mut Vec<Seq<'_>>) {
    if current.text.is_empty() && current.notes.is_empty() {
        return;
    }
    seq.push(Seq::Text(pieces.len()));
    pieces.push(std::mem::replace(
        current,
        TextPiece {
            text: StyledText::default(),
            notes: Vec::new(),
        },
    ));
}

/// Split text into per-line ranges following the source line segments.
fn hinted_ranges(segs: &[LineSeg], len: usize, prefix_len: usize) -> Vec<LineRange> {
    let mut starts: Vec<usize> = segs
        .iter()
        .enumerate()
        .map(|(i, s)| if i == 0 { 0 } else { (prefix_len + s.text_pos as usize).min(len) })
        .collect();
    for i in 1..starts.len() {
        starts[i] = starts[i].max(starts[i - 1]);
    }
    (0..starts.len())
        .map(|i| {
            let end = starts.get(i + 1).copied().unwrap_or(len);
            LineRange {
                start: starts[i],
                end,
                ends_block: i + 1 == starts.len(),
            }
        })
        .collect()
}

/// Scale (w, h) down uniformly so it fits in `max_w` × `max_h`.
pub(crate) fn fit_size(w: f32, h: f32, max_w: f32, max_h: f32) -> (f32, f32) {
    let (w, h) = (w.max(1.0), h.max(1.0));
    let scale = (max_w.max(1.0) / w).min(max_h.max(1.0) / h).min(1.0);
    (w * scale, h * scale)
}

fn declared_size(anchor: &FloatingAnchor, pixels: Option<(u32, u32)>) -> (f32, f32) {
    let (w, h) = (hwp_to_pt(anchor.width), hwp_to_pt(anchor.height));
    match pixels {
        Some((pw, ph)) if w <= 0.0 || h <= 0.0 => {
            let (pw, ph) = (pw as f32 * PX_TO_PT, ph as f32 * PX_TO_PT);
            if w > 0.0 && pw > 0.0 {
                (w, w * ph / pw)
            } else if h > 0.0 && ph > 0.0 {
                (h * pw / ph, h)
            } else {
                (pw, ph)
            }
        }
        _ => (w, h),
    }
}

fn aligned_x(align: Alignment, avail: f32, w: f32) -> f32 {
    match align {
        Alignment::Center => ((avail - w) / 2.0).max(0.0),
        Alignment::Right => (avail - w).max(0.0),
        _ => 0.0,
    }
}

fn is_floating(anchor: &FloatingAnchor) -> bool {
    !anchor.inline
}

impl<'d> Engine<'d, '_> {
    pub(crate) fn span_for(&self, style: &ResolvedCharStyle) -> SpanStyle {
        let font = self.fonts.id(FontKey {
            class: style.class,
            bold: style.bold,
        });
        let metrics = self.canvas.font_metrics(font);
        SpanStyle {
            font,
            size: style.size,
            color: style.color,
            highlight: style.highlight,
            underline: style.underline,
            strikeout: style.strikeout,
            spacing: style.spacing,
            rise: 0.0,
            ascent_ratio: metrics.ascender_ratio,
            em_ratio: metrics.em_ratio,
        }
    }

    fn marker_span(&self, style: &ResolvedCharStyle) -> SpanStyle {
        let mut span = self.span_for(style);
        span.rise = span.size * MARKER_RISE;
        span.size *= MARKER_SCALE;
        span.underline = false;
        span.strikeout = false;
        span.highlight = None;
        span
    }

    /// Break a paragraph into measured items for a box `width` points wide.
    pub(crate) fn layout_paragraph(&mut self, para: &'d Paragraph, width: f32, ctx: &ParaCtx) -> ParaLayout<'d> {
        let doc = self.doc;
        let refs = &doc.refs;
        let style: ResolvedParaStyle = paragraph_style(refs, para);
        let base_style = paragraph_char_style(refs, para);
        let fallback = self.span_for(&base_style);

        let prefix = ctx.lead.clone().or_else(|| {
            style
                .heading
                .and_then(|h| self.numbering.next_prefix(refs, h, ctx.outline))
        });

        let mut pieces: Vec<TextPiece> = Vec::new();
        let mut seq: Vec<Seq<'d>> = Vec::new();
        let mut current = TextPiece {
            text: StyledText::default(),
            notes: Vec::new(),
        };
        let mut prefix_len = 0;
        let mut prefix_width = 0.0;
        if let Some(prefix) = &prefix {
            let span = current.text.push_span(fallback.clone());
            current.text.push_str(prefix, span, &*self.canvas, style.condense);
            prefix_len = current.text.len();
            prefix_width = current.text.width(0, prefix_len);
        }

        for run in &para.runs {
            let cs = run_style(refs, para, run);
            for child in &run.children {
                match child {
                    RunChild::Text(t) => {
                        let span = current.text.push_span(self.span_for(&cs));
                        current.text.push_str(t, span, &*self.canvas, style.condense);
                    }
                    RunChild::Control(Control::Footnote(note)) if ctx.notes => {
                        self.footnote_seq += 1;
                        let number = self.footnote_seq;
                        let span = current.text.push_span(self.marker_span(&cs));
                        current.text.push_str(&format!("{number})"), span, &*self.canvas, 0.0);
                        let font = self.fonts.note_font();
                        let block = footnote_block(&*self.canvas, font, number, note, ctx.note_width);
                        log::debug!("Footnote {number}: {} lines", block.lines.len());
                        current.notes.push((current.text.len().saturating_sub(1), block));
                    }
                    RunChild::Control(Control::Endnote(note)) if ctx.notes => {
                        self.endnotes.push(note);
                        let number = self.endnotes.len();
                        let span = current.text.push_span(self.marker_span(&cs));
                        current.text.push_str(&format!("{number})"), span, &*self.canvas, 0.0);
                    }
                    RunChild::Control(Control::Footnote(_) | Control::Endnote(_)) => {}
                    RunChild::Control(Control::PageNumber) => {
                        let span = current.text.push_span(self.span_for(&cs));
                        current
                            .text
                            .push_str(&ctx.page_number.to_string(), span, &*self.canvas, style.condense);
                    }
                    RunChild::Control(Control::Header(def)) => seq.push(Seq::Register(true, def)),
                    RunChild::Control(Control::Footer(def)) => seq.push(Seq::Register(false, def)),
                    RunChild::Table(_) | RunChild::Picture(_) | RunChild::Shape(_) | RunChild::ColumnDef(_) => {
                        flush(&mut current, &mut pieces, &mut seq);
                        seq.push(Seq::Object(child));
                    }
                }
            }
        }
        let has_objects = seq.iter().any(|s| matches!(s, Seq::Object(_)));
        if !current.text.is_empty() || !current.notes.is_empty() || (pieces.is_empty() && !has_objects) {
            seq.push(Seq::Text(pieces.len()));
            pieces.push(current);
        }

        let empty = !has_objects && pieces.iter().all(|p| !p.text.has_ink() && p.notes.is_empty());
        let avail = (width - style.margin_left - style.margin_right).max(1.0);
        let use_hints = para.line_segs.len() > 1 && pieces.len() == 1 && !has_objects;

        let mut items: Vec<Item<'d>> = Vec::new();
        let mut first_text = true;
        for entry in &seq {
            match *entry {
                Seq::Text(index) => {
                    let piece = &mut pieces[index];
                    if use_hints {
                        self.hinted_items(piece, index, para, &style, &fallback, width, prefix_len, &mut items);
                    } else {
                        let (first_off, cont_off) = if first_text {
                            let hang = (-style.indent).max(0.0).max(prefix_width);
                            (style.indent.max(0.0), hang)
                        } else {
                            (0.0, 0.0)
                        };
                        self.live_items(
                            piece,
                            index,
                            &style,
                            &fallback,
                            (avail, first_off, cont_off),
                            if empty { ctx.empty_ratio } else { 1.0 },
                            &mut items,
                        );
                    }
                    first_text = false;
                }
                Seq::Object(child) => self.object_item(child, &style, avail, ctx, &mut items),
                Seq::Register(header, def) => items.push(Item {
                    height: 0.0,
                    kind: ItemKind::HeaderFooter { header, def },
                }),
            }
        }

        ParaLayout {
            texts: pieces.into_iter().map(|p| p.text).collect(),
            items,
            margin_left: style.margin_left,
            margin_top: style.margin_top,
            margin_bottom: style.margin_bottom,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn live_items(
        &self,
        piece: &mut TextPiece,
        index: usize,
        style: &ResolvedParaStyle,
        fallback: &SpanStyle,
        (avail, first_off, cont_off): (f32, f32, f32),
        height_ratio: f32,
        items: &mut Vec<Item<'d>>,
    ) {
        let text = &piece.text;
        let first_w = (avail - first_off).max(1.0);
        let cont_w = (avail - cont_off).max(1.0);
        let lines = break_lines(&text.chars, &text.advance, first_w, cont_w, self.kinsoku);
        let count = lines.len();
        for (i, line) in lines.iter().enumerate() {
            let upto = lines.get(i + 1).map_or(text.len(), |l| l.start);
            let notes = take_notes(&mut piece.notes, upto, i + 1 == count);
            let LineBox { height, ascent } = text.line_box(line.start, line.end, style.line_spacing, fallback);
            let (x, w) = if i == 0 {
                (style.margin_left + first_off, first_w)
            } else {
                (style.margin_left + cont_off, cont_w)
            };
            items.push(Item {
                height: height * height_ratio,
                kind: ItemKind::Line {
                    text: index,
                    range: *line,
                    x,
                    width: w,
                    ascent,
                    align: style.align,
                    stretch: !line.ends_block || style.align == Alignment::Distribute,
                    notes,
                    source_break: false,
                },
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn hinted_items(
        &self,
        piece: &mut TextPiece,
        index: usize,
        para: &Paragraph,
        style: &ResolvedParaStyle,
        fallback: &SpanStyle,
        width: f32,
        prefix_len: usize,
        items: &mut Vec<Item<'d>>,
    ) {
        let text = &piece.text;
        let ranges = hinted_ranges(&para.line_segs, text.len(), prefix_len);
        let count = ranges.len();
        for (i, (seg, range)) in para.line_segs.iter().zip(ranges).enumerate() {
            let upto = if i + 1 < count { range.end } else { text.len() };
            let notes = take_notes(&mut piece.notes, upto, i + 1 == count);
            let mut range = range;
            while range.end > range.start && text.chars[range.end - 1].is_whitespace() {
                range.end -= 1;
            }
            let computed = text.line_box(range.start, range.end, style.line_spacing, fallback);
            let pitch = hwp_to_pt(seg.vert_size + seg.spacing);
            let x = hwp_to_pt(seg.horz_pos);
            let w = if seg.horz_size > 0 {
                hwp_to_pt(seg.horz_size)
            } else {
                (width - x).max(1.0)
            };
            items.push(Item {
                height: if pitch > 0.0 { pitch } else { computed.height },
                kind: ItemKind::Line {
                    text: index,
                    range,
                    x,
                    width: w,
                    ascent: if seg.baseline > 0 {
                        hwp_to_pt(seg.baseline)
                    } else {
                        computed.ascent
                    },
                    align: style.align,
                    stretch: i + 1 < count || style.align == Alignment::Distribute,
                    notes,
                    source_break: i > 0 && seg.vert_pos < para.line_segs[i - 1].vert_pos,
                },
            });
        }
    }

    fn picture_size(&self, picture: &Picture) -> Option<(EmbeddedImage, f32, f32)> {
        let Some(image) = self.images.lookup(&picture.bin_ref) else {
            log::warn!("Picture references missing or unsupported image {:?}", picture.bin_ref);
            return None;
        };
        let (w, h) = declared_size(&picture.anchor, Some((image.pixel_width, image.pixel_height)));
        Some((image, w, h))
    }

    fn object_item(
        &mut self,
        child: &'d RunChild,
        style: &ResolvedParaStyle,
        avail: f32,
        ctx: &ParaCtx,
        items: &mut Vec<Item<'d>>,
    ) {
        match child {
            RunChild::Table(table) => {
                let geometry = self.table_geometry(table, avail, ctx);
                if is_floating(&table.anchor) && !ctx.floats_inline {
                    items.push(Item {
                        height: 0.0,
                        kind: ItemKind::Float(Floating::Table(table, geometry)),
                    });
                } else {
                    let x = style.margin_left + aligned_x(style.align, avail, geometry.width());
                    items.push(Item {
                        height: geometry.height(),
                        kind: ItemKind::Table { geometry, x },
                    });
                }
            }
            RunChild::Picture(picture) => {
                let Some((image, w, h)) = self.picture_size(picture) else {
                    return;
                };
                if is_floating(&picture.anchor) && !ctx.floats_inline {
                    let (w, h) = fit_size(w, h, f32::MAX, ctx.max_height);
                    items.push(Item {
                        height: 0.0,
                        kind: ItemKind::Float(Floating::Picture(image, &picture.anchor, w, h)),
                    });
                } else {
                    let (w, h) = fit_size(w, h, avail, ctx.max_height);
                    items.push(Item {
                        height: h,
                        kind: ItemKind::Image {
                            image: image.id,
                            x: style.margin_left + aligned_x(style.align, avail, w),
                            width: w,
                        },
                    });
                }
            }
            RunChild::Shape(shape) => {
                let (w, h) = declared_size(&shape.anchor, None);
                if is_floating(&shape.anchor) && !ctx.floats_inline {
                    items.push(Item {
                        height: 0.0,
                        kind: ItemKind::Float(Floating::Shape(shape, w.max(0.0), h.max(0.0))),
                    });
                } else {
                    let (w, h) = fit_size(w, h, avail, ctx.max_height);
                    items.push(Item {
                        height: h,
                        kind: ItemKind::Shape {
                            shape,
                            x: style.margin_left + aligned_x(style.align, avail, w),
                            width: w,
                        },
                    });
                }
            }
            RunChild::ColumnDef(def) => items.push(Item {
                height: 0.0,
                kind: ItemKind::ColumnDef(def),
            }),
            RunChild::Text(_) | RunChild::Control(_) => {}
        }
    }

    /// Lay out paragraphs stacked in a fixed-width box (cells, header bands).
    pub(crate) fn layout_block(&mut self, paras: &'d [Paragraph], width: f32, ctx: &ParaCtx) -> Block<'d> {
        let paras: Vec<ParaLayout<'d>> = paras
            .iter()
            .map(|p| self.layout_paragraph(p, width, ctx))
            .collect();
        let height = paras.iter().map(|p| p.height()).sum();
        Block { paras, height }
    }

    /// Draw a laid-out block with its top-left corner at (x, top).
    pub(crate) fn draw_block(&mut self, page: PageId, block: &Block<'d>, x: f32, top: f32) {
        let mut y = top;
        for para in &block.paras {
            y -= para.margin_top;
            for item in &para.items {
                self.draw_item(page, &para.texts, item, x, y);
                y -= item.height;
            }
            y -= para.margin_bottom;
        }
    }

    /// Draw one item whose box starts at `top`; `left` is the x of the enclosing box.
    pub(crate) fn draw_item(&mut self, page: PageId, texts: &[StyledText], item: &Item<'d>, left: f32, top: f32) {
        match &item.kind {
            ItemKind::Line {
                text,
                range,
                x,
                width,
                ascent,
                align,
                stretch,
                notes,
                ..
            } => {
                let placement = LinePlacement {
                    x: left + x,
                    width: *width,
                    baseline: top - ascent,
                    align: *align,
                    stretch: *stretch,
                };
                draw_line(&mut *self.canvas, page, &texts[*text], *range, &placement);
                if !notes.is_empty()
                    && let Some(state) = self.pages.get_mut(page)
                {
                    state.footnotes.extend(notes.iter().cloned());
                }
            }
            ItemKind::Table { geometry, x } => self.draw_table(page, geometry, left + x, top),
            ItemKind::Image { image, x, width } => {
                self.canvas
                    .draw_image(page, *image, left + x, top - item.height, *width, item.height);
            }
            ItemKind::Shape { shape, x, width } => {
                draw_shape(&mut *self.canvas, page, shape, left + x, top - item.height, *width, item.height);
            }
            ItemKind::Float(_) | ItemKind::ColumnDef(_) | ItemKind::HeaderFooter { .. } => {}
        }
    }
}

/// Remove and return the notes whose markers fall before `upto`.
fn take_notes(notes: &mut Vec<(usize, FootnoteBlock)>, upto: usize, last: bool) -> Vec<FootnoteBlock> {
    let mut taken = Vec::new();
    let mut i = 0;
    while i < notes.len() {
        if last || notes[i].0 < upto {
            taken.push(notes.remove(i).1);
        } else {
            i += 1;
        }
    }
    taken
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hinted_ranges_follow_text_positions() {
        let segs = [
            LineSeg {
                text_pos: 0,
                ..LineSeg::default()
            },
            LineSeg {
                text_pos: 5,
                ..LineSeg::default()
            },
            LineSeg {
                text_pos: 3,
                ..LineSeg::default()
            },
        ];
        let ranges = hinted_ranges(&segs, 10, 2);
        let spans: Vec<(usize, usize)> = ranges.iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(spans, vec![(0, 7), (7, 7), (7, 10)]);
        assert!(ranges[2].ends_block);
    }

    #[test]
    fn sizes_fit_inside_limits() {
        assert_eq!(fit_size(200.0, 100.0, 100.0, 500.0), (100.0, 50.0));
        assert_eq!(fit_size(50.0, 20.0, 100.0, 500.0), (50.0, 20.0));
        assert_eq!(fit_size(0.0, 0.0, 100.0, 100.0), (1.0, 1.0));
    }

    #[test]
    fn pixel_sizes_keep_aspect() {
        let anchor = FloatingAnchor {
            width: 7200,
            ..FloatingAnchor::default()
        };
        assert_eq!(declared_size(&anchor, Some((200, 100))), (72.0, 36.0));
        let no_size = FloatingAnchor::default();
        assert_eq!(declared_size(&no_size, Some((100, 40))), (75.0, 30.0));
    }

    #[test]
    fn notes_attach_to_their_line() {
        let block = |n| FootnoteBlock {
            number: n,
            lines: vec![String::new()],
            height: 1.0,
        };
        let mut notes = vec![(2, block(1)), (9, block(2))];
        assert_eq!(take_notes(&mut notes, 5, false).len(), 1);
        assert_eq!(notes.len(), 1);
        assert_eq!(take_notes(&mut notes, 5, true)[0].number, 2);
    }
}
