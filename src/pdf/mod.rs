//! Layout engine: font and image pre-passes, the body flow over pages and
//! columns, and the finishing passes for headers, footers, page numbers and
//! footnotes.

mod canvas;
mod float;
mod layout;
mod paragraph;
mod table;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::codec::{self, RasterFormat};
use crate::error::Error;
use crate::fonts::{
    BuiltinFace, FontClass, FontKey, FontLocator, NoSystemFonts, SystemFontLocator, resolve_program,
};
use crate::model::{
    ColumnLayout, Control, Document, HeaderFooter, LineKind, LineStyle, Note, PageNumberPosition,
    PageParity, Paragraph, RunChild, SectionLayout, hwp_to_pt,
};
use crate::numbering::{NumberingState, format_numeral, prefix_repertoire};
use crate::style::{paragraph_char_style, run_style};

pub use canvas::{Canvas, Dash, EmbeddedImage, FontId, ImageId, PageId, PdfCanvas, Stroke, TextPaint};
pub use float::signed_offset;
pub use layout::wrap_text;
pub use table::infer_column_widths;

use float::{AnchorFrame, FOOTNOTE_BAND, FootnoteBlock, draw_footnotes, draw_shape, place_float};
use paragraph::{Floating, ItemKind, ParaCtx};

/// Size of page numbers drawn from a section's page-number descriptor.
const PAGE_NUMBER_SIZE: f32 = 10.0;
/// Page numbers whose glyphs are subset into the note font up front.
const PAGE_NUMBER_REPERTOIRE: u32 = 999;
const EPSILON: f32 = 0.01;
/// A4 in points, for sections without a usable page size.
const DEFAULT_PAGE: (f32, f32) = (595.28, 841.86);

/// Caller-tunable generation options.
#[derive(Clone, Debug)]
pub struct GenerateOptions {
    /// Font file used for serif text; skips the system search for that class.
    pub serif_font: Option<PathBuf>,
    pub sans_font: Option<PathBuf>,
    /// Extra directories searched before the system font locations.
    pub font_dirs: Vec<PathBuf>,
    /// Apply CJK line-start/line-end prohibitions when wrapping.
    pub kinsoku: bool,
    pub use_system_fonts: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            serif_font: None,
            sans_font: None,
            font_dirs: Vec::new(),
            kinsoku: false,
            use_system_fonts: true,
        }
    }
}

/// Where content landed on one output page, in points.
#[derive(Clone, Debug, PartialEq)]
pub struct PageSummary {
    pub section: usize,
    pub number: u32,
    pub width: f32,
    pub height: f32,
    pub body_top: f32,
    /// Bottom of the body area, not counting footnote space.
    pub body_floor: f32,
    /// Lowest y reached by flowing body content.
    pub lowest_content_y: f32,
    /// Height reserved above `body_floor` for footnotes.
    pub footnote_reserve: f32,
    /// Footnote numbers rendered on this page, in order.
    pub footnotes: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderSummary {
    pub pages: Vec<PageSummary>,
}

/// Convert a document model to PDF bytes.
pub fn generate(doc: &Document, options: &GenerateOptions) -> Result<Vec<u8>, Error> {
    let mut canvas = PdfCanvas::new();
    let locator: Box<dyn FontLocator> = if options.use_system_fonts {
        Box::new(SystemFontLocator::new(&options.font_dirs))
    } else {
        Box::new(NoSystemFonts)
    };
    let summary = render_into(doc, &mut canvas, options, locator.as_ref())?;
    let t0 = Instant::now();
    let bytes = canvas.finish();
    log::info!(
        "PDF assembly: {} pages, {} bytes in {:.1}ms",
        summary.pages.len(),
        bytes.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(bytes)
}

/// Lay a document out onto any canvas, resolving fonts through `locator`.
pub fn render_into(
    doc: &Document,
    canvas: &mut dyn Canvas,
    options: &GenerateOptions,
    locator: &dyn FontLocator,
) -> Result<RenderSummary, Error> {
    if doc.sections.is_empty() {
        return Err(Error::EmptyDocument);
    }
    let t0 = Instant::now();

    let fonts = embed_fonts(doc, canvas, options, locator);
    let t_fonts = t0.elapsed();

    let images = embed_images(doc, canvas);
    let t_images = t0.elapsed();

    let mut engine = Engine {
        doc,
        canvas,
        fonts,
        images,
        numbering: NumberingState::new(),
        kinsoku: options.kinsoku,
        pages: Vec::new(),
        footnote_seq: 0,
        endnotes: Vec::new(),
        registrations: Vec::new(),
        next_number: doc.begin_page,
    };
    engine.flow_document();
    let t_layout = t0.elapsed();

    engine.finish_pages();
    let t_finish = t0.elapsed();

    log::info!(
        "Render phases: fonts={:.1}ms, images={:.1}ms, layout={:.1}ms, finish={:.1}ms ({} pages)",
        t_fonts.as_secs_f64() * 1000.0,
        (t_images - t_fonts).as_secs_f64() * 1000.0,
        (t_layout - t_images).as_secs_f64() * 1000.0,
        (t_finish - t_layout).as_secs_f64() * 1000.0,
        engine.pages.len(),
    );
    Ok(engine.summary())
}

pub(crate) fn stroke_for(style: &LineStyle) -> Option<Stroke> {
    let dash = match style.kind {
        LineKind::None => return None,
        LineKind::Solid | LineKind::Double => Dash::Solid,
        LineKind::Dash => Dash::Dashed,
        LineKind::Dot => Dash::Dotted,
    };
    Some(Stroke {
        width: hwp_to_pt(style.width).max(0.1),
        color: style.color,
        dash,
    })
}

// ---- pre-passes ----

/// Fonts registered on the canvas, one per class/weight.
pub(crate) struct FontSet {
    ids: BTreeMap<FontKey, FontId>,
    note: FontId,
}

impl FontSet {
    pub fn id(&self, key: FontKey) -> FontId {
        self.ids.get(&key).copied().unwrap_or(self.note)
    }

    /// Serif regular, used for footnotes and page numbers.
    pub fn note_font(&self) -> FontId {
        self.note
    }
}

const NOTE_KEY: FontKey = FontKey {
    class: FontClass::Serif,
    bold: false,
};

fn collect_chars(doc: &Document, paras: &[Paragraph], used: &mut BTreeMap<FontKey, BTreeSet<char>>) {
    let refs = &doc.refs;
    for para in paras {
        let base = paragraph_char_style(refs, para);
        used.entry(FontKey {
            class: base.class,
            bold: base.bold,
        })
        .or_default();
        for run in &para.runs {
            let style = run_style(refs, para, run);
            let key = FontKey {
                class: style.class,
                bold: style.bold,
            };
            for child in &run.children {
                match child {
                    RunChild::Text(t) => used.entry(key).or_default().extend(t.chars()),
                    RunChild::Table(table) => {
                        for cell in &table.cells {
                            collect_chars(doc, &cell.paragraphs, used);
                        }
                    }
                    RunChild::Control(Control::Footnote(note) | Control::Endnote(note)) => {
                        used.entry(key).or_default();
                        collect_chars(doc, &note.paragraphs, used);
                        let text: String = note.paragraphs.iter().map(|p| p.plain_text()).collect();
                        used.entry(NOTE_KEY).or_default().extend(text.chars());
                    }
                    RunChild::Control(Control::Header(hf) | Control::Footer(hf)) => {
                        collect_chars(doc, &hf.paragraphs, used);
                    }
                    RunChild::Control(Control::PageNumber) => {
                        used.entry(key).or_default();
                    }
                    RunChild::Picture(_) | RunChild::Shape(_) | RunChild::ColumnDef(_) => {}
                }
            }
        }
    }
}

fn embed_fonts(
    doc: &Document,
    canvas: &mut dyn Canvas,
    options: &GenerateOptions,
    locator: &dyn FontLocator,
) -> FontSet {
    let mut used: BTreeMap<FontKey, BTreeSet<char>> = BTreeMap::new();
    used.entry(NOTE_KEY).or_default();
    for section in &doc.sections {
        collect_chars(doc, &section.paragraphs, &mut used);
        if let Some(numbering) = &section.layout.page_numbering {
            let chars = used.entry(NOTE_KEY).or_default();
            chars.extend(numbering.side_char);
            for n in 1..=PAGE_NUMBER_REPERTOIRE {
                chars.extend(format_numeral(n, numbering.format).chars());
            }
        }
    }
    let shared: BTreeSet<char> = prefix_repertoire(&doc.refs)
        .into_iter()
        .chain("0123456789) ".chars())
        .collect();
    for chars in used.values_mut() {
        chars.extend(shared.iter().copied());
    }

    let mut ids = BTreeMap::new();
    for (key, chars) in &used {
        let override_path: Option<&Path> = match key.class {
            FontClass::Serif => options.serif_font.as_deref(),
            FontClass::Sans => options.sans_font.as_deref(),
        };
        let fallback = BuiltinFace::for_key(*key);
        let program = resolve_program(*key, override_path, locator);
        match &program {
            Some(p) => log::debug!("Font {key:?}: {} ({} chars)", p.name, chars.len()),
            None => log::warn!("No font program found for {key:?}; using {}", fallback.base_font()),
        }
        let id = canvas.embed_font(program.as_ref(), fallback, chars);
        ids.insert(*key, id);
    }
    let note = ids.get(&NOTE_KEY).copied().unwrap_or(FontId(0));
    FontSet { ids, note }
}

/// Embedded binary items and how pictures find them.
pub(crate) struct ImageSet {
    entries: Vec<(String, String, EmbeddedImage)>,
}

impl ImageSet {
    /// Resolve a picture reference by manifest id, then file stem, then path substring.
    pub fn lookup(&self, reference: &str) -> Option<EmbeddedImage> {
        if reference.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(key, _, _)| key == reference)
            .or_else(|| {
                self.entries.iter().find(|(_, path, _)| {
                    Path::new(path).file_stem().and_then(|s| s.to_str()) == Some(reference)
                })
            })
            .or_else(|| self.entries.iter().find(|(_, path, _)| path.contains(reference)))
            .map(|(_, _, image)| *image)
    }
}

fn embed_images(doc: &Document, canvas: &mut dyn Canvas) -> ImageSet {
    let mut entries = Vec::new();
    for item in &doc.images {
        let mut format = RasterFormat::detect(&item.data);
        if format == RasterFormat::Unknown {
            format = RasterFormat::from_extension(&item.path);
        }
        let embedded = match format {
            RasterFormat::Png | RasterFormat::Jpeg => canvas.embed_image(&item.data, format),
            RasterFormat::Bmp | RasterFormat::Gif => match codec::to_png(&item.data) {
                Ok(png) => canvas.embed_image(&png, RasterFormat::Png),
                Err(e) => {
                    log::warn!("Skipping image {}: {e}", item.path);
                    continue;
                }
            },
            other => {
                log::warn!("Skipping image {}: unsupported format {other:?}", item.path);
                continue;
            }
        };
        match embedded {
            Some(image) => {
                log::debug!(
                    "Image {} ({:?}, {}x{})",
                    item.key,
                    format,
                    image.pixel_width,
                    image.pixel_height
                );
                entries.push((item.key.clone(), item.path.clone(), image));
            }
            None => log::warn!("Skipping image {}: could not decode {format:?} data", item.path),
        }
    }
    ImageSet { entries }
}

// ---- page geometry and flow state ----

#[derive(Clone, Copy, Debug)]
struct PageGeometry {
    width: f32,
    height: f32,
    left: f32,
    body_width: f32,
    body_top: f32,
    body_bottom: f32,
    header_top: f32,
    header_height: f32,
    footer_top: f32,
    footer_height: f32,
    margin_top: f32,
    margin_bottom: f32,
}

impl PageGeometry {
    fn new(layout: &SectionLayout) -> Self {
        let (mut width, mut height) = (hwp_to_pt(layout.page_width), hwp_to_pt(layout.page_height));
        if width <= 0.0 || height <= 0.0 {
            (width, height) = if layout.landscape {
                (DEFAULT_PAGE.1, DEFAULT_PAGE.0)
            } else {
                DEFAULT_PAGE
            };
        }
        let margin_top = hwp_to_pt(layout.margin_top).max(0.0);
        let margin_bottom = hwp_to_pt(layout.margin_bottom).max(0.0);
        let header_height = hwp_to_pt(layout.header).max(0.0);
        let footer_height = hwp_to_pt(layout.footer).max(0.0);
        let left = hwp_to_pt(layout.margin_left + layout.gutter).max(0.0);
        let body_width = (width - left - hwp_to_pt(layout.margin_right)).max(1.0);
        let mut body_top = height - margin_top - header_height;
        let mut body_bottom = margin_bottom + footer_height;
        if body_top - body_bottom < 1.0 {
            log::warn!("Section margins leave no body area; using the full page");
            body_top = height;
            body_bottom = 0.0;
        }
        PageGeometry {
            width,
            height,
            left,
            body_width,
            body_top,
            body_bottom,
            header_top: height - margin_top,
            header_height,
            footer_top: margin_bottom + footer_height,
            footer_height,
            margin_top,
            margin_bottom,
        }
    }
}

struct PageState {
    section: usize,
    number: u32,
    geometry: PageGeometry,
    footnote_reserve: f32,
    lowest: f32,
    footnotes: Vec<FootnoteBlock>,
}

/// Cursor state while flowing one section's body.
pub(crate) struct Flow {
    section: usize,
    geometry: PageGeometry,
    page: PageId,
    columns: Vec<(f32, f32)>,
    separator: Option<LineStyle>,
    col: usize,
    region_top: f32,
    region_lowest: f32,
    cursor: f32,
}

impl Flow {
    fn column_x(&self) -> f32 {
        self.columns[self.col].0
    }

    fn column_width(&self) -> f32 {
        self.columns[self.col].1
    }

    fn at_region_top(&self) -> bool {
        self.cursor >= self.region_top - EPSILON
    }

    fn at_page_top(&self) -> bool {
        self.cursor >= self.geometry.body_top - EPSILON
    }
}

fn column_boxes(def: Option<&ColumnLayout>, left: f32, body_width: f32) -> Vec<(f32, f32)> {
    let Some(def) = def.filter(|d| d.count > 1) else {
        return vec![(left, body_width)];
    };
    let n = def.count as usize;
    if def.sizes.len() == n {
        let mut x = left;
        def.sizes
            .iter()
            .map(|size| {
                let w = hwp_to_pt(size.width).max(1.0);
                let column = (x, w);
                x += w + hwp_to_pt(size.gap).max(0.0);
                column
            })
            .collect()
    } else {
        let gap = hwp_to_pt(def.gap).max(0.0);
        let w = ((body_width - gap * (n - 1) as f32) / n as f32).max(1.0);
        (0..n).map(|i| (left + i as f32 * (w + gap), w)).collect()
    }
}

struct Registration<'d> {
    section: usize,
    from_page: PageId,
    header: bool,
    def: &'d HeaderFooter,
}

fn parity_matches(parity: PageParity, number: u32) -> bool {
    match parity {
        PageParity::Both => true,
        PageParity::Odd => number % 2 == 1,
        PageParity::Even => number % 2 == 0,
    }
}

fn page_number_text(number: u32, format: crate::model::NumeralFormat, side: Option<char>) -> String {
    let n = format_numeral(number, format);
    match side {
        Some(c) => format!("{c} {n} {c}"),
        None => n,
    }
}

pub(crate) struct Engine<'d, 'c> {
    doc: &'d Document,
    canvas: &'c mut dyn Canvas,
    fonts: FontSet,
    images: ImageSet,
    numbering: NumberingState,
    kinsoku: bool,
    pages: Vec<PageState>,
    footnote_seq: u32,
    endnotes: Vec<&'d Note>,
    registrations: Vec<Registration<'d>>,
    next_number: u32,
}

impl<'d> Engine<'d, '_> {
    fn start_page(&mut self, flow: &mut Flow) {
        let g = flow.geometry;
        let page = self.canvas.create_page(g.width, g.height);
        log::debug!("Page {} (section {}, number {})", page + 1, flow.section, self.next_number);
        self.pages.push(PageState {
            section: flow.section,
            number: self.next_number,
            geometry: g,
            footnote_reserve: 0.0,
            lowest: g.body_top,
            footnotes: Vec::new(),
        });
        self.next_number += 1;
        flow.page = page;
        flow.col = 0;
        flow.region_top = g.body_top;
        flow.region_lowest = g.body_top;
        flow.cursor = g.body_top;
    }

    /// Draw column separators for the region that is being closed.
    fn finish_region(&mut self, flow: &Flow) {
        let Some(stroke) = flow.separator.as_ref().and_then(stroke_for) else {
            return;
        };
        if flow.columns.len() < 2 || flow.region_lowest >= flow.region_top - EPSILON {
            return;
        }
        for pair in flow.columns.windows(2) {
            let x = (pair[0].0 + pair[0].1 + pair[1].0) / 2.0;
            self.canvas
                .draw_line(flow.page, x, flow.region_top, x, flow.region_lowest, &stroke);
        }
    }

    fn new_page(&mut self, flow: &mut Flow) {
        self.finish_region(flow);
        self.start_page(flow);
    }

    fn next_column_or_page(&mut self, flow: &mut Flow) {
        if flow.col + 1 < flow.columns.len() {
            flow.col += 1;
            flow.cursor = flow.region_top;
            log::debug!("Column {} on page {}", flow.col + 1, flow.page + 1);
        } else {
            self.new_page(flow);
        }
    }

    /// Start a new column region below everything placed so far.
    fn set_columns(&mut self, flow: &mut Flow, def: Option<&ColumnLayout>) {
        self.finish_region(flow);
        let g = flow.geometry;
        flow.columns = column_boxes(def, g.left, g.body_width);
        flow.separator = def.and_then(|d| d.separator);
        flow.col = 0;
        flow.region_top = flow.region_lowest.min(flow.cursor);
        flow.region_lowest = flow.region_top;
        flow.cursor = flow.region_top;
    }

    /// Claim `needed` points of the current column, moving on when they do not
    /// fit above the footnote area. `notes` is footnote height that must fit on
    /// the same page; the raised floor must also clear content already placed
    /// in other columns. Returns the top of the claimed space.
    pub(crate) fn advance(&mut self, flow: &mut Flow, needed: f32, notes: f32) -> f32 {
        let band = loop {
            let state = &self.pages[flow.page];
            let band = if notes > 0.0 && state.footnote_reserve <= 0.0 {
                FOOTNOTE_BAND
            } else {
                0.0
            };
            let floor = flow.geometry.body_bottom + state.footnote_reserve + notes + band;
            let fits = flow.cursor - needed >= floor - EPSILON;
            let clears_placed = notes <= 0.0 || state.lowest >= floor - EPSILON;
            let page_empty = state.lowest >= flow.geometry.body_top - EPSILON;
            if (fits && clears_placed) || (flow.at_page_top() && page_empty) {
                break band;
            }
            self.next_column_or_page(flow);
        };
        let top = flow.cursor;
        flow.cursor -= needed;
        flow.region_lowest = flow.region_lowest.min(flow.cursor);
        let state = &mut self.pages[flow.page];
        state.lowest = state.lowest.min(flow.cursor);
        if notes > 0.0 {
            state.footnote_reserve += notes + band;
            log::debug!(
                "Reserved {:.2}pt for footnotes on page {} (total {:.2})",
                notes + band,
                flow.page + 1,
                state.footnote_reserve
            );
        }
        top
    }

    /// Move the cursor down without ever leaving the column.
    fn skip(&mut self, flow: &mut Flow, amount: f32) {
        let floor = flow.geometry.body_bottom + self.pages[flow.page].footnote_reserve;
        flow.cursor -= amount.min(flow.cursor - floor).max(0.0);
    }

    fn body_ctx(&self, flow: &Flow, outline: Option<u32>) -> ParaCtx {
        ParaCtx {
            outline,
            page_number: self.pages[flow.page].number,
            notes: true,
            floats_inline: false,
            empty_ratio: 0.75,
            lead: None,
            note_width: flow.geometry.body_width,
            max_height: flow.geometry.body_top - flow.geometry.body_bottom,
        }
    }

    fn flow_document(&mut self) {
        let doc = self.doc;
        let mut last: Option<Flow> = None;
        for (index, section) in doc.sections.iter().enumerate() {
            if let Some(previous) = last.take() {
                self.finish_region(&previous);
            }
            let layout = &section.layout;
            if let Some(start) = layout.page_start.filter(|&n| n > 0) {
                self.next_number = start;
            }
            let geometry = PageGeometry::new(layout);
            let mut flow = Flow {
                section: index,
                geometry,
                page: 0,
                columns: column_boxes(layout.columns.as_ref(), geometry.left, geometry.body_width),
                separator: layout.columns.as_ref().and_then(|c| c.separator),
                col: 0,
                region_top: geometry.body_top,
                region_lowest: geometry.body_top,
                cursor: geometry.body_top,
            };
            self.start_page(&mut flow);
            for para in &section.paragraphs {
                let ctx = self.body_ctx(&flow, layout.outline_numbering);
                self.flow_paragraph(&mut flow, para, &ctx);
            }
            last = Some(flow);
        }
        if let Some(mut flow) = last {
            self.flow_endnotes(&mut flow);
            self.finish_region(&flow);
        }
    }

    fn flow_endnotes(&mut self, flow: &mut Flow) {
        let notes = std::mem::take(&mut self.endnotes);
        if notes.is_empty() {
            return;
        }
        let top = self.advance(flow, FOOTNOTE_BAND, 0.0);
        let y = top - FOOTNOTE_BAND / 2.0;
        let rule = Stroke {
            width: 0.5,
            color: [0, 0, 0],
            dash: Dash::Solid,
        };
        let x = flow.column_x();
        self.canvas
            .draw_line(flow.page, x, y, x + flow.column_width() / 3.0, y, &rule);
        for (i, note) in notes.iter().enumerate() {
            for (j, para) in note.paragraphs.iter().enumerate() {
                let mut ctx = self.body_ctx(flow, None);
                ctx.notes = false;
                ctx.lead = (j == 0).then(|| format!("{}) ", i + 1));
                self.flow_paragraph(flow, para, &ctx);
            }
        }
    }

    fn flow_paragraph(&mut self, flow: &mut Flow, para: &'d Paragraph, ctx: &ParaCtx) {
        if para.page_break && !flow.at_page_top() {
            self.new_page(flow);
        } else if para.column_break && !flow.at_region_top() {
            self.next_column_or_page(flow);
        }
        let layout = self.layout_paragraph(para, flow.column_width(), ctx);
        self.skip(flow, layout.margin_top);
        for item in &layout.items {
            match &item.kind {
                ItemKind::Line {
                    notes, source_break, ..
                } => {
                    if *source_break && !flow.at_region_top() {
                        self.next_column_or_page(flow);
                    }
                    let notes_h: f32 = notes.iter().map(|n| n.height).sum();
                    let top = self.advance(flow, item.height, notes_h);
                    self.draw_item(flow.page, &layout.texts, item, flow.column_x(), top);
                }
                ItemKind::Table { geometry, x } => self.flow_table(flow, geometry, *x),
                ItemKind::Image { .. } | ItemKind::Shape { .. } => {
                    let top = self.advance(flow, item.height, 0.0);
                    self.draw_item(flow.page, &layout.texts, item, flow.column_x(), top);
                }
                ItemKind::Float(floating) => self.place_floating(flow, floating, layout.margin_left),
                ItemKind::ColumnDef(def) => self.set_columns(flow, Some(*def)),
                ItemKind::HeaderFooter { header, def } => {
                    log::debug!(
                        "{} registered from page {}",
                        if *header { "Header" } else { "Footer" },
                        flow.page + 1
                    );
                    self.registrations.push(Registration {
                        section: flow.section,
                        from_page: flow.page,
                        header: *header,
                        def: *def,
                    });
                }
            }
        }
        self.skip(flow, layout.margin_bottom);
    }

    fn place_floating(&mut self, flow: &mut Flow, floating: &Floating<'d>, para_left: f32) {
        let (anchor, w, h) = match floating {
            Floating::Table(table, geometry) => (&table.anchor, geometry.width(), geometry.height()),
            Floating::Picture(_, anchor, w, h) => (*anchor, *w, *h),
            Floating::Shape(shape, w, h) => (&shape.anchor, *w, *h),
        };
        let flowing = anchor.vert_rel == crate::model::AnchorRelation::Paragraph;
        if let Floating::Table(_, geometry) = floating
            && !flowing
        {
            let notes = geometry.note_height();
            if notes > 0.0 {
                self.advance(flow, 0.0, notes);
            }
        }
        let g = flow.geometry;
        let mut frame = AnchorFrame {
            page_width: g.width,
            page_height: g.height,
            column_x: flow.column_x(),
            body_top: g.body_top,
            para_x: flow.column_x() + para_left,
            para_top: flow.cursor,
        };
        if flowing {
            let dy = hwp_to_pt(signed_offset(anchor.vert_offset));
            if let Floating::Table(_, geometry) = floating {
                if dy > 0.0 {
                    self.advance(flow, dy, 0.0);
                }
                frame.para_top = flow.cursor;
                let (x, _) = place_float(anchor, &frame, w, h);
                self.flow_table(flow, geometry, x - flow.column_x());
                return;
            }
            frame.para_top = self.advance(flow, h + dy.max(0.0), 0.0);
        }
        let (x, top) = place_float(anchor, &frame, w, h);
        log::debug!("Floating object at ({x:.2}, {top:.2}) size {w:.2}x{h:.2} on page {}", flow.page + 1);
        match floating {
            Floating::Table(_, geometry) => self.draw_table(flow.page, geometry, x, top),
            Floating::Picture(image, ..) => self.canvas.draw_image(flow.page, image.id, x, top - h, w, h),
            Floating::Shape(shape, ..) => draw_shape(&mut *self.canvas, flow.page, shape, x, top - h, w, h),
        }
    }

    // ---- finishing passes ----

    fn finish_pages(&mut self) {
        let doc = self.doc;
        for page in 0..self.pages.len() {
            let (section, number, g) = {
                let state = &self.pages[page];
                (state.section, state.number, state.geometry)
            };
            for header in [true, false] {
                let chosen = self
                    .registrations
                    .iter()
                    .rev()
                    .find(|r| {
                        r.section == section
                            && r.header == header
                            && r.from_page <= page
                            && parity_matches(r.def.applies_to, number)
                    })
                    .map(|r| r.def);
                if let Some(def) = chosen {
                    let ctx = ParaCtx {
                        outline: None,
                        page_number: number,
                        notes: false,
                        floats_inline: true,
                        empty_ratio: 1.0,
                        lead: None,
                        note_width: g.body_width,
                        max_height: g.height,
                    };
                    // Bands repeat on every page and must not advance body numbering.
                    let body_numbering = std::mem::replace(&mut self.numbering, NumberingState::new());
                    let block = self.layout_block(&def.paragraphs, g.body_width, &ctx);
                    self.numbering = body_numbering;
                    let top = if header { g.header_top } else { g.footer_top };
                    self.draw_block(page, &block, g.left, top);
                }
            }
            if let Some(numbering) = &doc.sections[section].layout.page_numbering {
                self.draw_page_number(page, number, &g, numbering);
            }
            let blocks = std::mem::take(&mut self.pages[page].footnotes);
            draw_footnotes(
                &mut *self.canvas,
                page,
                self.fonts.note_font(),
                &blocks,
                (g.left, g.body_width),
                g.body_bottom,
            );
            self.pages[page].footnotes = blocks;
        }
    }

    fn draw_page_number(
        &mut self,
        page: PageId,
        number: u32,
        g: &PageGeometry,
        numbering: &crate::model::PageNumbering,
    ) {
        let text = page_number_text(number, numbering.format, numbering.side_char);
        let font = self.fonts.note_font();
        let width = self.canvas.text_width(&text, font, PAGE_NUMBER_SIZE);
        use PageNumberPosition::*;
        let top_band = matches!(numbering.position, TopLeft | TopCenter | TopRight);
        let (mut band_bottom, mut band_height) = if top_band {
            (g.header_top - g.header_height, g.header_height)
        } else {
            (g.footer_top - g.footer_height, g.footer_height)
        };
        if band_height < PAGE_NUMBER_SIZE {
            (band_bottom, band_height) = if top_band {
                (g.height - g.margin_top, g.margin_top)
            } else {
                (0.0, g.margin_bottom)
            };
        }
        let x = match numbering.position {
            TopLeft | BottomLeft => g.left,
            TopCenter | BottomCenter => g.left + (g.body_width - width) / 2.0,
            TopRight | BottomRight => g.left + g.body_width - width,
        };
        let baseline = band_bottom + band_height / 2.0 - PAGE_NUMBER_SIZE * 0.3;
        let paint = TextPaint {
            color: [0, 0, 0],
            letter_spacing: 0.0,
        };
        self.canvas
            .draw_text(page, &text, x, baseline, font, PAGE_NUMBER_SIZE, &paint);
    }

    fn summary(&self) -> RenderSummary {
        RenderSummary {
            pages: self
                .pages
                .iter()
                .map(|p| PageSummary {
                    section: p.section,
                    number: p.number,
                    width: p.geometry.width,
                    height: p.geometry.height,
                    body_top: p.geometry.body_top,
                    body_floor: p.geometry.body_bottom,
                    lowest_content_y: p.lowest,
                    footnote_reserve: p.footnote_reserve,
                    footnotes: p.footnotes.iter().map(|b| b.number).collect(),
                })
                .collect(),
        }
    }
}
