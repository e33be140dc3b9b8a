#![allow(dead_code)]

use std::collections::BTreeSet;
use std::io::{Cursor, Write};

use hwpx_pdf::model::{Cell, Control, Note, Paragraph, Run, RunChild, Section, SectionLayout, Table};
use hwpx_pdf::{
    BuiltinFace, Canvas, Document, EmbeddedImage, FontId, FontMetrics, FontProgram,
    GenerateOptions, ImageId, NoSystemFonts, PageId, RasterFormat, RenderSummary, Stroke,
    TextPaint,
};
use zip::write::SimpleFileOptions;

pub const EPSILON: f32 = 0.01;

#[derive(Clone, Debug, PartialEq)]
pub struct DrawnText {
    pub page: PageId,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

/// Canvas that keeps every drawing call. Latin glyphs are half an em wide,
/// CJK glyphs a full em.
#[derive(Default)]
pub struct RecordingCanvas {
    pub pages: Vec<(f32, f32)>,
    pub texts: Vec<DrawnText>,
    /// (page, x1, y1, x2, y2)
    pub lines: Vec<(PageId, f32, f32, f32, f32)>,
    /// (page, x, y, w, h)
    pub rects: Vec<(PageId, f32, f32, f32, f32)>,
    /// (page, image, x, y, w, h)
    pub images: Vec<(PageId, ImageId, f32, f32, f32, f32)>,
    fonts: usize,
    embedded: usize,
}

impl RecordingCanvas {
    pub fn texts_on(&self, page: PageId) -> impl Iterator<Item = &DrawnText> {
        self.texts.iter().filter(move |t| t.page == page)
    }

    /// First drawn fragment equal to `text`.
    pub fn find(&self, text: &str) -> Option<&DrawnText> {
        self.texts.iter().find(|t| t.text == text)
    }
}

fn glyph_width(c: char, size: f32) -> f32 {
    if c as u32 >= 0x2E80 { size } else { size * 0.5 }
}

impl Canvas for RecordingCanvas {
    fn create_page(&mut self, width: f32, height: f32) -> PageId {
        self.pages.push((width, height));
        self.pages.len() - 1
    }

    fn embed_font(
        &mut self,
        _program: Option<&FontProgram>,
        _fallback: BuiltinFace,
        _used: &BTreeSet<char>,
    ) -> FontId {
        self.fonts += 1;
        FontId(self.fonts - 1)
    }

    fn embed_image(&mut self, data: &[u8], _format: RasterFormat) -> Option<EmbeddedImage> {
        let decoded = image::load_from_memory(data).ok()?;
        self.embedded += 1;
        Some(EmbeddedImage {
            id: ImageId(self.embedded - 1),
            pixel_width: decoded.width(),
            pixel_height: decoded.height(),
        })
    }

    fn text_width(&self, text: &str, _font: FontId, size: f32) -> f32 {
        text.chars().map(|c| glyph_width(c, size)).sum()
    }

    fn font_metrics(&self, _font: FontId) -> FontMetrics {
        FontMetrics::BUILTIN
    }

    fn draw_text(
        &mut self,
        page: PageId,
        text: &str,
        x: f32,
        y: f32,
        _font: FontId,
        size: f32,
        _paint: &TextPaint,
    ) {
        self.texts.push(DrawnText {
            page,
            text: text.to_string(),
            x,
            y,
            size,
        });
    }

    fn draw_line(&mut self, page: PageId, x1: f32, y1: f32, x2: f32, y2: f32, _stroke: &Stroke) {
        self.lines.push((page, x1, y1, x2, y2));
    }

    fn draw_rect(
        &mut self,
        page: PageId,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        _fill: Option<[u8; 3]>,
        _stroke: Option<&Stroke>,
    ) {
        self.rects.push((page, x, y, w, h));
    }

    fn draw_ellipse(
        &mut self,
        page: PageId,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        _fill: Option<[u8; 3]>,
        _stroke: Option<&Stroke>,
    ) {
        self.rects.push((page, x, y, w, h));
    }

    fn draw_image(&mut self, page: PageId, image: ImageId, x: f32, y: f32, w: f32, h: f32) {
        self.images.push((page, image, x, y, w, h));
    }
}

// ---- document builders ----

pub fn para(children: Vec<RunChild>) -> Paragraph {
    Paragraph {
        runs: vec![Run {
            char_pr: None,
            children,
        }],
        ..Paragraph::default()
    }
}

pub fn text_para(text: &str) -> Paragraph {
    para(vec![RunChild::Text(text.to_string())])
}

pub fn footnote(text: &str) -> RunChild {
    RunChild::Control(Control::Footnote(Note {
        paragraphs: vec![text_para(text)],
    }))
}

pub fn endnote(text: &str) -> RunChild {
    RunChild::Control(Control::Endnote(Note {
        paragraphs: vec![text_para(text)],
    }))
}

/// A table cell at (row, col) holding `paragraphs`; height 0 means content-sized.
pub fn cell(row: u16, col: u16, height: i32, paragraphs: Vec<Paragraph>) -> Cell {
    Cell {
        row,
        col,
        height,
        paragraphs,
        ..Cell::default()
    }
}

/// An inline table built from `cells`, sized from their addresses.
pub fn table(cells: Vec<Cell>) -> RunChild {
    let rows = cells.iter().map(|c| c.row + c.row_span).max().unwrap_or(0);
    let cols = cells.iter().map(|c| c.col + c.col_span).max().unwrap_or(0);
    RunChild::Table(Box::new(Table {
        rows,
        cols,
        cells,
        ..Table::default()
    }))
}

pub fn section(paragraphs: Vec<Paragraph>) -> Section {
    Section {
        layout: SectionLayout::default(),
        paragraphs,
    }
}

pub fn document(sections: Vec<Section>) -> Document {
    Document {
        sections,
        ..Document::default()
    }
}

/// Lay `doc` out with the standard faces only.
pub fn render(doc: &Document) -> (RenderSummary, RecordingCanvas) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut canvas = RecordingCanvas::default();
    let options = GenerateOptions {
        use_system_fonts: false,
        ..GenerateOptions::default()
    };
    let summary = hwpx_pdf::render_into(doc, &mut canvas, &options, &NoSystemFonts)
        .expect("render document");
    (summary, canvas)
}

/// Every page keeps its body content above the footnote area.
pub fn assert_no_overflow(summary: &RenderSummary) {
    for (i, page) in summary.pages.iter().enumerate() {
        assert!(
            page.lowest_content_y >= page.body_floor + page.footnote_reserve - EPSILON,
            "page {} overflows: lowest {:.2}, floor {:.2}, reserve {:.2}",
            i + 1,
            page.lowest_content_y,
            page.body_floor,
            page.footnote_reserve
        );
    }
}

// ---- HWPX packages ----

pub const SECTION_NS: &str = r#"xmlns:hs="http://www.hancom.co.kr/hwpml/2011/section" xmlns:hp="http://www.hancom.co.kr/hwpml/2011/paragraph" xmlns:hc="http://www.hancom.co.kr/hwpml/2011/core""#;

pub fn section_xml(body: &str) -> String {
    format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><hs:sec {SECTION_NS}>{body}</hs:sec>"#)
}

/// A package with a manifest listing `sections` in order and the given binary items.
pub fn hwpx_package(header: Option<&str>, sections: &[String], binaries: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut items = String::new();
    let mut spine = String::new();
    if header.is_some() {
        items.push_str(r#"<opf:item id="header" href="Contents/header.xml" media-type="application/xml"/>"#);
        spine.push_str(r#"<opf:itemref idref="header" linear="yes"/>"#);
    }
    for i in 0..sections.len() {
        items.push_str(&format!(
            r#"<opf:item id="section{i}" href="Contents/section{i}.xml" media-type="application/xml"/>"#
        ));
        spine.push_str(&format!(r#"<opf:itemref idref="section{i}" linear="yes"/>"#));
    }
    for (id, path, _) in binaries {
        items.push_str(&format!(r#"<opf:item id="{id}" href="{path}" media-type="image/bmp" isEmbeded="1"/>"#));
    }
    let manifest = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><opf:package xmlns:opf="http://www.idpf.org/2007/opf/"><opf:manifest>{items}</opf:manifest><opf:spine>{spine}</opf:spine></opf:package>"#
    );

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    zip.start_file("mimetype", options).unwrap();
    zip.write_all(b"application/hwp+zip").unwrap();
    zip.start_file("Contents/content.hpf", options).unwrap();
    zip.write_all(manifest.as_bytes()).unwrap();
    if let Some(header) = header {
        zip.start_file("Contents/header.xml", options).unwrap();
        zip.write_all(header.as_bytes()).unwrap();
    }
    for (i, xml) in sections.iter().enumerate() {
        zip.start_file(format!("Contents/section{i}.xml"), options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
    }
    for (_, path, data) in binaries {
        zip.start_file(*path, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Uncompressed bottom-up 24-bit BMP.
pub fn bmp_24(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
    let stride = (width * 3).div_ceil(4) * 4;
    let size = 54 + stride * height;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&54u32.to_le_bytes());
    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&(stride * height).to_le_bytes());
    out.extend_from_slice(&[0; 16]);
    for y in (0..height).rev() {
        let row_start = out.len();
        for x in 0..width {
            let [r, g, b] = pixel(x, y);
            out.extend_from_slice(&[b, g, r]);
        }
        out.resize(row_start + stride as usize, 0);
    }
    out
}
