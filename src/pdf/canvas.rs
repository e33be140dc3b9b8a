//! Drawing surface used by the layout engine.
//!
//! Layout only talks to [`Canvas`]; [`PdfCanvas`] is the production sink and
//! writes a PDF with `pdf-writer`. Coordinates are PDF points, origin at the
//! bottom-left corner of the page.

use std::collections::BTreeSet;
use std::io::Cursor;

use image::ImageDecoder;
use pdf_writer::types::LineCapStyle;
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str};

use crate::codec::RasterFormat;
use crate::fonts::{BuiltinFace, FontEntry, FontMetrics, FontProgram, embed_builtin, embed_truetype};

pub type PageId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub id: ImageId,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextPaint {
    pub color: [u8; 3],
    /// Extra advance after every glyph, in points.
    pub letter_spacing: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dash {
    Solid,
    Dashed,
    Dotted,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub color: [u8; 3],
    pub dash: Dash,
}

/// Output sink capabilities consumed by layout.
pub trait Canvas {
    fn create_page(&mut self, width: f32, height: f32) -> PageId;

    /// Register a font for the given characters. Without a program (or when it
    /// cannot be embedded) the standard `fallback` face is used.
    fn embed_font(
        &mut self,
        program: Option<&FontProgram>,
        fallback: BuiltinFace,
        used: &BTreeSet<char>,
    ) -> FontId;

    /// Embed PNG or JPEG data. Anything else, or undecodable data, yields `None`.
    fn embed_image(&mut self, data: &[u8], format: RasterFormat) -> Option<EmbeddedImage>;

    fn text_width(&self, text: &str, font: FontId, size: f32) -> f32;
    fn font_metrics(&self, font: FontId) -> FontMetrics;

    /// Draw `text` with its baseline starting at (x, y).
    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &mut self,
        page: PageId,
        text: &str,
        x: f32,
        y: f32,
        font: FontId,
        size: f32,
        paint: &TextPaint,
    );
    fn draw_line(&mut self, page: PageId, x1: f32, y1: f32, x2: f32, y2: f32, stroke: &Stroke);
    /// (x, y) is the bottom-left corner.
    #[allow(clippy::too_many_arguments)]
    fn draw_rect(
        &mut self,
        page: PageId,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        fill: Option<[u8; 3]>,
        stroke: Option<&Stroke>,
    );
    /// Ellipse inscribed in the given box.
    #[allow(clippy::too_many_arguments)]
    fn draw_ellipse(
        &mut self,
        page: PageId,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        fill: Option<[u8; 3]>,
        stroke: Option<&Stroke>,
    );
    fn draw_image(&mut self, page: PageId, image: ImageId, x: f32, y: f32, w: f32, h: f32);
}

struct RefAlloc {
    next: i32,
}

impl RefAlloc {
    fn bump(&mut self) -> Ref {
        let r = Ref::new(self.next);
        self.next += 1;
        r
    }
}

struct PageBuf {
    width: f32,
    height: f32,
    content: Content,
    fill: Option<[u8; 3]>,
    font: Option<(FontId, f32)>,
    char_spacing: f32,
}

/// Canvas that accumulates pages and serialises them into a PDF on [`PdfCanvas::finish`].
pub struct PdfCanvas {
    pdf: Pdf,
    refs: RefAlloc,
    catalog_id: Ref,
    pages_id: Ref,
    fonts: Vec<FontEntry>,
    images: Vec<(String, Ref)>,
    pages: Vec<PageBuf>,
}

impl Default for PdfCanvas {
    fn default() -> Self {
        Self::new()
    }
}

fn rgb(c: [u8; 3]) -> (f32, f32, f32) {
    (c[0] as f32 / 255.0, c[1] as f32 / 255.0, c[2] as f32 / 255.0)
}

fn apply_stroke(content: &mut Content, stroke: &Stroke) {
    let (r, g, b) = rgb(stroke.color);
    content.set_stroke_rgb(r, g, b);
    content.set_line_width(stroke.width);
    let unit = stroke.width.max(1.0);
    match stroke.dash {
        Dash::Solid => {}
        Dash::Dashed => {
            content.set_dash_pattern([3.0 * unit, 2.0 * unit], 0.0);
        }
        Dash::Dotted => {
            content.set_line_cap(LineCapStyle::RoundCap);
            content.set_dash_pattern([0.0, 2.0 * unit], 0.0);
        }
    }
}

fn paint_path(content: &mut Content, fill: Option<[u8; 3]>, stroke: Option<&Stroke>) {
    match (fill, stroke) {
        (Some(_), Some(_)) => {
            content.fill_nonzero_and_stroke();
        }
        (Some(_), None) => {
            content.fill_nonzero();
        }
        (None, Some(_)) => {
            content.stroke();
        }
        (None, None) => {
            content.end_path();
        }
    }
}

impl PdfCanvas {
    pub fn new() -> Self {
        let mut refs = RefAlloc { next: 1 };
        let catalog_id = refs.bump();
        let pages_id = refs.bump();
        PdfCanvas {
            pdf: Pdf::new(),
            refs,
            catalog_id,
            pages_id,
            fonts: Vec::new(),
            images: Vec::new(),
            pages: Vec::new(),
        }
    }

    fn page(&mut self, page: PageId) -> Option<&mut PageBuf> {
        let buf = self.pages.get_mut(page);
        if buf.is_none() {
            log::warn!("Drawing on unknown page {page}");
        }
        buf
    }

    /// Write RGB(A) pixels as a Flate image, with an SMask when any pixel is translucent.
    fn write_rgba(&mut self, rgba: &image::RgbaImage) -> Ref {
        let (w, h) = (rgba.width(), rgba.height());
        let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);
        let rgb_data: Vec<u8> = rgba.pixels().flat_map(|p| [p.0[0], p.0[1], p.0[2]]).collect();
        let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);

        let smask_ref = if has_alpha {
            let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
            let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6);
            let mask_ref = self.refs.bump();
            let mut mask = self.pdf.image_xobject(mask_ref, &compressed_alpha);
            mask.filter(Filter::FlateDecode);
            mask.width(w as i32);
            mask.height(h as i32);
            mask.color_space().device_gray();
            mask.bits_per_component(8);
            Some(mask_ref)
        } else {
            None
        };

        let xobj_ref = self.refs.bump();
        let mut xobj = self.pdf.image_xobject(xobj_ref, &compressed_rgb);
        xobj.filter(Filter::FlateDecode);
        xobj.width(w as i32);
        xobj.height(h as i32);
        xobj.color_space().device_rgb();
        xobj.bits_per_component(8);
        if let Some(mask_ref) = smask_ref {
            xobj.s_mask(mask_ref);
        }
        xobj_ref
    }

    fn write_jpeg(&mut self, data: &[u8]) -> Option<(Ref, u32, u32)> {
        let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(data)).ok()?;
        let (w, h) = decoder.dimensions();
        let gray = match decoder.color_type() {
            image::ColorType::L8 => true,
            image::ColorType::Rgb8 => false,
            _ => {
                // Pass through only what DCTDecode can show as-is.
                let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg).ok()?;
                let rgba = decoded.to_rgba8();
                return Some((self.write_rgba(&rgba), w, h));
            }
        };
        let xobj_ref = self.refs.bump();
        let mut xobj = self.pdf.image_xobject(xobj_ref, data);
        xobj.filter(Filter::DctDecode);
        xobj.width(w as i32);
        xobj.height(h as i32);
        if gray {
            xobj.color_space().device_gray();
        } else {
            xobj.color_space().device_rgb();
        }
        xobj.bits_per_component(8);
        Some((xobj_ref, w, h))
    }

    /// Serialise every page and return the PDF bytes.
    pub fn finish(self) -> Vec<u8> {
        let PdfCanvas {
            mut pdf,
            mut refs,
            catalog_id,
            pages_id,
            fonts,
            images,
            pages,
        } = self;

        let n = pages.len();
        let page_ids: Vec<Ref> = (0..n).map(|_| refs.bump()).collect();
        let content_ids: Vec<Ref> = (0..n).map(|_| refs.bump()).collect();

        let mut boxes = Vec::with_capacity(n);
        for (i, page) in pages.into_iter().enumerate() {
            boxes.push((page.width, page.height));
            let raw = page.content.finish();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
            pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
        }

        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids(page_ids.iter().copied())
            .count(n as i32);

        for (i, &(width, height)) in boxes.iter().enumerate() {
            let mut page = pdf.page(page_ids[i]);
            page.media_box(Rect::new(0.0, 0.0, width, height))
                .parent(pages_id)
                .contents(content_ids[i]);
            let mut resources = page.resources();
            {
                let mut font_dict = resources.fonts();
                for entry in &fonts {
                    font_dict.pair(Name(entry.pdf_name.as_bytes()), entry.font_ref);
                }
            }
            if !images.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, xobj_ref) in &images {
                    xobjects.pair(Name(name.as_bytes()), *xobj_ref);
                }
            }
        }

        pdf.finish()
    }
}

impl Canvas for PdfCanvas {
    fn create_page(&mut self, width: f32, height: f32) -> PageId {
        self.pages.push(PageBuf {
            width,
            height,
            content: Content::new(),
            fill: None,
            font: None,
            char_spacing: 0.0,
        });
        self.pages.len() - 1
    }

    fn embed_font(
        &mut self,
        program: Option<&FontProgram>,
        fallback: BuiltinFace,
        used: &BTreeSet<char>,
    ) -> FontId {
        let font_ref = self.refs.bump();
        let pdf_name = format!("F{}", self.fonts.len() + 1);
        let refs = &mut self.refs;
        let embedded = program.and_then(|program| {
            let entry = embed_truetype(
                &mut self.pdf,
                font_ref,
                pdf_name.clone(),
                program,
                used,
                &mut || refs.bump(),
            );
            if entry.is_none() {
                log::warn!("Font {} could not be embedded; using {}", program.name, fallback.base_font());
            }
            entry
        });
        let entry = match embedded {
            Some(entry) => entry,
            None => embed_builtin(&mut self.pdf, font_ref, pdf_name, fallback),
        };
        self.fonts.push(entry);
        FontId(self.fonts.len() - 1)
    }

    fn embed_image(&mut self, data: &[u8], format: RasterFormat) -> Option<EmbeddedImage> {
        let (xobj_ref, pixel_width, pixel_height) = match format {
            RasterFormat::Jpeg => self.write_jpeg(data)?,
            RasterFormat::Png => {
                let reader = image::ImageReader::with_format(Cursor::new(data), image::ImageFormat::Png);
                let rgba = reader.decode().ok()?.to_rgba8();
                let (w, h) = (rgba.width(), rgba.height());
                (self.write_rgba(&rgba), w, h)
            }
            _ => return None,
        };
        let pdf_name = format!("Im{}", self.images.len() + 1);
        self.images.push((pdf_name, xobj_ref));
        Some(EmbeddedImage {
            id: ImageId(self.images.len() - 1),
            pixel_width,
            pixel_height,
        })
    }

    fn text_width(&self, text: &str, font: FontId, size: f32) -> f32 {
        self.fonts
            .get(font.0)
            .map(|f| f.text_width(text, size))
            .unwrap_or(0.0)
    }

    fn font_metrics(&self, font: FontId) -> FontMetrics {
        self.fonts
            .get(font.0)
            .map(|f| f.metrics)
            .unwrap_or(FontMetrics::BUILTIN)
    }

    fn draw_text(
        &mut self,
        page: PageId,
        text: &str,
        x: f32,
        y: f32,
        font: FontId,
        size: f32,
        paint: &TextPaint,
    ) {
        let Some(entry) = self.fonts.get(font.0) else {
            return;
        };
        let bytes = entry.encode(text);
        if bytes.is_empty() {
            return;
        }
        let name = entry.pdf_name.clone();
        let Some(buf) = self.pages.get_mut(page) else {
            log::warn!("Drawing on unknown page {page}");
            return;
        };
        let content = &mut buf.content;
        if buf.fill != Some(paint.color) {
            let (r, g, b) = rgb(paint.color);
            content.set_fill_rgb(r, g, b);
            buf.fill = Some(paint.color);
        }
        content.begin_text();
        if buf.font != Some((font, size)) {
            content.set_font(Name(name.as_bytes()), size);
            buf.font = Some((font, size));
        }
        if buf.char_spacing != paint.letter_spacing {
            content.set_char_spacing(paint.letter_spacing);
            buf.char_spacing = paint.letter_spacing;
        }
        content.next_line(x, y);
        content.show(Str(&bytes));
        content.end_text();
    }

    fn draw_line(&mut self, page: PageId, x1: f32, y1: f32, x2: f32, y2: f32, stroke: &Stroke) {
        let Some(buf) = self.page(page) else {
            return;
        };
        let content = &mut buf.content;
        content.save_state();
        apply_stroke(content, stroke);
        content.move_to(x1, y1);
        content.line_to(x2, y2);
        content.stroke();
        content.restore_state();
    }

    fn draw_rect(
        &mut self,
        page: PageId,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        fill: Option<[u8; 3]>,
        stroke: Option<&Stroke>,
    ) {
        let Some(buf) = self.page(page) else {
            return;
        };
        let content = &mut buf.content;
        content.save_state();
        if let Some(color) = fill {
            let (r, g, b) = rgb(color);
            content.set_fill_rgb(r, g, b);
        }
        if let Some(stroke) = stroke {
            apply_stroke(content, stroke);
        }
        content.rect(x, y, w, h);
        paint_path(content, fill, stroke);
        content.restore_state();
    }

    fn draw_ellipse(
        &mut self,
        page: PageId,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        fill: Option<[u8; 3]>,
        stroke: Option<&Stroke>,
    ) {
        // Four cubic arcs; 0.5523 is the usual quarter-circle control distance.
        const K: f32 = 0.552_284_8;
        let Some(buf) = self.page(page) else {
            return;
        };
        let (rx, ry) = (w / 2.0, h / 2.0);
        let (cx, cy) = (x + rx, y + ry);
        let (ox, oy) = (rx * K, ry * K);
        let content = &mut buf.content;
        content.save_state();
        if let Some(color) = fill {
            let (r, g, b) = rgb(color);
            content.set_fill_rgb(r, g, b);
        }
        if let Some(stroke) = stroke {
            apply_stroke(content, stroke);
        }
        content.move_to(cx + rx, cy);
        content.cubic_to(cx + rx, cy + oy, cx + ox, cy + ry, cx, cy + ry);
        content.cubic_to(cx - ox, cy + ry, cx - rx, cy + oy, cx - rx, cy);
        content.cubic_to(cx - rx, cy - oy, cx - ox, cy - ry, cx, cy - ry);
        content.cubic_to(cx + ox, cy - ry, cx + rx, cy - oy, cx + rx, cy);
        content.close_path();
        paint_path(content, fill, stroke);
        content.restore_state();
    }

    fn draw_image(&mut self, page: PageId, image: ImageId, x: f32, y: f32, w: f32, h: f32) {
        let Some((name, _)) = self.images.get(image.0) else {
            return;
        };
        let name = name.clone();
        let Some(buf) = self.page(page) else {
            return;
        };
        let content = &mut buf.content;
        content.save_state();
        content.transform([w, 0.0, 0.0, h, x, y]);
        content.x_object(Name(name.as_bytes()));
        content.restore_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(w: u32, h: u32, alpha: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, alpha]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn builtin_font_measures_without_program() {
        let mut canvas = PdfCanvas::new();
        let font = canvas.embed_font(None, BuiltinFace::Helvetica, &BTreeSet::new());
        assert_eq!(canvas.text_width("  ", font, 10.0), 2.0 * 2.78);
        assert_eq!(canvas.font_metrics(font), FontMetrics::BUILTIN);
    }

    #[test]
    fn embeds_png_and_rejects_others() {
        let mut canvas = PdfCanvas::new();
        let img = canvas.embed_image(&png_bytes(3, 2, 128), RasterFormat::Png).unwrap();
        assert_eq!((img.pixel_width, img.pixel_height), (3, 2));
        assert!(canvas.embed_image(b"garbage", RasterFormat::Png).is_none());
        assert!(canvas.embed_image(b"garbage", RasterFormat::Wmf).is_none());
        assert!(canvas.embed_image(b"garbage", RasterFormat::Jpeg).is_none());
    }

    #[test]
    fn finish_writes_every_page() {
        let mut canvas = PdfCanvas::new();
        let font = canvas.embed_font(None, BuiltinFace::TimesRoman, &BTreeSet::new());
        let p0 = canvas.create_page(595.0, 842.0);
        let p1 = canvas.create_page(842.0, 595.0);
        let paint = TextPaint {
            color: [0, 0, 0],
            letter_spacing: 0.0,
        };
        canvas.draw_text(p0, "Hello", 72.0, 700.0, font, 12.0, &paint);
        let stroke = Stroke {
            width: 0.5,
            color: [255, 0, 0],
            dash: Dash::Dotted,
        };
        canvas.draw_rect(p1, 10.0, 10.0, 50.0, 20.0, Some([0, 255, 0]), Some(&stroke));
        canvas.draw_ellipse(p1, 10.0, 10.0, 50.0, 20.0, None, Some(&stroke));
        let bytes = canvas.finish();
        assert!(bytes.starts_with(b"%PDF-"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 2"));
        assert!(text.contains("/MediaBox [0 0 842 595]"));
        assert!(text.contains("/Times-Roman"));
    }
}
