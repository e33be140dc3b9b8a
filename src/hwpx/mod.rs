//! HWPX package reader.
//!
//! An HWPX file is a ZIP package: `Contents/content.hpf` lists the parts,
//! `Contents/header.xml` carries the shared property tables and every
//! `Contents/sectionN.xml` holds one section's body. Elements are matched by
//! local name so the several namespace generations in the wild all read the same.

mod header;
mod table;

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use log::{debug, warn};
use roxmltree::Node;

use crate::error::Error;
use crate::model::{
    AnchorRelation, BinaryItem, ColumnLayout, ColumnSize, Control, Document, FloatingAnchor,
    HeaderFooter, LineKind, LineSeg, LineStyle, Note, NumeralFormat, PageNumberPosition,
    PageNumbering, PageParity, Paragraph, Picture, Run, RunChild, Section, SectionLayout, Shape,
    ShapeKind,
};

const MANIFEST: &str = "Contents/content.hpf";
const HEADER: &str = "Contents/header.xml";

// ---- small XML helpers shared by the submodules ----

/// Element children of `node`, looking through `switch` blocks into their
/// `default` branch (or the first `case` when no default exists).
pub(super) fn elements<'a>(node: Node<'a, 'a>) -> Vec<Node<'a, 'a>> {
    let mut out = Vec::new();
    for c in node.children().filter(|n| n.is_element()) {
        if c.tag_name().name() == "switch" {
            let branch = c
                .children()
                .find(|n| n.tag_name().name() == "default")
                .or_else(|| c.children().find(|n| n.tag_name().name() == "case"));
            if let Some(branch) = branch {
                out.extend(elements(branch));
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub(super) fn child<'a>(node: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    elements(node).into_iter().find(|n| n.tag_name().name() == name)
}

pub(super) fn children_named<'a>(node: Node<'a, 'a>, name: &str) -> Vec<Node<'a, 'a>> {
    elements(node)
        .into_iter()
        .filter(|n| n.tag_name().name() == name)
        .collect()
}

pub(super) fn int_attr(node: Node, name: &str) -> Option<i32> {
    let v = node.attribute(name)?.trim();
    v.parse::<i32>()
        .ok()
        .or_else(|| v.parse::<u32>().ok().map(|u| u as i32))
}

pub(super) fn id_attr(node: Node, name: &str) -> Option<u32> {
    node.attribute(name)?.trim().parse::<u32>().ok()
}

/// Raw 32-bit offset; negative text values are stored in their unsigned form.
fn offset_attr(node: Node, name: &str) -> u32 {
    int_attr(node, name).map(|v| v as u32).unwrap_or(0)
}

pub(super) fn flag_attr(node: Node, name: &str) -> bool {
    matches!(node.attribute(name), Some("1") | Some("true"))
}

/// `#RRGGBB`; `none` and malformed values yield `None`.
pub(super) fn parse_color(val: &str) -> Option<[u8; 3]> {
    let hex = val.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

/// Widths such as `"0.12 mm"` in native units.
pub(super) fn parse_mm_width(val: &str) -> Option<i32> {
    let mm: f32 = val.trim().trim_end_matches("mm").trim().parse().ok()?;
    Some((mm * 7200.0 / 25.4).round() as i32)
}

pub(super) fn parse_line_kind(val: &str) -> LineKind {
    match val {
        "NONE" => LineKind::None,
        "DOT" | "CIRCLE" => LineKind::Dot,
        "DOUBLE" | "DOUBLE_SLIM" | "SLIM_THICK" | "THICK_SLIM" | "SLIM_THICK_SLIM" => LineKind::Double,
        v if v.contains("DASH") => LineKind::Dash,
        _ => LineKind::Solid,
    }
}

pub(super) fn parse_numeral_format(val: &str) -> NumeralFormat {
    match val {
        "CIRCLED_DIGIT" => NumeralFormat::CircledDigit,
        "ROMAN_CAPITAL" => NumeralFormat::RomanUpper,
        "ROMAN_SMALL" => NumeralFormat::RomanLower,
        "LATIN_CAPITAL" => NumeralFormat::LatinUpper,
        "LATIN_SMALL" => NumeralFormat::LatinLower,
        "HANGUL_SYLLABLE" => NumeralFormat::HangulSyllable,
        "HANGUL_JAMO" => NumeralFormat::HangulJamo,
        "CIRCLED_HANGUL_SYLLABLE" => NumeralFormat::CircledHangulSyllable,
        "CIRCLED_HANGUL_JAMO" => NumeralFormat::CircledHangulJamo,
        "IDEOGRAPH" | "CIRCLED_IDEOGRAPH" => NumeralFormat::Ideograph,
        _ => NumeralFormat::Digit,
    }
}

fn relation(val: Option<&str>) -> AnchorRelation {
    match val {
        Some("PAPER") | Some("PAGE") => AnchorRelation::Page,
        Some("COLUMN") => AnchorRelation::Column,
        _ => AnchorRelation::Paragraph,
    }
}

/// Size and position of a table, picture or drawing object.
pub(super) fn read_anchor(node: Node) -> FloatingAnchor {
    let mut anchor = FloatingAnchor::default();
    if let Some(sz) = child(node, "sz").or_else(|| child(node, "curSz")) {
        anchor.width = int_attr(sz, "width").unwrap_or(0);
        anchor.height = int_attr(sz, "height").unwrap_or(0);
    }
    if let Some(pos) = child(node, "pos") {
        anchor.inline = flag_attr(pos, "treatAsChar");
        anchor.horz_rel = relation(pos.attribute("horzRelTo"));
        anchor.vert_rel = relation(pos.attribute("vertRelTo"));
        anchor.horz_offset = offset_attr(pos, "horzOffset");
        anchor.vert_offset = offset_attr(pos, "vertOffset");
    }
    anchor
}

// ---- package ----

fn read_zip_text<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

fn read_zip_bytes<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    zip.by_name(name).ok()?.read_to_end(&mut data).ok()?;
    Some(data)
}

fn has_entry<R: Read + Seek>(zip: &zip::ZipArchive<R>, name: &str) -> bool {
    zip.file_names().any(|n| n == name)
}

/// Manifest hrefs are package-relative, though some writers make them
/// relative to `Contents/`.
fn resolve_href<R: Read + Seek>(zip: &zip::ZipArchive<R>, href: &str) -> String {
    let href = href.trim_start_matches('/');
    if has_entry(zip, href) {
        return href.to_string();
    }
    let nested = format!("Contents/{href}");
    if has_entry(zip, &nested) {
        return nested;
    }
    href.to_string()
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

fn is_section_part(href: &str) -> bool {
    file_stem(href).starts_with("section")
}

#[derive(Debug, Default, PartialEq)]
struct Manifest {
    header: Option<String>,
    sections: Vec<String>,
    /// (id, href)
    binaries: Vec<(String, String)>,
}

fn parse_manifest(xml: &str) -> Option<Manifest> {
    let doc = roxmltree::Document::parse(xml).ok()?;
    let root = doc.root_element();
    let mut items: Vec<(&str, &str)> = Vec::new();
    if let Some(list) = root.descendants().find(|n| n.tag_name().name() == "manifest") {
        for item in list.children().filter(|n| n.tag_name().name() == "item") {
            if let (Some(id), Some(href)) = (item.attribute("id"), item.attribute("href")) {
                items.push((id, href));
            }
        }
    }
    let by_id: HashMap<&str, &str> = items.iter().copied().collect();
    let mut manifest = Manifest::default();
    if let Some(spine) = root.descendants().find(|n| n.tag_name().name() == "spine") {
        for itemref in spine.children().filter(|n| n.tag_name().name() == "itemref") {
            if let Some(href) = itemref.attribute("idref").and_then(|id| by_id.get(id))
                && is_section_part(href)
            {
                manifest.sections.push(href.to_string());
            }
        }
    }
    if manifest.sections.is_empty() {
        manifest.sections = items
            .iter()
            .filter(|(_, href)| is_section_part(href))
            .map(|(_, href)| href.to_string())
            .collect();
    }
    for (id, href) in &items {
        if file_stem(href) == "header" {
            manifest.header = Some(href.to_string());
        } else if href.contains("BinData/") {
            manifest.binaries.push((id.to_string(), href.to_string()));
        }
    }
    Some(manifest)
}

/// Layout used when the package carries no manifest.
fn scan_manifest<R: Read + Seek>(zip: &zip::ZipArchive<R>) -> Manifest {
    let mut sections = Vec::new();
    for n in 0.. {
        let name = format!("Contents/section{n}.xml");
        if !has_entry(zip, &name) {
            break;
        }
        sections.push(name);
    }
    let binaries = zip
        .file_names()
        .filter(|n| n.starts_with("BinData/") && !n.ends_with('/'))
        .map(|n| (file_stem(n).to_string(), n.to_string()))
        .collect();
    Manifest {
        header: None,
        sections,
        binaries,
    }
}

/// Read an HWPX file from disk.
pub fn parse(path: &Path) -> Result<Document, Error> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
            std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())),
        ),
        _ => Error::Io(e),
    })?;
    read_package(file)
}

/// Read an HWPX package held in memory.
pub fn parse_bytes(data: &[u8]) -> Result<Document, Error> {
    read_package(Cursor::new(data))
}

fn read_package<R: Read + Seek>(reader: R) -> Result<Document, Error> {
    let mut zip = zip::ZipArchive::new(reader)
        .map_err(|_| Error::InvalidHwpx("file is not a ZIP archive".into()))?;

    let manifest = match read_zip_text(&mut zip, MANIFEST).and_then(|xml| parse_manifest(&xml)) {
        Some(m) if !m.sections.is_empty() => m,
        _ => {
            debug!("no usable manifest; scanning section parts");
            scan_manifest(&zip)
        }
    };
    if manifest.sections.is_empty() {
        return Err(Error::InvalidHwpx(
            "no section part (is this an HWPX file?)".into(),
        ));
    }

    let mut doc = Document::default();
    let header_path = manifest
        .header
        .as_deref()
        .map(|h| resolve_href(&zip, h))
        .unwrap_or_else(|| HEADER.to_string());
    match read_zip_text(&mut zip, &header_path) {
        Some(xml) => match header::read_header(&xml) {
            Ok((refs, begin_page)) => {
                doc.refs = refs;
                doc.begin_page = begin_page;
            }
            Err(e) => warn!("ignoring malformed {header_path}: {e}"),
        },
        None => debug!("no header part; using default properties"),
    }

    for href in &manifest.sections {
        let path = resolve_href(&zip, href);
        let xml = read_zip_text(&mut zip, &path)
            .ok_or_else(|| Error::InvalidHwpx(format!("missing section part {path}")))?;
        doc.sections.push(read_section(&xml)?);
    }

    for (key, href) in &manifest.binaries {
        let path = resolve_href(&zip, href);
        match read_zip_bytes(&mut zip, &path) {
            Some(data) => doc.images.push(BinaryItem {
                key: key.clone(),
                path,
                data,
            }),
            None => warn!("binary item {key} missing at {path}"),
        }
    }

    debug!(
        "read {} section(s), {} binary item(s)",
        doc.sections.len(),
        doc.images.len()
    );
    Ok(doc)
}

// ---- sections ----

fn read_section(xml: &str) -> Result<Section, Error> {
    let xml = roxmltree::Document::parse(xml)?;
    let mut reader = SectionReader {
        layout: SectionLayout::default(),
        first_paragraph: true,
    };
    let mut paragraphs = Vec::new();
    for p in children_named(xml.root_element(), "p") {
        paragraphs.push(reader.paragraph(p, false));
        reader.first_paragraph = false;
    }
    Ok(Section {
        layout: reader.layout,
        paragraphs,
    })
}

/// Walks one section body. Section-level controls only count outside
/// nested sub-lists (cells, notes, headers).
pub(super) struct SectionReader {
    layout: SectionLayout,
    first_paragraph: bool,
}

impl SectionReader {
    fn paragraph(&mut self, node: Node, nested: bool) -> Paragraph {
        let mut para = Paragraph {
            para_pr: id_attr(node, "paraPrIDRef"),
            style: id_attr(node, "styleIDRef"),
            page_break: flag_attr(node, "pageBreak"),
            column_break: flag_attr(node, "columnBreak"),
            ..Paragraph::default()
        };
        for c in elements(node) {
            match c.tag_name().name() {
                "run" => para.runs.push(self.run(c, nested)),
                "linesegarray" => para.line_segs = children_named(c, "lineseg").into_iter().map(read_line_seg).collect(),
                _ => {}
            }
        }
        para
    }

    /// Paragraphs of the `subList` under `node`.
    pub(super) fn sub_paragraphs(&mut self, node: Node) -> Vec<Paragraph> {
        let list = child(node, "subList").unwrap_or(node);
        children_named(list, "p")
            .into_iter()
            .map(|p| self.paragraph(p, true))
            .collect()
    }

    fn run(&mut self, node: Node, nested: bool) -> Run {
        let mut run = Run {
            char_pr: id_attr(node, "charPrIDRef"),
            children: Vec::new(),
        };
        for c in elements(node) {
            match c.tag_name().name() {
                "t" => {
                    let text = read_text(c);
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(RunChild::Text(prev)) = run.children.last_mut() {
                        prev.push_str(&text);
                    } else {
                        run.children.push(RunChild::Text(text));
                    }
                }
                "secPr" if !nested => self.section_properties(c),
                "ctrl" => {
                    for control in elements(c) {
                        self.control(control, nested, &mut run.children);
                    }
                }
                "tbl" => run
                    .children
                    .push(RunChild::Table(Box::new(table::read_table(c, self)))),
                "pic" => {
                    let bin_ref = c
                        .descendants()
                        .find(|n| n.tag_name().name() == "img")
                        .and_then(|img| img.attribute("binaryItemIDRef"));
                    match bin_ref {
                        Some(bin_ref) => run.children.push(RunChild::Picture(Picture {
                            anchor: read_anchor(c),
                            bin_ref: bin_ref.to_string(),
                        })),
                        None => debug!("picture without an image reference skipped"),
                    }
                }
                "rect" => run.children.push(RunChild::Shape(read_shape(c, ShapeKind::Rectangle))),
                "ellipse" => run.children.push(RunChild::Shape(read_shape(c, ShapeKind::Ellipse))),
                "line" => run.children.push(RunChild::Shape(read_shape(c, ShapeKind::Line))),
                _ => {}
            }
        }
        run
    }

    fn control(&mut self, node: Node, nested: bool, out: &mut Vec<RunChild>) {
        match node.tag_name().name() {
            "colPr" => {
                let columns = read_columns(node);
                if nested {
                    return;
                }
                if self.first_paragraph {
                    self.layout.columns = Some(columns);
                } else {
                    out.push(RunChild::ColumnDef(columns));
                }
            }
            "pageNum" if !nested => self.layout.page_numbering = read_page_numbering(node),
            "header" | "footer" => {
                let def = HeaderFooter {
                    applies_to: match node.attribute("applyPageType") {
                        Some("EVEN") => PageParity::Even,
                        Some("ODD") => PageParity::Odd,
                        _ => PageParity::Both,
                    },
                    paragraphs: self.sub_paragraphs(node),
                };
                out.push(RunChild::Control(if node.tag_name().name() == "header" {
                    Control::Header(def)
                } else {
                    Control::Footer(def)
                }));
            }
            "footNote" => out.push(RunChild::Control(Control::Footnote(Note {
                paragraphs: self.sub_paragraphs(node),
            }))),
            "endNote" => out.push(RunChild::Control(Control::Endnote(Note {
                paragraphs: self.sub_paragraphs(node),
            }))),
            "autoNum" if node.attribute("numType") == Some("PAGE") => {
                out.push(RunChild::Control(Control::PageNumber));
            }
            _ => {}
        }
    }

    fn section_properties(&mut self, node: Node) {
        let layout = &mut self.layout;
        if let Some(page) = child(node, "pagePr") {
            layout.landscape = page.attribute("landscape") == Some("NARROWLY");
            if let Some(w) = int_attr(page, "width") {
                layout.page_width = w;
            }
            if let Some(h) = int_attr(page, "height") {
                layout.page_height = h;
            }
            if let Some(m) = child(page, "margin") {
                let read = |name: &str, slot: &mut i32| {
                    if let Some(v) = int_attr(m, name) {
                        *slot = v;
                    }
                };
                read("left", &mut layout.margin_left);
                read("right", &mut layout.margin_right);
                read("top", &mut layout.margin_top);
                read("bottom", &mut layout.margin_bottom);
                read("header", &mut layout.header);
                read("footer", &mut layout.footer);
                read("gutter", &mut layout.gutter);
            }
        }
        if let Some(start) = child(node, "startNum") {
            layout.page_start = id_attr(start, "page").filter(|&p| p > 0);
        }
        layout.outline_numbering = id_attr(node, "outlineShapeIDRef");
        // Some writers put the column and page-number controls inside secPr.
        for c in elements(node) {
            match c.tag_name().name() {
                "colPr" => layout.columns = Some(read_columns(c)),
                "pageNum" => layout.page_numbering = read_page_numbering(c),
                _ => {}
            }
        }
    }
}

fn read_text(node: Node) -> String {
    let mut text = String::new();
    for c in node.children() {
        if c.is_text() {
            text.push_str(c.text().unwrap_or(""));
            continue;
        }
        match c.tag_name().name() {
            "lineBreak" => text.push('\n'),
            "tab" => text.push('\t'),
            "nbSpace" | "fwSpace" => text.push(' '),
            "hyphen" => text.push('-'),
            _ => {
                // Track-change and markpen wrappers may enclose text.
                for t in c.descendants().filter(|n| n.is_text()) {
                    text.push_str(t.text().unwrap_or(""));
                }
            }
        }
    }
    text
}

fn read_line_seg(node: Node) -> LineSeg {
    let int = |name: &str| int_attr(node, name).unwrap_or(0);
    LineSeg {
        text_pos: id_attr(node, "textpos").unwrap_or(0),
        vert_pos: int("vertpos"),
        vert_size: int("vertsize"),
        text_height: int("textheight"),
        baseline: int("baseline"),
        spacing: int("spacing"),
        horz_pos: int("horzpos"),
        horz_size: int("horzsize"),
        flags: id_attr(node, "flags").unwrap_or(0),
    }
}

fn read_columns(node: Node) -> ColumnLayout {
    let count = int_attr(node, "colCount").unwrap_or(1).clamp(1, 255) as u16;
    let sizes = if node.attribute("sameSz") == Some("0") {
        children_named(node, "colSz")
            .into_iter()
            .map(|c| ColumnSize {
                width: int_attr(c, "width").unwrap_or(0),
                gap: int_attr(c, "gap").unwrap_or(0),
            })
            .collect()
    } else {
        Vec::new()
    };
    let separator = child(node, "colLine")
        .map(|l| LineStyle {
            kind: parse_line_kind(l.attribute("type").unwrap_or("SOLID")),
            width: l
                .attribute("width")
                .and_then(parse_mm_width)
                .unwrap_or(LineStyle::default().width),
            color: l.attribute("color").and_then(parse_color).unwrap_or([0, 0, 0]),
        })
        .filter(LineStyle::is_visible);
    ColumnLayout {
        count,
        gap: int_attr(node, "sameGap").unwrap_or(0),
        sizes,
        separator,
    }
}

fn read_page_numbering(node: Node) -> Option<PageNumbering> {
    let position = match node.attribute("pos")? {
        "TOP_LEFT" | "TOP_INSIDE" => PageNumberPosition::TopLeft,
        "TOP_CENTER" => PageNumberPosition::TopCenter,
        "TOP_RIGHT" | "TOP_OUTSIDE" => PageNumberPosition::TopRight,
        "BOTTOM_LEFT" | "BOTTOM_INSIDE" => PageNumberPosition::BottomLeft,
        "BOTTOM_CENTER" => PageNumberPosition::BottomCenter,
        "BOTTOM_RIGHT" | "BOTTOM_OUTSIDE" => PageNumberPosition::BottomRight,
        _ => return None,
    };
    Some(PageNumbering {
        position,
        format: parse_numeral_format(node.attribute("formatType").unwrap_or("DIGIT")),
        side_char: node
            .attribute("sideChar")
            .and_then(|s| s.chars().next())
            .filter(|c| !c.is_whitespace()),
    })
}

fn read_shape(node: Node, kind: ShapeKind) -> Shape {
    let line = child(node, "lineShape")
        .map(|l| LineStyle {
            kind: parse_line_kind(l.attribute("style").unwrap_or("SOLID")),
            width: int_attr(l, "width").unwrap_or(LineStyle::default().width),
            color: l.attribute("color").and_then(parse_color).unwrap_or([0, 0, 0]),
        })
        .unwrap_or_default();
    let fill = node
        .descendants()
        .find(|n| n.tag_name().name() == "winBrush")
        .and_then(|b| b.attribute("faceColor"))
        .and_then(parse_color);
    Shape {
        kind,
        anchor: read_anchor(node),
        line,
        fill,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    const NS: &str = r#"xmlns:hs="http://www.hancom.co.kr/hwpml/2011/section" xmlns:hp="http://www.hancom.co.kr/hwpml/2011/paragraph""#;

    fn section(body: &str) -> String {
        format!(r#"<?xml version="1.0" encoding="UTF-8"?><hs:sec {NS}>{body}</hs:sec>"#)
    }

    fn package(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn colors_and_widths() {
        assert_eq!(parse_color("#FF8000"), Some([255, 128, 0]));
        assert_eq!(parse_color("none"), None);
        assert_eq!(parse_mm_width("0.12 mm"), Some(34));
        assert_eq!(parse_mm_width("0.4 mm"), Some(113));
        assert_eq!(parse_line_kind("LONG_DASH"), LineKind::Dash);
    }

    #[test]
    fn switch_prefers_default_branch() {
        let xml = r#"<a xmlns:hp="urn:p"><hp:switch><hp:case><b v="case"/></hp:case><hp:default><b v="default"/></hp:default></hp:switch></a>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let b = child(doc.root_element(), "b").unwrap();
        assert_eq!(b.attribute("v"), Some("default"));
    }

    #[test]
    fn manifest_orders_sections_by_spine() {
        let xml = r#"<opf:package xmlns:opf="http://www.idpf.org/2007/opf/">
            <opf:manifest>
              <opf:item id="header" href="Contents/header.xml"/>
              <opf:item id="section0" href="Contents/section0.xml"/>
              <opf:item id="section1" href="Contents/section1.xml"/>
              <opf:item id="image1" href="BinData/image1.bmp"/>
            </opf:manifest>
            <opf:spine>
              <opf:itemref idref="header"/>
              <opf:itemref idref="section1"/>
              <opf:itemref idref="section0"/>
            </opf:spine>
          </opf:package>"#;
        let m = parse_manifest(xml).unwrap();
        assert_eq!(m.header.as_deref(), Some("Contents/header.xml"));
        assert_eq!(m.sections, vec!["Contents/section1.xml", "Contents/section0.xml"]);
        assert_eq!(m.binaries, vec![("image1".to_string(), "BinData/image1.bmp".to_string())]);
    }

    #[test]
    fn section_properties_and_text() {
        let xml = section(
            r##"<hp:p paraPrIDRef="3" styleIDRef="0" pageBreak="0" columnBreak="1">
                 <hp:run charPrIDRef="7">
                   <hp:secPr outlineShapeIDRef="2">
                     <hp:startNum page="5"/>
                     <hp:pagePr landscape="NARROWLY" width="84186" height="59528">
                       <hp:margin left="1000" right="2000" top="3000" bottom="4000" header="500" footer="600" gutter="0"/>
                     </hp:pagePr>
                   </hp:secPr>
                   <hp:ctrl><hp:colPr colCount="2" sameSz="1" sameGap="850"><hp:colLine type="SOLID" width="0.12 mm" color="#000000"/></hp:colPr></hp:ctrl>
                   <hp:ctrl><hp:pageNum pos="BOTTOM_CENTER" formatType="ROMAN_SMALL" sideChar="-"/></hp:ctrl>
                   <hp:t>one<hp:tab/>two<hp:lineBreak/>three</hp:t>
                 </hp:run>
                 <hp:linesegarray><hp:lineseg textpos="0" vertpos="0" vertsize="1000" textheight="1000" baseline="850" spacing="600" horzpos="0" horzsize="42520" flags="393216"/></hp:linesegarray>
               </hp:p>
               <hp:p><hp:run><hp:ctrl><hp:colPr colCount="1"/></hp:ctrl></hp:run></hp:p>"##,
        );
        let section = read_section(&xml).unwrap();
        let layout = &section.layout;
        assert!(layout.landscape);
        assert_eq!((layout.page_width, layout.margin_left, layout.footer), (84186, 1000, 600));
        assert_eq!(layout.page_start, Some(5));
        assert_eq!(layout.outline_numbering, Some(2));
        let columns = layout.columns.as_ref().unwrap();
        assert_eq!((columns.count, columns.gap), (2, 850));
        assert_eq!(columns.separator.map(|s| s.width), Some(34));
        let numbering = layout.page_numbering.unwrap();
        assert_eq!(numbering.position, PageNumberPosition::BottomCenter);
        assert_eq!(numbering.format, NumeralFormat::RomanLower);
        assert_eq!(numbering.side_char, Some('-'));

        let first = &section.paragraphs[0];
        assert_eq!((first.para_pr, first.style), (Some(3), Some(0)));
        assert!(first.column_break && !first.page_break);
        assert_eq!(first.plain_text(), "one\ttwo\nthree");
        assert_eq!(first.runs[0].char_pr, Some(7));
        assert_eq!(first.line_segs[0].baseline, 850);
        assert_eq!(first.line_segs[0].flags, 393216);

        let later = &section.paragraphs[1].runs[0].children;
        assert!(matches!(later.as_slice(), [RunChild::ColumnDef(c)] if c.count == 1));
    }

    #[test]
    fn controls_and_objects() {
        let xml = section(
            r##"<hp:p><hp:run>
                 <hp:t>a</hp:t>
                 <hp:ctrl><hp:footNote number="1"><hp:subList><hp:p><hp:run><hp:t>note</hp:t></hp:run></hp:p></hp:subList></hp:footNote></hp:ctrl>
                 <hp:ctrl><hp:header applyPageType="ODD"><hp:subList><hp:p><hp:run><hp:t>head</hp:t></hp:run></hp:p></hp:subList></hp:header></hp:ctrl>
                 <hp:ctrl><hp:autoNum num="1" numType="PAGE"/></hp:ctrl>
                 <hp:pic><hp:sz width="7200" height="3600"/><hp:pos treatAsChar="0" horzRelTo="PAPER" vertRelTo="PARA" horzOffset="-100" vertOffset="200"/><hc:img xmlns:hc="urn:c" binaryItemIDRef="image1"/></hp:pic>
                 <hp:rect><hp:sz width="1000" height="500"/><hp:pos treatAsChar="1"/><hp:lineShape color="#FF0000" width="50" style="DASH"/><hc:fillBrush xmlns:hc="urn:c"><hc:winBrush faceColor="#00FF00"/></hc:fillBrush></hp:rect>
               </hp:run></hp:p>"##,
        );
        let section = read_section(&xml).unwrap();
        let children = &section.paragraphs[0].runs[0].children;
        assert_eq!(children.len(), 6);
        match &children[1] {
            RunChild::Control(Control::Footnote(n)) => assert_eq!(n.paragraphs[0].plain_text(), "note"),
            _ => panic!("expected a footnote"),
        }
        match &children[2] {
            RunChild::Control(Control::Header(h)) => assert_eq!(h.applies_to, PageParity::Odd),
            _ => panic!("expected a header"),
        }
        assert!(matches!(children[3], RunChild::Control(Control::PageNumber)));
        match &children[4] {
            RunChild::Picture(p) => {
                assert_eq!(p.bin_ref, "image1");
                assert!(!p.anchor.inline);
                assert_eq!(p.anchor.horz_rel, AnchorRelation::Page);
                assert_eq!(p.anchor.horz_offset as i32, -100);
                assert_eq!(p.anchor.width, 7200);
            }
            _ => panic!("expected a picture"),
        }
        match &children[5] {
            RunChild::Shape(s) => {
                assert_eq!(s.kind, ShapeKind::Rectangle);
                assert!(s.anchor.inline);
                assert_eq!(s.line.kind, LineKind::Dash);
                assert_eq!(s.line.color, [255, 0, 0]);
                assert_eq!(s.fill, Some([0, 255, 0]));
            }
            _ => panic!("expected a shape"),
        }
    }

    #[test]
    fn package_without_manifest_falls_back_to_section_parts() {
        let body = section(r#"<hp:p><hp:run><hp:t>hello</hp:t></hp:run></hp:p>"#);
        let data = package(&[
            ("mimetype", b"application/hwp+zip"),
            ("Contents/section0.xml", body.as_bytes()),
            ("Contents/section1.xml", body.as_bytes()),
            ("BinData/image7.png", b"\x89PNG"),
        ]);
        let doc = parse_bytes(&data).unwrap();
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.begin_page, 1);
        assert_eq!(doc.images[0].key, "image7");
        assert_eq!(doc.sections[1].paragraphs[0].plain_text(), "hello");
    }

    #[test]
    fn fatal_package_errors() {
        assert!(matches!(parse_bytes(b"not a zip"), Err(Error::InvalidHwpx(_))));
        let empty = package(&[("mimetype", b"application/hwp+zip")]);
        assert!(matches!(parse_bytes(&empty), Err(Error::InvalidHwpx(_))));
        let broken = package(&[("Contents/section0.xml", b"<hs:sec><hp:p>")]);
        assert!(matches!(parse_bytes(&broken), Err(Error::Xml(_))));
    }
}
