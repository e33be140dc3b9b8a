use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

/// Hangul and Latin face names rendered with the serif (Myeongjo) class.
const SERIF_FACES: &[&str] = &[
    "함초롬바탕",
    "바탕",
    "바탕체",
    "궁서",
    "궁서체",
    "휴먼명조",
    "한양신명조",
    "신명조",
    "나눔명조",
    "hcr batang",
    "batang",
    "batangche",
    "gungsuh",
    "nanummyeongjo",
    "times new roman",
    "times",
    "georgia",
    "serif",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontClass {
    Serif,
    Sans,
}

/// Map a declared face name to its class. Unknown faces are sans.
pub fn classify_face(name: &str) -> FontClass {
    let lower = name.trim().to_lowercase();
    if SERIF_FACES.contains(&lower.as_str()) {
        FontClass::Serif
    } else {
        FontClass::Sans
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey {
    pub class: FontClass,
    pub bold: bool,
}

/// Vertical metrics of an embedded face, as fractions of the font size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontMetrics {
    /// (ascent − descent) / units-per-em.
    pub em_ratio: f32,
    pub ascender_ratio: f32,
}

impl FontMetrics {
    /// Metrics assumed for the standard PDF faces.
    pub const BUILTIN: FontMetrics = FontMetrics {
        em_ratio: 1.0,
        ascender_ratio: 0.8,
    };
}

/// Where a font program can be read from.
#[derive(Clone, Debug)]
pub enum FontSource {
    File(PathBuf),
    Bytes(Arc<Vec<u8>>),
}

/// Supplies candidate font programs for a class/weight, best first.
pub trait FontLocator {
    fn candidates(&self, key: FontKey) -> Vec<FontSource>;
}

/// Locator that never finds anything; every class falls back to the standard faces.
pub struct NoSystemFonts;

impl FontLocator for NoSystemFonts {
    fn candidates(&self, _key: FontKey) -> Vec<FontSource> {
        Vec::new()
    }
}

fn candidate_files(key: FontKey) -> &'static [&'static str] {
    match (key.class, key.bold) {
        (FontClass::Serif, false) => &[
            "AppleMyungjo.ttf",
            "batang.ttc",
            "NanumMyeongjo.ttf",
            "HCRBatang.ttf",
            "NotoSerifCJK-Regular.ttc",
        ],
        (FontClass::Serif, true) => &[
            "NanumMyeongjoBold.ttf",
            "HCRBatang-Bold.ttf",
            "NotoSerifCJK-Bold.ttc",
        ],
        (FontClass::Sans, false) => &[
            "AppleSDGothicNeo.ttc",
            "malgun.ttf",
            "NanumGothic.ttf",
            "AppleGothic.ttf",
            "HCRDotum.ttf",
            "NotoSansCJK-Regular.ttc",
        ],
        (FontClass::Sans, true) => &[
            "malgunbd.ttf",
            "NanumGothicBold.ttf",
            "HCRDotum-Bold.ttf",
            "NotoSansCJK-Bold.ttc",
        ],
    }
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var("HWPX_PDF_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        for part in val.split(sep) {
            let trimmed = part.trim();
            if !trimmed.is_empty() {
                dirs.push(PathBuf::from(trimmed));
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
            "/Library/Fonts".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    dirs
}

/// Looks up well-known Korean font files in the platform font directories.
pub struct SystemFontLocator {
    dirs: Vec<PathBuf>,
    /// Lowercase file name → first path seen.
    index: OnceLock<HashMap<String, PathBuf>>,
}

impl SystemFontLocator {
    pub fn new(extra_dirs: &[PathBuf]) -> Self {
        let mut dirs = extra_dirs.to_vec();
        dirs.extend(font_directories());
        SystemFontLocator {
            dirs,
            index: OnceLock::new(),
        }
    }

    fn scan(&self) -> HashMap<String, PathBuf> {
        let t0 = std::time::Instant::now();
        let mut index = HashMap::new();
        let mut visited = std::collections::HashSet::new();
        // Search the directories in order; reverse so the stack pops the first one first.
        let mut stack: Vec<PathBuf> = self.dirs.iter().rev().cloned().collect();
        while let Some(dir) = stack.pop() {
            if !visited.insert(dir.clone()) {
                continue;
            }
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut subdirs = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    subdirs.push(path);
                } else if is_font_file(&path)
                    && let Some(name) = path.file_name().and_then(|n| n.to_str())
                {
                    index.entry(name.to_lowercase()).or_insert(path);
                }
            }
            subdirs.sort();
            stack.extend(subdirs.into_iter().rev());
        }
        log::info!(
            "Font scan: {:.1}ms, {} files indexed",
            t0.elapsed().as_secs_f64() * 1000.0,
            index.len()
        );
        index
    }
}

impl FontLocator for SystemFontLocator {
    fn candidates(&self, key: FontKey) -> Vec<FontSource> {
        let index = self.index.get_or_init(|| self.scan());
        let mut names: Vec<&str> = candidate_files(key).to_vec();
        if key.bold {
            names.extend(candidate_files(FontKey { bold: false, ..key }));
        }
        names
            .into_iter()
            .filter_map(|name| index.get(&name.to_lowercase()))
            .map(|path| FontSource::File(path.clone()))
            .collect()
    }
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

/// A parsed-and-validated font program ready for embedding.
pub struct FontProgram {
    pub name: String,
    pub data: Arc<Vec<u8>>,
    pub face_index: u32,
}

fn font_family_name(face: &Face) -> Option<String> {
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

/// Pick the face of a (possibly collection) font whose weight matches `bold`.
fn pick_face(data: &[u8], bold: bool) -> Option<(u32, String)> {
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    let mut fallback = None;
    for index in 0..count {
        let Ok(face) = Face::parse(data, index) else {
            continue;
        };
        let name = font_family_name(&face).unwrap_or_else(|| format!("Font{index}"));
        if face.is_bold() == bold {
            return Some((index, name));
        }
        fallback.get_or_insert((index, name));
    }
    fallback
}

pub(crate) fn load_program(source: &FontSource, bold: bool) -> Option<FontProgram> {
    match source {
        FontSource::File(path) => {
            let file = std::fs::File::open(path).ok()?;
            let map = unsafe { Mmap::map(&file) }.ok()?;
            let (face_index, name) = pick_face(&map, bold)?;
            log::debug!("Font candidate accepted: {} (face {face_index})", path.display());
            Some(FontProgram {
                name,
                data: Arc::new(map.to_vec()),
                face_index,
            })
        }
        FontSource::Bytes(bytes) => {
            let (face_index, name) = pick_face(bytes, bold)?;
            Some(FontProgram {
                name,
                data: Arc::clone(bytes),
                face_index,
            })
        }
    }
}

/// Resolve a program for `key`: explicit override first, then the locator.
pub(crate) fn resolve_program(
    key: FontKey,
    override_path: Option<&Path>,
    locator: &dyn FontLocator,
) -> Option<FontProgram> {
    if let Some(path) = override_path {
        if let Some(program) = load_program(&FontSource::File(path.to_path_buf()), key.bold) {
            return Some(program);
        }
        log::warn!("Font override {} is not a usable font file", path.display());
    }
    locator
        .candidates(key)
        .iter()
        .find_map(|source| load_program(source, key.bold))
}

/// The standard PDF faces used when no font program is available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinFace {
    TimesRoman,
    TimesBold,
    Helvetica,
    HelveticaBold,
}

impl BuiltinFace {
    pub fn for_key(key: FontKey) -> Self {
        match (key.class, key.bold) {
            (FontClass::Serif, false) => BuiltinFace::TimesRoman,
            (FontClass::Serif, true) => BuiltinFace::TimesBold,
            (FontClass::Sans, false) => BuiltinFace::Helvetica,
            (FontClass::Sans, true) => BuiltinFace::HelveticaBold,
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            BuiltinFace::TimesRoman => "Times-Roman",
            BuiltinFace::TimesBold => "Times-Bold",
            BuiltinFace::Helvetica => "Helvetica",
            BuiltinFace::HelveticaBold => "Helvetica-Bold",
        }
    }

    fn widths(self) -> Vec<f32> {
        match self {
            BuiltinFace::TimesRoman | BuiltinFace::TimesBold => times_widths(),
            BuiltinFace::Helvetica | BuiltinFace::HelveticaBold => helvetica_widths(),
        }
    }
}

pub(crate) struct FontEntry {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    widths_1000: Vec<f32>,
    char_widths_1000: BTreeMap<char, f32>,
    pub(crate) char_to_gid: Option<BTreeMap<char, u16>>,
    pub(crate) metrics: FontMetrics,
}

impl FontEntry {
    /// Width of one character in 1000-units: embedded advance, WinAnsi table,
    /// then a full-width/half-width guess for glyphs the face lacks.
    pub(crate) fn char_width_1000(&self, ch: char) -> f32 {
        if let Some(&w) = self.char_widths_1000.get(&ch) {
            return w;
        }
        let byte = char_to_winansi(ch);
        if byte >= 32 {
            let w = self.widths_1000[(byte - 32) as usize];
            if w > 0.0 {
                return w;
            }
        }
        if ch as u32 >= 0x2E80 { 1000.0 } else { 500.0 }
    }

    pub(crate) fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// WinAnsi bytes for the standard faces; unmappable characters are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(char_to_winansi)
        .filter(|&b| b != 0)
        .collect()
}

/// Encode text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &BTreeMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.extend_from_slice(&gid.to_be_bytes());
    }
    out
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,
            33..=47 => 333.0,
            48..=57 => 556.0,
            58..=64 => 333.0,
            73 | 74 => 278.0,
            77 => 833.0,
            65..=90 => 667.0,
            91..=96 => 333.0,
            102 | 105 | 106 | 108 | 116 => 278.0,
            109 | 119 => 833.0,
            97..=122 => 556.0,
            _ => 556.0,
        })
        .collect()
}

/// Approximate Times widths at 1000 units/em for WinAnsi chars 32..=255.
fn times_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 | 44 | 46 => 250.0,
            33..=47 => 333.0,
            48..=57 => 500.0,
            58..=64 => 333.0,
            73 => 333.0,
            74 => 389.0,
            77 => 889.0,
            87 => 944.0,
            65..=90 => 667.0,
            91..=96 => 333.0,
            105 | 106 | 108 => 278.0,
            102 | 114 | 116 => 333.0,
            109 => 778.0,
            119 => 722.0,
            97..=122 => 480.0,
            _ => 500.0,
        })
        .collect()
}

/// Embed a TrueType/OpenType program as a subsetted Type0 font with Identity-H encoding.
pub(crate) fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    pdf_name: String,
    program: &FontProgram,
    used_chars: &BTreeSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<FontEntry> {
    let font_data = program.data.as_slice();
    let face = Face::parse(font_data, program.face_index).ok()?;

    let units = face.units_per_em() as f32;
    let ascent = face.ascender() as f32 / units * 1000.0;
    let descent = face.descender() as f32 / units * 1000.0;
    let cap_height = face
        .capital_height()
        .map(|h| h as f32 / units * 1000.0)
        .unwrap_or(700.0);

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        bb.x_min as f32 / units * 1000.0,
        bb.y_min as f32 / units * 1000.0,
        bb.x_max as f32 / units * 1000.0,
        bb.y_max as f32 / units * 1000.0,
    );

    let widths_1000: Vec<f32> = (32u8..=255u8)
        .map(|byte| {
            face.glyph_index(winansi_to_char(byte))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|adv| adv as f32 / units * 1000.0)
                .unwrap_or(0.0)
        })
        .collect();

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = BTreeMap::new();
    let mut char_widths_1000 = BTreeMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    for &ch in used_chars {
        if let Some(gid) = face.glyph_index(ch) {
            let new_gid = remapper.remap(gid.0);
            char_to_gid.insert(ch, new_gid);
            let w = face
                .glyph_hor_advance(gid)
                .map(|adv| adv as f32 / units * 1000.0)
                .unwrap_or(0.0);
            char_widths_1000.insert(ch, w);
            gid_widths.push((new_gid, w));
        }
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset_data = subsetter::subset(font_data, program.face_index, &remapper)
        .unwrap_or_else(|e| {
            log::warn!("Font subsetting failed for {}: {e}; embedding full font", program.name);
            font_data.to_vec()
        });

    let descriptor_ref = alloc();
    let data_ref = alloc();
    let data_len = i32::try_from(subset_data.len()).ok()?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    let ps_name: String = program
        .name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let ps_name = if ps_name.is_empty() {
        pdf_name.clone()
    } else {
        ps_name
    };

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(ascent)
        .descent(descent)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(data_ref);

    let cid_font_ref = alloc();
    let system_info = pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info);
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let tounicode_ref = alloc();
    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(
        Name(cmap_name.as_bytes()),
        pdf_writer::types::SystemInfo {
            registry: pdf_writer::Str(b"Adobe"),
            ordering: pdf_writer::Str(b"Identity"),
            supplement: 0,
        },
    );
    for (&ch, &new_gid) in &char_to_gid {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    let metrics = FontMetrics {
        em_ratio: (face.ascender() as f32 - face.descender() as f32) / units,
        ascender_ratio: face.ascender() as f32 / units,
    };

    Some(FontEntry {
        pdf_name,
        font_ref,
        widths_1000,
        char_widths_1000,
        char_to_gid: Some(char_to_gid),
        metrics,
    })
}

/// Register one of the standard 14 faces with WinAnsi encoding.
pub(crate) fn embed_builtin(pdf: &mut Pdf, font_ref: Ref, pdf_name: String, face: BuiltinFace) -> FontEntry {
    pdf.type1_font(font_ref)
        .base_font(Name(face.base_font().as_bytes()))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    FontEntry {
        pdf_name,
        font_ref,
        widths_1000: face.widths(),
        char_widths_1000: BTreeMap::new(),
        char_to_gid: None,
        metrics: FontMetrics::BUILTIN,
    }
}
