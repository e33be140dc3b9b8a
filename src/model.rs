use std::collections::HashMap;

/// Length in the document's native unit, 1/7200 inch.
pub type HwpUnit = i32;

pub fn hwp_to_pt(v: HwpUnit) -> f32 {
    v as f32 / 100.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
    /// Justified on every line, including the last.
    Distribute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VerticalAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LineKind {
    None,
    #[default]
    Solid,
    Dash,
    Dot,
    Double,
}

/// Stroke description shared by cell borders, column separators and shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineStyle {
    pub kind: LineKind,
    pub width: HwpUnit,
    pub color: [u8; 3],
}

impl LineStyle {
    pub const NONE: LineStyle = LineStyle {
        kind: LineKind::None,
        width: 0,
        color: [0, 0, 0],
    };

    pub fn is_visible(&self) -> bool {
        self.kind != LineKind::None
    }
}

impl Default for LineStyle {
    /// 0.12 mm solid black, the word processor's default rule.
    fn default() -> Self {
        LineStyle {
            kind: LineKind::Solid,
            width: 34,
            color: [0, 0, 0],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumeralFormat {
    Digit,
    CircledDigit,
    RomanUpper,
    RomanLower,
    LatinUpper,
    LatinLower,
    HangulSyllable,
    HangulJamo,
    CircledHangulSyllable,
    CircledHangulJamo,
    Ideograph,
}

pub struct Document {
    pub sections: Vec<Section>,
    pub refs: RefTables,
    pub images: Vec<BinaryItem>,
    /// First page number of the document.
    pub begin_page: u32,
}

impl Default for Document {
    fn default() -> Self {
        Document {
            sections: Vec::new(),
            refs: RefTables::default(),
            images: Vec::new(),
            begin_page: 1,
        }
    }
}

/// Raw bytes of an embedded binary part, keyed by its manifest id.
#[derive(Clone, Debug)]
pub struct BinaryItem {
    pub key: String,
    pub path: String,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct Section {
    pub layout: SectionLayout,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Clone, Debug)]
pub struct SectionLayout {
    pub page_width: HwpUnit,
    pub page_height: HwpUnit,
    pub margin_left: HwpUnit,
    pub margin_right: HwpUnit,
    pub margin_top: HwpUnit,
    pub margin_bottom: HwpUnit,
    pub header: HwpUnit,
    pub footer: HwpUnit,
    pub gutter: HwpUnit,
    pub landscape: bool,
    pub columns: Option<ColumnLayout>,
    pub page_numbering: Option<PageNumbering>,
    /// Restart page numbering at this value when the section begins.
    pub page_start: Option<u32>,
    pub outline_numbering: Option<u32>,
}

impl Default for SectionLayout {
    /// A4 portrait with the word processor's stock margins.
    fn default() -> Self {
        SectionLayout {
            page_width: 59528,
            page_height: 84186,
            margin_left: 8504,
            margin_right: 8504,
            margin_top: 5668,
            margin_bottom: 4252,
            header: 4252,
            footer: 4252,
            gutter: 0,
            landscape: false,
            columns: None,
            page_numbering: None,
            page_start: None,
            outline_numbering: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnLayout {
    pub count: u16,
    /// Uniform gap, used when `sizes` is empty.
    pub gap: HwpUnit,
    pub sizes: Vec<ColumnSize>,
    pub separator: Option<LineStyle>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnSize {
    pub width: HwpUnit,
    /// Gap after this column.
    pub gap: HwpUnit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageNumberPosition {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageNumbering {
    pub position: PageNumberPosition,
    pub format: NumeralFormat,
    pub side_char: Option<char>,
}

#[derive(Default)]
pub struct Paragraph {
    pub para_pr: Option<u32>,
    pub style: Option<u32>,
    pub page_break: bool,
    pub column_break: bool,
    pub runs: Vec<Run>,
    pub line_segs: Vec<LineSeg>,
}

impl Paragraph {
    /// Plain text of the paragraph, ignoring objects and controls.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            for child in &run.children {
                if let RunChild::Text(t) = child {
                    out.push_str(t);
                }
            }
        }
        out
    }
}

/// Pre-computed geometry of one visual line, as stored by the source application.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LineSeg {
    pub text_pos: u32,
    pub vert_pos: HwpUnit,
    pub vert_size: HwpUnit,
    pub text_height: HwpUnit,
    pub baseline: HwpUnit,
    pub spacing: HwpUnit,
    pub horz_pos: HwpUnit,
    pub horz_size: HwpUnit,
    pub flags: u32,
}

#[derive(Default)]
pub struct Run {
    pub char_pr: Option<u32>,
    pub children: Vec<RunChild>,
}

pub enum RunChild {
    Text(String),
    Table(Box<Table>),
    Picture(Picture),
    Shape(Shape),
    Control(Control),
    /// Column layout change taking effect from this point on.
    ColumnDef(ColumnLayout),
}

pub enum Control {
    Footnote(Note),
    Endnote(Note),
    Header(HeaderFooter),
    Footer(HeaderFooter),
    /// Field replaced by the current page number.
    PageNumber,
}

#[derive(Default)]
pub struct Note {
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PageParity {
    #[default]
    Both,
    Even,
    Odd,
}

#[derive(Default)]
pub struct HeaderFooter {
    pub applies_to: PageParity,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AnchorRelation {
    Page,
    Column,
    #[default]
    Paragraph,
}

/// Placement of a table, picture or shape. Offsets keep the source's raw
/// unsigned encoding; negative values arrive as large numbers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatingAnchor {
    pub inline: bool,
    pub horz_rel: AnchorRelation,
    pub vert_rel: AnchorRelation,
    pub horz_offset: u32,
    pub vert_offset: u32,
    pub width: HwpUnit,
    pub height: HwpUnit,
}

impl Default for FloatingAnchor {
    fn default() -> Self {
        FloatingAnchor {
            inline: true,
            horz_rel: AnchorRelation::Paragraph,
            vert_rel: AnchorRelation::Paragraph,
            horz_offset: 0,
            vert_offset: 0,
            width: 0,
            height: 0,
        }
    }
}

pub struct Picture {
    pub anchor: FloatingAnchor,
    pub bin_ref: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Line,
}

pub struct Shape {
    pub kind: ShapeKind,
    pub anchor: FloatingAnchor,
    pub line: LineStyle,
    pub fill: Option<[u8; 3]>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellPadding {
    pub left: HwpUnit,
    pub right: HwpUnit,
    pub top: HwpUnit,
    pub bottom: HwpUnit,
}

impl Default for CellPadding {
    /// 1.8 mm left/right, 0.5 mm top/bottom.
    fn default() -> Self {
        CellPadding {
            left: 510,
            right: 510,
            top: 141,
            bottom: 141,
        }
    }
}

#[derive(Default)]
pub struct Table {
    pub rows: u16,
    pub cols: u16,
    pub width: HwpUnit,
    pub height: HwpUnit,
    pub anchor: FloatingAnchor,
    pub border_fill: Option<u32>,
    pub padding: CellPadding,
    /// Row-major.
    pub cells: Vec<Cell>,
}

pub struct Cell {
    pub col: u16,
    pub row: u16,
    pub col_span: u16,
    pub row_span: u16,
    pub width: HwpUnit,
    pub height: HwpUnit,
    pub border_fill: Option<u32>,
    pub v_align: VerticalAlign,
    pub padding: Option<CellPadding>,
    pub paragraphs: Vec<Paragraph>,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            col: 0,
            row: 0,
            col_span: 1,
            row_span: 1,
            width: 0,
            height: 0,
            border_fill: None,
            v_align: VerticalAlign::Center,
            padding: None,
            paragraphs: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BorderFill {
    pub left: LineStyle,
    pub right: LineStyle,
    pub top: LineStyle,
    pub bottom: LineStyle,
    pub fill: Option<[u8; 3]>,
}

impl Default for BorderFill {
    fn default() -> Self {
        BorderFill {
            left: LineStyle::default(),
            right: LineStyle::default(),
            top: LineStyle::default(),
            bottom: LineStyle::default(),
            fill: None,
        }
    }
}

// ---- property tables ----

#[derive(Default)]
pub struct RefTables {
    pub hangul_fonts: HashMap<u32, String>,
    pub latin_fonts: HashMap<u32, String>,
    pub char_properties: HashMap<u32, CharProperty>,
    pub para_properties: HashMap<u32, ParaProperty>,
    pub border_fills: HashMap<u32, BorderFill>,
    pub numberings: HashMap<u32, NumberingDef>,
    pub bullets: HashMap<u32, BulletDef>,
    pub styles: HashMap<u32, StyleDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CharProperty {
    /// Font size in 1/100 pt.
    pub height: HwpUnit,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikeout: bool,
    pub text_color: [u8; 3],
    pub shade_color: Option<[u8; 3]>,
    pub hangul_font: Option<u32>,
    pub latin_font: Option<u32>,
    /// Letter spacing as a percentage of the font size.
    pub spacing: i32,
}

impl Default for CharProperty {
    fn default() -> Self {
        CharProperty {
            height: 1000,
            bold: false,
            italic: false,
            underline: false,
            strikeout: false,
            text_color: [0, 0, 0],
            shade_color: None,
            hangul_font: None,
            latin_font: None,
            spacing: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineSpacingKind {
    Percent,
    Fixed,
    BetweenLines,
    AtLeast,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineSpacingSpec {
    pub kind: LineSpacingKind,
    /// Percent for `Percent`, native units otherwise.
    pub value: i32,
}

impl Default for LineSpacingSpec {
    fn default() -> Self {
        LineSpacingSpec {
            kind: LineSpacingKind::Percent,
            value: 160,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ParaMargins {
    pub left: HwpUnit,
    pub right: HwpUnit,
    /// First-line indent; negative values hang.
    pub indent: HwpUnit,
    pub prev: HwpUnit,
    pub next: HwpUnit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadingKind {
    Outline,
    Number,
    Bullet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Heading {
    pub kind: HeadingKind,
    pub id: u32,
    /// Zero-based list level.
    pub level: u8,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParaProperty {
    pub align: Alignment,
    pub line_spacing: LineSpacingSpec,
    pub margin: ParaMargins,
    pub heading: Option<Heading>,
    /// Space-width reduction in percent.
    pub condense: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NumberingLevel {
    /// Text with `^N` placeholders, N being a one-based level.
    pub template: String,
    pub format: NumeralFormat,
    pub start: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberingDef {
    pub levels: Vec<NumberingLevel>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BulletDef {
    pub glyph: char,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleDecl {
    pub name: String,
    pub para_pr: Option<u32>,
    pub char_pr: Option<u32>,
}
