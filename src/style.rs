use crate::fonts::{FontClass, classify_face};
use crate::model::{
    Alignment, Heading, LineSpacingKind, Paragraph, RefTables, Run, hwp_to_pt,
};

/// Smallest line pitch ever produced, in points.
const MIN_LINE_HEIGHT: f32 = 1.0;

/// Floor applied in at-least mode, as a multiple of the font size.
const AT_LEAST_FLOOR: f32 = 1.2;

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedCharStyle {
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikeout: bool,
    pub color: [u8; 3],
    pub highlight: Option<[u8; 3]>,
    pub class: FontClass,
    /// Extra advance per character, in points.
    pub spacing: f32,
}

impl Default for ResolvedCharStyle {
    fn default() -> Self {
        ResolvedCharStyle {
            size: 10.0,
            bold: false,
            italic: false,
            underline: false,
            strikeout: false,
            color: [0, 0, 0],
            highlight: None,
            class: FontClass::Serif,
            spacing: 0.0,
        }
    }
}

/// Line spacing with absolute values converted to points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineSpacing {
    Percent(f32),
    Fixed(f32),
    BetweenLines(f32),
    AtLeast(f32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedParaStyle {
    pub align: Alignment,
    pub line_spacing: LineSpacing,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    /// First-line indent; negative hangs the first line out.
    pub indent: f32,
    /// Space-width reduction in percent.
    pub condense: f32,
    pub heading: Option<Heading>,
}

impl Default for ResolvedParaStyle {
    fn default() -> Self {
        ResolvedParaStyle {
            align: Alignment::Left,
            line_spacing: LineSpacing::Percent(160.0),
            margin_left: 0.0,
            margin_right: 0.0,
            margin_top: 0.0,
            margin_bottom: 0.0,
            indent: 0.0,
            condense: 0.0,
            heading: None,
        }
    }
}

pub fn resolve_char_style(refs: &RefTables, id: Option<u32>) -> ResolvedCharStyle {
    let Some(cp) = id.and_then(|id| refs.char_properties.get(&id)) else {
        return ResolvedCharStyle::default();
    };
    let face = cp
        .hangul_font
        .and_then(|f| refs.hangul_fonts.get(&f))
        .or_else(|| cp.latin_font.and_then(|f| refs.latin_fonts.get(&f)));
    let size = if cp.height > 0 {
        hwp_to_pt(cp.height)
    } else {
        ResolvedCharStyle::default().size
    };
    ResolvedCharStyle {
        size,
        bold: cp.bold,
        italic: cp.italic,
        underline: cp.underline,
        strikeout: cp.strikeout,
        color: cp.text_color,
        highlight: cp.shade_color,
        class: face.map(|f| classify_face(f)).unwrap_or(FontClass::Serif),
        spacing: size * cp.spacing as f32 / 100.0,
    }
}

pub fn resolve_para_style(refs: &RefTables, id: Option<u32>) -> ResolvedParaStyle {
    let Some(pp) = id.and_then(|id| refs.para_properties.get(&id)) else {
        return ResolvedParaStyle::default();
    };
    let value = pp.line_spacing.value;
    let line_spacing = match pp.line_spacing.kind {
        LineSpacingKind::Percent => LineSpacing::Percent(value as f32),
        LineSpacingKind::Fixed => LineSpacing::Fixed(hwp_to_pt(value)),
        LineSpacingKind::BetweenLines => LineSpacing::BetweenLines(hwp_to_pt(value)),
        LineSpacingKind::AtLeast => LineSpacing::AtLeast(hwp_to_pt(value)),
    };
    ResolvedParaStyle {
        align: pp.align,
        line_spacing,
        margin_left: hwp_to_pt(pp.margin.left),
        margin_right: hwp_to_pt(pp.margin.right),
        margin_top: hwp_to_pt(pp.margin.prev),
        margin_bottom: hwp_to_pt(pp.margin.next),
        indent: hwp_to_pt(pp.margin.indent),
        condense: (pp.condense as f32).clamp(0.0, 75.0),
        heading: pp.heading,
    }
}

/// Paragraph style: the paragraph's own property id, else its named style's.
pub fn paragraph_style(refs: &RefTables, para: &Paragraph) -> ResolvedParaStyle {
    let id = para.para_pr.or_else(|| {
        para.style
            .and_then(|s| refs.styles.get(&s))
            .and_then(|s| s.para_pr)
    });
    resolve_para_style(refs, id)
}

/// Run style: the run's own property id, else the paragraph style's.
pub fn run_style(refs: &RefTables, para: &Paragraph, run: &Run) -> ResolvedCharStyle {
    resolve_char_style(refs, run.char_pr.or_else(|| paragraph_char_pr(refs, para)))
}

/// Character style used for paragraph-level text with no run of its own
/// (numbering prefixes, empty paragraphs).
pub fn paragraph_char_style(refs: &RefTables, para: &Paragraph) -> ResolvedCharStyle {
    let id = para
        .runs
        .iter()
        .find_map(|r| r.char_pr)
        .or_else(|| paragraph_char_pr(refs, para));
    resolve_char_style(refs, id)
}

fn paragraph_char_pr(refs: &RefTables, para: &Paragraph) -> Option<u32> {
    para.style
        .and_then(|s| refs.styles.get(&s))
        .and_then(|s| s.char_pr)
}

/// Line pitch for text of `size` points in a face with the given em ratio.
pub fn line_height(spacing: LineSpacing, size: f32, em_ratio: f32) -> f32 {
    let natural = size * em_ratio;
    let h = match spacing {
        LineSpacing::Percent(pct) => natural * pct / 100.0,
        LineSpacing::Fixed(pt) => pt,
        LineSpacing::BetweenLines(gap) => size + gap,
        LineSpacing::AtLeast(min) => natural.max(AT_LEAST_FLOOR * size).max(min),
    };
    if h.is_finite() {
        h.max(MIN_LINE_HEIGHT)
    } else {
        MIN_LINE_HEIGHT
    }
}
