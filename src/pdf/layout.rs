use crate::model::Alignment;
use crate::style::{LineSpacing, line_height};

use super::canvas::{Canvas, Dash, FontId, PageId, Stroke, TextPaint};

/// How far back from the fitted prefix to look for a break opportunity.
const LOOKBACK: usize = 15;

/// Space advance as a fraction of the font size, replacing the embedded
/// font's own space glyph.
const SPACE_EM: f32 = 0.25;

const TAB_SPACES: f32 = 4.0;

const WIDTH_EPSILON: f32 = 0.01;

/// Characters that may not begin a line under kinsoku rules.
const NO_LINE_START: &str = "!%),.:;?]}¢°’”‰′″℃、。々〉》」』】〕〗〙〛〟・ー！％），．：；？］｝｡｣､･ｰ";
/// Characters that may not end a line under kinsoku rules.
const NO_LINE_END: &str = "$([{£¥‘“〈《「『【〔〖〘〚〝（［｛｢";

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SpanStyle {
    pub font: FontId,
    pub size: f32,
    pub color: [u8; 3],
    pub highlight: Option<[u8; 3]>,
    pub underline: bool,
    pub strikeout: bool,
    /// Extra advance after each character.
    pub spacing: f32,
    /// Baseline shift, positive upwards.
    pub rise: f32,
    pub ascent_ratio: f32,
    pub em_ratio: f32,
}

/// A run of measured characters, each tagged with its span style.
#[derive(Clone, Debug, Default)]
pub(crate) struct StyledText {
    pub chars: Vec<char>,
    pub span_of: Vec<usize>,
    pub spans: Vec<SpanStyle>,
    pub advance: Vec<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LineRange {
    pub start: usize,
    pub end: usize,
    /// Last line of the paragraph or of an explicit line break.
    pub ends_block: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LineBox {
    pub height: f32,
    pub ascent: f32,
}

pub(crate) fn is_cjk(ch: char) -> bool {
    ch as u32 >= 0x2E80
}

fn is_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t')
}

impl StyledText {
    pub fn push_span(&mut self, style: SpanStyle) -> usize {
        if let Some(i) = self.spans.iter().position(|s| *s == style) {
            return i;
        }
        self.spans.push(style);
        self.spans.len() - 1
    }

    /// Append text in `span`, measuring each character on the canvas.
    /// `condense` narrows spaces by the given percentage.
    pub fn push_str(&mut self, text: &str, span: usize, canvas: &dyn Canvas, condense: f32) {
        let style = &self.spans[span];
        let space = SPACE_EM * style.size * (100.0 - condense) / 100.0 + style.spacing;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let adv = match ch {
                ' ' => space,
                '\t' => space * TAB_SPACES,
                '\n' => 0.0,
                c if c.is_control() => continue,
                c => canvas.text_width(c.encode_utf8(&mut buf), style.font, style.size) + style.spacing,
            };
            self.chars.push(ch);
            self.span_of.push(span);
            self.advance.push(adv);
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn width(&self, start: usize, end: usize) -> f32 {
        self.advance[start..end].iter().sum()
    }

    /// Visible content: anything besides whitespace and line breaks.
    pub fn has_ink(&self) -> bool {
        self.chars.iter().any(|c| !c.is_whitespace())
    }

    /// Height and ascent of a line covering `start..end`; `fallback` is used for empty lines.
    pub fn line_box(&self, start: usize, end: usize, spacing: LineSpacing, fallback: &SpanStyle) -> LineBox {
        let mut height: f32 = 0.0;
        let mut ascent: f32 = 0.0;
        let mut seen = false;
        for i in start..end {
            if self.chars[i] == '\n' {
                continue;
            }
            let s = &self.spans[self.span_of[i]];
            height = height.max(line_height(spacing, s.size, s.em_ratio));
            ascent = ascent.max(s.size * s.ascent_ratio + s.rise.max(0.0));
            seen = true;
        }
        if !seen {
            height = line_height(spacing, fallback.size, fallback.em_ratio);
            ascent = fallback.size * fallback.ascent_ratio;
        }
        LineBox { height, ascent }
    }
}

fn prefix_sums(advance: &[f32]) -> Vec<f32> {
    let mut cum = Vec::with_capacity(advance.len() + 1);
    let mut acc = 0.0;
    cum.push(acc);
    for a in advance {
        acc += a;
        cum.push(acc);
    }
    cum
}

fn is_break_opportunity(chars: &[char], b: usize) -> bool {
    let before = chars[b - 1];
    let after = chars[b];
    is_space(before) || is_space(after) || is_cjk(before) || is_cjk(after)
}

/// End index of the next line starting at `pos` within the sub-line ending at `end`.
fn next_break(chars: &[char], cum: &[f32], pos: usize, end: usize, avail: f32, kinsoku: bool) -> usize {
    let width = |a: usize, b: usize| cum[b] - cum[a];
    if width(pos, end) <= avail + WIDTH_EPSILON {
        return end;
    }
    let (mut lo, mut hi) = (0, end - pos);
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if width(pos, pos + mid) <= avail + WIDTH_EPSILON {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    let fit = pos + lo.max(1);
    if fit >= end {
        return end;
    }

    let floor = fit.saturating_sub(LOOKBACK).max(pos + 1);
    let mut brk = fit;
    for b in (floor..=fit).rev() {
        if is_break_opportunity(chars, b) {
            brk = b;
            break;
        }
    }

    if kinsoku {
        if NO_LINE_START.contains(chars[brk]) && brk - 1 > pos {
            brk -= 1;
        }
        if NO_LINE_END.contains(chars[brk - 1]) && brk - 1 > pos {
            brk -= 1;
        }
    }
    brk
}

/// Break `chars` into lines. The first line is fitted to `first_width`,
/// every later one to `cont_width`. Trailing spaces are dropped from each
/// line and leading spaces of a wrapped line are skipped.
pub(crate) fn break_lines(
    chars: &[char],
    advance: &[f32],
    first_width: f32,
    cont_width: f32,
    kinsoku: bool,
) -> Vec<LineRange> {
    let cum = prefix_sums(advance);
    let mut lines = Vec::new();
    let mut sub_start = 0;
    loop {
        let sub_end = chars[sub_start..]
            .iter()
            .position(|&c| c == '\n')
            .map_or(chars.len(), |i| sub_start + i);

        if sub_start == sub_end {
            lines.push(LineRange {
                start: sub_start,
                end: sub_start,
                ends_block: true,
            });
        }
        let mut pos = sub_start;
        while pos < sub_end {
            let avail = if lines.is_empty() { first_width } else { cont_width };
            let brk = next_break(chars, &cum, pos, sub_end, avail, kinsoku);
            let mut end = brk;
            while end > pos && is_space(chars[end - 1]) {
                end -= 1;
            }
            let mut next = brk;
            while next < sub_end && is_space(chars[next]) {
                next += 1;
            }
            lines.push(LineRange {
                start: pos,
                end,
                ends_block: next >= sub_end,
            });
            pos = next;
        }

        if sub_end >= chars.len() {
            break;
        }
        sub_start = sub_end + 1;
    }
    lines
}

/// Wrap plain text to `max_width`, measuring each character with `measure`.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut buf = [0u8; 4];
    let advance: Vec<f32> = chars
        .iter()
        .map(|c| if *c == '\n' { 0.0 } else { measure(c.encode_utf8(&mut buf)) })
        .collect();
    break_lines(&chars, &advance, max_width, max_width, false)
        .into_iter()
        .map(|l| chars[l.start..l.end].iter().collect())
        .collect()
}

/// Where and how a broken line is drawn.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LinePlacement {
    pub x: f32,
    pub width: f32,
    pub baseline: f32,
    pub align: Alignment,
    /// Stretch the line to `width` when the alignment justifies.
    pub stretch: bool,
}

/// Draw one line: highlights, then text fragments (one per word per span),
/// then underline and strikeout.
pub(crate) fn draw_line(
    canvas: &mut dyn Canvas,
    page: PageId,
    text: &StyledText,
    line: LineRange,
    place: &LinePlacement,
) {
    let (start, end) = (line.start, line.end);
    if start >= end {
        return;
    }
    let natural = text.width(start, end);
    let slack = place.width - natural;
    let count = end - start;
    let justify = matches!(place.align, Alignment::Justify | Alignment::Distribute)
        && place.stretch
        && count > 1
        && slack > 0.0;
    let extra = if justify { slack / (count - 1) as f32 } else { 0.0 };
    let x0 = match place.align {
        _ if slack <= 0.0 => place.x,
        Alignment::Center => place.x + slack / 2.0,
        Alignment::Right => place.x + slack,
        _ => place.x,
    };

    let mut fragments: Vec<(f32, String, usize)> = Vec::new();
    let mut runs: Vec<(f32, f32, usize)> = Vec::new();
    let mut current: Option<(f32, String, usize)> = None;
    let mut x = x0;
    for i in start..end {
        let ch = text.chars[i];
        let span = text.span_of[i];
        let adv = text.advance[i] + if i + 1 < end { extra } else { 0.0 };

        match runs.last_mut() {
            Some(run) if run.2 == span => run.1 = x + adv,
            _ => runs.push((x, x + adv, span)),
        }

        if ch.is_whitespace() {
            if let Some(frag) = current.take() {
                fragments.push(frag);
            }
        } else {
            match current.as_mut() {
                Some(frag) if frag.2 == span => frag.1.push(ch),
                _ => {
                    if let Some(frag) = current.take() {
                        fragments.push(frag);
                    }
                    current = Some((x, ch.to_string(), span));
                }
            }
        }
        x += adv;
    }
    if let Some(frag) = current.take() {
        fragments.push(frag);
    }

    for &(x1, x2, span) in &runs {
        let s = &text.spans[span];
        if let Some(color) = s.highlight {
            let y = place.baseline + s.rise - s.size * 0.2;
            canvas.draw_rect(page, x1, y, x2 - x1, s.size * 1.15, Some(color), None);
        }
    }

    for (fx, fragment, span) in &fragments {
        let s = &text.spans[*span];
        let paint = TextPaint {
            color: s.color,
            letter_spacing: s.spacing + extra,
        };
        canvas.draw_text(page, fragment, *fx, place.baseline + s.rise, s.font, s.size, &paint);
    }

    for &(x1, x2, span) in &runs {
        let s = &text.spans[span];
        let stroke = Stroke {
            width: (s.size * 0.05).max(0.5),
            color: s.color,
            dash: Dash::Solid,
        };
        if s.underline {
            let y = place.baseline + s.rise - s.size * 0.12;
            canvas.draw_line(page, x1, y, x2, y, &stroke);
        }
        if s.strikeout {
            let y = place.baseline + s.rise + s.size * 0.3;
            canvas.draw_line(page, x1, y, x2, y, &stroke);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(_: &str) -> f32 {
        1.0
    }

    #[test]
    fn prefers_word_boundaries() {
        for width in [9.0, 10.0, 11.0, 13.0] {
            assert_eq!(wrap_text("aaaa bbbb cccc", width, unit), vec!["aaaa bbbb", "cccc"]);
        }
    }

    #[test]
    fn force_breaks_long_words() {
        assert_eq!(wrap_text("abcdefghij", 4.0, unit), vec!["abcd", "efgh", "ij"]);
        // A single character wider than the line still advances.
        assert_eq!(wrap_text("ab", 0.5, unit), vec!["a", "b"]);
    }

    #[test]
    fn breaks_between_cjk_characters() {
        assert_eq!(wrap_text("가나다라마", 3.0, unit), vec!["가나다", "라마"]);
    }

    #[test]
    fn explicit_newlines_split_lines() {
        assert_eq!(wrap_text("ab\ncd", 10.0, unit), vec!["ab", "cd"]);
        assert_eq!(wrap_text("ab\n\ncd", 10.0, unit), vec!["ab", "", "cd"]);
        assert_eq!(wrap_text("", 10.0, unit), vec![""]);
    }

    #[test]
    fn wrapped_lines_fit_and_reconstruct() {
        let text = "the quick brown fox jumps over the lazy dog while the cat sleeps";
        let measure = |s: &str| if s == " " { 0.5 } else { 0.6 + s.len() as f32 * 0.1 };
        for width in [5.5, 8.0, 20.0] {
            let lines = wrap_text(text, width, measure);
            for line in &lines {
                let w: f32 = line.chars().map(|c| measure(&c.to_string())).sum();
                assert!(w <= width + 0.02, "{line:?} is {w} wide at {width}");
            }
            assert_eq!(lines.join(" "), text);
        }
    }

    #[test]
    fn kinsoku_keeps_closing_punctuation() {
        let chars: Vec<char> = "가나다。".chars().collect();
        let advance = vec![1.0; chars.len()];
        let plain = break_lines(&chars, &advance, 3.0, 3.0, false);
        assert_eq!((plain[0].start, plain[0].end), (0, 3));
        let strict = break_lines(&chars, &advance, 3.0, 3.0, true);
        assert_eq!((strict[0].start, strict[0].end), (0, 2));
        assert_eq!((strict[1].start, strict[1].end), (2, 4));
        assert!(strict[1].ends_block);
    }

    #[test]
    fn first_line_width_differs() {
        let chars: Vec<char> = "aa bb cc dd".chars().collect();
        let advance = vec![1.0; chars.len()];
        let lines = break_lines(&chars, &advance, 2.0, 5.0, false);
        let texts: Vec<String> = lines
            .iter()
            .map(|l| chars[l.start..l.end].iter().collect())
            .collect();
        assert_eq!(texts, vec!["aa", "bb cc", "dd"]);
    }
}
