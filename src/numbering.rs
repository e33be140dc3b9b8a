use std::collections::{BTreeSet, HashMap};

use crate::model::{Heading, HeadingKind, NumeralFormat, RefTables};

/// Deepest list level tracked per list.
pub const MAX_LEVELS: usize = 10;

const HANGUL_SYLLABLES: [char; 14] = [
    '가', '나', '다', '라', '마', '바', '사', '아', '자', '차', '카', '타', '파', '하',
];
const HANGUL_JAMO: [char; 14] = [
    'ㄱ', 'ㄴ', 'ㄷ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅅ', 'ㅇ', 'ㅈ', 'ㅊ', 'ㅋ', 'ㅌ', 'ㅍ', 'ㅎ',
];
const IDEOGRAPH_DIGITS: [char; 10] = ['〇', '一', '二', '三', '四', '五', '六', '七', '八', '九'];
const CIRCLED_DIGIT_FIRST: u32 = 0x2460;
const CIRCLED_JAMO_FIRST: u32 = 0x3260;
const CIRCLED_SYLLABLE_FIRST: u32 = 0x326E;

/// Render `n` in the given numeral system. Zero is always rendered as "0".
pub fn format_numeral(n: u32, format: NumeralFormat) -> String {
    if n == 0 {
        return "0".to_string();
    }
    match format {
        NumeralFormat::Digit => n.to_string(),
        NumeralFormat::CircledDigit if n <= 20 => circled(CIRCLED_DIGIT_FIRST, n - 1),
        NumeralFormat::CircledDigit => n.to_string(),
        NumeralFormat::RomanUpper => roman(n),
        NumeralFormat::RomanLower => roman(n).to_lowercase(),
        NumeralFormat::LatinUpper => latin(n, b'A'),
        NumeralFormat::LatinLower => latin(n, b'a'),
        NumeralFormat::HangulSyllable => HANGUL_SYLLABLES[(n as usize - 1) % 14].to_string(),
        NumeralFormat::HangulJamo => HANGUL_JAMO[(n as usize - 1) % 14].to_string(),
        NumeralFormat::CircledHangulSyllable => circled(CIRCLED_SYLLABLE_FIRST, (n - 1) % 14),
        NumeralFormat::CircledHangulJamo => circled(CIRCLED_JAMO_FIRST, (n - 1) % 14),
        NumeralFormat::Ideograph => ideograph(n),
    }
}

fn circled(first: u32, offset: u32) -> String {
    char::from_u32(first + offset)
        .map(String::from)
        .unwrap_or_default()
}

fn roman(mut n: u32) -> String {
    if n >= 4000 {
        return n.to_string();
    }
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}

/// Bijective base-26: A..Z, AA, AB, ...
fn latin(mut n: u32, base: u8) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((base + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

fn ideograph(n: u32) -> String {
    if n >= 100 {
        return n.to_string();
    }
    let tens = (n / 10) as usize;
    let ones = (n % 10) as usize;
    let mut out = String::new();
    if tens > 1 {
        out.push(IDEOGRAPH_DIGITS[tens]);
    }
    if tens > 0 {
        out.push('十');
    }
    if ones > 0 {
        out.push(IDEOGRAPH_DIGITS[ones]);
    }
    out
}

/// Per-document list counters, advanced in paragraph order.
#[derive(Default)]
pub struct NumberingState {
    counters: HashMap<u32, [u32; MAX_LEVELS]>,
}

impl NumberingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw counters of a list, if it has been used.
    pub fn counters(&self, list: u32) -> Option<&[u32; MAX_LEVELS]> {
        self.counters.get(&list)
    }

    /// Prefix text for a paragraph heading, including the trailing space.
    /// Numbered headings advance the list's counter at their level.
    /// `outline_list` is the section's outline numbering id.
    pub fn next_prefix(
        &mut self,
        refs: &RefTables,
        heading: Heading,
        outline_list: Option<u32>,
    ) -> Option<String> {
        let list = match heading.kind {
            HeadingKind::Bullet => {
                let bullet = refs.bullets.get(&heading.id)?;
                return Some(format!("{} ", bullet.glyph));
            }
            HeadingKind::Number => heading.id,
            HeadingKind::Outline => outline_list.unwrap_or(heading.id),
        };
        let def = refs.numberings.get(&list)?;
        let level = heading.level as usize;
        if level >= MAX_LEVELS {
            return None;
        }
        let counters = self.counters.entry(list).or_insert([0; MAX_LEVELS]);
        counters[level] += 1;
        counters[level + 1..].fill(0);
        let counters = *counters;

        let template = &def.levels.get(level)?.template;
        let mut out = String::new();
        let mut chars = template.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '^'
                && let Some(d) = chars.peek().and_then(|c| c.to_digit(10))
                && (1..=MAX_LEVELS as u32).contains(&d)
            {
                chars.next();
                let referenced = d as usize - 1;
                let counter = counters[referenced];
                let (format, start) = def
                    .levels
                    .get(referenced)
                    .map(|l| (l.format, l.start))
                    .unwrap_or((NumeralFormat::Digit, 1));
                // Levels never reached show their start value.
                let value = counter.max(1) + start.max(1) - 1;
                out.push_str(&format_numeral(value, format));
            } else {
                out.push(ch);
            }
        }
        if out.trim().is_empty() {
            return None;
        }
        out.push(' ');
        Some(out)
    }
}

/// Every character a numbering or bullet prefix in this document can produce.
pub(crate) fn prefix_repertoire(refs: &RefTables) -> BTreeSet<char> {
    let mut chars: BTreeSet<char> = ('0'..='9').collect();
    chars.insert(' ');
    for bullet in refs.bullets.values() {
        chars.insert(bullet.glyph);
    }
    for def in refs.numberings.values() {
        for level in &def.levels {
            chars.extend(level.template.chars().filter(|&c| c != '^'));
            match level.format {
                NumeralFormat::Digit => {}
                NumeralFormat::CircledDigit => {
                    chars.extend((0..20).filter_map(|i| char::from_u32(CIRCLED_DIGIT_FIRST + i)));
                }
                NumeralFormat::RomanUpper => chars.extend("IVXLCDM".chars()),
                NumeralFormat::RomanLower => chars.extend("ivxlcdm".chars()),
                NumeralFormat::LatinUpper => chars.extend('A'..='Z'),
                NumeralFormat::LatinLower => chars.extend('a'..='z'),
                NumeralFormat::HangulSyllable => chars.extend(HANGUL_SYLLABLES),
                NumeralFormat::HangulJamo => chars.extend(HANGUL_JAMO),
                NumeralFormat::CircledHangulSyllable => {
                    chars.extend((0..14).filter_map(|i| char::from_u32(CIRCLED_SYLLABLE_FIRST + i)));
                }
                NumeralFormat::CircledHangulJamo => {
                    chars.extend((0..14).filter_map(|i| char::from_u32(CIRCLED_JAMO_FIRST + i)));
                }
                NumeralFormat::Ideograph => {
                    chars.extend(IDEOGRAPH_DIGITS);
                    chars.insert('十');
                }
            }
        }
    }
    chars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BulletDef, NumberingDef, NumberingLevel};

    fn level(template: &str, format: NumeralFormat) -> NumberingLevel {
        NumberingLevel {
            template: template.into(),
            format,
            start: 1,
        }
    }

    fn refs() -> RefTables {
        let mut refs = RefTables::default();
        refs.numberings.insert(
            1,
            NumberingDef {
                levels: vec![
                    level("^1.", NumeralFormat::Digit),
                    level("^1.^2.", NumeralFormat::Digit),
                    level("^3)", NumeralFormat::HangulSyllable),
                    level("(^5)", NumeralFormat::Digit),
                ],
            },
        );
        refs.numberings.insert(
            2,
            NumberingDef {
                levels: vec![NumberingLevel {
                    template: "^1".into(),
                    format: NumeralFormat::RomanUpper,
                    start: 3,
                }],
            },
        );
        refs.bullets.insert(4, BulletDef { glyph: '●' });
        refs
    }

    fn number(level: u8) -> Heading {
        Heading {
            kind: HeadingKind::Number,
            id: 1,
            level,
        }
    }

    #[test]
    fn numeral_systems() {
        assert_eq!(format_numeral(0, NumeralFormat::RomanUpper), "0");
        assert_eq!(format_numeral(14, NumeralFormat::RomanUpper), "XIV");
        assert_eq!(format_numeral(1994, NumeralFormat::RomanLower), "mcmxciv");
        assert_eq!(format_numeral(28, NumeralFormat::LatinUpper), "AB");
        assert_eq!(format_numeral(26, NumeralFormat::LatinLower), "z");
        assert_eq!(format_numeral(3, NumeralFormat::HangulSyllable), "다");
        assert_eq!(format_numeral(15, NumeralFormat::HangulSyllable), "가");
        assert_eq!(format_numeral(2, NumeralFormat::HangulJamo), "ㄴ");
        assert_eq!(format_numeral(1, NumeralFormat::CircledDigit), "①");
        assert_eq!(format_numeral(21, NumeralFormat::CircledDigit), "21");
        assert_eq!(format_numeral(1, NumeralFormat::CircledHangulSyllable), "㉮");
        assert_eq!(format_numeral(1, NumeralFormat::CircledHangulJamo), "㉠");
        assert_eq!(format_numeral(23, NumeralFormat::Ideograph), "二十三");
        assert_eq!(format_numeral(10, NumeralFormat::Ideograph), "十");
    }

    #[test]
    fn shallower_level_resets_deeper_counters() {
        let refs = refs();
        let mut state = NumberingState::new();
        let mut level1 = Vec::new();
        for lv in [0, 1, 1, 0, 1] {
            state.next_prefix(&refs, number(lv), None);
            level1.push(state.counters(1).unwrap()[1]);
        }
        assert_eq!(level1, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn templates_reference_other_levels() {
        let refs = refs();
        let mut state = NumberingState::new();
        assert_eq!(state.next_prefix(&refs, number(0), None).as_deref(), Some("1. "));
        assert_eq!(state.next_prefix(&refs, number(1), None).as_deref(), Some("1.1. "));
        assert_eq!(state.next_prefix(&refs, number(1), None).as_deref(), Some("1.2. "));
        assert_eq!(state.next_prefix(&refs, number(2), None).as_deref(), Some("가) "));
        // Level 5 was never reached and shows its start value.
        assert_eq!(state.next_prefix(&refs, number(3), None).as_deref(), Some("(1) "));
    }

    #[test]
    fn start_value_and_bullets() {
        let refs = refs();
        let mut state = NumberingState::new();
        let roman = Heading {
            kind: HeadingKind::Number,
            id: 2,
            level: 0,
        };
        assert_eq!(state.next_prefix(&refs, roman, None).as_deref(), Some("III "));
        assert_eq!(state.next_prefix(&refs, roman, None).as_deref(), Some("IV "));
        let bullet = Heading {
            kind: HeadingKind::Bullet,
            id: 4,
            level: 0,
        };
        assert_eq!(state.next_prefix(&refs, bullet, None).as_deref(), Some("● "));
    }

    #[test]
    fn outline_uses_section_list() {
        let refs = refs();
        let mut state = NumberingState::new();
        let outline = Heading {
            kind: HeadingKind::Outline,
            id: 0,
            level: 0,
        };
        assert_eq!(state.next_prefix(&refs, outline, Some(2)).as_deref(), Some("III "));
        assert!(state.next_prefix(&refs, outline, None).is_none());
    }

    #[test]
    fn repertoire_covers_formats() {
        let chars = prefix_repertoire(&refs());
        for ch in ['가', '하', 'X', '●', '.', '(', '7'] {
            assert!(chars.contains(&ch), "missing {ch}");
        }
        assert!(!chars.contains(&'^'));
    }
}
