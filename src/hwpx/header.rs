//! `Contents/header.xml`: fonts, character and paragraph properties,
//! border fills, numberings, bullets and styles.

use std::collections::HashMap;

use roxmltree::Node;

use crate::error::Error;
use crate::model::{
    Alignment, BorderFill, BulletDef, CharProperty, Heading, HeadingKind, LineSpacingKind,
    LineSpacingSpec, LineStyle, NumberingDef, NumberingLevel, NumeralFormat, ParaMargins,
    ParaProperty, RefTables, StyleDecl,
};

use super::{
    child, children_named, elements, id_attr, int_attr, parse_color, parse_line_kind,
    parse_mm_width, parse_numeral_format,
};

/// Every element named `name` below `root`, in document order.
fn all<'a>(root: Node<'a, 'a>, name: &'a str) -> impl Iterator<Item = Node<'a, 'a>> {
    root.descendants().filter(move |n| n.tag_name().name() == name)
}

/// Property tables and the document's first page number.
pub(super) fn read_header(xml: &str) -> Result<(RefTables, u32), Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    let mut refs = RefTables::default();

    for face in all(root, "fontface") {
        let target = match face.attribute("lang") {
            Some("HANGUL") => &mut refs.hangul_fonts,
            Some("LATIN") => &mut refs.latin_fonts,
            _ => continue,
        };
        for font in children_named(face, "font") {
            if let (Some(id), Some(name)) = (id_attr(font, "id"), font.attribute("face")) {
                target.insert(id, name.to_string());
            }
        }
    }

    for node in all(root, "borderFill") {
        if let Some(id) = id_attr(node, "id") {
            refs.border_fills.insert(id, read_border_fill(node));
        }
    }
    for node in all(root, "charPr") {
        if let Some(id) = id_attr(node, "id") {
            refs.char_properties.insert(id, read_char_property(node));
        }
    }
    for node in all(root, "paraPr") {
        if let Some(id) = id_attr(node, "id") {
            refs.para_properties.insert(id, read_para_property(node));
        }
    }
    for node in all(root, "numbering") {
        if let Some(id) = id_attr(node, "id") {
            refs.numberings.insert(id, read_numbering(node));
        }
    }
    for node in all(root, "bullet") {
        let glyph = node.attribute("char").and_then(|c| c.chars().next());
        if let (Some(id), Some(glyph)) = (id_attr(node, "id"), glyph) {
            refs.bullets.insert(id, BulletDef { glyph });
        }
    }
    for node in all(root, "style") {
        if let Some(id) = id_attr(node, "id") {
            refs.styles.insert(
                id,
                StyleDecl {
                    name: node.attribute("name").unwrap_or_default().to_string(),
                    para_pr: id_attr(node, "paraPrIDRef"),
                    char_pr: id_attr(node, "charPrIDRef"),
                },
            );
        }
    }

    let begin_page = all(root, "beginNum")
        .next()
        .and_then(|n| id_attr(n, "page"))
        .filter(|&p| p > 0)
        .unwrap_or(1);

    log::debug!(
        "header: {} char, {} para properties, {} styles",
        refs.char_properties.len(),
        refs.para_properties.len(),
        refs.styles.len()
    );
    Ok((refs, begin_page))
}

fn read_border(node: Option<Node>) -> LineStyle {
    let Some(node) = node else {
        return LineStyle::NONE;
    };
    let kind = parse_line_kind(node.attribute("type").unwrap_or("NONE"));
    LineStyle {
        kind,
        width: node
            .attribute("width")
            .and_then(parse_mm_width)
            .unwrap_or(LineStyle::default().width),
        color: node.attribute("color").and_then(parse_color).unwrap_or([0, 0, 0]),
    }
}

fn read_border_fill(node: Node) -> BorderFill {
    BorderFill {
        left: read_border(child(node, "leftBorder")),
        right: read_border(child(node, "rightBorder")),
        top: read_border(child(node, "topBorder")),
        bottom: read_border(child(node, "bottomBorder")),
        fill: node
            .descendants()
            .find(|n| n.tag_name().name() == "winBrush")
            .and_then(|b| b.attribute("faceColor"))
            .and_then(parse_color),
    }
}

fn read_char_property(node: Node) -> CharProperty {
    let mut prop = CharProperty::default();
    if let Some(h) = int_attr(node, "height").filter(|&h| h > 0) {
        prop.height = h;
    }
    if let Some(c) = node.attribute("textColor").and_then(parse_color) {
        prop.text_color = c;
    }
    // White shading is how "no shading" is usually written.
    prop.shade_color = node
        .attribute("shadeColor")
        .and_then(parse_color)
        .filter(|&c| c != [255, 255, 255]);

    for c in elements(node) {
        match c.tag_name().name() {
            "fontRef" => {
                prop.hangul_font = id_attr(c, "hangul");
                prop.latin_font = id_attr(c, "latin");
            }
            "spacing" => prop.spacing = int_attr(c, "hangul").unwrap_or(0),
            "bold" => prop.bold = true,
            "italic" => prop.italic = true,
            "underline" => prop.underline = c.attribute("type").is_some_and(|t| t != "NONE"),
            "strikeout" => {
                prop.strikeout = c
                    .attribute("shape")
                    .is_some_and(|s| s != "NONE" && s != "3D");
            }
            _ => {}
        }
    }
    prop
}

/// A margin component, written either as an attribute of `margin` or as a
/// child element carrying `value`.
fn margin_value(margin: Node, name: &str) -> i32 {
    int_attr(margin, name)
        .or_else(|| child(margin, name).and_then(|c| int_attr(c, "value")))
        .unwrap_or(0)
}

fn read_para_property(node: Node) -> ParaProperty {
    let mut prop = ParaProperty {
        condense: int_attr(node, "condense").unwrap_or(0).clamp(0, 100) as u8,
        ..ParaProperty::default()
    };
    if let Some(align) = child(node, "align") {
        prop.align = match align.attribute("horizontal") {
            Some("CENTER") => Alignment::Center,
            Some("RIGHT") => Alignment::Right,
            Some("JUSTIFY") => Alignment::Justify,
            Some("DISTRIBUTE") | Some("DISTRIBUTE_SPACE") => Alignment::Distribute,
            _ => Alignment::Left,
        };
    }
    if let Some(heading) = child(node, "heading") {
        let kind = match heading.attribute("type") {
            Some("OUTLINE") => Some(HeadingKind::Outline),
            Some("NUMBER") => Some(HeadingKind::Number),
            Some("BULLET") => Some(HeadingKind::Bullet),
            _ => None,
        };
        prop.heading = kind.map(|kind| Heading {
            kind,
            id: id_attr(heading, "idRef").unwrap_or(0),
            level: int_attr(heading, "level").unwrap_or(0).clamp(0, 9) as u8,
        });
    }
    if let Some(margin) = child(node, "margin") {
        prop.margin = ParaMargins {
            left: margin_value(margin, "left"),
            right: margin_value(margin, "right"),
            indent: margin_value(margin, "intent"),
            prev: margin_value(margin, "prev"),
            next: margin_value(margin, "next"),
        };
    }
    if let Some(spacing) = child(node, "lineSpacing") {
        let kind = match spacing.attribute("type") {
            Some("FIXED") => LineSpacingKind::Fixed,
            Some("BETWEEN_LINES") => LineSpacingKind::BetweenLines,
            Some("AT_LEAST") => LineSpacingKind::AtLeast,
            _ => LineSpacingKind::Percent,
        };
        let default = LineSpacingSpec::default().value;
        prop.line_spacing = LineSpacingSpec {
            kind,
            value: int_attr(spacing, "value").unwrap_or(default),
        };
    }
    prop
}

fn read_numbering(node: Node) -> NumberingDef {
    let mut by_level: HashMap<usize, NumberingLevel> = HashMap::new();
    for head in children_named(node, "paraHead") {
        let Some(level) = id_attr(head, "level").filter(|&l| l >= 1) else {
            continue;
        };
        by_level.insert(
            level as usize - 1,
            NumberingLevel {
                template: head.text().unwrap_or_default().to_string(),
                format: parse_numeral_format(head.attribute("numFormat").unwrap_or("DIGIT")),
                start: id_attr(head, "start").unwrap_or(1),
            },
        );
    }
    let depth = by_level.keys().max().map_or(0, |&l| l + 1);
    let levels = (0..depth)
        .map(|l| {
            by_level.remove(&l).unwrap_or(NumberingLevel {
                template: String::new(),
                format: NumeralFormat::Digit,
                start: 1,
            })
        })
        .collect();
    NumberingDef { levels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineKind;

    const HEADER: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<hh:head xmlns:hh="http://www.hancom.co.kr/hwpml/2011/head" xmlns:hc="http://www.hancom.co.kr/hwpml/2011/core" xmlns:hp="http://www.hancom.co.kr/hwpml/2011/paragraph">
  <hh:beginNum page="3" footnote="1" endnote="1"/>
  <hh:refList>
    <hh:fontfaces>
      <hh:fontface lang="HANGUL"><hh:font id="0" face="함초롬바탕"/><hh:font id="1" face="함초롬돋움"/></hh:fontface>
      <hh:fontface lang="LATIN"><hh:font id="0" face="Times New Roman"/></hh:fontface>
      <hh:fontface lang="HANJA"><hh:font id="0" face="Ignored"/></hh:fontface>
    </hh:fontfaces>
    <hh:borderFills>
      <hh:borderFill id="2">
        <hh:leftBorder type="SOLID" width="0.4 mm" color="#FF0000"/>
        <hh:rightBorder type="NONE" width="0.1 mm" color="#000000"/>
        <hh:topBorder type="DOUBLE_SLIM" width="0.5 mm" color="#000000"/>
        <hh:bottomBorder type="DASH" width="0.12 mm" color="#000000"/>
        <hc:fillBrush><hc:winBrush faceColor="#DDEEFF" hatchColor="#000000" alpha="0"/></hc:fillBrush>
      </hh:borderFill>
    </hh:borderFills>
    <hh:charProperties>
      <hh:charPr id="5" height="1400" textColor="#0000FF" shadeColor="#FFFFFF">
        <hh:fontRef hangul="1" latin="0" hanja="0"/>
        <hh:spacing hangul="-5" latin="0"/>
        <hh:bold/>
        <hh:underline type="BOTTOM" shape="SOLID" color="#000000"/>
        <hh:strikeout shape="NONE" color="#000000"/>
      </hh:charPr>
    </hh:charProperties>
    <hh:paraProperties>
      <hh:paraPr id="1" condense="20">
        <hh:align horizontal="CENTER" vertical="BASELINE"/>
        <hh:heading type="NUMBER" idRef="1" level="2"/>
        <hp:switch>
          <hp:case hp:required-namespace="http://www.hancom.co.kr/hwpml/2016/HwpUnitChar">
            <hh:margin><hc:intent value="1"/><hc:left value="1"/></hh:margin>
            <hh:lineSpacing type="PERCENT" value="999"/>
          </hp:case>
          <hp:default>
            <hh:margin><hc:intent value="-2000"/><hc:left value="3000"/><hc:right value="0"/><hc:prev value="400"/><hc:next value="200"/></hh:margin>
            <hh:lineSpacing type="AT_LEAST" value="1800"/>
          </hp:default>
        </hp:switch>
      </hh:paraPr>
    </hh:paraProperties>
    <hh:numberings>
      <hh:numbering id="1" start="0">
        <hh:paraHead start="1" level="1" numFormat="DIGIT">^1.</hh:paraHead>
        <hh:paraHead start="3" level="3" numFormat="LATIN_SMALL">^3)</hh:paraHead>
      </hh:numbering>
    </hh:numberings>
    <hh:bullets><hh:bullet id="1" char="●"/></hh:bullets>
  </hh:refList>
  <hh:styles><hh:style id="0" type="PARA" name="바탕글" paraPrIDRef="1" charPrIDRef="5"/></hh:styles>
</hh:head>"##;

    #[test]
    fn reads_property_tables() {
        let (refs, begin_page) = read_header(HEADER).unwrap();
        assert_eq!(begin_page, 3);
        assert_eq!(refs.hangul_fonts.get(&1).map(String::as_str), Some("함초롬돋움"));
        assert_eq!(refs.latin_fonts.len(), 1);
        assert_eq!(refs.bullets[&1].glyph, '●');
        assert_eq!(refs.styles[&0].para_pr, Some(1));
        assert_eq!(refs.styles[&0].name, "바탕글");
    }

    #[test]
    fn border_fill_sides() {
        let (refs, _) = read_header(HEADER).unwrap();
        let bf = refs.border_fills[&2];
        assert_eq!(bf.left.kind, LineKind::Solid);
        assert_eq!(bf.left.width, 113);
        assert_eq!(bf.left.color, [255, 0, 0]);
        assert!(!bf.right.is_visible());
        assert_eq!(bf.top.kind, LineKind::Double);
        assert_eq!(bf.bottom.kind, LineKind::Dash);
        assert_eq!(bf.fill, Some([0xDD, 0xEE, 0xFF]));
    }

    #[test]
    fn char_property_flags() {
        let (refs, _) = read_header(HEADER).unwrap();
        let cp = &refs.char_properties[&5];
        assert_eq!(cp.height, 1400);
        assert_eq!(cp.text_color, [0, 0, 255]);
        assert_eq!(cp.shade_color, None);
        assert_eq!((cp.hangul_font, cp.latin_font), (Some(1), Some(0)));
        assert_eq!(cp.spacing, -5);
        assert!(cp.bold && !cp.italic && cp.underline && !cp.strikeout);
    }

    #[test]
    fn para_property_uses_default_branch() {
        let (refs, _) = read_header(HEADER).unwrap();
        let pp = &refs.para_properties[&1];
        assert_eq!(pp.align, Alignment::Center);
        assert_eq!(pp.condense, 20);
        assert_eq!(
            pp.heading,
            Some(Heading {
                kind: HeadingKind::Number,
                id: 1,
                level: 2
            })
        );
        assert_eq!(pp.margin.indent, -2000);
        assert_eq!(pp.margin.left, 3000);
        assert_eq!(pp.margin.prev, 400);
        assert_eq!(pp.line_spacing.kind, LineSpacingKind::AtLeast);
        assert_eq!(pp.line_spacing.value, 1800);
    }

    #[test]
    fn numbering_levels_fill_gaps() {
        let (refs, _) = read_header(HEADER).unwrap();
        let levels = &refs.numberings[&1].levels;
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].template, "^1.");
        assert_eq!(levels[1].template, "");
        assert_eq!(levels[2].format, NumeralFormat::LatinLower);
        assert_eq!(levels[2].start, 3);
    }
}
