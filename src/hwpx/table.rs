//! `hp:tbl` elements.

use roxmltree::Node;

use crate::model::{Cell, CellPadding, Table, VerticalAlign};

use super::{SectionReader, child, children_named, flag_attr, id_attr, int_attr, read_anchor};

fn read_padding(node: Node) -> CellPadding {
    let d = CellPadding::default();
    CellPadding {
        left: int_attr(node, "left").unwrap_or(d.left),
        right: int_attr(node, "right").unwrap_or(d.right),
        top: int_attr(node, "top").unwrap_or(d.top),
        bottom: int_attr(node, "bottom").unwrap_or(d.bottom),
    }
}

fn span(v: Option<i32>) -> u16 {
    v.unwrap_or(1).clamp(1, u16::MAX as i32) as u16
}

fn v_align(cell: Node) -> VerticalAlign {
    match child(cell, "subList").and_then(|s| s.attribute("vertAlign")) {
        Some("TOP") => VerticalAlign::Top,
        Some("BOTTOM") => VerticalAlign::Bottom,
        _ => VerticalAlign::Center,
    }
}

pub(super) fn read_table(node: Node, reader: &mut SectionReader) -> Table {
    let mut table = Table {
        rows: id_attr(node, "rowCnt").unwrap_or(0) as u16,
        cols: id_attr(node, "colCnt").unwrap_or(0) as u16,
        anchor: read_anchor(node),
        border_fill: id_attr(node, "borderFillIDRef"),
        padding: child(node, "inMargin").map(read_padding).unwrap_or_default(),
        ..Table::default()
    };
    table.width = table.anchor.width;
    table.height = table.anchor.height;

    table.cells = match strict_cells(node, reader) {
        Some(cells) => cells,
        None => {
            log::warn!("table structure is incomplete; rebuilding the grid from row order");
            scanned_cells(node, &table, reader)
        }
    };

    let rows = table.cells.iter().map(|c| c.row + c.row_span).max().unwrap_or(0);
    let cols = table.cells.iter().map(|c| c.col + c.col_span).max().unwrap_or(0);
    table.rows = table.rows.max(rows);
    table.cols = table.cols.max(cols);
    table.cells.sort_by_key(|c| (c.row, c.col));
    table
}

/// Cells when every `tc` carries its address, span and size; `None` otherwise.
fn strict_cells(node: Node, reader: &mut SectionReader) -> Option<Vec<Cell>> {
    let rows = children_named(node, "tr");
    if rows.is_empty() {
        return None;
    }
    let mut cells = Vec::new();
    for tc in rows.into_iter().flat_map(|tr| children_named(tr, "tc")) {
        let addr = child(tc, "cellAddr")?;
        let cell_span = child(tc, "cellSpan")?;
        let size = child(tc, "cellSz")?;
        cells.push(Cell {
            col: id_attr(addr, "colAddr")? as u16,
            row: id_attr(addr, "rowAddr")? as u16,
            col_span: span(int_attr(cell_span, "colSpan")),
            row_span: span(int_attr(cell_span, "rowSpan")),
            width: int_attr(size, "width").unwrap_or(0),
            height: int_attr(size, "height").unwrap_or(0),
            border_fill: id_attr(tc, "borderFillIDRef"),
            v_align: v_align(tc),
            padding: flag_attr(tc, "hasMargin")
                .then(|| child(tc, "cellMargin").map(read_padding))
                .flatten(),
            paragraphs: reader.sub_paragraphs(tc),
        });
    }
    Some(cells)
}

fn owner_is<'a>(n: Node<'a, 'a>, owner: Node<'a, 'a>, tag: &str) -> bool {
    n.ancestors()
        .skip(1)
        .find(|a| a.tag_name().name() == tag)
        .is_some_and(|a| a == owner)
}

/// Best-effort grid from the order of `tr`/`tc` tags alone.
fn scanned_cells(node: Node, table: &Table, reader: &mut SectionReader) -> Vec<Cell> {
    let rows: Vec<Node> = node
        .descendants()
        .filter(|n| n.tag_name().name() == "tr" && owner_is(*n, node, "tbl"))
        .collect();
    let widest = rows
        .iter()
        .map(|tr| tr.descendants().filter(|n| n.tag_name().name() == "tc" && owner_is(*n, *tr, "tr")).count())
        .max()
        .unwrap_or(0)
        .max(1);
    let col_width = table.width / widest as i32;

    let mut cells = Vec::new();
    for (r, tr) in rows.iter().enumerate() {
        let tcs = tr
            .descendants()
            .filter(|n| n.tag_name().name() == "tc" && owner_is(*n, *tr, "tr"));
        for (c, tc) in tcs.enumerate() {
            cells.push(Cell {
                col: c as u16,
                row: r as u16,
                width: col_width,
                border_fill: id_attr(tc, "borderFillIDRef"),
                paragraphs: reader.sub_paragraphs(tc),
                ..Cell::default()
            });
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::super::read_section;
    use crate::model::RunChild;

    use super::*;

    fn first_table(xml: &str) -> Table {
        let body = format!(
            r#"<hs:sec xmlns:hs="urn:s" xmlns:hp="urn:p"><hp:p><hp:run>{xml}</hp:run></hp:p></hs:sec>"#
        );
        let section = read_section(&body).unwrap();
        let mut paragraphs = section.paragraphs;
        let mut runs = paragraphs.remove(0).runs;
        match runs.remove(0).children.remove(0) {
            RunChild::Table(t) => *t,
            _ => panic!("expected a table"),
        }
    }

    fn cell(row: u16, col: u16, span: (u16, u16), text: &str) -> String {
        format!(
            r#"<hp:tc borderFillIDRef="3"><hp:subList vertAlign="TOP"><hp:p><hp:run><hp:t>{text}</hp:t></hp:run></hp:p></hp:subList>
               <hp:cellAddr colAddr="{col}" rowAddr="{row}"/><hp:cellSpan colSpan="{}" rowSpan="{}"/><hp:cellSz width="1000" height="500"/></hp:tc>"#,
            span.0, span.1
        )
    }

    #[test]
    fn structured_cells() {
        let xml = format!(
            r#"<hp:tbl rowCnt="2" colCnt="2" borderFillIDRef="3">
                 <hp:sz width="2000" height="1000"/><hp:pos treatAsChar="1"/>
                 <hp:inMargin left="100" right="100" top="50" bottom="50"/>
                 <hp:tr>{}{}</hp:tr><hp:tr>{}</hp:tr>
               </hp:tbl>"#,
            cell(0, 0, (1, 2), "tall"),
            cell(0, 1, (1, 1), "b"),
            cell(1, 1, (1, 1), "d"),
        );
        let table = first_table(&xml);
        assert_eq!((table.rows, table.cols), (2, 2));
        assert_eq!(table.width, 2000);
        assert!(table.anchor.inline);
        assert_eq!(table.padding.left, 100);
        assert_eq!(table.cells.len(), 3);
        assert_eq!(table.cells[0].row_span, 2);
        assert_eq!(table.cells[0].v_align, VerticalAlign::Top);
        assert_eq!(table.cells[2].paragraphs[0].plain_text(), "d");
        assert_eq!(table.cells[2].border_fill, Some(3));
    }

    #[test]
    fn incomplete_cells_fall_back_to_tag_order() {
        let xml = r#"<hp:tbl borderFillIDRef="1">
              <hp:sz width="3000" height="1000"/>
              <hp:tr><hp:tc><hp:subList><hp:p><hp:run><hp:t>a</hp:t></hp:run></hp:p></hp:subList></hp:tc>
                     <hp:tc><hp:subList><hp:p><hp:run><hp:t>b</hp:t></hp:run></hp:p></hp:subList></hp:tc>
                     <hp:tc/></hp:tr>
              <hp:tr><hp:tc><hp:subList><hp:p><hp:run><hp:t>c</hp:t></hp:run></hp:p></hp:subList></hp:tc></hp:tr>
            </hp:tbl>"#;
        let table = first_table(xml);
        assert_eq!((table.rows, table.cols), (2, 3));
        assert_eq!(table.cells.len(), 4);
        assert_eq!(table.cells[1].col, 1);
        assert_eq!(table.cells[1].width, 1000);
        assert_eq!(table.cells[3].row, 1);
        assert_eq!(table.cells[3].paragraphs[0].plain_text(), "c");
    }
}
