use crate::model::{BorderFill, Cell, CellPadding, LineKind, LineStyle, Table, VerticalAlign, hwp_to_pt};

use super::canvas::PageId;
use super::paragraph::{Block, ParaCtx};
use super::{Engine, Flow, stroke_for};

/// Narrowest column ever produced, in native units.
const MIN_COLUMN: f32 = 100.0;
/// Shortest row ever produced, in points.
const MIN_ROW: f32 = 1.0;
/// Share of measured content above a declared row height that is honoured.
/// Embedded faces run wider than the reference fonts, so full growth overshoots.
const EXCESS_DAMPING: f32 = 0.5;

/// Column widths in native units for a `table.cols`-wide grid.
///
/// Unit-span cells fix their column first; multi-span cells, narrowest span
/// first, share what is left of their declared width among their unknown
/// columns. Columns still unknown split the rest of the table width
/// (`available` when the table declares none).
pub fn infer_column_widths(table: &Table, available: f32) -> Vec<f32> {
    let n = grid_cols(table);
    if n == 0 {
        return Vec::new();
    }
    let mut widths: Vec<Option<f32>> = vec![None; n];
    for cell in table.cells.iter().filter(|c| c.col_span <= 1 && c.width > 0) {
        let slot = &mut widths[cell.col as usize];
        *slot = Some(slot.map_or(cell.width as f32, |w: f32| w.max(cell.width as f32)));
    }

    let mut spanning: Vec<&Cell> = table
        .cells
        .iter()
        .filter(|c| c.col_span > 1 && c.width > 0)
        .collect();
    spanning.sort_by_key(|c| c.col_span);
    for cell in spanning {
        let range = cell.col as usize..(cell.col as usize + cell.col_span as usize).min(n);
        let known: f32 = widths[range.clone()].iter().flatten().sum();
        let unknown = widths[range.clone()].iter().filter(|w| w.is_none()).count();
        if unknown == 0 {
            continue;
        }
        let share = (cell.width as f32 - known) / unknown as f32;
        if share > 0.0 {
            for w in widths[range].iter_mut().filter(|w| w.is_none()) {
                *w = Some(share);
            }
        }
    }

    let total = if table.width > 0 { table.width as f32 } else { available };
    let known: f32 = widths.iter().flatten().sum();
    let remaining = widths.iter().filter(|w| w.is_none()).count();
    let share = if remaining > 0 {
        let s = (total - known) / remaining as f32;
        if s > 0.0 { s } else { total / n as f32 }
    } else {
        0.0
    };
    widths
        .into_iter()
        .map(|w| w.unwrap_or(share).max(MIN_COLUMN))
        .collect()
}

fn grid_cols(table: &Table) -> usize {
    table
        .cells
        .iter()
        .map(|c| c.col as usize + c.col_span.max(1) as usize)
        .max()
        .unwrap_or(0)
        .max(table.cols as usize)
}

fn grid_rows(table: &Table) -> usize {
    table
        .cells
        .iter()
        .map(|c| c.row as usize + c.row_span.max(1) as usize)
        .max()
        .unwrap_or(0)
        .max(table.rows as usize)
}

/// Padding in points: left, right, top, bottom.
#[derive(Clone, Copy, Debug)]
struct Insets {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
}

impl From<CellPadding> for Insets {
    fn from(p: CellPadding) -> Self {
        Insets {
            left: hwp_to_pt(p.left),
            right: hwp_to_pt(p.right),
            top: hwp_to_pt(p.top),
            bottom: hwp_to_pt(p.bottom),
        }
    }
}

pub(crate) struct CellLayout<'d> {
    cell: &'d Cell,
    block: Block<'d>,
    insets: Insets,
    border: BorderFill,
}

/// Resolved table grid in points, relative to the table's top-left corner.
pub(crate) struct TableGeometry<'d> {
    /// Column edges; `cols + 1` entries starting at 0.
    col_x: Vec<f32>,
    row_h: Vec<f32>,
    cells: Vec<CellLayout<'d>>,
}

impl TableGeometry<'_> {
    pub fn width(&self) -> f32 {
        self.col_x.last().copied().unwrap_or(0.0)
    }

    pub fn height(&self) -> f32 {
        self.row_h.iter().sum()
    }

    fn span_x(&self, cell: &Cell) -> (f32, f32) {
        let last = self.col_x.len() - 1;
        let c0 = (cell.col as usize).min(last);
        let c1 = (cell.col as usize + cell.col_span.max(1) as usize).min(last);
        (self.col_x[c0], self.col_x[c1] - self.col_x[c0])
    }

    pub fn note_height(&self) -> f32 {
        self.cells.iter().map(|c| c.block.note_height()).sum()
    }

    /// Footnote height per row; a cell's notes are drawn with its first row.
    fn row_notes(&self) -> Vec<f32> {
        let mut notes = vec![0.0; self.row_h.len()];
        for layout in &self.cells {
            if let Some(n) = notes.get_mut(self.rows_of(layout.cell).start) {
                *n += layout.block.note_height();
            }
        }
        notes
    }

    fn rows_of(&self, cell: &Cell) -> std::ops::Range<usize> {
        let r0 = (cell.row as usize).min(self.row_h.len());
        r0..(r0 + cell.row_span.max(1) as usize).min(self.row_h.len())
    }
}

fn distribute_rowspans(row_h: &mut [f32], needs: &[(std::ops::Range<usize>, f32)]) {
    for (rows, need) in needs {
        if rows.is_empty() {
            continue;
        }
        let have: f32 = row_h[rows.clone()].iter().sum();
        if *need > have {
            let extra = (need - have) / rows.len() as f32;
            for h in &mut row_h[rows.clone()] {
                *h += extra;
            }
        }
    }
}

impl<'d> Engine<'d, '_> {
    /// Measure a table for a box `available` points wide.
    pub(crate) fn table_geometry(&mut self, table: &'d Table, available: f32, ctx: &ParaCtx) -> TableGeometry<'d> {
        let mut widths = infer_column_widths(table, available * 100.0);
        let total: f32 = widths.iter().sum::<f32>() / 100.0;
        if total > available && available > 0.0 {
            let scale = available / total;
            for w in &mut widths {
                *w *= scale;
            }
        }
        let mut col_x = vec![0.0];
        for w in &widths {
            let last = col_x.last().copied().unwrap_or(0.0);
            col_x.push(last + w / 100.0);
        }

        let cell_ctx = ParaCtx {
            floats_inline: true,
            empty_ratio: 1.0,
            lead: None,
            ..ctx.clone()
        };
        let nrows = grid_rows(table);
        let mut declared = vec![0.0f32; nrows];
        let mut content = vec![0.0f32; nrows];
        let mut spans = Vec::new();
        let mut cells = Vec::with_capacity(table.cells.len());
        let mut geometry = TableGeometry {
            col_x,
            row_h: Vec::new(),
            cells: Vec::new(),
        };
        for cell in &table.cells {
            let insets = Insets::from(cell.padding.unwrap_or(table.padding));
            let (_, width) = geometry.span_x(cell);
            let inner = (width - insets.left - insets.right).max(1.0);
            let block = self.layout_block(&cell.paragraphs, inner, &cell_ctx);
            let need = block.height + insets.top + insets.bottom;
            let row = cell.row as usize;
            if cell.row_span <= 1 && row < nrows {
                declared[row] = declared[row].max(hwp_to_pt(cell.height));
                content[row] = content[row].max(need);
            } else {
                spans.push((row.min(nrows)..(row + cell.row_span as usize).min(nrows), need));
            }
            let border = cell
                .border_fill
                .or(table.border_fill)
                .and_then(|id| self.doc.refs.border_fills.get(&id))
                .copied()
                .unwrap_or_default();
            cells.push(CellLayout {
                cell,
                block,
                insets,
                border,
            });
        }

        let mut row_h: Vec<f32> = declared
            .iter()
            .zip(&content)
            .map(|(&d, &c)| if d > 0.0 { d + EXCESS_DAMPING * (c - d).max(0.0) } else { c })
            .collect();
        distribute_rowspans(&mut row_h, &spans);
        for h in &mut row_h {
            *h = h.clamp(MIN_ROW, ctx.max_height.max(MIN_ROW));
        }
        geometry.row_h = row_h;
        geometry.cells = cells;
        geometry
    }

    /// Draw a whole table with its top-left corner at (x, top), ignoring page bounds.
    pub(crate) fn draw_table(&mut self, page: PageId, geometry: &TableGeometry<'d>, x: f32, top: f32) {
        let mut row_top = Vec::with_capacity(geometry.row_h.len());
        let mut y = top;
        for h in &geometry.row_h {
            row_top.push(y);
            y -= h;
        }
        for layout in &geometry.cells {
            let rows = geometry.rows_of(layout.cell);
            let Some(&cell_top) = row_top.get(rows.start) else {
                continue;
            };
            let (cx, w) = geometry.span_x(layout.cell);
            let h: f32 = geometry.row_h[rows].iter().sum();
            self.draw_cell(page, layout, x + cx, cell_top, w, h, true);
        }
    }

    /// Place a table in the body flow one row at a time; a row that does not
    /// fit moves whole to the next column or page.
    pub(crate) fn flow_table(&mut self, flow: &mut Flow, geometry: &TableGeometry<'d>, x: f32) {
        let mut placed: Vec<(PageId, f32, f32)> = Vec::with_capacity(geometry.row_h.len());
        let notes = geometry.row_notes();
        for (i, &h) in geometry.row_h.iter().enumerate() {
            let top = self.advance(flow, h, notes[i]);
            log::debug!("Table row {i}: page {} top {top:.2} height {h:.2}", flow.page);
            placed.push((flow.page, flow.column_x() + x, top));
        }

        for layout in &geometry.cells {
            let rows = geometry.rows_of(layout.cell);
            let (cx, w) = geometry.span_x(layout.cell);
            let mut first = true;
            let mut r = rows.start;
            while r < rows.end {
                let (page, left, top) = placed[r];
                let mut h = 0.0;
                while r < rows.end && placed[r].0 == page && placed[r].1 == left {
                    h += geometry.row_h[r];
                    r += 1;
                }
                self.draw_cell(page, layout, left + cx, top, w, h, first);
                first = false;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_cell(
        &mut self,
        page: PageId,
        layout: &CellLayout<'d>,
        x: f32,
        top: f32,
        w: f32,
        h: f32,
        with_content: bool,
    ) {
        let border = &layout.border;
        if let Some(fill) = border.fill {
            self.canvas.draw_rect(page, x, top - h, w, h, Some(fill), None);
        }
        let bottom = top - h;
        self.draw_border(page, &border.top, (x, top), (x + w, top), false);
        self.draw_border(page, &border.bottom, (x, bottom), (x + w, bottom), false);
        self.draw_border(page, &border.left, (x, top), (x, bottom), true);
        self.draw_border(page, &border.right, (x + w, top), (x + w, bottom), true);

        if !with_content {
            return;
        }
        let insets = layout.insets;
        let slack = (h - insets.top - insets.bottom - layout.block.height).max(0.0);
        let offset = match layout.cell.v_align {
            VerticalAlign::Top => 0.0,
            VerticalAlign::Center => slack / 2.0,
            VerticalAlign::Bottom => slack,
        };
        self.draw_block(page, &layout.block, x + insets.left, top - insets.top - offset);
    }

    fn draw_border(&mut self, page: PageId, style: &LineStyle, from: (f32, f32), to: (f32, f32), vertical: bool) {
        let Some(stroke) = stroke_for(style) else {
            return;
        };
        if style.kind == LineKind::Double {
            let d = stroke.width;
            let (dx, dy) = if vertical { (d, 0.0) } else { (0.0, d) };
            for sign in [-1.0, 1.0] {
                self.canvas.draw_line(
                    page,
                    from.0 + sign * dx,
                    from.1 + sign * dy,
                    to.0 + sign * dx,
                    to.1 + sign * dy,
                    &stroke,
                );
            }
        } else {
            self.canvas.draw_line(page, from.0, from.1, to.0, to.1, &stroke);
        }
    }
}
