//! Width layout: the auto-fill pass, unit → cell mapping, and the hit-test
//! geometry recorded while rendering.

use ratatui::layout::{Position, Rect};

/// Default column width in layout units.
pub const TABLE_COLUMN_WIDTH: u32 = 200;
/// No column is ever narrower than this.
pub const TABLE_COLUMN_MIN_WIDTH: u32 = 100;

/// Stretch the last column so the widths sum to exactly `container` when they
/// fall short. Never shrinks anything.
pub fn auto_fill(widths: &[u32], container: u32) -> Vec<u32> {
    let mut out = widths.to_vec();
    let total: u64 = widths.iter().map(|&w| w as u64).sum();
    if let Some(last) = out.last_mut() {
        if total < container as u64 {
            *last += (container as u64 - total) as u32;
        }
    }
    out
}

/// Cell offset and width of each column, relative to the first one. Column
/// boundaries are rounded from cumulative unit offsets, so the spans tile
/// without gaps and a total of `n * units_per_cell` maps to exactly `n` cells.
pub fn cell_spans(widths: &[u32], units_per_cell: u32) -> Vec<(u16, u16)> {
    let upc = units_per_cell.max(1) as u64;
    let to_cells = |units: u64| ((units + upc / 2) / upc).min(u16::MAX as u64) as u16;

    let mut spans = Vec::with_capacity(widths.len());
    let mut cumulative: u64 = 0;
    let mut start = 0u16;
    for &w in widths {
        cumulative += w as u64;
        let end = to_cells(cumulative);
        spans.push((start, end.saturating_sub(start)));
        start = end;
    }
    spans
}

/// Convert a width in cells back to layout units.
pub fn cells_to_units(cells: i32, units_per_cell: u32) -> i64 {
    cells as i64 * units_per_cell.max(1) as i64
}

/// A rendered header cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub key: String,
    pub area: Rect,
    /// Hidden column shown dimmed while customizing.
    pub hidden: bool,
}

impl HeaderCell {
    /// The rightmost cell of a header is its resize handle.
    pub fn handle_x(&self) -> u16 {
        self.area.right().saturating_sub(1)
    }
}

/// Hit-test cache filled on every render and read by the next input event.
#[derive(Debug, Clone, Default)]
pub struct ColumnGeometry {
    pub header: Vec<HeaderCell>,
    /// (screen row, data row index) for every rendered data line.
    pub rows: Vec<(u16, usize)>,
    pub body: Rect,
    pub search: Rect,
}

impl ColumnGeometry {
    pub fn clear(&mut self) {
        self.header.clear();
        self.rows.clear();
        self.body = Rect::default();
        self.search = Rect::default();
    }

    pub fn header_at(&self, x: u16, y: u16) -> Option<&HeaderCell> {
        self.header
            .iter()
            .find(|c| c.area.contains(Position::new(x, y)))
    }

    pub fn resize_handle_at(&self, x: u16, y: u16) -> Option<&HeaderCell> {
        self.header_at(x, y).filter(|c| c.handle_x() == x)
    }

    pub fn row_at(&self, x: u16, y: u16) -> Option<usize> {
        if !self.body.contains(Position::new(x, y)) {
            return None;
        }
        self.rows.iter().find(|(row_y, _)| *row_y == y).map(|(_, i)| *i)
    }

    pub fn in_search(&self, x: u16, y: u16) -> bool {
        self.search.contains(Position::new(x, y))
    }
}
