//! Console rendering of result rows.

use common::Row;
use prettytable::{Cell, Row as TableRow, Table};

/// Renders rows under a header of column names as a text table.
pub fn render_table(columns: &[String], rows: &[Row]) -> String {
    let mut table = Table::new();
    table.set_titles(TableRow::new(columns.iter().map(|c| Cell::new(c)).collect()));
    for row in rows {
        let cells = row.iter().map(|v| Cell::new(&v.to_string())).collect();
        table.add_row(TableRow::new(cells));
    }
    table.to_string()
}
