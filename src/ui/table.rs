use eframe::egui::{Align, Layout, Ui};
use egui_extras::{Column, TableBuilder};

use dsa_dashboard::export::{self, Cell};
use dsa_dashboard::ReportResult;

use super::format_number;

/// The report as a scrollable table, in export column order.
pub fn report_table(ui: &mut Ui, report: &ReportResult) {
    let table = export::report_table(report);

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .cell_layout(Layout::left_to_right(Align::Center))
        .columns(Column::auto().at_least(60.0), table.headers.len())
        .header(20.0, |mut header| {
            for name in &table.headers {
                header.col(|ui| {
                    ui.strong(name);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, table.rows.len(), |mut row| {
                let cells = &table.rows[row.index()];
                for cell in cells {
                    row.col(|ui| {
                        ui.label(display_cell(cell));
                    });
                }
            });
        });
}

fn display_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => s.clone(),
        Cell::Count(n) => n.to_string(),
        Cell::Number(v) => format_number(*v),
    }
}
