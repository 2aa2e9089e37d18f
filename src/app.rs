use eframe::egui::{self, Ui};

use dsa_dashboard::chart::NO_DATA;
use dsa_dashboard::Config;

use crate::state::AppState;
use crate::ui::{panels, plot, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct DashboardApp {
    pub state: AppState,
}

impl DashboardApp {
    pub fn new(config: Config) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: headline, chart, table ----
        egui::CentralPanel::default().show(ctx, |ui| {
            central_panel(ui, &self.state);
        });
    }
}

fn central_panel(ui: &mut Ui, state: &AppState) {
    if state.session.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to view DSA performance  (File → Open…)");
        });
        return;
    }
    let Some(computed) = &state.computed else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label("No report for the current inputs; see the status line.");
        });
        return;
    };

    panels::headline(ui, &computed.headline);
    ui.separator();

    if computed.report.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading(NO_DATA);
        });
        return;
    }

    let chart_size = egui::vec2(ui.available_width(), ui.available_height() * 0.55);
    ui.allocate_ui(chart_size, |ui: &mut Ui| {
        plot::chart(ui, &computed.chart, &state.colors);
    });
    ui.separator();
    table::report_table(ui, &computed.report);
}
