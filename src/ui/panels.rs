use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use dsa_dashboard::data::filter::Comparator;
use dsa_dashboard::export::ExportFormat;
use dsa_dashboard::report::Headline;
use dsa_dashboard::{ChartView, Granularity, Stat};

use crate::state::{AppState, DateChoice, ReportKind};

use super::format_number;

const WARNING: Color32 = Color32::from_rgb(210, 140, 20);

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    let (agents, metrics) = match &state.session {
        Some(session) => (
            session.dataset().agents_sorted(),
            session.dataset().metric_names.clone(),
        ),
        None => {
            ui.label("No dataset loaded.");
            return;
        }
    };

    let mut changed = false;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Agents ----
            let header = format!("Agents  ({}/{})", state.selected_agents.len(), agents.len());
            egui::CollapsingHeader::new(RichText::new(header).strong())
                .id_salt("agents")
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    ui.horizontal(|ui: &mut Ui| {
                        if ui.small_button("All").clicked() {
                            state.select_all_agents();
                        }
                        if ui.small_button("None").clicked() {
                            state.select_no_agents();
                        }
                    });
                    if state.selected_agents.is_empty() {
                        ui.weak("Nothing ticked: every agent is included");
                    }
                    for agent in &agents {
                        let mut checked = state.selected_agents.contains(agent);
                        let text = RichText::new(agent).color(state.colors.color_for(agent));
                        if ui.checkbox(&mut checked, text).changed() {
                            state.toggle_agent(agent);
                        }
                    }
                });
            ui.separator();

            // ---- Date range ----
            ui.strong("Date range");
            let current = state.date_choice.preset(state.custom_start, state.custom_end);
            egui::ComboBox::from_id_salt("date_choice")
                .selected_text(current.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for choice in DateChoice::ALL {
                        let label = choice.preset(state.custom_start, state.custom_end).label();
                        changed |= ui
                            .selectable_value(&mut state.date_choice, choice, label)
                            .changed();
                    }
                });
            if state.date_choice == DateChoice::Custom {
                egui::Grid::new("custom_dates").num_columns(2).show(ui, |ui: &mut Ui| {
                    ui.label("From");
                    changed |= ui
                        .add(DatePickerButton::new(&mut state.custom_start).id_salt("start_date"))
                        .changed();
                    ui.end_row();
                    ui.label("To");
                    changed |= ui
                        .add(DatePickerButton::new(&mut state.custom_end).id_salt("end_date"))
                        .changed();
                    ui.end_row();
                });
            }
            ui.separator();

            // ---- Thresholds ----
            ui.strong("Thresholds");
            let mut remove = None;
            for (i, t) in state.thresholds.iter_mut().enumerate() {
                ui.horizontal(|ui: &mut Ui| {
                    egui::ComboBox::from_id_salt(("threshold_metric", i))
                        .selected_text(t.metric.as_str())
                        .width(80.0)
                        .show_ui(ui, |ui: &mut Ui| {
                            for m in &metrics {
                                changed |= ui
                                    .selectable_value(&mut t.metric, m.clone(), m.as_str())
                                    .changed();
                            }
                        });
                    egui::ComboBox::from_id_salt(("threshold_op", i))
                        .selected_text(t.comparator.symbol())
                        .width(40.0)
                        .show_ui(ui, |ui: &mut Ui| {
                            for op in Comparator::ALL {
                                changed |= ui
                                    .selectable_value(&mut t.comparator, op, op.symbol())
                                    .changed();
                            }
                        });
                    changed |= ui.add(DragValue::new(&mut t.value).speed(10.0)).changed();
                    if ui.small_button("✕").clicked() {
                        remove = Some(i);
                    }
                });
            }
            if let Some(i) = remove {
                state.remove_threshold(i);
            }
            if ui.small_button("Add threshold").clicked() {
                state.add_threshold();
            }
            ui.separator();

            // ---- Report ----
            ui.strong("Report");
            ui.horizontal(|ui: &mut Ui| {
                changed |= ui
                    .radio_value(&mut state.report_kind, ReportKind::Summary, "Summary")
                    .changed();
                changed |= ui
                    .radio_value(&mut state.report_kind, ReportKind::TimeSeries, "Time series")
                    .changed();
            });
            if state.report_kind == ReportKind::TimeSeries {
                egui::ComboBox::from_id_salt("granularity")
                    .selected_text(state.granularity.name())
                    .show_ui(ui, |ui: &mut Ui| {
                        for g in Granularity::ALL {
                            changed |= ui
                                .selectable_value(&mut state.granularity, g, g.name())
                                .changed();
                        }
                    });
            }
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Min records per group");
                changed |= ui
                    .add(DragValue::new(&mut state.min_records).range(0..=100_000))
                    .changed();
            });
            ui.separator();

            // ---- Chart ----
            ui.strong("Chart");
            ui.horizontal(|ui: &mut Ui| {
                for view in ChartView::ALL {
                    changed |= ui
                        .selectable_value(&mut state.chart_view, view, view.label())
                        .changed();
                }
            });
            ui.horizontal(|ui: &mut Ui| {
                for stat in Stat::ALL {
                    changed |= ui
                        .selectable_value(&mut state.chart_stat, stat, stat.to_string())
                        .changed();
                }
            });
            let metric_text = state.chart_metric.as_deref().unwrap_or("All metrics");
            egui::ComboBox::from_id_salt("chart_metric")
                .selected_text(metric_text.to_string())
                .show_ui(ui, |ui: &mut Ui| {
                    changed |= ui
                        .selectable_value(&mut state.chart_metric, None, "All metrics")
                        .changed();
                    for m in &metrics {
                        changed |= ui
                            .selectable_value(&mut state.chart_metric, Some(m.clone()), m.as_str())
                            .changed();
                    }
                });
        });

    if changed {
        state.refresh();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                ui.close_menu();
                open_file_dialog(state);
            }
            let can_export = state.computed.is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Export CSV…"))
                .clicked()
            {
                ui.close_menu();
                state.export(ExportFormat::Csv);
            }
            if ui
                .add_enabled(can_export, egui::Button::new("Export Excel…"))
                .clicked()
            {
                ui.close_menu();
                state.export(ExportFormat::Xlsx);
            }
        });

        ui.separator();

        if let Some(session) = &state.session {
            let matched = state.computed.as_ref().map_or(0, |c| c.matched);
            ui.label(format!(
                "{} records loaded, {} matching",
                session.dataset().len(),
                matched
            ));
            if let Some(warning) = session.load_warning() {
                ui.separator();
                ui.label(RichText::new(warning).color(WARNING));
            }
        }

        if let Some(status) = &state.status {
            ui.separator();
            let color = if status.is_error {
                Color32::RED
            } else {
                ui.visuals().weak_text_color()
            };
            ui.label(RichText::new(&status.text).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// Headline cards
// ---------------------------------------------------------------------------

pub fn headline(ui: &mut Ui, headline: &Headline) {
    ui.horizontal_wrapped(|ui: &mut Ui| {
        card(ui, "Agents", headline.agents.to_string());
        card(ui, "Records", headline.records.to_string());
        for (name, total) in &headline.metric_totals {
            card(ui, &format!("Total {name}"), format_number(*total));
        }
        if let Some(payout) = headline.payout {
            card(ui, "Estimated payout", format_number(payout));
        }
    });
}

fn card(ui: &mut Ui, title: &str, value: String) {
    egui::Frame::group(ui.style()).show(ui, |ui: &mut Ui| {
        ui.vertical(|ui: &mut Ui| {
            ui.label(RichText::new(title).small());
            ui.label(RichText::new(value).heading());
        });
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open DSA data")
        .add_filter(
            "Supported files",
            &["csv", "tsv", "tab", "json", "parquet", "pq", "xlsx", "xlsm", "xls", "ods"],
        )
        .add_filter("CSV", &["csv", "tsv", "tab"])
        .add_filter("Excel", &["xlsx", "xlsm", "xls", "ods"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        state.open(&path);
    }
}
