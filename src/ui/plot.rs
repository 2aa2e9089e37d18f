use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

use eframe::egui::{self, RichText, Sense, Shape, Stroke, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, PlotUi};

use dsa_dashboard::chart::{ChartKind, ChartSpec, NO_DATA};

use crate::color::SeriesColors;

use super::format_number;

// ---------------------------------------------------------------------------
// Chart canvas (central panel)
// ---------------------------------------------------------------------------

/// Draw a chart spec, or the "no data" message when it is empty.
pub fn chart(ui: &mut Ui, spec: &ChartSpec, colors: &SeriesColors) {
    ui.label(RichText::new(&spec.title).strong());
    if spec.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label(NO_DATA);
        });
        return;
    }
    match spec.kind {
        ChartKind::Bar => bar_chart(ui, spec, colors),
        ChartKind::Line => line_chart(ui, spec, colors),
        ChartKind::Pie => pie_chart(ui, spec, colors),
    }
}

/// Axis text for the category at an integer x position.
fn category_label(categories: &[String], x: f64) -> String {
    let i = x.round();
    if (x - i).abs() > 1e-6 || i < 0.0 {
        return String::new();
    }
    categories.get(i as usize).cloned().unwrap_or_default()
}

fn show_category_plot(
    ui: &mut Ui,
    id: &str,
    spec: &ChartSpec,
    add_items: impl FnOnce(&mut PlotUi),
) {
    let categories = spec.categories.clone();
    Plot::new(id)
        .legend(Legend::default())
        .x_axis_label(spec.x_label.clone())
        .y_axis_label(spec.y_label.clone())
        .x_axis_formatter(move |mark, _range| category_label(&categories, mark.value))
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, add_items);
}

/// Grouped bars: one group per category, one bar per series.
fn bar_chart(ui: &mut Ui, spec: &ChartSpec, colors: &SeriesColors) {
    let n_series = spec.series.len() as f64;
    let width = 0.8 / n_series;

    show_category_plot(ui, "bar_chart", spec, |plot_ui| {
        for (j, series) in spec.series.iter().enumerate() {
            let offset = (j as f64 - (n_series - 1.0) / 2.0) * width;
            let bars: Vec<Bar> = series
                .values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| {
                    v.map(|v| {
                        Bar::new(i as f64 + offset, v)
                            .width(width)
                            .name(&spec.categories[i])
                    })
                })
                .collect();
            plot_ui.bar_chart(
                BarChart::new(bars)
                    .name(&series.name)
                    .color(colors.color_for(&series.name)),
            );
        }
    });
}

/// One line per series; categories without a value break the line.
fn line_chart(ui: &mut Ui, spec: &ChartSpec, colors: &SeriesColors) {
    show_category_plot(ui, "line_chart", spec, |plot_ui| {
        for series in &spec.series {
            let color = colors.color_for(&series.name);
            let mut segment: Vec<[f64; 2]> = Vec::new();
            let segments = series
                .values
                .iter()
                .enumerate()
                .chain(std::iter::once((series.values.len(), &None)));
            for (i, value) in segments {
                match value {
                    Some(v) => segment.push([i as f64, *v]),
                    None if !segment.is_empty() => {
                        let points = PlotPoints::from(std::mem::take(&mut segment));
                        plot_ui.line(Line::new(points).name(&series.name).color(color).width(2.0));
                    }
                    None => {}
                }
            }
        }
    });
}

/// Pie slices drawn as fans of convex wedges, with a legend beside them.
fn pie_chart(ui: &mut Ui, spec: &ChartSpec, colors: &SeriesColors) {
    let Some(series) = spec.series.first() else {
        return;
    };
    let values: Vec<f64> = series.values.iter().map(|v| v.unwrap_or(0.0)).collect();
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return;
    }

    ui.horizontal(|ui: &mut Ui| {
        let size = ui.available_height().min(ui.available_width() * 0.6).max(120.0);
        let (rect, _) = ui.allocate_exact_size(egui::vec2(size, size), Sense::hover());
        let painter = ui.painter_at(rect);
        let center = rect.center();
        let radius = size * 0.45;

        let mut start = -FRAC_PI_2;
        for (category, value) in spec.categories.iter().zip(&values) {
            let sweep = (*value / total) as f32 * TAU;
            let color = colors.color_for(category);
            let pieces = (sweep / FRAC_PI_4).ceil().max(1.0) as usize;
            for p in 0..pieces {
                let a0 = start + sweep * p as f32 / pieces as f32;
                let a1 = start + sweep * (p + 1) as f32 / pieces as f32;
                let mut points = vec![center];
                for s in 0..=8 {
                    let a = a0 + (a1 - a0) * s as f32 / 8.0;
                    points.push(center + radius * egui::vec2(a.cos(), a.sin()));
                }
                painter.add(Shape::convex_polygon(points, color, Stroke::NONE));
            }
            start += sweep;
        }

        ui.vertical(|ui: &mut Ui| {
            for (category, value) in spec.categories.iter().zip(&values) {
                ui.horizontal(|ui: &mut Ui| {
                    let (swatch, _) = ui.allocate_exact_size(egui::vec2(12.0, 12.0), Sense::hover());
                    ui.painter().rect_filled(swatch, 2.0, colors.color_for(category));
                    ui.label(format!(
                        "{category}  {:.1}%  ({})",
                        value / total * 100.0,
                        format_number(*value)
                    ));
                });
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_label_only_on_integers() {
        let categories = vec!["A".to_string(), "B".to_string()];
        assert_eq!(category_label(&categories, 1.0), "B");
        assert_eq!(category_label(&categories, 0.5), "");
        assert_eq!(category_label(&categories, -1.0), "");
        assert_eq!(category_label(&categories, 5.0), "");
    }
}
