//! Chart specifications derived from reports.
//!
//! Everything here is a pure function of a [`ReportResult`]; rendering is
//! left to the UI (or to whoever consumes the JSON form).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::report::{MetricAggregate, Period, ReportResult, Stat};

/// Message shown in place of an empty chart.
pub const NO_DATA: &str = "No data for the current filters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
}

/// One named line, bar group, or pie. `values` align with the chart's
/// categories; `None` marks a category with no data for this series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// X-axis labels (bar, line) or slice labels (pie).
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

impl ChartSpec {
    fn new(kind: ChartKind, title: String, x_label: &str, y_label: String) -> Self {
        Self {
            kind,
            title,
            x_label: x_label.to_string(),
            y_label,
            categories: Vec::new(),
            series: Vec::new(),
        }
    }

    /// The "no data" state: nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() || self.series.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Bar chart of report rows: one bar group per row, one series per metric.
///
/// With `top_n`, rows are ranked by the first metric (descending, ties in
/// report order) and cut to the first `n`.
pub fn summary_bar(report: &ReportResult, stat: Stat, top_n: Option<usize>) -> ChartSpec {
    let title = match top_n {
        Some(n) => format!("Top {n} by {} ({stat})", first_metric(report)),
        None => format!("Agents by {} ({stat})", first_metric(report)),
    };
    let mut chart = ChartSpec::new(ChartKind::Bar, title, "Agent", stat.to_string());
    if report.is_empty() {
        return chart;
    }

    let mut rows: Vec<_> = report.rows.iter().collect();
    if let Some(n) = top_n {
        if !report.metric_names.is_empty() {
            rows.sort_by(|a, b| b.metrics[0].get(stat).total_cmp(&a.metrics[0].get(stat)));
        }
        rows.truncate(n);
    }

    chart.categories = rows.iter().map(|r| r.key.to_string()).collect();
    chart.series = report
        .metric_names
        .iter()
        .enumerate()
        .map(|(i, name)| Series {
            name: name.clone(),
            values: rows.iter().map(|r| Some(r.metrics[i].get(stat))).collect(),
        })
        .collect();
    chart
}

/// Line chart over time buckets with one series per metric, combining
/// every agent in the report. Empty for a summary report.
pub fn time_series_line(report: &ReportResult, stat: Stat) -> ChartSpec {
    let mut chart = ChartSpec::new(
        ChartKind::Line,
        format!("Metrics over time ({stat})"),
        period_axis(report),
        stat.to_string(),
    );
    let periods = report.periods();
    if periods.is_empty() {
        return chart;
    }

    let width = report.metric_names.len();
    let mut totals: BTreeMap<Period, Vec<MetricAggregate>> = BTreeMap::new();
    for row in &report.rows {
        let Some(period) = row.key.period else {
            continue;
        };
        let slot = totals
            .entry(period)
            .or_insert_with(|| vec![MetricAggregate::default(); width]);
        for (acc, m) in slot.iter_mut().zip(&row.metrics) {
            *acc = acc.merge(m);
        }
    }

    chart.categories = periods.iter().map(Period::label).collect();
    chart.series = report
        .metric_names
        .iter()
        .enumerate()
        .map(|(i, name)| Series {
            name: name.clone(),
            values: periods
                .iter()
                .map(|p| Some(totals[p][i].get(stat)))
                .collect(),
        })
        .collect();
    chart
}

/// Line chart of one metric with one series per agent.
pub fn agent_trend_line(report: &ReportResult, metric: &str, stat: Stat) -> Result<ChartSpec> {
    let idx = report
        .metric_index(metric)
        .ok_or_else(|| Error::UnknownMetric(metric.to_string()))?;
    let mut chart = ChartSpec::new(
        ChartKind::Line,
        format!("{metric} by agent over time ({stat})"),
        period_axis(report),
        stat.to_string(),
    );
    let periods = report.periods();
    if periods.is_empty() {
        return Ok(chart);
    }

    chart.categories = periods.iter().map(Period::label).collect();
    for agent in report.agents() {
        let values = periods
            .iter()
            .map(|p| {
                report
                    .rows
                    .iter()
                    .find(|r| r.key.agent == agent && r.key.period == Some(*p))
                    .map(|r| r.metrics[idx].get(stat))
            })
            .collect();
        chart.series.push(Series {
            name: agent.to_string(),
            values,
        });
    }
    Ok(chart)
}

/// Pie of each agent's share of `metric`'s sum.
///
/// Agents with a non-positive total are left out. With `top_n`, the
/// largest `n` slices are kept and the rest merged into "Other".
pub fn share_pie(report: &ReportResult, metric: &str, top_n: Option<usize>) -> Result<ChartSpec> {
    let idx = report
        .metric_index(metric)
        .ok_or_else(|| Error::UnknownMetric(metric.to_string()))?;
    let mut chart = ChartSpec::new(
        ChartKind::Pie,
        format!("Share of {metric} by agent"),
        "Agent",
        metric.to_string(),
    );

    let mut slices: Vec<(String, f64)> = Vec::new();
    for row in &report.rows {
        let value = row.metrics[idx].sum;
        match slices.last_mut() {
            Some(last) if last.0 == row.key.agent => last.1 += value,
            _ => slices.push((row.key.agent.clone(), value)),
        }
    }
    slices.retain(|(_, total)| *total > 0.0);
    if slices.is_empty() {
        return Ok(chart);
    }

    if let Some(n) = top_n {
        if slices.len() > n {
            slices.sort_by(|a, b| b.1.total_cmp(&a.1));
            let other: f64 = slices[n..].iter().map(|(_, v)| v).sum();
            slices.truncate(n);
            slices.push(("Other".to_string(), other));
        }
    }

    chart.categories = slices.iter().map(|(agent, _)| agent.clone()).collect();
    chart.series.push(Series {
        name: metric.to_string(),
        values: slices.iter().map(|(_, v)| Some(*v)).collect(),
    });
    Ok(chart)
}

fn first_metric(report: &ReportResult) -> &str {
    report
        .metric_names
        .first()
        .map(String::as_str)
        .unwrap_or("records")
}

fn period_axis(report: &ReportResult) -> &'static str {
    report
        .grouping
        .granularity()
        .map(|g| g.name())
        .unwrap_or("period")
}
