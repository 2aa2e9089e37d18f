//! Loaded dataset plus configuration, with the filter → report → chart →
//! export pipeline on top.
//!
//! A [`Session`] is never mutated after loading; every operation borrows
//! it, so the UI can keep one around and re-run reports freely.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDateTime;

use crate::chart::{self, ChartSpec};
use crate::config::Config;
use crate::data::filter::{self, FilterCriteria, FilteredView};
use crate::data::loader::{self, SkippedRow};
use crate::data::model::Dataset;
use crate::error::{Error, Result};
use crate::export::{self, ExportFormat, ExportOptions};
use crate::report::{aggregate, GroupFilter, Grouping, Headline, ReportResult, Stat};

/// What to report on.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub criteria: FilterCriteria,
    pub grouping: Grouping,
    /// Applied to the aggregated rows; empty keeps every group.
    pub group_filter: GroupFilter,
}

impl ReportRequest {
    pub fn summary(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            grouping: Grouping::Agent,
            group_filter: GroupFilter::default(),
        }
    }
}

/// A computed report together with the records behind it.
#[derive(Debug, Clone)]
pub struct ReportOutput<'a> {
    pub view: FilteredView<'a>,
    pub report: ReportResult,
    pub headline: Headline,
}

impl ReportOutput<'_> {
    /// True when the filters left nothing to show.
    pub fn is_empty(&self) -> bool {
        self.report.is_empty()
    }
}

/// Chart layouts offered for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartView {
    /// Bars per report row, ranked when a top-N is configured.
    #[default]
    Ranking,
    /// Metrics over time, or one line per agent when a metric is chosen.
    Trend,
    /// Each agent's share of a metric.
    Share,
}

impl ChartView {
    pub const ALL: [ChartView; 3] = [ChartView::Ranking, ChartView::Trend, ChartView::Share];

    pub fn label(self) -> &'static str {
        match self {
            ChartView::Ranking => "Ranking",
            ChartView::Trend => "Trend",
            ChartView::Share => "Share",
        }
    }
}

pub struct Session {
    config: Config,
    dataset: Dataset,
    source: Option<PathBuf>,
    skipped: usize,
    samples: Vec<SkippedRow>,
}

impl Session {
    /// Load `path` with the configured schema.
    pub fn open(path: &Path, config: Config) -> anyhow::Result<Self> {
        config.validate().context("Invalid configuration")?;
        let outcome = loader::load_file(path, &config.schema)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        Ok(Self {
            config,
            dataset: outcome.dataset,
            source: Some(path.to_path_buf()),
            skipped: outcome.skipped,
            samples: outcome.samples,
        })
    }

    /// Wrap an already-built dataset.
    pub fn from_dataset(dataset: Dataset, config: Config) -> anyhow::Result<Self> {
        config.validate().context("Invalid configuration")?;
        Ok(Self {
            config,
            dataset,
            source: None,
            skipped: 0,
            samples: Vec::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }

    pub fn skipped_samples(&self) -> &[SkippedRow] {
        &self.samples
    }

    /// Same text as the loader's warning, `None` for a clean load.
    pub fn load_warning(&self) -> Option<String> {
        loader::skipped_warning(self.skipped, &self.samples)
    }

    pub fn filter(&self, criteria: &FilterCriteria) -> Result<FilteredView<'_>> {
        filter::apply(&self.dataset, criteria)
    }

    /// Filter, aggregate, then apply the group filter.
    pub fn report(&self, request: &ReportRequest) -> Result<ReportOutput<'_>> {
        let view = self.filter(&request.criteria)?;
        let report = aggregate(&view, request.grouping).retain_groups(&request.group_filter)?;
        let headline = Headline::from_report(&report, self.config.report.payout_per_record);

        log::info!(
            "Report: {} of {} records matched, {} rows",
            view.len(),
            self.dataset.len(),
            report.len()
        );

        Ok(ReportOutput {
            view,
            report,
            headline,
        })
    }

    /// Build the chart for `view`. `metric` picks the metric for the share
    /// and per-agent trend charts; the first metric is used otherwise.
    pub fn chart(
        &self,
        output: &ReportOutput<'_>,
        view: ChartView,
        stat: Stat,
        metric: Option<&str>,
    ) -> Result<ChartSpec> {
        let report = &output.report;
        let top_n = Some(self.config.report.top_n).filter(|&n| n > 0);

        match view {
            ChartView::Ranking => Ok(chart::summary_bar(report, stat, top_n)),
            ChartView::Trend => match metric {
                Some(metric) => chart::agent_trend_line(report, metric, stat),
                None => Ok(chart::time_series_line(report, stat)),
            },
            ChartView::Share => {
                let metric = match metric {
                    Some(m) => m,
                    None => report
                        .metric_names
                        .first()
                        .map(String::as_str)
                        .ok_or_else(|| Error::UnknownMetric(String::new()))?,
                };
                chart::share_pie(report, metric, top_n)
            }
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions::from(&self.config.export)
    }

    /// Serialize the report. The workbook also carries the filtered records.
    pub fn export(&self, output: &ReportOutput<'_>, format: ExportFormat) -> Result<Vec<u8>> {
        let options = self.export_options();
        match format {
            ExportFormat::Csv => export::report_csv(&output.report, &options),
            ExportFormat::Xlsx => export::report_xlsx(&output.report, Some(&output.view), &options),
        }
    }

    /// Suggested download name for `output`.
    pub fn export_file_name(
        &self,
        output: &ReportOutput<'_>,
        format: ExportFormat,
        now: NaiveDateTime,
    ) -> String {
        let prefix = match output.report.grouping {
            Grouping::Agent => "DSA_Summary",
            Grouping::AgentPeriod(_) => "DSA_Time_Series",
        };
        export::timestamped_file_name(prefix, format, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;
    use crate::data::filter::{Comparator, DateRange, MetricThreshold};
    use crate::data::model::Record;
    use crate::report::Granularity;
    use chrono::NaiveDate;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session() -> Session {
        let dataset = Dataset::from_records(
            vec!["amount".into(), "cases".into()],
            vec![
                Record::new("A", date(2024, 1, 5), vec![100.0, 1.0]),
                Record::new("B", date(2024, 1, 10), vec![200.0, 2.0]),
                Record::new("A", date(2024, 2, 2), vec![300.0, 1.0]),
            ],
        );
        let mut config = Config::default();
        config.report.payout_per_record = Some(10.0);
        Session::from_dataset(dataset, config).unwrap()
    }

    #[test]
    fn test_report_runs_whole_pipeline() {
        let session = session();
        let request = ReportRequest {
            criteria: FilterCriteria::all()
                .with_threshold(MetricThreshold::new("amount", Comparator::Ge, 150.0)),
            grouping: Grouping::AgentPeriod(Granularity::Month),
            group_filter: GroupFilter::default(),
        };
        let output = session.report(&request).unwrap();

        assert_eq!(output.view.len(), 2);
        assert_eq!(output.report.len(), 2);
        assert_eq!(output.headline.records, 2);
        assert_eq!(output.headline.payout, Some(20.0));
    }

    #[test]
    fn test_group_filter_applies_after_aggregation() {
        let session = session();
        let request = ReportRequest {
            group_filter: GroupFilter::default().min_records(2),
            ..ReportRequest::summary(FilterCriteria::all())
        };
        let output = session.report(&request).unwrap();
        assert_eq!(output.report.agents(), vec!["A"]);
        // The records behind the report are not narrowed by the group filter.
        assert_eq!(output.view.len(), 3);
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let session = session();
        let range = DateRange::new(date(2025, 1, 1), date(2025, 1, 31)).unwrap();
        let output = session
            .report(&ReportRequest::summary(FilterCriteria::all().with_date_range(range)))
            .unwrap();

        assert!(output.is_empty());
        let chart = session.chart(&output, ChartView::Ranking, Stat::Sum, None).unwrap();
        assert!(chart.is_empty());

        let csv = String::from_utf8(session.export(&output, ExportFormat::Csv).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_unknown_threshold_metric_is_reported() {
        let session = session();
        let criteria =
            FilterCriteria::all().with_threshold(MetricThreshold::new("nope", Comparator::Gt, 1.0));
        assert!(matches!(
            session.report(&ReportRequest::summary(criteria)),
            Err(Error::UnknownMetric(m)) if m == "nope"
        ));
    }

    #[test]
    fn test_chart_views() {
        let session = session();
        let request = ReportRequest {
            grouping: Grouping::AgentPeriod(Granularity::Month),
            ..ReportRequest::summary(FilterCriteria::all())
        };
        let output = session.report(&request).unwrap();

        let trend = session.chart(&output, ChartView::Trend, Stat::Sum, None).unwrap();
        assert_eq!(trend.kind, ChartKind::Line);
        assert_eq!(trend.categories, vec!["2024-01", "2024-02"]);

        let per_agent = session
            .chart(&output, ChartView::Trend, Stat::Sum, Some("cases"))
            .unwrap();
        assert_eq!(per_agent.series.len(), 2);

        let share = session.chart(&output, ChartView::Share, Stat::Sum, None).unwrap();
        assert_eq!(share.kind, ChartKind::Pie);
        assert_eq!(share.categories, vec!["A", "B"]);
    }

    #[test]
    fn test_export_and_file_name() {
        let session = session();
        let output = session
            .report(&ReportRequest::summary(FilterCriteria::all()))
            .unwrap();

        let xlsx = session.export(&output, ExportFormat::Xlsx).unwrap();
        assert_eq!(&xlsx[..2], b"PK");

        let now = date(2024, 3, 1).and_hms_opt(12, 0, 5).unwrap();
        assert_eq!(
            session.export_file_name(&output, ExportFormat::Xlsx, now),
            "DSA_Summary_20240301_120005.xlsx"
        );
    }

    #[test]
    fn test_open_reports_skipped_rows() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "agent,date,amount,cases").unwrap();
        writeln!(file, "A,2024-01-05,100,1").unwrap();
        writeln!(file, ",2024-01-06,50,1").unwrap();
        writeln!(file, "B,not a date,10,1").unwrap();
        file.flush().unwrap();

        let session = Session::open(file.path(), Config::default()).unwrap();
        assert_eq!(session.dataset().len(), 1);
        assert_eq!(session.skipped_rows(), 2);
        assert_eq!(session.source(), Some(file.path()));
        assert!(session.load_warning().unwrap().starts_with("2 malformed rows skipped"));
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let mut config = Config::default();
        config.export.csv_delimiter = '¦';
        let empty = Dataset::from_records(vec!["amount".into()], Vec::new());
        let err = Session::from_dataset(empty, config.clone()).err().unwrap();
        assert!(format!("{err:#}").contains("csv_delimiter"));

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "agent,date,amount,cases").unwrap();
        file.flush().unwrap();
        assert!(Session::open(file.path(), config).is_err());
    }
}
