use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Local, NaiveDate};
use dsa_dashboard::chart::ChartSpec;
use dsa_dashboard::data::filter::{Comparator, DatePreset, FilterCriteria, MetricThreshold};
use dsa_dashboard::export::ExportFormat;
use dsa_dashboard::report::Headline;
use dsa_dashboard::{
    ChartView, Config, GroupFilter, Granularity, Grouping, ReportRequest, ReportResult, Session,
    Stat,
};

use crate::color::SeriesColors;

// ---------------------------------------------------------------------------
// Filter inputs
// ---------------------------------------------------------------------------

/// Date selections offered in the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateChoice {
    AllTime,
    Last7,
    Last30,
    Custom,
}

impl DateChoice {
    pub const ALL: [DateChoice; 4] = [
        DateChoice::AllTime,
        DateChoice::Last7,
        DateChoice::Last30,
        DateChoice::Custom,
    ];

    pub fn preset(self, start: NaiveDate, end: NaiveDate) -> DatePreset {
        match self {
            DateChoice::AllTime => DatePreset::AllTime,
            DateChoice::Last7 => DatePreset::LastDays(7),
            DateChoice::Last30 => DatePreset::LastDays(30),
            DateChoice::Custom => DatePreset::Custom { start, end },
        }
    }
}

/// One editable row of the threshold list.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdInput {
    pub metric: String,
    pub comparator: Comparator,
    pub value: f64,
}

/// Summary vs. time-series report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Summary,
    TimeSeries,
}

// ---------------------------------------------------------------------------
// Computed view
// ---------------------------------------------------------------------------

/// Everything the central panel draws for the current inputs.
pub struct Computed {
    pub request: ReportRequest,
    pub matched: usize,
    pub report: ReportResult,
    pub headline: Headline,
    pub chart: ChartSpec,
}

/// A status-line message.
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: Config,

    /// Loaded data (None until the user opens a file).
    pub session: Option<Session>,

    /// Agents ticked in the checklist. Empty means every agent.
    pub selected_agents: BTreeSet<String>,

    pub date_choice: DateChoice,
    pub custom_start: NaiveDate,
    pub custom_end: NaiveDate,

    pub thresholds: Vec<ThresholdInput>,

    pub report_kind: ReportKind,
    pub granularity: Granularity,
    /// Groups with fewer records are hidden. Zero keeps all.
    pub min_records: usize,

    pub chart_view: ChartView,
    pub chart_stat: Stat,
    /// Metric for the share and per-agent trend charts.
    pub chart_metric: Option<String>,

    /// Result for the current inputs, rebuilt by [`AppState::refresh`].
    pub computed: Option<Computed>,

    pub colors: SeriesColors,

    pub status: Option<Status>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let today = Local::now().date_naive();
        Self {
            granularity: config.report.granularity,
            config,
            session: None,
            selected_agents: BTreeSet::new(),
            date_choice: DateChoice::AllTime,
            custom_start: today,
            custom_end: today,
            thresholds: Vec::new(),
            report_kind: ReportKind::Summary,
            min_records: 0,
            chart_view: ChartView::default(),
            chart_stat: Stat::Sum,
            chart_metric: None,
            computed: None,
            colors: SeriesColors::default(),
            status: None,
        }
    }

    /// Load a file, replacing the current session only on success.
    pub fn open(&mut self, path: &Path) {
        match Session::open(path, self.config.clone()) {
            Ok(session) => {
                self.set_session(session);
                self.status = Some(Status {
                    text: format!("Opened {}", path.display()),
                    is_error: false,
                });
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.set_error(format!("{e:#}"));
            }
        }
    }

    /// Ingest a newly loaded session and reset the inputs to match it.
    pub fn set_session(&mut self, session: Session) {
        let dataset = session.dataset();
        if let Some((lo, hi)) = dataset.date_bounds {
            self.custom_start = lo;
            self.custom_end = hi;
        }
        self.selected_agents.clear();
        self.thresholds.clear();
        self.chart_metric = None;
        self.colors = SeriesColors::new(
            dataset
                .metric_names
                .iter()
                .cloned()
                .chain(dataset.agents_sorted()),
        );

        self.session = Some(session);
        self.refresh();
    }

    /// Build the request for the current inputs.
    pub fn request(&self, as_of: NaiveDate) -> dsa_dashboard::Result<ReportRequest> {
        let date_range = self
            .date_choice
            .preset(self.custom_start, self.custom_end)
            .resolve(as_of)?;

        let mut criteria = FilterCriteria::all().with_agents(self.selected_agents.iter().cloned());
        criteria.date_range = date_range;
        for t in &self.thresholds {
            criteria = criteria.with_threshold(MetricThreshold::new(&t.metric, t.comparator, t.value));
        }

        let grouping = match self.report_kind {
            ReportKind::Summary => Grouping::Agent,
            ReportKind::TimeSeries => Grouping::AgentPeriod(self.granularity),
        };
        let group_filter = if self.min_records > 0 {
            GroupFilter::default().min_records(self.min_records)
        } else {
            GroupFilter::default()
        };

        Ok(ReportRequest {
            criteria,
            grouping,
            group_filter,
        })
    }

    fn compute(&self, session: &Session) -> dsa_dashboard::Result<Computed> {
        let request = self.request(Local::now().date_naive())?;
        let output = session.report(&request)?;
        let chart = session.chart(
            &output,
            self.chart_view,
            self.chart_stat,
            self.chart_metric.as_deref(),
        )?;
        Ok(Computed {
            matched: output.view.len(),
            report: output.report,
            headline: output.headline,
            chart,
            request,
        })
    }

    /// Recompute the report after an input change. Errors keep the
    /// session and surface in the status line.
    pub fn refresh(&mut self) {
        let result = match &self.session {
            Some(session) => self.compute(session).map(Some),
            None => Ok(None),
        };
        match result {
            Ok(computed) => {
                self.computed = computed;
                if self.status.as_ref().is_some_and(|s| s.is_error) {
                    self.status = None;
                }
            }
            Err(e) => {
                log::warn!("Report failed: {e}");
                self.computed = None;
                self.set_error(e.to_string());
            }
        }
    }

    /// Export the current report to a file picked by the user.
    pub fn export(&mut self, format: ExportFormat) {
        let (Some(session), Some(computed)) = (&self.session, &self.computed) else {
            return;
        };

        let result = session.report(&computed.request).and_then(|output| {
            let bytes = session.export(&output, format)?;
            let name = session.export_file_name(&output, format, Local::now().naive_local());
            Ok((bytes, name))
        });

        let (bytes, name) = match result {
            Ok(done) => done,
            Err(e) => {
                log::error!("Export failed: {e}");
                self.set_error(e.to_string());
                return;
            }
        };

        let Some(path) = rfd::FileDialog::new()
            .set_title("Export report")
            .set_file_name(&name)
            .add_filter(format.extension(), &[format.extension()])
            .save_file()
        else {
            return;
        };

        match std::fs::write(&path, &bytes) {
            Ok(()) => {
                log::info!("Wrote {} bytes to {}", bytes.len(), path.display());
                self.status = Some(Status {
                    text: format!("Saved {}", path.display()),
                    is_error: false,
                });
            }
            Err(e) => {
                log::error!("Failed to write {}: {e}", path.display());
                self.set_error(format!("Failed to write {}: {e}", path.display()));
            }
        }
    }

    /// Tick every agent.
    pub fn select_all_agents(&mut self) {
        if let Some(session) = &self.session {
            self.selected_agents = session.dataset().agents.clone();
        }
        self.refresh();
    }

    /// Untick every agent (which reports on all of them).
    pub fn select_no_agents(&mut self) {
        self.selected_agents.clear();
        self.refresh();
    }

    pub fn toggle_agent(&mut self, agent: &str) {
        if !self.selected_agents.remove(agent) {
            self.selected_agents.insert(agent.to_string());
        }
        self.refresh();
    }

    pub fn add_threshold(&mut self) {
        let Some(metric) = self
            .session
            .as_ref()
            .and_then(|s| s.dataset().metric_names.first().cloned())
        else {
            return;
        };
        self.thresholds.push(ThresholdInput {
            metric,
            comparator: Comparator::Ge,
            value: 0.0,
        });
        self.refresh();
    }

    pub fn remove_threshold(&mut self, index: usize) {
        if index < self.thresholds.len() {
            self.thresholds.remove(index);
            self.refresh();
        }
    }

    fn set_error(&mut self, text: String) {
        self.status = Some(Status {
            text,
            is_error: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsa_dashboard::data::model::{Dataset, Record};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn state() -> AppState {
        let dataset = Dataset::from_records(
            vec!["amount".into()],
            vec![
                Record::new("A", date(2024, 1, 5), vec![100.0]),
                Record::new("B", date(2024, 1, 10), vec![200.0]),
            ],
        );
        let mut state = AppState::new(Config::default());
        state.set_session(Session::from_dataset(dataset, Config::default()).unwrap());
        state
    }

    #[test]
    fn test_session_resets_inputs() {
        let state = state();
        assert_eq!(state.custom_start, date(2024, 1, 5));
        assert_eq!(state.custom_end, date(2024, 1, 10));
        let computed = state.computed.as_ref().unwrap();
        assert_eq!(computed.matched, 2);
        assert_eq!(computed.report.len(), 2);
    }

    #[test]
    fn test_agent_toggle_filters() {
        let mut state = state();
        state.toggle_agent("A");
        let computed = state.computed.as_ref().unwrap();
        assert_eq!(computed.report.agents(), vec!["A"]);

        state.select_no_agents();
        assert_eq!(state.computed.as_ref().unwrap().matched, 2);
    }

    #[test]
    fn test_bad_custom_range_keeps_session() {
        let mut state = state();
        state.date_choice = DateChoice::Custom;
        state.custom_start = date(2024, 2, 1);
        state.custom_end = date(2024, 1, 1);
        state.refresh();

        assert!(state.computed.is_none());
        assert!(state.session.is_some());
        assert!(state.status.as_ref().unwrap().is_error);

        state.custom_start = date(2024, 1, 1);
        state.refresh();
        assert!(state.computed.is_some());
        assert!(state.status.is_none());
    }

    #[test]
    fn test_min_records_and_time_series() {
        let mut state = state();
        state.report_kind = ReportKind::TimeSeries;
        state.granularity = Granularity::Month;
        state.min_records = 2;
        state.refresh();
        assert!(state.computed.as_ref().unwrap().report.is_empty());
    }
}
