use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::data::filter::{Comparator, FilteredView};
use crate::data::model::Record;
use crate::error::{Error, Result};

use super::period::{Granularity, Period};

// ---------------------------------------------------------------------------
// Grouping keys
// ---------------------------------------------------------------------------

/// How records are grouped into report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grouping {
    /// One row per agent: the summary report.
    Agent,
    /// One row per agent and bucket: the time-series report.
    AgentPeriod(Granularity),
}

impl Grouping {
    pub fn granularity(self) -> Option<Granularity> {
        match self {
            Grouping::Agent => None,
            Grouping::AgentPeriod(g) => Some(g),
        }
    }

    fn key_for(self, record: &Record) -> GroupKey {
        GroupKey {
            agent: record.agent.clone(),
            period: self.granularity().map(|g| Period::containing(g, record.date)),
        }
    }
}

/// Agent, optionally plus time bucket.
///
/// Ordered by agent compared case-insensitively, then by the exact agent
/// string, then by period start.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub agent: String,
    pub period: Option<Period>,
}

impl GroupKey {
    pub fn agent(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            period: None,
        }
    }

    pub fn agent_period(agent: impl Into<String>, period: Period) -> Self {
        Self {
            agent: agent.into(),
            period: Some(period),
        }
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.agent
            .to_lowercase()
            .cmp(&other.agent.to_lowercase())
            .then_with(|| self.agent.cmp(&other.agent))
            .then_with(|| self.period.cmp(&other.period))
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.period {
            Some(p) => write!(f, "{} · {p}", self.agent),
            None => write!(f, "{}", self.agent),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Which aggregate of a metric to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Count,
    Sum,
    Mean,
    /// Percentage of records with a positive value (conversion rate).
    Rate,
}

impl Stat {
    pub const ALL: [Stat; 4] = [Stat::Count, Stat::Sum, Stat::Mean, Stat::Rate];

    /// Column suffix used in exports.
    pub fn suffix(self) -> &'static str {
        match self {
            Stat::Count => "count",
            Stat::Sum => "sum",
            Stat::Mean => "avg",
            Stat::Rate => "rate",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Count, sum and arithmetic mean of one metric within one group, plus
/// how many of the counted values were above zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricAggregate {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub positive: usize,
}

impl MetricAggregate {
    pub fn new(count: usize, sum: f64, positive: usize) -> Self {
        Self {
            count,
            sum,
            mean: if count == 0 { 0.0 } else { sum / count as f64 },
            positive,
        }
    }

    /// Combine two aggregates of the same metric.
    pub fn merge(&self, other: &MetricAggregate) -> Self {
        Self::new(
            self.count + other.count,
            self.sum + other.sum,
            self.positive + other.positive,
        )
    }

    /// `positive / count` as a percentage; 0 for an empty group.
    pub fn rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.positive as f64 / self.count as f64 * 100.0
        }
    }

    pub fn get(&self, stat: Stat) -> f64 {
        match stat {
            Stat::Count => self.count as f64,
            Stat::Sum => self.sum,
            Stat::Mean => self.mean,
            Stat::Rate => self.rate(),
        }
    }
}

/// One report row.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: GroupKey,
    /// Records that fell into this group.
    pub records: usize,
    /// One aggregate per metric, in `ReportResult::metric_names` order.
    pub metrics: Vec<MetricAggregate>,
}

/// Aggregated report, rows sorted by [`GroupKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReportResult {
    pub grouping: Grouping,
    pub metric_names: Vec<String>,
    pub rows: Vec<GroupRow>,
}

impl ReportResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_names.iter().position(|m| m == name)
    }

    pub fn get(&self, key: &GroupKey) -> Option<&GroupRow> {
        self.rows
            .binary_search_by(|row| row.key.cmp(key))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Sum of `records` over all rows.
    pub fn total_records(&self) -> usize {
        self.rows.iter().map(|r| r.records).sum()
    }

    /// Distinct agents in row order.
    pub fn agents(&self) -> Vec<&str> {
        let mut agents: Vec<&str> = Vec::new();
        for row in &self.rows {
            if agents.last() != Some(&row.key.agent.as_str()) {
                agents.push(&row.key.agent);
            }
        }
        agents
    }

    /// Distinct periods, ascending. Empty for the summary report.
    pub fn periods(&self) -> Vec<Period> {
        let mut periods: Vec<Period> = self.rows.iter().filter_map(|r| r.key.period).collect();
        periods.sort();
        periods.dedup();
        periods
    }

    /// Keep only rows passing every threshold in `filter`.
    pub fn retain_groups(mut self, filter: &GroupFilter) -> Result<Self> {
        let compiled = filter
            .thresholds
            .iter()
            .map(|t| {
                let measure = match &t.measure {
                    GroupMeasure::Records => None,
                    GroupMeasure::Metric { name, stat } => {
                        let idx = self
                            .metric_index(name)
                            .ok_or_else(|| Error::UnknownMetric(name.clone()))?;
                        Some((idx, *stat))
                    }
                };
                if t.value.is_nan() {
                    return Err(Error::InvalidThreshold {
                        metric: t.measure.to_string(),
                        reason: "value is not a number".to_string(),
                    });
                }
                Ok((measure, t.comparator, t.value))
            })
            .collect::<Result<Vec<_>>>()?;

        self.rows.retain(|row| {
            compiled.iter().all(|&(measure, op, value)| {
                let actual = match measure {
                    None => row.records as f64,
                    Some((idx, stat)) => row.metrics[idx].get(stat),
                };
                op.holds(actual, value)
            })
        });
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Group filters ("having")
// ---------------------------------------------------------------------------

/// A per-group quantity a [`GroupThreshold`] can test.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupMeasure {
    Records,
    Metric { name: String, stat: Stat },
}

impl fmt::Display for GroupMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupMeasure::Records => f.write_str("records"),
            GroupMeasure::Metric { name, stat } => write!(f, "{name}_{stat}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupThreshold {
    pub measure: GroupMeasure,
    pub comparator: Comparator,
    pub value: f64,
}

/// Thresholds applied to report rows after aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupFilter {
    pub thresholds: Vec<GroupThreshold>,
}

impl GroupFilter {
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Groups with at least `n` records.
    pub fn min_records(mut self, n: usize) -> Self {
        self.thresholds.push(GroupThreshold {
            measure: GroupMeasure::Records,
            comparator: Comparator::Ge,
            value: n as f64,
        });
        self
    }

    /// Groups whose `stat` of `metric` is at least `value`.
    pub fn min_metric(mut self, metric: impl Into<String>, stat: Stat, value: f64) -> Self {
        self.thresholds.push(GroupThreshold {
            measure: GroupMeasure::Metric {
                name: metric.into(),
                stat,
            },
            comparator: Comparator::Ge,
            value,
        });
        self
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Accumulator {
    records: usize,
    sums: Vec<f64>,
    counts: Vec<usize>,
    positives: Vec<usize>,
}

/// Group the view's records and compute count, sum, mean and positive
/// count per metric.
///
/// Records are folded in dataset order, so identical input always yields
/// bit-identical sums.
pub fn aggregate(view: &FilteredView<'_>, grouping: Grouping) -> ReportResult {
    let metric_names = view.metric_names().to_vec();
    let width = metric_names.len();
    let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();

    for record in view.records() {
        let acc = groups
            .entry(grouping.key_for(record))
            .or_insert_with(|| Accumulator {
                records: 0,
                sums: vec![0.0; width],
                counts: vec![0; width],
                positives: vec![0; width],
            });
        acc.records += 1;
        for (i, value) in record.metrics.iter().enumerate().take(width) {
            acc.sums[i] += value;
            acc.counts[i] += 1;
            if *value > 0.0 {
                acc.positives[i] += 1;
            }
        }
    }

    let rows = groups
        .into_iter()
        .map(|(key, acc)| GroupRow {
            key,
            records: acc.records,
            metrics: (0..width)
                .map(|i| MetricAggregate::new(acc.counts[i], acc.sums[i], acc.positives[i]))
                .collect(),
        })
        .collect();

    ReportResult {
        grouping,
        metric_names,
        rows,
    }
}

/// Per-agent summary report.
pub fn summary_report(view: &FilteredView<'_>) -> ReportResult {
    aggregate(view, Grouping::Agent)
}

/// Per-agent time-series report.
pub fn time_series_report(view: &FilteredView<'_>, granularity: Granularity) -> ReportResult {
    aggregate(view, Grouping::AgentPeriod(granularity))
}

// ---------------------------------------------------------------------------
// Headline figures
// ---------------------------------------------------------------------------

/// Dashboard cards shown above the report.
#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    pub agents: usize,
    pub records: usize,
    /// Total of each metric across the report, in metric order.
    pub metric_totals: Vec<(String, f64)>,
    /// `records × payout_per_record`, when a rate is configured.
    pub payout: Option<f64>,
}

impl Headline {
    pub fn from_report(report: &ReportResult, payout_per_record: Option<f64>) -> Self {
        let records = report.total_records();
        let metric_totals = report
            .metric_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let total = report.rows.iter().map(|r| r.metrics[i].sum).sum();
                (name.clone(), total)
            })
            .collect();

        Self {
            agents: report.agents().len(),
            records,
            metric_totals,
            payout: payout_per_record.map(|rate| records as f64 * rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{self, FilterCriteria};
    use crate::data::model::Dataset;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Dataset {
        Dataset::from_records(
            vec!["amount".into(), "cases".into()],
            vec![
                Record::new("bob", date(2024, 1, 5), vec![100.0, 1.0]),
                Record::new("Alice", date(2024, 1, 10), vec![200.0, 2.0]),
                Record::new("bob", date(2024, 2, 1), vec![50.0, 3.0]),
                Record::new("alice", date(2024, 2, 3), vec![10.0, 1.0]),
                Record::new("Alice", date(2024, 2, 20), vec![40.0, 0.0]),
            ],
        )
    }

    #[test]
    fn test_single_agent_example() {
        let ds = Dataset::from_records(
            vec!["amount".into()],
            vec![
                Record::new("A", date(2024, 1, 5), vec![100.0]),
                Record::new("B", date(2024, 1, 10), vec![200.0]),
            ],
        );
        let view = filter::apply(&ds, &FilterCriteria::all().with_agents(["A"])).unwrap();
        let report = summary_report(&view);

        assert_eq!(report.len(), 1);
        let row = report.get(&GroupKey::agent("A")).unwrap();
        assert_eq!(
            row.metrics[0],
            MetricAggregate {
                count: 1,
                sum: 100.0,
                mean: 100.0,
                positive: 1,
            }
        );
    }

    #[test]
    fn test_conversion_rate_counts_positive_values() {
        let ds = sample();
        let report = summary_report(&FilteredView::full(&ds));

        // Alice: cases 2 and 0.
        let alice = report.get(&GroupKey::agent("Alice")).unwrap();
        assert_eq!(alice.metrics[1].positive, 1);
        assert_eq!(alice.metrics[1].get(Stat::Rate), 50.0);
        assert_eq!(alice.metrics[0].get(Stat::Rate), 100.0);

        let merged = alice.metrics[1].merge(&report.rows[1].metrics[1]);
        assert_eq!(merged.count, 3);
        assert_eq!(merged.positive, 2);
        assert_eq!(MetricAggregate::default().rate(), 0.0);

        let top = report
            .retain_groups(&GroupFilter::default().min_metric("cases", Stat::Rate, 100.0))
            .unwrap();
        let agents: Vec<&str> = top.rows.iter().map(|r| r.key.agent.as_str()).collect();
        assert_eq!(agents, vec!["alice", "bob"]);
    }

    #[test]
    fn test_summary_order_is_case_insensitive() {
        let ds = sample();
        let report = summary_report(&FilteredView::full(&ds));
        let agents: Vec<&str> = report.rows.iter().map(|r| r.key.agent.as_str()).collect();
        assert_eq!(agents, vec!["Alice", "alice", "bob"]);

        let alice = &report.rows[0];
        assert_eq!(alice.records, 2);
        assert_eq!(alice.metrics[0].sum, 240.0);
        assert_eq!(alice.metrics[0].mean, 120.0);
        assert_eq!(alice.metrics[1].count, 2);
    }

    #[test]
    fn test_time_series_groups_by_month() {
        let ds = sample();
        let report = time_series_report(&FilteredView::full(&ds), Granularity::Month);
        let keys: Vec<String> = report.rows.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "Alice · 2024-01",
                "Alice · 2024-02",
                "alice · 2024-02",
                "bob · 2024-01",
                "bob · 2024-02",
            ]
        );
        assert_eq!(report.periods().len(), 2);
        assert_eq!(report.agents(), vec!["Alice", "alice", "bob"]);
    }

    #[test]
    fn test_counts_add_up_to_view_len() {
        let ds = sample();
        let view = FilteredView::full(&ds);
        for grouping in [Grouping::Agent, Grouping::AgentPeriod(Granularity::Week)] {
            assert_eq!(aggregate(&view, grouping).total_records(), view.len());
        }
    }

    #[test]
    fn test_empty_view_gives_empty_report() {
        let ds = sample();
        let view = filter::apply(&ds, &FilterCriteria::all().with_agents(["nobody"])).unwrap();
        let report = summary_report(&view);
        assert!(report.is_empty());
        assert_eq!(report.metric_names, vec!["amount", "cases"]);
    }

    #[test]
    fn test_retain_groups() {
        let ds = sample();
        let report = summary_report(&FilteredView::full(&ds));

        let by_records = report.clone().retain_groups(&GroupFilter::default().min_records(2)).unwrap();
        assert_eq!(by_records.agents(), vec!["Alice", "bob"]);

        let by_amount = report
            .clone()
            .retain_groups(&GroupFilter::default().min_metric("amount", Stat::Sum, 200.0))
            .unwrap();
        assert_eq!(by_amount.agents(), vec!["Alice"]);

        let unknown = report.retain_groups(&GroupFilter::default().min_metric("x", Stat::Sum, 1.0));
        assert!(matches!(unknown, Err(Error::UnknownMetric(_))));
    }

    #[test]
    fn test_headline() {
        let ds = sample();
        let report = summary_report(&FilteredView::full(&ds));
        let headline = Headline::from_report(&report, Some(40.0));

        assert_eq!(headline.agents, 3);
        assert_eq!(headline.records, 5);
        assert_eq!(headline.metric_totals[0], ("amount".to_string(), 400.0));
        assert_eq!(headline.metric_totals[1], ("cases".to_string(), 7.0));
        assert_eq!(headline.payout, Some(200.0));
        assert_eq!(Headline::from_report(&report, None).payout, None);
    }

    #[test]
    fn test_get_uses_full_key() {
        let ds = sample();
        let report = time_series_report(&FilteredView::full(&ds), Granularity::Month);
        let feb = Period::containing(Granularity::Month, date(2024, 2, 1));
        let row = report.get(&GroupKey::agent_period("bob", feb)).unwrap();
        assert_eq!(row.metrics[0].sum, 50.0);
        assert!(report.get(&GroupKey::agent("bob")).is_none());
    }
}
