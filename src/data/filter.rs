use std::collections::BTreeSet;
use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::model::{Dataset, Record};

// ---------------------------------------------------------------------------
// Predicate building blocks
// ---------------------------------------------------------------------------

/// Comparison applied between a value and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparator {
    pub const ALL: [Comparator; 6] = [
        Comparator::Gt,
        Comparator::Ge,
        Comparator::Lt,
        Comparator::Le,
        Comparator::Eq,
        Comparator::Ne,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Eq => "=",
            Comparator::Ne => "!=",
        }
    }

    /// `value <op> threshold`. Equality is exact.
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Ge => value >= threshold,
            Comparator::Lt => value < threshold,
            Comparator::Le => value <= threshold,
            Comparator::Eq => value == threshold,
            Comparator::Ne => value != threshold,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `metric <comparator> value`, evaluated per record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub metric: String,
    pub comparator: Comparator,
    pub value: f64,
}

impl MetricThreshold {
    pub fn new(metric: impl Into<String>, comparator: Comparator, value: f64) -> Self {
        Self {
            metric: metric.into(),
            comparator,
            value,
        }
    }
}

/// Inclusive calendar range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The smallest range containing every record, `None` for an empty dataset.
    pub fn covering(dataset: &Dataset) -> Option<Self> {
        dataset
            .date_bounds
            .map(|(start, end)| Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Date selections offered by the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
    AllTime,
    /// The last N days up to and including the "as of" date.
    LastDays(u32),
    Custom { start: NaiveDate, end: NaiveDate },
}

impl DatePreset {
    /// Resolve to a concrete range. `AllTime` means no date predicate.
    pub fn resolve(&self, as_of: NaiveDate) -> Result<Option<DateRange>> {
        match *self {
            DatePreset::AllTime => Ok(None),
            DatePreset::LastDays(n) => {
                let back = u64::from(n.max(1) - 1);
                let start = as_of.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN);
                DateRange::new(start, as_of).map(Some)
            }
            DatePreset::Custom { start, end } => DateRange::new(start, end).map(Some),
        }
    }

    pub fn label(&self) -> String {
        match self {
            DatePreset::AllTime => "All Time".to_string(),
            DatePreset::LastDays(n) => format!("Last {n} Days"),
            DatePreset::Custom { .. } => "Custom Range".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// FilterCriteria
// ---------------------------------------------------------------------------

/// User-selected predicates, combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    /// Agents to keep. Empty means every agent.
    pub agents: BTreeSet<String>,
    /// Inclusive date window. `None` means every date.
    pub date_range: Option<DateRange>,
    pub thresholds: Vec<MetricThreshold>,
}

impl FilterCriteria {
    /// Criteria that keep every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agents = agents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_threshold(mut self, threshold: MetricThreshold) -> Self {
        self.thresholds.push(threshold);
        self
    }

    /// Check thresholds against the dataset's metrics and resolve each to
    /// a metric position.
    fn compile(&self, dataset: &Dataset) -> Result<Vec<(usize, Comparator, f64)>> {
        self.thresholds
            .iter()
            .map(|t| {
                let idx = dataset
                    .metric_index(&t.metric)
                    .ok_or_else(|| Error::UnknownMetric(t.metric.clone()))?;
                if t.value.is_nan() {
                    return Err(Error::InvalidThreshold {
                        metric: t.metric.clone(),
                        reason: "value is not a number".to_string(),
                    });
                }
                Ok((idx, t.comparator, t.value))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Return indices of records that pass all active predicates, ascending.
pub fn filtered_indices(dataset: &Dataset, criteria: &FilterCriteria) -> Result<Vec<usize>> {
    let thresholds = criteria.compile(dataset)?;

    let indices = dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            if !criteria.agents.is_empty() && !criteria.agents.contains(&rec.agent) {
                return false;
            }
            if let Some(range) = &criteria.date_range {
                if !range.contains(rec.date) {
                    return false;
                }
            }
            thresholds
                .iter()
                .all(|&(idx, op, value)| op.holds(rec.metrics[idx], value))
        })
        .map(|(i, _)| i)
        .collect();

    Ok(indices)
}

/// Filter `dataset` into a view that borrows it.
pub fn apply<'a>(dataset: &'a Dataset, criteria: &FilterCriteria) -> Result<FilteredView<'a>> {
    let indices = filtered_indices(dataset, criteria)?;
    log::debug!(
        "filter kept {} of {} records",
        indices.len(),
        dataset.len()
    );
    Ok(FilteredView { dataset, indices })
}

/// Records passing a filter, in dataset order. An empty view is the
/// "no data" state, not an error.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// A view of every record.
    pub fn full(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            indices: (0..dataset.len()).collect(),
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn metric_names(&self) -> &'a [String] {
        &self.dataset.metric_names
    }

    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = &self.dataset.records;
        self.indices.iter().map(move |&i| &records[i])
    }
}
