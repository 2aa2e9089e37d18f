use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// CellValue – a single raw cell from an input file
// ---------------------------------------------------------------------------

/// A dynamically-typed cell as decoded from CSV, JSON, Parquet or a
/// spreadsheet, before the schema mapping turns a row into a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{d}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Whether the cell carries no usable content.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Record – one DSA performance observation
// ---------------------------------------------------------------------------

/// One validated row: who, when, and one value per configured metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub agent: String,
    pub date: NaiveDate,
    /// Metric values, in the dataset's `metric_names` order.
    pub metrics: Vec<f64>,
}

impl Record {
    pub fn new(agent: impl Into<String>, date: NaiveDate, metrics: Vec<f64>) -> Self {
        Self {
            agent: agent.into(),
            date,
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full loaded dataset with pre-computed indices for the filter widgets.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<Record>,
    /// Ordered metric names; every record has one value per name.
    pub metric_names: Vec<String>,
    /// Distinct agent identifiers.
    pub agents: BTreeSet<String>,
    /// Earliest and latest record date, `None` when empty.
    pub date_bounds: Option<(NaiveDate, NaiveDate)>,
}

impl Dataset {
    /// Build indices from the loaded records.
    pub fn from_records(metric_names: Vec<String>, records: Vec<Record>) -> Self {
        let mut agents = BTreeSet::new();
        let mut date_bounds: Option<(NaiveDate, NaiveDate)> = None;

        for rec in &records {
            debug_assert_eq!(rec.metrics.len(), metric_names.len());
            agents.insert(rec.agent.clone());
            date_bounds = Some(match date_bounds {
                None => (rec.date, rec.date),
                Some((lo, hi)) => (lo.min(rec.date), hi.max(rec.date)),
            });
        }

        Dataset {
            records,
            metric_names,
            agents,
            date_bounds,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a metric in every record's `metrics`.
    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_names.iter().position(|m| m == name)
    }

    /// Agents sorted the way reports list them (case-insensitive).
    pub fn agents_sorted(&self) -> Vec<String> {
        let mut agents: Vec<String> = self.agents.iter().cloned().collect();
        agents.sort_by(|a, b| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });
        agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_from_records_builds_indices() {
        let ds = Dataset::from_records(
            vec!["amount".into()],
            vec![
                Record::new("b", date(2024, 3, 1), vec![1.0]),
                Record::new("A", date(2024, 1, 9), vec![2.0]),
                Record::new("b", date(2024, 2, 1), vec![3.0]),
            ],
        );

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.agents.len(), 2);
        assert_eq!(ds.date_bounds, Some((date(2024, 1, 9), date(2024, 3, 1))));
        assert_eq!(ds.metric_index("amount"), Some(0));
        assert_eq!(ds.metric_index("cases"), None);
    }

    #[test]
    fn test_empty_dataset_has_no_bounds() {
        let ds = Dataset::from_records(vec!["amount".into()], Vec::new());
        assert!(ds.is_empty());
        assert_eq!(ds.date_bounds, None);
    }

    #[test]
    fn test_agents_sorted_case_insensitive() {
        let ds = Dataset::from_records(
            vec![],
            vec![
                Record::new("bravo", date(2024, 1, 1), vec![]),
                Record::new("Alpha", date(2024, 1, 1), vec![]),
                Record::new("alpha", date(2024, 1, 1), vec![]),
                Record::new("Charlie", date(2024, 1, 1), vec![]),
            ],
        );
        assert_eq!(ds.agents_sorted(), vec!["Alpha", "alpha", "bravo", "Charlie"]);
    }

    #[test]
    fn test_cell_blankness() {
        assert!(CellValue::Null.is_blank());
        assert!(CellValue::Text("  ".into()).is_blank());
        assert!(!CellValue::Text("x".into()).is_blank());
        assert!(!CellValue::Integer(0).is_blank());
    }
}
