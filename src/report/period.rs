//! Time buckets for the time-series report.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Bucket size used to group records over time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    /// ISO week, Monday to Sunday.
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Quarter,
        Granularity::Year,
    ];

    /// Lower-case name, also used as the period column header in exports.
    pub fn name(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|g| g.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One bucket: the granularity plus the first day it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    granularity: Granularity,
    start: NaiveDate,
}

impl Period {
    /// The bucket of `granularity` that contains `date`.
    pub fn containing(granularity: Granularity, date: NaiveDate) -> Self {
        let start = match granularity {
            Granularity::Day => date,
            Granularity::Week => {
                let back = u64::from(date.weekday().num_days_from_monday());
                date.checked_sub_days(Days::new(back)).unwrap_or(date)
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
            Granularity::Quarter => {
                let first_month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date)
            }
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        };
        Self { granularity, start }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Canonical label: `2024-01-05`, `2024-W01`, `2024-01`, `2024-Q1`, `2024`.
    pub fn label(&self) -> String {
        let d = self.start;
        match self.granularity {
            Granularity::Day => d.format("%Y-%m-%d").to_string(),
            Granularity::Week => {
                let week = d.iso_week();
                format!("{:04}-W{:02}", week.year(), week.week())
            }
            Granularity::Month => format!("{:04}-{:02}", d.year(), d.month()),
            Granularity::Quarter => format!("{:04}-Q{}", d.year(), d.month0() / 3 + 1),
            Granularity::Year => format!("{:04}", d.year()),
        }
    }

    /// Inverse of [`Period::label`]. Non-canonical spellings are rejected.
    pub fn parse(label: &str, granularity: Granularity) -> Option<Self> {
        let label = label.trim();
        let start = match granularity {
            Granularity::Day => NaiveDate::parse_from_str(label, "%Y-%m-%d").ok()?,
            Granularity::Week => {
                let (year, week) = label.split_once("-W")?;
                NaiveDate::from_isoywd_opt(year.parse().ok()?, week.parse().ok()?, Weekday::Mon)?
            }
            Granularity::Month => {
                let (year, month) = label.split_once('-')?;
                NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)?
            }
            Granularity::Quarter => {
                let (year, quarter) = label.split_once("-Q")?;
                let quarter: u32 = quarter.parse().ok()?;
                if !(1..=4).contains(&quarter) {
                    return None;
                }
                NaiveDate::from_ymd_opt(year.parse().ok()?, (quarter - 1) * 3 + 1, 1)?
            }
            Granularity::Year => NaiveDate::from_ymd_opt(label.parse().ok()?, 1, 1)?,
        };
        let period = Self { granularity, start };
        (period.label() == label).then_some(period)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bucket_starts() {
        let d = date(2024, 5, 17); // a Friday
        assert_eq!(Period::containing(Granularity::Day, d).start(), d);
        assert_eq!(Period::containing(Granularity::Week, d).start(), date(2024, 5, 13));
        assert_eq!(Period::containing(Granularity::Month, d).start(), date(2024, 5, 1));
        assert_eq!(Period::containing(Granularity::Quarter, d).start(), date(2024, 4, 1));
        assert_eq!(Period::containing(Granularity::Year, d).start(), date(2024, 1, 1));
    }

    #[test]
    fn test_labels() {
        let d = date(2024, 1, 5);
        assert_eq!(Period::containing(Granularity::Day, d).label(), "2024-01-05");
        assert_eq!(Period::containing(Granularity::Week, d).label(), "2024-W01");
        assert_eq!(Period::containing(Granularity::Month, d).label(), "2024-01");
        assert_eq!(Period::containing(Granularity::Quarter, d).label(), "2024-Q1");
        assert_eq!(Period::containing(Granularity::Year, d).label(), "2024");
    }

    #[test]
    fn test_week_crossing_year_boundary() {
        // 2021-01-01 is a Friday in ISO week 53 of 2020.
        let p = Period::containing(Granularity::Week, date(2021, 1, 1));
        assert_eq!(p.start(), date(2020, 12, 28));
        assert_eq!(p.label(), "2020-W53");
        assert_eq!(Period::parse("2020-W53", Granularity::Week), Some(p));
    }

    #[test]
    fn test_parse_inverts_label() {
        let d = date(2023, 11, 30);
        for g in Granularity::ALL {
            let p = Period::containing(g, d);
            assert_eq!(Period::parse(&p.label(), g), Some(p), "granularity {g}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Period::parse("2024-13", Granularity::Month), None);
        assert_eq!(Period::parse("2024-Q5", Granularity::Quarter), None);
        assert_eq!(Period::parse("2024-1", Granularity::Month), None);
        assert_eq!(Period::parse("January", Granularity::Month), None);
    }

    #[test]
    fn test_granularity_names() {
        assert_eq!(Granularity::from_name("Quarter"), Some(Granularity::Quarter));
        assert_eq!(Granularity::from_name("fortnight"), None);
        assert_eq!(Granularity::default(), Granularity::Month);
    }
}
