//! Schema mapping: resolve configured column candidates against a file's
//! headers once, then turn raw rows into [`Record`]s.

use chrono::{Days, NaiveDate};

use crate::config::SchemaConfig;
use crate::error::{Error, RowIssue};

use super::model::{CellValue, Record};

/// Column positions for one input file.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    agent: usize,
    date: usize,
    metrics: Vec<usize>,
    metric_names: Vec<String>,
    date_formats: Vec<String>,
    agent_digits: Option<usize>,
    serial_dates: bool,
}

impl ResolvedSchema {
    /// Match the configured candidates against `headers`.
    ///
    /// The first candidate (in configuration order) present in the file
    /// wins. A logical field without any matching header is an error.
    pub fn resolve(headers: &[String], config: &SchemaConfig) -> Result<Self, Error> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

        let find = |field: &str, candidates: &[String]| -> Result<usize, Error> {
            candidates
                .iter()
                .find_map(|c| {
                    let wanted = normalize_header(c);
                    normalized.iter().position(|h| *h == wanted)
                })
                .ok_or_else(|| Error::MissingColumn {
                    field: field.to_string(),
                    candidates: candidates.to_vec(),
                })
        };

        let agent = find("agent", &config.agent_columns)?;
        let date = find("date", &config.date_columns)?;
        let metrics = config
            .metrics
            .iter()
            .map(|m| find(&format!("metric '{}'", m.name), &m.columns))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            agent,
            date,
            metrics,
            metric_names: config.metrics.iter().map(|m| m.name.clone()).collect(),
            date_formats: config.date_formats.clone(),
            agent_digits: config.agent_digits,
            serial_dates: false,
        })
    }

    /// Read plain numbers in the date column as spreadsheet date serials.
    /// Workbooks store dates that way when the cell carries no date format.
    pub fn with_serial_dates(mut self) -> Self {
        self.serial_dates = true;
        self
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    /// Convert one raw row. Cells past the end of a short row count as null.
    pub fn parse_row(&self, row: &[CellValue]) -> Result<Record, RowIssue> {
        let cell = |idx: usize| row.get(idx).unwrap_or(&CellValue::Null);

        let agent =
            normalize_agent(cell(self.agent), self.agent_digits).ok_or(RowIssue::MissingAgent)?;
        let date = match cell(self.date) {
            CellValue::Integer(i) if self.serial_dates => serial_date(*i as f64)?,
            CellValue::Float(v) if self.serial_dates => serial_date(*v)?,
            other => parse_date(other, &self.date_formats)?,
        };
        let metrics = self.metrics.iter().map(|&idx| parse_metric(cell(idx))).collect();

        Ok(Record {
            agent,
            date,
            metrics,
        })
    }
}

/// Header comparison key: trimmed and lower-cased.
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Agent identifier as text, optionally reduced to its last `digits` digits.
pub fn normalize_agent(cell: &CellValue, digits: Option<usize>) -> Option<String> {
    let raw = match cell {
        CellValue::Null => return None,
        CellValue::Text(s) => s.trim().to_string(),
        // Spreadsheets often store phone numbers as floats ("9812345.0").
        CellValue::Float(v) if v.is_finite() && v.fract() == 0.0 => format!("{}", *v as i64),
        other => other.to_string(),
    };

    let agent = match digits {
        Some(n) => {
            let only_digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
            let skip = only_digits.len().saturating_sub(n);
            only_digits[skip..].to_string()
        }
        None => raw,
    };

    if agent.is_empty() {
        None
    } else {
        Some(agent)
    }
}

/// Interpret a cell as a calendar date.
pub fn parse_date(cell: &CellValue, formats: &[String]) -> Result<NaiveDate, RowIssue> {
    match cell {
        CellValue::Date(d) => Ok(*d),
        CellValue::Null => Err(RowIssue::MissingDate),
        CellValue::Text(s) if s.trim().is_empty() => Err(RowIssue::MissingDate),
        CellValue::Text(s) => {
            parse_date_str(s, formats).ok_or_else(|| RowIssue::BadDate(s.trim().to_string()))
        }
        other => Err(RowIssue::BadDate(other.to_string())),
    }
}

/// Parse ISO dates, ISO date-times (date part), then each configured format.
pub fn parse_date_str(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let s = raw.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    // "2024-01-05T10:00:00", "2024-01-05 10:00:00+05:45", ...
    if s.len() > 10 && s.is_char_boundary(10) {
        let (head, tail) = s.split_at(10);
        if tail.starts_with('T') || tail.starts_with(' ') {
            if let Ok(d) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
                return Some(d);
            }
        }
    }

    let date_part = s.split_whitespace().next().unwrap_or(s);
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(s, fmt)
            .or_else(|_| NaiveDate::parse_from_str(date_part, fmt))
            .ok()
    })
}

/// Numeric metric value. Thousands separators are stripped; anything
/// blank or unparseable counts as zero.
pub fn parse_metric(cell: &CellValue) -> f64 {
    let value = match cell {
        CellValue::Integer(i) => *i as f64,
        CellValue::Float(v) => *v,
        CellValue::Bool(b) => f64::from(u8::from(*b)),
        CellValue::Text(s) => s.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
        CellValue::Date(_) | CellValue::Null => 0.0,
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn serial_date(serial: f64) -> Result<NaiveDate, RowIssue> {
    excel_serial_to_date(serial).ok_or_else(|| RowIssue::BadDate(serial.to_string()))
}

/// Convert a spreadsheet date serial (days since 1899-12-30) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}
