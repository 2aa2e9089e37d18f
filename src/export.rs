//! Report and record export to CSV and Excel byte buffers.
//!
//! Report column order: `agent`, the granularity name for time-series
//! reports (`month`, `week`, ...), `records`, then `<metric>_count`,
//! `<metric>_sum`, `<metric>_avg`, `<metric>_rate` per metric in
//! configuration order. The rate is the percentage of records with a
//! positive value.

use std::fmt;

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook};

use crate::config::ExportConfig;
use crate::data::filter::FilteredView;
use crate::error::{Error, Result};
use crate::report::{GroupKey, GroupRow, Grouping, Granularity, MetricAggregate, Period, ReportResult, Stat};

/// Download formats offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Writer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Largest number of data rows any single table may have.
    pub max_rows: usize,
    pub delimiter: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        let mut buf = [0u8; 4];
        let delimiter = config.csv_delimiter.encode_utf8(&mut buf).as_bytes()[0];
        Self {
            max_rows: config.max_rows,
            delimiter,
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// A typed cell. Numbers stay numeric in Excel.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Count(usize),
    Number(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Count(n) => write!(f, "{n}"),
            // `Display` for f64 is the shortest text that parses back exactly.
            Cell::Number(v) => write!(f, "{v}"),
        }
    }
}

/// Header plus rows, in output column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Header row for a report with the given grouping and metrics.
pub fn report_headers(grouping: Grouping, metric_names: &[String]) -> Vec<String> {
    let mut headers = vec!["agent".to_string()];
    if let Some(g) = grouping.granularity() {
        headers.push(g.name().to_string());
    }
    headers.push("records".to_string());
    for name in metric_names {
        for stat in Stat::ALL {
            headers.push(format!("{name}_{}", stat.suffix()));
        }
    }
    headers
}

pub fn report_table(report: &ReportResult) -> Table {
    let rows = report
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![Cell::Text(row.key.agent.clone())];
            if let Some(period) = &row.key.period {
                cells.push(Cell::Text(period.label()));
            }
            cells.push(Cell::Count(row.records));
            for m in &row.metrics {
                cells.push(Cell::Count(m.count));
                cells.push(Cell::Number(m.sum));
                cells.push(Cell::Number(m.mean));
                cells.push(Cell::Number(m.rate()));
            }
            cells
        })
        .collect();

    Table {
        headers: report_headers(report.grouping, &report.metric_names),
        rows,
    }
}

/// The filtered records: `agent`, `date`, then one column per metric.
pub fn records_table(view: &FilteredView<'_>) -> Table {
    let mut headers = vec!["agent".to_string(), "date".to_string()];
    headers.extend(view.metric_names().iter().cloned());

    let rows = view
        .records()
        .map(|rec| {
            let mut cells = vec![
                Cell::Text(rec.agent.clone()),
                Cell::Text(rec.date.format("%Y-%m-%d").to_string()),
            ];
            cells.extend(rec.metrics.iter().map(|&v| Cell::Number(v)));
            cells
        })
        .collect();

    Table { headers, rows }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn check_size(table: &Table, options: &ExportOptions) -> Result<()> {
    if table.len() > options.max_rows {
        return Err(Error::ExportTooLarge {
            rows: table.len(),
            limit: options.max_rows,
        });
    }
    Ok(())
}

/// Serialize a table as delimited text. Fields containing the delimiter,
/// quotes or line breaks are quoted.
pub fn write_csv(table: &Table, options: &ExportOptions) -> Result<Vec<u8>> {
    check_size(table, options)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}

/// Serialize named tables as worksheets of one workbook.
///
/// Every table is size-checked before anything is written.
pub fn write_xlsx(sheets: &[(&str, &Table)], options: &ExportOptions) -> Result<Vec<u8>> {
    for (_, table) in sheets {
        check_size(table, options)?;
    }

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name)?;

        for (c, header) in table.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, c as u16, header, &bold)?;
        }
        for (r, row) in table.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    Cell::Text(s) => worksheet.write_string(r, c, s)?,
                    Cell::Count(n) => worksheet.write_number(r, c, *n as f64)?,
                    Cell::Number(v) => worksheet.write_number(r, c, *v)?,
                };
            }
        }
    }

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

fn report_sheet_name(report: &ReportResult) -> &'static str {
    match report.grouping {
        Grouping::Agent => "DSA_Summary",
        Grouping::AgentPeriod(_) => "DSA_Time_Series",
    }
}

/// Report as CSV bytes.
pub fn report_csv(report: &ReportResult, options: &ExportOptions) -> Result<Vec<u8>> {
    let bytes = write_csv(&report_table(report), options)?;
    log::info!("Exported {} report rows as CSV ({} bytes)", report.len(), bytes.len());
    Ok(bytes)
}

/// Report workbook; with `records`, a second sheet lists the filtered rows.
pub fn report_xlsx(
    report: &ReportResult,
    records: Option<&FilteredView<'_>>,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let report_table = report_table(report);
    let records_table = records.map(records_table);

    let mut sheets = vec![(report_sheet_name(report), &report_table)];
    if let Some(table) = &records_table {
        sheets.push(("Filtered_Records", table));
    }

    let bytes = write_xlsx(&sheets, options)?;
    log::info!("Exported {} report rows as XLSX ({} bytes)", report.len(), bytes.len());
    Ok(bytes)
}

/// Filtered records as CSV bytes.
pub fn records_csv(view: &FilteredView<'_>, options: &ExportOptions) -> Result<Vec<u8>> {
    write_csv(&records_table(view), options)
}

/// Download name such as `DSA_Summary_20240105_093000.csv`.
pub fn timestamped_file_name(prefix: &str, format: ExportFormat, now: NaiveDateTime) -> String {
    format!("{prefix}_{}.{}", now.format("%Y%m%d_%H%M%S"), format.extension())
}

// ---------------------------------------------------------------------------
// Reading a report back
// ---------------------------------------------------------------------------

/// Parse CSV produced by [`report_csv`] back into a [`ReportResult`].
pub fn parse_report_csv(bytes: &[u8], delimiter: u8) -> Result<ReportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let (grouping, metric_names) = parse_report_headers(&headers)?;
    let key_width = if grouping.granularity().is_some() { 2 } else { 1 };

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let line = i + 2;
        if record.len() != headers.len() {
            return Err(malformed(line, "wrong number of fields"));
        }

        let agent = record[0].to_string();
        let period = match grouping.granularity() {
            Some(g) => Some(
                Period::parse(&record[1], g)
                    .ok_or_else(|| malformed(line, &format!("bad {g} '{}'", &record[1])))?,
            ),
            None => None,
        };
        let records = parse_field::<usize>(&record[key_width], line)?;

        let metrics = (0..metric_names.len())
            .map(|m| {
                let base = key_width + 1 + m * Stat::ALL.len();
                let count: usize = parse_field(&record[base], line)?;
                let rate: f64 = parse_field(&record[base + 3], line)?;
                let positive = rate * count as f64 / 100.0;
                if !(0.0..=count as f64).contains(&positive) {
                    return Err(malformed(line, &format!("rate {rate} out of range")));
                }
                Ok(MetricAggregate {
                    count,
                    sum: parse_field(&record[base + 1], line)?,
                    mean: parse_field(&record[base + 2], line)?,
                    positive: positive.round() as usize,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        rows.push(GroupRow {
            key: GroupKey { agent, period },
            records,
            metrics,
        });
    }

    rows.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(ReportResult {
        grouping,
        metric_names,
        rows,
    })
}

fn parse_report_headers(headers: &[String]) -> Result<(Grouping, Vec<String>)> {
    if headers.first().map(String::as_str) != Some("agent") {
        return Err(Error::MalformedReport("first column must be 'agent'".into()));
    }
    let granularity = headers.get(1).and_then(|h| Granularity::from_name(h));
    let grouping = match granularity {
        Some(g) => Grouping::AgentPeriod(g),
        None => Grouping::Agent,
    };
    let key_width = if granularity.is_some() { 2 } else { 1 };

    if headers.get(key_width).map(String::as_str) != Some("records") {
        return Err(Error::MalformedReport("missing 'records' column".into()));
    }
    let metric_headers = &headers[key_width + 1..];
    if metric_headers.len() % Stat::ALL.len() != 0 {
        return Err(Error::MalformedReport(
            "metric columns must come in count/sum/avg/rate groups".into(),
        ));
    }

    let mut metric_names = Vec::new();
    for group in metric_headers.chunks(Stat::ALL.len()) {
        let name = group[0]
            .strip_suffix("_count")
            .ok_or_else(|| Error::MalformedReport(format!("unexpected column '{}'", group[0])))?;
        let in_order = group
            .iter()
            .zip(Stat::ALL)
            .all(|(header, stat)| *header == format!("{name}_{}", stat.suffix()));
        if !in_order {
            return Err(Error::MalformedReport(format!(
                "columns for metric '{name}' are out of order"
            )));
        }
        metric_names.push(name.to_string());
    }

    Ok((grouping, metric_names))
}

fn parse_field<T: std::str::FromStr>(raw: &str, line: usize) -> Result<T> {
    raw.parse()
        .map_err(|_| malformed(line, &format!("cannot parse '{raw}'")))
}

fn malformed(line: usize, what: &str) -> Error {
    Error::MalformedReport(format!("line {line}: {what}"))
}
