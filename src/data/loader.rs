use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int32Array,
    Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use calamine::{open_workbook_auto, Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use crate::config::SchemaConfig;
use crate::error::{Error, RowIssue};

use super::model::{CellValue, Dataset, Record};
use super::schema::{excel_serial_to_date, ResolvedSchema};

/// How many skipped rows are kept verbatim for the warning summary.
pub const MAX_ISSUE_SAMPLES: usize = 20;

/// A data row the loader rejected. `row` is 1-based and excludes the header;
/// for delimited text it is the file line minus one.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub row: usize,
    pub issue: RowIssue,
}

/// Result of loading a file: the dataset plus what was left out of it.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    pub skipped: usize,
    /// The first [`MAX_ISSUE_SAMPLES`] skipped rows.
    pub samples: Vec<SkippedRow>,
}

impl LoadOutcome {
    /// One-line summary for the status bar, `None` when nothing was skipped.
    pub fn warning(&self) -> Option<String> {
        skipped_warning(self.skipped, &self.samples)
    }
}

/// "N malformed rows skipped (first: row R, issue)", or `None` for zero.
pub fn skipped_warning(skipped: usize, samples: &[SkippedRow]) -> Option<String> {
    if skipped == 0 {
        return None;
    }
    let first = samples
        .first()
        .map(|s| format!(" (first: row {}, {})", s.row, s.issue))
        .unwrap_or_default();
    Some(format!("{skipped} malformed rows skipped{first}"))
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a DSA dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`, `.tsv`/`.tab` – header row, one record per line
/// * `.json`               – `[{ "agent": ..., "date": ..., ...metrics }, ...]`
/// * `.parquet`/`.pq`      – flat columns (strings, numbers, dates)
/// * `.xlsx`/`.xlsm`/`.xls`/`.ods` – first worksheet, header row first
pub fn load_file(path: &Path, config: &SchemaConfig) -> Result<LoadOutcome> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let outcome = match ext.as_str() {
        "csv" => load_delimited_path(path, b',', config),
        "tsv" | "tab" => load_delimited_path(path, b'\t', config),
        "json" => load_json(path, config),
        "parquet" | "pq" => load_parquet(path, config),
        "xlsx" | "xlsm" | "xls" | "ods" => load_spreadsheet(path, config),
        other => Err(Error::UnsupportedFormat(other.to_string()).into()),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!(
        "Loaded {} records for {} agents from {}",
        outcome.dataset.len(),
        outcome.dataset.agents.len(),
        path.display()
    );
    if let Some(warning) = outcome.warning() {
        log::warn!("{warning}");
    }
    Ok(outcome)
}

/// Load delimited text from any reader (e.g. an uploaded file's bytes).
pub fn load_delimited<R: Read>(
    reader: R,
    delimiter: u8,
    config: &SchemaConfig,
) -> Result<LoadOutcome> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    // Fields are decoded lossily so a stray cp1252 byte cannot sink the load.
    let headers: Vec<String> = reader
        .byte_headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();

    let mut sink = RowSink::new(ResolvedSchema::resolve(&headers, config)?);

    let mut record = csv::ByteRecord::new();
    let mut fallback_row = 0;
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("CSV row {}", fallback_row + 1))?
    {
        fallback_row += 1;
        // Row numbers follow the file's lines, so blank lines still count.
        let row = record
            .position()
            .map(|p| (p.line() as usize).saturating_sub(1))
            .unwrap_or(fallback_row);
        let cells: Vec<CellValue> = record
            .iter()
            .map(|field| CellValue::Text(String::from_utf8_lossy(field).into_owned()))
            .collect();
        sink.push(row, &cells);
    }

    Ok(sink.finish())
}

// ---------------------------------------------------------------------------
// Row collection shared by every format
// ---------------------------------------------------------------------------

struct RowSink {
    schema: ResolvedSchema,
    records: Vec<Record>,
    skipped: usize,
    samples: Vec<SkippedRow>,
}

impl RowSink {
    fn new(schema: ResolvedSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
            skipped: 0,
            samples: Vec::new(),
        }
    }

    fn push(&mut self, row: usize, cells: &[CellValue]) {
        // Blank lines in spreadsheets and CSV exports are not data rows.
        if cells.iter().all(CellValue::is_blank) {
            return;
        }
        match self.schema.parse_row(cells) {
            Ok(record) => self.records.push(record),
            Err(issue) => {
                log::debug!("skipping row {row}: {issue}");
                self.skipped += 1;
                if self.samples.len() < MAX_ISSUE_SAMPLES {
                    self.samples.push(SkippedRow { row, issue });
                }
            }
        }
    }

    fn finish(self) -> LoadOutcome {
        LoadOutcome {
            dataset: Dataset::from_records(self.schema.metric_names().to_vec(), self.records),
            skipped: self.skipped,
            samples: self.samples,
        }
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_delimited_path(path: &Path, delimiter: u8, config: &SchemaConfig) -> Result<LoadOutcome> {
    let file = std::fs::File::open(path).context("opening delimited file")?;
    load_delimited(std::io::BufReader::new(file), delimiter, config)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "agent": "9812345", "date": "2024-01-05", "amount": 100.0 },
///   ...
/// ]
/// ```
fn load_json(path: &Path, config: &SchemaConfig) -> Result<LoadOutcome> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {} is not a JSON object", i + 1))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut sink = RowSink::new(ResolvedSchema::resolve(&headers, config)?);

    for (i, rec) in records.iter().enumerate() {
        let cells: Vec<CellValue> = headers
            .iter()
            .map(|h| rec.get(h).map(json_to_cell).unwrap_or(CellValue::Null))
            .collect();
        sink.push(i + 1, &cells);
    }

    Ok(sink.finish())
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per field.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Date columns may be stored as
/// `Date32`, timestamps, or text.
fn load_parquet(path: &Path, config: &SchemaConfig) -> Result<LoadOutcome> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;

    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let mut sink = RowSink::new(ResolvedSchema::resolve(&headers, config)?);

    let reader = builder.build().context("building parquet reader")?;
    let options = FormatOptions::default();
    let mut row_no = 0;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let formatters = batch
            .columns()
            .iter()
            .map(|col| ArrayFormatter::try_new(col.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()
            .context("preparing parquet column formatters")?;

        for row in 0..batch.num_rows() {
            row_no += 1;
            let cells: Vec<CellValue> = batch
                .columns()
                .iter()
                .zip(&formatters)
                .map(|(col, fmt)| extract_cell(col, row, fmt))
                .collect();
            sink.push(row_no, &cells);
        }
    }

    Ok(sink.finish())
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize, formatter: &ArrayFormatter<'_>) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => match any.downcast_ref::<StringArray>() {
            Some(s) => CellValue::Text(s.value(row).to_string()),
            None => CellValue::Text(formatter.value(row).to_string()),
        },
        DataType::LargeUtf8 => CellValue::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => match any.downcast_ref::<Int32Array>() {
            Some(arr) => CellValue::Integer(i64::from(arr.value(row))),
            None => CellValue::Null,
        },
        DataType::Int64 => match any.downcast_ref::<Int64Array>() {
            Some(arr) => CellValue::Integer(arr.value(row)),
            None => CellValue::Null,
        },
        DataType::Float32 => match any.downcast_ref::<Float32Array>() {
            Some(arr) => CellValue::Float(f64::from(arr.value(row))),
            None => CellValue::Null,
        },
        DataType::Float64 => match any.downcast_ref::<Float64Array>() {
            Some(arr) => CellValue::Float(arr.value(row)),
            None => CellValue::Null,
        },
        DataType::Boolean => match any.downcast_ref::<BooleanArray>() {
            Some(arr) => CellValue::Bool(arr.value(row)),
            None => CellValue::Null,
        },
        DataType::Date32 => any
            .downcast_ref::<Date32Array>()
            .and_then(|arr| arr.value_as_date(row))
            .map(CellValue::Date)
            .unwrap_or(CellValue::Null),
        // Timestamps, Date64, dictionaries, smaller ints: textual form is
        // enough for the schema parsers.
        _ => CellValue::Text(formatter.value(row).to_string()),
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// Load the first worksheet of an Excel or OpenDocument workbook.
fn load_spreadsheet(path: &Path, config: &SchemaConfig) -> Result<LoadOutcome> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook has no sheets")?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("reading sheet '{sheet_name}'"))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .context("sheet is empty")?
        .iter()
        .map(|cell| cell.to_string())
        .collect();

    let schema = ResolvedSchema::resolve(&headers, config)?.with_serial_dates();
    let mut sink = RowSink::new(schema);

    for (i, row) in rows.enumerate() {
        let cells: Vec<CellValue> = row.iter().map(spreadsheet_to_cell).collect();
        sink.push(i + 1, &cells);
    }

    Ok(sink.finish())
}

fn spreadsheet_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or(CellValue::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        _ => CellValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_load_delimited_skips_malformed_rows() {
        let csv = "agent,date,amount,cases\n\
                   A,2024-01-05,100,1\n\
                   ,2024-01-06,50,1\n\
                   B,not-a-date,70,2\n\
                   \n\
                   B,2024-01-10,\"1,200\",3\n";

        let outcome = load_delimited(csv.as_bytes(), b',', &SchemaConfig::default()).unwrap();

        assert_eq!(outcome.dataset.len(), 2);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(
            outcome.samples,
            vec![
                SkippedRow {
                    row: 2,
                    issue: RowIssue::MissingAgent
                },
                SkippedRow {
                    row: 3,
                    issue: RowIssue::BadDate("not-a-date".into())
                },
            ]
        );
        assert_eq!(outcome.dataset.records[1].metrics, vec![1200.0, 3.0]);
        assert!(outcome.warning().unwrap().starts_with("2 malformed rows skipped"));
    }

    #[test]
    fn test_load_delimited_tolerates_invalid_utf8() {
        let mut csv = b"agent,date,amount,cases,name\n\
                        A,2024-01-05,100,1,Ram\n\
                        B,2024-01-06,50,1,Jos"
            .to_vec();
        csv.push(0xE9);
        csv.extend_from_slice(b"\nC,2024-01-07,70,2,Sita\n");

        let outcome = load_delimited(csv.as_slice(), b',', &SchemaConfig::default()).unwrap();

        assert_eq!(outcome.skipped, 0);
        let agents: Vec<&str> = outcome
            .dataset
            .records
            .iter()
            .map(|r| r.agent.as_str())
            .collect();
        assert_eq!(agents, vec!["A", "B", "C"]);
        assert_eq!(outcome.dataset.records[1].metrics, vec![50.0, 1.0]);
    }

    #[test]
    fn test_skipped_row_numbers_follow_file_lines() {
        let csv = "agent,date,amount,cases\n\
                   A,2024-01-05,100,1\n\
                   \n\
                   \n\
                   B,someday,70,2\n";

        let outcome = load_delimited(csv.as_bytes(), b',', &SchemaConfig::default()).unwrap();

        assert_eq!(outcome.skipped, 1);
        // Line 5 of the file, the header being line 1.
        assert_eq!(outcome.samples[0].row, 4);
        assert!(outcome.warning().unwrap().contains("row 4"));
    }

    #[test]
    fn test_load_delimited_tab_separated() {
        let tsv = "Created By\tTransaction Date\tAmount\tDeposit Count\n\
                   9812345\t05/01/2024\t10\t1\n";
        let outcome = load_delimited(tsv.as_bytes(), b'\t', &SchemaConfig::default()).unwrap();

        assert_eq!(outcome.skipped, 0);
        assert!(outcome.warning().is_none());
        let rec = &outcome.dataset.records[0];
        assert_eq!(rec.agent, "9812345");
        assert_eq!(rec.date, date(2024, 1, 5));
    }

    #[test]
    fn test_load_delimited_missing_column_is_fatal() {
        let csv = "agent,amount\nA,1\n";
        let err = load_delimited(csv.as_bytes(), b',', &SchemaConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_load_file_rejects_unknown_extension() {
        let err = load_file(Path::new("report.pdf"), &SchemaConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnsupportedFormat(ext)) if ext == "pdf"
        ));
    }

    #[test]
    fn test_json_to_cell() {
        assert_eq!(json_to_cell(&serde_json::json!(3)), CellValue::Integer(3));
        assert_eq!(json_to_cell(&serde_json::json!(2.5)), CellValue::Float(2.5));
        assert_eq!(json_to_cell(&serde_json::json!(null)), CellValue::Null);
        assert_eq!(
            json_to_cell(&serde_json::json!("x")),
            CellValue::Text("x".into())
        );
    }

    #[test]
    fn test_spreadsheet_to_cell() {
        assert_eq!(spreadsheet_to_cell(&Data::Int(4)), CellValue::Integer(4));
        assert_eq!(spreadsheet_to_cell(&Data::Empty), CellValue::Null);
        assert_eq!(
            spreadsheet_to_cell(&Data::String("A".into())),
            CellValue::Text("A".into())
        );
    }
}
