//! Writes `sample_dsa.csv` and `sample_dsa.parquet` with synthetic DSA
//! transactions for trying out the dashboard.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Days, NaiveDate};
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct Transaction {
    agent: String,
    date: NaiveDate,
    amount: f64,
    cases: i64,
}

fn generate(rng: &mut SimpleRng, start: NaiveDate, days: u64) -> Vec<Transaction> {
    // Each agent has a typical ticket size and activity level.
    let agents: Vec<(String, f64, u64)> = (0..12)
        .map(|i| {
            let mobile = format!("98{:08}", 41_000_000 + i * 7_919);
            let ticket = 20_000.0 + rng.next_f64() * 80_000.0;
            let activity = 2 + rng.below(6);
            (mobile, ticket, activity)
        })
        .collect();

    let mut rows = Vec::new();
    for day in 0..days {
        let Some(date) = start.checked_add_days(Days::new(day)) else {
            break;
        };
        for (agent, ticket, activity) in &agents {
            if rng.below(10) >= *activity {
                continue;
            }
            let amount = (rng.gauss(*ticket, ticket * 0.3)).max(500.0);
            rows.push(Transaction {
                agent: agent.clone(),
                date,
                amount: (amount * 100.0).round() / 100.0,
                cases: 1 + rng.below(3) as i64,
            });
        }
    }
    rows
}

/// CSV with the headers used by the field export, dates as dd/mm/yyyy and
/// a few rows the loader is expected to skip.
fn write_csv(path: &str, rows: &[Transaction]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    writer.write_record(["Agent Mobile", "Transaction Date", "Amount", "Deposit Count"])?;
    for row in rows {
        writer.write_record([
            row.agent.clone(),
            row.date.format("%d/%m/%Y").to_string(),
            format!("{:.2}", row.amount),
            row.cases.to_string(),
        ])?;
    }
    writer.write_record(["", "05/01/2024", "1000", "1"])?;
    writer.write_record(["9841000000", "31/02/2024", "1000", "1"])?;
    writer.write_record(["9841000000", "", "1000", "1"])?;
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &str, rows: &[Transaction]) -> Result<()> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("epoch date")?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("agent", DataType::Utf8, false),
        Field::new("date", DataType::Date32, false),
        Field::new("amount", DataType::Float64, false),
        Field::new("cases", DataType::Int64, false),
    ]));

    let agent = StringArray::from(rows.iter().map(|r| r.agent.as_str()).collect::<Vec<_>>());
    let date = Date32Array::from(
        rows.iter()
            .map(|r| (r.date - epoch).num_days() as i32)
            .collect::<Vec<_>>(),
    );
    let amount = Float64Array::from(rows.iter().map(|r| r.amount).collect::<Vec<_>>());
    let cases = Int64Array::from(rows.iter().map(|r| r.cases).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(agent),
            Arc::new(date),
            Arc::new(amount),
            Arc::new(cases),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).context("start date")?;
    let rows = generate(&mut rng, start, 182);

    write_csv("sample_dsa.csv", &rows)?;
    write_parquet("sample_dsa.parquet", &rows)?;

    println!(
        "Wrote {} transactions to sample_dsa.csv (plus 3 malformed rows) and sample_dsa.parquet",
        rows.len()
    );
    Ok(())
}
