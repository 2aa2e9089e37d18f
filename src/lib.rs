//! DSA performance dashboard: load agent transaction records, filter them,
//! aggregate per agent (and per period), chart the result, and export it.
//!
//! The desktop binary in `main.rs` is a thin egui shell over [`Session`].
//!
//! ```no_run
//! use std::path::Path;
//! use dsa_dashboard::{Config, FilterCriteria, ReportRequest, Session};
//! use dsa_dashboard::export::ExportFormat;
//!
//! # fn main() -> anyhow::Result<()> {
//! let session = Session::open(Path::new("sample_dsa.csv"), Config::default())?;
//! let output = session.report(&ReportRequest::summary(FilterCriteria::all()))?;
//! let csv = session.export(&output, ExportFormat::Csv)?;
//! # let _ = csv;
//! # Ok(())
//! # }
//! ```

pub mod chart;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod report;
pub mod session;

pub use config::Config;
pub use data::{Dataset, FilterCriteria, FilteredView, Record};
pub use error::{Error, Result};
pub use report::{GroupFilter, Granularity, Grouping, ReportResult, Stat};
pub use session::{ChartView, ReportOutput, ReportRequest, Session};
