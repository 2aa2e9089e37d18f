/// Data layer: core types, schema mapping, loading, and filtering.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .json / .parquet / .xlsx
///        │
///        ▼
///   ┌──────────┐     ┌──────────┐
///   │  loader   │────▶│  schema   │  headers → column positions, row → Record
///   └──────────┘     └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  Vec<Record>, agents, date bounds
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  agent / date / threshold predicates → FilteredView
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod schema;

pub use filter::{Comparator, DatePreset, DateRange, FilterCriteria, FilteredView, MetricThreshold};
pub use loader::{load_delimited, load_file, LoadOutcome, SkippedRow};
pub use model::{CellValue, Dataset, Record};
