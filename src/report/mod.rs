//! Aggregation of filtered records into the summary and time-series reports.

pub mod aggregate;
pub mod period;

pub use aggregate::{
    aggregate, summary_report, time_series_report, GroupFilter, GroupKey, GroupMeasure, GroupRow,
    GroupThreshold, Grouping, Headline, MetricAggregate, ReportResult, Stat,
};
pub use period::{Granularity, Period};
