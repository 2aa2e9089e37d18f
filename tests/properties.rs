//! Property tests for the filter → aggregate → export pipeline.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;

use dsa_dashboard::data::filter::{
    self, Comparator, DateRange, FilterCriteria, FilteredView, MetricThreshold,
};
use dsa_dashboard::data::model::{Dataset, Record};
use dsa_dashboard::export::{parse_report_csv, report_csv, ExportOptions};
use dsa_dashboard::report::{aggregate, Granularity, Grouping};

const AGENTS: [&str; 6] = ["A", "a", "B", "bob", "Carol", "9812345678"];

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 12, 1).unwrap()
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0u64..500).prop_map(|d| base_date() + Days::new(d))
}

fn arb_record() -> impl Strategy<Value = Record> {
    (
        prop::sample::select(AGENTS.to_vec()),
        arb_date(),
        -1.0e6f64..1.0e6,
        0.0f64..10.0,
    )
        .prop_map(|(agent, date, amount, cases)| {
            Record::new(agent, date, vec![amount, cases.floor()])
        })
}

fn arb_dataset() -> impl Strategy<Value = Dataset> {
    prop::collection::vec(arb_record(), 0..80)
        .prop_map(|records| Dataset::from_records(vec!["amount".into(), "cases".into()], records))
}

fn arb_grouping() -> impl Strategy<Value = Grouping> {
    prop_oneof![
        Just(Grouping::Agent),
        prop::sample::select(Granularity::ALL.to_vec()).prop_map(Grouping::AgentPeriod),
    ]
}

fn arb_criteria() -> impl Strategy<Value = FilterCriteria> {
    (
        prop::collection::btree_set(prop::sample::select(AGENTS.to_vec()), 0..4),
        prop::option::of((arb_date(), 0u64..200)),
        prop::option::of((prop::sample::select(Comparator::ALL.to_vec()), -1.0e6f64..1.0e6)),
    )
        .prop_map(|(agents, range, threshold)| {
            let mut criteria = FilterCriteria::all().with_agents(agents);
            if let Some((start, len)) = range {
                let range = DateRange::new(start, start + Days::new(len)).unwrap();
                criteria = criteria.with_date_range(range);
            }
            if let Some((op, value)) = threshold {
                criteria = criteria.with_threshold(MetricThreshold::new("amount", op, value));
            }
            criteria
        })
}

proptest! {
    #[test]
    fn prop_unfiltered_view_is_whole_dataset(ds in arb_dataset()) {
        let view = filter::apply(&ds, &FilterCriteria::all()).unwrap();
        prop_assert_eq!(view.indices().to_vec(), (0..ds.len()).collect::<Vec<_>>());

        if let Some(range) = DateRange::covering(&ds) {
            let view = filter::apply(&ds, &FilterCriteria::all().with_date_range(range)).unwrap();
            prop_assert_eq!(view.len(), ds.len());
        }
    }

    #[test]
    fn prop_filter_keeps_exactly_matching_records(ds in arb_dataset(), criteria in arb_criteria()) {
        let view = filter::apply(&ds, &criteria).unwrap();
        let kept: std::collections::BTreeSet<usize> = view.indices().iter().copied().collect();

        for (i, rec) in ds.records.iter().enumerate() {
            let agent_ok = criteria.agents.is_empty() || criteria.agents.contains(&rec.agent);
            let date_ok = criteria.date_range.as_ref().map_or(true, |r| r.contains(rec.date));
            let metric_ok = criteria
                .thresholds
                .iter()
                .all(|t| t.comparator.holds(rec.metrics[0], t.value));
            prop_assert_eq!(kept.contains(&i), agent_ok && date_ok && metric_ok);
        }
    }

    #[test]
    fn prop_group_counts_add_up(ds in arb_dataset(), criteria in arb_criteria(), grouping in arb_grouping()) {
        let view = filter::apply(&ds, &criteria).unwrap();
        let report = aggregate(&view, grouping);

        prop_assert_eq!(report.total_records(), view.len());
        for m in 0..report.metric_names.len() {
            let counted: usize = report.rows.iter().map(|r| r.metrics[m].count).sum();
            prop_assert_eq!(counted, view.len());
        }
        prop_assert_eq!(view.is_empty(), report.is_empty());
    }

    #[test]
    fn prop_rows_strictly_ordered_and_repeatable(ds in arb_dataset(), grouping in arb_grouping()) {
        let view = FilteredView::full(&ds);
        let first = aggregate(&view, grouping);
        let second = aggregate(&view, grouping);
        prop_assert_eq!(&first, &second);

        for pair in first.rows.windows(2) {
            prop_assert!(pair[0].key < pair[1].key);
            let (a, b) = (pair[0].key.agent.to_lowercase(), pair[1].key.agent.to_lowercase());
            prop_assert!(a <= b);
        }
    }

    #[test]
    fn prop_sums_fold_in_dataset_order(ds in arb_dataset()) {
        let report = aggregate(&FilteredView::full(&ds), Grouping::Agent);
        for row in &report.rows {
            let expected = ds
                .records
                .iter()
                .filter(|r| r.agent == row.key.agent)
                .fold(0.0, |acc, r| acc + r.metrics[0]);
            prop_assert_eq!(row.metrics[0].sum.to_bits(), expected.to_bits());
            prop_assert_eq!(row.metrics[0].mean, expected / row.records as f64);
        }
    }

    #[test]
    fn prop_report_csv_round_trips(ds in arb_dataset(), grouping in arb_grouping()) {
        let report = aggregate(&FilteredView::full(&ds), grouping);
        let bytes = report_csv(&report, &ExportOptions::default()).unwrap();
        prop_assert_eq!(parse_report_csv(&bytes, b',').unwrap(), report);
    }
}
