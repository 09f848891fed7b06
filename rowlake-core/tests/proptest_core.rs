//! Property-based tests for the data model, pipeline and samplers.

use proptest::prelude::*;

use rowlake_core::adapters::AdapterOptions;
use rowlake_core::adapters::delimited::{parse_delimited, render_delimited};
use rowlake_core::data::record::{compare_values, record_key};
use rowlake_core::data::schema::infer_schema;
use rowlake_core::data::validate::validate;
use rowlake_core::perf::sampling::{random_sample, stratified_sample, systematic_sample};
use rowlake_core::perf::window::VirtualWindow;
use rowlake_core::{CreateOptions, Dataset, DatasetKind, Lake, Record, SortDirection, record};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

fn arb_row() -> impl Strategy<Value = Record> {
    (any::<i32>(), "[a-z]{0,6}", prop::option::of(any::<bool>())).prop_map(|(n, s, b)| {
        record([
            ("n", json!(n)),
            ("s", json!(s)),
            ("b", b.map(Value::Bool).unwrap_or(Value::Null)),
        ])
    })
}

fn arb_rows() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(arb_row(), 0..40)
}

fn dataset(rows: Vec<Record>) -> Arc<Dataset> {
    let schema = infer_schema(&rows);
    Arc::new(Dataset::new("prop", DatasetKind::RawImport, schema, rows))
}

// --- Schema inference & validation ---

proptest! {
    #[test]
    fn inferred_schema_has_first_row_columns(rows in arb_rows()) {
        let schema = infer_schema(&rows);
        match rows.first() {
            None => prop_assert!(schema.is_empty()),
            Some(first) => {
                let names: Vec<&str> = first.keys().map(String::as_str).collect();
                prop_assert_eq!(schema.column_names(), names);
                prop_assert!(schema.columns.iter().all(|c| c.nullable));
            }
        }
    }

    #[test]
    fn rows_always_validate_against_their_own_schema(rows in arb_rows()) {
        let report = validate(&infer_schema(&rows), &rows);
        prop_assert!(report.valid);
        prop_assert_eq!(report.total_rows, rows.len());
    }
}

// --- Pipeline properties ---

proptest! {
    #[test]
    fn limit_returns_the_requested_slice(rows in arb_rows(), count in 0usize..50, offset in 0usize..50) {
        let source = dataset(rows.clone());
        let out = rowlake_core::Pipeline::new(source).limit(count, offset).execute().unwrap();
        let start = offset.min(rows.len());
        let end = (offset + count).min(rows.len());
        prop_assert_eq!(out.rows, rows[start..end].to_vec());
    }

    #[test]
    fn select_is_idempotent(rows in arb_rows()) {
        let source = dataset(rows);
        let once = rowlake_core::Pipeline::new(Arc::clone(&source)).select(&["s", "n"]).execute().unwrap();
        let twice = rowlake_core::Pipeline::new(source)
            .select(&["s", "n"])
            .select(&["s", "n"])
            .execute()
            .unwrap();
        prop_assert_eq!(once.rows, twice.rows);
    }

    #[test]
    fn sort_orders_and_preserves_rows(rows in arb_rows()) {
        let source = dataset(rows.clone());
        let out = rowlake_core::Pipeline::new(source).sort("n", SortDirection::Ascending).execute().unwrap();
        prop_assert_eq!(out.rows.len(), rows.len());
        for pair in out.rows.windows(2) {
            prop_assert_ne!(compare_values(&pair[0]["n"], &pair[1]["n"]), Ordering::Greater);
        }
    }

    #[test]
    fn distinct_leaves_no_duplicates(rows in arb_rows()) {
        let source = dataset(rows);
        let out = rowlake_core::Pipeline::new(source).distinct(None).execute().unwrap();
        let keys: HashSet<String> = out.rows.iter().map(record_key).collect();
        prop_assert_eq!(keys.len(), out.rows.len());
    }

    #[test]
    fn execute_never_touches_the_source(rows in arb_rows()) {
        let source = dataset(rows.clone());
        let _ = rowlake_core::Pipeline::new(Arc::clone(&source))
            .map(|row| {
                let mut row = row.clone();
                row.insert("extra".into(), json!(1));
                row
            })
            .exclude(&["s"])
            .execute()
            .unwrap();
        prop_assert_eq!(&source.rows, &rows);
    }
}

// --- Samplers ---

proptest! {
    #[test]
    fn random_sample_size_and_distinctness(len in 0usize..100, k in 0usize..150) {
        let data: Vec<usize> = (0..len).collect();
        let sample = random_sample(&data, k);
        prop_assert_eq!(sample.len(), k.min(len));
        let unique: HashSet<_> = sample.iter().collect();
        prop_assert_eq!(unique.len(), sample.len());
    }

    #[test]
    fn systematic_sample_size(len in 0usize..100, k in 0usize..150) {
        let data: Vec<usize> = (0..len).collect();
        prop_assert_eq!(systematic_sample(&data, k).len(), k.min(len));
    }

    #[test]
    fn stratified_sample_is_exact(rows in arb_rows(), k in 0usize..50) {
        let sample = stratified_sample(&rows, "b", k);
        prop_assert_eq!(sample.len(), k.min(rows.len()));
    }
}

// --- Windowed rendering ---

proptest! {
    #[test]
    fn window_range_is_within_bounds(
        total in 0usize..100_000,
        scroll in 0.0f64..5_000_000.0,
        item_height in 1.0f64..100.0,
        viewport in 0.0f64..2_000.0,
        buffer in 0usize..20,
    ) {
        let range = VirtualWindow::new(item_height, viewport, buffer).range(total, scroll);
        prop_assert!(range.start <= range.end);
        prop_assert!(range.end <= total);
        prop_assert!((range.total_height - total as f64 * item_height).abs() < 1e-6 * (1.0 + range.total_height));
    }
}

// --- Delimited text ---

proptest! {
    #[test]
    fn delimited_text_round_trips_strings(cells in prop::collection::vec("[a-z ,\"]{1,8}", 1..10)) {
        let rows: Vec<Record> = cells
            .iter()
            .map(|c| record([("text", json!(c)), ("len", json!(c.len()))]))
            .collect();
        let options = AdapterOptions { infer_types: false, ..AdapterOptions::default() };
        let bytes = render_delimited(&rows, &options).unwrap();
        let back = parse_delimited("prop", &bytes, &options).unwrap();
        prop_assert_eq!(back.len(), rows.len());
        for (b, r) in back.iter().zip(&rows) {
            prop_assert_eq!(&b["text"], &r["text"]);
        }
    }
}

// --- Registry ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn stats_match_registered_rows(sizes in prop::collection::vec(0usize..20, 0..6)) {
        let stats = tokio_test::block_on(async {
            let mut lake = Lake::default();
            for (i, size) in sizes.iter().enumerate() {
                let rows: Vec<Record> = (0..*size).map(|n| record([("n", json!(n))])).collect();
                lake.create(format!("ds{i}"), rows, CreateOptions::default()).await.unwrap();
            }
            lake.stats()
        });
        prop_assert_eq!(stats.dataset_count, sizes.len());
        prop_assert_eq!(stats.total_rows, sizes.iter().sum::<usize>());
    }
}
