//! End-to-end tests for the lake: import, pipelines, storage and paging.

use pretty_assertions::assert_eq;
use rowlake_core::adapters::{DELIMITED_TEXT, EMBEDDED_SQL, STRUCTURED_TEXT};
use rowlake_core::config::StorageBackend;
use rowlake_core::data::validate::ValidationErrorKind;
use rowlake_core::perf::{PagedLoader, StreamHooks, StreamProcessor, dataset_pages};
use rowlake_core::{
    AdapterOptions, Aggregation, ColumnDescriptor, ColumnType, Condition, CreateOptions, DatasetKind,
    DatasetPatch, ExternalHandle, FileStorage, Lake, LakeConfig, LakeError, MergeOptions, Record, Schema,
    SortDirection, UpdateOptions, record,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Helper to import the canonical two-person CSV into a fresh lake.
async fn lake_with_people() -> (Lake, String) {
    let mut lake = Lake::default();
    let handle = ExternalHandle::bytes("people.csv", "name,age\nAlice,25\nBob,30");
    let ds = lake
        .import("people", DELIMITED_TEXT, &handle, &AdapterOptions::default())
        .await
        .unwrap();
    (lake, ds.id.clone())
}

#[tokio::test]
async fn test_import_infer_filter_execute() {
    let (lake, id) = lake_with_people().await;
    let ds = lake.get(&id).unwrap();

    assert_eq!(
        ds.schema.columns,
        vec![
            ColumnDescriptor::new("name", ColumnType::String, true),
            ColumnDescriptor::new("age", ColumnType::Integer, true),
        ]
    );

    let result = lake
        .create_pipeline(&id)
        .unwrap()
        .filter(|row| row["age"].as_i64().is_some_and(|age| age > 26))
        .execute()
        .unwrap();

    assert_eq!(result.rows, vec![record([("name", json!("Bob")), ("age", json!(30))])]);
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.kind, DatasetKind::Transformed);
    assert_eq!(result.metadata_str("source_id"), Some(id.as_str()));
    assert_ne!(result.id, id);
}

#[tokio::test]
async fn test_declarative_filter_matches_closure_filter() {
    let (lake, id) = lake_with_people().await;
    let condition: Condition = "age>26".parse().unwrap();
    let rows = lake
        .create_pipeline(&id)
        .unwrap()
        .filter_where(condition)
        .preview(10)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("Bob"));
}

#[tokio::test]
async fn test_grouped_aggregation_through_lake() {
    let mut lake = Lake::default();
    let sales = vec![
        record([("region", json!("N")), ("amount", json!(10))]),
        record([("region", json!("N")), ("amount", json!(5))]),
        record([("region", json!("S")), ("amount", json!(7))]),
    ];
    let ds = lake.create("sales", sales, CreateOptions::default()).await.unwrap();

    let pipeline = lake
        .create_pipeline(&ds.id)
        .unwrap()
        .aggregate(vec![Aggregation::sum("total", "amount")], &["region"])
        .sort("region", SortDirection::Ascending);
    let saved = lake.materialize(&pipeline, Some("sales by region")).await.unwrap();

    assert_eq!(
        saved.rows,
        vec![
            record([("region", json!("N")), ("total", json!(15))]),
            record([("region", json!("S")), ("total", json!(7))]),
        ]
    );
    assert_eq!(lake.find_by_name("sales by region").unwrap().id, saved.id);
}

#[tokio::test]
async fn test_row_count_invariant_across_operations() {
    let (mut lake, id) = lake_with_people().await;
    let check = |lake: &Lake| {
        for summary in lake.list() {
            let ds = lake.get(&summary.id).unwrap();
            assert_eq!(ds.rows.len(), ds.row_count());
            assert_eq!(summary.row_count, ds.rows.len());
        }
    };
    check(&lake);

    let copy = lake.clone_dataset(&id, None).await.unwrap();
    check(&lake);
    lake.update(&copy.id, DatasetPatch::rows(Vec::new()), UpdateOptions::default())
        .await
        .unwrap();
    check(&lake);
    lake.merge(&[id.as_str(), copy.id.as_str()], MergeOptions::default())
        .await
        .unwrap();
    check(&lake);
    lake.delete(&copy.id).await.unwrap();
    check(&lake);

    let stats = lake.stats();
    assert_eq!(stats.dataset_count, 2);
    assert_eq!(stats.total_rows, 4);
}

#[tokio::test]
async fn test_file_backed_lake_survives_restart() {
    let dir = TempDir::new().unwrap();
    let mut config = LakeConfig::default();
    config.storage.backend = StorageBackend::File;

    let id = {
        let mut lake = Lake::from_config(config.clone(), dir.path());
        let ds = lake
            .create("events", vec![record([("kind", json!("click"))])], CreateOptions::default())
            .await
            .unwrap();
        lake.update(&ds.id, DatasetPatch::rename("clicks"), UpdateOptions::default())
            .await
            .unwrap();
        ds.id.clone()
    };

    let stored = FileStorage::new(config.data_dir(dir.path()));
    assert!(stored.dir().join(format!("{id}.json")).exists());

    let mut lake = Lake::from_config(config, dir.path());
    assert_eq!(lake.hydrate().await.unwrap(), 1);
    let ds = lake.get(&id).unwrap();
    assert_eq!(ds.name, "clicks");
    assert_eq!(ds.version, 2);

    assert!(lake.delete(&id).await.unwrap());
    assert!(!stored.dir().join(format!("{id}.json")).exists());
}

#[tokio::test]
async fn test_export_formats_round_trip() {
    let (mut lake, _) = lake_with_people().await;
    let tricky = vec![record([("a", json!("x,y")), ("b", json!(1))])];
    let ds = lake.create("tricky", tricky.clone(), CreateOptions::default()).await.unwrap();
    let options = AdapterOptions::default();

    for format in [DELIMITED_TEXT, STRUCTURED_TEXT, EMBEDDED_SQL] {
        let bytes = lake.export(&ds.id, format, &options).await.unwrap();
        let back = lake
            .import("back", format, &ExternalHandle::bytes(format, bytes), &options)
            .await
            .unwrap();
        assert_eq!(back.rows, tricky, "format {format}");
    }
}

#[tokio::test]
async fn test_validation_report_lists_every_problem() {
    let mut lake = Lake::default();
    let schema = Schema::new(vec![
        ColumnDescriptor::new("id", ColumnType::Integer, false),
        ColumnDescriptor::new("name", ColumnType::String, true),
    ]);
    let rows: Vec<Record> = vec![
        record([("id", json!(1)), ("name", json!("ok"))]),
        record([("id", json!(null)), ("name", json!(5))]),
    ];
    let options = CreateOptions {
        schema: Some(schema),
        ..CreateOptions::default()
    };
    let ds = lake.create("strict", rows, options).await.unwrap();

    let report = lake.validate(&ds.id).unwrap();
    assert!(!report.valid);
    assert_eq!(report.total_rows, 2);
    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.errors[0].error, ValidationErrorKind::RequiredValueIsNull);
    assert_eq!(report.errors[1].error, ValidationErrorKind::TypeMismatch);
    assert_eq!(report.error_rate, 0.5);
}

#[tokio::test]
async fn test_failing_step_discards_everything() {
    let (mut lake, id) = lake_with_people().await;
    let before = lake.len();
    let pipeline = lake.create_pipeline(&id).unwrap().select(&["name"]).try_map(|row| {
        if row["name"] == json!("Bob") {
            anyhow::bail!("cannot map Bob");
        }
        Ok(row.clone())
    });

    let err = lake.materialize(&pipeline, None).await.unwrap_err();
    assert!(matches!(err, LakeError::Transform { .. }));
    assert_eq!(lake.len(), before);
}

#[tokio::test]
async fn test_two_concurrent_page_loads_fetch_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader: PagedLoader<u32> = PagedLoader::new(10, move |page, _| {
        let counter = Arc::clone(&counter);
        async move {
            if page == 3 {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
            Ok::<_, anyhow::Error>(vec![page as u32])
        }
    });

    let (a, b) = tokio::join!(loader.load_page(3), loader.load_page(3));
    assert_eq!(*a.unwrap(), vec![3]);
    assert_eq!(*b.unwrap(), vec![3]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_paging_and_streaming_over_dataset() {
    let mut lake = Lake::default();
    let rows: Vec<Record> = (0..250).map(|i| record([("n", json!(i))])).collect();
    let ds = lake.create("numbers", rows, CreateOptions::default()).await.unwrap();

    let loader = dataset_pages(Arc::clone(&ds), &lake.config().performance);
    let page = loader.load_page(2).await.unwrap();
    assert_eq!(page.len(), 50);
    assert_eq!(page[0]["n"], json!(200));

    let sums = StreamProcessor::new(100)
        .process(
            &ds.rows,
            |chunk: &[Record], _| Ok(vec![chunk.iter().filter_map(|r| r["n"].as_i64()).sum::<i64>()]),
            StreamHooks::default(),
        )
        .await
        .unwrap();
    assert_eq!(sums.iter().sum::<i64>(), (0..250).sum::<i64>());
    assert_eq!(sums.len(), 3);
}
