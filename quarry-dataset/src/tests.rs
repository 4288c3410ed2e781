use std::sync::Arc;

use bytes::Bytes;
use quarry_array::arrays::{PrimitiveArray, VarBinArray};
use quarry_array::{Array, IntoArray, RecordBatch, Table};
use quarry_dtype::{DType, Nullability, PType};
use quarry_error::{ErrorKind, QuarryResult};
use quarry_expr::{and, col, eq, gt, is_null, lit};
use quarry_file::{FileWriter, WriteOptions};
use quarry_io::{InMemoryStorage, InstrumentedStorage, ObjectStorage};

use crate::*;

fn ids(values: impl IntoIterator<Item = i64>) -> Array {
    PrimitiveArray::from_iter(values).into_array()
}

fn strs(values: &[&str]) -> Array {
    VarBinArray::from_strs(values).into_array()
}

fn file(columns: Vec<(&str, Array)>) -> Bytes {
    let table = Table::try_from_arrays(columns).unwrap();
    let mut writer =
        FileWriter::new(Vec::new(), table.schema().clone(), WriteOptions::default()).unwrap();
    writer.write_table(&table).unwrap();
    Bytes::from(writer.finish().unwrap())
}

fn storage(objects: Vec<(&str, Bytes)>) -> Arc<InstrumentedStorage<InMemoryStorage>> {
    let store = InMemoryStorage::new();
    for (path, bytes) in objects {
        store.put(path, bytes);
    }
    Arc::new(InstrumentedStorage::new(store))
}

fn open(storage: &Arc<InstrumentedStorage<InMemoryStorage>>, root: &str) -> QuarryResult<Dataset> {
    Dataset::open(storage.clone(), root, DatasetOptions::default())
}

fn events() -> Arc<InstrumentedStorage<InMemoryStorage>> {
    storage(vec![
        (
            "events/year=2019/month=1/part-0.qry",
            file(vec![("id", ids([1, 2])), ("name", strs(&["a", "b"]))]),
        ),
        (
            "events/year=2019/month=2/part-0.qry",
            file(vec![("id", ids([3])), ("name", strs(&["c"]))]),
        ),
        (
            "events/year=2020/month=1/part-0.qry",
            file(vec![("id", ids([4])), ("name", strs(&["d"]))]),
        ),
        ("events/_SUCCESS", Bytes::new()),
        ("events/_staging/part-9.qry", Bytes::from_static(b"partial")),
        ("events/year=2019/month=1/.part-0.qry", Bytes::from_static(b"partial")),
        ("events/README.md", Bytes::from_static(b"# events")),
    ])
}

#[test]
fn discovers_partitioned_files() {
    let storage = events();
    let dataset = open(&storage, "events").unwrap();
    assert_eq!(dataset.files().len(), 3);
    assert_eq!(
        dataset.schema().names().map(|n| n.as_ref()).collect::<Vec<_>>(),
        vec!["id", "name", "year", "month"]
    );
    assert_eq!(
        dataset.partition_schema().field("year").unwrap().dtype(),
        &DType::Primitive(PType::I64, Nullability::NonNullable)
    );
    assert!(!dataset.unified());
    assert_eq!(
        dataset.files()[2].partition_value("year"),
        Some(&quarry_scalar::Scalar::from(2020i64))
    );
    assert_eq!(storage.metrics().objects_opened(), 1);
}

#[test]
fn partition_predicate_skips_files_without_opening_them() {
    let storage = events();
    let dataset = open(&storage, "events").unwrap();
    storage.metrics().reset();

    let scan = dataset
        .scan(
            ScanOptions::default()
                .with_projection(["id", "year", "month"])
                .with_predicate(and(
                    eq(col("year"), lit(2019i64)),
                    eq(col("month"), lit(1i64)),
                )),
        )
        .unwrap();
    assert_eq!(
        scan.fragments().map(|f| f.path.as_str()).collect::<Vec<_>>(),
        vec!["events/year=2019/month=1/part-0.qry"]
    );
    assert_eq!(storage.metrics().objects_opened(), 0);

    let expected = Table::try_from_arrays(vec![
        ("id", ids([1, 2])),
        ("year", ids([2019, 2019])),
        ("month", ids([1, 1])),
    ])
    .unwrap();
    assert_eq!(scan.to_table().unwrap(), expected);
    assert_eq!(storage.metrics().objects_opened(), 1);
}

#[test]
fn residual_predicate_filters_rows() {
    let dataset = open(&events(), "events").unwrap();
    let scan = dataset
        .scan(
            ScanOptions::default()
                .with_projection(["year"])
                .with_predicate(and(gt(col("id"), lit(1i64)), eq(col("month"), lit(1i64)))),
        )
        .unwrap();
    assert_eq!(scan.fragments().count(), 2);
    let expected = Table::try_from_arrays(vec![("year", ids([2019, 2020]))]).unwrap();
    assert_eq!(scan.to_table().unwrap(), expected);
}

#[test]
fn scans_can_be_repeated() {
    let dataset = open(&events(), "events").unwrap();
    let scan = dataset.scan(ScanOptions::default()).unwrap();
    let first: Vec<RecordBatch> = scan.iter().collect::<QuarryResult<_>>().unwrap();
    let second: Vec<RecordBatch> = (&scan).into_iter().collect::<QuarryResult<_>>().unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    assert_eq!(scan.to_table().unwrap().num_rows(), 4);
}

#[test]
fn scan_validates_columns() {
    let dataset = open(&events(), "events").unwrap();
    let err = dataset
        .scan(ScanOptions::default().with_projection(["missing"]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    let err = dataset
        .scan(ScanOptions::default().with_predicate(col("id")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn null_partition_values() {
    let storage = storage(vec![
        ("n/region=__HIVE_DEFAULT_PARTITION__/a.qry", file(vec![("id", ids([1]))])),
        ("n/region=eu/b.qry", file(vec![("id", ids([2]))])),
    ]);
    let dataset = open(&storage, "n").unwrap();
    assert_eq!(
        dataset.partition_schema().field("region").unwrap().dtype(),
        &DType::Utf8(Nullability::Nullable)
    );
    let scan = dataset
        .scan(ScanOptions::default().with_predicate(is_null(col("region"))))
        .unwrap();
    assert_eq!(scan.fragments().count(), 1);
    let table = scan.to_table().unwrap();
    assert_eq!(table.num_rows(), 1);
    assert!(table.row(0).unwrap()[1].is_null());
}

#[rstest::rstest]
#[case(vec!["t/year=2019/a.qry", "t/month=1/b.qry"])]
#[case(vec!["t/data/a.qry"])]
#[case(vec!["t/year=2019/year=2020/a.qry"])]
fn inconsistent_partitioning(#[case] paths: Vec<&str>) {
    let storage = storage(
        paths
            .into_iter()
            .map(|path| (path, file(vec![("id", ids([1]))])))
            .collect(),
    );
    assert_eq!(open(&storage, "t").unwrap_err().kind(), ErrorKind::Partition);
}

#[test]
fn directories_without_partitioning() {
    let storage = storage(vec![("t/data/a.qry", file(vec![("id", ids([1]))]))]);
    let dataset = Dataset::open(
        storage,
        "t",
        DatasetOptions::default().with_partitioning(Partitioning::None),
    )
    .unwrap();
    assert!(dataset.partition_schema().is_empty());
    assert_eq!(dataset.scan(ScanOptions::default()).unwrap().to_table().unwrap().num_rows(), 1);
}

#[test]
fn partition_key_colliding_with_a_column() {
    let storage = storage(vec![("k/id=1/a.qry", file(vec![("id", ids([1]))]))]);
    assert_eq!(open(&storage, "k").unwrap_err().kind(), ErrorKind::SchemaConflict);
}

#[test]
fn unified_schemas_fill_missing_columns() {
    let storage = storage(vec![
        (
            "u/a.qry",
            file(vec![
                ("id", PrimitiveArray::from_iter([1i32, 2]).into_array()),
                ("x", strs(&["p", "q"])),
            ]),
        ),
        (
            "u/b.qry",
            file(vec![
                ("id", ids([3])),
                ("y", PrimitiveArray::from_iter([0.5f64]).into_array()),
            ]),
        ),
    ]);
    let dataset = Dataset::open(
        storage,
        "u",
        DatasetOptions::default().with_unify_schemas(true),
    )
    .unwrap();
    assert!(dataset.unified());

    let expected = Table::try_from_arrays(vec![
        ("id", ids([1, 2, 3])),
        ("x", VarBinArray::from_option_strs([Some("p"), Some("q"), None]).into_array()),
        ("y", PrimitiveArray::from_option_iter([None, None, Some(0.5f64)]).into_array()),
    ])
    .unwrap();
    assert_eq!(dataset.schema(), expected.schema());
    assert_eq!(dataset.scan(ScanOptions::default()).unwrap().to_table().unwrap(), expected);
}

#[test]
fn widened_columns_still_filter() {
    let storage = storage(vec![
        ("w/a.qry", file(vec![("id", PrimitiveArray::from_iter([1i32, 5]).into_array())])),
        ("w/b.qry", file(vec![("id", ids([2, 6]))])),
    ]);
    let dataset = Dataset::open(
        storage,
        "w",
        DatasetOptions::default().with_unify_schemas(true),
    )
    .unwrap();
    let table = dataset
        .scan(ScanOptions::default().with_predicate(gt(col("id"), lit(4i64))))
        .unwrap()
        .to_table()
        .unwrap();
    assert_eq!(table, Table::try_from_arrays(vec![("id", ids([5, 6]))]).unwrap());
}

fn conflicting() -> Arc<InstrumentedStorage<InMemoryStorage>> {
    storage(vec![
        ("c/a.qry", file(vec![("id", ids([1]))])),
        ("c/b.qry", file(vec![("id", strs(&["x"]))])),
        ("c/c.qry", file(vec![("id", ids([2]))])),
    ])
}

#[test]
fn conflicting_schemas_fail_to_unify() {
    let err = Dataset::open(
        conflicting(),
        "c",
        DatasetOptions::default().with_unify_schemas(true),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);
}

#[test]
fn conflicting_files_can_be_skipped() {
    let dataset = Dataset::open(
        conflicting(),
        "c",
        DatasetOptions::default()
            .with_unify_schemas(true)
            .with_conflict_policy(ConflictPolicy::SkipFile),
    )
    .unwrap();
    assert_eq!(
        dataset.files().iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
        vec!["c/a.qry", "c/c.qry"]
    );
}

#[test]
fn mismatched_file_is_reported_and_skipped_while_scanning() {
    let dataset = open(&conflicting(), "c").unwrap();
    let results = dataset.scan(ScanOptions::default()).unwrap().iter().collect::<Vec<_>>();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().num_rows(), 1);
    let err = results[1].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(err.to_string().contains("c/b.qry"), "{err}");
    assert_eq!(results[2].as_ref().unwrap().column(0).unwrap(), &ids([2]));
}

#[test]
fn empty_dataset() {
    let dataset = open(&storage(vec![]), "nothing").unwrap();
    assert!(dataset.files().is_empty());
    assert!(dataset.schema().is_empty());
    assert_eq!(dataset.scan(ScanOptions::default()).unwrap().to_table().unwrap().num_rows(), 0);
}

#[test]
fn local_directory() {
    let dir = tempfile::tempdir().unwrap();
    for (year, values) in [(2023, [1i64, 2]), (2024, [3, 4])] {
        let partition = dir.path().join(format!("year={year}"));
        std::fs::create_dir_all(&partition).unwrap();
        let table = Table::try_from_arrays(vec![("id", ids(values))]).unwrap();
        quarry_file::write_table(&table, partition.join("part-0.qry")).unwrap();
    }
    let dataset = Dataset::open_local(dir.path(), DatasetOptions::default()).unwrap();
    let table = dataset
        .scan(ScanOptions::default().with_predicate(eq(col("year"), lit(2024i64))))
        .unwrap()
        .to_table()
        .unwrap();
    let expected =
        Table::try_from_arrays(vec![("id", ids([3, 4])), ("year", ids([2024, 2024]))]).unwrap();
    assert_eq!(table, expected);
}

#[test]
fn storage_is_shared_through_trait_objects() {
    let storage = events();
    let shared: Arc<dyn ObjectStorage> = storage.clone();
    let dataset = Dataset::open(shared, "events", DatasetOptions::default()).unwrap();
    assert_eq!(dataset.root().as_str(), "events");
    assert_eq!(dataset.format().extension(), "qry");
}
