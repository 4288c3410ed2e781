use std::sync::Arc;

use quarry::arrays::{PrimitiveArray, VarBinArray};
use quarry::dataset::{Dataset, DatasetOptions};
use quarry::error::{ErrorKind, WarningKind};
use quarry::expr::{col, gt, lit, sum};
use quarry::query::{Query, QueryOptions, QueryState, SortKey, Source, WindowFunction};
use quarry::{IntoArray, Table};

fn write_partitions(root: &std::path::Path) {
    for (region, ids, amounts) in [
        ("east", vec![1i64, 2, 3], vec![10i64, 20, 30]),
        ("west", vec![4, 5], vec![40, 50]),
    ] {
        let partition = root.join(format!("region={region}"));
        std::fs::create_dir_all(&partition).unwrap();
        let table = Table::try_from_arrays(vec![
            ("id", PrimitiveArray::from_iter(ids).into_array()),
            ("amount", PrimitiveArray::from_iter(amounts).into_array()),
        ])
        .unwrap();
        quarry::file::write_table(&table, partition.join("part-0.qry")).unwrap();
    }
}

#[test]
fn query_a_partitioned_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_partitions(dir.path());
    let dataset = Dataset::open_local(dir.path(), DatasetOptions::default()).unwrap();

    let mut query = Query::from_dataset(dataset.clone())
        .filter(gt(col("amount"), lit(15i64)))
        .group_by(["region"])
        .summarize([("total", sum(col("amount")))])
        .arrange([SortKey::asc("region")]);
    let result = query.collect().unwrap();
    assert_eq!(query.state(), QueryState::NativeExec);

    let expected = Table::try_from_arrays(vec![
        ("region", VarBinArray::from_strs(["east", "west"]).into_array()),
        (
            "total",
            PrimitiveArray::from_option_iter([Some(50i64), Some(90)]).into_array(),
        ),
    ])
    .unwrap();
    assert_eq!(result.table, expected);

    let err = Query::from_dataset(dataset.clone())
        .window("n", WindowFunction::RowNumber, ["region"], [SortKey::asc("id")])
        .collect()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);

    let handed_off = Query::new(
        Source::Dataset(Arc::new(dataset)),
        QueryOptions::default().with_alternate_engine(Arc::new(quarry::query::LocalEngine)),
    )
    .window("n", WindowFunction::RowNumber, ["region"], [SortKey::desc("id")])
    .arrange([SortKey::asc("id")])
    .collect()
    .unwrap();
    assert!(handed_off.warnings.is_empty());

    let table = quarry::file::read_table(dir.path().join("region=west/part-0.qry"), Default::default())
        .unwrap();
    let in_memory = Query::from_table(table)
        .window("n", WindowFunction::RowNumber, Vec::<&str>::new(), Vec::new())
        .collect()
        .unwrap();
    assert_eq!(in_memory.warnings.len(), 1);
    assert_eq!(in_memory.warnings[0].kind(), WarningKind::EagerMaterialization);
}
