use std::sync::Arc;

use bytes::Bytes;
use quarry_array::arrays::{BoolArray, PrimitiveArray, TemporalArray, VarBinArray};
use quarry_array::{IntoArray, RecordBatch, Table};
use quarry_dtype::{TemporalType, TimeUnit};
use quarry_error::{ErrorKind, QuarryResult};
use quarry_expr::{and, col, gt, is_not_null, lit, lt};
use quarry_io::{InstrumentedReadAt, IoMetrics};
use quarry_scalar::Scalar;

use crate::*;

fn sample_table(rows: i64) -> Table {
    let ids = PrimitiveArray::from_iter(0..rows).into_array();
    let names = VarBinArray::from_option_strs(
        (0..rows).map(|i| (i % 3 != 0).then(|| format!("name-{i}"))),
    )
    .into_array();
    let flags = BoolArray::from_option_iter((0..rows).map(|i| (i % 4 != 0).then_some(i % 2 == 0)))
        .into_array();
    let ts = TemporalArray::try_new(
        TemporalType::Timestamp(TimeUnit::Us, Some("UTC".into())),
        PrimitiveArray::from_iter((0..rows).map(|i| 1_700_000_000_000_000 + i)),
    )
    .unwrap()
    .into_array();
    Table::try_from_arrays(vec![("id", ids), ("name", names), ("flag", flags), ("ts", ts)]).unwrap()
}

fn write_file(table: &Table, options: WriteOptions) -> Bytes {
    let mut writer = FileWriter::new(Vec::new(), table.schema().clone(), options).unwrap();
    writer.write_table(table).unwrap();
    Bytes::from(writer.finish().unwrap())
}

fn small_row_groups() -> WriteOptions {
    WriteOptions::default().with_row_group_rows(10)
}

#[test]
fn round_trip_across_row_groups_and_pages() {
    let table = sample_table(25);
    let bytes = write_file(&table, small_row_groups().with_page_bytes(32));
    let reader = FileReader::open(Arc::new(bytes)).unwrap();

    assert_eq!(reader.num_rows(), 25);
    assert_eq!(reader.num_row_groups(), 3);
    assert_eq!(reader.schema(), table.schema());
    assert!(reader.metadata().row_groups[0].columns[0].pages.len() > 1);
    assert_eq!(reader.metadata().created_by, CREATED_BY);

    let batches: Vec<RecordBatch> = reader
        .read(ReadOptions::default())
        .unwrap()
        .collect::<QuarryResult<_>>()
        .unwrap();
    assert_eq!(
        batches.iter().map(RecordBatch::num_rows).collect::<Vec<_>>(),
        vec![10, 10, 5]
    );
    let read = reader.read(ReadOptions::default()).unwrap().into_table().unwrap();
    assert_eq!(read, table);
}

#[test]
fn batches_are_regrouped() {
    let table = sample_table(23);
    let mut writer = FileWriter::new(Vec::new(), table.schema().clone(), small_row_groups()).unwrap();
    for batch in table.to_batches().unwrap() {
        for start in (0..batch.num_rows()).step_by(7) {
            let stop = (start + 7).min(batch.num_rows());
            writer.write_batch(&batch.slice(start, stop).unwrap()).unwrap();
        }
    }
    let bytes = Bytes::from(writer.finish().unwrap());
    let reader = FileReader::open(Arc::new(bytes)).unwrap();
    let rows = reader
        .metadata()
        .row_groups
        .iter()
        .map(|rg| rg.num_rows)
        .collect::<Vec<_>>();
    assert_eq!(rows, vec![10, 10, 3]);
    assert_eq!(reader.read(ReadOptions::default()).unwrap().into_table().unwrap(), table);
}

#[test]
fn projection_reads_only_projected_chunks() {
    let table = sample_table(20);
    let bytes = write_file(&table, small_row_groups());
    let metrics = IoMetrics::new();
    let reader =
        FileReader::open(Arc::new(InstrumentedReadAt::new(bytes, metrics.clone()))).unwrap();
    let opened_bytes = metrics.bytes_read();
    assert_eq!(
        opened_bytes,
        (FOOTER_SIZE as u64) + u64::from(reader.footer().metadata_length)
    );

    let ids = reader
        .read(ReadOptions::default().with_projection(["id"]))
        .unwrap()
        .into_table()
        .unwrap();
    assert_eq!(ids.schema().names().map(|n| n.as_ref()).collect::<Vec<_>>(), vec!["id"]);
    assert_eq!(ids.num_rows(), 20);

    let id_bytes: u64 = reader
        .metadata()
        .row_groups
        .iter()
        .map(|rg| rg.columns[0].length)
        .sum();
    assert_eq!(metrics.bytes_read() - opened_bytes, id_bytes);
    assert_eq!(metrics.read_requests(), 2 + 2);
}

#[test]
fn projection_order_is_respected() {
    let table = sample_table(5);
    let reader = FileReader::open(Arc::new(write_file(&table, WriteOptions::default()))).unwrap();
    let read = reader
        .read(ReadOptions::default().with_projection(["ts", "id"]))
        .unwrap()
        .into_table()
        .unwrap();
    assert_eq!(read, table.select(&["ts", "id"]).unwrap());
}

#[test]
fn missing_projected_column() {
    let reader = FileReader::open(Arc::new(write_file(&sample_table(3), WriteOptions::default()))).unwrap();
    let err = reader
        .read(ReadOptions::default().with_projection(["nope"]))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[test]
fn statistics_prune_row_groups() {
    let table = sample_table(20);
    let bytes = write_file(&table, small_row_groups());
    let metrics = IoMetrics::new();
    let reader =
        FileReader::open(Arc::new(InstrumentedReadAt::new(bytes, metrics.clone()))).unwrap();

    let stats = reader.column_statistics(0, "id").unwrap();
    assert_eq!(stats.min, Some(Scalar::from(0i64)));
    assert_eq!(stats.max, Some(Scalar::from(9i64)));

    metrics.reset();
    let batches: Vec<RecordBatch> = reader
        .read(
            ReadOptions::default()
                .with_projection(["id"])
                .with_predicate(gt(col("id"), lit(15i64))),
        )
        .unwrap()
        .collect::<QuarryResult<_>>()
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0].column(0).unwrap(),
        &PrimitiveArray::from_iter([16i64, 17, 18, 19]).into_array()
    );
    assert_eq!(metrics.read_requests(), 1);
    assert_eq!(metrics.bytes_read(), reader.metadata().row_groups[1].columns[0].length);
}

#[test]
fn nan_rows_survive_row_group_pruning() {
    let table = Table::try_from_arrays(vec![(
        "x",
        PrimitiveArray::from_iter([1.0f64, f64::NAN]).into_array(),
    )])
    .unwrap();
    let reader = FileReader::open(Arc::new(write_file(&table, WriteOptions::default()))).unwrap();
    assert_eq!(reader.column_statistics(0, "x").unwrap().max, None);

    let read = reader
        .read(ReadOptions::default().with_predicate(gt(col("x"), lit(100.0f64))))
        .unwrap()
        .into_table()
        .unwrap();
    assert_eq!(read.num_rows(), 1);
}

#[test]
fn predicate_columns_need_not_be_projected() {
    let table = sample_table(12);
    let reader = FileReader::open(Arc::new(write_file(&table, WriteOptions::default()))).unwrap();
    let read = reader
        .read(
            ReadOptions::default()
                .with_projection(["name"])
                .with_predicate(and(lt(col("id"), lit(6i32)), is_not_null(col("name")))),
        )
        .unwrap()
        .into_table()
        .unwrap();
    let expected = Table::try_from_arrays(vec![(
        "name",
        VarBinArray::from_option_strs([
            Some("name-1"),
            Some("name-2"),
            Some("name-4"),
            Some("name-5"),
        ])
        .into_array(),
    )])
    .unwrap();
    assert_eq!(read, expected);
}

#[test]
fn parallel_decode_matches_sequential() {
    let table = sample_table(40);
    let reader = FileReader::open(Arc::new(write_file(&table, small_row_groups()))).unwrap();
    let parallel = reader
        .read(ReadOptions::default().with_parallel(true))
        .unwrap()
        .into_table()
        .unwrap();
    assert_eq!(parallel, table);
}

#[test]
fn rejects_batches_of_another_schema() {
    let table = sample_table(3);
    let mut writer = FileWriter::new(Vec::new(), table.schema().clone(), WriteOptions::default()).unwrap();
    let other = RecordBatch::from_columns(vec![("id", PrimitiveArray::from_iter([1i32]).into_array())])
        .unwrap();
    assert_eq!(writer.write_batch(&other).unwrap_err().kind(), ErrorKind::Schema);
}

#[test]
fn empty_file() {
    let table = Table::empty(sample_table(1).schema().clone());
    let reader = FileReader::open(Arc::new(write_file(&table, WriteOptions::default()))).unwrap();
    assert_eq!(reader.num_rows(), 0);
    assert_eq!(reader.read(ReadOptions::default()).unwrap().count(), 0);
}

#[test]
fn corrupt_magic() {
    let mut bytes = write_file(&sample_table(3), WriteOptions::default()).to_vec();
    let last = bytes.len() - 1;
    bytes[last] = b'!';
    let err = FileReader::open(Arc::new(Bytes::from(bytes))).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn truncated_file() {
    let bytes = write_file(&sample_table(3), WriteOptions::default());
    for len in [0, 10, bytes.len() - 4] {
        let err = FileReader::open(Arc::new(bytes.slice(..len))).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format, "truncated to {len}");
    }
}

#[test]
fn undecodable_trailer() {
    let bytes = write_file(&sample_table(3), WriteOptions::default());
    let footer = *FileReader::open(Arc::new(bytes.clone())).unwrap().footer();
    let mut bytes = bytes.to_vec();
    let start = footer.metadata_offset as usize;
    bytes[start..start + footer.metadata_length as usize].fill(0xff);
    let err = FileReader::open(Arc::new(Bytes::from(bytes))).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn page_length_exceeding_its_chunk() {
    let bytes = write_file(&sample_table(3), WriteOptions::default());
    let page = FileReader::open(Arc::new(bytes.clone())).unwrap().metadata().row_groups[0].columns[0].pages[0];
    let mut bytes = bytes.to_vec();
    let at = page.offset as usize + 12;
    bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

    let reader = FileReader::open(Arc::new(Bytes::from(bytes))).unwrap();
    let mut iter = reader.read(ReadOptions::default()).unwrap();
    assert_eq!(iter.next().unwrap().unwrap_err().kind(), ErrorKind::Format);
    assert!(iter.next().is_none());
}

#[test]
fn local_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("data.{FILE_EXTENSION}"));
    let table = sample_table(8);
    write_table(&table, &path).unwrap();
    assert_eq!(read_table(&path, ReadOptions::default()).unwrap(), table);
}

#[test]
fn reading_one_column_skips_the_other() {
    let table = Table::try_from_arrays(vec![
        ("id", PrimitiveArray::from_iter([1i64, 2, 3, 4]).into_array()),
        ("name", VarBinArray::from_strs(["a", "b", "c", "d"]).into_array()),
    ])
    .unwrap();
    let bytes = write_file(&table, WriteOptions::default().with_row_group_rows(2));
    let metrics = IoMetrics::new();
    let reader =
        FileReader::open(Arc::new(InstrumentedReadAt::new(bytes, metrics.clone()))).unwrap();
    assert_eq!(reader.num_row_groups(), 2);

    metrics.reset();
    let ids = reader
        .read(ReadOptions::default().with_projection(["id"]))
        .unwrap()
        .into_table()
        .unwrap();
    assert_eq!(ids, table.select(&["id"]).unwrap());

    let id_bytes: u64 = reader
        .metadata()
        .row_groups
        .iter()
        .map(|rg| rg.columns[0].length)
        .sum();
    assert_eq!(metrics.bytes_read(), id_bytes);
}
