//! Whole-batch implementations of the plan verbs.

use itertools::Itertools;
use quarry_array::arrays::PrimitiveArray;
use quarry_array::compute::{SortOptions, cast, sort_indices, sum_dtype, take, take_opt};
use quarry_array::{Array, IntoArray, RecordBatch};
use quarry_dtype::{FieldName, NativePType, PType, Schema};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};
use quarry_expr::Expr;
use quarry_scalar::{Scalar, ScalarValue};
use rustc_hash::FxHashMap;

use crate::{JoinKind, SortKey, WindowFunction};

type RowKey = Vec<ScalarValue>;

fn row_key(columns: &[&Array], row: usize) -> QuarryResult<RowKey> {
    columns
        .iter()
        .map(|column| Ok(column.scalar_at(row)?.into_parts().1))
        .collect()
}

fn key_columns<'a>(batch: &'a RecordBatch, names: &[FieldName]) -> QuarryResult<Vec<&'a Array>> {
    names.iter().map(|name| batch.column_or_err(name)).collect()
}

/// The rows of every distinct key combination, groups in order of first occurrence.
///
/// Null keys form a group of their own. Without keys every row is in one group, even when
/// there are no rows.
pub(crate) fn group_rows(batch: &RecordBatch, keys: &[FieldName]) -> QuarryResult<Vec<Vec<usize>>> {
    if keys.is_empty() {
        return Ok(vec![(0..batch.num_rows()).collect()]);
    }
    let columns = key_columns(batch, keys)?;
    let mut index: FxHashMap<RowKey, usize> =
        FxHashMap::with_capacity_and_hasher(batch.num_rows(), Default::default());
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in 0..batch.num_rows() {
        let key = row_key(&columns, row)?;
        let group = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(row);
    }
    Ok(groups)
}

pub(crate) fn filter(batch: &RecordBatch, predicate: &Expr) -> QuarryResult<RecordBatch> {
    batch.filter(&predicate.evaluate_predicate(batch)?)
}

pub(crate) fn mutate(batch: &RecordBatch, columns: &[(FieldName, Expr)]) -> QuarryResult<RecordBatch> {
    let mut batch = batch.clone();
    for (name, expr) in columns {
        let column = expr.evaluate(&batch)?;
        batch = batch.with_column(name, column)?;
    }
    Ok(batch)
}

/// Reduce the rows of one group.
fn reduce(expr: &Expr, group: &RecordBatch) -> QuarryResult<Scalar> {
    match expr {
        Expr::Aggregate(..) | Expr::Literal(_) | Expr::Cast(..) => expr.evaluate_scalar(group),
        _ if group.num_rows() > 0 => expr.evaluate(group)?.scalar_at(0),
        _ => quarry_bail!("{} cannot be reduced over an empty group", expr),
    }
}

pub(crate) fn summarize(
    batch: &RecordBatch,
    keys: &[FieldName],
    aggregates: &[(FieldName, Expr)],
    schema: &Schema,
) -> QuarryResult<RecordBatch> {
    let groups = group_rows(batch, keys)?;
    let first_rows = groups.iter().filter_map(|rows| rows.first().copied()).collect_vec();

    let mut columns: Vec<Array> = key_columns(batch, keys)?
        .into_iter()
        .map(|column| take(column, &first_rows))
        .try_collect()?;
    let mut values: Vec<Vec<Scalar>> = vec![Vec::with_capacity(groups.len()); aggregates.len()];
    for rows in &groups {
        let group = batch.take(rows)?;
        for ((name, expr), column) in aggregates.iter().zip(values.iter_mut()) {
            column.push(reduce(expr, &group).map_err(|err| quarry_err!(err, "summarizing {}", name))?);
        }
    }
    for (field, values) in schema.fields()[keys.len()..].iter().zip(values) {
        columns.push(Array::from_scalars(field.dtype(), &values)?);
    }
    RecordBatch::try_new_with_len(schema.clone(), columns, groups.len())
}

fn sort_permutation(batch: &RecordBatch, keys: &[SortKey]) -> QuarryResult<Vec<usize>> {
    let columns: Vec<(&Array, SortOptions)> = keys
        .iter()
        .map(|key| Ok((batch.column_or_err(&key.column)?, key.options)))
        .collect::<QuarryResult<_>>()?;
    sort_indices(&columns)
}

pub(crate) fn arrange(batch: &RecordBatch, keys: &[SortKey]) -> QuarryResult<RecordBatch> {
    batch.take(&sort_permutation(batch, keys)?)
}

/// Hash join on `on`. Output rows follow the left input; rows with a null key never match.
pub(crate) fn join(
    left: &RecordBatch,
    right: &RecordBatch,
    on: &[FieldName],
    kind: JoinKind,
    schema: &Schema,
) -> QuarryResult<RecordBatch> {
    let right_keys = key_columns(right, on)?;
    let mut build: FxHashMap<RowKey, Vec<usize>> = FxHashMap::default();
    for row in 0..right.num_rows() {
        let key = row_key(&right_keys, row)?;
        if key.iter().any(ScalarValue::is_null) {
            continue;
        }
        build.entry(key).or_default().push(row);
    }

    let left_keys = key_columns(left, on)?;
    let mut left_rows = Vec::with_capacity(left.num_rows());
    let mut right_rows = Vec::with_capacity(left.num_rows());
    for row in 0..left.num_rows() {
        let key = row_key(&left_keys, row)?;
        let matches = if key.iter().any(ScalarValue::is_null) {
            None
        } else {
            build.get(&key)
        };
        match (matches, kind) {
            (Some(matches), _) => {
                for &matched in matches {
                    left_rows.push(row);
                    right_rows.push(Some(matched));
                }
            }
            (None, JoinKind::Left) => {
                left_rows.push(row);
                right_rows.push(None);
            }
            (None, JoinKind::Inner) => {}
        }
    }

    let mut columns: Vec<Array> = left
        .columns()
        .iter()
        .map(|column| take(column, &left_rows))
        .try_collect()?;
    let dense = right_rows.iter().flatten().copied().collect_vec();
    for (field, column) in right.schema().fields().iter().zip(right.columns()) {
        if on.contains(field.name()) {
            continue;
        }
        columns.push(match kind {
            JoinKind::Inner => take(column, &dense)?,
            JoinKind::Left => take_opt(column, &right_rows)?,
        });
    }
    RecordBatch::try_new_with_len(schema.clone(), columns, left_rows.len())
}

/// Compute a window function, adding or replacing the column `name`.
pub(crate) fn window(
    batch: &RecordBatch,
    name: &FieldName,
    function: &WindowFunction,
    partition_by: &[FieldName],
    order_by: &[SortKey],
) -> QuarryResult<RecordBatch> {
    let len = batch.num_rows();
    let mut position: Vec<usize> = (0..len).collect();
    if !order_by.is_empty() {
        for (pos, row) in sort_permutation(batch, order_by)?.into_iter().enumerate() {
            position[row] = pos;
        }
    }
    let mut partitions = group_rows(batch, partition_by)?;
    for rows in &mut partitions {
        rows.sort_by_key(|&row| position[row]);
    }

    let column = match function {
        WindowFunction::RowNumber => {
            let mut values = vec![0i64; len];
            for rows in &partitions {
                for (idx, &row) in rows.iter().enumerate() {
                    values[row] = idx as i64 + 1;
                }
            }
            PrimitiveArray::from_iter(values).into_array()
        }
        WindowFunction::Rank | WindowFunction::DenseRank => {
            let order_columns = order_by
                .iter()
                .map(|key| batch.column_or_err(&key.column))
                .collect::<QuarryResult<Vec<_>>>()?;
            let dense = matches!(function, WindowFunction::DenseRank);
            let mut values = vec![0i64; len];
            for rows in &partitions {
                let mut previous: Option<RowKey> = None;
                let mut rank = 0i64;
                for (idx, &row) in rows.iter().enumerate() {
                    let key = row_key(&order_columns, row)?;
                    if previous.as_ref() != Some(&key) {
                        rank = if dense { rank + 1 } else { idx as i64 + 1 };
                        previous = Some(key);
                    }
                    values[row] = rank;
                }
            }
            PrimitiveArray::from_iter(values).into_array()
        }
        WindowFunction::Lag { column, offset } | WindowFunction::Lead { column, offset } => {
            let lag = matches!(function, WindowFunction::Lag { .. });
            let mut source = vec![None; len];
            for rows in &partitions {
                for (idx, &row) in rows.iter().enumerate() {
                    source[row] = if lag {
                        idx.checked_sub(*offset).map(|from| rows[from])
                    } else {
                        idx.checked_add(*offset).and_then(|from| rows.get(from).copied())
                    };
                }
            }
            take_opt(batch.column_or_err(column)?, &source)?
        }
        WindowFunction::CumulativeSum(column) => {
            let values = batch.column_or_err(column)?;
            cumulative_sum(&cast(values, &sum_dtype(values.dtype())?)?, &partitions)?
        }
    };
    batch.with_column(name, column)
}

fn cumulative_sum(values: &Array, partitions: &[Vec<usize>]) -> QuarryResult<Array> {
    let Some(values) = values.as_primitive() else {
        quarry_bail!(TypeError: "cumulative_sum expects numbers, found {}", values.dtype());
    };
    let array = match values.ptype() {
        PType::I64 => running_sum(values, partitions, i64::checked_add)?,
        PType::U64 => running_sum(values, partitions, u64::checked_add)?,
        PType::F64 => running_sum(values, partitions, |a: f64, b| Some(a + b))?,
        other => quarry_bail!(TypeError: "cannot accumulate {}", other),
    };
    Ok(array.into_array())
}

fn running_sum<T>(
    values: &PrimitiveArray,
    partitions: &[Vec<usize>],
    add: impl Fn(T, T) -> Option<T>,
) -> QuarryResult<PrimitiveArray>
where
    T: NativePType,
{
    let slice = values.as_slice::<T>();
    let mut sums: Vec<Option<T>> = vec![None; slice.len()];
    for rows in partitions {
        let mut total: Option<T> = None;
        for &row in rows {
            if values.validity().is_valid(row) {
                total = Some(match total {
                    None => slice[row],
                    Some(total) => add(total, slice[row])
                        .ok_or_else(|| quarry_err!(ComputeError: "cumulative sum overflowed"))?,
                });
            }
            sums[row] = total;
        }
    }
    Ok(PrimitiveArray::from_option_iter(sums))
}

#[cfg(test)]
mod tests {
    use quarry_array::arrays::VarBinArray;
    use quarry_expr::{col, lit, sum};

    use super::*;
    use crate::PlanNode;

    fn batch() -> RecordBatch {
        RecordBatch::from_columns(vec![
            ("team", VarBinArray::from_strs(["b", "a", "b", "a", "c"]).into_array()),
            ("score", PrimitiveArray::from_iter([3i64, 1, 3, 7, 2]).into_array()),
        ])
        .unwrap()
    }

    fn i64s(batch: &RecordBatch, name: &str) -> Vec<Option<i64>> {
        let column = batch.column_or_err(name).unwrap();
        (0..column.len())
            .map(|row| column.scalar_at(row).unwrap().as_primitive::<i64>().unwrap())
            .collect()
    }

    #[test]
    fn groups_in_first_occurrence_order() {
        let groups = group_rows(&batch(), &["team".into()]).unwrap();
        assert_eq!(groups, vec![vec![0, 2], vec![1, 3], vec![4]]);
        let all = group_rows(&batch(), &[]).unwrap();
        assert_eq!(all, vec![vec![0, 1, 2, 3, 4]]);
    }

    #[test]
    fn summarize_per_group() {
        let batch = batch();
        let keys: Vec<FieldName> = vec!["team".into()];
        let aggregates = vec![("total".into(), sum(col("score")))];
        let schema = PlanNode::Summarize(aggregates.clone())
            .output_schema(batch.schema(), Some(&keys))
            .unwrap();
        let result = summarize(&batch, &keys, &aggregates, &schema).unwrap();
        assert_eq!(result.num_rows(), 3);
        assert_eq!(i64s(&result, "total"), vec![Some(6), Some(8), Some(2)]);
    }

    #[test]
    fn ranks_with_ties() {
        let batch = batch();
        let order = vec![SortKey::desc("score")];
        let ranked = window(&batch, &"rank".into(), &WindowFunction::Rank, &[], &order).unwrap();
        assert_eq!(
            i64s(&ranked, "rank"),
            vec![Some(2), Some(5), Some(2), Some(1), Some(4)]
        );
        let dense = window(&batch, &"rank".into(), &WindowFunction::DenseRank, &[], &order).unwrap();
        assert_eq!(
            i64s(&dense, "rank"),
            vec![Some(2), Some(4), Some(2), Some(1), Some(3)]
        );
    }

    #[test]
    fn lag_and_running_sum_within_partitions() {
        let batch = batch();
        let partition: Vec<FieldName> = vec!["team".into()];
        let order = vec![SortKey::asc("score")];
        let lagged = window(
            &batch,
            &"previous".into(),
            &WindowFunction::lag("score", 1),
            &partition,
            &order,
        )
        .unwrap();
        assert_eq!(
            i64s(&lagged, "previous"),
            vec![None, None, Some(3), Some(1), None]
        );
        let summed = window(
            &batch,
            &"running".into(),
            &WindowFunction::cumulative_sum("score"),
            &partition,
            &order,
        )
        .unwrap();
        assert_eq!(
            i64s(&summed, "running"),
            vec![Some(3), Some(1), Some(6), Some(8), Some(2)]
        );
    }

    #[test]
    fn mutate_sees_earlier_columns() {
        let result = mutate(
            &batch(),
            &[
                ("double".into(), quarry_expr::add(col("score"), col("score"))),
                ("more".into(), quarry_expr::add(col("double"), lit(1i64))),
            ],
        )
        .unwrap();
        assert_eq!(
            i64s(&result, "more"),
            vec![Some(7), Some(3), Some(7), Some(15), Some(5)]
        );
    }
}
