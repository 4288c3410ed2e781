use std::sync::Arc;

use itertools::Itertools;
use quarry_dtype::{Field, Schema};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};
use quarry_scalar::Scalar;

use crate::compute::{filter, take};
use crate::{Array, Mask};

/// A set of equal-length columns described by a schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordBatch {
    schema: Schema,
    columns: Arc<[Array]>,
    num_rows: usize,
}

impl RecordBatch {
    /// Create a batch, taking the row count from the first column.
    ///
    /// Fails with `SchemaError` when the columns do not match the schema in number, type, or
    /// length.
    pub fn try_new(schema: Schema, columns: Vec<Array>) -> QuarryResult<Self> {
        let num_rows = columns.first().map_or(0, Array::len);
        Self::try_new_with_len(schema, columns, num_rows)
    }

    /// Create a batch of `num_rows` rows. Needed for batches without columns.
    pub fn try_new_with_len(
        schema: Schema,
        columns: Vec<Array>,
        num_rows: usize,
    ) -> QuarryResult<Self> {
        if schema.len() != columns.len() {
            quarry_bail!(
                SchemaError: "schema has {} fields but {} columns were given",
                schema.len(),
                columns.len()
            );
        }
        for (field, column) in schema.fields().iter().zip(&columns) {
            if column.dtype() != field.dtype() {
                quarry_bail!(
                    SchemaError: "column {} has type {} but the schema declares {}",
                    field.name(),
                    column.dtype(),
                    field.dtype()
                );
            }
            if column.len() != num_rows {
                quarry_bail!(
                    SchemaError: "column {} has {} rows, expected {}",
                    field.name(),
                    column.len(),
                    num_rows
                );
            }
        }
        Ok(Self {
            schema,
            columns: columns.into(),
            num_rows,
        })
    }

    /// Create a batch from named columns, deriving the schema from the columns' types.
    pub fn from_columns<S: AsRef<str>>(columns: Vec<(S, Array)>) -> QuarryResult<Self> {
        let schema = Schema::try_new(
            columns
                .iter()
                .map(|(name, array)| Field::new(name.as_ref(), array.dtype().clone()))
                .collect(),
        )?;
        Self::try_new(schema, columns.into_iter().map(|(_, array)| array).collect())
    }

    /// The schema of the batch.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The number of rows.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// The number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// The columns in schema order.
    pub fn columns(&self) -> &[Array] {
        &self.columns
    }

    /// The column at `index`.
    pub fn column(&self, index: usize) -> Option<&Array> {
        self.columns.get(index)
    }

    /// The column named `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&Array> {
        self.schema.index_of(name).map(|idx| &self.columns[idx])
    }

    /// The column named `name`, failing with `SchemaError` when there is none.
    pub fn column_or_err(&self, name: &str) -> QuarryResult<&Array> {
        self.column_by_name(name)
            .ok_or_else(|| quarry_err!(SchemaError: "no column named {} in {}", name, self.schema))
    }

    /// The named columns, in the order given.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> QuarryResult<Self> {
        let schema = self.schema.project(names)?;
        let columns = names
            .iter()
            .map(|name| self.column_or_err(name.as_ref()).cloned())
            .try_collect()?;
        Self::try_new_with_len(schema, columns, self.num_rows)
    }

    /// A zero-copy view over the rows `start..stop`.
    pub fn slice(&self, start: usize, stop: usize) -> QuarryResult<Self> {
        if start > stop || stop > self.num_rows {
            quarry_bail!(OutOfBounds: stop, start, self.num_rows);
        }
        let columns = self
            .columns
            .iter()
            .map(|c| c.slice(start, stop))
            .try_collect()?;
        Self::try_new_with_len(self.schema.clone(), columns, stop - start)
    }

    /// The rows selected by `mask`.
    pub fn filter(&self, mask: &Mask) -> QuarryResult<Self> {
        if mask.len() != self.num_rows {
            quarry_bail!(
                "mask of length {} does not match {} rows",
                mask.len(),
                self.num_rows
            );
        }
        let columns = self.columns.iter().map(|c| filter(c, mask)).try_collect()?;
        Self::try_new_with_len(self.schema.clone(), columns, mask.true_count())
    }

    /// The rows at `indices`, in the order given.
    pub fn take(&self, indices: &[usize]) -> QuarryResult<Self> {
        let columns = self.columns.iter().map(|c| take(c, indices)).try_collect()?;
        Self::try_new_with_len(self.schema.clone(), columns, indices.len())
    }

    /// A batch with `column` added under `name`, replacing a column of the same name in place.
    pub fn with_column(&self, name: &str, column: Array) -> QuarryResult<Self> {
        if column.len() != self.num_rows {
            quarry_bail!(
                SchemaError: "column {} has {} rows, expected {}",
                name,
                column.len(),
                self.num_rows
            );
        }
        let field = Field::new(name, column.dtype().clone());
        let mut columns = self.columns.to_vec();
        let schema = match self.schema.index_of(name) {
            Some(idx) => {
                columns[idx] = column;
                self.schema.with_field_dtype(name, field.dtype().clone())?
            }
            None => {
                columns.push(column);
                self.schema.with_field(field)?
            }
        };
        Self::try_new_with_len(schema, columns, self.num_rows)
    }

    /// The values of row `index`, in schema order.
    pub fn row(&self, index: usize) -> QuarryResult<Vec<Scalar>> {
        if index >= self.num_rows {
            quarry_bail!(OutOfBounds: index, 0, self.num_rows);
        }
        self.columns.iter().map(|c| c.scalar_at(index)).try_collect()
    }
}

#[cfg(test)]
mod tests {
    use quarry_dtype::Nullability::NonNullable;
    use quarry_dtype::{DType, PType};
    use quarry_error::ErrorKind;

    use super::*;
    use crate::IntoArray;
    use crate::arrays::{PrimitiveArray, VarBinArray};

    fn batch() -> RecordBatch {
        RecordBatch::from_columns(vec![
            ("id", PrimitiveArray::from_iter([1i64, 2, 3]).into_array()),
            ("name", VarBinArray::from_strs(["a", "b", "c"]).into_array()),
        ])
        .unwrap()
    }

    #[test]
    fn length_mismatch_is_a_schema_error() {
        let err = RecordBatch::from_columns(vec![
            ("id", PrimitiveArray::from_iter([1i64, 2]).into_array()),
            ("name", VarBinArray::from_strs(["a"]).into_array()),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn type_mismatch_is_a_schema_error() {
        let schema = Schema::try_new(vec![Field::new("id", DType::Primitive(PType::I32, NonNullable))]).unwrap();
        let err = RecordBatch::try_new(schema, vec![PrimitiveArray::from_iter([1i64]).into_array()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn projection_and_rows() {
        let batch = batch();
        let projected = batch.project(&["name"]).unwrap();
        assert_eq!(projected.num_columns(), 1);
        assert_eq!(projected.row(1).unwrap(), vec![Scalar::from("b")]);
        assert!(batch.project(&["missing"]).is_err());
    }

    #[test]
    fn filter_take_slice() {
        let batch = batch();
        let filtered = batch.filter(&Mask::from_iter([true, false, true])).unwrap();
        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(filtered.row(1).unwrap(), vec![Scalar::from(3i64), Scalar::from("c")]);
        let taken = batch.take(&[2, 2]).unwrap();
        assert_eq!(taken.column_by_name("id").unwrap(), &PrimitiveArray::from_iter([3i64, 3]).into_array());
        let sliced = batch.slice(1, 3).unwrap();
        assert_eq!(sliced.row(0).unwrap(), vec![Scalar::from(2i64), Scalar::from("b")]);
    }

    #[test]
    fn with_column_replaces_or_appends() {
        let batch = batch();
        let replaced = batch
            .with_column("id", PrimitiveArray::from_iter([7i32, 8, 9]).into_array())
            .unwrap();
        assert_eq!(replaced.schema().names().map(|n| n.to_string()).collect::<Vec<_>>(), ["id", "name"]);
        assert_eq!(replaced.schema().field("id").unwrap().dtype(), &DType::Primitive(PType::I32, NonNullable));
        let appended = batch
            .with_column("flag", PrimitiveArray::from_iter([0u8, 1, 0]).into_array())
            .unwrap();
        assert_eq!(appended.num_columns(), 3);
    }
}
