use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use quarry_error::{QuarryError, QuarryResult, quarry_bail, quarry_err};

use crate::{DType, Field, FieldName};

/// An ordered sequence of uniquely named fields.
///
/// Two schemas are compatible only when names, types and nullability match exactly. Numeric
/// width differences are never papered over; use [`Schema::unify`] or an explicit cast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct Schema {
    fields: Arc<[Field]>,
}

impl Schema {
    /// Create a schema, rejecting duplicate field names.
    pub fn try_new(fields: Vec<Field>) -> QuarryResult<Self> {
        if let Some(name) = fields.iter().map(Field::name).duplicates().next() {
            quarry_bail!(SchemaError: "duplicate field name {}", name);
        }
        Ok(Self {
            fields: fields.into(),
        })
    }

    /// A schema without any fields.
    pub fn empty() -> Self {
        Self {
            fields: Arc::new([]),
        }
    }

    /// The fields, in order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The field names, in order.
    pub fn names(&self) -> impl Iterator<Item = &FieldName> + '_ {
        self.fields.iter().map(Field::name)
    }

    /// The position of the named field.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name().as_ref() == name)
    }

    /// The named field.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name().as_ref() == name)
    }

    /// The named field, or a `SchemaError` naming the missing column.
    pub fn field_or_err(&self, name: &str) -> QuarryResult<&Field> {
        self.field(name)
            .ok_or_else(|| quarry_err!(SchemaError: "no column named {} in {}", name, self))
    }

    /// The field at a position.
    pub fn field_by_index(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Exact compatibility: same names, types and nullability in the same order.
    pub fn is_compatible(&self, other: &Schema) -> bool {
        self == other
    }

    /// A schema of the named fields, in the requested order.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> QuarryResult<Schema> {
        let fields = names
            .iter()
            .map(|name| self.field_or_err(name.as_ref()).cloned())
            .collect::<QuarryResult<Vec<_>>>()?;
        Schema::try_new(fields)
    }

    /// A schema with one more field at the end.
    pub fn with_field(&self, field: Field) -> QuarryResult<Schema> {
        let mut fields = self.fields.to_vec();
        fields.push(field);
        Schema::try_new(fields)
    }

    /// A schema with the named field's type replaced.
    pub fn with_field_dtype(&self, name: &str, dtype: DType) -> QuarryResult<Schema> {
        let index = self
            .index_of(name)
            .ok_or_else(|| quarry_err!(SchemaError: "no column named {}", name))?;
        let mut fields = self.fields.to_vec();
        fields[index] = fields[index].with_dtype(dtype);
        Schema::try_new(fields)
    }

    /// The superset of two schemas.
    ///
    /// Fields keep the order of `self`, followed by fields that only `other` has. A field
    /// missing from either side becomes nullable. Shared fields are reconciled with
    /// [`DType::widen`], so incompatible types fail with `SchemaConflict`.
    pub fn unify(&self, other: &Schema) -> QuarryResult<Schema> {
        let mut fields = Vec::with_capacity(self.len().max(other.len()));
        for field in self.fields.iter() {
            let dtype = match other.field(field.name()) {
                Some(theirs) => field.dtype().widen(theirs.dtype()).map_err(|e| {
                    e.with_context(format!("reconciling column {}", field.name()))
                })?,
                None => field.dtype().as_nullable(),
            };
            fields.push(field.with_dtype(dtype));
        }
        for field in other.fields.iter() {
            if self.field(field.name()).is_none() {
                fields.push(field.with_dtype(field.dtype().as_nullable()));
            }
        }
        Schema::try_new(fields)
    }
}

impl TryFrom<Vec<Field>> for Schema {
    type Error = QuarryError;

    fn try_from(value: Vec<Field>) -> Result<Self, Self::Error> {
        Schema::try_new(value)
    }
}

impl From<Schema> for Vec<Field> {
    fn from(value: Schema) -> Self {
        value.fields.to_vec()
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.fields.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;
    use crate::Nullability::{NonNullable, Nullable};
    use crate::PType;

    fn schema(fields: &[(&str, DType)]) -> Schema {
        Schema::try_new(
            fields
                .iter()
                .map(|(n, d)| Field::new(*n, d.clone()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = Schema::try_new(vec![
            Field::new("a", DType::Bool(NonNullable)),
            Field::new("a", DType::Utf8(NonNullable)),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn width_difference_is_incompatible() {
        let a = schema(&[("id", DType::Primitive(PType::I32, NonNullable))]);
        let b = schema(&[("id", DType::Primitive(PType::I64, NonNullable))]);
        assert!(!a.is_compatible(&b));
        assert!(a.is_compatible(&a.clone()));
    }

    #[test]
    fn unify_superset() {
        let a = schema(&[
            ("id", DType::Primitive(PType::I32, NonNullable)),
            ("name", DType::Utf8(NonNullable)),
        ]);
        let b = schema(&[
            ("id", DType::Primitive(PType::I64, NonNullable)),
            ("score", DType::Primitive(PType::F32, NonNullable)),
        ]);
        let unified = a.unify(&b).unwrap();
        assert_eq!(
            unified,
            schema(&[
                ("id", DType::Primitive(PType::I64, NonNullable)),
                ("name", DType::Utf8(Nullable)),
                ("score", DType::Primitive(PType::F32, Nullable)),
            ])
        );
    }

    #[test]
    fn unify_conflict() {
        let a = schema(&[("id", DType::Primitive(PType::I64, NonNullable))]);
        let b = schema(&[("id", DType::Utf8(NonNullable))]);
        assert_eq!(a.unify(&b).unwrap_err().kind(), ErrorKind::SchemaConflict);
    }

    #[test]
    fn project_missing_column() {
        let a = schema(&[("id", DType::Primitive(PType::I64, NonNullable))]);
        assert_eq!(a.project(&["nope"]).unwrap_err().kind(), ErrorKind::Schema);
        assert_eq!(a.project(&["id"]).unwrap(), a);
    }

    #[test]
    fn serde_round_trip_validates() {
        let a = schema(&[
            ("id", DType::Primitive(PType::I64, NonNullable)),
            ("ts", DType::Temporal(crate::TemporalType::Date32, Nullable)),
        ]);
        let bytes = flexbuffers::to_vec(&a).unwrap();
        let back: Schema = flexbuffers::from_slice(&bytes).unwrap();
        assert_eq!(a, back);
    }
}
