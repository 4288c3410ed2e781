use std::borrow::Cow;

use itertools::Itertools;
use percent_encoding::percent_decode_str;
use quarry_dtype::{DType, Field, FieldName, Nullability, PType, Schema};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};
use quarry_scalar::Scalar;

/// The directory name Hive writers use for a null partition value.
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// How directory names below the dataset root are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Partitioning {
    /// Every directory is a `key=value` pair.
    #[default]
    Hive,
    /// Directories carry no partition information.
    None,
}

/// The raw partition values of one file, keyed in directory order. `None` is null.
pub type RawPartition = Vec<(FieldName, Option<String>)>;

impl Partitioning {
    /// Parse the directories between the dataset root and a file.
    pub fn parse(&self, directories: &[&str]) -> QuarryResult<RawPartition> {
        match self {
            Self::None => Ok(Vec::new()),
            Self::Hive => parse_hive(directories),
        }
    }
}

fn parse_hive(directories: &[&str]) -> QuarryResult<RawPartition> {
    let mut pairs: RawPartition = Vec::with_capacity(directories.len());
    for directory in directories {
        let Some((key, value)) = directory.split_once('=') else {
            quarry_bail!(PartitionError: "directory {} is not a key=value partition", directory);
        };
        if key.is_empty() {
            quarry_bail!(PartitionError: "directory {} has an empty partition key", directory);
        }
        let key = percent_decode(key)?;
        if pairs.iter().any(|(existing, _)| existing.as_ref() == key) {
            quarry_bail!(PartitionError: "partition key {} appears more than once", key);
        }
        let value = match value {
            HIVE_DEFAULT_PARTITION => None,
            value => Some(percent_decode(value)?),
        };
        pairs.push((key.into(), value));
    }
    Ok(pairs)
}

/// Decode `%XX` escapes. A `%` not followed by two hex digits is an error.
pub fn percent_decode(encoded: &str) -> QuarryResult<String> {
    let bytes = encoded.as_bytes();
    let malformed = encoded.match_indices('%').any(|(idx, _)| {
        !bytes
            .get(idx + 1..idx + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if malformed {
        quarry_bail!(PartitionError: "invalid percent escape in {}", encoded);
    }
    percent_decode_str(encoded)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| quarry_err!(PartitionError: "{} does not decode to UTF-8", encoded))
}

/// Infer the type of every partition key from the values found across all files.
///
/// A key whose non-null values all parse as integers is `i64`, anything else is `utf8`. The
/// column is nullable when any file has a null value. Returns the partition schema and the typed
/// values of each file, in the order of `keys`.
pub fn infer_partition_columns(
    keys: &[FieldName],
    files: &[Vec<Option<String>>],
) -> QuarryResult<(Schema, Vec<Vec<Scalar>>)> {
    let mut fields = Vec::with_capacity(keys.len());
    let mut integer = Vec::with_capacity(keys.len());
    for (idx, key) in keys.iter().enumerate() {
        let values = files.iter().map(|file| file[idx].as_deref()).collect_vec();
        let nullability = Nullability::from(values.iter().any(Option::is_none));
        let is_integer = values.iter().flatten().all(|v| v.parse::<i64>().is_ok());
        let dtype = if is_integer {
            DType::Primitive(PType::I64, nullability)
        } else {
            DType::Utf8(nullability)
        };
        fields.push(Field::new(key.clone(), dtype));
        integer.push(is_integer);
    }
    let schema = Schema::try_new(fields)?;

    let values = files
        .iter()
        .map(|file| {
            file.iter()
                .zip(schema.fields())
                .zip(&integer)
                .map(|((value, field), &is_integer)| {
                    let nullability = field.dtype().nullability();
                    Ok(match value {
                        None => Scalar::null(field.dtype().clone()),
                        Some(value) if is_integer => {
                            let parsed = value.parse::<i64>().map_err(|err| {
                                quarry_err!(PartitionError: "partition value {}: {}", value, err)
                            })?;
                            Scalar::primitive(parsed, nullability)
                        }
                        Some(value) => Scalar::utf8(value.as_str(), nullability),
                    })
                })
                .collect::<QuarryResult<Vec<_>>>()
        })
        .try_collect()?;
    Ok((schema, values))
}
