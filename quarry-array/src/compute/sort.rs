use std::cmp::Ordering;

use itertools::Itertools;
use quarry_error::{QuarryResult, quarry_bail};

use crate::Array;
use crate::compute::{comparator, take};

/// How one sort key orders its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SortOptions {
    /// Largest values first.
    pub descending: bool,
    /// Nulls before every value instead of after.
    pub nulls_first: bool,
}

impl SortOptions {
    /// Ascending with nulls last.
    pub fn ascending() -> Self {
        Self::default()
    }

    /// Descending with nulls last.
    pub fn descending() -> Self {
        Self {
            descending: true,
            nulls_first: false,
        }
    }
}

/// The permutation that sorts rows by the given keys, compared in order.
///
/// The sort is stable: rows comparing equal on every key keep their input order.
pub fn sort_indices(keys: &[(&Array, SortOptions)]) -> QuarryResult<Vec<usize>> {
    let Some((first, _)) = keys.first() else {
        quarry_bail!("sorting requires at least one key");
    };
    let len = first.len();
    if let Some((key, _)) = keys.iter().find(|(key, _)| key.len() != len) {
        quarry_bail!(
            ComputeError: "sort keys differ in length: {} and {}",
            len,
            key.len()
        );
    }
    let comparators: Vec<_> = keys
        .iter()
        .map(|(key, options)| {
            let validity = key.validity();
            comparator(key, key).map(|cmp| (cmp, validity, *options))
        })
        .try_collect()?;

    let mut indices = (0..len).collect_vec();
    indices.sort_by(|&a, &b| {
        for (cmp, validity, options) in &comparators {
            let ordering = match (validity.is_valid(a), validity.is_valid(b)) {
                (true, true) => {
                    let ordering = cmp(a, b);
                    if options.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                }
                (false, false) => Ordering::Equal,
                (false, true) if options.nulls_first => Ordering::Less,
                (false, true) => Ordering::Greater,
                (true, false) if options.nulls_first => Ordering::Greater,
                (true, false) => Ordering::Less,
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(indices)
}

/// The array sorted by its own values.
pub fn sort(array: &Array, options: SortOptions) -> QuarryResult<Array> {
    take(array, &sort_indices(&[(array, options)])?)
}
