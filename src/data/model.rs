use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{DataShapeError, Result};

/// Seconds between two consecutive rows of an hourly dataset.
pub const SECONDS_PER_STEP: i64 = 3600;

// ---------------------------------------------------------------------------
// TagKey – the composite column address
// ---------------------------------------------------------------------------

/// One value per tag dimension, in the order of the table's `tag_names`.
///
/// `Ord` is lexicographic over the values, which is what keeps column
/// iteration deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagKey(Vec<String>);

impl TagKey {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TagKey(values.into_iter().map(Into::into).collect())
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.0.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new key with `value` added as the last tag value.
    pub fn with_appended(&self, value: impl Into<String>) -> TagKey {
        let mut values = self.0.clone();
        values.push(value.into());
        TagKey(values)
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for TagKey {
    fn from(values: [S; N]) -> Self {
        TagKey::new(values)
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

// ---------------------------------------------------------------------------
// TaggedTable – rows by index, columns by TagKey
// ---------------------------------------------------------------------------

/// A numeric table whose columns are independent channels addressed by a
/// [`TagKey`]. Every column holds exactly one value per index entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedTable<I> {
    index: Vec<I>,
    tag_names: Vec<String>,
    columns: BTreeMap<TagKey, Vec<f64>>,
}

/// Hourly time series keyed by timestamp.
pub type TimeSeriesDataset = TaggedTable<NaiveDateTime>;

impl<I> TaggedTable<I> {
    /// Create a table without columns.
    pub fn new<S: Into<String>>(
        index: Vec<I>,
        tag_names: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let tag_names: Vec<String> = tag_names.into_iter().map(Into::into).collect();
        if let Some(dup) = first_duplicate(&tag_names) {
            return Err(DataShapeError::DuplicateTag(dup.to_string()).into());
        }
        Ok(TaggedTable {
            index,
            tag_names,
            columns: BTreeMap::new(),
        })
    }

    /// Build a table from `(key, values)` pairs.
    pub fn from_columns<S, C>(index: Vec<I>, tag_names: impl IntoIterator<Item = S>, columns: C) -> Result<Self>
    where
        S: Into<String>,
        C: IntoIterator<Item = (TagKey, Vec<f64>)>,
    {
        let mut table = Self::new(index, tag_names)?;
        for (key, values) in columns {
            table.insert(key, values)?;
        }
        Ok(table)
    }

    /// Insert or replace a column, returning the previous values.
    pub fn insert(&mut self, key: TagKey, values: Vec<f64>) -> Result<Option<Vec<f64>>> {
        if key.len() != self.tag_names.len() {
            return Err(DataShapeError::KeyArity {
                key: key.to_string(),
                expected: self.tag_names.len(),
                got: key.len(),
            }
            .into());
        }
        if values.len() != self.index.len() {
            return Err(DataShapeError::RaggedColumn {
                key: key.to_string(),
                expected: self.index.len(),
                got: values.len(),
            }
            .into());
        }
        Ok(self.columns.insert(key, values))
    }

    pub fn index(&self) -> &[I] {
        &self.index
    }

    pub fn tag_names(&self) -> &[String] {
        &self.tag_names
    }

    /// Position of `tag` in every key of this table.
    pub fn tag_position(&self, tag: &str) -> Option<usize> {
        self.tag_names.iter().position(|t| t == tag)
    }

    pub fn column(&self, key: &TagKey) -> Option<&[f64]> {
        self.columns.get(key).map(Vec::as_slice)
    }

    /// Columns in key order.
    pub fn columns(&self) -> impl Iterator<Item = (&TagKey, &[f64])> {
        self.columns.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &TagKey> {
        self.columns.keys()
    }

    /// Sorted set of values taken by `tag` across all columns.
    pub fn unique_values(&self, tag: &str) -> Option<BTreeSet<String>> {
        let pos = self.tag_position(tag)?;
        Some(
            self.columns
                .keys()
                .filter_map(|k| k.get(pos).map(str::to_string))
                .collect(),
        )
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Keep only the rows for which `keep(row)` is true, in every column.
    pub fn retain_rows(&self, mut keep: impl FnMut(usize) -> bool) -> TaggedTable<I>
    where
        I: Clone,
    {
        let rows: Vec<usize> = (0..self.index.len()).filter(|&r| keep(r)).collect();
        TaggedTable {
            index: rows.iter().map(|&r| self.index[r].clone()).collect(),
            tag_names: self.tag_names.clone(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), rows.iter().map(|&r| v[r]).collect()))
                .collect(),
        }
    }

    /// Same columns under a new row index of equal length.
    pub fn with_index<J>(self, index: Vec<J>) -> Result<TaggedTable<J>> {
        if index.len() != self.index.len() {
            return Err(DataShapeError::RaggedColumn {
                key: "<index>".to_string(),
                expected: self.index.len(),
                got: index.len(),
            }
            .into());
        }
        Ok(TaggedTable {
            index,
            tag_names: self.tag_names,
            columns: self.columns,
        })
    }

    /// Keep the columns whose key satisfies `keep`.
    pub fn retain_columns(&self, mut keep: impl FnMut(&TagKey) -> bool) -> TaggedTable<I>
    where
        I: Clone,
    {
        TaggedTable {
            index: self.index.clone(),
            tag_names: self.tag_names.clone(),
            columns: self
                .columns
                .iter()
                .filter(|(k, _)| keep(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl TimeSeriesDataset {
    /// Check the contiguous hourly grid contract every transform relies on:
    /// strictly hourly steps and finite values in every column.
    pub fn validate_hourly(&self) -> Result<()> {
        match self.index.len() {
            0 => return Err(DataShapeError::Empty.into()),
            1 => return Err(DataShapeError::TooShort(1).into()),
            _ => {}
        }
        for (row, pair) in self.index.windows(2).enumerate() {
            let seconds = (pair[1] - pair[0]).num_seconds();
            if seconds <= 0 {
                return Err(DataShapeError::NotIncreasing(row + 1).into());
            }
            if seconds != SECONDS_PER_STEP {
                return Err(DataShapeError::NonUniformStep { row: row + 1, seconds }.into());
            }
        }
        for (key, values) in &self.columns {
            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(DataShapeError::NonFinite {
                    key: key.to_string(),
                    row,
                }
                .into());
            }
        }
        Ok(())
    }
}

fn first_duplicate(names: &[String]) -> Option<&str> {
    let mut seen = BTreeSet::new();
    names.iter().map(String::as_str).find(|name| !seen.insert(*name))
}

/// `n` consecutive hourly timestamps starting at `start`.
pub fn hourly_index(start: NaiveDateTime, n: usize) -> Vec<NaiveDateTime> {
    (0..n)
        .map(|i| start + chrono::Duration::hours(i as i64))
        .collect()
}
