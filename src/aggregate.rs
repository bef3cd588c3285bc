//! Year-over-year summaries of (decomposed) datasets.
//!
//! Both summaries add a trailing `aggregation` tag whose values are the
//! labels of [`Aggregation`].
//!
//! Slots seen in only one year (a partial trailing year, or a year without
//! any dips) report their value as `mean` and NaN for `upper_ci` and
//! `lower_ci` instead of failing the whole summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calendar::{YearHour, HOURS_PER_REFERENCE_YEAR};
use crate::data::model::{TagKey, TaggedTable, TimeSeriesDataset};
use crate::error::{DataShapeError, Error, Result};
use crate::spectral::{RAW_DATA, SPECTRUM_TAG};
use crate::stats::{confidence_interval, tail_percentile};

pub const AGGREGATION_TAG: &str = "aggregation";

/// One reduction applied across repeated years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Aggregation {
    UpperCi,
    Mean,
    LowerCi,
}

impl Aggregation {
    pub fn label(&self) -> &'static str {
        match self {
            Aggregation::UpperCi => "upper_ci",
            Aggregation::Mean => "mean",
            Aggregation::LowerCi => "lower_ci",
        }
    }
}

/// Which reductions a summary reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    #[default]
    MeanOnly,
    WithConfidence,
}

impl AggregationMode {
    /// Reductions in display order.
    pub fn aggregations(&self) -> &'static [Aggregation] {
        match self {
            AggregationMode::MeanOnly => &[Aggregation::Mean],
            AggregationMode::WithConfidence => &[Aggregation::UpperCi, Aggregation::Mean, Aggregation::LowerCi],
        }
    }
}

/// Reduce one sample. NaN entries are skipped; a sample with nothing left
/// reduces to NaN for every aggregation, and a single value keeps its mean
/// with NaN bounds.
fn reduce(sample: &[f64], mode: AggregationMode, level: f64) -> Result<Vec<f64>> {
    let present: Vec<f64> = sample.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return Ok(vec![f64::NAN; mode.aggregations().len()]);
    }
    match mode {
        AggregationMode::MeanOnly => Ok(vec![present.iter().sum::<f64>() / present.len() as f64]),
        AggregationMode::WithConfidence => match confidence_interval(&present, level) {
            Ok(ci) => Ok(vec![ci.upper, ci.mean, ci.lower]),
            Err(Error::DegenerateSample { .. }) => Ok(vec![f64::NAN, present[0], f64::NAN]),
            Err(e) => Err(e),
        },
    }
}

/// Build a summary table from per-column, per-index-entry samples.
fn summarize<J>(
    tag_names: &[String],
    index: Vec<J>,
    samples: Vec<(TagKey, Vec<Vec<f64>>)>,
    mode: AggregationMode,
    level: f64,
) -> Result<TaggedTable<J>> {
    let aggregations = mode.aggregations();
    let mut names = tag_names.to_vec();
    names.push(AGGREGATION_TAG.to_string());
    let mut out = TaggedTable::new(index, names)?;

    for (key, per_entry) in samples {
        let mut series = vec![Vec::with_capacity(per_entry.len()); aggregations.len()];
        for sample in &per_entry {
            for (slot, value) in series.iter_mut().zip(reduce(sample, mode, level)?) {
                slot.push(value);
            }
        }
        for (agg, values) in aggregations.iter().zip(series) {
            out.insert(key.with_appended(agg.label()), values)?;
        }
    }
    Ok(out)
}

fn rows_by<K: Ord>(index: &[YearHour], key: impl Fn(&YearHour) -> K) -> BTreeMap<K, Vec<usize>> {
    let mut groups: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (row, coord) in index.iter().enumerate() {
        groups.entry(key(coord)).or_default().push(row);
    }
    groups
}

/// Average profile over the years: one row per hour of year, each column
/// reduced across every sample sharing that hour.
pub fn hour_of_year_profile(
    table: &TaggedTable<YearHour>,
    mode: AggregationMode,
    level: f64,
) -> Result<TaggedTable<u32>> {
    if table.is_empty() {
        return Err(DataShapeError::Empty.into());
    }
    let groups = rows_by(table.index(), |c| c.hour_of_year);
    let samples: Vec<(TagKey, Vec<Vec<f64>>)> = table
        .columns()
        .map(|(key, values)| {
            let per_hour: Vec<Vec<f64>> = groups
                .values()
                .map(|rows| rows.iter().map(|&r| values[r]).collect())
                .collect();
            (key.clone(), per_hour)
        })
        .collect();
    summarize(table.tag_names(), groups.into_keys().collect(), samples, mode, level)
}

/// Flexibility requirement curves: for every year the tail percentiles of the
/// downward excursions, then reduced across years per percentile.
pub fn flex_requirement_curve(
    table: &TaggedTable<YearHour>,
    percentiles: &[f64],
    mode: AggregationMode,
    level: f64,
) -> Result<TaggedTable<f64>> {
    if table.is_empty() {
        return Err(DataShapeError::Empty.into());
    }
    let years = rows_by(table.index(), |c| c.year);
    let reducers = percentiles
        .iter()
        .map(|&p| tail_percentile(p))
        .collect::<Result<Vec<_>>>()?;
    log::debug!(
        "Computing {} percentiles over {} years",
        percentiles.len(),
        years.len()
    );

    let samples: Vec<(TagKey, Vec<Vec<f64>>)> = table
        .columns()
        .map(|(key, values)| {
            let yearly: Vec<Vec<f64>> = years
                .values()
                .map(|rows| rows.iter().map(|&r| values[r]).collect())
                .collect();
            let per_percentile: Vec<Vec<f64>> = reducers
                .iter()
                .map(|reduce_year| yearly.iter().map(|year| reduce_year(year.as_slice())).collect())
                .collect();
            (key.clone(), per_percentile)
        })
        .collect();
    summarize(table.tag_names(), percentiles.to_vec(), samples, mode, level)
}

/// Energy per year of every base channel: `sum / hours · 8760`. On a
/// decomposed dataset only the `raw_data` columns count, keyed without the
/// spectrum tag.
pub fn annualized_yield(dataset: &TimeSeriesDataset) -> Result<BTreeMap<TagKey, f64>> {
    if dataset.is_empty() {
        return Err(Error::DataShape(DataShapeError::Empty));
    }
    let hours = dataset.len() as f64;
    let spectrum = dataset.tag_position(SPECTRUM_TAG);
    Ok(dataset
        .columns()
        .filter_map(|(key, values)| {
            let key = match spectrum {
                Some(pos) if key.get(pos) != Some(RAW_DATA) => return None,
                Some(pos) => TagKey::new(
                    key.values()
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != pos)
                        .map(|(_, v)| v.clone()),
                ),
                None => key.clone(),
            };
            let total: f64 = values.iter().sum();
            Some((key, total / hours * f64::from(HOURS_PER_REFERENCE_YEAR)))
        })
        .collect())
}
