use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use super::bands::{frequency_cuts, BandSet, BandingStrategy, FrequencyCut, RAW_DATA, SPECTRUM_TAG};
use crate::data::model::{TagKey, TaggedTable, TimeSeriesDataset, SECONDS_PER_STEP};
use crate::error::{DataShapeError, Result};

fn default_remove_dc() -> bool {
    true
}

/// The externally tunable knobs of [`decompose`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionConfig {
    pub bands: BandSet,
    /// Leave the per-channel mean out of every band reconstruction.
    #[serde(default = "default_remove_dc")]
    pub remove_dc: bool,
    #[serde(default)]
    pub strategy: BandingStrategy,
}

impl DecompositionConfig {
    pub fn new(bands: BandSet) -> Self {
        DecompositionConfig {
            bands,
            remove_dc: true,
            strategy: BandingStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: BandingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_remove_dc(mut self, remove_dc: bool) -> Self {
        self.remove_dc = remove_dc;
        self
    }
}

/// Frequency in Hz of FFT bin `k` for a transform of length `n` over hourly
/// samples. Bins above `n/2` mirror the positive ones.
pub fn bin_frequency(k: usize, n: usize) -> f64 {
    k.min(n - k) as f64 / (n as f64 * SECONDS_PER_STEP as f64)
}

/// Split every channel of `dataset` into one reconstructed series per band.
///
/// The result carries an extra trailing `spectrum` tag whose values are the
/// band labels plus [`RAW_DATA`], the latter holding the input channel
/// unchanged. The transform length is the row count; resolving a band of
/// `h` hours needs at least `2h` rows, which is left to the caller.
pub fn decompose(dataset: &TimeSeriesDataset, config: &DecompositionConfig) -> Result<TimeSeriesDataset> {
    dataset.validate_hourly()?;
    if dataset.tag_position(SPECTRUM_TAG).is_some() {
        return Err(DataShapeError::TagExists(SPECTRUM_TAG.to_string()).into());
    }

    let n = dataset.len();
    let cuts = frequency_cuts(&config.bands, config.strategy);
    log::debug!("In total: {} frequency cuts have been created", cuts.len());

    let masks = retention_masks(&cuts, n);
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let channels: Vec<(&TagKey, &[f64])> = dataset.columns().collect();
    let reconstructions: Vec<Vec<Vec<f64>>> = channels
        .par_iter()
        .map(|(_, values)| {
            filter_channel(values, &masks, config.remove_dc, forward.as_ref(), inverse.as_ref())
        })
        .collect();

    let mut tag_names = dataset.tag_names().to_vec();
    tag_names.push(SPECTRUM_TAG.to_string());
    let mut out = TaggedTable::new(dataset.index().to_vec(), tag_names)?;
    for ((key, raw), bands) in channels.into_iter().zip(reconstructions) {
        out.insert(key.with_appended(RAW_DATA), raw.to_vec())?;
        for (band, series) in config.bands.iter().zip(bands) {
            out.insert(key.with_appended(band.label.as_str()), series)?;
        }
    }
    log::debug!(
        "Decomposed {} channels into {} columns over {n} hours",
        dataset.n_columns(),
        out.n_columns()
    );
    Ok(out)
}

/// For each cut, whether bin `k` survives.
fn retention_masks(cuts: &[FrequencyCut], n: usize) -> Vec<Vec<bool>> {
    let freqs: Vec<f64> = (0..n).map(|k| bin_frequency(k, n)).collect();
    cuts.iter()
        .map(|cut| freqs.iter().map(|&f| cut.retains(f)).collect())
        .collect()
}

/// De-mean one channel, transform it once and reconstruct every band from a
/// masked copy of the spectrum.
fn filter_channel(
    values: &[f64],
    masks: &[Vec<bool>],
    remove_dc: bool,
    forward: &dyn Fft<f64>,
    inverse: &dyn Fft<f64>,
) -> Vec<Vec<f64>> {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let mut spectrum: Vec<Complex<f64>> = values.iter().map(|&v| Complex::new(v - mean, 0.0)).collect();
    forward.process(&mut spectrum);

    let level = if remove_dc { 0.0 } else { mean };
    let scale = 1.0 / n as f64;
    masks
        .iter()
        .map(|mask| {
            let mut buffer: Vec<Complex<f64>> = spectrum
                .iter()
                .zip(mask)
                .map(|(&c, &keep)| if keep { c } else { Complex::new(0.0, 0.0) })
                .collect();
            inverse.process(&mut buffer);
            buffer.iter().map(|c| c.re * scale + level).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use chrono::NaiveDate;

    use super::*;
    use crate::data::model::hourly_index;
    use crate::error::Error;
    use crate::spectral::bands::DurationBand;

    fn dataset(series: Vec<(TagKey, Vec<f64>)>) -> TimeSeriesDataset {
        let n = series[0].1.len();
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        TaggedTable::from_columns(hourly_index(start, n), ["region", "variable"], series).unwrap()
    }

    fn sine(n: usize, period_hours: f64, amplitude: f64) -> Vec<f64> {
        (0..n)
            .map(|t| amplitude * (2.0 * PI * t as f64 / period_hours).sin())
            .collect()
    }

    fn max_abs(v: &[f64]) -> f64 {
        v.iter().fold(0.0, |m, x| m.max(x.abs()))
    }

    #[test]
    fn bin_frequencies_mirror_above_nyquist() {
        assert_eq!(bin_frequency(0, 8), 0.0);
        assert_eq!(bin_frequency(1, 8), bin_frequency(7, 8));
        assert_eq!(bin_frequency(4, 8), 4.0 / (8.0 * 3600.0));
    }

    #[test]
    fn raw_data_is_bit_identical() {
        let n = 24 * 28;
        let values: Vec<f64> = (0..n).map(|t| (t as f64 * 0.37).sin() * 1e3 + 0.1).collect();
        let ds = dataset(vec![(TagKey::from(["DE", "pv"]), values.clone())]);
        let out = decompose(&ds, &DecompositionConfig::new(BandSet::standard_timescales())).unwrap();
        assert_eq!(out.tag_names(), ["region", "variable", "spectrum"]);
        let raw = out.column(&TagKey::from(["DE", "pv", RAW_DATA])).unwrap();
        assert!(raw.iter().zip(&values).all(|(a, b)| a.to_bits() == b.to_bits()));
        assert_eq!(out.n_columns(), 1 + 5);
    }

    #[test]
    fn exclusive_bands_separate_periodic_components() {
        let n = 24 * 7 * 8;
        let daily = sine(n, 12.0, 3.0);
        let weekly = sine(n, 84.0, 2.0);
        let values: Vec<f64> = daily.iter().zip(&weekly).map(|(a, b)| a + b + 50.0).collect();
        let ds = dataset(vec![(TagKey::from(["DE", "load"]), values)]);
        let bands = BandSet::new(vec![
            DurationBand::bounded("short", 4.0, 24.0),
            DurationBand::bounded("long", 24.0, 168.0),
        ])
        .unwrap();
        let config = DecompositionConfig::new(bands).with_strategy(BandingStrategy::Exclusive);
        let out = decompose(&ds, &config).unwrap();

        let short = out.column(&TagKey::from(["DE", "load", "short"])).unwrap();
        let long = out.column(&TagKey::from(["DE", "load", "long"])).unwrap();
        for t in 0..n {
            assert!((short[t] - daily[t]).abs() < 1e-9);
            assert!((long[t] - weekly[t]).abs() < 1e-9);
        }
    }

    #[test]
    fn cumulative_bands_nest_content() {
        // 12h period: kept by bands reaching down to 8h periods, dropped by
        // bands starting at 48h periods.
        let n = 24 * 7 * 8;
        let values = sine(n, 12.0, 1.0);
        let ds = dataset(vec![(TagKey::from(["DE", "pv"]), values.clone())]);
        let bands = BandSet::new(vec![
            DurationBand::bounded("fine", 4.0, 24.0),
            DurationBand::bounded("coarse", 24.0, 168.0),
        ])
        .unwrap();
        let out = decompose(&ds, &DecompositionConfig::new(bands)).unwrap();
        let fine = out.column(&TagKey::from(["DE", "pv", "fine"])).unwrap();
        let coarse = out.column(&TagKey::from(["DE", "pv", "coarse"])).unwrap();
        assert!(fine.iter().zip(&values).all(|(a, b)| (a - b).abs() < 1e-9));
        assert!(max_abs(coarse) < 1e-9);
    }

    #[test]
    fn keeping_dc_adds_the_mean_to_every_band() {
        let n = 24 * 60;
        let ds = dataset(vec![(TagKey::from(["FR", "pv"]), vec![7.5; n])]);
        let config = DecompositionConfig::new(BandSet::standard_timescales())
            .with_strategy(BandingStrategy::Exclusive)
            .with_remove_dc(false);
        let out = decompose(&ds, &config).unwrap();
        let seasonal = out.column(&TagKey::from(["FR", "pv", "seasonal"])).unwrap();
        assert!(seasonal.iter().all(|v| (v - 7.5).abs() < 1e-9));

        let removed = decompose(&ds, &config.clone().with_remove_dc(true)).unwrap();
        let seasonal = removed.column(&TagKey::from(["FR", "pv", "seasonal"])).unwrap();
        assert!(max_abs(seasonal) < 1e-9);
    }

    #[test]
    fn rejects_datasets_that_already_carry_a_spectrum() {
        let out = decompose(
            &dataset(vec![(TagKey::from(["DE", "pv"]), vec![1.0, 2.0, 3.0, 4.0])]),
            &DecompositionConfig::new(BandSet::standard_timescales()),
        )
        .unwrap();
        let err = decompose(&out, &DecompositionConfig::new(BandSet::standard_timescales())).unwrap_err();
        assert_eq!(err, Error::DataShape(DataShapeError::TagExists(SPECTRUM_TAG.into())));
    }

    #[test]
    fn rejects_missing_values_instead_of_spreading_them() {
        let mut values = sine(48, 12.0, 1.0);
        values[5] = f64::NAN;
        let err = decompose(
            &dataset(vec![(TagKey::from(["DE", "pv"]), values)]),
            &DecompositionConfig::new(BandSet::standard_timescales()),
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::DataShape(DataShapeError::NonFinite { key: "DE/pv".into(), row: 5 })
        );
    }

    #[test]
    fn rejects_single_row_input() {
        let err = decompose(
            &dataset(vec![(TagKey::from(["DE", "pv"]), vec![1.0])]),
            &DecompositionConfig::new(BandSet::standard_timescales()),
        )
        .unwrap_err();
        assert_eq!(err, Error::DataShape(DataShapeError::TooShort(1)));
    }
}
