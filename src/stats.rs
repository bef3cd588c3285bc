//! Dispersion estimators used to summarize decomposed series over years.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{ConfigError, Error, Result};

pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Two-sided interval around a sample mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub mean: f64,
    pub upper: f64,
}

/// Student-t confidence interval for the population mean of `x`, with
/// `len(x) - 1` degrees of freedom and the standard error of the mean as
/// scale.
///
/// Fewer than two values is a [`Error::DegenerateSample`]. A sample without
/// spread yields an interval collapsed onto the mean.
pub fn confidence_interval(x: &[f64], level: f64) -> Result<ConfidenceInterval> {
    if !(level > 0.0 && level < 1.0) {
        return Err(ConfigError::ConfidenceLevel(level).into());
    }
    if x.len() < 2 {
        return Err(Error::DegenerateSample { needed: 2, got: x.len() });
    }

    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let variance = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let sem = (variance / n).sqrt();
    if sem == 0.0 {
        return Ok(ConfidenceInterval {
            lower: mean,
            mean,
            upper: mean,
        });
    }

    let t = StudentsT::new(0.0, 1.0, n - 1.0)
        .map_err(|_| Error::DegenerateSample { needed: 2, got: x.len() })?
        .inverse_cdf(0.5 + level / 2.0);
    Ok(ConfidenceInterval {
        lower: mean - t * sem,
        mean,
        upper: mean + t * sem,
    })
}

/// Upper end of the 95% interval.
pub fn upper_confidence_bound(x: &[f64]) -> Result<f64> {
    confidence_interval(x, DEFAULT_CONFIDENCE_LEVEL).map(|ci| ci.upper)
}

/// Lower end of the 95% interval.
pub fn lower_confidence_bound(x: &[f64]) -> Result<f64> {
    confidence_interval(x, DEFAULT_CONFIDENCE_LEVEL).map(|ci| ci.lower)
}

/// Percentiles reported for flexibility requirements: coarse steps up to 75,
/// then every point from 80 to 100.
pub fn default_percentiles() -> Vec<f64> {
    (0..80)
        .step_by(5)
        .chain(80..=100)
        .map(f64::from)
        .collect()
}

fn validate_percentile(p: f64) -> Result<()> {
    if (0.0..=100.0).contains(&p) {
        Ok(())
    } else {
        Err(ConfigError::Percentile(p).into())
    }
}

/// Reducer returning the `p`-th percentile of the magnitudes of the
/// non-positive values of a sample.
///
/// Positive values are not downward events: they become NaN and are skipped.
/// A sample with nothing left gives NaN.
pub fn tail_percentile(p: f64) -> Result<impl Fn(&[f64]) -> f64> {
    validate_percentile(p)?;
    Ok(move |x: &[f64]| {
        let magnitudes: Vec<f64> = x
            .iter()
            .map(|&v| if v <= 0.0 { v.abs() } else { f64::NAN })
            .collect();
        nan_percentile(&magnitudes, p)
    })
}

/// Percentile with linear interpolation between closest ranks, NaN ignored.
pub fn nan_percentile(values: &[f64], p: f64) -> f64 {
    let mut present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return f64::NAN;
    }
    present.sort_by(f64::total_cmp);

    let rank = p / 100.0 * (present.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    present[lo] + (present[hi] - present[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn interval_matches_reference_values() {
        // mean 3, sd 1.5811, sem 0.7071, t(0.975, 4) = 2.7764
        let ci = confidence_interval(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.95).unwrap();
        assert!((ci.mean - 3.0).abs() < 1e-12);
        assert!((ci.upper - 4.963243).abs() < 1e-5);
        assert!((ci.lower - 1.036757).abs() < 1e-5);
        assert_eq!(upper_confidence_bound(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(), ci.upper);
        assert_eq!(lower_confidence_bound(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(), ci.lower);
    }

    #[test]
    fn single_value_is_degenerate() {
        assert_eq!(
            upper_confidence_bound(&[4.0]).unwrap_err(),
            Error::DegenerateSample { needed: 2, got: 1 }
        );
        assert!(lower_confidence_bound(&[]).is_err());
    }

    #[test]
    fn constant_sample_collapses_onto_mean() {
        let ci = confidence_interval(&[2.5, 2.5, 2.5], 0.95).unwrap();
        assert_eq!((ci.lower, ci.mean, ci.upper), (2.5, 2.5, 2.5));
    }

    #[test]
    fn invalid_level_is_a_configuration_error() {
        for level in [0.0, 1.0, -0.5, f64::NAN] {
            assert!(matches!(
                confidence_interval(&[1.0, 2.0], level),
                Err(Error::Configuration(ConfigError::ConfidenceLevel(_)))
            ));
        }
    }

    #[test]
    fn tail_percentile_ignores_positive_values() {
        let sample = [5.0, -1.0, 3.0, -3.0, 0.0, -2.0];
        // magnitudes considered: 1, 3, 0, 2 → sorted 0, 1, 2, 3
        assert_eq!(tail_percentile(0.0).unwrap()(&sample[..]), 0.0);
        assert_eq!(tail_percentile(50.0).unwrap()(&sample[..]), 1.5);
        assert_eq!(tail_percentile(100.0).unwrap()(&sample[..]), 3.0);
    }

    #[test]
    fn tail_percentile_of_all_positive_is_nan() {
        assert!(tail_percentile(50.0).unwrap()(&[1.0, 2.0][..]).is_nan());
        assert_eq!(tail_percentile(50.0).unwrap()(&[f64::NAN, -1.0][..]), 1.0);
    }

    #[test]
    fn percentile_outside_range_is_rejected() {
        assert!(tail_percentile(-1.0).is_err());
        assert!(tail_percentile(100.5).is_err());
        assert!(tail_percentile(f64::NAN).is_err());
    }

    #[test]
    fn default_percentiles_layout() {
        let p = default_percentiles();
        assert_eq!(p.len(), 16 + 21);
        assert_eq!(&p[..3], &[0.0, 5.0, 10.0]);
        assert_eq!(p[15], 75.0);
        assert_eq!(p[16], 80.0);
        assert_eq!(*p.last().unwrap(), 100.0);
    }

    proptest! {
        #[test]
        fn interval_brackets_the_mean(x in prop::collection::vec(-1e6f64..1e6, 2..64)) {
            let ci = confidence_interval(&x, DEFAULT_CONFIDENCE_LEVEL).unwrap();
            prop_assert!(ci.lower <= ci.mean);
            prop_assert!(ci.mean <= ci.upper);
        }

        #[test]
        fn tail_percentile_is_monotone(
            x in prop::collection::vec(-1e3f64..1e3, 1..64),
            a in 0.0f64..=100.0,
            b in 0.0f64..=100.0,
        ) {
            let (p1, p2) = if a <= b { (a, b) } else { (b, a) };
            let low = tail_percentile(p1).unwrap()(&x[..]);
            let high = tail_percentile(p2).unwrap()(&x[..]);
            if low.is_nan() {
                prop_assert!(high.is_nan());
            } else {
                prop_assert!(low <= high + 1e-9);
            }
        }
    }
}
