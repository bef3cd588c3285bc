use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::model::SECONDS_PER_STEP;
use crate::error::ConfigError;

/// Spectrum tag value carrying the untouched input channel.
pub const RAW_DATA: &str = "raw_data";

/// Name of the tag dimension added by the decomposition.
pub const SPECTRUM_TAG: &str = "spectrum";

/// Display order for the well-known timescale labels.
pub const PREFERRED_ORDER: [&str; 5] = ["seasonal", "monthly", "weekly", "daily", "hourly"];

// ---------------------------------------------------------------------------
// UpperBound
// ---------------------------------------------------------------------------

/// Upper end of a duration band. `Unbounded` means "no upper limit on period
/// length" and maps to a frequency of exactly zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUpperBound", into = "RawUpperBound")]
pub enum UpperBound {
    Hours(f64),
    Unbounded,
}

impl UpperBound {
    /// The larger of two bounds; `Unbounded` wins over any number of hours.
    pub fn max(self, other: UpperBound) -> UpperBound {
        match (self, other) {
            (UpperBound::Hours(a), UpperBound::Hours(b)) => UpperBound::Hours(a.max(b)),
            _ => UpperBound::Unbounded,
        }
    }
}

/// Wire form: a number of hours, or the keyword `"unbounded"`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawUpperBound {
    Hours(f64),
    Keyword(String),
}

impl TryFrom<RawUpperBound> for UpperBound {
    type Error = ConfigError;

    fn try_from(raw: RawUpperBound) -> Result<Self, Self::Error> {
        match raw {
            RawUpperBound::Hours(h) => Ok(UpperBound::Hours(h)),
            RawUpperBound::Keyword(k) if k.eq_ignore_ascii_case("unbounded") => Ok(UpperBound::Unbounded),
            RawUpperBound::Keyword(k) => Err(ConfigError::UnknownUpperBound(k)),
        }
    }
}

impl From<UpperBound> for RawUpperBound {
    fn from(bound: UpperBound) -> Self {
        match bound {
            UpperBound::Hours(h) => RawUpperBound::Hours(h),
            UpperBound::Unbounded => RawUpperBound::Keyword("unbounded".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// DurationBand / BandSet
// ---------------------------------------------------------------------------

/// A named range of signal periods, in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationBand {
    pub label: String,
    pub lower_hours: f64,
    #[serde(rename = "upper_hours")]
    pub upper: UpperBound,
}

impl DurationBand {
    pub fn bounded(label: impl Into<String>, lower_hours: f64, upper_hours: f64) -> Self {
        DurationBand {
            label: label.into(),
            lower_hours,
            upper: UpperBound::Hours(upper_hours),
        }
    }

    pub fn unbounded(label: impl Into<String>, lower_hours: f64) -> Self {
        DurationBand {
            label: label.into(),
            lower_hours,
            upper: UpperBound::Unbounded,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let malformed = |reason: String| ConfigError::MalformedBand {
            label: self.label.clone(),
            reason,
        };
        if self.label.is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        if self.label == RAW_DATA {
            return Err(ConfigError::ReservedLabel(self.label.clone()));
        }
        if !self.lower_hours.is_finite() || self.lower_hours <= 0.0 {
            return Err(malformed(format!(
                "lower bound must be a positive number of hours, got {}",
                self.lower_hours
            )));
        }
        if let UpperBound::Hours(upper) = self.upper {
            if !upper.is_finite() {
                return Err(malformed(format!(
                    "upper bound {upper} is not finite, use \"unbounded\" instead"
                )));
            }
            if self.lower_hours >= upper {
                return Err(malformed(format!(
                    "lower bound {} must be below upper bound {upper}",
                    self.lower_hours
                )));
            }
        }
        Ok(())
    }
}

/// Validated, ordered collection of duration bands. Caller order is kept for
/// iteration; [`BandSet::display_order`] gives the preferred presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DurationBand>", into = "Vec<DurationBand>")]
pub struct BandSet(Vec<DurationBand>);

impl BandSet {
    pub fn new(bands: Vec<DurationBand>) -> Result<Self, ConfigError> {
        if bands.is_empty() {
            return Err(ConfigError::NoBands);
        }
        {
            let mut labels = BTreeSet::new();
            for band in &bands {
                band.validate()?;
                if !labels.insert(band.label.as_str()) {
                    return Err(ConfigError::DuplicateLabel(band.label.clone()));
                }
            }
        }
        Ok(BandSet(bands))
    }

    /// Seasonal, monthly, weekly, daily and hourly variability as used for
    /// the PECD renewable time series.
    pub fn standard_timescales() -> Self {
        BandSet(vec![
            DurationBand::unbounded("seasonal", 30.0 * 24.0),
            DurationBand::bounded("monthly", 7.0 * 24.0, 30.0 * 24.0),
            DurationBand::bounded("weekly", 24.0, 7.0 * 24.0),
            DurationBand::bounded("daily", 4.0, 24.0),
            DurationBand::bounded("hourly", 0.25, 4.0),
        ])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DurationBand> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Largest upper bound over all bands.
    pub fn max_upper(&self) -> UpperBound {
        self.0
            .iter()
            .map(|b| b.upper)
            .fold(UpperBound::Hours(0.0), UpperBound::max)
    }

    /// Bands in preferred display order.
    pub fn display_order(&self) -> Vec<&DurationBand> {
        let mut ordered: Vec<&DurationBand> = self.0.iter().collect();
        ordered.sort_by_key(|b| display_rank(&b.label));
        ordered
    }
}

impl TryFrom<Vec<DurationBand>> for BandSet {
    type Error = ConfigError;

    fn try_from(bands: Vec<DurationBand>) -> Result<Self, Self::Error> {
        BandSet::new(bands)
    }
}

impl From<BandSet> for Vec<DurationBand> {
    fn from(set: BandSet) -> Self {
        set.0
    }
}

impl<'a> IntoIterator for &'a BandSet {
    type Item = &'a DurationBand;
    type IntoIter = std::slice::Iter<'a, DurationBand>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Rank of a label in [`PREFERRED_ORDER`]; unknown labels share the last rank
/// so a stable sort keeps their input order.
pub fn display_rank(label: &str) -> usize {
    PREFERRED_ORDER
        .iter()
        .position(|known| *known == label)
        .unwrap_or(PREFERRED_ORDER.len())
}

// ---------------------------------------------------------------------------
// Frequency mapping
// ---------------------------------------------------------------------------

/// How bands translate into retained frequency ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BandingStrategy {
    /// Each band keeps only its own period range (band-pass). Bands that
    /// tile the spectrum sum back to the de-meaned input.
    Exclusive,
    /// Each band keeps every period from its lower bound up to the largest
    /// upper bound of the set, giving nested low-pass components.
    #[default]
    CumulativeLowPass,
}

/// Retained frequency range in Hz, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyCut {
    pub lower_freq: f64,
    pub upper_freq: f64,
}

impl FrequencyCut {
    pub fn retains(&self, freq: f64) -> bool {
        freq >= self.lower_freq && freq <= self.upper_freq
    }
}

/// `f = 1 / (2 · hours · 3600)`.
pub fn duration_to_frequency(hours: f64) -> f64 {
    1.0 / (2.0 * hours * SECONDS_PER_STEP as f64)
}

fn upper_to_frequency(upper: UpperBound) -> f64 {
    match upper {
        UpperBound::Hours(h) => duration_to_frequency(h),
        UpperBound::Unbounded => 0.0,
    }
}

/// One cut per band, in band order.
pub fn frequency_cuts(bands: &BandSet, strategy: BandingStrategy) -> Vec<FrequencyCut> {
    let shared_upper = bands.max_upper();
    bands
        .iter()
        .map(|band| {
            let upper = match strategy {
                BandingStrategy::Exclusive => band.upper,
                BandingStrategy::CumulativeLowPass => shared_upper,
            };
            // Longer periods are lower frequencies, so the pair swaps.
            FrequencyCut {
                lower_freq: upper_to_frequency(upper),
                upper_freq: duration_to_frequency(band.lower_hours),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bands() -> BandSet {
        BandSet::new(vec![
            DurationBand::bounded("short", 4.0, 24.0),
            DurationBand::bounded("long", 24.0, 168.0),
        ])
        .unwrap()
    }

    #[test]
    fn exclusive_cuts_swap_duration_order() {
        let cuts = frequency_cuts(&two_bands(), BandingStrategy::Exclusive);
        assert_eq!(cuts[0].lower_freq, duration_to_frequency(24.0));
        assert_eq!(cuts[0].upper_freq, duration_to_frequency(4.0));
        assert_eq!(cuts[1].lower_freq, duration_to_frequency(168.0));
        assert_eq!(cuts[1].upper_freq, duration_to_frequency(24.0));
        assert!(cuts.iter().all(|c| c.lower_freq < c.upper_freq));
    }

    #[test]
    fn cumulative_cuts_share_the_longest_upper_bound() {
        let cuts = frequency_cuts(&two_bands(), BandingStrategy::CumulativeLowPass);
        let lowest = duration_to_frequency(168.0);
        assert!(cuts.iter().all(|c| c.lower_freq == lowest));
        assert_eq!(cuts[0].upper_freq, duration_to_frequency(4.0));
    }

    #[test]
    fn unbounded_band_reaches_zero_frequency() {
        let cuts = frequency_cuts(&BandSet::standard_timescales(), BandingStrategy::Exclusive);
        assert_eq!(cuts[0].lower_freq, 0.0);
        assert!(cuts[0].retains(0.0));
        assert!(cuts[1..].iter().all(|c| c.lower_freq > 0.0));

        let cumulative = frequency_cuts(&BandSet::standard_timescales(), BandingStrategy::CumulativeLowPass);
        assert!(cumulative.iter().all(|c| c.lower_freq == 0.0));
    }

    #[test]
    fn cumulative_bands_are_nested() {
        let bands = BandSet::standard_timescales();
        let cuts = frequency_cuts(&bands, BandingStrategy::CumulativeLowPass);
        let n = 2 * 8760;
        let freqs: Vec<f64> = (0..n).map(|k| k.min(n - k) as f64 / (n as f64 * 3600.0)).collect();
        for (a, cut_a) in bands.iter().zip(&cuts) {
            for (b, cut_b) in bands.iter().zip(&cuts) {
                if a.lower_hours < b.lower_hours {
                    assert!(freqs.iter().all(|&f| !cut_b.retains(f) || cut_a.retains(f)));
                }
            }
        }
    }

    #[test]
    fn malformed_bands_fail_fast() {
        let err = BandSet::new(vec![DurationBand::bounded("x", 24.0, 24.0)]).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedBand { .. }));
        let err = BandSet::new(vec![DurationBand::bounded("x", 0.0, 24.0)]).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedBand { .. }));
        let err = BandSet::new(vec![DurationBand::bounded("x", -1.0, 24.0)]).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedBand { .. }));
        let err = BandSet::new(vec![DurationBand::bounded("x", 1.0, f64::INFINITY)]).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedBand { .. }));
        assert_eq!(BandSet::new(vec![]).unwrap_err(), ConfigError::NoBands);
        assert_eq!(
            BandSet::new(vec![DurationBand::unbounded(RAW_DATA, 1.0)]).unwrap_err(),
            ConfigError::ReservedLabel(RAW_DATA.into())
        );
        assert_eq!(
            BandSet::new(vec![
                DurationBand::bounded("a", 1.0, 2.0),
                DurationBand::bounded("a", 2.0, 3.0),
            ])
            .unwrap_err(),
            ConfigError::DuplicateLabel("a".into())
        );
    }

    #[test]
    fn display_order_puts_unknown_labels_last() {
        let bands = BandSet::new(vec![
            DurationBand::bounded("zeta", 1.0, 2.0),
            DurationBand::bounded("daily", 4.0, 24.0),
            DurationBand::bounded("alpha", 2.0, 3.0),
            DurationBand::unbounded("seasonal", 720.0),
        ])
        .unwrap();
        let order: Vec<&str> = bands.display_order().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(order, ["seasonal", "daily", "zeta", "alpha"]);
    }

    #[test]
    fn bands_deserialize_with_unbounded_keyword() {
        let json = r#"[
            {"label": "seasonal", "lower_hours": 720, "upper_hours": "unbounded"},
            {"label": "daily", "lower_hours": 4, "upper_hours": 24}
        ]"#;
        let bands: BandSet = serde_json::from_str(json).unwrap();
        assert_eq!(bands.max_upper(), UpperBound::Unbounded);
        assert_eq!(bands.len(), 2);

        let bad = r#"[{"label": "daily", "lower_hours": 24, "upper_hours": 4}]"#;
        assert!(serde_json::from_str::<BandSet>(bad).is_err());
        let bad = r#"[{"label": "daily", "lower_hours": 4, "upper_hours": "forever"}]"#;
        assert!(serde_json::from_str::<BandSet>(bad).is_err());
    }
}
