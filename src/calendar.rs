//! Re-index multi-year hourly data onto a shared hour-of-year axis.

use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::data::model::{TaggedTable, TimeSeriesDataset};
use crate::error::{DataShapeError, Result};

/// Non-leap year every timestamp is re-anchored onto.
pub const REFERENCE_YEAR: i32 = 2018;

pub const HOURS_PER_REFERENCE_YEAR: u32 = 8760;

/// Cumulative day count at the start of each month of the reference year.
const DAYS_BEFORE_MONTH: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// Composite row coordinate after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearHour {
    pub year: i32,
    /// 1-based hour within the reference year, `1..=8760`.
    pub hour_of_year: u32,
}

impl fmt::Display for YearHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.hour_of_year)
    }
}

/// What to do with Feb 29, which has no slot in the reference year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LeapDayPolicy {
    /// Map Feb 29 onto Feb 28's hours; that year then has two samples for
    /// each of those slots.
    #[default]
    FoldIntoFeb28,
    /// Remove Feb 29 rows.
    Drop,
    /// Fail with a [`DataShapeError::LeapDay`].
    Reject,
}

/// Hour-of-year coordinate of `ts`, or `None` if the policy drops it.
pub fn hour_of_year(ts: NaiveDateTime, policy: LeapDayPolicy) -> Result<Option<u32>> {
    let (month, mut day) = (ts.month(), ts.day());
    if month == 2 && day == 29 {
        match policy {
            LeapDayPolicy::FoldIntoFeb28 => day = 28,
            LeapDayPolicy::Drop => return Ok(None),
            LeapDayPolicy::Reject => return Err(DataShapeError::LeapDay(ts.to_string()).into()),
        }
    }

    let days_before = DAYS_BEFORE_MONTH[month as usize - 1] + day - 1;
    Ok(Some(days_before * 24 + ts.hour() + 1))
}

/// Replace the timestamp index with `(year, hour_of_year)`. Tags and column
/// values are carried over unchanged.
pub fn to_hour_of_year(dataset: &TimeSeriesDataset, policy: LeapDayPolicy) -> Result<TaggedTable<YearHour>> {
    let coords = dataset
        .index()
        .iter()
        .map(|&ts| {
            hour_of_year(ts, policy).map(|h| {
                h.map(|hour_of_year| YearHour {
                    year: ts.year(),
                    hour_of_year,
                })
            })
        })
        .collect::<Result<Vec<Option<YearHour>>>>()?;

    let kept = if coords.iter().any(Option::is_none) {
        dataset.retain_rows(|r| coords[r].is_some())
    } else {
        dataset.clone()
    };
    kept.with_index(coords.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{hourly_index, TagKey};
    use crate::error::Error;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn year_of_data(year: i32) -> TimeSeriesDataset {
        let start = at(year, 1, 1, 0);
        let n = if NaiveDate::from_ymd_opt(year, 2, 29).is_some() { 8784 } else { 8760 };
        let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
        TaggedTable::from_columns(hourly_index(start, n), ["region"], [(TagKey::from(["DE"]), values)]).unwrap()
    }

    #[test]
    fn reference_year_edges() {
        let p = LeapDayPolicy::default();
        assert_eq!(hour_of_year(at(2019, 1, 1, 0), p).unwrap(), Some(1));
        assert_eq!(hour_of_year(at(2019, 12, 31, 23), p).unwrap(), Some(8760));
        assert_eq!(hour_of_year(at(2020, 3, 1, 0), p).unwrap(), Some(1417));
    }

    #[test]
    fn month_table_agrees_with_day_of_year() {
        for day in NaiveDate::from_ymd_opt(2019, 1, 1).unwrap().iter_days().take(365) {
            let ts = day.and_hms_opt(5, 30, 0).unwrap();
            let expected = day.ordinal0() * 24 + 5 + 1;
            assert_eq!(hour_of_year(ts, LeapDayPolicy::Reject).unwrap(), Some(expected), "{day}");
        }
    }

    #[test]
    fn non_leap_year_covers_every_hour_once() {
        let table = to_hour_of_year(&year_of_data(2019), LeapDayPolicy::Reject).unwrap();
        let hours: Vec<u32> = table.index().iter().map(|c| c.hour_of_year).collect();
        assert_eq!(hours, (1..=HOURS_PER_REFERENCE_YEAR).collect::<Vec<_>>());
        assert!(table.index().iter().all(|c| c.year == 2019));
        assert_eq!(table.column(&TagKey::from(["DE"])).unwrap()[8759], 8759.0);
    }

    #[test]
    fn leap_day_folds_onto_feb_28() {
        assert_eq!(
            hour_of_year(at(2020, 2, 29, 0), LeapDayPolicy::FoldIntoFeb28).unwrap(),
            Some(1393)
        );
        let table = to_hour_of_year(&year_of_data(2020), LeapDayPolicy::FoldIntoFeb28).unwrap();
        assert_eq!(table.len(), 8784);
        assert_eq!(table.index().iter().filter(|c| c.hour_of_year == 1393).count(), 2);
        assert_eq!(table.index().last().unwrap().hour_of_year, 8760);
    }

    #[test]
    fn leap_day_can_be_dropped() {
        let table = to_hour_of_year(&year_of_data(2020), LeapDayPolicy::Drop).unwrap();
        let hours: Vec<u32> = table.index().iter().map(|c| c.hour_of_year).collect();
        assert_eq!(hours, (1..=HOURS_PER_REFERENCE_YEAR).collect::<Vec<_>>());
        // 2020-03-01 00:00 is row 60 * 24 of the source
        assert_eq!(table.column(&TagKey::from(["DE"])).unwrap()[1416], 1440.0);
    }

    #[test]
    fn leap_day_can_be_rejected() {
        let err = to_hour_of_year(&year_of_data(2020), LeapDayPolicy::Reject).unwrap_err();
        assert!(matches!(err, Error::DataShape(DataShapeError::LeapDay(_))));
    }
}
