//! Timescale decomposition of hourly multi-channel time series.
//!
//! ```text
//!  TimeSeriesDataset ──decompose──▶ + spectrum tag
//!        │                               │
//!        └──────── to_hour_of_year ◀─────┘
//!                        │
//!        hour_of_year_profile / flex_requirement_curve
//! ```

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod spectral;
pub mod stats;

pub use calendar::{to_hour_of_year, LeapDayPolicy, YearHour};
pub use data::model::{TagKey, TaggedTable, TimeSeriesDataset};
pub use error::{ConfigError, DataShapeError, Error};
pub use spectral::{decompose, BandSet, BandingStrategy, DecompositionConfig, DurationBand, UpperBound};
