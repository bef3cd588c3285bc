/// Data layer: tagged tables, file I/O and column selection.
///
/// Architecture:
/// ```text
///  .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → TaggedTable<NaiveDateTime>
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │  TaggedTable<I> │  row index + BTreeMap<TagKey, Vec<f64>>
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  tag-value predicates → selected columns
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
