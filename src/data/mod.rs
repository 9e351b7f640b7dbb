/// Data layer: record store, group partitioning and loading.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file + column mapping → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  Vec<Record>, favorable label, group definition
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ partition  │  group definition → per-role / per-group views
///   └───────────┘
/// ```

pub mod loader;
pub mod model;
pub mod partition;
