/// Data layer: the in-memory table and the transforms applied to it.
///
/// Architecture:
/// ```text
///   query result (columns + rows)
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  Table: ordered, equal-length named columns of Value
///   └──────────┘
///        │
///        ├──────────────► normalize  (min-max scale a column into [0, 1])
///        ▼
///   ┌──────────┐
///   │  format   │  Table → CSV / Parquet bytes for upload
///   └──────────┘
/// ```

pub mod format;
pub mod model;
pub mod normalize;
