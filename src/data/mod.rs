/// Data layer: tables, file readers and multi-file loading.
///
/// Architecture:
/// ```text
///  .csv(.gz) / .json(.gz) / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse one file → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   bulk    │  glob pattern → concatenated Table (or mock fallback)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  Table: columns, rows, key index, joins
///   └──────────┘
/// ```

pub mod bulk;
pub mod loader;
pub mod model;

pub use bulk::{glob_to_table, LoadOptions, MockPredictions};
pub use loader::{load_file, Reader};
pub use model::{Table, Value};

/// Material identifier column of the WBM summary and prediction files.
pub const MAT_ID: &str = "material_id";
/// DFT formation energy per atom, the ground truth for discovery predictions.
pub const E_FORM_DFT: &str = "e_form_per_atom_wbm";
/// Boolean column marking the unique-prototype subset of WBM.
pub const UNIQ_PROTO: &str = "unique_prototype";
