//! Download, cache and hydrate Matbench Discovery data files and model
//! predictions.
//!
//! ```no_run
//! use mbd_data::config::Settings;
//! use mbd_data::predictions::{load_predictions, load_reference_table, PredictionOptions};
//!
//! # fn main() -> mbd_data::Result<()> {
//! let settings = Settings::from_env();
//! let catalogs = settings.catalogs();
//! let reference = load_reference_table(&catalogs.datasets)?;
//! let opts = PredictionOptions {
//!     models: vec!["mace_mp_0".into(), "CHGNet".into()],
//!     load: settings.load_options(&catalogs.models)?,
//!     ..Default::default()
//! };
//! let table = load_predictions(&reference, &catalogs.models, &opts)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod files;
pub mod predictions;

pub use error::{Error, Result};
