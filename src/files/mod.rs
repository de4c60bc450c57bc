//! Named remote files: catalogs, cache resolution and downloads.
//!
//! ```text
//!  FileCatalog ──resolve_path──▶ CacheResolver ──missing?──▶ Prompter
//!   (datasets,                    (DownloadPolicy)               │ yes
//!    ModelRegistry)                                              ▼
//!                                                              Fetch
//!                                                         (HttpDownloader)
//! ```

pub mod catalog;
pub mod datasets;
pub mod download;
pub mod models;
pub mod resolve;
pub mod suggest;

pub use catalog::{CatalogEntry, FileCatalog, MetadataStrategy};
pub use datasets::{dataset_catalog, DataFile};
pub use download::{Fetch, HttpDownloader};
pub use models::{ModelRegistry, PredTask, MODELS};
pub use resolve::{CacheResolver, DownloadPolicy, Prompter, Resolution};
