use std::cell::OnceCell;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;
use serde_yaml::{Mapping, Value as YamlValue};

use super::resolve::CacheResolver;
use super::suggest::{close_matches, CUTOFF, MAX_SUGGESTIONS};
use crate::error::{Error, Result};

/// Where a catalog's entries get their metadata from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataStrategy {
    /// One YAML file mapping entry key to `{url, description, path}`.
    /// Entries are downloadable cache files.
    Shared(PathBuf),
    /// Each entry's relative path is its own YAML metadata file (the model
    /// registry). Entries are local files, never downloaded.
    PerEntry,
}

/// One named file known to a catalog.
#[derive(Debug)]
pub struct CatalogEntry {
    key: String,
    rel_path: String,
    metadata: OnceCell<Mapping>,
}

impl CatalogEntry {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }
}

/// An ordered set of named files sharing a base directory and metadata
/// strategy.
///
/// Metadata is read lazily and memoised per entry; local file existence is
/// checked on every [`resolve_path`](Self::resolve_path) call.
pub struct FileCatalog {
    name: String,
    base_dir: PathBuf,
    strategy: MetadataStrategy,
    entries: Vec<CatalogEntry>,
    positions: HashMap<String, usize>,
    shared: OnceCell<Mapping>,
    resolver: Rc<CacheResolver>,
}

impl FileCatalog {
    /// Build a catalog from `(key, rel_path)` declarations. Later duplicates
    /// of a key are ignored.
    pub fn new(
        name: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        strategy: MetadataStrategy,
        declarations: &[(&str, &str)],
        resolver: Rc<CacheResolver>,
    ) -> Self {
        let mut entries = Vec::with_capacity(declarations.len());
        let mut positions = HashMap::with_capacity(declarations.len());
        for (key, rel_path) in declarations {
            if positions.contains_key(*key) {
                continue;
            }
            positions.insert(key.to_string(), entries.len());
            entries.push(CatalogEntry {
                key: key.to_string(),
                rel_path: rel_path.to_string(),
                metadata: OnceCell::new(),
            });
        }
        Self {
            name: name.into(),
            base_dir: base_dir.into(),
            strategy,
            entries,
            positions,
            shared: OnceCell::new(),
            resolver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolver(&self) -> &CacheResolver {
        &self.resolver
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn entry(&self, key: &str) -> Result<&CatalogEntry> {
        self.positions
            .get(key)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::MissingEntry {
                key: key.to_string(),
                metadata_file: self.source_description(None),
            })
    }

    /// `base_dir / rel_path`, without touching the filesystem.
    pub fn abs_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.base_dir.join(&self.entry(key)?.rel_path))
    }

    /// File the metadata of `key` is read from.
    pub fn metadata_file(&self, key: &str) -> Result<PathBuf> {
        let entry = self.entry(key)?;
        Ok(self.source_description(Some(entry)))
    }

    fn source_description(&self, entry: Option<&CatalogEntry>) -> PathBuf {
        match (&self.strategy, entry) {
            (MetadataStrategy::Shared(file), _) => file.clone(),
            (MetadataStrategy::PerEntry, Some(entry)) => self.base_dir.join(&entry.rel_path),
            (MetadataStrategy::PerEntry, None) => self.base_dir.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    /// Metadata record of `key`, read from disk on first access only.
    pub fn metadata(&self, key: &str) -> Result<&Mapping> {
        let entry = self.entry(key)?;
        if let Some(cached) = entry.metadata.get() {
            return Ok(cached);
        }
        let loaded = match &self.strategy {
            MetadataStrategy::Shared(file) => {
                let shared = self.shared_metadata(file)?;
                match shared.get(key) {
                    None => {
                        return Err(Error::MissingEntry {
                            key: key.to_string(),
                            metadata_file: file.clone(),
                        })
                    }
                    Some(YamlValue::Mapping(record)) => record.clone(),
                    Some(_) => {
                        return Err(Error::MalformedMetadata {
                            metadata_file: file.clone(),
                        })
                    }
                }
            }
            MetadataStrategy::PerEntry => read_yaml_mapping(&self.base_dir.join(&entry.rel_path))?,
        };
        Ok(entry.metadata.get_or_init(|| loaded))
    }

    fn shared_metadata(&self, file: &Path) -> Result<&Mapping> {
        if let Some(cached) = self.shared.get() {
            return Ok(cached);
        }
        let loaded = read_yaml_mapping(file)?;
        Ok(self.shared.get_or_init(|| loaded))
    }

    fn string_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self
            .metadata(key)?
            .get(field)
            .and_then(YamlValue::as_str)
            .map(str::to_string))
    }

    fn required_field(&self, key: &str, field: &str) -> Result<String> {
        self.string_field(key, field)?
            .ok_or_else(|| Error::MissingField {
                key: key.to_string(),
                field: field.to_string(),
                metadata_file: self.source_description(self.entry(key).ok()),
            })
    }

    /// Download URL for dataset files, pull request URL for models.
    pub fn url(&self, key: &str) -> Result<String> {
        let field = match self.strategy {
            MetadataStrategy::Shared(_) => "url",
            MetadataStrategy::PerEntry => "pr_url",
        };
        self.string_field(key, field)?.ok_or_else(|| Error::MissingUrl {
            key: key.to_string(),
        })
    }

    /// Display name: the key itself for dataset files, `model_name` for models.
    pub fn label(&self, key: &str) -> Result<String> {
        match self.strategy {
            MetadataStrategy::Shared(_) => {
                self.metadata(key)?;
                Ok(key.to_string())
            }
            MetadataStrategy::PerEntry => self.required_field(key, "model_name"),
        }
    }

    pub fn description(&self, key: &str) -> Result<String> {
        self.required_field(key, "description")
    }

    /// `(key, label)` pairs in declaration order, e.g. for axis labels in plots.
    pub fn label_map(&self) -> Result<Vec<(String, String)>> {
        self.keys()
            .map(|k| Ok((k.to_string(), self.label(k)?)))
            .collect()
    }

    /// Reverse lookup of an entry by its display label.
    pub fn from_label(&self, label: &str) -> Result<&CatalogEntry> {
        let mut labels = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let entry_label = self.label(&entry.key)?;
            if entry_label == label {
                return Ok(entry);
            }
            labels.push(entry_label);
        }
        Err(Error::LabelNotFound {
            label: label.to_string(),
            catalog: self.name.clone(),
            suggestions: close_matches(
                label,
                labels.iter().map(String::as_str),
                MAX_SUGGESTIONS,
                CUTOFF,
            ),
        })
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    /// Absolute local path of `key`, downloading the file first if it is
    /// missing and the download policy allows it.
    ///
    /// The path is returned even when the download failed or was declined;
    /// callers that need the file must check that it exists.
    pub fn resolve_path(&self, key: &str) -> Result<PathBuf> {
        let abs_path = self.abs_path(key)?;
        let MetadataStrategy::Shared(file) = &self.strategy else {
            return Ok(abs_path);
        };

        let entry = self.entry(key)?;
        let recorded = self.string_field(key, "path")?.unwrap_or_default();
        if !recorded.contains(&entry.rel_path) {
            return Err(Error::PathMismatch {
                key: key.to_string(),
                rel_path: entry.rel_path.clone(),
                recorded,
                metadata_file: file.clone(),
            });
        }

        if !abs_path.is_file() {
            let url = self.url(key)?;
            let outcome = self.resolver.ensure_local(&abs_path, key, &url);
            debug!("{key}: {outcome:?}");
        }
        Ok(abs_path)
    }
}

/// Parse a YAML file that must hold a mapping at the top level.
pub(crate) fn read_yaml_mapping(path: &Path) -> Result<Mapping> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let doc: YamlValue = serde_yaml::from_reader(file).map_err(|e| Error::Yaml {
        path: path.to_path_buf(),
        source: e,
    })?;
    match doc {
        YamlValue::Mapping(map) => Ok(map),
        _ => Err(Error::MalformedMetadata {
            metadata_file: path.to_path_buf(),
        }),
    }
}
