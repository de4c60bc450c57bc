//! Registry of benchmarked models, one YAML metadata file per model.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;
use serde_yaml::{Mapping, Value as YamlValue};

use super::catalog::{CatalogEntry, FileCatalog, MetadataStrategy};
use super::resolve::CacheResolver;
use crate::error::{Error, Result};

/// Metric sections that hold one of these strings instead of a mapping have
/// no prediction file.
pub const NOT_AVAILABLE: [&str; 2] = ["not available", "not applicable"];

/// `(key, yaml path relative to the models directory)` for every model.
pub const MODELS: &[(&str, &str)] = &[
    ("alignn", "alignn/alignn.yml"),
    // BOWSR optimizer coupled with original MEGNet
    ("bowsr_megnet", "bowsr/bowsr.yml"),
    ("chgnet", "chgnet/chgnet.yml"),
    ("cgcnn", "cgcnn/cgcnn.yml"),
    // CGCNN ensemble trained with training set perturbations
    ("cgcnn_p", "cgcnn/cgcnn+p.yml"),
    ("dpa3_v1_mptrj", "deepmd/dpa3-v1-mptrj.yml"),
    ("dpa3_v1_openlam", "deepmd/dpa3-v1-openlam.yml"),
    ("m3gnet", "m3gnet/m3gnet.yml"),
    ("mace_mp_0", "mace/mace-mp-0.yml"),
    ("mace_mpa_0", "mace/mace-mpa-0.yml"),
    ("megnet", "megnet/megnet.yml"),
    ("sevennet_0", "sevennet/sevennet-0.yml"),
    ("sevennet_l3i5", "sevennet/sevennet-l3i5.yml"),
    ("voronoi_rf", "voronoi_rf/voronoi-rf.yml"),
    ("wrenformer", "wrenformer/wrenformer.yml"),
    ("gnome", "gnome/gnome.yml"),
    ("mattersim_v1_5m", "mattersim/mattersim-v1-5m.yml"),
    ("orb", "orb/orb.yml"),
    ("orb_mptrj", "orb/orb-mptrj.yml"),
    ("eqv2_s_dens", "eqV2/eqV2-s-dens-mp.yml"),
    ("eqv2_m", "eqV2/eqV2-m-omat-mp-salex.yml"),
    ("grace_2l_mptrj", "grace/grace-2L-mptrj.yml"),
    ("grace_2l_oam", "grace/grace-2L-oam.yml"),
    ("grace_1l_oam", "grace/grace-1L-oam.yml"),
];

/// A prediction file declared under `metrics.<section>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredTask {
    Discovery,
    GeoOpt,
    Kappa103,
}

impl PredTask {
    fn section_path(self) -> &'static [&'static str] {
        match self {
            PredTask::Discovery => &["discovery"],
            PredTask::GeoOpt => &["geo_opt"],
            PredTask::Kappa103 => &["phonons", "kappa_103"],
        }
    }

    fn section_name(self) -> String {
        self.section_path().join(".")
    }
}

/// The model catalog plus the repo root that prediction files are relative to.
pub struct ModelRegistry {
    catalog: FileCatalog,
    root_dir: PathBuf,
}

impl ModelRegistry {
    /// Registry over [`MODELS`] whose YAML files live in `models_dir`.
    pub fn new(
        models_dir: impl Into<PathBuf>,
        root_dir: impl Into<PathBuf>,
        resolver: Rc<CacheResolver>,
    ) -> Self {
        Self::with_models(models_dir, root_dir, MODELS, resolver)
    }

    pub fn with_models(
        models_dir: impl Into<PathBuf>,
        root_dir: impl Into<PathBuf>,
        models: &[(&str, &str)],
        resolver: Rc<CacheResolver>,
    ) -> Self {
        Self {
            catalog: FileCatalog::new(
                "Model",
                models_dir,
                MetadataStrategy::PerEntry,
                models,
                resolver,
            ),
            root_dir: root_dir.into(),
        }
    }

    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.catalog.keys()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.catalog.contains(key)
    }

    pub fn metadata(&self, key: &str) -> Result<&Mapping> {
        self.catalog.metadata(key)
    }

    /// Pretty model name, e.g. `MACE-MP-0`.
    pub fn label(&self, key: &str) -> Result<String> {
        self.catalog.label(key)
    }

    pub fn from_label(&self, label: &str) -> Result<&CatalogEntry> {
        self.catalog.from_label(label)
    }

    /// Pull request in which the model was added.
    pub fn url(&self, key: &str) -> Result<String> {
        self.catalog.url(key)
    }

    pub fn model_key(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .metadata(key)?
            .get("model_key")
            .and_then(YamlValue::as_str)
            .map(str::to_string))
    }

    pub fn yaml_path(&self, key: &str) -> Result<PathBuf> {
        self.catalog.abs_path(key)
    }

    /// The `metrics` section, or `None` if the model declares none.
    pub fn metrics(&self, key: &str) -> Result<Option<&YamlValue>> {
        Ok(self.metadata(key)?.get("metrics"))
    }

    /// `metrics.discovery.pred_col`: the column holding formation energy
    /// predictions in the discovery file.
    pub fn pred_col(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .metrics(key)?
            .and_then(|m| m.get("discovery"))
            .and_then(|d| d.get("pred_col"))
            .and_then(YamlValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }

    pub fn discovery_path(&self, key: &str) -> Result<Option<PathBuf>> {
        self.pred_path(key, PredTask::Discovery)
    }

    pub fn geo_opt_path(&self, key: &str) -> Result<Option<PathBuf>> {
        self.pred_path(key, PredTask::GeoOpt)
    }

    pub fn kappa_103_path(&self, key: &str) -> Result<Option<PathBuf>> {
        self.pred_path(key, PredTask::Kappa103)
    }

    /// Local path of a model's prediction file for `task`, downloaded first
    /// if missing (subject to the download policy).
    ///
    /// `None` when the metric section is marked not available/applicable.
    /// A section that is absent or lacks `pred_file` is an error.
    pub fn pred_path(&self, key: &str, task: PredTask) -> Result<Option<PathBuf>> {
        let mut section = self.metrics(key)?;
        for (depth, name) in task.section_path().iter().enumerate() {
            // sentinels only apply at the top level of a metric
            if depth == 0 && section.and_then(|s| s.get(*name)).is_some_and(is_sentinel) {
                return Ok(None);
            }
            section = section.and_then(|s| s.get(*name));
        }

        let rel_path = section
            .and_then(|s| s.get("pred_file"))
            .and_then(YamlValue::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MissingPredFile {
                section: task.section_name(),
                yaml_path: self.catalog.abs_path(key).unwrap_or_default(),
            })?;
        let abs_path = self.root_dir.join(rel_path);

        match section
            .and_then(|s| s.get("pred_file_url"))
            .and_then(YamlValue::as_str)
        {
            Some(url) => {
                let label = self.label(key)?;
                let outcome = self.catalog.resolver().ensure_local(&abs_path, &label, url);
                debug!("{key} {}: {outcome:?}", task.section_name());
            }
            None => debug!("{key} {}: no pred_file_url", task.section_name()),
        }
        Ok(Some(abs_path))
    }
}

fn is_sentinel(value: &YamlValue) -> bool {
    value
        .as_str()
        .is_some_and(|s| NOT_AVAILABLE.contains(&s))
}
