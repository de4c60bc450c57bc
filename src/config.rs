//! Process-wide settings read from the environment.
//!
//! Environment variables:
//! * `MBD_AUTO_DOWNLOAD_FILES`: download missing files without asking.
//!   Defaults to `true`; any other value asks first (in a terminal).
//! * `MBD_CACHE_DIR`: where data files are cached. Defaults to `<root>/data`
//!   if that directory exists, else the per-user cache directory.
//! * `MBD_ROOT`: repository root holding `models/` and `data/data-files.yml`.
//!   Defaults to the working directory.
//! * `MBD_TEST_MODE` or `CI`: substitute mock predictions for missing
//!   prediction files.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::rc::Rc;

use crate::data::{LoadOptions, MockPredictions};
use crate::error::Result;
use crate::files::{
    dataset_catalog, CacheResolver, DownloadPolicy, FileCatalog, ModelRegistry, Prompter,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub auto_download: bool,
    /// Whether a human can answer download prompts.
    pub interactive: bool,
    pub test_mode: bool,
}

/// Both catalogs, sharing one resolver.
pub struct Catalogs {
    pub datasets: FileCatalog,
    pub models: ModelRegistry,
}

impl Settings {
    pub fn from_env() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(|name| std::env::var(name).ok(), cwd, std::io::stdin().is_terminal())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        cwd: PathBuf,
        interactive: bool,
    ) -> Self {
        let root_dir = lookup("MBD_ROOT").map(PathBuf::from).unwrap_or(cwd);
        let cache_dir = match lookup("MBD_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_dir(&root_dir),
        };
        let auto_download = lookup("MBD_AUTO_DOWNLOAD_FILES")
            .map_or(true, |v| v.eq_ignore_ascii_case("true"));
        let test_mode = lookup("MBD_TEST_MODE").is_some() || lookup("CI").is_some();
        Self {
            root_dir,
            cache_dir,
            auto_download,
            interactive,
            test_mode,
        }
    }

    pub fn data_files_yaml(&self) -> PathBuf {
        self.root_dir.join("data").join("data-files.yml")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root_dir.join("models")
    }

    /// Ask in a terminal, otherwise nobody can answer so go ahead.
    pub fn prompter(&self) -> Prompter {
        if self.interactive {
            Prompter::Interactive
        } else {
            Prompter::AlwaysYes
        }
    }

    pub fn policy(&self) -> DownloadPolicy {
        DownloadPolicy {
            auto_download: self.auto_download,
            prompter: self.prompter(),
        }
    }

    pub fn resolver(&self) -> Rc<CacheResolver> {
        Rc::new(CacheResolver::http(self.policy()))
    }

    pub fn catalogs(&self) -> Catalogs {
        self.catalogs_with(self.resolver())
    }

    pub fn catalogs_with(&self, resolver: Rc<CacheResolver>) -> Catalogs {
        Catalogs {
            datasets: dataset_catalog(
                &self.cache_dir,
                self.data_files_yaml(),
                Rc::clone(&resolver),
            ),
            models: ModelRegistry::new(self.models_dir(), &self.root_dir, resolver),
        }
    }

    /// Bulk-loading options; in test mode missing prediction files fall back
    /// to [`MockPredictions::bundled`].
    pub fn load_options(&self, registry: &ModelRegistry) -> Result<LoadOptions> {
        let fallback = if self.test_mode {
            Some(Rc::new(MockPredictions::bundled(registry)?))
        } else {
            None
        };
        Ok(LoadOptions {
            fallback,
            ..LoadOptions::default()
        })
    }
}

fn default_cache_dir(root_dir: &std::path::Path) -> PathBuf {
    let data_dir = root_dir.join("data");
    if data_dir.is_dir() {
        return data_dir;
    }
    dirs::cache_dir()
        .map(|dir| dir.join("matbench-discovery"))
        .unwrap_or(data_dir)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::data::E_FORM_DFT;

    fn settings(vars: &[(&str, &str)], cwd: PathBuf, interactive: bool) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned(), cwd, interactive)
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let s = settings(&[], dir.path().to_path_buf(), false);
        assert!(s.auto_download);
        assert!(!s.test_mode);
        assert_eq!(s.cache_dir, dir.path().join("data"));
        assert_eq!(s.prompter(), Prompter::AlwaysYes);
        assert_eq!(s.data_files_yaml(), dir.path().join("data/data-files.yml"));
    }

    #[test]
    fn test_overrides() {
        let s = settings(
            &[
                ("MBD_AUTO_DOWNLOAD_FILES", "False"),
                ("MBD_CACHE_DIR", "/tmp/mbd-cache"),
                ("MBD_ROOT", "/srv/mbd"),
                ("CI", "1"),
            ],
            PathBuf::from("/ignored"),
            true,
        );
        assert!(!s.auto_download);
        assert!(s.test_mode);
        assert_eq!(s.cache_dir, PathBuf::from("/tmp/mbd-cache"));
        assert_eq!(s.models_dir(), PathBuf::from("/srv/mbd/models"));
        assert_eq!(
            s.policy(),
            DownloadPolicy {
                auto_download: false,
                prompter: Prompter::Interactive
            }
        );
    }

    #[test]
    fn test_test_mode_mocks_every_pred_col() {
        let dir = tempfile::tempdir().unwrap();
        let models_dir = dir.path().join("models");
        for (rel, yaml) in [
            ("a.yml", "model_name: A\nmetrics:\n  discovery:\n    pred_col: e_form_a\n"),
            ("b.yml", "model_name: B\nmetrics:\n  discovery:\n    pred_col: e_form_b\n"),
            ("c.yml", "model_name: C\nmetrics:\n  discovery: not available\n"),
        ] {
            std::fs::create_dir_all(&models_dir).unwrap();
            std::fs::write(models_dir.join(rel), yaml).unwrap();
        }
        let mut s = settings(&[("MBD_TEST_MODE", "1")], dir.path().to_path_buf(), false);
        assert!(s.test_mode);
        let registry = ModelRegistry::with_models(
            s.models_dir(),
            &s.root_dir,
            &[("a", "a.yml"), ("b", "b.yml"), ("c", "c.yml")],
            s.resolver(),
        );

        let opts = s.load_options(&registry).unwrap();
        let mock = opts.fallback.expect("test mode sets a fallback");
        let table = mock.table();
        assert!(!table.is_empty());
        let truth = table.column_f64(E_FORM_DFT).unwrap();
        assert!(truth.iter().all(Option::is_some));
        for col in ["e_form_a", "e_form_b"] {
            assert_eq!(table.column_f64(col).unwrap(), truth);
        }
        // C declares no pred_col
        assert_eq!(table.column_names().len(), 6 + 2);

        s.test_mode = false;
        assert!(s.load_options(&registry).unwrap().fallback.is_none());
    }

    #[test]
    fn test_auto_download_is_case_insensitive() {
        let s = settings(&[("MBD_AUTO_DOWNLOAD_FILES", "TRUE")], PathBuf::from("/x"), true);
        assert!(s.auto_download);
    }
}
