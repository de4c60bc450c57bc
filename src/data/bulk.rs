use std::path::{Path, PathBuf};
use std::rc::Rc;

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use super::loader::{parse_csv, Reader};
use super::model::{Table, Value};
use super::E_FORM_DFT;
use crate::error::{Error, Result};
use crate::files::models::ModelRegistry;

/// Truncated WBM summary shipped with the crate for offline runs.
const BUNDLED_MOCK: &str = include_str!("../../assets/mock-wbm-summary.csv");

/// Options for [`glob_to_table`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Reader for every matched file. Inferred from the pattern when `None`.
    pub reader: Option<Reader>,
    pub show_progress: bool,
    /// Returned instead of an error when nothing matches the pattern.
    pub fallback: Option<Rc<MockPredictions>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            reader: None,
            show_progress: true,
            fallback: None,
        }
    }
}

/// Combine all files matching a glob pattern into one table.
///
/// Files are read one by one in glob order and stacked with
/// [`Table::concat`] (column union, rows never deduplicated), which joins
/// e.g. the per-job outputs of a slurm array into a single table.
pub fn glob_to_table(pattern: &str, opts: &LoadOptions) -> Result<Table> {
    let reader = match opts.reader {
        Some(reader) => reader,
        None => Reader::infer(pattern)?,
    };

    let files = glob_files(pattern)?;
    if files.is_empty() {
        if let Some(mock) = &opts.fallback {
            debug!("no files match {pattern:?}, using mock predictions");
            return Ok(mock.table().clone());
        }
        return Err(Error::NoFilesMatched(pattern.to_string()));
    }

    let bar = if opts.show_progress {
        let bar = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}") {
            bar.set_style(style);
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut tables = Vec::with_capacity(files.len());
    for file in &files {
        bar.set_message(file.display().to_string());
        tables.push(reader.read(file)?);
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(Table::concat(tables))
}

fn glob_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern).map_err(|source| Error::Glob {
        pattern: pattern.to_string(),
        source,
    })?;
    paths
        .map(|entry| {
            entry.map_err(|e| {
                let path = e.path().to_path_buf();
                Error::io(path, std::io::Error::from(e))
            })
        })
        .filter(|entry| entry.as_ref().map_or(true, |p| p.is_file()))
        .collect()
}

// ---------------------------------------------------------------------------
// Mock predictions
// ---------------------------------------------------------------------------

/// Stand-in for model prediction files in test and CI runs.
///
/// A small reference sample with one prediction column per model, each a
/// copy of the ground-truth formation energies, so downstream joins work
/// without downloading anything.
#[derive(Debug, Clone)]
pub struct MockPredictions {
    table: Table,
}

impl MockPredictions {
    /// Copy `truth_col` of `base` into every column of `pred_cols`.
    pub fn new<I, S>(mut base: Table, pred_cols: I, truth_col: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let truth: Vec<Value> = base.column(truth_col)?.into_iter().cloned().collect();
        for col in pred_cols {
            base.set_column(col.as_ref(), truth.clone())?;
        }
        Ok(Self { table: base })
    }

    /// Bundled WBM sample with a column for every model's `pred_col`.
    /// Models without a `pred_col` are skipped.
    pub fn bundled(registry: &ModelRegistry) -> Result<Self> {
        let base = parse_csv(
            BUNDLED_MOCK.as_bytes(),
            Path::new("assets/mock-wbm-summary.csv"),
            b',',
        )?;
        let mut pred_cols = Vec::new();
        for key in registry.keys() {
            if let Some(col) = registry.pred_col(key)? {
                pred_cols.push(col);
            }
        }
        Self::new(base, pred_cols, E_FORM_DFT)
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}
