//! Join model predictions onto the WBM summary table.

use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::data::{
    glob_to_table, load_file, LoadOptions, Table, Value, E_FORM_DFT, MAT_ID, UNIQ_PROTO,
};
use crate::error::{Error, Result};
use crate::files::{DataFile, FileCatalog, ModelRegistry};

/// Default cut-off (eV/atom) above which a prediction counts as unrealistic.
pub const DEFAULT_MAX_ERROR: f64 = 5.0;

/// Which rows of the joined table to keep.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Subset {
    #[default]
    All,
    /// Drop WBM structures whose prototype also occurs in the MP training set
    /// or repeats within WBM (keeping the most stable one per prototype).
    UniqueProtos,
    /// Explicit list of material ids, in the order given.
    Ids(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct PredictionOptions {
    /// Model keys or labels. Empty means every registered model.
    pub models: Vec<String>,
    /// Id column of the prediction files.
    pub id_column: String,
    /// Ground-truth column the error threshold is measured against.
    pub truth_column: String,
    pub subset: Subset,
    /// Predictions further than this from the DFT value are dropped. `None`
    /// disables filtering.
    pub max_error_threshold: Option<f64>,
    pub load: LoadOptions,
}

impl Default for PredictionOptions {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            id_column: MAT_ID.to_string(),
            truth_column: E_FORM_DFT.to_string(),
            subset: Subset::All,
            max_error_threshold: Some(DEFAULT_MAX_ERROR),
            load: LoadOptions::default(),
        }
    }
}

/// Load the WBM summary (downloading it if needed), indexed by material id.
pub fn load_reference_table(datasets: &FileCatalog) -> Result<Table> {
    let path = datasets.resolve_path(DataFile::WbmSummary.key())?;
    let mut table = load_file(&path)?;
    table.set_index(MAT_ID)?;
    info!("loaded {} rows of reference data from {}", table.len(), path.display());
    Ok(table)
}

/// Map requested model keys or labels to registry keys, preserving order and
/// dropping duplicates.
pub fn normalize_models(registry: &ModelRegistry, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(registry.keys().map(str::to_string).collect());
    }

    let mut labels: Option<Vec<(String, String)>> = None;
    let mut keys: Vec<String> = Vec::with_capacity(requested.len());
    let mut unknown = Vec::new();
    for name in requested {
        let key = if registry.contains(name) {
            Some(name.clone())
        } else {
            // labels need every model's YAML, so only read them when needed
            if labels.is_none() {
                let all = registry
                    .keys()
                    .map(|k| Ok((k.to_string(), registry.label(k)?)))
                    .collect::<Result<Vec<_>>>()?;
                labels = Some(all);
            }
            labels
                .iter()
                .flatten()
                .find(|(_, label)| label == name)
                .map(|(k, _)| k.clone())
        };
        match key {
            Some(key) if !keys.contains(&key) => keys.push(key),
            Some(_) => {}
            None => unknown.push(name.clone()),
        }
    }

    if !unknown.is_empty() {
        return Err(Error::UnknownModels {
            unknown,
            valid: registry.keys().map(str::to_string).collect(),
        });
    }
    Ok(keys)
}

/// Reference table plus one prediction column per requested model, named by
/// the model's label.
///
/// Fails on the first model that cannot be loaded; the error names that
/// model and no partial table is returned.
pub fn load_predictions(
    reference: &Table,
    registry: &ModelRegistry,
    opts: &PredictionOptions,
) -> Result<Table> {
    let models = normalize_models(registry, &opts.models)?;
    if let Some(threshold) = opts.max_error_threshold {
        if threshold.is_nan() || threshold < 0.0 {
            return Err(Error::InvalidThreshold(threshold));
        }
    }

    let mut out = reference.clone();
    if out.index_column().is_none() {
        out.set_index(&opts.id_column)?;
    }

    let bar = if opts.load.show_progress {
        let bar = ProgressBar::new(models.len() as u64);
        let template = "Loading preds {bar:40} {pos}/{len} {msg}";
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style);
        }
        bar
    } else {
        ProgressBar::hidden()
    };
    let file_opts = LoadOptions {
        show_progress: false,
        ..opts.load.clone()
    };

    for key in &models {
        bar.set_message(key.clone());
        join_model(&mut out, registry, key, opts, &file_opts).map_err(|e| e.for_model(key))?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    match &opts.subset {
        Subset::All => Ok(out),
        Subset::UniqueProtos => {
            let keep: Vec<bool> = out
                .column(UNIQ_PROTO)?
                .into_iter()
                .map(|v| v.as_bool() == Some(true))
                .collect();
            out.filter_rows(|i| keep[i])
        }
        Subset::Ids(ids) => out.select_ids(ids),
    }
}

fn join_model(
    out: &mut Table,
    registry: &ModelRegistry,
    key: &str,
    opts: &PredictionOptions,
    file_opts: &LoadOptions,
) -> Result<()> {
    let yaml_path = registry.yaml_path(key)?;
    let pred_file = registry
        .discovery_path(key)?
        .ok_or_else(|| Error::MissingPredFile {
            section: "discovery".to_string(),
            yaml_path: yaml_path.clone(),
        })?;
    let preds = glob_to_table(&pred_file.to_string_lossy(), file_opts)?;

    let pred_col = registry
        .pred_col(key)?
        .ok_or_else(|| Error::MissingPredCol {
            model: key.to_string(),
            yaml_path: yaml_path.clone(),
        })?;
    if !preds.has_column(&pred_col) {
        return Err(Error::PredColNotFound {
            pred_col,
            yaml_path,
            pred_file,
        });
    }

    let label = registry.label(key)?;
    out.left_join_column(&label, &preds, &opts.id_column, &pred_col)?;

    if let Some(threshold) = opts.max_error_threshold {
        let n_bad = mask_outliers(out, &label, &opts.truth_column, threshold)?;
        if n_bad > 0 {
            let n_preds = out.column(&label)?.iter().filter(|v| !v.is_null()).count();
            info!("{n_bad} of {n_preds} unrealistic preds for {key}");
        }
    }
    Ok(())
}

/// Null out cells of `column` whose absolute difference to `truth_column`
/// exceeds `threshold`. Exactly `threshold` is kept, as is anything compared
/// against a missing truth value. Returns the number of cells nulled.
pub fn mask_outliers(
    table: &mut Table,
    column: &str,
    truth_column: &str,
    threshold: f64,
) -> Result<usize> {
    let truth = table.column_f64(truth_column)?;
    let mut n_bad = 0;
    let masked: Vec<Value> = table
        .column(column)?
        .into_iter()
        .zip(truth)
        .map(|(pred, truth)| match (pred.as_f64(), truth) {
            (Some(p), Some(t)) if (p - t).abs() > threshold => {
                n_bad += 1;
                Value::Null
            }
            _ => pred.clone(),
        })
        .collect();
    table.set_column(column, masked)?;
    Ok(n_bad)
}
