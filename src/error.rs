use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving catalog entries, loading tables and
/// aggregating model predictions.
///
/// Network failures have no variant: the downloader logs and swallows
/// them, and a missing file surfaces later when something tries to read it.
#[derive(Debug, Error)]
pub enum Error {
    // -- configuration --
    #[error(
        "rel_path={rel_path:?} does not match {recorded:?} recorded for {key:?} in {}",
        .metadata_file.display()
    )]
    PathMismatch {
        key: String,
        rel_path: String,
        recorded: String,
        metadata_file: PathBuf,
    },

    #[error("{key:?} not found in {}", .metadata_file.display())]
    MissingEntry { key: String, metadata_file: PathBuf },

    #[error("{} does not contain valid YAML metadata", .metadata_file.display())]
    MalformedMetadata { metadata_file: PathBuf },

    #[error("{key:?} has no {field:?} in {}", .metadata_file.display())]
    MissingField {
        key: String,
        field: String,
        metadata_file: PathBuf,
    },

    #[error("{key:?} does not have a URL")]
    MissingUrl { key: String },

    #[error("metrics.{section}.pred_file not found in {}", .yaml_path.display())]
    MissingPredFile { section: String, yaml_path: PathBuf },

    #[error("pred_col not specified for {model} in {}", .yaml_path.display())]
    MissingPredCol { model: String, yaml_path: PathBuf },

    #[error("unknown_models={unknown:?}, expected subset of {valid:?}")]
    UnknownModels { unknown: Vec<String>, valid: Vec<String> },

    #[error("max_error_threshold must be a non-negative number, got {0}")]
    InvalidThreshold(f64),

    // -- data --
    #[error(
        "pred_col={pred_col:?} set in {}:metrics.discovery.pred_col not found in {}",
        .yaml_path.display(),
        .pred_file.display()
    )]
    PredColNotFound {
        pred_col: String,
        yaml_path: PathBuf,
        pred_file: PathBuf,
    },

    #[error("No files matching glob pattern={0:?}")]
    NoFilesMatched(String),

    #[error("Unsupported file extension in pattern={0:?}, pass an explicit reader")]
    NoReader(String),

    #[error("column {column:?} not found (available: {available:?})")]
    MissingColumn { column: String, available: Vec<String> },

    #[error("column {column:?} needs {expected} values, got {got}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("table has no index, call set_index first")]
    NoIndex,

    #[error("{} ids not found in index, e.g. {:?}", .0.len(), .0.first())]
    UnknownIds(Vec<String>),

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid glob pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    // -- lookup --
    #[error("label={label:?} not found in {catalog}. Did you mean one of {suggestions:?}?")]
    LabelNotFound {
        label: String,
        catalog: String,
        suggestions: Vec<String>,
    },

    // -- aggregation --
    #[error("Failed to load model_name={model:?}: {source}")]
    Model {
        model: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Attach the model being processed when this error occurred.
    pub(crate) fn for_model(self, model: &str) -> Self {
        Error::Model {
            model: model.to_string(),
            source: Box::new(self),
        }
    }
}
