use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::warn;

use mbd_data::config::{Catalogs, Settings};
use mbd_data::predictions::{
    load_predictions, load_reference_table, PredictionOptions, Subset, DEFAULT_MAX_ERROR,
};

#[derive(Parser)]
#[command(
    name = "mbd-data",
    version,
    about = "Matbench Discovery data files and model predictions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Which {
    Datasets,
    Models,
}

#[derive(Subcommand)]
enum Command {
    /// List catalog entries and whether they are cached locally.
    List {
        #[arg(value_enum, default_value_t = Which::Datasets)]
        which: Which,
    },
    /// Print the local path of a data file key or a model's discovery
    /// predictions (by key or label), downloading it first if needed.
    Path { name: String },
    /// Join model predictions onto the WBM summary table.
    Preds {
        /// Model key or label (repeatable). Defaults to all models.
        #[arg(long = "model")]
        models: Vec<String>,

        /// Maximum absolute error (eV/atom) before a prediction is dropped.
        #[arg(long, default_value_t = DEFAULT_MAX_ERROR, conflicts_with = "no_threshold")]
        threshold: f64,

        /// Keep all predictions regardless of error.
        #[arg(long)]
        no_threshold: bool,

        /// Restrict to the unique-prototype subset of WBM.
        #[arg(long)]
        uniq_protos: bool,

        /// Id column in the prediction files.
        #[arg(long, default_value = mbd_data::data::MAT_ID)]
        id_col: String,

        /// Write the joined table to this CSV file.
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[arg(long)]
        no_progress: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    let catalogs = settings.catalogs();

    match cli.command {
        Command::List { which } => list(&catalogs, which),
        Command::Path { name } => {
            let path = resolve(&catalogs, &name)?;
            if !path.is_file() {
                warn!("{} is not available locally", path.display());
            }
            println!("{}", path.display());
            Ok(())
        }
        Command::Preds {
            models,
            threshold,
            no_threshold,
            uniq_protos,
            id_col,
            out,
            no_progress,
        } => {
            let mut load = settings.load_options(&catalogs.models)?;
            load.show_progress = !no_progress;
            let opts = PredictionOptions {
                models,
                id_column: id_col,
                subset: if uniq_protos { Subset::UniqueProtos } else { Subset::All },
                max_error_threshold: (!no_threshold).then_some(threshold),
                load,
                ..Default::default()
            };

            let reference =
                load_reference_table(&catalogs.datasets).context("loading WBM summary")?;
            let n_ref_cols = reference.column_names().len();
            let table = load_predictions(&reference, &catalogs.models, &opts)?;

            println!("{} rows", table.len());
            for col in &table.column_names()[n_ref_cols..] {
                let n_preds = table.column(col)?.iter().filter(|v| !v.is_null()).count();
                println!("{col:>30}: {n_preds} predictions");
            }
            if let Some(out) = out {
                table
                    .write_csv(&out)
                    .with_context(|| format!("writing {}", out.display()))?;
                println!("wrote {}", out.display());
            }
            Ok(())
        }
    }
}

fn list(catalogs: &Catalogs, which: Which) -> Result<()> {
    match which {
        Which::Datasets => {
            let datasets = &catalogs.datasets;
            for key in datasets.keys() {
                let cached = datasets.abs_path(key)?.is_file();
                let description = datasets.description(key).unwrap_or_default();
                println!("{} {key:<32} {description}", if cached { "✓" } else { " " });
            }
        }
        Which::Models => {
            let models = &catalogs.models;
            for key in models.keys() {
                match models.label(key) {
                    Ok(label) => println!("{key:<20} {label}"),
                    Err(err) => println!("{key:<20} <{err}>"),
                }
            }
        }
    }
    Ok(())
}

/// Data file key first, then model key, then model label.
fn resolve(catalogs: &Catalogs, name: &str) -> Result<PathBuf> {
    if catalogs.datasets.contains(name) {
        return Ok(catalogs.datasets.resolve_path(name)?);
    }
    let key = if catalogs.models.contains(name) {
        name.to_string()
    } else {
        catalogs.models.from_label(name)?.key().to_string()
    };
    catalogs
        .models
        .discovery_path(&key)?
        .with_context(|| format!("{key} has no discovery predictions"))
}
