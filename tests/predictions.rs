use std::cell::Cell;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use flate2::write::GzEncoder;
use flate2::Compression;
use mbd_data::config::{Catalogs, Settings};
use mbd_data::data::{LoadOptions, MockPredictions, E_FORM_DFT};
use mbd_data::files::{CacheResolver, DownloadPolicy, Fetch, Prompter};
use mbd_data::predictions::{load_predictions, load_reference_table, PredictionOptions, Subset};
use mbd_data::Error;

const SUMMARY_URL: &str = "https://figshare.test/wbm-summary";

const SUMMARY_CSV: &str = "\
material_id,formula,e_form_per_atom_wbm,unique_prototype
wbm-1-1,Ac6Ag2Tm2,-0.5,True
wbm-1-2,Ac2Ag4Lu2,0.25,False
wbm-1-3,Ac4Ag2Ir2,1.0,True
wbm-1-4,AgPb4Sm,,True
";

/// Serves the gzipped WBM summary and counts requests; everything else 404s.
#[derive(Clone, Default)]
struct CountingFetch {
    calls: Rc<Cell<usize>>,
}

impl Fetch for CountingFetch {
    fn fetch(&self, url: &str, dest: &Path) -> bool {
        self.calls.set(self.calls.get() + 1);
        if url != SUMMARY_URL {
            return false;
        }
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        let mut enc = GzEncoder::new(File::create(dest).unwrap(), Compression::default());
        enc.write_all(SUMMARY_CSV.as_bytes()).unwrap();
        enc.finish().unwrap();
        true
    }
}

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

fn model_yaml(name: &str, pred_file: &str, pred_col: &str) -> String {
    format!(
        "model_name: {name}
pr_url: https://github.com/janosh/matbench-discovery/pull/0
metrics:
  discovery:
    pred_file: {pred_file}
    pred_col: {pred_col}
  geo_opt: not available
"
    )
}

/// A throwaway checkout with the data-files index, two model YAMLs with
/// prediction files and one model whose pred_col is wrong.
fn checkout(root: &Path) {
    write(
        root,
        "data/data-files.yml",
        &format!(
            "wbm_summary:
  url: {SUMMARY_URL}
  path: wbm/2023-12-13-wbm-summary.csv.gz
  description: WBM summary
"
        ),
    );
    write(
        root,
        "models/mace/mace-mp-0.yml",
        &model_yaml("MACE-MP-0", "models/mace/preds-*.csv", "e_form_per_atom_mace"),
    );
    write(
        root,
        "models/mace/preds-1.csv",
        "material_id,e_form_per_atom_mace\nwbm-1-1,-0.45\nwbm-1-2,9.0\n",
    );
    write(
        root,
        "models/mace/preds-2.csv",
        "material_id,e_form_per_atom_mace\nwbm-1-3,6.5\nwbm-9-9,0.0\n",
    );
    write(
        root,
        "models/chgnet/chgnet.yml",
        &model_yaml("CHGNet", "models/chgnet/preds.json", "e_form_per_atom_chgnet"),
    );
    write(
        root,
        "models/chgnet/preds.json",
        r#"[{"material_id": "wbm-1-2", "e_form_per_atom_chgnet": 0.3},
            {"material_id": "wbm-1-4", "e_form_per_atom_chgnet": 42.0}]"#,
    );
    write(
        root,
        "models/m3gnet/m3gnet.yml",
        &model_yaml("M3GNet", "models/m3gnet/preds.csv", "e_form_per_atom_m3gnet"),
    );
    write(root, "models/m3gnet/preds.csv", "material_id,wrong_col\nwbm-1-1,0.0\n");
}

fn setup() -> (tempfile::TempDir, CountingFetch, Settings, Catalogs) {
    let dir = tempfile::tempdir().unwrap();
    checkout(dir.path());
    let settings = Settings {
        root_dir: dir.path().to_path_buf(),
        cache_dir: dir.path().join("cache"),
        auto_download: true,
        interactive: false,
        test_mode: false,
    };
    let fetch = CountingFetch::default();
    let resolver = Rc::new(CacheResolver::new(
        DownloadPolicy {
            auto_download: true,
            prompter: Prompter::AlwaysNo,
        },
        Box::new(fetch.clone()),
    ));
    let mut catalogs = settings.catalogs_with(Rc::clone(&resolver));
    catalogs.models = mbd_data::files::ModelRegistry::with_models(
        settings.models_dir(),
        &settings.root_dir,
        &[
            ("mace_mp_0", "mace/mace-mp-0.yml"),
            ("chgnet", "chgnet/chgnet.yml"),
            ("m3gnet", "m3gnet/m3gnet.yml"),
        ],
        resolver,
    );
    (dir, fetch, settings, catalogs)
}

fn opts(models: &[&str]) -> PredictionOptions {
    PredictionOptions {
        models: models.iter().map(|m| m.to_string()).collect(),
        load: LoadOptions {
            show_progress: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_reference_table_is_downloaded_once() {
    let (dir, fetch, _settings, catalogs) = setup();
    let reference = load_reference_table(&catalogs.datasets).unwrap();
    assert_eq!(reference.len(), 4);
    assert_eq!(reference.row_for_id("wbm-1-3"), Some(2));
    assert!(dir
        .path()
        .join("cache/wbm/2023-12-13-wbm-summary.csv.gz")
        .is_file());

    load_reference_table(&catalogs.datasets).unwrap();
    assert_eq!(fetch.calls.get(), 1);
}

#[test]
fn test_joins_and_filters_predictions() {
    let (_dir, _fetch, _settings, catalogs) = setup();
    let reference = load_reference_table(&catalogs.datasets).unwrap();

    // keys and labels are both accepted
    let table = load_predictions(&reference, &catalogs.models, &opts(&["mace_mp_0", "CHGNet"]))
        .unwrap();

    assert_eq!(table.len(), reference.len());
    // the shared reference is untouched
    assert!(!reference.has_column("MACE-MP-0"));
    assert_eq!(
        table.column_f64("MACE-MP-0").unwrap(),
        // 9.0 and 6.5 are more than 5 eV/atom off, wbm-1-4 has no prediction
        vec![Some(-0.45), None, None, None]
    );
    assert_eq!(
        table.column_f64("CHGNet").unwrap(),
        // no ground truth for wbm-1-4, so the outlier survives
        vec![None, Some(0.3), None, Some(42.0)]
    );
}

#[test]
fn test_threshold_can_be_disabled_but_not_negative() {
    let (_dir, _fetch, _settings, catalogs) = setup();
    let reference = load_reference_table(&catalogs.datasets).unwrap();

    let mut o = opts(&["mace_mp_0"]);
    o.max_error_threshold = None;
    let table = load_predictions(&reference, &catalogs.models, &o).unwrap();
    assert_eq!(
        table.column_f64("MACE-MP-0").unwrap(),
        vec![Some(-0.45), Some(9.0), Some(6.5), None]
    );

    o.max_error_threshold = Some(-1.0);
    assert!(matches!(
        load_predictions(&reference, &catalogs.models, &o),
        Err(Error::InvalidThreshold(_))
    ));
}

#[test]
fn test_unknown_model_lists_valid_models() {
    let (_dir, _fetch, _settings, catalogs) = setup();
    let reference = load_reference_table(&catalogs.datasets).unwrap();
    let err = load_predictions(&reference, &catalogs.models, &opts(&["not_a_model"])).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("not_a_model"), "{msg}");
    for key in ["mace_mp_0", "chgnet", "m3gnet"] {
        assert!(msg.contains(key), "{msg}");
    }
}

#[test]
fn test_failing_model_aborts_with_its_name() {
    let (_dir, _fetch, _settings, catalogs) = setup();
    let reference = load_reference_table(&catalogs.datasets).unwrap();
    let err = load_predictions(&reference, &catalogs.models, &opts(&["m3gnet", "mace_mp_0"]))
        .unwrap_err();
    match &err {
        Error::Model { model, source } => {
            assert_eq!(model, "m3gnet");
            assert!(matches!(**source, Error::PredColNotFound { .. }));
        }
        other => panic!("expected Model error, got {other:?}"),
    }
    assert!(err.to_string().contains("m3gnet"));
}

#[test]
fn test_subsets() {
    let (_dir, _fetch, _settings, catalogs) = setup();
    let reference = load_reference_table(&catalogs.datasets).unwrap();

    let mut o = opts(&["chgnet"]);
    o.subset = Subset::UniqueProtos;
    let uniq = load_predictions(&reference, &catalogs.models, &o).unwrap();
    assert_eq!(uniq.len(), 3);
    assert!(uniq.len() <= reference.len());
    assert_eq!(uniq.row_for_id("wbm-1-2"), None);

    o.subset = Subset::Ids(vec!["wbm-1-2".into()]);
    let one = load_predictions(&reference, &catalogs.models, &o).unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one.column_f64("CHGNet").unwrap(), vec![Some(0.3)]);
}

#[test]
fn test_mock_fallback_when_prediction_files_are_missing() {
    let (dir, _fetch, _settings, catalogs) = setup();
    for rel in ["models/mace/preds-1.csv", "models/mace/preds-2.csv", "models/chgnet/preds.json"] {
        std::fs::remove_file(dir.path().join(rel)).unwrap();
    }
    let reference = load_reference_table(&catalogs.datasets).unwrap();

    let err = load_predictions(&reference, &catalogs.models, &opts(&["chgnet"])).unwrap_err();
    assert!(err.to_string().contains("No files matching"), "{err}");

    let mock = MockPredictions::new(
        reference.clone(),
        ["e_form_per_atom_mace", "e_form_per_atom_chgnet"],
        E_FORM_DFT,
    )
    .unwrap();
    let mut o = opts(&["mace_mp_0", "chgnet"]);
    o.load.fallback = Some(Rc::new(mock));
    let table = load_predictions(&reference, &catalogs.models, &o).unwrap();
    let truth = table.column_f64(E_FORM_DFT).unwrap();
    assert_eq!(table.column_f64("MACE-MP-0").unwrap(), truth);
    assert_eq!(table.column_f64("CHGNet").unwrap(), truth);
}

#[test]
fn test_test_mode_settings_fill_in_missing_predictions() {
    let (dir, _fetch, mut settings, catalogs) = setup();
    for rel in ["models/mace/preds-1.csv", "models/mace/preds-2.csv"] {
        std::fs::remove_file(dir.path().join(rel)).unwrap();
    }
    let reference = load_reference_table(&catalogs.datasets).unwrap();

    settings.test_mode = true;
    let mut o = opts(&["mace_mp_0", "chgnet"]);
    o.load = LoadOptions {
        show_progress: false,
        ..settings.load_options(&catalogs.models).unwrap()
    };
    let table = load_predictions(&reference, &catalogs.models, &o).unwrap();

    // the bundled sample shares ids with the reference, its DFT energies
    // stand in for the missing MACE predictions
    assert_eq!(
        table.column_f64("MACE-MP-0").unwrap(),
        vec![Some(-0.1358), Some(-0.0723), Some(-0.3151), Some(0.0415)]
    );
    // real prediction files still win over the mock
    assert_eq!(
        table.column_f64("CHGNet").unwrap(),
        vec![None, Some(0.3), None, Some(42.0)]
    );
}

#[test]
fn test_broken_model_yaml_is_not_reported_as_unknown() {
    let (dir, _fetch, _settings, catalogs) = setup();
    std::fs::write(dir.path().join("models/m3gnet/m3gnet.yml"), "just a string").unwrap();
    let reference = load_reference_table(&catalogs.datasets).unwrap();

    // resolving a label reads every model's YAML
    let err = load_predictions(&reference, &catalogs.models, &opts(&["CHGNet"])).unwrap_err();
    assert!(matches!(err, Error::MalformedMetadata { .. }), "{err}");

    // keys do not need labels
    load_predictions(&reference, &catalogs.models, &opts(&["chgnet"])).unwrap();
}

#[test]
fn test_label_round_trip_for_all_models() {
    let (_dir, _fetch, _settings, catalogs) = setup();
    for entry in catalogs.models.catalog().entries() {
        let label = catalogs.models.label(entry.key()).unwrap();
        let found = catalogs.models.from_label(&label).unwrap();
        assert!(std::ptr::eq(found, entry));
    }
}
