//! Data files hosted on Figshare, cached under the data directory.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use super::catalog::{FileCatalog, MetadataStrategy};
use super::resolve::CacheResolver;

/// Every data file the benchmark knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFile {
    MpComputedStructureEntries,
    MpElementalRefEntries,
    MpEnergies,
    MpPatchedPhaseDiagram,
    MpTrjJsonGz,
    MpTrjExtxyz,
    /// Snapshot of every task (calculation) in MP as of 2023-03-16 (14 GB).
    AllMpTasks,
    WbmComputedStructureEntries,
    WbmRelaxedAtoms,
    WbmInitialStructures,
    WbmInitialAtoms,
    WbmCsesPlusInitStructs,
    WbmSummary,
    AlignnCheckpoint,
    PhononDbPbe103Structures,
    PhononDbPbe103KappaNoNac,
    WbmDftGeoOptSymprec1e2,
    WbmDftGeoOptSymprec1e5,
}

impl DataFile {
    pub const ALL: [DataFile; 18] = [
        DataFile::MpComputedStructureEntries,
        DataFile::MpElementalRefEntries,
        DataFile::MpEnergies,
        DataFile::MpPatchedPhaseDiagram,
        DataFile::MpTrjJsonGz,
        DataFile::MpTrjExtxyz,
        DataFile::AllMpTasks,
        DataFile::WbmComputedStructureEntries,
        DataFile::WbmRelaxedAtoms,
        DataFile::WbmInitialStructures,
        DataFile::WbmInitialAtoms,
        DataFile::WbmCsesPlusInitStructs,
        DataFile::WbmSummary,
        DataFile::AlignnCheckpoint,
        DataFile::PhononDbPbe103Structures,
        DataFile::PhononDbPbe103KappaNoNac,
        DataFile::WbmDftGeoOptSymprec1e2,
        DataFile::WbmDftGeoOptSymprec1e5,
    ];

    /// Key of this file in `data-files.yml`.
    pub fn key(self) -> &'static str {
        match self {
            DataFile::MpComputedStructureEntries => "mp_computed_structure_entries",
            DataFile::MpElementalRefEntries => "mp_elemental_ref_entries",
            DataFile::MpEnergies => "mp_energies",
            DataFile::MpPatchedPhaseDiagram => "mp_patched_phase_diagram",
            DataFile::MpTrjJsonGz => "mp_trj_json_gz",
            DataFile::MpTrjExtxyz => "mp_trj_extxyz",
            DataFile::AllMpTasks => "all_mp_tasks",
            DataFile::WbmComputedStructureEntries => "wbm_computed_structure_entries",
            DataFile::WbmRelaxedAtoms => "wbm_relaxed_atoms",
            DataFile::WbmInitialStructures => "wbm_initial_structures",
            DataFile::WbmInitialAtoms => "wbm_initial_atoms",
            DataFile::WbmCsesPlusInitStructs => "wbm_cses_plus_init_structs",
            DataFile::WbmSummary => "wbm_summary",
            DataFile::AlignnCheckpoint => "alignn_checkpoint",
            DataFile::PhononDbPbe103Structures => "phonondb_pbe_103_structures",
            DataFile::PhononDbPbe103KappaNoNac => "phonondb_pbe_103_kappa_no_nac",
            DataFile::WbmDftGeoOptSymprec1e2 => "wbm_dft_geo_opt_symprec_1e_2",
            DataFile::WbmDftGeoOptSymprec1e5 => "wbm_dft_geo_opt_symprec_1e_5",
        }
    }

    /// Path relative to the cache directory.
    pub fn rel_path(self) -> &'static str {
        match self {
            DataFile::MpComputedStructureEntries => {
                "mp/2023-02-07-mp-computed-structure-entries.json.gz"
            }
            DataFile::MpElementalRefEntries => {
                "mp/2023-02-07-mp-elemental-reference-entries.json.gz"
            }
            DataFile::MpEnergies => "mp/2023-01-10-mp-energies.csv.gz",
            DataFile::MpPatchedPhaseDiagram => "mp/2023-02-07-ppd-mp.pkl.gz",
            DataFile::MpTrjJsonGz => "mp/2022-09-16-mp-trj.json.gz",
            DataFile::MpTrjExtxyz => "mp/2024-09-03-mp-trj.extxyz.zip",
            DataFile::AllMpTasks => "mp/2023-03-16-all-mp-tasks.zip",
            DataFile::WbmComputedStructureEntries => {
                "wbm/2022-10-19-wbm-computed-structure-entries.json.bz2"
            }
            DataFile::WbmRelaxedAtoms => "wbm/2024-08-04-wbm-relaxed-atoms.extxyz.zip",
            DataFile::WbmInitialStructures => "wbm/2022-10-19-wbm-init-structs.json.bz2",
            DataFile::WbmInitialAtoms => "wbm/2024-08-04-wbm-initial-atoms.extxyz.zip",
            DataFile::WbmCsesPlusInitStructs => {
                "wbm/2022-10-19-wbm-computed-structure-entries+init-structs.json.bz2"
            }
            DataFile::WbmSummary => "wbm/2023-12-13-wbm-summary.csv.gz",
            DataFile::AlignnCheckpoint => "2023-06-02-pbenner-best-alignn-model.pth.zip",
            DataFile::PhononDbPbe103Structures => {
                "phonons/2024-11-09-phononDB-PBE-103-structures.extxyz"
            }
            DataFile::PhononDbPbe103KappaNoNac => {
                "phonons/2024-11-09-kappas-phononDB-PBE-noNAC.json.gz"
            }
            DataFile::WbmDftGeoOptSymprec1e2 => {
                "data/wbm/dft-geo-opt-symprec=1e-2-moyo=0.3.1.csv.gz"
            }
            DataFile::WbmDftGeoOptSymprec1e5 => {
                "data/wbm/dft-geo-opt-symprec=1e-5-moyo=0.3.1.csv.gz"
            }
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Catalog of all [`DataFile`]s, cached under `cache_dir` and described by
/// the shared `data-files.yml` at `metadata_file`.
pub fn dataset_catalog(
    cache_dir: impl Into<PathBuf>,
    metadata_file: impl Into<PathBuf>,
    resolver: Rc<CacheResolver>,
) -> FileCatalog {
    let decls: Vec<(&str, &str)> = DataFile::ALL
        .iter()
        .map(|f| (f.key(), f.rel_path()))
        .collect();
    FileCatalog::new(
        "DataFiles",
        cache_dir,
        MetadataStrategy::Shared(metadata_file.into()),
        &decls,
        resolver,
    )
}
