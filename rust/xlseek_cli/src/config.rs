use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;
use xlquery::fragmentation::FragmentationConfig;
use xlquery::{
    BuildOptions,
    Modification,
    ToleranceUnit,
};
use xlseek::{
    CandidateOptions,
    CrossLinker,
    OpenModificationLinker,
    ResidueRestrictedCrossLinker,
    ResolutionMode,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input: Option<InputConfig>,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub fragmentation: FragmentationConfig,
    #[serde(default)]
    pub crosslinker: CrossLinkerConfig,
    #[serde(default)]
    pub modifications: ModificationConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputConfig {
    #[serde(rename = "json")]
    Json {
        peptides: PathBuf,
        spectra: Option<PathBuf>,
        /// Peptide pairs to localise, one record per spectrum.
        matches: Option<PathBuf>,
    },
}

impl InputConfig {
    pub fn peptides(&self) -> &PathBuf {
        match self {
            InputConfig::Json { peptides, .. } => peptides,
        }
    }

    pub fn spectra(&self) -> Option<&PathBuf> {
        match self {
            InputConfig::Json { spectra, .. } => spectra.as_ref(),
        }
    }

    pub fn matches(&self) -> Option<&PathBuf> {
        match self {
            InputConfig::Json { matches, .. } => matches.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IndexStorage {
    #[serde(rename = "memory")]
    InMemory,
    #[serde(rename = "disk")]
    Disk {
        /// SQLite file, in memory when absent.
        path: Option<PathBuf>,
        lookahead: Option<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub storage: IndexStorage,
    pub tolerance: ToleranceUnit,
    pub build: BuildOptions,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            storage: IndexStorage::InMemory,
            tolerance: ToleranceUnit::Ppm(10.0),
            build: BuildOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CrossLinkerConfig {
    #[serde(rename = "residues")]
    ResidueRestricted(ResidueRestrictedCrossLinker),
    #[serde(rename = "open")]
    OpenModification(OpenModificationLinker),
}

impl Default for CrossLinkerConfig {
    fn default() -> Self {
        CrossLinkerConfig::ResidueRestricted(ResidueRestrictedCrossLinker::bs3())
    }
}

impl CrossLinkerConfig {
    pub fn linker(&self) -> &dyn CrossLinker {
        match self {
            CrossLinkerConfig::ResidueRestricted(x) => x,
            CrossLinkerConfig::OpenModification(x) => x,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModificationConfig {
    /// Applied to every matching residue.
    pub fixed: Vec<Modification>,
    pub variable: Vec<Modification>,
    pub max_per_peptide: usize,
    /// Upper bound on variants emitted per peptide, the unmodified one included.
    pub max_variants: usize,
}

impl Default for ModificationConfig {
    fn default() -> Self {
        Self {
            fixed: Vec::new(),
            variable: Vec::new(),
            max_per_peptide: 2,
            max_variants: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub fragment_tolerance: ToleranceUnit,
    pub candidates: CandidateOptions,
    pub mode: ResolutionMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fragment_tolerance: ToleranceUnit::Ppm(20.0),
            candidates: CandidateOptions::default(),
            mode: ResolutionMode::Plain,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Write a `mass: peptides` listing of the index next to the results.
    #[serde(default)]
    pub dump_index: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let conf: Config = serde_json::from_str(
            r#"{
                "input": {"type": "json", "peptides": "peptides.json"},
                "output": {"directory": "out"}
            }"#,
        )
        .unwrap();
        let input = conf.input.unwrap();
        assert_eq!(input.peptides(), &PathBuf::from("peptides.json"));
        assert!(input.spectra().is_none());
        assert!(matches!(conf.index.storage, IndexStorage::InMemory));
        assert_eq!(conf.crosslinker.linker().name(), "BS3");
        assert_eq!(conf.search.mode, ResolutionMode::Plain);
        assert!(!conf.output.unwrap().dump_index);
    }

    #[test]
    fn test_full_config() {
        let conf: Config = serde_json::from_str(
            r#"{
                "input": {
                    "type": "json",
                    "peptides": "p.json",
                    "spectra": "s.json",
                    "matches": "m.json"
                },
                "index": {
                    "storage": {"type": "disk", "path": "idx.sqlite", "lookahead": 50.0},
                    "tolerance": {"da": 0.02},
                    "build": {"shard_count": 3, "candidate_cap": 500}
                },
                "fragmentation": {"generators": ["b-ions", "y-ions", "precursor"]},
                "crosslinker": {
                    "type": "residues",
                    "name": "DSSO",
                    "mass": 158.0038,
                    "residues": {"K": 0.0, "S": 0.3}
                },
                "modifications": {
                    "variable": [{"name": "ox", "residue": "M", "delta_mass": 15.994915}],
                    "max_per_peptide": 1
                },
                "search": {
                    "fragment_tolerance": {"ppm": 15.0},
                    "candidates": {"max_results": 5},
                    "mode": "Weighted"
                },
                "output": {"directory": "out", "dump_index": true}
            }"#,
        )
        .unwrap();
        match conf.index.storage {
            IndexStorage::Disk { path, lookahead } => {
                assert_eq!(path, Some(PathBuf::from("idx.sqlite")));
                assert_eq!(lookahead, Some(50.0));
            }
            other => panic!("unexpected storage {:?}", other),
        }
        assert_eq!(conf.index.tolerance, ToleranceUnit::Absolute(0.02));
        assert_eq!(conf.index.build.shard_count, 3);
        assert_eq!(conf.index.build.candidate_cap, Some(500));
        assert_eq!(conf.fragmentation.max_loss_count, 2);
        let linker = conf.crosslinker.linker();
        assert_eq!(linker.name(), "DSSO");
        assert!(!linker.is_open_modification());
        assert_eq!(conf.modifications.variable.len(), 1);
        assert_eq!(conf.modifications.max_variants, 64);
        assert_eq!(conf.search.candidates.max_results, 5);
        assert_eq!(conf.search.candidates.max_candidates_per_peak, Some(100));
        assert_eq!(conf.search.mode, ResolutionMode::Weighted);
    }

    #[test]
    fn test_open_linker() {
        let conf: CrossLinkerConfig =
            serde_json::from_str(r#"{"type": "open", "name": "open", "mass": 100.0}"#).unwrap();
        assert!(conf.linker().is_open_modification());
    }

    #[test]
    fn test_missing_input_type_is_rejected() {
        let conf: Result<Config, _> =
            serde_json::from_str(r#"{"input": {"peptides": "p.json"}}"#);
        assert!(conf.is_err());
    }
}
