use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const WATER_MASS: f64 = 18.010_564_683_7;
pub const AMMONIA_MASS: f64 = 17.026_549_101_2;
pub const PROTON_MASS: f64 = 1.007_276_466_77;
pub const CO_MASS: f64 = 27.994_914_619_6;
pub const HYDROGEN_MASS: f64 = 1.007_825_032_2;

const STANDARD_RESIDUES: [(char, f64); 22] = [
    ('G', 57.021_463_72),
    ('A', 71.037_113_78),
    ('S', 87.032_028_4),
    ('P', 97.052_763_84),
    ('V', 99.068_413_91),
    ('T', 101.047_678_47),
    ('C', 103.009_184_48),
    ('L', 113.084_064),
    ('I', 113.084_064),
    ('N', 114.042_927_44),
    ('D', 115.026_943_03),
    ('Q', 128.058_577_51),
    ('K', 128.094_963_01),
    ('E', 129.042_593_1),
    ('M', 131.040_484_6),
    ('H', 137.058_911_86),
    ('F', 147.068_413_91),
    ('R', 156.101_111_03),
    ('Y', 163.063_328_53),
    ('W', 186.079_312_95),
    ('U', 150.953_633_41),
    ('O', 237.147_726_98),
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChemistryError {
    #[error("Unknown residue '{residue}' at position {position}")]
    UnknownResidue { residue: char, position: usize },
    #[error("Unknown modification '{0}'")]
    UnknownModification(String),
    #[error("Modification '{name}' targets '{expected}' but position {position} holds '{found}'")]
    ResidueMismatch {
        name: String,
        expected: char,
        found: char,
        position: usize,
    },
    #[error("Position {position} is outside a peptide of length {length}")]
    PositionOutOfRange { position: usize, length: usize },
    #[error("Empty peptide sequence")]
    EmptySequence,
}

/// A named mass shift bound to one residue type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub name: Arc<str>,
    pub residue: char,
    pub delta_mass: f64,
}

/// Immutable residue and modification masses for a run.
///
/// Built once from configuration and passed around as `Arc<Catalog>`.
/// Nothing mutates it after construction, so it is freely shared between
/// build workers and resolution threads.
#[derive(Debug, Clone)]
pub struct Catalog {
    residues: [Option<f64>; 26],
    modifications: HashMap<Arc<str>, Modification>,
}

impl Default for Catalog {
    fn default() -> Self {
        let mut residues = [None; 26];
        for (aa, mass) in STANDARD_RESIDUES {
            residues[(aa as u8 - b'A') as usize] = Some(mass);
        }
        Self {
            residues,
            modifications: HashMap::new(),
        }
    }
}

impl Catalog {
    pub fn with_modifications(modifications: impl IntoIterator<Item = Modification>) -> Self {
        Self {
            modifications: modifications
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect(),
            ..Self::default()
        }
    }

    pub fn residue_mass(&self, residue: char) -> Option<f64> {
        if !residue.is_ascii_uppercase() {
            return None;
        }
        self.residues[(residue as u8 - b'A') as usize]
    }

    pub fn modification(&self, name: &str) -> Result<&Modification, ChemistryError> {
        self.modifications
            .get(name)
            .ok_or_else(|| ChemistryError::UnknownModification(name.to_string()))
    }

    pub fn modifications(&self) -> impl Iterator<Item = &Modification> {
        self.modifications.values()
    }

    /// Sum of the residue masses of `sequence`, without water.
    pub fn residue_sum(&self, sequence: &str) -> Result<f64, ChemistryError> {
        sequence
            .chars()
            .enumerate()
            .map(|(position, residue)| {
                self.residue_mass(residue)
                    .ok_or(ChemistryError::UnknownResidue { residue, position })
            })
            .sum()
    }
}
