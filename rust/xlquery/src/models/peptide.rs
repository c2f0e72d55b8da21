use super::chemistry::{
    Catalog,
    ChemistryError,
    Modification,
    WATER_MASS,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

/// Position of a peptide in the global peptide table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeptideId(pub u32);

impl PeptideId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for PeptideId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a peptide occurs in a parent sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOrigin {
    pub protein: Arc<str>,
    pub offset: usize,
    pub protein_length: usize,
}

impl SequenceOrigin {
    pub fn is_protein_n_term(&self) -> bool {
        self.offset == 0
    }

    pub fn is_protein_c_term(&self, peptide_length: usize) -> bool {
        self.offset + peptide_length >= self.protein_length
    }
}

/// A peptide with its modifications and monoisotopic neutral mass.
///
/// Identity is the [`PeptideId`] assigned when the peptide is placed in a
/// [`crate::PeptideTable`]. Before that the id is `PeptideId(0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Peptide {
    pub(crate) id: PeptideId,
    sequence: Arc<str>,
    origins: Vec<SequenceOrigin>,
    modifications: BTreeMap<usize, Modification>,
    mass: f64,
}

impl Peptide {
    pub fn try_new(sequence: &str, catalog: &Catalog) -> Result<Self, ChemistryError> {
        if sequence.is_empty() {
            return Err(ChemistryError::EmptySequence);
        }
        let mass = catalog.residue_sum(sequence)? + WATER_MASS;
        Ok(Self {
            id: PeptideId(0),
            sequence: sequence.into(),
            origins: Vec::new(),
            modifications: BTreeMap::new(),
            mass,
        })
    }

    pub fn with_origin(mut self, origin: SequenceOrigin) -> Self {
        self.origins.push(origin);
        self
    }

    /// Copy of the peptide carrying `modification` at `position`.
    ///
    /// Replaces any modification already at that position and recomputes the mass.
    pub fn with_modification(
        &self,
        position: usize,
        modification: Modification,
    ) -> Result<Self, ChemistryError> {
        let found = self.residue_at(position).ok_or(ChemistryError::PositionOutOfRange {
            position,
            length: self.len(),
        })?;
        if found != modification.residue {
            return Err(ChemistryError::ResidueMismatch {
                name: modification.name.to_string(),
                expected: modification.residue,
                found,
                position,
            });
        }
        let mut out = self.clone();
        let replaced = out.modifications.insert(position, modification);
        if let Some(old) = replaced {
            out.mass -= old.delta_mass;
        }
        out.mass += out.modifications[&position].delta_mass;
        Ok(out)
    }

    pub fn id(&self) -> PeptideId {
        self.id
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn residue_at(&self, position: usize) -> Option<char> {
        self.sequence.as_bytes().get(position).map(|x| *x as char)
    }

    pub fn modification_at(&self, position: usize) -> Option<&Modification> {
        self.modifications.get(&position)
    }

    pub fn modifications(&self) -> &BTreeMap<usize, Modification> {
        &self.modifications
    }

    pub fn origins(&self) -> &[SequenceOrigin] {
        &self.origins
    }

    pub fn is_protein_n_term(&self) -> bool {
        self.origins.iter().any(|o| o.is_protein_n_term())
    }

    pub fn is_protein_c_term(&self) -> bool {
        self.origins.iter().any(|o| o.is_protein_c_term(self.len()))
    }

    /// Mass of the residues in `start..=end`, modifications included, without water.
    pub fn residue_mass_range(
        &self,
        start: usize,
        end: usize,
        catalog: &Catalog,
    ) -> Result<f64, ChemistryError> {
        if end >= self.len() || start > end {
            return Err(ChemistryError::PositionOutOfRange {
                position: end,
                length: self.len(),
            });
        }
        let base = catalog
            .residue_sum(&self.sequence[start..=end])
            .map_err(|e| match e {
                ChemistryError::UnknownResidue { residue, position } => {
                    ChemistryError::UnknownResidue {
                        residue,
                        position: position + start,
                    }
                }
                other => other,
            })?;
        let mods: f64 = self
            .modifications
            .range(start..=end)
            .map(|(_, m)| m.delta_mass)
            .sum();
        Ok(base + mods)
    }

    /// Sequence with modification names in brackets, e.g. `PEPM[ox]IDEK`.
    pub fn descriptor(&self) -> String {
        let mut out = String::with_capacity(self.len() + 4 * self.modifications.len());
        for (i, aa) in self.sequence.chars().enumerate() {
            out.push(aa);
            if let Some(m) = self.modifications.get(&i) {
                out.push('[');
                out.push_str(&m.name);
                out.push(']');
            }
        }
        out
    }
}

impl Display for Peptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oxidation() -> Modification {
        Modification {
            name: "ox".into(),
            residue: 'M',
            delta_mass: 15.994_915,
        }
    }

    #[test]
    fn test_mass_includes_water() {
        let catalog = Catalog::default();
        let pep = Peptide::try_new("GG", &catalog).unwrap();
        assert!((pep.mass() - (114.042_927_44 + WATER_MASS)).abs() < 1e-6);
        assert_eq!(pep.len(), 2);
    }

    #[test]
    fn test_with_modification() {
        let catalog = Catalog::default();
        let pep = Peptide::try_new("PEPMK", &catalog).unwrap();
        let modded = pep.with_modification(3, oxidation()).unwrap();
        assert!((modded.mass() - pep.mass() - 15.994_915).abs() < 1e-9);
        assert_eq!(modded.descriptor(), "PEPM[ox]K");

        // Re-applying replaces instead of stacking
        let again = modded.with_modification(3, oxidation()).unwrap();
        assert!((again.mass() - modded.mass()).abs() < 1e-9);

        assert!(matches!(
            pep.with_modification(0, oxidation()),
            Err(ChemistryError::ResidueMismatch { .. })
        ));
        assert!(matches!(
            pep.with_modification(9, oxidation()),
            Err(ChemistryError::PositionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_residue_mass_range() {
        let catalog = Catalog::default();
        let pep = Peptide::try_new("PEPMK", &catalog)
            .unwrap()
            .with_modification(3, oxidation())
            .unwrap();
        let full = pep.residue_mass_range(0, 4, &catalog).unwrap();
        assert!((full + WATER_MASS - pep.mass()).abs() < 1e-9);
        let tail = pep.residue_mass_range(3, 4, &catalog).unwrap();
        let expected = 131.040_484_6 + 15.994_915 + 128.094_963_01;
        assert!((tail - expected).abs() < 1e-9);
    }

    #[test]
    fn test_protein_termini() {
        let catalog = Catalog::default();
        let pep = Peptide::try_new("KLINKER", &catalog)
            .unwrap()
            .with_origin(SequenceOrigin {
                protein: "P1".into(),
                offset: 0,
                protein_length: 30,
            });
        assert!(pep.is_protein_n_term());
        assert!(!pep.is_protein_c_term());
    }
}
