//! Crosslinker chemistry: which residues a reagent can bind and how much it weighs.

use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use xlquery::{
    Peptide,
    PeptideSpan,
};

pub trait CrossLinker: Send + Sync {
    fn name(&self) -> &str;

    /// Mass added when the reagent bridges two residues.
    fn mass(&self) -> f64;

    fn can_link(&self, peptide: &Peptide, position: usize) -> bool;

    fn can_link_pair(
        &self,
        peptide1: &Peptide,
        position1: usize,
        peptide2: &Peptide,
        position2: usize,
    ) -> bool {
        self.can_link(peptide1, position1) && self.can_link(peptide2, position2)
    }

    /// Site preference penalty, lower is more likely.
    fn weight(&self, _peptide: &Peptide, _position: usize) -> f64 {
        0.0
    }

    /// Open modification searches accept any residue.
    fn is_open_modification(&self) -> bool {
        false
    }

    /// True if some residue inside `span` of `peptide` can carry the link.
    fn can_link_span(&self, peptide: &Peptide, span: &PeptideSpan) -> bool {
        (span.start..=span.end).any(|pos| self.can_link(peptide, pos))
    }
}

/// A symmetric crosslinker that binds a fixed set of residues on both ends.
///
/// Each residue carries a weight used by the confidence resolver; the
/// conventional choice gives lysine 0 and the side reactions a positive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueRestrictedCrossLinker {
    pub name: String,
    pub mass: f64,
    pub residues: BTreeMap<char, f64>,
    #[serde(default)]
    pub protein_n_term: bool,
    #[serde(default)]
    pub protein_c_term: bool,
    /// Weight of a link on a protein terminus.
    #[serde(default)]
    pub terminal_weight: f64,
}

impl ResidueRestrictedCrossLinker {
    pub fn new(name: impl Into<String>, mass: f64, residues: &[(char, f64)]) -> Self {
        Self {
            name: name.into(),
            mass,
            residues: residues.iter().copied().collect(),
            protein_n_term: false,
            protein_c_term: false,
            terminal_weight: 0.0,
        }
    }

    /// BS3 / DSS style amine reactive linker: K and protein N-terminus,
    /// with S, T and Y as weaker side reactions.
    pub fn bs3() -> Self {
        Self {
            protein_n_term: true,
            ..Self::new(
                "BS3",
                138.068_079_6,
                &[('K', 0.0), ('S', 0.2), ('T', 0.2), ('Y', 0.2)],
            )
        }
    }

    fn is_terminal_site(&self, peptide: &Peptide, position: usize) -> bool {
        (self.protein_n_term && position == 0 && peptide.is_protein_n_term())
            || (self.protein_c_term && position + 1 == peptide.len() && peptide.is_protein_c_term())
    }
}

impl CrossLinker for ResidueRestrictedCrossLinker {
    fn name(&self) -> &str {
        &self.name
    }

    fn mass(&self) -> f64 {
        self.mass
    }

    fn can_link(&self, peptide: &Peptide, position: usize) -> bool {
        match peptide.residue_at(position) {
            None => false,
            Some(aa) => self.residues.contains_key(&aa) || self.is_terminal_site(peptide, position),
        }
    }

    fn weight(&self, peptide: &Peptide, position: usize) -> f64 {
        let residue = peptide
            .residue_at(position)
            .and_then(|aa| self.residues.get(&aa).copied());
        match residue {
            Some(w) => w,
            None if self.is_terminal_site(peptide, position) => self.terminal_weight,
            None => f64::INFINITY,
        }
    }
}

/// Unconstrained reagent of a known mass, for open modification searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenModificationLinker {
    pub name: String,
    pub mass: f64,
}

impl CrossLinker for OpenModificationLinker {
    fn name(&self) -> &str {
        &self.name
    }

    fn mass(&self) -> f64 {
        self.mass
    }

    fn can_link(&self, peptide: &Peptide, position: usize) -> bool {
        position < peptide.len()
    }

    fn is_open_modification(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlquery::{
        Catalog,
        SequenceOrigin,
    };

    fn pep(seq: &str) -> Peptide {
        Peptide::try_new(seq, &Catalog::default()).unwrap()
    }

    #[test]
    fn test_residue_restricted_sites() {
        let linker = ResidueRestrictedCrossLinker::new("lys", 138.068, &[('K', 0.0)]);
        let p = pep("PEPTIDEK");
        let sites: Vec<usize> = (0..p.len()).filter(|i| linker.can_link(&p, *i)).collect();
        assert_eq!(sites, vec![7]);
        assert!(!linker.can_link(&p, 8));
        assert!(linker.can_link_pair(&p, 7, &pep("KLINKER"), 0));
        assert!(!linker.can_link_pair(&p, 6, &pep("KLINKER"), 0));
        assert_eq!(linker.weight(&p, 3), f64::INFINITY);
    }

    #[test]
    fn test_protein_n_term() {
        let linker = ResidueRestrictedCrossLinker::bs3();
        let origin = SequenceOrigin {
            protein: "P1".into(),
            offset: 0,
            protein_length: 100,
        };
        let first = pep("GGGR").with_origin(origin);
        assert!(linker.can_link(&first, 0));
        assert!(!linker.can_link(&pep("GGGR"), 0));
        assert!(!linker.can_link(&first, 1));
        assert_eq!(linker.weight(&pep("SAK"), 0), 0.2);
    }

    #[test]
    fn test_open_modification_links_anywhere() {
        let linker = OpenModificationLinker {
            name: "open".into(),
            mass: 100.0,
        };
        let p = pep("GGR");
        assert!((0..3).all(|i| linker.can_link(&p, i)));
        assert!(linker.is_open_modification());
        assert_eq!(linker.weight(&p, 1), 0.0);
    }
}
