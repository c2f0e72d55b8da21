use super::peptide::{
    Peptide,
    PeptideId,
};
use crate::traits::PeptideSource;
use crate::utils::{
    TupleRange,
    binary_search_range_by_key,
};

/// The global id -> peptide table.
///
/// Ids are assigned on construction as positions in the input. A second
/// array of ids sorted by mass serves the mass range queries used by the
/// banded index build.
#[derive(Debug, Clone, Default)]
pub struct PeptideTable {
    peptides: Vec<Peptide>,
    by_mass: Vec<PeptideId>,
}

impl PeptideTable {
    pub fn new(peptides: Vec<Peptide>) -> Self {
        let mut peptides = peptides;
        for (i, pep) in peptides.iter_mut().enumerate() {
            pep.id = PeptideId(i as u32);
        }
        let mut by_mass: Vec<PeptideId> = peptides.iter().map(|p| p.id).collect();
        by_mass.sort_by(|a, b| {
            peptides[a.index()]
                .mass()
                .total_cmp(&peptides[b.index()].mass())
                .then(a.cmp(b))
        });
        Self { peptides, by_mass }
    }

    pub fn as_slice(&self) -> &[Peptide] {
        &self.peptides
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peptide> {
        self.peptides.iter()
    }

    /// Looks a peptide up by its descriptor (sequence with modifications).
    pub fn find_by_descriptor(&self, descriptor: &str) -> Option<&Peptide> {
        self.peptides.iter().find(|p| p.descriptor() == descriptor)
    }
}

impl PeptideSource for PeptideTable {
    fn len(&self) -> usize {
        self.peptides.len()
    }

    fn get(&self, id: PeptideId) -> Option<&Peptide> {
        self.peptides.get(id.index())
    }

    fn in_mass_range(&self, range: TupleRange<f64>) -> Vec<&Peptide> {
        let found = binary_search_range_by_key(&self.by_mass, range.as_inclusive_range(), |id| {
            self.peptides[id.index()].mass()
        });
        self.by_mass[found]
            .iter()
            .map(|id| &self.peptides[id.index()])
            .collect()
    }

    fn iter_after(&self, after: Option<PeptideId>) -> Box<dyn Iterator<Item = &Peptide> + '_> {
        let start = after.map(|id| id.index() + 1).unwrap_or(0);
        Box::new(self.peptides.iter().skip(start))
    }

    fn max_mass(&self) -> f64 {
        self.by_mass
            .last()
            .map(|id| self.peptides[id.index()].mass())
            .unwrap_or(0.0)
    }
}

impl FromIterator<Peptide> for PeptideTable {
    fn from_iter<T: IntoIterator<Item = Peptide>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
