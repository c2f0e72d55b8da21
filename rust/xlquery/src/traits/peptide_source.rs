use crate::models::peptide::{
    Peptide,
    PeptideId,
};
use crate::utils::TupleRange;

/// Read-only access to the peptides an index is built from.
///
/// Ids are positions in the source, so `get` is a direct lookup. The
/// source must stay unchanged for the lifetime of any index built on it.
pub trait PeptideSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, id: PeptideId) -> Option<&Peptide>;

    /// Every peptide whose mass falls in the closed `range`.
    fn in_mass_range(&self, range: TupleRange<f64>) -> Vec<&Peptide>;

    /// Peptides in id order, starting after `after` (or from the start).
    fn iter_after(&self, after: Option<PeptideId>) -> Box<dyn Iterator<Item = &Peptide> + '_>;

    /// Mass of the heaviest peptide, 0 for an empty source.
    fn max_mass(&self) -> f64;
}
