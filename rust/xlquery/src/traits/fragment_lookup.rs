use crate::errors::Result;
use crate::indices::MassQuery;
use crate::models::peptide::Peptide;
use crate::models::tolerance::ToleranceUnit;
use crate::traits::PeptideSource;
use std::io::Write;

/// Fragment mass -> peptide lookup, implemented by every index variant.
///
/// Queries are read-only from the caller's point of view. Implementations
/// backed by storage may fail, which is why every method returns a
/// [`Result`]; the in-memory index never does.
///
/// A query whose window holds more candidates than
/// [`MassQuery::max_candidates`] allows is answered with an empty list,
/// never a truncated one.
pub trait FragmentLookup: Send + Sync {
    fn query(&self, query: &MassQuery) -> Result<Vec<&Peptide>>;

    /// Number of stored (mass, peptide) pairs inside the tolerance window.
    fn count(&self, mass: f64, reference_mass: Option<f64>) -> Result<usize>;

    /// Peptides stored under exactly this mass, no tolerance applied.
    fn exact(&self, mass: f64) -> Result<Vec<&Peptide>>;

    /// One line per distinct mass, ascending: `mass, peptide, peptide...`.
    fn dump(&self, out: &mut dyn Write) -> Result<()>;

    /// Total number of stored (mass, peptide) pairs.
    fn fragment_count(&self) -> Result<usize>;

    fn peptides(&self) -> &dyn PeptideSource;

    fn tolerance(&self) -> ToleranceUnit;
}
