/// A fragment mass lookup request.
///
/// `MassQuery::new(mass)` is the plain form; the builder methods add the
/// optional parts:
///
/// - `with_reference`: mass used to size a relative tolerance window.
/// - `with_ceiling`: peptides heavier than this are dropped.
/// - `with_max_candidates`: if the window holds more candidates than this,
///   the peak is considered non-discriminating and nothing is returned.
///
/// ```
/// use xlquery::MassQuery;
///
/// let q = MassQuery::new(245.1026)
///     .with_reference(1200.0)
///     .with_ceiling(3000.0)
///     .with_max_candidates(50);
/// assert_eq!(q.max_candidates, Some(50));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassQuery {
    pub mass: f64,
    pub reference_mass: Option<f64>,
    pub mass_ceiling: Option<f64>,
    pub max_candidates: Option<usize>,
}

impl MassQuery {
    pub fn new(mass: f64) -> Self {
        Self {
            mass,
            reference_mass: None,
            mass_ceiling: None,
            max_candidates: None,
        }
    }

    pub fn with_reference(mut self, reference_mass: f64) -> Self {
        self.reference_mass = Some(reference_mass);
        self
    }

    pub fn with_ceiling(mut self, mass_ceiling: f64) -> Self {
        self.mass_ceiling = Some(mass_ceiling);
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = Some(max_candidates);
        self
    }

    pub(crate) fn below_ceiling(&self, peptide_mass: f64) -> bool {
        self.mass_ceiling.is_none_or(|c| peptide_mass <= c)
    }
}
