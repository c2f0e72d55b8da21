use crate::errors::Result;
use crate::models::Spectrum;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use tracing::{
    debug,
    instrument,
};
use xlquery::fragmentation::FragmentationScheme;
use xlquery::models::chemistry::PROTON_MASS;
use xlquery::{
    Catalog,
    FragmentLookup,
    MassQuery,
    Peptide,
    PeptideId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateOptions {
    /// Peaks explained by more peptides than this are ignored.
    pub max_candidates_per_peak: Option<usize>,
    /// Heaviest acceptable candidate; defaults to the precursor mass.
    pub mass_ceiling: Option<f64>,
    /// Additional shifts (e.g. crosslinker stubs) subtracted from every peak.
    pub delta_masses: Vec<f64>,
    pub max_results: usize,
}

impl Default for CandidateOptions {
    fn default() -> Self {
        Self {
            max_candidates_per_peak: Some(100),
            mass_ceiling: None,
            delta_masses: Vec::new(),
            max_results: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlphaCandidate<'a> {
    pub peptide: &'a Peptide,
    pub matched_peaks: usize,
    pub fragment_count: usize,
    pub score: f64,
}

/// Peptides explaining the most peaks of `spectrum`, best first.
///
/// Every peak is read as a singly charged fragment and looked up in the
/// index, once as is and once per delta mass. A peptide scores its matched
/// peak count scaled by the fraction of its fragments that matched.
#[instrument(level = "debug", skip_all, fields(spectrum = %spectrum.id))]
pub fn alpha_candidates<'a>(
    lookup: &'a dyn FragmentLookup,
    spectrum: &Spectrum,
    scheme: &FragmentationScheme,
    catalog: &Catalog,
    options: &CandidateOptions,
) -> Result<Vec<AlphaCandidate<'a>>> {
    let ceiling = options
        .mass_ceiling
        .unwrap_or_else(|| spectrum.precursor_mass());
    let mut hits: HashMap<PeptideId, (&'a Peptide, usize)> = HashMap::new();
    let shifts = std::iter::once(0.0).chain(options.delta_masses.iter().copied());
    let shifts: Vec<f64> = shifts.collect();

    for peak in spectrum.peaks() {
        let neutral = peak.mz - PROTON_MASS;
        let mut seen: Vec<PeptideId> = Vec::new();
        for shift in shifts.iter() {
            let mut query = MassQuery::new(neutral - shift)
                .with_reference(peak.mz)
                .with_ceiling(ceiling);
            if let Some(max) = options.max_candidates_per_peak {
                query = query.with_max_candidates(max);
            }
            for peptide in lookup.query(&query)? {
                if !seen.contains(&peptide.id()) {
                    seen.push(peptide.id());
                    hits.entry(peptide.id()).or_insert((peptide, 0)).1 += 1;
                }
            }
        }
    }

    let mut out = Vec::with_capacity(hits.len());
    for (_, (peptide, matched)) in hits {
        let fragment_count = scheme.shared_fragments(peptide, catalog)?.len().max(1);
        let score = matched as f64 * matched as f64 / fragment_count as f64;
        out.push(AlphaCandidate {
            peptide,
            matched_peaks: matched,
            fragment_count,
            score,
        });
    }
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.peptide.id().cmp(&b.peptide.id()))
    });
    out.truncate(options.max_results);
    debug!("{} alpha candidates", out.len());
    Ok(out)
}
