//! Theoretical fragments for a (crosslinked) peptide pair and their
//! annotation onto spectrum peaks.

use crate::crosslinker::CrossLinker;
use crate::errors::Result;
use crate::models::{
    PeakAnnotation,
    Spectrum,
    SpectrumMatch,
};
use std::sync::Arc;
use tracing::debug;
use xlquery::fragmentation::FragmentationScheme;
use xlquery::models::chemistry::WATER_MASS;
use xlquery::{
    Catalog,
    Fragment,
    FragmentKind,
    IonType,
    Peptide,
    PeptideSpan,
    ToleranceUnit,
};

/// Composites of every primary fragment of `peptide` with the whole of `other`.
///
/// A composite only exists if both the fragment span and `other` hold a
/// residue the crosslinker can bind.
pub fn crosslinked_fragments(
    peptide: &Peptide,
    fragments: &[Arc<Fragment>],
    other: &Peptide,
    linker: &dyn CrossLinker,
) -> Vec<Arc<Fragment>> {
    let other_span = PeptideSpan::whole(other.id(), other.len());
    if !linker.can_link_span(other, &other_span) {
        return Vec::new();
    }
    fragments
        .iter()
        .filter(|f| match &f.kind {
            FragmentKind::Primary { span, .. } => linker.can_link_span(peptide, span),
            _ => false,
        })
        .filter_map(|f| {
            Fragment::crosslinked(
                f,
                (IonType::Precursor, other_span),
                other.mass(),
                linker.mass(),
            )
        })
        .map(Arc::new)
        .collect()
}

/// Primary fragments of `peptide` carrying an unbound crosslinker of `linker_mass`.
pub fn crosslinker_modified_fragments(
    peptide: &Peptide,
    fragments: &[Arc<Fragment>],
    linker: &dyn CrossLinker,
    linker_mass: f64,
) -> Vec<Arc<Fragment>> {
    fragments
        .iter()
        .filter(|f| match &f.kind {
            FragmentKind::Primary { span, .. } => linker.can_link_span(peptide, span),
            _ => false,
        })
        .filter_map(|f| Fragment::crosslinker_modified(f, linker_mass))
        .map(Arc::new)
        .collect()
}

fn is_whole_peptide(fragment: &Fragment) -> bool {
    fragment
        .spans()
        .first()
        .is_some_and(|s| s.fragmentation_sites() == 0)
}

/// Annotates spectra with theoretical fragments.
///
/// Matching is non-greedy: a fragment is recorded on every peak inside
/// the tolerance window, at every charge up to the precursor charge.
#[derive(Debug, Clone, Copy)]
pub struct FragmentMatcher {
    pub tolerance: ToleranceUnit,
}

impl FragmentMatcher {
    pub fn new(tolerance: ToleranceUnit) -> Self {
        Self { tolerance }
    }

    /// Returns the number of annotations added.
    pub fn match_fragments(&self, m: &mut SpectrumMatch, fragments: &[Arc<Fragment>]) -> usize {
        let mut added = 0;
        for charge in 1..=m.spectrum.precursor_charge {
            for fragment in fragments.iter() {
                let window = self.tolerance.window(fragment.mz(charge), None);
                for idx in m.spectrum.peak_range(window) {
                    m.spectrum.peaks_mut()[idx].annotations.push(PeakAnnotation {
                        fragment: fragment.clone(),
                        charge,
                        cluster_intensity: None,
                    });
                    m.fragments.add(fragment, charge, idx);
                    added += 1;
                }
            }
        }
        added
    }
}

/// Everything needed to turn a spectrum and its peptides into an annotated match.
pub struct MatchBuilder<'a> {
    pub scheme: &'a FragmentationScheme,
    pub catalog: &'a Catalog,
    pub linker: &'a dyn CrossLinker,
    pub matcher: FragmentMatcher,
}

impl MatchBuilder<'_> {
    /// Linear fragments of both peptides plus the crosslinked composites
    /// (or, for a single peptide, the dead-end modified fragments), losses
    /// included.
    pub fn theoretical_fragments(
        &self,
        peptide1: &Peptide,
        peptide2: Option<&Peptide>,
    ) -> Result<Vec<Arc<Fragment>>> {
        let frags1 = self.scheme.shared_fragments(peptide1, self.catalog)?;
        let mut out = Vec::with_capacity(frags1.len() * 3);
        match peptide2 {
            Some(peptide2) => {
                let frags2 = self.scheme.shared_fragments(peptide2, self.catalog)?;
                let mut composites =
                    crosslinked_fragments(peptide1, &frags1, peptide2, self.linker);
                // whole peptide 2 + whole peptide 1 was already built above
                let partial2: Vec<Arc<Fragment>> = frags2
                    .iter()
                    .filter(|f| !is_whole_peptide(f))
                    .cloned()
                    .collect();
                composites.extend(crosslinked_fragments(
                    peptide2,
                    &partial2,
                    peptide1,
                    self.linker,
                ));
                let peptides = [peptide1, peptide2];
                let losses: Vec<Arc<Fragment>> = composites
                    .iter()
                    .flat_map(|c| self.scheme.losses_for(c, &peptides))
                    .collect();
                out.extend(frags1);
                out.extend(frags2);
                out.extend(composites);
                out.extend(losses);
            }
            None => {
                // hydrolysed dead end
                let modified = crosslinker_modified_fragments(
                    peptide1,
                    &frags1,
                    self.linker,
                    self.linker.mass() + WATER_MASS,
                );
                let losses: Vec<Arc<Fragment>> = modified
                    .iter()
                    .flat_map(|c| self.scheme.losses_for(c, &[peptide1]))
                    .collect();
                out.extend(frags1);
                out.extend(modified);
                out.extend(losses);
            }
        }
        Ok(out)
    }

    pub fn build(
        &self,
        spectrum: Spectrum,
        peptide1: Peptide,
        peptide2: Option<Peptide>,
    ) -> Result<SpectrumMatch> {
        let fragments = self.theoretical_fragments(&peptide1, peptide2.as_ref())?;
        let mut out = SpectrumMatch::new(spectrum, peptide1, peptide2);
        let added = self.matcher.match_fragments(&mut out, &fragments);
        debug!(
            "{}: {} theoretical fragments, {} annotations",
            out.spectrum.id,
            fragments.len(),
            added
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosslinker::ResidueRestrictedCrossLinker;
    use crate::models::SpectrumPeak;
    use xlquery::PeptideTable;
    use xlquery::fragmentation::{
        FragmentationConfig,
        GeneratorRegistry,
    };

    fn table() -> PeptideTable {
        let catalog = Catalog::default();
        ["PEPTIDEK", "KLINKER"]
            .iter()
            .map(|s| Peptide::try_new(s, &catalog).unwrap())
            .collect()
    }

    fn scheme() -> FragmentationScheme {
        GeneratorRegistry::with_defaults()
            .resolve(&FragmentationConfig {
                generators: vec!["b-ions".into(), "y-ions".into(), "precursor".into()],
                losses: vec![],
                max_loss_count: 0,
            })
            .unwrap()
    }

    #[test]
    fn test_composites_need_linkable_span() {
        let table = table();
        let catalog = Catalog::default();
        let (p1, p2) = (&table.as_slice()[0], &table.as_slice()[1]);
        let linker = ResidueRestrictedCrossLinker::new("lys", 138.068, &[('K', 0.0)]);
        let frags = scheme().shared_fragments(p1, &catalog).unwrap();
        let composites = crosslinked_fragments(p1, &frags, p2, &linker);
        // y1..y7 and the precursor cover K7, no b ion does
        assert_eq!(composites.len(), 8);
        for c in composites.iter() {
            assert!(c.can_fulfill_link_pair(p1.id(), 7, p2.id(), 0));
            assert!(c.mass > p2.mass() + 138.0);
        }
    }

    #[test]
    fn test_matcher_annotates_all_charges() {
        let table = table();
        let catalog = Catalog::default();
        let p1 = table.as_slice()[0].clone();
        let frags = scheme().shared_fragments(&p1, &catalog).unwrap();
        let y1 = frags
            .iter()
            .find(|f| f.name() == "y1")
            .cloned()
            .unwrap();
        let peaks = vec![
            SpectrumPeak::new(y1.mz(1), 100.0),
            SpectrumPeak::new(y1.mz(2), 20.0),
            SpectrumPeak::new(999.0, 5.0),
        ];
        let spectrum = Spectrum::try_new("s", 500.0, 2, peaks).unwrap();
        let mut m = SpectrumMatch::new(spectrum, p1, None);
        let added =
            FragmentMatcher::new(ToleranceUnit::Ppm(10.0)).match_fragments(&mut m, &[y1.clone()]);
        assert_eq!(added, 2);
        assert_eq!(m.fragments.len(), 2);
        assert_eq!(m.annotated_peaks(), 2);
        assert!(!m.spectrum.peaks()[2].is_annotated());
    }

    #[test]
    fn test_mono_link_fragments() {
        let table = table();
        let catalog = Catalog::default();
        let linker = ResidueRestrictedCrossLinker::new("lys", 138.068, &[('K', 0.0)]);
        let scheme = scheme();
        let builder = MatchBuilder {
            scheme: &scheme,
            catalog: &catalog,
            linker: &linker,
            matcher: FragmentMatcher::new(ToleranceUnit::Ppm(10.0)),
        };
        let p1 = &table.as_slice()[0];
        let frags = builder.theoretical_fragments(p1, None).unwrap();
        let modified: Vec<_> = frags
            .iter()
            .filter(|f| matches!(f.kind, FragmentKind::CrosslinkerModified { .. }))
            .collect();
        assert_eq!(modified.len(), 8);
        assert_eq!(frags.len(), 8 + 15);
    }
}
