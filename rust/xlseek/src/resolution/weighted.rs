use super::{
    Contradiction,
    Resolution,
    SiteResolver,
    retract,
};
use crate::models::{
    LinkSites,
    SpectrumMatch,
};
use xlquery::Fragment;

const WEIGHT_OFFSET: f64 = 0.0001;

/// Confidence distribution over link placements.
///
/// `pairs` holds one normalised confidence per chemically valid placement;
/// the per residue vectors sum the pair confidences on each peptide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteConfidence {
    pub pairs: Vec<(LinkSites, f64)>,
    pub peptide1: Vec<f64>,
    pub peptide2: Vec<f64>,
}

impl SiteConfidence {
    pub fn of(&self, sites: LinkSites) -> f64 {
        self.pairs
            .iter()
            .find(|(s, _)| *s == sites)
            .map_or(0.0, |(_, c)| *c)
    }
}

/// How much a contradicting match argues against a placement.
///
/// Relative peak intensity, damped for losses (to nothing past two) and
/// for fragments produced by a backbone cleavage.
pub(crate) fn mismatch_weight(fragment: &Fragment, intensity: f64, max_intensity: f64) -> f64 {
    let w = if max_intensity > 0.0 {
        intensity / max_intensity
    } else {
        0.0
    };
    if fragment.is_loss() {
        let losses = fragment.loss_count();
        if losses < 3 {
            w / (10.0 * f64::from(losses))
        } else {
            0.0
        }
    } else if fragment.fragmentation_sites() > 0 {
        w / 10.0
    } else {
        w
    }
}

impl SiteResolver<'_> {
    fn weigh(
        &self,
        m: &SpectrumMatch,
        max_intensity: f64,
        contradicts: impl Fn(&Fragment) -> bool,
    ) -> (f64, Vec<Contradiction>) {
        let mut weight = 0.0;
        let mut misses = Vec::new();
        for entry in m.fragments.iter().filter(|e| contradicts(&e.base)) {
            for (fragment, peak) in entry.annotations() {
                let intensity = m.spectrum.peaks().get(peak).map_or(0.0, |p| p.intensity);
                weight += mismatch_weight(fragment, intensity, max_intensity);
                misses.push(Contradiction {
                    peak,
                    fragment: fragment.clone(),
                    charge: entry.charge,
                });
            }
        }
        (weight, misses)
    }

    /// Resolution that also scores every valid placement.
    ///
    /// Each placement starts from the crosslinker's site preference weights
    /// and accumulates the mismatch weight of every matched fragment it
    /// contradicts. The lightest placement wins and has its contradictions
    /// retracted; the inverted weights give the confidences, which are
    /// also stored on the match.
    pub fn resolve_weighted(&self, m: &mut SpectrumMatch) -> (Resolution, SiteConfidence) {
        let max_intensity = m.spectrum.max_intensity();
        let p1 = &m.peptide1;
        let mut weights: Vec<(LinkSites, f64)> = Vec::new();
        let mut best: Option<(LinkSites, f64, Vec<Contradiction>)> = None;

        let mut consider = |sites: LinkSites, w: f64, misses: Vec<Contradiction>| {
            weights.push((sites, w));
            if best.as_ref().is_none_or(|(_, bw, _)| w < *bw) {
                best = Some((sites, w, misses));
            }
        };

        match &m.peptide2 {
            Some(p2) => {
                for i in (0..p1.len()).rev() {
                    if !self.linker.can_link(p1, i) {
                        continue;
                    }
                    for j in (0..p2.len()).rev() {
                        if !self.linker.can_link_pair(p1, i, p2, j) {
                            continue;
                        }
                        let (w, misses) = self.weigh(m, max_intensity, |f| {
                            !f.can_fulfill_link_pair(p1.id(), i, p2.id(), j)
                        });
                        let w = w + self.linker.weight(p1, i) + self.linker.weight(p2, j);
                        consider(LinkSites::pair(i, j), w, misses);
                    }
                }
            }
            None => {
                for i in (0..p1.len()).rev() {
                    if !self.linker.can_link(p1, i) {
                        continue;
                    }
                    let (w, misses) =
                        self.weigh(m, max_intensity, |f| !f.can_fulfill_link(p1.id(), i));
                    consider(LinkSites::single(i), w + self.linker.weight(p1, i), misses);
                }
            }
        }

        let mut confidence = SiteConfidence {
            pairs: Vec::with_capacity(weights.len()),
            peptide1: vec![0.0; p1.len()],
            peptide2: vec![0.0; m.peptide2.as_ref().map_or(0, |p| p.len())],
        };
        let total: f64 = weights.iter().map(|(_, w)| 1.0 / (w + WEIGHT_OFFSET)).sum();
        for (sites, w) in weights {
            let c = (1.0 / (w + WEIGHT_OFFSET)) / total;
            if let Some(s) = sites.site1 {
                confidence.peptide1[s] += c;
            }
            if let Some(s) = sites.site2 {
                confidence.peptide2[s] += c;
            }
            confidence.pairs.push((sites, c));
        }

        m.confidence = Some(confidence.clone());
        let Some((sites, _, misses)) = best else {
            m.sites = LinkSites::UNSET;
            return (Resolution::unsupported(), confidence);
        };
        let retracted = retract(m, &misses);
        m.sites = sites;
        (Resolution { sites, retracted }, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosslinker::ResidueRestrictedCrossLinker;
    use crate::models::{
        PeakAnnotation,
        Spectrum,
        SpectrumPeak,
    };
    use std::sync::Arc;
    use xlquery::models::NeutralLoss;
    use xlquery::{
        Catalog,
        IonType,
        Peptide,
        PeptideSpan,
        PeptideTable,
    };

    fn peptides(seqs: &[&str]) -> Vec<Peptide> {
        let catalog = Catalog::default();
        let table: PeptideTable = seqs
            .iter()
            .map(|s| Peptide::try_new(s, &catalog).unwrap())
            .collect();
        table.as_slice().to_vec()
    }

    fn b_ion(p: &Peptide, end: usize) -> Arc<Fragment> {
        let span = PeptideSpan {
            peptide: p.id(),
            start: 0,
            end,
            peptide_length: p.len(),
        };
        let mass = p.residue_mass_range(0, end, &Catalog::default()).unwrap();
        Arc::new(Fragment::primary(IonType::B, span, mass))
    }

    fn with_peak(mut m: SpectrumMatch, f: &Arc<Fragment>, intensity: f64) -> SpectrumMatch {
        let mut peaks: Vec<SpectrumPeak> = m.spectrum.peaks().to_vec();
        peaks.push(SpectrumPeak::new(f.mz(1), intensity));
        m.spectrum = Spectrum::try_new("w", 900.0, 1, peaks).unwrap();
        let idx = m
            .spectrum
            .peaks()
            .iter()
            .position(|p| p.mz == f.mz(1))
            .unwrap();
        m.spectrum.peaks_mut()[idx].annotations.push(PeakAnnotation {
            fragment: f.clone(),
            charge: 1,
            cluster_intensity: None,
        });
        m.fragments.add(f, 1, idx);
        m
    }

    #[test]
    fn test_mismatch_weight() {
        let peps = peptides(&["KAAKR"]);
        let p = &peps[0];
        let b2 = b_ion(p, 1);
        assert!((mismatch_weight(&b2, 50.0, 100.0) - 0.05).abs() < 1e-12);
        let one = Fragment::loss(b2.clone(), NeutralLoss::Water, 1);
        assert!((mismatch_weight(&one, 100.0, 100.0) - 0.1).abs() < 1e-12);
        let two = Fragment::loss(b2.clone(), NeutralLoss::Water, 2);
        assert!((mismatch_weight(&two, 100.0, 100.0) - 0.05).abs() < 1e-12);
        let three = Fragment::loss(b2, NeutralLoss::Water, 3);
        assert_eq!(mismatch_weight(&three, 100.0, 100.0), 0.0);
        let whole = b_ion(p, 4);
        assert_eq!(mismatch_weight(&whole, 30.0, 100.0), 0.3);
    }

    #[test]
    fn test_confidence_is_normalised() {
        let peps = peptides(&["KAAKR", "KGGKR"]);
        let spectrum = Spectrum::try_new("w", 900.0, 1, vec![]).unwrap();
        let m = SpectrumMatch::new(spectrum, peps[0].clone(), Some(peps[1].clone()));
        let mut m = with_peak(m, &b_ion(&peps[0], 1), 100.0);

        let linker = ResidueRestrictedCrossLinker::new("lys", 138.068, &[('K', 0.0)]);
        let (res, conf) = SiteResolver::new(&linker).resolve_weighted(&mut m);

        assert_eq!(conf.pairs.len(), 4);
        let total: f64 = conf.pairs.iter().map(|(_, c)| c).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((conf.peptide1.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((conf.peptide2.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // b2 covers K0 of the first peptide
        assert_eq!(res.sites.site1, Some(3));
        assert_eq!(res.retracted, 0);
        assert!(conf.peptide1[3] > 0.99);
        assert_eq!(conf.peptide1[1], 0.0);
        // no evidence on the second peptide: its two lysines share evenly
        assert!((conf.peptide2[0] - conf.peptide2[3]).abs() < 1e-9);
        // ties keep the first placement seen when walking from the C-terminus
        assert_eq!(res.sites, LinkSites::pair(3, 3));
    }

    #[test]
    fn test_site_preference_weight() {
        let peps = peptides(&["ASKR"]);
        let spectrum = Spectrum::try_new("w", 900.0, 1, vec![]).unwrap();
        let mut m = SpectrumMatch::new(spectrum, peps[0].clone(), None);
        let linker =
            ResidueRestrictedCrossLinker::new("amine", 138.068, &[('K', 0.0), ('S', 0.5)]);
        let (res, conf) = SiteResolver::new(&linker).resolve_weighted(&mut m);
        assert_eq!(res.sites, LinkSites::single(2));
        assert!(conf.of(LinkSites::single(2)) > conf.of(LinkSites::single(1)));
        assert!((conf.of(LinkSites::single(2)) + conf.of(LinkSites::single(1)) - 1.0).abs() < 1e-9);
        assert!(conf.peptide2.is_empty());
    }

    #[test]
    fn test_no_valid_site() {
        let peps = peptides(&["GGGR"]);
        let spectrum = Spectrum::try_new("w", 900.0, 1, vec![]).unwrap();
        let mut m = SpectrumMatch::new(spectrum, peps[0].clone(), None);
        let linker = ResidueRestrictedCrossLinker::new("lys", 138.068, &[('K', 0.0)]);
        let (res, conf) = SiteResolver::new(&linker).resolve_weighted(&mut m);
        assert_eq!(res, Resolution::unsupported());
        assert!(conf.pairs.is_empty());
        assert!(conf.peptide1.iter().all(|c| *c == 0.0));
    }
}
