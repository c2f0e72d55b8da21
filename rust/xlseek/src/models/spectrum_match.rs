use super::matched_fragments::MatchedFragmentCollection;
use super::spectrum::Spectrum;
use crate::resolution::SiteConfidence;
use std::fmt::Display;
use xlquery::{
    Fragment,
    Peptide,
};

/// Residues carrying the link, one per peptide.
///
/// Both unset means no chemically valid placement exists and the match
/// is unsupported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSites {
    pub site1: Option<usize>,
    pub site2: Option<usize>,
}

impl LinkSites {
    pub const UNSET: LinkSites = LinkSites {
        site1: None,
        site2: None,
    };

    pub fn pair(site1: usize, site2: usize) -> Self {
        Self {
            site1: Some(site1),
            site2: Some(site2),
        }
    }

    pub fn single(site: usize) -> Self {
        Self {
            site1: Some(site),
            site2: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.site1.is_some()
    }
}

impl Display for LinkSites {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |s: Option<usize>| s.map_or("-".to_string(), |x| x.to_string());
        write!(f, "({}, {})", show(self.site1), show(self.site2))
    }
}

/// A spectrum explained by one peptide, or two crosslinked peptides.
///
/// The annotations on the spectrum peaks and the fragment collection
/// describe the same matches and are only ever changed together.
#[derive(Debug, Clone)]
pub struct SpectrumMatch {
    pub spectrum: Spectrum,
    pub peptide1: Peptide,
    pub peptide2: Option<Peptide>,
    pub fragments: MatchedFragmentCollection,
    pub sites: LinkSites,
    /// Set by the weighted resolution.
    pub confidence: Option<SiteConfidence>,
}

impl SpectrumMatch {
    pub fn new(spectrum: Spectrum, peptide1: Peptide, peptide2: Option<Peptide>) -> Self {
        Self {
            spectrum,
            peptide1,
            peptide2,
            fragments: MatchedFragmentCollection::new(),
            sites: LinkSites::UNSET,
            confidence: None,
        }
    }

    pub fn is_crosslinked(&self) -> bool {
        self.peptide2.is_some()
    }

    /// Drops the match of `fragment` at `charge` on the peak at `peak`.
    ///
    /// Returns true if the peak carried that annotation.
    pub fn retract(&mut self, peak: usize, fragment: &Fragment, charge: u8) -> bool {
        let removed = self
            .spectrum
            .peaks_mut()
            .get_mut(peak)
            .is_some_and(|p| p.delete_annotation(fragment, charge));
        self.fragments.remove(fragment, charge);
        removed
    }

    pub fn annotated_peaks(&self) -> usize {
        self.spectrum
            .peaks()
            .iter()
            .filter(|p| p.is_annotated())
            .count()
    }

    pub fn explained_intensity(&self) -> f64 {
        self.spectrum
            .peaks()
            .iter()
            .filter(|p| p.is_annotated())
            .map(|p| p.intensity)
            .sum()
    }

    pub fn label(&self) -> String {
        match &self.peptide2 {
            Some(p2) => format!(
                "{}-{} {}",
                self.peptide1.descriptor(),
                p2.descriptor(),
                self.sites
            ),
            None => format!("{} {}", self.peptide1.descriptor(), self.sites),
        }
    }
}
