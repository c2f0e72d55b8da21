//! Link site resolution.
//!
//! Every chemically valid placement of the link is scored by the matched
//! fragments it contradicts. The placement with the fewest contradictions
//! from strong (non-lossy) fragments wins; ties go to lysine linkages
//! unless the crosslinker is an open modification, then to the placement
//! contradicting the least intensity. Contradicting matches of the winner
//! are retracted from the spectrum and the fragment collection.

mod weighted;

pub use weighted::SiteConfidence;

use crate::crosslinker::CrossLinker;
use crate::models::{
    LinkSites,
    Spectrum,
    SpectrumMatch,
};
use std::cmp::Ordering;
use std::sync::Arc;
use xlquery::{
    Fragment,
    Peptide,
};

/// Outcome of a resolution: the chosen sites and how many annotations were removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub sites: LinkSites,
    pub retracted: usize,
}

impl Resolution {
    pub fn unsupported() -> Self {
        Self {
            sites: LinkSites::UNSET,
            retracted: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Contradiction {
    peak: usize,
    fragment: Arc<Fragment>,
    charge: u8,
}

#[derive(Debug, Default)]
struct MissTally {
    contradictions: Vec<Contradiction>,
    non_lossy: usize,
    intensity: f64,
    non_lossy_intensity: f64,
}

impl MissTally {
    /// Collects every annotation for which `contradicts` holds.
    fn collect(spectrum: &Spectrum, contradicts: impl Fn(&Fragment) -> bool) -> Self {
        let mut out = Self::default();
        for (idx, peak) in spectrum.peaks().iter().enumerate() {
            for ann in peak.annotations.iter() {
                if !contradicts(&ann.fragment) {
                    continue;
                }
                let evidence = peak.evidence(ann);
                out.intensity += evidence;
                if !ann.fragment.is_lossy() {
                    out.non_lossy += 1;
                    out.non_lossy_intensity += evidence;
                }
                out.contradictions.push(Contradiction {
                    peak: idx,
                    fragment: ann.fragment.clone(),
                    charge: ann.charge,
                });
            }
        }
        out
    }
}

struct Candidate {
    sites: LinkSites,
    lysines: usize,
    tally: MissTally,
}

impl Candidate {
    /// True if `self` should replace `best`. Equal candidates keep the first seen.
    ///
    /// Order: non-lossy contradiction count, then lysine count (skipped for
    /// open modifications), then non-lossy intensity, then total intensity.
    /// Lysines rank ahead of intensity, so a lysine pair tied on count is
    /// kept even against a placement contradicting less intensity.
    fn beats(&self, best: &Candidate, open_modification: bool) -> bool {
        match self.tally.non_lossy.cmp(&best.tally.non_lossy) {
            Ordering::Less => return true,
            Ordering::Greater => return false,
            Ordering::Equal => {}
        }
        if !open_modification {
            match self.lysines.cmp(&best.lysines) {
                Ordering::Greater => return true,
                Ordering::Less => return false,
                Ordering::Equal => {}
            }
        }
        match self
            .tally
            .non_lossy_intensity
            .total_cmp(&best.tally.non_lossy_intensity)
        {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.tally.intensity < best.tally.intensity,
        }
    }
}

fn is_lysine(peptide: &Peptide, position: usize) -> bool {
    peptide.residue_at(position) == Some('K')
}

pub struct SiteResolver<'a> {
    linker: &'a dyn CrossLinker,
}

impl<'a> SiteResolver<'a> {
    pub fn new(linker: &'a dyn CrossLinker) -> Self {
        Self { linker }
    }

    pub fn linker(&self) -> &dyn CrossLinker {
        self.linker
    }

    /// Picks the best supported link site(s) and retracts contradicting matches.
    ///
    /// Leaves the match untouched and returns unset sites when the
    /// crosslinker can not bind any residue (pair).
    pub fn resolve(&self, m: &mut SpectrumMatch) -> Resolution {
        let best = match &m.peptide2 {
            Some(p2) => self.best_pair(&m.spectrum, &m.peptide1, p2),
            None => self.best_single(&m.spectrum, &m.peptide1),
        };
        let Some(best) = best else {
            m.sites = LinkSites::UNSET;
            return Resolution::unsupported();
        };
        let retracted = retract(m, &best.tally.contradictions);
        m.sites = best.sites;
        Resolution {
            sites: best.sites,
            retracted,
        }
    }

    /// Sets the given sites without searching, retracting whatever contradicts them.
    ///
    /// Works on whole collection entries: a base fragment that contradicts
    /// takes all of its loss matches with it.
    pub fn resolve_forced(
        &self,
        m: &mut SpectrumMatch,
        site1: usize,
        site2: Option<usize>,
    ) -> Resolution {
        let id1 = m.peptide1.id();
        let id2 = m.peptide2.as_ref().map(|p| p.id());
        let contradicting = m.fragments.drain_where(|entry| match (id2, site2) {
            (Some(id2), Some(site2)) => !entry.base.can_fulfill_link_pair(id1, site1, id2, site2),
            _ => !entry.base.can_fulfill_link(id1, site1),
        });
        let mut retracted = 0;
        for entry in contradicting.iter() {
            for (fragment, peak) in entry.annotations() {
                if let Some(p) = m.spectrum.peaks_mut().get_mut(peak) {
                    if p.delete_annotation(fragment, entry.charge) {
                        retracted += 1;
                    }
                }
            }
        }
        let sites = LinkSites {
            site1: Some(site1),
            site2: site2.filter(|_| id2.is_some()),
        };
        m.sites = sites;
        Resolution { sites, retracted }
    }

    fn best_pair(&self, spectrum: &Spectrum, p1: &Peptide, p2: &Peptide) -> Option<Candidate> {
        let open = self.linker.is_open_modification();
        let mut best: Option<Candidate> = None;
        for i in 0..p1.len() {
            if !self.linker.can_link(p1, i) {
                continue;
            }
            for j in 0..p2.len() {
                if !self.linker.can_link_pair(p1, i, p2, j) {
                    continue;
                }
                let tally = MissTally::collect(spectrum, |f| {
                    !f.can_fulfill_link_pair(p1.id(), i, p2.id(), j)
                });
                let candidate = Candidate {
                    sites: LinkSites::pair(i, j),
                    lysines: usize::from(is_lysine(p1, i)) + usize::from(is_lysine(p2, j)),
                    tally,
                };
                if best.as_ref().is_none_or(|b| candidate.beats(b, open)) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_single(&self, spectrum: &Spectrum, p1: &Peptide) -> Option<Candidate> {
        let open = self.linker.is_open_modification();
        let mut best: Option<Candidate> = None;
        for i in (0..p1.len()).filter(|i| self.linker.can_link(p1, *i)) {
            let tally = MissTally::collect(spectrum, |f| !f.can_fulfill_link(p1.id(), i));
            let candidate = Candidate {
                sites: LinkSites::single(i),
                lysines: usize::from(is_lysine(p1, i)),
                tally,
            };
            if best.as_ref().is_none_or(|b| candidate.beats(b, open)) {
                best = Some(candidate);
            }
        }
        best
    }
}

fn retract(m: &mut SpectrumMatch, contradictions: &[Contradiction]) -> usize {
    contradictions
        .iter()
        .filter(|c| m.retract(c.peak, &c.fragment, c.charge))
        .count()
}
