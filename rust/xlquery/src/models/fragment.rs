use super::chemistry::{
    AMMONIA_MASS,
    CO_MASS,
    HYDROGEN_MASS,
    PROTON_MASS,
    WATER_MASS,
};
use super::peptide::PeptideId;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;
use std::sync::Arc;

/// Which terminus of the peptide a fragment series retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IonSeriesTerminality {
    NTerm,
    CTerm,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IonType {
    A,
    B,
    C,
    X,
    Y,
    Z,
    Precursor,
    Immonium,
}

impl IonType {
    pub fn terminality(&self) -> IonSeriesTerminality {
        match self {
            IonType::A | IonType::B | IonType::C => IonSeriesTerminality::NTerm,
            IonType::X | IonType::Y | IonType::Z => IonSeriesTerminality::CTerm,
            IonType::Precursor | IonType::Immonium => IonSeriesTerminality::None,
        }
    }

    /// Neutral mass added to the residue sum of the covered span.
    pub fn mass_offset(&self) -> f64 {
        match self {
            IonType::A => -CO_MASS,
            IonType::B => 0.0,
            IonType::C => AMMONIA_MASS,
            IonType::X => WATER_MASS + CO_MASS - 2.0 * HYDROGEN_MASS,
            IonType::Y => WATER_MASS,
            IonType::Z => WATER_MASS - AMMONIA_MASS,
            IonType::Precursor => WATER_MASS,
            IonType::Immonium => -CO_MASS,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            IonType::A => "a",
            IonType::B => "b",
            IonType::C => "c",
            IonType::X => "x",
            IonType::Y => "y",
            IonType::Z => "z",
            IonType::Precursor => "P",
            IonType::Immonium => "Imm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeutralLoss {
    Water,
    Ammonia,
}

impl NeutralLoss {
    pub fn mass(&self) -> f64 {
        match self {
            NeutralLoss::Water => WATER_MASS,
            NeutralLoss::Ammonia => AMMONIA_MASS,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NeutralLoss::Water => "H2O",
            NeutralLoss::Ammonia => "NH3",
        }
    }

    /// Residues able to shed this loss.
    pub fn residues(&self) -> &'static str {
        match self {
            NeutralLoss::Water => "STED",
            NeutralLoss::Ammonia => "RKNQ",
        }
    }
}

/// Residues `start..=end` of one peptide covered by a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeptideSpan {
    pub peptide: PeptideId,
    pub start: usize,
    pub end: usize,
    pub peptide_length: usize,
}

impl PeptideSpan {
    pub fn whole(peptide: PeptideId, peptide_length: usize) -> Self {
        Self {
            peptide,
            start: 0,
            end: peptide_length.saturating_sub(1),
            peptide_length,
        }
    }

    pub fn contains(&self, site: usize) -> bool {
        self.start <= site && site <= self.end
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of backbone bonds cleaved to produce this span.
    pub fn fragmentation_sites(&self) -> usize {
        let n_side = usize::from(self.start > 0);
        let c_side = usize::from(self.end + 1 < self.peptide_length);
        n_side + c_side
    }
}

/// A theoretical ion, identified by its neutral mass and what it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub mass: f64,
    pub kind: FragmentKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentKind {
    /// Plain backbone fragment of one peptide, carrying no crosslinker.
    Primary { ion: IonType, span: PeptideSpan },
    /// Diagnostic ions (immonium and friends).
    Secondary { ion: IonType, span: PeptideSpan },
    /// Fragment of one peptide carrying the crosslinker (mono-link or stub).
    CrosslinkerModified {
        ion: IonType,
        span: PeptideSpan,
        linker_mass: f64,
    },
    /// Fragment of one peptide bound through the crosslinker to a fragment of the other.
    Crosslinked { parts: [(IonType, PeptideSpan); 2] },
    /// `count` copies of `loss` shed from `base`.
    Loss {
        base: Arc<Fragment>,
        loss: NeutralLoss,
        count: u8,
    },
}

impl Fragment {
    pub fn primary(ion: IonType, span: PeptideSpan, residue_mass: f64) -> Self {
        Self {
            mass: residue_mass + ion.mass_offset(),
            kind: FragmentKind::Primary { ion, span },
        }
    }

    pub fn secondary(ion: IonType, span: PeptideSpan, residue_mass: f64) -> Self {
        Self {
            mass: residue_mass + ion.mass_offset(),
            kind: FragmentKind::Secondary { ion, span },
        }
    }

    pub fn loss(base: Arc<Fragment>, loss: NeutralLoss, count: u8) -> Self {
        Self {
            mass: base.mass - loss.mass() * f64::from(count),
            kind: FragmentKind::Loss { base, loss, count },
        }
    }

    /// `fragment` bound through a crosslinker to a span of the other peptide.
    ///
    /// Only plain (primary) fragments take part in composites.
    pub fn crosslinked(
        fragment: &Fragment,
        other: (IonType, PeptideSpan),
        other_mass: f64,
        linker_mass: f64,
    ) -> Option<Self> {
        match &fragment.kind {
            FragmentKind::Primary { ion, span } => Some(Self {
                mass: fragment.mass + other_mass + linker_mass,
                kind: FragmentKind::Crosslinked {
                    parts: [(*ion, *span), other],
                },
            }),
            _ => None,
        }
    }

    /// `fragment` carrying an unbound (mono-linked) crosslinker.
    pub fn crosslinker_modified(fragment: &Fragment, linker_mass: f64) -> Option<Self> {
        match &fragment.kind {
            FragmentKind::Primary { ion, span } => Some(Self {
                mass: fragment.mass + linker_mass,
                kind: FragmentKind::CrosslinkerModified {
                    ion: *ion,
                    span: *span,
                    linker_mass,
                },
            }),
            _ => None,
        }
    }

    /// The fragment a loss was derived from, or `self` when it is not a loss.
    pub fn base(&self) -> &Fragment {
        match &self.kind {
            FragmentKind::Loss { base, .. } => base.base(),
            _ => self,
        }
    }

    pub fn is_loss(&self) -> bool {
        matches!(self.kind, FragmentKind::Loss { .. })
    }

    pub fn is_secondary(&self) -> bool {
        matches!(self.kind, FragmentKind::Secondary { .. })
    }

    pub fn is_crosslinked(&self) -> bool {
        matches!(self.kind, FragmentKind::Crosslinked { .. })
    }

    pub fn loss_count(&self) -> u8 {
        match &self.kind {
            FragmentKind::Loss { base, count, .. } => count + base.loss_count(),
            _ => 0,
        }
    }

    pub fn fragmentation_sites(&self) -> usize {
        match &self.kind {
            FragmentKind::Primary { span, .. }
            | FragmentKind::Secondary { span, .. }
            | FragmentKind::CrosslinkerModified { span, .. } => span.fragmentation_sites(),
            FragmentKind::Crosslinked { parts } => parts
                .iter()
                .map(|(_, span)| span.fragmentation_sites())
                .sum(),
            FragmentKind::Loss { base, .. } => base.fragmentation_sites(),
        }
    }

    /// Losses, secondary ions and multiply cleaved fragments are weak evidence.
    ///
    /// Only contradictions from fragments that are *not* lossy drive the
    /// primary link site decision.
    pub fn is_lossy(&self) -> bool {
        self.is_loss() || self.is_secondary() || self.fragmentation_sites() > 1
    }

    pub fn spans(&self) -> Vec<PeptideSpan> {
        match &self.kind {
            FragmentKind::Primary { span, .. }
            | FragmentKind::Secondary { span, .. }
            | FragmentKind::CrosslinkerModified { span, .. } => vec![*span],
            FragmentKind::Crosslinked { parts } => parts.iter().map(|(_, s)| *s).collect(),
            FragmentKind::Loss { base, .. } => base.spans(),
        }
    }

    /// Whether a link on `site` of `peptide` is compatible with this fragment.
    ///
    /// A linear fragment covering the site would have to carry the other
    /// peptide, so it contradicts. A fragment carrying the crosslinker must
    /// cover the site on every part that belongs to `peptide`.
    pub fn can_fulfill_link(&self, peptide: PeptideId, site: usize) -> bool {
        match &self.kind {
            FragmentKind::Primary { span, .. } | FragmentKind::Secondary { span, .. } => {
                span.peptide != peptide || !span.contains(site)
            }
            FragmentKind::CrosslinkerModified { span, .. } => {
                span.peptide != peptide || span.contains(site)
            }
            FragmentKind::Crosslinked { parts } => parts
                .iter()
                .all(|(_, span)| span.peptide != peptide || span.contains(site)),
            FragmentKind::Loss { base, .. } => base.can_fulfill_link(peptide, site),
        }
    }

    /// Pair version of [`Fragment::can_fulfill_link`].
    ///
    /// Spans are checked against the first peptide whose id they carry, so a
    /// homodimer (both ids equal) is checked against `site1` only. Its spans
    /// can not tell the two copies apart, and resolvers visit both `(i, j)`
    /// and `(j, i)`, so the other site is covered by the swapped placement.
    pub fn can_fulfill_link_pair(
        &self,
        peptide1: PeptideId,
        site1: usize,
        peptide2: PeptideId,
        site2: usize,
    ) -> bool {
        let site_for = |span: &PeptideSpan| {
            if span.peptide == peptide1 {
                Some(site1)
            } else if span.peptide == peptide2 {
                Some(site2)
            } else {
                None
            }
        };
        match &self.kind {
            FragmentKind::Primary { span, .. } | FragmentKind::Secondary { span, .. } => {
                site_for(span).is_none_or(|site| !span.contains(site))
            }
            FragmentKind::CrosslinkerModified { span, .. } => {
                site_for(span).is_none_or(|site| span.contains(site))
            }
            FragmentKind::Crosslinked { parts } => parts
                .iter()
                .all(|(_, span)| site_for(span).is_none_or(|site| span.contains(site))),
            FragmentKind::Loss { base, .. } => {
                base.can_fulfill_link_pair(peptide1, site1, peptide2, site2)
            }
        }
    }

    pub fn mz(&self, charge: u8) -> f64 {
        let z = f64::from(charge.max(1));
        (self.mass + z * PROTON_MASS) / z
    }

    pub fn name(&self) -> String {
        fn span_name(ion: &IonType, span: &PeptideSpan) -> String {
            match ion.terminality() {
                IonSeriesTerminality::NTerm => format!("{}{}", ion.symbol(), span.end + 1),
                IonSeriesTerminality::CTerm => {
                    format!("{}{}", ion.symbol(), span.peptide_length - span.start)
                }
                IonSeriesTerminality::None => format!("{}{}", ion.symbol(), span.start + 1),
            }
        }
        match &self.kind {
            FragmentKind::Primary { ion, span } | FragmentKind::Secondary { ion, span } => {
                span_name(ion, span)
            }
            FragmentKind::CrosslinkerModified { ion, span, .. } => {
                format!("{}+XL", span_name(ion, span))
            }
            FragmentKind::Crosslinked { parts } => format!(
                "{}+{}",
                span_name(&parts[0].0, &parts[0].1),
                span_name(&parts[1].0, &parts[1].1)
            ),
            FragmentKind::Loss { base, loss, count } => {
                format!("{}_{}x{}", base.name(), loss.name(), count)
            }
        }
    }
}

impl Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.4})", self.name(), self.mass)
    }
}
