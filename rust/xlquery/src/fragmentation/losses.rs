use super::LossGenerator;
use crate::models::fragment::{
    Fragment,
    NeutralLoss,
};
use crate::models::peptide::Peptide;
use std::sync::Arc;

/// Neutral loss allowed once per qualifying residue inside the fragment.
#[derive(Debug, Clone, Copy)]
pub struct ResidueRestrictedLoss {
    loss: NeutralLoss,
    id: &'static str,
}

impl ResidueRestrictedLoss {
    pub const WATER: Self = Self {
        loss: NeutralLoss::Water,
        id: "water-loss",
    };
    pub const AMMONIA: Self = Self {
        loss: NeutralLoss::Ammonia,
        id: "ammonia-loss",
    };

    fn qualifying_residues(&self, base: &Fragment, peptides: &[&Peptide]) -> usize {
        let allowed = self.loss.residues();
        base.spans()
            .iter()
            .filter_map(|span| {
                peptides
                    .iter()
                    .find(|p| p.id() == span.peptide)
                    .map(|p| (span, p))
            })
            .map(|(span, p)| {
                p.sequence()
                    .get(span.start..=span.end)
                    .map(|s| s.chars().filter(|c| allowed.contains(*c)).count())
                    .unwrap_or(0)
            })
            .sum()
    }
}

impl LossGenerator for ResidueRestrictedLoss {
    fn id(&self) -> &'static str {
        self.id
    }

    fn losses(&self, base: &Arc<Fragment>, peptides: &[&Peptide], max_count: u8) -> Vec<Fragment> {
        if base.is_loss() || base.is_secondary() {
            return Vec::new();
        }
        let available = self.qualifying_residues(base, peptides).min(usize::from(max_count));
        (1..=available)
            .map(|count| Fragment::loss(base.clone(), self.loss, count as u8))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragmentation::FragmentGenerator;
    use crate::fragmentation::ion_series::IonSeriesGenerator;
    use crate::models::chemistry::Catalog;

    #[test]
    fn test_loss_count_bounded_by_residues() {
        let catalog = Catalog::default();
        let pep = Peptide::try_new("STEPK", &catalog).unwrap();
        let b = IonSeriesGenerator::B.fragments(&pep, &catalog).unwrap();
        // b3 = STE -> 3 water capable residues, capped at 2
        let b3 = Arc::new(b[2].clone());
        let losses = ResidueRestrictedLoss::WATER.losses(&b3, &[&pep], 2);
        assert_eq!(losses.len(), 2);
        assert_eq!(losses[1].loss_count(), 2);

        // b1 = S -> a single loss
        let b1 = Arc::new(b[0].clone());
        assert_eq!(ResidueRestrictedLoss::WATER.losses(&b1, &[&pep], 3).len(), 1);
        // no ammonia capable residue in b3
        assert!(ResidueRestrictedLoss::AMMONIA.losses(&b3, &[&pep], 3).is_empty());
    }
}
