use super::{
    FragmentGenerator,
    FragmentationError,
};
use crate::models::chemistry::Catalog;
use crate::models::fragment::{
    Fragment,
    IonSeriesTerminality,
    IonType,
    PeptideSpan,
};
use crate::models::peptide::Peptide;
use std::collections::HashSet;

/// Terminal backbone series (a/b/c from the N-terminus, x/y/z from the C-terminus).
#[derive(Debug, Clone, Copy)]
pub struct IonSeriesGenerator {
    ion: IonType,
    id: &'static str,
}

impl IonSeriesGenerator {
    pub const A: Self = Self::new(IonType::A, "a-ions");
    pub const B: Self = Self::new(IonType::B, "b-ions");
    pub const C: Self = Self::new(IonType::C, "c-ions");
    pub const X: Self = Self::new(IonType::X, "x-ions");
    pub const Y: Self = Self::new(IonType::Y, "y-ions");
    pub const Z: Self = Self::new(IonType::Z, "z-ions");

    const fn new(ion: IonType, id: &'static str) -> Self {
        Self { ion, id }
    }
}

impl FragmentGenerator for IonSeriesGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn fragments(
        &self,
        peptide: &Peptide,
        catalog: &Catalog,
    ) -> Result<Vec<Fragment>, FragmentationError> {
        let len = peptide.len();
        if len < 2 {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(len - 1);
        match self.ion.terminality() {
            IonSeriesTerminality::NTerm => {
                let mut running = 0.0;
                for end in 0..(len - 1) {
                    running += peptide.residue_mass_range(end, end, catalog)?;
                    let span = PeptideSpan {
                        peptide: peptide.id(),
                        start: 0,
                        end,
                        peptide_length: len,
                    };
                    out.push(Fragment::primary(self.ion, span, running));
                }
            }
            IonSeriesTerminality::CTerm => {
                let mut running = 0.0;
                for start in (1..len).rev() {
                    running += peptide.residue_mass_range(start, start, catalog)?;
                    let span = PeptideSpan {
                        peptide: peptide.id(),
                        start,
                        end: len - 1,
                        peptide_length: len,
                    };
                    out.push(Fragment::primary(self.ion, span, running));
                }
            }
            IonSeriesTerminality::None => {
                return Err(FragmentationError::UnsupportedIon(self.ion));
            }
        }
        Ok(out)
    }
}

/// The intact peptide as a single fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecursorIonGenerator;

impl FragmentGenerator for PrecursorIonGenerator {
    fn id(&self) -> &'static str {
        "precursor"
    }

    fn fragments(
        &self,
        peptide: &Peptide,
        catalog: &Catalog,
    ) -> Result<Vec<Fragment>, FragmentationError> {
        let span = PeptideSpan::whole(peptide.id(), peptide.len());
        let residues = peptide.residue_mass_range(0, peptide.len().saturating_sub(1), catalog)?;
        Ok(vec![Fragment::primary(IonType::Precursor, span, residues)])
    }
}

/// One immonium ion per distinct (residue, modification) in the peptide.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmoniumIonGenerator;

impl FragmentGenerator for ImmoniumIonGenerator {
    fn id(&self) -> &'static str {
        "immonium"
    }

    fn fragments(
        &self,
        peptide: &Peptide,
        catalog: &Catalog,
    ) -> Result<Vec<Fragment>, FragmentationError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for position in 0..peptide.len() {
            let key = (
                peptide.residue_at(position),
                peptide.modification_at(position).map(|m| m.name.clone()),
            );
            if !seen.insert(key) {
                continue;
            }
            let span = PeptideSpan {
                peptide: peptide.id(),
                start: position,
                end: position,
                peptide_length: peptide.len(),
            };
            let residue = peptide.residue_mass_range(position, position, catalog)?;
            out.push(Fragment::secondary(IonType::Immonium, span, residue));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chemistry::{
        PROTON_MASS,
        WATER_MASS,
    };

    #[test]
    fn test_b_and_y_series_are_complementary() {
        let catalog = Catalog::default();
        let pep = Peptide::try_new("PEPTIDEK", &catalog).unwrap();
        let b = IonSeriesGenerator::B.fragments(&pep, &catalog).unwrap();
        let y = IonSeriesGenerator::Y.fragments(&pep, &catalog).unwrap();
        assert_eq!(b.len(), 7);
        assert_eq!(y.len(), 7);
        // b_i + y_(n-i) == precursor
        for (i, bi) in b.iter().enumerate() {
            let yi = &y[pep.len() - 2 - i];
            assert!((bi.mass + yi.mass - pep.mass()).abs() < 1e-6);
        }
        assert_eq!(b[2].name(), "b3");
        assert_eq!(y[0].name(), "y1");
        assert!((y[0].mz(1) - (128.094_963_01 + WATER_MASS + PROTON_MASS)).abs() < 1e-6);
    }

    #[test]
    fn test_precursor_and_immonium() {
        let catalog = Catalog::default();
        let pep = Peptide::try_new("KLINKER", &catalog).unwrap();
        let prec = PrecursorIonGenerator.fragments(&pep, &catalog).unwrap();
        assert_eq!(prec.len(), 1);
        assert!((prec[0].mass - pep.mass()).abs() < 1e-9);
        assert_eq!(prec[0].fragmentation_sites(), 0);

        let imm = ImmoniumIonGenerator.fragments(&pep, &catalog).unwrap();
        // K L I N E R
        assert_eq!(imm.len(), 6);
        assert!(imm.iter().all(|f| f.is_secondary()));
    }
}
