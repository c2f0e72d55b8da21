//! Theoretical fragment generation.
//!
//! Generators are a closed set of strategies behind [`FragmentGenerator`]
//! and [`LossGenerator`]. They are looked up by stable id in a
//! [`GeneratorRegistry`] once, when the run configuration is read, and the
//! resulting [`FragmentationScheme`] is what the rest of the crate uses.

pub mod ion_series;
pub mod losses;
pub mod registry;

use crate::models::chemistry::{
    Catalog,
    ChemistryError,
};
use crate::models::fragment::{
    Fragment,
    IonType,
};
use crate::models::peptide::Peptide;
use std::sync::Arc;
use thiserror::Error;

pub use ion_series::{
    ImmoniumIonGenerator,
    IonSeriesGenerator,
    PrecursorIonGenerator,
};
pub use losses::ResidueRestrictedLoss;
pub use registry::{
    FragmentationConfig,
    FragmentationScheme,
    GeneratorRegistry,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FragmentationError {
    #[error(transparent)]
    Chemistry(#[from] ChemistryError),
    #[error("Ion type {0:?} can not be produced as a terminal series")]
    UnsupportedIon(IonType),
}

pub trait FragmentGenerator: Send + Sync {
    /// Stable identifier used in configuration files.
    fn id(&self) -> &'static str;

    fn fragments(
        &self,
        peptide: &Peptide,
        catalog: &Catalog,
    ) -> Result<Vec<Fragment>, FragmentationError>;
}

pub trait LossGenerator: Send + Sync {
    fn id(&self) -> &'static str;

    /// Loss variants of `base`, at most `max_count` losses deep.
    ///
    /// `peptides` are the peptides the spans of `base` may refer to.
    fn losses(&self, base: &Arc<Fragment>, peptides: &[&Peptide], max_count: u8) -> Vec<Fragment>;
}
