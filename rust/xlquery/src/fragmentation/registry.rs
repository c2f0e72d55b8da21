use super::{
    FragmentGenerator,
    FragmentationError,
    ImmoniumIonGenerator,
    IonSeriesGenerator,
    LossGenerator,
    PrecursorIonGenerator,
    ResidueRestrictedLoss,
};
use crate::errors::XlqueryError;
use crate::models::chemistry::Catalog;
use crate::models::fragment::Fragment;
use crate::models::peptide::Peptide;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Which generators to use, by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FragmentationConfig {
    pub generators: Vec<String>,
    #[serde(default)]
    pub losses: Vec<String>,
    #[serde(default = "default_max_loss_count")]
    pub max_loss_count: u8,
}

fn default_max_loss_count() -> u8 {
    2
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            generators: vec!["b-ions".into(), "y-ions".into()],
            losses: Vec::new(),
            max_loss_count: default_max_loss_count(),
        }
    }
}

/// Generators available to a run, keyed by their stable id.
pub struct GeneratorRegistry {
    fragments: BTreeMap<&'static str, Arc<dyn FragmentGenerator>>,
    losses: BTreeMap<&'static str, Arc<dyn LossGenerator>>,
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl GeneratorRegistry {
    pub fn empty() -> Self {
        Self {
            fragments: BTreeMap::new(),
            losses: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut out = Self::empty();
        for series in [
            IonSeriesGenerator::A,
            IonSeriesGenerator::B,
            IonSeriesGenerator::C,
            IonSeriesGenerator::X,
            IonSeriesGenerator::Y,
            IonSeriesGenerator::Z,
        ] {
            out.register_fragment_generator(Arc::new(series));
        }
        out.register_fragment_generator(Arc::new(PrecursorIonGenerator));
        out.register_fragment_generator(Arc::new(ImmoniumIonGenerator));
        out.register_loss_generator(Arc::new(ResidueRestrictedLoss::WATER));
        out.register_loss_generator(Arc::new(ResidueRestrictedLoss::AMMONIA));
        out
    }

    /// Returns the generator previously registered under the same id, if any.
    pub fn register_fragment_generator(
        &mut self,
        generator: Arc<dyn FragmentGenerator>,
    ) -> Option<Arc<dyn FragmentGenerator>> {
        self.fragments.insert(generator.id(), generator)
    }

    pub fn register_loss_generator(
        &mut self,
        generator: Arc<dyn LossGenerator>,
    ) -> Option<Arc<dyn LossGenerator>> {
        self.losses.insert(generator.id(), generator)
    }

    pub fn fragment_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fragments.keys().copied()
    }

    pub fn loss_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.losses.keys().copied()
    }

    pub fn resolve(&self, config: &FragmentationConfig) -> Result<FragmentationScheme, XlqueryError> {
        let generators = config
            .generators
            .iter()
            .map(|id| {
                self.fragments
                    .get(id.as_str())
                    .cloned()
                    .ok_or_else(|| XlqueryError::UnknownGenerator { id: id.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let losses = config
            .losses
            .iter()
            .map(|id| {
                self.losses
                    .get(id.as_str())
                    .cloned()
                    .ok_or_else(|| XlqueryError::UnknownGenerator { id: id.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Resolved fragmentation scheme: {:?} with losses {:?}",
            config.generators, config.losses
        );
        Ok(FragmentationScheme {
            generators,
            losses,
            max_loss_count: config.max_loss_count,
        })
    }
}

/// A resolved set of generators, applied together.
#[derive(Clone)]
pub struct FragmentationScheme {
    generators: Vec<Arc<dyn FragmentGenerator>>,
    losses: Vec<Arc<dyn LossGenerator>>,
    max_loss_count: u8,
}

impl std::fmt::Debug for FragmentationScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentationScheme")
            .field(
                "generators",
                &self.generators.iter().map(|g| g.id()).collect::<Vec<_>>(),
            )
            .field(
                "losses",
                &self.losses.iter().map(|g| g.id()).collect::<Vec<_>>(),
            )
            .field("max_loss_count", &self.max_loss_count)
            .finish()
    }
}

impl FragmentationScheme {
    pub fn loss_generators(&self) -> &[Arc<dyn LossGenerator>] {
        &self.losses
    }

    pub fn max_loss_count(&self) -> u8 {
        self.max_loss_count
    }

    /// All fragments of `peptide`, with losses sharing their base fragment.
    pub fn shared_fragments(
        &self,
        peptide: &Peptide,
        catalog: &Catalog,
    ) -> Result<Vec<Arc<Fragment>>, FragmentationError> {
        let mut out = Vec::new();
        for generator in self.generators.iter() {
            out.extend(generator.fragments(peptide, catalog)?.into_iter().map(Arc::new));
        }
        let bases = out.len();
        for i in 0..bases {
            let base = out[i].clone();
            for loss in self.losses.iter() {
                out.extend(
                    loss.losses(&base, &[peptide], self.max_loss_count)
                        .into_iter()
                        .map(Arc::new),
                );
            }
        }
        Ok(out)
    }

    /// Loss variants for fragments built outside the scheme (crosslinked composites).
    pub fn losses_for(&self, base: &Arc<Fragment>, peptides: &[&Peptide]) -> Vec<Arc<Fragment>> {
        self.losses
            .iter()
            .flat_map(|loss| loss.losses(base, peptides, self.max_loss_count))
            .map(Arc::new)
            .collect()
    }
}

impl FragmentGenerator for FragmentationScheme {
    fn id(&self) -> &'static str {
        "scheme"
    }

    fn fragments(
        &self,
        peptide: &Peptide,
        catalog: &Catalog,
    ) -> Result<Vec<Fragment>, FragmentationError> {
        Ok(self
            .shared_fragments(peptide, catalog)?
            .into_iter()
            .map(Arc::unwrap_or_clone)
            .collect())
    }
}
