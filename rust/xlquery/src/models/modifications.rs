use super::chemistry::Modification;
use super::peptide::Peptide;
use tracing::warn;

/// Bounded enumeration of variable modification variants of one peptide.
///
/// Yields the unmodified peptide first, then every combination of at most
/// `max_depth` variable modifications placed on distinct positions, in
/// lexicographic order of the modified positions. Stops after `max_count`
/// peptides in total.
///
/// ```
/// use xlquery::{Catalog, Modification, ModificationEnumerator, Peptide};
///
/// let catalog = Catalog::default();
/// let ox = Modification { name: "ox".into(), residue: 'M', delta_mass: 15.994915 };
/// let pep = Peptide::try_new("PMMK", &catalog).unwrap();
/// let variants: Vec<_> = ModificationEnumerator::new(&pep, &[ox], 2, 100).collect();
/// assert_eq!(variants.len(), 4);
/// ```
pub struct ModificationEnumerator<'a> {
    base: &'a Peptide,
    sites: Vec<(usize, &'a Modification)>,
    max_depth: usize,
    max_count: usize,
    emitted: usize,
    stack: Vec<usize>,
    started: bool,
    exhausted: bool,
}

impl<'a> ModificationEnumerator<'a> {
    pub fn new(
        base: &'a Peptide,
        variable_modifications: &'a [Modification],
        max_depth: usize,
        max_count: usize,
    ) -> Self {
        let mut sites = Vec::new();
        for position in 0..base.len() {
            // Fixed or previously applied modifications are not stacked on.
            if base.modification_at(position).is_some() {
                continue;
            }
            let Some(residue) = base.residue_at(position) else {
                continue;
            };
            for modification in variable_modifications
                .iter()
                .filter(|m| m.residue == residue)
            {
                sites.push((position, modification));
            }
        }
        Self {
            base,
            sites,
            max_depth,
            max_count,
            emitted: 0,
            stack: Vec::with_capacity(max_depth),
            started: false,
            exhausted: false,
        }
    }

    /// Number of (position, modification) pairs that can be applied.
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    fn next_site(&self, from: usize) -> Option<usize> {
        let min_position = self
            .stack
            .last()
            .map(|&i| self.sites[i].0 + 1)
            .unwrap_or(0);
        (from..self.sites.len()).find(|&j| self.sites[j].0 >= min_position)
    }

    fn advance(&mut self) -> bool {
        if self.stack.len() < self.max_depth {
            let from = self.stack.last().map(|i| i + 1).unwrap_or(0);
            if let Some(j) = self.next_site(from) {
                self.stack.push(j);
                return true;
            }
        }
        while let Some(i) = self.stack.pop() {
            if let Some(j) = self.next_site(i + 1) {
                self.stack.push(j);
                return true;
            }
        }
        false
    }

    fn materialize(&self) -> Option<Peptide> {
        let mut out = self.base.clone();
        for &i in self.stack.iter() {
            let (position, modification) = self.sites[i];
            match out.with_modification(position, modification.clone()) {
                Ok(x) => out = x,
                Err(e) => {
                    warn!("Skipping modification variant of {}: {}", self.base, e);
                    return None;
                }
            }
        }
        Some(out)
    }
}

impl Iterator for ModificationEnumerator<'_> {
    type Item = Peptide;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted >= self.max_count || self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            self.emitted += 1;
            return Some(self.base.clone());
        }
        while self.advance() {
            if let Some(pep) = self.materialize() {
                self.emitted += 1;
                return Some(pep);
            }
        }
        self.exhausted = true;
        None
    }
}
