use super::query::MassQuery;
use super::stats::{
    IndexStats,
    ShrinkStats,
};
use crate::errors::Result;
use crate::models::peptide::{
    Peptide,
    PeptideId,
};
use crate::models::tolerance::ToleranceUnit;
use crate::traits::{
    FragmentLookup,
    PeptideSource,
};
use crate::utils::TupleRange;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::collections::{
    BTreeMap,
    HashMap,
    HashSet,
};
use std::io::Write;
use std::mem::size_of;
use std::sync::Arc;
use tracing::{
    debug,
    instrument,
};

type MassKey = OrderedFloat<f64>;

/// One worker's private mass -> peptide ids map.
///
/// Keys are the exact fragment masses; two fragments share an entry only
/// if their masses are bit-identical.
#[derive(Debug, Default)]
pub(crate) struct Shard {
    entries: BTreeMap<MassKey, Vec<PeptideId>>,
}

impl Shard {
    pub(crate) fn extend(&mut self, rows: Vec<(f64, PeptideId)>) {
        for (mass, id) in rows {
            self.entries.entry(OrderedFloat(mass)).or_default().push(id);
        }
    }

    fn heap_bytes(&self) -> usize {
        let per_entry = size_of::<MassKey>() + size_of::<Vec<PeptideId>>();
        self.entries
            .values()
            .map(|v| per_entry + v.capacity() * size_of::<PeptideId>())
            .sum()
    }

    fn stored_ids(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    /// Sorts every id list and drops repeated ids.
    fn normalize(&mut self) {
        for ids in self.entries.values_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
    }

    fn drop_keys(&mut self, over_cap: &HashSet<MassKey>, bytes_before: usize) -> ShrinkStats {
        let mut stats = ShrinkStats {
            bytes_before,
            ..Default::default()
        };
        self.entries.retain(|k, ids| {
            if over_cap.contains(k) {
                stats.deleted_ids += ids.len();
                stats.deleted_masses += 1;
                false
            } else {
                true
            }
        });
        for ids in self.entries.values_mut() {
            ids.shrink_to_fit();
        }
        stats.stored_ids = self.stored_ids();
        stats.surviving_masses = self.entries.len();
        stats.bytes_after = self.heap_bytes();
        stats
    }

    fn window(&self, window: TupleRange<f64>) -> impl Iterator<Item = (&MassKey, &Vec<PeptideId>)> {
        self.entries
            .range(OrderedFloat(window.start())..=OrderedFloat(window.end()))
    }
}

/// Sorts the id lists of every shard and removes the masses whose total id
/// count over all shards is above `cap`.
///
/// The cap is applied to the merged count so the surviving set does not
/// depend on how peptides were spread over shards.
#[instrument(level = "debug", skip_all)]
pub(crate) fn shrink_shards(shards: &mut [Shard], cap: Option<usize>) -> ShrinkStats {
    let bytes_before: Vec<usize> = shards
        .par_iter_mut()
        .map(|s| {
            let bytes = s.heap_bytes();
            s.normalize();
            bytes
        })
        .collect();

    let over_cap: HashSet<MassKey> = match cap {
        None => HashSet::new(),
        Some(cap) => {
            let mut totals: HashMap<MassKey, usize> = HashMap::new();
            for shard in shards.iter() {
                for (k, ids) in shard.entries.iter() {
                    *totals.entry(*k).or_default() += ids.len();
                }
            }
            totals
                .into_iter()
                .filter(|(_, n)| *n > cap)
                .map(|(k, _)| k)
                .collect()
        }
    };
    debug!("{} masses above the candidate cap", over_cap.len());

    let mut stats = shards
        .par_iter_mut()
        .zip(bytes_before)
        .map(|(s, bytes)| s.drop_keys(&over_cap, bytes))
        .reduce(ShrinkStats::default, |a, b| a + b);
    // A mass split over shards was counted once per shard above.
    stats.deleted_masses = over_cap.len();
    stats
}

/// In-memory fragment mass index.
///
/// Built by [`crate::IndexBuilder::build`]; immutable afterwards, so any
/// number of threads may query it at once.
pub struct MassIndex {
    shards: Vec<Shard>,
    peptides: Arc<dyn PeptideSource>,
    tolerance: ToleranceUnit,
    last_fragmented: Option<PeptideId>,
}

impl std::fmt::Display for MassIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MassIndex(shards: {}, peptides: {}, tolerance: {})",
            self.shards.len(),
            self.peptides.len(),
            self.tolerance
        )
    }
}

impl std::fmt::Debug for MassIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl MassIndex {
    pub(crate) fn from_shards(
        shards: Vec<Shard>,
        peptides: Arc<dyn PeptideSource>,
        tolerance: ToleranceUnit,
        last_fragmented: Option<PeptideId>,
    ) -> Self {
        Self {
            shards,
            peptides,
            tolerance,
            last_fragmented,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Id of the last peptide fragmented; resume a capped build after it.
    pub fn last_fragmented_peptide(&self) -> Option<PeptideId> {
        self.last_fragmented
    }

    /// Number of distinct stored masses.
    pub fn mass_count(&self) -> usize {
        self.merged().len()
    }

    pub fn stats(&self) -> IndexStats {
        let mut out = IndexStats::default();
        for ids in self.merged().values() {
            out.observe(ids.len());
        }
        out
    }

    fn count_in(&self, window: TupleRange<f64>) -> usize {
        self.shards
            .iter()
            .flat_map(|s| s.window(window))
            .map(|(_, ids)| ids.len())
            .sum()
    }

    fn resolve_ids(&self, mut ids: Vec<PeptideId>) -> Vec<&Peptide> {
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| self.peptides.get(id))
            .collect()
    }

    /// All stored masses with their ids, shards merged.
    fn merged(&self) -> BTreeMap<MassKey, Vec<PeptideId>> {
        let mut out: BTreeMap<MassKey, Vec<PeptideId>> = BTreeMap::new();
        for shard in self.shards.iter() {
            for (k, ids) in shard.entries.iter() {
                out.entry(*k).or_default().extend(ids.iter().copied());
            }
        }
        for ids in out.values_mut() {
            ids.sort_unstable();
        }
        out
    }

    /// Writes one `mass,peptideId` line per stored pair, ascending by mass.
    pub fn write_out(&self, out: &mut dyn Write) -> Result<()> {
        for (mass, ids) in self.merged() {
            for id in ids {
                writeln!(out, "{},{}", mass, id)?;
            }
        }
        Ok(())
    }
}

/// Label used in dumps: `PROTEIN:DESCRIPTOR` when the origin is known.
pub(crate) fn dump_label(peptide: &Peptide) -> String {
    match peptide.origins().first() {
        Some(origin) => format!("{}:{}", origin.protein, peptide.descriptor()),
        None => peptide.descriptor(),
    }
}

pub(crate) fn write_dump_line(out: &mut dyn Write, mass: f64, peptides: &mut [&Peptide]) -> Result<()> {
    peptides.sort_by(|a, b| {
        a.len()
            .cmp(&b.len())
            .then_with(|| a.descriptor().cmp(&b.descriptor()))
    });
    write!(out, "{}", mass)?;
    for p in peptides.iter() {
        write!(out, ", {}", dump_label(p))?;
    }
    writeln!(out)?;
    Ok(())
}

impl FragmentLookup for MassIndex {
    fn query(&self, query: &MassQuery) -> Result<Vec<&Peptide>> {
        let window = self.tolerance.window(query.mass, query.reference_mass);
        if let Some(max) = query.max_candidates {
            if self.count_in(window) > max {
                return Ok(Vec::new());
            }
        }
        let ids: Vec<PeptideId> = self
            .shards
            .iter()
            .flat_map(|s| s.window(window))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        Ok(self
            .resolve_ids(ids)
            .into_iter()
            .filter(|p| query.below_ceiling(p.mass()))
            .collect())
    }

    fn count(&self, mass: f64, reference_mass: Option<f64>) -> Result<usize> {
        Ok(self.count_in(self.tolerance.window(mass, reference_mass)))
    }

    fn exact(&self, mass: f64) -> Result<Vec<&Peptide>> {
        let key = OrderedFloat(mass);
        let ids: Vec<PeptideId> = self
            .shards
            .iter()
            .filter_map(|s| s.entries.get(&key))
            .flat_map(|ids| ids.iter().copied())
            .collect();
        Ok(self.resolve_ids(ids))
    }

    fn dump(&self, out: &mut dyn Write) -> Result<()> {
        for (mass, ids) in self.merged() {
            let mut peptides = self.resolve_ids(ids);
            write_dump_line(out, mass.0, &mut peptides)?;
        }
        Ok(())
    }

    fn fragment_count(&self) -> Result<usize> {
        Ok(self.shards.iter().map(|s| s.stored_ids()).sum())
    }

    fn peptides(&self) -> &dyn PeptideSource {
        self.peptides.as_ref()
    }

    fn tolerance(&self) -> ToleranceUnit {
        self.tolerance
    }
}
