use super::disk_index::DiskMassIndex;
use super::mass_index::{
    MassIndex,
    Shard,
    shrink_shards,
};
use super::stats::IndexBuildStats;
use crate::errors::{
    Result,
    XlqueryError,
};
use crate::fragmentation::FragmentGenerator;
use crate::instrumentation::{
    BuildPhase,
    BuildStatus,
    StatusMultiplex,
    StatusSink,
    StopFlag,
};
use crate::models::chemistry::Catalog;
use crate::models::peptide::{
    Peptide,
    PeptideId,
};
use crate::models::tolerance::ToleranceUnit;
use crate::traits::PeptideSource;
use crate::utils::TupleRange;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};
use std::sync::mpsc::sync_channel;
use std::time::Instant;
use tracing::{
    debug,
    error,
    info,
    instrument,
    warn,
};

/// Mass bands (or peptide chunks) handed out per shard.
const UNITS_PER_SHARD: usize = 10;

/// Knobs of an index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Number of workers, each owning one shard.
    pub shard_count: usize,
    /// Masses holding more peptide ids than this are dropped after the build.
    pub candidate_cap: Option<usize>,
    /// Peptides heavier than this are not fragmented.
    pub mass_ceiling: Option<f64>,
    /// Fragment at most this many peptides, in id order.
    pub max_peptides: Option<usize>,
    /// Skip every peptide up to and including this id.
    pub resume_after: Option<PeptideId>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            shard_count: rayon::current_num_threads(),
            candidate_cap: None,
            mass_ceiling: None,
            max_peptides: None,
            resume_after: None,
        }
    }
}

impl BuildOptions {
    fn is_capped(&self) -> bool {
        self.max_peptides.is_some() || self.resume_after.is_some()
    }
}

/// How the peptides are split into claimable units of work.
///
/// Uncapped builds walk the source in mass bands so every worker sees
/// peptides of similar size. Capped or resumed builds need id order, so
/// they walk fixed-size chunks of the selected ids instead.
pub(crate) enum WorkPlan<'a> {
    Bands {
        width: f64,
        count: usize,
        ceiling: Option<f64>,
    },
    Chunks {
        peptides: Vec<&'a Peptide>,
        chunk_size: usize,
    },
}

impl<'a> WorkPlan<'a> {
    pub(crate) fn new(source: &'a dyn PeptideSource, options: &BuildOptions) -> Self {
        let units = options.shard_count.max(1) * UNITS_PER_SHARD;
        if options.is_capped() {
            let peptides: Vec<&Peptide> = source
                .iter_after(options.resume_after)
                .filter(|p| options.mass_ceiling.is_none_or(|c| p.mass() <= c))
                .take(options.max_peptides.unwrap_or(usize::MAX))
                .collect();
            let chunk_size = peptides.len().div_ceil(units).max(1);
            WorkPlan::Chunks {
                peptides,
                chunk_size,
            }
        } else {
            let max_mass = match options.mass_ceiling {
                Some(c) => source.max_mass().min(c),
                None => source.max_mass(),
            };
            WorkPlan::Bands {
                width: (max_mass + 1.0) / units as f64,
                count: units,
                ceiling: options.mass_ceiling,
            }
        }
    }

    pub(crate) fn unit_count(&self) -> usize {
        match self {
            WorkPlan::Bands { count, .. } => *count,
            WorkPlan::Chunks {
                peptides,
                chunk_size,
            } => peptides.len().div_ceil(*chunk_size),
        }
    }

    /// Peptides in unit `i`. Units are disjoint and together cover the plan.
    pub(crate) fn unit(&self, source: &'a dyn PeptideSource, i: usize) -> Vec<&'a Peptide> {
        match self {
            WorkPlan::Bands { width, ceiling, .. } => {
                let lower = i as f64 * width;
                let upper = (i + 1) as f64 * width;
                let Ok(range) = TupleRange::try_new(lower, upper) else {
                    return Vec::new();
                };
                source
                    .in_mass_range(range)
                    .into_iter()
                    .filter(|p| p.mass() < upper)
                    .filter(|p| ceiling.is_none_or(|c| p.mass() <= c))
                    .collect()
            }
            WorkPlan::Chunks {
                peptides,
                chunk_size,
            } => peptides
                .chunks(*chunk_size)
                .nth(i)
                .map(|c| c.to_vec())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn peptide_count(&self, source: &dyn PeptideSource) -> usize {
        match self {
            WorkPlan::Bands { ceiling, .. } => match ceiling {
                Some(c) => source.iter_after(None).filter(|p| p.mass() <= *c).count(),
                None => source.len(),
            },
            WorkPlan::Chunks { peptides, .. } => peptides.len(),
        }
    }

    /// Id of the last peptide a complete run of this plan fragments.
    pub(crate) fn last_peptide(&self, source: &dyn PeptideSource) -> Option<PeptideId> {
        match self {
            WorkPlan::Chunks { peptides, .. } => peptides.last().map(|p| p.id()),
            WorkPlan::Bands { ceiling, .. } => source
                .iter_after(None)
                .filter(|p| ceiling.is_none_or(|c| p.mass() <= c))
                .last()
                .map(|p| p.id()),
        }
    }
}

/// Shared state of one build: the unit cursor, progress and failure flags.
pub(crate) struct BuildContext<'a> {
    source: &'a dyn PeptideSource,
    catalog: &'a Catalog,
    generator: &'a dyn FragmentGenerator,
    plan: WorkPlan<'a>,
    status: &'a StatusMultiplex,
    stop: &'a StopFlag,
    total: usize,
    cursor: AtomicUsize,
    processed: AtomicUsize,
    failed: AtomicBool,
}

impl<'a> BuildContext<'a> {
    fn new(
        source: &'a dyn PeptideSource,
        catalog: &'a Catalog,
        generator: &'a dyn FragmentGenerator,
        options: &BuildOptions,
        status: &'a StatusMultiplex,
        stop: &'a StopFlag,
    ) -> Self {
        let plan = WorkPlan::new(source, options);
        let total = plan.peptide_count(source);
        Self {
            source,
            catalog,
            generator,
            plan,
            status,
            stop,
            total,
            cursor: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
        }
    }

    /// Claims units until none are left, handing the `(mass, id)` pairs of
    /// each unit to `emit`.
    ///
    /// The stop flag and the failure of any other worker are checked
    /// between units; both end the loop with [`XlqueryError::Cancelled`].
    fn drain_units<F>(&self, mut emit: F) -> Result<()>
    where
        F: FnMut(Vec<(f64, PeptideId)>) -> Result<()>,
    {
        let unit_count = self.plan.unit_count();
        loop {
            if self.stop.is_stopped() || self.failed.load(Ordering::Relaxed) {
                return Err(XlqueryError::Cancelled);
            }
            let unit = self.cursor.fetch_add(1, Ordering::Relaxed);
            if unit >= unit_count {
                return Ok(());
            }
            let peptides = self.plan.unit(self.source, unit);
            let mut rows = Vec::new();
            for peptide in peptides.iter() {
                let fragments = self
                    .generator
                    .fragments(peptide, self.catalog)
                    .map_err(|source| {
                        self.failed.store(true, Ordering::SeqCst);
                        error!(
                            "Fragmentation of {} (id {}) failed: {}",
                            peptide,
                            peptide.id(),
                            source
                        );
                        XlqueryError::ConfigurationDefect {
                            peptide: peptide.id(),
                            source,
                        }
                    })?;
                rows.extend(fragments.iter().map(|f| (f.mass, peptide.id())));
            }
            if let Err(e) = emit(rows) {
                self.failed.store(true, Ordering::SeqCst);
                return Err(e);
            }
            let done = self.processed.fetch_add(peptides.len(), Ordering::Relaxed) + peptides.len();
            self.status.publish(&BuildStatus {
                phase: BuildPhase::Fragmenting,
                done,
                total: self.total,
            });
        }
    }
}

/// Reduces per-worker outcomes to one, preferring the most specific error.
///
/// A configuration defect in one worker makes the others stop with
/// `Cancelled`, so the defect is what gets reported.
pub(crate) fn collect_worker_results<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(results.len());
    let mut cancelled = false;
    let mut first_error = None;
    for res in results {
        match res {
            Ok(x) => out.push(x),
            Err(XlqueryError::Cancelled) => cancelled = true,
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    match (first_error, cancelled) {
        (Some(e), _) => Err(e),
        (None, true) => Err(XlqueryError::Cancelled),
        (None, false) => Ok(out),
    }
}

/// Builds a fragment index over a peptide source.
///
/// ```
/// use std::sync::Arc;
/// use xlquery::{BuildOptions, Catalog, IndexBuilder, Peptide, PeptideTable, FragmentLookup, MassQuery};
/// use xlquery::fragmentation::IonSeriesGenerator;
///
/// let catalog = Arc::new(Catalog::default());
/// let table: PeptideTable = ["PEPTIDEK", "KLINKER"]
///     .iter()
///     .map(|s| Peptide::try_new(s, &catalog).unwrap())
///     .collect();
/// let (index, _stats) = IndexBuilder::new(Arc::new(table), catalog, Arc::new(IonSeriesGenerator::Y))
///     .with_options(BuildOptions { shard_count: 2, ..Default::default() })
///     .build()
///     .unwrap();
/// assert!(index.fragment_count().unwrap() > 0);
/// ```
pub struct IndexBuilder {
    peptides: Arc<dyn PeptideSource>,
    catalog: Arc<Catalog>,
    generator: Arc<dyn FragmentGenerator>,
    tolerance: ToleranceUnit,
    options: BuildOptions,
    status: StatusMultiplex,
    stop: StopFlag,
}

impl IndexBuilder {
    pub fn new(
        peptides: Arc<dyn PeptideSource>,
        catalog: Arc<Catalog>,
        generator: Arc<dyn FragmentGenerator>,
    ) -> Self {
        Self {
            peptides,
            catalog,
            generator,
            tolerance: ToleranceUnit::default(),
            options: BuildOptions::default(),
            status: StatusMultiplex::new(),
            stop: StopFlag::new(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: ToleranceUnit) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_status(mut self, status: StatusMultiplex) -> Self {
        self.status = status;
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.options.shard_count == 0 {
            return Err(XlqueryError::InvalidOptions {
                msg: "shard_count must be at least 1".into(),
            });
        }
        if self.options.candidate_cap == Some(0) {
            return Err(XlqueryError::InvalidOptions {
                msg: "candidate_cap must be at least 1".into(),
            });
        }
        Ok(())
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.shard_count)
            .thread_name(|i| format!("xlquery-shard-{}", i))
            .build()
            .map_err(|e| XlqueryError::InvalidOptions {
                msg: format!("Unable to start shard workers: {}", e),
            })
    }

    /// Fragments every selected peptide into per-worker shards, then shrinks them.
    #[instrument(level = "debug", skip_all)]
    pub fn build(self) -> Result<(MassIndex, IndexBuildStats)> {
        self.validate()?;
        let st = Instant::now();
        let ctx = BuildContext::new(
            self.peptides.as_ref(),
            &self.catalog,
            self.generator.as_ref(),
            &self.options,
            &self.status,
            &self.stop,
        );
        info!(
            "Fragmenting {} peptides over {} shards ({} units)",
            ctx.total,
            self.options.shard_count,
            ctx.plan.unit_count()
        );
        let pool = self.pool()?;
        let results: Vec<Result<Shard>> = pool.install(|| {
            (0..self.options.shard_count)
                .into_par_iter()
                .map(|_| {
                    let mut shard = Shard::default();
                    ctx.drain_units(|rows| {
                        shard.extend(rows);
                        Ok(())
                    })?;
                    Ok(shard)
                })
                .collect()
        });
        let mut shards = collect_worker_results(results)?;
        let fragment_time = st.elapsed();
        let peptides_fragmented = ctx.processed.load(Ordering::Relaxed);
        let last_fragmented = ctx.plan.last_peptide(self.peptides.as_ref());
        info!(
            "Fragmented {} peptides in {:#?}",
            peptides_fragmented, fragment_time
        );

        let st = Instant::now();
        self.status.publish(&BuildStatus {
            phase: BuildPhase::Shrinking,
            done: 0,
            total: shards.len(),
        });
        let shrink = pool.install(|| shrink_shards(&mut shards, self.options.candidate_cap));
        let shrink_time = st.elapsed();
        debug!("{}", shrink);
        self.status.publish(&BuildStatus {
            phase: BuildPhase::Finished,
            done: peptides_fragmented,
            total: ctx.total,
        });

        let stats = IndexBuildStats {
            shard_count: self.options.shard_count,
            peptides_fragmented,
            fragment_time,
            shrink_time,
            shrink,
        };
        info!("Index built with stats: {}", stats);
        let index = MassIndex::from_shards(
            shards,
            self.peptides.clone(),
            self.tolerance,
            last_fragmented,
        );
        Ok((index, stats))
    }

    /// Same build, with the `(mass, id)` pairs written to SQLite.
    ///
    /// Workers hand their rows to the calling thread through a bounded
    /// channel, so memory stays flat no matter how large the source is.
    /// With no `path` the store lives in memory.
    #[instrument(level = "debug", skip_all)]
    pub fn build_on_disk(self, path: Option<PathBuf>) -> Result<(DiskMassIndex, IndexBuildStats)> {
        self.validate()?;
        let st = Instant::now();
        let mut store = DiskMassIndex::create(path.as_deref(), self.peptides.clone(), self.tolerance)?;
        let ctx = BuildContext::new(
            self.peptides.as_ref(),
            &self.catalog,
            self.generator.as_ref(),
            &self.options,
            &self.status,
            &self.stop,
        );
        info!(
            "Fragmenting {} peptides over {} shards into {}",
            ctx.total,
            self.options.shard_count,
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".into())
        );
        let pool = self.pool()?;
        let (tx, rx) = sync_channel::<Vec<(f64, PeptideId)>>(self.options.shard_count * 2);
        let mut write_error = None;
        let results: Vec<Result<()>> = pool.in_place_scope(|scope| {
            let (res_tx, res_rx) = std::sync::mpsc::channel();
            for _ in 0..self.options.shard_count {
                let tx = tx.clone();
                let res_tx = res_tx.clone();
                let ctx = &ctx;
                scope.spawn(move |_| {
                    let res = ctx.drain_units(|rows| {
                        tx.send(rows).map_err(|_| XlqueryError::Cancelled)
                    });
                    // Receiver outlives the scope body.
                    let _ = res_tx.send(res);
                });
            }
            drop(tx);
            drop(res_tx);
            for rows in rx.iter() {
                if write_error.is_some() {
                    continue;
                }
                if let Err(e) = store.insert_rows(&rows) {
                    warn!("Writing fragment rows failed: {}", e);
                    ctx.failed.store(true, Ordering::SeqCst);
                    write_error = Some(e);
                }
            }
            res_rx.iter().collect()
        });
        if let Some(e) = write_error {
            return Err(e);
        }
        collect_worker_results(results)?;
        let fragment_time = st.elapsed();
        let peptides_fragmented = ctx.processed.load(Ordering::Relaxed);

        let st = Instant::now();
        self.status.publish(&BuildStatus {
            phase: BuildPhase::Shrinking,
            done: 0,
            total: 1,
        });
        let shrink = store.finalize(self.options.candidate_cap)?;
        let shrink_time = st.elapsed();
        self.status.publish(&BuildStatus {
            phase: BuildPhase::Finished,
            done: peptides_fragmented,
            total: ctx.total,
        });
        let stats = IndexBuildStats {
            shard_count: self.options.shard_count,
            peptides_fragmented,
            fragment_time,
            shrink_time,
            shrink,
        };
        info!("Disk index built with stats: {}", stats);
        store.set_last_fragmented(ctx.plan.last_peptide(self.peptides.as_ref()));
        Ok((store, stats))
    }
}
