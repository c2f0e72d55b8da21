use super::mass_index::write_dump_line;
use super::query::MassQuery;
use super::stats::ShrinkStats;
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
use crate::utils::{
    TupleRange,
    binary_search_range_by_key,
};
use rusqlite::{
    Connection,
    params,
};
use std::io::Write;
use std::path::Path;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};
use tracing::{
    debug,
    info,
};

/// Extra mass loaded past the end of a query window.
pub const DEFAULT_LOOKAHEAD: f64 = 20.0;

const SCHEMA: &str = "
DROP TABLE IF EXISTS fragments;
CREATE TABLE fragments (
    peptide_id INTEGER NOT NULL,
    mass REAL NOT NULL,
    PRIMARY KEY (mass, peptide_id)
);
";

/// Rows of one contiguous mass range, sorted by mass.
#[derive(Debug)]
struct CachedWindow {
    range: TupleRange<f64>,
    rows: Vec<(f64, PeptideId)>,
}

/// Fragment mass index stored in SQLite.
///
/// Answers the same queries as [`crate::MassIndex`] with the same results,
/// but keeps only the rows of the most recently touched mass window in
/// memory. Windows are loaded with some look-ahead since spectra are
/// usually walked in ascending m/z.
pub struct DiskMassIndex {
    conn: Mutex<Connection>,
    cache: Mutex<Option<CachedWindow>>,
    lookahead: f64,
    peptides: Arc<dyn PeptideSource>,
    tolerance: ToleranceUnit,
    last_fragmented: Option<PeptideId>,
}

impl std::fmt::Display for DiskMassIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DiskMassIndex(peptides: {}, tolerance: {}, lookahead: {})",
            self.peptides.len(),
            self.tolerance,
            self.lookahead
        )
    }
}

impl std::fmt::Debug for DiskMassIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DiskMassIndex {
    /// Creates an empty store, replacing any fragment table at `path`.
    pub(crate) fn create(
        path: Option<&Path>,
        peptides: Arc<dyn PeptideSource>,
        tolerance: ToleranceUnit,
    ) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)?,
            None => Connection::open_in_memory()?,
        };
        conn.execute_batch(SCHEMA)?;
        Ok(Self::with_connection(conn, peptides, tolerance))
    }

    /// Opens a store written by an earlier build over the same peptides.
    pub fn open(
        path: &Path,
        peptides: Arc<dyn PeptideSource>,
        tolerance: ToleranceUnit,
    ) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Fails early when the table is missing.
        conn.query_row("SELECT count(*) FROM fragments LIMIT 1", [], |r| {
            r.get::<_, i64>(0)
        })?;
        info!("Opened fragment store at {}", path.display());
        Ok(Self::with_connection(conn, peptides, tolerance))
    }

    fn with_connection(
        conn: Connection,
        peptides: Arc<dyn PeptideSource>,
        tolerance: ToleranceUnit,
    ) -> Self {
        Self {
            conn: Mutex::new(conn),
            cache: Mutex::new(None),
            lookahead: DEFAULT_LOOKAHEAD,
            peptides,
            tolerance,
            last_fragmented: None,
        }
    }

    pub fn with_lookahead(mut self, lookahead: f64) -> Self {
        self.lookahead = lookahead.max(0.0);
        self
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    pub fn last_fragmented_peptide(&self) -> Option<PeptideId> {
        self.last_fragmented
    }

    pub(crate) fn set_last_fragmented(&mut self, id: Option<PeptideId>) {
        self.last_fragmented = id;
    }

    /// Inserts one batch of `(mass, id)` rows in a single transaction.
    ///
    /// Repeated pairs are ignored.
    pub(crate) fn insert_rows(&mut self, rows: &[(f64, PeptideId)]) -> Result<()> {
        let conn = self
            .conn
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO fragments (mass, peptide_id) VALUES (?1, ?2)",
            )?;
            for (mass, id) in rows {
                stmt.execute(params![mass, id.0])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn scalar(&self, sql: &str) -> Result<usize> {
        let conn = lock(&self.conn);
        let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
        Ok(n.max(0) as usize)
    }

    fn store_bytes(&self) -> Result<usize> {
        self.scalar("SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()")
    }

    /// Deletes every mass with more than `cap` rows, then reclaims space.
    pub(crate) fn finalize(&mut self, cap: Option<usize>) -> Result<ShrinkStats> {
        let bytes_before = self.store_bytes()?;
        let masses_before = self.mass_count()?;
        let rows_before = self.fragment_count()?;
        if let Some(cap) = cap {
            let conn = lock(&self.conn);
            let deleted = conn.execute(
                "DELETE FROM fragments WHERE mass IN \
                 (SELECT mass FROM fragments GROUP BY mass HAVING count(*) > ?1)",
                params![cap as i64],
            )?;
            debug!("Deleted {} rows above the candidate cap", deleted);
            if deleted > 0 {
                conn.execute_batch("VACUUM")?;
            }
        }
        lock(&self.cache).take();
        let stored_ids = self.fragment_count()?;
        let surviving_masses = self.mass_count()?;
        Ok(ShrinkStats {
            stored_ids,
            deleted_ids: rows_before - stored_ids,
            surviving_masses,
            deleted_masses: masses_before - surviving_masses,
            bytes_before,
            bytes_after: self.store_bytes()?,
        })
    }

    pub fn mass_count(&self) -> Result<usize> {
        self.scalar("SELECT count(DISTINCT mass) FROM fragments")
    }

    fn load(&self, range: TupleRange<f64>) -> Result<Vec<(f64, PeptideId)>> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare_cached(
            "SELECT mass, peptide_id FROM fragments \
             WHERE mass BETWEEN ?1 AND ?2 ORDER BY mass, peptide_id",
        )?;
        let rows = stmt
            .query_map(params![range.start(), range.end()], |r| {
                Ok((r.get::<_, f64>(0)?, PeptideId(r.get::<_, u32>(1)?)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Rows inside `window`, served from the cached window when it covers it.
    fn rows_in(&self, window: TupleRange<f64>) -> Result<Vec<(f64, PeptideId)>> {
        let mut cache = lock(&self.cache);
        let hit = cache.as_ref().is_some_and(|c| c.range.covers(&window));
        if !hit {
            let end = window.end().max(window.start() + self.lookahead);
            let range = TupleRange::try_new(window.start(), end).unwrap_or(window);
            let rows = self.load(range)?;
            debug!(
                "Loaded {} rows for [{:.4}, {:.4}]",
                rows.len(),
                range.start(),
                range.end()
            );
            *cache = Some(CachedWindow { range, rows });
        }
        let Some(cached) = cache.as_ref() else {
            return Ok(Vec::new());
        };
        let found = binary_search_range_by_key(&cached.rows, window.as_inclusive_range(), |r| r.0);
        Ok(cached.rows[found].to_vec())
    }

    fn resolve_ids(&self, mut ids: Vec<PeptideId>) -> Vec<&Peptide> {
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| self.peptides.get(id))
            .collect()
    }
}

impl FragmentLookup for DiskMassIndex {
    fn query(&self, query: &MassQuery) -> Result<Vec<&Peptide>> {
        let window = self.tolerance.window(query.mass, query.reference_mass);
        let rows = self.rows_in(window)?;
        if query.max_candidates.is_some_and(|max| rows.len() > max) {
            return Ok(Vec::new());
        }
        let ids = rows.into_iter().map(|(_, id)| id).collect();
        Ok(self
            .resolve_ids(ids)
            .into_iter()
            .filter(|p| query.below_ceiling(p.mass()))
            .collect())
    }

    fn count(&self, mass: f64, reference_mass: Option<f64>) -> Result<usize> {
        let window = self.tolerance.window(mass, reference_mass);
        {
            let cache = lock(&self.cache);
            if let Some(cached) = cache.as_ref().filter(|c| c.range.covers(&window)) {
                let found =
                    binary_search_range_by_key(&cached.rows, window.as_inclusive_range(), |r| r.0);
                return Ok(found.len());
            }
        }
        let conn = lock(&self.conn);
        let n: i64 = conn.query_row(
            "SELECT count(*) FROM fragments WHERE mass BETWEEN ?1 AND ?2",
            params![window.start(), window.end()],
            |r| r.get(0),
        )?;
        Ok(n.max(0) as usize)
    }

    fn exact(&self, mass: f64) -> Result<Vec<&Peptide>> {
        let ids = {
            let conn = lock(&self.conn);
            let mut stmt = conn
                .prepare_cached("SELECT peptide_id FROM fragments WHERE mass = ?1")?;
            stmt.query_map(params![mass], |r| Ok(PeptideId(r.get::<_, u32>(0)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(self.resolve_ids(ids))
    }

    fn dump(&self, out: &mut dyn Write) -> Result<()> {
        let rows = {
            let conn = lock(&self.conn);
            let mut stmt =
                conn.prepare("SELECT mass, peptide_id FROM fragments ORDER BY mass, peptide_id")?;
            stmt.query_map([], |r| {
                Ok((r.get::<_, f64>(0)?, PeptideId(r.get::<_, u32>(1)?)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
        };
        for group in rows.chunk_by(|a, b| a.0.to_bits() == b.0.to_bits()) {
            let mass = group[0].0;
            let mut peptides = self.resolve_ids(group.iter().map(|(_, id)| *id).collect());
            write_dump_line(out, mass, &mut peptides)?;
        }
        Ok(())
    }

    fn fragment_count(&self) -> Result<usize> {
        self.scalar("SELECT count(*) FROM fragments")
    }

    fn peptides(&self) -> &dyn PeptideSource {
        self.peptides.as_ref()
    }

    fn tolerance(&self) -> ToleranceUnit {
        self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chemistry::Catalog;
    use crate::models::peptide_table::PeptideTable;

    fn store() -> DiskMassIndex {
        let catalog = Catalog::default();
        let table: PeptideTable = ["GGK", "AAK", "PEPTIDEK"]
            .iter()
            .map(|s| Peptide::try_new(s, &catalog).unwrap())
            .collect();
        let mut store =
            DiskMassIndex::create(None, Arc::new(table), ToleranceUnit::Absolute(0.5)).unwrap();
        store
            .insert_rows(&[
                (100.0, PeptideId(0)),
                (100.0, PeptideId(1)),
                (100.0, PeptideId(0)),
                (150.0, PeptideId(2)),
                (300.0, PeptideId(1)),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_repeated_pairs_are_stored_once() {
        let store = store();
        assert_eq!(store.fragment_count().unwrap(), 4);
        assert_eq!(store.mass_count().unwrap(), 3);
    }

    #[test]
    fn test_cache_window_serves_follow_up_queries() {
        let store = store().with_lookahead(100.0);
        let first = store.query(&MassQuery::new(100.0)).unwrap();
        assert_eq!(first.len(), 2);
        {
            let cache = lock(&store.cache);
            let cached = cache.as_ref().unwrap();
            assert_eq!(cached.range.start(), 99.5);
            assert_eq!(cached.range.end(), 199.5);
            assert_eq!(cached.rows.len(), 3);
        }
        // inside the cached window
        assert_eq!(store.count(150.0, None).unwrap(), 1);
        // outside, falls back to SQL
        assert_eq!(store.count(300.0, None).unwrap(), 1);
        let far = store.query(&MassQuery::new(300.0)).unwrap();
        assert_eq!(far[0].sequence(), "AAK");
    }

    #[test]
    fn test_summary_line() {
        let store = store().with_lookahead(50.0);
        assert_eq!(
            store.to_string(),
            "DiskMassIndex(peptides: 3, tolerance: 0.5 da, lookahead: 50)"
        );
        assert_eq!(format!("{:?}", store), store.to_string());
    }

    #[test]
    fn test_finalize_drops_over_cap() {
        let mut store = store();
        let stats = store.finalize(Some(1)).unwrap();
        assert_eq!(stats.deleted_masses, 1);
        assert_eq!(stats.deleted_ids, 2);
        assert!(store.exact(100.0).unwrap().is_empty());
        assert_eq!(store.exact(150.0).unwrap().len(), 1);
    }
}
