use std::fmt::Display;
use std::ops::Add;
use std::time::Duration;

/// Outcome of the shrink pass.
///
/// Byte counts are estimates of the heap held by the mass -> ids maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShrinkStats {
    pub stored_ids: usize,
    pub deleted_ids: usize,
    pub surviving_masses: usize,
    pub deleted_masses: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,
}

impl Add for ShrinkStats {
    type Output = ShrinkStats;

    fn add(self, rhs: Self) -> Self::Output {
        ShrinkStats {
            stored_ids: self.stored_ids + rhs.stored_ids,
            deleted_ids: self.deleted_ids + rhs.deleted_ids,
            surviving_masses: self.surviving_masses + rhs.surviving_masses,
            deleted_masses: self.deleted_masses + rhs.deleted_masses,
            bytes_before: self.bytes_before + rhs.bytes_before,
            bytes_after: self.bytes_after + rhs.bytes_after,
        }
    }
}

impl Display for ShrinkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Shrink Stats:")?;
        writeln!(f, "  Stored peptide ids: {}", self.stored_ids)?;
        writeln!(f, "  Deleted peptide ids: {}", self.deleted_ids)?;
        writeln!(f, "  Surviving masses: {}", self.surviving_masses)?;
        writeln!(f, "  Deleted masses: {}", self.deleted_masses)?;
        writeln!(
            f,
            "  Memory: {:.2} MB -> {:.2} MB",
            self.bytes_before as f64 / 1e6,
            self.bytes_after as f64 / 1e6
        )?;
        Ok(())
    }
}

/// Statistics about an index build.
///
/// Usually used for logging and performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct IndexBuildStats {
    pub shard_count: usize,
    pub peptides_fragmented: usize,
    pub fragment_time: Duration,
    pub shrink_time: Duration,
    pub shrink: ShrinkStats,
}

impl Display for IndexBuildStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Index Building Stats:")?;
        writeln!(f, "Shards: {}", self.shard_count)?;
        writeln!(f, "Peptides fragmented: {}", self.peptides_fragmented)?;
        writeln!(f, "Fragmentation Time: {:.2?}", self.fragment_time)?;
        writeln!(f, "Shrink Time: {:.2?}", self.shrink_time)?;
        write!(f, "{}", self.shrink)?;
        Ok(())
    }
}

/// Size distribution of the stored id lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub distinct_masses: usize,
    pub stored_ids: usize,
    pub min_ids_per_mass: usize,
    pub max_ids_per_mass: usize,
}

impl IndexStats {
    pub(crate) fn observe(&mut self, list_len: usize) {
        if self.distinct_masses == 0 {
            self.min_ids_per_mass = list_len;
            self.max_ids_per_mass = list_len;
        } else {
            self.min_ids_per_mass = self.min_ids_per_mass.min(list_len);
            self.max_ids_per_mass = self.max_ids_per_mass.max(list_len);
        }
        self.distinct_masses += 1;
        self.stored_ids += list_len;
    }

    pub fn mean_ids_per_mass(&self) -> f64 {
        if self.distinct_masses == 0 {
            0.0
        } else {
            self.stored_ids as f64 / self.distinct_masses as f64
        }
    }
}

impl Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "==============================")?;
        writeln!(f, "==        Statistic        ===")?;
        writeln!(f, "==============================")?;
        writeln!(f, "==distinct masses: {}", self.distinct_masses)?;
        writeln!(f, "==min peptides per mass: {}", self.min_ids_per_mass)?;
        writeln!(f, "==max peptides per mass: {}", self.max_ids_per_mass)?;
        writeln!(
            f,
            "==average peptides per mass: {:.3}",
            self.mean_ids_per_mass()
        )?;
        write!(f, "==============================")
    }
}
