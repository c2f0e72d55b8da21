use crate::models::SpectrumMatch;
use crate::resolution::{
    Resolution,
    SiteResolver,
};
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;
use std::time::{
    Duration,
    Instant,
};
use tracing::{
    info,
    instrument,
};
use xlquery::StopFlag;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMode {
    #[default]
    Plain,
    Weighted,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub resolved: usize,
    pub unsupported: usize,
    pub retracted: usize,
    /// The stop flag was seen before every match was resolved.
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl Display for BatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BatchOutcome(resolved: {}, unsupported: {}, retracted: {}, cancelled: {}, elapsed: {:?})",
            self.resolved, self.unsupported, self.retracted, self.cancelled, self.elapsed
        )
    }
}

impl BatchOutcome {
    fn observe(mut self, res: Option<Resolution>) -> Self {
        match res {
            None => self.cancelled = true,
            Some(res) if res.sites.is_supported() => {
                self.resolved += 1;
                self.retracted += res.retracted;
            }
            Some(_) => {
                self.resolved += 1;
                self.unsupported += 1;
            }
        }
        self
    }

    fn merge(mut self, other: Self) -> Self {
        self.resolved += other.resolved;
        self.unsupported += other.unsupported;
        self.retracted += other.retracted;
        self.cancelled |= other.cancelled;
        self
    }
}

/// Resolves every match in parallel, each exactly once.
///
/// Matches share no state, so each is handled by whichever worker picks it
/// up. The stop flag is checked before every match; matches skipped after
/// a stop keep their unset sites.
#[instrument(level = "debug", skip_all, fields(matches = matches.len()))]
pub fn resolve_all(
    matches: &mut [SpectrumMatch],
    resolver: &SiteResolver<'_>,
    mode: ResolutionMode,
    stop: &StopFlag,
) -> BatchOutcome {
    let start = Instant::now();
    let mut outcome = matches
        .par_iter_mut()
        .map(|m| {
            if stop.is_stopped() {
                return None;
            }
            Some(match mode {
                ResolutionMode::Plain => resolver.resolve(m),
                ResolutionMode::Weighted => resolver.resolve_weighted(m).0,
            })
        })
        .fold(BatchOutcome::default, BatchOutcome::observe)
        .reduce(BatchOutcome::default, BatchOutcome::merge);
    outcome.elapsed = start.elapsed();
    info!("{}", outcome);
    outcome
}
