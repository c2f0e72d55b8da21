#![doc = include_str!("../README.md")]

pub use crate::batch::{
    BatchOutcome,
    ResolutionMode,
    resolve_all,
};
pub use crate::candidates::{
    AlphaCandidate,
    CandidateOptions,
    alpha_candidates,
};
pub use crate::crosslinker::{
    CrossLinker,
    OpenModificationLinker,
    ResidueRestrictedCrossLinker,
};
pub use crate::matching::{
    FragmentMatcher,
    MatchBuilder,
};
pub use crate::models::{
    LinkSites,
    MatchedBaseFragment,
    MatchedFragmentCollection,
    PeakAnnotation,
    Spectrum,
    SpectrumMatch,
    SpectrumPeak,
};
pub use crate::resolution::{
    Resolution,
    SiteConfidence,
    SiteResolver,
};

pub mod batch;
pub mod candidates;
pub mod crosslinker;
pub mod errors;
pub mod matching;
pub mod models;
pub mod resolution;

pub use crate::errors::XlseekError;
