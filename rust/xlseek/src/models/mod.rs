pub mod matched_fragments;
pub mod spectrum;
pub mod spectrum_match;

pub use matched_fragments::{
    MatchedBaseFragment,
    MatchedFragmentCollection,
};
pub use spectrum::{
    PeakAnnotation,
    Spectrum,
    SpectrumPeak,
    SpectrumRecord,
    read_spectra,
};
pub use spectrum_match::{
    LinkSites,
    SpectrumMatch,
};
