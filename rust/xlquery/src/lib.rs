#![doc = include_str!("../README.md")]

// Re-export main structures
pub use crate::indices::{
    BuildOptions,
    DiskMassIndex,
    IndexBuildStats,
    IndexBuilder,
    IndexStats,
    MassIndex,
    MassQuery,
    ShrinkStats,
};
pub use crate::instrumentation::{
    BuildPhase,
    BuildStatus,
    StatusMultiplex,
    StatusSink,
    StopFlag,
    TracingStatus,
};
pub use crate::models::{
    Catalog,
    Fragment,
    FragmentKind,
    IonType,
    Modification,
    ModificationEnumerator,
    Peptide,
    PeptideId,
    PeptideSpan,
    PeptideTable,
    SequenceOrigin,
    ToleranceUnit,
};

// Re-export traits
pub use crate::fragmentation::{
    FragmentGenerator,
    LossGenerator,
};
pub use crate::traits::{
    FragmentLookup,
    PeptideSource,
};

// Declare modules
pub mod errors;
pub mod fragmentation;
pub mod indices;
pub mod instrumentation;
pub mod models;
pub mod traits;
pub mod utils;
pub use crate::utils::TupleRange;

// Re-export errors
pub use crate::errors::XlqueryError;
