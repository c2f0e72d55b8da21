pub mod chemistry;
pub mod fragment;
pub mod modifications;
pub mod peptide;
pub mod peptide_table;
pub mod tolerance;

pub use chemistry::{
    Catalog,
    ChemistryError,
    Modification,
};
pub use fragment::{
    Fragment,
    FragmentKind,
    IonSeriesTerminality,
    IonType,
    NeutralLoss,
    PeptideSpan,
};
pub use modifications::ModificationEnumerator;
pub use peptide::{
    Peptide,
    PeptideId,
    SequenceOrigin,
};
pub use peptide_table::PeptideTable;
pub use tolerance::{
    ToleranceParseError,
    ToleranceUnit,
};
