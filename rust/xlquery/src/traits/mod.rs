pub mod fragment_lookup;
pub mod peptide_source;

pub use fragment_lookup::FragmentLookup;
pub use peptide_source::PeptideSource;
