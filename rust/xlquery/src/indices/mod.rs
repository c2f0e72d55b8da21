pub mod builder;
pub mod disk_index;
pub mod mass_index;
pub mod query;
pub mod stats;

pub use builder::{
    BuildOptions,
    IndexBuilder,
};
pub use disk_index::{
    DEFAULT_LOOKAHEAD,
    DiskMassIndex,
};
pub use mass_index::MassIndex;
pub use query::MassQuery;
pub use stats::{
    IndexBuildStats,
    IndexStats,
    ShrinkStats,
};
