pub mod tolerance_ranges;

pub use tolerance_ranges::{
    TupleRange,
    TupleRangeError,
    binary_search_range_by_key,
};
