use serde::{
    Deserialize,
    Serialize,
};
use std::ops::{
    Range,
    RangeInclusive,
};
use thiserror::Error;

/// Closed mass interval `[start, end]`.
///
/// Both ends are inclusive. Construction rejects inverted bounds, so any
/// `TupleRange` that exists can be iterated or searched without re-checking
/// its orientation. Tolerance windows, build bands and the disk cache window
/// are all expressed with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleRange<T: Copy + PartialOrd>(T, T);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TupleRangeError<T: Copy + PartialOrd + std::fmt::Debug> {
    #[error("Expected start <= end for a closed range, got ({0:?}, {1:?})")]
    Inverted(T, T),
    #[error("Range bounds must be comparable, got ({0:?}, {1:?})")]
    Incomparable(T, T),
}

impl<T: Copy + PartialOrd + std::fmt::Debug> TupleRange<T> {
    pub fn try_new(start: T, end: T) -> Result<Self, TupleRangeError<T>> {
        match start.partial_cmp(&end) {
            Some(std::cmp::Ordering::Greater) => Err(TupleRangeError::Inverted(start, end)),
            None => Err(TupleRangeError::Incomparable(start, end)),
            _ => Ok(Self(start, end)),
        }
    }

    pub fn start(&self) -> T {
        self.0
    }

    pub fn end(&self) -> T {
        self.1
    }

    pub fn as_tuple(&self) -> (T, T) {
        (self.0, self.1)
    }

    pub fn as_inclusive_range(&self) -> RangeInclusive<T> {
        self.0..=self.1
    }

    pub fn contains(&self, x: T) -> bool {
        self.0 <= x && x <= self.1
    }

    /// True when `other` lies completely inside `self`.
    pub fn covers(&self, other: &Self) -> bool {
        self.0 <= other.0 && other.1 <= self.1
    }

    pub fn intersects(&self, other: &Self) -> bool {
        !(self.1 < other.0 || other.1 < self.0)
    }

    pub fn try_intercept(&self, other: &Self) -> Option<Self> {
        let start = if other.0 > self.0 { other.0 } else { self.0 };
        let end = if other.1 < self.1 { other.1 } else { self.1 };
        if start > end {
            None
        } else {
            Some(Self(start, end))
        }
    }
}

impl TupleRange<f64> {
    pub fn width(&self) -> f64 {
        self.1 - self.0
    }
}

/// Index range of the elements of a sorted slice whose key falls in `key_range`.
///
/// The slice must be sorted by `key_fn`. The result can be used directly to
/// slice the input, and is empty when nothing matches.
///
/// ```
/// use xlquery::utils::binary_search_range_by_key;
///
/// let masses = [100.0, 150.0, 150.0, 200.0, 250.0];
/// let found = binary_search_range_by_key(&masses, 150.0..=200.0, |x| *x);
/// assert_eq!(found, 1..4);
/// ```
pub fn binary_search_range_by_key<T, K, F>(
    slice: &[T],
    key_range: RangeInclusive<K>,
    key_fn: F,
) -> Range<usize>
where
    F: Fn(&T) -> K,
    K: PartialOrd,
{
    let start_idx = slice.partition_point(|x| key_fn(x) < *key_range.start());
    let end_idx = start_idx + slice[start_idx..].partition_point(|x| key_fn(x) <= *key_range.end());

    start_idx..end_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_range_is_rejected() {
        assert!(TupleRange::try_new(2.0, 1.0).is_err());
        assert!(TupleRange::try_new(f64::NAN, 1.0).is_err());
        let r = TupleRange::try_new(1.0, 1.0).unwrap();
        assert!(r.contains(1.0));
        assert_eq!(r.width(), 0.0);
    }

    #[test]
    fn test_covers_and_intercept() {
        let wide = TupleRange::try_new(100.0, 120.0).unwrap();
        let narrow = TupleRange::try_new(101.0, 102.0).unwrap();
        let outside = TupleRange::try_new(119.0, 130.0).unwrap();
        assert!(wide.covers(&narrow));
        assert!(!wide.covers(&outside));
        assert!(wide.intersects(&outside));
        assert_eq!(
            wide.try_intercept(&outside),
            Some(TupleRange::try_new(119.0, 120.0).unwrap())
        );
        let disjoint = TupleRange::try_new(130.0, 140.0).unwrap();
        assert_eq!(wide.try_intercept(&disjoint), None);
    }

    #[test]
    fn test_slice_search_repeats() {
        let input = vec![1.0, 2.0, 3.0, 3.0, 3.0, 4.0, 7.0, 7.0, 8.0];
        let result = binary_search_range_by_key(&input, 3.0..=7.0, |&x| x);
        assert_eq!(result, 2..8);

        let empty = binary_search_range_by_key(&input, 5.0..=6.0, |&x| x);
        assert!(input[empty].is_empty());
    }
}
