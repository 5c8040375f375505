//! Assertion helpers for page contents and errors.

use crate::error::{ErrorKind, Result};
use std::fmt::Debug;

/// Assert that two float slices have the same length and agree within `tolerance`.
///
/// # Panics
///
/// Panics on a length mismatch or the first element that differs by more
/// than `tolerance`.
///
/// ```
/// use sdds::testing::assert_f64_slices_close;
///
/// assert_f64_slices_close(&[1.0, 2.000_000_1], &[1.0, 2.0], 1e-6);
/// ```
pub fn assert_f64_slices_close(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        let equal = a == e || (a.is_nan() && e.is_nan()) || (a - e).abs() <= tolerance;
        assert!(
            equal,
            "Mismatch at index {i}: expected {e}, got {a} (tolerance {tolerance})\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

/// Assert that `result` failed with an error of `kind`.
///
/// # Panics
///
/// Panics if `result` is `Ok` or fails with another kind.
pub fn assert_error_kind<T: Debug>(result: Result<T>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected a {kind:?} error, got Ok({value:?})"),
        Err(e) => assert_eq!(e.kind(), kind, "Expected a {kind:?} error, got: {e}"),
    }
}
