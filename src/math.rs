//! Small float comparison helpers shared by the term model and the reasoner.

/// Comparison tolerance for single-precision values.
///
/// Constraint violations at or below this magnitude count as satisfied, and
/// two objective values within it are treated as equal by the
/// objective-stagnation break test.
pub(crate) const EPSILON: f32 = 1e-5;

/// True when `value` is within [`EPSILON`] of zero.
pub(crate) fn is_zero(value: f32) -> bool {
    value.abs() <= EPSILON
}

/// True when `a` and `b` are within [`EPSILON`] of each other.
pub(crate) fn is_equal(a: f32, b: f32) -> bool {
    (a - b).abs() <= EPSILON
}
