//! Tolerance-based comparisons for bound arithmetic.
//!
//! All derived-bound computations run on `f64`, so every numeric decision in
//! the checker goes through these helpers. The default epsilon matches the
//! comparison epsilon of the original query pipeline; lemma replay uses its
//! own, configurable tolerance on top of these.

/// Default absolute tolerance for comparisons.
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// True when `value` is within `epsilon` of zero.
#[inline]
pub fn is_zero_within(value: f64, epsilon: f64) -> bool {
    value.abs() <= epsilon
}

/// True when `value` is within the default epsilon of zero.
#[inline]
pub fn is_zero(value: f64) -> bool {
    is_zero_within(value, DEFAULT_EPSILON)
}

/// True when `value` is positive beyond the default epsilon.
#[inline]
pub fn is_positive(value: f64) -> bool {
    value > DEFAULT_EPSILON
}

/// True when `value` is negative beyond the default epsilon.
#[inline]
pub fn is_negative(value: f64) -> bool {
    value < -DEFAULT_EPSILON
}

/// True when `a` and `b` differ by at most the default epsilon.
#[inline]
pub fn are_equal(a: f64, b: f64) -> bool {
    is_zero(a - b)
}

/// True when `a` and `b` differ by more than the default epsilon.
#[inline]
pub fn are_disequal(a: f64, b: f64) -> bool {
    !are_equal(a, b)
}

/// True when `a` is less than `b` beyond the default epsilon.
#[inline]
pub fn lt(a: f64, b: f64) -> bool {
    is_negative(a - b)
}

/// True when `a` is greater than `b` beyond the default epsilon.
#[inline]
pub fn gt(a: f64, b: f64) -> bool {
    is_positive(a - b)
}

/// True when `a` is less than or equal to `b` up to the default epsilon.
#[inline]
pub fn lte(a: f64, b: f64) -> bool {
    !gt(a, b)
}

/// True when `a` is greater than or equal to `b` up to the default epsilon.
#[inline]
pub fn gte(a: f64, b: f64) -> bool {
    !lt(a, b)
}
