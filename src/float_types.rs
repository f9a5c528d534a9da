//! Scalar type, tolerance, and unit conversions.
//!
//! The pipeline works in meters internally; card dimensions, layout cells and
//! placement records are expressed in millimeters at the API boundary, and the
//! STL is written in millimeters.

/// Our Real scalar type.
pub type Real = f64;

/// Tolerance used for plane classification and degeneracy checks.
pub const EPSILON: Real = 1e-9;

pub const MM_PER_INCH: Real = 25.4;

/// Millimeters to meters.
#[inline]
pub const fn mm_to_m(mm: Real) -> Real {
    mm / 1000.0
}

/// Meters to millimeters.
#[inline]
pub const fn m_to_mm(m: Real) -> Real {
    m * 1000.0
}
