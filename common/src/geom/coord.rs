//! Unit conversions between millimetres and internal nanometre units.

pub const IU_PER_MM: f64 = 1_000_000.0;

#[inline]
pub fn from_mm(mm: f64) -> i64 {
    (mm * IU_PER_MM).round() as i64
}

#[inline]
pub fn to_mm(iu: i64) -> f64 {
    iu as f64 / IU_PER_MM
}
