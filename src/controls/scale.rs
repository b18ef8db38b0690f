/// A quantity that can be scaled into a whole-number control total.
pub trait Scalable: Copy {
    fn as_f64(self) -> f64;
}

impl Scalable for i32 {
    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Scalable for i64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Scalable for f32 {
    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Scalable for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

/// Scale `value` by `factor` and round to the nearest integer.
///
/// The product is computed in `f64` and ties are rounded half away from
/// zero (`2.5 -> 3`, `-2.5 -> -3`). Control files produced with .NET
/// `Math.Round` (ties to even) can differ by one on exact `.5` products.
#[inline]
pub fn scale<V: Scalable>(value: V, factor: f64) -> i64 {
    (value.as_f64() * factor).round() as i64
}
