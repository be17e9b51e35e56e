///
/// One-dimensional hierarchical basis function family, addressed by (level, index).
///
pub trait Basis : Send + Sync
{
    fn eval(&self, level: u8, index: u32, x: f64) -> f64;

    ///
    /// Evaluation on the interval `[offset, offset + width]`.
    ///
    #[inline]
    fn eval_bounded(&self, level: u8, index: u32, x: f64, width: f64, offset: f64) -> f64
    {
        self.eval(level, index, (x - offset) / width)
    }

    ///
    /// Grid node of (level, index) on the unit interval.
    ///
    #[inline]
    fn node(&self, level: u8, index: u32) -> f64
    {
        index as f64 / (1_u64 << level) as f64
    }

    ///
    /// True if the family carries level-0 boundary functions.
    ///
    fn has_boundary(&self) -> bool;
}
