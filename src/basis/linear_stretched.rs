///
/// Linear hats on a stretched grid: the support of a node reaches to its left and
/// right neighbor positions, which need not be symmetric.
///
#[derive(Copy, Clone, Debug, Default)]
pub struct LinearStretchedBoundaryBasis;

impl LinearStretchedBoundaryBasis
{
    ///
    /// Value at `x` of the ramp centered at `center` that vanishes at `neighbor`.
    ///
    #[inline]
    pub fn eval_stretched(&self, x: f64, center: f64, neighbor: f64) -> f64
    {
        let width = (neighbor - center).abs();
        if width == 0.0
        {
            return 0.0;
        }
        0.0_f64.max(1.0 - (x - center).abs() / width)
    }

    ///
    /// Value of the hat with the given `center`, `left` and `right` neighbor positions.
    ///
    #[inline]
    pub fn eval_hat(&self, x: f64, center: f64, left: f64, right: f64) -> f64
    {
        if x < center
        {
            self.eval_stretched(x, center, left)
        }
        else
        {
            self.eval_stretched(x, center, right)
        }
    }
}

#[test]
fn test_stretched_hat()
{
    let basis = LinearStretchedBoundaryBasis;
    assert_eq!(basis.eval_hat(0.5, 0.5, 0.0, 2.0), 1.0);
    assert_eq!(basis.eval_hat(0.25, 0.5, 0.0, 2.0), 0.5);
    assert_eq!(basis.eval_hat(1.25, 0.5, 0.0, 2.0), 0.5);
    assert_eq!(basis.eval_hat(2.5, 0.5, 0.0, 2.0), 0.0);
    // level-0 ramps of the interval [1, 5]
    assert_eq!(basis.eval_stretched(2.0, 1.0, 5.0), 0.75);
    assert_eq!(basis.eval_stretched(2.0, 5.0, 1.0), 0.25);
}
