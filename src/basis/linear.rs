use super::base::Basis;

///
/// Piecewise linear hat functions without boundary support.
///
#[derive(Copy, Clone, Debug, Default)]
pub struct LinearBasis;

impl Basis for LinearBasis
{
    #[inline]
    fn eval(&self, level: u8, index: u32, x: f64) -> f64
    {
        0.0_f64.max(1.0 - f64::abs((1_u64 << level) as f64 * x - index as f64))
    }

    fn has_boundary(&self) -> bool
    {
        false
    }
}

///
/// Linear hats plus the two level-0 functions `1 - x` and `x`.
///
#[derive(Copy, Clone, Debug, Default)]
pub struct LinearBoundaryBasis;

impl Basis for LinearBoundaryBasis
{
    #[inline]
    fn eval(&self, level: u8, index: u32, x: f64) -> f64
    {
        if level == 0
        {
            if index == 0
            {
                1.0 - x
            }
            else
            {
                x
            }
        }
        else
        {
            0.0_f64.max(1.0 - f64::abs((1_u64 << level) as f64 * x - index as f64))
        }
    }

    fn has_boundary(&self) -> bool
    {
        true
    }
}

#[test]
fn test_linear_hats()
{
    let basis = LinearBasis;
    assert_eq!(basis.eval(1, 1, 0.5), 1.0);
    assert_eq!(basis.eval(2, 1, 0.125), 0.5);
    assert_eq!(basis.eval(2, 3, 0.25), 0.0);
    assert_eq!(basis.eval_bounded(1, 1, 3.0, 4.0, 1.0), 1.0);
    assert_eq!(basis.node(3, 5), 0.625);
    let boundary = LinearBoundaryBasis;
    assert_eq!(boundary.eval(0, 0, 0.25), 0.75);
    assert_eq!(boundary.eval(0, 1, 0.25), 0.25);
    assert_eq!(boundary.eval(2, 3, 0.75), 1.0);
    assert_eq!(boundary.eval_bounded(0, 1, 0.0, 2.0, -1.0), 0.5);
}
