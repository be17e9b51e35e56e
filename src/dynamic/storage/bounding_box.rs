use serde::{Deserialize, Serialize};

use crate::errors::SGError;

///
/// Interval of a single dimension. The Dirichlet flags mark boundaries with
/// prescribed values.
///
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox1D
{
    pub left: f64,
    pub right: f64,
    pub dirichlet_left: bool,
    pub dirichlet_right: bool,
}

impl Default for BoundingBox1D
{
    #[inline]
    fn default() -> Self {
        Self { left: 0.0, right: 1.0, dirichlet_left: false, dirichlet_right: false }
    }
}

impl BoundingBox1D
{
    #[inline]
    pub fn new(left: f64, right: f64) -> Self
    {
        Self { left, right, ..Default::default() }
    }
    #[inline]
    pub fn width(&self) -> f64
    {
        self.right - self.left
    }
    #[inline]
    pub fn is_unit(&self) -> bool
    {
        self.left == 0.0 && self.right == 1.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox
{
    boundaries: Vec<BoundingBox1D>,
}

impl BoundingBox
{
    ///
    /// Unit cube of dimension `num_inputs`.
    ///
    pub fn with_dim(num_inputs: usize) -> Self
    {
        Self { boundaries: vec![BoundingBox1D::default(); num_inputs] }
    }
    pub fn new(boundaries: Vec<BoundingBox1D>) -> Self
    {
        Self { boundaries }
    }
    pub fn from_bounds(lower: &[f64], upper: &[f64]) -> Result<Self, SGError>
    {
        if lower.len() != upper.len()
        {
            return Err(SGError::DimensionMismatch { expected: lower.len(), found: upper.len() });
        }
        Ok(Self { boundaries: lower.iter().zip(upper).map(|(&l, &r)| BoundingBox1D::new(l, r)).collect() })
    }
    #[inline]
    pub fn num_inputs(&self) -> usize
    {
        self.boundaries.len()
    }
    #[inline]
    pub fn boundary(&self, dim: usize) -> &BoundingBox1D
    {
        &self.boundaries[dim]
    }
    pub fn set_boundary(&mut self, dim: usize, boundary: BoundingBox1D)
    {
        self.boundaries[dim] = boundary;
    }
    pub fn boundaries(&self) -> &[BoundingBox1D]
    {
        &self.boundaries
    }
    #[inline]
    pub fn width(&self, dim: usize) -> f64
    {
        self.boundaries[dim].width()
    }
    #[inline]
    pub fn offset(&self, dim: usize) -> f64
    {
        self.boundaries[dim].left
    }
    ///
    /// True when every dimension spans exactly [0,1].
    ///
    pub fn is_trivial_cube(&self) -> bool
    {
        self.boundaries.iter().all(|b| b.is_unit())
    }

    ///
    /// Volume of hypercube (width(dim1)*...*width(dim_n))
    ///
    pub fn volume(&self) -> f64
    {
        self.boundaries.iter().map(|b| b.width()).product()
    }

    #[inline]
    pub fn to_unit_coordinate(&self, point: &[f64]) -> Vec<f64>
    {
        point.iter().zip(&self.boundaries).map(|(&x, b)| (x - b.left) / b.width()).collect()
    }
    #[inline]
    pub fn to_real_coordinate_in_place(&self, point: &mut [f64])
    {
        for (x, b) in point.iter_mut().zip(&self.boundaries)
        {
            *x = b.left + b.width() * *x;
        }
    }
    #[inline]
    pub fn contains(&self, point: &[f64]) -> bool
    {
        point.iter().zip(&self.boundaries).all(|(&x, b)| b.left <= x && x <= b.right)
    }
}

#[test]
fn test_bounding_box_transforms()
{
    let bbox = BoundingBox::from_bounds(&[-1.0, 2.0], &[1.0, 6.0]).expect("Could not build box");
    assert!(!bbox.is_trivial_cube());
    assert_eq!(bbox.volume(), 8.0);
    let unit = bbox.to_unit_coordinate(&[0.0, 3.0]);
    assert_eq!(unit, vec![0.5, 0.25]);
    let mut real = unit.clone();
    bbox.to_real_coordinate_in_place(&mut real);
    assert_eq!(real, vec![0.0, 3.0]);
    assert!(bbox.contains(&[1.0, 2.0]));
    assert!(!bbox.contains(&[1.5, 2.0]));
    assert!(BoundingBox::with_dim(3).is_trivial_cube());
}
