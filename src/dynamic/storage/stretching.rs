use serde::{Deserialize, Serialize};

use crate::errors::SGError;

use super::bounding_box::{BoundingBox, BoundingBox1D};

/// Highest level whose coordinates are tabulated.
pub const LOOKUPMAX: u8 = 11;
/// Number of tabulated nodes per dimension (all odd indices of levels 1..=LOOKUPMAX).
pub const LOOKUPSIZE: usize = (1 << LOOKUPMAX) - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StretchingType
{
    Id,
    Log,
    Sinh,
    /// Coordinates given by an explicit vector.
    Discrete,
}

impl StretchingType
{
    ///
    /// Numeric tag of analytic transforms in the text format.
    ///
    pub fn tag(&self) -> Option<u32>
    {
        match self
        {
            StretchingType::Id => Some(1),
            StretchingType::Log => Some(2),
            StretchingType::Sinh => Some(3),
            StretchingType::Discrete => None,
        }
    }
    pub fn from_tag(tag: u32) -> Result<Self, SGError>
    {
        match tag
        {
            1 => Ok(StretchingType::Id),
            2 => Ok(StretchingType::Log),
            3 => Ok(StretchingType::Sinh),
            _ => Err(SGError::Parse(format!("unknown stretching type {tag}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StretchingMode
{
    Analytic,
    Discrete,
}

///
/// Coordinate transform of one dimension. `lookup` holds for every tabulated
/// node its position and the positions of its left and right neighbors.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stretching1D
{
    pub kind: StretchingType,
    pub x_0: f64,
    pub xsi: f64,
    lookup: Vec<[f64; 3]>,
}

impl Stretching1D
{
    pub fn new(kind: StretchingType, x_0: f64, xsi: f64) -> Self
    {
        Self { kind, x_0, xsi, lookup: Vec::new() }
    }
    pub fn id() -> Self
    {
        Self::new(StretchingType::Id, 0.0, 0.0)
    }
}

#[inline]
pub(crate) fn lookup_index(level: u8, index: u32) -> usize
{
    (1_usize << (level - 1)) - 1 + (index as usize - 1) / 2
}

///
/// Reduces the dyadic position `position / 2^level` to its canonical (level, index)
/// pair. Positions 0 and 2^level map onto the level-zero boundary points.
///
#[inline]
pub(crate) fn canonical(level: u8, position: u32) -> (u8, u32)
{
    if position == 0
    {
        return (0, 0);
    }
    if position as u64 == 1_u64 << level
    {
        return (0, 1);
    }
    let zeros = position.trailing_zeros();
    (level - zeros as u8, position >> zeros)
}

///
/// Level and index of the closest coarser nodes to the left and right of (level, index).
///
pub fn neighbor_specs(level: u8, index: u32) -> ((u8, u32), (u8, u32))
{
    (canonical(level, index - 1), canonical(level, index + 1))
}

fn analytic_coordinate(kind: StretchingType, boundary: &BoundingBox1D, x_0: f64, xsi: f64, level: u8, index: u32) -> f64
{
    let t = index as f64 / (1_u64 << level) as f64;
    let (a, b) = (boundary.left, boundary.right);
    match kind
    {
        StretchingType::Log =>
        {
            let (f_a, f_b) = (a.ln(), b.ln());
            (f_a + t * (f_b - f_a)).exp()
        }
        StretchingType::Sinh =>
        {
            let f_a = ((a - x_0) * xsi).asinh();
            let f_b = ((b - x_0) * xsi).asinh();
            (f_a + t * (f_b - f_a)).sinh() / xsi + x_0
        }
        _ => a + t * (b - a),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stretching
{
    boundaries: BoundingBox,
    stretchings: Vec<Stretching1D>,
    mode: StretchingMode,
    discrete_levels: Vec<u8>,
}

impl Stretching
{
    ///
    /// Analytic stretching. `transforms` must hold one id/log/sinh transform per dimension.
    ///
    pub fn analytic(boundaries: Vec<BoundingBox1D>, transforms: Vec<Stretching1D>) -> Result<Self, SGError>
    {
        if boundaries.len() != transforms.len()
        {
            return Err(SGError::DimensionMismatch { expected: boundaries.len(), found: transforms.len() });
        }
        let mut stretching = Self { boundaries: BoundingBox::new(boundaries), stretchings: transforms, mode: StretchingMode::Analytic, discrete_levels: Vec::new() };
        for d in 0..stretching.stretchings.len()
        {
            let boundary = *stretching.boundaries.boundary(d);
            let str1d = &mut stretching.stretchings[d];
            if str1d.kind == StretchingType::Discrete
            {
                return Err(SGError::UnsupportedOperation("discrete transform in analytic stretching".to_string()));
            }
            str1d.lookup = vec![[0.0; 3]; LOOKUPSIZE];
            for l in 1..=LOOKUPMAX
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    str1d.lookup[lookup_index(l, i)][0] = analytic_coordinate(str1d.kind, &boundary, str1d.x_0, str1d.xsi, l, i);
                }
            }
            generate_left_right(str1d, &boundary);
        }
        Ok(stretching)
    }

    ///
    /// Discrete stretching from explicit coordinate vectors of length 2^L+1, one per dimension.
    /// Levels above L are placed halfway between their neighbors.
    ///
    pub fn discrete(coordinates: Vec<Vec<f64>>) -> Result<Self, SGError>
    {
        let mut boundaries = Vec::with_capacity(coordinates.len());
        let mut stretchings = Vec::with_capacity(coordinates.len());
        let mut discrete_levels = Vec::with_capacity(coordinates.len());
        for vec in &coordinates
        {
            if vec.len() < 2 || !(vec.len() - 1).is_power_of_two()
            {
                return Err(SGError::UnsupportedOperation(format!("discrete stretching needs 2^l+1 coordinates, got {}", vec.len())));
            }
            let level = (vec.len() - 1).trailing_zeros() as u8;
            if level > LOOKUPMAX
            {
                return Err(SGError::UnsupportedOperation(format!("discrete stretching level {level} exceeds {LOOKUPMAX}")));
            }
            let boundary = BoundingBox1D { left: vec[0], right: vec[vec.len() - 1], dirichlet_left: true, dirichlet_right: true };
            let mut str1d = Stretching1D::new(StretchingType::Discrete, 0.0, 0.0);
            str1d.lookup = vec![[0.0; 3]; LOOKUPSIZE];
            for l in 1..=level
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    str1d.lookup[lookup_index(l, i)][0] = vec[(i as usize) << (level - l)];
                }
            }
            for l in level + 1..=LOOKUPMAX
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    let (left, right) = neighbor_specs(l, i);
                    let posl = tabulated_coordinate(&str1d, &boundary, left);
                    let posr = tabulated_coordinate(&str1d, &boundary, right);
                    str1d.lookup[lookup_index(l, i)][0] = posl + 0.5 * (posr - posl);
                }
            }
            generate_left_right(&mut str1d, &boundary);
            boundaries.push(boundary);
            stretchings.push(str1d);
            discrete_levels.push(level);
        }
        Ok(Self { boundaries: BoundingBox::new(boundaries), stretchings, mode: StretchingMode::Discrete, discrete_levels })
    }

    #[inline]
    pub fn num_inputs(&self) -> usize
    {
        self.stretchings.len()
    }
    #[inline]
    pub fn mode(&self) -> StretchingMode
    {
        self.mode
    }
    #[inline]
    pub fn boundary(&self, dim: usize) -> &BoundingBox1D
    {
        self.boundaries.boundary(dim)
    }
    #[inline]
    pub fn bounding_box(&self) -> &BoundingBox
    {
        &self.boundaries
    }
    #[inline]
    pub fn stretching_1d(&self, dim: usize) -> &Stretching1D
    {
        &self.stretchings[dim]
    }
    pub fn is_trivial_cube(&self) -> bool
    {
        self.boundaries.is_trivial_cube()
    }
    ///
    /// Level of the coordinate vector a discrete dimension was built from.
    ///
    pub fn discrete_level(&self, dim: usize) -> Option<u8>
    {
        self.discrete_levels.get(dim).copied()
    }

    ///
    /// Position of node (level, index) in dimension `dim`.
    ///
    pub fn coordinate(&self, level: u8, index: u32, dim: usize) -> f64
    {
        let boundary = self.boundaries.boundary(dim);
        let str1d = &self.stretchings[dim];
        if level <= LOOKUPMAX
        {
            return tabulated_coordinate(str1d, boundary, (level, index));
        }
        match str1d.kind
        {
            StretchingType::Discrete =>
            {
                let scale = (1_u64 << (level - LOOKUPMAX)) as f64;
                let position = index as f64 / scale;
                let lpos = position.floor();
                let posl = tabulated_coordinate(str1d, boundary, canonical(LOOKUPMAX, lpos as u32));
                let posr = tabulated_coordinate(str1d, boundary, canonical(LOOKUPMAX, position.ceil() as u32));
                posl + (posr - posl) * (position - lpos)
            }
            kind => analytic_coordinate(kind, boundary, str1d.x_0, str1d.xsi, level, index),
        }
    }

    ///
    /// Returns (center, left neighbor, right neighbor) positions of node (level, index), level >= 1.
    ///
    pub fn adjacent_positions(&self, level: u8, index: u32, dim: usize) -> (f64, f64, f64)
    {
        if level <= LOOKUPMAX
        {
            let [c, l, r] = self.stretchings[dim].lookup[lookup_index(level, index)];
            (c, l, r)
        }
        else
        {
            let ((ll, li), (rl, ri)) = neighbor_specs(level, index);
            (self.coordinate(level, index, dim), self.coordinate(ll, li, dim), self.coordinate(rl, ri, dim))
        }
    }

    ///
    /// Coordinate vector of a discrete dimension, ordered by position.
    ///
    pub fn discrete_vector(&self, dim: usize) -> Option<Vec<f64>>
    {
        let level = self.discrete_level(dim)?;
        Some((0..=(1_u32 << level)).map(|k|
        {
            let (l, i) = canonical(level, k);
            self.coordinate(l, i, dim)
        }).collect())
    }
}

fn tabulated_coordinate(str1d: &Stretching1D, boundary: &BoundingBox1D, (level, index): (u8, u32)) -> f64
{
    if level == 0
    {
        if index == 0 { boundary.left } else { boundary.right }
    }
    else
    {
        str1d.lookup[lookup_index(level, index)][0]
    }
}

fn generate_left_right(str1d: &mut Stretching1D, boundary: &BoundingBox1D)
{
    for l in 1..=LOOKUPMAX
    {
        for i in (1..(1_u32 << l)).step_by(2)
        {
            let (left, right) = neighbor_specs(l, i);
            let idx = lookup_index(l, i);
            str1d.lookup[idx][1] = tabulated_coordinate(str1d, boundary, left);
            str1d.lookup[idx][2] = tabulated_coordinate(str1d, boundary, right);
        }
    }
}
