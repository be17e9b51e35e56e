use crate::{basis::{base::Basis, linear_stretched::LinearStretchedBoundaryBasis}, dynamic::{iterators::dynamic_grid_iterator::{GridIteratorT, HashMapGridIterator}, storage::{BoundingBox, Domain, GridStorage, Stretching, MAX_LEVEL}}, errors::SGError};

/// Number of bits of the quantized coordinate used by the bit-pattern descent.
const BITS: u32 = u32::BITS;
/// Highest bit of the quantized coordinate; level 1 decides on bit `TOP_BIT - 1`.
const TOP_BIT: u8 = 31;

///
/// Sparse point evaluation: the (sequence number, basis value) pairs of every
/// stored basis function whose support contains a given point.
///
pub trait AffectedBasis : Sync
{
    fn storage(&self) -> &GridStorage;

    ///
    /// Clears `result` and fills it with the affected basis functions at `x`.
    /// Zero-valued products are left out.
    ///
    fn get(&self, x: &[f64], result: &mut Vec<(usize, f64)>) -> Result<(), SGError>;

    fn affected(&self, x: &[f64]) -> Result<Vec<(usize, f64)>, SGError>
    {
        let mut result = Vec::new();
        self.get(x, &mut result)?;
        Ok(result)
    }
}

fn check_point(storage: &GridStorage, bbox: &BoundingBox, x: &[f64]) -> Result<(), SGError>
{
    if x.len() != storage.num_inputs()
    {
        return Err(SGError::DimensionMismatch { expected: storage.num_inputs(), found: x.len() });
    }
    if !bbox.contains(x)
    {
        return Err(SGError::OutOfDomain);
    }
    Ok(())
}

///
/// Lookup for grids on a bounding box. Bases without boundary functions descend
/// along the bit pattern of the quantized coordinate; boundary bases start on
/// level 0 and compare against node centers.
///
pub struct GetAffectedBasisFunctions<'a, B: Basis>
{
    storage: &'a GridStorage,
    basis: B,
}

impl<'a, B: Basis> GetAffectedBasisFunctions<'a, B>
{
    pub fn new(storage: &'a GridStorage, basis: B) -> Self
    {
        Self { storage, basis }
    }

    fn bounding_box(&self) -> Result<&'a BoundingBox, SGError>
    {
        match self.storage.domain()
        {
            Domain::BoundingBox(bbox) => Ok(bbox),
            Domain::Stretching(_) => Err(SGError::UnsupportedOperation("bounding box lookup on a stretched grid".to_string())),
        }
    }

    fn rec_bits<I: GridIteratorT>(&self, unit: &[f64], source: &[u32], dim: usize, value: f64, iterator: &mut I, result: &mut Vec<(usize, f64)>)
    {
        let is_last = dim == unit.len() - 1;
        let idx = source[dim];
        loop
        {
            let (level, index) = iterator.get(dim);
            let new_value = self.basis.eval(level, index, unit[dim]) * value;
            if let Some(seq) = iterator.seq()
            {
                if new_value != 0.0
                {
                    if is_last
                    {
                        result.push((seq, new_value));
                    }
                    else
                    {
                        self.rec_bits(unit, source, dim + 1, new_value, iterator, result);
                    }
                }
            }
            if iterator.hint(dim) || level >= MAX_LEVEL
            {
                break;
            }
            // level l decides on bit 31 - l of the quantized coordinate
            let go_right = idx & (1_u32 << (TOP_BIT - level)) > 0;
            let found = if go_right { iterator.right_child(dim) } else { iterator.left_child(dim) };
            if !found
            {
                break;
            }
        }
        iterator.reset_to_level_one(dim);
    }

    #[inline]
    fn visit_boundary<I: GridIteratorT>(&self, bbox: &BoundingBox, x: &[f64], dim: usize, value: f64, iterator: &mut I, result: &mut Vec<(usize, f64)>)
    {
        if value == 0.0
        {
            return;
        }
        if dim == x.len() - 1
        {
            if let Some(seq) = iterator.seq()
            {
                result.push((seq, value));
            }
        }
        else
        {
            self.rec_boundary(bbox, x, dim + 1, value, iterator, result);
        }
    }

    fn rec_boundary<I: GridIteratorT>(&self, bbox: &BoundingBox, x: &[f64], dim: usize, value: f64, iterator: &mut I, result: &mut Vec<(usize, f64)>)
    {
        let xd = x[dim];
        let (width, offset) = (bbox.width(dim), bbox.offset(dim));
        for boundary_index in [0, 1]
        {
            if iterator.set(dim, 0, boundary_index)
            {
                let new_value = self.basis.eval_bounded(0, boundary_index, xd, width, offset) * value;
                self.visit_boundary(bbox, x, dim, new_value, iterator, result);
            }
        }
        let boundary = bbox.boundary(dim);
        if xd != boundary.left && xd != boundary.right && iterator.reset_to_level_one(dim)
        {
            loop
            {
                let (level, index) = iterator.get(dim);
                let new_value = self.basis.eval_bounded(level, index, xd, width, offset) * value;
                self.visit_boundary(bbox, x, dim, new_value, iterator, result);
                if iterator.hint(dim)
                {
                    break;
                }
                let center = width * index as f64 / (1_u64 << level) as f64 + offset;
                let found = if xd < center
                {
                    iterator.left_child(dim)
                }
                else if xd > center
                {
                    iterator.right_child(dim)
                }
                else
                {
                    break
                };
                if !found
                {
                    break;
                }
            }
        }
        iterator.reset_to_left_level_zero(dim);
    }
}

impl<B: Basis> AffectedBasis for GetAffectedBasisFunctions<'_, B>
{
    fn storage(&self) -> &GridStorage
    {
        self.storage
    }

    fn get(&self, x: &[f64], result: &mut Vec<(usize, f64)>) -> Result<(), SGError>
    {
        result.clear();
        let bbox = self.bounding_box()?;
        check_point(self.storage, bbox, x)?;
        if self.storage.is_empty() || x.is_empty()
        {
            return Ok(());
        }
        let mut iterator = HashMapGridIterator::new(self.storage);
        if self.basis.has_boundary()
        {
            iterator.reset_to_level_zero();
            self.rec_boundary(bbox, x, 0, 1.0, &mut iterator, result);
        }
        else
        {
            let unit = bbox.to_unit_coordinate(x);
            let source: Vec<u32> = unit.iter().map(|&u|
            {
                let val = (u * (1_u64 << (BITS - 2)) as f64).floor() * 2.0;
                if u == 1.0 { (val - 1.0) as u32 } else { (val + 1.0) as u32 }
            }).collect();
            self.rec_bits(&unit, &source, 0, 1.0, &mut iterator, result);
        }
        Ok(())
    }
}

///
/// Lookup for stretched boundary grids: node centers and supports come from the
/// stretching's neighbor table.
///
pub struct GetAffectedStretchedBasisFunctions<'a>
{
    storage: &'a GridStorage,
    basis: LinearStretchedBoundaryBasis,
}

impl<'a> GetAffectedStretchedBasisFunctions<'a>
{
    pub fn new(storage: &'a GridStorage) -> Self
    {
        Self { storage, basis: LinearStretchedBoundaryBasis }
    }

    #[inline]
    fn visit<I: GridIteratorT>(&self, stretching: &Stretching, x: &[f64], dim: usize, value: f64, iterator: &mut I, result: &mut Vec<(usize, f64)>)
    {
        if value == 0.0
        {
            return;
        }
        if dim == x.len() - 1
        {
            if let Some(seq) = iterator.seq()
            {
                result.push((seq, value));
            }
        }
        else
        {
            self.rec(stretching, x, dim + 1, value, iterator, result);
        }
    }

    fn rec<I: GridIteratorT>(&self, stretching: &Stretching, x: &[f64], dim: usize, value: f64, iterator: &mut I, result: &mut Vec<(usize, f64)>)
    {
        let xd = x[dim];
        let boundary = stretching.boundary(dim);
        let (left, right) = (boundary.left, boundary.right);
        for (boundary_index, center, neighbor) in [(0, left, right), (1, right, left)]
        {
            if iterator.set(dim, 0, boundary_index)
            {
                let new_value = self.basis.eval_stretched(xd, center, neighbor) * value;
                self.visit(stretching, x, dim, new_value, iterator, result);
            }
        }
        if xd != left && xd != right && iterator.reset_to_level_one(dim)
        {
            loop
            {
                let (level, index) = iterator.get(dim);
                let (center, pos_left, pos_right) = stretching.adjacent_positions(level, index, dim);
                let new_value = self.basis.eval_hat(xd, center, pos_left, pos_right) * value;
                self.visit(stretching, x, dim, new_value, iterator, result);
                if iterator.hint(dim)
                {
                    break;
                }
                let found = if xd < center
                {
                    iterator.left_child(dim)
                }
                else if xd > center
                {
                    iterator.right_child(dim)
                }
                else
                {
                    break
                };
                if !found
                {
                    break;
                }
            }
        }
        iterator.reset_to_left_level_zero(dim);
    }
}

impl AffectedBasis for GetAffectedStretchedBasisFunctions<'_>
{
    fn storage(&self) -> &GridStorage
    {
        self.storage
    }

    fn get(&self, x: &[f64], result: &mut Vec<(usize, f64)>) -> Result<(), SGError>
    {
        result.clear();
        let stretching = self.storage.stretching().ok_or_else(|| SGError::UnsupportedOperation("stretched lookup without stretching".to_string()))?;
        check_point(self.storage, stretching.bounding_box(), x)?;
        if self.storage.is_empty() || x.is_empty()
        {
            return Ok(());
        }
        let mut iterator = HashMapGridIterator::new(self.storage);
        iterator.reset_to_level_zero();
        self.rec(stretching, x, 0, 1.0, &mut iterator, result);
        Ok(())
    }
}
