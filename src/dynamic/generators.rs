use serde::{Deserialize, Serialize};

use crate::{dynamic::storage::{GridPoint, GridStorage, MAX_LEVEL}, errors::SGError};

///
/// How boundary points enter a regular grid.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryPolicy
{
    /// Pentagon cut: subspaces containing level 0 get a tighter level-sum budget.
    #[default]
    Trapezoid,
    /// Level 0 counts like any other level in the sum `|l| <= n`.
    Diagonal,
}

pub trait Generator
{
    ///
    /// Generates a regular sparse grid of level `level`, without boundaries.
    /// For details about T, See pages 8-9 of Griebel and Knapek's "Optimized
    /// Tensor-Product Approximation Spaces".
    ///
    #[allow(non_snake_case)]
    fn regular(&self, storage: &mut GridStorage, level: u8, T: Option<f64>) -> Result<(), SGError>;
    ///
    /// Generates a full grid of 2^@level tensors, without boundaries
    ///
    fn full(&self, storage: &mut GridStorage, level: u8) -> Result<(), SGError>;
    ///
    /// Generates a full grid of level @level, with boundary grid points.
    ///
    fn full_with_boundaries(&self, storage: &mut GridStorage, level: u8) -> Result<(), SGError>;
    ///
    /// Generates a regular sparse grid of level `level` with boundary points placed
    /// according to `policy`.
    ///
    fn regular_with_boundaries(&self, storage: &mut GridStorage, level: u8, policy: BoundaryPolicy) -> Result<(), SGError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HashGenerator;

impl Generator for HashGenerator
{
    #[allow(non_snake_case)]
    fn regular(&self, storage: &mut GridStorage, level: u8, T: Option<f64>) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        regular_iter(storage, level, T.unwrap_or(0.0))?;
        tracing::debug!(level, points = storage.len(), "generated regular grid");
        Ok(())
    }

    fn full(&self, storage: &mut GridStorage, level: u8) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        full_iter(storage, level)?;
        tracing::debug!(level, points = storage.len(), "generated full grid");
        Ok(())
    }

    fn full_with_boundaries(&self, storage: &mut GridStorage, level: u8) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        full_with_boundaries_iter(storage, level)?;
        storage.recalc_leaf_property();
        tracing::debug!(level, points = storage.len(), "generated full grid with boundaries");
        Ok(())
    }

    fn regular_with_boundaries(&self, storage: &mut GridStorage, level: u8, policy: BoundaryPolicy) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        if storage.num_inputs() == 0
        {
            return Ok(());
        }
        match policy
        {
            BoundaryPolicy::Trapezoid if level > 0 => regular_boundary_trapezoid_iter(storage, level)?,
            _ =>
            {
                let mut point = GridPoint::zero_index(storage.num_inputs());
                let last = storage.num_inputs() - 1;
                boundaries_rec(storage, &mut point, last, 0, level)?;
            }
        }
        storage.recalc_leaf_property();
        tracing::debug!(level, ?policy, points = storage.len(), "generated regular grid with boundaries");
        Ok(())
    }
}

fn check_preconditions(storage: &GridStorage, level: u8) -> Result<(), SGError>
{
    if !storage.is_empty()
    {
        return Err(SGError::non_empty_storage());
    }
    if level > MAX_LEVEL
    {
        return Err(SGError::UnsupportedOperation(format!("level {level} exceeds the maximum level {MAX_LEVEL}")));
    }
    Ok(())
}

///
/// All odd indices of `level` in dimension `dim` of `point`, inserted into `storage`.
///
fn insert_level_1d(storage: &mut GridStorage, point: &mut GridPoint, dim: usize, level: u8, is_leaf: bool) -> Result<(), SGError>
{
    for i in (1..(1_u32 << level)).step_by(2)
    {
        point.set(dim, level, i);
        point.set_is_leaf(is_leaf);
        storage.insert(point.clone())?;
    }
    Ok(())
}

///
/// Generate a regular sparse grid iteratively without grid points on the boundary.
/// The first dimension is filled directly, every further dimension expands each
/// existing point: the first new variant overwrites it, the rest are appended.
///
fn regular_iter(storage: &mut GridStorage, n: u8, t: f64) -> Result<(), SGError>
{
    let dim = storage.num_inputs();
    if dim == 0
    {
        return Ok(());
    }
    let mut point = GridPoint::new(&vec![1; dim], &vec![1; dim], false);
    for l in 1..=n
    {
        insert_level_1d(storage, &mut point, 0, l, l == n)?;
    }
    let budget = n as u32 + dim as u32 - 1;
    for d in 1..dim
    {
        let ngrids = storage.len();
        for g in 0..ngrids
        {
            let mut first = true;
            let mut point = storage.point(g);
            // the (1,1) placeholder in dimension d does not count
            let level_sum = point.level_sum() - 1;
            let level_max = point.level_max();
            let mut l: u8 = 1;
            while (l as u32 + level_sum) as f64 - t * l.max(level_max) as f64 <= budget as f64 - t * n as f64 && l.max(level_max) <= n
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    point.set(d, l, i);
                    point.set_is_leaf(l as u32 + level_sum == budget);
                    if first
                    {
                        storage.update(point.clone(), g)?;
                        first = false;
                    }
                    else
                    {
                        storage.insert(point.clone())?;
                    }
                }
                l += 1;
            }
        }
    }
    Ok(())
}

fn full_iter(storage: &mut GridStorage, n: u8) -> Result<(), SGError>
{
    let dim = storage.num_inputs();
    if dim == 0
    {
        return Ok(());
    }
    let mut point = GridPoint::new(&vec![1; dim], &vec![1; dim], false);
    for l in 1..=n
    {
        insert_level_1d(storage, &mut point, 0, l, l == n && dim == 1)?;
    }
    for d in 1..dim
    {
        let ngrids = storage.len();
        for g in 0..ngrids
        {
            let mut first = true;
            let mut point = storage.point(g);
            for l in 1..=n
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    point.set(d, l, i);
                    // only the finest tensor level of the last dimension has no children
                    point.set_is_leaf(d == dim - 1 && point.level.iter().all(|&pl| pl == n));
                    if first
                    {
                        storage.update(point.clone(), g)?;
                        first = false;
                    }
                    else
                    {
                        storage.insert(point.clone())?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn full_with_boundaries_iter(storage: &mut GridStorage, n: u8) -> Result<(), SGError>
{
    let dim = storage.num_inputs();
    if dim == 0
    {
        return Ok(());
    }
    let mut point = GridPoint::new(&vec![1; dim], &vec![1; dim], false);
    point.set(0, 0, 0);
    storage.insert(point.clone())?;
    point.set(0, 0, 1);
    storage.insert(point.clone())?;
    for l in 1..=n
    {
        insert_level_1d(storage, &mut point, 0, l, false)?;
    }
    for d in 1..dim
    {
        let ngrids = storage.len();
        for g in 0..ngrids
        {
            let mut point = storage.point(g);
            point.set(d, 0, 0);
            storage.update(point.clone(), g)?;
            point.set(d, 0, 1);
            storage.insert(point.clone())?;
            for l in 1..=n
            {
                insert_level_1d(storage, &mut point, d, l, false)?;
            }
        }
    }
    Ok(())
}

///
/// Regular grid with boundaries where a level-0 entry weighs like level 1 in the
/// level sum, which removes the finest boundary subspaces.
///
fn regular_boundary_trapezoid_iter(storage: &mut GridStorage, n: u8) -> Result<(), SGError>
{
    const BOUNDARY_LEVEL: u32 = 1;
    let dim = storage.num_inputs();
    let n32 = n as u32;
    let mut point = GridPoint::new(&vec![1; dim], &vec![1; dim], false);
    point.set(0, 0, 0);
    storage.insert(point.clone())?;
    point.set(0, 0, 1);
    storage.insert(point.clone())?;
    for l in 1..=n
    {
        insert_level_1d(storage, &mut point, 0, l, l == n)?;
    }
    for d in 1..dim
    {
        let ngrids = storage.len();
        let cur_dim = d as u32 + 1;
        for g in 0..ngrids
        {
            let mut point = storage.point(g);
            let level_sum: u32 = point.level[..d].iter().map(|&l| l as u32).sum();
            let num_zero_levels = point.level[..d].iter().filter(|&&l| l == 0).count() as u32;
            let mut first = true;
            // the new boundary points add another zero level in dimension d
            if level_sum + BOUNDARY_LEVEL + num_zero_levels < n32 + cur_dim || num_zero_levels == cur_dim - 1
            {
                point.set(d, 0, 0);
                point.set_is_leaf(false);
                storage.update(point.clone(), g)?;
                point.set(d, 0, 1);
                storage.insert(point.clone())?;
                first = false;
            }
            let upper_bound = if num_zero_levels > 0
            {
                if n32 + cur_dim < BOUNDARY_LEVEL + num_zero_levels
                {
                    continue;
                }
                n32 + cur_dim - num_zero_levels - BOUNDARY_LEVEL
            }
            else
            {
                n32 + cur_dim - 1
            };
            let level_max = point.level[..d].iter().copied().max().unwrap_or(0);
            let mut l: u8 = 1;
            while l as u32 + level_sum <= upper_bound && l.max(level_max) <= n
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    point.set(d, l, i);
                    point.set_is_leaf(num_zero_levels == 0 && l as u32 + level_sum == n32 + dim as u32 - 1);
                    if first
                    {
                        storage.update(point.clone(), g)?;
                        first = false;
                    }
                    else
                    {
                        storage.insert(point.clone())?;
                    }
                }
                l += 1;
            }
        }
    }
    Ok(())
}

///
/// Recursive construction with explicit level 0: every point satisfies `|l| <= n`,
/// where level-0 entries count as 0 and both level-0 points of a dimension are
/// always emitted together. `point` is restored before returning.
///
fn boundaries_rec(storage: &mut GridStorage, point: &mut GridPoint, current_dim: usize, current_level: u8, level: u8) -> Result<(), SGError>
{
    let (source_level, source_index) = (point.level[current_dim], point.index[current_dim]);
    if current_level <= level
    {
        if source_level == 0
        {
            for boundary_index in [0, 1]
            {
                point.set(current_dim, 0, boundary_index);
                if current_dim == 0
                {
                    storage.insert(point.clone())?;
                }
                else
                {
                    boundaries_rec(storage, point, current_dim - 1, current_level, level)?;
                }
            }
            point.set(current_dim, source_level, source_index);
        }
        else if current_dim == 0
        {
            storage.insert(point.clone())?;
        }
        else
        {
            boundaries_rec(storage, point, current_dim - 1, current_level, level)?;
        }
    }
    if current_level < level
    {
        if source_level == 0 && source_index == 0
        {
            point.set(current_dim, 1, 1);
            boundaries_rec(storage, point, current_dim, current_level + 1, level)?;
        }
        else if source_level > 0
        {
            point.set(current_dim, source_level + 1, 2 * source_index - 1);
            boundaries_rec(storage, point, current_dim, current_level + 1, level)?;
            point.set(current_dim, source_level + 1, 2 * source_index + 1);
            boundaries_rec(storage, point, current_dim, current_level + 1, level)?;
        }
    }
    point.set(current_dim, source_level, source_index);
    Ok(())
}
