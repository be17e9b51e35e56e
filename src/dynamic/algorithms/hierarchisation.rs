use crate::{dynamic::{algorithms::sweep::{self, SweepFunction}, iterators::dynamic_grid_iterator::{GridIteratorT, HashMapGridIterator}, storage::GridStorage}, errors::SGError};

///
/// Conversion between nodal values and hierarchical surpluses.
///
pub trait HierarchisationOperation
{
    fn hierarchize(&self, node_values: &mut [f64], storage: &GridStorage) -> Result<(), SGError>;
    fn dehierarchize(&self, alpha: &mut [f64], storage: &GridStorage) -> Result<(), SGError>;
}

#[inline]
fn value_at(values: &[f64], iterator: &HashMapGridIterator) -> f64
{
    iterator.seq().map_or(0.0, |seq| values[seq])
}

pub struct LinearHierarchisation;

impl LinearHierarchisation
{
    fn recurse(values: &mut [f64], iterator: &mut HashMapGridIterator, dimension: usize, left_value: f64, right_value: f64)
    {
        if let Some(seq) = iterator.seq()
        {
            let mid_value = values[seq];
            if !iterator.is_leaf()
            {
                iterator.left_child(dimension);
                if iterator.seq().is_some()
                {
                    Self::recurse(values, iterator, dimension, left_value, mid_value);
                }
                iterator.step_right(dimension);
                if iterator.seq().is_some()
                {
                    Self::recurse(values, iterator, dimension, mid_value, right_value);
                }
                iterator.up(dimension);
            }
            values[seq] = mid_value - 0.5 * (left_value + right_value);
        }
    }
}

impl SweepFunction for LinearHierarchisation
{
    fn execute_in_place(&mut self, values: &mut [f64], iterator: &mut HashMapGridIterator, dimension: usize) -> Result<(), SGError>
    {
        Self::recurse(values, iterator, dimension, 0.0, 0.0);
        Ok(())
    }
}

pub struct LinearBoundaryHierarchisation;

impl SweepFunction for LinearBoundaryHierarchisation
{
    #[inline]
    fn execute_in_place(&mut self, values: &mut [f64], iterator: &mut HashMapGridIterator, dimension: usize) -> Result<(), SGError>
    {
        iterator.reset_to_left_level_zero(dimension);
        let left_boundary = value_at(values, iterator);
        iterator.reset_to_right_level_zero(dimension);
        let right_boundary = value_at(values, iterator);
        if iterator.reset_to_level_one(dimension)
        {
            LinearHierarchisation::recurse(values, iterator, dimension, left_boundary, right_boundary);
        }
        iterator.reset_to_left_level_zero(dimension);
        Ok(())
    }
}

pub struct LinearDehierarchisation;

impl LinearDehierarchisation
{
    fn recurse(values: &mut [f64], iterator: &mut HashMapGridIterator, dimension: usize, left_value: f64, right_value: f64)
    {
        if let Some(seq) = iterator.seq()
        {
            let mid_value = values[seq] + 0.5 * (left_value + right_value);
            values[seq] = mid_value;
            if !iterator.is_leaf()
            {
                iterator.left_child(dimension);
                if iterator.seq().is_some()
                {
                    Self::recurse(values, iterator, dimension, left_value, mid_value);
                }
                iterator.step_right(dimension);
                if iterator.seq().is_some()
                {
                    Self::recurse(values, iterator, dimension, mid_value, right_value);
                }
                iterator.up(dimension);
            }
        }
    }
}

impl SweepFunction for LinearDehierarchisation
{
    fn execute_in_place(&mut self, values: &mut [f64], iterator: &mut HashMapGridIterator, dimension: usize) -> Result<(), SGError>
    {
        Self::recurse(values, iterator, dimension, 0.0, 0.0);
        Ok(())
    }
}

pub struct LinearBoundaryDehierarchisation;

impl SweepFunction for LinearBoundaryDehierarchisation
{
    #[inline]
    fn execute_in_place(&mut self, values: &mut [f64], iterator: &mut HashMapGridIterator, dimension: usize) -> Result<(), SGError>
    {
        iterator.reset_to_left_level_zero(dimension);
        let left_boundary = value_at(values, iterator);
        iterator.reset_to_right_level_zero(dimension);
        let right_boundary = value_at(values, iterator);
        if iterator.reset_to_level_one(dimension)
        {
            LinearDehierarchisation::recurse(values, iterator, dimension, left_boundary, right_boundary);
        }
        iterator.reset_to_left_level_zero(dimension);
        Ok(())
    }
}

///
/// Hierarchisation for grids without boundary points. Sweeps run over the
/// storage's algorithmic dimensions.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearHierarchisationOperation;

impl HierarchisationOperation for LinearHierarchisationOperation
{
    fn hierarchize(&self, node_values: &mut [f64], storage: &GridStorage) -> Result<(), SGError>
    {
        for &d in storage.algorithmic_dimensions()
        {
            sweep::sweep_1d_in_place(&mut LinearHierarchisation, storage, node_values, d)?;
        }
        Ok(())
    }

    fn dehierarchize(&self, alpha: &mut [f64], storage: &GridStorage) -> Result<(), SGError>
    {
        for &d in storage.algorithmic_dimensions()
        {
            sweep::sweep_1d_in_place(&mut LinearDehierarchisation, storage, alpha, d)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LinearBoundaryHierarchisationOperation;

impl HierarchisationOperation for LinearBoundaryHierarchisationOperation
{
    fn hierarchize(&self, node_values: &mut [f64], storage: &GridStorage) -> Result<(), SGError>
    {
        for &d in storage.algorithmic_dimensions()
        {
            sweep::sweep_1d_boundary_in_place(&mut LinearBoundaryHierarchisation, storage, node_values, d)?;
        }
        Ok(())
    }

    fn dehierarchize(&self, alpha: &mut [f64], storage: &GridStorage) -> Result<(), SGError>
    {
        for &d in storage.algorithmic_dimensions()
        {
            sweep::sweep_1d_boundary_in_place(&mut LinearBoundaryDehierarchisation, storage, alpha, d)?;
        }
        Ok(())
    }
}
