use crate::{dynamic::{iterators::dynamic_grid_iterator::{GridIteratorT, HashMapGridIterator}, storage::GridStorage}, errors::SGError};

///
/// One-dimensional operation applied along `dimension` starting from the
/// iterator's current position.
///
pub trait SweepFunction
{
    fn execute_in_place(&mut self, values: &mut [f64], iterator: &mut HashMapGridIterator, dimension: usize) -> Result<(), SGError>;
}

fn sweep_recursive_in_place<F: SweepFunction>(function: &mut F, values: &mut [f64], iterator: &mut HashMapGridIterator,
    dim_list: &[usize], dim_rem: usize, dim_sweep: usize) -> Result<(), SGError>
{
    function.execute_in_place(values, iterator, dim_sweep)?;
    for d in 0..dim_rem
    {
        let cur_dim = dim_list[d];
        if iterator.is_leaf()
        {
            continue;
        }
        iterator.left_child(cur_dim);
        if iterator.seq().is_some()
        {
            sweep_recursive_in_place(function, values, iterator, dim_list, d + 1, dim_sweep)?;
        }
        iterator.step_right(cur_dim);
        if iterator.seq().is_some()
        {
            sweep_recursive_in_place(function, values, iterator, dim_list, d + 1, dim_sweep)?;
        }
        iterator.up(cur_dim);
    }
    Ok(())
}

fn sweep_boundary_recursive_in_place<F: SweepFunction>(function: &mut F, values: &mut [f64], iterator: &mut HashMapGridIterator,
    dim_list: &[usize], dim_rem: usize, dim_sweep: usize) -> Result<(), SGError>
{
    if dim_rem == 0
    {
        return function.execute_in_place(values, iterator, dim_sweep);
    }
    let d = dim_list[dim_rem - 1];
    let (current_level, _) = iterator.get(d);
    if current_level > 0
    {
        sweep_boundary_recursive_in_place(function, values, iterator, dim_list, dim_rem - 1, dim_sweep)?;
        if !iterator.is_leaf()
        {
            iterator.left_child(d);
            if iterator.seq().is_some()
            {
                sweep_boundary_recursive_in_place(function, values, iterator, dim_list, dim_rem, dim_sweep)?;
            }
            iterator.step_right(d);
            if iterator.seq().is_some()
            {
                sweep_boundary_recursive_in_place(function, values, iterator, dim_list, dim_rem, dim_sweep)?;
            }
            iterator.up(d);
        }
    }
    else
    {
        sweep_boundary_recursive_in_place(function, values, iterator, dim_list, dim_rem - 1, dim_sweep)?;
        iterator.reset_to_right_level_zero(d);
        sweep_boundary_recursive_in_place(function, values, iterator, dim_list, dim_rem - 1, dim_sweep)?;
        if iterator.reset_to_level_one(d)
        {
            sweep_boundary_recursive_in_place(function, values, iterator, dim_list, dim_rem, dim_sweep)?;
        }
        iterator.reset_to_left_level_zero(d);
    }
    Ok(())
}

fn other_dimensions(num_inputs: usize, dim_sweep: usize) -> Vec<usize>
{
    (0..num_inputs).filter(|&d| d != dim_sweep).collect()
}

fn check_values(storage: &GridStorage, values: &[f64]) -> Result<(), SGError>
{
    if values.len() != storage.len()
    {
        return Err(SGError::DimensionMismatch { expected: storage.len(), found: values.len() });
    }
    Ok(())
}

///
/// Applies `function` to every one-dimensional pole in `dim_sweep` of an interior grid.
///
pub fn sweep_1d_in_place<F: SweepFunction>(function: &mut F, storage: &GridStorage, values: &mut [f64], dim_sweep: usize) -> Result<(), SGError>
{
    check_values(storage, values)?;
    if storage.is_empty()
    {
        return Ok(());
    }
    let dim_list = other_dimensions(storage.num_inputs(), dim_sweep);
    let mut iterator = HashMapGridIterator::new(storage);
    sweep_recursive_in_place(function, values, &mut iterator, &dim_list, dim_list.len(), dim_sweep)
}

///
/// Applies `function` to every one-dimensional pole in `dim_sweep` of a grid with
/// boundary points. Poles start on the left level-zero point.
///
pub fn sweep_1d_boundary_in_place<F: SweepFunction>(function: &mut F, storage: &GridStorage, values: &mut [f64], dim_sweep: usize) -> Result<(), SGError>
{
    check_values(storage, values)?;
    if storage.is_empty()
    {
        return Ok(());
    }
    let dim_list = other_dimensions(storage.num_inputs(), dim_sweep);
    let mut iterator = HashMapGridIterator::new(storage);
    iterator.reset_to_level_zero();
    sweep_boundary_recursive_in_place(function, values, &mut iterator, &dim_list, dim_list.len(), dim_sweep)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::dynamic::generators::{BoundaryPolicy, Generator, HashGenerator};

    struct CountVisits(Vec<usize>);

    impl SweepFunction for CountVisits
    {
        fn execute_in_place(&mut self, _values: &mut [f64], iterator: &mut HashMapGridIterator, _dimension: usize) -> Result<(), SGError>
        {
            if let Some(seq) = iterator.seq()
            {
                self.0[seq] += 1;
            }
            Ok(())
        }
    }

    #[test]
    fn test_poles_start_once()
    {
        let mut storage = GridStorage::new(2);
        HashGenerator.regular(&mut storage, 3, None).expect("Could not generate grid");
        let mut values = vec![0.0; storage.len()];
        let mut visits = CountVisits(vec![0; storage.len()]);
        sweep_1d_in_place(&mut visits, &storage, &mut values, 0).expect("Sweep failed");
        // one pole per point with level 1 in the sweep dimension
        for seq in 0..storage.len()
        {
            let expected = usize::from(storage.level(seq, 0) == 1);
            assert_eq!(visits.0[seq], expected);
        }
    }

    #[test]
    fn test_boundary_poles_start_once()
    {
        let mut storage = GridStorage::new(2);
        HashGenerator.regular_with_boundaries(&mut storage, 2, BoundaryPolicy::Trapezoid).expect("Could not generate grid");
        let mut values = vec![0.0; storage.len()];
        let mut visits = CountVisits(vec![0; storage.len()]);
        sweep_1d_boundary_in_place(&mut visits, &storage, &mut values, 1).expect("Sweep failed");
        for seq in 0..storage.len()
        {
            let expected = usize::from(storage.level(seq, 1) == 0 && storage.index(seq, 1) == 0);
            assert_eq!(visits.0[seq], expected);
        }
        let mut short = vec![0.0; 3];
        assert!(matches!(sweep_1d_boundary_in_place(&mut visits, &storage, &mut short, 0), Err(SGError::DimensionMismatch { .. })));
    }
}
