use crate::{dynamic::storage::{pack, GridPoint, GridStorage, MAX_LEVEL}, errors::SGError};

///
/// Scores existing grid points for refinement. A refinement pass considers the
/// `refinements_num` highest scores that exceed `start` and reach `threshold`.
///
pub trait RefinementFunctor : Send + Sync
{
    ///
    /// Refinement indicator of point `seq`.
    ///
    fn value(&self, storage: &GridStorage, seq: usize) -> f64;

    ///
    /// Floor value: points not exceeding it are never refined.
    ///
    fn start(&self) -> f64
    {
        0.0
    }

    ///
    /// Maximum number of points refined per pass.
    ///
    fn refinements_num(&self) -> usize;

    fn threshold(&self) -> f64;

    ///
    /// Checks that the functor can score `storage`; called once before a pass.
    ///
    fn validate(&self, _storage: &GridStorage) -> Result<(), SGError>
    {
        Ok(())
    }
}

fn get_index_of_min(values: &[f64]) -> usize
{
    let mut min_idx = 0;
    for i in 1..values.len()
    {
        if values[i] < values[min_idx]
        {
            min_idx = i;
        }
    }
    min_idx
}

///
/// Children of (level, index): level 0 only has (1,1).
///
#[inline]
fn children(level: u8, index: u32) -> ([(u8, u32); 2], usize)
{
    if level == 0
    {
        ([(1, 1), (1, 1)], 1)
    }
    else
    {
        ([(level + 1, 2 * index - 1), (level + 1, 2 * index + 1)], 2)
    }
}

///
/// Visits every (dimension, child) of point `seq` that is absent from storage, in
/// dimensions whose level is below `max_level`. Stops early when `op` returns false.
///
fn for_each_missing_child<Op: FnMut(usize) -> bool>(storage: &GridStorage, seq: usize, key: &mut [u64], max_level: u8, mut op: Op)
{
    let n = storage.num_inputs();
    for d in 0..n
    {
        key[d] = pack(storage.level(seq, d), storage.index(seq, d));
    }
    for d in 0..n
    {
        let (level, index) = (storage.level(seq, d), storage.index(seq, d));
        if level >= max_level
        {
            continue;
        }
        let (candidates, count) = children(level, index);
        for &(cl, ci) in &candidates[..count]
        {
            key[d] = pack(cl, ci);
            if storage.find_key(key).is_none() && !op(d)
            {
                key[d] = pack(level, index);
                return;
            }
        }
        key[d] = pack(level, index);
    }
}

fn has_missing_child(storage: &GridStorage, seq: usize, key: &mut [u64], max_level: u8) -> bool
{
    let mut found = false;
    for_each_missing_child(storage, seq, key, max_level, |_| { found = true; false });
    found
}

///
/// Interior parent creation shared by both engines: marks an existing point as
/// non-leaf or creates it (recursively) as a non-leaf point.
///
fn ensure_inner_node<R: Refinement + ?Sized>(refinement: &R, storage: &mut GridStorage, mut point: GridPoint) -> Result<(), SGError>
{
    match storage.find(&point)
    {
        Some(seq) => storage.set_is_leaf(seq, false),
        None =>
        {
            point.set_is_leaf(false);
            refinement.create_gridpoint(storage, point)?;
        }
    }
    Ok(())
}

///
/// Adaptive refinement engine.
///
pub trait Refinement
{
    ///
    /// Inserts `point` together with every missing ancestor needed to keep the
    /// grid hierarchically closed. Fails for points the storage rejects.
    ///
    fn create_gridpoint(&self, storage: &mut GridStorage, point: GridPoint) -> Result<(), SGError>;

    ///
    /// Creates the missing children of point `seq` in every dimension whose level
    /// is below `max_level`. The point loses its leaf flag, new children are leaves.
    ///
    fn refine_gridpoint(&self, storage: &mut GridStorage, seq: usize, max_level: u8) -> Result<(), SGError>
    {
        storage.set_is_leaf(seq, false);
        let point = storage.point(seq);
        for d in 0..storage.num_inputs()
        {
            if point.level[d] >= max_level
            {
                continue;
            }
            let (candidates, count) = children(point.level[d], point.index[d]);
            for &(cl, ci) in &candidates[..count]
            {
                let mut child = point.clone();
                child.set(d, cl, ci);
                if !storage.contains(&child)
                {
                    child.set_is_leaf(true);
                    tracing::trace!(level = ?child.level, index = ?child.index, "creating grid point");
                    self.create_gridpoint(storage, child)?;
                }
            }
        }
        Ok(())
    }

    ///
    /// Refines the highest scoring points. Returns the sequence numbers of the new points.
    ///
    fn free_refine(&self, storage: &mut GridStorage, functor: &dyn RefinementFunctor) -> Result<Vec<usize>, SGError>
    {
        refine_up_to(self, storage, functor, MAX_LEVEL)
    }

    ///
    /// Number of (point, dimension, side) triples whose child is absent: the
    /// children a refinement pass could still create. Level 0 has a single side.
    ///
    fn get_number_of_refinable_points(&self, storage: &GridStorage) -> Result<usize, SGError>
    {
        count_missing_children(storage, MAX_LEVEL)
    }

    ///
    /// Creates every point of the subspace given by the level vector of `point`;
    /// all of its indices must be 1.
    ///
    fn create_subspace(&self, storage: &mut GridStorage, point: &GridPoint) -> Result<(), SGError>
    {
        if storage.is_empty()
        {
            return Err(SGError::empty_storage());
        }
        if point.num_inputs() != storage.num_inputs()
        {
            return Err(SGError::DimensionMismatch { expected: storage.num_inputs(), found: point.num_inputs() });
        }
        if point.index.iter().any(|&i| i != 1)
        {
            return Err(SGError::StorageState("subspace index vector must be all ones".to_string()));
        }
        let mut point = point.clone();
        create_subspace_helper(self, storage, &mut point, 0)
    }
}

fn create_subspace_helper<R: Refinement + ?Sized>(refinement: &R, storage: &mut GridStorage, point: &mut GridPoint, dim: usize) -> Result<(), SGError>
{
    if dim < point.num_inputs()
    {
        let level = point.level[dim];
        for i in (1..(1_u64 << level)).step_by(2)
        {
            point.index[dim] = i as u32;
            create_subspace_helper(refinement, storage, point, dim + 1)?;
        }
        point.index[dim] = 1;
    }
    else if !storage.contains(point)
    {
        let mut new_point = point.clone();
        new_point.set_is_leaf(true);
        refinement.create_gridpoint(storage, new_point)?;
    }
    Ok(())
}

fn refine_up_to<R: Refinement + ?Sized>(refinement: &R, storage: &mut GridStorage, functor: &dyn RefinementFunctor, max_level: u8) -> Result<Vec<usize>, SGError>
{
    if storage.is_empty()
    {
        return Err(SGError::empty_storage());
    }
    functor.validate(storage)?;
    // never more candidates than points
    let refinements_num = functor.refinements_num().min(storage.len());
    if refinements_num == 0
    {
        return Ok(Vec::new());
    }
    let original_number = storage.len();
    let start = functor.start();
    let mut max_values = vec![start; refinements_num];
    let mut max_indices = vec![0; refinements_num];
    let mut min_idx = 0;
    let mut key = vec![0; storage.num_inputs()];
    for seq in 0..storage.len()
    {
        // a point qualifies once some dimension is still below the level cap
        if (0..storage.num_inputs()).all(|d| storage.level(seq, d) >= max_level)
        {
            continue;
        }
        if !has_missing_child(storage, seq, &mut key, max_level)
        {
            continue;
        }
        let current_value = functor.value(storage, seq);
        if current_value > max_values[min_idx]
        {
            max_values[min_idx] = current_value;
            max_indices[min_idx] = seq;
            min_idx = get_index_of_min(&max_values);
        }
    }
    let threshold = functor.threshold();
    for (&value, &seq) in max_values.iter().zip(&max_indices)
    {
        if value > start && value.abs() >= threshold
        {
            refinement.refine_gridpoint(storage, seq, max_level)?;
        }
    }
    tracing::debug!(refined_points = storage.len() - original_number, total = storage.len(), "refinement pass finished");
    Ok((original_number..storage.len()).collect())
}

fn count_missing_children(storage: &GridStorage, max_level: u8) -> Result<usize, SGError>
{
    if storage.is_empty()
    {
        return Err(SGError::empty_storage());
    }
    let mut key = vec![0; storage.num_inputs()];
    let mut counter = 0;
    for seq in 0..storage.len()
    {
        for_each_missing_child(storage, seq, &mut key, max_level, |_| { counter += 1; true });
    }
    Ok(counter)
}

///
/// Refinement of grids without boundary points: new points pull in their
/// interior ancestors.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct HashRefinement;

impl Refinement for HashRefinement
{
    fn create_gridpoint(&self, storage: &mut GridStorage, point: GridPoint) -> Result<(), SGError>
    {
        storage.check_point(&point)?;
        for d in 0..storage.num_inputs()
        {
            if let Some(parent) = point.parent(d)
            {
                ensure_inner_node(self, storage, parent)?;
            }
        }
        storage.insert(point)?;
        Ok(())
    }
}

///
/// Refinement of grids with boundary points. On top of the interior ancestors, a
/// level-1 point needs both level-0 points of its dimension, and level-0 points
/// always come in pairs (for more than one dimension).
///
#[derive(Clone, Copy, Debug, Default)]
pub struct HashRefinementBoundaries;

impl HashRefinementBoundaries
{
    fn create_gridpoint_general(&self, storage: &mut GridStorage, point: &GridPoint) -> Result<(), SGError>
    {
        storage.check_point(point)?;
        let num_inputs = storage.num_inputs();
        for d in 0..num_inputs
        {
            let level = point.level[d];
            if level == 1
            {
                for boundary_index in [0, 1]
                {
                    let mut boundary = point.clone();
                    boundary.set(d, 0, boundary_index);
                    if num_inputs > 1
                    {
                        ensure_inner_node(self, storage, boundary)?;
                    }
                    else if let Some(seq) = storage.find(&boundary)
                    {
                        storage.set_is_leaf(seq, false);
                    }
                }
            }
            if let Some(parent) = point.parent(d)
            {
                ensure_inner_node(self, storage, parent)?;
            }
        }
        storage.insert(point.clone())?;
        Ok(())
    }

    fn create_gridpoint_level_zero_consistency(&self, storage: &mut GridStorage, point: &GridPoint) -> Result<(), SGError>
    {
        let num_inputs = storage.num_inputs();
        if num_inputs < 2
        {
            return Ok(());
        }
        for d in 0..num_inputs
        {
            if point.level[d] != 0
            {
                continue;
            }
            for (present, other) in [(0, 1), (1, 0)]
            {
                let mut sibling = point.clone();
                sibling.set(d, 0, present);
                if !storage.contains(&sibling)
                {
                    continue;
                }
                sibling.set(d, 0, other);
                match storage.find(&sibling)
                {
                    None =>
                    {
                        sibling.set_is_leaf(point.is_leaf());
                        self.create_gridpoint(storage, sibling)?;
                    }
                    // only ever clear: the sibling may own children already
                    Some(seq) if !point.is_leaf() => storage.set_is_leaf(seq, false),
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    ///
    /// Refinement pass that never creates levels above `max_level`.
    ///
    pub fn refine_to_max_level(&self, storage: &mut GridStorage, functor: &dyn RefinementFunctor, max_level: u8) -> Result<Vec<usize>, SGError>
    {
        refine_up_to(self, storage, functor, max_level.min(MAX_LEVEL))
    }

    pub fn get_number_of_refinable_points_to_max_level(&self, storage: &GridStorage, max_level: u8) -> Result<usize, SGError>
    {
        count_missing_children(storage, max_level.min(MAX_LEVEL))
    }
}

impl Refinement for HashRefinementBoundaries
{
    fn create_gridpoint(&self, storage: &mut GridStorage, point: GridPoint) -> Result<(), SGError>
    {
        self.create_gridpoint_general(storage, &point)?;
        self.create_gridpoint_level_zero_consistency(storage, &point)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::dynamic::generators::{BoundaryPolicy, Generator, HashGenerator};

    struct ConstantFunctor(f64, usize);

    impl RefinementFunctor for ConstantFunctor
    {
        fn value(&self, _storage: &GridStorage, _seq: usize) -> f64
        {
            self.0
        }
        fn refinements_num(&self) -> usize
        {
            self.1
        }
        fn threshold(&self) -> f64
        {
            0.0
        }
    }

    ///
    /// Prefers points close to the origin so refinement digs into one corner.
    ///
    struct CornerFunctor(usize);

    impl RefinementFunctor for CornerFunctor
    {
        fn value(&self, storage: &GridStorage, seq: usize) -> f64
        {
            let x = storage.unit_coordinate(seq);
            1.0 / (1.0 + x.iter().sum::<f64>()) + storage.level_sum(seq) as f64 * 1e-3
        }
        fn refinements_num(&self) -> usize
        {
            self.0
        }
        fn threshold(&self) -> f64
        {
            0.0
        }
    }

    fn assert_closed(storage: &GridStorage)
    {
        let num_inputs = storage.num_inputs();
        for seq in 0..storage.len()
        {
            let point = storage.point(seq);
            for d in 0..num_inputs
            {
                if let Some(parent) = point.parent(d)
                {
                    assert!(storage.contains(&parent), "orphan {:?} {:?}", point.level, point.index);
                }
            }
        }
        let mut copy = storage.clone();
        copy.recalc_leaf_property();
        for seq in 0..storage.len()
        {
            // a leaf flag may only be set on a true leaf
            assert!(!storage.is_leaf(seq) || copy.is_leaf(seq));
        }
    }

    fn assert_level_zero_consistent(storage: &GridStorage)
    {
        for seq in 0..storage.len()
        {
            let point = storage.point(seq);
            for d in 0..storage.num_inputs()
            {
                if point.level[d] == 1
                {
                    for b in [0, 1]
                    {
                        let mut boundary = point.clone();
                        boundary.set(d, 0, b);
                        assert!(storage.contains(&boundary), "missing boundary of {:?} {:?}", point.level, point.index);
                    }
                }
            }
        }
    }

    #[test]
    fn test_refine_single_point()
    {
        let mut storage = GridStorage::new(2);
        HashGenerator.regular(&mut storage, 1, None).expect("Could not generate grid");
        assert_eq!(storage.len(), 1);
        assert_eq!(HashRefinement.get_number_of_refinable_points(&storage), Ok(4));
        let new_points = HashRefinement.free_refine(&mut storage, &ConstantFunctor(1.0, 1)).expect("Could not refine");
        assert_eq!(new_points, vec![1, 2, 3, 4]);
        assert!(!storage.is_leaf(0));
        assert!((1..5).all(|seq| storage.is_leaf(seq)));
        assert!(storage.contains(&GridPoint::new(&[1, 2], &[1, 3], false)));
    }

    #[test]
    fn test_constant_start_is_a_no_op()
    {
        let mut storage = GridStorage::new(3);
        HashGenerator.regular(&mut storage, 3, None).expect("Could not generate grid");
        let before = storage.serialize();
        let new_points = HashRefinement.free_refine(&mut storage, &ConstantFunctor(0.0, 5)).expect("Could not refine");
        assert!(new_points.is_empty());
        assert_eq!(storage.serialize(), before);
    }

    #[test]
    fn test_refine_empty_storage_fails()
    {
        let mut storage = GridStorage::new(2);
        assert!(matches!(HashRefinement.free_refine(&mut storage, &ConstantFunctor(1.0, 1)), Err(SGError::StorageState(_))));
        assert!(HashRefinementBoundaries.get_number_of_refinable_points(&storage).is_err());
    }

    #[test]
    fn test_refinement_keeps_hierarchy_closed()
    {
        let mut storage = GridStorage::new(3);
        HashGenerator.regular(&mut storage, 2, None).expect("Could not generate grid");
        for _ in 0..6
        {
            HashRefinement.free_refine(&mut storage, &CornerFunctor(3)).expect("Could not refine");
            assert_closed(&storage);
        }
        assert!(storage.max_level() >= 4);
    }

    #[test]
    fn test_create_gridpoint_adds_ancestors()
    {
        let mut storage = GridStorage::new(2);
        HashGenerator.regular(&mut storage, 1, None).expect("Could not generate grid");
        HashRefinement.create_gridpoint(&mut storage, GridPoint::new(&[3, 2], &[5, 3], true)).expect("Could not create point");
        assert!(storage.contains(&GridPoint::new(&[2, 2], &[3, 3], false)));
        assert!(storage.contains(&GridPoint::new(&[1, 2], &[1, 3], false)));
        assert!(storage.contains(&GridPoint::new(&[3, 1], &[5, 1], false)));
        assert_closed(&storage);
    }

    #[test]
    fn test_boundary_refinement_level_zero_consistency()
    {
        let mut storage = GridStorage::new(2);
        HashGenerator.regular_with_boundaries(&mut storage, 1, BoundaryPolicy::Trapezoid).expect("Could not generate grid");
        for _ in 0..5
        {
            HashRefinementBoundaries.free_refine(&mut storage, &CornerFunctor(4)).expect("Could not refine");
            assert_closed(&storage);
            assert_level_zero_consistent(&storage);
        }
        let mut storage = GridStorage::new(3);
        HashGenerator.regular_with_boundaries(&mut storage, 1, BoundaryPolicy::Diagonal).expect("Could not generate grid");
        HashRefinementBoundaries.create_gridpoint(&mut storage, GridPoint::new(&[2, 1, 0], &[3, 1, 1], true)).expect("Could not create point");
        assert_closed(&storage);
        assert_level_zero_consistent(&storage);
        assert!(storage.contains(&GridPoint::new(&[2, 1, 0], &[3, 1, 0], false)));
    }

    #[test]
    fn test_refine_to_max_level()
    {
        let mut storage = GridStorage::new(2);
        HashGenerator.regular_with_boundaries(&mut storage, 2, BoundaryPolicy::Diagonal).expect("Could not generate grid");
        for _ in 0..10
        {
            HashRefinementBoundaries.refine_to_max_level(&mut storage, &ConstantFunctor(1.0, 100), 3).expect("Could not refine");
        }
        assert_eq!(storage.max_level(), 3);
        assert_eq!(HashRefinementBoundaries.get_number_of_refinable_points_to_max_level(&storage, 3), Ok(0));
        // the full boundary grid of level 3
        assert_eq!(storage.len(), 81);
    }

    #[test]
    fn test_refinements_num_larger_than_grid()
    {
        let mut storage = GridStorage::new(1);
        HashGenerator.regular(&mut storage, 2, None).expect("Could not generate grid");
        let new_points = HashRefinement.free_refine(&mut storage, &ConstantFunctor(1.0, usize::MAX)).expect("Could not refine");
        assert_eq!(new_points, vec![3, 4, 5, 6]);
        assert_eq!(storage.max_level(), 3);
        assert_eq!(HashRefinement.get_number_of_refinable_points(&storage), Ok(8));
    }

    #[test]
    fn test_create_gridpoint_respects_level_cap()
    {
        let mut storage = GridStorage::new(1);
        let too_deep = HashRefinement.create_gridpoint(&mut storage, GridPoint::new(&[MAX_LEVEL + 1], &[1], true));
        assert!(matches!(too_deep, Err(SGError::InvalidGridPoint(_))));
        assert!(storage.is_empty());
        let wrong_dim = HashRefinementBoundaries.create_gridpoint(&mut storage, GridPoint::new(&[2, 1], &[1, 1], true));
        assert_eq!(wrong_dim, Err(SGError::DimensionMismatch { expected: 1, found: 2 }));
        HashRefinement.create_gridpoint(&mut storage, GridPoint::new(&[MAX_LEVEL], &[1], true)).expect("Could not create point");
        assert_eq!(storage.len(), MAX_LEVEL as usize);
        assert_closed(&storage);
        assert!(storage.is_leaf(storage.len() - 1));
        // nothing is refinable past the cap
        let last = storage.len() - 1;
        HashRefinement.refine_gridpoint(&mut storage, last, MAX_LEVEL).expect("Could not refine");
        assert_eq!(storage.len(), MAX_LEVEL as usize);
    }

    #[test]
    fn test_create_subspace()
    {
        let mut storage = GridStorage::new(2);
        HashGenerator.regular(&mut storage, 1, None).expect("Could not generate grid");
        HashRefinement.create_subspace(&mut storage, &GridPoint::new(&[3, 2], &[1, 1], false)).expect("Could not create subspace");
        for i in (1..8).step_by(2)
        {
            for j in [1, 3]
            {
                assert!(storage.contains(&GridPoint::new(&[3, 2], &[i, j], false)));
            }
        }
        assert_closed(&storage);
        let bad = HashRefinement.create_subspace(&mut storage, &GridPoint::new(&[3, 2], &[3, 1], false));
        assert!(matches!(bad, Err(SGError::StorageState(_))));
    }

    #[test]
    fn test_top_k_selection()
    {
        let mut storage = GridStorage::new(1);
        HashGenerator.regular(&mut storage, 3, None).expect("Could not generate grid");
        // both children of the four leaves (3,1),(3,3),(3,5),(3,7)
        assert_eq!(HashRefinement.get_number_of_refinable_points(&storage), Ok(8));
        let new_points = HashRefinement.free_refine(&mut storage, &CornerFunctor(1)).expect("Could not refine");
        assert_eq!(new_points.len(), 2);
        assert!(storage.contains(&GridPoint::new(&[4], &[1], false)));
        assert!(storage.contains(&GridPoint::new(&[4], &[3], false)));
    }
}
