use serde::{Deserialize, Serialize};

use crate::{dynamic::{algorithms::refinement::RefinementFunctor, storage::GridStorage}, errors::SGError};

///
/// Refinement settings for surplus based refinement.
///
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurplusRefinementOptions
{
    pub refinements_num: usize,
    pub threshold: f64,
}

impl Default for SurplusRefinementOptions
{
    fn default() -> Self {
        Self { refinements_num: 1, threshold: 0.0 }
    }
}

///
/// Scores each point by the magnitude of its hierarchical surplus.
///
pub struct SurplusRefinement<'a>
{
    alpha: &'a [f64],
    options: SurplusRefinementOptions,
}

impl<'a> SurplusRefinement<'a>
{
    pub fn new(alpha: &'a [f64], refinements_num: usize, threshold: f64) -> Self
    {
        Self { alpha, options: SurplusRefinementOptions { refinements_num, threshold } }
    }
    pub fn with_options(alpha: &'a [f64], options: SurplusRefinementOptions) -> Self
    {
        Self { alpha, options }
    }
}

impl RefinementFunctor for SurplusRefinement<'_>
{
    #[inline]
    fn value(&self, _storage: &GridStorage, seq: usize) -> f64
    {
        self.alpha[seq].abs()
    }
    #[inline]
    fn refinements_num(&self) -> usize
    {
        self.options.refinements_num
    }
    #[inline]
    fn threshold(&self) -> f64
    {
        self.options.threshold
    }
    fn validate(&self, storage: &GridStorage) -> Result<(), SGError>
    {
        if self.alpha.len() != storage.len()
        {
            return Err(SGError::DimensionMismatch { expected: storage.len(), found: self.alpha.len() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::dynamic::{algorithms::refinement::{HashRefinement, Refinement}, generators::{Generator, HashGenerator}, storage::GridPoint};

    #[test]
    fn test_surplus_refinement_picks_largest()
    {
        let mut storage = GridStorage::new(1);
        HashGenerator.regular(&mut storage, 2, None).expect("Could not generate grid");
        // (1,1), (2,1), (2,3)
        let alpha = [0.5, -0.25, 0.125];
        let functor = SurplusRefinement::new(&alpha, 1, 0.0);
        let new_points = HashRefinement.free_refine(&mut storage, &functor).expect("Could not refine");
        assert_eq!(new_points.len(), 2);
        assert!(storage.contains(&GridPoint::new(&[3], &[1], false)));
        assert!(storage.contains(&GridPoint::new(&[3], &[3], false)));
    }

    #[test]
    fn test_unbounded_refinements_num()
    {
        let mut storage = GridStorage::new(1);
        HashGenerator.regular(&mut storage, 2, None).expect("Could not generate grid");
        let alpha = [0.5, -0.25, 0.125];
        let functor = SurplusRefinement::new(&alpha, usize::MAX, 0.0);
        let new_points = HashRefinement.free_refine(&mut storage, &functor).expect("Could not refine");
        assert_eq!(new_points.len(), 4);
        assert!(storage.contains(&GridPoint::new(&[3], &[7], false)));
    }

    #[test]
    fn test_threshold_blocks_refinement()
    {
        let mut storage = GridStorage::new(1);
        HashGenerator.regular(&mut storage, 2, None).expect("Could not generate grid");
        let alpha = [0.5, -0.25, 0.125];
        let functor = SurplusRefinement::new(&alpha, 2, 0.3);
        let new_points = HashRefinement.free_refine(&mut storage, &functor).expect("Could not refine");
        assert!(new_points.is_empty());
    }

    #[test]
    fn test_alpha_length_mismatch()
    {
        let mut storage = GridStorage::new(1);
        HashGenerator.regular(&mut storage, 2, None).expect("Could not generate grid");
        let functor = SurplusRefinement::new(&[1.0], 1, 0.0);
        assert_eq!(HashRefinement.free_refine(&mut storage, &functor), Err(SGError::DimensionMismatch { expected: 3, found: 1 }));
    }
}
