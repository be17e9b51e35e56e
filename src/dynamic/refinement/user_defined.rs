use crate::dynamic::{algorithms::refinement::RefinementFunctor, storage::GridStorage};

///
/// A function that defines how refinement is performed.
///
/// # Arguments
/// - `storage`: Storage of sparse grid.
/// - `seq`: Sequence number of the scored point.
///
pub type UserRefinementFunction = dyn Fn(&GridStorage, usize) -> f64 + Send + Sync;

pub struct UserDefinedRefinement<'a>
{
    pub fun_eval: &'a UserRefinementFunction,
    pub refinements_num: usize,
    pub threshold: f64,
    pub start: f64,
}

impl<'a> UserDefinedRefinement<'a>
{
    pub fn new(fun_eval: &'a UserRefinementFunction, refinements_num: usize) -> Self
    {
        Self { fun_eval, refinements_num, threshold: 0.0, start: 0.0 }
    }
}

impl RefinementFunctor for UserDefinedRefinement<'_>
{
    fn value(&self, storage: &GridStorage, seq: usize) -> f64
    {
        (self.fun_eval)(storage, seq)
    }

    fn start(&self) -> f64
    {
        self.start
    }

    fn refinements_num(&self) -> usize
    {
        self.refinements_num
    }

    fn threshold(&self) -> f64
    {
        self.threshold
    }
}

#[test]
fn test_user_defined_refinement()
{
    use crate::dynamic::{algorithms::refinement::{HashRefinementBoundaries, Refinement}, generators::{BoundaryPolicy, Generator, HashGenerator}};
    let mut storage = GridStorage::new(2);
    HashGenerator.regular_with_boundaries(&mut storage, 1, BoundaryPolicy::Diagonal).expect("Could not generate grid");
    // refine only points on the left edge
    let fun = |storage: &GridStorage, seq: usize| if storage.unit_coordinate(seq)[0] == 0.0 { 1.0 } else { 0.0 };
    let functor = UserDefinedRefinement::new(&fun, 10);
    let new_points = HashRefinementBoundaries.free_refine(&mut storage, &functor).expect("Could not refine");
    assert!(!new_points.is_empty());
    for seq in new_points
    {
        let point = storage.point(seq);
        assert!(point.level[0] <= 1, "unexpected point {:?} {:?}", point.level, point.index);
    }
}
