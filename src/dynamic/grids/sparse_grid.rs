use std::{fmt, io::Write};

use serde::{Deserialize, Serialize};

use crate::{basis::linear::{LinearBasis, LinearBoundaryBasis}, dynamic::{algorithms::{affected_basis_functions::{AffectedBasis, GetAffectedBasisFunctions, GetAffectedStretchedBasisFunctions}, hierarchisation::{HierarchisationOperation, LinearBoundaryHierarchisationOperation, LinearHierarchisationOperation}, operation_eval::OperationEval, refinement::{HashRefinement, HashRefinementBoundaries, Refinement, RefinementFunctor}}, generators::{BoundaryPolicy, Generator, HashGenerator}, storage::{BoundingBox, BoundingBox1D, Domain, GridStorage, Stretching, Stretching1D}}, errors::SGError, serialization::SerializationFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridType
{
    /// Linear hats without boundary points.
    Linear,
    /// Linear hats with boundary points, diagonal cut.
    LinearBoundary,
    /// Linear hats with boundary points, pentagon cut.
    LinearTrapezoidBoundary,
    /// Linear hats with boundary points on a stretched domain.
    LinearStretchedBoundary,
}

impl GridType
{
    pub const ALL: [GridType; 4] = [GridType::Linear, GridType::LinearBoundary, GridType::LinearTrapezoidBoundary, GridType::LinearStretchedBoundary];

    pub fn name(&self) -> &'static str
    {
        match self
        {
            GridType::Linear => "linear",
            GridType::LinearBoundary => "linearBoundary",
            GridType::LinearTrapezoidBoundary => "linearTrapezoidBoundary",
            GridType::LinearStretchedBoundary => "linearStretchedTrapezoidBoundary",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, SGError>
    {
        Self::ALL.into_iter().find(|t| t.name() == name).ok_or_else(|| SGError::UnknownGridType(name.to_string()))
    }

    pub fn has_boundary(&self) -> bool
    {
        !matches!(self, GridType::Linear)
    }

    pub fn is_stretched(&self) -> bool
    {
        matches!(self, GridType::LinearStretchedBoundary)
    }
}

impl fmt::Display for GridType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.name())
    }
}

///
/// A sparse grid of a fixed [`GridType`]: point storage plus nodal values and
/// hierarchical surpluses (`alpha`).
///
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Grid
{
    grid_type: GridType,
    pub(crate) storage: GridStorage,
    pub(crate) alpha: Vec<f64>,
    pub(crate) values: Vec<f64>,
}

impl Grid
{
    ///
    /// Creates an empty grid on the unit cube. Stretched grids get the identity
    /// stretching.
    ///
    pub fn new(grid_type: GridType, num_inputs: usize) -> Result<Self, SGError>
    {
        let storage = if grid_type.is_stretched()
        {
            let stretching = Stretching::analytic(vec![BoundingBox1D::new(0.0, 1.0); num_inputs], vec![Stretching1D::id(); num_inputs])?;
            GridStorage::with_stretching(stretching)
        }
        else
        {
            GridStorage::new(num_inputs)
        };
        Self::from_storage(grid_type, storage)
    }

    pub fn with_bounding_box(grid_type: GridType, bounding_box: BoundingBox) -> Result<Self, SGError>
    {
        Self::from_storage(grid_type, GridStorage::with_bounding_box(bounding_box))
    }

    pub fn with_stretching(stretching: Stretching) -> Self
    {
        let storage = GridStorage::with_stretching(stretching);
        let len = storage.len();
        Self { grid_type: GridType::LinearStretchedBoundary, storage, alpha: vec![0.0; len], values: vec![0.0; len] }
    }

    ///
    /// Wraps an existing storage. Stretched grids require a stretching domain and
    /// all other types a bounding box.
    ///
    pub fn from_storage(grid_type: GridType, storage: GridStorage) -> Result<Self, SGError>
    {
        let stretched_domain = matches!(storage.domain(), Domain::Stretching(_));
        if stretched_domain != grid_type.is_stretched()
        {
            return Err(SGError::UnsupportedOperation(format!("domain does not match grid type `{grid_type}`")));
        }
        let len = storage.len();
        Ok(Self { grid_type, storage, alpha: vec![0.0; len], values: vec![0.0; len] })
    }

    pub fn grid_type(&self) -> GridType
    {
        self.grid_type
    }

    pub fn storage(&self) -> &GridStorage
    {
        &self.storage
    }

    pub fn num_inputs(&self) -> usize
    {
        self.storage.num_inputs()
    }

    pub fn len(&self) -> usize
    {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.storage.is_empty()
    }

    pub fn alpha(&self) -> &[f64]
    {
        &self.alpha
    }

    pub fn set_alpha(&mut self, alpha: Vec<f64>) -> Result<(), SGError>
    {
        self.check_len(alpha.len())?;
        self.alpha = alpha;
        Ok(())
    }

    pub fn values(&self) -> &[f64]
    {
        &self.values
    }

    pub fn set_values(&mut self, values: Vec<f64>) -> Result<(), SGError>
    {
        self.check_len(values.len())?;
        self.values = values;
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<(), SGError>
    {
        if len != self.storage.len()
        {
            return Err(SGError::DimensionMismatch { expected: self.storage.len(), found: len });
        }
        Ok(())
    }

    fn resize_coefficients(&mut self)
    {
        self.alpha.resize(self.storage.len(), 0.0);
        self.values.resize(self.storage.len(), 0.0);
    }

    ///
    /// Fills the empty grid with the regular sparse grid of `level` for this grid type.
    ///
    pub fn generate_regular(&mut self, level: u8) -> Result<(), SGError>
    {
        match self.grid_type
        {
            GridType::Linear => HashGenerator.regular(&mut self.storage, level, None)?,
            GridType::LinearBoundary => HashGenerator.regular_with_boundaries(&mut self.storage, level, BoundaryPolicy::Diagonal)?,
            GridType::LinearTrapezoidBoundary | GridType::LinearStretchedBoundary =>
                HashGenerator.regular_with_boundaries(&mut self.storage, level, BoundaryPolicy::Trapezoid)?,
        }
        self.resize_coefficients();
        Ok(())
    }

    pub fn generate_full(&mut self, level: u8) -> Result<(), SGError>
    {
        if self.grid_type.has_boundary()
        {
            HashGenerator.full_with_boundaries(&mut self.storage, level)?;
        }
        else
        {
            HashGenerator.full(&mut self.storage, level)?;
        }
        self.resize_coefficients();
        Ok(())
    }

    ///
    /// Sets the nodal values by evaluating `fun` at every grid point (real coordinates).
    ///
    pub fn sample<F: Fn(&[f64]) -> f64>(&mut self, fun: F)
    {
        self.values = (0..self.storage.len()).map(|seq| fun(&self.storage.coordinate(seq))).collect();
    }

    fn hierarchisation(&self) -> Result<&'static dyn HierarchisationOperation, SGError>
    {
        match self.grid_type
        {
            GridType::Linear => Ok(&LinearHierarchisationOperation),
            GridType::LinearBoundary | GridType::LinearTrapezoidBoundary => Ok(&LinearBoundaryHierarchisationOperation),
            GridType::LinearStretchedBoundary => Err(SGError::UnsupportedOperation("hierarchisation on stretched grids".to_string())),
        }
    }

    ///
    /// Computes `alpha` from the nodal values.
    ///
    pub fn hierarchize(&mut self) -> Result<(), SGError>
    {
        let op = self.hierarchisation()?;
        let mut alpha = self.values.clone();
        op.hierarchize(&mut alpha, &self.storage)?;
        self.alpha = alpha;
        Ok(())
    }

    ///
    /// Computes the nodal values from `alpha`.
    ///
    pub fn dehierarchize(&mut self) -> Result<(), SGError>
    {
        let op = self.hierarchisation()?;
        let mut values = self.alpha.clone();
        op.dehierarchize(&mut values, &self.storage)?;
        self.values = values;
        Ok(())
    }

    fn refinement(&self) -> &'static dyn Refinement
    {
        if self.grid_type.has_boundary() { &HashRefinementBoundaries } else { &HashRefinement }
    }

    ///
    /// One refinement pass. Returns the sequence numbers of the created points;
    /// their values and surpluses start at zero.
    ///
    pub fn refine(&mut self, functor: &dyn RefinementFunctor) -> Result<Vec<usize>, SGError>
    {
        let new_points = self.refinement().free_refine(&mut self.storage, functor)?;
        self.resize_coefficients();
        Ok(new_points)
    }

    pub fn number_of_refinable_points(&self) -> Result<usize, SGError>
    {
        self.refinement().get_number_of_refinable_points(&self.storage)
    }

    ///
    /// Refines with `functor`, samples `fun` at the new points and updates `alpha`.
    /// Returns the number of created points.
    ///
    pub fn refine_iteration<F: Fn(&[f64]) -> f64>(&mut self, functor: &dyn RefinementFunctor, fun: F) -> Result<usize, SGError>
    {
        let new_points = self.refine(functor)?;
        for &seq in &new_points
        {
            self.values[seq] = fun(&self.storage.coordinate(seq));
        }
        self.hierarchize()?;
        Ok(new_points.len())
    }

    fn with_lookup<R, F>(&self, f: F) -> Result<R, SGError>
        where F: FnOnce(&dyn AffectedBasisOps) -> Result<R, SGError>
    {
        match self.grid_type
        {
            GridType::Linear => f(&OperationEval::new(GetAffectedBasisFunctions::new(&self.storage, LinearBasis))),
            GridType::LinearBoundary | GridType::LinearTrapezoidBoundary => f(&OperationEval::new(GetAffectedBasisFunctions::new(&self.storage, LinearBoundaryBasis))),
            GridType::LinearStretchedBoundary => f(&OperationEval::new(GetAffectedStretchedBasisFunctions::new(&self.storage))),
        }
    }

    ///
    /// The (sequence number, basis value) pairs of all basis functions that are
    /// non-zero at `x`.
    ///
    pub fn affected_basis_functions(&self, x: &[f64]) -> Result<Vec<(usize, f64)>, SGError>
    {
        self.with_lookup(|op| op.affected(x))
    }

    pub fn eval(&self, x: &[f64]) -> Result<f64, SGError>
    {
        self.with_lookup(|op| op.eval(&self.alpha, x))
    }

    ///
    /// Evaluates the points stored row-major in `x` in parallel.
    ///
    pub fn eval_batch(&self, x: &[f64]) -> Result<Vec<f64>, SGError>
    {
        self.with_lookup(|op| op.eval_batch(&self.alpha, x))
    }

    ///
    /// Text form: the type name on the first line followed by the storage text.
    ///
    pub fn serialize(&self) -> String
    {
        format!("{}\n{}", self.grid_type.name(), self.storage.serialize())
    }

    ///
    /// Writes the full grid (storage, values and surpluses) in the given binary format.
    ///
    pub fn write(&self, path: &str, format: SerializationFormat) -> Result<(), SGError>
    {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(|_| SGError::FileIOError)?);
        let buffer = crate::serialization::serialize(self, format)?;
        file.write_all(&buffer).map_err(|_| SGError::FileIOError)?;
        file.flush().map_err(|_| SGError::FileIOError)
    }

    pub fn read_buffer(buffer: &[u8], format: SerializationFormat) -> Result<Self, SGError>
    {
        crate::serialization::deserialize(buffer, format)
    }

    pub fn read<Reader: std::io::Read>(mut reader: Reader, format: SerializationFormat) -> Result<Self, SGError>
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|_| SGError::FileIOError)?;
        Self::read_buffer(&bytes, format)
    }
}

///
/// Object-safe view of an [`OperationEval`] so the façade can pick the lookup at runtime.
///
trait AffectedBasisOps
{
    fn affected(&self, x: &[f64]) -> Result<Vec<(usize, f64)>, SGError>;
    fn eval(&self, alpha: &[f64], x: &[f64]) -> Result<f64, SGError>;
    fn eval_batch(&self, alpha: &[f64], x: &[f64]) -> Result<Vec<f64>, SGError>;
}

impl<A: AffectedBasis> AffectedBasisOps for OperationEval<A>
{
    fn affected(&self, x: &[f64]) -> Result<Vec<(usize, f64)>, SGError>
    {
        self.lookup().affected(x)
    }

    fn eval(&self, alpha: &[f64], x: &[f64]) -> Result<f64, SGError>
    {
        OperationEval::eval(self, alpha, x)
    }

    fn eval_batch(&self, alpha: &[f64], x: &[f64]) -> Result<Vec<f64>, SGError>
    {
        OperationEval::eval_batch(self, alpha, x)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::dynamic::{refinement::surplus::SurplusRefinement, storage::{GridPoint, StretchingType}};

    fn parabola(x: &[f64]) -> f64
    {
        x.iter().map(|v| 4.0 * v * (1.0 - v)).product()
    }

    #[test]
    fn test_grid_type_names()
    {
        for grid_type in GridType::ALL
        {
            assert_eq!(GridType::from_name(grid_type.name()), Ok(grid_type));
        }
        assert_eq!(GridType::from_name("poly"), Err(SGError::UnknownGridType("poly".to_string())));
        assert_eq!(GridType::LinearStretchedBoundary.to_string(), "linearStretchedTrapezoidBoundary");
    }

    #[test]
    fn test_generate_per_type()
    {
        let expected = [(GridType::Linear, 5), (GridType::LinearBoundary, 17), (GridType::LinearTrapezoidBoundary, 21), (GridType::LinearStretchedBoundary, 21)];
        for (grid_type, len) in expected
        {
            let mut grid = Grid::new(grid_type, 2).expect("Could not create grid");
            grid.generate_regular(2).expect("Could not generate grid");
            assert_eq!(grid.len(), len);
            assert_eq!(grid.alpha().len(), len);
            assert_eq!(grid.values().len(), len);
        }
    }

    #[test]
    fn test_refine_iteration_improves_interpolant()
    {
        let mut grid = Grid::new(GridType::Linear, 2).expect("Could not create grid");
        grid.generate_regular(2).expect("Could not generate grid");
        grid.sample(parabola);
        grid.hierarchize().expect("Could not hierarchize");
        let x = [0.3, 0.6];
        let coarse_error = (grid.eval(&x).expect("Evaluation failed") - parabola(&x)).abs();
        for _ in 0..5
        {
            let alpha = grid.alpha().to_vec();
            let functor = SurplusRefinement::new(&alpha, 4, 0.0);
            let created = grid.refine_iteration(&functor, parabola).expect("Refinement failed");
            assert!(created > 0);
        }
        let fine_error = (grid.eval(&x).expect("Evaluation failed") - parabola(&x)).abs();
        assert!(fine_error < coarse_error);
        for seq in 0..grid.len()
        {
            let node = grid.storage().coordinate(seq);
            assert!((grid.eval(&node).expect("Evaluation failed") - parabola(&node)).abs() < 1e-12);
        }
        let batch = grid.eval_batch(&[0.3, 0.6, 0.5, 0.5]).expect("Batch evaluation failed");
        assert_eq!(batch[0], grid.eval(&x).expect("Evaluation failed"));
        assert!((batch[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dehierarchize_restores_values()
    {
        let bbox = BoundingBox::from_bounds(&[-2.0, 0.0], &[2.0, 0.5]).expect("Could not build box");
        let mut grid = Grid::with_bounding_box(GridType::LinearTrapezoidBoundary, bbox).expect("Could not create grid");
        grid.generate_regular(3).expect("Could not generate grid");
        grid.sample(|x| x[0] * x[0] + x[1]);
        let values = grid.values().to_vec();
        grid.hierarchize().expect("Could not hierarchize");
        grid.dehierarchize().expect("Could not dehierarchize");
        for (a, b) in grid.values().iter().zip(&values)
        {
            assert!((a - b).abs() < 1e-12);
        }
        // (0, 0.25) is the level-1 node of the box
        assert!((grid.eval(&[0.0, 0.25]).expect("Evaluation failed") - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_stretched_grid()
    {
        let stretching = Stretching::analytic(vec![BoundingBox1D::new(1.0, 100.0)], vec![Stretching1D::new(StretchingType::Log, 0.0, 0.0)]).expect("Could not build stretching");
        let mut grid = Grid::with_stretching(stretching);
        grid.generate_regular(3).expect("Could not generate grid");
        assert_eq!(grid.len(), 9);
        assert!(matches!(grid.hierarchize(), Err(SGError::UnsupportedOperation(_))));
        let (center, _, _) = grid.storage().stretching().expect("Missing stretching").adjacent_positions(1, 1, 0);
        // the level-1 center of log stretching on [1, 100]
        assert!((center - 10.0).abs() < 1e-12);
        let affected = grid.affected_basis_functions(&[center]).expect("Lookup failed");
        // both level-0 ramps and the level-1 hat
        assert_eq!(affected.len(), 3);
        let level_one = grid.storage().find(&GridPoint::new(&[1], &[1], false)).expect("Missing level-1 point");
        assert!(affected.contains(&(level_one, 1.0)));
        assert!(matches!(Grid::from_storage(GridType::Linear, grid.storage().clone()), Err(SGError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_binary_round_trip()
    {
        let mut grid = Grid::new(GridType::LinearBoundary, 2).expect("Could not create grid");
        grid.generate_regular(2).expect("Could not generate grid");
        grid.sample(parabola);
        grid.hierarchize().expect("Could not hierarchize");
        for format in [SerializationFormat::Json, SerializationFormat::JsonLz4, SerializationFormat::Bincode, SerializationFormat::BincodeLz4]
        {
            let bytes = crate::serialization::serialize(&grid, format).expect("Could not serialize");
            let read = Grid::read(bytes.as_slice(), format).expect("Could not read grid");
            assert_eq!(read, grid);
            assert_eq!(read.storage().find(&grid.storage().point(3)), Some(3));
        }
    }
}
