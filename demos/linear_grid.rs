use sgengine::{dynamic::{grids::{registry::GridTypeRegistry, sparse_grid::{Grid, GridType}}, refinement::surplus::SurplusRefinement, storage::{BoundingBox, BoundingBox1D, Stretching, Stretching1D, StretchingType}}, errors::SGError};

fn one_d() -> Result<(), SGError>
{
    println!("\nRunning \"one_d\" example\n");
    let mut grid = Grid::new(GridType::Linear, 1)?;
    // in 1D a sparse grid is a full grid
    grid.generate_regular(3)?;

    let f = |x: &[f64]| x[0].powi(2) * (1.0 - x[0]);
    grid.sample(f);
    grid.hierarchize()?;
    let x = [0.3];
    let mut error = (grid.eval(&x)? - f(&x)).abs();
    println!("x={:?}, calculated {}, expected {}. Error={error}", x, grid.eval(&x)?, f(&x));
    println!("Number of points: {}", grid.len());
    for _ in 0..6
    {
        let alpha = grid.alpha().to_vec();
        grid.refine_iteration(&SurplusRefinement::new(&alpha, 2, 1e-6), f)?;
    }
    println!("Number of points after refinement: {}", grid.len());
    error = (grid.eval(&x)? - f(&x)).abs();
    println!("x={:?}, calculated {}, expected {}. Error={error}", x, grid.eval(&x)?, f(&x));
    Ok(())
}

///
/// A 2D grid with boundary points on a bounding box, written out and read back
/// through the text format.
///
fn two_d() -> Result<(), SGError>
{
    println!("\nRunning \"two_d\" example\n");
    let bbox = BoundingBox::from_bounds(&[-1.0, 0.0], &[1.0, 2.0])?;
    let mut grid = Grid::with_bounding_box(GridType::LinearTrapezoidBoundary, bbox)?;
    grid.generate_regular(4)?;

    let f = |x: &[f64]| x[0].powi(2) + x[1].powi(2);
    grid.sample(f);
    grid.hierarchize()?;

    let x = [0.3, 0.1];
    let error = (grid.eval(&x)? - f(&x)).abs();
    println!("x={:?}, calculated {}, expected {}. Error={error}", x, grid.eval(&x)?, f(&x));
    println!("Basis functions touching x: {}", grid.affected_basis_functions(&x)?.len());

    let registry = GridTypeRegistry::with_defaults();
    let text = grid.serialize();
    let mut read = registry.unserialize(&text)?;
    read.sample(f);
    read.hierarchize()?;
    println!("Read back a {} grid with {} points, value at x {}", read.grid_type(), read.len(), read.eval(&x)?);
    Ok(())
}

///
/// A log-stretched boundary grid: points cluster towards the left end of [1, 100].
///
fn stretched() -> Result<(), SGError>
{
    println!("\nRunning \"stretched\" example\n");
    let stretching = Stretching::analytic(vec![BoundingBox1D::new(1.0, 100.0), BoundingBox1D::new(0.0, 1.0)],
        vec![Stretching1D::new(StretchingType::Log, 0.0, 0.0), Stretching1D::id()])?;
    let mut grid = Grid::with_stretching(stretching);
    grid.generate_regular(3)?;
    for seq in 0..grid.len()
    {
        println!("{:?}", grid.storage().coordinate(seq));
    }
    let affected = grid.affected_basis_functions(&[5.0, 0.3])?;
    println!("Basis functions touching (5, 0.3): {affected:?}");
    Ok(())
}

fn main()
{
    one_d().expect("one_d example failed");
    two_d().expect("two_d example failed");
    stretched().expect("stretched example failed");
}
