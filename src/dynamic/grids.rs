pub mod registry;
pub mod sparse_grid;
