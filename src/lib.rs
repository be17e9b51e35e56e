//!
//! Spatially adaptive sparse grids with a runtime number of dimensions.
//!
//! Grid points live in a hash-indexed [`dynamic::storage::GridStorage`]; regular
//! grids come from [`dynamic::generators::HashGenerator`], adaptive growth from the
//! engines in [`dynamic::algorithms::refinement`], and point evaluation from the
//! affected-basis lookup in [`dynamic::algorithms::affected_basis_functions`].
//! [`dynamic::grids::sparse_grid::Grid`] ties these together per grid type.
//!
pub mod basis;
pub mod dynamic;
pub mod errors;
pub mod serialization;
