pub mod affected_basis_functions;
pub mod hierarchisation;
pub mod operation_eval;
pub mod refinement;
pub mod sweep;
