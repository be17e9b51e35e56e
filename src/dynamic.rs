pub mod algorithms;
pub mod generators;
pub mod grids;
pub mod iterators;
pub mod refinement;
pub mod storage;
