pub mod dynamic_grid_iterator;
