use indexmap::IndexMap;

use crate::{dynamic::{grids::sparse_grid::{Grid, GridType}, storage::GridStorage}, errors::SGError};

/// Builds a grid around a freshly parsed storage.
pub type GridFactory = fn(GridStorage) -> Result<Grid, SGError>;

///
/// Maps grid type names to constructors for [`GridTypeRegistry::unserialize`].
/// Built once by the caller and passed where grids are read back.
///
#[derive(Clone, Default)]
pub struct GridTypeRegistry
{
    factories: IndexMap<String, GridFactory>,
}

impl GridTypeRegistry
{
    pub fn new() -> Self
    {
        Self::default()
    }

    ///
    /// Registry with the four linear grid types.
    ///
    pub fn with_defaults() -> Self
    {
        let mut registry = Self::new();
        registry.register(GridType::Linear.name(), |storage| Grid::from_storage(GridType::Linear, storage));
        registry.register(GridType::LinearBoundary.name(), |storage| Grid::from_storage(GridType::LinearBoundary, storage));
        registry.register(GridType::LinearTrapezoidBoundary.name(), |storage| Grid::from_storage(GridType::LinearTrapezoidBoundary, storage));
        registry.register(GridType::LinearStretchedBoundary.name(), |storage| Grid::from_storage(GridType::LinearStretchedBoundary, storage));
        registry
    }

    ///
    /// Adds or replaces the constructor for `name`, returning the previous one.
    ///
    pub fn register(&mut self, name: &str, factory: GridFactory) -> Option<GridFactory>
    {
        self.factories.insert(name.to_string(), factory)
    }

    pub fn contains(&self, name: &str) -> bool
    {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str>
    {
        self.factories.keys().map(String::as_str)
    }

    ///
    /// Reads a grid written by [`Grid::serialize`].
    ///
    pub fn unserialize(&self, text: &str) -> Result<Grid, SGError>
    {
        let text = text.trim_start();
        let (name, body) = text.split_once('\n').ok_or_else(|| SGError::Parse("missing grid type line".to_string()))?;
        let name = name.trim();
        let factory = self.factories.get(name).ok_or_else(|| SGError::UnknownGridType(name.to_string()))?;
        let storage = GridStorage::deserialize(body)?;
        tracing::debug!(grid_type = name, points = storage.len(), "unserialized grid");
        factory(storage)
    }
}
