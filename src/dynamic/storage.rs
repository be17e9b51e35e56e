pub mod bounding_box;
pub mod stretching;
pub mod text_format;

use std::hash::{Hash, Hasher};

use bitfield_struct::bitfield;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::errors::SGError;

pub use bounding_box::{BoundingBox, BoundingBox1D};
pub use stretching::{Stretching, Stretching1D, StretchingMode, StretchingType};

/// Deepest level refinement will create; keeps every child index inside `u32`.
pub const MAX_LEVEL: u8 = 30;

/// Structural key of a grid point: one packed (level, index) word per dimension.
pub type GridKey = Box<[u64]>;

#[inline(always)]
pub(crate) fn pack(level: u8, index: u32) -> u64
{
    ((level as u64) << 32) | index as u64
}

#[inline(always)]
fn unpack(key: u64) -> (u8, u32)
{
    ((key >> 32) as u8, key as u32)
}

///
/// Index of the interior parent of an odd index on level >= 2.
///
#[inline]
pub(crate) fn parent_index(index: u32) -> u32
{
    if ((index + 1) / 2) % 2 == 1 { (index + 1) / 2 } else { (index - 1) / 2 }
}

#[bitfield(u8, new=false)]
#[derive(Serialize, Deserialize, PartialEq, Eq)]
pub struct GridPointFlags
{
    pub is_leaf: bool,
    pub is_inner: bool,
    #[bits(6)]
    pub _empty: u8
}

impl GridPointFlags
{
    pub fn new(level: &[u8], is_leaf: bool) -> Self
    {
        let mut r = Self::default();
        r.set_is_leaf(is_leaf);
        r.set_is_inner(!level.contains(&0));
        r
    }
}

///
/// A multi-dimensional (level, index) key plus its leaf flag. Equality and hashing
/// only look at levels and indices.
///
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct GridPoint
{
    pub level: Vec<u8>,
    pub index: Vec<u32>,
    pub(crate) flags: GridPointFlags,
}

impl Hash for GridPoint
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.level.hash(state);
        self.index.hash(state);
    }
}

impl PartialEq for GridPoint
{
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level && self.index == other.index
    }
}
impl Eq for GridPoint{}

impl GridPoint
{
    pub fn new(level: &[u8], index: &[u32], is_leaf: bool) -> Self
    {
        Self { level: level.to_vec(), index: index.to_vec(), flags: GridPointFlags::new(level, is_leaf) }
    }
    ///
    /// The point with level 0, index 0 in every dimension.
    ///
    pub fn zero_index(num_inputs: usize) -> Self
    {
        Self::new(&vec![0; num_inputs], &vec![0; num_inputs], false)
    }
    #[inline]
    pub fn num_inputs(&self) -> usize
    {
        self.level.len()
    }
    #[inline]
    pub fn is_leaf(&self) -> bool
    {
        self.flags.is_leaf()
    }
    #[inline]
    pub fn set_is_leaf(&mut self, is_leaf: bool)
    {
        self.flags.set_is_leaf(is_leaf);
    }
    ///
    /// This is an inner point if no levels are zero...
    ///
    pub fn is_inner_point(&self) -> bool
    {
        !self.level.contains(&0)
    }
    #[inline]
    pub fn set(&mut self, dim: usize, level: u8, index: u32)
    {
        self.level[dim] = level;
        self.index[dim] = index;
    }
    pub fn level_sum(&self) -> u32
    {
        self.level.iter().map(|&l| l as u32).sum()
    }
    #[inline]
    pub fn level_max(&self) -> u8
    {
        *self.level.iter().max().unwrap_or(&0)
    }
    pub fn level_min(&self) -> u8
    {
        *self.level.iter().min().unwrap_or(&0)
    }
    ///
    /// Checks the canonical dyadic addressing: odd index in (0, 2^level) for
    /// 1 <= level <= [`MAX_LEVEL`], index 0 or 1 on level 0.
    ///
    pub fn is_valid(&self) -> bool
    {
        self.level.len() == self.index.len() && self.level.iter().zip(&self.index).all(|(&l, &i)|
        {
            if l == 0 { i <= 1 } else { l <= MAX_LEVEL && i % 2 == 1 && (i as u64) < (1_u64 << l) }
        })
    }

    pub fn left_child(&self, dim: usize) -> GridPoint
    {
        let mut r = self.clone();
        if r.level[dim] == 0
        {
            r.set(dim, 1, 1);
        }
        else
        {
            r.set(dim, self.level[dim] + 1, 2 * self.index[dim] - 1);
        }
        r
    }
    pub fn right_child(&self, dim: usize) -> GridPoint
    {
        let mut r = self.clone();
        if r.level[dim] == 0
        {
            r.set(dim, 1, 1);
        }
        else
        {
            r.set(dim, self.level[dim] + 1, 2 * self.index[dim] + 1);
        }
        r
    }
    ///
    /// Interior parent in direction `dim`; `None` on levels 0 and 1.
    ///
    pub fn parent(&self, dim: usize) -> Option<GridPoint>
    {
        let (level, index) = (self.level[dim], self.index[dim]);
        if level < 2
        {
            return None;
        }
        let mut r = self.clone();
        r.set(dim, level - 1, parent_index(index));
        Some(r)
    }

    pub fn unit_coordinate(&self) -> Vec<f64>
    {
        self.level.iter().zip(&self.index).map(|(&l, &i)| i as f64 / (1_u64 << l) as f64).collect()
    }

    pub fn key(&self) -> GridKey
    {
        self.level.iter().zip(&self.index).map(|(&l, &i)| pack(l, i)).collect()
    }
}

///
/// Borrowed view of a stored point.
///
pub struct GridPointRef<'a> {
    pub level: &'a [u8],
    pub index: &'a [u32],
    flags: &'a GridPointFlags
}

impl GridPointRef<'_>
{
    #[inline]
    pub fn is_leaf(&self) -> bool
    {
        self.flags.is_leaf()
    }
    pub fn level_sum(&self) -> u32
    {
        self.level.iter().map(|&l| l as u32).sum()
    }
}

impl From<GridPointRef<'_>> for GridPoint
{
    fn from(value: GridPointRef<'_>) -> Self {
        GridPoint { level: value.level.to_owned(), index: value.index.to_owned(), flags: *value.flags }
    }
}

///
/// Domain a storage is embedded in.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Domain
{
    BoundingBox(BoundingBox),
    Stretching(Stretching),
}

impl Domain
{
    pub fn num_inputs(&self) -> usize
    {
        match self
        {
            Domain::BoundingBox(bbox) => bbox.num_inputs(),
            Domain::Stretching(stretching) => stretching.num_inputs(),
        }
    }
    pub fn boundary(&self, dim: usize) -> &BoundingBox1D
    {
        match self
        {
            Domain::BoundingBox(bbox) => bbox.boundary(dim),
            Domain::Stretching(stretching) => stretching.boundary(dim),
        }
    }
}

///
/// Arena of grid points addressed by dense sequence numbers, with a structural
/// hash index from point to sequence number.
///
#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
pub struct GridStorage
{
    num_inputs: usize,
    pub(crate) level: Vec<u8>,
    pub(crate) index: Vec<u32>,
    pub(crate) flags: Vec<GridPointFlags>,
    #[serde_as(as = "Vec<(_, _)>")]
    map: FxHashMap<GridKey, u32>,
    domain: Domain,
    algorithmic_dimensions: Vec<usize>,
}

impl GridStorage
{
    pub fn new(num_inputs: usize) -> Self
    {
        Self::with_domain(Domain::BoundingBox(BoundingBox::with_dim(num_inputs)))
    }
    pub fn with_bounding_box(bounding_box: BoundingBox) -> Self
    {
        Self::with_domain(Domain::BoundingBox(bounding_box))
    }
    pub fn with_stretching(stretching: Stretching) -> Self
    {
        Self::with_domain(Domain::Stretching(stretching))
    }
    pub fn with_domain(domain: Domain) -> Self
    {
        let num_inputs = domain.num_inputs();
        Self { num_inputs, level: Vec::new(), index: Vec::new(), flags: Vec::new(), map: FxHashMap::default(), domain,
            algorithmic_dimensions: (0..num_inputs).collect() }
    }

    #[inline]
    pub fn num_inputs(&self) -> usize
    {
        self.num_inputs
    }
    #[inline]
    pub fn len(&self) -> usize
    {
        self.flags.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool
    {
        self.flags.is_empty()
    }

    #[inline]
    pub fn point(&self, seq: usize) -> GridPoint
    {
        let range = seq*self.num_inputs..(seq+1)*self.num_inputs;
        GridPoint { level: self.level[range.clone()].to_vec(), index: self.index[range].to_vec(), flags: self.flags[seq] }
    }
    #[inline(always)]
    pub fn level(&self, seq: usize, dim: usize) -> u8
    {
        self.level[self.num_inputs*seq + dim]
    }
    #[inline(always)]
    pub fn index(&self, seq: usize, dim: usize) -> u32
    {
        self.index[self.num_inputs*seq + dim]
    }
    #[inline]
    pub fn is_leaf(&self, seq: usize) -> bool
    {
        self.flags[seq].is_leaf()
    }
    ///
    /// Raw flag write. A point with a stored child must never be flagged as a leaf.
    ///
    #[inline]
    pub fn set_is_leaf(&mut self, seq: usize, value: bool)
    {
        self.flags[seq].set_is_leaf(value);
    }
    #[inline]
    pub fn is_inner_point(&self, seq: usize) -> bool
    {
        self.flags[seq].is_inner()
    }
    #[inline]
    pub fn level_sum(&self, seq: usize) -> u32
    {
        self.level[seq*self.num_inputs..(seq+1)*self.num_inputs].iter().map(|&i| i as u32).sum()
    }
    ///
    /// Highest level present in any point and dimension.
    ///
    pub fn max_level(&self) -> u8
    {
        self.level.iter().copied().max().unwrap_or(0)
    }

    ///
    /// Appends `point` and returns its sequence number. A point that is already
    /// stored is not duplicated; its sequence number is returned unchanged.
    /// Stored parents lose their leaf flag, and the new point only keeps a leaf
    /// flag if none of its children is stored.
    ///
    pub fn insert(&mut self, mut point: GridPoint) -> Result<usize, SGError>
    {
        self.check_point(&point)?;
        let mut key = point.key();
        if let Some(&seq) = self.map.get(&key)
        {
            return Ok(seq as usize);
        }
        let seq = self.len();
        point.flags.set_is_inner(point.is_inner_point());
        if point.is_leaf() && self.has_stored_child(&mut key)
        {
            point.set_is_leaf(false);
        }
        self.clear_parent_leaves(&mut key);
        self.flags.push(point.flags);
        self.level.extend(point.level);
        self.index.extend(point.index);
        self.map.insert(key, seq as u32);
        Ok(seq)
    }

    ///
    /// Replaces the point stored at `seq`. Leaf flags are kept consistent as in
    /// [`GridStorage::insert`].
    ///
    pub fn update(&mut self, mut point: GridPoint, seq: usize) -> Result<(), SGError>
    {
        if seq >= self.len()
        {
            return Err(SGError::InvalidIndex);
        }
        self.check_point(&point)?;
        let old_key = self.point(seq).key();
        if self.map.get(&old_key) == Some(&(seq as u32))
        {
            self.map.remove(&old_key);
        }
        let mut key = point.key();
        point.flags.set_is_inner(point.is_inner_point());
        if point.is_leaf() && self.has_stored_child(&mut key)
        {
            point.set_is_leaf(false);
        }
        self.clear_parent_leaves(&mut key);
        self.level[seq*self.num_inputs..(seq+1)*self.num_inputs].copy_from_slice(&point.level);
        self.index[seq*self.num_inputs..(seq+1)*self.num_inputs].copy_from_slice(&point.index);
        self.flags[seq] = point.flags;
        self.map.insert(key, seq as u32);
        Ok(())
    }

    pub(crate) fn check_point(&self, point: &GridPoint) -> Result<(), SGError>
    {
        if point.num_inputs() != self.num_inputs
        {
            return Err(SGError::DimensionMismatch { expected: self.num_inputs, found: point.num_inputs() });
        }
        if !point.is_valid()
        {
            return Err(SGError::InvalidGridPoint(format!("{:?} {:?}", point.level, point.index)));
        }
        Ok(())
    }

    ///
    /// True if a child of the point with packed `key` is stored in any dimension.
    /// `key` is restored before returning.
    ///
    fn has_stored_child(&self, key: &mut [u64]) -> bool
    {
        for d in 0..self.num_inputs
        {
            let own = key[d];
            let (level, index) = unpack(own);
            let children = if level == 0 { [pack(1, 1), pack(1, 1)] } else { [pack(level + 1, 2*index - 1), pack(level + 1, 2*index + 1)] };
            for child in children
            {
                key[d] = child;
                if self.map.contains_key(&*key)
                {
                    key[d] = own;
                    return true;
                }
            }
            key[d] = own;
        }
        false
    }

    ///
    /// Clears the leaf flag of every stored parent of the point with packed `key`.
    /// On level 1 both level-0 points count as parents.
    ///
    fn clear_parent_leaves(&mut self, key: &mut [u64])
    {
        for d in 0..self.num_inputs
        {
            let own = key[d];
            let parents = match unpack(own)
            {
                (0, _) => continue,
                (1, _) => [pack(0, 0), pack(0, 1)],
                (level, index) => [pack(level - 1, parent_index(index)); 2],
            };
            for parent in parents
            {
                key[d] = parent;
                if let Some(&seq) = self.map.get(&*key)
                {
                    self.flags[seq as usize].set_is_leaf(false);
                }
            }
            key[d] = own;
        }
    }

    ///
    /// Removes the most recently inserted point.
    ///
    pub fn delete_last(&mut self) -> Result<GridPoint, SGError>
    {
        let seq = self.len().checked_sub(1).ok_or_else(SGError::empty_storage)?;
        let point = self.point(seq);
        self.map.remove(&point.key());
        self.level.truncate(seq*self.num_inputs);
        self.index.truncate(seq*self.num_inputs);
        self.flags.truncate(seq);
        Ok(point)
    }

    ///
    /// Removes the points with the given sequence numbers and compacts the storage.
    /// Returns the new sequence number of every surviving point keyed by its old one,
    /// in new-sequence order. Leaf flags are recomputed for the whole grid afterwards.
    ///
    pub fn delete_points(&mut self, to_delete: &[usize]) -> IndexMap<usize, usize>
    {
        let doomed: FxHashSet<usize> = to_delete.iter().copied().collect();
        let mut remap = IndexMap::with_capacity(self.len());
        let n = self.num_inputs;
        let mut next = 0;
        for seq in 0..self.len()
        {
            if doomed.contains(&seq)
            {
                continue;
            }
            if next != seq
            {
                self.level.copy_within(seq*n..(seq+1)*n, next*n);
                self.index.copy_within(seq*n..(seq+1)*n, next*n);
                self.flags[next] = self.flags[seq];
            }
            remap.insert(seq, next);
            next += 1;
        }
        self.level.truncate(next*n);
        self.index.truncate(next*n);
        self.flags.truncate(next);
        self.generate_map();
        self.recalc_leaf_property();
        tracing::debug!(removed = doomed.len(), remaining = next, "deleted grid points");
        remap
    }

    fn generate_map(&mut self)
    {
        let mut map = FxHashMap::default();
        map.reserve(self.len());
        for seq in 0..self.len()
        {
            let key: GridKey = (0..self.num_inputs).map(|d| pack(self.level(seq, d), self.index(seq, d))).collect();
            map.insert(key, seq as u32);
        }
        self.map = map;
    }

    #[inline]
    pub fn find(&self, point: &GridPoint) -> Option<usize>
    {
        self.find_key(&point.key())
    }
    ///
    /// Lookup by packed key, see [`GridPoint::key`].
    ///
    #[inline]
    pub fn find_key(&self, key: &[u64]) -> Option<usize>
    {
        self.map.get(key).map(|&v| v as usize)
    }
    #[inline]
    pub fn contains(&self, point: &GridPoint) -> bool
    {
        self.find(point).is_some()
    }

    ///
    /// Sets the leaf flag of every point: a point is a leaf iff no child exists
    /// in any dimension.
    ///
    pub fn recalc_leaf_property(&mut self)
    {
        let n = self.num_inputs;
        let mut key = vec![0_u64; n];
        for seq in 0..self.len()
        {
            for d in 0..n
            {
                key[d] = pack(self.level(seq, d), self.index(seq, d));
            }
            let is_leaf = !self.has_stored_child(&mut key);
            self.flags[seq].set_is_leaf(is_leaf);
        }
    }

    ///
    /// Return the nodes in the grid...
    ///
    pub fn nodes(&self) -> NodeIterator<'_>
    {
        NodeIterator { storage: self, current_seq: 0 }
    }

    #[inline]
    pub fn domain(&self) -> &Domain
    {
        &self.domain
    }
    ///
    /// Replaces the domain descriptor; it must have the storage's dimension.
    ///
    pub fn set_domain(&mut self, domain: Domain) -> Result<(), SGError>
    {
        if domain.num_inputs() != self.num_inputs
        {
            return Err(SGError::DimensionMismatch { expected: self.num_inputs, found: domain.num_inputs() });
        }
        self.domain = domain;
        Ok(())
    }
    pub fn bounding_box(&self) -> Option<&BoundingBox>
    {
        match &self.domain
        {
            Domain::BoundingBox(bbox) => Some(bbox),
            Domain::Stretching(_) => None,
        }
    }
    pub fn stretching(&self) -> Option<&Stretching>
    {
        match &self.domain
        {
            Domain::Stretching(stretching) => Some(stretching),
            Domain::BoundingBox(_) => None,
        }
    }

    #[inline]
    pub fn algorithmic_dimensions(&self) -> &[usize]
    {
        &self.algorithmic_dimensions
    }
    ///
    /// Restricts operator sweeps to `dims`.
    ///
    pub fn set_algorithmic_dimensions(&mut self, dims: Vec<usize>) -> Result<(), SGError>
    {
        if dims.len() > self.num_inputs
        {
            return Err(SGError::DimensionMismatch { expected: self.num_inputs, found: dims.len() });
        }
        if let Some(&d) = dims.iter().find(|&&d| d >= self.num_inputs)
        {
            return Err(SGError::DimensionMismatch { expected: self.num_inputs, found: d + 1 });
        }
        self.algorithmic_dimensions = dims;
        Ok(())
    }
    pub(crate) fn reset_algorithmic_dimensions(&mut self)
    {
        self.algorithmic_dimensions = (0..self.num_inputs).collect();
    }

    pub fn unit_coordinate(&self, seq: usize) -> Vec<f64>
    {
        (0..self.num_inputs).map(|d| self.index(seq, d) as f64 / (1_u64 << self.level(seq, d)) as f64).collect()
    }

    ///
    /// Position of point `seq` in the storage's domain.
    ///
    pub fn coordinate(&self, seq: usize) -> Vec<f64>
    {
        match &self.domain
        {
            Domain::BoundingBox(bbox) =>
            {
                let mut point = self.unit_coordinate(seq);
                bbox.to_real_coordinate_in_place(&mut point);
                point
            }
            Domain::Stretching(stretching) => (0..self.num_inputs).map(|d| stretching.coordinate(self.level(seq, d), self.index(seq, d), d)).collect(),
        }
    }
}

impl PartialEq for GridStorage
{
    fn eq(&self, other: &Self) -> bool {
        self.num_inputs == other.num_inputs && self.level == other.level && self.index == other.index
            && self.flags == other.flags && self.domain == other.domain && self.algorithmic_dimensions == other.algorithmic_dimensions
    }
}

impl std::fmt::Debug for GridStorage
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridStorage").field("num_inputs", &self.num_inputs).field("len", &self.len()).field("domain", &self.domain).finish()
    }
}

pub struct NodeIterator<'a> {
    storage: &'a GridStorage,
    current_seq: usize,
}

impl<'a> Iterator for NodeIterator<'a> {
    type Item = GridPointRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_seq < self.storage.len() {
            let start = self.current_seq * self.storage.num_inputs;
            let end = start + self.storage.num_inputs;
            let flags = &self.storage.flags[self.current_seq];
            self.current_seq += 1;
            Some(GridPointRef { level: &self.storage.level[start..end], index: &self.storage.index[start..end], flags })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn small_storage() -> GridStorage
    {
        let mut storage = GridStorage::new(2);
        storage.insert(GridPoint::new(&[1, 1], &[1, 1], false)).expect("Could not insert");
        storage.insert(GridPoint::new(&[2, 1], &[1, 1], true)).expect("Could not insert");
        storage.insert(GridPoint::new(&[2, 1], &[3, 1], true)).expect("Could not insert");
        storage.insert(GridPoint::new(&[1, 2], &[1, 3], true)).expect("Could not insert");
        storage
    }

    #[test]
    fn test_insert_and_find()
    {
        let mut storage = small_storage();
        assert_eq!(storage.len(), 4);
        assert_eq!(storage.find(&GridPoint::new(&[2, 1], &[3, 1], false)), Some(2));
        assert!(!storage.contains(&GridPoint::new(&[2, 1], &[1, 3], false)));
        // inserting again does not duplicate
        assert_eq!(storage.insert(GridPoint::new(&[1, 2], &[1, 3], true)), Ok(3));
        assert_eq!(storage.len(), 4);
        assert!(storage.is_inner_point(0));
        assert_eq!(storage.max_level(), 2);
    }

    #[test]
    fn test_insert_rejects_malformed_points()
    {
        let mut storage = GridStorage::new(2);
        let wrong_dim = storage.insert(GridPoint::new(&[1, 1, 1], &[1, 1, 1], true));
        assert_eq!(wrong_dim, Err(SGError::DimensionMismatch { expected: 2, found: 3 }));
        assert!(storage.is_empty());
        assert_eq!(storage.insert(GridPoint::new(&[2, 1], &[3, 1], true)), Ok(0));
        assert_eq!(storage.find(&GridPoint::new(&[2, 1], &[3, 1], false)), Some(0));
        assert_eq!(storage.point(0), GridPoint::new(&[2, 1], &[3, 1], false));
        assert!(matches!(storage.insert(GridPoint::new(&[2, 1], &[2, 1], true)), Err(SGError::InvalidGridPoint(_))));
        assert!(matches!(storage.insert(GridPoint::new(&[MAX_LEVEL + 1, 1], &[1, 1], true)), Err(SGError::InvalidGridPoint(_))));
        assert_eq!(storage.insert(GridPoint::new(&[MAX_LEVEL, 1], &[1, 1], true)), Ok(1));
        assert!(storage.update(GridPoint::new(&[1], &[1], true), 0).is_err());
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_insert_keeps_leaf_flags_consistent()
    {
        let mut storage = GridStorage::new(1);
        storage.insert(GridPoint::new(&[1], &[1], true)).expect("Could not insert");
        storage.insert(GridPoint::new(&[2], &[1], true)).expect("Could not insert");
        assert!(!storage.is_leaf(0));
        assert!(storage.is_leaf(1));

        // children first: the parent arrives already owning a child
        let mut storage = GridStorage::new(1);
        storage.insert(GridPoint::new(&[2], &[3], true)).expect("Could not insert");
        storage.insert(GridPoint::new(&[1], &[1], true)).expect("Could not insert");
        assert!(!storage.is_leaf(1));

        // level-0 points are the parents of level 1
        let mut storage = GridStorage::new(2);
        storage.insert(GridPoint::new(&[0, 1], &[1, 1], true)).expect("Could not insert");
        storage.insert(GridPoint::new(&[1, 1], &[1, 1], true)).expect("Could not insert");
        assert!(!storage.is_leaf(0));
        storage.update(GridPoint::new(&[2, 1], &[1, 1], true), 1).expect("Could not update");
        let mut copy = storage.clone();
        copy.recalc_leaf_property();
        assert!((0..storage.len()).all(|seq| !storage.is_leaf(seq) || copy.is_leaf(seq)));
    }

    #[test]
    fn test_update_replaces_key()
    {
        let mut storage = small_storage();
        storage.update(GridPoint::new(&[2, 2], &[1, 1], true), 3).expect("Could not update");
        assert_eq!(storage.find(&GridPoint::new(&[2, 2], &[1, 1], false)), Some(3));
        assert!(!storage.contains(&GridPoint::new(&[1, 2], &[1, 3], false)));
        assert_eq!(storage.update(GridPoint::zero_index(2), 10), Err(SGError::InvalidIndex));
    }

    #[test]
    fn test_delete_points_remaps_and_recomputes_leaves()
    {
        let mut storage = small_storage();
        storage.set_is_leaf(0, true);
        let remap = storage.delete_points(&[1, 2]);
        assert_eq!(storage.len(), 2);
        assert_eq!(remap.len(), 2);
        assert_eq!(remap.get(&0), Some(&0));
        assert_eq!(remap.get(&3), Some(&1));
        assert_eq!(remap.get_index(1), Some((&3, &1)));
        assert_eq!(storage.find(&GridPoint::new(&[1, 2], &[1, 3], false)), Some(1));
        // (1,1) still has the child (1,3) in dimension 1
        assert!(!storage.is_leaf(0));
        assert!(storage.is_leaf(1));
        let remap = storage.delete_points(&[1]);
        assert_eq!(remap.len(), 1);
        assert!(storage.is_leaf(0));
    }

    #[test]
    fn test_delete_last()
    {
        let mut storage = small_storage();
        let point = storage.delete_last().expect("Could not delete");
        assert_eq!(point, GridPoint::new(&[1, 2], &[1, 3], false));
        assert_eq!(storage.len(), 3);
        assert!(!storage.contains(&point));
        let mut empty = GridStorage::new(1);
        assert!(matches!(empty.delete_last(), Err(SGError::StorageState(_))));
    }

    #[test]
    fn test_recalc_leaf_property_with_boundary()
    {
        let mut storage = GridStorage::new(1);
        storage.insert(GridPoint::new(&[0], &[0], true)).expect("Could not insert");
        storage.insert(GridPoint::new(&[0], &[1], true)).expect("Could not insert");
        storage.insert(GridPoint::new(&[1], &[1], false)).expect("Could not insert");
        storage.recalc_leaf_property();
        assert!(!storage.is_leaf(0));
        assert!(!storage.is_leaf(1));
        assert!(storage.is_leaf(2));
    }

    #[test]
    fn test_point_relations()
    {
        let point = GridPoint::new(&[3, 0], &[5, 1], false);
        assert!(point.is_valid());
        assert!(!point.is_inner_point());
        assert_eq!(point.left_child(0), GridPoint::new(&[4, 0], &[9, 1], false));
        assert_eq!(point.right_child(1), GridPoint::new(&[3, 1], &[5, 1], false));
        assert_eq!(point.parent(0), Some(GridPoint::new(&[2, 0], &[3, 1], false)));
        assert_eq!(GridPoint::new(&[3], &[1], false).parent(0), Some(GridPoint::new(&[2], &[1], false)));
        assert_eq!(point.parent(1), None);
        assert!(!GridPoint::new(&[2], &[2], false).is_valid());
        assert_eq!(point.unit_coordinate(), vec![0.625, 1.0]);
    }

    #[test]
    fn test_algorithmic_dimensions()
    {
        let mut storage = GridStorage::new(3);
        assert_eq!(storage.algorithmic_dimensions(), &[0, 1, 2]);
        storage.set_algorithmic_dimensions(vec![2, 0]).expect("Could not set dimensions");
        assert_eq!(storage.algorithmic_dimensions(), &[2, 0]);
        assert!(storage.set_algorithmic_dimensions(vec![0, 1, 2, 0]).is_err());
        assert!(storage.set_algorithmic_dimensions(vec![3]).is_err());
    }

    #[test]
    fn test_coordinates_through_domain()
    {
        let bbox = BoundingBox::from_bounds(&[-2.0], &[2.0]).expect("Could not build box");
        let mut storage = GridStorage::with_bounding_box(bbox);
        storage.insert(GridPoint::new(&[2], &[3], true)).expect("Could not insert");
        assert_eq!(storage.unit_coordinate(0), vec![0.75]);
        assert_eq!(storage.coordinate(0), vec![1.0]);
        assert!(storage.set_domain(Domain::BoundingBox(BoundingBox::with_dim(2))).is_err());
    }
}
