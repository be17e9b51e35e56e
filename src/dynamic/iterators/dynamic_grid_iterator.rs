use crate::dynamic::storage::{pack, GridPoint, GridStorage};

///
/// Cursor over a [`GridStorage`]. Moves are pure index arithmetic on the cursor's
/// own point followed by one hash lookup; the boolean results report whether the
/// new position exists in storage.
///
/// Recursive users own their cursor and must put the coordinate of a dimension back
/// (via [`GridIteratorT::set`]) before returning from a recursion level.
///
pub trait GridIteratorT
{
    fn point(&self) -> &GridPoint;
    fn seq(&self) -> Option<usize>;
    fn get(&self, dim: usize) -> (u8, u32);
    fn set(&mut self, dim: usize, level: u8, index: u32) -> bool;
    fn set_point(&mut self, point: &GridPoint) -> bool;
    fn reset_to_level_zero(&mut self) -> bool;
    fn reset_to_left_level_zero(&mut self, dim: usize) -> bool;
    fn reset_to_right_level_zero(&mut self, dim: usize) -> bool;
    fn reset_to_level_one(&mut self, dim: usize) -> bool;
    fn left_child(&mut self, dim: usize) -> bool;
    fn right_child(&mut self, dim: usize) -> bool;
    fn up(&mut self, dim: usize) -> bool;
    fn step_left(&mut self, dim: usize) -> bool;
    fn step_right(&mut self, dim: usize) -> bool;
    fn hint(&self, dim: usize) -> bool;
    fn is_inner_point(&self) -> bool;
    fn is_leaf(&self) -> bool;
}

pub struct HashMapGridIterator<'a>
{
    pub(crate) storage: &'a GridStorage,
    point: GridPoint,
    key: Vec<u64>,
    seq: Option<usize>,
}

impl<'a> HashMapGridIterator<'a>
{
    ///
    /// Creates a cursor positioned on (1,1) in every dimension.
    ///
    pub fn new(storage: &'a GridStorage) -> Self
    {
        let num_inputs = storage.num_inputs();
        let point = GridPoint::new(&vec![1; num_inputs], &vec![1; num_inputs], false);
        let key = point.key().into_vec();
        let seq = storage.find_key(&key);
        Self { storage, point, key, seq }
    }

    #[inline(always)]
    fn refresh(&mut self) -> bool
    {
        self.seq = self.storage.find_key(&self.key);
        self.seq.is_some()
    }

    #[inline(always)]
    fn assign(&mut self, dim: usize, level: u8, index: u32)
    {
        self.point.level[dim] = level;
        self.point.index[dim] = index;
        self.key[dim] = pack(level, index);
    }

    ///
    /// True if the child (level, index) of the current point in `dim` is stored.
    ///
    fn has_child(&self, dim: usize, level: u8, index: u32) -> bool
    {
        let mut key = self.key.clone();
        key[dim] = pack(level, index);
        self.storage.find_key(&key).is_some()
    }

    pub fn has_left_child(&self, dim: usize) -> bool
    {
        let (l, i) = self.get(dim);
        if l == 0 { self.has_child(dim, 1, 1) } else { self.has_child(dim, l + 1, 2 * i - 1) }
    }

    pub fn has_right_child(&self, dim: usize) -> bool
    {
        let (l, i) = self.get(dim);
        if l == 0 { self.has_child(dim, 1, 1) } else { self.has_child(dim, l + 1, 2 * i + 1) }
    }
}

impl GridIteratorT for HashMapGridIterator<'_>
{
    #[inline(always)]
    fn point(&self) -> &GridPoint
    {
        &self.point
    }

    #[inline(always)]
    fn seq(&self) -> Option<usize>
    {
        self.seq
    }

    #[inline(always)]
    fn get(&self, dim: usize) -> (u8, u32)
    {
        (self.point.level[dim], self.point.index[dim])
    }

    fn set(&mut self, dim: usize, level: u8, index: u32) -> bool
    {
        self.assign(dim, level, index);
        self.refresh()
    }

    fn set_point(&mut self, point: &GridPoint) -> bool
    {
        for d in 0..point.num_inputs()
        {
            self.assign(d, point.level[d], point.index[d]);
        }
        self.refresh()
    }

    fn reset_to_level_zero(&mut self) -> bool
    {
        for d in 0..self.key.len()
        {
            self.assign(d, 0, 0);
        }
        self.refresh()
    }

    fn reset_to_left_level_zero(&mut self, dim: usize) -> bool
    {
        self.set(dim, 0, 0)
    }

    fn reset_to_right_level_zero(&mut self, dim: usize) -> bool
    {
        self.set(dim, 0, 1)
    }

    fn reset_to_level_one(&mut self, dim: usize) -> bool
    {
        self.set(dim, 1, 1)
    }

    fn left_child(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.get(dim);
        if l == 0
        {
            return self.set(dim, 1, 1);
        }
        self.set(dim, l + 1, 2 * i - 1)
    }

    fn right_child(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.get(dim);
        if l == 0
        {
            return self.set(dim, 1, 1);
        }
        self.set(dim, l + 1, 2 * i + 1)
    }

    ///
    /// Moves to the hierarchical parent. Level 1 and level 0 have no interior parent;
    /// the cursor stays put and `false` is returned.
    ///
    fn up(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.get(dim);
        if l < 2
        {
            return false;
        }
        let parent = if ((i + 1) / 2) % 2 == 1 { (i + 1) / 2 } else { (i - 1) / 2 };
        self.set(dim, l - 1, parent)
    }

    fn step_left(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.get(dim);
        if i < 2
        {
            self.seq = None;
            return false;
        }
        self.set(dim, l, i - 2)
    }

    fn step_right(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.get(dim);
        self.set(dim, l, i + 2)
    }

    ///
    /// True when descent in `dim` can stop: the current point is absent, flagged
    /// as a leaf, or has no child in `dim`.
    ///
    fn hint(&self, dim: usize) -> bool
    {
        match self.seq
        {
            None => true,
            Some(seq) if self.storage.is_leaf(seq) => true,
            Some(_) => !self.has_left_child(dim) && !self.has_right_child(dim),
        }
    }

    fn is_inner_point(&self) -> bool
    {
        self.point.is_inner_point()
    }

    fn is_leaf(&self) -> bool
    {
        match self.seq
        {
            Some(seq) => self.storage.is_leaf(seq),
            None => true,
        }
    }
}
