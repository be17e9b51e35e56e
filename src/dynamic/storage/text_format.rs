use std::fmt::Write;
use std::str::{FromStr, SplitWhitespace};

use crate::errors::SGError;

use super::{BoundingBox, BoundingBox1D, Domain, GridPoint, GridStorage, Stretching, Stretching1D, StretchingMode, StretchingType};

/// Version written by [`GridStorage::serialize`]; older versions are still read.
pub const SERIALIZATION_VERSION: u32 = 5;

const DOMAIN_BOUNDING_BOX: u32 = 0;
const DOMAIN_ANALYTIC_STRETCHING: u32 = 1;
const DOMAIN_DISCRETE_STRETCHING: u32 = 2;

struct Tokens<'a>(SplitWhitespace<'a>);

impl Tokens<'_>
{
    fn next<T: FromStr>(&mut self, what: &str) -> Result<T, SGError>
    {
        let token = self.0.next().ok_or_else(|| SGError::Parse(format!("unexpected end of input reading {what}")))?;
        token.parse().map_err(|_| SGError::Parse(format!("invalid {what} `{token}`")))
    }
    fn next_bool(&mut self, what: &str) -> Result<bool, SGError>
    {
        match self.next::<u8>(what)?
        {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(SGError::Parse(format!("invalid {what} `{v}`"))),
        }
    }
}

fn write_bounding_box(out: &mut String, boundaries: &[BoundingBox1D])
{
    for b in boundaries
    {
        let _ = write!(out, "{:e} {:e} {} {} ", b.left, b.right, b.dirichlet_left as u8, b.dirichlet_right as u8);
    }
    out.push('\n');
}

fn read_bounding_box(tokens: &mut Tokens, num_inputs: usize) -> Result<Vec<BoundingBox1D>, SGError>
{
    (0..num_inputs).map(|_|
    {
        Ok(BoundingBox1D
        {
            left: tokens.next("left boundary")?,
            right: tokens.next("right boundary")?,
            dirichlet_left: tokens.next_bool("dirichlet flag")?,
            dirichlet_right: tokens.next_bool("dirichlet flag")?,
        })
    }).collect()
}

fn read_domain(tokens: &mut Tokens, version: u32, num_inputs: usize) -> Result<Domain, SGError>
{
    if version < 3
    {
        return Ok(Domain::BoundingBox(BoundingBox::with_dim(num_inputs)));
    }
    if version < 5
    {
        return Ok(Domain::BoundingBox(BoundingBox::new(read_bounding_box(tokens, num_inputs)?)));
    }
    match tokens.next::<u32>("domain tag")?
    {
        DOMAIN_BOUNDING_BOX => Ok(Domain::BoundingBox(BoundingBox::new(read_bounding_box(tokens, num_inputs)?))),
        DOMAIN_ANALYTIC_STRETCHING =>
        {
            let boundaries = read_bounding_box(tokens, num_inputs)?;
            let mut transforms = Vec::with_capacity(num_inputs);
            for _ in 0..num_inputs
            {
                let kind = StretchingType::from_tag(tokens.next("stretching type")?)?;
                transforms.push(Stretching1D::new(kind, tokens.next("x_0")?, tokens.next("xsi")?));
            }
            Ok(Domain::Stretching(Stretching::analytic(boundaries, transforms)?))
        }
        DOMAIN_DISCRETE_STRETCHING =>
        {
            // the box line is implied by the first and last coordinate of each vector
            read_bounding_box(tokens, num_inputs)?;
            let mut coordinates = Vec::with_capacity(num_inputs);
            for _ in 0..num_inputs
            {
                let level: u8 = tokens.next("discrete level")?;
                if level > 30
                {
                    return Err(SGError::Parse(format!("discrete level {level} out of range")));
                }
                coordinates.push((0..=(1_usize << level)).map(|_| tokens.next("coordinate")).collect::<Result<Vec<f64>, _>>()?);
            }
            Ok(Domain::Stretching(Stretching::discrete(coordinates)?))
        }
        tag => Err(SGError::Parse(format!("unknown domain tag {tag}"))),
    }
}

impl GridStorage
{
    ///
    /// Writes the storage in the line-oriented text format: a `version dim count`
    /// header, the tagged domain block and three lines (dimension, level/index
    /// pairs, leaf flag) per point in sequence order.
    ///
    pub fn serialize(&self) -> String
    {
        let mut out = String::new();
        let _ = writeln!(out, "{} {} {}", SERIALIZATION_VERSION, self.num_inputs(), self.len());
        match self.domain()
        {
            Domain::BoundingBox(bbox) =>
            {
                let _ = writeln!(out, "{DOMAIN_BOUNDING_BOX}");
                write_bounding_box(&mut out, bbox.boundaries());
            }
            Domain::Stretching(stretching) if stretching.mode() == StretchingMode::Discrete =>
            {
                let _ = writeln!(out, "{DOMAIN_DISCRETE_STRETCHING}");
                write_bounding_box(&mut out, stretching.bounding_box().boundaries());
                for d in 0..stretching.num_inputs()
                {
                    let _ = writeln!(out, "{}", stretching.discrete_level(d).unwrap_or(0));
                    for x in stretching.discrete_vector(d).unwrap_or_default()
                    {
                        let _ = write!(out, "{x:e} ");
                    }
                    out.push('\n');
                }
            }
            Domain::Stretching(stretching) =>
            {
                let _ = writeln!(out, "{DOMAIN_ANALYTIC_STRETCHING}");
                write_bounding_box(&mut out, stretching.bounding_box().boundaries());
                for d in 0..stretching.num_inputs()
                {
                    let str1d = stretching.stretching_1d(d);
                    let _ = writeln!(out, "{} {:e} {:e}", str1d.kind.tag().unwrap_or(1), str1d.x_0, str1d.xsi);
                }
            }
        }
        for point in self.nodes()
        {
            let _ = writeln!(out, "{}", point.level.len());
            for (l, i) in point.level.iter().zip(point.index)
            {
                let _ = write!(out, "{l} {i} ");
            }
            out.push('\n');
            let _ = writeln!(out, "{}", point.is_leaf() as u8);
        }
        out
    }

    ///
    /// Reads any supported version of the text format. Versions 1 and 2 imply the
    /// unit cube, 3 and 4 carry a bare bounding box line, 5 a tagged domain block.
    /// Versions 1 and 4 carry no leaf flags; they are recomputed after loading.
    ///
    pub fn deserialize(text: &str) -> Result<Self, SGError>
    {
        let mut tokens = Tokens(text.split_whitespace());
        let version: u32 = tokens.next("version")?;
        if version > SERIALIZATION_VERSION
        {
            return Err(SGError::SerializationVersion { found: version, supported: SERIALIZATION_VERSION });
        }
        if version == 0
        {
            return Err(SGError::Parse("version 0".to_string()));
        }
        let num_inputs: usize = tokens.next("dimension")?;
        let count: usize = tokens.next("point count")?;
        let domain = read_domain(&mut tokens, version, num_inputs)?;
        if domain.num_inputs() != num_inputs
        {
            return Err(SGError::DimensionMismatch { expected: num_inputs, found: domain.num_inputs() });
        }
        let has_leaf_flags = version >= 2 && version != 4;
        let mut storage = GridStorage::with_domain(domain);
        let mut level = vec![0; num_inputs];
        let mut index = vec![0; num_inputs];
        for _ in 0..count
        {
            let dim: usize = tokens.next("point dimension")?;
            if dim != num_inputs
            {
                return Err(SGError::DimensionMismatch { expected: num_inputs, found: dim });
            }
            for d in 0..num_inputs
            {
                level[d] = tokens.next("level")?;
                index[d] = tokens.next("index")?;
            }
            let is_leaf = if has_leaf_flags { tokens.next_bool("leaf flag")? } else { false };
            let point = GridPoint::new(&level, &index, is_leaf);
            if !point.is_valid()
            {
                return Err(SGError::Parse(format!("invalid grid point {level:?} {index:?}")));
            }
            storage.insert(point)?;
        }
        if !has_leaf_flags
        {
            storage.recalc_leaf_property();
        }
        tracing::debug!(version, num_inputs, points = storage.len(), "deserialized grid storage");
        Ok(storage)
    }

    ///
    /// Replaces the contents of `self` with the serialized storage but keeps the
    /// current algorithmic dimensions.
    ///
    pub fn deserialize_no_algo_dims(&mut self, text: &str) -> Result<(), SGError>
    {
        let mut storage = Self::deserialize(text)?;
        let dims = self.algorithmic_dimensions().to_vec();
        storage.set_algorithmic_dimensions(dims)?;
        *self = storage;
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn sample_points(storage: &mut GridStorage)
    {
        storage.insert(GridPoint::new(&[1, 1], &[1, 1], false)).expect("Could not insert");
        storage.insert(GridPoint::new(&[2, 1], &[3, 1], true)).expect("Could not insert");
        storage.insert(GridPoint::new(&[0, 1], &[1, 1], true)).expect("Could not insert");
    }

    #[test]
    fn test_bounding_box_round_trip()
    {
        let mut bbox = BoundingBox::from_bounds(&[-1.5, 0.0], &[2.0, 0.1]).expect("Could not build box");
        bbox.set_boundary(1, BoundingBox1D { left: 0.0, right: 0.1, dirichlet_left: true, dirichlet_right: false });
        let mut storage = GridStorage::with_bounding_box(bbox);
        sample_points(&mut storage);
        let text = storage.serialize();
        assert!(text.starts_with("5 2 3\n0\n"));
        let restored = GridStorage::deserialize(&text).expect("Could not deserialize");
        assert_eq!(restored, storage);
        assert!(restored.is_leaf(1));
        assert!(!restored.is_leaf(0));
    }

    #[test]
    fn test_analytic_stretching_round_trip()
    {
        let boundaries = vec![BoundingBox1D::new(1.0, 10.0), BoundingBox1D::new(-1.0, 1.0)];
        let transforms = vec![Stretching1D::new(StretchingType::Log, 0.0, 0.0), Stretching1D::new(StretchingType::Sinh, 0.25, 3.0)];
        let mut storage = GridStorage::with_stretching(Stretching::analytic(boundaries, transforms).expect("Could not build stretching"));
        sample_points(&mut storage);
        let restored = GridStorage::deserialize(&storage.serialize()).expect("Could not deserialize");
        assert_eq!(restored, storage);
        assert_eq!(restored.coordinate(1), storage.coordinate(1));
    }

    #[test]
    fn test_discrete_stretching_round_trip()
    {
        let stretching = Stretching::discrete(vec![vec![0.0, 0.1, 0.5, 0.6, 1.0], vec![-1.0, 0.0, 3.0]]).expect("Could not build stretching");
        let mut storage = GridStorage::with_stretching(stretching);
        sample_points(&mut storage);
        let text = storage.serialize();
        assert!(text.starts_with("5 2 3\n2\n"));
        let restored = GridStorage::deserialize(&text).expect("Could not deserialize");
        assert_eq!(restored.stretching().and_then(|s| s.discrete_vector(0)), Some(vec![0.0, 0.1, 0.5, 0.6, 1.0]));
        assert_eq!(restored, storage);
    }

    #[test]
    fn test_legacy_versions()
    {
        // version 1: unit cube, no leaf flags
        let text = "1 1 3\n1\n1 1\n1\n2 1\n1\n2 3\n";
        let storage = GridStorage::deserialize(text).expect("Could not deserialize");
        assert_eq!(storage.len(), 3);
        assert!(storage.bounding_box().is_some_and(|b| b.is_trivial_cube()));
        assert!(!storage.is_leaf(0));
        assert!(storage.is_leaf(1) && storage.is_leaf(2));

        // version 3: bare bounding box, explicit leaf flags; a stale flag on a parent is cleared
        let text = "3 1 2\n0 2 0 0\n1\n1 1\n1\n1\n2 1\n1\n";
        let storage = GridStorage::deserialize(text).expect("Could not deserialize");
        assert_eq!(storage.bounding_box().map(|b| b.width(0)), Some(2.0));
        assert!(!storage.is_leaf(0));
        assert!(storage.is_leaf(1));

        // version 4: bounding box, no leaf flags
        let text = "4 1 2\n0 2 0 0\n1\n1 1\n1\n2 1\n";
        let storage = GridStorage::deserialize(text).expect("Could not deserialize");
        assert!(!storage.is_leaf(0));
        assert!(storage.is_leaf(1));
    }

    #[test]
    fn test_rejects_bad_input()
    {
        assert_eq!(GridStorage::deserialize("6 1 0\n0\n0 1 0 0\n"), Err(SGError::SerializationVersion { found: 6, supported: 5 }));
        assert!(matches!(GridStorage::deserialize("5 1 1\n0\n0 1 0 0\n1\n2 2\n0\n"), Err(SGError::Parse(_))));
        assert!(matches!(GridStorage::deserialize("5 1 1\n0\n0 1 0 0\n"), Err(SGError::Parse(_))));
        // level 31 lies beyond the deepest level any lookup reaches
        assert!(matches!(GridStorage::deserialize("5 1 1\n0\n0 1 0 0\n1\n31 1\n0\n"), Err(SGError::Parse(_))));
        assert!(GridStorage::deserialize("5 1 1\n0\n0 1 0 0\n1\n30 1\n1\n").is_ok());
        assert!(matches!(GridStorage::deserialize("5 2 1\n0\n0 1 0 0 0 1 0 0\n1\n1 1\n0\n"), Err(SGError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_deserialize_keeps_algorithmic_dimensions()
    {
        let mut source = GridStorage::new(3);
        source.insert(GridPoint::new(&[1, 1, 1], &[1, 1, 1], true)).expect("Could not insert");
        let text = source.serialize();
        let mut target = GridStorage::new(3);
        target.set_algorithmic_dimensions(vec![1]).expect("Could not set dimensions");
        target.deserialize_no_algo_dims(&text).expect("Could not deserialize");
        assert_eq!(target.len(), 1);
        assert_eq!(target.algorithmic_dimensions(), &[1]);
        assert_eq!(GridStorage::deserialize(&text).expect("Could not deserialize").algorithmic_dimensions(), &[0, 1, 2]);
    }
}
