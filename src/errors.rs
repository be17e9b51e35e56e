use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SGError
{
    /// Storage was empty where points are required, or populated where it must be empty.
    #[error("invalid storage state: {0}")]
    StorageState(String),
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("serialized grid version {found} is newer than the supported version {supported}")]
    SerializationVersion { found: u32, supported: u32 },
    #[error("unknown grid type `{0}`")]
    UnknownGridType(String),
    #[error("could not parse serialized grid: {0}")]
    Parse(String),
    #[error("point lies outside of the grid domain")]
    OutOfDomain,
    #[error("invalid grid point: {0}")]
    InvalidGridPoint(String),
    #[error("invalid sequence number")]
    InvalidIndex,
    #[error("serialization failed")]
    SerializationFailed,
    #[error("deserialization failed")]
    DeserializationFailed,
    #[error("lz4 decompression failed")]
    LZ4DecompressionFailed,
    #[error("file i/o failed")]
    FileIOError,
}

impl SGError
{
    pub(crate) fn empty_storage() -> Self
    {
        SGError::StorageState("storage empty".to_string())
    }
    pub(crate) fn non_empty_storage() -> Self
    {
        SGError::StorageState("storage not empty".to_string())
    }
}

#[test]
fn test_error_messages()
{
    let err = SGError::SerializationVersion { found: 7, supported: 5 };
    assert_eq!(err.to_string(), "serialized grid version 7 is newer than the supported version 5");
    assert_eq!(SGError::empty_storage().to_string(), "invalid storage state: storage empty");
    let err = SGError::DimensionMismatch { expected: 2, found: 3 };
    assert_eq!(err.to_string(), "dimension mismatch: expected 2, found 3");
}
