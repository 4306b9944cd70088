use alloc::string::String;

use crate::block::BlockId;

pub type FatResult<T> = Result<T, FatError>;

#[derive(Debug, Clone, PartialEq, Eq, onlyerror::Error)]
pub enum FatError {
    #[error("file already exists: {0}")]
    NameTaken(String),
    #[error("name and content must not be empty")]
    EmptyInput,
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file is in the trash: {0}")]
    InTrash(String),
    #[error("file is already in the trash: {0}")]
    AlreadyTrashed(String),
    #[error("file is not in the trash: {0}")]
    NotTrashed(String),
    #[error("permission denied")]
    Forbidden,
    #[error("unknown user: {0}")]
    UnknownTarget(String),
    #[error("invalid permission kind: {0}")]
    InvalidPermission(String),
    // missing block, dangling link or hop bound exceeded
    #[error("corrupt block chain at {0}")]
    CorruptChain(BlockId),
    // the persisted table moved on since it was loaded
    #[error("table changed concurrently (expected generation {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    // the store was formatted with another block size
    #[error("store uses block size {stored}, config asks for {configured}")]
    BlockSizeMismatch { stored: usize, configured: usize },
    #[error("store i/o error: {0}")]
    Io(String),
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for FatError {
    fn from(e: serde_json::Error) -> Self {
        FatError::Codec(alloc::format!("{}", e))
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for FatError {
    fn from(e: std::io::Error) -> Self {
        FatError::Io(alloc::format!("{}", e))
    }
}
