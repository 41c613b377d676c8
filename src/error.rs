use thiserror::Error;

use crate::classify::AccessKind;
use crate::page::{Access, PageNumber};

/// Result alias used throughout the pager.
pub type Result<T> = core::result::Result<T, Error>;

/// Everything that can stop the pager. None of these are retryable.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame count was zero.
    #[error("invalid number of frames: {0}")]
    InvalidFrameCount(usize),
    /// Policy name or code not recognised.
    #[error("unknown replacement policy: {0}")]
    UnknownPolicy(String),
    /// Region geometry is unusable.
    #[error("invalid region: {0}")]
    InvalidRegion(String),
    /// Access/state combination the classifier has no fault kind for.
    #[error("cannot classify {access:?} fault on page {page} (resident state {state:?})")]
    Unclassifiable {
        page: PageNumber,
        access: AccessKind,
        state: Option<Access>,
    },
    /// Eviction was requested with nothing resident.
    #[error("eviction requested on an empty resident set")]
    EmptyResidentSet,
    /// Successor chain does not match the recorded size.
    #[error("resident set successor chain is corrupt: {0}")]
    CorruptChain(String),
    /// The access still violated protection after its fault was handled.
    #[error("fault on page {0} did not resolve")]
    UnresolvedFault(PageNumber),
    /// Address outside the reserved region.
    #[error("address {address:#x} outside region of {size} bytes")]
    OutOfRange { address: usize, size: usize },
    /// Malformed operation stream.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    /// The protection primitive failed.
    #[error("protection change failed: {0}")]
    Protection(std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
