use std::fmt;

use crate::error::{Error, Result};
use crate::page::{Access, PageNumber};
use crate::region::Policy;

/// What the faulting instruction tried to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    /// Decode an x86 page-fault error code: bit 1 is set for writes.
    pub fn from_error_code(code: u64) -> Self {
        if code & 0x2 != 0 { AccessKind::Write } else { AccessKind::Read }
    }
}

/// Semantic kind of a resolved fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Read of a page that was not resident.
    Read,
    /// Write to a page that was not resident.
    Write,
    /// Write to a resident page that lacked write permission.
    Perm,
    /// Read of a resident page whose protection was dropped by aging.
    TrackRead,
    /// Write to a resident writable page whose protection was dropped by aging.
    TrackWrite,
}

impl FaultKind {
    pub const ALL: [FaultKind; 5] = [
        FaultKind::Read,
        FaultKind::Write,
        FaultKind::Perm,
        FaultKind::TrackRead,
        FaultKind::TrackWrite,
    ];

    /// Code written to the statistics report.
    pub fn code(self) -> u8 {
        match self {
            FaultKind::Read => 0,
            FaultKind::Write => 1,
            FaultKind::Perm => 2,
            FaultKind::TrackRead => 3,
            FaultKind::TrackWrite => 4,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::Read => "READ_FAULT",
            FaultKind::Write => "WRITE_FAULT",
            FaultKind::Perm => "PERM_FAULT",
            FaultKind::TrackRead => "TRACK_READ_FAULT",
            FaultKind::TrackWrite => "TRACK_WRITE_FAULT",
        };
        f.write_str(name)
    }
}

/// Map a fault to its kind.
///
/// `resident` is the page's access state before this fault, or `None` if the
/// page had to be admitted to service it.
pub fn classify(
    page: PageNumber,
    access: AccessKind,
    resident: Option<Access>,
    policy: Policy,
) -> Result<FaultKind> {
    use AccessKind::*;

    match (access, resident, policy) {
        (Read, None, _) => Ok(FaultKind::Read),
        (Read, Some(_), Policy::Fifo) => Ok(FaultKind::Read),
        (Read, Some(Access::ReadOnly | Access::ReadWrite), Policy::Clock) => {
            Ok(FaultKind::TrackRead)
        }
        (Write, None, _) => Ok(FaultKind::Write),
        (Write, Some(_), Policy::Fifo) => Ok(FaultKind::Perm),
        (Write, Some(Access::ReadWrite), Policy::Clock) => Ok(FaultKind::TrackWrite),
        (Write, Some(Access::None | Access::ReadOnly), Policy::Clock) => Ok(FaultKind::Perm),
        (Read, Some(Access::None), Policy::Clock) => {
            Err(Error::Unclassifiable { page, access, state: resident })
        }
    }
}
