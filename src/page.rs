use bitflags::bitflags;

/// Index of a virtual page within the region.
pub type PageNumber = usize;

/// Index of a physical frame, always below the frame count.
pub type FrameNumber = usize;

bitflags! {
    /// Protection applied to one page of the region. Empty means no access.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

impl Protection {
    pub const NONE: Self = Self::empty();
    pub const READ_WRITE: Self = Self::READ.union(Self::WRITE);
}

/// Permission state of a resident page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Access {
    /// Just admitted, not yet classified.
    #[default]
    None,
    ReadOnly,
    ReadWrite,
}

impl Access {
    pub fn can_read(self) -> bool {
        self != Access::None
    }

    pub fn can_write(self) -> bool {
        self == Access::ReadWrite
    }

    /// Protection that grants exactly this access.
    pub fn protection(self) -> Protection {
        match self {
            Access::None => Protection::NONE,
            Access::ReadOnly => Protection::READ,
            Access::ReadWrite => Protection::READ_WRITE,
        }
    }
}

/// Record for one resident virtual page.
///
/// The frame binding is assigned by the resident set on admission and never
/// changes while the page stays resident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    pub page: PageNumber,
    pub frame: Option<FrameNumber>,
    pub access: Access,
    pub referenced: bool,
    pub modified: bool,
    pub third_chance_taken: bool,
}

impl PageDescriptor {
    pub fn new(page: PageNumber) -> Self {
        PageDescriptor {
            page,
            frame: None,
            access: Access::None,
            referenced: false,
            modified: false,
            third_chance_taken: false,
        }
    }
}
