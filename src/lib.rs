pub mod classify;
pub mod constants;
pub mod error;
pub mod io;
pub mod mmu;
pub mod page;
pub mod pager;
pub mod region;
pub mod replacement;
pub mod resident_set;
pub mod stats;

#[cfg(all(feature = "native", target_os = "linux", target_arch = "x86_64"))]
pub mod native;

// Re-export commonly used items for convenience
pub use classify::{AccessKind, FaultKind};
pub use error::{Error, Result};
pub use page::{Access, PageDescriptor, Protection};
pub use pager::{Fault, FaultEvent, Logger, Pager, Protect};
pub use region::{Policy, RegionConfig};
pub use resident_set::ResidentSet;
