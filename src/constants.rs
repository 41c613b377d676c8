/// Pages in the simulated region when none is requested.
pub const DEFAULT_REGION_PAGES: usize = 16;

/// Operation-stream offsets address 4-byte words.
pub const WORD_SIZE: usize = 4;

/// Fallback when the host page size cannot be queried.
pub const FALLBACK_PAGE_SIZE: usize = 4096;

/// Events reserved up front by the statistics log.
pub const MAX_OPS: usize = 100_000;

/// Printed in place of a page number when nothing was evicted.
pub const NO_EVICTION: i64 = -1;

pub const POLICY_FIFO_CODE: u32 = 1;
pub const POLICY_THIRD_CODE: u32 = 2;

/// Page size of the host, as reported by `sysconf(_SC_PAGE_SIZE)`.
#[cfg(unix)]
pub fn host_page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) };
    if size > 0 { size as usize } else { FALLBACK_PAGE_SIZE }
}

#[cfg(not(unix))]
pub fn host_page_size() -> usize {
    FALLBACK_PAGE_SIZE
}
