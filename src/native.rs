//! Native backend: the region is real anonymous memory guarded with
//! `mprotect`, and protection faults arrive as `SIGSEGV`.
//!
//! The handler reads the faulting address from `siginfo_t` and the access
//! kind from bit 1 of the x86-64 page-fault error code, then runs the same
//! [`Pager`] as the software MMU. Faults are resolved inside the handler, so
//! the faulting instruction is simply restarted by the kernel. Only one
//! native region may exist at a time.
//!
//! Nothing may allocate or log inside the handler: the event log is reserved
//! up front, and the `log` max level is held at `Off` while a region lives.

use std::io;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use log::{info, LevelFilter};

use crate::classify::AccessKind;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::mmu::Memory;
use crate::page::{PageNumber, Protection};
use crate::pager::{Fault, Pager, Protect};
use crate::region::{Policy, RegionConfig};
use crate::stats::StatsLog;

/// Protection primitive backed by `mprotect`.
#[derive(Debug)]
struct Mprotect {
    base: usize,
    page_size: usize,
}

impl Protect for Mprotect {
    fn set_protection(&mut self, page: PageNumber, protection: Protection) -> Result<()> {
        let mut prot = libc::PROT_NONE;
        if protection.contains(Protection::READ) {
            prot |= libc::PROT_READ;
        }
        if protection.contains(Protection::WRITE) {
            prot |= libc::PROT_WRITE;
        }
        let address = (self.base + page * self.page_size) as *mut libc::c_void;
        // SAFETY: the page lies inside the mapping owned by the active NativeRegion.
        if unsafe { libc::mprotect(address, self.page_size, prot) } != 0 {
            return Err(Error::Protection(io::Error::last_os_error()));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct NativeState {
    pager: Pager,
    protect: Mprotect,
    log: StatsLog,
}

/// State of the region the signal handler serves, or null.
static ACTIVE: AtomicPtr<NativeState> = AtomicPtr::new(ptr::null_mut());

extern "C" fn handle_sigsegv(_sig: libc::c_int, info: *mut libc::siginfo_t, context: *mut libc::c_void) {
    let state = ACTIVE.load(Ordering::Acquire);
    if state.is_null() || info.is_null() || context.is_null() {
        std::process::abort();
    }

    // SAFETY: SA_SIGINFO handlers receive a valid siginfo_t and ucontext_t,
    // and `state` stays alive for as long as it is published in ACTIVE.
    let (address, error_code, state) = unsafe {
        let ucontext = &*(context as *const libc::ucontext_t);
        (
            (*info).si_addr() as usize,
            ucontext.uc_mcontext.gregs[libc::REG_ERR as usize] as u64,
            &mut *state,
        )
    };

    let fault = Fault { address, access: AccessKind::from_error_code(error_code) };
    let NativeState { pager, protect, log } = state;
    // Not a fault we can resolve; returning would re-fault forever.
    if pager.handle_fault(fault, protect, log).is_err() {
        std::process::abort();
    }
}

/// A page-aligned region whose accesses are paged by the signal handler.
pub struct NativeRegion {
    state: *mut NativeState,
    base: *mut u8,
    size: usize,
    page_size: usize,
    previous: libc::sigaction,
    log_level: LevelFilter,
}

impl NativeRegion {
    pub fn new(policy: Policy, frame_count: usize, pages: usize) -> Result<Self> {
        let page_size = host_page_size();
        let size = pages.checked_mul(page_size).ok_or_else(|| {
            Error::InvalidRegion(format!("{} pages of {} bytes overflow the address space", pages, page_size))
        })?;
        // Validate before touching process-wide state.
        RegionConfig::new(policy, 0, size, frame_count, page_size)?;

        // SAFETY: anonymous private mapping with no address hint.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        let unmap = || {
            // SAFETY: `base` came from the mmap above and is not referenced elsewhere.
            unsafe { libc::munmap(base, size) };
        };

        let region = match RegionConfig::new(policy, base as usize, size, frame_count, page_size) {
            Ok(region) => region,
            Err(e) => {
                unmap();
                return Err(e);
            }
        };
        let pager = match Pager::new(region) {
            Ok(pager) => pager,
            Err(e) => {
                unmap();
                return Err(e);
            }
        };

        let state = Box::into_raw(Box::new(NativeState {
            pager,
            protect: Mprotect { base: base as usize, page_size },
            log: StatsLog::with_capacity(MAX_OPS),
        }));

        if ACTIVE
            .compare_exchange(ptr::null_mut(), state, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // SAFETY: `state` was never published.
            drop(unsafe { Box::from_raw(state) });
            unmap();
            return Err(Error::InvalidRegion("a native region is already active".to_string()));
        }

        // SAFETY: zeroed sigaction is a valid starting point; every field we
        // rely on is set below.
        let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
        let mut previous: libc::sigaction = unsafe { std::mem::zeroed() };
        let handler: extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void) =
            handle_sigsegv;
        action.sa_sigaction = handler as libc::sighandler_t;
        action.sa_flags = libc::SA_SIGINFO;
        // SAFETY: both sigaction structs are valid for the duration of the calls.
        let installed = unsafe {
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(libc::SIGSEGV, &action, &mut previous)
        };
        if installed != 0 {
            let err = io::Error::last_os_error();
            ACTIVE.store(ptr::null_mut(), Ordering::Release);
            // SAFETY: unpublished again; no handler can observe it.
            drop(unsafe { Box::from_raw(state) });
            unmap();
            return Err(Error::Io(err));
        }

        info!(
            "native region at {:p}: {} pages of {} bytes, {} frames, {} policy",
            base, pages, page_size, frame_count, policy
        );
        let log_level = log::max_level();
        log::set_max_level(LevelFilter::Off);

        Ok(NativeRegion { state, base: base as *mut u8, size, page_size, previous, log_level })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn log(&self) -> &StatsLog {
        // SAFETY: `state` is live until drop, and the handler only runs during
        // `read`/`write`, which need `&mut self`.
        unsafe { &(*self.state).log }
    }

    fn offset(&self, page: PageNumber, word_offset: usize) -> Result<usize> {
        page.checked_mul(self.page_size)
            .zip(word_offset.checked_mul(WORD_SIZE))
            .and_then(|(page_start, word)| page_start.checked_add(word))
            .filter(|&offset| offset < self.size)
            .ok_or(Error::OutOfRange {
                address: (self.base as usize).saturating_add(page.saturating_mul(self.page_size)),
                size: self.size,
            })
    }
}

impl Memory for NativeRegion {
    fn read(&mut self, page: PageNumber, word_offset: usize) -> Result<u8> {
        let offset = self.offset(page, word_offset)?;
        // SAFETY: in bounds of the mapping; a protection fault is resolved by the handler.
        Ok(unsafe { ptr::read_volatile(self.base.add(offset)) })
    }

    fn write(&mut self, page: PageNumber, word_offset: usize, value: i32) -> Result<()> {
        let offset = self.offset(page, word_offset)?;
        // SAFETY: as for `read`.
        unsafe { ptr::write_volatile(self.base.add(offset), value as u8) };
        Ok(())
    }
}

impl Drop for NativeRegion {
    fn drop(&mut self) {
        // SAFETY: restores the handler saved in `new`, then releases state and
        // mapping once nothing can fault into them.
        unsafe {
            libc::sigaction(libc::SIGSEGV, &self.previous, ptr::null_mut());
            ACTIVE.store(ptr::null_mut(), Ordering::Release);
            drop(Box::from_raw(self.state));
            libc::munmap(self.base as *mut libc::c_void, self.size);
        }
        log::set_max_level(self.log_level);
    }
}
