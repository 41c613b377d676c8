//! Software MMU for the simulated region.
//!
//! Holds the region's bytes and a per-page protection table. Every access is
//! checked against the table; a violation is delivered to the [`Pager`] as
//! exactly one fault and the access is retried against the updated table.

use log::{debug, info};

use crate::classify::AccessKind;
use crate::error::{Error, Result};
use crate::io::{OpKind, Operation};
use crate::page::{PageNumber, Protection};
use crate::pager::{Fault, Pager, Protect};
use crate::region::RegionConfig;
use crate::stats::StatsLog;

/// Word-addressed reads and writes against a paged region.
pub trait Memory {
    fn read(&mut self, page: PageNumber, word_offset: usize) -> Result<u8>;
    fn write(&mut self, page: PageNumber, word_offset: usize, value: i32) -> Result<()>;

    fn execute(&mut self, op: &Operation) -> Result<()> {
        match op.kind {
            OpKind::Read => self.read(op.page, op.word_offset).map(|_| ()),
            OpKind::Write => self.write(op.page, op.word_offset, op.value),
        }
    }

    fn run(&mut self, ops: &[Operation]) -> Result<()> {
        for op in ops {
            self.execute(op)?;
        }
        Ok(())
    }
}

/// Protection table with one entry per page, all starting at no access.
#[derive(Debug, Clone)]
pub struct PageProtections {
    entries: Vec<Protection>,
}

impl PageProtections {
    pub fn new(pages: usize) -> Self {
        PageProtections { entries: vec![Protection::NONE; pages] }
    }

    pub fn get(&self, page: PageNumber) -> Protection {
        self.entries.get(page).copied().unwrap_or(Protection::NONE)
    }

    pub fn allows(&self, page: PageNumber, access: AccessKind) -> bool {
        let needed = match access {
            AccessKind::Read => Protection::READ,
            AccessKind::Write => Protection::WRITE,
        };
        self.get(page).contains(needed)
    }
}

impl Protect for PageProtections {
    fn set_protection(&mut self, page: PageNumber, protection: Protection) -> Result<()> {
        let entry = self.entries.get_mut(page).ok_or_else(|| {
            Error::InvalidRegion(format!("page {} has no protection entry", page))
        })?;
        *entry = protection;
        Ok(())
    }
}

/// Simulated region driven by a [`Pager`].
#[derive(Debug)]
pub struct Mmu {
    pager: Pager,
    bytes: Vec<u8>,
    protections: PageProtections,
    log: StatsLog,
}

impl Mmu {
    pub fn new(region: RegionConfig) -> Result<Self> {
        info!(
            "simulated region: {} pages of {} bytes, {} frames, {} policy",
            region.page_count(),
            region.page_size(),
            region.frame_count(),
            region.policy()
        );
        Ok(Mmu {
            pager: Pager::new(region)?,
            bytes: vec![0; region.size()],
            protections: PageProtections::new(region.page_count()),
            log: StatsLog::new(),
        })
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn log(&self) -> &StatsLog {
        &self.log
    }

    pub fn into_log(self) -> StatsLog {
        self.log
    }

    pub fn protection(&self, page: PageNumber) -> Protection {
        self.protections.get(page)
    }

    fn address(&self, page: PageNumber, word_offset: usize) -> Result<usize> {
        self.pager.region().word_address(page, word_offset)
    }

    /// Check `address` for `access`, faulting once if it is not permitted.
    fn resolve(&mut self, address: usize, access: AccessKind) -> Result<usize> {
        let region = *self.pager.region();
        let offset = region.offset_of(address)?;
        let page = offset / region.page_size();

        if !self.protections.allows(page, access) {
            debug!("{:?} access at {:#x} faults on page {}", access, address, page);
            self.pager.handle_fault(Fault { address, access }, &mut self.protections, &mut self.log)?;
            if !self.protections.allows(page, access) {
                return Err(Error::UnresolvedFault(page));
            }
        }

        Ok(offset)
    }

    pub fn read_at(&mut self, address: usize) -> Result<u8> {
        let offset = self.resolve(address, AccessKind::Read)?;
        Ok(self.bytes[offset])
    }

    /// Stores the low byte of `value`.
    pub fn write_at(&mut self, address: usize, value: i32) -> Result<()> {
        let offset = self.resolve(address, AccessKind::Write)?;
        self.bytes[offset] = value as u8;
        Ok(())
    }
}

impl Memory for Mmu {
    fn read(&mut self, page: PageNumber, word_offset: usize) -> Result<u8> {
        let address = self.address(page, word_offset)?;
        self.read_at(address)
    }

    fn write(&mut self, page: PageNumber, word_offset: usize, value: i32) -> Result<()> {
        let address = self.address(page, word_offset)?;
        self.write_at(address, value)
    }
}
