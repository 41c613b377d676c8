//! Fault dispatcher.
//!
//! [`Pager::handle_fault`] resolves one protection fault to completion:
//! locate or admit the page, classify the fault, update the page state and
//! its protection, then report a [`FaultEvent`]. Protection changes and event
//! delivery go through the [`Protect`] and [`Logger`] collaborators so the
//! same dispatcher drives both the software MMU and the native backend.

use log::debug;

use crate::classify::{classify, AccessKind, FaultKind};
use crate::error::{Error, Result};
use crate::page::{Access, PageDescriptor, PageNumber, Protection};
use crate::region::RegionConfig;
use crate::resident_set::ResidentSet;

/// Changes the protection of one page of the region.
pub trait Protect {
    fn set_protection(&mut self, page: PageNumber, protection: Protection) -> Result<()>;
}

/// Receives one event per resolved fault, in arrival order.
pub trait Logger {
    fn record(&mut self, event: FaultEvent);
}

impl Logger for Vec<FaultEvent> {
    fn record(&mut self, event: FaultEvent) {
        self.push(event);
    }
}

/// An illegal access as delivered to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub address: usize,
    pub access: AccessKind,
}

impl Fault {
    pub fn read(address: usize) -> Self {
        Fault { address, access: AccessKind::Read }
    }

    pub fn write(address: usize) -> Self {
        Fault { address, access: AccessKind::Write }
    }
}

/// Record of one resolved fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultEvent {
    pub page: PageNumber,
    pub kind: FaultKind,
    pub evicted: Option<PageNumber>,
    /// The evicted page was modified and would need writing back.
    pub writeback: bool,
    pub physical_address: usize,
}

/// Demand pager for one region.
#[derive(Debug)]
pub struct Pager {
    region: RegionConfig,
    resident: ResidentSet,
}

impl Pager {
    pub fn new(region: RegionConfig) -> Result<Self> {
        let resident = ResidentSet::new(region.policy(), region.frame_count())?;
        Ok(Pager { region, resident })
    }

    pub fn region(&self) -> &RegionConfig {
        &self.region
    }

    pub fn resident(&self) -> &ResidentSet {
        &self.resident
    }

    pub fn handle_fault(
        &mut self,
        fault: Fault,
        protect: &mut impl Protect,
        logger: &mut impl Logger,
    ) -> Result<FaultEvent> {
        let page = self.region.page_of(fault.address)?;

        let (frame, prior, evicted) = match self.resident.find(page)? {
            Some(frame) => {
                let descriptor = self.resident.get(frame).ok_or_else(|| {
                    Error::CorruptChain(format!("frame {} found but empty", frame))
                })?;
                (frame, Some(descriptor.access), None)
            }
            None => {
                let admission = self.resident.insert(PageDescriptor::new(page), protect)?;
                // The victim must re-fault before the new page gets any access.
                if let Some(victim) = &admission.evicted {
                    protect.set_protection(victim.page, Protection::NONE)?;
                }
                (admission.frame, None, admission.evicted)
            }
        };

        let kind = classify(page, fault.access, prior, self.region.policy())?;

        let descriptor = self
            .resident
            .get_mut(frame)
            .ok_or_else(|| Error::CorruptChain(format!("frame {} lost page {}", frame, page)))?;
        let grant = apply_transition(kind, descriptor);
        protect.set_protection(page, grant)?;

        let event = FaultEvent {
            page,
            kind,
            evicted: evicted.as_ref().map(|victim| victim.page),
            writeback: evicted.as_ref().is_some_and(|victim| victim.modified),
            physical_address: self.region.physical_address(frame, fault.address),
        };

        debug!(
            "{} on page {} -> frame {} (evicted {:?}, writeback {}) pa {:#06x}",
            kind, page, frame, event.evicted, event.writeback, event.physical_address
        );

        logger.record(event);
        Ok(event)
    }
}

/// Apply `kind` to the page state and return the protection to grant.
fn apply_transition(kind: FaultKind, page: &mut PageDescriptor) -> Protection {
    page.referenced = true;
    match kind {
        FaultKind::Read => {
            page.access = page.access.max(Access::ReadOnly);
            page.access.protection()
        }
        FaultKind::Write | FaultKind::Perm => {
            page.access = Access::ReadWrite;
            page.modified = true;
            Protection::READ_WRITE
        }
        // Reads are tracked with read access only, so a later write is seen too.
        FaultKind::TrackRead => {
            page.third_chance_taken = false;
            Protection::READ
        }
        FaultKind::TrackWrite => {
            page.modified = true;
            page.third_chance_taken = false;
            Protection::READ_WRITE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Policy;
    use crate::resident_set::tests::Recorder;

    const PAGE: usize = 4096;

    fn pager(policy: Policy, frames: usize) -> Pager {
        Pager::new(RegionConfig::new(policy, 0, 16 * PAGE, frames, PAGE).unwrap()).unwrap()
    }

    fn fault(
        pager: &mut Pager,
        fault: Fault,
        rec: &mut Recorder,
        log: &mut Vec<FaultEvent>,
    ) -> FaultEvent {
        pager.handle_fault(fault, rec, log).unwrap()
    }

    #[test]
    fn test_fifo_scenario_three_reads_two_frames() {
        let mut p = pager(Policy::Fifo, 2);
        let mut rec = Recorder::default();
        let mut log = Vec::new();

        let e0 = fault(&mut p, Fault::read(0), &mut rec, &mut log);
        let e1 = fault(&mut p, Fault::read(PAGE), &mut rec, &mut log);
        let e2 = fault(&mut p, Fault::read(2 * PAGE + 8), &mut rec, &mut log);

        assert_eq!((e0.kind, e0.evicted), (FaultKind::Read, None));
        assert_eq!((e1.kind, e1.evicted), (FaultKind::Read, None));
        assert_eq!(e1.physical_address, PAGE);
        assert_eq!(e2.kind, FaultKind::Read);
        assert_eq!(e2.evicted, Some(0));
        assert!(!e2.writeback);
        // Page 2 inherits page 0's frame.
        assert_eq!(e2.physical_address, 8);
        assert_eq!(log, vec![e0, e1, e2]);
    }

    #[test]
    fn test_protection_order_on_eviction() {
        let mut p = pager(Policy::Fifo, 1);
        let mut rec = Recorder::default();
        let mut log = Vec::new();

        fault(&mut p, Fault::write(0), &mut rec, &mut log);
        let event = fault(&mut p, Fault::read(PAGE), &mut rec, &mut log);
        assert_eq!(event.evicted, Some(0));
        assert!(event.writeback);
        assert_eq!(
            rec.calls,
            vec![
                (0, Protection::READ_WRITE),
                (0, Protection::NONE),
                (1, Protection::READ),
            ]
        );
    }

    #[test]
    fn test_perm_fault_upgrades_in_place() {
        let mut p = pager(Policy::Fifo, 4);
        let mut rec = Recorder::default();
        let mut log = Vec::new();

        fault(&mut p, Fault::read(3 * PAGE + 4), &mut rec, &mut log);
        let event = fault(&mut p, Fault::write(3 * PAGE + 4), &mut rec, &mut log);
        assert_eq!(event.kind, FaultKind::Perm);
        assert_eq!(event.evicted, None);
        assert_eq!(event.physical_address, 4);

        let page = p.resident().lookup(3).unwrap().unwrap();
        assert_eq!(page.access, Access::ReadWrite);
        assert!(page.modified);
        assert_eq!(p.resident().len(), 1);
    }

    #[test]
    fn test_fifo_refault_keeps_frame() {
        let mut p = pager(Policy::Fifo, 2);
        let mut rec = Recorder::default();
        let mut log = Vec::new();

        fault(&mut p, Fault::read(0), &mut rec, &mut log);
        fault(&mut p, Fault::read(PAGE), &mut rec, &mut log);
        let again = fault(&mut p, Fault::read(PAGE + 12), &mut rec, &mut log);
        assert_eq!(again.kind, FaultKind::Read);
        assert_eq!(again.evicted, None);
        assert_eq!(again.physical_address, PAGE + 12);
        assert_eq!(p.resident().len(), 2);
    }

    #[test]
    fn test_read_fault_does_not_downgrade_write_grant() {
        let mut p = pager(Policy::Fifo, 2);
        let mut rec = Recorder::default();
        let mut log = Vec::new();

        fault(&mut p, Fault::write(0), &mut rec, &mut log);
        fault(&mut p, Fault::read(0), &mut rec, &mut log);
        assert_eq!(rec.calls.last(), Some(&(0, Protection::READ_WRITE)));
        assert_eq!(p.resident().lookup(0).unwrap().unwrap().access, Access::ReadWrite);
    }

    #[test]
    fn test_clock_scenario_dirty_pages_get_third_chance() {
        let mut p = pager(Policy::Clock, 2);
        let mut rec = Recorder::default();
        let mut log = Vec::new();

        fault(&mut p, Fault::write(0), &mut rec, &mut log);
        fault(&mut p, Fault::write(PAGE), &mut rec, &mut log);
        let event = fault(&mut p, Fault::write(2 * PAGE), &mut rec, &mut log);

        // Lap one ages both, lap two spends both reprieves, lap three evicts page 0.
        assert_eq!(event.kind, FaultKind::Write);
        assert_eq!(event.evicted, Some(0));
        assert!(event.writeback);
        assert_eq!(event.physical_address, 0);

        let survivor = p.resident().lookup(1).unwrap().unwrap();
        assert!(!survivor.referenced);
        assert!(survivor.third_chance_taken);
        assert_eq!(survivor.access, Access::ReadWrite);
    }

    #[test]
    fn test_clock_tracking_faults() {
        let mut p = pager(Policy::Clock, 2);
        let mut rec = Recorder::default();
        let mut log = Vec::new();

        fault(&mut p, Fault::write(0), &mut rec, &mut log);
        fault(&mut p, Fault::read(PAGE), &mut rec, &mut log);
        // Ages both, evicts clean page 1, hand lands on page 0.
        let event = fault(&mut p, Fault::read(2 * PAGE), &mut rec, &mut log);
        assert_eq!(event.evicted, Some(1));
        assert!(!event.writeback);

        // Page 0 was aged: its next read is tracked and re-granted read only.
        let track = fault(&mut p, Fault::read(16), &mut rec, &mut log);
        assert_eq!(track.kind, FaultKind::TrackRead);
        assert_eq!(track.evicted, None);
        assert_eq!(track.physical_address, 16);
        assert_eq!(rec.calls.last(), Some(&(0, Protection::READ)));

        let page0 = p.resident().lookup(0).unwrap().unwrap();
        assert!(page0.referenced);
        assert!(!page0.third_chance_taken);

        // A tracking write also clears a third chance already taken.
        let frame = p.resident().find(0).unwrap().unwrap();
        p.resident.get_mut(frame).unwrap().third_chance_taken = true;
        let track = fault(&mut p, Fault::write(16), &mut rec, &mut log);
        assert_eq!(track.kind, FaultKind::TrackWrite);
        assert_eq!(rec.calls.last(), Some(&(0, Protection::READ_WRITE)));

        let page0 = p.resident().lookup(0).unwrap().unwrap();
        assert!(page0.modified);
        assert!(!page0.third_chance_taken);
    }

    #[test]
    fn test_out_of_range_fault() {
        let mut p = pager(Policy::Clock, 2);
        let mut rec = Recorder::default();
        let mut log = Vec::new();
        let result = p.handle_fault(Fault::read(16 * PAGE), &mut rec, &mut log);
        assert!(matches!(result, Err(Error::OutOfRange { .. })));
        assert!(log.is_empty());
    }
}
