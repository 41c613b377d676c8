use std::io::Write;

use crate::classify::FaultKind;
use crate::constants::*;
use crate::error::Result;
use crate::pager::{FaultEvent, Logger};

/// Fault events in arrival order.
#[derive(Debug, Clone, Default)]
pub struct StatsLog {
    events: Vec<FaultEvent>,
}

/// Totals over a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub faults: usize,
    pub by_kind: [usize; 5],
    pub evictions: usize,
    pub writebacks: usize,
}

impl Summary {
    pub fn count(&self, kind: FaultKind) -> usize {
        self.by_kind[kind.code() as usize]
    }
}

impl StatsLog {
    pub fn new() -> Self {
        StatsLog::default()
    }

    /// A log that can take `capacity` events without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        StatsLog { events: Vec::with_capacity(capacity) }
    }

    pub fn events(&self) -> &[FaultEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary { faults: self.events.len(), ..Summary::default() };
        for event in &self.events {
            summary.by_kind[event.kind.code() as usize] += 1;
            if event.evicted.is_some() {
                summary.evictions += 1;
            }
            if event.writeback {
                summary.writebacks += 1;
            }
        }
        summary
    }

    /// Write the tab-separated fault report, preceded by the region header.
    pub fn write_report<W: Write>(&self, out: &mut W, page_size: usize, frames: usize) -> Result<()> {
        writeln!(out, "Page Size: {}", page_size)?;
        writeln!(out, "Num Frames: {}", frames)?;
        writeln!(out, "type\tvirt-page\tevicted-virt-page\twrite-back\tphy-addr")?;
        for event in &self.events {
            let evicted = event.evicted.map_or(NO_EVICTION, |page| page as i64);
            writeln!(
                out,
                "{}\t\t{}\t\t{}\t\t{}\t\t{:#06x}",
                event.kind.code(),
                event.page,
                evicted,
                u8::from(event.writeback),
                event.physical_address
            )?;
        }
        Ok(())
    }
}

impl Logger for StatsLog {
    fn record(&mut self, event: FaultEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(page: usize, kind: FaultKind, evicted: Option<usize>, writeback: bool, pa: usize) -> FaultEvent {
        FaultEvent { page, kind, evicted, writeback, physical_address: pa }
    }

    #[test]
    fn test_report_format() {
        let mut log = StatsLog::new();
        log.record(event(0, FaultKind::Write, None, false, 0x10));
        log.record(event(3, FaultKind::Read, Some(0), true, 0x1abc));

        let mut out = Vec::new();
        log.write_report(&mut out, 4096, 2).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Page Size: 4096");
        assert_eq!(lines[1], "Num Frames: 2");
        assert_eq!(lines[2], "type\tvirt-page\tevicted-virt-page\twrite-back\tphy-addr");
        assert_eq!(lines[3], "1\t\t0\t\t-1\t\t0\t\t0x0010");
        assert_eq!(lines[4], "0\t\t3\t\t0\t\t1\t\t0x1abc");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_wide_physical_address() {
        let mut log = StatsLog::new();
        log.record(event(1, FaultKind::Perm, None, false, 0x12345));
        let mut out = Vec::new();
        log.write_report(&mut out, 4096, 64).unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("0x12345\n"));
    }

    #[test]
    fn test_capacity() {
        assert_eq!(StatsLog::new().events.capacity(), 0);
        assert!(StatsLog::with_capacity(MAX_OPS).events.capacity() >= MAX_OPS);
    }

    #[test]
    fn test_summary() {
        let mut log = StatsLog::new();
        assert!(log.is_empty());
        log.record(event(0, FaultKind::Write, None, false, 0));
        log.record(event(1, FaultKind::Read, Some(0), true, 0));
        log.record(event(1, FaultKind::TrackRead, None, false, 0));
        log.record(event(2, FaultKind::Read, Some(1), false, 0));

        let summary = log.summary();
        assert_eq!(summary.faults, 4);
        assert_eq!(summary.count(FaultKind::Read), 2);
        assert_eq!(summary.count(FaultKind::TrackRead), 1);
        assert_eq!(summary.count(FaultKind::Perm), 0);
        assert_eq!(summary.evictions, 2);
        assert_eq!(summary.writebacks, 1);
    }
}
