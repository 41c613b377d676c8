use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::page::{FrameNumber, PageNumber};

/// Page-replacement policy in force for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Strict arrival order.
    Fifo,
    /// Clock scan with reference-bit aging and a third chance for dirty pages.
    Clock,
}

impl Policy {
    /// Numeric code used on the command line and in output file names.
    pub fn code(self) -> u32 {
        match self {
            Policy::Fifo => POLICY_FIFO_CODE,
            Policy::Clock => POLICY_THIRD_CODE,
        }
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "fifo" => Ok(Policy::Fifo),
            "2" | "third" | "clock" => Ok(Policy::Clock),
            other => Err(Error::UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Fifo => write!(f, "FIFO"),
            Policy::Clock => write!(f, "Third Chance"),
        }
    }
}

/// Geometry of the reserved region. Fixed once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionConfig {
    policy: Policy,
    base: usize,
    size: usize,
    frame_count: usize,
    page_size: usize,
}

impl RegionConfig {
    pub fn new(
        policy: Policy,
        base: usize,
        size: usize,
        frame_count: usize,
        page_size: usize,
    ) -> Result<Self> {
        if frame_count == 0 {
            return Err(Error::InvalidFrameCount(frame_count));
        }
        if page_size == 0 {
            return Err(Error::InvalidRegion("page size must be non-zero".to_string()));
        }
        if size == 0 || size % page_size != 0 {
            return Err(Error::InvalidRegion(format!(
                "size {} is not a positive multiple of page size {}",
                size, page_size
            )));
        }
        if base % page_size != 0 {
            return Err(Error::InvalidRegion(format!(
                "base {:#x} is not aligned to page size {}",
                base, page_size
            )));
        }

        Ok(RegionConfig { policy, base, size, frame_count, page_size })
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.size / self.page_size
    }

    /// Offset of `address` from the region base, if it lies inside the region.
    pub fn offset_of(&self, address: usize) -> Result<usize> {
        address
            .checked_sub(self.base)
            .filter(|&offset| offset < self.size)
            .ok_or(Error::OutOfRange { address, size: self.size })
    }

    pub fn page_of(&self, address: usize) -> Result<PageNumber> {
        Ok(self.offset_of(address)? / self.page_size)
    }

    #[inline]
    pub fn offset_in_page(&self, address: usize) -> usize {
        address.wrapping_sub(self.base) % self.page_size
    }

    /// Absolute address of the first byte of `page`.
    #[inline]
    pub fn page_base(&self, page: PageNumber) -> usize {
        self.base + page * self.page_size
    }

    /// Absolute address of word `word_offset` of `page`, if it lies inside the region.
    pub fn word_address(&self, page: PageNumber, word_offset: usize) -> Result<usize> {
        page.checked_mul(self.page_size)
            .zip(word_offset.checked_mul(WORD_SIZE))
            .and_then(|(page_start, word)| page_start.checked_add(word))
            .filter(|&offset| offset < self.size)
            .and_then(|offset| self.base.checked_add(offset))
            .ok_or(Error::OutOfRange {
                address: self.base.saturating_add(page.saturating_mul(self.page_size)),
                size: self.size,
            })
    }

    /// PA = frame * page_size + (address - base) mod page_size
    #[inline]
    pub fn physical_address(&self, frame: FrameNumber, address: usize) -> usize {
        frame * self.page_size + self.offset_in_page(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionConfig {
        RegionConfig::new(Policy::Fifo, 0x10000, 16 * 4096, 4, 4096).unwrap()
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("1".parse::<Policy>().unwrap(), Policy::Fifo);
        assert_eq!("fifo".parse::<Policy>().unwrap(), Policy::Fifo);
        assert_eq!("2".parse::<Policy>().unwrap(), Policy::Clock);
        assert_eq!("Third".parse::<Policy>().unwrap(), Policy::Clock);
        assert_eq!("clock".parse::<Policy>().unwrap(), Policy::Clock);
        assert!(matches!("3".parse::<Policy>(), Err(Error::UnknownPolicy(_))));
        assert!(matches!("lru".parse::<Policy>(), Err(Error::UnknownPolicy(_))));
    }

    #[test]
    fn test_policy_codes() {
        assert_eq!(Policy::Fifo.code(), 1);
        assert_eq!(Policy::Clock.code(), 2);
    }

    #[test]
    fn test_rejects_zero_frames() {
        let result = RegionConfig::new(Policy::Clock, 0, 4096, 0, 4096);
        assert!(matches!(result, Err(Error::InvalidFrameCount(0))));
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(RegionConfig::new(Policy::Fifo, 0, 4096, 1, 0).is_err());
        assert!(RegionConfig::new(Policy::Fifo, 0, 0, 1, 4096).is_err());
        assert!(RegionConfig::new(Policy::Fifo, 0, 5000, 1, 4096).is_err());
        assert!(RegionConfig::new(Policy::Fifo, 100, 4096, 1, 4096).is_err());
    }

    #[test]
    fn test_address_decomposition() {
        let r = region();
        assert_eq!(r.page_count(), 16);
        assert_eq!(r.page_of(0x10000).unwrap(), 0);
        assert_eq!(r.page_of(0x10000 + 4096 * 3 + 12).unwrap(), 3);
        assert_eq!(r.offset_in_page(0x10000 + 4096 * 3 + 12), 12);
        assert_eq!(r.page_base(3), 0x10000 + 3 * 4096);
    }

    #[test]
    fn test_out_of_range() {
        let r = region();
        assert!(matches!(r.page_of(0xFFFF), Err(Error::OutOfRange { .. })));
        assert!(matches!(r.page_of(0x10000 + 16 * 4096), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_word_address() {
        let r = region();
        assert_eq!(r.word_address(3, 5).unwrap(), 0x10000 + 3 * 4096 + 20);
        assert!(matches!(r.word_address(16, 0), Err(Error::OutOfRange { .. })));
        assert!(matches!(r.word_address(1 << 52, 0), Err(Error::OutOfRange { .. })));
        assert!(matches!(r.word_address(0, usize::MAX), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_physical_address_law() {
        let r = region();
        for frame in 0..4 {
            for offset in [0, 1, 40, 4095] {
                let address = r.page_base(9) + offset;
                assert_eq!(r.physical_address(frame, address), frame * 4096 + offset);
            }
        }
    }
}
