//! Victim selection for a full resident set.
//!
//! Both policies only pick and unlink; the caller puts the incoming page in
//! the victim's slot.

use log::trace;

use crate::error::{Error, Result};
use crate::page::{FrameNumber, Protection};
use crate::pager::Protect;
use crate::resident_set::ResidentSet;

impl ResidentSet {
    /// FIFO: the head leaves, and its frame becomes the new tail.
    pub(crate) fn fifo_victim(&mut self) -> Result<FrameNumber> {
        let victim = self.head.ok_or(Error::EmptyResidentSet)?;
        let tail = self.tail.ok_or(Error::EmptyResidentSet)?;
        let new_head = self.next[victim];

        if tail != victim {
            self.next[tail] = Some(victim);
        }
        self.next[victim] = None;
        self.tail = Some(victim);
        // With one frame the victim was the whole queue.
        self.head = Some(new_head.unwrap_or(victim));

        Ok(victim)
    }

    /// Clock with a third chance, scanning the closed ring from the hand.
    ///
    /// A referenced page is aged (bit cleared, protection dropped so the next
    /// access re-faults) and skipped. An unreferenced dirty page is skipped
    /// once more. Anything else is the victim.
    pub(crate) fn clock_victim(&mut self, protect: &mut impl Protect) -> Result<FrameNumber> {
        let mut cursor = self.hand.ok_or(Error::EmptyResidentSet)?;

        // Aging lap, reprieve lap, then a victim is guaranteed.
        for _ in 0..=2 * self.len {
            let page = self.slots[cursor].as_mut().ok_or_else(|| {
                Error::CorruptChain(format!("frame {} is in the ring but empty", cursor))
            })?;

            if page.referenced {
                page.referenced = false;
                protect.set_protection(page.page, Protection::NONE)?;
                trace!("aged page {} in frame {}", page.page, cursor);
            } else if page.modified && !page.third_chance_taken {
                page.third_chance_taken = true;
                trace!("third chance for page {} in frame {}", page.page, cursor);
            } else {
                return Ok(cursor);
            }

            cursor = self.next[cursor]
                .ok_or_else(|| Error::CorruptChain(format!("ring is open at frame {}", cursor)))?;
        }

        Err(Error::CorruptChain("clock scan found no victim".to_string()))
    }
}
