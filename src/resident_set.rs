//! Resident set: the pages currently bound to frames.
//!
//! Descriptors live in a slot array indexed by frame number, and the
//! structural order is an explicit successor array indexed the same way. A
//! page admitted in place of a victim takes the victim's frame, and with it
//! the victim's slot and links, so splicing never has to rewire neighbours.
//!
//! Under FIFO the links form a queue from `head` to `tail`. Under Clock they
//! form a chain that is closed into a ring once every frame is in use, and
//! `hand` marks where the next eviction scan starts.

use log::debug;

use crate::error::{Error, Result};
use crate::page::{FrameNumber, PageDescriptor, PageNumber};
use crate::pager::Protect;
use crate::region::Policy;

/// Outcome of admitting a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Frame bound to the admitted page.
    pub frame: FrameNumber,
    /// Page removed to make room, if the set was full.
    pub evicted: Option<PageDescriptor>,
}

#[derive(Debug)]
pub struct ResidentSet {
    pub(crate) policy: Policy,
    pub(crate) frame_count: usize,
    pub(crate) slots: Vec<Option<PageDescriptor>>,
    pub(crate) next: Vec<Option<FrameNumber>>,
    pub(crate) head: Option<FrameNumber>,
    pub(crate) tail: Option<FrameNumber>,
    pub(crate) hand: Option<FrameNumber>,
    pub(crate) len: usize,
}

impl ResidentSet {
    pub fn new(policy: Policy, frame_count: usize) -> Result<Self> {
        if frame_count == 0 {
            return Err(Error::InvalidFrameCount(frame_count));
        }
        Ok(ResidentSet {
            policy,
            frame_count,
            slots: vec![None; frame_count],
            next: vec![None; frame_count],
            head: None,
            tail: None,
            hand: None,
            len: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.frame_count
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Frame the next Clock scan starts from.
    pub fn hand(&self) -> Option<FrameNumber> {
        self.hand
    }

    /// Logical start of every traversal: the queue head, or the hand.
    fn start(&self) -> Option<FrameNumber> {
        match self.policy {
            Policy::Fifo => self.head,
            Policy::Clock => self.hand,
        }
    }

    pub fn get(&self, frame: FrameNumber) -> Option<&PageDescriptor> {
        self.slots.get(frame).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, frame: FrameNumber) -> Option<&mut PageDescriptor> {
        self.slots.get_mut(frame).and_then(Option::as_mut)
    }

    /// Frame holding `page`, scanning from the logical start.
    ///
    /// The walk never passes its starting point again, so a miss costs one
    /// traversal of the resident pages and has no side effects.
    pub fn find(&self, page: PageNumber) -> Result<Option<FrameNumber>> {
        let Some(start) = self.start() else {
            return Ok(None);
        };

        let mut cursor = start;
        for _ in 0..self.len {
            let descriptor = self.slots[cursor].as_ref().ok_or_else(|| {
                Error::CorruptChain(format!("frame {} is linked but empty", cursor))
            })?;
            if descriptor.page == page {
                return Ok(Some(cursor));
            }
            match self.next[cursor] {
                Some(next) if next != start => cursor = next,
                _ => return Ok(None),
            }
        }

        Err(Error::CorruptChain(format!(
            "walk from frame {} exceeded {} resident pages",
            start, self.len
        )))
    }

    pub fn lookup(&self, page: PageNumber) -> Result<Option<&PageDescriptor>> {
        Ok(self.find(page)?.and_then(|frame| self.get(frame)))
    }

    /// Admit `descriptor`, evicting one page first if every frame is in use.
    ///
    /// Frames are handed out sequentially until the set fills; after that the
    /// admitted page always inherits the victim's frame. The caller owns the
    /// victim's protection reset.
    pub fn insert(
        &mut self,
        mut descriptor: PageDescriptor,
        protect: &mut impl Protect,
    ) -> Result<Admission> {
        if self.len < self.frame_count {
            let frame = self.len;
            descriptor.frame = Some(frame);
            self.slots[frame] = Some(descriptor);
            self.next[frame] = None;

            match self.tail {
                None => {
                    self.head = Some(frame);
                    if self.policy == Policy::Clock {
                        self.hand = Some(frame);
                    }
                }
                Some(tail) => self.next[tail] = Some(frame),
            }
            self.tail = Some(frame);
            self.len += 1;

            // Filling the last frame closes the Clock ring.
            if self.policy == Policy::Clock && self.len == self.frame_count && self.len > 1 {
                self.next[frame] = self.head;
            }

            return Ok(Admission { frame, evicted: None });
        }

        let victim = match self.policy {
            Policy::Fifo => self.fifo_victim()?,
            Policy::Clock if self.frame_count == 1 => {
                self.hand.ok_or(Error::EmptyResidentSet)?
            }
            Policy::Clock => self.clock_victim(protect)?,
        };

        descriptor.frame = Some(victim);
        let evicted = self.slots[victim].replace(descriptor).ok_or_else(|| {
            Error::CorruptChain(format!("victim frame {} is empty", victim))
        })?;

        if self.policy == Policy::Clock && self.frame_count > 1 {
            self.hand = self.next[victim];
        }

        debug!(
            "evicted page {} from frame {} (modified={})",
            evicted.page, victim, evicted.modified
        );

        Ok(Admission { frame: victim, evicted: Some(evicted) })
    }

    /// Resident descriptors in traversal order from the logical start.
    pub fn iter(&self) -> impl Iterator<Item = &PageDescriptor> + '_ {
        let start = self.start();
        let mut cursor = start;
        let mut remaining = self.len;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let frame = cursor?;
            remaining -= 1;
            cursor = self.next[frame].filter(|&next| Some(next) != start);
            self.slots[frame].as_ref()
        })
    }
}
