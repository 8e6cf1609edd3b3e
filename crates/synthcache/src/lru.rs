//! Slot table with least-recently-used ordering
//!
//! Slots live in an arena addressed by integer handle. Recency is a
//! `BTreeMap` keyed by a monotonically increasing access tick, so the first
//! entry is always the least recently used. Only slots that may be evicted
//! (Ready or PendingDelete) are in the recency map; a slot that is being
//! generated is pinned outside it.

use std::collections::{BTreeMap, HashMap};
use std::thread::{self, ThreadId};

use ahash::RandomState;
use framesynth::{Error, Frame, Result};

/// Arena handle of a slot
pub(crate) type SlotId = usize;

/// Lifecycle of a cache slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Arena entry with no frame claimed. `reserve` hands out slots already
    /// BeingGenerated, so a linked slot is never observed in this state.
    Empty,
    /// A producer is building the frame; pinned
    BeingGenerated,
    /// Holds a published frame
    Ready,
    /// Holds a frame from an older epoch; never served again
    PendingDelete,
    /// Unlinked from the table; its buffer reference is gone or about to be
    Released,
}

/// One cache slot
#[derive(Debug)]
pub struct CachedFrame {
    frame_number: usize,
    sequence: u64,
    status: SlotStatus,
    frame: Option<Frame>,
    tick: Option<u64>,
    generator: Option<ThreadId>,
}

impl CachedFrame {
    /// Frame index this slot caches
    pub fn frame_number(&self) -> usize {
        self.frame_number
    }

    /// Epoch the frame was produced in
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Current status
    pub fn status(&self) -> SlotStatus {
        self.status
    }

    /// Published frame, if any
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Thread running the producer while the slot is BeingGenerated
    pub fn generator(&self) -> Option<ThreadId> {
        self.generator
    }
}

/// Arena of slots plus recency order
pub(crate) struct SlotTable {
    map: HashMap<usize, SlotId, RandomState>,
    slots: Vec<Option<CachedFrame>>,
    free_list: Vec<SlotId>,
    recency: BTreeMap<u64, SlotId>,
    clock: u64,
    pinned: usize,
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::with_hasher(RandomState::new()),
            slots: Vec::new(),
            free_list: Vec::new(),
            recency: BTreeMap::new(),
            clock: 0,
            pinned: 0,
        }
    }

    /// Slot currently holding `frame_number`
    pub(crate) fn lookup(&self, frame_number: usize) -> Option<SlotId> {
        self.map.get(&frame_number).copied()
    }

    pub(crate) fn get(&self, id: SlotId) -> Option<&CachedFrame> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// Claim a new slot for `frame_number` and pin it as BeingGenerated,
    /// owned by the calling thread
    pub(crate) fn reserve(&mut self, frame_number: usize) -> Result<SlotId> {
        debug_assert!(!self.map.contains_key(&frame_number));
        self.map.try_reserve(1).map_err(|_| Error::ResourceExhausted {
            what: "cache slot index",
            bytes: std::mem::size_of::<(usize, SlotId)>(),
        })?;
        let id = self.alloc_slot()?;
        self.slots[id] = Some(CachedFrame {
            frame_number,
            sequence: 0,
            status: SlotStatus::BeingGenerated,
            frame: None,
            tick: None,
            generator: Some(thread::current().id()),
        });
        self.map.insert(frame_number, id);
        self.pinned += 1;
        Ok(id)
    }

    /// Attach a produced frame, unpin the slot and make it most recent.
    /// A frame from an older epoch goes straight to PendingDelete.
    pub(crate) fn publish(&mut self, id: SlotId, frame: Frame, sequence: u64, epoch: u64) {
        let tick = self.next_tick();
        let Some(slot) = self.slots.get_mut(id).and_then(Option::as_mut) else {
            return;
        };
        if slot.status == SlotStatus::BeingGenerated {
            self.pinned -= 1;
        }
        slot.frame = Some(frame);
        slot.generator = None;
        slot.sequence = sequence;
        slot.status = if sequence == epoch {
            SlotStatus::Ready
        } else {
            SlotStatus::PendingDelete
        };
        if let Some(old) = slot.tick.replace(tick) {
            self.recency.remove(&old);
        }
        self.recency.insert(tick, id);
    }

    /// Move a linked slot to the head of the recency order
    pub(crate) fn touch(&mut self, id: SlotId) {
        let tick = self.next_tick();
        if let Some(slot) = self.slots.get_mut(id).and_then(Option::as_mut) {
            if let Some(old) = slot.tick.replace(tick) {
                self.recency.remove(&old);
                self.recency.insert(tick, id);
            } else {
                slot.tick = None;
            }
        }
    }

    /// Unlink a slot and hand it back with status Released
    pub(crate) fn release(&mut self, id: SlotId) -> Option<CachedFrame> {
        let mut slot = self.slots.get_mut(id)?.take()?;
        self.map.remove(&slot.frame_number);
        if let Some(tick) = slot.tick.take() {
            self.recency.remove(&tick);
        }
        if slot.status == SlotStatus::BeingGenerated {
            self.pinned -= 1;
        }
        slot.status = SlotStatus::Released;
        self.free_list.push(id);
        Some(slot)
    }

    /// Mark every Ready slot as stale
    pub(crate) fn mark_all_pending_delete(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.status == SlotStatus::Ready {
                slot.status = SlotStatus::PendingDelete;
            }
        }
    }

    /// Linked slots whose frame may not be served again
    pub(crate) fn pending_delete(&self) -> Vec<SlotId> {
        self.recency
            .values()
            .copied()
            .filter(|&id| matches!(self.get(id), Some(s) if s.status == SlotStatus::PendingDelete))
            .collect()
    }

    /// Least recently used evictable slot
    pub(crate) fn least_recent(&self) -> Option<SlotId> {
        self.recency.first_key_value().map(|(_, &id)| id)
    }

    /// Least recently used evictable slot farther than `radius` from `center`
    pub(crate) fn least_recent_outside(&self, center: usize, radius: usize) -> Option<SlotId> {
        self.recency.values().copied().find(|&id| {
            self.get(id)
                .is_some_and(|s| s.frame_number.abs_diff(center) > radius)
        })
    }

    /// Slot count, pinned slots included
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    /// Slots being generated
    pub(crate) fn pinned(&self) -> usize {
        self.pinned
    }

    /// Slots holding a servable frame
    pub(crate) fn ready(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.status == SlotStatus::Ready)
            .count()
    }

    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn alloc_slot(&mut self) -> Result<SlotId> {
        if let Some(id) = self.free_list.pop() {
            return Ok(id);
        }
        self.slots.try_reserve(1).map_err(|_| Error::ResourceExhausted {
            what: "cache slot",
            bytes: std::mem::size_of::<Option<CachedFrame>>(),
        })?;
        let id = self.slots.len();
        self.slots.push(None);
        Ok(id)
    }
}
