//! Frame cache
//!
//! Maps frame index to a published frame. A miss reserves a pinned slot,
//! releases the lock and runs the producer; the producer may therefore pull
//! other indices through the same cache. Asking for an index whose slot is
//! still being generated fails immediately: from the generating thread it is
//! a cycle, from any other thread it is a collision the caller may retry.

use std::sync::Arc;
use std::thread;

use framesynth::{CacheOption, CachePolicy, Error, Frame, RequesterId, Result};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::hints::HintState;
use crate::lru::{SlotId, SlotStatus, SlotTable};
use crate::stats::CacheStats;

struct Inner {
    slots: SlotTable,
    hints: HintState,
    epoch: u64,
    last_requested: Option<usize>,
}

/// Recency-ordered frame cache with hint-tunable capacity
pub struct FrameCache {
    inner: Mutex<Inner>,
    stats: Arc<CacheStats>,
}

/// Releases a reserved slot unless the frame was published
struct GenerationGuard<'a> {
    cache: &'a FrameCache,
    id: SlotId,
    armed: bool,
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.cache.inner.lock();
            if let Some(slot) = inner.slots.release(self.id) {
                debug!(frame = slot.frame_number(), "released slot of failed generation");
            }
        }
    }
}

impl FrameCache {
    /// Create an empty cache with default hints
    pub fn new(stats: Arc<CacheStats>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: SlotTable::new(),
                hints: HintState::new(),
                epoch: 0,
                last_requested: None,
            }),
            stats,
        }
    }

    /// Return frame `n`, calling `produce` only on a miss
    ///
    /// # Arguments
    /// * `n` - Frame index
    /// * `produce` - Builds the frame; runs without the cache lock held
    ///
    /// # Returns
    /// The cached or freshly produced frame. Fails with
    /// [`Error::CyclicGeneration`] when the calling thread is already
    /// generating `n`, or [`Error::GenerationInProgress`] when another
    /// thread is.
    pub fn get_frame<F>(&self, n: usize, produce: F) -> Result<Frame>
    where
        F: FnOnce(usize) -> Result<Frame>,
    {
        let (id, epoch) = {
            let mut inner = self.inner.lock();
            inner.last_requested = Some(n);

            if let Some(id) = inner.slots.lookup(n) {
                let epoch = inner.epoch;
                let (status, sequence, frame, generator) = match inner.slots.get(id) {
                    Some(slot) => (
                        slot.status(),
                        slot.sequence(),
                        slot.frame().cloned(),
                        slot.generator(),
                    ),
                    None => (SlotStatus::Released, 0, None, None),
                };
                match (status, frame) {
                    (SlotStatus::Ready, Some(frame)) if sequence == epoch => {
                        inner.slots.touch(id);
                        self.stats.record_hit();
                        trace!(frame = n, "frame cache hit");
                        return Ok(frame);
                    }
                    (SlotStatus::BeingGenerated, _) => {
                        if generator == Some(thread::current().id()) {
                            return Err(Error::CyclicGeneration(n));
                        }
                        debug!(frame = n, "frame is being generated by another thread");
                        return Err(Error::GenerationInProgress(n));
                    }
                    _ => {
                        inner.slots.release(id);
                        self.stats.record_eviction();
                        debug!(frame = n, "dropped stale slot");
                    }
                }
            }

            self.stats.record_miss();
            let id = inner.slots.reserve(n).inspect_err(|e| {
                warn!(frame = n, error = %e, "cannot reserve cache slot");
            })?;
            (id, inner.epoch)
        };

        let mut guard = GenerationGuard {
            cache: self,
            id,
            armed: true,
        };
        let frame = produce(n)?;
        guard.armed = false;
        drop(guard);

        let mut inner = self.inner.lock();
        let current = inner.epoch;
        inner.slots.publish(id, frame.clone(), epoch, current);
        self.stats.record_build();
        self.sweep(&mut inner);
        Ok(frame)
    }

    /// Apply a frame cache hint and re-run eviction against the new bounds
    ///
    /// # Arguments
    /// * `option` - Hint to set
    /// * `value` - Hint value, validated per option
    /// * `requester` - Consumer issuing the hint
    ///
    /// # Returns
    /// `Error::Configuration` for a rejected value; the hint state is unchanged
    pub fn configure(&self, option: CacheOption, value: i64, requester: RequesterId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.hints.apply(option, value, requester)?;
        debug!(
            option = %option,
            value,
            requester = %requester,
            max = inner.hints.effective_max(),
            "frame cache hint applied"
        );
        self.sweep(&mut inner);
        Ok(())
    }

    /// Start a new epoch; every cached frame becomes stale
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.slots.mark_all_pending_delete();
        self.sweep(&mut inner);
        debug!(epoch = inner.epoch, "frame cache invalidated");
    }

    /// Slots held, pinned ones included
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// True when no slot is held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots holding a servable frame
    pub fn ready_len(&self) -> usize {
        self.inner.lock().slots.ready()
    }

    /// Slots currently being generated
    pub fn pinned_len(&self) -> usize {
        self.inner.lock().slots.pinned()
    }

    /// Current generation sequence
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    /// Capacity the next sweep evicts down to
    pub fn effective_max(&self) -> usize {
        self.inner.lock().hints.effective_max()
    }

    /// Capacity the cache never evicts below
    pub fn effective_min(&self) -> usize {
        self.inner.lock().hints.effective_min()
    }

    /// Shared counters
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn sweep(&self, inner: &mut Inner) {
        for id in inner.slots.pending_delete() {
            if let Some(slot) = inner.slots.release(id) {
                self.stats.record_eviction();
                debug!(frame = slot.frame_number(), "evicted stale frame");
            }
        }

        let min = inner.hints.effective_min();
        let max = inner.hints.effective_max();
        while inner.slots.len() > max {
            let Some(id) = inner.slots.least_recent() else {
                break;
            };
            if let Some(slot) = inner.slots.release(id) {
                self.stats.record_eviction();
                debug!(frame = slot.frame_number(), len = inner.slots.len(), max, "evicted frame");
            }
        }

        if inner.hints.policy() != CachePolicy::Range {
            return;
        }
        let Some(center) = inner.last_requested else {
            return;
        };
        let radius = inner.hints.radius();
        while inner.slots.len() > min {
            let Some(id) = inner.slots.least_recent_outside(center, radius) else {
                break;
            };
            if let Some(slot) = inner.slots.release(id) {
                self.stats.record_eviction();
                debug!(frame = slot.frame_number(), center, radius, "evicted frame outside radius");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Barrier;

    use framesynth::{FrameBuilder, FrameGeometry, PlaneLayout};

    fn frame(n: usize) -> Result<Frame> {
        let geometry = FrameGeometry {
            main: PlaneLayout { offset: 0, pitch: 16, row_size: 16, height: 1 },
            chroma: None,
        };
        let mut builder = FrameBuilder::new(geometry)?;
        if let Some(row) = builder.row_mut(framesynth::Plane::Y, 0) {
            row.fill(n as u8);
        }
        Ok(builder.finish())
    }

    fn cache() -> FrameCache {
        FrameCache::new(Arc::new(CacheStats::new()))
    }

    #[test]
    fn test_hit_skips_producer() {
        let cache = cache();
        let calls = Cell::new(0);
        let produce = |n| {
            calls.set(calls.get() + 1);
            frame(n)
        };

        let a = cache.get_frame(3, produce).unwrap();
        let b = cache.get_frame(3, produce).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(a.shares_buffer(&b));
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_no_retention_regenerates() {
        let cache = cache();
        cache.configure(CacheOption::SetMinCapacity, 0, RequesterId::HOST).unwrap();
        cache.configure(CacheOption::SetMaxCapacity, 0, RequesterId::HOST).unwrap();
        let calls = Cell::new(0);
        let produce = |n| {
            calls.set(calls.get() + 1);
            frame(n)
        };

        let first = cache.get_frame(5, produce).unwrap();
        cache.get_frame(5, produce).unwrap();
        assert_eq!(calls.get(), 2);
        assert!(cache.is_empty());
        // evicted frame is still readable by its holder
        assert_eq!(first.row(framesynth::Plane::Y, 0).unwrap()[0], 5);
    }

    #[test]
    fn test_capacity_bound() {
        let cache = cache();
        cache.configure(CacheOption::SetMaxCapacity, 3, RequesterId(1)).unwrap();
        for n in 0..20 {
            cache.get_frame(n, frame).unwrap();
            assert!(cache.ready_len() <= 3);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions(), 17);
    }

    #[test]
    fn test_lru_keeps_recent() {
        let cache = cache();
        cache.configure(CacheOption::SetMaxCapacity, 2, RequesterId(1)).unwrap();
        cache.get_frame(0, frame).unwrap();
        cache.get_frame(1, frame).unwrap();
        cache.get_frame(0, frame).unwrap();
        cache.get_frame(2, frame).unwrap();

        let calls = Cell::new(0);
        cache
            .get_frame(0, |n| {
                calls.set(calls.get() + 1);
                frame(n)
            })
            .unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_failure_releases_slot() {
        let cache = cache();
        let err = cache
            .get_frame(4, |_| Err(Error::script("bad frame")))
            .unwrap_err();
        assert_eq!(err, Error::Script("bad frame".into()));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.pinned_len(), 0);
    }

    #[test]
    fn test_panic_releases_slot() {
        let cache = cache();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.get_frame(4, |_| -> Result<Frame> { panic!("producer crashed") })
        }));
        assert!(result.is_err());
        assert_eq!(cache.len(), 0);
        assert!(cache.get_frame(4, frame).is_ok());
    }

    #[test]
    fn test_recursive_producer() {
        let cache = cache();
        cache.configure(CacheOption::SetMaxCapacity, 1, RequesterId(1)).unwrap();

        let outer = cache
            .get_frame(10, |n| {
                cache.get_frame(n - 1, frame)?;
                assert_eq!(cache.pinned_len(), 1);
                assert!(cache.len() <= 2);
                frame(n)
            })
            .unwrap();
        assert_eq!(outer.row(framesynth::Plane::Y, 0).unwrap()[0], 10);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cycle_rejected() {
        let cache = cache();
        let err = cache
            .get_frame(2, |n| cache.get_frame(n, frame))
            .unwrap_err();
        assert_eq!(err, Error::CyclicGeneration(2));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_other_thread_collides() {
        let cache = cache();
        let entered = Barrier::new(2);
        let release = Barrier::new(2);

        let (collision, owned) = std::thread::scope(|s| {
            let owner = s.spawn(|| {
                cache.get_frame(6, |n| {
                    entered.wait();
                    release.wait();
                    frame(n)
                })
            });
            entered.wait();
            let collision = cache.get_frame(6, frame);
            release.wait();
            (collision, owner.join().unwrap())
        });

        let err = collision.unwrap_err();
        assert_eq!(err, Error::GenerationInProgress(6));
        assert!(!err.latches());
        assert_eq!(owned.unwrap().row(framesynth::Plane::Y, 0).unwrap()[0], 6);
        assert_eq!(cache.ready_len(), 1);
        assert_eq!(cache.pinned_len(), 0);
        assert_eq!(cache.stats().builds(), 1);
    }

    #[test]
    fn test_shrink_to_zero_while_generating() {
        let cache = cache();
        cache.get_frame(0, frame).unwrap();
        cache.get_frame(1, frame).unwrap();

        let out = cache
            .get_frame(2, |n| {
                cache.configure(CacheOption::SetMaxCapacity, 0, RequesterId(1))?;
                // ready frames go, the pinned slot stays
                assert_eq!(cache.pinned_len(), 1);
                assert_eq!(cache.len(), 1);
                frame(n)
            })
            .unwrap();

        assert_eq!(out.row(framesynth::Plane::Y, 0).unwrap()[0], 2);
        assert_eq!(cache.stats().builds(), 3);
        assert_eq!(cache.stats().evictions(), 3);
        assert_eq!(cache.pinned_len(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_drops_frames() {
        let cache = cache();
        cache.get_frame(1, frame).unwrap();
        cache.invalidate();
        assert_eq!(cache.epoch(), 1);
        assert!(cache.is_empty());

        let calls = Cell::new(0);
        cache
            .get_frame(1, |n| {
                calls.set(calls.get() + 1);
                frame(n)
            })
            .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_invalidate_during_generation() {
        let cache = cache();
        cache
            .get_frame(1, |n| {
                cache.invalidate();
                frame(n)
            })
            .unwrap();
        // produced under the old epoch, never served
        assert_eq!(cache.ready_len(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_range_policy() {
        let cache = cache();
        cache.configure(CacheOption::SetPolicy, CachePolicy::Range.code(), RequesterId(1)).unwrap();
        cache.configure(CacheOption::SetAccessRadius, 2, RequesterId(1)).unwrap();
        for n in [0, 1, 2, 10] {
            cache.get_frame(n, frame).unwrap();
        }
        assert_eq!(cache.len(), 1);

        cache.get_frame(11, frame).unwrap();
        cache.get_frame(12, frame).unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_range_policy_respects_min() {
        let cache = cache();
        cache.configure(CacheOption::SetPolicy, CachePolicy::Range.code(), RequesterId(1)).unwrap();
        cache.configure(CacheOption::SetMinCapacity, 3, RequesterId(1)).unwrap();
        for n in [0, 50, 100, 150] {
            cache.get_frame(n, frame).unwrap();
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_shrinking_max_evicts() {
        let cache = cache();
        for n in 0..5 {
            cache.get_frame(n, frame).unwrap();
        }
        cache.configure(CacheOption::SetMaxCapacity, 2, RequesterId(7)).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
