//! Bounded MPMC queue with per-slot sequence numbers.
//!
//! Each slot carries a generation marker alongside its payload. At epoch `k`
//! a slot at `index` is empty when its sequence reads `k·N + index` and
//! filled when it reads `k·N + index + 1`; popping reopens it for the next
//! epoch by storing `k·N + index + N`. Producers and consumers claim
//! positions by CAS on their cursor, so no two threads ever touch the same
//! slot in the same epoch.
//!
//! # Memory Ordering
//!
//! The sequence word is the publication point: the producer's release store
//! of `pos + 1` makes the payload write visible to the consumer whose
//! acquire load observes it. Cursor CAS operations stay relaxed because they
//! only hand out positions, never data.
//!
//! # Progress
//!
//! `try_push`/`try_pop` never block. A thread may retry its claim under
//! contention, but some thread always completes, so the queue is lock-free
//! as a system.

use crate::ring::RingConfig;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One ring slot: generation marker plus payload.
///
/// Aligned to a cache line so neighbouring slots never false-share. The
/// payload is `MaybeUninit` because slots are empty until their first epoch.
#[repr(align(64))]
struct Slot<T> {
    sequence: AtomicUsize,
    data: UnsafeCell<MaybeUninit<T>>,
}

/// Cursor on its own cache line; `head` and `tail` are written by different
/// thread groups and must not share one.
#[repr(align(64))]
struct Cursor(AtomicUsize);

/// Bounded multi-producer multi-consumer FIFO queue.
///
/// Capacity is fixed at construction and uses all `N` slots: full and empty
/// are distinguished by the slot sequence protocol, not by cursor equality,
/// so no slot is reserved.
///
/// # Type Parameter
/// - `T`: element type. Must be `Copy` so payloads move through the ring as
///   plain bitwise copies with nothing to drop in abandoned slots.
///
/// # Epoch Arithmetic
/// Claim checks compare `sequence` and cursor as `isize`; a single run must
/// therefore stay below `isize::MAX` operations, which a process replaying
/// market data cannot reach.
pub struct MpmcRing<T: Copy> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    head: Cursor,
    tail: Cursor,
}

// SAFETY: payloads are transferred by value under the slot protocol. The
// claiming producer has exclusive write access until its release store, and
// the claiming consumer exclusive read access until its own. `T: Send` is
// required because values cross threads; `&MpmcRing` hands out no `&T`.
unsafe impl<T: Copy + Send> Send for MpmcRing<T> {}
unsafe impl<T: Copy + Send> Sync for MpmcRing<T> {}

impl<T: Copy> MpmcRing<T> {
    /// Creates an empty ring. Every slot's sequence starts at its own index
    /// (epoch 0, empty); both cursors start at 0.
    pub fn new(cfg: RingConfig) -> Self {
        let slots: Box<[Slot<T>]> = (0..cfg.capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                data: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            slots,
            mask: cfg.mask(),
            head: Cursor(AtomicUsize::new(0)),
            tail: Cursor(AtomicUsize::new(0)),
        }
    }

    /// Attempts to push an item (multi-producer safe).
    ///
    /// Returns `false` if the ring is full. Full is an expected operating
    /// condition; callers count it, they do not treat it as an error.
    #[inline]
    pub fn try_push(&self, value: T) -> bool {
        let mut pos = self.head.0.load(Ordering::Relaxed);

        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            if diff == 0 {
                // Slot is empty at this epoch: try to claim the position.
                match self.head.0.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: winning the CAS gives this thread exclusive
                        // ownership of the slot for this epoch. No consumer
                        // reads it until the release store below publishes it.
                        unsafe { (*slot.data.get()).write(value) };
                        slot.sequence
                            .store(pos.wrapping_add(1), Ordering::Release);
                        return true;
                    }
                    // Lost the race; retry at the position the CAS observed.
                    Err(observed) => pos = observed,
                }
            } else if diff < 0 {
                // Sequence still belongs to the previous epoch: ring is full.
                return false;
            } else {
                // Another producer claimed this position first.
                pos = self.head.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Attempts to pop an item (multi-consumer safe).
    ///
    /// Returns `None` if the ring is empty.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let mut pos = self.tail.0.load(Ordering::Relaxed);

        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos.wrapping_add(1) as isize;

            if diff == 0 {
                // Slot holds data for this epoch: try to claim the position.
                match self.tail.0.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: winning the CAS gives this thread exclusive
                        // read access; the producer's release store already
                        // published the payload, paired with the acquire load
                        // of `sequence` above.
                        let value = unsafe { (*slot.data.get()).assume_init_read() };
                        // Reopen the slot for the next epoch.
                        slot.sequence
                            .store(pos.wrapping_add(self.slots.len()), Ordering::Release);
                        return Some(value);
                    }
                    Err(observed) => pos = observed,
                }
            } else if diff < 0 {
                // Producer has not filled this position yet: ring is empty.
                return None;
            } else {
                // Another consumer claimed this position first.
                pos = self.tail.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Number of slots. All of them are usable; the sequence protocol does
    /// not reserve one to tell full from empty.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Approximate number of items currently queued.
    ///
    /// The two cursors are loaded independently with relaxed ordering, so
    /// the result is observation-only and may lag concurrent pushes/pops.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Relaxed);
        head.saturating_sub(tail)
    }

    /// Approximate fill fraction in `[0.0, 1.0]`. Observation-only.
    #[inline]
    pub fn utilization(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64
    }

    /// Observation-only, like [`len`](Self::len).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
