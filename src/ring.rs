//! Bounded lock-free ring buffer.
//!
//! [`RingBuffer`] is a fixed-capacity FIFO with non-blocking
//! [`try_push`](RingBuffer::try_push) and [`try_pop`](RingBuffer::try_pop). It
//! backs the fixed [`WorkerPool`](crate::WorkerPool), where every caller is a
//! producer and every worker is a consumer, so it is safe for any number of
//! concurrent producers and consumers.
//!
//! # Layout
//!
//! ```text
//!            head (next pop)                tail (next push)
//!                 │                              │
//!   counters:  ...41                           ...44        (monotonic, never wrap)
//!   index:     counter & (capacity - 1)
//!
//!   slot:   [ seq | value ]  [ seq | value ]  [ seq | value ]  [ seq | value ]
//! ```
//!
//! Each slot carries a sequence number that tells producers and consumers
//! whose turn it is:
//!
//! - `seq == pos`: empty, ready for the producer claiming `pos`;
//! - `seq == pos + 1`: full, ready for the consumer claiming `pos`;
//! - after a pop, `seq` becomes `pos + capacity`, the next lap's `pos`.
//!
//! Positions are claimed with a compare-and-swap on `head`/`tail`, so two
//! producers can never write the same slot and two consumers can never read
//! the same value.
//!
//! FIFO order holds per producer/consumer pair; with several producers the
//! order between them is the order in which they claimed a position.

use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

const MIN_CAPACITY: usize = 2;

struct Slot<T> {
    seq: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity multi-producer multi-consumer queue.
///
/// # Example
///
/// ```
/// use cmdhint_core::RingBuffer;
///
/// let ring = RingBuffer::new(3); // rounded up to 4
/// assert_eq!(ring.capacity(), 4);
///
/// for i in 1..=4 {
///     assert!(ring.try_push(i).is_ok());
/// }
/// assert_eq!(ring.try_push(5), Err(5));
///
/// assert_eq!(ring.try_pop(), Some(1));
/// assert_eq!(ring.len(), 3);
/// ```
pub struct RingBuffer<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: a value is only ever accessed by the one thread that won the CAS for
// its position, and ownership moves through the queue, so `T: Send` suffices.
unsafe impl<T: Send> Send for RingBuffer<T> {}
// SAFETY: see above; shared access never hands out `&T`.
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Creates a buffer holding at least `capacity` items.
    ///
    /// Capacity is rounded up to the next power of two, with a floor of two:
    /// with a single slot a full `seq` (`pos + 1`) would read as empty for the
    /// next lap.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        let slots: Vec<_> = (0..capacity)
            .map(|i| Slot {
                seq: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of items currently queued.
    ///
    /// Exact when the buffer is quiescent, a snapshot otherwise.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.capacity())
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a push would currently fail.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Appends `value`, or hands it back if the buffer is full.
    ///
    /// A failed push has no side effects.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos) as isize;

            if diff == 0 {
                match self.tail.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: winning the CAS on `tail` gives this thread
                        // exclusive write access to the slot until `seq` is bumped.
                        unsafe { (*slot.value.get()).write(value) };
                        slot.seq.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // The slot still holds last lap's value: full.
                return Err(value);
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Removes the oldest item, or returns `None` if the buffer is empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos.wrapping_add(1)) as isize;

            if diff == 0 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: `seq == pos + 1` means the producer finished
                        // writing, and winning the CAS on `head` makes this the
                        // only reader. The slot is marked empty right after.
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.seq
                            .store(pos.wrapping_add(self.capacity()), Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
