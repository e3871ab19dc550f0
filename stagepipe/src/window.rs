//! Fixed-capacity ring of pending results.
//!
//! Slots are written at `write` and drained from `read`, both modulo the
//! capacity. `read` always trails `write` by the number of outstanding slots,
//! so draining returns slots in exactly the order they were written.

use stagepipe_shared::errors::{StageError, StageResult};

pub(crate) struct SlidingWindow<S> {
    slots: Vec<Option<S>>,
    read: usize,
    write: usize,
    outstanding: usize,
}

impl<S> SlidingWindow<S> {
    /// Create a window with `capacity` slots (at least one).
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            read: 0,
            write: 0,
            outstanding: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.outstanding
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.outstanding == 0
    }

    /// True once `write` has wrapped around onto `read`.
    pub(crate) fn is_full(&self) -> bool {
        self.outstanding == self.slots.len()
    }

    /// Store `slot` at the write cursor and advance it.
    pub(crate) fn push(&mut self, slot: S) -> StageResult<()> {
        if self.is_full() {
            return Err(StageError::Internal(format!(
                "sliding window overflow (capacity {})",
                self.capacity()
            )));
        }

        self.slots[self.write] = Some(slot);
        self.write = (self.write + 1) % self.slots.len();
        self.outstanding += 1;
        Ok(())
    }

    /// Take the slot at the read cursor and advance it.
    pub(crate) fn pop(&mut self) -> Option<S> {
        if self.is_empty() {
            return None;
        }

        let slot = self.slots[self.read].take();
        self.read = (self.read + 1) % self.slots.len();
        self.outstanding -= 1;
        slot
    }

    /// Drop every outstanding slot, returning how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.outstanding;
        for slot in &mut self.slots {
            *slot = None;
        }
        self.read = self.write;
        self.outstanding = 0;
        dropped
    }

    #[cfg(test)]
    fn cursors(&self) -> (usize, usize) {
        (self.read, self.write)
    }
}
