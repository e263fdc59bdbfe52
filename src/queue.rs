use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

/// Outcome of a worker's blocking dequeue attempt.
pub(crate) enum Dequeue<T> {
    /// Got an item; executing it consumes one unit of life budget.
    Item(T),
    /// Woke up to an already-drained queue; re-enter the wait without
    /// consuming life budget.
    Retry,
    /// The stop flag was observed; retire without a final queue check.
    Stopped,
}

/// Mutex-protected FIFO of pending work, with the single condition variable
/// all idle workers park on. The queue itself never blocks; waiting is the
/// worker's job via [`WorkQueue::pop_or_wait`].
pub(crate) struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    signal: Condvar,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // Handler panics are caught before they can poison this lock; a
        // poisoned guard here still holds a structurally valid VecDeque.
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends to the tail under the lock, unless the stop flag is already
    /// raised, in which case the item is handed back. The check shares the
    /// lock with [`WorkQueue::close`], so an accepted item is always visible
    /// to the shutdown drain (executed or cleared), never pushed behind it.
    pub fn push_unless_stopped(&self, item: T, stop: &AtomicBool) -> Result<(), T> {
        let mut q = self.lock();
        if stop.load(Ordering::SeqCst) {
            return Err(item);
        }
        q.push_back(item);
        Ok(())
    }

    /// Removes and returns the head, or reports empty.
    pub fn pop_if_any(&self) -> Option<T> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Wakes exactly one parked worker. Call after `push` when at least one
    /// worker is known to be waiting; an unconditional wake per submission
    /// only adds contention, and a wake with nobody parked is a wasted
    /// signal no thread will observe.
    pub fn wake_one(&self) {
        self.signal.notify_one();
    }

    pub fn wake_all(&self) {
        self.signal.notify_all();
    }

    /// Raises the stop flag while holding the queue lock, so a worker that
    /// has checked the flag and is about to park cannot miss the subsequent
    /// `wake_all` (it either sees the flag under the lock or is already
    /// parked when the wake arrives).
    pub fn close(&self, stop: &AtomicBool) {
        let _guard = self.lock();
        stop.store(true, Ordering::SeqCst);
    }

    /// Drops all pending entries, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut q = self.lock();
        let n = q.len();
        q.clear();
        n
    }

    /// Worker-side dequeue: pop the head if present, otherwise mark self
    /// waiting and park on the wake signal. After a wake the queue is
    /// re-checked under the same guard; a wake consumed by another worker
    /// (or a spurious one) yields [`Dequeue::Retry`].
    pub fn pop_or_wait(&self, waiting: &AtomicUsize, stop: &AtomicBool) -> Dequeue<T> {
        let mut q = self.lock();

        if stop.load(Ordering::SeqCst) {
            return Dequeue::Stopped;
        }
        if let Some(item) = q.pop_front() {
            return Dequeue::Item(item);
        }

        waiting.fetch_add(1, Ordering::Release);
        let mut q = self.signal.wait(q).unwrap_or_else(|e| e.into_inner());
        waiting.fetch_sub(1, Ordering::Release);

        if stop.load(Ordering::SeqCst) {
            return Dequeue::Stopped;
        }
        match q.pop_front() {
            Some(item) => Dequeue::Item(item),
            None => Dequeue::Retry,
        }
    }
}
