use std::collections::VecDeque;
use std::time::Duration;
use parking_lot::{Condvar, Mutex};

/// Outcome of a bounded-wait pop
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    Item(T),
    /// Nothing arrived within the wait; the caller should re-check its flags
    Timeout,
    /// Closed and empty, no item will ever arrive
    Closed,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Blocking FIFO shared between the driver and one worker
pub struct JobQueue<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        JobQueue {
            state: Mutex::new(State { items: VecDeque::new(), closed: false }),
            ready: Condvar::new(),
        }
    }

    /// Append an item; returns it back if the queue is already closed
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Take the oldest item, waiting at most `wait` for one to show up
    pub fn pop_timeout(&self, wait: Duration) -> Pop<T> {
        let mut state = self.state.lock();
        if state.items.is_empty() && !state.closed {
            // Spurious wakeups just end this cycle early
            self.ready.wait_for(&mut state, wait);
        }
        match state.items.pop_front() {
            Some(item) => Pop::Item(item),
            None if state.closed => Pop::Closed,
            None => Pop::Timeout,
        }
    }

    /// No more pushes; remaining items are still handed out
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    /// Close and discard everything still queued, under the lock, before waking waiters
    pub fn drain_and_close(&self) -> Vec<T> {
        let drained: Vec<T> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.items.drain(..).collect()
        };
        self.ready.notify_all();
        drained
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
