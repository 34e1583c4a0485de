use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Out-of-band signals delivered to a background loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// Terminate the loop instead of starting another iteration
    Exit,
}

/// Producer/consumer queue with a bounded wait on the consumer side.
///
/// `dequeue` parks for at most `wait` and then returns `None`, so a loop that
/// polls it stays responsive to shutdown without spinning. The queue lock is
/// private and never held while a caller holds any other lock.
pub struct EventQueue<T> {
    events: Mutex<VecDeque<T>>,
    available: Condvar,
    wait: Duration,
}

impl<T> EventQueue<T> {
    pub const DEFAULT_WAIT: Duration = Duration::from_millis(100);

    pub fn new() -> Self {
        Self::with_wait(Self::DEFAULT_WAIT)
    }

    pub fn with_wait(wait: Duration) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            wait,
        }
    }

    /// Appends an event and wakes one waiter.
    pub fn enqueue(&self, event: T) {
        self.events.lock().push_back(event);
        self.available.notify_one();
    }

    /// Pops the oldest event, waiting up to the configured timeout.
    pub fn dequeue(&self) -> Option<T> {
        self.dequeue_within(self.wait)
    }

    fn dequeue_within(&self, wait: Duration) -> Option<T> {
        let mut events = self.events.lock();
        if events.is_empty() && !wait.is_zero() {
            // Spurious wakeups just shorten the wait; callers poll again.
            let _ = self.available.wait_for(&mut events, wait);
        }
        events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue<LoopEvent> {
    /// Blocks for roughly `duration`, draining the queue in bounded waits.
    /// Returns `true` as soon as an exit event is seen.
    pub fn wait_for_exit(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(LoopEvent::Exit) = self.dequeue_within(remaining.min(self.wait)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }
}
