//! Process-wide cancellation signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Broadcast stop flag with an interruptible sleep.
pub struct Shutdown {
    triggered: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

impl Shutdown {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            lock: Mutex::new(()),
            signal: Condvar::new(),
        }
    }

    /// Raise the signal and wake every sleeper.
    pub fn trigger(&self) {
        let _guard = self.lock.lock();
        self.triggered.store(true, Ordering::SeqCst);
        self.signal.notify_all();
    }

    /// Whether shutdown has begun.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`. Returns `false` if shutdown cut the sleep short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut guard = self.lock.lock();
        let Some(deadline) = Instant::now().checked_add(duration) else {
            // No representable deadline: only shutdown ends the wait.
            while !self.is_triggered() {
                self.signal.wait(&mut guard);
            }
            return false;
        };
        loop {
            if self.is_triggered() {
                return false;
            }
            if Instant::now() >= deadline {
                return true;
            }
            // Spurious wake-ups fall through to the checks above.
            self.signal.wait_until(&mut guard, deadline);
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn unbounded_sleep_ends_on_trigger_without_panicking() {
        let shutdown = Arc::new(Shutdown::new());
        let sleeper = Arc::clone(&shutdown);
        let handle = thread::spawn(move || sleeper.sleep(Duration::MAX));
        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();
        assert!(!handle.join().expect("sleeper panicked"));
    }

    #[test]
    fn sleep_runs_to_completion_without_trigger() {
        let shutdown = Shutdown::new();
        let start = Instant::now();
        assert!(shutdown.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn trigger_interrupts_long_sleep() {
        let shutdown = Arc::new(Shutdown::new());
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let sleeper = Arc::clone(&shutdown);
        let handle = thread::spawn(move || {
            ready_tx.send(()).expect("ready");
            let completed = sleeper.sleep(Duration::from_secs(30));
            done_tx.send(completed).expect("done");
        });

        ready_rx.recv_timeout(Duration::from_secs(1)).expect("ready");
        shutdown.trigger();
        let completed = done_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("sleeper should wake promptly");
        assert!(!completed);
        handle.join().expect("sleeper panicked");
    }

    #[test]
    fn sleep_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(!shutdown.sleep(Duration::from_secs(30)));
    }
}
