//! Interrupt-to-task wake primitive.
//!
//! A [`Notifier`] lets an interrupt-like context (a GPIO edge callback, a
//! timer thread) wake one waiting task without blocking. Pending wake-ups
//! coalesce: any number of `notify()` calls before the task runs results in a
//! single wake.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// Signalling half, cheap to clone into callbacks.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: Sender<()>,
}

/// Waiting half, owned by the task.
#[derive(Debug)]
pub struct NotifyWait {
    rx: Receiver<()>,
}

/// Create a connected notifier / waiter pair.
pub fn notification() -> (Notifier, NotifyWait) {
    let (tx, rx) = bounded(1);
    (Notifier { tx }, NotifyWait { rx })
}

impl Notifier {
    /// Mark the waiter runnable. Never blocks.
    ///
    /// Returns false only when the waiting half is gone.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

impl NotifyWait {
    /// Block until notified. Returns false if every notifier was dropped
    /// without a pending wake.
    pub fn wait(&self) -> bool {
        self.rx.recv().is_ok()
    }

    /// Block until notified or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Consume a pending wake without blocking.
    pub fn take(&self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_notifications_coalesce() {
        let (notifier, wait) = notification();
        for _ in 0..5 {
            assert!(notifier.notify());
        }
        assert!(wait.take());
        assert!(!wait.take());
    }

    #[test]
    fn test_wait_wakes_from_other_thread() {
        let (notifier, wait) = notification();
        let isr = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            notifier.notify();
        });
        assert!(wait.wait_timeout(Duration::from_secs(5)));
        isr.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_without_notify() {
        let (_notifier, wait) = notification();
        assert!(!wait.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_dropped_notifier() {
        let (notifier, wait) = notification();
        drop(notifier);
        assert!(!wait.wait());

        let (notifier, wait) = notification();
        drop(wait);
        assert!(!notifier.notify());
    }
}
