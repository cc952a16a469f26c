//! One-shot shutdown signal shared by the long-running loops.
//!
//! The signal is a crossbeam channel that never carries a message: firing the
//! trigger drops the only sender, which wakes every waiting receiver with
//! `Disconnected`. Loops either check `ShutdownSignal::is_fired` between blocking
//! reads or sleep through `ShutdownSignal::wait`, which returns early when fired.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fires the shutdown signal. Cloneable so it can move into a Ctrl+C handler.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

/// Observes the shutdown signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

/// Create a connected trigger/signal pair.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = bounded::<()>(0);
    (
        ShutdownTrigger {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        ShutdownSignal { rx },
    )
}

impl ShutdownTrigger {
    /// Fire the signal. Idempotent.
    pub fn fire(&self) {
        let mut guard = self
            .tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.take();
    }
}

impl ShutdownSignal {
    /// `true` once the trigger has fired.
    pub fn is_fired(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `timeout` unless the signal fires first. Returns `true` when fired.
    pub fn wait(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }

    /// Block until the signal fires.
    pub fn wait_forever(&self) {
        let _ = self.rx.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_times_out_while_not_fired() {
        let (_trigger, signal) = shutdown_channel();
        assert!(!signal.is_fired());
        assert!(!signal.wait(Duration::from_millis(10)));
    }

    #[test]
    fn fire_wakes_waiters_early() {
        let (trigger, signal) = shutdown_channel();
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let fired = signal.wait(Duration::from_secs(30));
                (fired, started.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        trigger.fire();
        trigger.fire();

        let (fired, elapsed) = waiter.join().unwrap();
        assert!(fired);
        assert!(elapsed < Duration::from_secs(5));
        assert!(signal.is_fired());
        signal.wait_forever();
    }
}
