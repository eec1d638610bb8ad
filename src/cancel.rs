//! Cancellation signal for the polling loop.
//!
//! The signal is a crossbeam channel that never carries a message: the
//! handle owns the only `Sender`, and cancelling drops it. Every token
//! (`Receiver` clone) then observes a disconnect, which lets blocking waits
//! and `select!` arms wake immediately.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Create a linked cancel handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = crossbeam_channel::bounded(0);
    (CancelHandle { tx: Some(tx) }, CancelToken { rx })
}

/// Owner side of the signal. Dropping it also cancels.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<Sender<()>>,
}

impl CancelHandle {
    pub fn cancel(&mut self) {
        self.tx.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_none()
    }
}

/// Observer side of the signal; cheap to clone.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    /// A token whose handle is already gone.
    pub fn cancelled() -> Self {
        let (_, token) = cancel_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the wait ended because of cancellation.
    pub fn wait(&self, duration: Duration) -> bool {
        !matches!(
            self.rx.recv_timeout(duration),
            Err(RecvTimeoutError::Timeout)
        )
    }

    /// Channel to use as a `select!` arm; it becomes ready on cancellation.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}
