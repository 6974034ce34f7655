//! Cancellation for blocking pool calls
//!
//! A pool call under sustained rate limiting would otherwise wait forever.
//! `Cancellation` bounds it with a deadline, an external signal, or both.
//! Deadlines use `tokio::time::Instant` so paused-clock tests control them.

use std::future::pending;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Sending half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Cancel every `Cancellation` cloned from this signal.
    pub fn cancel(&self) {
        // send_replace never fails, even with no receivers left
        self.0.send_replace(true);
    }
}

/// Receiving half: a deadline and/or a signal, both optional.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    deadline: Option<Instant>,
    signal: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// Never cancels.
    pub fn none() -> Self {
        Self::default()
    }

    /// Cancels once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            signal: None,
        }
    }

    /// Cancels `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Cancels once `rx` observes `true`.
    pub fn from_signal(rx: watch::Receiver<bool>) -> Self {
        Self {
            deadline: None,
            signal: Some(rx),
        }
    }

    /// A fresh signal pair.
    pub fn signal() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(tx), Self::from_signal(rx))
    }

    /// Add (or tighten) a deadline.
    pub fn and_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has passed or the signal fired.
    pub fn is_cancelled(&self) -> bool {
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        let signalled = self.signal.as_ref().is_some_and(|rx| *rx.borrow());
        expired || signalled
    }

    /// Resolves when cancelled; pends forever for `none()`.
    pub async fn cancelled(&self) {
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => pending::<()>().await,
            }
        };
        let signal = async {
            match &self.signal {
                Some(rx) => {
                    let mut rx = rx.clone();
                    loop {
                        if *rx.borrow_and_update() {
                            return;
                        }
                        // Sender gone without cancelling: never fires
                        if rx.changed().await.is_err() {
                            pending::<()>().await;
                        }
                    }
                }
                None => pending::<()>().await,
            }
        };
        tokio::select! {
            _ = deadline => {}
            _ = signal => {}
        }
    }
}
