//! Stop coordination between the scheduler loop and its callers.
//!
//! The loop publishes its [`LoopState`] on a watch channel; callers request a
//! stop through a cancellation token. Both primitives are idempotent, so any
//! number of callers may request a stop, in any order, and all of them are
//! released by the same "exited" transition.

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, `start` not called yet.
    Idle,
    Running,
    /// Stop observed; the exit sequence is persisting status.
    Stopping,
    /// Exit sequence finished. Terminal.
    Exited,
}

#[derive(Debug)]
pub struct Shutdown {
    stop: CancellationToken,
    state: watch::Sender<LoopState>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            stop: CancellationToken::new(),
            state,
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// `Idle -> Running`. Any other starting state is rejected.
    pub fn begin(&self) -> Result<(), DaemonError> {
        let mut began = false;
        self.state.send_if_modified(|state| {
            if *state == LoopState::Idle {
                *state = LoopState::Running;
                began = true;
            }
            began
        });
        if began {
            Ok(())
        } else {
            Err(DaemonError::AlreadyStarted)
        }
    }

    /// `Running -> Stopping`. No-op in any other state.
    pub fn stopping(&self) {
        self.state.send_if_modified(|state| {
            if *state == LoopState::Running {
                *state = LoopState::Stopping;
                return true;
            }
            false
        });
    }

    /// Publish the terminal state, releasing every waiter.
    pub fn finish(&self) {
        self.state.send_replace(LoopState::Exited);
    }

    /// Ask the loop to stop at its next wait point.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    pub fn stop_requested(&self) -> WaitForCancellationFuture<'_> {
        self.stop.cancelled()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub async fn wait_exited(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|state| *state == LoopState::Exited).await;
    }

    /// Request a stop and wait until the loop has fully exited.
    ///
    /// Returns `NotRunning` when the loop was never started; returns `Ok`
    /// immediately once the loop has already exited.
    pub async fn stop(&self) -> Result<(), DaemonError> {
        match self.state() {
            LoopState::Idle => Err(DaemonError::NotRunning),
            LoopState::Exited => Ok(()),
            LoopState::Running | LoopState::Stopping => {
                self.request_stop();
                self.wait_exited().await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn begin_only_succeeds_once() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.state(), LoopState::Idle);
        shutdown.begin().expect("first begin");
        assert_eq!(shutdown.state(), LoopState::Running);
        assert!(matches!(shutdown.begin(), Err(DaemonError::AlreadyStarted)));

        shutdown.finish();
        assert!(matches!(shutdown.begin(), Err(DaemonError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn stop_before_begin_is_not_running() {
        let shutdown = Shutdown::new();
        assert!(matches!(shutdown.stop().await, Err(DaemonError::NotRunning)));
        assert!(!shutdown.is_stop_requested());
    }

    #[tokio::test]
    async fn concurrent_stops_all_return_after_exit() {
        let shutdown = Arc::new(Shutdown::new());
        shutdown.begin().expect("begin");

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let shutdown = shutdown.clone();
                tokio::spawn(async move { shutdown.stop().await })
            })
            .collect();

        shutdown.stop_requested().await;
        shutdown.stopping();
        assert_eq!(shutdown.state(), LoopState::Stopping);
        shutdown.finish();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("stop returned in time")
                .expect("join")
                .expect("stop ok");
        }
    }

    #[tokio::test]
    async fn stop_after_exit_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.begin().expect("begin");
        shutdown.finish();
        shutdown.stop().await.expect("first stop");
        shutdown.stop().await.expect("second stop");
    }

    #[test]
    fn stopping_is_ignored_unless_running() {
        let shutdown = Shutdown::new();
        shutdown.stopping();
        assert_eq!(shutdown.state(), LoopState::Idle);
    }
}
