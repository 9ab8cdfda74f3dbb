// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellable one-shot timers.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A future scheduled to run once after a delay.
///
/// Dropping or replacing the handle cancels the task if it has not fired yet.
/// Once the delay has elapsed the future runs to completion regardless, so a
/// task may safely replace its own handle while running.
pub struct ScheduledTask {
    cancel: CancellationToken,
    deadline: Instant,
}

impl ScheduledTask {
    pub fn after<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + delay;
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep_until(deadline) => {}
            }
            task.await;
        });
        Self { cancel, deadline }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
