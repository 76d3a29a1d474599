use std::time::Duration;

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::trace;

use crate::playback::TickToken;

/// Owns at most one periodic tick task. Each task stamps its ticks with the
/// token it was started for; starting another task or cancelling aborts the
/// previous one, and so does dropping the scheduler.
pub struct TickScheduler {
    period: Duration,
    tx: UnboundedSender<TickToken>,
    running: Option<ScheduledTicks>,
}

struct ScheduledTicks {
    token: TickToken,
    task: JoinHandle<()>,
}

impl Drop for ScheduledTicks {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TickScheduler {
    pub fn new(period: Duration) -> (Self, UnboundedReceiver<TickToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            period: period.max(Duration::from_millis(1)),
            tx,
            running: None,
        };
        (scheduler, rx)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn active_token(&self) -> Option<TickToken> {
        self.running.as_ref().map(|running| running.token)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn start(&mut self, token: TickToken) {
        self.cancel();

        let tx = self.tx.clone();
        let period = self.period;
        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if tx.send(token).is_err() {
                    break;
                }
            }
        });
        trace!(index = token.index(), "tick task started");
        self.running = Some(ScheduledTicks { token, task });
    }

    pub fn cancel(&mut self) {
        if let Some(running) = self.running.take() {
            trace!(index = running.token.index(), "tick task cancelled");
        }
    }

    /// Makes the running task match `wanted`: keeps it if the token is
    /// unchanged, restarts it for a new token, stops it for `None`.
    pub fn sync(&mut self, wanted: Option<TickToken>) {
        if self.active_token() == wanted {
            return;
        }
        match wanted {
            Some(token) => self.start(token),
            None => self.cancel(),
        }
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
