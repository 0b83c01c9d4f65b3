use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Whether the timer should keep going after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerControl {
    Continue,
    Stop,
}

/// Countdown driver for one session
///
/// Ticks once per `period`, the first one a full period after `start`. A timer
/// is never restarted; each session gets a fresh one.
///
/// Cancellation is a signal, not `JoinHandle::abort`: the tick callback may be
/// the one cancelling (timer expiry triggers a stop that cancels the timer),
/// and aborting would kill that stop halfway.
pub struct SessionTimer {
    cancel_tx: watch::Sender<bool>,
    ticks: Arc<AtomicU32>,
}

impl SessionTimer {
    pub fn start<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TimerControl> + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU32::new(0));
        let task_ticks = Arc::clone(&ticks);

        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    // Err: the timer was dropped
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow_and_update() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if *cancel_rx.borrow() {
                            break;
                        }
                        task_ticks.fetch_add(1, Ordering::SeqCst);
                        if on_tick().await == TimerControl::Stop {
                            break;
                        }
                    }
                }
            }

            debug!("Session timer stopped after {} ticks", task_ticks.load(Ordering::SeqCst));
        });

        Self { cancel_tx, ticks }
    }

    /// Stop ticking; safe to call any number of times
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Ticks delivered so far
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
