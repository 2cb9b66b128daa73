use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_secs(1);

/// Display countdown for turn and vote timers: counts whole seconds down to
/// zero on a background tick. Restarting or stopping aborts the previous tick
/// task, and stopping twice is harmless.
#[derive(Default)]
pub struct Countdown {
    remaining: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, secs: u64) {
        self.start_then(secs, || {});
    }

    /// Like [`Countdown::start`], calling `on_expire` from the tick task once
    /// the count reaches zero. A tick already in flight when the countdown is
    /// restarted can still get there, so `on_expire` should re-check the
    /// current count.
    pub fn start_then<F>(&mut self, secs: u64, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.abort_task();
        // A tick already in flight on another worker only ever touches the
        // counter of the run it belongs to.
        self.remaining = Arc::new(AtomicU64::new(secs));
        if secs == 0 {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no runtime, countdown of {secs}s will not tick");
            return;
        };
        let remaining = Arc::clone(&self.remaining);
        self.task = Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(TICK);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                let left = remaining
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
                    .map_or(0, |prev| prev - 1);
                if left == 0 {
                    break;
                }
            }
            on_expire();
        }));
    }

    pub fn stop(&mut self) {
        self.abort_task();
        self.remaining = Arc::new(AtomicU64::new(0));
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.abort_task();
    }
}
