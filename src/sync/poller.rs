use log::debug;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Start/stop surface shared by every background synchronizer, so a push
/// based implementation could replace polling without touching callers.
pub trait Synchronizer: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// Returned by a tick to keep or end the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

struct PollTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Drop for PollTask {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}

/// Owns at most one recurring timer. Starting again replaces the old timer.
pub struct Poller {
    name: &'static str,
    task: Mutex<Option<PollTask>>,
}

impl Poller {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            task: Mutex::new(None),
        }
    }

    /// Runs `tick` every `period`. With `immediate` the first tick fires right
    /// away, otherwise after one period. Ticks never overlap.
    pub fn start<F, Fut>(&self, period: Duration, immediate: bool, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PollControl> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let name = self.name;
        let handle = tokio::spawn(async move {
            let first = if immediate {
                Instant::now()
            } else {
                Instant::now() + period
            };
            let mut interval = time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if tick().await == PollControl::Stop {
                            debug!("{} poller stopped by tick", name);
                            break;
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        let previous = match self.task.lock() {
            Ok(mut slot) => slot.replace(PollTask {
                shutdown_tx,
                handle,
            }),
            Err(_) => None,
        };
        if previous.is_some() {
            debug!("{} poller restarted", self.name);
        }
        drop(previous);
    }

    pub fn stop(&self) {
        let previous = self.task.lock().ok().and_then(|mut slot| slot.take());
        if previous.is_some() {
            debug!("{} poller stopped", self.name);
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|t| !t.handle.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
