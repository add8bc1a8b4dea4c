//! User idleness.
//!
//! The tracker turns idle once `timeout` passes without it being woken. Activity
//! only matters while idle and visible: it wakes the tracker and restarts the timer.
//! Hiding the window makes it idle right away and activity is ignored until it is
//! shown again; showing it counts as activity. Activity reports closer than
//! [`ACTIVITY_THROTTLE`] to the previous one are ignored.

use crate::config::ClientConfig;
use log::debug;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

pub const ACTIVITY_THROTTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Activity,
    Hidden,
    Visible,
}

pub struct IdleTracker {
    signals: mpsc::UnboundedSender<Signal>,
    idle: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl IdleTracker {
    /// A tracker using the configured idle timeout.
    pub fn from_config(config: &ClientConfig, idle_on_start: bool) -> Self {
        Self::spawn(config.idle_timeout, idle_on_start)
    }

    pub fn spawn(timeout: Duration, idle_on_start: bool) -> Self {
        let (signals, rx) = mpsc::unbounded_channel();
        let (tx, idle) = watch::channel(idle_on_start);
        let task = tokio::spawn(run(timeout, rx, tx));
        Self {
            signals,
            idle,
            task,
        }
    }

    /// Mouse, keyboard or focus activity.
    pub fn activity(&self) {
        let _ = self.signals.send(Signal::Activity);
    }

    /// The window was hidden or lost focus.
    pub fn hidden(&self) {
        let _ = self.signals.send(Signal::Hidden);
    }

    pub fn visible(&self) {
        let _ = self.signals.send(Signal::Visible);
    }

    pub fn is_idle(&self) -> bool {
        *self.idle.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.idle.clone()
    }
}

impl Drop for IdleTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    timeout: Duration,
    mut signals: mpsc::UnboundedReceiver<Signal>,
    idle: watch::Sender<bool>,
) {
    let mut deadline = Instant::now() + timeout;
    let mut last_activity: Option<Instant> = None;
    let mut visible = true;

    loop {
        let is_idle = *idle.borrow();
        tokio::select! {
            _ = sleep_until(deadline), if !is_idle => {
                debug!(target: "Idle", "No activity for {timeout:?}, going idle");
                idle.send_replace(true);
            }
            signal = signals.recv() => match signal {
                None => return,
                Some(Signal::Hidden) => {
                    visible = false;
                    idle.send_replace(true);
                }
                Some(Signal::Activity) if !visible => {}
                Some(Signal::Activity | Signal::Visible) => {
                    visible = true;
                    let now = Instant::now();
                    if last_activity.is_some_and(|at| now.duration_since(at) < ACTIVITY_THROTTLE) {
                        continue;
                    }
                    last_activity = Some(now);
                    if is_idle {
                        idle.send_replace(false);
                        deadline = now + timeout;
                    }
                }
            },
        }
    }
}
