use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use crate::policy::RefreshPolicy;

enum Ctrl {
    LiveCount(usize),
    Stop,
}

/// Drives the polling cadence independently of any UI lifecycle. The
/// owning context starts it with a policy and a tick callback, feeds it
/// the current live count after every snapshot, and stops it (or lets it
/// drop) on teardown; no dangling timer either way.
///
/// A live-count change wakes the timer thread immediately, so the cadence
/// retunes at once instead of waiting out the previous interval.
pub struct RefreshScheduler {
    ctrl: Sender<Ctrl>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn start(policy: RefreshPolicy, mut on_tick: impl FnMut() + Send + 'static) -> Self {
        let (ctrl, ctrl_rx) = mpsc::channel::<Ctrl>();
        let handle = thread::spawn(move || {
            let mut live_count = 0usize;
            loop {
                let interval = policy.interval_for(live_count);
                match ctrl_rx.recv_timeout(interval) {
                    Ok(Ctrl::LiveCount(count)) => {
                        live_count = count;
                    }
                    Ok(Ctrl::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => on_tick(),
                }
            }
        });
        Self {
            ctrl,
            handle: Some(handle),
        }
    }

    pub fn update_live_count(&self, live_count: usize) {
        let _ = self.ctrl.send(Ctrl::LiveCount(live_count));
    }

    pub fn stop(&mut self) {
        let _ = self.ctrl.send(Ctrl::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_policy() -> RefreshPolicy {
        RefreshPolicy::new(
            Duration::from_millis(500),
            vec![(1, Duration::from_millis(10))],
        )
        .expect("valid test policy")
    }

    #[test]
    fn ticks_fire_at_the_live_cadence() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let mut scheduler = RefreshScheduler::start(fast_policy(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.update_live_count(3);
        std::thread::sleep(Duration::from_millis(120));
        scheduler.stop();
        assert!(ticks.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn idle_cadence_stays_quiet() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let mut scheduler = RefreshScheduler::start(fast_policy(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(80));
        scheduler.stop();
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_is_idempotent_and_drop_safe() {
        let mut scheduler = RefreshScheduler::start(fast_policy(), || {});
        scheduler.stop();
        scheduler.stop();
        drop(scheduler);
    }
}
