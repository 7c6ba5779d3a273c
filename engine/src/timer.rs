use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, trace, warn};

use crate::listener::MinesweeperListener;

#[derive(Default)]
struct TickGate {
    running: AtomicBool,
    generation: AtomicU64,
    // held while a tick is checked and delivered, and while stopping
    lock: Mutex<()>,
}

/// Calls [`MinesweeperListener::tick`] once per interval while a game runs.
///
/// Once [`GameTimer::stop`] returns no further tick reaches the listener,
/// even one whose interval had already elapsed.
pub struct GameTimer {
    interval: Duration,
    listener: Arc<dyn MinesweeperListener>,
    gate: Arc<TickGate>,
    task: Option<JoinHandle<()>>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

impl GameTimer {
    pub fn new(interval: Duration, listener: Arc<dyn MinesweeperListener>) -> Self {
        Self {
            interval,
            listener,
            gate: Arc::new(TickGate::default()),
            task: None,
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.gate.running.load(Ordering::SeqCst)
    }

    /// Starts ticking, first tick one interval from now. A timer only ever
    /// starts once.
    pub fn start(&mut self) {
        if self.started_at.is_some() {
            trace!("Timer already started");
            return;
        }
        self.started_at = Some(Instant::now());

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, game timer will not tick");
                return;
            }
        };

        let generation = self.gate.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.gate.running.store(true, Ordering::SeqCst);

        let gate = self.gate.clone();
        let listener = self.listener.clone();
        let period = self.interval;

        debug!("Starting game timer with a {:?} interval", period);
        self.task = Some(handle.spawn(async move {
            let mut ticks = time::interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;

                let _guard = gate.lock.lock().unwrap_or_else(PoisonError::into_inner);
                if !gate.running.load(Ordering::SeqCst)
                    || gate.generation.load(Ordering::SeqCst) != generation
                {
                    break;
                }
                listener.tick();
            }
        }));
    }

    /// Stops ticking. Safe to call repeatedly and before [`GameTimer::start`].
    pub fn stop(&mut self) {
        {
            let _guard = self.gate.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.gate.running.store(false, Ordering::SeqCst);
            self.gate.generation.fetch_add(1, Ordering::SeqCst);
        }

        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Game timer stopped");
        }
        if self.started_at.is_some() && self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
        }
    }

    /// Time between start and stop, or up to now while still running.
    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => stop.duration_since(start),
            (Some(start), None) => start.elapsed(),
            (None, _) => Duration::ZERO,
        }
    }
}

impl Drop for GameTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use minesweeper_common::protocol::GameEvent;
    use tokio::sync::mpsc;

    use super::*;

    fn drain_ticks(receiver: &mut mpsc::UnboundedReceiver<GameEvent>) -> usize {
        let mut ticks = 0;
        while let Ok(event) = receiver.try_recv() {
            assert_eq!(event, GameEvent::Tick);
            ticks += 1;
        }
        ticks
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_interval() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut timer = GameTimer::new(Duration::from_secs(1), Arc::new(sender));
        timer.start();

        time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(drain_ticks(&mut receiver), 3);
        assert!(timer.is_running());
        timer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_after_stop() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut timer = GameTimer::new(Duration::from_secs(1), Arc::new(sender));
        timer.start();

        time::sleep(Duration::from_millis(1500)).await;
        timer.stop();
        let before = drain_ticks(&mut receiver);
        assert_eq!(before, 1);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(drain_ticks(&mut receiver), 0);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_freezes_at_stop() {
        let mut timer = GameTimer::new(Duration::from_secs(1), Arc::new(crate::NoopListener));
        assert_eq!(timer.elapsed(), Duration::ZERO);

        timer.start();
        time::sleep(Duration::from_secs(4)).await;
        timer.stop();
        time::sleep(Duration::from_secs(10)).await;

        assert_eq!(timer.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_stops_it() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut timer = GameTimer::new(Duration::from_secs(1), Arc::new(sender));
        timer.start();
        drop(timer);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(drain_ticks(&mut receiver), 0);
    }

    #[test]
    fn start_without_runtime_is_harmless() {
        let mut timer = GameTimer::new(Duration::from_secs(1), Arc::new(crate::NoopListener));
        timer.start();
        assert!(timer.is_started());
        assert!(!timer.is_running());
        timer.stop();
    }
}
