//! Talk-time ticker
//!
//! Counts whole periods while a call is connected and publishes each new
//! count as a `DurationChanged` event.

use crate::domain::call::event::CallEvent;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Default)]
struct TickState {
    /// Bumped on every start/stop; a tick from an older run is dropped
    generation: u64,
    seconds: u64,
    /// Present only while running; taken on stop so the sender is released
    /// before `stop` returns
    events: Option<broadcast::Sender<CallEvent>>,
}

pub struct DurationTicker {
    period: Duration,
    state: Arc<Mutex<TickState>>,
    task: Option<JoinHandle<()>>,
}

impl DurationTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            state: Arc::new(Mutex::new(TickState::default())),
            task: None,
        }
    }

    /// Reset the counter to zero and start ticking. Restarts if running.
    pub fn start(&mut self, events: broadcast::Sender<CallEvent>) {
        self.run(events, 0);
    }

    /// Continue counting from `seconds`, e.g. after a stop that had to be
    /// undone. The next event carries `seconds + 1`.
    pub fn resume(&mut self, events: broadcast::Sender<CallEvent>, seconds: u64) {
        self.run(events, seconds);
    }

    fn run(&mut self, events: broadcast::Sender<CallEvent>, from: u64) {
        self.stop();

        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.seconds = from;
            state.events = Some(events);
            state.generation
        };

        let state = self.state.clone();
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                // Publish under the lock so stop() cannot return between the
                // check and the send.
                let mut guard = lock(&state);
                if guard.generation != generation {
                    break;
                }
                let Some(events) = guard.events.clone() else {
                    break;
                };
                guard.seconds += 1;
                let _ = events.send(CallEvent::duration_changed(guard.seconds));
            }
        }));

        debug!("Duration ticker started at {}s (generation {})", from, generation);
    }

    /// Stop ticking and return the final count. Once this returns no further
    /// event is published and the ticker no longer holds the event sender.
    /// Safe to call when not running.
    pub fn stop(&mut self) -> u64 {
        let seconds = {
            let mut state = lock(&self.state);
            if state.events.take().is_some() {
                state.generation += 1;
            }
            state.seconds
        };

        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Duration ticker stopped at {}s", seconds);
        }

        seconds
    }

    /// Stop and zero the counter
    pub fn reset(&mut self) {
        self.stop();
        lock(&self.state).seconds = 0;
    }

    pub fn elapsed(&self) -> u64 {
        lock(&self.state).seconds
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).events.is_some()
    }
}

impl Drop for DurationTicker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock(state: &Mutex<TickState>) -> MutexGuard<'_, TickState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}
