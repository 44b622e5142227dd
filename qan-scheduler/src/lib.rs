//! The per-instance periodic worker (C8): one cooperatively-scheduled task driving a
//! `TickPipeline` through fetch -> delta -> build -> sink, with cancellation, a per-tick
//! deadline, and adaptive rearm when the pipeline's interval changes mid-run.
//!
//! Grounded on this codebase's own periodic-reporter pattern: a `tokio::spawn`'d loop that
//! awaits the next of a timer or a stop signal, nothing fancier than `tokio::select!`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

const TICK_DEADLINE: Duration = Duration::from_secs(30);

/// One instance's state machine (§4.8). `Stopped` is terminal; a stopped scheduler is not
/// restarted, a new one is constructed instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl SchedulerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SchedulerState::Idle,
            1 => SchedulerState::Running,
            2 => SchedulerState::Stopping,
            _ => SchedulerState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SchedulerState::Idle => 0,
            SchedulerState::Running => 1,
            SchedulerState::Stopping => 2,
            SchedulerState::Stopped => 3,
        }
    }
}

/// The one thing a Scheduler depends on: run a tick end to end and report back how long
/// to wait before the next one. Implemented once per family (`MysqlPipeline`,
/// `PostgresPipeline`) so the state machine, cancellation, and deadline handling below are
/// shared without forcing MySQL and Postgres into one generic row hierarchy.
#[async_trait]
pub trait TickPipeline: Send {
    fn instance_id(&self) -> &str;

    /// Runs fetch -> delta -> build -> dispatch (and, for adaptive MySQL, the load probe
    /// and governor update) once, and returns the interval to wait before the next tick.
    async fn tick(&mut self) -> Duration;

    /// The interval to fall back to if a tick is cancelled by the deadline before it can
    /// report a fresh one.
    fn current_interval(&self) -> Duration;

    /// Releases owned resources (DB handles). Called exactly once, after the loop exits.
    async fn close(&mut self);
}

/// A running (or recently stopped) scheduler. Dropping this without calling `stop` leaves
/// the worker task running detached; callers that need a clean shutdown should `stop().await`.
pub struct SchedulerHandle {
    state: Arc<AtomicU8>,
    stop_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Signals the worker to stop, waits for the in-flight tick (if any) to finish or hit
    /// its deadline, and for the pipeline to close its resources.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}

/// Spawns the worker task for one `TickPipeline`. Performs an immediate first tick, then
/// loops awaiting the next of: the rearmed timer, or the stop signal (§4.8's state
/// machine collapsed into a single `tokio::select!`, since both events are plain
/// awaitables and no background thread pool is needed).
pub fn spawn<P>(mut pipeline: P) -> SchedulerHandle
where
    P: TickPipeline + 'static,
{
    let state = Arc::new(AtomicU8::new(SchedulerState::Idle.as_u8()));
    let (stop_tx, mut stop_rx) = oneshot::channel();
    let task_state = state.clone();

    let join = tokio::spawn(async move {
        task_state.store(SchedulerState::Running.as_u8(), Ordering::SeqCst);

        let mut interval = run_tick(&mut pipeline).await;

        loop {
            let sleep = time::sleep(interval);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {
                    interval = run_tick(&mut pipeline).await;
                }
                _ = &mut stop_rx => {
                    break;
                }
            }
        }

        task_state.store(SchedulerState::Stopping.as_u8(), Ordering::SeqCst);
        pipeline.close().await;
        task_state.store(SchedulerState::Stopped.as_u8(), Ordering::SeqCst);
    });

    SchedulerHandle {
        state,
        stop_tx: Some(stop_tx),
        join,
    }
}

/// Runs one tick under the per-tick deadline. A tick that overruns the deadline is
/// abandoned; the scheduler falls back to the pipeline's last known interval and
/// continues at the next tick (§5 cancellation & timeouts).
async fn run_tick<P: TickPipeline>(pipeline: &mut P) -> Duration {
    match time::timeout(TICK_DEADLINE, pipeline.tick()).await {
        Ok(interval) => interval,
        Err(_) => {
            slog_scope::warn!("tick deadline exceeded"; "instance_id" => pipeline.instance_id());
            pipeline.current_interval()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingPipeline {
        ticks: Arc<AtomicUsize>,
        interval: Duration,
    }

    #[async_trait]
    impl TickPipeline for CountingPipeline {
        fn instance_id(&self) -> &str {
            "test://instance"
        }

        async fn tick(&mut self) -> Duration {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            self.interval
        }

        fn current_interval(&self) -> Duration {
            self.interval
        }

        async fn close(&mut self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn performs_an_immediate_first_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = spawn(CountingPipeline {
            ticks: ticks.clone(),
            interval: Duration::from_secs(60),
        });
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_further_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = spawn(CountingPipeline {
            ticks: ticks.clone(),
            interval: Duration::from_millis(10),
        });
        time::sleep(Duration::from_millis(1)).await;
        handle.stop().await;
        let observed = ticks.load(Ordering::SeqCst);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), observed);
    }

    #[tokio::test(start_paused = true)]
    async fn rearms_the_timer_to_the_returned_interval() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = spawn(CountingPipeline {
            ticks: ticks.clone(),
            interval: Duration::from_secs(60),
        });
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        time::sleep(Duration::from_secs(65)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        handle.stop().await;
    }
}
