use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use qan_common::QanError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ema::Ema;
use crate::state::GovernorState;

/// Lower bound on the collection interval the governor will ever request, regardless of
/// observed load.
pub const MIN_INTERVAL: Duration = Duration::from_millis(500);
/// Upper bound on the collection interval the governor will ever request.
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

const FAST_ALPHA: f64 = 0.30;
const SLOW_ALPHA: f64 = 0.05;
const DEADBAND: f64 = 0.10;
const PERSIST_EVERY: Duration = Duration::from_secs(60);
const DEFAULT_JITTER_FRACTION: f64 = 0.10;
const MAX_JITTER_FRACTION: f64 = 0.50;
const FAST_LOW_WATERMARK: f64 = 0.70;
const FAST_HIGH_WATERMARK: f64 = 0.90;

/// Dual-rate-EMA load-to-interval policy object (§4.6). Holds no reference to any
/// scheduler or fetcher: it is driven purely by `update(load)` calls and queried purely
/// through `request_interval()`, so it can be exercised against synthetic load sequences
/// with no database involved (§9 design notes).
pub struct AdaptiveGovernor {
    fast: Ema,
    slow: Ema,
    base_interval: Duration,
    current_interval_nanos: AtomicU64,
    state_dir: Option<PathBuf>,
    jitter_fraction: f64,
    rng: Mutex<StdRng>,
    last_persisted: Mutex<Instant>,
    on_interval_change: Option<Box<dyn Fn(Duration) + Send + Sync>>,
}

impl AdaptiveGovernor {
    pub fn new(base_interval: Duration, state_dir: Option<PathBuf>) -> Self {
        Self::with_jitter_fraction(base_interval, state_dir, DEFAULT_JITTER_FRACTION)
    }

    pub fn with_jitter_fraction(
        base_interval: Duration,
        state_dir: Option<PathBuf>,
        jitter_fraction: f64,
    ) -> Self {
        let base_interval = clamp_interval(base_interval);
        let mut governor = Self {
            fast: Ema::new(FAST_ALPHA),
            slow: Ema::new(SLOW_ALPHA),
            base_interval,
            current_interval_nanos: AtomicU64::new(base_interval.as_nanos() as u64),
            state_dir,
            jitter_fraction: jitter_fraction.min(MAX_JITTER_FRACTION).max(0.0),
            rng: Mutex::new(StdRng::from_rng(rand::thread_rng()).expect("seed governor rng")),
            last_persisted: Mutex::new(Instant::now()),
            on_interval_change: None,
        };
        governor.restore();
        governor
    }

    pub fn with_on_interval_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.on_interval_change = Some(Box::new(callback));
        self
    }

    fn restore(&mut self) {
        let Some(dir) = self.state_dir.clone() else {
            return;
        };
        if let Some(state) = GovernorState::load(&dir) {
            self.fast = Ema::with_value(FAST_ALPHA, state.fast_ema_value);
            self.slow = Ema::with_value(SLOW_ALPHA, state.slow_ema_value);
            self.current_interval_nanos
                .store(state.interval_ns, Ordering::SeqCst);
        }
    }

    pub fn current_interval(&self) -> Duration {
        Duration::from_nanos(self.current_interval_nanos.load(Ordering::SeqCst))
    }

    /// Updates both EMAs with a freshly observed load, recomputes the candidate interval,
    /// commits it if it clears the deadband, and persists state if due. Returns the
    /// (possibly unchanged) current interval after the update.
    pub fn update(&self, load: f64) -> Duration {
        let load = load.clamp(0.0, 1.0);
        let fast = self.fast.update(load);
        self.slow.update(load);

        let candidate = candidate_interval(self.base_interval, fast);
        let current = self.current_interval();

        if deadband_exceeded(current, candidate) {
            self.current_interval_nanos
                .store(candidate.as_nanos() as u64, Ordering::SeqCst);
            if let Some(callback) = &self.on_interval_change {
                callback(candidate);
            }
        }

        self.persist_if_due();
        self.current_interval()
    }

    /// Returns the current interval plus uniform jitter in `[-p/2, +p/2] * current`,
    /// floored at `MIN_INTERVAL`.
    pub fn request_interval(&self) -> Duration {
        let current = self.current_interval().as_secs_f64();
        let spread = current * self.jitter_fraction;
        let jitter = if spread > 0.0 {
            self.rng
                .lock()
                .expect("governor rng lock poisoned")
                .gen_range(-spread / 2.0..=spread / 2.0)
        } else {
            0.0
        };
        let jittered = (current + jitter).max(MIN_INTERVAL.as_secs_f64());
        Duration::from_secs_f64(jittered)
    }

    fn persist_if_due(&self) {
        let Some(dir) = &self.state_dir else {
            return;
        };
        let mut last_persisted = self.last_persisted.lock().expect("governor lock poisoned");
        if last_persisted.elapsed() < PERSIST_EVERY {
            return;
        }
        if self.save_to(dir).is_ok() {
            *last_persisted = Instant::now();
        }
    }

    fn save_to(&self, dir: &std::path::Path) -> Result<(), QanError> {
        let state = GovernorState {
            fast_ema_value: self.fast.value().unwrap_or(0.0),
            slow_ema_value: self.slow.value().unwrap_or(0.0),
            interval_ns: self.current_interval_nanos.load(Ordering::SeqCst),
            timestamp: Utc::now(),
        };
        state.save(dir)
    }

    /// Forces a state write regardless of the persistence cadence. Used at scheduler stop.
    pub fn save(&self) -> Result<(), QanError> {
        match &self.state_dir {
            Some(dir) => self.save_to(dir),
            None => Ok(()),
        }
    }

    /// Clears both EMAs, restores `current_interval` to `base_interval`, best-effort
    /// removes the state file, and invokes the change callback.
    pub fn reset(&self) {
        self.fast.reset();
        self.slow.reset();
        self.current_interval_nanos
            .store(self.base_interval.as_nanos() as u64, Ordering::SeqCst);
        if let Some(dir) = &self.state_dir {
            GovernorState::remove(dir);
        }
        if let Some(callback) = &self.on_interval_change {
            callback(self.base_interval);
        }
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
}

fn candidate_interval(base_interval: Duration, fast: f64) -> Duration {
    if fast <= FAST_LOW_WATERMARK {
        base_interval
    } else if fast <= FAST_HIGH_WATERMARK {
        let exponent = (fast / FAST_LOW_WATERMARK) - 1.0;
        let scaled = base_interval.as_secs_f64() * 2f64.powf(exponent);
        Duration::from_secs_f64(scaled).min(MAX_INTERVAL)
    } else {
        MAX_INTERVAL
    }
}

fn deadband_exceeded(current: Duration, candidate: Duration) -> bool {
    let current = current.as_secs_f64();
    let candidate = candidate.as_secs_f64();
    if current == 0.0 {
        return true;
    }
    ((candidate - current) / current).abs() > DEADBAND
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn governor_bounds_always_hold() {
        let governor = AdaptiveGovernor::new(Duration::from_secs(1), None);
        for load in [0.0, 0.5, 0.95, 1.0, 0.2] {
            let interval = governor.update(load);
            assert!(interval >= MIN_INTERVAL);
            assert!(interval <= MAX_INTERVAL);
        }
    }

    #[test]
    fn deadband_suppresses_small_changes() {
        let governor = AdaptiveGovernor::new(Duration::from_secs(1), None);
        governor.update(0.1);
        let before = governor.current_interval();
        governor.update(0.2);
        governor.update(0.3);
        assert_eq!(governor.current_interval(), before);
        assert_eq!(before, Duration::from_secs(1));
    }

    #[test]
    fn s6_governor_transitions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let governor = AdaptiveGovernor::new(Duration::from_secs(1), None)
            .with_on_interval_change(move |_| {
                calls2.fetch_add(1, Ordering::SeqCst);
            });

        governor.update(0.1);
        governor.update(0.2);
        governor.update(0.3);
        assert_eq!(governor.current_interval(), Duration::from_secs(1));

        governor.update(0.95);
        assert_eq!(governor.current_interval(), MAX_INTERVAL);
        assert!(calls.load(Ordering::SeqCst) >= 1);

        for _ in 0..200 {
            if governor.current_interval() == Duration::from_secs(1) {
                break;
            }
            governor.update(0.0);
        }
        assert_eq!(governor.current_interval(), Duration::from_secs(1));
    }

    #[test]
    fn request_interval_never_goes_below_minimum() {
        let governor = AdaptiveGovernor::with_jitter_fraction(
            Duration::from_millis(500),
            None,
            MAX_JITTER_FRACTION,
        );
        for _ in 0..1000 {
            assert!(governor.request_interval() >= MIN_INTERVAL);
        }
    }

    #[test]
    fn reset_restores_base_interval_and_clears_ema() {
        let governor = AdaptiveGovernor::new(Duration::from_secs(2), None);
        governor.update(0.99);
        assert_ne!(governor.current_interval(), Duration::from_secs(2));
        governor.reset();
        assert_eq!(governor.current_interval(), Duration::from_secs(2));
    }

    #[test]
    fn save_then_restore_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let governor = AdaptiveGovernor::new(Duration::from_secs(1), Some(dir.path().to_owned()));
        governor.update(0.95);
        governor.save().unwrap();

        let restored =
            AdaptiveGovernor::new(Duration::from_secs(1), Some(dir.path().to_owned()));
        assert_eq!(restored.current_interval(), governor.current_interval());
    }
}
