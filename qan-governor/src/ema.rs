use std::sync::RwLock;

/// A single-value exponentially-weighted moving average. The first observation
/// initializes the state directly; subsequent observations update `v <- v + a*(x - v)`.
/// Safe for concurrent readers and a single writer.
pub struct Ema {
    alpha: f64,
    value: RwLock<Option<f64>>,
}

impl Ema {
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "alpha must be in (0, 1]");
        Self {
            alpha,
            value: RwLock::new(None),
        }
    }

    pub fn with_value(alpha: f64, initial: f64) -> Self {
        let ema = Self::new(alpha);
        *ema.value.write().expect("ema lock poisoned") = Some(initial);
        ema
    }

    pub fn update(&self, observation: f64) -> f64 {
        let mut value = self.value.write().expect("ema lock poisoned");
        let updated = match *value {
            Some(current) => current + self.alpha * (observation - current),
            None => observation,
        };
        *value = Some(updated);
        updated
    }

    pub fn value(&self) -> Option<f64> {
        *self.value.read().expect("ema lock poisoned")
    }

    pub fn reset(&self) {
        *self.value.write().expect("ema lock poisoned") = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_observation_initializes_state() {
        let ema = Ema::new(0.3);
        assert_eq!(ema.value(), None);
        assert_eq!(ema.update(0.5), 0.5);
        assert_eq!(ema.value(), Some(0.5));
    }

    #[test]
    fn subsequent_observations_blend_toward_the_new_value() {
        let ema = Ema::new(0.5);
        ema.update(1.0);
        let updated = ema.update(0.0);
        assert!((updated - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_state() {
        let ema = Ema::new(0.3);
        ema.update(0.9);
        ema.reset();
        assert_eq!(ema.value(), None);
    }
}
