/// A counter value as it appears on a `DeltaRecord`, before it is rendered into a log
/// attribute. Kept as a small enum rather than always-f64 so integer counters (calls,
/// rows_affected, ...) round-trip exactly through the log record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterValue {
    Int(i64),
    Float(f64),
}

impl CounterValue {
    pub fn as_f64(self) -> f64 {
        match self {
            CounterValue::Int(v) => v as f64,
            CounterValue::Float(v) => v,
        }
    }
}

/// Reset-aware subtraction, applied identically to integer and fractional monotonic
/// counters (§4.2): if the current value is not smaller than the previous one, subtract;
/// otherwise the server reset the counter between samples, so the whole current value is
/// attributed to this interval.
pub trait MonotonicCounter: Copy {
    fn reset_aware_delta(self, prev: Self) -> Self;
}

impl MonotonicCounter for u64 {
    fn reset_aware_delta(self, prev: Self) -> Self {
        if self >= prev {
            self - prev
        } else {
            self
        }
    }
}

impl MonotonicCounter for f64 {
    fn reset_aware_delta(self, prev: Self) -> Self {
        if self >= prev {
            self - prev
        } else {
            self
        }
    }
}

/// The output of `DeltaEngine::diff`: one row's worth of per-interval counter deltas,
/// already flattened to the stable attribute keys a `LogBuilder` will emit. Identity
/// fields and counters are family-specific lists built by each fetcher's own diff
/// function; `DeltaRecord` itself carries no family-specific behavior.
#[derive(Debug, Clone)]
pub struct DeltaRecord {
    pub key: String,
    pub text: String,
    pub time_period_seconds: f64,
    /// Family-specific identity attributes, e.g. `db.schema` for MySQL or `db.user.id` /
    /// `db.name.id` for Postgres, plus the family's own primary-key attribute.
    pub identity: Vec<(&'static str, String)>,
    /// `(attribute_key, delta_value)`, e.g. `("db.query.calls.delta", CounterValue::Int(2))`.
    pub counters: Vec<(&'static str, CounterValue)>,
}

impl DeltaRecord {
    /// The emission filter (§4.2 / invariant 2) is always keyed on `db.query.calls.delta`.
    pub fn calls_delta(&self) -> Option<CounterValue> {
        self.counters
            .iter()
            .find(|(k, _)| *k == "db.query.calls.delta")
            .map(|(_, v)| *v)
    }

    pub fn calls_delta_is_positive(&self) -> bool {
        match self.calls_delta() {
            Some(CounterValue::Int(v)) => v > 0,
            Some(CounterValue::Float(v)) => v > 0.0,
            None => false,
        }
    }
}

/// Computes `dt` in seconds between two snapshots per §4.2's policy: non-positive
/// intervals are substituted with `1.0` so downstream rate math never divides by zero.
pub fn time_period_seconds<Row>(
    prev: &crate::snapshot::Snapshot<Row>,
    curr: &crate::snapshot::Snapshot<Row>,
) -> f64 {
    let dt = (curr.wall_clock_taken - prev.wall_clock_taken)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    if dt <= 0.0 {
        1.0
    } else {
        dt
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn monotone_counter_subtracts_when_non_decreasing() {
        assert_eq!(12u64.reset_aware_delta(10), 2);
        assert_eq!(1400.0f64.reset_aware_delta(1000.0), 400.0);
    }

    #[test]
    fn monotone_counter_treats_decrease_as_reset() {
        assert_eq!(3u64.reset_aware_delta(100), 3);
        assert_eq!(120.0f64.reset_aware_delta(5000.0), 120.0);
    }

    #[test]
    fn calls_delta_is_positive_reads_the_canonical_attribute() {
        let record = DeltaRecord {
            key: "k".to_owned(),
            text: "select 1".to_owned(),
            time_period_seconds: 10.0,
            identity: vec![],
            counters: vec![("db.query.calls.delta", CounterValue::Int(0))],
        };
        assert!(!record.calls_delta_is_positive());
    }
}
