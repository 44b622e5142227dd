use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;
use qan_common::QanError;

use crate::pool::{self, MysqlPool};

const STATUS_QUERY: &str = "\
    SELECT variable_name, variable_value FROM performance_schema.global_status \
    WHERE variable_name IN ( \
        'Threads_running', 'Threads_connected', 'Questions', 'Slow_queries', \
        'Innodb_row_lock_time', 'Uptime')";

#[derive(QueryableByName)]
struct StatusRow {
    #[diesel(sql_type = Text)]
    variable_name: String,
    #[diesel(sql_type = Text)]
    variable_value: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct Reading {
    threads_running: u64,
    threads_connected: u64,
    questions: u64,
    slow_queries: u64,
    uptime: u64,
}

/// Reads MySQL server-load status variables and turns them into a normalized load in
/// [0,1] (§4.7). Owns the previous reading directly: the Scheduler never probes the same
/// instance concurrently, so no internal locking is needed.
pub struct LoadProbe {
    pool: MysqlPool,
    previous: Option<Reading>,
}

impl LoadProbe {
    pub fn new(pool: MysqlPool) -> Self {
        Self {
            pool,
            previous: None,
        }
    }

    pub async fn probe(&mut self) -> Result<f64, QanError> {
        let mut conn = pool::get_conn(&self.pool).await?;
        let rows: Vec<StatusRow> = sql_query(STATUS_QUERY)
            .load(&mut conn)
            .await
            .map_err(|e| QanError::query(format!("failed to read global status: {}", e)))?;

        let reading = reading_from_rows(&rows);
        let load = match self.previous {
            None => {
                if reading.threads_connected == 0 {
                    0.0
                } else {
                    (reading.threads_running as f64 / reading.threads_connected as f64).clamp(0.0, 1.0)
                }
            }
            Some(prev) => load_from_delta(prev, reading),
        };
        self.previous = Some(reading);
        Ok(load)
    }
}

fn reading_from_rows(rows: &[StatusRow]) -> Reading {
    let mut reading = Reading::default();
    for row in rows {
        let value: u64 = row.variable_value.parse().unwrap_or(0);
        match row.variable_name.as_str() {
            "Threads_running" => reading.threads_running = value,
            "Threads_connected" => reading.threads_connected = value,
            "Questions" => reading.questions = value,
            "Slow_queries" => reading.slow_queries = value,
            "Uptime" => reading.uptime = value,
            _ => {}
        }
    }
    reading
}

fn load_from_delta(prev: Reading, curr: Reading) -> f64 {
    let thread_ratio = if curr.threads_connected == 0 {
        0.0
    } else {
        (curr.threads_running as f64 / curr.threads_connected as f64).min(1.0)
    };

    let delta_questions = curr.questions.saturating_sub(prev.questions);
    let delta_slow = curr.slow_queries.saturating_sub(prev.slow_queries);
    let slow_ratio = (delta_slow as f64 / delta_questions.max(1) as f64).min(1.0);

    (0.7 * thread_ratio + 0.3 * slow_ratio).clamp(0.0, 1.0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_reading_uses_thread_ratio_only() {
        let reading = Reading {
            threads_running: 5,
            threads_connected: 10,
            questions: 0,
            slow_queries: 0,
            uptime: 0,
        };
        assert_eq!(
            (reading.threads_running as f64 / reading.threads_connected as f64).clamp(0.0, 1.0),
            0.5
        );
    }

    #[test]
    fn load_from_delta_blends_thread_and_slow_ratios() {
        let prev = Reading {
            threads_running: 1,
            threads_connected: 10,
            questions: 100,
            slow_queries: 1,
            uptime: 0,
        };
        let curr = Reading {
            threads_running: 5,
            threads_connected: 10,
            questions: 200,
            slow_queries: 11,
            uptime: 0,
        };
        let load = load_from_delta(prev, curr);
        assert!((load - (0.7 * 0.5 + 0.3 * 0.1)).abs() < 1e-9);
    }

    #[test]
    fn load_is_clamped_to_one() {
        let prev = Reading {
            threads_running: 0,
            threads_connected: 1,
            questions: 0,
            slow_queries: 0,
            uptime: 0,
        };
        let curr = Reading {
            threads_running: 10,
            threads_connected: 1,
            questions: 1,
            slow_queries: 5,
            uptime: 0,
        };
        assert_eq!(load_from_delta(prev, curr), 1.0);
    }

    #[test]
    fn zero_delta_questions_does_not_divide_by_zero() {
        let prev = Reading {
            threads_running: 0,
            threads_connected: 2,
            questions: 50,
            slow_queries: 0,
            uptime: 0,
        };
        let curr = Reading {
            threads_running: 0,
            threads_connected: 2,
            questions: 50,
            slow_queries: 0,
            uptime: 0,
        };
        assert_eq!(load_from_delta(prev, curr), 0.0);
    }
}
