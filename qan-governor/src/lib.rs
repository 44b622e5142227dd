//! The dual-rate-EMA adaptive polling governor (§4.6): a pure policy object a Scheduler
//! drives with `update(load)` and queries with `request_interval()`.

mod ema;
mod governor;
mod state;

pub use ema::Ema;
pub use governor::{AdaptiveGovernor, MAX_INTERVAL, MIN_INTERVAL};
pub use state::GovernorState;
