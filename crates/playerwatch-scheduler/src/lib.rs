//! # Playerwatch Scheduler
//!
//! Timer trigger: sleeps until the next slot of a cron expression, then asks
//! the caller to run the pipeline. Tokio timers only, no state kept between
//! runs.
//!
//! ```text
//! "0 */2 * * *" ──► next_run_from_cron ──► sleep_until ──► on_tick() ──► log outcome
//!        ▲                                                      │
//!        └──────────────────────────────────────────────────────┘
//! ```

pub mod cron;
pub mod engine;

pub use cron::{Schedule, next_run_from_cron};
pub use engine::spawn_scheduler;
