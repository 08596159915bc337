//! # Playerwatch Pipeline
//!
//! Turns the reporting API payload into one report per store.
//!
//! ## Architecture
//! ```text
//! raw bytes ──► PlayerParser ──► PlayerFilter ──► by_store_number ──► Dispatcher
//!               (per record,      (ignored tags,    (store → players)   (semaphore-gated,
//!                tags + MAC)       groups, company,                      one task per store)
//!                                  offline window)
//! ```
//!
//! Parsing, filtering and grouping are synchronous. Only dispatch runs
//! concurrently, and the whole run is bound to one deadline.

pub mod cluster;
pub mod dispatch;
pub mod filter;
pub mod pipeline;
pub mod player;

pub use cluster::by_store_number;
pub use dispatch::{DispatchOutcome, DispatchReport, Dispatcher, StoreOutcome};
pub use filter::{FilterConfig, IgnoreReason, PlayerFilter};
pub use pipeline::{Pipeline, RunResponse, RunSummary};
pub use player::{PlayerParser, format_mac};
