//! # Playerwatch Core
//!
//! Shared building blocks for the offline-player pipeline:
//! the wire and canonical player models, error types, configuration
//! and the traits the pipeline uses to talk to the outside world.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::PlayerwatchConfig;
pub use error::{NormalizeError, PlayerwatchError, Result};
pub use traits::{Notifier, PlayerSource};
pub use types::{Player, RawPlayer, Trigger};
