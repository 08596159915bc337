//! Collaborator traits: where player data comes from and where reports go.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Player;

/// Upstream roster of players (the reporting API).
#[async_trait]
pub trait PlayerSource: Send + Sync {
    /// Fetch the raw payload: a JSON array of [`crate::RawPlayer`] objects.
    async fn fetch(&self) -> Result<Vec<u8>>;
}

/// Delivers one report for one store.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the report for `store_number` listing `players`.
    async fn send(&self, store_number: i64, players: &[Player]) -> Result<()>;
}
