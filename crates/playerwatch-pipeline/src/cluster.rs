//! Store grouping.

use std::collections::HashMap;

use playerwatch_core::Player;

/// Partition players by store number. Players without a store land under `0`.
/// Within a store, players keep their input order.
pub fn by_store_number(players: Vec<Player>) -> HashMap<i64, Vec<Player>> {
    let mut stores: HashMap<i64, Vec<Player>> = HashMap::new();
    for p in players {
        stores.entry(p.store_number).or_default().push(p);
    }
    stores
}
