use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-room fan-out order. Every mutate-then-broadcast path acquires the
/// room's guard before touching the store and holds it across the whole
/// fan-out, so recipients observe broadcasts in exactly the order the
/// originating events were applied to the room, no matter which connection
/// sent them.
pub struct RoomSequencer {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RoomSequencer {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub async fn lock(&self, room_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(room_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

impl Default for RoomSequencer {
    fn default() -> Self {
        Self::new()
    }
}
