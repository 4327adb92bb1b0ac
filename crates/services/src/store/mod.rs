mod call;
mod chat;
mod document;
mod files;
mod membership;

pub use call::{CallJoinOutcome, CallLeaveOutcome};
pub use files::FileUpload;
pub use membership::{JoinOutcome, LeaveOutcome};

use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::model::Room;

/// Process-wide registry of rooms. Owns every room mutation: all other
/// components go through its methods, and each method completes its whole
/// read-modify-write while holding the room's map entry, so per-room state
/// transitions are atomic. Constructed once and injected wherever needed;
/// tests build a fresh store per case.
pub struct RoomStore {
    rooms: DashMap<String, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Returns the existing room or creates one seeded with the default
    /// document template.
    pub fn get_or_create(&self, room_id: &str) {
        self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            info!(%room_id, "room created");
            Room::new(room_id)
        });
    }

    pub fn exists(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Runs `f` against the room, if present, while holding its entry.
    pub(crate) fn with_room<T>(&self, room_id: &str, f: impl FnOnce(&mut Room) -> T) -> Option<T> {
        self.rooms.get_mut(room_id).map(|mut room| f(&mut room))
    }

    /// Connection ids of every current member.
    pub fn member_connections(&self, room_id: &str) -> Vec<String> {
        self.with_room(room_id, |room| room.member_conn_ids())
            .unwrap_or_default()
    }

    /// Connection ids of every member except `conn_id`.
    pub fn other_connections(&self, room_id: &str, conn_id: &str) -> Vec<String> {
        self.with_room(room_id, |room| room.other_conn_ids(conn_id))
            .unwrap_or_default()
    }

    /// Display name the connection joined the room under.
    pub fn username(&self, room_id: &str, conn_id: &str) -> Option<String> {
        self.with_room(room_id, |room| room.user(conn_id).map(|u| u.username.clone()))?
    }

    /// Rooms this connection currently belongs to. The join path keeps this
    /// at most one; the sweep exists so disconnect and implicit-leave do not
    /// depend on that invariant to find stale memberships.
    pub fn rooms_of_connection(&self, conn_id: &str) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().user(conn_id).is_some())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Evicts rooms that have had zero members for longer than `grace`.
    /// Returns the evicted room ids.
    pub fn evict_idle(&self, grace: Duration) -> Vec<String> {
        let cutoff = Utc::now() - grace;
        let stale: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().users.is_empty() && entry.value().last_activity_at < cutoff)
            .map(|entry| entry.key().clone())
            .collect();
        for room_id in &stale {
            // Re-check under the entry: a join may have raced the scan.
            self.rooms.remove_if(room_id, |_, room| {
                room.users.is_empty() && room.last_activity_at < cutoff
            });
        }
        stale
            .into_iter()
            .filter(|id| !self.rooms.contains_key(id))
            .collect()
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Background sweep for idle rooms. Rooms are never evicted while occupied;
/// an empty room survives until `grace` after its last activity.
pub fn spawn_reaper(store: Arc<RoomStore>, interval: std::time::Duration, grace: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(grace);
            if evicted.is_empty() {
                debug!(rooms = store.room_count(), "reaper sweep, nothing idle");
            } else {
                info!(count = evicted.len(), ?evicted, "evicted idle rooms");
            }
        }
    });
}
