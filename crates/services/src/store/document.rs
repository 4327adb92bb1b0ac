use super::RoomStore;
use crate::error::{RoomError, RoomResult};
use crate::model::Language;

impl RoomStore {
    /// Replace one pane's buffer wholesale and return the fan-out targets
    /// (everyone but the editor — the origin already has local truth).
    /// Concurrent writers race and the last one applied wins; there is no
    /// merge and no version tracking.
    pub fn set_language(
        &self,
        room_id: &str,
        conn_id: &str,
        language: Language,
        text: String,
    ) -> RoomResult<Vec<String>> {
        self.with_room(room_id, |room| {
            room.document.set(language, text);
            room.touch();
            if let Some(user) = room.user_mut(conn_id) {
                user.active_language = language;
                user.last_active_at = chrono::Utc::now();
            }
            room.other_conn_ids(conn_id)
        })
        .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))
    }
}
