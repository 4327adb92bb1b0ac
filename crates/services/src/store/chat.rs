use super::RoomStore;
use crate::model::ChatMessage;

impl RoomStore {
    /// Append a chat message and hand back the canonical record for the
    /// room-wide echo broadcast. Silent no-op (`None`) on blank bodies and
    /// missing rooms.
    pub fn post_message(
        &self,
        room_id: &str,
        conn_id: &str,
        username: &str,
        body: &str,
        reply_to: Option<String>,
    ) -> Option<ChatMessage> {
        if body.trim().is_empty() {
            return None;
        }
        self.with_room(room_id, |room| {
            room.touch();
            if let Some(user) = room.user_mut(conn_id) {
                user.last_active_at = chrono::Utc::now();
            }
            let message = ChatMessage::text(room_id, conn_id, username, body, reply_to);
            room.push_message(message.clone());
            message
        })
    }

    /// Trailing slice of the room's history, most recent last.
    pub fn recent_messages(&self, room_id: &str) -> Option<Vec<ChatMessage>> {
        self.with_room(room_id, |room| room.recent_messages())
    }

    /// Ephemeral typing indicator: flips the member's flag and returns the
    /// fan-out targets (everyone but the typist). Nothing else is persisted.
    pub fn set_typing(&self, room_id: &str, conn_id: &str, is_typing: bool) -> Option<Vec<String>> {
        self.with_room(room_id, |room| {
            if let Some(user) = room.user_mut(conn_id) {
                user.typing = is_typing;
            }
            room.other_conn_ids(conn_id)
        })
    }
}
