use tracing::info;

use super::RoomStore;
use crate::error::{RoomError, RoomResult};
use crate::model::{ChatMessage, MessageKind, RoomSnapshot, User};

/// Everything the transport layer needs to fan out after a successful join.
#[derive(Debug)]
pub struct JoinOutcome {
    /// Sent to the joiner only.
    pub snapshot: RoomSnapshot,
    /// True when the connection was already a member: the snapshot is
    /// re-sent, but nothing below is emitted.
    pub rejoin: bool,
    pub username: String,
    pub join_message: Option<ChatMessage>,
    /// Membership after the join, for the `user-joined` delta.
    pub users: Vec<User>,
    /// Recipients of the delta (everyone but the joiner).
    pub others: Vec<String>,
    /// Rooms this connection was implicitly removed from first.
    pub implicit_leaves: Vec<LeaveOutcome>,
}

#[derive(Debug)]
pub struct LeaveOutcome {
    pub room_id: String,
    pub conn_id: String,
    pub username: String,
    pub leave_message: ChatMessage,
    /// Membership after the leave.
    pub users: Vec<User>,
    /// Remaining members to notify.
    pub remaining: Vec<String>,
    /// Set when the user was also in the call, which was torn down too.
    pub left_call: bool,
}

impl RoomStore {
    /// Join a room, creating it on first use. Enforces one room per
    /// connection by leaving any other room first, and dedups by connection
    /// id within the target room.
    pub fn join(
        &self,
        conn_id: &str,
        room_id: &str,
        username: &str,
        fallback_mode: bool,
    ) -> RoomResult<JoinOutcome> {
        let room_id = room_id.trim();
        let username = username.trim();
        if room_id.is_empty() {
            return Err(RoomError::InvalidRequest("roomId is required".to_string()));
        }
        if username.is_empty() {
            return Err(RoomError::InvalidRequest("username is required".to_string()));
        }

        let implicit_leaves: Vec<LeaveOutcome> = self
            .rooms_of_connection(conn_id)
            .into_iter()
            .filter(|other| other != room_id)
            .filter_map(|other| self.leave(conn_id, &other))
            .collect();

        self.get_or_create(room_id);
        let outcome = self
            .with_room(room_id, |room| {
                room.touch();
                if let Some(user) = room.user_mut(conn_id) {
                    // Rejoin with the same connection: update in place, emit
                    // no join message and no delta.
                    user.username = username.to_string();
                    user.last_active_at = chrono::Utc::now();
                    return JoinOutcome {
                        snapshot: snapshot(room, fallback_mode),
                        rejoin: true,
                        username: username.to_string(),
                        join_message: None,
                        users: room.users.clone(),
                        others: Vec::new(),
                        implicit_leaves: Vec::new(),
                    };
                }

                room.users.push(User::new(conn_id, username));
                // Snapshot first: the joiner's history ends where the room
                // was when they arrived, their own join message excluded.
                let joined_snapshot = snapshot(room, fallback_mode);
                let message = ChatMessage::system(
                    room_id,
                    conn_id,
                    MessageKind::Join,
                    format!("{username} joined the room"),
                );
                room.push_message(message.clone());
                JoinOutcome {
                    snapshot: joined_snapshot,
                    rejoin: false,
                    username: username.to_string(),
                    join_message: Some(message),
                    users: room.users.clone(),
                    others: room.other_conn_ids(conn_id),
                    implicit_leaves: Vec::new(),
                }
            })
            .map(|mut outcome| {
                outcome.implicit_leaves = implicit_leaves;
                outcome
            })
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))?;

        if !outcome.rejoin {
            info!(%conn_id, %room_id, username, "user joined room");
        }
        Ok(outcome)
    }

    /// Remove the connection from the room. No-op (returns `None`) when it
    /// is not a member. Tears down call membership first so the
    /// participant-implies-member invariant holds throughout.
    pub fn leave(&self, conn_id: &str, room_id: &str) -> Option<LeaveOutcome> {
        let outcome = self.with_room(room_id, |room| {
            let user = room.users.iter().position(|u| u.id == conn_id)?;
            let username = room.users[user].username.clone();

            let left_call = room.call_participants.iter().any(|p| p.id == conn_id);
            room.call_participants.retain(|p| p.id != conn_id);
            room.users.remove(user);
            room.touch();

            let message = ChatMessage::system(
                room_id,
                conn_id,
                MessageKind::Leave,
                format!("{username} left the room"),
            );
            room.push_message(message.clone());

            Some(LeaveOutcome {
                room_id: room_id.to_string(),
                conn_id: conn_id.to_string(),
                username,
                leave_message: message,
                users: room.users.clone(),
                remaining: room.member_conn_ids(),
                left_call,
            })
        })??;

        info!(%conn_id, %room_id, username = %outcome.username, "user left room");
        Some(outcome)
    }

}

fn snapshot(room: &crate::model::Room, fallback_mode: bool) -> RoomSnapshot {
    RoomSnapshot {
        room_id: room.id.clone(),
        users: room.users.clone(),
        messages: room.recent_messages(),
        files: room.files.clone(),
        document: room.document.clone(),
        fallback_mode,
    }
}
