use chrono::Utc;
use tracing::info;

use super::RoomStore;
use crate::error::{RoomError, RoomResult};
use crate::model::{CallParticipant, ChatMessage, MessageKind};

#[derive(Debug)]
pub struct CallJoinOutcome {
    pub participant: CallParticipant,
    /// Full roster after the join, for `call-started`.
    pub participants: Vec<CallParticipant>,
    pub call_message: ChatMessage,
    /// Every member connection (the `call-started` audience).
    pub members: Vec<String>,
    /// Everyone but the joiner (the `user-joined-call` audience).
    pub others: Vec<String>,
}

#[derive(Debug)]
pub struct CallLeaveOutcome {
    pub participant: CallParticipant,
    /// Origin-inclusive audience: the leaver still runs local cleanup.
    pub members: Vec<String>,
}

impl RoomStore {
    /// Idempotent call join. `Ok(None)` means the connection was already a
    /// participant and nothing is emitted. `fallback` is the process-wide
    /// capability flag, frozen into the participant at join time.
    pub fn start_call(
        &self,
        room_id: &str,
        conn_id: &str,
        fallback: bool,
    ) -> RoomResult<Option<CallJoinOutcome>> {
        let outcome = self
            .with_room(room_id, |room| {
                if room.call_participants.iter().any(|p| p.id == conn_id) {
                    return Ok(None);
                }
                let Some(user) = room.user_mut(conn_id) else {
                    return Err(RoomError::InvalidRequest(
                        "join the room before starting a call".to_string(),
                    ));
                };

                user.in_call = true;
                user.mic_enabled = true;
                let username = user.username.clone();
                let participant = CallParticipant {
                    id: conn_id.to_string(),
                    username: username.clone(),
                    mic_enabled: true,
                    speaking: false,
                    joined_at: Utc::now(),
                    fallback,
                };
                room.call_participants.push(participant.clone());
                room.touch();

                let message = ChatMessage::system(
                    room_id,
                    conn_id,
                    MessageKind::CallJoin,
                    format!("{username} joined the call"),
                );
                room.push_message(message.clone());

                Ok(Some(CallJoinOutcome {
                    participant,
                    participants: room.call_participants.clone(),
                    call_message: message,
                    members: room.member_conn_ids(),
                    others: room.other_conn_ids(conn_id),
                }))
            })
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))??;

        if let Some(o) = &outcome {
            info!(%conn_id, %room_id, fallback, participants = o.participants.len(), "call participant joined");
        }
        Ok(outcome)
    }

    /// Idempotent call leave; `None` when not a participant.
    pub fn leave_call(&self, room_id: &str, conn_id: &str) -> Option<CallLeaveOutcome> {
        let outcome = self.with_room(room_id, |room| {
            let idx = room.call_participants.iter().position(|p| p.id == conn_id)?;
            let participant = room.call_participants.remove(idx);
            if let Some(user) = room.user_mut(conn_id) {
                user.in_call = false;
                user.speaking = false;
            }
            room.touch();
            Some(CallLeaveOutcome {
                participant,
                members: room.member_conn_ids(),
            })
        })??;

        info!(%conn_id, %room_id, "call participant left");
        Some(outcome)
    }

    /// Update a participant's mic flag; returns the origin-exclusive fan-out
    /// targets, or `None` when room or participant is absent.
    pub fn toggle_mic(&self, room_id: &str, user_id: &str, mic_enabled: bool) -> Option<Vec<String>> {
        self.with_room(room_id, |room| {
            let participant = room.participant_mut(user_id)?;
            participant.mic_enabled = mic_enabled;
            if let Some(user) = room.user_mut(user_id) {
                user.mic_enabled = mic_enabled;
            }
            Some(room.other_conn_ids(user_id))
        })?
    }

    /// Same shape as `toggle_mic` for the speaking indicator.
    pub fn set_speaking(&self, room_id: &str, user_id: &str, speaking: bool) -> Option<Vec<String>> {
        self.with_room(room_id, |room| {
            let participant = room.participant_mut(user_id)?;
            participant.speaking = speaking;
            if let Some(user) = room.user_mut(user_id) {
                user.speaking = speaking;
            }
            Some(room.other_conn_ids(user_id))
        })?
    }

    /// Probe for the HTTP call-status endpoint.
    pub fn call_status(&self, room_id: &str) -> (bool, usize) {
        self.with_room(room_id, |room| {
            let count = room.call_participants.len();
            (count > 0, count)
        })
        .unwrap_or((false, 0))
    }
}
