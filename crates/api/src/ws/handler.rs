use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pairpad_services::store::{CallJoinOutcome, LeaveOutcome};

use super::dispatcher;
use super::protocol::{ClientEvent, Inbound, ServerEvent, ack, ack_error};
use crate::state::AppState;

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!(%connection_id, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));
    state.ws_storage.add(connection_id.clone(), sender);

    dispatcher::send_to_connection(
        &state.ws_storage,
        &connection_id,
        &ServerEvent::Connected {
            conn_id: connection_id.clone(),
        },
    )
    .await;

    let mut close_reason = String::from("stream ended");
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, &connection_id, text.as_str()).await;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // axum answers pings itself; nothing to do.
            }
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    close_reason = format!("{} {}", u16::from(frame.code), frame.reason);
                }
                break;
            }
            Err(e) => {
                close_reason = e.to_string();
                break;
            }
            _ => {}
        }
    }

    // Reason codes are logged only, never acted on.
    info!(%connection_id, %close_reason, "WebSocket disconnected");

    state.ws_storage.remove(&connection_id);
    for room_id in state.store.rooms_of_connection(&connection_id) {
        let _order = state.sequencer.lock(&room_id).await;
        if let Some(outcome) = state.store.leave(&connection_id, &room_id) {
            state.media.close_participant(&room_id, &connection_id);
            fan_out_leave(&state, &outcome).await;
        }
    }
}

/// Broadcasts for one completed room leave: call teardown first, then the
/// system message, then the membership delta.
async fn fan_out_leave(state: &AppState, outcome: &LeaveOutcome) {
    if outcome.left_call {
        dispatcher::broadcast(
            &state.ws_storage,
            &outcome.remaining,
            &ServerEvent::UserLeftCall {
                user_id: outcome.conn_id.clone(),
                username: outcome.username.clone(),
            },
        )
        .await;
    }
    dispatcher::broadcast(
        &state.ws_storage,
        &outcome.remaining,
        &ServerEvent::ChatMessage(outcome.leave_message.clone()),
    )
    .await;
    dispatcher::broadcast(
        &state.ws_storage,
        &outcome.remaining,
        &ServerEvent::UserLeft {
            user_id: outcome.conn_id.clone(),
            username: outcome.username.clone(),
            users: outcome.users.clone(),
        },
    )
    .await;
}

async fn notify_invalid(state: &AppState, connection_id: &str, op: &str, message: impl Into<String>) {
    dispatcher::send_to_connection(
        &state.ws_storage,
        connection_id,
        &ServerEvent::InvalidRequest {
            op: op.to_string(),
            message: message.into(),
        },
    )
    .await;
}

async fn handle_client_message(state: &AppState, connection_id: &str, text: &str) {
    let parsed: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            debug!(%connection_id, "dropping non-JSON frame");
            return;
        }
    };
    let inbound: Inbound = match serde_json::from_value(parsed.clone()) {
        Ok(i) => i,
        Err(e) => {
            let op = parsed
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("unknown");
            debug!(%connection_id, op, %e, "malformed WS payload");
            notify_invalid(state, connection_id, op, "malformed payload").await;
            return;
        }
    };

    debug!(%connection_id, op = inbound.event.name(), "WS event received");

    match inbound.event {
        ClientEvent::JoinRoom { room_id, username } => {
            handle_join(state, connection_id, &room_id, &username).await;
        }
        ClientEvent::LeaveRoom { room_id } => {
            let _order = state.sequencer.lock(&room_id).await;
            if let Some(outcome) = state.store.leave(connection_id, &room_id) {
                // Transports and producers can exist without a call, so the
                // media teardown is unconditional (a no-op when absent).
                state.media.close_participant(&room_id, connection_id);
                fan_out_leave(state, &outcome).await;
            }
        }
        ClientEvent::SendMessage {
            room_id,
            message,
            username,
            reply_to,
        } => {
            let _order = state.sequencer.lock(&room_id).await;
            match state
                .store
                .post_message(&room_id, connection_id, &username, &message, reply_to)
            {
                Some(message) => {
                    // Inclusive echo: the sender needs the canonical id and
                    // timestamp too.
                    let members = state.store.member_connections(&room_id);
                    dispatcher::broadcast(
                        &state.ws_storage,
                        &members,
                        &ServerEvent::ChatMessage(message),
                    )
                    .await;
                }
                None => {
                    notify_invalid(state, connection_id, "send-message", "empty message or unknown room")
                        .await;
                }
            }
        }
        ClientEvent::Typing {
            room_id,
            username,
            is_typing,
        } => {
            let _order = state.sequencer.lock(&room_id).await;
            if let Some(targets) = state.store.set_typing(&room_id, connection_id, is_typing) {
                dispatcher::broadcast(
                    &state.ws_storage,
                    &targets,
                    &ServerEvent::UserTyping {
                        user_id: connection_id.to_string(),
                        username,
                        is_typing,
                    },
                )
                .await;
            }
        }
        ClientEvent::CodeChange {
            room_id,
            language,
            code,
        } => {
            let _order = state.sequencer.lock(&room_id).await;
            match state
                .store
                .set_language(&room_id, connection_id, language, code.clone())
            {
                Ok(targets) => {
                    dispatcher::broadcast(
                        &state.ws_storage,
                        &targets,
                        &ServerEvent::CodeUpdate {
                            language,
                            code,
                            user_id: connection_id.to_string(),
                        },
                    )
                    .await;
                }
                Err(e) => notify_invalid(state, connection_id, "code-change", e.to_string()).await,
            }
        }
        ClientEvent::StartCall { room_id } => {
            handle_start_call(state, connection_id, &room_id).await;
        }
        ClientEvent::LeaveCall { room_id } => {
            let _order = state.sequencer.lock(&room_id).await;
            if let Some(outcome) = state.store.leave_call(&room_id, connection_id) {
                state.media.close_participant(&room_id, connection_id);
                // Origin-inclusive: the leaver's client still cleans up
                // local resources on this event.
                dispatcher::broadcast(
                    &state.ws_storage,
                    &outcome.members,
                    &ServerEvent::UserLeftCall {
                        user_id: outcome.participant.id,
                        username: outcome.participant.username,
                    },
                )
                .await;
            }
        }
        ClientEvent::ToggleMic {
            user_id,
            mic_enabled,
            room_id,
        } => {
            let _order = state.sequencer.lock(&room_id).await;
            if let Some(targets) = state.store.toggle_mic(&room_id, &user_id, mic_enabled) {
                dispatcher::broadcast(
                    &state.ws_storage,
                    &targets,
                    &ServerEvent::ToggleMic { user_id, mic_enabled },
                )
                .await;
            }
        }
        ClientEvent::SpeakingStatus {
            user_id,
            is_speaking,
            room_id,
        } => {
            let _order = state.sequencer.lock(&room_id).await;
            if let Some(targets) = state.store.set_speaking(&room_id, &user_id, is_speaking) {
                dispatcher::broadcast(
                    &state.ws_storage,
                    &targets,
                    &ServerEvent::SpeakingStatus { user_id, is_speaking },
                )
                .await;
            }
        }
        ClientEvent::GetRouterRtpCapabilities { room_id } => {
            let result = match require_room(state, &room_id) {
                Ok(()) => state
                    .media
                    .router_rtp_capabilities(&room_id)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };
            reply(state, connection_id, inbound.ack_id, result).await;
        }
        ClientEvent::CreateWebRtcTransport { room_id } => {
            let result = match require_room(state, &room_id) {
                Ok(()) => state
                    .media
                    .create_transport(&room_id, connection_id)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };
            reply(state, connection_id, inbound.ack_id, result).await;
        }
        ClientEvent::ConnectTransport {
            room_id,
            transport_id,
            dtls_parameters,
        } => {
            let result = match require_room(state, &room_id) {
                Ok(()) => state
                    .media
                    .connect_transport(&room_id, connection_id, &transport_id, dtls_parameters)
                    .await
                    .map(|()| json!({ "connected": true }))
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };
            reply(state, connection_id, inbound.ack_id, result).await;
        }
        ClientEvent::Produce {
            room_id,
            transport_id,
            kind,
            rtp_parameters,
        } => {
            handle_produce(
                state,
                connection_id,
                inbound.ack_id,
                &room_id,
                &transport_id,
                &kind,
                rtp_parameters,
            )
            .await;
        }
        ClientEvent::GetProducers { user_id: _, room_id } => {
            let result = require_room(state, &room_id)
                .map(|()| json!(state.media.producers_for(&room_id, connection_id)));
            reply(state, connection_id, inbound.ack_id, result).await;
        }
        ClientEvent::ResumeConsumer { room_id, consumer_id } => {
            let result = match require_room(state, &room_id) {
                Ok(()) => state
                    .media
                    .resume_consumer(&room_id, connection_id, &consumer_id)
                    .await
                    .map(|()| json!({ "resumed": true }))
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };
            reply(state, connection_id, inbound.ack_id, result).await;
        }
        ClientEvent::Offer { to, offer, room_id: _ } => {
            // Blind relay: never parsed, never stored, at-most-once.
            dispatcher::send_to_connection(
                &state.ws_storage,
                &to,
                &ServerEvent::Offer {
                    from: connection_id.to_string(),
                    offer,
                },
            )
            .await;
        }
        ClientEvent::Answer { to, answer, room_id: _ } => {
            dispatcher::send_to_connection(
                &state.ws_storage,
                &to,
                &ServerEvent::Answer {
                    from: connection_id.to_string(),
                    answer,
                },
            )
            .await;
        }
        ClientEvent::IceCandidate {
            to,
            candidate,
            room_id: _,
        } => {
            dispatcher::send_to_connection(
                &state.ws_storage,
                &to,
                &ServerEvent::IceCandidate {
                    from: connection_id.to_string(),
                    candidate,
                },
            )
            .await;
        }
        ClientEvent::GetRoomFiles { room_id } => match state.store.room_files(&room_id) {
            Some(files) => {
                dispatcher::send_to_connection(
                    &state.ws_storage,
                    connection_id,
                    &ServerEvent::FilesUpdated { files },
                )
                .await;
            }
            None => notify_invalid(state, connection_id, "get-room-files", "unknown room").await,
        },
        ClientEvent::UploadFiles { room_id, files } => {
            let _order = state.sequencer.lock(&room_id).await;
            let uploader = state
                .store
                .username(&room_id, connection_id)
                .unwrap_or_else(|| "anonymous".to_string());
            match state.store.add_files(&room_id, &uploader, files) {
                Ok(files) => {
                    let members = state.store.member_connections(&room_id);
                    dispatcher::broadcast(
                        &state.ws_storage,
                        &members,
                        &ServerEvent::FilesUpdated { files },
                    )
                    .await;
                }
                Err(e) => notify_invalid(state, connection_id, "upload-files", e.to_string()).await,
            }
        }
        ClientEvent::DeleteFile { room_id, file_id } => {
            let _order = state.sequencer.lock(&room_id).await;
            // No ownership check: any member may delete any file.
            match state.store.delete_file(&room_id, &file_id) {
                Ok(files) => {
                    let members = state.store.member_connections(&room_id);
                    dispatcher::broadcast(
                        &state.ws_storage,
                        &members,
                        &ServerEvent::FilesUpdated { files },
                    )
                    .await;
                }
                Err(e) => notify_invalid(state, connection_id, "delete-file", e.to_string()).await,
            }
        }
        ClientEvent::GetRoomMessages { room_id } => match state.store.recent_messages(&room_id) {
            Some(messages) => {
                dispatcher::send_to_connection(
                    &state.ws_storage,
                    connection_id,
                    &ServerEvent::RoomMessages { messages },
                )
                .await;
            }
            None => notify_invalid(state, connection_id, "get-room-messages", "unknown room").await,
        },
    }
}

fn require_room(state: &AppState, room_id: &str) -> Result<(), String> {
    if state.store.exists(room_id) {
        Ok(())
    } else {
        Err("Room not found".to_string())
    }
}

/// Answer a callback-style request. Errors go to the caller only, never to
/// the room.
async fn reply(
    state: &AppState,
    connection_id: &str,
    ack_id: Option<u64>,
    result: Result<Value, String>,
) {
    let Some(ack_id) = ack_id else {
        if let Err(e) = result {
            warn!(%connection_id, %e, "request failed with no ackId to answer");
        }
        return;
    };
    let envelope = match result {
        Ok(data) => ack(ack_id, data),
        Err(message) => ack_error(ack_id, message),
    };
    dispatcher::send_raw(&state.ws_storage, connection_id, &envelope).await;
}

async fn handle_join(state: &AppState, connection_id: &str, room_id: &str, username: &str) {
    let room_id = room_id.trim();

    // One room per connection: leave every other room first, each under its
    // own fan-out order so departing-room subscribers see the leave in
    // sequence with that room's other broadcasts.
    for other in state.store.rooms_of_connection(connection_id) {
        if other == room_id {
            continue;
        }
        let _order = state.sequencer.lock(&other).await;
        if let Some(outcome) = state.store.leave(connection_id, &other) {
            state.media.close_participant(&other, connection_id);
            fan_out_leave(state, &outcome).await;
        }
    }

    let _order = state.sequencer.lock(room_id).await;
    let outcome = match state
        .store
        .join(connection_id, room_id, username, state.fallback_mode())
    {
        Ok(outcome) => outcome,
        Err(e) => {
            dispatcher::send_to_connection(
                &state.ws_storage,
                connection_id,
                &ServerEvent::JoinError {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    // The store sweeps stale memberships itself; the loop above normally
    // leaves it nothing to find.
    for left in &outcome.implicit_leaves {
        state.media.close_participant(&left.room_id, connection_id);
        fan_out_leave(state, left).await;
    }

    dispatcher::send_to_connection(
        &state.ws_storage,
        connection_id,
        &ServerEvent::RoomJoined(outcome.snapshot),
    )
    .await;

    if outcome.rejoin {
        return;
    }

    if let Some(message) = outcome.join_message {
        dispatcher::broadcast(
            &state.ws_storage,
            &outcome.others,
            &ServerEvent::ChatMessage(message),
        )
        .await;
    }
    if let Some(user) = outcome.users.iter().find(|u| u.id == connection_id) {
        dispatcher::broadcast(
            &state.ws_storage,
            &outcome.others,
            &ServerEvent::UserJoined {
                user: user.clone(),
                users: outcome.users.clone(),
            },
        )
        .await;
    }
}

async fn handle_start_call(state: &AppState, connection_id: &str, room_id: &str) {
    let _order = state.sequencer.lock(room_id).await;
    let outcome: Option<CallJoinOutcome> =
        match state
            .store
            .start_call(room_id, connection_id, state.fallback_mode())
        {
            Ok(outcome) => outcome,
            Err(e) => {
                notify_invalid(state, connection_id, "start-call", e.to_string()).await;
                return;
            }
        };
    // Idempotent repeat: nothing to emit.
    let Some(outcome) = outcome else { return };

    dispatcher::broadcast(
        &state.ws_storage,
        &outcome.members,
        &ServerEvent::CallStarted {
            participants: outcome.participants.clone(),
            fallback_mode: state.fallback_mode(),
        },
    )
    .await;
    dispatcher::broadcast(
        &state.ws_storage,
        &outcome.others,
        &ServerEvent::UserJoinedCall {
            user_id: outcome.participant.id.clone(),
            username: outcome.participant.username.clone(),
            mic_enabled: outcome.participant.mic_enabled,
        },
    )
    .await;
    dispatcher::broadcast(
        &state.ws_storage,
        &outcome.members,
        &ServerEvent::ChatMessage(outcome.call_message),
    )
    .await;
}

#[allow(clippy::too_many_arguments)]
async fn handle_produce(
    state: &AppState,
    connection_id: &str,
    ack_id: Option<u64>,
    room_id: &str,
    transport_id: &str,
    kind: &str,
    rtp_parameters: Value,
) {
    let result = match require_room(state, room_id) {
        Ok(()) => state
            .media
            .produce(room_id, connection_id, transport_id, kind, rtp_parameters)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e),
    };

    match result {
        Ok(producer_id) => {
            reply(
                state,
                connection_id,
                ack_id,
                Ok(json!({ "id": producer_id })),
            )
            .await;
            let _order = state.sequencer.lock(room_id).await;
            let others = state.store.other_connections(room_id, connection_id);
            dispatcher::broadcast(
                &state.ws_storage,
                &others,
                &ServerEvent::NewProducer(pairpad_services::media::ProducerInfo {
                    producer_id,
                    user_id: connection_id.to_string(),
                    kind: kind.to_string(),
                }),
            )
            .await;
        }
        Err(e) => reply(state, connection_id, ack_id, Err(e)).await,
    }
}
