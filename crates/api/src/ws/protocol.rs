//! Wire protocol: one JSON envelope per text frame,
//! `{"type": <event>, "data": {...}, "ackId"?: n}`. Inbound payloads are
//! deserialized into [`ClientEvent`] before any state is touched; requests
//! that expect a result carry an `ackId` and are answered with an `ack`
//! envelope holding either the result or `{"error": msg}`, to the caller
//! only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pairpad_services::media::ProducerInfo;
use pairpad_services::model::{
    CallParticipant, ChatMessage, Document, FileRecord, Language, RoomSnapshot, User,
};
use pairpad_services::store::FileUpload;

#[derive(Debug, Deserialize)]
pub struct Inbound {
    #[serde(flatten)]
    pub event: ClientEvent,
    #[serde(rename = "ackId")]
    pub ack_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String, username: String },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        room_id: String,
        message: String,
        username: String,
        #[serde(default)]
        reply_to: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Typing {
        room_id: String,
        username: String,
        is_typing: bool,
    },
    #[serde(rename_all = "camelCase")]
    CodeChange {
        room_id: String,
        language: Language,
        code: String,
    },
    #[serde(rename_all = "camelCase")]
    StartCall { room_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveCall { room_id: String },
    #[serde(rename_all = "camelCase")]
    ToggleMic {
        user_id: String,
        mic_enabled: bool,
        room_id: String,
    },
    #[serde(rename_all = "camelCase")]
    SpeakingStatus {
        user_id: String,
        is_speaking: bool,
        room_id: String,
    },
    #[serde(rename = "getRouterRtpCapabilities", rename_all = "camelCase")]
    GetRouterRtpCapabilities { room_id: String },
    #[serde(rename = "createWebRtcTransport", rename_all = "camelCase")]
    CreateWebRtcTransport { room_id: String },
    #[serde(rename = "connectTransport", rename_all = "camelCase")]
    ConnectTransport {
        room_id: String,
        transport_id: String,
        dtls_parameters: Value,
    },
    #[serde(rename = "produce", rename_all = "camelCase")]
    Produce {
        room_id: String,
        transport_id: String,
        kind: String,
        rtp_parameters: Value,
    },
    #[serde(rename = "getProducers", rename_all = "camelCase")]
    GetProducers { user_id: String, room_id: String },
    #[serde(rename = "resumeConsumer", rename_all = "camelCase")]
    ResumeConsumer {
        room_id: String,
        consumer_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Offer {
        to: String,
        offer: Value,
        room_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Answer {
        to: String,
        answer: Value,
        room_id: String,
    },
    #[serde(rename_all = "camelCase")]
    IceCandidate {
        to: String,
        candidate: Value,
        room_id: String,
    },
    #[serde(rename_all = "camelCase")]
    GetRoomFiles { room_id: String },
    #[serde(rename_all = "camelCase")]
    UploadFiles {
        room_id: String,
        files: Vec<FileUpload>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteFile { room_id: String, file_id: String },
    #[serde(rename_all = "camelCase")]
    GetRoomMessages { room_id: String },
}

impl ClientEvent {
    /// Event name for logs and uniform invalid-request notifications.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "join-room",
            ClientEvent::LeaveRoom { .. } => "leave-room",
            ClientEvent::SendMessage { .. } => "send-message",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::CodeChange { .. } => "code-change",
            ClientEvent::StartCall { .. } => "start-call",
            ClientEvent::LeaveCall { .. } => "leave-call",
            ClientEvent::ToggleMic { .. } => "toggle-mic",
            ClientEvent::SpeakingStatus { .. } => "speaking-status",
            ClientEvent::GetRouterRtpCapabilities { .. } => "getRouterRtpCapabilities",
            ClientEvent::CreateWebRtcTransport { .. } => "createWebRtcTransport",
            ClientEvent::ConnectTransport { .. } => "connectTransport",
            ClientEvent::Produce { .. } => "produce",
            ClientEvent::GetProducers { .. } => "getProducers",
            ClientEvent::ResumeConsumer { .. } => "resumeConsumer",
            ClientEvent::Offer { .. } => "offer",
            ClientEvent::Answer { .. } => "answer",
            ClientEvent::IceCandidate { .. } => "ice-candidate",
            ClientEvent::GetRoomFiles { .. } => "get-room-files",
            ClientEvent::UploadFiles { .. } => "upload-files",
            ClientEvent::DeleteFile { .. } => "delete-file",
            ClientEvent::GetRoomMessages { .. } => "get-room-messages",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// First frame on every socket; tells the client its connection id,
    /// which doubles as its user id in all later events.
    Connected {
        #[serde(rename = "connId")]
        conn_id: String,
    },
    RoomJoined(RoomSnapshot),
    #[serde(rename_all = "camelCase")]
    UserJoined { user: User, users: Vec<User> },
    #[serde(rename_all = "camelCase")]
    UserLeft {
        user_id: String,
        username: String,
        users: Vec<User>,
    },
    ChatMessage(ChatMessage),
    #[serde(rename_all = "camelCase")]
    RoomMessages { messages: Vec<ChatMessage> },
    #[serde(rename_all = "camelCase")]
    UserTyping {
        user_id: String,
        username: String,
        is_typing: bool,
    },
    #[serde(rename_all = "camelCase")]
    CodeUpdate {
        language: Language,
        code: String,
        user_id: String,
    },
    #[serde(rename_all = "camelCase")]
    CallStarted {
        participants: Vec<CallParticipant>,
        fallback_mode: bool,
    },
    #[serde(rename_all = "camelCase")]
    UserJoinedCall {
        user_id: String,
        username: String,
        mic_enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    UserLeftCall { user_id: String, username: String },
    #[serde(rename_all = "camelCase")]
    ToggleMic { user_id: String, mic_enabled: bool },
    #[serde(rename_all = "camelCase")]
    SpeakingStatus { user_id: String, is_speaking: bool },
    NewProducer(ProducerInfo),
    #[serde(rename_all = "camelCase")]
    FilesUpdated { files: Vec<FileRecord> },
    #[serde(rename_all = "camelCase")]
    Offer { from: String, offer: Value },
    #[serde(rename_all = "camelCase")]
    Answer { from: String, answer: Value },
    #[serde(rename_all = "camelCase")]
    IceCandidate { from: String, candidate: Value },
    #[serde(rename_all = "camelCase")]
    JoinError { message: String },
    /// Uniform surfacing of rejected fire-and-forget requests.
    #[serde(rename_all = "camelCase")]
    InvalidRequest { op: String, message: String },
}

/// Reply envelope for callback-style requests.
pub fn ack(ack_id: u64, data: Value) -> Value {
    serde_json::json!({ "type": "ack", "ackId": ack_id, "data": data })
}

pub fn ack_error(ack_id: u64, message: impl AsRef<str>) -> Value {
    ack(ack_id, serde_json::json!({ "error": message.as_ref() }))
}
