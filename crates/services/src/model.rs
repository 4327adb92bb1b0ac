use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Oldest messages are trimmed once a room's history grows past this.
pub const MESSAGE_HISTORY_CAP: usize = 1000;
/// How many trailing messages a join snapshot carries.
pub const SNAPSHOT_MESSAGE_COUNT: usize = 100;

pub const DEFAULT_HTML: &str = "<div class=\"app\">\n  <h1>Hello, room!</h1>\n</div>\n";
pub const DEFAULT_CSS: &str = ".app {\n  font-family: sans-serif;\n}\n";
pub const DEFAULT_JS: &str = "console.log('room ready');\n";

/// The three editor panes every room carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Html,
    Css,
    Js,
}

/// Per-room shared document. One text buffer per pane, replaced wholesale
/// on every change (last write wins, no history).
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            html: DEFAULT_HTML.to_string(),
            css: DEFAULT_CSS.to_string(),
            js: DEFAULT_JS.to_string(),
        }
    }
}

impl Document {
    pub fn set(&mut self, language: Language, text: String) {
        match language {
            Language::Html => self.html = text,
            Language::Css => self.css = text,
            Language::Js => self.js = text,
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::Html => &self.html,
            Language::Css => &self.css,
            Language::Js => &self.js,
        }
    }
}

/// A room member. Keyed by connection id, so one live connection maps to
/// at most one `User` per room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Connection id of the underlying socket.
    pub id: String,
    pub username: String,
    pub joined_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub in_call: bool,
    pub mic_enabled: bool,
    pub speaking: bool,
    pub typing: bool,
    pub active_language: Language,
}

impl User {
    pub fn new(conn_id: &str, username: &str) -> Self {
        let now = Utc::now();
        Self {
            id: conn_id.to_string(),
            username: username.to_string(),
            joined_at: now,
            last_active_at: now,
            in_call: false,
            mic_enabled: false,
            speaking: false,
            typing: false,
            active_language: Language::Html,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Text,
    Join,
    Leave,
    CallJoin,
}

/// Immutable once appended to a room's history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub room_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl ChatMessage {
    /// Ordinary message: id is `millis-conn-suffix` so two messages from the
    /// same connection in the same millisecond still get distinct ids.
    pub fn text(room_id: &str, conn_id: &str, sender: &str, body: &str, reply_to: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{}-{}-{}", now.timestamp_millis(), conn_id, nanoid::nanoid!(6)),
            sender: sender.to_string(),
            message: body.to_string(),
            timestamp: now,
            room_id: room_id.to_string(),
            kind: MessageKind::Text,
            reply_to,
        }
    }

    /// System message attributed to the connection that triggered it.
    pub fn system(room_id: &str, conn_id: &str, kind: MessageKind, body: String) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{}-{}", now.timestamp_millis(), conn_id),
            sender: "system".to_string(),
            message: body,
            timestamp: now,
            room_id: room_id.to_string(),
            kind,
            reply_to: None,
        }
    }
}

/// Call membership record. Its existence implies the matching `User` has
/// `in_call == true`; `crate::store` keeps the two in lockstep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParticipant {
    /// Connection id.
    pub id: String,
    pub username: String,
    pub mic_enabled: bool,
    pub speaking: bool,
    pub joined_at: DateTime<Utc>,
    /// Snapshot of the process-wide capability flag at join time.
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Base64 at rest, exactly as uploaded.
    pub content: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub users: Vec<User>,
    pub messages: VecDeque<ChatMessage>,
    pub files: Vec<FileRecord>,
    pub document: Document,
    pub call_participants: Vec<CallParticipant>,
}

impl Room {
    pub fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            created_at: now,
            last_activity_at: now,
            users: Vec::new(),
            messages: VecDeque::new(),
            files: Vec::new(),
            document: Document::default(),
            call_participants: Vec::new(),
        }
    }

    pub fn user(&self, conn_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == conn_id)
    }

    pub fn user_mut(&mut self, conn_id: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == conn_id)
    }

    pub fn participant_mut(&mut self, conn_id: &str) -> Option<&mut CallParticipant> {
        self.call_participants.iter_mut().find(|p| p.id == conn_id)
    }

    pub fn member_conn_ids(&self) -> Vec<String> {
        self.users.iter().map(|u| u.id.clone()).collect()
    }

    pub fn other_conn_ids(&self, conn_id: &str) -> Vec<String> {
        self.users
            .iter()
            .filter(|u| u.id != conn_id)
            .map(|u| u.id.clone())
            .collect()
    }

    /// Append to history, trimming the oldest entries past the cap.
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > MESSAGE_HISTORY_CAP {
            self.messages.pop_front();
        }
    }

    pub fn recent_messages(&self) -> Vec<ChatMessage> {
        let skip = self.messages.len().saturating_sub(SNAPSHOT_MESSAGE_COUNT);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }
}

/// What a joining connection receives as `room-joined`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub users: Vec<User>,
    pub messages: Vec<ChatMessage>,
    pub files: Vec<FileRecord>,
    pub document: Document,
    /// True when no media-routing backend is available and calls run over
    /// peer-to-peer fallback signaling.
    pub fallback_mode: bool,
}
