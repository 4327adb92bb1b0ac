use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use uuid::Uuid;

use super::RoomStore;
use crate::error::{RoomError, RoomResult};
use crate::model::FileRecord;

/// One incoming upload as sent by the client: content base64-encoded.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpload {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    pub content: String,
}

impl RoomStore {
    /// Register uploaded files and return the room's full file list for the
    /// `files-updated` broadcast. Entries that are not valid base64 are
    /// rejected as a whole batch before anything is stored.
    pub fn add_files(
        &self,
        room_id: &str,
        uploader: &str,
        uploads: Vec<FileUpload>,
    ) -> RoomResult<Vec<FileRecord>> {
        let mut records = Vec::with_capacity(uploads.len());
        for upload in uploads {
            if upload.name.trim().is_empty() {
                return Err(RoomError::InvalidRequest("file name is required".to_string()));
            }
            let bytes = BASE64
                .decode(upload.content.as_bytes())
                .map_err(|_| RoomError::InvalidRequest(format!("{}: content is not base64", upload.name)))?;
            records.push(FileRecord {
                id: Uuid::new_v4().to_string(),
                name: upload.name,
                size: bytes.len() as u64,
                mime_type: if upload.mime_type.is_empty() {
                    "application/octet-stream".to_string()
                } else {
                    upload.mime_type
                },
                content: upload.content,
                uploaded_by: uploader.to_string(),
                uploaded_at: Utc::now(),
            });
        }

        self.with_room(room_id, |room| {
            room.files.extend(records);
            room.touch();
            room.files.clone()
        })
        .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))
    }

    /// Remove a file by id. Any member may delete any file; there is no
    /// ownership check (kept as-is, see DESIGN.md).
    pub fn delete_file(&self, room_id: &str, file_id: &str) -> RoomResult<Vec<FileRecord>> {
        self.with_room(room_id, |room| {
            let before = room.files.len();
            room.files.retain(|f| f.id != file_id);
            if room.files.len() == before {
                return Err(RoomError::FileNotFound(file_id.to_string()));
            }
            room.touch();
            Ok(room.files.clone())
        })
        .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))?
    }

    pub fn room_files(&self, room_id: &str) -> Option<Vec<FileRecord>> {
        self.with_room(room_id, |room| room.files.clone())
    }
}
