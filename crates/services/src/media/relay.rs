use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::{MediaBackend, MediaError, ProducerInfo};

/// Fallback backend used when no media router is available. It answers the
/// same request surface the SFU does, but with inert descriptors: the
/// transports it hands out are not network endpoints, `connect`/`resume`
/// acknowledge without doing work, and `produce` only registers an id so the
/// rest of the room learns about the stream. Actual audio is exchanged
/// peer-to-peer via the offer/answer/ICE relay, which never touches this
/// type.
pub struct SignalingRelay {
    rooms: Mutex<HashMap<String, RelayRoom>>,
}

#[derive(Default)]
struct RelayRoom {
    /// transport id -> owning connection id
    transports: HashMap<String, String>,
    producers: Vec<RelayProducer>,
}

struct RelayProducer {
    id: String,
    conn_id: String,
    kind: String,
}

impl SignalingRelay {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Fixed capability descriptor, identical for every room: audio-only,
    /// Opus at 48 kHz stereo. Clients negotiate against this exactly as they
    /// would against a real router.
    pub fn fixed_rtp_capabilities() -> Value {
        json!({
            "codecs": [{
                "kind": "audio",
                "mimeType": "audio/opus",
                "preferredPayloadType": 100,
                "clockRate": 48000,
                "channels": 2,
                "parameters": { "minptime": 10, "useinbandfec": 1 },
                "rtcpFeedback": [{ "type": "transport-cc", "parameter": "" }]
            }],
            "headerExtensions": []
        })
    }
}

impl Default for SignalingRelay {
    fn default() -> Self {
        Self::new()
    }
}

fn ice_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[async_trait]
impl MediaBackend for SignalingRelay {
    fn is_available(&self) -> bool {
        false
    }

    async fn router_rtp_capabilities(&self, _room_id: &str) -> Result<Value, MediaError> {
        Ok(Self::fixed_rtp_capabilities())
    }

    async fn create_transport(&self, room_id: &str, conn_id: &str) -> Result<Value, MediaError> {
        let transport_id = Uuid::new_v4().to_string();
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room_id.to_string())
            .or_default()
            .transports
            .insert(transport_id.clone(), conn_id.to_string());
        debug!(%room_id, %conn_id, %transport_id, "synthetic transport issued");

        // Placeholder ICE/DTLS parameters: enough shape for a client to run
        // its uniform call sequence, not a reachable endpoint.
        Ok(json!({
            "id": transport_id,
            "iceParameters": {
                "usernameFragment": ice_token(8),
                "password": ice_token(22),
                "iceLite": true
            },
            "iceCandidates": [],
            "dtlsParameters": { "role": "auto", "fingerprints": [] }
        }))
    }

    async fn connect_transport(
        &self,
        room_id: &str,
        _conn_id: &str,
        transport_id: &str,
        _dtls_parameters: Value,
    ) -> Result<(), MediaError> {
        let rooms = self.rooms.lock();
        let known = rooms
            .get(room_id)
            .is_some_and(|r| r.transports.contains_key(transport_id));
        if known { Ok(()) } else { Err(MediaError::TransportNotFound) }
    }

    async fn produce(
        &self,
        room_id: &str,
        conn_id: &str,
        transport_id: &str,
        kind: &str,
        _rtp_parameters: Value,
    ) -> Result<String, MediaError> {
        let mut rooms = self.rooms.lock();
        let room = rooms.get_mut(room_id).ok_or(MediaError::TransportNotFound)?;
        if !room.transports.contains_key(transport_id) {
            return Err(MediaError::TransportNotFound);
        }
        let id = Uuid::new_v4().to_string();
        room.producers.push(RelayProducer {
            id: id.clone(),
            conn_id: conn_id.to_string(),
            kind: kind.to_string(),
        });
        debug!(%room_id, %conn_id, producer_id = %id, "synthetic producer registered");
        Ok(id)
    }

    async fn resume_consumer(
        &self,
        _room_id: &str,
        _conn_id: &str,
        _consumer_id: &str,
    ) -> Result<(), MediaError> {
        // Nothing to resume: audio never flows through the relay.
        Ok(())
    }

    fn producers_for(&self, room_id: &str, conn_id: &str) -> Vec<ProducerInfo> {
        let rooms = self.rooms.lock();
        rooms
            .get(room_id)
            .map(|room| {
                room.producers
                    .iter()
                    .filter(|p| p.conn_id != conn_id)
                    .map(|p| ProducerInfo {
                        producer_id: p.id.clone(),
                        user_id: p.conn_id.clone(),
                        kind: p.kind.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn close_participant(&self, room_id: &str, conn_id: &str) {
        let mut rooms = self.rooms.lock();
        if let Some(room) = rooms.get_mut(room_id) {
            room.transports.retain(|_, owner| owner != conn_id);
            room.producers.retain(|p| p.conn_id != conn_id);
            if room.transports.is_empty() && room.producers.is_empty() {
                rooms.remove(room_id);
            }
        }
    }
}
