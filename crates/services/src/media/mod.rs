mod relay;
#[cfg(feature = "sfu")]
mod sfu;

pub use relay::SignalingRelay;
#[cfg(feature = "sfu")]
pub use sfu::SfuBackend;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use pairpad_config::MediaSettings;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("transport not found")]
    TransportNotFound,
    #[error("media backend unavailable")]
    Unavailable,
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerInfo {
    pub producer_id: String,
    pub user_id: String,
    pub kind: String,
}

/// Uniform face of the call backend so the signaling handlers never branch
/// on the capability flag. Two implementations: the mediasoup-backed SFU
/// (`sfu` feature) and the always-fallback [`SignalingRelay`], which mirrors
/// the same request surface with inert descriptors while actual audio flows
/// peer-to-peer.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// The process-wide capability flag. Read by every signaling path,
    /// written only by the backend itself (a fatal backend fault downgrades
    /// it, permanently).
    fn is_available(&self) -> bool;

    async fn router_rtp_capabilities(&self, room_id: &str) -> Result<Value, MediaError>;

    async fn create_transport(&self, room_id: &str, conn_id: &str) -> Result<Value, MediaError>;

    async fn connect_transport(
        &self,
        room_id: &str,
        conn_id: &str,
        transport_id: &str,
        dtls_parameters: Value,
    ) -> Result<(), MediaError>;

    /// Returns the new producer id.
    async fn produce(
        &self,
        room_id: &str,
        conn_id: &str,
        transport_id: &str,
        kind: &str,
        rtp_parameters: Value,
    ) -> Result<String, MediaError>;

    async fn resume_consumer(&self, room_id: &str, conn_id: &str, consumer_id: &str)
    -> Result<(), MediaError>;

    /// Producers visible to `conn_id`, i.e. everyone else's.
    fn producers_for(&self, room_id: &str, conn_id: &str) -> Vec<ProducerInfo>;

    /// Drop every transport/producer owned by the connection.
    fn close_participant(&self, room_id: &str, conn_id: &str);
}

/// Decide, once per process, whether a full media-routing backend is
/// available. Failure is never fatal: every consumer has a complete code
/// path for the relay.
pub async fn detect(settings: &MediaSettings) -> Arc<dyn MediaBackend> {
    if !settings.enabled {
        info!("media backend disabled by configuration, running in fallback mode");
        return Arc::new(SignalingRelay::new());
    }

    #[cfg(feature = "sfu")]
    {
        match SfuBackend::init(settings).await {
            Ok(backend) => {
                info!("media backend initialized, full routing available");
                return Arc::new(backend);
            }
            Err(e) => {
                tracing::warn!(%e, "media backend init failed, falling back to signaling relay");
            }
        }
    }
    #[cfg(not(feature = "sfu"))]
    {
        info!("built without the sfu feature, running in fallback mode");
    }

    Arc::new(SignalingRelay::new())
}
