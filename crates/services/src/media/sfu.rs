use async_trait::async_trait;
use dashmap::DashMap;
use mediasoup::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::num::{NonZeroU8, NonZeroU32};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{error, info};

use super::{MediaBackend, MediaError, ProducerInfo};
use pairpad_config::MediaSettings;

/// Full media-routing backend on top of a mediasoup worker. One router per
/// room, created lazily on first use; the creation lock serializes two
/// connections racing to create the first router for the same room.
pub struct SfuBackend {
    worker: Worker,
    alive: Arc<AtomicBool>,
    announced_ip: Option<String>,
    routers: Mutex<HashMap<String, Router>>,
    /// transport id -> (room id, conn id, transport handle)
    transports: DashMap<String, (String, String, WebRtcTransport)>,
    /// producer id -> (room id, conn id, handle) — holding the handle keeps
    /// the producer open.
    producers: DashMap<String, (String, String, Producer)>,
}

impl SfuBackend {
    /// Initialize the worker and health-check it. Any failure here makes the
    /// process fall back to the signaling relay.
    pub async fn init(settings: &MediaSettings) -> Result<Self, MediaError> {
        let manager = WorkerManager::new();
        let mut worker_settings = WorkerSettings::default();
        worker_settings.rtc_ports_range = settings.rtc_min_port..=settings.rtc_max_port;
        let worker = manager
            .create_worker(worker_settings)
            .await
            .map_err(|e| MediaError::Backend(e.to_string()))?;

        // Health check before advertising the capability.
        worker
            .dump()
            .await
            .map_err(|e| MediaError::Backend(e.to_string()))?;

        let alive = Arc::new(AtomicBool::new(true));
        {
            let alive = alive.clone();
            worker
                .on_dead(move |reason| {
                    error!(?reason, "mediasoup worker died, downgrading capability");
                    alive.store(false, Ordering::SeqCst);
                })
                .detach();
        }

        info!(pid = worker.pid(), "mediasoup worker running");
        Ok(Self {
            worker,
            alive,
            announced_ip: settings.announced_ip.clone(),
            routers: Mutex::new(HashMap::new()),
            transports: DashMap::new(),
            producers: DashMap::new(),
        })
    }

    fn audio_codecs() -> Vec<RtpCodecCapability> {
        vec![RtpCodecCapability::Audio {
            mime_type: MimeTypeAudio::Opus,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(48000).unwrap(),
            channels: NonZeroU8::new(2).unwrap(),
            parameters: RtpCodecParametersParameters::from([("useinbandfec", 1_u32.into())]),
            rtcp_feedback: vec![RtcpFeedback::TransportCc],
        }]
    }

    /// Existing router for the room, or a new one. Held behind an async
    /// mutex so interleaved first calls cannot each create a router.
    async fn router(&self, room_id: &str) -> Result<Router, MediaError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(MediaError::Unavailable);
        }
        let mut routers = self.routers.lock().await;
        if let Some(router) = routers.get(room_id) {
            return Ok(router.clone());
        }
        let router = self
            .worker
            .create_router(RouterOptions::new(Self::audio_codecs()))
            .await
            .map_err(|e| MediaError::Backend(e.to_string()))?;
        info!(%room_id, router_id = %router.id(), "router created");
        routers.insert(room_id.to_string(), router.clone());
        Ok(router)
    }
}

#[async_trait]
impl MediaBackend for SfuBackend {
    fn is_available(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn router_rtp_capabilities(&self, room_id: &str) -> Result<Value, MediaError> {
        let router = self.router(room_id).await?;
        serde_json::to_value(router.rtp_capabilities())
            .map_err(|e| MediaError::Backend(e.to_string()))
    }

    async fn create_transport(&self, room_id: &str, conn_id: &str) -> Result<Value, MediaError> {
        let router = self.router(room_id).await?;
        let listen_ip = ListenInfo {
            protocol: Protocol::Udp,
            ip: "0.0.0.0".parse().map_err(|_| MediaError::Unavailable)?,
            announced_address: self.announced_ip.clone(),
            expose_internal_ip: false,
            port: None,
            port_range: None,
            flags: None,
            send_buffer_size: None,
            recv_buffer_size: None,
        };
        let transport = router
            .create_webrtc_transport(WebRtcTransportOptions::new(WebRtcTransportListenInfos::new(
                listen_ip,
            )))
            .await
            .map_err(|e| MediaError::Backend(e.to_string()))?;

        let descriptor = serde_json::json!({
            "id": transport.id().to_string(),
            "iceParameters": transport.ice_parameters(),
            "iceCandidates": transport.ice_candidates(),
            "dtlsParameters": transport.dtls_parameters(),
        });
        self.transports.insert(
            transport.id().to_string(),
            (room_id.to_string(), conn_id.to_string(), transport),
        );
        Ok(descriptor)
    }

    async fn connect_transport(
        &self,
        _room_id: &str,
        _conn_id: &str,
        transport_id: &str,
        dtls_parameters: Value,
    ) -> Result<(), MediaError> {
        let dtls_parameters: DtlsParameters = serde_json::from_value(dtls_parameters)
            .map_err(|e| MediaError::Backend(e.to_string()))?;
        let transport = self
            .transports
            .get(transport_id)
            .map(|entry| entry.value().2.clone())
            .ok_or(MediaError::TransportNotFound)?;
        transport
            .connect(WebRtcTransportRemoteParameters { dtls_parameters })
            .await
            .map_err(|e| MediaError::Backend(e.to_string()))
    }

    async fn produce(
        &self,
        room_id: &str,
        conn_id: &str,
        transport_id: &str,
        kind: &str,
        rtp_parameters: Value,
    ) -> Result<String, MediaError> {
        let media_kind = match kind {
            "audio" => MediaKind::Audio,
            "video" => MediaKind::Video,
            other => return Err(MediaError::Backend(format!("unknown media kind {other}"))),
        };
        let rtp_parameters: RtpParameters = serde_json::from_value(rtp_parameters)
            .map_err(|e| MediaError::Backend(e.to_string()))?;
        let transport = self
            .transports
            .get(transport_id)
            .map(|entry| entry.value().2.clone())
            .ok_or(MediaError::TransportNotFound)?;

        let producer = transport
            .produce(ProducerOptions::new(media_kind, rtp_parameters))
            .await
            .map_err(|e| MediaError::Backend(e.to_string()))?;
        let id = producer.id().to_string();
        self.producers
            .insert(id.clone(), (room_id.to_string(), conn_id.to_string(), producer));
        Ok(id)
    }

    async fn resume_consumer(
        &self,
        _room_id: &str,
        _conn_id: &str,
        _consumer_id: &str,
    ) -> Result<(), MediaError> {
        // Consumers are negotiated client-side against the router; there is
        // no server-held consumer state to resume in this deployment.
        Ok(())
    }

    fn producers_for(&self, room_id: &str, conn_id: &str) -> Vec<ProducerInfo> {
        self.producers
            .iter()
            .filter(|entry| {
                let (room, owner, _) = entry.value();
                room == room_id && owner != conn_id
            })
            .map(|entry| {
                let (_, owner, producer) = entry.value();
                ProducerInfo {
                    producer_id: entry.key().clone(),
                    user_id: owner.clone(),
                    kind: match producer.kind() {
                        MediaKind::Audio => "audio".to_string(),
                        MediaKind::Video => "video".to_string(),
                    },
                }
            })
            .collect()
    }

    fn close_participant(&self, room_id: &str, conn_id: &str) {
        self.transports
            .retain(|_, (room, owner, _)| !(room == room_id && owner == conn_id));
        self.producers
            .retain(|_, (room, owner, _)| !(room == room_id && owner == conn_id));
    }
}
