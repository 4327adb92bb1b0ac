use std::sync::Arc;

use pairpad_services::RoomStore;
use pairpad_services::media::MediaBackend;

use crate::ws::sequencer::RoomSequencer;
use crate::ws::storage::WsStorage;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RoomStore>,
    pub media: Arc<dyn MediaBackend>,
    pub ws_storage: Arc<WsStorage>,
    pub sequencer: Arc<RoomSequencer>,
}

impl AppState {
    pub fn new(store: Arc<RoomStore>, media: Arc<dyn MediaBackend>) -> Self {
        Self {
            store,
            media,
            ws_storage: Arc::new(WsStorage::new()),
            sequencer: Arc::new(RoomSequencer::new()),
        }
    }

    /// True when no media router is available and calls run over the
    /// peer-to-peer fallback path.
    pub fn fallback_mode(&self) -> bool {
        !self.media.is_available()
    }
}
