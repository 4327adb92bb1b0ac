use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Process-wide settings. Defaults are baked in; every value can be
/// overridden through `PAIRPAD_`-prefixed environment variables, e.g.
/// `PAIRPAD_SERVER__PORT=9000` or `PAIRPAD_MEDIA__ENABLED=false`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub media: MediaSettings,
    pub rooms: RoomSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Settings for the optional media-routing backend. When the backend is
/// disabled or fails to initialize, the server runs in signaling-only
/// fallback mode.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub enabled: bool,
    pub rtc_min_port: u16,
    pub rtc_max_port: u16,
    pub announced_ip: Option<String>,
}

/// Idle-room reaping policy. A room with zero members for longer than
/// `reap_grace_secs` is evicted by a background sweep that runs every
/// `reap_interval_secs`. An interval of 0 disables reaping entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomSettings {
    pub reap_interval_secs: u64,
    pub reap_grace_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("media.enabled", true)?
            .set_default("media.rtc_min_port", 40000)?
            .set_default("media.rtc_max_port", 49999)?
            .set_default("media.announced_ip", None::<String>)?
            .set_default("rooms.reap_interval_secs", 300)?
            .set_default("rooms.reap_grace_secs", 3600)?
            .add_source(Environment::with_prefix("PAIRPAD").separator("__"))
            .build()?
            .try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            media: MediaSettings {
                enabled: false,
                rtc_min_port: 40000,
                rtc_max_port: 49999,
                announced_ip: None,
            },
            rooms: RoomSettings {
                reap_interval_secs: 0,
                reap_grace_secs: 3600,
            },
        }
    }
}
