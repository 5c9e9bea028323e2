//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian
//! length. The companion settings/tray/renderer process is the only
//! intended client.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::events::DisplayEvent;

/// Requests from the settings/tray companion to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Request the active configuration snapshot
    GetConfig,

    /// Persist and hot-apply a new configuration snapshot
    ApplyConfig { config: Config },

    /// Upgrade this connection to a display-event push stream
    Subscribe,
}

/// Responses from daemon to the companion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// The active configuration snapshot
    Config(Config),

    /// Configuration applied and persisted
    Applied,

    /// Subscription confirmed; display events follow
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A display change the overlay renderer must mirror
    Display(DisplayEvent),
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether the global key listener is installed
    pub listener_running: bool,

    /// Whether combination text is currently shown
    pub showing: bool,

    /// Number of configured target executables
    pub targets: usize,

    /// Uptime in seconds
    pub uptime_secs: u64,
}
