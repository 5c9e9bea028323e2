//! Display events emitted by the engine
//!
//! The daemon never renders anything itself; every visible change is
//! published as a `DisplayEvent` and forwarded to whichever overlay
//! renderer is subscribed over IPC.

use serde::{Deserialize, Serialize};

/// Events emitted by the display engine for the overlay renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayEvent {
    /// A new combination string should be shown
    TextShown {
        /// The combination, e.g. "CTRL+SHIFT+A"
        text: String,
    },

    /// The hide timer elapsed; the overlay should show nothing
    TextCleared,

    /// Geometry or font changed after a configuration reload
    Reconfigured {
        /// Horizontal position; `None` means "centre horizontally"
        x: Option<i32>,
        y: i32,
        w: i32,
        h: i32,
        font_name: String,
        font_size: u32,
    },
}

impl std::fmt::Display for DisplayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayEvent::TextShown { text } => write!(f, "TEXT_SHOWN ({text})"),
            DisplayEvent::TextCleared => write!(f, "TEXT_CLEARED"),
            DisplayEvent::Reconfigured { w, h, .. } => {
                write!(f, "RECONFIGURED ({w}x{h})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = DisplayEvent::TextShown {
            text: "CTRL+K".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("text_shown"));
        assert!(json.contains("CTRL+K"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"text_cleared"}"#;
        let event: DisplayEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, DisplayEvent::TextCleared));
    }
}
