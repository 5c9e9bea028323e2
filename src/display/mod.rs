//! Display sink boundary
//!
//! The engine writes through this trait and never knows how the text
//! is rendered. The production sink broadcasts `DisplayEvent`s to IPC
//! subscribers (the overlay renderer process).

use tokio::sync::broadcast;
use tracing::trace;

use crate::config::Config;
use crate::events::DisplayEvent;

/// Where combination text ends up
pub trait DisplaySink: Send {
    fn set_text(&mut self, text: &str);
    fn clear(&mut self);
    fn reconfigure(&mut self, config: &Config);
}

/// Sink that publishes display events to subscribed IPC clients.
///
/// Send failures just mean nobody is attached to watch; the engine
/// keeps running either way.
pub struct BroadcastSink {
    event_tx: broadcast::Sender<DisplayEvent>,
}

impl BroadcastSink {
    pub fn new(event_tx: broadcast::Sender<DisplayEvent>) -> Self {
        Self { event_tx }
    }
}

impl DisplaySink for BroadcastSink {
    fn set_text(&mut self, text: &str) {
        trace!(%text, "publishing text");
        let _ = self.event_tx.send(DisplayEvent::TextShown {
            text: text.to_string(),
        });
    }

    fn clear(&mut self) {
        let _ = self.event_tx.send(DisplayEvent::TextCleared);
    }

    fn reconfigure(&mut self, config: &Config) {
        let _ = self.event_tx.send(DisplayEvent::Reconfigured {
            x: config.x,
            y: config.effective_y(),
            w: config.effective_w(),
            h: config.effective_h(),
            font_name: config.effective_font_name().to_string(),
            font_size: config.effective_font_size(),
        });
    }
}
