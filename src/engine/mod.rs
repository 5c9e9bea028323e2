//! Display engine: the key-capture-and-display core
//!
//! A single-threaded actor consuming key events, fired hide timers and
//! administrative commands from one channel, reducing presses into a
//! combination string and pushing it to the display sink.

mod combo;
mod hide;
mod machine;

pub use machine::{DisplayEngine, EngineError, EngineMsg, EngineState, EngineStatus};
