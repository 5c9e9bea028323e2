//! Global keyboard capture
//!
//! Reduces raw OS key codes to `KeyEvent`s and feeds them into the
//! engine channel via a low-level keyboard hook.

pub mod keys;
mod listener;

pub use keys::{KeyEvent, KeyIdentity, Modifier};
pub use listener::{KeyListener, ListenerControl, ListenerError};
