//! Key combination reduction
//!
//! Folds press/release events into the displayed combination string.
//! Modifiers stack in press order; any non-modifier key terminates the
//! combination and restarts it; any release collapses the stack.

use crate::capture::keys::KeyIdentity;

/// Modifier labels currently stacked, in press order.
///
/// Pure state: reduction is a function of `(event, state)` with no
/// other inputs, which is what makes the engine testable without an OS
/// hook behind it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComboState {
    stacked: Vec<String>,
}

impl ComboState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a press event into the state and return the new display
    /// string.
    ///
    /// Rules, in order:
    /// 1. A character or named non-modifier key appends to a snapshot
    ///    of the current stack and clears the stack: literal keys
    ///    terminate the combination.
    /// 2. Re-pressing a modifier that is the sole stacked key collapses
    ///    display and stack to just that modifier.
    /// 3. A modifier auto-repeating while others are stacked adds
    ///    nothing; order stays original press order.
    /// 4. A new modifier appends to both stack and snapshot.
    pub fn reduce_press(&mut self, key: &KeyIdentity) -> String {
        let mut shown = self.stacked.clone();

        match key {
            KeyIdentity::Character(_) | KeyIdentity::Named(_) => {
                self.stacked.clear();
                shown.push(key.label());
            }
            KeyIdentity::Modifier(m) => {
                let label = m.label();
                if self.stacked.len() == 1 && self.stacked[0] == label {
                    shown = vec![label.to_string()];
                } else if self.stacked.iter().any(|stacked| stacked.as_str() == label) {
                    // held modifier repeating while another is stacked
                } else {
                    self.stacked.push(label.to_string());
                    shown.push(label.to_string());
                }
            }
        }

        shown.join("+")
    }

    /// A release always collapses the stack, regardless of which key
    /// went up
    pub fn reduce_release(&mut self) {
        self.stacked.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stacked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::keys::{KeyIdentity, Modifier};

    fn ctrl() -> KeyIdentity {
        KeyIdentity::Modifier(Modifier::Ctrl)
    }

    fn shift() -> KeyIdentity {
        KeyIdentity::Modifier(Modifier::Shift)
    }

    #[test]
    fn test_single_character() {
        let mut state = ComboState::new();
        assert_eq!(state.reduce_press(&KeyIdentity::Character('a')), "A");
        assert!(state.is_empty());
    }

    #[test]
    fn test_modifier_stacking_order_is_press_order() {
        let mut state = ComboState::new();
        assert_eq!(state.reduce_press(&ctrl()), "CTRL");
        assert_eq!(state.reduce_press(&shift()), "CTRL+SHIFT");
        assert_eq!(
            state.reduce_press(&KeyIdentity::Character('a')),
            "CTRL+SHIFT+A"
        );
        // The character cleared the stack
        assert!(state.is_empty());
    }

    #[test]
    fn test_shift_before_ctrl_keeps_that_order() {
        let mut state = ComboState::new();
        state.reduce_press(&shift());
        assert_eq!(state.reduce_press(&ctrl()), "SHIFT+CTRL");
    }

    #[test]
    fn test_duplicate_sole_modifier_collapses() {
        let mut state = ComboState::new();
        state.reduce_press(&ctrl());
        assert_eq!(state.reduce_press(&ctrl()), "CTRL");
        assert_eq!(state.reduce_press(&ctrl()), "CTRL");
    }

    #[test]
    fn test_auto_repeat_while_stacked_does_not_duplicate() {
        let mut state = ComboState::new();
        state.reduce_press(&ctrl());
        state.reduce_press(&shift());
        // CTRL auto-repeats while SHIFT is also held
        assert_eq!(state.reduce_press(&ctrl()), "CTRL+SHIFT");
        assert_eq!(state.reduce_press(&shift()), "CTRL+SHIFT");
    }

    #[test]
    fn test_release_resets_stack() {
        let mut state = ComboState::new();
        state.reduce_press(&ctrl());
        state.reduce_release();
        assert_eq!(state.reduce_press(&shift()), "SHIFT");
        assert_eq!(state.reduce_press(&KeyIdentity::Character('b')), "SHIFT+B");
    }

    #[test]
    fn test_named_key_behaves_like_character() {
        let mut state = ComboState::new();
        state.reduce_press(&ctrl());
        assert_eq!(
            state.reduce_press(&KeyIdentity::Named("ENTER")),
            "CTRL+ENTER"
        );
        assert!(state.is_empty());
        // The next key starts a fresh combination
        assert_eq!(state.reduce_press(&KeyIdentity::Named("ESC")), "ESC");
    }

    #[test]
    fn test_character_after_character_replaces() {
        let mut state = ComboState::new();
        state.reduce_press(&KeyIdentity::Character('a'));
        assert_eq!(state.reduce_press(&KeyIdentity::Character('b')), "B");
    }
}
