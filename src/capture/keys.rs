//! Key identity definitions
//!
//! Raw OS key codes are reduced to a small identity type before they
//! reach the engine: a literal character, one of the four stacking
//! modifiers, or a named non-modifier key such as ENTER.

/// Modifier keys that stack rather than replace the displayed text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Cmd,
}

impl Modifier {
    /// Display label, already uppercased
    pub fn label(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "CTRL",
            Modifier::Shift => "SHIFT",
            Modifier::Alt => "ALT",
            Modifier::Cmd => "CMD",
        }
    }
}

/// Identity of a single pressed or released key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyIdentity {
    /// A literal character key ('a', '7', ...)
    Character(char),
    /// One of the stacking modifier keys
    Modifier(Modifier),
    /// A named non-modifier key (ENTER, ESC, F1, ...)
    Named(&'static str),
}

impl KeyIdentity {
    /// Uppercased label as it appears in the combination string
    pub fn label(&self) -> String {
        match self {
            KeyIdentity::Character(c) => c.to_uppercase().to_string(),
            KeyIdentity::Modifier(m) => m.label().to_string(),
            KeyIdentity::Named(name) => (*name).to_string(),
        }
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self, KeyIdentity::Modifier(_))
    }
}

/// A single OS keyboard callback invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    Press(KeyIdentity),
    Release(KeyIdentity),
}

/// Map a Windows virtual-key code to a key identity.
///
/// Left/right variants of a modifier collapse into one identity.
/// Unmapped codes return `None` and are dropped by the hook.
#[cfg(windows)]
pub(crate) fn identity_from_vk(vk: u32) -> Option<KeyIdentity> {
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        VK_BACK, VK_CAPITAL, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE, VK_HOME,
        VK_INSERT, VK_LCONTROL, VK_LEFT, VK_LMENU, VK_LSHIFT, VK_LWIN, VK_MENU, VK_NEXT,
        VK_PRIOR, VK_RCONTROL, VK_RETURN, VK_RIGHT, VK_RMENU, VK_RSHIFT, VK_RWIN, VK_SHIFT,
        VK_SPACE, VK_TAB, VK_UP,
    };

    let modifier = match vk {
        code if code == VK_CONTROL.0 as u32
            || code == VK_LCONTROL.0 as u32
            || code == VK_RCONTROL.0 as u32 =>
        {
            Some(Modifier::Ctrl)
        }
        code if code == VK_SHIFT.0 as u32
            || code == VK_LSHIFT.0 as u32
            || code == VK_RSHIFT.0 as u32 =>
        {
            Some(Modifier::Shift)
        }
        code if code == VK_MENU.0 as u32
            || code == VK_LMENU.0 as u32
            || code == VK_RMENU.0 as u32 =>
        {
            Some(Modifier::Alt)
        }
        code if code == VK_LWIN.0 as u32 || code == VK_RWIN.0 as u32 => Some(Modifier::Cmd),
        _ => None,
    };
    if let Some(m) = modifier {
        return Some(KeyIdentity::Modifier(m));
    }

    // '0'..'9' and 'A'..'Z' virtual keys are their ASCII values
    if (0x30..=0x39).contains(&vk) || (0x41..=0x5A).contains(&vk) {
        return Some(KeyIdentity::Character(vk as u8 as char));
    }

    // F1..F12
    if (0x70..=0x7B).contains(&vk) {
        const F_KEYS: [&str; 12] = [
            "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
        ];
        return Some(KeyIdentity::Named(F_KEYS[(vk - 0x70) as usize]));
    }

    let named = match vk {
        code if code == VK_RETURN.0 as u32 => "ENTER",
        code if code == VK_ESCAPE.0 as u32 => "ESC",
        code if code == VK_SPACE.0 as u32 => "SPACE",
        code if code == VK_TAB.0 as u32 => "TAB",
        code if code == VK_BACK.0 as u32 => "BACKSPACE",
        code if code == VK_DELETE.0 as u32 => "DELETE",
        code if code == VK_INSERT.0 as u32 => "INSERT",
        code if code == VK_HOME.0 as u32 => "HOME",
        code if code == VK_END.0 as u32 => "END",
        code if code == VK_PRIOR.0 as u32 => "PAGEUP",
        code if code == VK_NEXT.0 as u32 => "PAGEDOWN",
        code if code == VK_UP.0 as u32 => "UP",
        code if code == VK_DOWN.0 as u32 => "DOWN",
        code if code == VK_LEFT.0 as u32 => "LEFT",
        code if code == VK_RIGHT.0 as u32 => "RIGHT",
        code if code == VK_CAPITAL.0 as u32 => "CAPSLOCK",
        _ => return None,
    };
    Some(KeyIdentity::Named(named))
}
