//! Editor commands and key bindings.
//!
//! `EditorCommand` names the operations a key press can trigger. The host
//! converts its native key events into a `KeyCombo` and asks `KeyBindings`
//! which command, if any, it maps to.

use std::collections::HashMap;

use smol_str::SmolStr;

use crate::types::BlockType;

/// Semantic editor operations, decoupled from how they are triggered.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommand {
    // === Inline styles ===
    ToggleBold,
    ToggleItalic,
    ToggleUnderline,
    ToggleCode,
    ToggleStrikethrough,
    /// Toggle a member of the highlight color family.
    ToggleColor(SmolStr),
    /// Mark the selection with the highlight link.
    HighlightOn,
    /// Clear the highlight link from the selection.
    HighlightOff,

    // === Blocks ===
    ToggleBlockType(BlockType),
    /// Toggle `textAlign` on the start block.
    ToggleAlignment(SmolStr),
    Indent,
    Outdent,

    // === Structure ===
    /// Enter.
    SplitBlock,
    /// Shift+Enter.
    SoftNewline,
    /// Tab / Shift+Tab inside a list.
    AdjustListDepth { increase: bool },

    // === Entities ===
    SetLink {
        url: String,
        target_blank: bool,
        no_follow: bool,
    },
    RemoveLink,
    InsertImage { src: String },
    InsertSymbol(SmolStr),

    // === External insertion ===
    InsertPoint,
    /// Resolve the word under the selection through the host resolver.
    SyncInsert,
    /// Ask the host to run its own asynchronous insertion.
    RequestAsyncInsert,

    // === History ===
    Undo,
    Redo,
}

impl EditorCommand {
    /// Commands the editor cannot finish synchronously.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::SyncInsert | Self::RequestAsyncInsert)
    }
}

/// Key values for keyboard input.
///
/// Platform-specific code converts native key events to this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A character key.
    Character(SmolStr),

    /// Unknown/unidentified key.
    Unidentified,

    // === Whitespace / editing ===
    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,

    // === Navigation ===
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
    PageUp,
    PageDown,

    // === Modifiers ===
    Alt,
    Control,
    Meta,
    Shift,

    // === Function keys ===
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl Key {
    /// Create a character key. Letters are stored lower-case so bindings
    /// match regardless of Shift.
    pub fn character(s: impl Into<SmolStr>) -> Self {
        let s: SmolStr = s.into();
        if s.chars().all(|c| c.is_ascii_uppercase()) {
            Self::Character(SmolStr::new(s.to_ascii_lowercase()))
        } else {
            Self::Character(s)
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::ArrowLeft
                | Self::ArrowRight
                | Self::ArrowUp
                | Self::ArrowDown
                | Self::Home
                | Self::End
                | Self::PageUp
                | Self::PageDown
        )
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self, Self::Alt | Self::Control | Self::Meta | Self::Shift)
    }
}

/// Modifier key state for a key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        ctrl: false,
        alt: false,
        shift: true,
        meta: false,
    };

    pub const META: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: true,
    };

    pub const CTRL_SHIFT: Self = Self {
        ctrl: true,
        alt: false,
        shift: true,
        meta: false,
    };

    pub const META_SHIFT: Self = Self {
        ctrl: false,
        alt: false,
        shift: true,
        meta: true,
    };

    /// Get the primary modifier for the platform (Cmd on Mac, Ctrl elsewhere).
    pub fn primary(is_mac: bool) -> Self {
        if is_mac { Self::META } else { Self::CTRL }
    }

    /// Get the primary modifier + Shift for the platform.
    pub fn primary_shift(is_mac: bool) -> Self {
        if is_mac {
            Self::META_SHIFT
        } else {
            Self::CTRL_SHIFT
        }
    }
}

/// A key combination for triggering a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyCombo {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn ctrl(key: Key) -> Self {
        Self::with_modifiers(key, Modifiers::CTRL)
    }

    pub fn shift(key: Key) -> Self {
        Self::with_modifiers(key, Modifiers::SHIFT)
    }

    pub fn primary(key: Key, is_mac: bool) -> Self {
        Self::with_modifiers(key, Modifiers::primary(is_mac))
    }

    pub fn primary_shift(key: Key, is_mac: bool) -> Self {
        Self::with_modifiers(key, Modifiers::primary_shift(is_mac))
    }
}

/// Result of handling a keydown event.
#[derive(Debug, Clone, PartialEq)]
pub enum KeydownResult {
    /// Event was handled, prevent default.
    Handled,
    /// Event was not a keybinding, let platform handle it.
    NotHandled,
    /// Event should be passed through (navigation, etc.).
    PassThrough,
    /// Event maps to a command the host has to carry out itself.
    Delegated(EditorCommand),
}

/// Key combination to command table.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    bindings: HashMap<KeyCombo, EditorCommand>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::default_for_platform(false)
    }
}

impl KeyBindings {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// The stock bindings. Formatting and history use Cmd on Mac and Ctrl
    /// elsewhere; the insertion keys always use Ctrl.
    pub fn default_for_platform(is_mac: bool) -> Self {
        let ch = |c: &str| Key::character(c);
        let mut bindings = Self::empty();

        bindings.bind(KeyCombo::primary(ch("b"), is_mac), EditorCommand::ToggleBold);
        bindings.bind(KeyCombo::primary(ch("i"), is_mac), EditorCommand::ToggleItalic);
        bindings.bind(KeyCombo::primary(ch("k"), is_mac), EditorCommand::ToggleItalic);
        bindings.bind(KeyCombo::primary(ch("u"), is_mac), EditorCommand::ToggleUnderline);

        bindings.bind(KeyCombo::shift(Key::F4), EditorCommand::InsertPoint);
        bindings.bind(KeyCombo::ctrl(Key::F4), EditorCommand::RequestAsyncInsert);
        bindings.bind(KeyCombo::new(Key::F4), EditorCommand::SyncInsert);
        bindings.bind(KeyCombo::new(Key::F8), EditorCommand::HighlightOn);
        bindings.bind(KeyCombo::new(Key::F9), EditorCommand::HighlightOff);

        bindings.bind(
            KeyCombo::new(Key::Tab),
            EditorCommand::AdjustListDepth { increase: true },
        );
        bindings.bind(
            KeyCombo::shift(Key::Tab),
            EditorCommand::AdjustListDepth { increase: false },
        );
        bindings.bind(KeyCombo::new(Key::Enter), EditorCommand::SplitBlock);
        bindings.bind(KeyCombo::shift(Key::Enter), EditorCommand::SoftNewline);

        bindings.bind(KeyCombo::primary(ch("z"), is_mac), EditorCommand::Undo);
        bindings.bind(KeyCombo::primary_shift(ch("z"), is_mac), EditorCommand::Redo);
        bindings.bind(KeyCombo::primary(ch("y"), is_mac), EditorCommand::Redo);

        bindings
    }

    /// Bind `combo`, replacing any previous command for it.
    pub fn bind(&mut self, combo: KeyCombo, command: EditorCommand) -> Option<EditorCommand> {
        self.bindings.insert(combo, command)
    }

    pub fn unbind(&mut self, combo: &KeyCombo) -> Option<EditorCommand> {
        self.bindings.remove(combo)
    }

    pub fn lookup(&self, combo: &KeyCombo) -> Option<&EditorCommand> {
        self.bindings.get(combo)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let bindings = KeyBindings::default();
        assert_eq!(
            bindings.lookup(&KeyCombo::ctrl(Key::character("b"))),
            Some(&EditorCommand::ToggleBold)
        );
        assert_eq!(
            bindings.lookup(&KeyCombo::ctrl(Key::character("k"))),
            Some(&EditorCommand::ToggleItalic)
        );
        assert_eq!(
            bindings.lookup(&KeyCombo::new(Key::F4)),
            Some(&EditorCommand::SyncInsert)
        );
        assert_eq!(
            bindings.lookup(&KeyCombo::shift(Key::F4)),
            Some(&EditorCommand::InsertPoint)
        );
        assert_eq!(
            bindings.lookup(&KeyCombo::ctrl(Key::F4)),
            Some(&EditorCommand::RequestAsyncInsert)
        );
        assert_eq!(
            bindings.lookup(&KeyCombo::with_modifiers(
                Key::character("Z"),
                Modifiers::CTRL_SHIFT
            )),
            Some(&EditorCommand::Redo)
        );
        assert!(bindings.lookup(&KeyCombo::new(Key::character("b"))).is_none());
    }

    #[test]
    fn test_mac_uses_meta() {
        let bindings = KeyBindings::default_for_platform(true);
        assert_eq!(
            bindings.lookup(&KeyCombo::with_modifiers(Key::character("b"), Modifiers::META)),
            Some(&EditorCommand::ToggleBold)
        );
        assert!(bindings.lookup(&KeyCombo::ctrl(Key::character("b"))).is_none());
        // insertion keys stay on Ctrl
        assert!(bindings.lookup(&KeyCombo::ctrl(Key::F4)).is_some());
    }

    #[test]
    fn test_rebind() {
        let mut bindings = KeyBindings::default();
        let combo = KeyCombo::new(Key::F8);
        let old = bindings.bind(combo.clone(), EditorCommand::ToggleColor("red-dropdown_option".into()));
        assert_eq!(old, Some(EditorCommand::HighlightOn));
        assert_eq!(bindings.unbind(&combo), Some(EditorCommand::ToggleColor("red-dropdown_option".into())));
        assert!(bindings.lookup(&combo).is_none());
    }

    #[test]
    fn test_async_commands() {
        assert!(EditorCommand::SyncInsert.is_async());
        assert!(!EditorCommand::InsertPoint.is_async());
    }
}
