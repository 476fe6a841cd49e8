//! Pointer and keyboard gestures
//!
//! Only the gestures the widget reacts to are modelled. A control is
//! activated by a primary-button press or by releasing Enter on it.

use serde::{Deserialize, Serialize};

/// Keys the widget distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    /// Any other key, by character
    Char(char),
}

/// Whether the key went down or came up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPhase {
    Down,
    Up,
}

/// A single key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
    pub phase: KeyPhase,
}

impl KeyPress {
    pub fn down(key: Key) -> Self {
        Self {
            key,
            shift: false,
            phase: KeyPhase::Down,
        }
    }

    pub fn up(key: Key) -> Self {
        Self {
            key,
            shift: false,
            phase: KeyPhase::Up,
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Tab, Right or Down: move to the next option
    pub fn is_navigate_next(&self) -> bool {
        matches!(
            (self.key, self.shift),
            (Key::Tab, false) | (Key::Right, _) | (Key::Down, _)
        )
    }

    /// Shift+Tab, Left or Up: move to the previous option
    pub fn is_navigate_previous(&self) -> bool {
        matches!(
            (self.key, self.shift),
            (Key::Tab, true) | (Key::Left, _) | (Key::Up, _)
        )
    }
}

/// Pointer buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// A gesture aimed at a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Pointer button pressed on the control
    PointerDown(PointerButton),
    /// Keyboard transition while the control has focus
    Key(KeyPress),
}

impl Activation {
    /// Primary click, the common case
    pub fn click() -> Self {
        Activation::PointerDown(PointerButton::Primary)
    }

    /// Enter released on the control
    pub fn enter() -> Self {
        Activation::Key(KeyPress::up(Key::Enter))
    }

    /// Returns true if this gesture activates a button
    pub fn activates(&self) -> bool {
        match self {
            Activation::PointerDown(button) => *button == PointerButton::Primary,
            Activation::Key(press) => press.key == Key::Enter && press.phase == KeyPhase::Up,
        }
    }
}
