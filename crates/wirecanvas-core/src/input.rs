//! Input event types for pointer, wheel and keyboard handling.
//!
//! Events are platform-neutral; conversions from `winit` types are provided
//! for native shells.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Pointer button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
    Back,
    Forward,
}

impl PointerButton {
    /// Bit this button occupies in [`PointerEvent::buttons`].
    pub fn mask(self) -> u8 {
        match self {
            PointerButton::Primary => 1,
            PointerButton::Secondary => 2,
            PointerButton::Middle => 4,
            PointerButton::Back => 8,
            PointerButton::Forward => 16,
        }
    }
}

impl From<winit::event::MouseButton> for PointerButton {
    fn from(button: winit::event::MouseButton) -> Self {
        use winit::event::MouseButton;
        match button {
            MouseButton::Left => PointerButton::Primary,
            MouseButton::Right => PointerButton::Secondary,
            MouseButton::Middle => PointerButton::Middle,
            MouseButton::Back => PointerButton::Back,
            MouseButton::Forward => PointerButton::Forward,
            MouseButton::Other(_) => PointerButton::Primary,
        }
    }
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false, ctrl: false, alt: false, meta: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true, ctrl: false, alt: false, meta: false };
    pub const CTRL: Modifiers = Modifiers { shift: false, ctrl: true, alt: false, meta: false };
    pub const ALT: Modifiers = Modifiers { shift: false, ctrl: false, alt: true, meta: false };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }

    /// Whether any modifier key is held.
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

impl From<winit::keyboard::ModifiersState> for Modifiers {
    fn from(state: winit::keyboard::ModifiersState) -> Self {
        Self {
            shift: state.shift_key(),
            ctrl: state.control_key(),
            alt: state.alt_key(),
            meta: state.super_key(),
        }
    }
}

/// A pointer down/move/up sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Position in screen coordinates.
    pub position: Point,
    /// Position in graph coordinates. Filled in by the canvas on dispatch.
    pub graph_position: Point,
    /// The button whose state changed (Down/Up); primary for moves.
    pub button: PointerButton,
    /// Bitmask of buttons currently held, see [`PointerButton::mask`].
    pub buttons: u8,
    pub modifiers: Modifiers,
    /// Event time in milliseconds.
    pub timestamp_ms: f64,
    pub pointer_id: u32,
    /// Only the primary pointer drives gesture classification.
    pub is_primary: bool,
}

impl PointerEvent {
    /// A primary-pointer event at `position` with no buttons held.
    pub fn new(position: Point, timestamp_ms: f64) -> Self {
        Self {
            position,
            graph_position: position,
            button: PointerButton::Primary,
            buttons: 0,
            modifiers: Modifiers::NONE,
            timestamp_ms,
            pointer_id: 1,
            is_primary: true,
        }
    }

    /// Event for pressing `button`. The button is added to the held mask.
    pub fn down(position: Point, button: PointerButton, timestamp_ms: f64) -> Self {
        Self {
            button,
            buttons: button.mask(),
            ..Self::new(position, timestamp_ms)
        }
    }

    /// Event for moving with `buttons` held.
    pub fn moved(position: Point, buttons: u8, timestamp_ms: f64) -> Self {
        Self {
            buttons,
            ..Self::new(position, timestamp_ms)
        }
    }

    /// Event for releasing `button`.
    pub fn up(position: Point, button: PointerButton, timestamp_ms: f64) -> Self {
        Self {
            button,
            ..Self::new(position, timestamp_ms)
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_pointer(mut self, pointer_id: u32, is_primary: bool) -> Self {
        self.pointer_id = pointer_id;
        self.is_primary = is_primary;
        self
    }

    /// Whether `button` is currently held.
    pub fn is_held(&self, button: PointerButton) -> bool {
        self.buttons & button.mask() != 0
    }
}

/// Mouse wheel or trackpad scroll sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelEvent {
    /// Position in screen coordinates.
    pub position: Point,
    /// Scroll delta in pixels.
    pub delta: Vec2,
    pub modifiers: Modifiers,
    pub timestamp_ms: f64,
}

impl WheelEvent {
    pub fn new(position: Point, delta: Vec2, timestamp_ms: f64) -> Self {
        Self {
            position,
            delta,
            modifiers: Modifiers::NONE,
            timestamp_ms,
        }
    }

    /// Convert a `winit` scroll delta to pixels. Line deltas use 20px lines.
    pub fn delta_from_winit(delta: winit::event::MouseScrollDelta) -> Vec2 {
        match delta {
            winit::event::MouseScrollDelta::LineDelta(x, y) => {
                Vec2::new(-(x as f64) * 20.0, -(y as f64) * 20.0)
            }
            winit::event::MouseScrollDelta::PixelDelta(pos) => Vec2::new(-pos.x, -pos.y),
        }
    }
}

/// Keys the canvas responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Space,
    Escape,
    Delete,
    Backspace,
    Character(char),
}

impl Key {
    /// Map a `winit` logical key onto a canvas key, if the canvas uses it.
    pub fn from_winit(key: &winit::keyboard::Key) -> Option<Key> {
        use winit::keyboard::{Key as WinitKey, NamedKey};
        match key {
            WinitKey::Named(NamedKey::Space) => Some(Key::Space),
            WinitKey::Named(NamedKey::Escape) => Some(Key::Escape),
            WinitKey::Named(NamedKey::Delete) => Some(Key::Delete),
            WinitKey::Named(NamedKey::Backspace) => Some(Key::Backspace),
            WinitKey::Character(s) => s.chars().next().map(|c| Key::Character(c.to_ascii_lowercase())),
            _ => None,
        }
    }
}

/// Keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    /// True for key-down, false for key-up.
    pub pressed: bool,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn pressed(key: Key, modifiers: Modifiers) -> Self {
        Self { key, pressed: true, modifiers }
    }

    pub fn released(key: Key, modifiers: Modifiers) -> Self {
        Self { key, pressed: false, modifiers }
    }
}
