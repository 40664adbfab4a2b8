//! Keyboard and mouse state gathered from window/device events.

use std::collections::HashSet;

use corelib::Vec2;
use winit::keyboard::KeyCode;

/// Pressed keys plus a virtual cursor. The real cursor is grabbed, so the
/// cursor position is accumulated from raw mouse motion.
#[derive(Debug, Default)]
pub struct InputState {
    pressed: HashSet<KeyCode>,
    cursor: Option<Vec2>,
}

impl InputState {
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    pub fn set_pressed(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.pressed.insert(key);
        } else {
            self.pressed.remove(&key);
        }
    }

    pub fn on_mouse_motion(&mut self, dx: f32, dy: f32) {
        let cursor = self.cursor.unwrap_or_default();
        self.cursor = Some(cursor + Vec2::new(dx, dy));
    }

    /// Virtual cursor position; `None` until the mouse first moves.
    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_toggle() {
        let mut input = InputState::default();
        input.set_pressed(KeyCode::KeyW, true);
        assert!(input.is_pressed(KeyCode::KeyW));
        input.set_pressed(KeyCode::KeyW, false);
        assert!(!input.is_pressed(KeyCode::KeyW));
    }

    #[test]
    fn cursor_accumulates_motion() {
        let mut input = InputState::default();
        assert_eq!(input.cursor(), None);
        input.on_mouse_motion(3.0, -1.0);
        input.on_mouse_motion(2.0, 4.0);
        assert_eq!(input.cursor(), Some(Vec2::new(5.0, 3.0)));
    }
}
