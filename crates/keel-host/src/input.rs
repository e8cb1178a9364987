//! Per-step input snapshots.
//!
//! Device events arrive at any time and accumulate in a *pending* frame.
//! [`InputState::latch`] runs once at the start of each simulation step and
//! freezes the pending frame into the *current* snapshot, keeping the old one
//! as *previous*. Every query reads only the two frozen snapshots, so asking
//! the same question twice within one step always gives the same answer.
//!
//! A key pressed and released between two latches is never seen.

use keel_bridge::{KeyCode, Vector2};

#[derive(Debug, Clone)]
pub struct InputState {
    pending_keys: Vec<bool>,
    current_keys: Vec<bool>,
    previous_keys: Vec<bool>,
    pending_mouse: Vector2,
    current_mouse: Vector2,
    previous_mouse: Vector2,
    pending_wheel: Vector2,
    current_wheel: Vector2,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            pending_keys: vec![false; KeyCode::COUNT],
            current_keys: vec![false; KeyCode::COUNT],
            previous_keys: vec![false; KeyCode::COUNT],
            pending_mouse: Vector2::ZERO,
            current_mouse: Vector2::ZERO,
            previous_mouse: Vector2::ZERO,
            pending_wheel: Vector2::ZERO,
            current_wheel: Vector2::ZERO,
        }
    }

    // -- device events ------------------------------------------------------

    pub fn press(&mut self, key: KeyCode) {
        self.pending_keys[key.ordinal() as usize] = true;
    }

    pub fn release(&mut self, key: KeyCode) {
        self.pending_keys[key.ordinal() as usize] = false;
    }

    pub fn set_mouse_position(&mut self, position: Vector2) {
        self.pending_mouse = position;
    }

    /// Accumulate wheel movement until the next latch.
    pub fn scroll(&mut self, delta: Vector2) {
        self.pending_wheel += delta;
    }

    /// Freeze pending events into the snapshot for the next step.
    pub fn latch(&mut self) {
        std::mem::swap(&mut self.previous_keys, &mut self.current_keys);
        self.current_keys.copy_from_slice(&self.pending_keys);
        self.previous_mouse = self.current_mouse;
        self.current_mouse = self.pending_mouse;
        self.current_wheel = std::mem::take(&mut self.pending_wheel);
    }

    // -- queries ------------------------------------------------------------

    /// Pressed in this step but not the previous one.
    pub fn key_down(&self, key: KeyCode) -> bool {
        let i = key.ordinal() as usize;
        self.current_keys[i] && !self.previous_keys[i]
    }

    pub fn key(&self, key: KeyCode) -> bool {
        self.current_keys[key.ordinal() as usize]
    }

    /// Released in this step after being held in the previous one.
    pub fn key_up(&self, key: KeyCode) -> bool {
        let i = key.ordinal() as usize;
        !self.current_keys[i] && self.previous_keys[i]
    }

    pub fn mouse_position(&self) -> Vector2 {
        self.current_mouse
    }

    pub fn mouse_delta(&self) -> Vector2 {
        self.current_mouse - self.previous_mouse
    }

    pub fn mouse_wheel_delta(&self) -> Vector2 {
        self.current_wheel
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_invisible_until_latched() {
        let mut input = InputState::new();
        input.press(KeyCode::Space);
        assert!(!input.key(KeyCode::Space));
        input.latch();
        assert!(input.key(KeyCode::Space));
    }

    #[test]
    fn down_held_up_sequence() {
        let mut input = InputState::new();
        input.press(KeyCode::W);
        input.latch();
        assert!(input.key_down(KeyCode::W));
        assert!(input.key(KeyCode::W));
        assert!(!input.key_up(KeyCode::W));

        input.latch();
        assert!(!input.key_down(KeyCode::W), "down only on the first step");
        assert!(input.key(KeyCode::W));

        input.release(KeyCode::W);
        input.latch();
        assert!(input.key_up(KeyCode::W));
        assert!(!input.key(KeyCode::W));

        input.latch();
        assert!(!input.key_up(KeyCode::W), "up only on the first step");
    }

    #[test]
    fn queries_are_stable_within_a_step() {
        let mut input = InputState::new();
        input.press(KeyCode::ClickLeft);
        input.latch();
        // Events after the latch do not change this step's answers.
        input.release(KeyCode::ClickLeft);
        assert!(input.key_down(KeyCode::ClickLeft));
        assert!(input.key_down(KeyCode::ClickLeft));
    }

    #[test]
    fn mouse_delta_and_wheel() {
        let mut input = InputState::new();
        input.set_mouse_position(Vector2::new(10.0, 10.0));
        input.latch();
        input.set_mouse_position(Vector2::new(13.0, 8.0));
        input.scroll(Vector2::new(0.0, 1.0));
        input.scroll(Vector2::new(0.0, 2.0));
        input.latch();

        assert_eq!(input.mouse_position(), Vector2::new(13.0, 8.0));
        assert_eq!(input.mouse_delta(), Vector2::new(3.0, -2.0));
        assert_eq!(input.mouse_wheel_delta(), Vector2::new(0.0, 3.0));

        input.latch();
        assert_eq!(input.mouse_delta(), Vector2::ZERO);
        assert_eq!(input.mouse_wheel_delta(), Vector2::ZERO, "wheel resets each step");
    }
}
