//! Per-step input.
//!
//! [`MoveInput`] is written by gameplay code (player input, AI, replays) and
//! read by the integrator and the moves. Edge detection compares against the
//! values latched at the end of the previous tick.

use bevy::prelude::*;

/// Input for one fixed step.
///
/// ```rust
/// use terrain_runner::prelude::*;
///
/// let mut input = MoveInput::new();
/// input.set_horizontal(1.0);
/// input.set_jump(true);
/// assert!(input.jump_pressed());
///
/// input.latch();
/// assert!(input.jump_held());
/// assert!(!input.jump_pressed());
/// ```
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct MoveInput {
    /// Horizontal direction, -1.0 (left) to 1.0 (right).
    pub horizontal: f32,
    /// Vertical direction, -1.0 (down) to 1.0 (up).
    pub vertical: f32,
    /// Jump button held.
    pub jump: bool,
    /// Values at the end of the previous tick.
    pub(crate) previous_vertical: f32,
    pub(crate) previous_jump: bool,
}

impl MoveInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set horizontal input, clamped to [-1, 1]. NaN is treated as no input.
    pub fn set_horizontal(&mut self, value: f32) {
        self.horizontal = clamp_axis(value);
    }

    /// Set vertical input, clamped to [-1, 1].
    pub fn set_vertical(&mut self, value: f32) {
        self.vertical = clamp_axis(value);
    }

    pub fn set_jump(&mut self, held: bool) {
        self.jump = held;
    }

    /// Reset all current values. Previous-tick values are kept.
    pub fn clear(&mut self) {
        self.horizontal = 0.0;
        self.vertical = 0.0;
        self.jump = false;
    }

    /// Horizontal input with a small dead zone applied.
    pub fn horizontal_axis(&self) -> f32 {
        if self.horizontal.abs() < 0.1 {
            0.0
        } else {
            self.horizontal
        }
    }

    pub fn jump_held(&self) -> bool {
        self.jump
    }

    /// Jump went from released to held this tick.
    pub fn jump_pressed(&self) -> bool {
        self.jump && !self.previous_jump
    }

    /// Jump went from held to released this tick.
    pub fn jump_released(&self) -> bool {
        !self.jump && self.previous_jump
    }

    pub fn down_held(&self) -> bool {
        self.vertical < -0.5
    }

    /// Down went from released to held this tick.
    pub fn down_pressed(&self) -> bool {
        self.down_held() && self.previous_vertical >= -0.5
    }

    /// Store the current values for next tick's edge detection.
    pub fn latch(&mut self) {
        self.previous_vertical = self.vertical;
        self.previous_jump = self.jump;
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
