use bevy::prelude::*;

use super::{Move, MoveContext, LAYER_POSTURE};

/// Curl up while running. No acceleration and half friction until the
/// character slows down on the ground.
#[derive(Debug, Clone, Reflect)]
pub struct Roll {
    /// Minimum ground speed to start rolling.
    pub min_speed: f32,
    /// Rolling ends on the ground below this speed.
    pub unroll_speed: f32,
    pub friction_scale: f32,
}

impl Default for Roll {
    fn default() -> Self {
        Self {
            min_speed: 1.0,
            unroll_speed: 0.5,
            friction_scale: 0.5,
        }
    }
}

impl Move for Roll {
    fn name(&self) -> &'static str {
        "roll"
    }

    fn layer(&self) -> i32 {
        LAYER_POSTURE
    }

    fn is_available(&self, ctx: &MoveContext) -> bool {
        ctx.motion.grounded && ctx.motion.ground_speed.abs() >= self.min_speed
    }

    fn should_activate(&self, ctx: &MoveContext) -> bool {
        ctx.input.down_pressed()
    }

    fn on_step(&mut self, ctx: &mut MoveContext) {
        ctx.modifiers.acceleration_scale = 0.0;
        ctx.modifiers.friction_scale = self.friction_scale;
    }

    fn is_complete(&self, ctx: &MoveContext) -> bool {
        ctx.motion.grounded && ctx.motion.ground_speed.abs() < self.unroll_speed
    }
}
