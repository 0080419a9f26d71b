use bevy::prelude::*;

use super::{Move, MoveContext, LAYER_POSTURE};

/// Crouch while standing (nearly) still. Locks horizontal control.
#[derive(Debug, Clone, Reflect)]
pub struct Duck {
    /// Ducking is only possible below this ground speed.
    pub max_speed: f32,
}

impl Default for Duck {
    fn default() -> Self {
        Self { max_speed: 1.0 }
    }
}

impl Move for Duck {
    fn name(&self) -> &'static str {
        "duck"
    }

    fn layer(&self) -> i32 {
        LAYER_POSTURE
    }

    fn is_available(&self, ctx: &MoveContext) -> bool {
        ctx.motion.grounded && ctx.motion.ground_speed.abs() < self.max_speed
    }

    fn should_activate(&self, ctx: &MoveContext) -> bool {
        ctx.input.down_held()
    }

    fn on_activate(&mut self, ctx: &mut MoveContext) {
        ctx.modifiers.control_locked = true;
    }

    fn on_step(&mut self, ctx: &mut MoveContext) {
        ctx.modifiers.control_locked = true;
    }

    fn is_complete(&self, ctx: &MoveContext) -> bool {
        !ctx.input.down_held() || !ctx.motion.grounded
    }
}
