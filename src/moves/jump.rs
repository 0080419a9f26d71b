use bevy::prelude::*;

use super::{Move, MoveContext, LAYER_ACTION};
use crate::math;

/// Variable-height jump.
///
/// Launches along the surface normal. Releasing the button while still
/// rising faster than `release_speed` cuts the rise to `release_speed`.
#[derive(Debug, Clone, Reflect)]
pub struct Jump {
    pub speed: f32,
    pub release_speed: f32,
}

impl Default for Jump {
    fn default() -> Self {
        Self {
            speed: 6.5,
            release_speed: 4.0,
        }
    }
}

impl Move for Jump {
    fn name(&self) -> &'static str {
        "jump"
    }

    fn layer(&self) -> i32 {
        LAYER_ACTION
    }

    fn is_available(&self, ctx: &MoveContext) -> bool {
        ctx.motion.grounded
    }

    fn should_activate(&self, ctx: &MoveContext) -> bool {
        ctx.input.jump_pressed()
    }

    fn on_activate(&mut self, ctx: &mut MoveContext) {
        ctx.launch(self.speed);
    }

    fn on_step(&mut self, ctx: &mut MoveContext) {
        if ctx.motion.grounded || ctx.input.jump_held() {
            return;
        }
        let up = -math::degrees_to_vec(ctx.config.gravity_direction);
        let rise = ctx.motion.velocity.dot(up);
        if rise > self.release_speed {
            ctx.motion.velocity -= up * (rise - self.release_speed);
        }
    }

    fn is_complete(&self, ctx: &MoveContext) -> bool {
        ctx.motion.grounded
    }
}
