use bevy::prelude::*;

use super::{Move, MoveContext, LAYER_AIR};
use crate::math;
use crate::state::frame_angle;

/// Horizontal burst in the air, once per airtime.
///
/// Gravity is suspended for `duration` seconds; the countdown ticks once
/// per fixed step.
#[derive(Debug, Clone, Reflect)]
pub struct AirDash {
    pub speed: f32,
    pub duration: f32,
    remaining: f32,
    used: bool,
}

impl Default for AirDash {
    fn default() -> Self {
        Self {
            speed: 8.0,
            duration: 0.25,
            remaining: 0.0,
            used: false,
        }
    }
}

impl AirDash {
    pub fn remaining(&self) -> f32 {
        self.remaining
    }
}

impl Move for AirDash {
    fn name(&self) -> &'static str {
        "air_dash"
    }

    fn layer(&self) -> i32 {
        LAYER_AIR
    }

    fn on_tick(&mut self, ctx: &MoveContext) {
        if ctx.motion.grounded {
            self.used = false;
        }
    }

    fn is_available(&self, ctx: &MoveContext) -> bool {
        !ctx.motion.grounded && !self.used
    }

    fn should_activate(&self, ctx: &MoveContext) -> bool {
        ctx.input.jump_pressed()
    }

    fn on_activate(&mut self, ctx: &mut MoveContext) {
        self.used = true;
        self.remaining = self.duration;
        let right = math::degrees_to_vec(frame_angle(ctx.config.gravity_direction));
        ctx.motion.velocity = right * ctx.motion.facing * self.speed;
    }

    fn on_step(&mut self, ctx: &mut MoveContext) {
        self.remaining -= ctx.dt;
        ctx.modifiers.gravity_scale = 0.0;
    }

    fn is_complete(&self, ctx: &MoveContext) -> bool {
        self.remaining <= 0.0 || ctx.motion.grounded
    }

    fn on_interrupt(&mut self, _ctx: &mut MoveContext) {
        self.remaining = 0.0;
    }
}
