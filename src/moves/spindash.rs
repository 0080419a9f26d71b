use bevy::prelude::*;

use super::{Move, MoveContext, LAYER_ACTION};

/// Charge while ducking, release by letting go of down.
///
/// Each jump press adds `charge_step` up to `max_charge`; the charge bleeds
/// off between presses. On release the ground speed becomes
/// `base_speed + charge` in the facing direction.
#[derive(Debug, Clone, Reflect)]
pub struct Spindash {
    pub base_speed: f32,
    pub charge_step: f32,
    pub max_charge: f32,
    /// Fraction of the charge lost per second.
    pub decay: f32,
    charge: f32,
    released: bool,
}

impl Default for Spindash {
    fn default() -> Self {
        Self {
            base_speed: 8.0,
            charge_step: 2.0,
            max_charge: 8.0,
            decay: 1.875,
            charge: 0.0,
            released: false,
        }
    }
}

impl Spindash {
    pub fn charge(&self) -> f32 {
        self.charge
    }
}

impl Move for Spindash {
    fn name(&self) -> &'static str {
        "spindash"
    }

    fn layer(&self) -> i32 {
        LAYER_ACTION
    }

    fn priority(&self) -> i32 {
        10
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["duck"]
    }

    fn is_available(&self, ctx: &MoveContext) -> bool {
        ctx.motion.grounded && ctx.is_active("duck")
    }

    fn should_activate(&self, ctx: &MoveContext) -> bool {
        ctx.input.jump_pressed()
    }

    fn on_activate(&mut self, ctx: &mut MoveContext) {
        self.charge = 0.0;
        self.released = false;
        ctx.motion.ground_speed = 0.0;
    }

    fn on_step(&mut self, ctx: &mut MoveContext) {
        ctx.modifiers.control_locked = true;
        if !ctx.input.down_held() {
            ctx.motion.ground_speed = ctx.motion.facing * (self.base_speed + self.charge);
            ctx.motion.sync_velocity();
            self.released = true;
            debug!("{:?} spindash released at {:.2}", ctx.character, ctx.motion.ground_speed);
            return;
        }
        self.charge -= self.charge * (self.decay * ctx.dt).min(1.0);
        if ctx.input.jump_pressed() {
            self.charge = (self.charge + self.charge_step).min(self.max_charge);
        }
    }

    fn is_complete(&self, ctx: &MoveContext) -> bool {
        self.released || !ctx.motion.grounded
    }

    fn on_interrupt(&mut self, _ctx: &mut MoveContext) {
        self.charge = 0.0;
        self.released = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::integrator::MotionModifiers;
    use crate::intent::MoveInput;
    use crate::moves::{MoveEventKind, MoveManager};
    use crate::state::{CharacterMotion, WallMode};

    #[test]
    fn spindash_charges_from_duck_and_releases() {
        let config = PhysicsConfig::default();
        let mut manager = MoveManager::with_builtin_moves();
        let mut motion = CharacterMotion::grounded_on(0.0, WallMode::Floor, 0.0);
        let mut modifiers = MotionModifiers::default();
        let mut input = MoveInput::default();
        let character = Entity::from_raw(1);
        let dt = 1.0 / 60.0;

        // Duck.
        input.set_vertical(-1.0);
        let mut ctx = MoveContext::new(character, &mut motion, &input, &config, &mut modifiers, dt);
        manager.evaluate(&mut ctx);
        assert!(manager.is_active("duck"));
        input.latch();

        // Press jump: spindash outranks jump on the action layer.
        input.set_jump(true);
        let mut ctx = MoveContext::new(character, &mut motion, &input, &config, &mut modifiers, dt);
        let events = manager.evaluate(&mut ctx);
        assert!(manager.is_active("spindash"));
        assert!(!manager.is_active("jump"));
        assert!(motion.grounded);
        assert!(events
            .iter()
            .any(|e| e.move_name == "spindash" && e.kind == MoveEventKind::Activated));
        input.latch();

        // Release down.
        input.set_jump(false);
        input.set_vertical(0.0);
        let mut ctx = MoveContext::new(character, &mut motion, &input, &config, &mut modifiers, dt);
        let events = manager.evaluate(&mut ctx);
        assert!(motion.ground_speed >= 8.0);
        assert!(events
            .iter()
            .any(|e| e.move_name == "spindash" && e.kind == MoveEventKind::Ended));
        assert!(!manager.is_active("duck"));
    }

    #[test]
    fn spindash_requires_duck() {
        let mut manager = MoveManager::new();
        assert!(manager.add_move(Spindash::default()).is_err());
    }
}
