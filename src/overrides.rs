//! Scoped overrides of physics tunables and queued forced state changes.
//!
//! Environment volumes such as water push overrides when a character enters
//! and pop them when it leaves. Every push returns an [`OverrideToken`];
//! tokens can be popped in any order and the value is recomputed from the
//! saved baseline. Popping the last override of a tunable restores the
//! baseline exactly.

use bevy::prelude::*;

use crate::config::PhysicsConfig;
use crate::events::CharacterEventQueue;
use crate::integrator::MotionModifiers;
use crate::math;
use crate::moves::MoveManager;
use crate::orientation::{force_detach, DetachReason};
use crate::state::CharacterMotion;
use crate::triggers::{TriggerEvent, TriggerKind};

/// A physics constant that can be overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub enum Tunable {
    AirGravity,
    SlopeGravity,
    GroundFriction,
    GravityDirection,
    TopSpeed,
    MaxSpeed,
    GroundAcceleration,
    AirAcceleration,
}

impl Tunable {
    pub fn get(self, config: &PhysicsConfig) -> f32 {
        match self {
            Tunable::AirGravity => config.air_gravity,
            Tunable::SlopeGravity => config.slope_gravity,
            Tunable::GroundFriction => config.ground_friction,
            Tunable::GravityDirection => config.gravity_direction,
            Tunable::TopSpeed => config.top_speed,
            Tunable::MaxSpeed => config.max_speed,
            Tunable::GroundAcceleration => config.ground_acceleration,
            Tunable::AirAcceleration => config.air_acceleration,
        }
    }

    pub fn set(self, config: &mut PhysicsConfig, value: f32) {
        let slot = match self {
            Tunable::AirGravity => &mut config.air_gravity,
            Tunable::SlopeGravity => &mut config.slope_gravity,
            Tunable::GroundFriction => &mut config.ground_friction,
            Tunable::GravityDirection => &mut config.gravity_direction,
            Tunable::TopSpeed => &mut config.top_speed,
            Tunable::MaxSpeed => &mut config.max_speed,
            Tunable::GroundAcceleration => &mut config.ground_acceleration,
            Tunable::AirAcceleration => &mut config.air_acceleration,
        };
        *slot = if self == Tunable::GravityDirection {
            math::wrap_degrees(value)
        } else {
            value
        };
    }
}

/// How an override combines with the value below it.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum OverrideOp {
    Set(f32),
    Scale(f32),
    /// Division by (nearly) zero leaves the value unchanged.
    Divide(f32),
    Add(f32),
}

impl OverrideOp {
    pub fn apply(self, value: f32) -> f32 {
        let result = match self {
            OverrideOp::Set(v) => v,
            OverrideOp::Scale(s) => value * s,
            OverrideOp::Divide(d) => {
                if d.abs() <= math::EPSILON {
                    warn_once!("Ignoring override dividing by {}", d);
                    value
                } else {
                    value / d
                }
            }
            OverrideOp::Add(a) => value + a,
        };
        if result.is_finite() {
            result
        } else {
            warn!("Override {:?} produced {}, keeping {}", self, result, value);
            value
        }
    }
}

/// Handle returned by [`TunableOverrides::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub struct OverrideToken(pub u64);

/// Override stack of one character.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct TunableOverrides {
    next_token: u64,
    entries: Vec<(OverrideToken, Tunable, OverrideOp)>,
    baselines: Vec<(Tunable, f32)>,
}

impl TunableOverrides {
    /// Apply `op` to `tunable` on top of the existing overrides.
    pub fn push(&mut self, config: &mut PhysicsConfig, tunable: Tunable, op: OverrideOp) -> OverrideToken {
        if self.baseline(tunable).is_none() {
            self.baselines.push((tunable, tunable.get(config)));
        }
        let token = OverrideToken(self.next_token);
        self.next_token += 1;
        self.entries.push((token, tunable, op));
        self.recompute(config, tunable);
        token
    }

    /// Remove an override. Returns `false` for unknown tokens.
    pub fn pop(&mut self, config: &mut PhysicsConfig, token: OverrideToken) -> bool {
        let Some(index) = self.entries.iter().position(|(t, _, _)| *t == token) else {
            return false;
        };
        let (_, tunable, _) = self.entries.remove(index);
        if self.entries.iter().any(|(_, t, _)| *t == tunable) {
            self.recompute(config, tunable);
        } else if let Some(index) = self.baselines.iter().position(|(t, _)| *t == tunable) {
            let (_, baseline) = self.baselines.remove(index);
            tunable.set(config, baseline);
        }
        true
    }

    pub fn is_overridden(&self, tunable: Tunable) -> bool {
        self.baseline(tunable).is_some()
    }

    /// Value the tunable returns to once every override is popped.
    pub fn baseline(&self, tunable: Tunable) -> Option<f32> {
        self.baselines.iter().find(|(t, _)| *t == tunable).map(|(_, v)| *v)
    }

    /// Change the underlying value, keeping active overrides on top of it.
    pub fn set_baseline(&mut self, config: &mut PhysicsConfig, tunable: Tunable, value: f32) {
        match self.baselines.iter_mut().find(|(t, _)| *t == tunable) {
            Some(entry) => {
                entry.1 = value;
                self.recompute(config, tunable);
            }
            None => tunable.set(config, value),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn recompute(&self, config: &mut PhysicsConfig, tunable: Tunable) {
        let Some(baseline) = self.baseline(tunable) else {
            return;
        };
        let value = self
            .entries
            .iter()
            .filter(|(_, t, _)| *t == tunable)
            .fold(baseline, |value, (_, _, op)| op.apply(value));
        tunable.set(config, value);
    }
}

/// Overrides applied to characters inside a trigger volume.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct EnvironmentEffect {
    pub overrides: Vec<(Tunable, OverrideOp)>,
}

impl EnvironmentEffect {
    pub fn new(overrides: impl IntoIterator<Item = (Tunable, OverrideOp)>) -> Self {
        Self {
            overrides: overrides.into_iter().collect(),
        }
    }

    /// Heavy, slow movement.
    pub fn water() -> Self {
        Self::new([
            (Tunable::AirGravity, OverrideOp::Scale(0.3)),
            (Tunable::TopSpeed, OverrideOp::Scale(0.5)),
            (Tunable::GroundAcceleration, OverrideOp::Scale(0.5)),
            (Tunable::AirAcceleration, OverrideOp::Scale(0.5)),
        ])
    }

    /// Gravity pointing at `degrees` while inside.
    pub fn gravity_field(degrees: f32) -> Self {
        Self::new([(Tunable::GravityDirection, OverrideOp::Set(degrees))])
    }
}

/// Environment effects currently applied to a character.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct ActiveEffects {
    /// `(volume, tokens)` per entered effect volume.
    pub entries: Vec<(Entity, Vec<OverrideToken>)>,
}

impl ActiveEffects {
    pub fn contains(&self, volume: Entity) -> bool {
        self.entries.iter().any(|(v, _)| *v == volume)
    }
}

/// Push and pop environment overrides on volume enter and exit.
pub fn apply_environment_effects(
    mut events: EventReader<TriggerEvent>,
    effects: Query<&EnvironmentEffect>,
    mut characters: Query<(&mut PhysicsConfig, &mut TunableOverrides, &mut ActiveEffects)>,
) {
    for event in events.read() {
        let Ok((mut config, mut overrides, mut active)) = characters.get_mut(event.character) else {
            continue;
        };
        match event.kind {
            TriggerKind::Enter => {
                let Ok(effect) = effects.get(event.volume) else {
                    continue;
                };
                if active.contains(event.volume) {
                    continue;
                }
                let tokens = effect
                    .overrides
                    .iter()
                    .map(|&(tunable, op)| overrides.push(&mut config, tunable, op))
                    .collect();
                active.entries.push((event.volume, tokens));
                debug!("{:?} entered effect {:?}", event.character, event.volume);
            }
            TriggerKind::Exit => {
                let Some(index) = active.entries.iter().position(|(v, _)| *v == event.volume) else {
                    continue;
                };
                let (_, tokens) = active.entries.remove(index);
                for token in tokens {
                    overrides.pop(&mut config, token);
                }
                debug!("{:?} left effect {:?}", event.character, event.volume);
            }
            TriggerKind::Stay => {}
        }
    }
}

/// A state change requested from outside the tick.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum ForcedChange {
    /// Move to a position, airborne and at rest.
    Teleport(Vec2),
    /// Leave the ground at the next orientation step.
    Detach,
    /// Interrupt every move and knock the character into the air.
    Hurt { knockback: Vec2 },
    /// Leave the ground now with a world velocity. Moves keep running.
    Launch(Vec2),
    /// Ignored while airborne.
    SetGroundSpeed(f32),
    /// Change the baseline gravity direction.
    SetGravityDirection(f32),
    /// World velocity. Grounded characters keep the tangent component.
    SetVelocity(Vec2),
}

/// Forced changes waiting for the start of the next tick.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct PendingOverrides(pub Vec<ForcedChange>);

impl PendingOverrides {
    pub fn push(&mut self, change: ForcedChange) {
        self.0.push(change);
    }
}

/// Character data a forced change may touch.
pub struct ForcedChangeTarget<'a> {
    pub character: Entity,
    pub motion: &'a mut CharacterMotion,
    pub position: &'a mut Vec2,
    pub config: &'a mut PhysicsConfig,
    pub overrides: &'a mut TunableOverrides,
    pub modifiers: &'a mut MotionModifiers,
    pub moves: &'a mut MoveManager,
    pub queue: &'a mut CharacterEventQueue,
}

/// Apply one forced change.
pub fn apply_forced_change(change: ForcedChange, target: ForcedChangeTarget) {
    let ForcedChangeTarget {
        character,
        motion,
        position,
        config,
        overrides,
        modifiers,
        moves,
        queue,
    } = target;
    match change {
        ForcedChange::Teleport(target) => {
            queue
                .orientation
                .extend(force_detach(character, motion, config, DetachReason::Requested));
            if target.is_finite() {
                *position = target;
            }
            motion.velocity = Vec2::ZERO;
        }
        ForcedChange::Detach => modifiers.detach_requested = true,
        ForcedChange::Hurt { knockback } => {
            moves.interrupt_all();
            let event = force_detach(character, motion, config, DetachReason::Requested);
            motion.velocity = math::sanitize_vec(knockback).clamp_length_max(config.max_speed);
            if let Some(mut event) = event {
                event.velocity = motion.velocity;
                queue.orientation.push(event);
            }
        }
        ForcedChange::Launch(velocity) => {
            let event = force_detach(character, motion, config, DetachReason::Requested);
            motion.velocity = math::sanitize_vec(velocity).clamp_length_max(config.max_speed);
            if let Some(mut event) = event {
                event.velocity = motion.velocity;
                queue.orientation.push(event);
            }
        }
        ForcedChange::SetGroundSpeed(speed) => {
            if motion.grounded {
                motion.ground_speed = math::sanitize(speed).clamp(-config.max_speed, config.max_speed);
                motion.sync_velocity();
            }
        }
        ForcedChange::SetGravityDirection(degrees) => {
            if degrees.is_finite() {
                overrides.set_baseline(config, Tunable::GravityDirection, degrees);
            }
        }
        ForcedChange::SetVelocity(velocity) => {
            let velocity = math::sanitize_vec(velocity);
            if motion.grounded {
                motion.ground_speed = velocity.dot(motion.tangent());
                motion.sync_velocity();
            } else {
                motion.velocity = velocity;
            }
        }
    }
}
