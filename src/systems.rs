//! Per-tick systems.
//!
//! The plugin chains these through [`crate::TerrainRunnerSet`]; each one
//! borrows the character state for its step and commits before returning.

use bevy::prelude::*;

use crate::config::PhysicsConfig;
use crate::events::CharacterEventQueue;
use crate::integrator::{integrate, MotionModifiers, StepInput};
use crate::intent::MoveInput;
use crate::moves::{MoveContext, MoveManager};
use crate::orientation::{resolve, SurfaceContact};
use crate::overrides::{apply_forced_change, ForcedChangeTarget, PendingOverrides, TunableOverrides};
use crate::sensors::SensorReadings;
use crate::state::{Airborne, CharacterMotion, Grounded};

/// Step used when the fixed clock reports a non-positive timestep.
pub const DEFAULT_DT: f32 = 1.0 / 60.0;

/// Length of one fixed step in seconds.
pub fn fixed_dt(time: &Time<Fixed>) -> f32 {
    let dt = time.timestep().as_secs_f32();
    if dt > 0.0 && dt.is_finite() {
        dt
    } else {
        warn_once!("Fixed timestep is {}, using {}", dt, DEFAULT_DT);
        DEFAULT_DT
    }
}

/// Report inconsistent tunables once, when a config is added.
pub fn report_invalid_configs(q: Query<(Entity, &PhysicsConfig), Added<PhysicsConfig>>) {
    for (entity, config) in &q {
        if let Err(err) = config.validate() {
            error!("Invalid physics config on {:?}: {}", entity, err);
        }
    }
}

/// Apply forced changes queued since the last tick.
pub fn apply_pending_overrides(
    mut q: Query<(
        Entity,
        &mut PendingOverrides,
        &mut CharacterMotion,
        &mut Transform,
        &mut PhysicsConfig,
        &mut TunableOverrides,
        &mut MotionModifiers,
        &mut MoveManager,
        &mut CharacterEventQueue,
    )>,
) {
    for (entity, mut pending, mut motion, mut transform, mut config, mut overrides, mut modifiers, mut moves, mut queue) in
        &mut q
    {
        if pending.0.is_empty() {
            continue;
        }
        let mut position = transform.translation.truncate();
        for change in std::mem::take(&mut pending.0) {
            debug!("Applying {:?} to {:?}", change, entity);
            apply_forced_change(
                change,
                ForcedChangeTarget {
                    character: entity,
                    motion: &mut motion,
                    position: &mut position,
                    config: &mut config,
                    overrides: &mut overrides,
                    modifiers: &mut modifiers,
                    moves: &mut moves,
                    queue: &mut queue,
                },
            );
        }
        transform.translation = position.extend(transform.translation.z);
    }
}

/// Resolve grounded state, surface angle and wall mode.
pub fn resolve_orientation(
    time: Res<Time<Fixed>>,
    mut q: Query<(
        Entity,
        &mut CharacterMotion,
        &mut Transform,
        &SensorReadings,
        &PhysicsConfig,
        &mut MotionModifiers,
        &mut SurfaceContact,
        &mut CharacterEventQueue,
    )>,
) {
    let dt = fixed_dt(&time);

    for (entity, mut motion, mut transform, readings, config, mut modifiers, mut contact, mut queue) in &mut q {
        motion.enforce_invariants();

        let detach_requested = std::mem::take(&mut modifiers.detach_requested);
        let mut position = transform.translation.truncate();
        let outcome = resolve(
            entity,
            &mut motion,
            &mut position,
            readings,
            config,
            dt,
            detach_requested,
        );

        transform.translation = position.extend(transform.translation.z);
        contact.primary = outcome.primary;
        contact.secondary = outcome.secondary;
        queue.orientation.extend(outcome.events);
        queue.casts.extend(outcome.contacts);
    }
}

/// Advance velocity and position.
pub fn integrate_motion(
    time: Res<Time<Fixed>>,
    mut q: Query<(
        Entity,
        &mut CharacterMotion,
        &mut Transform,
        &MoveInput,
        &SensorReadings,
        &PhysicsConfig,
        &MotionModifiers,
        &mut CharacterEventQueue,
    )>,
) {
    let dt = fixed_dt(&time);

    for (entity, mut motion, mut transform, input, readings, config, modifiers, mut queue) in &mut q {
        let mut position = transform.translation.truncate();
        let contacts = integrate(
            &mut motion,
            &mut position,
            StepInput {
                character: entity,
                input,
                readings,
                config,
                modifiers,
                dt,
            },
        );
        transform.translation = position.extend(transform.translation.z);
        queue.casts.extend(contacts);
    }
}

/// Run every character's move state machine.
pub fn evaluate_moves(
    time: Res<Time<Fixed>>,
    mut q: Query<(
        Entity,
        &mut MoveManager,
        &mut CharacterMotion,
        &MoveInput,
        &PhysicsConfig,
        &mut MotionModifiers,
        &mut CharacterEventQueue,
    )>,
) {
    let dt = fixed_dt(&time);

    for (entity, mut manager, mut motion, input, config, mut modifiers, mut queue) in &mut q {
        modifiers.reset();
        let mut ctx = MoveContext::new(entity, &mut motion, input, config, &mut modifiers, dt);
        let events = manager.evaluate(&mut ctx);
        queue.orientation.extend(ctx.take_orientation_events());
        queue.moves.extend(events);
    }
}

/// Mirror the grounded flag into marker components.
pub fn sync_state_markers(
    mut commands: Commands,
    q: Query<(Entity, &CharacterMotion, Has<Grounded>, Has<Airborne>)>,
) {
    for (entity, motion, has_grounded, has_airborne) in &q {
        if motion.grounded && !has_grounded {
            commands.entity(entity).insert(Grounded).remove::<Airborne>();
        } else if !motion.grounded && !has_airborne {
            commands.entity(entity).insert(Airborne).remove::<Grounded>();
        }
    }
}

/// Remember this tick's input for edge detection.
pub fn latch_input(mut q: Query<&mut MoveInput>) {
    for mut input in &mut q {
        input.latch();
    }
}
