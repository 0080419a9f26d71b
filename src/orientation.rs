//! Orientation resolver.
//!
//! Turns this tick's [`SensorReadings`] into a grounded/airborne decision,
//! a surface angle and a wall mode. Within one resolve the rules apply in a
//! fixed order:
//!
//! 1. missing sensors force airborne,
//! 2. an explicit detach request detaches,
//! 3. ground acquisition: step-ups within `ledge_climb_height` snap, higher
//!    steps block, no ground within `ledge_drop_height` detaches,
//! 4. slow-slip: off the floor quadrant, steeper than
//!    `max_vertical_detach_angle` and slower than `detach_speed` detaches,
//! 5. slope hold: slower than `detach_speed` on a slope pulling harder than
//!    `slope_hold_threshold` detaches, in any wall mode,
//! 6. wall-mode switch with hysteresis.
//!
//! Airborne characters attach to ground and ceiling probe hits they will
//! reach this tick. Attaching outside the floor quadrant requires a ground
//! speed of at least `detach_speed`, so attach and detach never happen in the
//! same tick.

use bevy::prelude::*;

use crate::collision::{ContactSide, TerrainCastHit, TerrainHit};
use crate::config::PhysicsConfig;
use crate::math;
use crate::sensors::{ProbeId, SensorReadings, PROBE_BUFFER};
use crate::state::{CharacterMotion, WallMode};

/// Why a character left the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum DetachReason {
    /// Jump, forced detach or any other explicit request.
    Requested,
    /// No ground within `ledge_drop_height`.
    NoGround,
    /// Too slow to stay on a wall or ceiling.
    SlowSlip,
    /// Too slow to stand against the slope's pull.
    SteepSlope,
    /// The sensor array was not generated.
    MissingSensors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum OrientationKind {
    Attached,
    Detached(DetachReason),
    WallModeChanged,
}

/// Attach, detach or wall-mode change of a character.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct OrientationEvent {
    pub character: Entity,
    pub kind: OrientationKind,
    pub old_mode: WallMode,
    pub new_mode: WallMode,
    /// World surface angle after the change.
    pub surface_angle: f32,
    /// World velocity after the change.
    pub velocity: Vec2,
}

/// Result of one resolve.
#[derive(Debug, Clone, Default)]
pub struct OrientationOutcome {
    pub events: Vec<OrientationEvent>,
    /// Contacts produced by attach and step blocking.
    pub contacts: Vec<TerrainCastHit>,
    /// Hit the surface angle was taken from.
    pub primary: Option<TerrainHit>,
    /// Second ground hit that took part in the blend.
    pub secondary: Option<TerrainHit>,
}

/// Surface hits the character currently stands on.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct SurfaceContact {
    pub primary: Option<TerrainHit>,
    pub secondary: Option<TerrainHit>,
}

/// Blend the two ground-probe angles, favoring the probe leading `direction`.
///
/// A weight of 0 averages both probes; 1 uses the leading probe only. With
/// no direction of travel both probes count equally.
pub fn blend_ground_angles(left: f32, right: f32, direction: f32, weight: f32) -> f32 {
    let sign = math::sign_eps(direction);
    let (trail, lead, lead_weight) = if sign > 0.0 {
        (left, right, 0.5 + 0.5 * weight)
    } else if sign < 0.0 {
        (right, left, 0.5 + 0.5 * weight)
    } else {
        (left, right, 0.5)
    };
    math::wrap_degrees(trail + math::shortest_arc(trail, lead) * lead_weight)
}

/// Wall mode after applying switch hysteresis.
///
/// The mode only changes once the relative surface angle is more than
/// `45 + min_overlap_angle` degrees away from the current mode's center and
/// the character moves at least `min_wallmode_switch_speed`.
pub fn next_wall_mode(current: WallMode, relative_angle: f32, ground_speed: f32, config: &PhysicsConfig) -> WallMode {
    let Some(center) = current.angle() else {
        return WallMode::from_relative_angle(relative_angle);
    };
    let deviation = math::shortest_arc(center, relative_angle).abs();
    if deviation > 45.0 + config.min_overlap_angle && ground_speed.abs() >= config.min_wallmode_switch_speed {
        WallMode::from_relative_angle(relative_angle)
    } else {
        current
    }
}

/// Magnitude of slope gravity along a surface at `relative_angle` from the
/// floor.
#[inline]
pub fn slope_pull(relative_angle: f32, config: &PhysicsConfig) -> f32 {
    config.slope_gravity * relative_angle.to_radians().sin().abs()
}

/// Detach immediately, converting ground speed to world velocity.
///
/// Returns `None` when the character was already airborne.
pub fn force_detach(
    character: Entity,
    motion: &mut CharacterMotion,
    config: &PhysicsConfig,
    reason: DetachReason,
) -> Option<OrientationEvent> {
    if !motion.grounded {
        return None;
    }
    let old_mode = motion.wall_mode;
    motion.detach(config.gravity_direction);
    Some(OrientationEvent {
        character,
        kind: OrientationKind::Detached(reason),
        old_mode,
        new_mode: WallMode::None,
        surface_angle: motion.surface_angle,
        velocity: motion.velocity,
    })
}

/// Resolve grounded state, surface angle and wall mode for one tick.
///
/// `position` is snapped onto the ground on attach and while following
/// terrain.
pub fn resolve(
    character: Entity,
    motion: &mut CharacterMotion,
    position: &mut Vec2,
    readings: &SensorReadings,
    config: &PhysicsConfig,
    dt: f32,
    detach_requested: bool,
) -> OrientationOutcome {
    let mut outcome = OrientationOutcome::default();

    if !readings.valid {
        if motion.grounded {
            warn_once!("Character {:?} has no sensors, forcing airborne", character);
        }
        outcome
            .events
            .extend(force_detach(character, motion, config, DetachReason::MissingSensors));
        return outcome;
    }

    if motion.grounded {
        if detach_requested {
            outcome
                .events
                .extend(force_detach(character, motion, config, DetachReason::Requested));
            return outcome;
        }
        resolve_grounded(character, motion, position, readings, config, &mut outcome);
    } else {
        resolve_airborne(character, motion, position, readings, config, dt, &mut outcome);
    }

    outcome
}

fn resolve_grounded(
    character: Entity,
    motion: &mut CharacterMotion,
    position: &mut Vec2,
    readings: &SensorReadings,
    config: &PhysicsConfig,
    outcome: &mut OrientationOutcome,
) {
    let frame_up = readings.frame_up();
    let direction = if math::approx_zero(motion.ground_speed) {
        0.0
    } else {
        motion.ground_speed.signum()
    };

    // Ground acquisition. Offset is how far the surface sits above the feet.
    let mut acceptable: [Option<(TerrainHit, f32)>; 3] = [None; 3];
    let probes = [ProbeId::BottomLeft, ProbeId::BottomCenter, ProbeId::BottomRight];
    for (slot, id) in probes.into_iter().enumerate() {
        let Some(hit) = readings.hit(id) else {
            continue;
        };
        // Surfaces facing away from the frame are not ground.
        if math::shortest_arc(readings.frame_angle, hit.surface_angle()).abs() >= 90.0 - math::EPSILON {
            continue;
        }
        let offset = readings.extent(id) - hit.distance;
        if offset > config.ledge_climb_height + math::EPSILON {
            let side = match id {
                ProbeId::BottomLeft => -1.0,
                ProbeId::BottomRight => 1.0,
                _ => direction,
            };
            if side != 0.0 && side == direction {
                outcome.contacts.push(TerrainCastHit {
                    hit_point: hit.point,
                    normal_angle: hit.normal_angle,
                    side: if side < 0.0 { ContactSide::Left } else { ContactSide::Right },
                    source_controller: character,
                    source_sensor: id,
                    surface: hit.entity,
                });
                debug!("Step of {:.3} blocks {:?}", offset, character);
                motion.ground_speed = 0.0;
            }
            continue;
        }
        acceptable[slot] = Some((*hit, offset));
    }

    let [left, center, right] = acceptable;
    let (primary, secondary, surface_angle) = match (left, right) {
        (Some((l, _)), Some((r, _))) => {
            let angle = blend_ground_angles(
                l.surface_angle(),
                r.surface_angle(),
                direction,
                config.horizontal_wallmode_angle_weight,
            );
            let (lead, trail) = if direction < 0.0 { (l, r) } else { (r, l) };
            (lead, Some(trail), angle)
        }
        (Some((hit, _)), None) | (None, Some((hit, _))) => (hit, None, hit.surface_angle()),
        (None, None) => match center {
            Some((hit, _)) => (hit, None, hit.surface_angle()),
            None => {
                outcome
                    .events
                    .extend(force_detach(character, motion, config, DetachReason::NoGround));
                return;
            }
        },
    };

    // Follow the highest surface under the feet.
    let snap = [left, center, right]
        .into_iter()
        .flatten()
        .map(|(_, offset)| offset)
        .fold(f32::NEG_INFINITY, f32::max);
    if snap.is_finite() {
        *position += frame_up * snap;
    }

    motion.surface_angle = surface_angle;
    motion.ground_entity = primary.entity;
    outcome.primary = Some(primary);
    outcome.secondary = secondary;

    let relative = motion.relative_angle(config.gravity_direction);
    let from_floor = math::shortest_arc(0.0, relative).abs();

    if motion.wall_mode != WallMode::Floor
        && motion.ground_speed.abs() < config.detach_speed
        && from_floor >= config.max_vertical_detach_angle
    {
        outcome
            .events
            .extend(force_detach(character, motion, config, DetachReason::SlowSlip));
        return;
    }

    if motion.ground_speed.abs() < config.detach_speed && slope_pull(relative, config) > config.slope_hold_threshold {
        outcome
            .events
            .extend(force_detach(character, motion, config, DetachReason::SteepSlope));
        return;
    }

    let new_mode = next_wall_mode(motion.wall_mode, relative, motion.ground_speed, config);
    if new_mode != motion.wall_mode {
        let old_mode = motion.wall_mode;
        motion.wall_mode = new_mode;
        debug!("{:?} wall mode {:?} -> {:?} at {:.1}", character, old_mode, new_mode, relative);
        outcome.events.push(OrientationEvent {
            character,
            kind: OrientationKind::WallModeChanged,
            old_mode,
            new_mode,
            surface_angle: motion.surface_angle,
            velocity: motion.world_velocity(),
        });
    }
    motion.sync_velocity();
}

fn resolve_airborne(
    character: Entity,
    motion: &mut CharacterMotion,
    position: &mut Vec2,
    readings: &SensorReadings,
    config: &PhysicsConfig,
    dt: f32,
    outcome: &mut OrientationOutcome,
) {
    let frame_up = readings.frame_up();
    let velocity = motion.velocity;

    // Candidate surfaces reachable this tick, nearest first.
    let mut best: Option<(ProbeId, TerrainHit, f32)> = None;
    for id in [ProbeId::BottomLeft, ProbeId::BottomRight, ProbeId::TopLeft, ProbeId::TopRight] {
        let Some(hit) = readings.hit(id) else {
            continue;
        };
        let Some(gap) = readings.gap(id) else {
            continue;
        };
        let probe_dir = if id.is_ground() { -frame_up } else { frame_up };
        let approach = velocity.dot(probe_dir).max(0.0);
        if gap > PROBE_BUFFER + config.sensor_buffer + approach * dt {
            continue;
        }
        if !can_attach(velocity, hit, config) {
            continue;
        }
        if best.is_none_or(|(_, _, g)| gap < g) {
            best = Some((id, *hit, gap));
        }
    }

    let Some((id, hit, gap)) = best else {
        return;
    };

    // Blend with the opposite corner of the same row when it also qualifies.
    let partner = match id {
        ProbeId::BottomLeft => Some(ProbeId::BottomRight),
        ProbeId::BottomRight => Some(ProbeId::BottomLeft),
        ProbeId::TopLeft => Some(ProbeId::TopRight),
        ProbeId::TopRight => Some(ProbeId::TopLeft),
        _ => None,
    };
    let partner_hit = partner.and_then(|p| {
        let other = readings.hit(p)?;
        let other_gap = readings.gap(p)?;
        let close = (other_gap - gap).abs() <= config.ledge_climb_height;
        (close && can_attach(velocity, other, config)).then_some(*other)
    });

    let surface_angle = match partner_hit {
        Some(other) => {
            let (left, right) = if matches!(id, ProbeId::BottomLeft | ProbeId::TopLeft) {
                (hit, other)
            } else {
                (other, hit)
            };
            let travel = velocity.dot(readings.frame_right());
            blend_ground_angles(
                left.surface_angle(),
                right.surface_angle(),
                travel,
                config.horizontal_wallmode_angle_weight,
            )
        }
        None => hit.surface_angle(),
    };

    let probe_dir = if id.is_ground() { -frame_up } else { frame_up };
    *position += probe_dir * gap;

    let relative = math::wrap_degrees(surface_angle - readings.frame_angle);
    let mode = WallMode::from_relative_angle(relative);
    motion.attach(surface_angle, mode, hit.entity);

    debug!(
        "{:?} attached in {:?} at {:.1} with ground speed {:.3}",
        character, mode, surface_angle, motion.ground_speed
    );

    outcome.contacts.push(TerrainCastHit {
        hit_point: hit.point,
        normal_angle: hit.normal_angle,
        side: id.side(),
        source_controller: character,
        source_sensor: id,
        surface: hit.entity,
    });
    outcome.events.push(OrientationEvent {
        character,
        kind: OrientationKind::Attached,
        old_mode: WallMode::None,
        new_mode: mode,
        surface_angle: motion.surface_angle,
        velocity: motion.world_velocity(),
    });
    outcome.primary = Some(hit);
    outcome.secondary = partner_hit;
}

/// Whether an airborne character moving at `velocity` may attach to `hit`.
///
/// Floor-quadrant surfaces accept any velocity not moving away from them.
/// Steeper surfaces need the velocity within `max_surface_angle_difference`
/// of the inward normal and a tangential speed of at least `detach_speed`.
pub fn can_attach(velocity: Vec2, hit: &TerrainHit, config: &PhysicsConfig) -> bool {
    if velocity.dot(hit.normal) > math::EPSILON {
        return false;
    }
    let gravity_floor = crate::state::frame_angle(config.gravity_direction);
    let relative = math::shortest_arc(gravity_floor, hit.surface_angle()).abs();
    if relative <= 45.0 {
        return true;
    }
    let tangent = math::degrees_to_vec(hit.surface_angle());
    let tangential = velocity.dot(tangent).abs();
    if tangential < config.detach_speed {
        return false;
    }
    math::angle_between(velocity, -hit.normal) <= config.max_surface_angle_difference
}
