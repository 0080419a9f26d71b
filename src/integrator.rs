//! Velocity integration and collision response.
//!
//! Grounded characters advance a scalar ground speed along the surface
//! tangent; airborne characters advance a world velocity in the gravity
//! frame. Movement is clamped against this tick's probe hits so fast
//! characters stop at geometry instead of passing through it.

use bevy::prelude::*;

use crate::collision::{TerrainCastHit, TerrainHit};
use crate::config::PhysicsConfig;
use crate::intent::MoveInput;
use crate::math;
use crate::sensors::{ProbeId, SensorReadings};
use crate::state::{frame_angle, CharacterMotion};

/// Per-tick adjustments contributed by active moves.
///
/// Reset before moves run and read by the integrator on the following tick.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct MotionModifiers {
    pub acceleration_scale: f32,
    pub top_speed_scale: f32,
    pub friction_scale: f32,
    pub gravity_scale: f32,
    /// Ignore horizontal input.
    pub control_locked: bool,
    /// Detach at the next orientation step.
    pub detach_requested: bool,
}

impl Default for MotionModifiers {
    fn default() -> Self {
        Self {
            acceleration_scale: 1.0,
            top_speed_scale: 1.0,
            friction_scale: 1.0,
            gravity_scale: 1.0,
            control_locked: false,
            detach_requested: false,
        }
    }
}

impl MotionModifiers {
    /// Back to neutral, keeping a pending detach request.
    pub fn reset(&mut self) {
        *self = Self {
            detach_requested: self.detach_requested,
            ..default()
        };
    }
}

/// Everything the integrator reads besides the motion itself.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    pub character: Entity,
    pub input: &'a MoveInput,
    pub readings: &'a SensorReadings,
    pub config: &'a PhysicsConfig,
    pub modifiers: &'a MotionModifiers,
    pub dt: f32,
}

/// Ground speed after one tick of acceleration, slope gravity and friction.
pub fn step_ground_speed(
    ground_speed: f32,
    horizontal: f32,
    relative_angle: f32,
    config: &PhysicsConfig,
    modifiers: &MotionModifiers,
    dt: f32,
) -> f32 {
    let mut gsp = ground_speed;
    let input_sign = math::sign_eps(horizontal);
    let top = config.top_speed * modifiers.top_speed_scale;

    if input_sign != 0.0 {
        let speed_sign = math::sign_eps(gsp);
        if speed_sign == 0.0 || speed_sign == input_sign {
            // Speeding up. Never pulls an over-speed character back down.
            if gsp.abs() < top {
                let step = config.ground_acceleration * modifiers.acceleration_scale * horizontal.abs() * dt;
                gsp = (gsp + input_sign * step).clamp(-top, top);
            }
        } else {
            let decelerated = gsp + input_sign * config.ground_deceleration * dt;
            gsp = if math::sign_eps(decelerated) == speed_sign {
                decelerated
            } else {
                // Crossed zero: reverse at the brake speed.
                input_sign * config.ground_brake.min(config.ground_deceleration * dt)
            };
        }
    }

    gsp -= config.slope_gravity * relative_angle.to_radians().sin() * dt;

    if input_sign == 0.0 {
        gsp = math::move_toward(gsp, 0.0, config.ground_friction * modifiers.friction_scale * dt);
    }

    gsp.clamp(-config.max_speed, config.max_speed)
}

/// World velocity after one airborne tick, before collision.
pub fn step_air_velocity(
    velocity: Vec2,
    horizontal: f32,
    frame_angle: f32,
    config: &PhysicsConfig,
    modifiers: &MotionModifiers,
    dt: f32,
) -> Vec2 {
    let right = math::degrees_to_vec(frame_angle);
    let up = math::degrees_to_vec(frame_angle + 90.0);
    let mut vx = velocity.dot(right);
    let mut vy = velocity.dot(up);

    let input_sign = math::sign_eps(horizontal);
    if input_sign != 0.0 {
        let top = config.top_speed * modifiers.top_speed_scale;
        let step = config.air_acceleration * modifiers.acceleration_scale * horizontal.abs() * dt;
        let accelerated = vx + input_sign * step;
        if vx * input_sign < top {
            vx = if accelerated * input_sign > top {
                input_sign * top
            } else {
                accelerated
            };
        }
    }

    vy -= config.air_gravity * modifiers.gravity_scale * dt;

    if vy > 0.0 && vy < config.air_drag_vertical_speed && vx.abs() > config.air_drag_horizontal_speed {
        vx *= config.air_drag.powf(dt * 60.0);
    }

    (right * vx + up * vy).clamp_length_max(config.max_speed)
}

/// Advance `motion` and `position` by one tick.
///
/// Returns the contacts that stopped movement.
pub fn integrate(motion: &mut CharacterMotion, position: &mut Vec2, step: StepInput) -> Vec<TerrainCastHit> {
    let mut contacts = Vec::new();
    if !(step.dt > 0.0 && step.dt.is_finite()) {
        debug!("Skipping integration for {:?}: dt {}", step.character, step.dt);
        return contacts;
    }

    let horizontal = if step.modifiers.control_locked {
        0.0
    } else {
        step.input.horizontal_axis()
    };

    if motion.grounded {
        integrate_grounded(motion, position, horizontal, step, &mut contacts);
    } else {
        integrate_airborne(motion, position, horizontal, step, &mut contacts);
    }

    contacts
}

fn integrate_grounded(
    motion: &mut CharacterMotion,
    position: &mut Vec2,
    horizontal: f32,
    step: StepInput,
    contacts: &mut Vec<TerrainCastHit>,
) {
    let config = step.config;
    let relative = motion.relative_angle(config.gravity_direction);
    motion.ground_speed = step_ground_speed(
        motion.ground_speed,
        horizontal,
        relative,
        config,
        step.modifiers,
        step.dt,
    );
    motion.face(if horizontal != 0.0 { horizontal } else { motion.ground_speed });

    let mut delta = motion.tangent() * motion.ground_speed * step.dt;
    let right = step.readings.frame_right();
    let dx = delta.dot(right);
    let probe = if dx >= 0.0 {
        ProbeId::MiddleRight
    } else {
        ProbeId::MiddleLeft
    };

    if let Some((hit, gap)) = wall_hit(step.readings, probe) {
        let allowed = gap - config.skin_width;
        if allowed < 0.0 {
            *position -= right * dx.signum() * -allowed;
        }
        if dx.abs() > allowed.max(0.0) && !math::approx_zero(dx) {
            delta *= allowed.max(0.0) / dx.abs();
            motion.ground_speed = 0.0;
            contacts.push(contact(step, probe, hit));
        }
    }

    *position += delta;
    motion.sync_velocity();
}

fn integrate_airborne(
    motion: &mut CharacterMotion,
    position: &mut Vec2,
    horizontal: f32,
    step: StepInput,
    contacts: &mut Vec<TerrainCastHit>,
) {
    let config = step.config;
    let readings = step.readings;
    let right = readings.frame_right();
    let up = readings.frame_up();

    // Probes may still be in last tick's wall-mode frame right after a
    // detach; gravity always uses the gravity frame.
    let mut velocity = step_air_velocity(
        motion.velocity,
        horizontal,
        frame_angle(config.gravity_direction),
        config,
        step.modifiers,
        step.dt,
    );
    motion.face(horizontal);

    let mut dx = velocity.dot(right) * step.dt;
    let mut dy = velocity.dot(up) * step.dt;

    // Sideways.
    let side = if dx >= 0.0 {
        ProbeId::MiddleRight
    } else {
        ProbeId::MiddleLeft
    };
    if let Some((hit, gap)) = wall_hit(readings, side) {
        let allowed = gap - config.skin_width;
        let push = if allowed < 0.0 { -allowed } else { 0.0 };
        if dx.abs() > allowed.max(0.0) && !math::approx_zero(dx) {
            dx = dx.signum() * allowed.max(0.0);
            velocity = remove_inward(velocity, hit.normal);
            contacts.push(contact(step, side, hit));
        }
        let away = if side == ProbeId::MiddleRight { -1.0 } else { 1.0 };
        dx += away * push;
    }

    // Vertically, against the nearer of the two probes in the direction of travel.
    let pair = if dy > 0.0 {
        [ProbeId::TopLeft, ProbeId::TopRight]
    } else {
        [ProbeId::BottomLeft, ProbeId::BottomRight]
    };
    let nearest = pair
        .into_iter()
        .filter_map(|id| Some((id, *readings.hit(id)?, readings.gap(id)?)))
        .min_by(|a, b| a.2.total_cmp(&b.2));
    if let Some((id, hit, gap)) = nearest {
        let allowed = gap - config.skin_width;
        if dy.abs() > allowed.max(0.0) && !math::approx_zero(dy) && velocity.dot(hit.normal) < 0.0 {
            dy = dy.signum() * allowed.max(0.0);
            velocity = remove_inward(velocity, hit.normal);
            contacts.push(contact(step, id, hit));
        }
    }

    *position += right * dx + up * dy;
    motion.velocity = velocity;
}

/// A side probe hit that counts as a wall in the probe frame.
fn wall_hit(readings: &SensorReadings, probe: ProbeId) -> Option<(TerrainHit, f32)> {
    let hit = readings.hit(probe)?;
    let deviation = math::shortest_arc(readings.frame_angle, hit.surface_angle()).abs();
    if deviation <= 45.0 {
        return None;
    }
    Some((*hit, readings.gap(probe)?))
}

/// Remove the part of `velocity` that points into a surface.
fn remove_inward(velocity: Vec2, normal: Vec2) -> Vec2 {
    let into = velocity.dot(normal);
    if into < 0.0 {
        velocity - normal * into
    } else {
        velocity
    }
}

fn contact(step: StepInput, probe: ProbeId, hit: TerrainHit) -> TerrainCastHit {
    TerrainCastHit {
        hit_point: hit.point,
        normal_angle: hit.normal_angle,
        side: probe.side(),
        source_controller: step.character,
        source_sensor: probe,
        surface: hit.entity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{ContactSide, SurfaceTags};
    use crate::state::WallMode;
    use approx::assert_abs_diff_eq;

    const DT: f32 = 1.0 / 60.0;

    fn readings(hits: &[(ProbeId, f32, f32)]) -> SensorReadings {
        let mut readings = SensorReadings {
            valid: true,
            ..default()
        };
        for id in ProbeId::ALL {
            readings.extents[id.index()] = match id {
                ProbeId::MiddleLeft | ProbeId::MiddleRight => 0.3,
                ProbeId::MiddleCenter => 0.0,
                _ => 0.5,
            };
        }
        for &(id, distance, surface_angle) in hits {
            let normal = math::surface_angle_to_normal(surface_angle);
            readings.hits[id.index()] = Some(TerrainHit::new(distance, Vec2::ZERO, normal, SurfaceTags::SOLID, None));
        }
        readings
    }

    fn step<'a>(
        input: &'a MoveInput,
        readings: &'a SensorReadings,
        config: &'a PhysicsConfig,
        modifiers: &'a MotionModifiers,
    ) -> StepInput<'a> {
        StepInput {
            character: Entity::from_raw(1),
            input,
            readings,
            config,
            modifiers,
            dt: DT,
        }
    }

    // ==================== Ground Speed Tests ====================

    #[test]
    fn slope_gravity_on_thirty_degrees() {
        let config = PhysicsConfig::default()
            .with_slope_gravity(4.5)
            .with_ground_curve(1.6875, 18.0, 0.0);
        let modifiers = MotionModifiers::default();

        // Moving uphill slows by slope_gravity * sin(30) * dt per tick.
        let gsp = step_ground_speed(3.0, 0.0, 30.0, &config, &modifiers, DT);
        assert_abs_diff_eq!(3.0 - gsp, 4.5 * 0.5 * DT, epsilon = 1e-5);
        assert_abs_diff_eq!(3.0 - gsp, 0.0375, epsilon = 1e-5);

        // Moving downhill (negative speed on the same slope) speeds up by the same amount.
        let gsp = step_ground_speed(-3.0, 0.0, 30.0, &config, &modifiers, DT);
        assert_abs_diff_eq!(gsp, -3.0375, epsilon = 1e-5);
    }

    #[test]
    fn acceleration_caps_at_top_speed() {
        let config = PhysicsConfig::default();
        let modifiers = MotionModifiers::default();
        let mut gsp = 0.0;
        for _ in 0..2000 {
            gsp = step_ground_speed(gsp, 1.0, 0.0, &config, &modifiers, DT);
        }
        assert_abs_diff_eq!(gsp, config.top_speed, epsilon = 1e-4);

        // Over-speed is not pulled down by holding the direction.
        let gsp = step_ground_speed(10.0, 1.0, 0.0, &config, &modifiers, DT);
        assert_abs_diff_eq!(gsp, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn opposing_input_decelerates_then_brakes() {
        let config = PhysicsConfig::default();
        let modifiers = MotionModifiers::default();
        let gsp = step_ground_speed(5.0, -1.0, 0.0, &config, &modifiers, DT);
        assert_abs_diff_eq!(gsp, 5.0 - config.ground_deceleration * DT, epsilon = 1e-5);

        let gsp = step_ground_speed(0.1, -1.0, 0.0, &config, &modifiers, DT);
        assert_abs_diff_eq!(
            gsp,
            -config.ground_brake.min(config.ground_deceleration * DT),
            epsilon = 1e-5
        );
    }

    #[test]
    fn friction_stops_without_overshoot() {
        let config = PhysicsConfig::default();
        let modifiers = MotionModifiers::default();
        let gsp = step_ground_speed(0.01, 0.0, 0.0, &config, &modifiers, DT);
        assert_eq!(gsp, 0.0);
    }

    #[test]
    fn ground_speed_clamps_to_max() {
        let config = PhysicsConfig::default().with_ground_curve(1.0, 1.0, 0.0);
        let gsp = step_ground_speed(-100.0, 0.0, 0.0, &config, &MotionModifiers::default(), DT);
        assert_eq!(gsp, -config.max_speed);
    }

    // ==================== Air Tests ====================

    #[test]
    fn air_gravity_pulls_along_gravity_direction() {
        let config = PhysicsConfig::default().without_air_drag();
        let v = step_air_velocity(Vec2::ZERO, 0.0, 0.0, &config, &MotionModifiers::default(), DT);
        assert_abs_diff_eq!(v.y, -config.air_gravity * DT, epsilon = 1e-5);
        assert_abs_diff_eq!(v.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn air_drag_only_in_band() {
        let config = PhysicsConfig::default();
        let modifiers = MotionModifiers::default();

        // Rising slowly and moving fast: drag applies
        let v = step_air_velocity(Vec2::new(4.0, 2.0), 0.0, 0.0, &config, &modifiers, DT);
        assert_abs_diff_eq!(v.x, 4.0 * config.air_drag, epsilon = 1e-4);

        // Falling: no drag
        let v = step_air_velocity(Vec2::new(4.0, -1.0), 0.0, 0.0, &config, &modifiers, DT);
        assert_abs_diff_eq!(v.x, 4.0, epsilon = 1e-5);

        // Rising fast: no drag
        let v = step_air_velocity(Vec2::new(4.0, 5.0), 0.0, 0.0, &config, &modifiers, DT);
        assert_abs_diff_eq!(v.x, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn air_speed_clamps_to_max() {
        let config = PhysicsConfig::default();
        let v = step_air_velocity(Vec2::new(0.0, -100.0), 0.0, 0.0, &config, &MotionModifiers::default(), DT);
        assert!(v.length() <= config.max_speed + 1e-4);
    }

    // ==================== Integration Tests ====================

    #[test]
    fn anti_tunneling_stops_at_thin_wall() {
        let config = PhysicsConfig::default();
        let modifiers = MotionModifiers::default();
        let input = MoveInput::default();
        // Wall face 0.35 from the center; half width 0.3.
        let readings = readings(&[(ProbeId::MiddleRight, 0.35, 90.0)]);

        let mut motion = CharacterMotion::airborne(Vec2::new(20.0, 0.0));
        let mut position = Vec2::ZERO;
        let contacts = integrate(&mut motion, &mut position, step(&input, &readings, &config, &modifiers));

        assert!(position.x + 0.3 <= 0.35);
        assert!(position.x > 0.0);
        assert_abs_diff_eq!(motion.velocity.x, 0.0, epsilon = 1e-5);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].side, ContactSide::Right);
        assert_eq!(contacts[0].source_sensor, ProbeId::MiddleRight);
    }

    #[test]
    fn ceiling_bonk_zeroes_vertical_speed() {
        let config = PhysicsConfig::default();
        let modifiers = MotionModifiers::default();
        let input = MoveInput::default();
        let readings = readings(&[(ProbeId::TopLeft, 0.55, 180.0)]);

        let mut motion = CharacterMotion::airborne(Vec2::new(1.0, 12.0));
        let mut position = Vec2::ZERO;
        let contacts = integrate(&mut motion, &mut position, step(&input, &readings, &config, &modifiers));

        assert!(position.y <= 0.05);
        assert_abs_diff_eq!(motion.velocity.y, 0.0, epsilon = 1e-5);
        assert!(motion.velocity.x > 0.0);
        assert_eq!(contacts[0].side, ContactSide::Top);
    }

    #[test]
    fn grounded_movement_follows_tangent() {
        let config = PhysicsConfig::default().with_slope_gravity(0.0);
        let modifiers = MotionModifiers::default();
        let input = MoveInput::default();
        let readings = readings(&[]);

        let mut motion = CharacterMotion::grounded_on(90.0, WallMode::Right, 6.0);
        let mut position = Vec2::ZERO;
        integrate(&mut motion, &mut position, step(&input, &readings, &config, &modifiers));

        let expected = (6.0 - config.ground_friction * DT) * DT;
        assert_abs_diff_eq!(position.y, expected, epsilon = 1e-5);
        assert_abs_diff_eq!(position.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(motion.velocity.y, motion.ground_speed, epsilon = 1e-5);
    }

    #[test]
    fn grounded_wall_blocks_movement() {
        let config = PhysicsConfig::default();
        let modifiers = MotionModifiers::default();
        let mut input = MoveInput::default();
        input.set_horizontal(1.0);
        let readings = readings(&[(ProbeId::MiddleRight, 0.31, 90.0)]);

        let mut motion = CharacterMotion::grounded_on(0.0, WallMode::Floor, 6.0);
        let mut position = Vec2::ZERO;
        let contacts = integrate(&mut motion, &mut position, step(&input, &readings, &config, &modifiers));

        assert_eq!(motion.ground_speed, 0.0);
        assert!(position.x + 0.3 <= 0.31);
        assert_eq!(contacts.len(), 1);
    }

    #[test]
    fn control_lock_ignores_input() {
        let config = PhysicsConfig::default().with_ground_curve(1.0, 1.0, 0.0);
        let modifiers = MotionModifiers {
            control_locked: true,
            ..default()
        };
        let mut input = MoveInput::default();
        input.set_horizontal(1.0);
        let readings = readings(&[]);

        let mut motion = CharacterMotion::grounded_on(0.0, WallMode::Floor, 0.0);
        let mut position = Vec2::ZERO;
        integrate(&mut motion, &mut position, step(&input, &readings, &config, &modifiers));
        assert_eq!(motion.ground_speed, 0.0);
    }

    #[test]
    fn non_positive_dt_is_skipped() {
        let config = PhysicsConfig::default();
        let modifiers = MotionModifiers::default();
        let input = MoveInput::default();
        let readings = readings(&[]);
        let mut motion = CharacterMotion::airborne(Vec2::new(1.0, 1.0));
        let mut position = Vec2::ZERO;
        let mut s = step(&input, &readings, &config, &modifiers);
        s.dt = 0.0;
        integrate(&mut motion, &mut position, s);
        assert_eq!(position, Vec2::ZERO);
        assert_eq!(motion.velocity, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn modifiers_reset_keeps_detach() {
        let mut modifiers = MotionModifiers {
            gravity_scale: 2.0,
            detach_requested: true,
            ..default()
        };
        modifiers.reset();
        assert_eq!(modifiers.gravity_scale, 1.0);
        assert!(modifiers.detach_requested);
    }
}
