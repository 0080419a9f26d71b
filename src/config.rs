//! Physics tunables.
//!
//! Every constant the sensors, orientation resolver and integrator read lives
//! in [`PhysicsConfig`], a flat per-character component. Angles are degrees,
//! speeds are world units per second, accelerations world units per second².
//! Values may be overridden temporarily through
//! [`crate::overrides::TunableOverrides`], which restores the exact prior
//! values.

use bevy::prelude::*;
use thiserror::Error;

/// Inconsistent or unusable configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A value that must be strictly positive was not.
    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    /// A value that must not be negative was.
    #[error("`{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    /// A value was NaN or infinite.
    #[error("`{field}` must be finite")]
    NotFinite { field: &'static str },
    /// `top_speed` above the hard clamp `max_speed`.
    #[error("top_speed ({top_speed}) exceeds max_speed ({max_speed})")]
    TopSpeedAboveMax { top_speed: f32, max_speed: f32 },
    /// A weight outside `[0, 1]`.
    #[error("`{field}` must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },
}

/// Configuration parameters for a terrain-relative character.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct PhysicsConfig {
    // === Ground Movement ===
    /// Acceleration while input points along the current motion.
    pub ground_acceleration: f32,

    /// Deceleration while input opposes the current motion.
    pub ground_deceleration: f32,

    /// Speed gained in the input direction on the tick ground speed crosses
    /// zero while reversing.
    pub ground_brake: f32,

    /// Deceleration applied when there is no input.
    pub ground_friction: f32,

    /// Speed input can accelerate the character to.
    pub top_speed: f32,

    /// Hard clamp on any speed, including environment-driven speed.
    pub max_speed: f32,

    /// Slope factor: `slope_gravity * sin(angle)` is removed from ground
    /// speed every second.
    pub slope_gravity: f32,

    /// Largest slope pull (`slope_gravity * |sin(angle)|`) a character slower
    /// than `detach_speed` can stand against. Stronger pulls detach it.
    pub slope_hold_threshold: f32,

    // === Air Movement ===
    /// Horizontal acceleration toward input while airborne.
    pub air_acceleration: f32,

    /// Gravity applied while airborne.
    pub air_gravity: f32,

    /// Direction gravity pulls, in degrees (270 = world down).
    pub gravity_direction: f32,

    /// Horizontal velocity retained per 1/60 s while the drag band applies.
    pub air_drag: f32,

    /// Drag only applies while rising slower than this.
    pub air_drag_vertical_speed: f32,

    /// Drag only applies while moving horizontally faster than this.
    pub air_drag_horizontal_speed: f32,

    // === Orientation ===
    /// Below this ground speed a non-floor wall mode detaches.
    pub detach_speed: f32,

    /// Minimum ground speed for a wall-mode switch.
    pub min_wallmode_switch_speed: f32,

    /// Degrees past a quadrant boundary before the wall mode switches.
    pub min_overlap_angle: f32,

    /// Maximum angle between incoming velocity and surface normal that still
    /// lets an airborne character attach.
    pub max_surface_angle_difference: f32,

    /// Minimum deviation of the surface from flat floor (degrees) before the
    /// slow-slip detach rule applies.
    pub max_vertical_detach_angle: f32,

    /// Weight (0..1) given to the leading ground probe when blending the two
    /// ground angles. 0 averages both probes equally.
    pub horizontal_wallmode_angle_weight: f32,

    // === Ledges & Sensors ===
    /// Steps up to this height are climbed by snapping up.
    pub ledge_climb_height: f32,

    /// Drops deeper than this detach instead of following the ground.
    pub ledge_drop_height: f32,

    /// Above this speed the probes are lengthened by `speed * dt`.
    pub anti_tunneling_speed: f32,

    /// Extra length added to every probe.
    pub sensor_buffer: f32,

    /// Distance kept between the character and geometry it is clamped to.
    pub skin_width: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self::classic()
    }
}

impl PhysicsConfig {
    /// Values tuned after the classic 16-bit feel at 1 unit = 1 tile-ish.
    pub fn classic() -> Self {
        Self {
            ground_acceleration: 1.6875,
            ground_deceleration: 18.0,
            ground_brake: 0.75,
            ground_friction: 1.6875,
            top_speed: 6.0,
            max_speed: 30.0,
            slope_gravity: 4.5,
            slope_hold_threshold: 4.0,

            air_acceleration: 3.375,
            air_gravity: 7.875,
            gravity_direction: 270.0,
            air_drag: 0.96875,
            air_drag_vertical_speed: 2.4,
            air_drag_horizontal_speed: 0.075,

            detach_speed: 3.0,
            min_wallmode_switch_speed: 0.5,
            min_overlap_angle: 5.0,
            max_surface_angle_difference: 70.0,
            max_vertical_detach_angle: 45.0,
            horizontal_wallmode_angle_weight: 0.0,

            ledge_climb_height: 0.16,
            ledge_drop_height: 0.16,
            anti_tunneling_speed: 5.0,
            sensor_buffer: 0.01,
            skin_width: 0.001,
        }
    }

    /// Slower, heavier character with more grip.
    pub fn heavy() -> Self {
        Self {
            ground_acceleration: 1.2,
            top_speed: 4.5,
            air_gravity: 10.0,
            slope_gravity: 5.5,
            slope_hold_threshold: 5.0,
            detach_speed: 4.0,
            ..Self::classic()
        }
    }

    /// Light character with long air time.
    pub fn floaty() -> Self {
        Self {
            air_gravity: 4.5,
            air_acceleration: 4.5,
            air_drag: 0.98,
            ..Self::classic()
        }
    }

    /// Gravity as a world-space vector.
    #[inline]
    pub fn gravity(&self) -> Vec2 {
        crate::math::degrees_to_vec(self.gravity_direction) * self.air_gravity
    }

    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite_fields: [(&'static str, f32); 25] = [
            ("ground_acceleration", self.ground_acceleration),
            ("ground_deceleration", self.ground_deceleration),
            ("ground_brake", self.ground_brake),
            ("ground_friction", self.ground_friction),
            ("top_speed", self.top_speed),
            ("max_speed", self.max_speed),
            ("slope_gravity", self.slope_gravity),
            ("slope_hold_threshold", self.slope_hold_threshold),
            ("air_acceleration", self.air_acceleration),
            ("air_gravity", self.air_gravity),
            ("gravity_direction", self.gravity_direction),
            ("air_drag", self.air_drag),
            ("air_drag_vertical_speed", self.air_drag_vertical_speed),
            ("air_drag_horizontal_speed", self.air_drag_horizontal_speed),
            ("detach_speed", self.detach_speed),
            ("min_wallmode_switch_speed", self.min_wallmode_switch_speed),
            ("min_overlap_angle", self.min_overlap_angle),
            ("max_surface_angle_difference", self.max_surface_angle_difference),
            ("max_vertical_detach_angle", self.max_vertical_detach_angle),
            ("horizontal_wallmode_angle_weight", self.horizontal_wallmode_angle_weight),
            ("ledge_climb_height", self.ledge_climb_height),
            ("ledge_drop_height", self.ledge_drop_height),
            ("anti_tunneling_speed", self.anti_tunneling_speed),
            ("sensor_buffer", self.sensor_buffer),
            ("skin_width", self.skin_width),
        ];
        for (field, value) in finite_fields {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field });
            }
        }

        for (field, value) in [("top_speed", self.top_speed), ("max_speed", self.max_speed)] {
            if value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        let non_negative = [
            ("ground_acceleration", self.ground_acceleration),
            ("ground_deceleration", self.ground_deceleration),
            ("ground_brake", self.ground_brake),
            ("ground_friction", self.ground_friction),
            ("air_acceleration", self.air_acceleration),
            ("slope_hold_threshold", self.slope_hold_threshold),
            ("detach_speed", self.detach_speed),
            ("min_wallmode_switch_speed", self.min_wallmode_switch_speed),
            ("ledge_climb_height", self.ledge_climb_height),
            ("ledge_drop_height", self.ledge_drop_height),
            ("anti_tunneling_speed", self.anti_tunneling_speed),
            ("sensor_buffer", self.sensor_buffer),
            ("skin_width", self.skin_width),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }

        if self.top_speed > self.max_speed {
            return Err(ConfigError::TopSpeedAboveMax {
                top_speed: self.top_speed,
                max_speed: self.max_speed,
            });
        }

        for (field, value) in [
            ("air_drag", self.air_drag),
            ("horizontal_wallmode_angle_weight", self.horizontal_wallmode_angle_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { field, value });
            }
        }

        Ok(())
    }

    /// Builder: set top and max speed.
    pub fn with_speeds(mut self, top_speed: f32, max_speed: f32) -> Self {
        self.top_speed = top_speed;
        self.max_speed = max_speed;
        self
    }

    /// Builder: set the ground acceleration curve.
    pub fn with_ground_curve(mut self, acceleration: f32, deceleration: f32, friction: f32) -> Self {
        self.ground_acceleration = acceleration;
        self.ground_deceleration = deceleration;
        self.ground_friction = friction;
        self
    }

    /// Builder: set slope gravity.
    pub fn with_slope_gravity(mut self, slope_gravity: f32) -> Self {
        self.slope_gravity = slope_gravity;
        self
    }

    /// Builder: set the slope pull a slow character can stand against.
    pub fn with_slope_hold_threshold(mut self, threshold: f32) -> Self {
        self.slope_hold_threshold = threshold;
        self
    }

    /// Builder: set air gravity strength.
    pub fn with_air_gravity(mut self, air_gravity: f32) -> Self {
        self.air_gravity = air_gravity;
        self
    }

    /// Builder: set gravity direction in degrees.
    pub fn with_gravity_direction(mut self, degrees: f32) -> Self {
        self.gravity_direction = crate::math::wrap_degrees(degrees);
        self
    }

    /// Builder: set the anti-tunneling threshold.
    pub fn with_anti_tunneling_speed(mut self, speed: f32) -> Self {
        self.anti_tunneling_speed = speed;
        self
    }

    /// Builder: set wall-mode hysteresis parameters.
    pub fn with_wallmode_hysteresis(mut self, min_overlap_angle: f32, min_switch_speed: f32) -> Self {
        self.min_overlap_angle = min_overlap_angle;
        self.min_wallmode_switch_speed = min_switch_speed;
        self
    }

    /// Builder: set ledge climb and drop heights.
    pub fn with_ledges(mut self, climb_height: f32, drop_height: f32) -> Self {
        self.ledge_climb_height = climb_height;
        self.ledge_drop_height = drop_height;
        self
    }

    /// Builder: set detach speed.
    pub fn with_detach_speed(mut self, speed: f32) -> Self {
        self.detach_speed = speed;
        self
    }

    /// Builder: disable air drag.
    pub fn without_air_drag(mut self) -> Self {
        self.air_drag = 1.0;
        self
    }
}
