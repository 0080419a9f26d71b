//! Character motion state.
//!
//! [`CharacterMotion`] is the single source of truth for where a character is
//! running and how fast. The [`Grounded`] / [`Airborne`] markers mirror its
//! `grounded` flag so gameplay code can filter queries on them.

use bevy::prelude::*;

use crate::math;

/// Which of the four rotated frames the character is running in.
///
/// Angles are relative to the gravity frame: with default gravity `Floor` is
/// flat ground and `Right` is a wall the character runs up on its right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum WallMode {
    Floor,
    Right,
    Ceiling,
    Left,
    /// Airborne.
    #[default]
    None,
}

impl WallMode {
    /// The relative surface angle this mode is centered on.
    pub fn angle(self) -> Option<f32> {
        match self {
            WallMode::Floor => Some(0.0),
            WallMode::Right => Some(90.0),
            WallMode::Ceiling => Some(180.0),
            WallMode::Left => Some(270.0),
            WallMode::None => None,
        }
    }

    /// Nearest mode for a relative surface angle, without hysteresis.
    pub fn from_relative_angle(relative_angle: f32) -> Self {
        let a = math::wrap_degrees(relative_angle);
        if !(45.0..315.0).contains(&a) {
            WallMode::Floor
        } else if a < 135.0 {
            WallMode::Right
        } else if a < 225.0 {
            WallMode::Ceiling
        } else {
            WallMode::Left
        }
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self == WallMode::None
    }
}

/// Angle of the gravity frame's floor for a gravity direction in degrees.
///
/// Gravity pointing at 270° (world down) gives a floor angle of 0°.
#[inline]
pub fn frame_angle(gravity_direction: f32) -> f32 {
    math::wrap_degrees(gravity_direction + 90.0)
}

/// Kinematic state of a character.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct CharacterMotion {
    /// Standing on terrain.
    pub grounded: bool,
    /// Current wall mode. `None` exactly when airborne.
    pub wall_mode: WallMode,
    /// World-space surface angle in degrees. Aligned with the gravity frame
    /// while airborne.
    pub surface_angle: f32,
    /// Signed speed along the surface tangent. Authoritative while grounded.
    pub ground_speed: f32,
    /// World velocity. Authoritative while airborne; while grounded it mirrors
    /// `ground_speed` along the tangent and is never integrated directly.
    pub velocity: Vec2,
    /// Last non-zero horizontal direction, `1` or `-1`.
    pub facing: f32,
    /// Entity owning the ground surface, when known.
    pub ground_entity: Option<Entity>,
}

impl Default for CharacterMotion {
    fn default() -> Self {
        Self::airborne(Vec2::ZERO)
    }
}

impl CharacterMotion {
    /// Airborne state with the given world velocity.
    pub fn airborne(velocity: Vec2) -> Self {
        Self {
            grounded: false,
            wall_mode: WallMode::None,
            surface_angle: 0.0,
            ground_speed: 0.0,
            velocity,
            facing: 1.0,
            ground_entity: None,
        }
    }

    /// Grounded state on a surface.
    pub fn grounded_on(surface_angle: f32, wall_mode: WallMode, ground_speed: f32) -> Self {
        let mut motion = Self {
            grounded: true,
            wall_mode,
            surface_angle: math::wrap_degrees(surface_angle),
            ground_speed,
            velocity: Vec2::ZERO,
            facing: 1.0,
            ground_entity: None,
        };
        motion.sync_velocity();
        motion
    }

    /// Unit tangent of the current surface.
    #[inline]
    pub fn tangent(&self) -> Vec2 {
        math::degrees_to_vec(self.surface_angle)
    }

    /// Unit "up" of the current surface.
    #[inline]
    pub fn up(&self) -> Vec2 {
        math::surface_angle_to_normal(self.surface_angle)
    }

    /// Surface angle relative to the gravity frame.
    #[inline]
    pub fn relative_angle(&self, gravity_direction: f32) -> f32 {
        math::wrap_degrees(self.surface_angle - frame_angle(gravity_direction))
    }

    /// World velocity regardless of state.
    pub fn world_velocity(&self) -> Vec2 {
        if self.grounded {
            self.tangent() * self.ground_speed
        } else {
            self.velocity
        }
    }

    pub fn speed(&self) -> f32 {
        if self.grounded {
            self.ground_speed.abs()
        } else {
            self.velocity.length()
        }
    }

    /// Refresh the mirrored world velocity from ground speed.
    #[inline]
    pub fn sync_velocity(&mut self) {
        if self.grounded {
            self.velocity = self.tangent() * self.ground_speed;
        }
    }

    /// Convert to grounded state. Ground speed becomes the projection of the
    /// world velocity onto the new surface tangent.
    pub fn attach(&mut self, surface_angle: f32, wall_mode: WallMode, ground_entity: Option<Entity>) {
        self.surface_angle = math::wrap_degrees(surface_angle);
        self.ground_speed = self.velocity.dot(self.tangent());
        self.grounded = true;
        self.wall_mode = wall_mode;
        self.ground_entity = ground_entity;
        self.sync_velocity();
    }

    /// Convert to airborne state. World velocity becomes ground speed along
    /// the tangent.
    pub fn detach(&mut self, gravity_direction: f32) {
        self.velocity = self.tangent() * self.ground_speed;
        self.ground_speed = 0.0;
        self.grounded = false;
        self.wall_mode = WallMode::None;
        self.ground_entity = None;
        self.surface_angle = frame_angle(gravity_direction);
    }

    /// Update `facing` from a signed horizontal value.
    pub fn face(&mut self, direction: f32) {
        let sign = math::sign_eps(direction);
        if sign != 0.0 {
            self.facing = sign;
        }
    }

    /// Repair NaN values and an inconsistent grounded / wall-mode pair.
    ///
    /// Returns `true` when something had to be corrected. A grounded character
    /// without a wall mode is a logic error: debug builds assert, release
    /// builds fall back to `Floor` and log.
    pub fn enforce_invariants(&mut self) -> bool {
        let mut corrected = false;

        if !self.velocity.is_finite() || !self.ground_speed.is_finite() || !self.surface_angle.is_finite() {
            warn!("Non-finite character motion {:?}, zeroing", self);
            self.velocity = math::sanitize_vec(self.velocity);
            self.ground_speed = math::sanitize(self.ground_speed);
            self.surface_angle = math::sanitize(self.surface_angle);
            corrected = true;
        }

        if self.grounded && self.wall_mode.is_none() {
            debug_assert!(false, "grounded character has no wall mode");
            warn!("Grounded character had no wall mode, forcing Floor");
            self.wall_mode = WallMode::Floor;
            corrected = true;
        } else if !self.grounded && !self.wall_mode.is_none() {
            self.wall_mode = WallMode::None;
            corrected = true;
        }

        corrected
    }
}

/// Marker component indicating the character is grounded.
///
/// Mirrors [`CharacterMotion::grounded`]; kept in sync at the end of every
/// fixed step.
///
/// ```rust
/// use bevy::prelude::*;
/// use terrain_runner::prelude::*;
///
/// fn check_grounded(grounded: Option<&Grounded>) -> bool {
///     grounded.is_some()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;
