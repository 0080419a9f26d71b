//! Sensor array.
//!
//! Nine probe endpoints laid out on the character's bounding box, 3 rows by
//! 3 columns, in a frame rotated by the current wall mode (or the gravity
//! frame while airborne). Ground probes cast from the middle row down to the
//! bottom row, ceiling probes up to the top row and wall probes sideways from
//! the center. The center endpoint is the shared origin and is never cast.
//!
//! Layouts are regenerated from [`CharacterBody`] whenever it changes. A
//! character without a usable layout fails closed to airborne.

use bevy::prelude::*;

use crate::backend::TerrainQuery;
use crate::collision::{ContactSide, TerrainFilter, TerrainHit, TerrainRay};
use crate::config::PhysicsConfig;
use crate::math;
use crate::state::{frame_angle, CharacterMotion};

/// Extra length added to every probe.
pub const PROBE_BUFFER: f32 = 0.01;

/// Name of one of the nine probe endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum ProbeId {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleCenter,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl ProbeId {
    pub const ALL: [ProbeId; 9] = [
        ProbeId::TopLeft,
        ProbeId::TopCenter,
        ProbeId::TopRight,
        ProbeId::MiddleLeft,
        ProbeId::MiddleCenter,
        ProbeId::MiddleRight,
        ProbeId::BottomLeft,
        ProbeId::BottomCenter,
        ProbeId::BottomRight,
    ];

    /// Probes cast while grounded.
    pub const GROUNDED: [ProbeId; 5] = [
        ProbeId::BottomLeft,
        ProbeId::BottomCenter,
        ProbeId::BottomRight,
        ProbeId::MiddleLeft,
        ProbeId::MiddleRight,
    ];

    /// Probes cast while airborne.
    pub const AIRBORNE: [ProbeId; 6] = [
        ProbeId::TopLeft,
        ProbeId::TopRight,
        ProbeId::BottomLeft,
        ProbeId::BottomRight,
        ProbeId::MiddleLeft,
        ProbeId::MiddleRight,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Row offset: -1 bottom, 0 middle, 1 top.
    fn row(self) -> f32 {
        match self {
            ProbeId::TopLeft | ProbeId::TopCenter | ProbeId::TopRight => 1.0,
            ProbeId::MiddleLeft | ProbeId::MiddleCenter | ProbeId::MiddleRight => 0.0,
            ProbeId::BottomLeft | ProbeId::BottomCenter | ProbeId::BottomRight => -1.0,
        }
    }

    /// Column offset: -1 left, 0 center, 1 right.
    fn column(self) -> f32 {
        match self {
            ProbeId::TopLeft | ProbeId::MiddleLeft | ProbeId::BottomLeft => -1.0,
            ProbeId::TopCenter | ProbeId::MiddleCenter | ProbeId::BottomCenter => 0.0,
            ProbeId::TopRight | ProbeId::MiddleRight | ProbeId::BottomRight => 1.0,
        }
    }

    pub fn is_ground(self) -> bool {
        self.row() < 0.0
    }

    pub fn is_ceiling(self) -> bool {
        self.row() > 0.0
    }

    pub fn is_wall(self) -> bool {
        self.row() == 0.0 && self.column() != 0.0
    }

    /// Side of the character this probe faces.
    pub fn side(self) -> ContactSide {
        match self {
            ProbeId::MiddleLeft => ContactSide::Left,
            ProbeId::MiddleRight => ContactSide::Right,
            _ if self.is_ceiling() => ContactSide::Top,
            _ => ContactSide::Bottom,
        }
    }
}

/// Collider extents of a character, in world units.
///
/// Inserted by gameplay code or derived by a backend from its collider.
/// Changing it regenerates the sensor layout.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct CharacterBody {
    pub half_extents: Vec2,
}

impl Default for CharacterBody {
    fn default() -> Self {
        Self::new(0.3, 0.5)
    }
}

impl CharacterBody {
    pub fn new(half_width: f32, half_height: f32) -> Self {
        Self {
            half_extents: Vec2::new(half_width, half_height),
        }
    }

    pub fn half_width(&self) -> f32 {
        self.half_extents.x
    }

    pub fn half_height(&self) -> f32 {
        self.half_extents.y
    }
}

/// One probe of a layout, in the unrotated character frame.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct ProbeSpec {
    pub id: ProbeId,
    /// Cast origin relative to the character center.
    pub origin: Vec2,
    /// Endpoint relative to the character center.
    pub endpoint: Vec2,
    /// Unit cast direction. Zero for the center endpoint.
    pub direction: Vec2,
    /// Distance from origin to endpoint.
    pub extent: f32,
}

/// The nine probes generated for a set of extents.
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct SensorLayout {
    pub half_extents: Vec2,
    pub probes: [ProbeSpec; 9],
}

impl SensorLayout {
    /// Build a layout. Returns `None` for degenerate or non-finite extents.
    pub fn generate(half_extents: Vec2) -> Option<Self> {
        if !half_extents.is_finite() || half_extents.x <= math::EPSILON || half_extents.y <= math::EPSILON {
            return None;
        }

        let probes = ProbeId::ALL.map(|id| {
            let endpoint = Vec2::new(id.column() * half_extents.x, id.row() * half_extents.y);
            let origin = if id.row() == 0.0 {
                Vec2::ZERO
            } else {
                Vec2::new(endpoint.x, 0.0)
            };
            let offset = endpoint - origin;
            ProbeSpec {
                id,
                origin,
                endpoint,
                direction: offset.normalize_or_zero(),
                extent: offset.length(),
            }
        });

        Some(Self { half_extents, probes })
    }

    #[inline]
    pub fn probe(&self, id: ProbeId) -> &ProbeSpec {
        &self.probes[id.index()]
    }
}

/// Probe layout of a character.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct SensorArray {
    /// `None` until generated, or when the body is unusable.
    pub layout: Option<SensorLayout>,
}

impl SensorArray {
    pub fn from_body(body: &CharacterBody) -> Self {
        Self {
            layout: SensorLayout::generate(body.half_extents),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.layout.is_some()
    }
}

/// Probe results of the current tick.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct SensorReadings {
    /// Whether a layout existed when the probes were sampled.
    pub valid: bool,
    /// Angle of the frame the probes were cast in.
    pub frame_angle: f32,
    /// Which probes were cast this tick.
    pub cast: [bool; 9],
    /// Distance from origin to endpoint per probe.
    pub extents: [f32; 9],
    /// Cast length per probe.
    pub lengths: [f32; 9],
    pub hits: [Option<TerrainHit>; 9],
}

impl Default for SensorReadings {
    fn default() -> Self {
        Self {
            valid: false,
            frame_angle: 0.0,
            cast: [false; 9],
            extents: [0.0; 9],
            lengths: [0.0; 9],
            hits: [None; 9],
        }
    }
}

impl SensorReadings {
    #[inline]
    pub fn hit(&self, id: ProbeId) -> Option<&TerrainHit> {
        self.hits[id.index()].as_ref()
    }

    #[inline]
    pub fn extent(&self, id: ProbeId) -> f32 {
        self.extents[id.index()]
    }

    /// Distance from the probe endpoint to its hit. Negative when the
    /// surface is inside the body.
    pub fn gap(&self, id: ProbeId) -> Option<f32> {
        self.hit(id).map(|hit| hit.distance - self.extent(id))
    }

    /// Unit vector of the frame's local +X.
    pub fn frame_right(&self) -> Vec2 {
        math::degrees_to_vec(self.frame_angle)
    }

    /// Unit vector of the frame's local +Y.
    pub fn frame_up(&self) -> Vec2 {
        math::degrees_to_vec(self.frame_angle + 90.0)
    }

    pub fn any_ground_hit(&self) -> bool {
        [ProbeId::BottomLeft, ProbeId::BottomCenter, ProbeId::BottomRight]
            .into_iter()
            .any(|id| self.hit(id).is_some())
    }
}

/// Frame the probes are cast in: the wall-mode quadrant while grounded, the
/// gravity frame while airborne.
pub fn sensor_frame_angle(motion: &CharacterMotion, config: &PhysicsConfig) -> f32 {
    let frame = frame_angle(config.gravity_direction);
    match motion.wall_mode.angle() {
        Some(mode_angle) if motion.grounded => math::wrap_degrees(frame + mode_angle),
        _ => frame,
    }
}

/// Cast length for a probe.
pub fn probe_length(spec: &ProbeSpec, motion: &CharacterMotion, config: &PhysicsConfig, dt: f32) -> f32 {
    let mut length = spec.extent + PROBE_BUFFER + config.sensor_buffer;
    if motion.grounded && spec.id.is_ground() {
        length += config.ledge_drop_height;
    }
    let speed = motion.speed();
    if speed > config.anti_tunneling_speed {
        length += speed * dt;
    }
    length
}

/// Cast the selected probes of `layout` against `query`.
///
/// Backend errors are treated as a miss for that probe and logged at debug
/// level.
pub fn sample_probes<Q: TerrainQuery>(
    query: &Q,
    position: Vec2,
    layout: &SensorLayout,
    motion: &CharacterMotion,
    config: &PhysicsConfig,
    dt: f32,
    exclude: Option<Entity>,
) -> SensorReadings {
    let frame = sensor_frame_angle(motion, config);
    let mut readings = SensorReadings {
        valid: true,
        frame_angle: frame,
        ..default()
    };

    let selection: &[ProbeId] = if motion.grounded {
        &ProbeId::GROUNDED
    } else {
        &ProbeId::AIRBORNE
    };

    // Ground probes only see one-way terrain while not moving away from it.
    let frame_up = readings.frame_up();
    let rising = !motion.grounded && motion.velocity.dot(frame_up) > math::EPSILON;

    for spec in layout.probes.iter() {
        readings.extents[spec.id.index()] = spec.extent;
    }

    for &id in selection {
        let spec = layout.probe(id);
        let mut filter = if id.is_ground() && !rising {
            TerrainFilter::ground()
        } else {
            TerrainFilter::solid_only()
        };
        if let Some(entity) = exclude {
            filter = filter.excluding(entity);
        }

        let length = probe_length(spec, motion, config, dt);
        let ray = TerrainRay::new(
            position + math::rotate_degrees(spec.origin, frame),
            math::rotate_degrees(spec.direction, frame),
            length,
        )
        .with_filter(filter);

        let hit = match query.cast(&ray) {
            Ok(hit) => hit,
            Err(err) => {
                debug!("Probe {:?} failed: {}", id, err);
                None
            }
        };

        readings.cast[id.index()] = true;
        readings.lengths[id.index()] = length;
        readings.hits[id.index()] = hit;
    }

    readings
}

/// Regenerate layouts for bodies that changed.
pub fn regenerate_sensors(
    mut commands: Commands,
    mut q: Query<(Entity, &CharacterBody, Option<&mut SensorArray>), Changed<CharacterBody>>,
) {
    for (entity, body, array) in &mut q {
        let fresh = SensorArray::from_body(body);
        if !fresh.is_generated() {
            warn!(
                "Character {:?} has unusable extents {:?}, sensors disabled",
                entity, body.half_extents
            );
        }
        match array {
            Some(mut array) => {
                if *array != fresh {
                    *array = fresh;
                }
            }
            None => {
                commands.entity(entity).insert(fresh);
            }
        }
    }
}
