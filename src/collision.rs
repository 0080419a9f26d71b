//! Terrain query data.
//!
//! These structures describe a single cast against world geometry and the
//! hit it produced. Hits are produced fresh every query and never retained
//! across ticks.

use bevy::prelude::*;

use crate::math;
use crate::sensors::ProbeId;

/// Classification flags carried by terrain surfaces.
///
/// Backends attach these to hits so the sensors can filter, for example,
/// one-way platforms out of side and ceiling probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub struct SurfaceTags(pub u32);

impl SurfaceTags {
    /// No classification.
    pub const NONE: Self = Self(0);

    /// Regular solid terrain.
    pub const SOLID: Self = Self(1 << 0);

    /// Only collides from above (top-only platforms).
    pub const ONE_WAY: Self = Self(1 << 1);

    /// Belongs to a moving platform.
    pub const PLATFORM: Self = Self(1 << 2);

    /// Anything that can be collided with.
    pub const ALL: Self = Self(u32::MAX);

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl std::ops::BitOr for SurfaceTags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Filter applied to a terrain query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainFilter {
    /// Hits must carry at least one of these tags.
    pub include: SurfaceTags,
    /// Hits carrying any of these tags are ignored.
    pub exclude: SurfaceTags,
    /// Entity to ignore, usually the character itself.
    pub exclude_entity: Option<Entity>,
}

impl Default for TerrainFilter {
    fn default() -> Self {
        Self {
            include: SurfaceTags::ALL,
            exclude: SurfaceTags::NONE,
            exclude_entity: None,
        }
    }
}

impl TerrainFilter {
    /// Filter used by ground probes: everything, one-way platforms included.
    pub fn ground() -> Self {
        Self::default()
    }

    /// Filter used by side and ceiling probes: one-way platforms are skipped.
    pub fn solid_only() -> Self {
        Self {
            exclude: SurfaceTags::ONE_WAY,
            ..default()
        }
    }

    /// Builder: ignore an entity.
    pub fn excluding(mut self, entity: Entity) -> Self {
        self.exclude_entity = Some(entity);
        self
    }

    /// Check whether a surface with `tags` owned by `entity` passes this filter.
    pub fn accepts(&self, tags: SurfaceTags, entity: Option<Entity>) -> bool {
        if entity.is_some() && entity == self.exclude_entity {
            return false;
        }
        tags.intersects(self.include) && !tags.intersects(self.exclude)
    }
}

/// A ray to cast against terrain.
#[derive(Debug, Clone, Copy)]
pub struct TerrainRay {
    /// Origin point of the ray.
    pub origin: Vec2,
    /// Direction of the ray (normalized).
    pub direction: Vec2,
    /// Maximum distance to cast.
    pub length: f32,
    /// Which surfaces count.
    pub filter: TerrainFilter,
}

impl TerrainRay {
    /// Create a new ray. The direction is normalized.
    pub fn new(origin: Vec2, direction: Vec2, length: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            length,
            filter: TerrainFilter::default(),
        }
    }

    /// Builder: set the filter.
    pub fn with_filter(mut self, filter: TerrainFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Point at `distance` along the ray.
    #[inline]
    pub fn point_at(&self, distance: f32) -> Vec2 {
        self.origin + self.direction * distance
    }
}

/// Result of a successful terrain query.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct TerrainHit {
    /// Distance from the ray origin to the hit point.
    pub distance: f32,
    /// World position of the hit point.
    pub point: Vec2,
    /// Outward surface normal at the hit point.
    pub normal: Vec2,
    /// Angle of `normal` in degrees.
    pub normal_angle: f32,
    /// Classification of the surface that was hit.
    pub tags: SurfaceTags,
    /// Entity owning the surface, if the backend knows it.
    pub entity: Option<Entity>,
}

impl TerrainHit {
    /// Create a hit. `normal` is normalized and `normal_angle` derived from it.
    pub fn new(distance: f32, point: Vec2, normal: Vec2, tags: SurfaceTags, entity: Option<Entity>) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            distance,
            point,
            normal,
            normal_angle: math::vec_to_degrees(normal),
            tags,
            entity,
        }
    }

    /// Surface (tangent) angle of the hit surface in degrees.
    #[inline]
    pub fn surface_angle(&self) -> f32 {
        math::normal_to_surface_angle(self.normal)
    }
}

/// Which side of the character a contact happened on, in the character frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum ContactSide {
    Bottom,
    Top,
    Left,
    Right,
}

/// Collision record exposed to reactive consumers.
///
/// Produced by the integrator when a probe stops movement and by the
/// orientation resolver on attach.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct TerrainCastHit {
    /// World position of the contact.
    pub hit_point: Vec2,
    /// Angle of the contact normal in degrees.
    pub normal_angle: f32,
    /// Side of the character that touched.
    pub side: ContactSide,
    /// The character whose sensor produced the hit.
    pub source_controller: Entity,
    /// The probe that produced the hit.
    pub source_sensor: ProbeId,
    /// Entity owning the surface, if known.
    pub surface: Option<Entity>,
}
