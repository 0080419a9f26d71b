//! Built-in line-segment terrain backend.
//!
//! World geometry is a set of [`TerrainSegments`] components, each holding
//! segments in the entity's local space. A segment's front face is to the
//! left of its direction, so a floor runs left to right and a loop is drawn
//! clockwise. Solid segments block from both sides; segments tagged
//! [`SurfaceTags::ONE_WAY`] only from the front.
//!
//! Terrain entities are placed by their `Transform` and are expected to be
//! root entities.

use bevy::prelude::*;

use crate::backend::{validate_ray, TerrainBackend, TerrainError, TerrainQuery};
use crate::collision::{SurfaceTags, TerrainHit, TerrainRay};
use crate::config::PhysicsConfig;
use crate::sensors::{sample_probes, SensorArray, SensorReadings};
use crate::state::CharacterMotion;
use crate::systems::fixed_dt;
use crate::TerrainRunnerSet;

/// A single segment in local space.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct TerrainSegment {
    pub a: Vec2,
    pub b: Vec2,
}

impl TerrainSegment {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }
}

/// Terrain geometry owned by an entity.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct TerrainSegments {
    pub segments: Vec<TerrainSegment>,
    pub tags: SurfaceTags,
}

impl Default for TerrainSegments {
    fn default() -> Self {
        Self {
            segments: Vec::new(),
            tags: SurfaceTags::SOLID,
        }
    }
}

impl TerrainSegments {
    /// Connected segments through `points`.
    pub fn polyline(points: impl IntoIterator<Item = Vec2>, tags: SurfaceTags) -> Self {
        let points: Vec<Vec2> = points.into_iter().collect();
        Self {
            segments: points.windows(2).map(|w| TerrainSegment::new(w[0], w[1])).collect(),
            tags,
        }
    }

    /// Solid floor from `x0` to `x1` at height `y`.
    pub fn floor(x0: f32, x1: f32, y: f32) -> Self {
        Self::polyline([Vec2::new(x0, y), Vec2::new(x1, y)], SurfaceTags::SOLID)
    }

    /// One-way platform from `x0` to `x1` at height `y`.
    pub fn one_way(x0: f32, x1: f32, y: f32) -> Self {
        Self::polyline([Vec2::new(x0, y), Vec2::new(x1, y)], SurfaceTags::ONE_WAY)
    }

    /// Solid box with outward faces.
    pub fn rect(half_extents: Vec2) -> Self {
        let h = half_extents;
        Self::polyline(
            [
                Vec2::new(-h.x, -h.y),
                Vec2::new(-h.x, h.y),
                Vec2::new(h.x, h.y),
                Vec2::new(h.x, -h.y),
                Vec2::new(-h.x, -h.y),
            ],
            SurfaceTags::SOLID,
        )
    }

    /// Builder: add tags.
    pub fn with_tags(mut self, tags: SurfaceTags) -> Self {
        self.tags = self.tags | tags;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct WorldSegment {
    a: Vec2,
    b: Vec2,
    tags: SurfaceTags,
    entity: Option<Entity>,
}

/// World-space segment soup implementing [`TerrainQuery`].
#[derive(Debug, Clone, Default)]
pub struct SegmentTerrain {
    segments: Vec<WorldSegment>,
}

impl SegmentTerrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a world-space segment.
    pub fn push(&mut self, a: Vec2, b: Vec2, tags: SurfaceTags, entity: Option<Entity>) {
        self.segments.push(WorldSegment { a, b, tags, entity });
    }

    /// Add an entity's segments transformed into world space.
    pub fn add(&mut self, entity: Entity, segments: &TerrainSegments, transform: &Transform) {
        for segment in &segments.segments {
            self.push(
                transform.transform_point(segment.a.extend(0.0)).truncate(),
                transform.transform_point(segment.b.extend(0.0)).truncate(),
                segments.tags,
                Some(entity),
            );
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl TerrainQuery for SegmentTerrain {
    fn cast(&self, ray: &TerrainRay) -> Result<Option<TerrainHit>, TerrainError> {
        validate_ray(ray)?;

        let mut nearest: Option<TerrainHit> = None;
        for segment in &self.segments {
            if !ray.filter.accepts(segment.tags, segment.entity) {
                continue;
            }
            let edge = segment.b - segment.a;
            let denom = ray.direction.perp_dot(edge);
            if denom.abs() <= f32::EPSILON {
                continue;
            }
            let offset = segment.a - ray.origin;
            let distance = offset.perp_dot(edge) / denom;
            let along = offset.perp_dot(ray.direction) / denom;
            if distance < 0.0 || distance > ray.length || !(0.0..=1.0).contains(&along) {
                continue;
            }

            let front = edge.perp();
            let facing_ray = front.dot(ray.direction) < 0.0;
            if !facing_ray && segment.tags.intersects(SurfaceTags::ONE_WAY) {
                continue;
            }
            let normal = if facing_ray { front } else { -front };

            if nearest.is_none_or(|hit| distance < hit.distance) {
                nearest = Some(TerrainHit::new(
                    distance,
                    ray.point_at(distance),
                    normal,
                    segment.tags,
                    segment.entity,
                ));
            }
        }
        Ok(nearest)
    }
}

/// Terrain backend using [`TerrainSegments`].
pub struct SegmentTerrainBackend;

impl TerrainBackend for SegmentTerrainBackend {
    fn plugin() -> impl Plugin {
        SegmentTerrainPlugin
    }
}

/// Registers the segment types and the sensing system.
pub struct SegmentTerrainPlugin;

impl Plugin for SegmentTerrainPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<TerrainSegments>();
        app.add_systems(FixedUpdate, sense_segment_terrain.in_set(TerrainRunnerSet::Sensors));
    }
}

/// Sample every character's probes against the segment terrain.
pub fn sense_segment_terrain(
    time: Res<Time<Fixed>>,
    terrain: Query<(Entity, &TerrainSegments, &Transform)>,
    mut characters: Query<
        (
            Entity,
            &Transform,
            &SensorArray,
            &CharacterMotion,
            &PhysicsConfig,
            &mut SensorReadings,
        ),
        Without<TerrainSegments>,
    >,
) {
    let dt = fixed_dt(&time);
    let mut world = SegmentTerrain::new();
    for (entity, segments, transform) in &terrain {
        world.add(entity, segments, transform);
    }

    for (entity, transform, array, motion, config, mut readings) in &mut characters {
        *readings = match &array.layout {
            Some(layout) => sample_probes(
                &world,
                transform.translation.truncate(),
                layout,
                motion,
                config,
                dt,
                Some(entity),
            ),
            None => SensorReadings::default(),
        };
    }
}
