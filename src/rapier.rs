//! Rapier2D terrain backend.
//!
//! Probes are cast against Rapier's query pipeline. Enable with the
//! `rapier2d` feature.

use bevy::prelude::*;
use bevy_rapier2d::prelude::*;

use crate::backend::{validate_ray, TerrainBackend, TerrainError, TerrainQueryFn};
use crate::collision::{SurfaceTags, TerrainHit, TerrainRay};
use crate::config::PhysicsConfig;
use crate::sensors::{regenerate_sensors, sample_probes, CharacterBody, SensorArray, SensorReadings};
use crate::state::CharacterMotion;
use crate::systems::fixed_dt;
use crate::TerrainRunnerSet;

/// Back faces of one-way colliders skipped per probe before giving up.
const MAX_ONE_WAY_SKIPS: usize = 4;

/// Rapier2D terrain backend.
///
/// Terrain is any non-sensor collider. Tag colliders with [`RapierSurface`]
/// to make them one-way or to give them custom tags; untagged colliders are
/// solid.
pub struct Rapier2dBackend;

impl TerrainBackend for Rapier2dBackend {
    fn plugin() -> impl Plugin {
        Rapier2dBackendPlugin
    }
}

/// Surface tags of a Rapier collider.
///
/// One-way colliders block only along their local +Y.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct RapierSurface(pub SurfaceTags);

impl Default for RapierSurface {
    fn default() -> Self {
        Self(SurfaceTags::SOLID)
    }
}

/// Plugin that sets up Rapier2D-specific systems.
pub struct Rapier2dBackendPlugin;

impl Plugin for Rapier2dBackendPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<RapierSurface>();

        // Collider changes feed the body before sensors regenerate
        app.add_systems(
            FixedUpdate,
            sync_body_from_collider
                .before(regenerate_sensors)
                .in_set(TerrainRunnerSet::Overrides),
        );

        app.add_systems(FixedUpdate, rapier_sense_terrain.in_set(TerrainRunnerSet::Sensors));
    }
}

/// Half extents of a collider's bounding box, for the shapes characters use.
pub fn collider_half_extents(collider: &Collider) -> Option<Vec2> {
    if let Some(capsule) = collider.as_capsule() {
        let segment = capsule.segment();
        let (a, b) = (segment.a(), segment.b());
        let radius = capsule.radius();
        Some(Vec2::new(
            (a.x - b.x).abs() / 2.0 + radius,
            (a.y - b.y).abs() / 2.0 + radius,
        ))
    } else if let Some(ball) = collider.as_ball() {
        Some(Vec2::splat(ball.radius()))
    } else {
        collider.as_cuboid().map(|cuboid| cuboid.half_extents())
    }
}

/// Keep [`CharacterBody`] in step with the character's collider.
pub fn sync_body_from_collider(mut q: Query<(Entity, &Collider, &mut CharacterBody), Changed<Collider>>) {
    for (entity, collider, mut body) in &mut q {
        match collider_half_extents(collider) {
            Some(half_extents) if body.half_extents != half_extents => body.half_extents = half_extents,
            Some(_) => {}
            None => warn_once!("Collider shape of {:?} is not supported for sensors", entity),
        }
    }
}

/// Cast one ray against Rapier, honoring the ray filter and one-way faces.
fn rapier_cast(
    context: &RapierContext,
    surfaces: &Query<&RapierSurface>,
    transforms: &Query<&GlobalTransform>,
    groups: Option<CollisionGroups>,
    ray: &TerrainRay,
) -> Result<Option<TerrainHit>, TerrainError> {
    validate_ray(ray)?;

    let tags_of = |entity: Entity| surfaces.get(entity).map(|s| s.0).unwrap_or(SurfaceTags::SOLID);
    let mut skipped: Vec<Entity> = Vec::new();

    for _ in 0..MAX_ONE_WAY_SKIPS {
        let found = {
            let predicate = |entity: Entity| !skipped.contains(&entity) && ray.filter.accepts(tags_of(entity), Some(entity));
            let mut filter = QueryFilter::default().exclude_sensors().predicate(&predicate);
            if let Some(entity) = ray.filter.exclude_entity {
                filter = filter.exclude_rigid_body(entity).exclude_collider(entity);
            }
            if let Some(groups) = groups {
                filter = filter.groups(groups);
            }
            context.cast_ray_and_get_normal(ray.origin, ray.direction, ray.length, true, filter)
        };

        let Some((entity, intersection)) = found else {
            return Ok(None);
        };

        let tags = tags_of(entity);
        if tags.intersects(SurfaceTags::ONE_WAY) {
            let front = transforms
                .get(entity)
                .map(|t| t.up().as_vec3().truncate())
                .unwrap_or(Vec2::Y);
            if intersection.normal.dot(front) <= 0.0 || intersection.time_of_impact <= 0.0 {
                skipped.push(entity);
                continue;
            }
        }

        return Ok(Some(TerrainHit::new(
            intersection.time_of_impact,
            intersection.point,
            intersection.normal,
            tags,
            Some(entity),
        )));
    }

    Ok(None)
}

/// Sample every character's probes against the Rapier world.
fn rapier_sense_terrain(
    time: Res<Time<Fixed>>,
    rapier_context: ReadRapierContext,
    surfaces: Query<&RapierSurface>,
    transforms: Query<&GlobalTransform>,
    mut characters: Query<(
        Entity,
        &Transform,
        &SensorArray,
        &CharacterMotion,
        &PhysicsConfig,
        &mut SensorReadings,
        Option<&CollisionGroups>,
    )>,
) {
    let dt = fixed_dt(&time);
    let context = rapier_context.single();

    for (entity, transform, array, motion, config, mut readings, groups) in &mut characters {
        let Some(layout) = &array.layout else {
            *readings = SensorReadings::default();
            continue;
        };

        let query = TerrainQueryFn(|ray: &TerrainRay| match &context {
            Ok(context) => rapier_cast(context, &surfaces, &transforms, groups.copied(), ray),
            Err(err) => Err(TerrainError::Unavailable(err.to_string())),
        });

        *readings = sample_probes(
            &query,
            transform.translation.truncate(),
            layout,
            motion,
            config,
            dt,
            Some(entity),
        );
    }
}

/// Bundle for a kinematic character with a Rapier2D collider.
///
/// The character is moved by writing its `Transform`; Rapier only provides
/// the collider other bodies react to.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use terrain_runner::prelude::*;
/// use terrain_runner::rapier::Rapier2dCharacterBundle;
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 2.0, 0.0),
///         TerrainRunnerBundle::default(),
///         Rapier2dCharacterBundle::capsule(0.2, 0.3),
///     ));
/// }
/// ```
#[derive(Bundle)]
pub struct Rapier2dCharacterBundle {
    /// Always [`RigidBody::KinematicPositionBased`].
    pub rigid_body: RigidBody,
    /// Shape the sensors are generated from.
    pub collider: Collider,
}

impl Default for Rapier2dCharacterBundle {
    fn default() -> Self {
        Self::cuboid(0.3, 0.5)
    }
}

impl Rapier2dCharacterBundle {
    /// Box collider.
    pub fn cuboid(half_width: f32, half_height: f32) -> Self {
        Self {
            rigid_body: RigidBody::KinematicPositionBased,
            collider: Collider::cuboid(half_width, half_height),
        }
    }

    /// Vertical capsule collider.
    pub fn capsule(half_height: f32, radius: f32) -> Self {
        Self {
            rigid_body: RigidBody::KinematicPositionBased,
            collider: Collider::capsule_y(half_height, radius),
        }
    }
}
