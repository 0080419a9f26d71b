//! Terrain backend abstraction.
//!
//! This module defines what a physics or geometry backend must provide to
//! drive the sensors. The core never talks to a physics engine directly: a
//! backend registers a sensing system that builds a [`TerrainQuery`] from its
//! own system parameters and hands it to [`crate::sensors::sample_probes`].
//! This allows swapping between the built-in segment terrain, Rapier2D, or a
//! custom broad phase.

use bevy::prelude::*;
use thiserror::Error;

use crate::collision::{TerrainHit, TerrainRay};
use crate::config::PhysicsConfig;
use crate::sensors::{sample_probes, SensorArray, SensorReadings};
use crate::state::CharacterMotion;
use crate::systems::fixed_dt;
use crate::TerrainRunnerSet;

/// Failure reported by a terrain backend for a single query.
///
/// The sensors treat any error as "no hit" for that probe and keep going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TerrainError {
    /// The backend's world or query pipeline is not available this tick.
    #[error("terrain backend is unavailable: {0}")]
    Unavailable(String),
    /// The ray itself was unusable (zero direction, non-finite values).
    #[error("invalid terrain ray: origin {origin:?}, direction {direction:?}, length {length}")]
    InvalidRay {
        origin: Vec2,
        direction: Vec2,
        length: f32,
    },
}

/// Synchronous terrain query.
///
/// Implementations must be deterministic for a fixed world state and must
/// not mutate simulation state.
pub trait TerrainQuery {
    /// Cast `ray` and return the nearest accepted hit within `ray.length`.
    fn cast(&self, ray: &TerrainRay) -> Result<Option<TerrainHit>, TerrainError>;
}

impl<T: TerrainQuery + ?Sized> TerrainQuery for &T {
    fn cast(&self, ray: &TerrainRay) -> Result<Option<TerrainHit>, TerrainError> {
        (**self).cast(ray)
    }
}

/// Adapts a closure to [`TerrainQuery`], for backends whose world access is
/// only available inside a system.
pub struct TerrainQueryFn<F>(pub F);

impl<F> TerrainQuery for TerrainQueryFn<F>
where
    F: Fn(&TerrainRay) -> Result<Option<TerrainHit>, TerrainError>,
{
    fn cast(&self, ray: &TerrainRay) -> Result<Option<TerrainHit>, TerrainError> {
        (self.0)(ray)
    }
}

/// Reject rays the backends cannot sensibly answer.
pub fn validate_ray(ray: &TerrainRay) -> Result<(), TerrainError> {
    let finite = ray.origin.is_finite() && ray.direction.is_finite() && ray.length.is_finite();
    if !finite || ray.direction.length_squared() < 0.5 || ray.length < 0.0 {
        return Err(TerrainError::InvalidRay {
            origin: ray.origin,
            direction: ray.direction,
            length: ray.length,
        });
    }
    Ok(())
}

/// Trait for terrain backend implementations.
///
/// A backend contributes a plugin that adds its sensing system to
/// [`crate::TerrainRunnerSet::Sensors`] (and anything else it needs, such
/// as deriving [`crate::sensors::CharacterBody`] from its colliders).
///
/// # Example
///
/// For implementations, see [`crate::terrain::SegmentTerrainBackend`] and,
/// with the `rapier2d` feature, `rapier::Rapier2dBackend`.
pub trait TerrainBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;
}

/// Backend with no terrain at all.
///
/// Probes are still sampled, so readings stay valid and every probe misses:
/// characters fall freely instead of failing closed. Useful for characters
/// that only ever fly.
pub struct EmptyTerrainBackend;

impl TerrainBackend for EmptyTerrainBackend {
    fn plugin() -> impl Plugin {
        EmptyTerrainPlugin
    }
}

/// Plugin that samples every character's probes against [`EmptyTerrain`].
pub struct EmptyTerrainPlugin;

impl Plugin for EmptyTerrainPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(FixedUpdate, sense_empty_terrain.in_set(TerrainRunnerSet::Sensors));
    }
}

fn sense_empty_terrain(
    time: Res<Time<Fixed>>,
    mut characters: Query<(
        Entity,
        &Transform,
        &SensorArray,
        &CharacterMotion,
        &PhysicsConfig,
        &mut SensorReadings,
    )>,
) {
    let dt = fixed_dt(&time);
    for (entity, transform, array, motion, config, mut readings) in &mut characters {
        *readings = match &array.layout {
            Some(layout) => sample_probes(
                &EmptyTerrain,
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

/// A query that never hits anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTerrain;

impl TerrainQuery for EmptyTerrain {
    fn cast(&self, ray: &TerrainRay) -> Result<Option<TerrainHit>, TerrainError> {
        validate_ray(ray)?;
        Ok(None)
    }
}
