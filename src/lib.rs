//! # `terrain_runner`
//!
//! Terrain-relative 2D character physics with a layered move state machine.
//!
//! Characters run on arbitrarily rotated ground: slopes, walls, ceilings and
//! full loops. The crate provides:
//! - A 9-probe sensor array cast in the character's rotated frame
//! - An orientation resolver with four wall modes and switch hysteresis
//! - Ground-speed and air-velocity integration with anti-tunneling
//! - A priority-ordered move state machine with per-layer exclusion
//! - Trigger volumes with bubbling, moving platforms and scoped overrides
//! - A terrain backend abstraction (segment terrain built in, Rapier2D optional)
//!
//! ## Architecture
//!
//! Every fixed step runs the same chain of [`TerrainRunnerSet`]s:
//! 1. Queued overrides (teleports, damage) apply
//! 2. Moving platforms advance and carry their riders
//! 3. The backend casts each character's probes
//! 4. The orientation resolver attaches, detaches and switches wall modes
//! 5. Ground speed or air velocity integrates into a position change
//! 6. Moves evaluate and may detach or launch the character
//! 7. Trigger volumes dispatch enter/stay/exit
//! 8. Queued events flush, environment effects apply, input edges latch
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use terrain_runner::prelude::*;
//!
//! let character = TerrainRunnerBundle::new(CharacterBody::new(0.3, 0.5), PhysicsConfig::classic());
//! assert!(character.moves.contains("jump"));
//!
//! // Spawn it together with a Transform
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod collision;
pub mod config;
pub mod events;
pub mod integrator;
pub mod intent;
pub mod math;
pub mod moves;
pub mod orientation;
pub mod overrides;
pub mod platforms;
pub mod sensors;
pub mod state;
pub mod systems;
pub mod terrain;
pub mod triggers;

#[cfg(feature = "rapier2d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{EmptyTerrainBackend, TerrainBackend, TerrainError, TerrainQuery};
    pub use crate::collision::{ContactSide, SurfaceTags, TerrainCastHit, TerrainFilter, TerrainHit, TerrainRay};
    pub use crate::config::{ConfigError, PhysicsConfig};
    pub use crate::integrator::MotionModifiers;
    pub use crate::intent::MoveInput;
    pub use crate::moves::{
        AirDash, Duck, Jump, LayerConflict, Move, MoveContext, MoveError, MoveEvent, MoveEventKind, MoveManager,
        MoveState, Roll, Spindash,
    };
    pub use crate::orientation::{DetachReason, OrientationEvent, OrientationKind, SurfaceContact};
    pub use crate::overrides::{
        EnvironmentEffect, ForcedChange, OverrideOp, OverrideToken, PendingOverrides, Tunable, TunableOverrides,
    };
    pub use crate::platforms::{MovingPlatform, PlatformEvent, PlatformEventKind};
    pub use crate::sensors::{CharacterBody, ProbeId, SensorReadings};
    pub use crate::state::{Airborne, CharacterMotion, Grounded, WallMode};
    pub use crate::terrain::{SegmentTerrainBackend, TerrainSegments};
    pub use crate::triggers::{Bumper, TriggerEvent, TriggerKind, TriggerShape, TriggerVolume};
    pub use crate::{TerrainRunnerBundle, TerrainRunnerPlugin, TerrainRunnerSet};

    #[cfg(feature = "rapier2d")]
    pub use crate::rapier::Rapier2dBackend;
}

/// Steps of the fixed tick, in execution order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainRunnerSet {
    Overrides,
    Platforms,
    /// Backends add their probe sampling here.
    Sensors,
    Orientation,
    Integration,
    Moves,
    Triggers,
    Flush,
}

/// Every component a character needs. Spawn it with a `Transform`.
#[derive(Bundle)]
pub struct TerrainRunnerBundle {
    pub motion: state::CharacterMotion,
    pub body: sensors::CharacterBody,
    pub sensors: sensors::SensorArray,
    pub readings: sensors::SensorReadings,
    pub config: config::PhysicsConfig,
    pub input: intent::MoveInput,
    pub moves: moves::MoveManager,
    pub modifiers: integrator::MotionModifiers,
    pub contact: orientation::SurfaceContact,
    pub overrides: overrides::TunableOverrides,
    pub pending: overrides::PendingOverrides,
    pub effects: overrides::ActiveEffects,
    pub events: events::CharacterEventQueue,
}

impl Default for TerrainRunnerBundle {
    fn default() -> Self {
        Self::new(sensors::CharacterBody::default(), config::PhysicsConfig::default())
    }
}

impl TerrainRunnerBundle {
    /// Airborne character at rest with the built-in moves.
    pub fn new(body: sensors::CharacterBody, config: config::PhysicsConfig) -> Self {
        Self {
            motion: state::CharacterMotion::default(),
            sensors: sensors::SensorArray::from_body(&body),
            body,
            readings: default(),
            config,
            input: default(),
            moves: moves::MoveManager::with_builtin_moves(),
            modifiers: default(),
            contact: default(),
            overrides: default(),
            pending: default(),
            effects: default(),
            events: default(),
        }
    }

    /// Builder: initial motion state.
    pub fn with_motion(mut self, motion: state::CharacterMotion) -> Self {
        self.motion = motion;
        self
    }

    /// Builder: replace the move set.
    pub fn with_moves(mut self, moves: moves::MoveManager) -> Self {
        self.moves = moves;
        self
    }
}

/// Main plugin for terrain-relative characters.
///
/// This plugin is generic over a terrain backend `B` which samples the
/// probes against world geometry.
///
/// # Type Parameters
/// - `B`: The terrain backend (e.g., `SegmentTerrainBackend`)
///
/// # Examples
///
/// With the built-in segment terrain:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use terrain_runner::prelude::*;
///
/// App::new()
///     .add_plugins(MinimalPlugins)
///     .add_plugins(TerrainRunnerPlugin::<SegmentTerrainBackend>::default())
///     .run();
/// ```
pub struct TerrainRunnerPlugin<B: backend::TerrainBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::TerrainBackend> Default for TerrainRunnerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::TerrainBackend> Plugin for TerrainRunnerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<state::CharacterMotion>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<sensors::CharacterBody>();
        app.register_type::<sensors::SensorArray>();
        app.register_type::<sensors::SensorReadings>();
        app.register_type::<config::PhysicsConfig>();
        app.register_type::<intent::MoveInput>();
        app.register_type::<integrator::MotionModifiers>();
        app.register_type::<orientation::SurfaceContact>();
        app.register_type::<overrides::TunableOverrides>();
        app.register_type::<overrides::PendingOverrides>();
        app.register_type::<overrides::ActiveEffects>();
        app.register_type::<overrides::EnvironmentEffect>();
        app.register_type::<triggers::TriggerVolume>();
        app.register_type::<triggers::TriggerOccupants>();
        app.register_type::<triggers::Bumper>();
        app.register_type::<platforms::MovingPlatform>();
        app.register_type::<platforms::PlatformRiders>();

        app.add_event::<orientation::OrientationEvent>();
        app.add_event::<moves::MoveEvent>();
        app.add_event::<collision::TerrainCastHit>();
        app.add_event::<triggers::TriggerEvent>();
        app.add_event::<platforms::PlatformEvent>();

        // Add the terrain backend plugin
        app.add_plugins(B::plugin());

        app.configure_sets(
            FixedUpdate,
            (
                TerrainRunnerSet::Overrides,
                TerrainRunnerSet::Platforms,
                TerrainRunnerSet::Sensors,
                TerrainRunnerSet::Orientation,
                TerrainRunnerSet::Integration,
                TerrainRunnerSet::Moves,
                TerrainRunnerSet::Triggers,
                TerrainRunnerSet::Flush,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            (
                (
                    systems::report_invalid_configs,
                    systems::apply_pending_overrides,
                    sensors::regenerate_sensors,
                )
                    .chain()
                    .in_set(TerrainRunnerSet::Overrides),
                platforms::move_platforms.in_set(TerrainRunnerSet::Platforms),
                systems::resolve_orientation.in_set(TerrainRunnerSet::Orientation),
                systems::integrate_motion.in_set(TerrainRunnerSet::Integration),
                systems::evaluate_moves.in_set(TerrainRunnerSet::Moves),
                (triggers::dispatch_triggers, triggers::react_to_bumpers)
                    .chain()
                    .in_set(TerrainRunnerSet::Triggers),
                (
                    overrides::apply_environment_effects,
                    events::flush_character_events,
                    systems::sync_state_markers,
                    systems::latch_input,
                )
                    .chain()
                    .in_set(TerrainRunnerSet::Flush),
            ),
        );
    }
}
