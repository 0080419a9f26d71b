//! Moving platforms.
//!
//! Platforms move first in the tick and carry every grounded character whose
//! ground entity is the platform, so sensors see riders and terrain at their
//! committed positions.

use std::f32::consts::TAU;

use bevy::prelude::*;

use crate::state::CharacterMotion;
use crate::systems::fixed_dt;

/// Ping-pong motion between two points with eased ends.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct MovingPlatform {
    pub start: Vec2,
    pub end: Vec2,
    /// Seconds for a full round trip.
    pub period: f32,
    pub elapsed: f32,
    /// Displacement of the last tick.
    pub delta: Vec2,
}

impl MovingPlatform {
    pub fn new(start: Vec2, end: Vec2, period: f32) -> Self {
        Self {
            start,
            end,
            period,
            elapsed: 0.0,
            delta: Vec2::ZERO,
        }
    }

    /// Position after `elapsed` seconds.
    pub fn position_at(&self, elapsed: f32) -> Vec2 {
        if !(self.period > 0.0 && self.period.is_finite()) {
            return self.start;
        }
        let phase = (elapsed / self.period).fract();
        let t = 0.5 - 0.5 * (phase * TAU).cos();
        self.start.lerp(self.end, t)
    }

    /// Advance by `dt`, returning the displacement.
    pub fn advance(&mut self, dt: f32) -> Vec2 {
        let before = self.position_at(self.elapsed);
        self.elapsed += dt;
        if self.period > 0.0 && self.period.is_finite() {
            self.elapsed %= self.period;
        }
        self.delta = self.position_at(self.elapsed) - before;
        self.delta
    }
}

/// Characters standing on a platform, sorted.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct PlatformRiders(pub Vec<Entity>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum PlatformEventKind {
    Enter,
    Stay,
    Exit,
}

/// A character standing on, staying on or leaving a platform.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformEvent {
    pub kind: PlatformEventKind,
    pub platform: Entity,
    pub character: Entity,
}

/// Move platforms and carry their riders.
pub fn move_platforms(
    mut commands: Commands,
    time: Res<Time<Fixed>>,
    mut platforms: Query<
        (Entity, &mut MovingPlatform, &mut Transform, Option<&PlatformRiders>),
        Without<CharacterMotion>,
    >,
    mut characters: Query<(Entity, &CharacterMotion, &mut Transform), Without<MovingPlatform>>,
    mut writer: EventWriter<PlatformEvent>,
) {
    let dt = fixed_dt(&time);

    for (platform, mut mover, mut transform, previous) in &mut platforms {
        let delta = mover.advance(dt);
        transform.translation += delta.extend(0.0);

        let mut riders: Vec<Entity> = Vec::new();
        for (character, motion, mut character_transform) in &mut characters {
            if motion.grounded && motion.ground_entity == Some(platform) {
                character_transform.translation += delta.extend(0.0);
                riders.push(character);
            }
        }
        riders.sort();

        let previous = previous.map(|p| p.0.as_slice()).unwrap_or(&[]);
        for &character in previous.iter().filter(|c| !riders.contains(c)) {
            writer.write(PlatformEvent {
                kind: PlatformEventKind::Exit,
                platform,
                character,
            });
        }
        for &character in &riders {
            let kind = if previous.contains(&character) {
                PlatformEventKind::Stay
            } else {
                PlatformEventKind::Enter
            };
            writer.write(PlatformEvent {
                kind,
                platform,
                character,
            });
        }

        if previous != riders.as_slice() {
            commands.entity(platform).insert(PlatformRiders(riders));
        }
    }
}
