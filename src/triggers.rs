//! Reactive trigger dispatch.
//!
//! A [`TriggerVolume`] reports `Enter`, `Stay` and `Exit` for every character
//! overlapping it. Volumes flagged `trigger_from_children` also receive the
//! contacts of every descendant volume, so a composite built from several
//! child shapes behaves as one logical volume: crossing from one child into
//! another produces no extra `Exit`/`Enter` on the parent. Bubbling climbs
//! through listening volumes only and stops at the first ancestor that does
//! not listen.

use std::collections::BTreeMap;

use bevy::prelude::*;

use crate::events::CharacterEventQueue;
use crate::math;
use crate::overrides::{ForcedChange, PendingOverrides};
use crate::sensors::CharacterBody;
use crate::state::{CharacterMotion, WallMode};

/// Shape of a trigger volume, centered on its entity.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum TriggerShape {
    Rect { half_extents: Vec2 },
    Circle { radius: f32 },
}

impl TriggerShape {
    /// Whether an axis-aligned box overlaps the shape placed at `center`.
    pub fn overlaps_box(&self, center: Vec2, box_center: Vec2, box_half: Vec2) -> bool {
        match *self {
            TriggerShape::Rect { half_extents } => {
                let d = (box_center - center).abs();
                d.x <= half_extents.x + box_half.x && d.y <= half_extents.y + box_half.y
            }
            TriggerShape::Circle { radius } => {
                let nearest = center.clamp(box_center - box_half, box_center + box_half);
                nearest.distance_squared(center) <= radius * radius
            }
        }
    }
}

/// Region that reports characters entering, staying in and leaving it.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct TriggerVolume {
    /// Own shape. `None` for a pure grouping volume fed by its children.
    pub shape: Option<TriggerShape>,
    /// Also count contacts of descendant volumes as contacts of this one.
    pub trigger_from_children: bool,
}

impl TriggerVolume {
    pub fn rect(half_extents: Vec2) -> Self {
        Self {
            shape: Some(TriggerShape::Rect { half_extents }),
            trigger_from_children: false,
        }
    }

    pub fn circle(radius: f32) -> Self {
        Self {
            shape: Some(TriggerShape::Circle { radius }),
            trigger_from_children: false,
        }
    }

    /// Shapeless volume that only listens to its children.
    pub fn group() -> Self {
        Self {
            shape: None,
            trigger_from_children: true,
        }
    }

    /// Builder: listen to descendant volumes.
    pub fn listening_to_children(mut self) -> Self {
        self.trigger_from_children = true;
        self
    }
}

/// Characters inside a volume as of the last dispatch, sorted by entity.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct TriggerOccupants {
    /// `(character, source volume)` pairs.
    pub entries: Vec<(Entity, Entity)>,
}

impl TriggerOccupants {
    pub fn contains(&self, character: Entity) -> bool {
        self.entries.iter().any(|(c, _)| *c == character)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum TriggerKind {
    Enter,
    Stay,
    Exit,
}

/// Contact change between a character and a logical volume.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub volume: Entity,
    pub character: Entity,
    /// Volume whose shape actually overlaps; differs from `volume` for
    /// contacts bubbled up from a child.
    pub source: Entity,
}

/// World-space half extents of a character's box for its wall mode.
pub fn character_box(body: &CharacterBody, motion: &CharacterMotion) -> Vec2 {
    match motion.wall_mode {
        WallMode::Right | WallMode::Left => body.half_extents.yx(),
        _ => body.half_extents,
    }
}

/// Compare current logical contacts with the previous set.
///
/// Both inputs must be sorted by character. Returns the events in character
/// order.
pub fn diff_contacts(
    volume: Entity,
    previous: &[(Entity, Entity)],
    current: &[(Entity, Entity)],
) -> Vec<TriggerEvent> {
    let mut events = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < previous.len() || j < current.len() {
        let prev = previous.get(i);
        let cur = current.get(j);
        match (prev, cur) {
            (Some(&(pc, _)), Some(&(cc, cs))) if pc == cc => {
                events.push(TriggerEvent {
                    kind: TriggerKind::Stay,
                    volume,
                    character: cc,
                    source: cs,
                });
                i += 1;
                j += 1;
            }
            (Some(&(pc, ps)), Some(&(cc, _))) if pc < cc => {
                events.push(TriggerEvent {
                    kind: TriggerKind::Exit,
                    volume,
                    character: pc,
                    source: ps,
                });
                i += 1;
            }
            (Some(&(pc, ps)), None) => {
                events.push(TriggerEvent {
                    kind: TriggerKind::Exit,
                    volume,
                    character: pc,
                    source: ps,
                });
                i += 1;
            }
            (_, Some(&(cc, cs))) => {
                events.push(TriggerEvent {
                    kind: TriggerKind::Enter,
                    volume,
                    character: cc,
                    source: cs,
                });
                j += 1;
            }
            (None, None) => break,
        }
    }
    events
}

/// Evaluate volume contacts and write trigger events.
pub fn dispatch_triggers(
    mut commands: Commands,
    characters: Query<(Entity, &Transform, &CharacterBody, &CharacterMotion)>,
    volumes: Query<(Entity, &TriggerVolume, &GlobalTransform, Option<&TriggerOccupants>)>,
    parents: Query<&ChildOf>,
    mut writer: EventWriter<TriggerEvent>,
) {
    // Logical contacts per volume: character -> direct source volume.
    let mut logical: BTreeMap<Entity, BTreeMap<Entity, Entity>> = BTreeMap::new();

    for (volume, trigger, transform, _) in &volumes {
        let Some(shape) = trigger.shape else {
            continue;
        };
        let center = transform.translation().truncate();
        for (character, character_transform, body, motion) in &characters {
            let box_center = character_transform.translation.truncate();
            if !shape.overlaps_box(center, box_center, character_box(body, motion)) {
                continue;
            }
            logical.entry(volume).or_default().entry(character).or_insert(volume);

            // Bubble up through the unbroken chain of listening ancestors.
            let mut current = volume;
            while let Ok(child_of) = parents.get(current) {
                let parent = child_of.parent();
                match volumes.get(parent) {
                    Ok((_, parent_trigger, _, _)) if parent_trigger.trigger_from_children => {
                        logical.entry(parent).or_default().entry(character).or_insert(volume);
                    }
                    _ => break,
                }
                current = parent;
            }
        }
    }

    for (volume, _, _, occupants) in &volumes {
        let current: Vec<(Entity, Entity)> = logical
            .remove(&volume)
            .map(|contacts| contacts.into_iter().collect())
            .unwrap_or_default();
        let previous = occupants.map(|o| o.entries.as_slice()).unwrap_or(&[]);
        if previous.is_empty() && current.is_empty() {
            continue;
        }

        let events = diff_contacts(volume, previous, &current);
        for event in &events {
            if event.kind != TriggerKind::Stay {
                debug!("{:?} {:?} {:?}", event.character, event.kind, event.volume);
            }
        }
        writer.write_batch(events);
        commands.entity(volume).insert(TriggerOccupants { entries: current });
    }
}

/// Terrain that launches characters touching it along its normal.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct Bumper {
    /// Launch speed.
    pub strength: f32,
}

impl Default for Bumper {
    fn default() -> Self {
        Self { strength: 10.0 }
    }
}

/// Queue a launch for every character whose contacts this tick include a
/// bumper. The launch applies at the start of the next tick.
pub fn react_to_bumpers(
    bumpers: Query<&Bumper>,
    mut characters: Query<(&CharacterEventQueue, &mut PendingOverrides)>,
) {
    for (queue, mut pending) in &mut characters {
        let bump = queue.casts.iter().find_map(|cast| {
            let bumper = bumpers.get(cast.surface?).ok()?;
            Some(math::degrees_to_vec(cast.normal_angle) * bumper.strength)
        });
        if let Some(velocity) = bump {
            pending.push(ForcedChange::Launch(velocity));
        }
    }
}
