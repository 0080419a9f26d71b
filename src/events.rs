//! Per-character event buffering.
//!
//! Systems inside the tick push into [`CharacterEventQueue`]; the flush
//! system writes everything out as Bevy events at the end of the tick, so
//! observers always see a committed state.

use bevy::prelude::*;

use crate::collision::TerrainCastHit;
use crate::moves::MoveEvent;
use crate::orientation::OrientationEvent;

/// Events produced for one character during the current tick.
#[derive(Component, Debug, Clone, Default)]
pub struct CharacterEventQueue {
    pub orientation: Vec<OrientationEvent>,
    pub moves: Vec<MoveEvent>,
    pub casts: Vec<TerrainCastHit>,
}

impl CharacterEventQueue {
    pub fn is_empty(&self) -> bool {
        self.orientation.is_empty() && self.moves.is_empty() && self.casts.is_empty()
    }

    pub fn clear(&mut self) {
        self.orientation.clear();
        self.moves.clear();
        self.casts.clear();
    }
}

/// Write queued events in character order.
pub fn flush_character_events(
    mut queues: Query<(Entity, &mut CharacterEventQueue)>,
    mut orientation: EventWriter<OrientationEvent>,
    mut moves: EventWriter<MoveEvent>,
    mut casts: EventWriter<TerrainCastHit>,
) {
    let mut sorted: Vec<_> = queues.iter_mut().filter(|(_, q)| !q.is_empty()).collect();
    sorted.sort_by_key(|(entity, _)| *entity);

    for (_, mut queue) in sorted {
        orientation.write_batch(queue.orientation.drain(..));
        moves.write_batch(queue.moves.drain(..));
        casts.write_batch(queue.casts.drain(..));
    }
}
