//! Move arbitration.
//!
//! A [`MoveManager`] holds the abilities of one character. Each move walks
//! the lifecycle `Unavailable -> Available -> Active -> (Available |
//! Unavailable)`, or `Active -> Interrupted` when stopped from outside. At
//! most one move per layer is active at any time.
//!
//! Every tick runs four passes over the moves, in priority order (higher
//! `priority` first, then registration order):
//!
//! 1. availability,
//! 2. activation,
//! 3. per-step logic of active moves,
//! 4. completion and queued interrupts.

use bevy::prelude::*;
use thiserror::Error;

use crate::config::PhysicsConfig;
use crate::integrator::MotionModifiers;
use crate::intent::MoveInput;
use crate::orientation::{force_detach, DetachReason, OrientationEvent};
use crate::state::CharacterMotion;

mod air_dash;
mod duck;
mod jump;
mod roll;
mod spindash;

pub use air_dash::AirDash;
pub use duck::Duck;
pub use jump::Jump;
pub use roll::Roll;
pub use spindash::Spindash;

/// Layer of ground actions (jump, spindash).
pub const LAYER_ACTION: i32 = 0;
/// Layer of body postures (duck, roll).
pub const LAYER_POSTURE: i32 = 1;
/// Layer of airborne abilities.
pub const LAYER_AIR: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum MoveState {
    #[default]
    Unavailable,
    Available,
    Active,
    Interrupted,
}

/// What happens when a move wants to activate on an occupied layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum LayerConflict {
    /// Drop the activation.
    #[default]
    Reject,
    /// Remember it and activate once the layer frees up, as long as the move
    /// stays available.
    Queue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("move `{0}` is already registered")]
    Duplicate(&'static str),
    #[error("move `{name}` requires `{dependency}`, which is not registered")]
    MissingDependency {
        name: &'static str,
        dependency: &'static str,
    },
    #[error("move `{0}` is not registered")]
    NotFound(String),
    #[error("move `{name}` is required by `{dependent}`")]
    InUse { name: String, dependent: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum MoveEventKind {
    BecameAvailable,
    BecameUnavailable,
    Activated,
    Ended,
    Interrupted,
}

/// State transition of a move.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct MoveEvent {
    pub character: Entity,
    pub move_name: &'static str,
    pub layer: i32,
    pub kind: MoveEventKind,
    pub old_state: MoveState,
    pub new_state: MoveState,
}

/// What a move sees and may change during one tick.
pub struct MoveContext<'a> {
    pub character: Entity,
    pub motion: &'a mut CharacterMotion,
    pub input: &'a MoveInput,
    pub config: &'a PhysicsConfig,
    pub modifiers: &'a mut MotionModifiers,
    pub dt: f32,
    states: Vec<(&'static str, MoveState)>,
    orientation_events: Vec<OrientationEvent>,
}

impl<'a> MoveContext<'a> {
    pub fn new(
        character: Entity,
        motion: &'a mut CharacterMotion,
        input: &'a MoveInput,
        config: &'a PhysicsConfig,
        modifiers: &'a mut MotionModifiers,
        dt: f32,
    ) -> Self {
        Self {
            character,
            motion,
            input,
            config,
            modifiers,
            dt,
            states: Vec::new(),
            orientation_events: Vec::new(),
        }
    }

    /// State of a sibling move, as of the current pass.
    pub fn state_of(&self, name: &str) -> Option<MoveState> {
        self.states.iter().find(|(n, _)| *n == name).map(|(_, s)| *s)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.state_of(name) == Some(MoveState::Active)
    }

    /// Leave the ground now, keeping ground speed as world velocity.
    pub fn detach(&mut self) {
        if let Some(event) = force_detach(self.character, self.motion, self.config, DetachReason::Requested) {
            self.orientation_events.push(event);
        }
    }

    /// Leave the ground with an extra `speed` along the surface normal.
    pub fn launch(&mut self, speed: f32) {
        let up = self.motion.up();
        let event = force_detach(self.character, self.motion, self.config, DetachReason::Requested);
        self.motion.velocity += up * speed;
        if let Some(mut event) = event {
            event.velocity = self.motion.velocity;
            self.orientation_events.push(event);
        }
    }

    /// Orientation changes caused by moves this tick.
    pub fn take_orientation_events(&mut self) -> Vec<OrientationEvent> {
        std::mem::take(&mut self.orientation_events)
    }

    fn set_state(&mut self, name: &'static str, state: MoveState) {
        if let Some(entry) = self.states.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = state;
        }
    }
}

/// An ability driven by the [`MoveManager`].
pub trait Move: Send + Sync + 'static {
    /// Unique name within one manager.
    fn name(&self) -> &'static str;

    /// Moves sharing a layer are mutually exclusive.
    fn layer(&self) -> i32;

    /// Higher priority wins activation conflicts.
    fn priority(&self) -> i32 {
        0
    }

    /// Names of moves that must be registered before this one.
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    fn conflict_policy(&self) -> LayerConflict {
        LayerConflict::Reject
    }

    /// Bookkeeping run every tick before the availability pass, in any state.
    fn on_tick(&mut self, _ctx: &MoveContext) {}

    fn is_available(&self, ctx: &MoveContext) -> bool;

    /// Trigger condition, checked while available.
    fn should_activate(&self, ctx: &MoveContext) -> bool;

    fn on_activate(&mut self, _ctx: &mut MoveContext) {}

    fn on_step(&mut self, _ctx: &mut MoveContext) {}

    fn is_complete(&self, _ctx: &MoveContext) -> bool {
        false
    }

    fn on_end(&mut self, _ctx: &mut MoveContext) {}

    fn on_interrupt(&mut self, _ctx: &mut MoveContext) {}
}

struct MoveSlot {
    mv: Box<dyn Move>,
    state: MoveState,
    queued: bool,
    interrupt_pending: bool,
    remove_pending: bool,
}

/// Registry and state machine of a character's moves.
#[derive(Component, Default)]
pub struct MoveManager {
    slots: Vec<MoveSlot>,
}

impl std::fmt::Debug for MoveManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|slot| (slot.mv.name(), slot.state)))
            .finish()
    }
}

impl MoveManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager with the built-in moves registered.
    pub fn with_builtin_moves() -> Self {
        let mut manager = Self::new();
        let builtins: [Box<dyn Move>; 5] = [
            Box::new(Jump::default()),
            Box::new(Duck::default()),
            Box::new(Roll::default()),
            Box::new(Spindash::default()),
            Box::new(AirDash::default()),
        ];
        for mv in builtins {
            // Registration order satisfies every dependency.
            if let Err(err) = manager.add_boxed(mv) {
                error!("Built-in move registration failed: {}", err);
            }
        }
        manager
    }

    /// Register a move. It starts out `Unavailable`.
    pub fn add_move(&mut self, mv: impl Move) -> Result<(), MoveError> {
        self.add_boxed(Box::new(mv))
    }

    pub fn add_boxed(&mut self, mv: Box<dyn Move>) -> Result<(), MoveError> {
        let name = mv.name();
        if self.slots.iter().any(|s| s.mv.name() == name && !s.remove_pending) {
            return Err(MoveError::Duplicate(name));
        }
        for &dependency in mv.dependencies() {
            if !self.contains(dependency) {
                return Err(MoveError::MissingDependency { name, dependency });
            }
        }

        // Stable insertion: after every slot of equal or higher priority.
        let priority = mv.priority();
        let index = self
            .slots
            .iter()
            .position(|s| s.mv.priority() < priority)
            .unwrap_or(self.slots.len());
        self.slots.insert(
            index,
            MoveSlot {
                mv,
                state: MoveState::Unavailable,
                queued: false,
                interrupt_pending: false,
                remove_pending: false,
            },
        );
        debug!("Registered move `{}`", name);
        self.debug_check_layers();
        Ok(())
    }

    /// Unregister a move at the next evaluation. An active move is
    /// interrupted first.
    pub fn remove_move(&mut self, name: &str) -> Result<(), MoveError> {
        if !self.contains(name) {
            return Err(MoveError::NotFound(name.to_string()));
        }
        if let Some(dependent) = self
            .slots
            .iter()
            .filter(|s| !s.remove_pending)
            .find(|s| s.mv.dependencies().contains(&name))
        {
            return Err(MoveError::InUse {
                name: name.to_string(),
                dependent: dependent.mv.name(),
            });
        }
        for slot in self.slots.iter_mut().filter(|s| s.mv.name() == name) {
            slot.remove_pending = true;
            if slot.state == MoveState::Active {
                slot.interrupt_pending = true;
            }
        }
        Ok(())
    }

    /// Interrupt an active move at the end of the next evaluation.
    pub fn interrupt(&mut self, name: &str) -> Result<(), MoveError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.mv.name() == name && !s.remove_pending)
            .ok_or_else(|| MoveError::NotFound(name.to_string()))?;
        if slot.state == MoveState::Active {
            slot.interrupt_pending = true;
        }
        Ok(())
    }

    /// Interrupt every active move.
    pub fn interrupt_all(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| s.state == MoveState::Active) {
            slot.interrupt_pending = true;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.iter().any(|s| s.mv.name() == name && !s.remove_pending)
    }

    pub fn state(&self, name: &str) -> Option<MoveState> {
        self.slots
            .iter()
            .find(|s| s.mv.name() == name && !s.remove_pending)
            .map(|s| s.state)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.state(name) == Some(MoveState::Active)
    }

    /// Name of the active move on `layer`, if any.
    pub fn active_on_layer(&self, layer: i32) -> Option<&'static str> {
        self.slots
            .iter()
            .find(|s| s.state == MoveState::Active && s.mv.layer() == layer)
            .map(|s| s.mv.name())
    }

    /// Active moves with their layers.
    pub fn active(&self) -> impl Iterator<Item = (&'static str, i32)> + '_ {
        self.slots
            .iter()
            .filter(|s| s.state == MoveState::Active)
            .map(|s| (s.mv.name(), s.mv.layer()))
    }

    /// Names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|s| s.mv.name())
    }

    /// Run the four passes for one tick.
    pub fn evaluate(&mut self, ctx: &mut MoveContext) -> Vec<MoveEvent> {
        let mut events = Vec::new();
        ctx.states = self.slots.iter().map(|s| (s.mv.name(), s.state)).collect();

        for slot in self.slots.iter_mut() {
            slot.mv.on_tick(ctx);
        }

        // 1. Availability
        for slot in self.slots.iter_mut() {
            if slot.state == MoveState::Active || slot.remove_pending {
                continue;
            }
            let available = slot.mv.is_available(ctx);
            let next = if available {
                MoveState::Available
            } else {
                MoveState::Unavailable
            };
            if !available {
                slot.queued = false;
            }
            if next != slot.state {
                let kind = if available {
                    MoveEventKind::BecameAvailable
                } else {
                    MoveEventKind::BecameUnavailable
                };
                events.push(transition(ctx, slot, next, kind));
            }
        }

        // 2. Activation
        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if slot.state != MoveState::Available || slot.remove_pending {
                continue;
            }
            if !slot.queued && !slot.mv.should_activate(ctx) {
                continue;
            }
            let layer = slot.mv.layer();
            if let Some(holder) = self.active_on_layer(layer) {
                let slot = &mut self.slots[index];
                match slot.mv.conflict_policy() {
                    LayerConflict::Reject => {
                        debug!("`{}` rejected, layer {} held by `{}`", slot.mv.name(), layer, holder);
                    }
                    LayerConflict::Queue => slot.queued = true,
                }
                continue;
            }
            let slot = &mut self.slots[index];
            slot.queued = false;
            events.push(transition(ctx, slot, MoveState::Active, MoveEventKind::Activated));
            slot.mv.on_activate(ctx);
        }

        // 3. Step
        for slot in self.slots.iter_mut() {
            if slot.state == MoveState::Active && !slot.interrupt_pending {
                slot.mv.on_step(ctx);
            }
        }

        // 4. Completion and interrupts
        for slot in self.slots.iter_mut() {
            if slot.state != MoveState::Active {
                slot.interrupt_pending = false;
                continue;
            }
            if slot.interrupt_pending {
                slot.interrupt_pending = false;
                slot.queued = false;
                events.push(transition(ctx, slot, MoveState::Interrupted, MoveEventKind::Interrupted));
                slot.mv.on_interrupt(ctx);
            } else if slot.mv.is_complete(ctx) {
                let next = if !slot.remove_pending && slot.mv.is_available(ctx) {
                    MoveState::Available
                } else {
                    MoveState::Unavailable
                };
                events.push(transition(ctx, slot, next, MoveEventKind::Ended));
                slot.mv.on_end(ctx);
            }
        }

        self.slots.retain(|slot| {
            if slot.remove_pending {
                debug!("Removed move `{}`", slot.mv.name());
            }
            !slot.remove_pending
        });

        self.debug_check_layers();
        for event in events.iter_mut() {
            event.character = ctx.character;
        }
        events
    }

    fn debug_check_layers(&self) {
        if cfg!(debug_assertions) {
            for (i, a) in self.slots.iter().enumerate() {
                if a.state != MoveState::Active {
                    continue;
                }
                let clash = self.slots[i + 1..]
                    .iter()
                    .any(|b| b.state == MoveState::Active && b.mv.layer() == a.mv.layer());
                debug_assert!(!clash, "two active moves on layer {}", a.mv.layer());
            }
        }
    }
}

fn transition(ctx: &mut MoveContext, slot: &mut MoveSlot, next: MoveState, kind: MoveEventKind) -> MoveEvent {
    let old = slot.state;
    slot.state = next;
    ctx.set_state(slot.mv.name(), next);
    MoveEvent {
        character: ctx.character,
        move_name: slot.mv.name(),
        layer: slot.mv.layer(),
        kind,
        old_state: old,
        new_state: next,
    }
}
