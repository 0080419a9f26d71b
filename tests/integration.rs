//! Integration tests for the terrain runner.
//!
//! These tests drive a headless app with the segment terrain backend, one
//! fixed step at a time. Each test prints its PROOF values.

use bevy::prelude::*;
use terrain_runner::prelude::*;

const DT: f32 = 1.0 / 60.0;

/// Create a minimal test app with the segment terrain backend.
fn create_test_app() -> App {
    create_app_with::<SegmentTerrainBackend>()
}

fn create_app_with<B: TerrainBackend>() -> App {
    let mut app = App::new();

    app.add_plugins(MinimalPlugins);
    app.add_plugins(TerrainRunnerPlugin::<B>::default());
    app.insert_resource(Time::<Fixed>::from_hz(60.0));

    app.finish();
    app.cleanup();
    app
}

/// Run one fixed step.
fn tick(app: &mut App) {
    app.world_mut().run_schedule(FixedUpdate);
}

/// Run the app for N fixed steps.
fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        tick(app);
    }
}

/// Spawn terrain at the origin.
fn spawn_terrain(app: &mut App, segments: TerrainSegments) -> Entity {
    spawn_terrain_at(app, Vec2::ZERO, segments)
}

fn spawn_terrain_at(app: &mut App, position: Vec2, segments: TerrainSegments) -> Entity {
    app.world_mut()
        .spawn((Transform::from_translation(position.extend(0.0)), segments))
        .id()
}

/// Spawn a character with the default body.
fn spawn_character(app: &mut App, position: Vec2, motion: CharacterMotion, config: PhysicsConfig) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(position.extend(0.0)),
            TerrainRunnerBundle::new(CharacterBody::new(0.3, 0.5), config).with_motion(motion),
        ))
        .id()
}

/// Solid line at `angle` degrees through `pivot`, 2 units each way.
fn slope_through(pivot: Vec2, angle: f32) -> TerrainSegments {
    let direction = Vec2::from_angle(angle.to_radians()) * 2.0;
    TerrainSegments::polyline([pivot - direction, pivot + direction], SurfaceTags::SOLID)
}

fn spawn_volume(app: &mut App, position: Vec2, volume: TriggerVolume) -> Entity {
    let transform = Transform::from_translation(position.extend(0.0));
    app.world_mut()
        .spawn((transform, GlobalTransform::from(transform), volume))
        .id()
}

fn motion(app: &App, entity: Entity) -> CharacterMotion {
    *app.world().get::<CharacterMotion>(entity).unwrap()
}

fn position(app: &App, entity: Entity) -> Vec2 {
    app.world().get::<Transform>(entity).unwrap().translation.truncate()
}

fn input(app: &mut App, entity: Entity) -> Mut<'_, MoveInput> {
    app.world_mut().get_mut::<MoveInput>(entity).unwrap()
}

/// Every event of type `E` written so far.
///
/// Only `FixedUpdate` runs, so event buffers never swap.
fn events<E: Event + Clone>(app: &App) -> Vec<E> {
    app.world()
        .resource::<Events<E>>()
        .iter_current_update_events()
        .cloned()
        .collect()
}

// ==================== Ground Contact Tests ====================

mod ground_contact {
    use super::*;

    #[test]
    fn falling_character_lands_on_floor() {
        let mut app = create_test_app();
        spawn_terrain(&mut app, TerrainSegments::floor(-10.0, 10.0, 0.0));
        let character = spawn_character(
            &mut app,
            Vec2::new(0.0, 1.0),
            CharacterMotion::default(),
            PhysicsConfig::classic(),
        );

        run_frames(&mut app, 60);

        let m = motion(&app, character);
        let pos = position(&app, character);
        println!("PROOF: grounded={} mode={:?} y={}", m.grounded, m.wall_mode, pos.y);

        assert!(m.grounded);
        assert_eq!(m.wall_mode, WallMode::Floor);
        assert!((pos.y - 0.5).abs() < 0.02, "feet should rest on the floor, y = {}", pos.y);
        assert!(app.world().get::<Grounded>(character).is_some());
        assert!(app.world().get::<Airborne>(character).is_none());

        let attached = events::<OrientationEvent>(&app)
            .into_iter()
            .filter(|e| e.character == character && e.kind == OrientationKind::Attached)
            .count();
        assert_eq!(attached, 1);
    }

    #[test]
    fn slope_gravity_changes_speed_per_tick() {
        let mut app = create_test_app();
        let (sin, cos) = 30f32.to_radians().sin_cos();
        spawn_terrain(
            &mut app,
            TerrainSegments::polyline(
                [Vec2::new(-10.0 * cos, -10.0 * sin), Vec2::new(10.0 * cos, 10.0 * sin)],
                SurfaceTags::SOLID,
            ),
        );
        let config = PhysicsConfig::classic()
            .with_slope_gravity(4.5)
            .with_ground_curve(1.6875, 18.0, 0.0);
        // Right ground sensor rests on the slope.
        let start = Vec2::new(0.0, 0.5 + 0.3 * 30f32.to_radians().tan());
        let character = spawn_character(
            &mut app,
            start,
            CharacterMotion::grounded_on(30.0, WallMode::Floor, 0.0),
            config,
        );

        let expected_step = 4.5 * 0.5 * DT;
        for n in 1..=60 {
            tick(&mut app);
            let m = motion(&app, character);
            assert!(m.grounded, "left the slope at tick {}", n);
            assert!((m.surface_angle - 30.0).abs() < 1e-2);
            assert!(
                (m.ground_speed + expected_step * n as f32).abs() < 1e-4,
                "tick {}: ground speed {}",
                n,
                m.ground_speed
            );
        }
        println!("PROOF: ground speed after 60 ticks = {}", motion(&app, character).ground_speed);
    }

    #[test]
    fn fast_character_stops_at_thin_wall() {
        let mut app = create_test_app();
        // 0.1 thick, spanning x = 0.35 .. 0.45
        spawn_terrain_at(&mut app, Vec2::new(0.4, 5.0), TerrainSegments::rect(Vec2::new(0.05, 5.0)));
        let character = spawn_character(
            &mut app,
            Vec2::new(0.0, 5.0),
            CharacterMotion::airborne(Vec2::new(20.0, 0.0)),
            PhysicsConfig::classic(),
        );

        run_frames(&mut app, 10);

        let pos = position(&app, character);
        let m = motion(&app, character);
        println!("PROOF: x={} vx={}", pos.x, m.velocity.x);

        assert!(pos.x <= 0.05 + 1e-3, "passed into the wall, x = {}", pos.x);
        assert!(pos.x > 0.0);
        assert!(m.velocity.x.abs() < 1e-4);

        let hits = events::<TerrainCastHit>(&app);
        assert!(hits
            .iter()
            .any(|h| h.source_controller == character && h.side == ContactSide::Right));
    }

    #[test]
    fn slow_character_keeps_wall_mode() {
        let mut app = create_test_app();
        let config = PhysicsConfig::classic()
            .with_slope_gravity(0.0)
            .with_ground_curve(1.6875, 18.0, 0.0);
        let (sin, cos) = 60f32.to_radians().sin_cos();
        let rise = 0.3 * 60f32.to_radians().tan();

        let spawn_on_slope = |app: &mut App, x0: f32, speed: f32| {
            spawn_terrain_at(
                app,
                Vec2::new(x0, 0.0),
                TerrainSegments::polyline(
                    [Vec2::new(-2.0 * cos, -2.0 * sin), Vec2::new(2.0 * cos, 2.0 * sin)],
                    SurfaceTags::SOLID,
                ),
            );
            spawn_character(
                app,
                Vec2::new(x0, 0.5 + rise),
                CharacterMotion::grounded_on(60.0, WallMode::Floor, speed),
                config,
            )
        };
        let slow = spawn_on_slope(&mut app, 0.0, 0.2);
        let fast = spawn_on_slope(&mut app, 20.0, 2.0);

        tick(&mut app);

        let switched: Vec<_> = events::<OrientationEvent>(&app)
            .into_iter()
            .filter(|e| e.kind == OrientationKind::WallModeChanged)
            .collect();
        println!("PROOF: wall mode changes = {:?}", switched);

        assert_eq!(motion(&app, slow).wall_mode, WallMode::Floor);
        assert!(switched.iter().all(|e| e.character != slow));
        assert!(switched
            .iter()
            .any(|e| e.character == fast && e.old_mode == WallMode::Floor && e.new_mode == WallMode::Right));
    }

    #[test]
    fn slow_character_near_diagonal_never_flaps() {
        let mut app = create_test_app();
        let config = PhysicsConfig::classic()
            .with_slope_gravity(0.0)
            .with_ground_curve(1.6875, 18.0, 0.0);
        // Right ground sensor touches the pivot; the slope swings around it.
        let pivot = Vec2::new(0.3, 0.0);
        let terrain = spawn_terrain(&mut app, slope_through(pivot, 51.0));
        let character = spawn_character(
            &mut app,
            Vec2::new(0.0, 0.5),
            CharacterMotion::grounded_on(39.0, WallMode::Floor, 0.1),
            config,
        );

        for n in 0..120 {
            let angle = if n % 2 == 0 { 51.0 } else { 39.0 };
            app.world_mut().entity_mut(terrain).insert(slope_through(pivot, angle));
            tick(&mut app);

            let m = motion(&app, character);
            assert!(m.grounded, "left the slope at tick {}", n);
            assert!((m.surface_angle - angle).abs() < 0.1, "tick {}: angle {}", n, m.surface_angle);
            assert_eq!(m.wall_mode, WallMode::Floor, "tick {}", n);
        }

        let changes = events::<OrientationEvent>(&app)
            .into_iter()
            .filter(|e| e.character == character && e.kind == OrientationKind::WallModeChanged)
            .count();
        println!("PROOF: wall mode changes over 120 ticks = {}", changes);
        assert_eq!(changes, 0);
    }

    #[test]
    fn slow_character_slides_off_steep_slope() {
        let mut app = create_test_app();
        let config = PhysicsConfig::classic();
        let spawn_on_slope = |app: &mut App, x0: f32, angle: f32| {
            spawn_terrain_at(app, Vec2::new(x0, 0.0), slope_through(Vec2::ZERO, angle));
            spawn_character(
                app,
                Vec2::new(x0, 0.5 + 0.3 * angle.to_radians().tan()),
                CharacterMotion::grounded_on(angle, WallMode::Floor, 0.0),
                config,
            )
        };
        let steep = spawn_on_slope(&mut app, 0.0, 70.0);
        let holdable = spawn_on_slope(&mut app, 20.0, 60.0);

        tick(&mut app);

        let detached: Vec<_> = events::<OrientationEvent>(&app)
            .into_iter()
            .filter(|e| matches!(e.kind, OrientationKind::Detached(_)))
            .collect();
        println!(
            "PROOF: pull at 70 = {}, at 60 = {}, detaches = {:?}",
            config.slope_gravity * 70f32.to_radians().sin(),
            config.slope_gravity * 60f32.to_radians().sin(),
            detached
        );

        assert!(!motion(&app, steep).grounded);
        assert!(detached
            .iter()
            .any(|e| e.character == steep && e.kind == OrientationKind::Detached(DetachReason::SteepSlope)));
        assert!(motion(&app, holdable).grounded);
        assert!(detached.iter().all(|e| e.character != holdable));
    }

    #[test]
    fn empty_backend_lets_characters_fall() {
        let mut app = create_app_with::<EmptyTerrainBackend>();
        let falling = spawn_character(
            &mut app,
            Vec2::new(0.0, 5.0),
            CharacterMotion::default(),
            PhysicsConfig::classic(),
        );
        let standing = spawn_character(
            &mut app,
            Vec2::new(10.0, 0.5),
            CharacterMotion::grounded_on(0.0, WallMode::Floor, 0.0),
            PhysicsConfig::classic(),
        );

        run_frames(&mut app, 10);

        let readings = app.world().get::<SensorReadings>(falling).unwrap();
        let m = motion(&app, falling);
        println!("PROOF: readings valid={} velocity={:?}", readings.valid, m.velocity);
        assert!(readings.valid);
        assert!(m.velocity.y < 0.0);
        assert!(position(&app, falling).y < 5.0);
        assert!(!motion(&app, standing).grounded);

        let detaches: Vec<_> = events::<OrientationEvent>(&app)
            .into_iter()
            .filter_map(|e| match e.kind {
                OrientationKind::Detached(reason) => Some((e.character, reason)),
                _ => None,
            })
            .collect();
        assert_eq!(detaches, vec![(standing, DetachReason::NoGround)]);
    }

    #[test]
    fn missing_sensors_fail_closed() {
        let mut app = create_test_app();
        spawn_terrain(&mut app, TerrainSegments::floor(-10.0, 10.0, 0.0));
        let character = app
            .world_mut()
            .spawn((
                Transform::from_xyz(0.0, 0.5, 0.0),
                TerrainRunnerBundle::new(CharacterBody::new(0.0, 0.5), PhysicsConfig::classic())
                    .with_motion(CharacterMotion::grounded_on(0.0, WallMode::Floor, 1.0)),
            ))
            .id();

        tick(&mut app);

        let m = motion(&app, character);
        assert!(!m.grounded);
        assert_eq!(m.wall_mode, WallMode::None);
        assert!(events::<OrientationEvent>(&app)
            .iter()
            .any(|e| e.kind == OrientationKind::Detached(DetachReason::MissingSensors)));
    }
}

// ==================== Move Tests ====================

mod moves {
    use super::*;
    use terrain_runner::moves::LAYER_ACTION;

    fn grounded_character(app: &mut App) -> Entity {
        spawn_terrain(app, TerrainSegments::floor(-50.0, 50.0, 0.0));
        spawn_character(
            app,
            Vec2::new(0.0, 0.5),
            CharacterMotion::grounded_on(0.0, WallMode::Floor, 0.0),
            PhysicsConfig::classic(),
        )
    }

    fn move_events(app: &App, name: &str) -> Vec<MoveEventKind> {
        events::<MoveEvent>(app)
            .into_iter()
            .filter(|e| e.move_name == name)
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn jump_leaves_ground_and_lands() {
        let mut app = create_test_app();
        let character = grounded_character(&mut app);

        input(&mut app, character).set_jump(true);
        tick(&mut app);

        let m = motion(&app, character);
        println!("PROOF: after jump tick grounded={} velocity={:?}", m.grounded, m.velocity);
        assert!(!m.grounded);
        assert!(m.velocity.y > 6.0);
        assert!(app.world().get::<MoveManager>(character).unwrap().is_active("jump"));

        run_frames(&mut app, 150);

        let m = motion(&app, character);
        assert!(m.grounded);
        assert!(!app.world().get::<MoveManager>(character).unwrap().is_active("jump"));

        let kinds = move_events(&app, "jump");
        assert!(kinds.contains(&MoveEventKind::Activated));
        assert!(kinds.contains(&MoveEventKind::Ended));
        assert!(!kinds.contains(&MoveEventKind::Interrupted));
    }

    #[test]
    fn hurt_interrupts_active_moves() {
        let mut app = create_test_app();
        let character = grounded_character(&mut app);

        input(&mut app, character).set_vertical(-1.0);
        tick(&mut app);
        assert!(app.world().get::<MoveManager>(character).unwrap().is_active("duck"));

        app.world_mut()
            .get_mut::<PendingOverrides>(character)
            .unwrap()
            .push(ForcedChange::Hurt {
                knockback: Vec2::new(-2.0, 4.0),
            });
        tick(&mut app);

        let kinds = move_events(&app, "duck");
        println!("PROOF: duck events = {:?}", kinds);
        assert!(kinds.contains(&MoveEventKind::Interrupted));
        assert!(!kinds.contains(&MoveEventKind::Ended));
        assert!(!motion(&app, character).grounded);
    }

    /// Action-layer move that waits for the layer instead of giving up.
    #[derive(Default)]
    struct Taunt {
        remaining: u32,
    }

    impl Move for Taunt {
        fn name(&self) -> &'static str {
            "taunt"
        }

        fn layer(&self) -> i32 {
            LAYER_ACTION
        }

        fn conflict_policy(&self) -> LayerConflict {
            LayerConflict::Queue
        }

        fn is_available(&self, _ctx: &MoveContext) -> bool {
            true
        }

        fn should_activate(&self, ctx: &MoveContext) -> bool {
            ctx.input.down_pressed()
        }

        fn on_activate(&mut self, _ctx: &mut MoveContext) {
            self.remaining = 10;
        }

        fn on_step(&mut self, _ctx: &mut MoveContext) {
            self.remaining = self.remaining.saturating_sub(1);
        }

        fn is_complete(&self, _ctx: &MoveContext) -> bool {
            self.remaining == 0
        }
    }

    #[test]
    fn queued_move_waits_for_jump_to_land() {
        let mut app = create_test_app();
        let character = grounded_character(&mut app);
        app.world_mut()
            .get_mut::<MoveManager>(character)
            .unwrap()
            .add_move(Taunt::default())
            .unwrap();

        input(&mut app, character).set_jump(true);
        tick(&mut app);
        input(&mut app, character).set_vertical(-1.0);
        tick(&mut app);

        let is_active = |app: &App, name: &str| app.world().get::<MoveManager>(character).unwrap().is_active(name);
        assert!(is_active(&app, "jump"));
        assert!(!is_active(&app, "taunt"));

        let mut airborne_ticks = 0;
        while is_active(&app, "jump") && airborne_ticks < 300 {
            tick(&mut app);
            airborne_ticks += 1;
            if is_active(&app, "jump") {
                assert!(!is_active(&app, "taunt"), "taunt took the layer mid-jump");
            }
        }
        assert!(motion(&app, character).grounded, "never landed");
        assert!(!is_active(&app, "taunt"));

        tick(&mut app);
        assert!(is_active(&app, "taunt"));

        let sequence: Vec<_> = events::<MoveEvent>(&app)
            .into_iter()
            .filter(|e| e.character == character && e.layer == LAYER_ACTION)
            .filter(|e| matches!(e.kind, MoveEventKind::Activated | MoveEventKind::Ended))
            .map(|e| (e.move_name, e.kind))
            .collect();
        println!("PROOF: landed after {} ticks, action layer = {:?}", airborne_ticks, sequence);
        assert_eq!(
            sequence,
            vec![
                ("jump", MoveEventKind::Activated),
                ("jump", MoveEventKind::Ended),
                ("taunt", MoveEventKind::Activated),
            ]
        );
    }

    #[test]
    fn one_active_move_per_layer() {
        let mut app = create_test_app();
        let character = grounded_character(&mut app);

        for frame in 0..40 {
            {
                let mut i = input(&mut app, character);
                i.set_jump(frame % 3 == 0);
                i.set_vertical(if frame % 5 < 3 { -1.0 } else { 0.0 });
            }
            tick(&mut app);

            let manager = app.world().get::<MoveManager>(character).unwrap();
            let mut layers: Vec<i32> = manager.active().map(|(_, layer)| layer).collect();
            let total = layers.len();
            layers.sort();
            layers.dedup();
            assert_eq!(layers.len(), total, "frame {}: two active moves share a layer", frame);
        }
    }
}

// ==================== Trigger Tests ====================

mod triggers {
    use super::*;

    #[test]
    fn composite_volume_reports_one_enter_and_exit() {
        let mut app = create_test_app();
        let parent = spawn_volume(&mut app, Vec2::ZERO, TriggerVolume::group());
        let left = spawn_volume(&mut app, Vec2::new(0.0, 0.0), TriggerVolume::rect(Vec2::splat(1.0)));
        let right = spawn_volume(&mut app, Vec2::new(2.0, 0.0), TriggerVolume::rect(Vec2::splat(1.0)));
        app.world_mut().entity_mut(left).insert(ChildOf(parent));
        app.world_mut().entity_mut(right).insert(ChildOf(parent));

        let character = spawn_character(
            &mut app,
            Vec2::new(-3.0, 0.0),
            CharacterMotion::airborne(Vec2::new(6.0, 0.0)),
            PhysicsConfig::classic().with_air_gravity(0.0),
        );

        // 0.1 per tick from x = -3 to x = 5
        run_frames(&mut app, 80);
        assert!(position(&app, character).x > 4.0);

        let all = events::<TriggerEvent>(&app);
        let count = |volume: Entity, kind: TriggerKind| {
            all.iter()
                .filter(|e| e.volume == volume && e.kind == kind && e.character == character)
                .count()
        };
        println!(
            "PROOF: parent enter={} exit={} stay={}",
            count(parent, TriggerKind::Enter),
            count(parent, TriggerKind::Exit),
            count(parent, TriggerKind::Stay)
        );

        assert_eq!(count(parent, TriggerKind::Enter), 1);
        assert_eq!(count(parent, TriggerKind::Exit), 1);
        assert!(count(parent, TriggerKind::Stay) > 10);
        for child in [left, right] {
            assert_eq!(count(child, TriggerKind::Enter), 1);
            assert_eq!(count(child, TriggerKind::Exit), 1);
        }
    }

    #[test]
    fn bubbling_stops_below_non_listening_volume() {
        let mut app = create_test_app();
        let chain = |app: &mut App, x: f32, middle: TriggerVolume| {
            let root = spawn_volume(app, Vec2::new(x, 0.0), TriggerVolume::group());
            let middle = spawn_volume(app, Vec2::new(x, 0.0), middle);
            let leaf = spawn_volume(app, Vec2::new(x, 0.0), TriggerVolume::rect(Vec2::splat(1.0)));
            app.world_mut().entity_mut(middle).insert(ChildOf(root));
            app.world_mut().entity_mut(leaf).insert(ChildOf(middle));
            (root, middle, leaf)
        };
        let deaf = TriggerVolume {
            shape: None,
            trigger_from_children: false,
        };
        let (blocked_root, blocked_middle, blocked_leaf) = chain(&mut app, 0.0, deaf);
        let (open_root, open_middle, open_leaf) = chain(&mut app, 20.0, TriggerVolume::group());

        let still = PhysicsConfig::classic().with_air_gravity(0.0);
        let first = spawn_character(&mut app, Vec2::ZERO, CharacterMotion::default(), still);
        let second = spawn_character(&mut app, Vec2::new(20.0, 0.0), CharacterMotion::default(), still);

        tick(&mut app);

        let all = events::<TriggerEvent>(&app);
        let entered = |volume: Entity, character: Entity| {
            all.iter()
                .any(|e| e.volume == volume && e.character == character && e.kind == TriggerKind::Enter)
        };
        let touched = |volume: Entity| all.iter().any(|e| e.volume == volume);
        println!("PROOF: trigger events = {:?}", all);

        assert!(entered(blocked_leaf, first));
        assert!(!touched(blocked_middle));
        assert!(!touched(blocked_root));

        assert!(entered(open_leaf, second));
        assert!(entered(open_middle, second));
        assert!(entered(open_root, second));
        assert!(all
            .iter()
            .filter(|e| e.volume == open_root)
            .all(|e| e.source == open_leaf));
    }

    #[test]
    fn water_overrides_restore_on_exit() {
        let mut app = create_test_app();
        let water = spawn_volume(&mut app, Vec2::ZERO, TriggerVolume::rect(Vec2::splat(2.0)));
        app.world_mut().entity_mut(water).insert(EnvironmentEffect::water());

        let baseline = PhysicsConfig::classic();
        let character = spawn_character(&mut app, Vec2::ZERO, CharacterMotion::default(), baseline);

        tick(&mut app);
        let config = *app.world().get::<PhysicsConfig>(character).unwrap();
        println!("PROOF: in water air_gravity={} top_speed={}", config.air_gravity, config.top_speed);
        assert!((config.air_gravity - baseline.air_gravity * 0.3).abs() < 1e-5);
        assert!((config.top_speed - baseline.top_speed * 0.5).abs() < 1e-5);

        app.world_mut()
            .get_mut::<PendingOverrides>(character)
            .unwrap()
            .push(ForcedChange::Teleport(Vec2::new(50.0, 0.0)));
        tick(&mut app);

        let config = *app.world().get::<PhysicsConfig>(character).unwrap();
        assert_eq!(config.air_gravity.to_bits(), baseline.air_gravity.to_bits());
        assert_eq!(config, baseline);
        assert!(app.world().get::<TunableOverrides>(character).unwrap().is_empty());
    }

    #[test]
    fn bumper_launches_character() {
        let mut app = create_test_app();
        let bumper = spawn_terrain(&mut app, TerrainSegments::floor(-5.0, 5.0, 0.0));
        app.world_mut().entity_mut(bumper).insert(Bumper { strength: 10.0 });

        let character = spawn_character(
            &mut app,
            Vec2::new(0.0, 0.515),
            CharacterMotion::airborne(Vec2::new(0.0, -1.0)),
            PhysicsConfig::classic(),
        );

        tick(&mut app);
        assert!(motion(&app, character).grounded);

        tick(&mut app);
        let m = motion(&app, character);
        println!("PROOF: after bump velocity={:?}", m.velocity);
        assert!(!m.grounded);
        assert!(m.velocity.y > 9.0);
    }
}

// ==================== Platform Tests ====================

mod platforms {
    use super::*;

    #[test]
    fn platform_carries_rider() {
        let mut app = create_test_app();
        let platform = app
            .world_mut()
            .spawn((
                Transform::default(),
                MovingPlatform::new(Vec2::ZERO, Vec2::new(4.0, 0.0), 2.0),
                TerrainSegments::floor(-2.0, 2.0, 0.0),
            ))
            .id();
        let character = spawn_character(
            &mut app,
            Vec2::new(0.0, 0.5),
            CharacterMotion::grounded_on(0.0, WallMode::Floor, 0.0),
            PhysicsConfig::classic(),
        );

        run_frames(&mut app, 30);

        let platform_x = app.world().get::<Transform>(platform).unwrap().translation.x;
        let pos = position(&app, character);
        println!("PROOF: platform x={} rider x={}", platform_x, pos.x);

        assert!(platform_x > 1.5);
        assert!(motion(&app, character).grounded);
        assert!((pos.x - platform_x).abs() < 0.01);

        let enters = events::<PlatformEvent>(&app)
            .iter()
            .filter(|e| e.kind == PlatformEventKind::Enter && e.character == character)
            .count();
        assert_eq!(enters, 1);
    }
}
