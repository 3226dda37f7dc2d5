//! The authoritative world and its fixed-rate tick loop.
//!
//! One `World` owns the physics world, the entity registry, and every
//! outbound session sink. All mutation happens on the task running
//! [`GameServer::run`]; session tasks only enqueue [`SessionEvent`]s, which
//! are drained just before each tick's input resolution.

use std::collections::HashMap;
use std::time::Duration;

use nalgebra::Vector3;
use rapier3d::prelude::RigidBodyHandle;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::game::input;
use crate::game::interact;
use crate::game::level::{populate_world, Level};
use crate::game::physics::PhysicsWorld;
use crate::game::registry::{ControlContext, EntityRegistry, Player, VehicleState};
use crate::game::snapshot::{player_snapshot, world_snapshot};
use crate::game::tuning::{
    self, Tuning, TICK_RATE, WORLD_BOUND_XZ, WORLD_BOUND_Y_MAX, WORLD_BOUND_Y_MIN,
};
use crate::util::time::unix_secs;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Events from session tasks into the tick loop
#[derive(Debug)]
pub enum SessionEvent {
    /// A socket connected; the sink receives serialised frames
    Connected {
        player_id: String,
        sink: mpsc::UnboundedSender<String>,
    },
    /// A parsed inbound frame
    Message { player_id: String, msg: ClientMsg },
    /// The socket closed or errored
    Disconnected { player_id: String },
}

/// Cloneable handle given to session tasks
#[derive(Clone)]
pub struct GameHandle {
    pub events_tx: mpsc::Sender<SessionEvent>,
}

/// The single authoritative world instance
pub struct World {
    pub tuning: Tuning,
    pub level: Level,
    pub physics: PhysicsWorld,
    pub registry: EntityRegistry,
    sessions: HashMap<String, mpsc::UnboundedSender<String>>,
    pub tick: u64,
}

impl World {
    pub fn new(seed: u64, tuning: Tuning) -> Self {
        let level = Level::generate(seed);
        let mut physics = PhysicsWorld::new(tuning::gravity(), tuning::tick_dt());
        level.build_physics(&mut physics);

        let mut registry = EntityRegistry::new();
        populate_world(&mut registry, &mut physics, &tuning);

        info!(
            level_objects = level.objects.len(),
            vehicles = registry.vehicles.len(),
            ghosts = registry.ghosts.len(),
            "world initialised"
        );

        Self {
            tuning,
            level,
            physics,
            registry,
            sessions: HashMap::new(),
            tick: 0,
        }
    }

    /// Apply a session event. Arrival order is preserved by the caller.
    pub fn handle_event(&mut self, event: SessionEvent, now: f64) {
        match event {
            SessionEvent::Connected { player_id, sink } => self.handle_connect(player_id, sink),
            SessionEvent::Message { player_id, msg } => self.handle_message(&player_id, msg, now),
            SessionEvent::Disconnected { player_id } => self.handle_disconnect(&player_id),
        }
    }

    fn handle_connect(&mut self, player_id: String, sink: mpsc::UnboundedSender<String>) {
        self.sessions.insert(player_id.clone(), sink);
        let init = ServerMsg::Init {
            player_id: player_id.clone(),
            level: self.level.objects.clone(),
        };
        self.send_to(&player_id, &init);
        info!(player_id = %player_id, "session connected");
    }

    fn handle_message(&mut self, player_id: &str, msg: ClientMsg, now: f64) {
        match msg {
            ClientMsg::Join => self.handle_join(player_id),
            ClientMsg::Input { input } => {
                if let Some(player) = self.registry.players.get_mut(player_id) {
                    player.input = input;
                }
            }
            ClientMsg::Fire { direction, origin } => {
                if let Some(msg) = interact::handle_fire(
                    &mut self.registry,
                    &mut self.physics,
                    &self.tuning,
                    player_id,
                    direction,
                    origin,
                    now,
                ) {
                    self.broadcast(&msg);
                }
            }
            ClientMsg::EnterVehicle { vehicle_id } => {
                if let Some(msg) = interact::handle_enter_vehicle(
                    &mut self.registry,
                    &mut self.physics,
                    player_id,
                    &vehicle_id,
                ) {
                    self.broadcast(&msg);
                }
            }
            ClientMsg::ExitVehicle => {
                if let Some(msg) =
                    interact::handle_exit_vehicle(&mut self.registry, &mut self.physics, player_id)
                {
                    self.broadcast(&msg);
                }
            }
            ClientMsg::GrabGhost { ghost_id } => {
                if let Some(msg) = interact::handle_grab_ghost(
                    &mut self.registry,
                    &mut self.physics,
                    &self.tuning,
                    player_id,
                    &ghost_id,
                ) {
                    self.broadcast(&msg);
                }
            }
            ClientMsg::DropGhost => {
                if let Some(msg) =
                    interact::handle_drop_ghost(&mut self.registry, &mut self.physics, player_id)
                {
                    self.broadcast(&msg);
                }
            }
            ClientMsg::ThrowGhost { direction } => {
                if let Some(msg) = interact::handle_throw_ghost(
                    &mut self.registry,
                    &mut self.physics,
                    &self.tuning,
                    player_id,
                    direction,
                ) {
                    self.broadcast(&msg);
                }
            }
        }
    }

    fn handle_join(&mut self, player_id: &str) {
        if self.registry.players.contains_key(player_id) {
            warn!(player_id, "player already joined");
            return;
        }

        let spawn = tuning::spawn_point();
        let body = self.physics.add_player_body(spawn, &self.tuning.player);
        let player = Player::new(player_id.to_string(), spawn, self.tuning.player.max_health);
        let snapshot = player_snapshot(&player);
        self.registry.insert_player(player, body);

        info!(player_id, player_count = self.registry.players.len(), "player joined");
        self.broadcast(&ServerMsg::PlayerJoined { player: snapshot });
    }

    fn handle_disconnect(&mut self, player_id: &str) {
        // Vacate any vehicle and release any held ghost before removal
        if let Some(msg) =
            interact::handle_exit_vehicle(&mut self.registry, &mut self.physics, player_id)
        {
            self.broadcast(&msg);
        }
        if let Some(msg) =
            interact::handle_drop_ghost(&mut self.registry, &mut self.physics, player_id)
        {
            self.broadcast(&msg);
        }

        if let Some((_, body)) = self.registry.remove_player(player_id) {
            self.physics.remove_body(body);
            self.broadcast(&ServerMsg::PlayerLeft {
                player_id: player_id.to_string(),
            });
            info!(player_id, "player left");
        }

        self.sessions.remove(player_id);
    }

    /// One simulation tick: inputs, step, sync, interactions with the
    /// world, then a snapshot to every session.
    pub fn run_tick(&mut self, now: f64) {
        self.tick += 1;

        self.resolve_inputs();
        self.physics.step();
        self.sync_players();
        self.detect_ground();
        self.carry_follow();
        self.sync_vehicles();
        self.sync_ghosts();
        self.update_projectiles(now);

        self.broadcast(&ServerMsg::GameState {
            state: world_snapshot(&self.registry),
        });
    }

    /// Translate each player's stored intent into physics actions
    fn resolve_inputs(&mut self) {
        let ids: Vec<String> = self.registry.players.keys().cloned().collect();
        for id in &ids {
            let Some((intent, context, grounded)) = self
                .registry
                .players
                .get(id)
                .map(|p| (p.input.clone(), p.context.clone(), p.grounded))
            else {
                continue;
            };

            match context {
                ControlContext::OnFoot => {
                    let Some(handle) = self.registry.player_body(id) else {
                        continue;
                    };
                    let Some(body) = self.physics.body_mut(handle) else {
                        continue;
                    };
                    let Some(player) = self.registry.players.get_mut(id) else {
                        continue;
                    };
                    input::resolve_on_foot(
                        body,
                        &intent,
                        &mut player.look_dir,
                        grounded,
                        &self.tuning.player,
                    );
                }
                ControlContext::Driving { vehicle_id } => {
                    let Some(handle) = self.registry.vehicle_body(&vehicle_id) else {
                        continue;
                    };
                    let Some(body) = self.physics.body_mut(handle) else {
                        continue;
                    };
                    let Some(vehicle) = self.registry.vehicles.get_mut(&vehicle_id) else {
                        continue;
                    };
                    match &mut vehicle.state {
                        VehicleState::Car => input::resolve_car(body, &intent, &self.tuning.car),
                        VehicleState::Helicopter { engine_on } => {
                            input::resolve_helicopter(body, &intent, engine_on, &self.tuning.heli)
                        }
                        VehicleState::Plane { throttle } => {
                            input::resolve_plane(body, &intent, throttle, &self.tuning.plane)
                        }
                    }
                }
            }
        }
    }

    /// Copy body state into player records. Driving players are skipped:
    /// their body is parked off-world until exit.
    fn sync_players(&mut self) {
        let handles: Vec<(String, RigidBodyHandle)> = self
            .registry
            .players
            .values()
            .filter(|p| p.driving_vehicle().is_none())
            .filter_map(|p| self.registry.player_body(&p.id).map(|h| (p.id.clone(), h)))
            .collect();

        for (id, handle) in handles {
            if let Some((position, rotation, velocity)) = self.physics.body_state(handle) {
                if let Some(player) = self.registry.players.get_mut(&id) {
                    player.position = position;
                    player.rotation = rotation;
                    player.velocity = velocity;
                }
            }
        }
    }

    /// Five-ray downward ground probe per on-foot player.
    ///
    /// Rays originate at the capsule centre so the grounded threshold
    /// accounts for the lower hemisphere.
    fn detect_ground(&mut self) {
        let player = self.tuning.player;
        let max_toi = player.height / 2.0 + 0.5;
        let grounded_limit = player.height / 2.0 + 0.1;
        let r = player.radius * 0.7;
        let offsets = [
            (0.0, 0.0),
            (r, 0.0),
            (-r, 0.0),
            (0.0, r),
            (0.0, -r),
        ];

        let handles: Vec<(String, RigidBodyHandle)> = self
            .registry
            .players
            .values()
            .filter(|p| p.driving_vehicle().is_none())
            .filter_map(|p| self.registry.player_body(&p.id).map(|h| (p.id.clone(), h)))
            .collect();

        for (id, handle) in handles {
            let Some((centre, _, _)) = self.physics.body_state(handle) else {
                continue;
            };

            let mut closest: Option<(f32, Vector3<f32>)> = None;
            for (dx, dz) in offsets {
                let origin = centre + Vector3::new(dx, 0.0, dz);
                if let Some((toi, normal)) = self.physics.cast_ray_down(origin, max_toi, handle) {
                    if closest.map(|(best, _)| toi < best).unwrap_or(true) {
                        closest = Some((toi, normal));
                    }
                }
            }

            if let Some(player) = self.registry.players.get_mut(&id) {
                match closest {
                    Some((toi, normal)) => {
                        player.grounded = toi <= grounded_limit;
                        player.ground_normal = normal;
                        player.ground_distance = toi;
                    }
                    None => {
                        player.grounded = false;
                        player.ground_normal = Vector3::y();
                        player.ground_distance = f32::INFINITY;
                    }
                }
            }
        }
    }

    /// Snap held ghosts to their carry target via kinematic translation
    fn carry_follow(&mut self) {
        let carries: Vec<(String, Vector3<f32>)> = self
            .registry
            .players
            .values()
            .filter_map(|p| {
                let ghost_id = p.carrying.clone()?;
                let target = p.position
                    + p.look_dir * self.tuning.ghost.carry_distance
                    + Vector3::new(0.0, 0.5, 0.0);
                Some((ghost_id, target))
            })
            .collect();

        for (ghost_id, target) in carries {
            if let Some(handle) = self.registry.ghost_body(&ghost_id) {
                if let Some(body) = self.physics.body_mut(handle) {
                    body.set_next_kinematic_translation(target);
                }
            }
            if let Some(ghost) = self.registry.ghosts.get_mut(&ghost_id) {
                ghost.position = target;
                ghost.velocity = Vector3::zeros();
            }
        }
    }

    fn sync_vehicles(&mut self) {
        let handles: Vec<(String, RigidBodyHandle)> = self
            .registry
            .vehicles
            .keys()
            .filter_map(|id| self.registry.vehicle_body(id).map(|h| (id.clone(), h)))
            .collect();

        for (id, handle) in handles {
            if let Some((position, rotation, velocity)) = self.physics.body_state(handle) {
                if let Some(vehicle) = self.registry.vehicles.get_mut(&id) {
                    vehicle.position = position;
                    vehicle.rotation = rotation;
                    vehicle.velocity = velocity;
                }
            }
        }
    }

    /// Carried ghosts keep the position written by carry-follow
    fn sync_ghosts(&mut self) {
        let handles: Vec<(String, RigidBodyHandle)> = self
            .registry
            .ghosts
            .values()
            .filter(|g| g.carrier.is_none())
            .filter_map(|g| self.registry.ghost_body(&g.id).map(|h| (g.id.clone(), h)))
            .collect();

        for (id, handle) in handles {
            if let Some((position, rotation, velocity)) = self.physics.body_state(handle) {
                if let Some(ghost) = self.registry.ghosts.get_mut(&id) {
                    ghost.position = position;
                    ghost.rotation = rotation;
                    ghost.velocity = velocity;
                }
            }
        }
    }

    /// Expire, cull and collide projectiles, then free the removed bodies
    fn update_projectiles(&mut self, now: f64) {
        let mut outbound: Vec<ServerMsg> = Vec::new();
        let mut removals: Vec<String> = Vec::new();

        let ids: Vec<String> = self.registry.projectiles.keys().cloned().collect();
        for id in ids {
            let Some(handle) = self.registry.projectile_body(&id) else {
                // Record without a body: drop the entity, keep running
                warn!(projectile_id = %id, "projectile lost its body");
                removals.push(id);
                continue;
            };
            let Some((position, _, velocity)) = self.physics.body_state(handle) else {
                warn!(projectile_id = %id, "projectile body missing from physics");
                removals.push(id);
                continue;
            };

            let (owner, created_at) = {
                let projectile = self.registry.projectiles.get_mut(&id).unwrap();
                projectile.position = position;
                projectile.velocity = velocity;
                (projectile.owner.clone(), projectile.created_at)
            };

            if now - created_at > self.tuning.weapon.lifetime {
                removals.push(id);
                continue;
            }
            if position.x.abs() > WORLD_BOUND_XZ
                || position.z.abs() > WORLD_BOUND_XZ
                || position.y < WORLD_BOUND_Y_MIN
                || position.y > WORLD_BOUND_Y_MAX
            {
                removals.push(id);
                continue;
            }

            // Sphere overlap against every non-owner on-foot player, using
            // the positions synced earlier this tick
            let hit_range = self.tuning.player.radius + self.tuning.weapon.projectile_radius;
            let target = self
                .registry
                .players
                .values()
                .find(|p| {
                    p.id != owner
                        && p.driving_vehicle().is_none()
                        && (p.position - position).norm() <= hit_range
                })
                .map(|p| p.id.clone());

            if let Some(target_id) = target {
                let damage = self.tuning.weapon.damage;
                let max_health = self.tuning.player.max_health;
                let spawn = tuning::spawn_point();
                let body = self.registry.player_body(&target_id);

                if let Some(player) = self.registry.players.get_mut(&target_id) {
                    player.health = (player.health - damage).max(0);
                    outbound.push(ServerMsg::Hit {
                        target: target_id.clone(),
                        damage,
                        health: player.health,
                    });

                    if player.health <= 0 {
                        // Same-tick respawn at full health
                        player.health = max_health;
                        player.position = spawn;
                        player.velocity = Vector3::zeros();
                        if let Some(body) = body {
                            self.physics.teleport(body, spawn);
                        }
                        info!(player_id = %target_id, "player respawned");
                    }
                }
                removals.push(id);
            }
        }

        removals.sort_unstable();
        removals.dedup();
        for id in removals {
            if let Some((_, body)) = self.registry.remove_projectile(&id) {
                self.physics.remove_body(body);
            }
            outbound.push(ServerMsg::ProjectileRemove { projectile_id: id });
        }

        for msg in outbound {
            self.broadcast(&msg);
        }
    }

    fn send_to(&self, player_id: &str, msg: &ServerMsg) {
        let Some(sink) = self.sessions.get(player_id) else {
            return;
        };
        match serde_json::to_string(msg) {
            Ok(json) => {
                let _ = sink.send(json);
            }
            Err(error) => warn!(%error, "failed to serialise message"),
        }
    }

    /// Serialise once, send to every open session; closed sinks are skipped
    fn broadcast(&self, msg: &ServerMsg) {
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(error) => {
                warn!(%error, "failed to serialise broadcast");
                return;
            }
        };
        for sink in self.sessions.values() {
            let _ = sink.send(json.clone());
        }
    }
}

/// Owns the world and drives it at the fixed tick rate
pub struct GameServer {
    world: World,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl GameServer {
    pub fn new(seed: u64, tuning: Tuning) -> (Self, GameHandle) {
        let (events_tx, events_rx) = mpsc::channel(256);
        (
            Self {
                world: World::new(seed, tuning),
                events_rx,
            },
            GameHandle { events_tx },
        )
    }

    /// Run the authoritative tick loop forever
    pub async fn run(mut self) {
        info!(tick_rate = TICK_RATE, "simulation started");

        let tick_duration = Duration::from_micros(1_000_000 / TICK_RATE as u64);
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let now = unix_secs();

            // Drain session events in arrival order, then simulate
            while let Ok(event) = self.events_rx.try_recv() {
                self.world.handle_event(event, now);
            }

            self.world.run_tick(now);

            if self.world.tick % TICK_RATE as u64 == 0 {
                debug!(
                    tick = self.world.tick,
                    players = self.world.registry.players.len(),
                    projectiles = self.world.registry.projectiles.len(),
                    "simulation tick"
                );
            }
        }
    }
}
