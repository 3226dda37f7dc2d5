//! Entity records and their physics-handle bookkeeping.
//!
//! Every live entity owns exactly one rigid body. The registry keeps the
//! record map and the handle map in lockstep; an orphaned handle is a bug,
//! so insertion and removal always go through these methods.

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};
use rand::Rng;
use rapier3d::prelude::RigidBodyHandle;

use crate::ws::protocol::{GhostShape, InputIntent};

/// How a player's input intent is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlContext {
    OnFoot,
    Driving { vehicle_id: String },
}

/// Authoritative player state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub velocity: Vector3<f32>,
    pub health: i32,
    /// Wall-clock seconds of the last accepted FIRE
    pub last_fire_time: f64,
    pub look_dir: Vector3<f32>,
    pub context: ControlContext,
    /// Held ghost id; mutually exclusive with Driving
    pub carrying: Option<String>,
    pub grounded: bool,
    pub ground_normal: Vector3<f32>,
    pub ground_distance: f32,
    /// Latest input intent, resolved once per tick
    pub input: InputIntent,
}

impl Player {
    pub fn new(id: String, position: Vector3<f32>, max_health: i32) -> Self {
        Self {
            id,
            position,
            rotation: UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            health: max_health,
            last_fire_time: f64::NEG_INFINITY,
            look_dir: Vector3::new(0.0, 0.0, -1.0),
            context: ControlContext::OnFoot,
            carrying: None,
            grounded: false,
            ground_normal: Vector3::y(),
            ground_distance: f32::INFINITY,
            input: InputIntent::default(),
        }
    }

    pub fn driving_vehicle(&self) -> Option<&str> {
        match &self.context {
            ControlContext::Driving { vehicle_id } => Some(vehicle_id),
            ControlContext::OnFoot => None,
        }
    }
}

/// Per-kind vehicle state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleState {
    Car,
    Helicopter { engine_on: bool },
    Plane { throttle: f32 },
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: String,
    pub state: VehicleState,
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub velocity: Vector3<f32>,
    pub driver: Option<String>,
}

impl Vehicle {
    pub fn new(id: String, state: VehicleState, position: Vector3<f32>) -> Self {
        Self {
            id,
            state,
            position,
            rotation: UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            driver: None,
        }
    }
}

/// Carriable object
#[derive(Debug, Clone)]
pub struct Ghost {
    pub id: String,
    pub shape: GhostShape,
    pub mass: f32,
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub velocity: Vector3<f32>,
    pub carrier: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: String,
    pub owner: String,
    /// Wall-clock seconds at spawn
    pub created_at: f64,
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
}

/// Generate a short random base-36 player id
pub fn random_player_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Keyed entity maps plus parallel body-handle maps
#[derive(Default)]
pub struct EntityRegistry {
    pub players: HashMap<String, Player>,
    pub vehicles: HashMap<String, Vehicle>,
    pub ghosts: HashMap<String, Ghost>,
    pub projectiles: HashMap<String, Projectile>,

    player_bodies: HashMap<String, RigidBodyHandle>,
    vehicle_bodies: HashMap<String, RigidBodyHandle>,
    ghost_bodies: HashMap<String, RigidBodyHandle>,
    projectile_bodies: HashMap<String, RigidBodyHandle>,

    next_vehicle: u64,
    next_ghost: u64,
    next_projectile: u64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vehicle_id(&mut self) -> String {
        let id = format!("vehicle_{}", self.next_vehicle);
        self.next_vehicle += 1;
        id
    }

    pub fn ghost_id(&mut self) -> String {
        let id = format!("ghost_{}", self.next_ghost);
        self.next_ghost += 1;
        id
    }

    pub fn projectile_id(&mut self) -> String {
        let id = format!("proj_{}", self.next_projectile);
        self.next_projectile += 1;
        id
    }

    pub fn insert_player(&mut self, player: Player, body: RigidBodyHandle) {
        self.player_bodies.insert(player.id.clone(), body);
        self.players.insert(player.id.clone(), player);
    }

    pub fn remove_player(&mut self, id: &str) -> Option<(Player, RigidBodyHandle)> {
        let player = self.players.remove(id)?;
        let body = self.player_bodies.remove(id)?;
        Some((player, body))
    }

    pub fn player_body(&self, id: &str) -> Option<RigidBodyHandle> {
        self.player_bodies.get(id).copied()
    }

    pub fn insert_vehicle(&mut self, vehicle: Vehicle, body: RigidBodyHandle) {
        self.vehicle_bodies.insert(vehicle.id.clone(), body);
        self.vehicles.insert(vehicle.id.clone(), vehicle);
    }

    pub fn vehicle_body(&self, id: &str) -> Option<RigidBodyHandle> {
        self.vehicle_bodies.get(id).copied()
    }

    pub fn insert_ghost(&mut self, ghost: Ghost, body: RigidBodyHandle) {
        self.ghost_bodies.insert(ghost.id.clone(), body);
        self.ghosts.insert(ghost.id.clone(), ghost);
    }

    pub fn ghost_body(&self, id: &str) -> Option<RigidBodyHandle> {
        self.ghost_bodies.get(id).copied()
    }

    pub fn insert_projectile(&mut self, projectile: Projectile, body: RigidBodyHandle) {
        self.projectile_bodies
            .insert(projectile.id.clone(), body);
        self.projectiles.insert(projectile.id.clone(), projectile);
    }

    pub fn remove_projectile(&mut self, id: &str) -> Option<(Projectile, RigidBodyHandle)> {
        let projectile = self.projectiles.remove(id)?;
        let body = self.projectile_bodies.remove(id)?;
        Some((projectile, body))
    }

    pub fn projectile_body(&self, id: &str) -> Option<RigidBodyHandle> {
        self.projectile_bodies.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_ids_are_monotonic_and_prefixed() {
        let mut registry = EntityRegistry::new();
        assert_eq!(registry.vehicle_id(), "vehicle_0");
        assert_eq!(registry.vehicle_id(), "vehicle_1");
        assert_eq!(registry.ghost_id(), "ghost_0");
        assert_eq!(registry.projectile_id(), "proj_0");
        assert_eq!(registry.projectile_id(), "proj_1");
    }

    #[test]
    fn player_ids_are_short_base36() {
        let id = random_player_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn player_insert_and_remove_stay_in_lockstep() {
        let mut registry = EntityRegistry::new();
        let player = Player::new("abc123".into(), Vector3::new(0.0, 5.0, 0.0), 100);
        let handle = RigidBodyHandle::invalid();

        registry.insert_player(player, handle);
        assert!(registry.players.contains_key("abc123"));
        assert!(registry.player_body("abc123").is_some());

        let removed = registry.remove_player("abc123");
        assert!(removed.is_some());
        assert!(registry.players.is_empty());
        assert!(registry.player_body("abc123").is_none());
    }

    #[test]
    fn projectile_removal_returns_both_halves() {
        let mut registry = EntityRegistry::new();
        let id = registry.projectile_id();
        registry.insert_projectile(
            Projectile {
                id: id.clone(),
                owner: "abc123".into(),
                created_at: 0.0,
                position: Vector3::zeros(),
                velocity: Vector3::zeros(),
            },
            RigidBodyHandle::invalid(),
        );

        let (projectile, _) = registry.remove_projectile(&id).unwrap();
        assert_eq!(projectile.owner, "abc123");
        assert!(registry.remove_projectile(&id).is_none());
    }
}
