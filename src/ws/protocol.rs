//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// 3-vector on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Vector3<f32>> for Vec3 {
    fn from(v: Vector3<f32>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3> for Vector3<f32> {
    fn from(v: Vec3) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

/// Unit quaternion on the wire (x, y, z, w)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl From<UnitQuaternion<f32>> for Quat {
    fn from(q: UnitQuaternion<f32>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

impl From<Quat> for UnitQuaternion<f32> {
    fn from(q: Quat) -> Self {
        UnitQuaternion::new_normalize(Quaternion::new(q.w, q.x, q.y, q.z))
    }
}

/// Per-frame input intent submitted by the client.
///
/// Every field is optional on the wire; missing booleans read as false so a
/// client can send only the keys that changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputIntent {
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
    pub jump: bool,
    /// Descend for helicopters, nose-down for planes, unused on foot.
    /// Accepted as either `shift` or `descend` on the wire.
    #[serde(alias = "descend")]
    pub shift: bool,
    /// Unit look direction; `None` keeps the previous one
    pub look_direction: Option<Vec3>,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMsg {
    /// Enter the world (a record and body are created on receipt)
    Join,

    /// Replace the player's current input intent
    Input { input: InputIntent },

    /// Fire a projectile from `origin` along `direction`
    Fire { direction: Vec3, origin: Vec3 },

    /// Take the driver's seat of a vehicle
    EnterVehicle { vehicle_id: String },

    /// Leave the current vehicle
    ExitVehicle,

    /// Pick up a carriable object
    GrabGhost { ghost_id: String },

    /// Release the held object in place
    DropGhost,

    /// Release the held object with velocity along `direction`
    ThrowGhost { direction: Vec3 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMsg {
    /// First frame after connect: assigned id plus the static level
    Init {
        player_id: String,
        level: Vec<LevelObject>,
    },

    /// A player entered the world
    PlayerJoined { player: PlayerSnapshot },

    /// A player disconnected
    PlayerLeft { player_id: String },

    /// Vehicle occupancy changed
    VehicleUpdate { vehicle: VehicleSnapshot },

    /// Carriable grab/drop/throw state changed
    GhostUpdate { ghost: GhostSnapshot },

    /// A projectile entered the world
    ProjectileSpawn { projectile: ProjectileSnapshot },

    /// A projectile expired or hit something
    ProjectileRemove { projectile_id: String },

    /// A projectile struck a player
    Hit {
        target: String,
        damage: i32,
        health: i32,
    },

    /// Full world snapshot, broadcast every tick
    GameState { state: WorldSnapshot },
}

/// Static level geometry sent once in `INIT`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelObject {
    pub position: Vec3,
    /// Full extents of the cuboid
    pub size: Vec3,
    pub color: String,
}

/// Carriable shape, shared between the wire and the simulation records
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(
    tag = "shape",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GhostShape {
    Box { w: f32, h: f32, d: f32 },
    Sphere { r: f32 },
    Cylinder { r: f32, h: f32 },
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub health: i32,
    pub grounded: bool,
    /// Vehicle id while driving
    pub vehicle: Option<String>,
    /// Ghost id while carrying
    pub carrying: Option<String>,
}

/// Per-kind vehicle state, flattened into [`VehicleSnapshot`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(
    tag = "vehicleType",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum VehicleKindSnapshot {
    Car,
    Helicopter { engine_on: bool },
    Plane { throttle: f32 },
}

/// Vehicle state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub id: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub driver: Option<String>,
    #[serde(flatten)]
    pub kind: VehicleKindSnapshot,
}

/// Carriable state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostSnapshot {
    pub id: String,
    #[serde(flatten)]
    pub shape: GhostShape,
    pub mass: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub carrier: Option<String>,
    pub color: String,
}

/// Projectile state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSnapshot {
    pub id: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub owner: String,
}

/// The full world state broadcast each tick
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub players: Vec<PlayerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub vehicles: Vec<VehicleSnapshot>,
    pub ghosts: Vec<GhostSnapshot>,
}
