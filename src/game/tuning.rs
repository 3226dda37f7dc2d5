//! Gameplay tuning constants.
//!
//! Movement constants are per-tick impulses calibrated against the 60 Hz
//! simulation step; velocities are in metres per second.

use nalgebra::Vector3;

/// Simulation tick rate in Hz
pub const TICK_RATE: u32 = 60;

/// Seconds advanced by one physics step
pub fn tick_dt() -> f32 {
    1.0 / TICK_RATE as f32
}

/// World gravity
pub fn gravity() -> Vector3<f32> {
    Vector3::new(0.0, -9.81, 0.0)
}

/// Players respawn here, and capsules are created here on JOIN
pub fn spawn_point() -> Vector3<f32> {
    Vector3::new(0.0, 5.0, 0.0)
}

/// Projectiles outside this box are culled regardless of TTL
pub const WORLD_BOUND_XZ: f32 = 200.0;
pub const WORLD_BOUND_Y_MIN: f32 = -50.0;
pub const WORLD_BOUND_Y_MAX: f32 = 500.0;

/// On-foot player movement and capsule dimensions
#[derive(Debug, Clone, Copy)]
pub struct PlayerTuning {
    /// Capsule height, top to bottom
    pub height: f32,
    /// Capsule radius
    pub radius: f32,
    /// Target ground speed
    pub speed: f32,
    /// Upward jump impulse
    pub jump_impulse: f32,
    /// Horizontal steering impulse while airborne
    pub air_impulse: f32,
    pub max_health: i32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            height: 1.8,
            radius: 0.4,
            speed: 8.0,
            jump_impulse: 5.0,
            air_impulse: 0.02,
            max_health: 100,
            linear_damping: 10.0,
            angular_damping: 10.0,
            friction: 0.5,
            restitution: 0.0,
        }
    }
}

impl PlayerTuning {
    /// Capsule half-height between the hemisphere centres
    pub fn capsule_half_height(&self) -> f32 {
        (self.height - 2.0 * self.radius) / 2.0
    }
}

/// Projectile weapon
#[derive(Debug, Clone, Copy)]
pub struct WeaponTuning {
    /// Minimum seconds between shots
    pub fire_interval: f64,
    pub projectile_speed: f32,
    pub projectile_radius: f32,
    pub damage: i32,
    /// Seconds before an un-hit projectile is removed
    pub lifetime: f64,
}

impl Default for WeaponTuning {
    fn default() -> Self {
        Self {
            fire_interval: 0.25,
            projectile_speed: 40.0,
            projectile_radius: 0.2,
            damage: 25,
            lifetime: 5.0,
        }
    }
}

/// Ground car
#[derive(Debug, Clone, Copy)]
pub struct CarTuning {
    pub half_extents: Vector3<f32>,
    pub density: f32,
    /// Reverse impulse; forward drive is twice this
    pub drive_impulse: f32,
    pub turn_impulse: f32,
    /// Yaw torque only engages above this planar speed (or with throttle held)
    pub min_turn_speed: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for CarTuning {
    fn default() -> Self {
        Self {
            half_extents: Vector3::new(1.0, 0.5, 2.0),
            density: 1.0,
            drive_impulse: 4.0,
            turn_impulse: 1.0,
            min_turn_speed: 0.5,
            linear_damping: 2.0,
            angular_damping: 2.0,
        }
    }
}

/// Helicopter
#[derive(Debug, Clone, Copy)]
pub struct HeliTuning {
    pub half_extents: Vector3<f32>,
    pub density: f32,
    /// Collective-up impulse; descend is half of this
    pub lift_impulse: f32,
    /// Impulse that keeps the aircraft roughly level with no vertical input
    pub hover_impulse: f32,
    /// Planar thrust impulse; reverse is half
    pub thrust_impulse: f32,
    pub tilt_impulse: f32,
    pub turn_impulse: f32,
    /// Lift cuts out above this altitude
    pub max_altitude: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for HeliTuning {
    fn default() -> Self {
        Self {
            half_extents: Vector3::new(1.2, 1.0, 2.5),
            density: 0.4,
            lift_impulse: 6.0,
            hover_impulse: 2.0,
            thrust_impulse: 4.0,
            tilt_impulse: 0.8,
            turn_impulse: 1.0,
            max_altitude: 60.0,
            linear_damping: 1.0,
            angular_damping: 1.5,
        }
    }
}

/// Fixed-wing plane
#[derive(Debug, Clone, Copy)]
pub struct PlaneTuning {
    pub half_extents: Vector3<f32>,
    pub density: f32,
    /// Thrust impulse at full throttle
    pub accel_impulse: f32,
    /// Throttle change per tick while holding forward/backward
    pub throttle_step: f32,
    /// Airspeed below which the wings generate no lift
    pub min_lift_speed: f32,
    pub lift_coefficient: f32,
    pub max_lift: f32,
    pub pitch_impulse: f32,
    /// Roll torque; yaw is coupled at half this magnitude
    pub roll_impulse: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for PlaneTuning {
    fn default() -> Self {
        Self {
            half_extents: Vector3::new(3.0, 0.8, 2.5),
            density: 0.3,
            accel_impulse: 8.0,
            throttle_step: 0.02,
            min_lift_speed: 10.0,
            lift_coefficient: 0.12,
            max_lift: 15.0,
            pitch_impulse: 1.2,
            roll_impulse: 1.5,
            linear_damping: 0.5,
            angular_damping: 1.0,
        }
    }
}

/// Carriable ghost objects
#[derive(Debug, Clone, Copy)]
pub struct GhostTuning {
    pub friction: f32,
    pub restitution: f32,
    /// Held objects float this far in front of the carrier's look direction
    pub carry_distance: f32,
    pub interaction_range: f32,
    pub max_carry_mass: f32,
    /// Release speed for THROW_GHOST
    pub throw_speed: f32,
}

impl Default for GhostTuning {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.3,
            carry_distance: 2.0,
            interaction_range: 3.0,
            max_carry_mass: 50.0,
            throw_speed: 15.0,
        }
    }
}

/// Maximum distance for ENTER_VEHICLE
pub const VEHICLE_INTERACTION_RANGE: f32 = 5.0;

/// All tuning in one place, passed by reference into the resolver and handlers
#[derive(Debug, Clone, Copy, Default)]
pub struct Tuning {
    pub player: PlayerTuning,
    pub weapon: WeaponTuning,
    pub car: CarTuning,
    pub heli: HeliTuning,
    pub plane: PlaneTuning,
    pub ghost: GhostTuning,
}
