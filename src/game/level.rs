//! Level generation and initial world population.
//!
//! The level is a 100x100 ground slab with ten seeded obstacle cubes; the
//! same `WORLD_SEED` reproduces the same layout. Vehicles and ghosts are
//! placed at fixed spots at init and live for the whole run.

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::game::physics::PhysicsWorld;
use crate::game::registry::{EntityRegistry, Ghost, Vehicle, VehicleState};
use crate::game::tuning::Tuning;
use crate::ws::protocol::{GhostShape, LevelObject, Vec3};

/// Half-extents of the ground slab
const GROUND_HALF_EXTENTS: Vector3<f32> = Vector3::new(50.0, 0.5, 50.0);
/// Half-extents of each obstacle cube
const CUBE_HALF_EXTENT: f32 = 1.0;
const OBSTACLE_COUNT: usize = 10;

const OBSTACLE_COLORS: [&str; 5] = ["#d95763", "#6abe30", "#5b6ee1", "#fbf236", "#76428a"];

/// Planar spots that must stay clear of obstacles: the player spawn plus
/// every vehicle and ghost pad
const RESERVED_SPOTS: [(f32, f32); 9] = [
    (0.0, 0.0),
    (8.0, 8.0),
    (-12.0, 6.0),
    (16.0, -12.0),
    (3.0, -3.0),
    (-4.0, 2.0),
    (5.0, 4.0),
    (-2.0, -6.0),
    (0.0, 9.0),
];
const RESERVED_CLEARANCE: f32 = 6.0;

/// Static level geometry, shared with clients via `INIT`
#[derive(Debug, Clone)]
pub struct Level {
    /// The ten obstacle cubes; the ground slab is implicit
    pub objects: Vec<LevelObject>,
}

impl Level {
    /// Generate the obstacle layout from a seed
    pub fn generate(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut objects = Vec::with_capacity(OBSTACLE_COUNT);

        for i in 0..OBSTACLE_COUNT {
            let (x, z) = loop {
                let x: f32 = rng.gen_range(-40.0..40.0);
                let z: f32 = rng.gen_range(-40.0..40.0);
                let clear = RESERVED_SPOTS.iter().all(|(sx, sz)| {
                    let dx = x - sx;
                    let dz = z - sz;
                    dx * dx + dz * dz > RESERVED_CLEARANCE * RESERVED_CLEARANCE
                });
                if clear {
                    break (x, z);
                }
            };

            objects.push(LevelObject {
                position: Vec3::new(x, CUBE_HALF_EXTENT, z),
                size: Vec3::new(
                    CUBE_HALF_EXTENT * 2.0,
                    CUBE_HALF_EXTENT * 2.0,
                    CUBE_HALF_EXTENT * 2.0,
                ),
                color: OBSTACLE_COLORS[i % OBSTACLE_COLORS.len()].to_string(),
            });
        }

        Self { objects }
    }

    /// Insert the ground slab and obstacle colliders into the physics world
    pub fn build_physics(&self, physics: &mut PhysicsWorld) {
        physics.add_fixed_cuboid(Vector3::new(0.0, -0.5, 0.0), GROUND_HALF_EXTENTS);

        for object in &self.objects {
            physics.add_fixed_cuboid(
                object.position.into(),
                Vector3::new(
                    object.size.x / 2.0,
                    object.size.y / 2.0,
                    object.size.z / 2.0,
                ),
            );
        }
    }
}

/// Create the vehicles and ghosts that exist for the whole run
pub fn populate_world(
    registry: &mut EntityRegistry,
    physics: &mut PhysicsWorld,
    tuning: &Tuning,
) {
    spawn_vehicle(
        registry,
        physics,
        VehicleState::Car,
        Vector3::new(8.0, 1.0, 8.0),
        tuning,
    );
    spawn_vehicle(
        registry,
        physics,
        VehicleState::Helicopter { engine_on: false },
        Vector3::new(-12.0, 1.5, 6.0),
        tuning,
    );
    spawn_vehicle(
        registry,
        physics,
        VehicleState::Plane { throttle: 0.0 },
        Vector3::new(16.0, 1.2, -12.0),
        tuning,
    );

    let ghosts: [(GhostShape, f32, &str, Vector3<f32>); 5] = [
        (
            GhostShape::Box {
                w: 1.0,
                h: 1.0,
                d: 1.0,
            },
            10.0,
            "#d95763",
            Vector3::new(3.0, 1.0, -3.0),
        ),
        (
            GhostShape::Sphere { r: 0.6 },
            8.0,
            "#6abe30",
            Vector3::new(-4.0, 1.0, 2.0),
        ),
        (
            GhostShape::Cylinder { r: 0.5, h: 1.2 },
            12.0,
            "#5b6ee1",
            Vector3::new(5.0, 1.0, 4.0),
        ),
        (
            GhostShape::Box {
                w: 0.6,
                h: 0.6,
                d: 0.6,
            },
            5.0,
            "#fbf236",
            Vector3::new(-2.0, 1.0, -6.0),
        ),
        // Heavier than MAX_CARRY_MASS; can be pushed but not carried
        (
            GhostShape::Box {
                w: 2.0,
                h: 2.0,
                d: 2.0,
            },
            80.0,
            "#847e87",
            Vector3::new(0.0, 1.5, 9.0),
        ),
    ];

    for (shape, mass, color, position) in ghosts {
        let body = physics.add_ghost_body(
            position,
            shape,
            mass,
            tuning.ghost.friction,
            tuning.ghost.restitution,
        );
        let ghost = Ghost {
            id: registry.ghost_id(),
            shape,
            mass,
            position,
            rotation: nalgebra::UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            carrier: None,
            color: color.to_string(),
        };
        registry.insert_ghost(ghost, body);
    }
}

fn spawn_vehicle(
    registry: &mut EntityRegistry,
    physics: &mut PhysicsWorld,
    state: VehicleState,
    position: Vector3<f32>,
    tuning: &Tuning,
) {
    let (half_extents, density, linear_damping, angular_damping) = match state {
        VehicleState::Car => (
            tuning.car.half_extents,
            tuning.car.density,
            tuning.car.linear_damping,
            tuning.car.angular_damping,
        ),
        VehicleState::Helicopter { .. } => (
            tuning.heli.half_extents,
            tuning.heli.density,
            tuning.heli.linear_damping,
            tuning.heli.angular_damping,
        ),
        VehicleState::Plane { .. } => (
            tuning.plane.half_extents,
            tuning.plane.density,
            tuning.plane.linear_damping,
            tuning.plane.angular_damping,
        ),
    };

    let body = physics.add_vehicle_body(
        position,
        half_extents,
        density,
        linear_damping,
        angular_damping,
    );
    let vehicle = Vehicle::new(registry.vehicle_id(), state, position);
    registry.insert_vehicle(vehicle, body);
}
