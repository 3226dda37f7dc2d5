//! Rigid-body world wrapper.
//!
//! Owns every rapier set and pipeline. All mutation happens on the tick
//! task; the only consumers are the input resolver, the interaction
//! handlers, and the tick driver.

use nalgebra::{UnitQuaternion, Vector3};
use rapier3d::prelude::*;

use crate::game::tuning::PlayerTuning;
use crate::ws::protocol::GhostShape;

pub struct PhysicsWorld {
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub gravity: Vector3<f32>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    pub fn new(gravity: Vector3<f32>, dt: f32) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = dt;

        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            gravity,
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Advance the world by one fixed step
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Static level geometry: a fixed cuboid
    pub fn add_fixed_cuboid(
        &mut self,
        position: Vector3<f32>,
        half_extents: Vector3<f32>,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed().translation(position).build();
        let handle = self.bodies.insert(body);
        let collider =
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z).build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Player capsule: rotations locked, heavy damping, no restitution
    pub fn add_player_body(
        &mut self,
        position: Vector3<f32>,
        tuning: &PlayerTuning,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(position)
            .linear_damping(tuning.linear_damping)
            .angular_damping(tuning.angular_damping)
            .lock_rotations()
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::capsule_y(tuning.capsule_half_height(), tuning.radius)
            .friction(tuning.friction)
            .restitution(tuning.restitution)
            .density(1.0)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Vehicle hull: a dynamic cuboid with per-type damping
    pub fn add_vehicle_body(
        &mut self,
        position: Vector3<f32>,
        half_extents: Vector3<f32>,
        density: f32,
        linear_damping: f32,
        angular_damping: f32,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(position)
            .linear_damping(linear_damping)
            .angular_damping(angular_damping)
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .density(density)
            .friction(0.8)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Carriable body with an explicit mass
    pub fn add_ghost_body(
        &mut self,
        position: Vector3<f32>,
        shape: GhostShape,
        mass: f32,
        friction: f32,
        restitution: f32,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic().translation(position).build();
        let handle = self.bodies.insert(body);

        let builder = match shape {
            GhostShape::Box { w, h, d } => ColliderBuilder::cuboid(w / 2.0, h / 2.0, d / 2.0),
            GhostShape::Sphere { r } => ColliderBuilder::ball(r),
            GhostShape::Cylinder { r, h } => ColliderBuilder::cylinder(h / 2.0, r),
        };
        let collider = builder
            .mass(mass)
            .friction(friction)
            .restitution(restitution)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Projectile: an undamped ball launched at `velocity`
    pub fn add_projectile_body(
        &mut self,
        origin: Vector3<f32>,
        radius: f32,
        velocity: Vector3<f32>,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(origin)
            .linvel(velocity)
            .linear_damping(0.0)
            .angular_damping(0.0)
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::ball(radius).density(1.0).build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Remove a body and its colliders
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    /// Position, orientation and velocity of a body
    pub fn body_state(
        &self,
        handle: RigidBodyHandle,
    ) -> Option<(Vector3<f32>, UnitQuaternion<f32>, Vector3<f32>)> {
        self.bodies
            .get(handle)
            .map(|body| (*body.translation(), *body.rotation(), *body.linvel()))
    }

    /// Switch a body to kinematic-position-based mode, clearing velocity
    pub fn set_kinematic(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(Vector3::zeros(), true);
            body.set_angvel(Vector3::zeros(), true);
            body.set_body_type(RigidBodyType::KinematicPositionBased, true);
        }
    }

    /// Switch a body back to dynamic mode
    pub fn set_dynamic(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_body_type(RigidBodyType::Dynamic, true);
        }
    }

    /// Hard position set, zeroing linear velocity
    pub fn teleport(&mut self, handle: RigidBodyHandle, position: Vector3<f32>) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_translation(position, true);
            body.set_linvel(Vector3::zeros(), true);
            body.set_angvel(Vector3::zeros(), true);
        }
    }

    /// Cast a downward ray, excluding `exclude` and all sensors.
    ///
    /// Returns time of impact and surface normal of the closest hit.
    pub fn cast_ray_down(
        &self,
        origin: Vector3<f32>,
        max_toi: f32,
        exclude: RigidBodyHandle,
    ) -> Option<(f32, Vector3<f32>)> {
        let ray = Ray::new(point![origin.x, origin.y, origin.z], vector![0.0, -1.0, 0.0]);
        let filter =
            QueryFilter::from(QueryFilterFlags::EXCLUDE_SENSORS).exclude_rigid_body(exclude);

        self.query_pipeline
            .cast_ray_and_get_normal(&self.bodies, &self.colliders, &ray, max_toi, true, filter)
            .map(|(_, hit)| (hit.time_of_impact, hit.normal))
    }
}
