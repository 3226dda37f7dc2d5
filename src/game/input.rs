//! Input resolution.
//!
//! Once per tick, before the physics step, each player's latest intent is
//! translated into velocity edits and impulses on the body it currently
//! controls. Dispatch on the control context lives in the tick driver; the
//! per-context resolvers live here.

use nalgebra::{UnitQuaternion, Vector3};
use rapier3d::prelude::RigidBody;

use crate::game::tuning::{CarTuning, HeliTuning, PlaneTuning, PlayerTuning};
use crate::ws::protocol::InputIntent;

/// Forward vector of a body, -Z convention for a Y-up world
pub fn body_forward(rotation: &UnitQuaternion<f32>) -> Vector3<f32> {
    rotation * Vector3::new(0.0, 0.0, -1.0)
}

/// Project a direction onto the XZ plane and normalise.
/// Returns `None` for a (near-)vertical input.
fn planar(direction: &Vector3<f32>) -> Option<Vector3<f32>> {
    let flat = Vector3::new(direction.x, 0.0, direction.z);
    let norm = flat.norm();
    if norm > 1e-4 {
        Some(flat / norm)
    } else {
        None
    }
}

/// Sum the WASD booleans into a unit world-space direction
fn move_direction(
    input: &InputIntent,
    forward: Vector3<f32>,
    right: Vector3<f32>,
) -> Option<Vector3<f32>> {
    let mut direction = Vector3::zeros();
    if input.move_forward {
        direction += forward;
    }
    if input.move_backward {
        direction -= forward;
    }
    if input.move_left {
        direction -= right;
    }
    if input.move_right {
        direction += right;
    }

    let norm = direction.norm();
    if norm > 1e-4 {
        Some(direction / norm)
    } else {
        None
    }
}

/// On-foot movement.
///
/// Grounded horizontal velocity is *set*, not integrated: blending the
/// current velocity toward the wanted direction every tick gives crisp
/// stops and starts independent of client frame timing.
pub fn resolve_on_foot(
    body: &mut RigidBody,
    input: &InputIntent,
    look_dir: &mut Vector3<f32>,
    grounded: bool,
    tuning: &PlayerTuning,
) {
    if let Some(look) = input.look_direction {
        let look: Vector3<f32> = look.into();
        if look.norm() > 1e-4 {
            *look_dir = look.normalize();
        }
    }

    let Some(forward) = planar(look_dir) else {
        return;
    };
    let right = Vector3::new(-forward.z, 0.0, forward.x);
    let direction = move_direction(input, forward, right);
    let velocity = *body.linvel();

    if grounded {
        if let Some(dir) = direction {
            body.set_linvel(
                Vector3::new(
                    velocity.x * 0.9 + dir.x * tuning.speed * 0.15,
                    velocity.y,
                    velocity.z * 0.9 + dir.z * tuning.speed * 0.15,
                ),
                true,
            );
        } else {
            body.set_linvel(
                Vector3::new(velocity.x * 0.8, velocity.y, velocity.z * 0.8),
                true,
            );
        }

        // Keep contact on slopes
        body.apply_impulse(Vector3::new(0.0, -0.2, 0.0), true);

        if input.jump && body.linvel().y < 0.5 {
            body.apply_impulse(Vector3::new(0.0, tuning.jump_impulse, 0.0), true);
        }
    } else if let Some(dir) = direction {
        // Weak air control; jump is ignored while airborne
        body.apply_impulse(dir * tuning.air_impulse, true);
    }
}

/// Ground car: planar drive impulses plus speed-gated yaw
pub fn resolve_car(body: &mut RigidBody, input: &InputIntent, tuning: &CarTuning) {
    let Some(forward) = planar(&body_forward(body.rotation())) else {
        return;
    };

    let throttle_held = input.move_forward || input.move_backward;
    if input.move_forward {
        body.apply_impulse(forward * tuning.drive_impulse * 2.0, true);
    }
    if input.move_backward {
        body.apply_impulse(-forward * tuning.drive_impulse, true);
    }

    let velocity = body.linvel();
    let planar_speed = (velocity.x * velocity.x + velocity.z * velocity.z).sqrt();
    if planar_speed > tuning.min_turn_speed || throttle_held {
        if input.move_left {
            body.apply_torque_impulse(Vector3::new(0.0, tuning.turn_impulse, 0.0), true);
        }
        if input.move_right {
            body.apply_torque_impulse(Vector3::new(0.0, -tuning.turn_impulse, 0.0), true);
        }
    }

    // Stay planted
    body.apply_impulse(Vector3::new(0.0, -1.0, 0.0), true);
}

/// Helicopter: collective lift with an altitude ceiling, planar thrust,
/// pitch and yaw torques. Sets `engine_on` on the first lift input.
pub fn resolve_helicopter(
    body: &mut RigidBody,
    input: &InputIntent,
    engine_on: &mut bool,
    tuning: &HeliTuning,
) {
    let mut vertical = if input.jump {
        *engine_on = true;
        tuning.lift_impulse
    } else if input.shift {
        -tuning.lift_impulse * 0.5
    } else {
        tuning.hover_impulse
    };

    if body.translation().y > tuning.max_altitude && vertical > 0.0 {
        vertical = 0.0;
    }
    body.apply_impulse(Vector3::new(0.0, vertical, 0.0), true);

    let rotation = *body.rotation();
    if let Some(forward) = planar(&body_forward(&rotation)) {
        if input.move_forward {
            body.apply_impulse(forward * tuning.thrust_impulse, true);
        }
        if input.move_backward {
            body.apply_impulse(-forward * tuning.thrust_impulse * 0.5, true);
        }
    }

    let right = rotation * Vector3::x();
    if input.move_forward {
        body.apply_torque_impulse(-right * tuning.tilt_impulse, true);
    }
    if input.move_backward {
        body.apply_torque_impulse(right * tuning.tilt_impulse, true);
    }
    if input.move_left {
        body.apply_torque_impulse(Vector3::new(0.0, tuning.turn_impulse, 0.0), true);
    }
    if input.move_right {
        body.apply_torque_impulse(Vector3::new(0.0, -tuning.turn_impulse, 0.0), true);
    }
}

/// Plane: throttle integrates over ticks; thrust follows the full 3D nose
/// direction, lift kicks in above stall speed, roll and yaw are coupled.
pub fn resolve_plane(
    body: &mut RigidBody,
    input: &InputIntent,
    throttle: &mut f32,
    tuning: &PlaneTuning,
) {
    if input.move_forward {
        *throttle = (*throttle + tuning.throttle_step).min(1.0);
    }
    if input.move_backward {
        *throttle = (*throttle - tuning.throttle_step).max(0.0);
    }

    let rotation = *body.rotation();
    let forward = body_forward(&rotation);
    if *throttle > 0.0 {
        body.apply_impulse(forward * (*throttle * tuning.accel_impulse), true);
    }

    let speed = body.linvel().norm();
    if speed > tuning.min_lift_speed {
        let lift = (speed * tuning.lift_coefficient).min(tuning.max_lift);
        body.apply_impulse(Vector3::new(0.0, lift, 0.0), true);
    }

    let right = rotation * Vector3::x();
    if input.jump {
        body.apply_torque_impulse(right * tuning.pitch_impulse, true);
    }
    if input.shift {
        body.apply_torque_impulse(-right * tuning.pitch_impulse, true);
    }

    let up = rotation * Vector3::y();
    if input.move_left {
        body.apply_torque_impulse(forward * tuning.roll_impulse, true);
        body.apply_torque_impulse(up * (tuning.roll_impulse * 0.5), true);
    }
    if input.move_right {
        body.apply_torque_impulse(-forward * tuning.roll_impulse, true);
        body.apply_torque_impulse(-up * (tuning.roll_impulse * 0.5), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::PhysicsWorld;
    use crate::game::tuning::{self, Tuning};
    use crate::ws::protocol::Vec3;

    fn setup() -> (PhysicsWorld, Tuning) {
        (
            PhysicsWorld::new(tuning::gravity(), tuning::tick_dt()),
            Tuning::default(),
        )
    }

    fn intent() -> InputIntent {
        InputIntent::default()
    }

    #[test]
    fn grounded_movement_sets_horizontal_velocity() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_player_body(Vector3::new(0.0, 0.9, 0.0), &tuning.player);
        let body = physics.body_mut(handle).unwrap();

        let mut look = Vector3::new(0.0, 0.0, -1.0);
        let mut input = intent();
        input.move_forward = true;

        resolve_on_foot(body, &input, &mut look, true, &tuning.player);

        let velocity = body.linvel();
        // One blend step from rest: dir * SPEED * 0.15
        assert!((velocity.z - (-tuning.player.speed * 0.15)).abs() < 1e-4);
        assert!(velocity.x.abs() < 1e-4);
    }

    #[test]
    fn no_direction_damps_horizontal_velocity() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_player_body(Vector3::new(0.0, 0.9, 0.0), &tuning.player);
        let body = physics.body_mut(handle).unwrap();
        body.set_linvel(Vector3::new(4.0, -1.0, 0.0), true);

        let mut look = Vector3::new(0.0, 0.0, -1.0);
        resolve_on_foot(body, &intent(), &mut look, true, &tuning.player);

        let velocity = body.linvel();
        assert!((velocity.x - 3.2).abs() < 1e-4);
        assert_eq!(velocity.y, -1.0);
    }

    #[test]
    fn jump_requires_low_vertical_velocity() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_player_body(Vector3::new(0.0, 0.9, 0.0), &tuning.player);

        let mut look = Vector3::new(0.0, 0.0, -1.0);
        let mut input = intent();
        input.jump = true;

        // Already moving up fast: no jump impulse
        {
            let body = physics.body_mut(handle).unwrap();
            body.set_linvel(Vector3::new(0.0, 1.0, 0.0), true);
            resolve_on_foot(body, &input, &mut look, true, &tuning.player);
            let dv = body.linvel().y - 1.0;
            assert!(dv < 1.0, "jump should not fire, got dv {}", dv);
        }

        // At rest: jump impulse applies
        {
            let body = physics.body_mut(handle).unwrap();
            body.set_linvel(Vector3::zeros(), true);
            resolve_on_foot(body, &input, &mut look, true, &tuning.player);
            assert!(body.linvel().y > 1.0);
        }
    }

    #[test]
    fn airborne_input_only_nudges() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_player_body(Vector3::new(0.0, 10.0, 0.0), &tuning.player);
        let body = physics.body_mut(handle).unwrap();

        let mut look = Vector3::new(0.0, 0.0, -1.0);
        let mut input = intent();
        input.move_forward = true;
        input.jump = true;

        resolve_on_foot(body, &input, &mut look, false, &tuning.player);

        let velocity = body.linvel();
        assert!(velocity.z < 0.0 && velocity.z > -0.5);
        // Airborne jump is ignored
        assert!(velocity.y.abs() < 1e-4);
    }

    #[test]
    fn car_drives_forward_at_double_reverse_power() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_vehicle_body(
            Vector3::new(0.0, 1.0, 0.0),
            tuning.car.half_extents,
            tuning.car.density,
            tuning.car.linear_damping,
            tuning.car.angular_damping,
        );
        let body = physics.body_mut(handle).unwrap();

        let mut input = intent();
        input.move_forward = true;
        resolve_car(body, &input, &tuning.car);
        let forward_speed = -body.linvel().z;

        body.set_linvel(Vector3::zeros(), true);
        let mut input = intent();
        input.move_backward = true;
        resolve_car(body, &input, &tuning.car);
        let reverse_speed = body.linvel().z;

        assert!(forward_speed > 0.0);
        assert!((forward_speed - reverse_speed * 2.0).abs() < 1e-3);
    }

    #[test]
    fn stationary_car_does_not_yaw_without_throttle() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_vehicle_body(
            Vector3::new(0.0, 1.0, 0.0),
            tuning.car.half_extents,
            tuning.car.density,
            tuning.car.linear_damping,
            tuning.car.angular_damping,
        );
        let body = physics.body_mut(handle).unwrap();

        let mut input = intent();
        input.move_left = true;
        resolve_car(body, &input, &tuning.car);
        assert!(body.angvel().y.abs() < 1e-6);

        input.move_forward = true;
        resolve_car(body, &input, &tuning.car);
        assert!(body.angvel().y > 0.0);
    }

    #[test]
    fn helicopter_lift_cuts_out_above_ceiling() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_vehicle_body(
            Vector3::new(0.0, tuning.heli.max_altitude + 5.0, 0.0),
            tuning.heli.half_extents,
            tuning.heli.density,
            tuning.heli.linear_damping,
            tuning.heli.angular_damping,
        );
        let body = physics.body_mut(handle).unwrap();

        let mut engine_on = false;
        let mut input = intent();
        input.jump = true;
        resolve_helicopter(body, &input, &mut engine_on, &tuning.heli);

        assert!(engine_on);
        assert!(body.linvel().y.abs() < 1e-6);
    }

    #[test]
    fn helicopter_descends_at_half_lift() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_vehicle_body(
            Vector3::new(0.0, 10.0, 0.0),
            tuning.heli.half_extents,
            tuning.heli.density,
            tuning.heli.linear_damping,
            tuning.heli.angular_damping,
        );
        let mass = physics.body(handle).unwrap().mass();
        let body = physics.body_mut(handle).unwrap();

        let mut engine_on = true;
        let mut input = intent();
        input.shift = true;
        resolve_helicopter(body, &input, &mut engine_on, &tuning.heli);

        let expected = -tuning.heli.lift_impulse * 0.5 / mass;
        assert!((body.linvel().y - expected).abs() < 1e-3);
    }

    #[test]
    fn plane_throttle_integrates_and_clamps() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_vehicle_body(
            Vector3::new(0.0, 1.0, 0.0),
            tuning.plane.half_extents,
            tuning.plane.density,
            tuning.plane.linear_damping,
            tuning.plane.angular_damping,
        );

        let mut throttle = 0.0;
        let mut input = intent();
        input.move_forward = true;

        for _ in 0..100 {
            let body = physics.body_mut(handle).unwrap();
            resolve_plane(body, &input, &mut throttle, &tuning.plane);
        }
        assert_eq!(throttle, 1.0);

        let mut input = intent();
        input.move_backward = true;
        for _ in 0..100 {
            let body = physics.body_mut(handle).unwrap();
            resolve_plane(body, &input, &mut throttle, &tuning.plane);
        }
        assert_eq!(throttle, 0.0);
    }

    #[test]
    fn plane_gains_lift_above_stall_speed() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_vehicle_body(
            Vector3::new(0.0, 5.0, 0.0),
            tuning.plane.half_extents,
            tuning.plane.density,
            tuning.plane.linear_damping,
            tuning.plane.angular_damping,
        );
        let body = physics.body_mut(handle).unwrap();
        body.set_linvel(Vector3::new(0.0, 0.0, -tuning.plane.min_lift_speed * 2.0), true);

        let mut throttle = 0.0;
        resolve_plane(body, &intent(), &mut throttle, &tuning.plane);

        assert!(body.linvel().y > 0.0);
    }

    #[test]
    fn look_direction_update_steers_movement() {
        let (mut physics, tuning) = setup();
        let handle = physics.add_player_body(Vector3::new(0.0, 0.9, 0.0), &tuning.player);
        let body = physics.body_mut(handle).unwrap();

        let mut look = Vector3::new(0.0, 0.0, -1.0);
        let mut input = intent();
        input.move_forward = true;
        input.look_direction = Some(Vec3::new(1.0, 0.0, 0.0));

        resolve_on_foot(body, &input, &mut look, true, &tuning.player);

        assert_eq!(look, Vector3::new(1.0, 0.0, 0.0));
        assert!(body.linvel().x > 0.0);
        assert!(body.linvel().z.abs() < 1e-4);
    }
}
