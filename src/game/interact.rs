//! Interaction handlers: fire, enter/exit vehicle, grab/drop/throw.
//!
//! Every handler validates against current authoritative state and returns
//! the message to broadcast on success, or `None` for a silent no-op. No
//! NACK is ever sent; the next snapshot shows the lack of effect.

use nalgebra::Vector3;
use tracing::debug;

use crate::game::physics::PhysicsWorld;
use crate::game::registry::{ControlContext, EntityRegistry, Projectile, VehicleState};
use crate::game::snapshot::{ghost_snapshot, projectile_snapshot, vehicle_snapshot};
use crate::game::tuning::{Tuning, VEHICLE_INTERACTION_RANGE};
use crate::ws::protocol::{ServerMsg, Vec3};

/// Off-world parking spot for the bodies of driving players
pub fn driver_sentinel() -> Vector3<f32> {
    Vector3::new(0.0, -1000.0, 0.0)
}

/// FIRE: spawn a projectile, subject to the fire cooldown
pub fn handle_fire(
    registry: &mut EntityRegistry,
    physics: &mut PhysicsWorld,
    tuning: &Tuning,
    player_id: &str,
    direction: Vec3,
    origin: Vec3,
    now: f64,
) -> Option<ServerMsg> {
    let player = registry.players.get_mut(player_id)?;
    if now - player.last_fire_time < tuning.weapon.fire_interval {
        return None;
    }
    player.last_fire_time = now;

    let direction: Vector3<f32> = direction.into();
    let origin: Vector3<f32> = origin.into();
    let velocity = direction * tuning.weapon.projectile_speed;

    let body = physics.add_projectile_body(origin, tuning.weapon.projectile_radius, velocity);
    let projectile = Projectile {
        id: registry.projectile_id(),
        owner: player_id.to_string(),
        created_at: now,
        position: origin,
        velocity,
    };
    let msg = ServerMsg::ProjectileSpawn {
        projectile: projectile_snapshot(&projectile),
    };
    registry.insert_projectile(projectile, body);
    Some(msg)
}

/// ENTER_VEHICLE: take the driver's seat if it is free and in range
pub fn handle_enter_vehicle(
    registry: &mut EntityRegistry,
    physics: &mut PhysicsWorld,
    player_id: &str,
    vehicle_id: &str,
) -> Option<ServerMsg> {
    {
        let player = registry.players.get(player_id)?;
        if player.context != ControlContext::OnFoot || player.carrying.is_some() {
            return None;
        }
        let vehicle = registry.vehicles.get(vehicle_id)?;
        if vehicle.driver.is_some() {
            return None;
        }
        if (player.position - vehicle.position).norm() > VEHICLE_INTERACTION_RANGE {
            return None;
        }
    }

    // The driver's body neither collides nor renders until exit
    let body = registry.player_body(player_id)?;
    physics.set_kinematic(body);
    physics.teleport(body, driver_sentinel());

    let player = registry.players.get_mut(player_id)?;
    player.context = ControlContext::Driving {
        vehicle_id: vehicle_id.to_string(),
    };
    let vehicle = registry.vehicles.get_mut(vehicle_id)?;
    vehicle.driver = Some(player_id.to_string());

    debug!(player_id, vehicle_id, "player entered vehicle");
    Some(ServerMsg::VehicleUpdate {
        vehicle: vehicle_snapshot(vehicle),
    })
}

/// EXIT_VEHICLE: step out beside the vehicle with zero velocity
pub fn handle_exit_vehicle(
    registry: &mut EntityRegistry,
    physics: &mut PhysicsWorld,
    player_id: &str,
) -> Option<ServerMsg> {
    let vehicle_id = registry
        .players
        .get(player_id)?
        .driving_vehicle()?
        .to_string();

    let exit_position = registry.vehicles.get(&vehicle_id)?.position + Vector3::new(3.0, 1.0, 0.0);

    let body = registry.player_body(player_id)?;
    physics.set_dynamic(body);
    physics.teleport(body, exit_position);

    let player = registry.players.get_mut(player_id)?;
    player.context = ControlContext::OnFoot;
    player.position = exit_position;
    player.velocity = Vector3::zeros();

    let vehicle = registry.vehicles.get_mut(&vehicle_id)?;
    vehicle.driver = None;
    if let VehicleState::Helicopter { engine_on } = &mut vehicle.state {
        *engine_on = false;
    }

    debug!(player_id, vehicle_id = %vehicle_id, "player exited vehicle");
    Some(ServerMsg::VehicleUpdate {
        vehicle: vehicle_snapshot(vehicle),
    })
}

/// GRAB_GHOST: pick up a carriable within reach
pub fn handle_grab_ghost(
    registry: &mut EntityRegistry,
    physics: &mut PhysicsWorld,
    tuning: &Tuning,
    player_id: &str,
    ghost_id: &str,
) -> Option<ServerMsg> {
    {
        let player = registry.players.get(player_id)?;
        if player.carrying.is_some() {
            return None;
        }
        let ghost = registry.ghosts.get(ghost_id)?;
        if ghost.carrier.is_some() || ghost.mass > tuning.ghost.max_carry_mass {
            return None;
        }
        if (player.position - ghost.position).norm() > tuning.ghost.interaction_range {
            return None;
        }
    }

    let body = registry.ghost_body(ghost_id)?;
    physics.set_kinematic(body);

    registry.players.get_mut(player_id)?.carrying = Some(ghost_id.to_string());
    let ghost = registry.ghosts.get_mut(ghost_id)?;
    ghost.carrier = Some(player_id.to_string());
    ghost.velocity = Vector3::zeros();

    debug!(player_id, ghost_id, "ghost grabbed");
    Some(ServerMsg::GhostUpdate {
        ghost: ghost_snapshot(ghost),
    })
}

/// DROP_GHOST: release the held object in place
pub fn handle_drop_ghost(
    registry: &mut EntityRegistry,
    physics: &mut PhysicsWorld,
    player_id: &str,
) -> Option<ServerMsg> {
    release_ghost(registry, physics, player_id, Vector3::new(0.0, -1.0, 0.0))
}

/// THROW_GHOST: release the held object with launch velocity
pub fn handle_throw_ghost(
    registry: &mut EntityRegistry,
    physics: &mut PhysicsWorld,
    tuning: &Tuning,
    player_id: &str,
    direction: Vec3,
) -> Option<ServerMsg> {
    let direction: Vector3<f32> = direction.into();
    release_ghost(
        registry,
        physics,
        player_id,
        direction * tuning.ghost.throw_speed,
    )
}

fn release_ghost(
    registry: &mut EntityRegistry,
    physics: &mut PhysicsWorld,
    player_id: &str,
    velocity: Vector3<f32>,
) -> Option<ServerMsg> {
    let ghost_id = registry.players.get(player_id)?.carrying.clone()?;

    let body = registry.ghost_body(&ghost_id)?;
    physics.set_dynamic(body);
    if let Some(body) = physics.body_mut(body) {
        body.set_linvel(velocity, true);
    }

    registry.players.get_mut(player_id)?.carrying = None;
    let ghost = registry.ghosts.get_mut(&ghost_id)?;
    ghost.carrier = None;
    ghost.velocity = velocity;

    debug!(player_id, ghost_id = %ghost_id, "ghost released");
    Some(ServerMsg::GhostUpdate {
        ghost: ghost_snapshot(ghost),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::populate_world;
    use crate::game::registry::Player;
    use crate::game::tuning;

    struct Fixture {
        physics: PhysicsWorld,
        registry: EntityRegistry,
        tuning: Tuning,
        player_id: String,
    }

    fn fixture() -> Fixture {
        let tuning = Tuning::default();
        let mut physics = PhysicsWorld::new(tuning::gravity(), tuning::tick_dt());
        let mut registry = EntityRegistry::new();
        populate_world(&mut registry, &mut physics, &tuning);

        let player_id = "p1".to_string();
        let body = physics.add_player_body(tuning::spawn_point(), &tuning.player);
        registry.insert_player(
            Player::new(player_id.clone(), tuning::spawn_point(), tuning.player.max_health),
            body,
        );

        Fixture {
            physics,
            registry,
            tuning,
            player_id,
        }
    }

    fn first_vehicle_id(fx: &Fixture) -> String {
        fx.registry
            .vehicles
            .values()
            .find(|v| matches!(v.state, VehicleState::Car))
            .unwrap()
            .id
            .clone()
    }

    fn light_ghost_id(fx: &Fixture) -> String {
        fx.registry
            .ghosts
            .values()
            .find(|g| g.mass <= fx.tuning.ghost.max_carry_mass)
            .unwrap()
            .id
            .clone()
    }

    fn move_player_to(fx: &mut Fixture, position: Vector3<f32>) {
        fx.registry.players.get_mut(&fx.player_id).unwrap().position = position;
    }

    #[test]
    fn fire_respects_cooldown_boundary() {
        let mut fx = fixture();
        let interval = fx.tuning.weapon.fire_interval;

        let first = handle_fire(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 5.0, 0.0),
            100.0,
        );
        assert!(first.is_some());

        // 1ms later: rejected
        let second = handle_fire(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 5.0, 0.0),
            100.001,
        );
        assert!(second.is_none());
        assert_eq!(fx.registry.projectiles.len(), 1);

        // Exactly one cooldown later: accepted
        let third = handle_fire(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 5.0, 0.0),
            100.0 + interval,
        );
        assert!(third.is_some());
        assert_eq!(fx.registry.projectiles.len(), 2);
    }

    #[test]
    fn fire_sets_projectile_velocity_from_direction() {
        let mut fx = fixture();
        let msg = handle_fire(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
            0.0,
        )
        .unwrap();

        match msg {
            ServerMsg::ProjectileSpawn { projectile } => {
                assert_eq!(projectile.owner, fx.player_id);
                assert!(
                    (projectile.velocity.x - fx.tuning.weapon.projectile_speed).abs() < 1e-4
                );
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn enter_vehicle_range_boundary() {
        let mut fx = fixture();
        let vehicle_id = first_vehicle_id(&fx);
        let vehicle_pos = fx.registry.vehicles[&vehicle_id].position;

        // Just outside the range: refused
        move_player_to(
            &mut fx,
            vehicle_pos + Vector3::new(VEHICLE_INTERACTION_RANGE + 0.01, 0.0, 0.0),
        );
        assert!(handle_enter_vehicle(
            &mut fx.registry,
            &mut fx.physics,
            &fx.player_id,
            &vehicle_id
        )
        .is_none());

        // Exactly at the range: accepted
        move_player_to(
            &mut fx,
            vehicle_pos + Vector3::new(VEHICLE_INTERACTION_RANGE, 0.0, 0.0),
        );
        let msg = handle_enter_vehicle(
            &mut fx.registry,
            &mut fx.physics,
            &fx.player_id,
            &vehicle_id,
        );
        assert!(msg.is_some());

        let vehicle = &fx.registry.vehicles[&vehicle_id];
        assert_eq!(vehicle.driver.as_deref(), Some(fx.player_id.as_str()));
        let player = &fx.registry.players[&fx.player_id];
        assert_eq!(
            player.driving_vehicle(),
            Some(vehicle_id.as_str())
        );

        // Body is parked off-world and no longer simulating
        let body = fx.registry.player_body(&fx.player_id).unwrap();
        let (position, _, _) = fx.physics.body_state(body).unwrap();
        assert!(position.y < -900.0);
        assert!(!fx.physics.body(body).unwrap().is_dynamic());
    }

    #[test]
    fn occupied_vehicle_rejects_second_driver() {
        let mut fx = fixture();
        let vehicle_id = first_vehicle_id(&fx);
        let vehicle_pos = fx.registry.vehicles[&vehicle_id].position;

        move_player_to(&mut fx, vehicle_pos);
        handle_enter_vehicle(&mut fx.registry, &mut fx.physics, &fx.player_id, &vehicle_id)
            .unwrap();

        let other = "p2".to_string();
        let body = fx.physics.add_player_body(vehicle_pos, &fx.tuning.player);
        fx.registry.insert_player(
            Player::new(other.clone(), vehicle_pos, fx.tuning.player.max_health),
            body,
        );

        assert!(handle_enter_vehicle(
            &mut fx.registry,
            &mut fx.physics,
            &other,
            &vehicle_id
        )
        .is_none());
    }

    #[test]
    fn carrying_player_cannot_enter_vehicle() {
        let mut fx = fixture();
        let vehicle_id = first_vehicle_id(&fx);
        let ghost_id = light_ghost_id(&fx);
        let ghost_pos = fx.registry.ghosts[&ghost_id].position;

        move_player_to(&mut fx, ghost_pos);
        handle_grab_ghost(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            &ghost_id,
        )
        .unwrap();

        let vehicle_pos = fx.registry.vehicles[&vehicle_id].position;
        move_player_to(&mut fx, vehicle_pos);
        assert!(handle_enter_vehicle(
            &mut fx.registry,
            &mut fx.physics,
            &fx.player_id,
            &vehicle_id
        )
        .is_none());
    }

    #[test]
    fn exit_vehicle_restores_the_player_beside_it() {
        let mut fx = fixture();
        let vehicle_id = first_vehicle_id(&fx);
        let vehicle_pos = fx.registry.vehicles[&vehicle_id].position;

        move_player_to(&mut fx, vehicle_pos);
        handle_enter_vehicle(&mut fx.registry, &mut fx.physics, &fx.player_id, &vehicle_id)
            .unwrap();
        let msg = handle_exit_vehicle(&mut fx.registry, &mut fx.physics, &fx.player_id);
        assert!(msg.is_some());

        let player = &fx.registry.players[&fx.player_id];
        assert_eq!(player.context, ControlContext::OnFoot);
        let expected = vehicle_pos + Vector3::new(3.0, 1.0, 0.0);
        assert!((player.position - expected).norm() < 1e-4);
        assert_eq!(player.velocity, Vector3::zeros());
        assert!(fx.registry.vehicles[&vehicle_id].driver.is_none());

        let body = fx.registry.player_body(&fx.player_id).unwrap();
        assert!(fx.physics.body(body).unwrap().is_dynamic());
    }

    #[test]
    fn grab_rejects_heavy_and_distant_ghosts() {
        let mut fx = fixture();
        let heavy_id = fx
            .registry
            .ghosts
            .values()
            .find(|g| g.mass > fx.tuning.ghost.max_carry_mass)
            .unwrap()
            .id
            .clone();
        let heavy_pos = fx.registry.ghosts[&heavy_id].position;

        move_player_to(&mut fx, heavy_pos);
        assert!(handle_grab_ghost(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            &heavy_id
        )
        .is_none());

        let light_id = light_ghost_id(&fx);
        let light_pos = fx.registry.ghosts[&light_id].position;
        let target_pos = light_pos + Vector3::new(fx.tuning.ghost.interaction_range + 1.0, 0.0, 0.0);
        move_player_to(&mut fx, target_pos);
        assert!(handle_grab_ghost(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            &light_id
        )
        .is_none());
    }

    #[test]
    fn grab_switches_ghost_to_kinematic_and_links_both_sides() {
        let mut fx = fixture();
        let ghost_id = light_ghost_id(&fx);
        let ghost_pos = fx.registry.ghosts[&ghost_id].position;

        move_player_to(&mut fx, ghost_pos);
        let msg = handle_grab_ghost(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            &ghost_id,
        );
        assert!(msg.is_some());

        let ghost = &fx.registry.ghosts[&ghost_id];
        assert_eq!(ghost.carrier.as_deref(), Some(fx.player_id.as_str()));
        assert_eq!(
            fx.registry.players[&fx.player_id].carrying.as_deref(),
            Some(ghost_id.as_str())
        );

        let body = fx.registry.ghost_body(&ghost_id).unwrap();
        assert!(!fx.physics.body(body).unwrap().is_dynamic());

        // A second grab by another player is refused
        let other = "p2".to_string();
        let body = fx.physics.add_player_body(ghost_pos, &fx.tuning.player);
        fx.registry.insert_player(
            Player::new(other.clone(), ghost_pos, fx.tuning.player.max_health),
            body,
        );
        assert!(handle_grab_ghost(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &other,
            &ghost_id
        )
        .is_none());
    }

    #[test]
    fn throw_releases_with_launch_velocity() {
        let mut fx = fixture();
        let ghost_id = light_ghost_id(&fx);
        let ghost_pos = fx.registry.ghosts[&ghost_id].position;

        move_player_to(&mut fx, ghost_pos);
        handle_grab_ghost(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            &ghost_id,
        )
        .unwrap();

        let msg = handle_throw_ghost(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            Vec3::new(1.0, 0.0, 0.0),
        );
        assert!(msg.is_some());

        let ghost = &fx.registry.ghosts[&ghost_id];
        assert!(ghost.carrier.is_none());
        assert!((ghost.velocity.x - fx.tuning.ghost.throw_speed).abs() < 1e-4);
        assert!(fx.registry.players[&fx.player_id].carrying.is_none());

        let body = fx.registry.ghost_body(&ghost_id).unwrap();
        let rigid_body = fx.physics.body(body).unwrap();
        assert!(rigid_body.is_dynamic());
        assert!((rigid_body.linvel().x - fx.tuning.ghost.throw_speed).abs() < 1e-4);
    }

    #[test]
    fn drop_without_carrying_is_a_noop() {
        let mut fx = fixture();
        assert!(handle_drop_ghost(&mut fx.registry, &mut fx.physics, &fx.player_id).is_none());
    }

    #[test]
    fn unknown_ids_are_silent_noops() {
        let mut fx = fixture();
        assert!(handle_enter_vehicle(
            &mut fx.registry,
            &mut fx.physics,
            &fx.player_id,
            "vehicle_99"
        )
        .is_none());
        assert!(handle_grab_ghost(
            &mut fx.registry,
            &mut fx.physics,
            &fx.tuning,
            &fx.player_id,
            "ghost_99"
        )
        .is_none());
    }
}
