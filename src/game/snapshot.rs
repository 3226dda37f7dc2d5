//! Snapshot building for network transmission.
//!
//! The registry records are already synced from the physics bodies by the
//! tick driver, so building a snapshot is a pure read.

use crate::game::registry::{EntityRegistry, Ghost, Player, Projectile, Vehicle, VehicleState};
use crate::ws::protocol::{
    GhostSnapshot, PlayerSnapshot, ProjectileSnapshot, VehicleKindSnapshot, VehicleSnapshot,
    WorldSnapshot,
};

pub fn player_snapshot(player: &Player) -> PlayerSnapshot {
    PlayerSnapshot {
        id: player.id.clone(),
        position: player.position.into(),
        rotation: player.rotation.into(),
        velocity: player.velocity.into(),
        health: player.health,
        grounded: player.grounded,
        vehicle: player.driving_vehicle().map(str::to_string),
        carrying: player.carrying.clone(),
    }
}

pub fn vehicle_snapshot(vehicle: &Vehicle) -> VehicleSnapshot {
    let kind = match vehicle.state {
        VehicleState::Car => VehicleKindSnapshot::Car,
        VehicleState::Helicopter { engine_on } => VehicleKindSnapshot::Helicopter { engine_on },
        VehicleState::Plane { throttle } => VehicleKindSnapshot::Plane { throttle },
    };
    VehicleSnapshot {
        id: vehicle.id.clone(),
        position: vehicle.position.into(),
        rotation: vehicle.rotation.into(),
        velocity: vehicle.velocity.into(),
        driver: vehicle.driver.clone(),
        kind,
    }
}

pub fn ghost_snapshot(ghost: &Ghost) -> GhostSnapshot {
    GhostSnapshot {
        id: ghost.id.clone(),
        shape: ghost.shape,
        mass: ghost.mass,
        position: ghost.position.into(),
        rotation: ghost.rotation.into(),
        velocity: ghost.velocity.into(),
        carrier: ghost.carrier.clone(),
        color: ghost.color.clone(),
    }
}

pub fn projectile_snapshot(projectile: &Projectile) -> ProjectileSnapshot {
    ProjectileSnapshot {
        id: projectile.id.clone(),
        position: projectile.position.into(),
        velocity: projectile.velocity.into(),
        owner: projectile.owner.clone(),
    }
}

/// Build the full `GAME_STATE` payload
pub fn world_snapshot(registry: &EntityRegistry) -> WorldSnapshot {
    WorldSnapshot {
        players: registry.players.values().map(player_snapshot).collect(),
        projectiles: registry
            .projectiles
            .values()
            .map(projectile_snapshot)
            .collect(),
        vehicles: registry.vehicles.values().map(vehicle_snapshot).collect(),
        ghosts: registry.ghosts.values().map(ghost_snapshot).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::populate_world;
    use crate::game::physics::PhysicsWorld;
    use crate::game::tuning::{self, Tuning};
    use nalgebra::Vector3;

    #[test]
    fn snapshot_covers_every_entity_category() {
        let tuning = Tuning::default();
        let mut physics = PhysicsWorld::new(tuning::gravity(), tuning::tick_dt());
        let mut registry = EntityRegistry::new();
        populate_world(&mut registry, &mut physics, &tuning);

        let body = physics.add_player_body(tuning::spawn_point(), &tuning.player);
        registry.insert_player(
            Player::new("p1".into(), tuning::spawn_point(), tuning.player.max_health),
            body,
        );

        let snapshot = world_snapshot(&registry);
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.vehicles.len(), 3);
        assert_eq!(snapshot.ghosts.len(), 5);
        assert!(snapshot.projectiles.is_empty());

        let player = &snapshot.players[0];
        assert_eq!(player.health, tuning.player.max_health);
        assert!(player.vehicle.is_none());
    }

    #[test]
    fn driving_link_appears_in_both_snapshots() {
        let tuning = Tuning::default();
        let mut player = Player::new("p1".into(), Vector3::zeros(), tuning.player.max_health);
        player.context = crate::game::registry::ControlContext::Driving {
            vehicle_id: "vehicle_0".into(),
        };
        let snapshot = player_snapshot(&player);
        assert_eq!(snapshot.vehicle.as_deref(), Some("vehicle_0"));

        let mut vehicle = Vehicle::new(
            "vehicle_0".into(),
            VehicleState::Helicopter { engine_on: true },
            Vector3::zeros(),
        );
        vehicle.driver = Some("p1".into());
        let snapshot = vehicle_snapshot(&vehicle);
        assert_eq!(snapshot.driver.as_deref(), Some("p1"));
        assert!(matches!(
            snapshot.kind,
            VehicleKindSnapshot::Helicopter { engine_on: true }
        ));
    }
}
