use glam::Vec2;

use crate::objects::{FlightFlags, PowerAllocation, Ship};
use crate::physics::{PhysicsWorld, RayHit};

const FORWARD_THRUST: f32 = 10.0;
const REVERSE_THRUST: f32 = 2.0;
const TURN_RATE: f32 = 4.0;
const LAZER_RANGE_PER_POWER: f32 = 15.0;

/// Where the gun is pointing this frame: muzzle position and a unit
/// direction in world space.
#[derive(Debug, Clone, Copy)]
pub struct GunAim {
    pub origin: Vec2,
    pub direction: Vec2,
}

/// Applies the latched flight controls to the ship body. Thrust scales with
/// engine power; the turn servo matches the hull to a desired angular
/// velocity with bounded torque.
pub fn fly_ship(physics: &mut PhysicsWorld, ship: &Ship) {
    let Some(readout) = physics.readout(ship.body) else {
        return;
    };

    let flags = ship.controls.flight;
    let engine_scale = ship.controls.power.engines as f32 / 2.0;

    let mut local_thrust = Vec2::ZERO;
    if flags.contains(FlightFlags::FORWARD) {
        local_thrust.y += FORWARD_THRUST * engine_scale;
    }
    if flags.contains(FlightFlags::BACKWARD) {
        local_thrust.y -= REVERSE_THRUST * engine_scale;
    }
    physics.apply_force(ship.body, Vec2::from_angle(readout.angle).rotate(local_thrust));

    let mut desired_ang_vel = 0.0;
    if flags.contains(FlightFlags::LEFT) {
        desired_ang_vel += TURN_RATE;
    }
    if flags.contains(FlightFlags::RIGHT) {
        desired_ang_vel -= TURN_RATE;
    }
    let torque = (desired_ang_vel - readout.angular_velocity).clamp(-1.0, 1.0);
    physics.apply_torque(ship.body, torque);
    physics.wake(ship.body);
}

/// Resolves the gun mount and aim direction. A zero aim vector falls back to
/// straight ahead along the hull.
pub fn gun_aim(physics: &PhysicsWorld, ship: &Ship) -> Option<GunAim> {
    let readout = physics.readout(ship.body)?;
    let forward = Vec2::from_angle(readout.angle).rotate(Vec2::Y);
    let direction = ship.controls.aim.try_normalize().unwrap_or(forward);

    Some(GunAim {
        // muzzle at the nose of the hull
        origin: readout.position + forward * 0.5,
        direction,
    })
}

pub fn lazer_range(power: &PowerAllocation) -> f32 {
    power.guns as f32 * LAZER_RANGE_PER_POWER
}

/// Fires the lazer along the aim line, excluding the ship's own hull.
pub fn cast_lazer(physics: &PhysicsWorld, ship: &Ship, aim: &GunAim) -> Option<RayHit> {
    let range = lazer_range(&ship.controls.power);
    if range <= 0.0 {
        return None;
    }
    physics.raycast(aim.origin, aim.origin + aim.direction * range, Some(ship.body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PHYS_DT;
    use crate::objects::EntityId;

    fn ship_at_origin(physics: &mut PhysicsWorld) -> Ship {
        let body = physics.add_ship(Vec2::ZERO, 0.0);
        Ship::new(EntityId(1), body)
    }

    #[test]
    fn forward_flag_accelerates_along_hull() {
        let mut physics = PhysicsWorld::new();
        let mut ship = ship_at_origin(&mut physics);
        ship.controls.flight = FlightFlags::FORWARD;

        for _ in 0..10 {
            fly_ship(&mut physics, &ship);
            physics.solve(PHYS_DT);
        }

        let readout = physics.readout(ship.body).unwrap();
        assert!(readout.velocity.y > 0.0);
        assert!(readout.velocity.x.abs() < 1e-3);
    }

    #[test]
    fn zero_gun_power_cannot_fire() {
        let mut physics = PhysicsWorld::new();
        let mut ship = ship_at_origin(&mut physics);
        ship.controls.power.guns = 0;
        physics.add_box(Vec2::new(0.0, 3.0), Vec2::ZERO);

        let aim = gun_aim(&physics, &ship).unwrap();
        assert!(cast_lazer(&physics, &ship, &aim).is_none());
    }

    #[test]
    fn lazer_hits_target_ahead() {
        let mut physics = PhysicsWorld::new();
        let ship = ship_at_origin(&mut physics);
        let target = physics.add_box(Vec2::new(0.0, 5.0), Vec2::ZERO);

        let aim = gun_aim(&physics, &ship).unwrap();
        let hit = cast_lazer(&physics, &ship, &aim).unwrap();
        assert_eq!(hit.body, target);
    }
}
