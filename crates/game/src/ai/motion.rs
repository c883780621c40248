use glam::Vec2;
use rapier2d::prelude::RigidBodyHandle;

use crate::math::clean_angle;
use crate::physics::PhysicsWorld;

const MAX_STRAFE: f32 = 10.0;
const MIN_THRUST: f32 = -25.0;
const MAX_THRUST: f32 = 50.0;
const MAX_SPEED: f32 = 50.0;

/// Turns a desired-velocity command into forces on the hostile's body:
/// thrust/strafe in hull space, a torque servo toward the travel direction,
/// and a hard cap on speed.
pub fn do_motion(physics: &mut PhysicsWorld, handle: RigidBodyHandle, motion: Vec2) {
    let Some(us) = physics.readout(handle) else {
        return;
    };

    let desired_world = motion - us.velocity;
    let desired_local = Vec2::from_angle(-us.angle).rotate(desired_world);
    let strafe = desired_local.x.clamp(-MAX_STRAFE, MAX_STRAFE);
    let thrust = desired_local.y.clamp(MIN_THRUST, MAX_THRUST);
    let force = Vec2::from_angle(us.angle).rotate(Vec2::new(strafe, thrust));
    physics.apply_force(handle, force);

    let desired_angle = clean_angle((-motion.x).atan2(motion.y));
    let angle_diff = clean_angle(desired_angle - us.angle);
    let torque = (angle_diff * 2.0 - us.angular_velocity).clamp(-1.0, 1.0) * 10.0;
    physics.apply_torque(handle, torque);
    physics.wake(handle);

    if us.velocity.length() > MAX_SPEED {
        physics.set_body_velocity(handle, us.velocity.normalize() * MAX_SPEED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PHYS_DT;

    #[test]
    fn motion_accelerates_toward_command() {
        let mut physics = PhysicsWorld::new();
        let handle = physics.add_hostile(Vec2::ZERO, 0.0);

        for _ in 0..20 {
            do_motion(&mut physics, handle, Vec2::new(0.0, 20.0));
            physics.solve(PHYS_DT);
        }

        let readout = physics.readout(handle).unwrap();
        assert!(readout.velocity.y > 1.0);
    }

    #[test]
    fn speed_is_capped() {
        let mut physics = PhysicsWorld::new();
        let handle = physics.add_hostile(Vec2::ZERO, 0.0);
        physics.set_body_velocity(handle, Vec2::new(0.0, 500.0));

        do_motion(&mut physics, handle, Vec2::new(0.0, 500.0));

        let readout = physics.readout(handle).unwrap();
        assert!(readout.velocity.length() <= MAX_SPEED + 1e-3);
    }
}
