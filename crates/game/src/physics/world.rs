use glam::Vec2;
use rapier2d::prelude::*;

use crate::constants::PHYS_DT;

/// Outcome of a lazer/raycast query.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub body: RigidBodyHandle,
    pub point: Vec2,
    pub toi: Real,
}

/// A nearby body reported by an AABB query, with enough geometry for
/// steering-avoidance decisions.
#[derive(Debug, Clone, Copy)]
pub struct ObstacleHit {
    pub body: RigidBodyHandle,
    pub position: Vec2,
    pub extent_sqr: Real,
}

/// Full kinematic readout of one body.
#[derive(Debug, Clone, Copy)]
pub struct BodyReadout {
    pub position: Vec2,
    pub angle: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub sleeping: bool,
}

/// The consumed physics collaborator: a planar rapier world with zero
/// gravity. Forking is the only way two worlds ever relate; a fork shares no
/// mutable structure with its source, which is what makes ring-buffer
/// rollback sound.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = PHYS_DT;

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::ZERO,
        }
    }

    /// Independent duplicate of this world. Broad/narrow phase state is
    /// rebuilt rather than copied; every fork therefore re-derives contacts
    /// the same way, which keeps replayed frames bit-comparable.
    pub fn fork(&self) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters: self.integration_parameters,
            islands: self.islands.clone(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: self.bodies.clone(),
            colliders: self.colliders.clone(),
            impulse_joints: self.impulse_joints.clone(),
            multibody_joints: self.multibody_joints.clone(),
            ccd_solver: CCDSolver::new(),
            gravity: self.gravity,
        }
    }

    /// Advances the world by one fixed step. Forces and torques applied
    /// since the previous solve are consumed by this step and cleared.
    pub fn solve(&mut self, dt: Real) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );

        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }
    }

    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    pub fn add_ship(&mut self, position: Vec2, angle: f32) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(position.x, position.y))
            .rotation(angle)
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::triangle(
            point![-0.5, -0.5].into(),
            point![0.5, -0.5].into(),
            point![0.0, 0.5].into(),
        )
        .density(1.0)
        .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    pub fn add_hostile(&mut self, position: Vec2, angle: f32) -> RigidBodyHandle {
        // Hostiles share the ship's hull shape.
        self.add_ship(position, angle)
    }

    pub fn add_box(&mut self, position: Vec2, velocity: Vec2) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(position.x, position.y))
            .linvel(Vector::new(velocity.x, velocity.y))
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cuboid(0.5, 0.5).density(1.0).build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    pub fn add_rock(&mut self, position: Vec2, radius: Real) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(position.x, position.y))
            .linear_damping(0.2)
            .angular_damping(0.2)
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::ball(radius).density(2.0).build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn readout(&self, handle: RigidBodyHandle) -> Option<BodyReadout> {
        self.bodies.get(handle).map(|body| {
            let t = body.translation();
            let v = body.linvel();
            BodyReadout {
                position: Vec2::new(t.x, t.y),
                angle: body.rotation().angle(),
                velocity: Vec2::new(v.x, v.y),
                angular_velocity: body.angvel(),
                sleeping: body.is_sleeping(),
            }
        })
    }

    /// Hard-sets a body to an authoritative pose and velocity, waking it so
    /// the next solve integrates from the corrected state.
    pub fn snap_body(
        &mut self,
        handle: RigidBodyHandle,
        position: Vec2,
        angle: f32,
        velocity: Vec2,
        angular_velocity: f32,
    ) {
        if let Some(body) = self.bodies.get_mut(handle) {
            let pose = Pose::from_parts(
                Vector::new(position.x, position.y),
                Rotation::new(angle),
            );
            body.set_position(pose, true);
            body.set_linvel(Vector::new(velocity.x, velocity.y), true);
            body.set_angvel(angular_velocity, true);
            body.wake_up(true);
        }
    }

    pub fn set_body_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(Vector::new(velocity.x, velocity.y), true);
        }
    }

    pub fn apply_force(&mut self, handle: RigidBodyHandle, force: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.add_force(Vector::new(force.x, force.y), true);
        }
    }

    pub fn apply_torque(&mut self, handle: RigidBodyHandle, torque: Real) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.add_torque(torque, true);
        }
    }

    pub fn wake(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.wake_up(true);
        }
    }

    pub fn raycast(
        &self,
        origin: Vec2,
        target: Vec2,
        exclude: Option<RigidBodyHandle>,
    ) -> Option<RayHit> {
        let to_target = target - origin;
        let max_distance = to_target.length();
        if max_distance <= Real::EPSILON {
            return None;
        }
        let direction = to_target / max_distance;

        let mut filter = QueryFilter::default();
        if let Some(handle) = exclude {
            filter = filter.exclude_rigid_body(handle);
        }
        let query = self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        );

        let ray = Ray::new(
            Vector::new(origin.x, origin.y),
            Vector::new(direction.x, direction.y),
        );

        query
            .cast_ray(&ray, max_distance, true)
            .and_then(|(collider, toi)| {
                let body = self.colliders.get(collider)?.parent()?;
                Some(RayHit {
                    body,
                    point: origin + direction * toi,
                    toi,
                })
            })
    }

    /// Reports bodies whose collider AABB intersects the box around
    /// `center`, excluding `exclude`. Iterates the collider arena directly so
    /// the hit order is stable across forks.
    pub fn query_aabb(
        &self,
        center: Vec2,
        half_extents: Vec2,
        exclude: Option<RigidBodyHandle>,
    ) -> Vec<ObstacleHit> {
        let mut hits = Vec::new();

        for (_, collider) in self.colliders.iter() {
            let Some(body_handle) = collider.parent() else {
                continue;
            };
            if Some(body_handle) == exclude {
                continue;
            }
            let Some(body) = self.bodies.get(body_handle) else {
                continue;
            };

            let aabb = collider.compute_aabb();
            let mins = aabb.mins;
            let maxs = aabb.maxs;
            let outside = mins.x > center.x + half_extents.x
                || maxs.x < center.x - half_extents.x
                || mins.y > center.y + half_extents.y
                || maxs.y < center.y - half_extents.y;
            if outside {
                continue;
            }

            let t = body.translation();
            hits.push(ObstacleHit {
                body: body_handle,
                position: Vec2::new(t.x, t.y),
                extent_sqr: (maxs.x - mins.x) * (maxs.y - mins.y),
            });
        }

        hits
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}
