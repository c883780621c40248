mod goal;
mod motion;

use glam::Vec2;
use rand::rngs::SmallRng;

pub use goal::Goal;
pub use motion::do_motion;

/// What a hostile knows about itself when thinking.
#[derive(Debug, Clone, Copy)]
pub struct AgentView {
    pub position: Vec2,
    pub velocity: Vec2,
    pub hp: u8,
}

/// What a hostile can observe about the player ship.
#[derive(Debug, Clone, Copy)]
pub struct TargetView {
    pub position: Vec2,
    pub velocity: Vec2,
    pub hp: u8,
    pub radar_power: u8,
}

/// A nearby body considered for steering avoidance.
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub position: Vec2,
    pub extent_sqr: f32,
}

/// Goal-driven pilot for one hostile. The goal state machine runs once per
/// live frame; the chosen motion command is part of forked state, so
/// replaying a frame re-applies the same command instead of re-deciding.
#[derive(Debug, Clone, Default)]
pub struct Brain {
    pub goal: Goal,
    motion: Option<Vec2>,
}

impl Brain {
    pub fn compute(
        &mut self,
        us: &AgentView,
        them: &TargetView,
        obstacles: &[Obstacle],
        dt: f32,
        rng: &mut SmallRng,
    ) {
        *self.goal.time_mut() += dt;
        self.goal = goal::compute_goal(self.goal, us, them, rng);
        self.motion = Some(goal::compute_action(&mut self.goal, us, them, obstacles, rng));
    }

    pub fn motion(&self) -> Option<Vec2> {
        self.motion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn views(distance: f32) -> (AgentView, TargetView) {
        (
            AgentView {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                hp: 100,
            },
            TargetView {
                position: Vec2::new(distance, 0.0),
                velocity: Vec2::ZERO,
                hp: 100,
                radar_power: 2,
            },
        )
    }

    #[test]
    fn visible_ship_triggers_engagement() {
        let mut brain = Brain::default();
        let mut rng = SmallRng::seed_from_u64(7);
        let (us, them) = views(10.0);

        brain.compute(&us, &them, &[], 0.025, &mut rng);

        assert!(matches!(brain.goal, Goal::Engage { .. }));
        assert!(brain.motion().is_some());
    }

    #[test]
    fn wounded_agent_retreats() {
        let mut brain = Brain::default();
        let mut rng = SmallRng::seed_from_u64(7);
        let (mut us, them) = views(10.0);
        us.hp = 10;

        brain.compute(&us, &them, &[], 0.025, &mut rng);

        assert!(matches!(brain.goal, Goal::Retreat { .. }));
    }

    #[test]
    fn distant_silent_ship_stays_hidden() {
        let mut brain = Brain::default();
        let mut rng = SmallRng::seed_from_u64(7);
        let (us, mut them) = views(500.0);
        them.radar_power = 0;

        for _ in 0..50 {
            brain.compute(&us, &them, &[], 0.025, &mut rng);
        }

        assert!(matches!(brain.goal, Goal::Wander { .. }));
    }
}
