use glam::Vec2;
use rand::Rng;
use rand::rngs::SmallRng;

use super::{AgentView, Obstacle, TargetView};

const SIGHT_RANGE: f32 = 50.0;
const RETREAT_CONFIDENCE: f32 = 0.25;
const REENGAGE_CONFIDENCE: f32 = 0.5;
const INVESTIGATE_GIVE_UP_SECS: f32 = 10.0;
const RETREAT_COOL_OFF_SECS: f32 = 2.0;
const CRUISE_SPEED: f32 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Goal {
    Wander { time: f32, angle: f32 },
    Investigate { time: f32, target: Vec2 },
    Engage { time: f32 },
    Retreat { time: f32 },
}

impl Default for Goal {
    fn default() -> Self {
        Goal::Wander {
            time: 0.0,
            angle: 0.0,
        }
    }
}

impl Goal {
    pub fn time_mut(&mut self) -> &mut f32 {
        match self {
            Goal::Wander { time, .. }
            | Goal::Investigate { time, .. }
            | Goal::Engage { time }
            | Goal::Retreat { time } => time,
        }
    }
}

fn exp_decay(rate: f32, decay: f32, t: f32) -> f32 {
    rate * (1.0 - decay).powf(t)
}

fn sight(us: &AgentView, them: &TargetView) -> (f32, bool) {
    let distance = (them.position - us.position).length();
    (distance, distance < SIGHT_RANGE)
}

/// Combat confidence from 0 (pessimism) to 1 (optimism).
fn confidence(us: &AgentView, them: &TargetView) -> f32 {
    (100.0 + us.hp as f32 - them.hp as f32) / 200.0
}

/// Passive detection of the ship's radar emissions. A silent radar cannot be
/// heard at all; a loud one decays in detectability with distance.
fn try_detect(them: &TargetView, distance: f32, rng: &mut SmallRng) -> bool {
    let loudness = them.radar_power as f32 * 25.0;
    if loudness <= 0.0 {
        return false;
    }
    rng.r#gen::<f32>() < exp_decay(1.0, 0.2, distance / loudness)
}

fn sighted_response(us: &AgentView, them: &TargetView) -> Goal {
    if confidence(us, them) < RETREAT_CONFIDENCE {
        Goal::Retreat { time: 0.0 }
    } else {
        Goal::Engage { time: 0.0 }
    }
}

pub fn compute_goal(
    current: Goal,
    us: &AgentView,
    them: &TargetView,
    rng: &mut SmallRng,
) -> Goal {
    match current {
        Goal::Wander { .. } => {
            let (distance, can_see) = sight(us, them);
            if can_see {
                return sighted_response(us, them);
            }
            if try_detect(them, distance, rng) {
                return Goal::Investigate {
                    time: 0.0,
                    target: them.position,
                };
            }
            current
        }
        Goal::Investigate { time, .. } => {
            let (distance, can_see) = sight(us, them);
            if can_see {
                return sighted_response(us, them);
            }
            if try_detect(them, distance, rng) {
                return Goal::Investigate {
                    time: 0.0,
                    target: them.position,
                };
            }
            // give up if the trail goes cold
            if time > INVESTIGATE_GIVE_UP_SECS {
                return Goal::default();
            }
            current
        }
        Goal::Engage { .. } => {
            let (_, can_see) = sight(us, them);
            if !can_see {
                // chase the last known position
                return Goal::Investigate {
                    time: 0.0,
                    target: them.position,
                };
            }
            if confidence(us, them) < RETREAT_CONFIDENCE {
                return Goal::Retreat { time: 0.0 };
            }
            current
        }
        Goal::Retreat { time } => {
            let (_, can_see) = sight(us, them);
            if can_see {
                if confidence(us, them) >= REENGAGE_CONFIDENCE {
                    return Goal::Engage { time: 0.0 };
                }
                return Goal::Retreat { time: 0.0 };
            }
            if time > RETREAT_COOL_OFF_SECS {
                return Goal::default();
            }
            current
        }
    }
}

fn clamp_vec(v: Vec2, max: f32) -> Vec2 {
    let length = v.length();
    if length > max { v * (max / length) } else { v }
}

fn do_wander(angle: &mut f32, speed: f32, rng: &mut SmallRng) -> Vec2 {
    *angle += rng.gen_range(-0.02..0.02);
    Vec2::from_angle(*angle).rotate(Vec2::new(0.0, speed))
}

fn do_seek(us: &AgentView, target: Vec2) -> Vec2 {
    target - us.position
}

fn do_flee(us: &AgentView, target: Vec2) -> Vec2 {
    -do_seek(us, target)
}

/// Steers perpendicular to the current velocity, away from the nearest
/// obstacle on a collision-ish course. Returns None when the path is clear.
fn do_avoid(us: &AgentView, obstacles: &[Obstacle]) -> Option<Vec2> {
    let velocity = us.velocity;
    let mut to_obstacle = None;
    let mut closest = velocity.length_squared() * 8.0;

    for obstacle in obstacles {
        let v = obstacle.position - us.position;
        let distance = v.length_squared() - obstacle.extent_sqr;
        if distance < closest {
            to_obstacle = Some(v);
            closest = distance;
        }
    }

    let to_obstacle = to_obstacle?;
    if to_obstacle.perp_dot(velocity) < 0.0 {
        Some(Vec2::new(velocity.y * 10.0, -velocity.x * 10.0))
    } else {
        Some(Vec2::new(-velocity.y * 10.0, velocity.x * 10.0))
    }
}

/// Pursues a point offset perpendicular from the target, on the side we are
/// already heading toward, leading the target by its velocity.
fn do_offset_pursue(us: &AgentView, them: &TargetView) -> Vec2 {
    let mut to_target = them.position - us.position;
    if to_target.perp_dot(us.velocity) < 0.0 {
        to_target = -to_target;
    }

    let offset = Vec2::new(-to_target.y, to_target.x).normalize_or_zero() * 4.0;
    let offset_pos = them.position + offset;
    let projected = offset_pos + them.velocity * (to_target.length() * 0.1);
    do_seek(us, projected)
}

fn do_evade(us: &AgentView, them: &TargetView) -> Vec2 {
    let distance = (us.position - them.position).length();
    let projected = them.position + them.velocity * (distance * 0.1);
    do_flee(us, projected)
}

/// Maps the active goal to a desired-velocity steering command.
pub fn compute_action(
    goal: &mut Goal,
    us: &AgentView,
    them: &TargetView,
    obstacles: &[Obstacle],
    rng: &mut SmallRng,
) -> Vec2 {
    if let Some(avoid) = do_avoid(us, obstacles) {
        return avoid;
    }

    match goal {
        Goal::Wander { angle, .. } => do_wander(angle, CRUISE_SPEED, rng),
        Goal::Investigate { target, .. } => clamp_vec(do_seek(us, *target), CRUISE_SPEED),
        Goal::Engage { .. } => do_offset_pursue(us, them),
        Goal::Retreat { .. } => do_evade(us, them),
    }
}
