mod world;

pub use world::{BodyReadout, ObstacleHit, PhysicsWorld, RayHit};
