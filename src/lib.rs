//! 2D collision resolution for real-time simulations
//!
//! Each tick an external controller proposes a target velocity per agent;
//! the engine realizes positions, headings, and velocities that respect
//! kinematic limits (speed, acceleration, turn rate), non-penetration
//! against other agents and static rectangular features, and a flag
//! system letting projectiles, airborne, and ground units selectively
//! ignore each other.
//!
//! Collisions are resolved by clamping the velocity component along the
//! contact normal, not by exchanging impulses: there is no momentum
//! transfer, restitution, or continuous (swept) detection. A strict
//! second pass stops an agent outright when iterated projections against
//! several neighbors would otherwise leak motion back into a cleared
//! half-space.
//!
//! ```
//! use shoal::{AgentOptions, Engine, EngineConfig, Flags, Vec2};
//! use std::time::Duration;
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let id = engine
//!     .insert_agent(AgentOptions {
//!         position: Vec2::new(10.0, 10.0),
//!         target_velocity: Vec2::new(1.0, 0.0),
//!         max_velocity: 1.0,
//!         max_acceleration: 10.0,
//!         max_angular_velocity: 1.0,
//!         radius: 0.5,
//!         flags: Flags::SIZE_SMALL,
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//! engine.tick(Duration::from_millis(100));
//! assert!(engine.agent(id).unwrap().position.x > 10.0);
//! ```

pub mod bvh;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod filter;
pub mod flags;
pub mod geometry;
pub mod kinematics;
pub mod util;

pub use config::EngineConfig;
pub use engine::Engine;
pub use entity::{
    Agent, AgentOptions, AgentSnapshot, EntityId, Feature, FeatureOptions, FeatureSnapshot,
};
pub use error::Error;
pub use flags::Flags;
pub use util::aabb::Aabb;
pub use util::heading::Heading;
pub use util::vec2::Vec2;
