//! Entity records
//!
//! Three closed kinds share one id namespace: mobile circular agents,
//! projectiles (agents excluded from indexing and collision), and static
//! rectangular features. The engine owns every record; callers receive
//! owned snapshots.

use serde::{Deserialize, Serialize};

use crate::flags::Flags;
use crate::util::aabb::Aabb;
use crate::util::heading::Heading;
use crate::util::vec2::Vec2;

/// Stable identifier shared by agents, projectiles, and features
pub type EntityId = u64;

/// Constructor options for an agent or projectile. All values are in SI
/// units: world units, seconds, radians.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentOptions {
    pub position: Vec2,
    /// Realized velocity the agent starts with (used for acceleration clamping)
    pub velocity: Vec2,
    /// Desired velocity supplied by the controller
    pub target_velocity: Vec2,
    pub heading: Heading,
    pub radius: f64,
    pub max_velocity: f64,
    pub max_acceleration: f64,
    pub max_angular_velocity: f64,
    pub flags: Flags,
}

/// Mobile circular body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    // Hot fields, touched every tick
    position: Vec2,
    velocity: Vec2,
    target_velocity: Vec2,
    heading: Heading,
    radius: f64,

    // Kinematic limits, read-only after insertion
    max_velocity: f64,
    max_acceleration: f64,
    max_angular_velocity: f64,

    flags: Flags,
    id: EntityId,
}

impl Agent {
    /// Build an agent from validated options. Flag validation happens at
    /// the engine boundary before this is reached.
    pub(crate) fn new(id: EntityId, o: AgentOptions) -> Self {
        Self {
            position: o.position,
            velocity: o.velocity,
            target_velocity: o.target_velocity,
            heading: o.heading,
            radius: o.radius,
            max_velocity: o.max_velocity,
            max_acceleration: o.max_acceleration,
            max_angular_velocity: o.max_angular_velocity,
            flags: o.flags,
            id,
        }
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Realized velocity produced by the previous tick
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Controller-supplied desired velocity; never mutated by the tick
    #[inline]
    pub fn target_velocity(&self) -> Vec2 {
        self.target_velocity
    }

    #[inline]
    pub fn heading(&self) -> Heading {
        self.heading
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    #[inline]
    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
    }

    #[inline]
    pub fn max_angular_velocity(&self) -> f64 {
        self.max_angular_velocity
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[inline]
    pub fn is_projectile(&self) -> bool {
        self.flags.is_projectile()
    }

    /// Tight bounding box of the body circle
    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::around(self.position, self.radius)
    }

    pub(crate) fn set_position(&mut self, p: Vec2) {
        self.position = p;
    }

    pub(crate) fn set_target_velocity(&mut self, v: Vec2) {
        self.target_velocity = v;
    }

    /// Write back one tick's realized output and integrate the position
    pub(crate) fn apply(&mut self, velocity: Vec2, heading: Heading, dt: f64) {
        self.velocity = velocity;
        self.heading = heading;
        self.position += velocity * dt;
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            position: self.position,
            velocity: self.velocity,
            target_velocity: self.target_velocity,
            heading: self.heading,
            radius: self.radius,
            max_velocity: self.max_velocity,
            max_acceleration: self.max_acceleration,
            max_angular_velocity: self.max_angular_velocity,
            flags: self.flags,
        }
    }
}

/// Owned read-only copy of an agent's state
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub target_velocity: Vec2,
    pub heading: Heading,
    pub radius: f64,
    pub max_velocity: f64,
    pub max_acceleration: f64,
    pub max_angular_velocity: f64,
    pub flags: Flags,
}

/// Constructor options for a static feature
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureOptions {
    pub min: Vec2,
    pub max: Vec2,
    pub flags: Flags,
}

/// Static axis-aligned rectangular obstacle, immutable after insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    aabb: Aabb,
    flags: Flags,
    id: EntityId,
}

impl Feature {
    pub(crate) fn new(id: EntityId, o: FeatureOptions) -> Self {
        Self {
            aabb: Aabb::new(o.min, o.max),
            flags: o.flags,
            id,
        }
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn snapshot(&self) -> FeatureSnapshot {
        FeatureSnapshot {
            id: self.id,
            aabb: self.aabb,
            flags: self.flags,
        }
    }
}

/// Owned read-only copy of a feature's state
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub id: EntityId,
    pub aabb: Aabb,
    pub flags: Flags,
}
