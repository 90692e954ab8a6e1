//! Engine façade and per-tick pipeline
//!
//! Owns all entity storage and both spatial indexes behind one
//! reader/writer lock. `tick` holds the write side for its whole
//! duration: a parallel generate phase computes each agent's realized
//! velocity and heading from an immutable view of the world, then a
//! serial apply phase writes the results back, integrates positions, and
//! refreshes the agent index (the index does not support concurrent
//! mutation).

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::bvh::Bvh;
use crate::config::EngineConfig;
use crate::entity::{
    Agent, AgentOptions, AgentSnapshot, EntityId, Feature, FeatureOptions, FeatureSnapshot,
};
use crate::error::Error;
use crate::filter;
use crate::kinematics;
use crate::util::aabb::Aabb;
use crate::util::heading::Heading;
use crate::util::vec2::Vec2;

/// Realized output for one mobile entity, produced by the generate phase
struct TickOutput {
    id: EntityId,
    projectile: bool,
    velocity: Vec2,
    heading: Heading,
}

struct World {
    agents: HashMap<EntityId, Agent>,
    projectiles: HashMap<EntityId, Agent>,
    features: HashMap<EntityId, Feature>,
    agent_index: Bvh,
    feature_index: Bvh,
    counter: EntityId,
}

impl World {
    fn next_id(&mut self) -> EntityId {
        let id = self.counter;
        self.counter += 1;
        id
    }

    /// Post-broad-phase lookup. A missing entry means the index and the
    /// store disagree, which is an engine bug, not a user error.
    fn agent(&self, id: EntityId) -> &Agent {
        self.agents
            .get(&id)
            .unwrap_or_else(|| panic!("agent {id} indexed but not stored"))
    }

    fn feature(&self, id: EntityId) -> &Feature {
        self.features
            .get(&id)
            .unwrap_or_else(|| panic!("feature {id} indexed but not stored"))
    }
}

/// Collision-resolution engine over one independent world.
///
/// The engine is a value; multiple worlds may coexist. All methods take
/// `&self` and synchronize internally, so an `Engine` can be shared
/// across threads directly.
pub struct Engine {
    world: RwLock<World>,
    pool: rayon::ThreadPool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.pool_size)
            .build()?;
        Ok(Self {
            world: RwLock::new(World {
                agents: HashMap::with_capacity(1024),
                projectiles: HashMap::with_capacity(1024),
                features: HashMap::with_capacity(1024),
                agent_index: Bvh::new(config.leaf_size, config.tolerance),
                feature_index: Bvh::new(config.leaf_size, 1.0),
                counter: 0,
            }),
            pool,
        })
    }

    /// Insert a mobile agent and index it for collision.
    ///
    /// Fails with [`Error::InvalidFlags`] when the flag combination is
    /// invalid or carries the projectile size class (use
    /// [`Engine::insert_projectile`] for those).
    pub fn insert_agent(&self, o: AgentOptions) -> Result<EntityId, Error> {
        if !o.flags.validate() || o.flags.is_projectile() {
            return Err(Error::InvalidFlags(o.flags));
        }
        let mut world = self.world.write();
        let id = world.next_id();
        let agent = Agent::new(id, o);
        world
            .agent_index
            .insert(id, agent.bounds())
            .unwrap_or_else(|e| panic!("cannot insert agent: {e}"));
        world.agents.insert(id, agent);
        debug!("inserted agent {id}");
        Ok(id)
    }

    /// Insert a projectile: indexed nowhere, ignored by every collision
    /// filter, moved by its target velocity alone.
    pub fn insert_projectile(&self, o: AgentOptions) -> Result<EntityId, Error> {
        if !o.flags.validate() || !o.flags.is_projectile() {
            return Err(Error::InvalidFlags(o.flags));
        }
        let mut world = self.world.write();
        let id = world.next_id();
        world.projectiles.insert(id, Agent::new(id, o));
        debug!("inserted projectile {id}");
        Ok(id)
    }

    /// Insert a static feature and index it for collision
    pub fn insert_feature(&self, o: FeatureOptions) -> Result<EntityId, Error> {
        if !o.flags.validate() {
            return Err(Error::InvalidFlags(o.flags));
        }
        let mut world = self.world.write();
        let id = world.next_id();
        let feature = Feature::new(id, o);
        world
            .feature_index
            .insert(id, feature.aabb())
            .unwrap_or_else(|e| panic!("cannot insert feature: {e}"));
        world.features.insert(id, feature);
        debug!("inserted feature {id}");
        Ok(id)
    }

    /// Remove any entity kind by id
    pub fn delete(&self, id: EntityId) -> Result<(), Error> {
        let mut world = self.world.write();
        if world.agents.remove(&id).is_some() {
            world
                .agent_index
                .remove(id)
                .unwrap_or_else(|e| panic!("cannot delete agent: {e}"));
        } else if world.projectiles.remove(&id).is_none() {
            if world.features.remove(&id).is_some() {
                world
                    .feature_index
                    .remove(id)
                    .unwrap_or_else(|e| panic!("cannot delete feature: {e}"));
            } else {
                return Err(Error::NotFound(id));
            }
        }
        debug!("deleted entity {id}");
        Ok(())
    }

    /// Snapshot of an agent or projectile
    pub fn agent(&self, id: EntityId) -> Result<AgentSnapshot, Error> {
        let world = self.world.read();
        world
            .agents
            .get(&id)
            .or_else(|| world.projectiles.get(&id))
            .map(Agent::snapshot)
            .ok_or(Error::NotFound(id))
    }

    /// Snapshot of a feature
    pub fn feature(&self, id: EntityId) -> Result<FeatureSnapshot, Error> {
        let world = self.world.read();
        world
            .features
            .get(&id)
            .map(Feature::snapshot)
            .ok_or(Error::NotFound(id))
    }

    /// Agents whose indexed bounds intersect `bounds` and pass `filter`.
    /// Projectiles are never indexed and never returned.
    pub fn query<F>(&self, bounds: &Aabb, filter: F) -> Vec<EntityId>
    where
        F: Fn(&Agent) -> bool,
    {
        let world = self.world.read();
        world
            .agent_index
            .broad_phase(bounds)
            .into_iter()
            .filter(|&id| filter(world.agent(id)))
            .collect()
    }

    /// Features whose bounds intersect `bounds` and pass `filter`
    pub fn query_features<F>(&self, bounds: &Aabb, filter: F) -> Vec<EntityId>
    where
        F: Fn(&Feature) -> bool,
    {
        let world = self.world.read();
        world
            .feature_index
            .broad_phase(bounds)
            .into_iter()
            .filter(|&id| filter(world.feature(id)))
            .collect()
    }

    /// Teleport an agent or projectile, refreshing its index entry.
    /// Normal movement should go through [`Engine::tick`] instead.
    pub fn set_position(&self, id: EntityId, p: Vec2) -> Result<(), Error> {
        let mut world = self.world.write();
        let world = &mut *world;
        if let Some(agent) = world.agents.get_mut(&id) {
            agent.set_position(p);
            world
                .agent_index
                .update(id, agent.bounds())
                .unwrap_or_else(|e| panic!("cannot move agent: {e}"));
            return Ok(());
        }
        if let Some(projectile) = world.projectiles.get_mut(&id) {
            projectile.set_position(p);
            return Ok(());
        }
        Err(Error::NotFound(id))
    }

    /// Update the controller-supplied desired velocity. No index entry
    /// changes; the next tick consumes the new target.
    pub fn set_target_velocity(&self, id: EntityId, v: Vec2) -> Result<(), Error> {
        let mut world = self.world.write();
        let world = &mut *world;
        if let Some(agent) = world.agents.get_mut(&id) {
            agent.set_target_velocity(v);
            return Ok(());
        }
        if let Some(projectile) = world.projectiles.get_mut(&id) {
            projectile.set_target_velocity(v);
            return Ok(());
        }
        Err(Error::NotFound(id))
    }

    /// Advance the world by one tick of `d`.
    ///
    /// Every agent's realized velocity and heading are generated in
    /// parallel from the state at tick start, so output for a single
    /// agent does not depend on the order agents are visited. All side
    /// effects are visible to every read that starts after this returns.
    pub fn tick(&self, d: Duration) {
        let dt = d.as_secs_f64();
        let started = Instant::now();
        let mut world = self.world.write();

        // Generate: fan agents out across the pool; workers only read
        let world_ref = &*world;
        let mut outputs: Vec<TickOutput> = self.pool.install(|| {
            world_ref
                .agents
                .par_iter()
                .map(|(_, a)| resolve(world_ref, a, dt))
                .collect()
        });
        // Projectiles bypass resolution: realized velocity is the target
        outputs.extend(world_ref.projectiles.values().map(|p| TickOutput {
            id: p.id(),
            projectile: true,
            velocity: p.target_velocity(),
            heading: p.heading(),
        }));

        // Apply: write back and integrate serially
        let world = &mut *world;
        for out in &outputs {
            let store = if out.projectile {
                &mut world.projectiles
            } else {
                &mut world.agents
            };
            let agent = store
                .get_mut(&out.id)
                .unwrap_or_else(|| panic!("tick output for unknown agent {}", out.id));
            agent.apply(out.velocity, out.heading, dt);
        }

        // The index does not support concurrent mutation; refresh serially
        for (&id, agent) in &world.agents {
            world
                .agent_index
                .update(id, agent.bounds())
                .unwrap_or_else(|e| panic!("cannot refresh agent index: {e}"));
        }

        trace!(
            agents = world.agents.len(),
            projectiles = world.projectiles.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "tick"
        );
    }
}

/// Resolve one agent's realized velocity and heading for this tick.
///
/// Broad-phase candidates are narrowed by the squish and feature filters,
/// then the candidate velocity runs through the soft normal projections,
/// the kinematic limits, and finally the strict passes that force a full
/// stop whenever the clamped velocity still points into a neighbor.
fn resolve(world: &World, a: &Agent, dt: f64) -> TickOutput {
    let mut v = a.target_velocity();
    let bounds = a.bounds();

    let mut neighbors: SmallVec<[EntityId; 16]> = world
        .agent_index
        .broad_phase(&bounds)
        .into_iter()
        .filter(|&id| filter::squish_collides(a, world.agent(id)))
        .collect();
    let mut blockers: SmallVec<[EntityId; 8]> = world
        .feature_index
        .broad_phase(&bounds)
        .into_iter()
        .filter(|&id| filter::feature_blocks(a, world.feature(id)))
        .collect();
    // Fixed visit order keeps the output independent of tree layout and
    // worker count
    neighbors.sort_unstable();
    blockers.sort_unstable();

    for &id in &blockers {
        kinematics::set_feature_collision_velocity(a, world.feature(id), &mut v);
    }
    for &id in &neighbors {
        kinematics::set_collision_velocity(a, world.agent(id), &mut v);
    }

    kinematics::clamp_velocity(a, &mut v);
    kinematics::clamp_acceleration(a, &mut v, dt);
    let mut heading = a.heading();
    kinematics::clamp_heading(a, dt, &mut v, &mut heading);

    // Second pass: the clamps above may have pushed the velocity back
    // into a forbidden half-space; stop outright if so
    for &id in &blockers {
        kinematics::set_feature_collision_velocity_strict(a, world.feature(id), &mut v);
    }
    for &id in &neighbors {
        kinematics::set_collision_velocity_strict(a, world.agent(id), &mut v);
    }

    TickOutput {
        id: a.id(),
        projectile: false,
        velocity: v,
        heading,
    }
}
