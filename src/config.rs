use crate::bvh::{DEFAULT_LEAF_SIZE, DEFAULT_TOLERANCE};
use crate::error::Error;

/// Engine tuning parameters
///
/// The defaults are sized for a world of roughly a thousand mobile
/// agents; leaf size and fat-AABB tolerance trade broad-phase precision
/// against tree maintenance and depend on agent density and speed.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads for the parallel generate phase (minimum 2)
    pub pool_size: usize,
    /// Maximum entries per leaf in both spatial indexes
    pub leaf_size: usize,
    /// Fat-AABB dilation factor for the agent index (>= 1). The feature
    /// index always uses 1.0 since features never move.
    pub tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self {
            pool_size: cores.max(2),
            leaf_size: DEFAULT_LEAF_SIZE,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl EngineConfig {
    /// Validate configuration before engine construction
    pub fn validate(&self) -> Result<(), Error> {
        if self.pool_size < 2 {
            return Err(Error::PoolTooSmall(self.pool_size));
        }
        Ok(())
    }
}
