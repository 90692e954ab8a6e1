use thiserror::Error;

use crate::entity::EntityId;
use crate::flags::Flags;

/// Recoverable engine errors returned to the caller.
///
/// Structural faults inside the spatial index (double insert, missing
/// leaf) are engine invariants, not user errors; those abort the process
/// instead of surfacing here.
#[derive(Debug, Error)]
pub enum Error {
    /// Flag validation failed at insertion
    #[error("invalid flag combination {0}")]
    InvalidFlags(Flags),

    /// An operation addressed an id that does not exist
    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// Construction with fewer than the minimum of two workers
    #[error("pool size {0} is below the minimum of 2")]
    PoolTooSmall(usize),

    /// The worker pool could not be created
    #[error("worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
