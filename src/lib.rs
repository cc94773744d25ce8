//! Voxstream - streaming voxel world core
//!
//! Stores a sparse, effectively infinite voxel world as fixed-size chunks,
//! generates chunk contents off the critical path, extracts renderable
//! meshes from visible faces, and bounds memory through buffer recycling.

pub mod core;
pub mod voxel;
pub mod generation;
pub mod streaming;

pub use crate::core::error::Error;
pub use crate::core::types::Result;
pub use crate::voxel::{Chunk, ChunkCoord, ChunkMesh, World, WorldConfig};
pub use crate::generation::{GenerationExecutor, GenerationRequest, GenerationResult, GeneratorKind};
pub use crate::streaming::{BufferPool, PoolConfig, StreamingConfig, StreamingManager, TickStats};
