//! Voxel data structures and operations

pub mod voxel;
pub mod chunk;
pub mod mesh;
pub mod world;

pub use voxel::{Face, ALL_FACES_MASK, DEFAULT_COLOR};
pub use chunk::{Chunk, ChunkCoord, ChunkData, ChunkNeighbors};
pub use mesh::ChunkMesh;
pub use world::{World, WorldConfig};
