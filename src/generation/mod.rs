//! Chunk content generation
//!
//! A serializable generator descriptor is evaluated per voxel inside an
//! asynchronous executor that shares no mutable state with the caller;
//! results come back as flat buffers ready for adoption into chunks.

pub mod descriptor;
pub mod executor;

pub use descriptor::GeneratorKind;
pub use executor::{
    generate_chunk, GeneratedChunk, GenerationExecutor, GenerationRequest, GenerationResult,
};
