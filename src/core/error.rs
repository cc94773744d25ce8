//! Error types for the voxel core

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("voxel coordinate ({x}, {y}, {z}) out of bounds for chunk size {size}")]
    OutOfBounds { x: i32, y: i32, z: i32, size: u32 },

    #[error("buffer size mismatch: expected {expected} elements, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    #[error("generation error: {0}")]
    Generation(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
