//! Chunk streaming: required-set scheduling, budgets, and buffer recycling

pub mod manager;
pub mod pool;

pub use manager::{required_chunks, StreamingConfig, StreamingManager, TickStats};
pub use pool::{BufferPool, PoolConfig, PoolStats, SIZE_CLASSES};
