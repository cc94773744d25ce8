//! Size-classed buffer pool for mesh geometry
//!
//! Recycles the flat float buffers backing generated render geometry to
//! bound allocation churn. Buffers are handed out by value: ownership is
//! the in-use marker, so the same buffer can never be lent to two callers
//! at once. Capacity is a hint; a pooled `Vec` still grows if a mesh
//! overruns its size class.

use std::time::{Duration, Instant};

/// Size classes in number of f32 elements, smallest to largest
pub const SIZE_CLASSES: [usize; 5] = [256, 1024, 4096, 16384, 65536];

/// Buffer pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Memory ceiling across pooled and leased buffers (bytes)
    pub max_memory_bytes: usize,
    /// Idle buffers unused longer than this are dropped during cleanup
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024,
            idle_timeout: Duration::from_secs(5),
        }
    }
}

/// Counters for pool behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    /// Requests served by reusing an idle buffer
    pub hits: u64,
    /// Requests that fell through to a degraded temporary allocation
    pub misses: u64,
    /// Fresh allocations within the memory ceiling
    pub allocations: u64,
}

/// An idle buffer waiting in a size-class bin
struct IdleBuffer {
    data: Vec<f32>,
    last_used: Instant,
}

/// Size-classed recycler for flat f32 buffers
pub struct BufferPool {
    config: PoolConfig,
    /// Idle buffers per size class, parallel to SIZE_CLASSES
    bins: [Vec<IdleBuffer>; SIZE_CLASSES.len()],
    /// Bytes held in bins
    pooled_bytes: usize,
    /// Bytes currently handed out
    leased_bytes: usize,
    stats: PoolStats,
}

impl BufferPool {
    /// Create a pool with the given configuration
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            bins: Default::default(),
            pooled_bytes: 0,
            leased_bytes: 0,
            stats: PoolStats::default(),
        }
    }

    /// Smallest size class that fits `len`, if any
    fn class_index(len: usize) -> Option<usize> {
        SIZE_CLASSES.iter().position(|&c| c >= len)
    }

    /// Acquire a buffer with capacity for at least `len` floats.
    ///
    /// Reuses an idle buffer from the smallest fitting size class, allocates
    /// a fresh one while under the memory ceiling, and otherwise runs a
    /// cleanup pass before retrying. As a last resort returns a minimal
    /// temporary allocation (possibly undersized, the `Vec` will grow) with
    /// a diagnostic warning. Never fails.
    pub fn acquire(&mut self, len: usize) -> Vec<f32> {
        let Some(ci) = Self::class_index(len) else {
            // Larger than the largest class: not poolable, allocate directly
            log::trace!("buffer pool: oversize request for {len} floats");
            self.leased_bytes += len * 4;
            return Vec::with_capacity(len);
        };

        if let Some(buffer) = self.take_idle(ci) {
            return buffer;
        }

        let class_bytes = SIZE_CLASSES[ci] * 4;
        if self.in_budget(class_bytes) {
            return self.allocate(SIZE_CLASSES[ci]);
        }

        // Under memory pressure: drop stale idle buffers, then retry any
        // class large enough for the request
        self.cleanup();
        for upper in ci..SIZE_CLASSES.len() {
            if let Some(buffer) = self.take_idle(upper) {
                return buffer;
            }
        }
        if self.in_budget(class_bytes) {
            return self.allocate(SIZE_CLASSES[ci]);
        }

        self.stats.misses += 1;
        let fallback = len.min(SIZE_CLASSES[0]);
        log::warn!(
            "buffer pool exhausted ({} bytes pooled, {} leased): degrading to temporary buffer of {} floats",
            self.pooled_bytes,
            self.leased_bytes,
            fallback
        );
        Vec::with_capacity(fallback)
    }

    /// Return a buffer to the pool.
    ///
    /// The buffer is re-binned by its current capacity and stamped as
    /// recently used. Buffers smaller than the smallest class (degraded
    /// temporaries) are simply dropped.
    pub fn release(&mut self, buffer: Vec<f32>) {
        let bytes = buffer.capacity() * 4;
        self.leased_bytes = self.leased_bytes.saturating_sub(bytes);

        let Some(ci) = SIZE_CLASSES
            .iter()
            .rposition(|&c| c <= buffer.capacity())
        else {
            return;
        };
        let mut data = buffer;
        data.clear();
        self.pooled_bytes += bytes;
        self.bins[ci].push(IdleBuffer {
            data,
            last_used: Instant::now(),
        });
    }

    /// Drop idle buffers unused longer than the configured timeout.
    ///
    /// Returns the number of bytes freed.
    pub fn cleanup(&mut self) -> usize {
        let timeout = self.config.idle_timeout;
        let mut freed = 0;
        for bin in &mut self.bins {
            bin.retain(|idle| {
                if idle.last_used.elapsed() > timeout {
                    freed += idle.data.capacity() * 4;
                    false
                } else {
                    true
                }
            });
        }
        self.pooled_bytes = self.pooled_bytes.saturating_sub(freed);
        if freed > 0 {
            log::debug!("buffer pool cleanup freed {freed} bytes");
        }
        freed
    }

    /// Bytes held in idle bins
    pub fn pooled_bytes(&self) -> usize {
        self.pooled_bytes
    }

    /// Bytes currently handed out to callers
    pub fn leased_bytes(&self) -> usize {
        self.leased_bytes
    }

    /// Number of idle buffers across all bins
    pub fn idle_count(&self) -> usize {
        self.bins.iter().map(Vec::len).sum()
    }

    /// Hit/miss/allocation counters
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn take_idle(&mut self, ci: usize) -> Option<Vec<f32>> {
        let idle = self.bins[ci].pop()?;
        let bytes = idle.data.capacity() * 4;
        self.pooled_bytes = self.pooled_bytes.saturating_sub(bytes);
        self.leased_bytes += bytes;
        self.stats.hits += 1;
        Some(idle.data)
    }

    fn in_budget(&self, extra_bytes: usize) -> bool {
        self.pooled_bytes + self.leased_bytes + extra_bytes <= self.config.max_memory_bytes
    }

    fn allocate(&mut self, capacity: usize) -> Vec<f32> {
        self.stats.allocations += 1;
        self.leased_bytes += capacity * 4;
        Vec::with_capacity(capacity)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
