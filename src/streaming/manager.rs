//! Chunk streaming manager
//!
//! Decides which chunks must exist around the observer, dispatches missing
//! ones to the generation executor closest-first under a request budget,
//! integrates completed results under a separate budget, and evicts chunks
//! that fall out of range. The split budgets bound both the background work
//! started per tick and the main-loop integration work per tick.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use glam::Vec3;

use crate::generation::executor::{GenerationExecutor, GenerationResult};
use crate::streaming::pool::BufferPool;
use crate::voxel::chunk::{Chunk, ChunkCoord};
use crate::voxel::world::World;

/// Streaming manager configuration
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Chunks to keep loaded along each axis around the observer
    pub load_radius: i32,
    /// Minimum time between tick evaluations
    pub update_interval: Duration,
    /// Maximum generation requests dispatched per tick
    pub max_requests_per_tick: usize,
    /// Maximum completed results integrated per tick
    pub max_integrations_per_tick: usize,
    /// Concurrency cap inside the generation executor
    pub max_concurrent_generations: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_radius: 4,
            update_interval: Duration::from_millis(100),
            max_requests_per_tick: 8,
            max_integrations_per_tick: 4,
            max_concurrent_generations: 4,
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    /// False when the tick was skipped by the update cadence
    pub ran: bool,
    /// Chunks evicted for leaving the required set
    pub evicted: usize,
    /// Generation requests dispatched
    pub dispatched: usize,
    /// Completed results integrated into the world
    pub integrated: usize,
    /// Failed generation results retired this tick
    pub failed: usize,
}

/// The cube of chunk coordinates within `radius` of `center` on every axis
pub fn required_chunks(center: ChunkCoord, radius: i32) -> HashSet<ChunkCoord> {
    let mut required = HashSet::new();
    for x in center.x - radius..=center.x + radius {
        for y in center.y - radius..=center.y + radius {
            for z in center.z - radius..=center.z + radius {
                required.insert(ChunkCoord::new(x, y, z));
            }
        }
    }
    required
}

/// Orchestrates chunk loading around an observer.
///
/// Owns no chunk data; it mutates the world, tracks in-flight generation
/// keys to prevent duplicate dispatch, and drains the completion queue.
pub struct StreamingManager {
    config: StreamingConfig,
    executor: GenerationExecutor,
    /// Keys awaiting a generation result
    in_flight: HashSet<ChunkCoord>,
    /// Completed results not yet integrated, FIFO
    pending: VecDeque<GenerationResult>,
    last_update: Option<Instant>,
}

impl StreamingManager {
    /// Create a manager with the given configuration
    pub fn new(config: StreamingConfig) -> Self {
        debug_assert!(config.load_radius >= 0);
        debug_assert!(config.max_requests_per_tick >= 1);
        debug_assert!(config.max_integrations_per_tick >= 1);
        let executor = GenerationExecutor::new(config.max_concurrent_generations.max(1));
        Self {
            config,
            executor,
            in_flight: HashSet::new(),
            pending: VecDeque::new(),
            last_update: None,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Change the load radius at runtime
    pub fn set_load_radius(&mut self, radius: i32) {
        self.config.load_radius = radius;
    }

    /// Number of keys awaiting a generation result
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Completed results waiting for integration budget
    pub fn pending_results(&self) -> usize {
        self.pending.len()
    }

    /// Run one streaming tick for the given observer position.
    ///
    /// Skipped entirely (returns `ran: false`) when less than the configured
    /// interval has elapsed since the last evaluation.
    pub fn update(&mut self, world: &mut World, pool: &mut BufferPool, observer: Vec3) -> TickStats {
        if let Some(last) = self.last_update {
            if last.elapsed() < self.config.update_interval {
                return TickStats::default();
            }
        }
        self.last_update = Some(Instant::now());

        let mut stats = TickStats {
            ran: true,
            ..Default::default()
        };

        let chunk_size = world.chunk_size();
        let observer_chunk = ChunkCoord::from_world_pos(observer, chunk_size);
        let required = required_chunks(observer_chunk, self.config.load_radius);

        stats.evicted = self.evict(world, pool, &required);
        stats.dispatched = self.dispatch_missing(world, &required, observer);
        let (integrated, failed) = self.integrate(world);
        stats.integrated = integrated;
        stats.failed = failed;

        if stats.evicted + stats.dispatched + stats.integrated + stats.failed > 0 {
            log::debug!(
                "streaming tick: {} evicted, {} dispatched, {} integrated, {} failed, {} in flight",
                stats.evicted,
                stats.dispatched,
                stats.integrated,
                stats.failed,
                self.in_flight.len()
            );
        }
        stats
    }

    /// Remove loaded chunks outside the required set.
    ///
    /// Each eviction recycles the chunk's mesh buffers and re-runs the
    /// visibility pass at the vacated coordinate so remaining neighbors
    /// re-expose the faces the chunk was occluding.
    fn evict(&mut self, world: &mut World, pool: &mut BufferPool, required: &HashSet<ChunkCoord>) -> usize {
        let out_of_range: Vec<ChunkCoord> = world
            .loaded_coords()
            .copied()
            .filter(|coord| !required.contains(coord))
            .collect();
        let count = out_of_range.len();
        for coord in out_of_range {
            if let Some(mut chunk) = world.remove_chunk(coord) {
                chunk.recycle_mesh(pool);
            }
            world.update_visibility_for(coord);
        }
        count
    }

    /// Dispatch generation requests for missing required chunks,
    /// closest-first, up to the request budget
    fn dispatch_missing(
        &mut self,
        world: &World,
        required: &HashSet<ChunkCoord>,
        observer: Vec3,
    ) -> usize {
        let chunk_size = world.chunk_size();
        let mut missing: Vec<(ChunkCoord, f32)> = required
            .iter()
            .copied()
            .filter(|coord| world.get_chunk(*coord).is_none() && !self.in_flight.contains(coord))
            .map(|coord| (coord, coord.center(chunk_size).distance_squared(observer)))
            .collect();
        missing.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut dispatched = 0;
        for (coord, _) in missing.into_iter().take(self.config.max_requests_per_tick) {
            self.in_flight.insert(coord);
            self.executor.dispatch(world.generation_request(coord));
            dispatched += 1;
        }
        dispatched
    }

    /// Integrate completed results, FIFO, up to the integration budget.
    ///
    /// Returns (integrated, failed). Failed results retire their in-flight
    /// key so the chunk becomes re-dispatchable on a later tick. A result
    /// whose chunk has left the required set is still integrated; the next
    /// tick evicts it (accepted wasted work, not worth cancellation).
    fn integrate(&mut self, world: &mut World) -> (usize, usize) {
        while let Some(result) = self.executor.try_next() {
            self.pending.push_back(result);
        }

        let mut integrated = 0;
        let mut failed = 0;
        while integrated < self.config.max_integrations_per_tick {
            let Some(result) = self.pending.pop_front() else {
                break;
            };
            let coord = result.coord();
            self.in_flight.remove(&coord);
            match result {
                GenerationResult::Completed(generated) => {
                    match Chunk::from_generated(
                        coord,
                        world.chunk_size(),
                        generated.types,
                        generated.colors,
                    ) {
                        Ok(chunk) => {
                            world.set_chunk(chunk);
                            world.update_visibility_for(coord);
                            integrated += 1;
                        }
                        Err(e) => {
                            log::warn!("discarding malformed generation result for {coord:?}: {e}");
                            failed += 1;
                        }
                    }
                }
                GenerationResult::Failed { reason, .. } => {
                    log::warn!("generation failed for chunk {coord:?}: {reason}");
                    failed += 1;
                }
            }
        }
        (integrated, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::descriptor::GeneratorKind;
    use crate::voxel::world::WorldConfig;

    fn test_world(chunk_size: u32) -> World {
        World::new(WorldConfig {
            chunk_size,
            generator: GeneratorKind::SolidBelow {
                level: 0,
                material: 1,
            },
            seed: 1,
        })
    }

    fn immediate_config(radius: i32) -> StreamingConfig {
        StreamingConfig {
            load_radius: radius,
            update_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Tick until the world holds `expected` chunks, asserting the budgets
    /// hold on every tick. Panics after the deadline.
    fn tick_until_loaded(
        manager: &mut StreamingManager,
        world: &mut World,
        pool: &mut BufferPool,
        observer: Vec3,
        expected: usize,
    ) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while world.chunk_count() < expected {
            assert!(Instant::now() < deadline, "streaming did not settle in time");
            let stats = manager.update(world, pool, observer);
            assert!(stats.dispatched <= manager.config().max_requests_per_tick);
            assert!(stats.integrated <= manager.config().max_integrations_per_tick);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_required_chunks_radius_one_is_27() {
        let required = required_chunks(ChunkCoord::new(0, 0, 0), 1);
        assert_eq!(required.len(), 27);
        for x in -1..=1 {
            for y in -1..=1 {
                for z in -1..=1 {
                    assert!(required.contains(&ChunkCoord::new(x, y, z)));
                }
            }
        }
    }

    #[test]
    fn test_required_chunks_radius_zero() {
        let required = required_chunks(ChunkCoord::new(3, -2, 1), 0);
        assert_eq!(required.len(), 1);
        assert!(required.contains(&ChunkCoord::new(3, -2, 1)));
    }

    #[test]
    fn test_streams_in_required_set() {
        let mut world = test_world(4);
        let mut pool = BufferPool::default();
        let mut manager = StreamingManager::new(immediate_config(1));
        let observer = Vec3::new(2.0, 2.0, 2.0);

        tick_until_loaded(&mut manager, &mut world, &mut pool, observer, 27);

        assert_eq!(world.chunk_count(), 27);
        assert_eq!(manager.in_flight_count(), 0);
        for coord in required_chunks(ChunkCoord::new(0, 0, 0), 1) {
            assert!(world.get_chunk(coord).is_some());
        }
    }

    #[test]
    fn test_first_tick_respects_request_budget() {
        let mut world = test_world(4);
        let mut pool = BufferPool::default();
        let mut manager = StreamingManager::new(immediate_config(1));

        let stats = manager.update(&mut world, &mut pool, Vec3::ZERO);
        assert!(stats.ran);
        assert_eq!(stats.dispatched, manager.config().max_requests_per_tick);
        // Anything not yet integrated within this tick is still in flight
        assert_eq!(manager.in_flight_count() + stats.integrated, stats.dispatched);
    }

    #[test]
    fn test_no_duplicate_dispatch() {
        let mut world = test_world(4);
        let mut pool = BufferPool::default();
        let mut manager = StreamingManager::new(StreamingConfig {
            load_radius: 1,
            update_interval: Duration::ZERO,
            max_requests_per_tick: 100,
            ..Default::default()
        });

        let first = manager.update(&mut world, &mut pool, Vec3::ZERO);
        assert_eq!(first.dispatched, 27);
        // Everything is in flight now; an immediate second tick finds
        // nothing new to request
        let second = manager.update(&mut world, &mut pool, Vec3::ZERO);
        assert_eq!(second.dispatched, 0);
    }

    #[test]
    fn test_closest_chunks_dispatch_first() {
        let mut world = test_world(4);
        let mut pool = BufferPool::default();
        let mut manager = StreamingManager::new(StreamingConfig {
            load_radius: 2,
            update_interval: Duration::ZERO,
            max_requests_per_tick: 1,
            ..Default::default()
        });

        let observer = Vec3::new(2.0, 2.0, 2.0);
        let stats = manager.update(&mut world, &mut pool, observer);
        assert_eq!(stats.dispatched, 1);
        // The single dispatched request must be the observer's own chunk,
        // either still in flight or already integrated
        let own = ChunkCoord::new(0, 0, 0);
        assert!(manager.in_flight.contains(&own) || world.get_chunk(own).is_some());
    }

    #[test]
    fn test_eviction_spares_required_set() {
        let mut world = test_world(4);
        let mut pool = BufferPool::default();
        let mut manager = StreamingManager::new(immediate_config(1));
        let observer = Vec3::new(2.0, 2.0, 2.0);

        tick_until_loaded(&mut manager, &mut world, &mut pool, observer, 27);

        // Observer jumps far away; the old neighborhood must drain while
        // the new one fills, and no required chunk is ever evicted
        let far = Vec3::new(400.0, 2.0, 2.0);
        let far_chunk = ChunkCoord::from_world_pos(far, 4);
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            assert!(Instant::now() < deadline, "streaming did not settle in time");
            let _ = manager.update(&mut world, &mut pool, far);
            let required = required_chunks(far_chunk, 1);
            let loaded: Vec<ChunkCoord> = world.loaded_coords().copied().collect();
            let settled = loaded.len() == 27 && loaded.iter().all(|c| required.contains(c));
            if settled && manager.pending_results() == 0 && manager.in_flight_count() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_update_cadence_skips_ticks() {
        let mut world = test_world(4);
        let mut pool = BufferPool::default();
        let mut manager = StreamingManager::new(StreamingConfig {
            load_radius: 0,
            update_interval: Duration::from_secs(60),
            ..Default::default()
        });

        let first = manager.update(&mut world, &mut pool, Vec3::ZERO);
        assert!(first.ran);
        let second = manager.update(&mut world, &mut pool, Vec3::ZERO);
        assert!(!second.ran);
        assert_eq!(second.dispatched, 0);
    }

    #[test]
    fn test_integration_runs_visibility_pass() {
        // Observer inside the solid half-space: every loaded chunk is full,
        // so buried faces must come back occluded once neighbors arrive
        let mut world = test_world(4);
        let mut pool = BufferPool::default();
        let mut manager = StreamingManager::new(immediate_config(1));
        let observer = Vec3::new(2.0, -30.0, 2.0);

        tick_until_loaded(&mut manager, &mut world, &mut pool, observer, 27);

        let center = ChunkCoord::from_world_pos(observer, 4);
        let chunk = world.get_chunk(center).expect("center chunk");
        assert!(chunk.is_full());
        // Interior voxel of the center chunk is buried on all six sides
        assert_eq!(chunk.visibility_mask(1, 1, 1), 0);
        assert!(world.chunk_occluded(center));
    }

    #[test]
    fn test_evicted_chunk_buffers_return_to_pool() {
        let mut world = test_world(4);
        let mut pool = BufferPool::default();
        let mut manager = StreamingManager::new(immediate_config(0));
        let observer = Vec3::new(2.0, -30.0, 2.0);

        tick_until_loaded(&mut manager, &mut world, &mut pool, observer, 1);

        // Mesh the loaded chunk so it holds pooled buffers
        let center = ChunkCoord::from_world_pos(observer, 4);
        let chunk = world.get_chunk_mut(center).expect("chunk");
        assert!(chunk.generate_render_data(&mut pool).is_some());
        assert_eq!(pool.idle_count(), 0);

        // Move away until the chunk is evicted
        let deadline = Instant::now() + Duration::from_secs(10);
        while world.get_chunk(center).is_some() {
            assert!(Instant::now() < deadline, "eviction did not happen in time");
            let _ = manager.update(&mut world, &mut pool, Vec3::new(500.0, -30.0, 2.0));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.idle_count(), 4);
    }
}
