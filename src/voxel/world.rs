//! World container: sparse chunk store with voxel-level access
//!
//! The world exclusively owns all live chunks, keyed by chunk coordinate.
//! Voxel-level reads treat missing chunks as air; voxel-level writes to a
//! missing chunk are a documented no-op (see `set_voxel`).

use std::collections::HashMap;

use crate::generation::descriptor::GeneratorKind;
use crate::generation::executor::GenerationRequest;
use crate::voxel::chunk::{Chunk, ChunkCoord, ChunkNeighbors};
use crate::voxel::voxel::{Face, DEFAULT_COLOR};
use glam::IVec3;

/// World construction options
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Chunk side length in voxels, must be > 0
    pub chunk_size: u32,
    /// Generator descriptor evaluated per voxel inside the generation executor
    pub generator: GeneratorKind,
    /// Noise seed shared with the generation executor
    pub seed: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            generator: GeneratorKind::default(),
            seed: 0,
        }
    }
}

/// Sparse mapping from chunk coordinates to chunks
pub struct World {
    chunk_size: u32,
    chunks: HashMap<ChunkCoord, Chunk>,
    generator: GeneratorKind,
    seed: u32,
}

impl World {
    /// Create an empty world
    pub fn new(config: WorldConfig) -> Self {
        debug_assert!(config.chunk_size > 0);
        Self {
            chunk_size: config.chunk_size,
            chunks: HashMap::new(),
            generator: config.generator,
            seed: config.seed,
        }
    }

    /// Chunk side length in voxels
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// World seed
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Generator descriptor
    pub fn generator(&self) -> &GeneratorKind {
        &self.generator
    }

    /// Immutable reference to a chunk, if loaded
    pub fn get_chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Mutable reference to a chunk, if loaded
    pub fn get_chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Insert a chunk at its own coordinate.
    ///
    /// An existing chunk at the same key is discarded, not merged.
    pub fn set_chunk(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.coord(), chunk);
    }

    /// Remove a chunk, returning it so its buffers can be recycled
    pub fn remove_chunk(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.chunks.remove(&coord)
    }

    /// Number of loaded chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Iterator over all loaded chunk coordinates
    pub fn loaded_coords(&self) -> impl Iterator<Item = &ChunkCoord> {
        self.chunks.keys()
    }

    /// Decompose a world voxel coordinate into chunk and local parts.
    ///
    /// Floor division for the chunk, non-negative remainder for the local
    /// coordinate, so negative world positions resolve correctly.
    pub fn split_world_pos(&self, wx: i32, wy: i32, wz: i32) -> (ChunkCoord, IVec3) {
        let s = self.chunk_size as i32;
        let coord = ChunkCoord::new(wx.div_euclid(s), wy.div_euclid(s), wz.div_euclid(s));
        let local = IVec3::new(wx.rem_euclid(s), wy.rem_euclid(s), wz.rem_euclid(s));
        (coord, local)
    }

    /// Voxel type at a world coordinate; air when the chunk is not loaded
    pub fn get_voxel(&self, wx: i32, wy: i32, wz: i32) -> u8 {
        let (coord, local) = self.split_world_pos(wx, wy, wz);
        match self.chunks.get(&coord) {
            Some(chunk) => chunk.voxel_type(local.x, local.y, local.z),
            None => 0,
        }
    }

    /// Write a voxel type at a world coordinate.
    ///
    /// Returns false without touching anything when the owning chunk is not
    /// loaded. This is deliberate: the chunk has not streamed in yet, and
    /// auto-creating it here would bypass the streaming budgets. On success
    /// the owning chunk and its neighbors get a visibility pass.
    pub fn set_voxel(&mut self, wx: i32, wy: i32, wz: i32, type_id: u8) -> bool {
        let (coord, local) = self.split_world_pos(wx, wy, wz);
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            log::trace!("voxel write at ({wx}, {wy}, {wz}) dropped: chunk {coord:?} not loaded");
            return false;
        };
        // Local coordinates are in [0, size) by construction
        if chunk
            .store_voxel(local.x, local.y, local.z, type_id, DEFAULT_COLOR)
            .is_err()
        {
            return false;
        }
        self.update_visibility_for(coord);
        true
    }

    /// Recompute visibility for the chunk at `coord` and its six
    /// face-adjacent neighbors.
    ///
    /// Bounds the cost of a single edit, arrival, or removal to 7 chunks.
    /// Works on removals too: pass the former coordinate and the remaining
    /// neighbors re-expose the faces the departed chunk was occluding.
    pub fn update_visibility_for(&mut self, coord: ChunkCoord) {
        let mut targets = [coord; 7];
        for (i, face) in Face::ALL.iter().enumerate() {
            targets[i + 1] = coord.offset(face.offset());
        }
        for target in targets {
            let Some(chunk) = self.chunks.get(&target) else {
                continue;
            };
            let visibility = chunk.compute_visibility(&self.neighbors_of(target));
            if let Some(chunk) = self.chunks.get_mut(&target) {
                chunk.apply_visibility(visibility);
            }
        }
    }

    /// True when all six neighbors of `coord` are loaded and full.
    ///
    /// Full chunks are occluders: a chunk surrounded by them cannot expose
    /// any face and may be skipped by the renderer entirely.
    pub fn chunk_occluded(&self, coord: ChunkCoord) -> bool {
        Face::ALL.iter().all(|face| {
            self.chunks
                .get(&coord.offset(face.offset()))
                .is_some_and(Chunk::is_full)
        })
    }

    /// Generation request for a chunk of this world
    pub fn generation_request(&self, coord: ChunkCoord) -> GenerationRequest {
        GenerationRequest {
            coord,
            chunk_size: self.chunk_size,
            seed: self.seed,
            generator: self.generator.clone(),
        }
    }

    fn neighbors_of(&self, coord: ChunkCoord) -> ChunkNeighbors<'_> {
        let mut neighbors = ChunkNeighbors::default();
        for face in Face::ALL {
            if let Some(chunk) = self.chunks.get(&coord.offset(face.offset())) {
                neighbors.set(face, chunk);
            }
        }
        neighbors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::executor::generate_chunk;

    fn solid_chunk(coord: ChunkCoord, size: u32) -> Chunk {
        let mut chunk = Chunk::new(coord, size);
        for z in 0..size as i32 {
            for y in 0..size as i32 {
                for x in 0..size as i32 {
                    chunk.store_voxel(x, y, z, 1, DEFAULT_COLOR).expect("write");
                }
            }
        }
        chunk
    }

    #[test]
    fn test_get_voxel_missing_chunk_is_air() {
        let world = World::new(WorldConfig::default());
        assert_eq!(world.get_voxel(0, 0, 0), 0);
        assert_eq!(world.get_voxel(-100, 50, 3), 0);
    }

    #[test]
    fn test_set_voxel_missing_chunk_is_noop() {
        let mut world = World::new(WorldConfig::default());
        assert!(!world.set_voxel(5, 5, 5, 1));
        // The write must not conjure a chunk into existence
        assert_eq!(world.chunk_count(), 0);
        assert_eq!(world.get_voxel(5, 5, 5), 0);
    }

    #[test]
    fn test_set_voxel_roundtrip() {
        let mut world = World::new(WorldConfig::default());
        world.set_chunk(Chunk::new(ChunkCoord::new(0, 0, 0), 16));
        world.set_chunk(Chunk::new(ChunkCoord::new(-1, -1, -1), 16));

        assert!(world.set_voxel(3, 4, 5, 9));
        assert_eq!(world.get_voxel(3, 4, 5), 9);

        // Negative world coordinates land in the (-1,-1,-1) chunk
        assert!(world.set_voxel(-1, -16, -7, 2));
        assert_eq!(world.get_voxel(-1, -16, -7), 2);
    }

    #[test]
    fn test_split_world_pos_negative() {
        let world = World::new(WorldConfig::default());
        let (coord, local) = world.split_world_pos(-1, -16, -17);
        assert_eq!(coord, ChunkCoord::new(-1, -1, -2));
        assert_eq!(local, IVec3::new(15, 0, 15));
    }

    #[test]
    fn test_set_chunk_overwrites() {
        let mut world = World::new(WorldConfig::default());
        let coord = ChunkCoord::new(1, 2, 3);
        world.set_chunk(solid_chunk(coord, 16));
        world.set_chunk(Chunk::new(coord, 16));

        assert_eq!(world.chunk_count(), 1);
        let chunk = world.get_chunk(coord).expect("chunk");
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_removal_re_exposes_neighbor_faces() {
        let size = 4;
        let mut world = World::new(WorldConfig {
            chunk_size: size,
            ..Default::default()
        });
        let a = ChunkCoord::new(0, 0, 0);
        let b = ChunkCoord::new(1, 0, 0);
        world.set_chunk(solid_chunk(a, size));
        world.set_chunk(solid_chunk(b, size));
        world.update_visibility_for(a);

        // Boundary face of a toward b is occluded while b exists
        let edge = size as i32 - 1;
        let mask = world.get_chunk(a).expect("a").visibility_mask(edge, 0, 0);
        assert_eq!(mask & Face::Right.bit(), 0);

        world.remove_chunk(b);
        world.update_visibility_for(b);

        let mask = world.get_chunk(a).expect("a").visibility_mask(edge, 0, 0);
        assert_eq!(mask & Face::Right.bit(), Face::Right.bit());
    }

    #[test]
    fn test_chunk_occluded_requires_six_full_neighbors() {
        let size = 2;
        let mut world = World::new(WorldConfig {
            chunk_size: size,
            ..Default::default()
        });
        let center = ChunkCoord::new(0, 0, 0);
        world.set_chunk(Chunk::new(center, size));
        assert!(!world.chunk_occluded(center));

        for face in Face::ALL {
            world.set_chunk(solid_chunk(center.offset(face.offset()), size));
        }
        assert!(world.chunk_occluded(center));

        // A not-quite-full neighbor stops occluding
        let above = center.offset(Face::Top.offset());
        let chunk = world.get_chunk_mut(above).expect("above");
        chunk.store_voxel(0, 0, 0, 0, DEFAULT_COLOR).expect("write");
        assert!(!world.chunk_occluded(center));
    }

    #[test]
    fn test_solid_below_scenario() {
        // Generator: solid below y=0, air above, chunk size 4
        let size = 4;
        let mut world = World::new(WorldConfig {
            chunk_size: size,
            generator: GeneratorKind::SolidBelow {
                level: 0,
                material: 1,
            },
            seed: 7,
        });

        for coord in [ChunkCoord::new(0, -1, 0), ChunkCoord::new(0, 0, 0)] {
            let generated = generate_chunk(&world.generation_request(coord));
            let chunk = Chunk::from_generated(coord, size, generated.types, generated.colors)
                .expect("adopt");
            world.set_chunk(chunk);
        }

        let below = world.get_chunk(ChunkCoord::new(0, -1, 0)).expect("below");
        assert!(below.is_full());
        let surface = world.get_chunk(ChunkCoord::new(0, 0, 0)).expect("surface");
        assert!(surface.is_empty());

        world.update_visibility_for(ChunkCoord::new(0, 0, 0));

        let surface = world.get_chunk(ChunkCoord::new(0, 0, 0)).expect("surface");
        for x in 0..size as i32 {
            for z in 0..size as i32 {
                // Bottom layer: the solid chunk below occludes the bottom face
                let mask = surface.visibility_mask(x, 0, z);
                assert_eq!(mask & Face::Bottom.bit(), 0);
                // Top layer: nothing above, fully exposed
                let mask = surface.visibility_mask(x, size as i32 - 1, z);
                assert_eq!(mask & Face::Top.bit(), Face::Top.bit());
            }
        }
    }
}
