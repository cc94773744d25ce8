//! Chunk storage: fixed-size cubes of typed voxels
//!
//! A chunk owns three parallel flat buffers (type, color, visibility) over
//! S^3 voxels, a dirty flag, and a cached mesh. The cached mesh is valid
//! if and only if the chunk is not dirty; every mutation sets the dirty
//! flag so the next `generate_render_data` call rebuilds.

use crate::core::error::Error;
use crate::core::types::Result;
use crate::streaming::pool::BufferPool;
use crate::voxel::mesh::{self, ChunkMesh};
use crate::voxel::voxel::{Face, ALL_FACES_MASK};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Integer coordinate identifying a chunk in the world grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Convert a world position to the chunk coordinate containing it
    pub fn from_world_pos(pos: Vec3, chunk_size: u32) -> Self {
        let s = chunk_size as f32;
        Self {
            x: (pos.x / s).floor() as i32,
            y: (pos.y / s).floor() as i32,
            z: (pos.z / s).floor() as i32,
        }
    }

    /// World-space origin (minimum corner) of this chunk
    pub fn world_origin(&self, chunk_size: u32) -> Vec3 {
        let s = chunk_size as f32;
        Vec3::new(self.x as f32 * s, self.y as f32 * s, self.z as f32 * s)
    }

    /// World-space center of this chunk
    pub fn center(&self, chunk_size: u32) -> Vec3 {
        let s = chunk_size as f32;
        Vec3::new(
            (self.x as f32 + 0.5) * s,
            (self.y as f32 + 0.5) * s,
            (self.z as f32 + 0.5) * s,
        )
    }

    /// Coordinate shifted by a delta
    pub fn offset(&self, delta: IVec3) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            z: self.z + delta.z,
        }
    }
}

/// Borrowed references to the six face-adjacent neighbor chunks.
///
/// Absent entries are treated as air during visibility resolution, so a
/// chunk at the edge of the loaded world is fully exposed on that side.
#[derive(Default)]
pub struct ChunkNeighbors<'a> {
    pub front: Option<&'a Chunk>,
    pub back: Option<&'a Chunk>,
    pub top: Option<&'a Chunk>,
    pub bottom: Option<&'a Chunk>,
    pub right: Option<&'a Chunk>,
    pub left: Option<&'a Chunk>,
}

impl<'a> ChunkNeighbors<'a> {
    /// Neighbor chunk on the given face, if loaded
    pub fn get(&self, face: Face) -> Option<&'a Chunk> {
        match face {
            Face::Front => self.front,
            Face::Back => self.back,
            Face::Top => self.top,
            Face::Bottom => self.bottom,
            Face::Right => self.right,
            Face::Left => self.left,
        }
    }

    /// Set the neighbor chunk for the given face
    pub fn set(&mut self, face: Face, chunk: &'a Chunk) {
        match face {
            Face::Front => self.front = Some(chunk),
            Face::Back => self.back = Some(chunk),
            Face::Top => self.top = Some(chunk),
            Face::Bottom => self.bottom = Some(chunk),
            Face::Right => self.right = Some(chunk),
            Face::Left => self.left = Some(chunk),
        }
    }
}

/// Transport form of a chunk: coordinate, size, and the three flat buffers
/// as plain sequences
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkData {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub size: u32,
    pub types: Vec<u8>,
    pub colors: Vec<f32>,
    pub visibility: Vec<u8>,
}

/// A fixed-size cube of voxels, the unit of storage and streaming
pub struct Chunk {
    coord: ChunkCoord,
    size: u32,
    /// Voxel type per cell, 0 = air
    types: Vec<u8>,
    /// RGBA color per cell, 4 floats each
    colors: Vec<f32>,
    /// 6-bit face visibility mask per cell
    visibility: Vec<u8>,
    dirty: bool,
    mesh: Option<ChunkMesh>,
}

impl Chunk {
    /// Create a new air-filled chunk, fully exposed
    pub fn new(coord: ChunkCoord, size: u32) -> Self {
        let volume = (size * size * size) as usize;
        Self {
            coord,
            size,
            types: vec![0; volume],
            colors: vec![0.0; volume * 4],
            visibility: vec![ALL_FACES_MASK; volume],
            dirty: true,
            mesh: None,
        }
    }

    /// Adopt flat buffers produced by the generation executor.
    ///
    /// Visibility starts fully exposed; the owner is expected to run a
    /// visibility pass once neighbors are known.
    pub fn from_generated(
        coord: ChunkCoord,
        size: u32,
        types: Vec<u8>,
        colors: Vec<f32>,
    ) -> Result<Self> {
        let volume = (size * size * size) as usize;
        if types.len() != volume {
            return Err(Error::BufferSize {
                expected: volume,
                actual: types.len(),
            });
        }
        if colors.len() != volume * 4 {
            return Err(Error::BufferSize {
                expected: volume * 4,
                actual: colors.len(),
            });
        }
        Ok(Self {
            coord,
            size,
            types,
            colors,
            visibility: vec![ALL_FACES_MASK; volume],
            dirty: true,
            mesh: None,
        })
    }

    /// Chunk coordinate
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Side length in voxels
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether the cached mesh is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the chunk as mutated, invalidating the cached mesh
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Flat index of a local coordinate: `x + y*S + z*S*S`.
    ///
    /// This is the single linearization shared by writes, reads, the
    /// visibility pass, mesh extraction, and the generation scan order.
    pub fn voxel_index(&self, x: u32, y: u32, z: u32) -> usize {
        (x + y * self.size + z * self.size * self.size) as usize
    }

    fn in_bounds(&self, x: i32, y: i32, z: i32) -> bool {
        let s = self.size as i32;
        x >= 0 && x < s && y >= 0 && y < s && z >= 0 && z < s
    }

    /// Write a voxel's type and color.
    ///
    /// Rejects any out-of-range coordinate with `Error::OutOfBounds`; never
    /// clamps or silently drops. Leaves the visibility buffer untouched
    /// (run a visibility pass afterwards) and marks the chunk dirty.
    pub fn store_voxel(&mut self, x: i32, y: i32, z: i32, type_id: u8, color: [f32; 4]) -> Result<()> {
        if !self.in_bounds(x, y, z) {
            return Err(Error::OutOfBounds {
                x,
                y,
                z,
                size: self.size,
            });
        }
        let i = self.voxel_index(x as u32, y as u32, z as u32);
        self.types[i] = type_id;
        self.colors[i * 4..i * 4 + 4].copy_from_slice(&color);
        self.dirty = true;
        Ok(())
    }

    /// Voxel type at a local coordinate; 0 for air or out-of-range.
    ///
    /// Total on purpose: neighbor probing calls this with offsets of -1 and
    /// `size` and expects air rather than an error.
    pub fn voxel_type(&self, x: i32, y: i32, z: i32) -> u8 {
        if !self.in_bounds(x, y, z) {
            return 0;
        }
        self.types[self.voxel_index(x as u32, y as u32, z as u32)]
    }

    /// RGBA color at a local coordinate, if in bounds
    pub fn voxel_color(&self, x: i32, y: i32, z: i32) -> Option<[f32; 4]> {
        if !self.in_bounds(x, y, z) {
            return None;
        }
        let i = self.voxel_index(x as u32, y as u32, z as u32) * 4;
        Some([
            self.colors[i],
            self.colors[i + 1],
            self.colors[i + 2],
            self.colors[i + 3],
        ])
    }

    /// Visibility mask at a local coordinate; 0 for out-of-range
    pub fn visibility_mask(&self, x: i32, y: i32, z: i32) -> u8 {
        if !self.in_bounds(x, y, z) {
            return 0;
        }
        self.visibility[self.voxel_index(x as u32, y as u32, z as u32)]
    }

    /// Compute the visibility buffer against the given neighbors.
    ///
    /// For every voxel and face, the neighbor type resolves inside this
    /// chunk when the offset coordinate is local, through the neighbor
    /// chunk at the wrapped boundary coordinate when it is not, and to air
    /// when no neighbor chunk is loaded. A face bit is set when the
    /// resolved neighbor type is 0.
    pub fn compute_visibility(&self, neighbors: &ChunkNeighbors) -> Vec<u8> {
        let s = self.size as i32;
        let mut out = vec![0u8; self.types.len()];
        for z in 0..s {
            for y in 0..s {
                for x in 0..s {
                    let mut mask = 0u8;
                    for face in Face::ALL {
                        let o = face.offset();
                        let (nx, ny, nz) = (x + o.x, y + o.y, z + o.z);
                        let neighbor_type = if self.in_bounds(nx, ny, nz) {
                            self.voxel_type(nx, ny, nz)
                        } else {
                            match neighbors.get(face) {
                                Some(chunk) => chunk.voxel_type(
                                    nx.rem_euclid(s),
                                    ny.rem_euclid(s),
                                    nz.rem_euclid(s),
                                ),
                                None => 0,
                            }
                        };
                        if neighbor_type == 0 {
                            mask |= face.bit();
                        }
                    }
                    out[self.voxel_index(x as u32, y as u32, z as u32)] = mask;
                }
            }
        }
        out
    }

    /// Install a visibility buffer computed by `compute_visibility`
    pub fn apply_visibility(&mut self, visibility: Vec<u8>) {
        debug_assert_eq!(visibility.len(), self.types.len());
        self.visibility = visibility;
        self.dirty = true;
    }

    /// Recompute visibility in place against the given neighbors
    pub fn update_visibility(&mut self, neighbors: &ChunkNeighbors) {
        let visibility = self.compute_visibility(neighbors);
        self.apply_visibility(visibility);
    }

    /// True iff every voxel has a non-zero type.
    ///
    /// Full chunks act as occluders for chunk-level visibility; this is not
    /// a substitute for the per-voxel face masks.
    pub fn is_full(&self) -> bool {
        self.types.iter().all(|&t| t != 0)
    }

    /// True iff no voxel has a non-zero type
    pub fn is_empty(&self) -> bool {
        self.types.iter().all(|&t| t == 0)
    }

    /// Renderable mesh for this chunk.
    ///
    /// Cached: when the chunk is not dirty this returns the previous result
    /// unchanged in O(1), including a cached "no geometry" answer of `None`.
    /// A rebuild recycles the previous mesh's buffers through the pool.
    pub fn generate_render_data(&mut self, pool: &mut BufferPool) -> Option<&ChunkMesh> {
        if !self.dirty {
            return self.mesh.as_ref();
        }
        if let Some(old) = self.mesh.take() {
            old.recycle(pool);
        }
        self.mesh = mesh::build_mesh(self, pool);
        self.dirty = false;
        self.mesh.as_ref()
    }

    /// Return the cached mesh's buffers to the pool, dropping the cache.
    ///
    /// Called on eviction so a destroyed chunk's geometry is recycled.
    pub fn recycle_mesh(&mut self, pool: &mut BufferPool) {
        if let Some(old) = self.mesh.take() {
            old.recycle(pool);
        }
        self.dirty = true;
    }

    /// Copy into the transport form
    pub fn to_data(&self) -> ChunkData {
        ChunkData {
            x: self.coord.x,
            y: self.coord.y,
            z: self.coord.z,
            size: self.size,
            types: self.types.clone(),
            colors: self.colors.clone(),
            visibility: self.visibility.clone(),
        }
    }

    /// Reconstruct a chunk from its transport form
    pub fn from_data(data: ChunkData) -> Result<Self> {
        let volume = (data.size * data.size * data.size) as usize;
        if data.types.len() != volume {
            return Err(Error::BufferSize {
                expected: volume,
                actual: data.types.len(),
            });
        }
        if data.colors.len() != volume * 4 {
            return Err(Error::BufferSize {
                expected: volume * 4,
                actual: data.colors.len(),
            });
        }
        if data.visibility.len() != volume {
            return Err(Error::BufferSize {
                expected: volume,
                actual: data.visibility.len(),
            });
        }
        Ok(Self {
            coord: ChunkCoord::new(data.x, data.y, data.z),
            size: data.size,
            types: data.types,
            colors: data.colors,
            visibility: data.visibility,
            dirty: true,
            mesh: None,
        })
    }

    /// Encode the transport form as JSON
    pub fn to_transport_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_data()).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a chunk from its JSON transport form
    pub fn from_transport_json(json: &str) -> Result<Self> {
        let data: ChunkData =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_data(data)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("size", &self.size)
            .field("dirty", &self.dirty)
            .finish()
    }
}
