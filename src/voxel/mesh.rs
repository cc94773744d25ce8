//! Mesh extraction: visible voxel faces to flat geometry buffers
//!
//! One quad (4 vertices, 2 triangles) per set visibility bit of every
//! solid voxel. Positions are emitted in world space; the renderer treats
//! the buffers as read-only until the owning chunk goes dirty again.

use crate::streaming::pool::BufferPool;
use crate::voxel::chunk::Chunk;
use crate::voxel::voxel::{Face, DEFAULT_COLOR, FACE_CORNERS, FACE_UVS, QUAD_INDICES};

/// Flat geometry buffers for one chunk
pub struct ChunkMesh {
    /// 3 floats per vertex
    pub positions: Vec<f32>,
    /// 3 floats per vertex
    pub normals: Vec<f32>,
    /// 2 floats per vertex
    pub uvs: Vec<f32>,
    /// 4 floats per vertex
    pub colors: Vec<f32>,
    /// 3 indices per triangle
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Whether the mesh carries no geometry
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Position buffer as raw bytes for GPU upload
    pub fn positions_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Normal buffer as raw bytes for GPU upload
    pub fn normals_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    /// UV buffer as raw bytes for GPU upload
    pub fn uvs_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uvs)
    }

    /// Color buffer as raw bytes for GPU upload
    pub fn colors_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    /// Index buffer as raw bytes for GPU upload
    pub fn indices_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Return the float buffers to the pool for reuse
    pub fn recycle(self, pool: &mut BufferPool) {
        pool.release(self.positions);
        pool.release(self.normals);
        pool.release(self.uvs);
        pool.release(self.colors);
        // Index buffers are not pooled
    }
}

/// Build the mesh for a chunk, or `None` when no voxel produces geometry.
///
/// Two passes: the first counts visible faces so the pooled buffers can be
/// acquired at the right size class, the second emits the quads. Scan order
/// matches `Chunk::voxel_index`.
pub fn build_mesh(chunk: &Chunk, pool: &mut BufferPool) -> Option<ChunkMesh> {
    let s = chunk.size() as i32;

    let mut faces = 0usize;
    for z in 0..s {
        for y in 0..s {
            for x in 0..s {
                if chunk.voxel_type(x, y, z) == 0 {
                    continue;
                }
                faces += chunk.visibility_mask(x, y, z).count_ones() as usize;
            }
        }
    }
    if faces == 0 {
        return None;
    }

    let origin = chunk.coord().world_origin(chunk.size());
    let mut positions = pool.acquire(faces * 12);
    let mut normals = pool.acquire(faces * 12);
    let mut uvs = pool.acquire(faces * 8);
    let mut colors = pool.acquire(faces * 16);
    let mut indices = Vec::with_capacity(faces * 6);

    for z in 0..s {
        for y in 0..s {
            for x in 0..s {
                if chunk.voxel_type(x, y, z) == 0 {
                    continue;
                }
                let mask = chunk.visibility_mask(x, y, z);
                if mask == 0 {
                    continue;
                }
                let color = chunk.voxel_color(x, y, z).unwrap_or(DEFAULT_COLOR);
                let base = [
                    origin.x + x as f32,
                    origin.y + y as f32,
                    origin.z + z as f32,
                ];
                for face in Face::ALL {
                    if mask & face.bit() == 0 {
                        continue;
                    }
                    let first = (positions.len() / 3) as u32;
                    let normal = face.normal();
                    for (ci, corner) in FACE_CORNERS[face.index()].iter().enumerate() {
                        positions.extend_from_slice(&[
                            base[0] + corner[0],
                            base[1] + corner[1],
                            base[2] + corner[2],
                        ]);
                        normals.extend_from_slice(&normal);
                        uvs.extend_from_slice(&FACE_UVS[ci]);
                        colors.extend_from_slice(&color);
                    }
                    indices.extend(QUAD_INDICES.iter().map(|&i| first + i));
                }
            }
        }
    }

    log::trace!(
        "meshed chunk {:?}: {} faces, {} vertices",
        chunk.coord(),
        faces,
        faces * 4
    );

    Some(ChunkMesh {
        positions,
        normals,
        uvs,
        colors,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::chunk::{ChunkCoord, ChunkNeighbors};

    fn lone_voxel_chunk(coord: ChunkCoord, size: u32) -> Chunk {
        let mut chunk = Chunk::new(coord, size);
        chunk
            .store_voxel(0, 0, 0, 1, [0.25, 0.5, 0.75, 1.0])
            .expect("write");
        chunk.update_visibility(&ChunkNeighbors::default());
        chunk
    }

    #[test]
    fn test_lone_voxel_emits_six_quads() {
        let chunk = lone_voxel_chunk(ChunkCoord::new(0, 0, 0), 4);
        let mut pool = BufferPool::default();
        let mesh = build_mesh(&chunk, &mut pool).expect("geometry");

        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
        assert_eq!(mesh.normals.len(), 24 * 3);
        assert_eq!(mesh.uvs.len(), 24 * 2);
        assert_eq!(mesh.colors.len(), 24 * 4);
    }

    #[test]
    fn test_air_chunk_has_no_geometry() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0, 0), 4);
        // Air voxels keep their fully-exposed masks but still emit nothing
        chunk.update_visibility(&ChunkNeighbors::default());
        let mut pool = BufferPool::default();
        assert!(build_mesh(&chunk, &mut pool).is_none());
    }

    #[test]
    fn test_positions_offset_by_chunk_origin() {
        let chunk = lone_voxel_chunk(ChunkCoord::new(2, -1, 0), 4);
        let mut pool = BufferPool::default();
        let mesh = build_mesh(&chunk, &mut pool).expect("geometry");

        // Voxel (0,0,0) of chunk (2,-1,0) spans world [8,-4,0] to [9,-3,1]
        for v in 0..mesh.vertex_count() {
            let x = mesh.positions[v * 3];
            let y = mesh.positions[v * 3 + 1];
            let z = mesh.positions[v * 3 + 2];
            assert!((8.0..=9.0).contains(&x));
            assert!((-4.0..=-3.0).contains(&y));
            assert!((0.0..=1.0).contains(&z));
        }
    }

    #[test]
    fn test_color_replicated_per_vertex() {
        let chunk = lone_voxel_chunk(ChunkCoord::new(0, 0, 0), 4);
        let mut pool = BufferPool::default();
        let mesh = build_mesh(&chunk, &mut pool).expect("geometry");

        for v in 0..mesh.vertex_count() {
            assert_eq!(
                &mesh.colors[v * 4..v * 4 + 4],
                &[0.25, 0.5, 0.75, 1.0]
            );
        }
    }

    #[test]
    fn test_buried_voxels_emit_nothing() {
        // 3x3x3 of solid: only the shell is visible, the center is not
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0, 0), 3);
        for z in 0..3 {
            for y in 0..3 {
                for x in 0..3 {
                    chunk.store_voxel(x, y, z, 1, [1.0; 4]).expect("write");
                }
            }
        }
        chunk.update_visibility(&ChunkNeighbors::default());
        let mut pool = BufferPool::default();
        let mesh = build_mesh(&chunk, &mut pool).expect("geometry");

        // 27 voxels, but only the outward faces of the shell: 9 per side
        assert_eq!(mesh.vertex_count(), 6 * 9 * 4);
    }

    #[test]
    fn test_indices_form_valid_triangles() {
        let chunk = lone_voxel_chunk(ChunkCoord::new(0, 0, 0), 2);
        let mut pool = BufferPool::default();
        let mesh = build_mesh(&chunk, &mut pool).expect("geometry");

        assert_eq!(mesh.index_count() % 3, 0);
        let max = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&i| i < max));
    }

    #[test]
    fn test_recycle_returns_buffers_to_pool() {
        let chunk = lone_voxel_chunk(ChunkCoord::new(0, 0, 0), 4);
        let mut pool = BufferPool::default();
        let mesh = build_mesh(&chunk, &mut pool).expect("geometry");

        assert_eq!(pool.idle_count(), 0);
        mesh.recycle(&mut pool);
        assert_eq!(pool.idle_count(), 4);
    }
}
