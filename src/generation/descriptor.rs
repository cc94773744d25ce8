//! Generator descriptors: serializable world-generation rules
//!
//! Instead of shipping executable code across the generation boundary, a
//! descriptor names a built-in rule plus its parameters. Both sides of the
//! boundary resolve the same descriptor to the same pure function, so the
//! executor never parses or evaluates code at runtime.

use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

/// A pure mapping from world voxel position to voxel type.
///
/// Evaluation is deterministic for a given descriptor, seed, and position;
/// repeated generation of the same chunk reproduces identical buffers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GeneratorKind {
    /// Nothing but air
    Empty,
    /// A one-voxel-thick plate at `y == height` for `|x| < extent`,
    /// `|z| < extent`
    FlatPlate {
        height: i32,
        extent: i32,
        material: u8,
    },
    /// Uniform solid below `level`, air at and above it
    SolidBelow { level: i32, material: u8 },
    /// Perlin heightfield terrain.
    ///
    /// Surface height is `ground + perlin(x * scale, z * scale) * amplitude`.
    /// Material bands by depth: grass (3) in the top voxel, dirt (4) down to
    /// 4 below the surface, stone (5) underneath.
    Terrain {
        scale: f64,
        amplitude: f64,
        ground: f64,
    },
}

impl GeneratorKind {
    /// Voxel type at a world position; 0 is air
    pub fn evaluate(&self, noise: &Perlin, x: i32, y: i32, z: i32) -> u8 {
        match self {
            GeneratorKind::Empty => 0,
            GeneratorKind::FlatPlate {
                height,
                extent,
                material,
            } => {
                if y == *height && x.abs() < *extent && z.abs() < *extent {
                    *material
                } else {
                    0
                }
            }
            GeneratorKind::SolidBelow { level, material } => {
                if y < *level {
                    *material
                } else {
                    0
                }
            }
            GeneratorKind::Terrain {
                scale,
                amplitude,
                ground,
            } => {
                let height = ground + noise.get([x as f64 * scale, z as f64 * scale]) * amplitude;
                let y = y as f64;
                if y >= height {
                    0
                } else if y >= height - 1.0 {
                    3
                } else if y >= height - 4.0 {
                    4
                } else {
                    5
                }
            }
        }
    }
}

impl Default for GeneratorKind {
    /// The default world: a flat plate at the origin
    fn default() -> Self {
        GeneratorKind::FlatPlate {
            height: 0,
            extent: 10,
            material: 1,
        }
    }
}
