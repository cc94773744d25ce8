//! Voxel faces, visibility bits, and colors
//!
//! A voxel is a typed, colored grid cell. Type 0 is air: never solid,
//! never meshed, regardless of stored color or visibility bits. The six
//! cube faces map to a 6-bit visibility mask, one bit per face.

use glam::IVec3;

/// Visibility mask with every face bit set (fully exposed voxel)
pub const ALL_FACES_MASK: u8 = 0b0011_1111;

/// Color written by voxel-level writes that carry no explicit color
pub const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// One face of a voxel cube
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    /// -Z
    Front = 0,
    /// +Z
    Back = 1,
    /// +Y
    Top = 2,
    /// -Y
    Bottom = 3,
    /// +X
    Right = 4,
    /// -X
    Left = 5,
}

impl Face {
    /// All faces in mask-bit order
    pub const ALL: [Face; 6] = [
        Face::Front,
        Face::Back,
        Face::Top,
        Face::Bottom,
        Face::Right,
        Face::Left,
    ];

    /// Bit for this face in the visibility mask
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Index into the static face tables
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Unit offset toward the neighbor this face borders
    pub const fn offset(self) -> IVec3 {
        match self {
            Face::Front => IVec3::new(0, 0, -1),
            Face::Back => IVec3::new(0, 0, 1),
            Face::Top => IVec3::new(0, 1, 0),
            Face::Bottom => IVec3::new(0, -1, 0),
            Face::Right => IVec3::new(1, 0, 0),
            Face::Left => IVec3::new(-1, 0, 0),
        }
    }

    /// Outward face normal
    pub const fn normal(self) -> [f32; 3] {
        match self {
            Face::Front => [0.0, 0.0, -1.0],
            Face::Back => [0.0, 0.0, 1.0],
            Face::Top => [0.0, 1.0, 0.0],
            Face::Bottom => [0.0, -1.0, 0.0],
            Face::Right => [1.0, 0.0, 0.0],
            Face::Left => [-1.0, 0.0, 0.0],
        }
    }
}

/// Corner positions per face on the unit cube, counter-clockwise when
/// viewed from outside. Indexed by `Face::index()`.
pub const FACE_CORNERS: [[[f32; 3]; 4]; 6] = [
    // front (-Z)
    [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
    // back (+Z)
    [[0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 0.0, 1.0]],
    // top (+Y)
    [[0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
    // bottom (-Y)
    [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
    // right (+X)
    [[1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
    // left (-X)
    [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]],
];

/// Texture coordinates for the 4 corners of any face quad
pub const FACE_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// Index pattern for one quad: two triangles over 4 vertices
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Deterministic RGBA color derived from a world position.
///
/// The generation executor applies this rule to every solid voxel so that
/// identical requests reproduce identical color buffers.
pub fn position_color(x: i32, y: i32, z: i32) -> [f32; 4] {
    let channel = |c: i32| (c as f32 * 0.1).sin() * 0.5 + 0.5;
    [channel(x), channel(y), channel(z), 1.0]
}
