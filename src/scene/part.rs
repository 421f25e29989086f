use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::asset::{Handle, Mesh, Texture};

/// Built-in part geometry. Discriminants are the stable shape ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PartShape {
    Ball = 0,
    Block = 1,
    Cylinder = 2,
    Wedge = 3,
    CornerWedge = 4,
}

impl PartShape {
    pub const ALL: [PartShape; 5] = [
        PartShape::Ball,
        PartShape::Block,
        PartShape::Cylinder,
        PartShape::Wedge,
        PartShape::CornerWedge,
    ];

    /// Unknown ids render as a block.
    pub fn from_id(id: u32) -> Self {
        match id {
            0 => PartShape::Ball,
            1 => PartShape::Block,
            2 => PartShape::Cylinder,
            3 => PartShape::Wedge,
            4 => PartShape::CornerWedge,
            _ => PartShape::Block,
        }
    }

    pub fn id(self) -> u32 {
        self as u32
    }
}

/// Position plus orthonormal rotation, the placement of a part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CFrame {
    pub position: Vec3,
    pub rotation: Mat3,
}

impl CFrame {
    pub const IDENTITY: CFrame = CFrame {
        position: Vec3::ZERO,
        rotation: Mat3::IDENTITY,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Mat3::IDENTITY,
        }
    }

    pub fn with_rotation(mut self, rotation: Mat3) -> Self {
        self.rotation = rotation;
        self
    }

    /// Model matrix whose basis columns are the rotation columns scaled by `size`.
    pub fn instance_matrix(&self, size: Vec3) -> Mat4 {
        Mat4::from_cols(
            (self.rotation.x_axis * size.x).extend(0.0),
            (self.rotation.y_axis * size.y).extend(0.0),
            (self.rotation.z_axis * size.z).extend(0.0),
            self.position.extend(1.0),
        )
    }
}

impl Default for CFrame {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Mesh asset attached to a part, resolved when the snapshot is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomMesh {
    /// `None` while the asset is still loading or failed to load.
    pub mesh: Option<Handle<Mesh>>,
    pub texture: Option<Handle<Texture>>,
    /// Extents of the mesh in its own units, used to fit it to the part size.
    pub natural_size: Vec3,
    pub offset: Vec3,
}

impl CustomMesh {
    const MIN_EXTENT: f32 = 1e-6;

    /// Model matrix fitting the mesh's natural extents to `size`.
    pub fn model_matrix(&self, cframe: &CFrame, size: Vec3) -> Mat4 {
        let natural = Vec3::select(
            self.natural_size.cmpgt(Vec3::splat(Self::MIN_EXTENT)),
            self.natural_size,
            Vec3::ONE,
        );
        let scale = size / natural;
        Mat4::from_translation(cframe.position + self.offset)
            * Mat4::from_mat3(cframe.rotation)
            * Mat4::from_scale(scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderableKind {
    Primitive { shape: PartShape },
    CustomMesh(CustomMesh),
}

/// Read-only view of one part for the duration of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderablePart {
    pub cframe: CFrame,
    pub size: Vec3,
    /// Linear RGB in [0,1].
    pub color: Vec3,
    pub transparency: f32,
    pub kind: RenderableKind,
}

impl RenderablePart {
    pub fn primitive(shape: PartShape, cframe: CFrame, size: Vec3, color: Vec3) -> Self {
        Self {
            cframe,
            size,
            color,
            transparency: 0.0,
            kind: RenderableKind::Primitive { shape },
        }
    }

    pub fn custom(mesh: CustomMesh, cframe: CFrame, size: Vec3, color: Vec3) -> Self {
        Self {
            cframe,
            size,
            color,
            transparency: 0.0,
            kind: RenderableKind::CustomMesh(mesh),
        }
    }

    pub fn with_transparency(mut self, transparency: f32) -> Self {
        self.transparency = transparency;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.cframe.position
    }

    pub fn opacity(&self) -> f32 {
        1.0 - self.transparency.clamp(0.0, 1.0)
    }

    pub fn is_opaque(&self) -> bool {
        self.opacity() >= 1.0
    }

    pub fn is_invisible(&self) -> bool {
        self.opacity() <= 0.0
    }

    /// Bounding sphere radius used by the cone test.
    pub fn bounding_radius(&self) -> f32 {
        0.5 * self.size.length()
    }

    /// Shape used for batching and for the fallback when a custom mesh is missing.
    pub fn fallback_shape(&self) -> PartShape {
        match self.kind {
            RenderableKind::Primitive { shape } => shape,
            RenderableKind::CustomMesh(_) => PartShape::Block,
        }
    }

    /// World transform for drawing this part with whatever geometry it resolves to.
    pub fn model_matrix(&self) -> Mat4 {
        match self.kind {
            RenderableKind::CustomMesh(custom) if custom.mesh.is_some() => {
                custom.model_matrix(&self.cframe, self.size)
            }
            _ => self.cframe.instance_matrix(self.size),
        }
    }

    /// Linear RGBA fed to the shader; textured meshes are left untinted.
    pub fn tint(&self, alpha: f32) -> Vec4 {
        match self.kind {
            RenderableKind::CustomMesh(CustomMesh {
                mesh: Some(_),
                texture: Some(_),
                ..
            }) => Vec4::new(1.0, 1.0, 1.0, alpha),
            _ => self.color.extend(alpha),
        }
    }
}

/// Immutable list of parts handed to the renderer each frame.
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    pub parts: Vec<RenderablePart>,
}

impl SceneSnapshot {
    pub fn new(parts: Vec<RenderablePart>) -> Self {
        Self { parts }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_shape_ids_map_to_block() {
        assert_eq!(PartShape::from_id(0), PartShape::Ball);
        assert_eq!(PartShape::from_id(4), PartShape::CornerWedge);
        assert_eq!(PartShape::from_id(99), PartShape::Block);
        for shape in PartShape::ALL {
            assert_eq!(PartShape::from_id(shape.id()), shape);
        }
    }

    #[test]
    fn instance_matrix_scales_rotation_columns() {
        let rotation = Mat3::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let cframe = CFrame::from_position(Vec3::new(1.0, 2.0, 3.0)).with_rotation(rotation);
        let m = cframe.instance_matrix(Vec3::new(2.0, 3.0, 4.0));

        assert!(m.x_axis.truncate().abs_diff_eq(rotation.x_axis * 2.0, 1e-6));
        assert!(m.y_axis.truncate().abs_diff_eq(rotation.y_axis * 3.0, 1e-6));
        assert!(m.z_axis.truncate().abs_diff_eq(rotation.z_axis * 4.0, 1e-6));
        assert_eq!(m.w_axis, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(m.row(3), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn opacity_clamps_transparency() {
        let base = RenderablePart::primitive(PartShape::Block, CFrame::IDENTITY, Vec3::ONE, Vec3::ONE);
        assert_eq!(base.with_transparency(-1.0).opacity(), 1.0);
        assert!(base.with_transparency(-1.0).is_opaque());
        assert!(base.with_transparency(2.0).is_invisible());
        assert!((base.with_transparency(0.25).opacity() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn custom_mesh_scales_to_part_size() {
        let custom = CustomMesh {
            mesh: Some(Handle::new(0)),
            texture: None,
            natural_size: Vec3::new(2.0, 0.0, 4.0),
            offset: Vec3::new(0.0, 1.0, 0.0),
        };
        let part = RenderablePart::custom(
            custom,
            CFrame::from_position(Vec3::new(5.0, 0.0, 0.0)),
            Vec3::new(4.0, 3.0, 2.0),
            Vec3::ONE,
        );
        let m = part.model_matrix();
        // zero natural extent is treated as one unit
        let corner = m.transform_point3(Vec3::ONE);
        assert!(corner.abs_diff_eq(Vec3::new(5.0 + 2.0, 1.0 + 3.0, 0.5), 1e-5));
    }

    #[test]
    fn missing_custom_mesh_uses_box_placement() {
        let custom = CustomMesh {
            mesh: None,
            texture: None,
            natural_size: Vec3::splat(10.0),
            offset: Vec3::splat(100.0),
        };
        let part = RenderablePart::custom(custom, CFrame::IDENTITY, Vec3::splat(2.0), Vec3::X);
        assert_eq!(part.fallback_shape(), PartShape::Block);
        assert_eq!(part.model_matrix(), CFrame::IDENTITY.instance_matrix(Vec3::splat(2.0)));
    }

    #[test]
    fn textured_custom_mesh_is_untinted() {
        let custom = CustomMesh {
            mesh: Some(Handle::new(1)),
            texture: Some(Handle::new(0)),
            natural_size: Vec3::ONE,
            offset: Vec3::ZERO,
        };
        let part = RenderablePart::custom(custom, CFrame::IDENTITY, Vec3::ONE, Vec3::new(0.2, 0.3, 0.4));
        assert_eq!(part.tint(0.5), Vec4::new(1.0, 1.0, 1.0, 0.5));
    }
}
