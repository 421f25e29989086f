//! Unit-sized geometry for the built-in part shapes.
//!
//! Every shape fits the cube `[-0.5, 0.5]^3` so the part size can be applied as a
//! plain per-axis scale. Triangles wind counter-clockwise seen from outside.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use super::vertex::{v, Vertex};
use crate::scene::PartShape;

pub const SPHERE_SEGMENTS: u32 = 16;
pub const SPHERE_RINGS: u32 = 16;
pub const CYLINDER_SLICES: u32 = 16;

/// CPU-side triangle list before upload.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    fn push_vertex(&mut self, pos: Vec3, normal: Vec3, uv: Vec2) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(v(pos.to_array(), normal.to_array(), uv.to_array()));
        index
    }

    /// Adds a flat convex polygon, flipping it if it would face toward `interior`.
    fn push_flat_face(&mut self, corners: &[Vec3], interior: Vec3) {
        let mut corners = corners.to_vec();
        let mut normal = (corners[1] - corners[0])
            .cross(corners[2] - corners[0])
            .normalize_or_zero();
        let center = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
        if normal.dot(center - interior) < 0.0 {
            corners.reverse();
            normal = -normal;
        }

        let (u_axis, v_axis) = face_axes(normal);
        let base = self.vertices.len() as u32;
        for corner in &corners {
            let uv = Vec2::new(corner.dot(u_axis) + 0.5, 0.5 - corner.dot(v_axis));
            self.push_vertex(*corner, normal, uv);
        }
        for i in 1..corners.len() as u32 - 1 {
            self.indices.extend_from_slice(&[base, base + i, base + i + 1]);
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn face_axes(normal: Vec3) -> (Vec3, Vec3) {
    let up = if normal.y.abs() > 0.9 { Vec3::Z } else { Vec3::Y };
    let u_axis = up.cross(normal).normalize_or_zero();
    let v_axis = normal.cross(u_axis);
    (u_axis, v_axis)
}

/// Geometry for a built-in shape.
pub fn shape_mesh(shape: PartShape) -> MeshData {
    match shape {
        PartShape::Ball => sphere_mesh(SPHERE_SEGMENTS, SPHERE_RINGS),
        PartShape::Block => block_mesh(),
        PartShape::Cylinder => cylinder_mesh(CYLINDER_SLICES),
        PartShape::Wedge => wedge_mesh(),
        PartShape::CornerWedge => corner_wedge_mesh(),
    }
}

pub fn sphere_mesh(segments: u32, rings: u32) -> MeshData {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut mesh = MeshData::default();

    for ring in 0..=rings {
        let phi = PI * ring as f32 / rings as f32;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for segment in 0..=segments {
            let theta = TAU * segment as f32 / segments as f32;
            let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());
            let uv = Vec2::new(
                segment as f32 / segments as f32,
                ring as f32 / rings as f32,
            );
            mesh.push_vertex(normal * 0.5, normal, uv);
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;

            // pole rows collapse one of the two triangles
            if ring != 0 {
                mesh.indices.extend_from_slice(&[current, current + 1, next]);
            }
            if ring != rings - 1 {
                mesh.indices.extend_from_slice(&[current + 1, next + 1, next]);
            }
        }
    }

    mesh
}

pub fn block_mesh() -> MeshData {
    let mut mesh = MeshData::default();
    let c = |x: f32, y: f32, z: f32| Vec3::new(x, y, z) * 0.5;
    let faces = [
        [c(1., -1., -1.), c(1., 1., -1.), c(1., 1., 1.), c(1., -1., 1.)],
        [c(-1., -1., 1.), c(-1., 1., 1.), c(-1., 1., -1.), c(-1., -1., -1.)],
        [c(-1., 1., -1.), c(-1., 1., 1.), c(1., 1., 1.), c(1., 1., -1.)],
        [c(-1., -1., 1.), c(-1., -1., -1.), c(1., -1., -1.), c(1., -1., 1.)],
        [c(1., -1., 1.), c(1., 1., 1.), c(-1., 1., 1.), c(-1., -1., 1.)],
        [c(-1., -1., -1.), c(-1., 1., -1.), c(1., 1., -1.), c(1., -1., -1.)],
    ];
    for face in &faces {
        mesh.push_flat_face(face, Vec3::ZERO);
    }
    mesh
}

/// Y-axis cylinder, radius 0.5, height 1, smooth sides and flat caps.
pub fn cylinder_mesh(slices: u32) -> MeshData {
    let slices = slices.max(3);
    let mut mesh = MeshData::default();

    for slice in 0..=slices {
        let theta = TAU * slice as f32 / slices as f32;
        let normal = Vec3::new(theta.cos(), 0.0, -theta.sin());
        let u = slice as f32 / slices as f32;
        mesh.push_vertex(normal * 0.5 - Vec3::Y * 0.5, normal, Vec2::new(u, 1.0));
        mesh.push_vertex(normal * 0.5 + Vec3::Y * 0.5, normal, Vec2::new(u, 0.0));
    }
    for slice in 0..slices {
        let bottom = slice * 2;
        let top = bottom + 1;
        let next_bottom = bottom + 2;
        let next_top = bottom + 3;
        mesh.indices
            .extend_from_slice(&[bottom, next_bottom, top, top, next_bottom, next_top]);
    }

    for (y, normal) in [(0.5, Vec3::Y), (-0.5, Vec3::NEG_Y)] {
        let center = mesh.push_vertex(Vec3::new(0.0, y, 0.0), normal, Vec2::splat(0.5));
        let rim_start = mesh.vertices.len() as u32;
        for slice in 0..slices {
            let theta = TAU * slice as f32 / slices as f32;
            let (sin, cos) = theta.sin_cos();
            mesh.push_vertex(
                Vec3::new(cos * 0.5, y, -sin * 0.5),
                normal,
                Vec2::new(0.5 + cos * 0.5, 0.5 + sin * 0.5),
            );
        }
        for slice in 0..slices {
            let a = rim_start + slice;
            let b = rim_start + (slice + 1) % slices;
            if normal.y > 0.0 {
                mesh.indices.extend_from_slice(&[center, a, b]);
            } else {
                mesh.indices.extend_from_slice(&[center, b, a]);
            }
        }
    }

    mesh
}

/// Ramp rising from the bottom front edge (+Z) to the top back edge (-Z).
pub fn wedge_mesh() -> MeshData {
    let mut mesh = MeshData::default();
    let bfl = Vec3::new(-0.5, -0.5, 0.5);
    let bfr = Vec3::new(0.5, -0.5, 0.5);
    let bbl = Vec3::new(-0.5, -0.5, -0.5);
    let bbr = Vec3::new(0.5, -0.5, -0.5);
    let tbl = Vec3::new(-0.5, 0.5, -0.5);
    let tbr = Vec3::new(0.5, 0.5, -0.5);
    let interior = (bfl + bfr + bbl + bbr + tbl + tbr) / 6.0;

    mesh.push_flat_face(&[bbl, bbr, bfr, bfl], interior);
    mesh.push_flat_face(&[bbl, bbr, tbr, tbl], interior);
    mesh.push_flat_face(&[bfl, bbl, tbl], interior);
    mesh.push_flat_face(&[bfr, bbr, tbr], interior);
    mesh.push_flat_face(&[bfl, bfr, tbr, tbl], interior);
    mesh
}

/// Tetrahedron spanning three bottom corners and the top back-left corner.
pub fn corner_wedge_mesh() -> MeshData {
    let mut mesh = MeshData::default();
    let a = Vec3::new(-0.5, -0.5, -0.5);
    let b = Vec3::new(-0.5, -0.5, 0.5);
    let c = Vec3::new(0.5, -0.5, -0.5);
    let d = Vec3::new(-0.5, 0.5, -0.5);
    let interior = (a + b + c + d) / 4.0;

    mesh.push_flat_face(&[a, b, c], interior);
    mesh.push_flat_face(&[a, b, d], interior);
    mesh.push_flat_face(&[c, d, b], interior);
    mesh.push_flat_face(&[a, d, c], interior);
    mesh
}
