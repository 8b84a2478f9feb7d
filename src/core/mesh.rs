use std::collections::HashMap;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::types::Transform;

/// Axis-aligned bounding box used for collidable bounds and triangle queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_center_extent(center: Vec3, extent: Vec3) -> Self {
        Self::new(center - extent, center + extent)
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &p in points {
            bounds.extend(p);
        }
        bounds
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn radius(&self) -> f32 {
        self.extent().length()
    }

    pub fn expanded(&self, margin: f32) -> Self {
        Self::new(self.min - Vec3::splat(margin), self.max + Vec3::splat(margin))
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Bounds of this box after applying `transform`.
    pub fn transformed(&self, transform: &Transform) -> Aabb {
        let center = transform.transform_point(self.center());
        let extent = self.extent();
        let rotation = glam::Mat3::from_quat(transform.rotation);
        let world_extent = Vec3::new(
            rotation.row(0).abs().dot(extent),
            rotation.row(1).abs().dot(extent),
            rotation.row(2).abs().dot(extent),
        );
        Aabb::from_center_extent(center, world_extent)
    }
}

/// Geometry made of triangles, queried by local-space bounds.
///
/// Implemented by static meshes, scaled mesh instances and terrain height grids.
pub trait TriangleSource {
    /// Pushes the indices of triangles whose bounds overlap `local_bounds`.
    fn triangles_overlapping(&self, local_bounds: &Aabb, out: &mut Vec<usize>);

    /// Vertices of triangle `index` in the source's local space.
    fn triangle(&self, index: usize) -> [Vec3; 3];

    fn local_bounds(&self) -> Aabb;

    fn triangle_count(&self) -> usize;
}

/// Static triangle mesh cooked from raw vertex/index buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
    pub bounds: Aabb,
}

impl TriangleMesh {
    pub fn builder(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> MeshBuilder {
        MeshBuilder::new(vertices, indices)
    }

    pub fn bounding_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| v.length())
            .fold(0.0, f32::max)
    }

    fn scaled_triangle(&self, index: usize, scale: Vec3) -> [Vec3; 3] {
        let [a, b, c] = self.indices[index];
        [
            self.vertices[a as usize] * scale,
            self.vertices[b as usize] * scale,
            self.vertices[c as usize] * scale,
        ]
    }
}

impl TriangleSource for TriangleMesh {
    fn triangles_overlapping(&self, local_bounds: &Aabb, out: &mut Vec<usize>) {
        if !self.bounds.intersects(local_bounds) {
            return;
        }
        for index in 0..self.indices.len() {
            let triangle = self.triangle(index);
            if Aabb::from_points(&triangle).intersects(local_bounds) {
                out.push(index);
            }
        }
    }

    fn triangle(&self, index: usize) -> [Vec3; 3] {
        self.scaled_triangle(index, Vec3::ONE)
    }

    fn local_bounds(&self) -> Aabb {
        self.bounds
    }

    fn triangle_count(&self) -> usize {
        self.indices.len()
    }
}

/// A shared mesh viewed through a per-instance scale.
pub struct ScaledMesh<'a> {
    pub mesh: &'a TriangleMesh,
    pub scale: Vec3,
}

impl TriangleSource for ScaledMesh<'_> {
    fn triangles_overlapping(&self, local_bounds: &Aabb, out: &mut Vec<usize>) {
        if !self.local_bounds().intersects(local_bounds) {
            return;
        }
        for index in 0..self.mesh.indices.len() {
            let triangle = self.triangle(index);
            if Aabb::from_points(&triangle).intersects(local_bounds) {
                out.push(index);
            }
        }
    }

    fn triangle(&self, index: usize) -> [Vec3; 3] {
        let mut triangle = self.mesh.scaled_triangle(index, self.scale);
        // Mirroring scales flip the winding.
        if self.scale.x * self.scale.y * self.scale.z < 0.0 {
            triangle.swap(1, 2);
        }
        triangle
    }

    fn local_bounds(&self) -> Aabb {
        let a = self.mesh.bounds.min * self.scale;
        let b = self.mesh.bounds.max * self.scale;
        Aabb::new(a.min(b), a.max(b))
    }

    fn triangle_count(&self) -> usize {
        self.mesh.indices.len()
    }
}

/// Helper used to cook triangle meshes from raw vertex/index buffers.
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
}

impl MeshBuilder {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    /// Merges vertices closer than `epsilon` using a quantized grid.
    pub fn weld_vertices(mut self, epsilon: f32) -> Self {
        if epsilon <= 0.0 || self.vertices.is_empty() {
            return self;
        }

        let inv = 1.0 / epsilon;
        let mut map: HashMap<(i32, i32, i32), u32> = HashMap::new();
        let mut welded: Vec<Vec3> = Vec::new();
        let mut remap: Vec<u32> = Vec::with_capacity(self.vertices.len());

        for v in &self.vertices {
            let key = (
                (v.x * inv).round() as i32,
                (v.y * inv).round() as i32,
                (v.z * inv).round() as i32,
            );
            let index = *map.entry(key).or_insert_with(|| {
                welded.push(*v);
                (welded.len() - 1) as u32
            });
            remap.push(index);
        }

        for tri in &mut self.indices {
            for corner in tri.iter_mut() {
                *corner = remap[*corner as usize];
            }
        }

        self.vertices = welded;
        self
    }

    /// Drops triangles that reference missing vertices or collapse to a line.
    pub fn remove_degenerate(mut self) -> Self {
        let count = self.vertices.len() as u32;
        let vertices = &self.vertices;
        self.indices.retain(|&[a, b, c]| {
            if a >= count || b >= count || c >= count || a == b || b == c || a == c {
                return false;
            }
            let (a, b, c) = (vertices[a as usize], vertices[b as usize], vertices[c as usize]);
            (b - a).cross(c - a).length_squared() > f32::EPSILON
        });
        self
    }

    pub fn build(self) -> TriangleMesh {
        let bounds = Aabb::from_points(&self.vertices);
        TriangleMesh {
            vertices: self.vertices,
            indices: self.indices,
            bounds,
        }
    }
}

/// Height grid sampled on a regular XZ lattice; Y is up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terrain {
    heights: Vec<f32>,
    columns: usize,
    rows: usize,
    /// Spacing between samples along X and Z.
    pub cell_size: Vec2,
    bounds: Aabb,
}

impl Terrain {
    /// `heights` is row-major with `columns` samples per row. Returns `None` for grids smaller
    /// than 2x2 or a mismatched sample count.
    pub fn new(heights: Vec<f32>, columns: usize, cell_size: Vec2) -> Option<Self> {
        if columns < 2 || heights.len() % columns != 0 || heights.len() / columns < 2 {
            return None;
        }
        let rows = heights.len() / columns;
        let (low, high) = heights
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            });
        let bounds = Aabb::new(
            Vec3::new(0.0, low, 0.0),
            Vec3::new(
                (columns - 1) as f32 * cell_size.x,
                high,
                (rows - 1) as f32 * cell_size.y,
            ),
        );
        Some(Self {
            heights,
            columns,
            rows,
            cell_size,
            bounds,
        })
    }

    pub fn flat(columns: usize, rows: usize, cell_size: Vec2, height: f32) -> Option<Self> {
        Self::new(vec![height; columns * rows], columns, cell_size)
    }

    pub fn height(&self, column: usize, row: usize) -> f32 {
        self.heights[row * self.columns + column]
    }

    fn vertex(&self, column: usize, row: usize) -> Vec3 {
        Vec3::new(
            column as f32 * self.cell_size.x,
            self.height(column, row),
            row as f32 * self.cell_size.y,
        )
    }

    fn cell_range(&self, min: f32, max: f32, spacing: f32, cells: usize) -> Option<(usize, usize)> {
        let start = (min / spacing).floor();
        let end = (max / spacing).floor();
        if end < 0.0 || start >= cells as f32 {
            return None;
        }
        let start = start.max(0.0) as usize;
        let end = (end as usize).min(cells - 1);
        Some((start, end))
    }
}

impl TriangleSource for Terrain {
    fn triangles_overlapping(&self, local_bounds: &Aabb, out: &mut Vec<usize>) {
        if !self.bounds.intersects(local_bounds) {
            return;
        }
        let cell_columns = self.columns - 1;
        let cell_rows = self.rows - 1;
        let Some((c0, c1)) =
            self.cell_range(local_bounds.min.x, local_bounds.max.x, self.cell_size.x, cell_columns)
        else {
            return;
        };
        let Some((r0, r1)) =
            self.cell_range(local_bounds.min.z, local_bounds.max.z, self.cell_size.y, cell_rows)
        else {
            return;
        };
        for row in r0..=r1 {
            for column in c0..=c1 {
                let cell = row * cell_columns + column;
                for index in [cell * 2, cell * 2 + 1] {
                    let triangle = self.triangle(index);
                    if Aabb::from_points(&triangle).intersects(local_bounds) {
                        out.push(index);
                    }
                }
            }
        }
    }

    fn triangle(&self, index: usize) -> [Vec3; 3] {
        let cell = index / 2;
        let cell_columns = self.columns - 1;
        let column = cell % cell_columns;
        let row = cell / cell_columns;
        let v00 = self.vertex(column, row);
        let v10 = self.vertex(column + 1, row);
        let v01 = self.vertex(column, row + 1);
        let v11 = self.vertex(column + 1, row + 1);
        // Counter-clockwise seen from above so face normals point up.
        if index % 2 == 0 {
            [v00, v01, v10]
        } else {
            [v10, v01, v11]
        }
    }

    fn local_bounds(&self) -> Aabb {
        self.bounds
    }

    fn triangle_count(&self) -> usize {
        (self.columns - 1) * (self.rows - 1) * 2
    }
}
