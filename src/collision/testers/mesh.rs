use std::collections::HashMap;

use super::triangle::TrianglePairTester;
use super::PairTester;
use crate::collision::contact::Contact;
use crate::core::collidable::Collidable;
use crate::core::mesh::{ScaledMesh, TriangleSource};
use crate::core::shape::Shape;
use crate::utils::pool::{ResourcePool, SingleOwnerStorage};

type TrianglePool = ResourcePool<TrianglePairTester, SingleOwnerStorage<TrianglePairTester>>;

/// Convex (A) against a triangle source (B): static mesh, instanced mesh or terrain.
///
/// Keeps one triangle tester per overlapped triangle so cached search state survives between
/// steps. Triangle testers come from a single-owner pool since this loop never leaves the
/// thread running the manifold update.
pub struct MeshPairTester {
    pool: TrianglePool,
    active: HashMap<usize, TrianglePairTester>,
    overlapping: Vec<usize>,
    stale: Vec<usize>,
}

impl MeshPairTester {
    /// Tester for spheres against triangle sources.
    pub fn for_spheres() -> Self {
        Self::with_pool(ResourcePool::single_owner(TrianglePairTester::sphere))
    }

    /// Tester for general convex shapes against triangle sources.
    pub fn for_convexes() -> Self {
        Self::with_pool(ResourcePool::single_owner(TrianglePairTester::convex))
    }

    fn with_pool(pool: TrianglePool) -> Self {
        Self {
            pool,
            active: HashMap::new(),
            overlapping: Vec::new(),
            stale: Vec::new(),
        }
    }

    /// Triangles currently tracked for this pair.
    pub fn active_triangles(&self) -> usize {
        self.active.len()
    }

    fn release_all(&mut self) {
        for (_, mut tester) in self.active.drain() {
            tester.reset();
            self.pool.give_back(tester);
        }
    }

    fn run(
        &mut self,
        convex: &Collidable,
        mesh: &Collidable,
        source: &dyn TriangleSource,
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        let mesh_transform = *mesh.world_transform();
        let local_bounds = convex
            .bounds()
            .expanded(margin)
            .transformed(&mesh_transform.inverse());

        self.overlapping.clear();
        source.triangles_overlapping(&local_bounds, &mut self.overlapping);
        self.overlapping.sort_unstable();

        // Triangles no longer under the convex return their testers.
        self.stale.clear();
        self.stale.extend(
            self.active
                .keys()
                .copied()
                .filter(|index| self.overlapping.binary_search(index).is_err()),
        );
        for index in self.stale.drain(..) {
            if let Some(mut tester) = self.active.remove(&index) {
                tester.reset();
                self.pool.give_back(tester);
            }
        }

        let mut touching = false;
        for &index in &self.overlapping {
            let tester = self
                .active
                .entry(index)
                .or_insert_with(|| self.pool.take());
            let triangle = source
                .triangle(index)
                .map(|v| mesh_transform.transform_point(v));
            let first = out.len();
            if tester.test(convex, triangle, margin, out) {
                touching = true;
                for contact in &mut out[first..] {
                    contact.id = index as u32;
                }
            }
        }
        touching
    }
}

impl PairTester for MeshPairTester {
    fn initialize(&mut self, _a: &Collidable, _b: &Collidable) {
        self.release_all();
    }

    fn generate_contacts(
        &mut self,
        a: &Collidable,
        b: &Collidable,
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        match &b.shape {
            Shape::StaticMesh(mesh) => self.run(a, b, mesh.as_ref(), margin, out),
            Shape::InstancedMesh { mesh, scale } => {
                let scaled = ScaledMesh {
                    mesh: mesh.as_ref(),
                    scale: *scale,
                };
                self.run(a, b, &scaled, margin, out)
            }
            Shape::Terrain(terrain) => self.run(a, b, terrain.as_ref(), margin, out),
            _ => false,
        }
    }

    fn clean_up(&mut self) {
        self.release_all();
        self.overlapping.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::{Terrain, TriangleMesh};
    use crate::core::types::Transform;
    use crate::utils::allocator::EntityId;
    use glam::{Vec2, Vec3};
    use std::sync::Arc;

    fn ball_at(position: Vec3) -> Collidable {
        let mut ball = Collidable::new(EntityId::from_index(1), Shape::sphere(0.5));
        ball.update_world_transform(&Transform::from_position(position));
        ball
    }

    #[test]
    fn testers_follow_overlapped_triangles() {
        let terrain = Terrain::flat(5, 5, Vec2::ONE, 0.0).expect("valid grid");
        let ground = Collidable::fixed(Shape::Terrain(Arc::new(terrain)), Transform::default());
        let mut tester = MeshPairTester::for_spheres();
        let mut out = Vec::new();

        let ball = ball_at(Vec3::new(1.5, 0.45, 1.5));
        assert!(tester.generate_contacts(&ball, &ground, 0.1, &mut out));
        assert!(!out.is_empty());
        assert!(out.iter().all(|c| c.normal.y > 0.99));
        let tracked = tester.active_triangles();
        assert!(tracked >= 2);

        out.clear();
        let lifted = ball_at(Vec3::new(1.5, 3.0, 1.5));
        assert!(!tester.generate_contacts(&lifted, &ground, 0.1, &mut out));
        assert_eq!(tester.active_triangles(), 0);
        assert_eq!(tester.pool.outstanding(), 0);
        assert_eq!(tester.pool.available(), tracked);
    }

    #[test]
    fn instanced_mesh_applies_scale() {
        let quad = TriangleMesh::builder(
            vec![
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(-1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, -1.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .build();
        let ground = Collidable::fixed(
            Shape::InstancedMesh {
                mesh: Arc::new(quad),
                scale: Vec3::new(4.0, 1.0, 4.0),
            },
            Transform::default(),
        );
        let mut tester = MeshPairTester::for_convexes();
        let mut block = Collidable::new(EntityId::from_index(1), Shape::cuboid(Vec3::splat(0.5)));
        block.update_world_transform(&Transform::from_position(Vec3::new(3.0, 0.48, 0.0)));
        let mut out = Vec::new();
        assert!(tester.generate_contacts(&block, &ground, 0.1, &mut out));
        assert!(out.iter().all(|c| c.normal.y > 0.99));
        tester.clean_up();
        assert_eq!(tester.active_triangles(), 0);
    }
}
