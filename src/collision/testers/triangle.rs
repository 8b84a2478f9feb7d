use glam::Vec3;

use super::gjk::{self, PlacedConvex, SupportMap, TriangleSupport};
use super::PairTester;
use crate::collision::contact::Contact;
use crate::core::collidable::Collidable;
use crate::core::shape::Shape;
use crate::utils::math::EPSILON;

/// Closest point on triangle `abc` to `p` (Ericson, Real-Time Collision Detection 5.1.5).
pub fn closest_point_on_triangle(p: Vec3, [a, b, c]: [Vec3; 3]) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    let denominator = 1.0 / (va + vb + vc);
    a + ab * (vb * denominator) + ac * (vc * denominator)
}

fn face_normal([a, b, c]: [Vec3; 3]) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

/// World-space vertices of a standalone triangle collidable.
fn world_triangle(collidable: &Collidable) -> Option<[Vec3; 3]> {
    let Shape::Triangle { vertices } = &collidable.shape else {
        return None;
    };
    let transform = collidable.world_transform();
    Some(vertices.map(|v| transform.transform_point(v)))
}

/// Sphere (A) against a triangle (B).
///
/// One-sided triangles only push along their counter-clockwise face normal.
#[derive(Debug, Default)]
pub struct TriangleSphereTester {
    pub one_sided: bool,
}

impl TriangleSphereTester {
    pub fn test(
        &mut self,
        center: Vec3,
        radius: f32,
        triangle: [Vec3; 3],
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        let normal_face = face_normal(triangle);
        let closest = closest_point_on_triangle(center, triangle);
        let offset = center - closest;
        let distance_squared = offset.length_squared();
        let plane_distance = (center - triangle[0]).dot(normal_face);

        if self.one_sided && plane_distance < 0.0 {
            // Behind the face: only a center projecting inside the triangle gets pushed back out.
            if distance_squared > plane_distance * plane_distance + 1e-6 {
                return false;
            }
            let depth = radius - plane_distance;
            let surface = center - normal_face * radius;
            out.push(Contact::new((closest + surface) * 0.5, normal_face, depth));
            return true;
        }

        let reach = radius + margin;
        if distance_squared > reach * reach {
            return false;
        }
        let distance = distance_squared.sqrt();
        let normal = if distance_squared > EPSILON {
            offset / distance
        } else if plane_distance < 0.0 {
            -normal_face
        } else {
            normal_face
        };
        let surface = center - normal * radius;
        out.push(Contact::new((closest + surface) * 0.5, normal, radius - distance));
        true
    }
}

impl PairTester for TriangleSphereTester {
    fn initialize(&mut self, _a: &Collidable, _b: &Collidable) {
        self.one_sided = false;
    }

    fn generate_contacts(
        &mut self,
        a: &Collidable,
        b: &Collidable,
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        let (Shape::Sphere { radius }, Some(triangle)) = (&a.shape, world_triangle(b)) else {
            return false;
        };
        self.test(a.world_transform().position, *radius, triangle, margin, out)
    }

    fn clean_up(&mut self) {}
}

/// Convex (A) against a triangle (B) through GJK/EPA.
#[derive(Debug, Default)]
pub struct TriangleConvexTester {
    pub one_sided: bool,
    cached_direction: Vec3,
}

impl TriangleConvexTester {
    pub fn test<S: SupportMap + ?Sized>(
        &mut self,
        convex: &S,
        triangle: [Vec3; 3],
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        let Some(hit) = gjk::penetration(
            convex,
            &TriangleSupport(triangle),
            margin,
            self.cached_direction,
        ) else {
            return false;
        };
        self.cached_direction = -hit.normal;

        let normal_face = face_normal(triangle);
        if self.one_sided && hit.normal.dot(normal_face) < 0.0 {
            // Resolve against the face plane rather than through the back of the triangle.
            let deepest = convex.support(-normal_face);
            let separation = (deepest - triangle[0]).dot(normal_face);
            if separation > margin {
                return false;
            }
            let depth = -separation;
            out.push(Contact::new(deepest + normal_face * (depth * 0.5), normal_face, depth));
            return true;
        }
        out.push(hit.to_contact());
        true
    }

    fn reset(&mut self) {
        self.cached_direction = Vec3::ZERO;
    }
}

impl PairTester for TriangleConvexTester {
    fn initialize(&mut self, _a: &Collidable, _b: &Collidable) {
        self.one_sided = false;
        self.reset();
    }

    fn generate_contacts(
        &mut self,
        a: &Collidable,
        b: &Collidable,
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        let Some(triangle) = world_triangle(b) else {
            return false;
        };
        if !a.shape.kind().is_convex() {
            return false;
        }
        let convex = PlacedConvex {
            shape: &a.shape,
            transform: a.world_transform(),
        };
        self.test(&convex, triangle, margin, out)
    }

    fn clean_up(&mut self) {
        self.reset();
    }
}

/// Per-triangle tester kept by mesh testers, one per overlapped triangle.
#[derive(Debug)]
pub enum TrianglePairTester {
    Sphere(TriangleSphereTester),
    Convex(TriangleConvexTester),
}

impl TrianglePairTester {
    pub fn sphere() -> Self {
        TrianglePairTester::Sphere(TriangleSphereTester { one_sided: true })
    }

    pub fn convex() -> Self {
        TrianglePairTester::Convex(TriangleConvexTester {
            one_sided: true,
            ..TriangleConvexTester::default()
        })
    }

    /// Tests the convex collidable against one world-space triangle of a mesh.
    pub fn test(
        &mut self,
        convex: &Collidable,
        triangle: [Vec3; 3],
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        match self {
            TrianglePairTester::Sphere(tester) => match convex.shape {
                Shape::Sphere { radius } => tester.test(
                    convex.world_transform().position,
                    radius,
                    triangle,
                    margin,
                    out,
                ),
                _ => false,
            },
            TrianglePairTester::Convex(tester) => {
                let placed = PlacedConvex {
                    shape: &convex.shape,
                    transform: convex.world_transform(),
                };
                tester.test(&placed, triangle, margin, out)
            }
        }
    }

    pub fn reset(&mut self) {
        if let TrianglePairTester::Convex(tester) = self {
            tester.reset();
        }
    }
}
