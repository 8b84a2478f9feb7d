//! Contact reduction for full manifolds.

use glam::Vec3;

use super::contact::Contact;
use crate::config::MAX_MANIFOLD_CONTACTS;

/// What to do with a candidate arriving at a full manifold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Drop the existing contact at this index and append the candidate.
    Replace(usize),
    /// Keep the manifold as it is.
    Reject,
}

/// Area proxy of four unordered points: the largest diagonal cross product.
fn quad_area(points: [Vec3; 4]) -> f32 {
    let [p0, p1, p2, p3] = points;
    let a = (p0 - p1).cross(p2 - p3).length_squared();
    let b = (p0 - p2).cross(p1 - p3).length_squared();
    let c = (p0 - p3).cross(p1 - p2).length_squared();
    a.max(b).max(c)
}

/// Picks which four of the five contacts survive.
///
/// The deepest contact is always kept. Among the rest, the one whose removal leaves the largest
/// area goes. Ties favor the existing contacts, so the candidate is refused.
pub fn reduce(contacts: &[Contact], candidate: &Contact) -> Reduction {
    debug_assert_eq!(contacts.len(), MAX_MANIFOLD_CONTACTS);

    let mut deepest = 0;
    for (i, contact) in contacts.iter().enumerate().skip(1) {
        if contact.penetration_depth > contacts[deepest].penetration_depth {
            deepest = i;
        }
    }
    if candidate.penetration_depth > contacts[deepest].penetration_depth {
        deepest = MAX_MANIFOLD_CONTACTS;
    }

    let positions = [
        contacts[0].position,
        contacts[1].position,
        contacts[2].position,
        contacts[3].position,
    ];

    let mut best = Reduction::Reject;
    let mut best_area = if deepest == MAX_MANIFOLD_CONTACTS {
        // The candidate is the deepest and cannot be dropped.
        f32::NEG_INFINITY
    } else {
        quad_area(positions)
    };

    for i in 0..MAX_MANIFOLD_CONTACTS {
        if i == deepest {
            continue;
        }
        let mut remaining = positions;
        remaining[i] = candidate.position;
        let area = quad_area(remaining);
        if area > best_area {
            best_area = area;
            best = Reduction::Replace(i);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(x: f32, z: f32, depth: f32) -> Contact {
        Contact::new(Vec3::new(x, 0.0, z), Vec3::Y, depth)
    }

    fn square() -> Vec<Contact> {
        vec![
            contact(1.0, 1.0, 0.01),
            contact(-1.0, 1.0, 0.01),
            contact(-1.0, -1.0, 0.01),
            contact(1.0, -1.0, 0.01),
        ]
    }

    #[test]
    fn interior_candidate_is_refused() {
        assert_eq!(reduce(&square(), &contact(0.1, 0.2, 0.01)), Reduction::Reject);
    }

    #[test]
    fn wider_candidate_replaces_a_corner() {
        let mut contacts = square();
        contacts[0].penetration_depth = 0.005;
        let result = reduce(&contacts, &contact(3.0, 3.0, 0.01));
        assert_eq!(result, Reduction::Replace(0));
    }

    #[test]
    fn deepest_contact_survives() {
        let mut contacts = square();
        contacts[0].penetration_depth = 0.5;
        // Removing contact 0 would give the largest area, but it is the deepest.
        let result = reduce(&contacts, &contact(3.0, 3.0, 0.01));
        assert_ne!(result, Reduction::Replace(0));
    }

    #[test]
    fn deep_interior_candidate_is_kept() {
        let result = reduce(&square(), &contact(0.0, 0.0, 0.2));
        assert!(matches!(result, Reduction::Replace(_)));
    }
}
