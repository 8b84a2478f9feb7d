//! Debug-only numeric validation.
//!
//! Every check is gated on `cfg!(debug_assertions)` and folds away in release builds, where
//! invalid values are allowed to propagate.

use glam::Vec3;

use crate::collision::contact::Contact;

/// Tolerance on `|normal| - 1` before a contact normal counts as degenerate.
const NORMAL_LENGTH_TOLERANCE: f32 = 1e-3;

#[inline]
pub fn validate_vec3(value: Vec3, context: &str) {
    if cfg!(debug_assertions) && !value.is_finite() {
        log::error!("non-finite vector in {context}: {value:?}");
        debug_assert!(false, "non-finite vector in {context}");
    }
}

#[inline]
pub fn validate_scalar(value: f32, context: &str) {
    if cfg!(debug_assertions) && !value.is_finite() {
        log::error!("non-finite scalar in {context}: {value}");
        debug_assert!(false, "non-finite scalar in {context}");
    }
}

#[inline]
pub fn validate_contact(contact: &Contact) {
    if !cfg!(debug_assertions) {
        return;
    }
    validate_vec3(contact.position, "contact position");
    validate_vec3(contact.normal, "contact normal");
    validate_scalar(contact.penetration_depth, "contact depth");
    let length = contact.normal.length();
    if (length - 1.0).abs() > NORMAL_LENGTH_TOLERANCE {
        log::error!("degenerate contact normal {:?}", contact.normal);
        debug_assert!(false, "degenerate contact normal");
    }
}
