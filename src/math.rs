// math.rs — Orientation/direction aliases and the pitch-offset helper.
//
// The host hands us a forward orientation (quaternion) and a flattened
// input direction each frame; all composition goes through nalgebra-glm so
// the conventions match across the mod.

use nalgebra_glm as glm;

/// World-space orientation (unit quaternion).
pub type Orientation = glm::Quat;

/// Direction vector, same layout as the host's float3.
pub type Vec3 = glm::Vec3;

/// The identity orientation.
pub fn identity() -> Orientation {
    glm::quat_identity()
}

/// Rotate a direction by an orientation.
pub fn rotate(q: &Orientation, v: &Vec3) -> Vec3 {
    glm::quat_rotate_vec3(q, v)
}

/// Orientation that tilts the forward axis (+Z) upward by `degrees`.
///
/// Applied to (0, 0, 1) this yields (0, sin d, cos d). The host's default
/// forward reference carries a 45° upward bias, so composing a 45° tilt
/// with the controller orientation cancels it; glide mode needs 60°.
pub fn pitch_up(degrees: f32) -> Orientation {
    glm::quat_angle_axis(-degrees.to_radians(), &glm::vec3(1.0, 0.0, 0.0))
}
