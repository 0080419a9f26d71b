//! Angle and vector helpers.
//!
//! Angles on the public surface are degrees measured counter-clockwise from
//! world +X. A *surface angle* is the direction of the surface tangent, so flat
//! ground is `0°`, a wall the character runs up on its right is `90°`, a
//! ceiling is `180°` and a left wall is `270°`. The matching "up" vector of a
//! surface is the tangent rotated by +90°.

use bevy::prelude::*;

/// Tolerance used for every comparison against zero.
pub const EPSILON: f32 = 1e-4;

/// Wrap an angle in degrees into `[0, 360)`.
#[inline]
pub fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest-arc difference `to - from` in degrees, in `(-180, 180]`.
#[inline]
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    let diff = wrap_degrees(to - from);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Unit vector pointing along `degrees`.
#[inline]
pub fn degrees_to_vec(degrees: f32) -> Vec2 {
    Vec2::from_angle(degrees.to_radians())
}

/// Angle of `v` in degrees, wrapped to `[0, 360)`. Zero vectors map to `0`.
#[inline]
pub fn vec_to_degrees(v: Vec2) -> f32 {
    if v.length_squared() < EPSILON * EPSILON {
        return 0.0;
    }
    wrap_degrees(v.to_angle().to_degrees())
}

/// Rotate `v` counter-clockwise by `degrees`.
#[inline]
pub fn rotate_degrees(v: Vec2, degrees: f32) -> Vec2 {
    Vec2::from_angle(degrees.to_radians()).rotate(v)
}

/// Surface angle of a surface with the given outward normal.
#[inline]
pub fn normal_to_surface_angle(normal: Vec2) -> f32 {
    wrap_degrees(vec_to_degrees(normal) - 90.0)
}

/// Outward normal ("up") of a surface with the given surface angle.
#[inline]
pub fn surface_angle_to_normal(surface_angle: f32) -> Vec2 {
    degrees_to_vec(surface_angle + 90.0)
}

/// Scalar projection of `v` onto `axis`. `axis` need not be normalized.
#[inline]
pub fn project_onto(v: Vec2, axis: Vec2) -> f32 {
    let axis = axis.normalize_or_zero();
    v.dot(axis)
}

/// Unsigned angle between two vectors in degrees, `[0, 180]`.
#[inline]
pub fn angle_between(a: Vec2, b: Vec2) -> f32 {
    shortest_arc(vec_to_degrees(a), vec_to_degrees(b)).abs()
}

#[inline]
pub fn approx_zero(value: f32) -> bool {
    value.abs() < EPSILON
}

/// Move `current` toward `target` by at most `max_delta`.
#[inline]
pub fn move_toward(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_delta {
        target
    } else {
        current + delta.signum() * max_delta
    }
}

/// Replace NaN or infinite values with zero.
#[inline]
pub fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Component-wise [`sanitize`].
#[inline]
pub fn sanitize_vec(v: Vec2) -> Vec2 {
    Vec2::new(sanitize(v.x), sanitize(v.y))
}

/// Sign of `value` with an epsilon dead zone: `-1`, `0` or `1`.
#[inline]
pub fn sign_eps(value: f32) -> f32 {
    if approx_zero(value) {
        0.0
    } else {
        value.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_degrees_handles_negative_and_large() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(725.0), 5.0);
        assert!(wrap_degrees(-1e-9) < 360.0);
    }

    #[test]
    fn shortest_arc_crosses_wrap() {
        assert!((shortest_arc(350.0, 10.0) - 20.0).abs() < EPSILON);
        assert!((shortest_arc(10.0, 350.0) + 20.0).abs() < EPSILON);
        assert!((shortest_arc(0.0, 180.0) - 180.0).abs() < EPSILON);
        assert!((shortest_arc(90.0, 90.0)).abs() < EPSILON);
    }

    #[test]
    fn surface_angle_and_normal_agree() {
        // Flat floor
        assert!((surface_angle_to_normal(0.0) - Vec2::Y).length() < 1e-5);
        // Right wall: surface faces -X
        assert!((surface_angle_to_normal(90.0) - Vec2::NEG_X).length() < 1e-5);
        // Ceiling faces down
        assert!((surface_angle_to_normal(180.0) - Vec2::NEG_Y).length() < 1e-5);
        // Left wall faces +X
        assert!((surface_angle_to_normal(270.0) - Vec2::X).length() < 1e-5);

        for angle in [0.0, 30.0, 95.0, 181.0, 300.0] {
            let back = normal_to_surface_angle(surface_angle_to_normal(angle));
            assert!(shortest_arc(angle, back).abs() < 1e-3, "{angle} -> {back}");
        }
    }

    #[test]
    fn rotate_quarter_turn() {
        let v = rotate_degrees(Vec2::X, 90.0);
        assert!((v - Vec2::Y).length() < 1e-5);
    }

    #[test]
    fn project_and_angle_between() {
        assert!((project_onto(Vec2::new(3.0, 4.0), Vec2::new(2.0, 0.0)) - 3.0).abs() < EPSILON);
        assert!((angle_between(Vec2::X, Vec2::Y) - 90.0).abs() < 1e-3);
        assert!((angle_between(Vec2::X, Vec2::NEG_X) - 180.0).abs() < 1e-3);
    }

    #[test]
    fn move_toward_clamps() {
        assert_eq!(move_toward(0.0, 10.0, 3.0), 3.0);
        assert_eq!(move_toward(9.0, 10.0, 3.0), 10.0);
        assert_eq!(move_toward(-2.0, 0.0, 0.5), -1.5);
    }

    #[test]
    fn sanitize_removes_nan() {
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(f32::INFINITY), 0.0);
        assert_eq!(sanitize(2.5), 2.5);
        assert_eq!(sanitize_vec(Vec2::new(f32::NAN, 1.0)), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn sign_has_dead_zone() {
        assert_eq!(sign_eps(0.00001), 0.0);
        assert_eq!(sign_eps(-3.0), -1.0);
        assert_eq!(sign_eps(0.5), 1.0);
    }
}
