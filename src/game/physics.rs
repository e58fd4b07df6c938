//! Physics integrator.
//!
//! Fixed-dt Euler integration, friction, velocity clamp, boundary clamp
//! with velocity zeroing (spec.md §4.2). Grounded on `update_physics` in
//! the teacher's `game/tick.rs` (speed-buff multipliers, integrate then
//! clamp), generalized from fixed-point to float and extended with the
//! non-finite-recovery requirement.

use crate::core::{Vec2, WorldBounds};

/// Below this speed a velocity component is snapped to zero, matching
/// spec.md §4.2 "zero any component with |v| < ε".
const VELOCITY_EPSILON: f64 = 0.01;

/// Integrate one player's position/velocity for one tick.
///
/// Order, per spec.md §4.2: `pos <- clamp(pos + vel*dt, bounds)`, then
/// `vel <- clamp_magnitude(vel * friction, MAX_VEL)`, then zero any
/// below-epsilon component. On a boundary clamp, the velocity component
/// that drove the clamp is zeroed, preventing sticky acceleration into
/// walls. Non-finite results are caught and the entity is reset to the
/// origin with zero velocity rather than ever propagating a NaN/∞.
pub fn integrate(
    position: Vec2,
    velocity: Vec2,
    radius: f64,
    dt_secs: f64,
    friction: f64,
    max_velocity: f64,
    bounds: &WorldBounds,
) -> (Vec2, Vec2) {
    let moved = position.add(velocity.scale(dt_secs));
    if !moved.is_finite() {
        return (Vec2::ZERO, Vec2::ZERO);
    }

    let (clamped_pos, clamped_axes) = bounds.clamp(moved, radius);

    let mut new_velocity = velocity.scale(friction).clamp_magnitude(max_velocity);
    if clamped_axes.x {
        new_velocity.x = 0.0;
    }
    if clamped_axes.y {
        new_velocity.y = 0.0;
    }
    new_velocity = new_velocity.zero_below(VELOCITY_EPSILON);

    if !new_velocity.is_finite() {
        return (clamped_pos, Vec2::ZERO);
    }

    (clamped_pos, new_velocity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> WorldBounds {
        WorldBounds::new(100.0, 100.0)
    }

    #[test]
    fn outward_velocity_at_edge_is_zeroed_on_clamp() {
        let pos = Vec2::new(99.0, 50.0);
        let vel = Vec2::new(50.0, 0.0);
        let (new_pos, new_vel) = integrate(pos, vel, 5.0, 1.0, 0.9, 300.0, &bounds());
        assert_eq!(new_pos.x, 95.0);
        assert_eq!(new_vel.x, 0.0);
    }

    #[test]
    fn friction_decays_velocity() {
        let pos = Vec2::new(50.0, 50.0);
        let vel = Vec2::new(100.0, 0.0);
        let (_, new_vel) = integrate(pos, vel, 5.0, 0.016, 0.9, 300.0, &bounds());
        assert!(new_vel.x < vel.x);
        assert!(new_vel.x > 0.0);
    }

    #[test]
    fn non_finite_input_resets_to_origin() {
        let pos = Vec2::new(f64::NAN, 0.0);
        let vel = Vec2::new(1.0, 1.0);
        let (new_pos, new_vel) = integrate(pos, vel, 5.0, 0.016, 0.9, 300.0, &bounds());
        assert_eq!(new_pos, Vec2::ZERO);
        assert_eq!(new_vel, Vec2::ZERO);
    }

    #[test]
    fn velocity_below_epsilon_snaps_to_zero() {
        let pos = Vec2::new(50.0, 50.0);
        let vel = Vec2::new(0.001, 0.0);
        let (_, new_vel) = integrate(pos, vel, 5.0, 0.016, 0.9, 300.0, &bounds());
        assert_eq!(new_vel.x, 0.0);
    }
}
