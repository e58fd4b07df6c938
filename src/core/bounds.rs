//! World bounds.
//!
//! Rectangle `[0, W] × [0, H]` with an entity-radius inset (spec.md §3).

use rand::Rng;

use super::vector::Vec2;

/// Axis-aligned world bounds, inset by an entity radius so a clamped
/// entity's collision circle never pokes outside `[0, W] × [0, H]`.
#[derive(Clone, Copy, Debug)]
pub struct WorldBounds {
    /// Width of the arena.
    pub width: f64,
    /// Height of the arena.
    pub height: f64,
}

impl WorldBounds {
    /// Construct bounds for a `width × height` arena.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Clamp `pos` so a circle of `radius` centered at `pos` stays
    /// entirely inside the arena. Returns the clamped position and which
    /// axes were clamped (`x`, `y`), so callers can zero the matching
    /// velocity component.
    pub fn clamp(&self, pos: Vec2, radius: f64) -> (Vec2, ClampedAxes) {
        let min_x = radius;
        let max_x = (self.width - radius).max(min_x);
        let min_y = radius;
        let max_y = (self.height - radius).max(min_y);

        let clamped_x = pos.x.clamp(min_x, max_x);
        let clamped_y = pos.y.clamp(min_y, max_y);

        (
            Vec2::new(clamped_x, clamped_y),
            ClampedAxes {
                x: clamped_x != pos.x,
                y: clamped_y != pos.y,
            },
        )
    }

    /// `true` if a circle of `radius` at `pos` lies entirely within bounds.
    pub fn contains(&self, pos: Vec2, radius: f64) -> bool {
        let (clamped, axes) = self.clamp(pos, radius);
        let _ = clamped;
        !axes.x && !axes.y
    }

    /// Sample a uniformly random point at least `radius` from every edge.
    pub fn random_spawn(&self, radius: f64, rng: &mut impl Rng) -> Vec2 {
        let min_x = radius;
        let max_x = (self.width - radius).max(min_x);
        let min_y = radius;
        let max_y = (self.height - radius).max(min_y);
        Vec2::new(rng.gen_range(min_x..=max_x), rng.gen_range(min_y..=max_y))
    }
}

/// Which axes a clamp operation actually moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClampedAxes {
    /// The x component was clamped.
    pub x: bool,
    /// The y component was clamped.
    pub y: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn clamp_keeps_interior_points_untouched() {
        let bounds = WorldBounds::new(100.0, 100.0);
        let (pos, axes) = bounds.clamp(Vec2::new(50.0, 50.0), 5.0);
        assert_eq!(pos, Vec2::new(50.0, 50.0));
        assert_eq!(axes, ClampedAxes::default());
    }

    #[test]
    fn clamp_pulls_in_outward_points() {
        let bounds = WorldBounds::new(100.0, 100.0);
        let (pos, axes) = bounds.clamp(Vec2::new(-10.0, 200.0), 5.0);
        assert_eq!(pos, Vec2::new(5.0, 95.0));
        assert!(axes.x);
        assert!(axes.y);
    }

    #[test]
    fn contains_reports_boundary_correctly() {
        let bounds = WorldBounds::new(100.0, 100.0);
        assert!(bounds.contains(Vec2::new(50.0, 50.0), 5.0));
        assert!(!bounds.contains(Vec2::new(1.0, 50.0), 5.0));
    }

    proptest::proptest! {
        /// `clamp` always returns a position `contains` accepts, for
        /// any starting point and any radius up to half the smaller
        /// dimension (spec.md §3 "World bounds: entity-radius inset").
        #[test]
        fn clamp_always_lands_inside_bounds(
            x in -500.0f64..1500.0,
            y in -500.0f64..1500.0,
            radius in 1.0f64..40.0,
        ) {
            let bounds = WorldBounds::new(100.0, 100.0);
            let (clamped, _) = bounds.clamp(Vec2::new(x, y), radius);
            proptest::prop_assert!(bounds.contains(clamped, radius));
        }

        /// `random_spawn` always produces a point already inside
        /// bounds, for any radius up to half the smaller dimension.
        #[test]
        fn random_spawn_is_always_in_bounds(radius in 1.0f64..40.0, seed in 0u64..10_000) {
            let bounds = WorldBounds::new(100.0, 100.0);
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let pos = bounds.random_spawn(radius, &mut rng);
            proptest::prop_assert!(bounds.contains(pos, radius));
        }
    }
}
