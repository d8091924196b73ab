//! Scroll camera
//!
//! The camera is fixed; the world slides under it. `offset` is how far the
//! world has scrolled, in world units.

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollCamera {
    pub offset: f32,
}

impl ScrollCamera {
    pub fn new(offset: f32) -> Self {
        Self { offset }
    }

    pub fn world_to_view(&self) -> Affine2 {
        Affine2::from_translation(Vec2::new(0.0, -self.offset))
    }

    pub fn view_to_world(&self) -> Affine2 {
        Affine2::from_translation(Vec2::new(0.0, self.offset))
    }

    /// Scroll offset implied by an arbitrary world-to-view transform
    pub fn from_world_to_view(transform: &Affine2) -> Self {
        Self {
            offset: -transform.translation.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_view() {
        let camera = ScrollCamera::new(640.0);
        let world = Vec2::new(12.0, 900.0);
        let view = camera.world_to_view().transform_point2(world);
        assert_eq!(view, Vec2::new(12.0, 260.0));
        assert_eq!(camera.view_to_world().transform_point2(view), world);
    }

    #[test]
    fn test_from_transform() {
        let camera = ScrollCamera::new(321.0);
        assert_eq!(ScrollCamera::from_world_to_view(&camera.world_to_view()), camera);
    }
}
