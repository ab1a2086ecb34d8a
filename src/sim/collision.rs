//! Collision detection and response for axis-aligned geometry
//!
//! Bricks, the paddle and pickups are rectangles; balls are circles.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle described by its centre and half extents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec2,
    pub half: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Self {
            center,
            half: size / 2.0,
        }
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.center.x - self.half.x
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.center.x + self.half.x
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.center.y - self.half.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.center.y + self.half.y
    }

    /// Closest point of the rectangle to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.center - self.half, self.center + self.half)
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        (self.center.x - other.center.x).abs() < self.half.x + other.half.x
            && (self.center.y - other.center.y).abs() < self.half.y + other.half.y
    }
}

/// Which velocity component a brick contact reverses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BounceAxis {
    /// Struck on the top or bottom face
    Vertical,
    /// Struck on the left or right face
    Horizontal,
}

/// Circle vs rectangle overlap
pub fn circle_overlaps_rect(center: Vec2, radius: f32, rect: &Aabb) -> bool {
    let closest = rect.closest_point(center);
    center.distance_squared(closest) < radius * radius
}

/// Pick the face a ball struck from its offset to the brick centre.
///
/// Offsets are normalised by the brick's half extents. The larger ratio is the
/// axis with the smallest penetration, so that is the face that was crossed.
/// Ties (dead centre, exact corner) resolve to a horizontal bounce.
pub fn bounce_axis(ball_pos: Vec2, rect: &Aabb) -> BounceAxis {
    let dx = (ball_pos.x - rect.center.x).abs() / rect.half.x.max(f32::EPSILON);
    let dy = (ball_pos.y - rect.center.y).abs() / rect.half.y.max(f32::EPSILON);
    if dy > dx {
        BounceAxis::Vertical
    } else {
        BounceAxis::Horizontal
    }
}

/// Negate the velocity component for `axis`
#[inline]
pub fn reflect_velocity(velocity: Vec2, axis: BounceAxis) -> Vec2 {
    match axis {
        BounceAxis::Vertical => Vec2::new(velocity.x, -velocity.y),
        BounceAxis::Horizontal => Vec2::new(-velocity.x, velocity.y),
    }
}

/// Keep a ball inside the left, right and top walls; the bottom is open.
///
/// Returns true if any wall was hit.
pub fn bounce_off_walls(pos: &mut Vec2, vel: &mut Vec2, radius: f32, field_width: f32) -> bool {
    let mut hit = false;
    if pos.x - radius < 0.0 {
        pos.x = radius;
        vel.x = vel.x.abs();
        hit = true;
    } else if pos.x + radius > field_width {
        pos.x = field_width - radius;
        vel.x = -vel.x.abs();
        hit = true;
    }
    if pos.y - radius < 0.0 {
        pos.y = radius;
        vel.y = vel.y.abs();
        hit = true;
    }
    hit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brick() -> Aabb {
        Aabb::new(Vec2::new(100.0, 100.0), Vec2::new(70.0, 12.0))
    }

    #[test]
    fn test_circle_overlap_edges() {
        let rect = brick();
        // Just below the bottom face, within radius
        assert!(circle_overlaps_rect(Vec2::new(100.0, 110.0), 5.0, &rect));
        // Clear of the bottom face
        assert!(!circle_overlaps_rect(Vec2::new(100.0, 112.0), 5.0, &rect));
        // Near a corner but outside the rounded radius
        assert!(!circle_overlaps_rect(Vec2::new(139.0, 110.0), 5.0, &rect));
    }

    #[test]
    fn test_bounce_axis_from_below() {
        let rect = brick();
        assert_eq!(bounce_axis(Vec2::new(110.0, 109.0), &rect), BounceAxis::Vertical);
    }

    #[test]
    fn test_bounce_axis_from_side() {
        let rect = brick();
        assert_eq!(bounce_axis(Vec2::new(138.0, 102.0), &rect), BounceAxis::Horizontal);
    }

    #[test]
    fn test_reflect_velocity() {
        let v = Vec2::new(100.0, -200.0);
        assert_eq!(reflect_velocity(v, BounceAxis::Vertical), Vec2::new(100.0, 200.0));
        assert_eq!(reflect_velocity(v, BounceAxis::Horizontal), Vec2::new(-100.0, -200.0));
    }

    #[test]
    fn test_walls_reflect_and_clamp() {
        let mut pos = Vec2::new(-3.0, 50.0);
        let mut vel = Vec2::new(-100.0, 50.0);
        assert!(bounce_off_walls(&mut pos, &mut vel, 5.0, 800.0));
        assert_eq!(pos.x, 5.0);
        assert!(vel.x > 0.0);

        let mut pos = Vec2::new(400.0, 2.0);
        let mut vel = Vec2::new(0.0, -300.0);
        assert!(bounce_off_walls(&mut pos, &mut vel, 5.0, 800.0));
        assert!(vel.y > 0.0);

        // Bottom is open
        let mut pos = Vec2::new(400.0, 700.0);
        let mut vel = Vec2::new(0.0, 300.0);
        assert!(!bounce_off_walls(&mut pos, &mut vel, 5.0, 800.0));
        assert!(vel.y > 0.0);
    }

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let b = Aabb::new(Vec2::new(9.0, 0.0), Vec2::new(10.0, 10.0));
        let c = Aabb::new(Vec2::new(11.0, 0.0), Vec2::new(10.0, 10.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
