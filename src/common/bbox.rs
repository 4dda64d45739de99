use serde::{Deserialize, Serialize};

/// Axis-aligned box in normalized frame coordinates, origin at the top-left corner.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Builds a box from its center and size.
    ///
    /// # Arguments
    ///
    /// * `cx` - The x-coordinate of the horizontal center.
    /// * `cy` - The y-coordinate of the vertical center.
    /// * `w` - The width of the bounding box.
    /// * `h` - The height of the bounding box.
    pub fn with_cxcy_wh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x: cx - w / 2.,
            y: cy - h / 2.,
            w,
            h,
        }
    }

    /// Returns the maximum x-coordinate of the bounding box.
    pub fn x_max(&self) -> f32 {
        self.x + self.w
    }

    /// Returns the maximum y-coordinate of the bounding box.
    pub fn y_max(&self) -> f32 {
        self.y + self.h
    }

    /// Returns the center x-coordinate of the bounding box.
    pub fn cx(&self) -> f32 {
        self.x + self.w / 2.
    }

    /// Returns the center y-coordinate of the bounding box.
    pub fn cy(&self) -> f32 {
        self.y + self.h / 2.
    }

    /// Returns the bounding box coordinates and size as `(x, y, w, h)`.
    pub fn xy_wh(&self) -> (f32, f32, f32, f32) {
        (self.x, self.y, self.w, self.h)
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// Computes the intersection area between this bounding box and another.
    pub fn intersect(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x);
        let right = self.x_max().min(other.x_max());
        let top = self.y.max(other.y);
        let bottom = self.y_max().min(other.y_max());
        (right - left).max(0.) * (bottom - top).max(0.)
    }

    /// Computes the union area between this bounding box and another.
    pub fn union(&self, other: &BoundingBox) -> f32 {
        self.area() + other.area() - self.intersect(other)
    }

    /// Intersection over union. Degenerate pairs (zero union) report no overlap.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = self.union(other);
        if union > 0. {
            self.intersect(other) / union
        } else {
            0.
        }
    }

    /// Clamps the origin into `[0, 1]` and the size so the box never leaves the frame.
    pub fn clamped(&self) -> Self {
        let x = unit(self.x);
        let y = unit(self.y);
        let w = finite_or_zero(self.w).clamp(0., 1. - x);
        let h = finite_or_zero(self.h).clamp(0., 1. - y);
        Self { x, y, w, h }
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.
    }
}

fn unit(v: f32) -> f32 {
    finite_or_zero(v).clamp(0., 1.)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BoundingBox::new(0.1, 0.1, 0.2, 0.2);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 0.1, 0.1);
        let b = BoundingBox::new(0.5, 0.5, 0.1, 0.1);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn zero_area_boxes_do_not_divide_by_zero() {
        let a = BoundingBox::new(0.3, 0.3, 0.0, 0.0);
        assert_eq!(a.iou(&a), 0.0);
    }

    #[test]
    fn clamped_box_stays_inside_frame() {
        let b = BoundingBox::new(-0.2, 0.7, 0.5, 0.6).clamped();
        assert_eq!(b.x, 0.0);
        assert_eq!(b.y, 0.7);
        assert!((b.w - 0.5).abs() < 1e-6);
        assert!(b.y_max() <= 1.0 + 1e-6);
        assert!((b.h - 0.3).abs() < 1e-6);
    }

    #[test]
    fn clamped_handles_non_finite_values() {
        let b = BoundingBox::new(f32::NAN, 0.2, f32::INFINITY, 0.1).clamped();
        assert_eq!(b.x, 0.0);
        assert_eq!(b.w, 0.0);
    }
}
