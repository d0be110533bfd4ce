//! Axis-aligned boxes in PDF point space.

use serde::{Deserialize, Serialize};

/// PDF points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Axis-aligned rectangle in PDF points with a bottom-left page origin.
///
/// `(x, y)` is the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    /// Create a box from its bottom-left corner and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a box from its four edges.
    pub fn from_edges(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self::new(left, bottom, right - left, top - bottom)
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Top edge.
    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    /// Center point.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Vertical center.
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Area of the box.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// A box is valid when all coordinates are finite and both dimensions are positive.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Check if a point lies inside the box, with `tolerance` points of slack.
    pub fn contains_point(&self, x: f64, y: f64, tolerance: f64) -> bool {
        x >= self.x - tolerance
            && x <= self.right() + tolerance
            && y >= self.y - tolerance
            && y <= self.top() + tolerance
    }

    /// Check if this box overlaps with another.
    pub fn overlaps(&self, other: &BBox) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.top()
            && self.top() > other.y
    }

    /// Length of the vertical overlap with another box (0 when disjoint).
    pub fn vertical_overlap(&self, other: &BBox) -> f64 {
        (self.top().min(other.top()) - self.y.max(other.y)).max(0.0)
    }

    /// Length of the horizontal overlap with another box (0 when disjoint).
    pub fn horizontal_overlap(&self, other: &BBox) -> f64 {
        (self.right().min(other.right()) - self.x.max(other.x)).max(0.0)
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.top().max(other.top()),
        )
    }

    /// Smallest box enclosing every box of the iterator, `None` when empty.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a BBox>) -> Option<BBox> {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BBox>, b| match acc {
                Some(a) => Some(a.union(b)),
                None => Some(*b),
            })
    }

    /// Euclidean distance between box centers.
    pub fn center_distance(&self, other: &BBox) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Euclidean distance between the closest points of two boxes (0 when they touch).
    pub fn gap_distance(&self, other: &BBox) -> f64 {
        let dx = (other.x - self.right()).max(self.x - other.right()).max(0.0);
        let dy = (other.y - self.top()).max(self.y - other.top()).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// Move the box (keeping its size) so that it lies inside a page of the given size.
    pub fn clamp_to_page(&self, page_width: f64, page_height: f64) -> BBox {
        let width = self.width.min(page_width);
        let height = self.height.min(page_height);
        BBox::new(
            self.x.clamp(0.0, page_width - width),
            self.y.clamp(0.0, page_height - height),
            width,
            height,
        )
    }
}
