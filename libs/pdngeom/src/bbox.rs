//! Rectangular bounding boxes that may be empty.

use serde::{Deserialize, Serialize};

use super::{Point, Rect};

/// An axis-aligned rectangular bounding box.
///
/// Unlike [`Rect`], a [`Bbox`] can be empty, meaning that `p0`
/// is to the upper right of `p1`. The empty box is the identity for
/// [`Bbox::union`], which makes it the natural seed for accumulating
/// the extent of a set of rectangles.
#[derive(Debug, Copy, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Bbox {
    pub p0: Point,
    pub p1: Point,
}

impl Bbox {
    /// Create a new [`Bbox`] from two [`Point`]s.
    #[inline]
    pub fn new(p0: Point, p1: Point) -> Self {
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }

    /// Creates an empty, otherwise invalid bounding box.
    pub fn empty() -> Self {
        Self {
            p0: Point::new(i64::MAX, i64::MAX),
            p1: Point::new(i64::MIN, i64::MIN),
        }
    }

    /// Returns `true` if the bounding box is empty.
    pub fn is_empty(&self) -> bool {
        self.p0.x > self.p1.x || self.p0.y > self.p1.y
    }

    /// The smallest box containing both boxes.
    pub fn union(&self, other: Bbox) -> Bbox {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return other;
        }
        Bbox::new(
            Point::new(self.p0.x.min(other.p0.x), self.p0.y.min(other.p0.y)),
            Point::new(self.p1.x.max(other.p1.x), self.p1.y.max(other.p1.y)),
        )
    }

    /// Converts a non-empty bounding box into a [`Rect`].
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the box is empty.
    #[inline]
    pub fn into_rect(self) -> Rect {
        debug_assert!(!self.is_empty());
        Rect {
            p0: self.p0,
            p1: self.p1,
        }
    }

    /// Converts into a [`Rect`], or [`None`] if the box is empty.
    #[inline]
    pub fn rect(self) -> Option<Rect> {
        (!self.is_empty()).then(|| self.into_rect())
    }
}

impl Default for Bbox {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Rect> for Bbox {
    fn from(r: Rect) -> Self {
        Self { p0: r.p0, p1: r.p1 }
    }
}

/// A trait representing functions available for objects with a bounding box.
pub trait BoundBox {
    /// Compute a rectangular bounding box around the implementing type.
    fn bbox(&self) -> Bbox;
}

impl<T> BoundBox for &T
where
    T: BoundBox,
{
    fn bbox(&self) -> Bbox {
        T::bbox(*self)
    }
}

impl BoundBox for Bbox {
    fn bbox(&self) -> Bbox {
        *self
    }
}

impl<T: BoundBox> BoundBox for [T] {
    fn bbox(&self) -> Bbox {
        self.iter()
            .fold(Bbox::empty(), |acc, item| acc.union(item.bbox()))
    }
}

impl<T: BoundBox> BoundBox for std::collections::BTreeSet<T> {
    fn bbox(&self) -> Bbox {
        self.iter()
            .fold(Bbox::empty(), |acc, item| acc.union(item.bbox()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_union_identity() {
        let r = Rect::from_coords(0, 0, 10, 20);
        assert_eq!(Bbox::empty().union(r.bbox()).rect(), Some(r));
        assert_eq!(Bbox::empty().rect(), None);

        let rects = [r, Rect::from_coords(-5, 5, 2, 30)];
        assert_eq!(rects[..].bbox().rect(), Some(Rect::from_coords(-5, 0, 10, 30)));
    }
}
