//! Manhattan polygon sets.
//!
//! A [`Polygon90Set`] is a region of the plane made of axis-aligned rectangles.
//! It supports the boolean operations needed to trim wires around obstructions,
//! and can be decomposed back into maximal rectangles.

use serde::{Deserialize, Serialize};

use crate::bbox::{Bbox, BoundBox};
use crate::{Rect, Span};

/// A set of points in the plane bounded by axis-aligned edges.
///
/// Internally stored as a list of interior-disjoint rectangles.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Polygon90Set {
    rects: Vec<Rect>,
}

impl Polygon90Set {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set covering exactly the given rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        let mut set = Self::new();
        set.insert(rect);
        set
    }

    /// Returns `true` if the set covers no area.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Adds a rectangle to the set.
    pub fn insert(&mut self, rect: Rect) {
        if rect.area() == 0 {
            return;
        }
        // keep fragments interior-disjoint
        let mut pieces = vec![rect];
        for existing in self.rects.iter() {
            pieces = pieces
                .into_iter()
                .flat_map(|piece| subtract_rect(piece, *existing))
                .collect();
            if pieces.is_empty() {
                return;
            }
        }
        self.rects.extend(pieces);
    }

    /// Removes the region covered by `rect` from the set.
    pub fn subtract(&mut self, rect: Rect) {
        self.rects = self
            .rects
            .drain(..)
            .flat_map(|piece| subtract_rect(piece, rect))
            .collect();
    }

    /// Removes the region covered by `other` from the set.
    pub fn difference(&mut self, other: &Polygon90Set) {
        for rect in other.rects.iter() {
            self.subtract(*rect);
        }
    }

    /// Total area covered by the set.
    pub fn area(&self) -> i64 {
        self.rects.iter().map(Rect::area).sum()
    }

    /// Decomposes the set into rectangles.
    ///
    /// The region is sliced into horizontal bands at every distinct y-coordinate.
    /// Within a band, touching x-intervals are joined; vertically adjacent bands with
    /// identical intervals are then joined. The result is sorted and deterministic
    /// regardless of how the set was built.
    pub fn rectangles(&self) -> Vec<Rect> {
        let mut ys: Vec<i64> = self
            .rects
            .iter()
            .flat_map(|r| [r.bottom(), r.top()])
            .collect();
        ys.sort_unstable();
        ys.dedup();

        let mut done = Vec::new();
        // intervals of the band directly below, along with the y at which they started
        let mut open: Vec<(Span, i64)> = Vec::new();

        for band in ys.windows(2) {
            let (ylo, yhi) = (band[0], band[1]);
            let mut intervals: Vec<Span> = self
                .rects
                .iter()
                .filter(|r| r.bottom() <= ylo && r.top() >= yhi)
                .map(|r| r.hspan())
                .collect();
            intervals.sort();
            let intervals = join_intervals(intervals);

            let mut next_open = Vec::with_capacity(intervals.len());
            for span in intervals {
                match open.iter().position(|(s, _)| *s == span) {
                    Some(idx) => next_open.push(open.swap_remove(idx)),
                    None => next_open.push((span, ylo)),
                }
            }
            done.extend(
                open.drain(..)
                    .map(|(span, start)| Rect::from_spans(span, Span::new(start, ylo))),
            );
            open = next_open;
        }
        if let Some(&ymax) = ys.last() {
            done.extend(
                open.drain(..)
                    .map(|(span, start)| Rect::from_spans(span, Span::new(start, ymax))),
            );
        }

        done.sort();
        done
    }
}

impl From<Rect> for Polygon90Set {
    fn from(value: Rect) -> Self {
        Self::from_rect(value)
    }
}

impl FromIterator<Rect> for Polygon90Set {
    fn from_iter<T: IntoIterator<Item = Rect>>(iter: T) -> Self {
        let mut set = Self::new();
        for rect in iter {
            set.insert(rect);
        }
        set
    }
}

impl std::ops::SubAssign<Rect> for Polygon90Set {
    fn sub_assign(&mut self, rhs: Rect) {
        self.subtract(rhs);
    }
}

impl std::ops::SubAssign<&Polygon90Set> for Polygon90Set {
    fn sub_assign(&mut self, rhs: &Polygon90Set) {
        self.difference(rhs);
    }
}

impl BoundBox for Polygon90Set {
    fn bbox(&self) -> Bbox {
        self.rects.as_slice().bbox()
    }
}

/// The parts of `src` not covered by the interior of `clip`.
fn subtract_rect(src: Rect, clip: Rect) -> Vec<Rect> {
    if !src.overlaps_interior(&clip) {
        return vec![src];
    }
    src.cutout(clip).into_iter().flatten().collect()
}

/// Joins sorted intervals that overlap or touch.
fn join_intervals(sorted: Vec<Span>) -> Vec<Span> {
    let mut joined: Vec<Span> = Vec::with_capacity(sorted.len());
    for span in sorted {
        match joined.last_mut() {
            Some(last) if last.stop() >= span.start() => *last = last.union(span),
            _ => joined.push(span),
        }
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtract_strip_from_wire() {
        let mut set = Polygon90Set::from_rect(Rect::from_coords(0, 0, 100, 10));
        set -= Rect::from_coords(40, -5, 60, 15);
        assert_eq!(
            set.rectangles(),
            vec![Rect::from_coords(0, 0, 40, 10), Rect::from_coords(60, 0, 100, 10)]
        );
    }

    #[test]
    fn subtract_corner_leaves_sliver() {
        let mut set = Polygon90Set::from_rect(Rect::from_coords(0, 0, 100, 10));
        set -= Rect::from_coords(90, 5, 120, 20);
        assert_eq!(
            set.rectangles(),
            vec![Rect::from_coords(0, 0, 100, 5), Rect::from_coords(0, 5, 90, 10)]
        );
        assert_eq!(set.area(), 100 * 5 + 90 * 5);
    }

    #[test]
    fn rectangles_are_maximal_vertically() {
        // two stacked rectangles of the same width become one
        let set: Polygon90Set = [
            Rect::from_coords(0, 0, 10, 50),
            Rect::from_coords(0, 50, 10, 100),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.rectangles(), vec![Rect::from_coords(0, 0, 10, 100)]);
    }

    #[test]
    fn full_consumption_is_empty() {
        let mut set = Polygon90Set::from_rect(Rect::from_coords(0, 0, 100, 10));
        set -= Rect::from_coords(-10, -10, 110, 20);
        assert!(set.is_empty());
        assert!(set.rectangles().is_empty());
    }

    #[test]
    fn overlapping_inserts_do_not_double_count() {
        let set: Polygon90Set = [
            Rect::from_coords(0, 0, 10, 10),
            Rect::from_coords(5, 5, 15, 15),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.area(), 100 + 100 - 25);
    }
}
