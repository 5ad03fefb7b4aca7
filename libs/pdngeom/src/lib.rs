//! Integer layout geometry for power-grid generation.
//!
//! All coordinates are in database units.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use self::bbox::{Bbox, BoundBox};

pub mod bbox;
pub mod polygon;

/// Snaps `pos` to the nearest multiple of `grid`, offset by `offset`.
///
/// Ties are broken towards negative infinity.
pub fn snap_to_grid(pos: i64, grid: i64, offset: i64) -> i64 {
    assert!(grid > 0);

    let rem = (pos - offset).rem_euclid(grid);
    if rem <= grid / 2 {
        pos - rem
    } else {
        pos + grid - rem
    }
}

/// A point in two-dimensional layout-space.
#[derive(
    Debug, Copy, Clone, Default, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    /// Creates a new [`Point`] from (x,y) coordinates.
    #[inline]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The origin.
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, y: 0 }
    }
}

impl std::ops::Add<Point> for Point {
    type Output = Self;
    fn add(self, rhs: Point) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub<Point> for Point {
    type Output = Self;
    fn sub(self, rhs: Point) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<(i64, i64)> for Point {
    #[inline]
    fn from(value: (i64, i64)) -> Self {
        Self::new(value.0, value.1)
    }
}

/// A one-dimensional closed interval.
#[derive(
    Debug, Default, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize, PartialEq, Eq,
)]
pub struct Span {
    start: i64,
    stop: i64,
}

impl Span {
    /// Creates a new [`Span`] between two integers, in either order.
    pub fn new(start: i64, stop: i64) -> Self {
        Self {
            start: start.min(stop),
            stop: start.max(stop),
        }
    }

    /// Creates a span of length `length` centered at `center`.
    ///
    /// Odd lengths put the extra unit on the positive side.
    pub fn from_center_span(center: i64, length: i64) -> Self {
        debug_assert!(length >= 0);
        let start = center - length / 2;
        Self::new(start, start + length)
    }

    #[inline]
    pub fn start(&self) -> i64 {
        self.start
    }

    #[inline]
    pub fn stop(&self) -> i64 {
        self.stop
    }

    #[inline]
    pub fn length(&self) -> i64 {
        self.stop - self.start
    }

    #[inline]
    pub fn center(&self) -> i64 {
        (self.start + self.stop) / 2
    }

    /// Checks if the span intersects with the [`Span`] `other`, endpoints included.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        !(other.stop < self.start || self.stop < other.start)
    }

    /// The overlapping portion of two spans, if any.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let stop = self.stop.min(other.stop);
        (start <= stop).then_some(Self { start, stop })
    }

    /// The smallest span containing both spans.
    pub fn union(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    pub fn contains(self, other: Self) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }

    /// Shrinks both ends by `amount`.
    ///
    /// Returns [`None`] if the span is shorter than `2 * amount`.
    pub fn shrink_all(self, amount: i64) -> Option<Self> {
        if self.length() < 2 * amount {
            return None;
        }
        Some(Self {
            start: self.start + amount,
            stop: self.stop - amount,
        })
    }

    pub fn translate(self, amount: i64) -> Self {
        Self {
            start: self.start + amount,
            stop: self.stop + amount,
        }
    }
}

impl From<(i64, i64)> for Span {
    #[inline]
    fn from(tup: (i64, i64)) -> Self {
        Self::new(tup.0, tup.1)
    }
}

/// An enumeration of axis-aligned directions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    /// The horizontal, or x-aligned, direction.
    #[serde(alias = "horizontal")]
    Horiz,
    /// The vertical, or y-aligned, direction.
    #[serde(alias = "vertical")]
    Vert,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("error parsing direction `{original}`; expected horizontal or vertical")]
pub struct DirParseError {
    original: String,
}

impl FromStr for Dir {
    type Err = DirParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "vertical" | "vert" | "v" => Ok(Self::Vert),
            "horizontal" | "horiz" | "h" => Ok(Self::Horiz),
            _ => Err(DirParseError {
                original: s.to_string(),
            }),
        }
    }
}

impl Dir {
    /// Returns the perpendicular direction.
    pub fn other(self) -> Self {
        match self {
            Self::Horiz => Self::Vert,
            Self::Vert => Self::Horiz,
        }
    }
}

impl Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Horiz => write!(f, "horizontal"),
            Self::Vert => write!(f, "vertical"),
        }
    }
}

impl std::ops::Not for Dir {
    type Output = Self;
    fn not(self) -> Self::Output {
        self.other()
    }
}

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
///
/// Ordering is lexicographic on `(p0, p1)` so rectangles can live in ordered sets.
#[derive(
    Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Rect {
    /// The lower-left corner.
    pub p0: Point,
    /// The upper-right corner.
    pub p1: Point,
}

impl Rect {
    /// Creates a new rectangle from any two opposite corners.
    pub fn new(p0: Point, p1: Point) -> Self {
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }

    /// Creates a rectangle from `(xlo, ylo, xhi, yhi)` coordinates.
    #[inline]
    pub fn from_coords(xlo: i64, ylo: i64, xhi: i64, yhi: i64) -> Self {
        Self::new(Point::new(xlo, ylo), Point::new(xhi, yhi))
    }

    /// Creates a rectangle from horizontal and vertical [`Span`]s.
    pub fn from_spans(h: Span, v: Span) -> Self {
        Self {
            p0: Point::new(h.start(), v.start()),
            p1: Point::new(h.stop(), v.stop()),
        }
    }

    /// Creates a rectangle of the given size centered at `center`.
    pub fn from_center(center: Point, width: i64, height: i64) -> Self {
        Self::from_spans(
            Span::from_center_span(center.x, width),
            Span::from_center_span(center.y, height),
        )
    }

    #[inline]
    pub fn left(&self) -> i64 {
        self.p0.x
    }

    #[inline]
    pub fn bottom(&self) -> i64 {
        self.p0.y
    }

    #[inline]
    pub fn right(&self) -> i64 {
        self.p1.x
    }

    #[inline]
    pub fn top(&self) -> i64 {
        self.p1.y
    }

    /// Returns the horizontal span of the rectangle.
    #[inline]
    pub fn hspan(&self) -> Span {
        Span::new(self.p0.x, self.p1.x)
    }

    /// Returns the vertical span of the rectangle.
    #[inline]
    pub fn vspan(&self) -> Span {
        Span::new(self.p0.y, self.p1.y)
    }

    /// Returns the span of the rectangle along `dir`.
    pub fn span(&self, dir: Dir) -> Span {
        match dir {
            Dir::Horiz => self.hspan(),
            Dir::Vert => self.vspan(),
        }
    }

    /// Returns a [`Rect`] with the given `span` in `dir`, and the current span in the
    /// other direction.
    pub fn with_span(self, span: Span, dir: Dir) -> Self {
        match dir {
            Dir::Horiz => Self::from_spans(span, self.vspan()),
            Dir::Vert => Self::from_spans(self.hspan(), span),
        }
    }

    /// Returns the horizontal width of the rectangle.
    #[inline]
    pub fn width(&self) -> i64 {
        self.p1.x - self.p0.x
    }

    /// Returns the vertical height of the rectangle.
    #[inline]
    pub fn height(&self) -> i64 {
        self.p1.y - self.p0.y
    }

    /// Returns the length of this rectangle in the given direction.
    #[inline]
    pub fn length(&self, dir: Dir) -> i64 {
        self.span(dir).length()
    }

    /// The shorter of the two sides.
    #[inline]
    pub fn min_dim(&self) -> i64 {
        self.width().min(self.height())
    }

    /// The longer of the two sides.
    #[inline]
    pub fn max_dim(&self) -> i64 {
        self.width().max(self.height())
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Returns the center point of the rectangle.
    pub fn center(&self) -> Point {
        Point::new((self.p0.x + self.p1.x) / 2, (self.p0.y + self.p1.y) / 2)
    }

    /// Expands the rectangle by `amount` on all sides.
    #[inline]
    pub fn expand(&self, amount: i64) -> Self {
        self.expand_xy(amount, amount)
    }

    /// Expands the left and right edges by `dx` and the bottom and top edges by `dy`.
    pub fn expand_xy(&self, dx: i64, dy: i64) -> Self {
        Self::new(
            Point::new(self.p0.x - dx, self.p0.y - dy),
            Point::new(self.p1.x + dx, self.p1.y + dy),
        )
    }

    /// Expands the rectangle by `amount` on both sides associated with the direction `dir`.
    #[inline]
    pub fn expand_dir(&self, dir: Dir, amount: i64) -> Self {
        match dir {
            Dir::Horiz => self.expand_xy(amount, 0),
            Dir::Vert => self.expand_xy(0, amount),
        }
    }

    /// The smallest rectangle containing both `self` and `other`.
    pub fn merge(&self, other: &Rect) -> Self {
        Self::from_spans(
            self.hspan().union(other.hspan()),
            self.vspan().union(other.vspan()),
        )
    }

    /// The common region of two rectangles; [`None`] when they are disjoint.
    ///
    /// Rectangles that only touch produce a degenerate (zero-area) intersection.
    pub fn intersection(&self, other: &Rect) -> Option<Self> {
        let h = self.hspan().intersection(&other.hspan())?;
        let v = self.vspan().intersection(&other.vspan())?;
        Some(Self::from_spans(h, v))
    }

    /// Returns true if the rectangles share at least one point, edges included.
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.hspan().intersects(&other.hspan()) && self.vspan().intersects(&other.vspan())
    }

    /// Returns true if the interiors of the rectangles intersect.
    pub fn overlaps_interior(&self, other: &Rect) -> bool {
        self.p0.x < other.p1.x
            && other.p0.x < self.p1.x
            && self.p0.y < other.p1.y
            && other.p0.y < self.p1.y
    }

    /// Returns true if `other` lies entirely within this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        self.hspan().contains(other.hspan()) && self.vspan().contains(other.vspan())
    }

    /// Translates the rectangle by the given offset.
    pub fn translate(&self, offset: Point) -> Self {
        Self {
            p0: self.p0 + offset,
            p1: self.p1 + offset,
        }
    }

    /// Returns a rectangle with the same size centered at `center`.
    pub fn centered_at(&self, center: Point) -> Self {
        self.translate(center - self.center())
    }

    /// Splits `self` into the four (possibly empty) bands left over after removing `clip`.
    ///
    /// The top and bottom bands span the full width of `self`; the left and right
    /// bands span only the rows that `clip` covers.
    pub fn cutout(&self, clip: Rect) -> [Option<Rect>; 4] {
        let src = *self;
        let clip_v = match src.vspan().intersection(&clip.vspan()) {
            Some(v) => v,
            None => return [Some(src), None, None, None],
        };
        let band = |h: Span, v: Span| {
            let r = Rect::from_spans(h, v);
            (r.width() > 0 && r.height() > 0).then_some(r)
        };
        let top = (clip.top() < src.top())
            .then(|| band(src.hspan(), Span::new(clip.top(), src.top())))
            .flatten();
        let bot = (clip.bottom() > src.bottom())
            .then(|| band(src.hspan(), Span::new(src.bottom(), clip.bottom())))
            .flatten();
        let left = (clip.left() > src.left())
            .then(|| band(Span::new(src.left(), clip.left().min(src.right())), clip_v))
            .flatten();
        let right = (clip.right() < src.right())
            .then(|| band(Span::new(clip.right().max(src.left()), src.right()), clip_v))
            .flatten();
        [top, bot, left, right]
    }
}

impl Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) - ({}, {})",
            self.p0.x, self.p0.y, self.p1.x, self.p1.y
        )
    }
}

impl BoundBox for Rect {
    fn bbox(&self) -> Bbox {
        Bbox::new(self.p0, self.p1)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(1, 500, 0), 0);
        assert_eq!(snap_to_grid(999, 500, 0), 1_000);
        assert_eq!(snap_to_grid(260, 500, 0), 500);
        assert_eq!(snap_to_grid(-260, 500, 0), -500);
        assert_eq!(snap_to_grid(130, 100, 50), 150);
    }

    #[test]
    fn test_rect_merge_and_intersection() {
        let a = Rect::from_coords(0, 0, 100, 10);
        let b = Rect::from_coords(50, -5, 150, 5);
        assert_eq!(a.merge(&b), Rect::from_coords(0, -5, 150, 10));
        assert_eq!(a.intersection(&b), Some(Rect::from_coords(50, 0, 100, 5)));

        let c = Rect::from_coords(100, 10, 120, 20);
        assert!(a.overlaps(&c));
        assert!(!a.overlaps_interior(&c));
        assert_eq!(a.intersection(&Rect::from_coords(200, 0, 300, 10)), None);
    }

    #[test]
    fn test_rect_cutout() {
        let src = Rect::from_coords(0, 0, 100, 10);
        let clip = Rect::from_coords(40, -5, 60, 15);
        let bands: Vec<Rect> = src.cutout(clip).into_iter().flatten().collect();
        assert_eq!(
            bands,
            vec![Rect::from_coords(0, 0, 40, 10), Rect::from_coords(60, 0, 100, 10)]
        );

        let corner = Rect::from_coords(90, 5, 120, 20);
        let bands: Vec<Rect> = src.cutout(corner).into_iter().flatten().collect();
        assert_eq!(
            bands,
            vec![Rect::from_coords(0, 0, 100, 5), Rect::from_coords(0, 5, 90, 10)]
        );
    }

    #[test]
    fn test_span_shrink() {
        let span = Span::new(0, 20);
        assert_eq!(span.shrink_all(2), Some(Span::new(2, 18)));
        assert_eq!(span.shrink_all(11), None);
        assert_eq!(Span::from_center_span(10, 5), Span::new(8, 13));
    }

    #[test]
    fn test_dir_parse() {
        assert_eq!("HORIZONTAL".parse::<Dir>(), Ok(Dir::Horiz));
        assert_eq!(" v ".parse::<Dir>(), Ok(Dir::Vert));
        assert!("diagonal".parse::<Dir>().is_err());
    }
}
