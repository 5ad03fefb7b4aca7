//! R-tree indexes of shapes and vias.
//!
//! Entries are keyed by the bounding box they were inserted with. Mutating an
//! indexed shape does not move its entry; use [`ShapeTree::replace`] to swap
//! a stale entry for updated shapes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use pdngeom::Rect;
use rstar::{RTree, RTreeObject, AABB};

use crate::shape::Shape;
use crate::tech::LayerKey;
use crate::via::Via;

pub type ShapePtr = Rc<RefCell<Shape>>;
pub type ViaPtr = Rc<RefCell<Via>>;

pub type ShapeTree = Tree<Shape>;
pub type ViaTree = Tree<Via>;
pub type ShapeTreeMap = BTreeMap<LayerKey, ShapeTree>;

fn envelope(rect: &Rect) -> AABB<[i64; 2]> {
    AABB::from_corners([rect.left(), rect.bottom()], [rect.right(), rect.top()])
}

/// An indexed value with the box it was inserted under.
#[derive(Debug)]
pub struct Entry<T> {
    bbox: Rect,
    value: Rc<RefCell<T>>,
}

impl<T> Entry<T> {
    #[inline]
    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    #[inline]
    pub fn value(&self) -> &Rc<RefCell<T>> {
        &self.value
    }
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            bbox: self.bbox,
            value: Rc::clone(&self.value),
        }
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.bbox == other.bbox && Rc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> RTreeObject for Entry<T> {
    type Envelope = AABB<[i64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        envelope(&self.bbox)
    }
}

/// A spatial index of shared values.
#[derive(Debug)]
pub struct Tree<T> {
    tree: RTree<Entry<T>>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self { tree: RTree::new() }
    }
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Indexes `value` under `bbox`.
    pub fn insert_with_bbox(&mut self, bbox: Rect, value: Rc<RefCell<T>>) {
        self.tree.insert(Entry { bbox, value });
    }

    /// Removes the entry holding `value`, wherever it was indexed.
    pub fn remove(&mut self, value: &Rc<RefCell<T>>) -> bool {
        let entry = match self.tree.iter().find(|e| Rc::ptr_eq(&e.value, value)) {
            Some(entry) => entry.clone(),
            None => return false,
        };
        self.tree.remove(&entry).is_some()
    }

    pub fn contains(&self, value: &Rc<RefCell<T>>) -> bool {
        self.tree.iter().any(|e| Rc::ptr_eq(&e.value, value))
    }

    /// Entries whose boxes intersect `rect`, edges included.
    pub fn query<'a>(&'a self, rect: &Rect) -> impl Iterator<Item = &'a Entry<T>> + 'a {
        self.tree.locate_in_envelope_intersecting(&envelope(rect))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<T>> {
        self.tree.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Rc<RefCell<T>>> {
        self.tree.iter().map(Entry::value)
    }

    /// Indexes every entry of `other` under the box it already has.
    pub fn extend_from(&mut self, other: &Tree<T>) {
        for entry in other.iter() {
            self.tree.insert(entry.clone());
        }
    }
}

impl Tree<Shape> {
    /// Indexes a shape under its drawn rectangle.
    pub fn insert(&mut self, shape: ShapePtr) {
        let bbox = shape.borrow().rect();
        self.insert_with_bbox(bbox, shape);
    }

    /// Indexes a shape under its obstruction rectangle.
    pub fn insert_obstruction(&mut self, shape: ShapePtr) {
        let bbox = shape.borrow().obstruction();
        self.insert_with_bbox(bbox, shape);
    }

    /// Removes `old` and indexes each of `replacements` under its drawn rectangle.
    ///
    /// Returns false, and inserts nothing, if `old` was not indexed.
    pub fn replace(
        &mut self,
        old: &ShapePtr,
        replacements: impl IntoIterator<Item = ShapePtr>,
    ) -> bool {
        if !self.remove(old) {
            return false;
        }
        for shape in replacements {
            self.insert(shape);
        }
        true
    }
}

impl Tree<Via> {
    /// Indexes a via under its area.
    pub fn insert(&mut self, via: ViaPtr) {
        let bbox = via.borrow().area();
        self.insert_with_bbox(bbox, via);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeType;

    fn obs(rect: Rect) -> ShapePtr {
        Rc::new(RefCell::new(Shape::new_obstruction(None, rect, ShapeType::Obs)))
    }

    #[test]
    fn touching_boxes_intersect() {
        let mut tree = ShapeTree::new();
        tree.insert(obs(Rect::from_coords(0, 0, 10, 10)));
        tree.insert(obs(Rect::from_coords(20, 0, 30, 10)));
        assert_eq!(tree.query(&Rect::from_coords(10, 10, 15, 15)).count(), 1);
        assert_eq!(tree.query(&Rect::from_coords(11, 0, 19, 10)).count(), 0);
        assert_eq!(tree.query(&Rect::from_coords(5, 5, 25, 6)).count(), 2);
    }

    #[test]
    fn replace_swaps_stale_entry() {
        let mut tree = ShapeTree::new();
        let old = obs(Rect::from_coords(0, 0, 100, 10));
        tree.insert(old.clone());

        let left = obs(Rect::from_coords(0, 0, 40, 10));
        let right = obs(Rect::from_coords(60, 0, 100, 10));
        assert!(tree.replace(&old, [left.clone(), right]));
        assert_eq!(tree.len(), 2);
        assert!(!tree.contains(&old));
        assert!(tree.contains(&left));
        assert!(!tree.replace(&old, Vec::new()));

        let hits: Vec<_> = tree.query(&Rect::from_coords(50, 0, 55, 10)).collect();
        assert!(hits.is_empty());
    }
}
