//! Grid components: the owners of planned power grid shapes.

use std::cell::{Ref, RefCell};
use std::fmt::Display;
use std::rc::Rc;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::index::{ShapePtr, ShapeTree, ShapeTreeMap};
use crate::log::*;
use crate::shape::Shape;
use crate::tech::Tech;

/// The role a component plays in its grid.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum GridComponentType {
    Ring,
    Strap,
    Followpin,
    PadConnect,
    RepairChannel,
}

impl Display for GridComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ring => write!(f, "Ring"),
            Self::Strap => write!(f, "Strap"),
            Self::Followpin => write!(f, "Followpin"),
            Self::PadConnect => write!(f, "Pad connect"),
            Self::RepairChannel => write!(f, "Repair channel"),
        }
    }
}

/// A ring, strap or rail set of a grid, holding the shapes it planned.
///
/// Shapes point back at their component through a weak reference,
/// so a component must outlive the shapes it hands out.
#[derive(Debug)]
pub struct GridComponent {
    kind: GridComponentType,
    grid_name: ArcStr,
    shapes: RefCell<ShapeTreeMap>,
}

impl GridComponent {
    pub fn new(kind: GridComponentType, grid_name: impl Into<ArcStr>) -> Rc<Self> {
        Rc::new(Self {
            kind,
            grid_name: grid_name.into(),
            shapes: RefCell::new(ShapeTreeMap::new()),
        })
    }

    #[inline]
    pub fn kind(&self) -> GridComponentType {
        self.kind
    }

    #[inline]
    pub fn grid_name(&self) -> &ArcStr {
        &self.grid_name
    }

    pub fn shapes(&self) -> Ref<'_, ShapeTreeMap> {
        self.shapes.borrow()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.borrow().values().map(|tree| tree.len()).sum()
    }

    /// Takes ownership of `shape` and indexes it on its layer.
    ///
    /// Layer-agnostic shapes are not indexed.
    pub fn add_shape(self: &Rc<Self>, mut shape: Shape) -> ShapePtr {
        shape.set_grid_component(self);
        let layer = shape.layer();
        let ptr = Rc::new(RefCell::new(shape));
        match layer {
            Some(layer) => self
                .shapes
                .borrow_mut()
                .entry(layer)
                .or_default()
                .insert(ptr.clone()),
            None => warn!("{} of {} ignored a shape without a layer", self.kind, self.grid_name),
        }
        ptr
    }

    pub fn remove_shape(&self, shape: &ShapePtr) -> bool {
        let Some(layer) = shape.borrow().layer() else {
            return false;
        };
        let mut shapes = self.shapes.borrow_mut();
        let removed = shapes
            .get_mut(&layer)
            .map(|tree| tree.remove(shape))
            .unwrap_or_default();
        if shapes.get(&layer).map(|tree| tree.is_empty()) == Some(true) {
            shapes.remove(&layer);
        }
        removed
    }

    /// Swaps `old` for `replacements` in the index.
    ///
    /// Returns the indexed replacements, or nothing if `old` did not belong to this component.
    pub fn replace_shape(
        self: &Rc<Self>,
        old: &ShapePtr,
        replacements: Vec<Shape>,
    ) -> Vec<ShapePtr> {
        let Some(layer) = old.borrow().layer() else {
            return Vec::new();
        };
        let ptrs: Vec<ShapePtr> = replacements
            .into_iter()
            .map(|mut shape| {
                shape.set_grid_component(self);
                Rc::new(RefCell::new(shape))
            })
            .collect();
        let mut shapes = self.shapes.borrow_mut();
        let Some(tree) = shapes.get_mut(&layer) else {
            return Vec::new();
        };
        if tree.replace(old, ptrs.iter().cloned()) {
            ptrs
        } else {
            Vec::new()
        }
    }

    /// Trims every modifiable shape of this component around `obstructions`.
    ///
    /// `global` holds obstructions that apply to every layer.
    /// Returns the number of shapes that were cut or removed.
    pub fn cut_shapes(
        self: &Rc<Self>,
        obstructions: &ShapeTreeMap,
        global: Option<&ShapeTree>,
        tech: &Tech,
    ) -> usize {
        let mut layer_obstructions = ShapeTreeMap::new();
        for layer in self.shapes.borrow().keys() {
            let mut tree = ShapeTree::new();
            if let Some(obs) = obstructions.get(layer) {
                tree.extend_from(obs);
            }
            if let Some(obs) = global {
                tree.extend_from(obs);
            }
            if !tree.is_empty() {
                layer_obstructions.insert(*layer, tree);
            }
        }

        let candidates: Vec<ShapePtr> = self
            .shapes
            .borrow()
            .iter()
            .filter(|(layer, _)| layer_obstructions.contains_key(*layer))
            .flat_map(|(_, tree)| tree.values().cloned())
            .collect();

        let mut changed = 0;
        for shape in candidates {
            let cut = {
                let shape = shape.borrow();
                if !shape.is_modifiable() {
                    continue;
                }
                let Some(obs) = shape.layer().and_then(|layer| layer_obstructions.get(&layer)) else {
                    continue;
                };
                shape.cut(obs, tech)
            };
            if let Some(replacements) = cut {
                debug!(
                    "Cut {} into {} shapes",
                    shape.borrow().report_text(tech),
                    replacements.len()
                );
                self.replace_shape(&shape, replacements);
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use pdngeom::{Dir, Rect};

    use super::*;
    use crate::db::WireShapeType;
    use crate::shape::ShapeType;
    use crate::tech::{LayerType, TechLayerInfo};

    fn tech() -> (Tech, crate::tech::LayerKey) {
        let mut tech = Tech::new(1000, 1);
        let m1 = tech.add_layer(
            TechLayerInfo::builder()
                .name("m1")
                .layer_type(LayerType::Routing)
                .direction(Dir::Horiz)
                .width(10)
                .build()
                .unwrap(),
        );
        (tech, m1)
    }

    #[test]
    fn shapes_point_back_at_component() {
        let (tech, m1) = tech();
        let straps = GridComponent::new(GridComponentType::Strap, "core");
        let shape = straps.add_shape(Shape::new(
            &tech,
            m1,
            None,
            Rect::from_coords(0, 0, 100, 10),
            WireShapeType::Stripe,
        ));
        let owner = shape.borrow().grid_component().unwrap();
        assert!(Rc::ptr_eq(&owner, &straps));
        assert_eq!(straps.shape_count(), 1);
        assert!(straps.remove_shape(&shape));
        assert_eq!(straps.shape_count(), 0);
        assert!(!straps.remove_shape(&shape));
    }

    #[test]
    fn cut_shapes_replaces_in_index() {
        let (tech, m1) = tech();
        let straps = GridComponent::new(GridComponentType::Strap, "core");
        let shape = straps.add_shape(Shape::new(
            &tech,
            m1,
            None,
            Rect::from_coords(0, 0, 100, 10),
            WireShapeType::Stripe,
        ));

        let mut obstructions = ShapeTreeMap::new();
        obstructions
            .entry(m1)
            .or_default()
            .insert_obstruction(Rc::new(RefCell::new(Shape::new_obstruction(
                Some(m1),
                Rect::from_coords(40, -5, 60, 15),
                ShapeType::Obs,
            ))));

        assert_eq!(straps.cut_shapes(&obstructions, None, &tech), 1);
        let shapes = straps.shapes();
        let tree = &shapes[&m1];
        assert_eq!(tree.len(), 2);
        assert!(!tree.contains(&shape));
        for ptr in tree.values() {
            assert!(ptr.borrow().grid_component().is_some());
        }
    }

    #[test]
    fn cut_shapes_applies_global_obstructions() {
        let (tech, m1) = tech();
        let straps = GridComponent::new(GridComponentType::Strap, "core");
        straps.add_shape(Shape::new(
            &tech,
            m1,
            None,
            Rect::from_coords(0, 0, 100, 10),
            WireShapeType::Stripe,
        ));

        let mut global = ShapeTree::new();
        global.insert_obstruction(Rc::new(RefCell::new(Shape::new_obstruction(
            None,
            Rect::from_coords(40, -5, 60, 15),
            ShapeType::BlockObs,
        ))));

        assert_eq!(straps.cut_shapes(&ShapeTreeMap::new(), None, &tech), 0);
        assert_eq!(straps.cut_shapes(&ShapeTreeMap::new(), Some(&global), &tech), 1);
        let shapes = straps.shapes();
        let mut rects: Vec<Rect> = shapes[&m1].values().map(|s| s.borrow().rect()).collect();
        rects.sort();
        assert_eq!(
            rects,
            vec![Rect::from_coords(0, 0, 40, 10), Rect::from_coords(60, 0, 100, 10)]
        );
    }

    #[test]
    fn component_type_names() {
        assert_eq!(GridComponentType::PadConnect.to_string(), "Pad connect");
        assert_eq!(GridComponentType::Followpin.to_string(), "Followpin");
    }
}
