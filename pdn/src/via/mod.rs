//! Vias: materialized connections between a lower and an upper shape.

use std::rc::{Rc, Weak};

use pdngeom::bbox::{Bbox, BoundBox};
use pdngeom::Rect;

use crate::connect::Connect;
use crate::db::{Block, NetKey, SBox, SWireKey, WireShapeType};
use crate::error::{with_err_context, ErrorContext, ErrorSource, Result};
use crate::index::ShapePtr;
use crate::log::*;
use crate::shape::rect_text;
use crate::tech::{LayerKey, Tech};

use self::db::GenerateVia;

pub mod db;
pub mod generator;

/// A via placed where two shapes of a net cross.
///
/// A via shares ownership of its shapes; shapes only hold weak references
/// back to their vias.
#[derive(Debug, Clone)]
pub struct Via {
    net: Option<NetKey>,
    area: Rect,
    lower: Option<ShapePtr>,
    upper: Option<ShapePtr>,
    connect: Weak<Connect>,
}

impl Via {
    pub fn new(
        connect: Weak<Connect>,
        net: Option<NetKey>,
        area: Rect,
        lower: ShapePtr,
        upper: ShapePtr,
    ) -> Self {
        Self {
            net,
            area,
            lower: Some(lower),
            upper: Some(upper),
            connect,
        }
    }

    #[inline]
    pub fn net(&self) -> Option<NetKey> {
        self.net
    }

    #[inline]
    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn bbox(&self) -> Bbox {
        self.area.bbox()
    }

    pub fn lower_shape(&self) -> Option<&ShapePtr> {
        self.lower.as_ref()
    }

    pub fn upper_shape(&self) -> Option<&ShapePtr> {
        self.upper.as_ref()
    }

    pub fn set_lower_shape(&mut self, shape: ShapePtr) {
        self.lower = Some(shape);
    }

    pub fn set_upper_shape(&mut self, shape: ShapePtr) {
        self.upper = Some(shape);
    }

    pub fn lower_layer(&self) -> Option<LayerKey> {
        self.lower.as_ref().and_then(|shape| shape.borrow().layer())
    }

    pub fn upper_layer(&self) -> Option<LayerKey> {
        self.upper.as_ref().and_then(|shape| shape.borrow().layer())
    }

    /// Drops `shape` if it is the lower or upper shape of this via.
    pub fn remove_shape(&mut self, shape: &ShapePtr) {
        if self.lower.as_ref().is_some_and(|s| Rc::ptr_eq(s, shape)) {
            self.lower = None;
        }
        if self.upper.as_ref().is_some_and(|s| Rc::ptr_eq(s, shape)) {
            self.upper = None;
        }
    }

    pub fn connect(&self) -> Option<Rc<Connect>> {
        self.connect.upgrade()
    }

    fn levels(&self, tech: &Tech) -> Option<(usize, usize)> {
        let level = |layer: Option<LayerKey>| Some(tech.get(layer?)?.level());
        Some((level(self.lower_layer())?, level(self.upper_layer())?))
    }

    /// A via is valid while it has both shapes and goes upwards.
    pub fn is_valid(&self, tech: &Tech) -> bool {
        matches!(self.levels(tech), Some((lower, upper)) if lower < upper)
    }

    /// Returns true if `layer` lies strictly between the lower and upper layers.
    pub fn contains_intermediate_layer(&self, tech: &Tech, layer: LayerKey) -> bool {
        let (Some((lower, upper)), Some(layer)) = (self.levels(tech), tech.get(layer)) else {
            return false;
        };
        lower < layer.level() && layer.level() < upper
    }

    /// Returns true if both vias span a common layer and their areas touch.
    pub fn overlaps(&self, other: &Via, tech: &Tech) -> bool {
        let (Some((lower, upper)), Some((other_lower, other_upper))) =
            (self.levels(tech), other.levels(tech))
        else {
            return false;
        };
        lower <= other_upper && other_lower <= upper && self.area.overlaps(&other.area)
    }

    /// Returns true if this via starts on a lower layer than `other`.
    pub fn starts_below(&self, other: &Via, tech: &Tech) -> bool {
        match (self.levels(tech), other.levels(tech)) {
            (Some((lower, _)), Some((other_lower, _))) => lower < other_lower,
            _ => false,
        }
    }

    /// Stamps the via into `wire`, centered on its area.
    pub fn write_to_db(&self, block: &mut Block, wire: SWireKey, tech: &Tech) -> Result<()> {
        with_err_context(self.write_to_db_inner(block, wire, tech), || {
            ErrorContext::WriteVia(self.report_text(tech))
        })
    }

    fn write_to_db_inner(&self, block: &mut Block, wire: SWireKey, tech: &Tech) -> Result<()> {
        let connect = self
            .connect
            .upgrade()
            .ok_or_else(|| ErrorSource::InvalidArgs("via has no connection".to_string()))?;
        let (Some(lower), Some(upper)) = (&self.lower, &self.upper) else {
            return Err(ErrorSource::MissingShape(rect_text(&self.area, tech.dbu_per_micron())).into());
        };
        let (lower, upper) = (lower.borrow(), upper.borrow());

        let shape_type = if lower.wire_type() == WireShapeType::FollowPin {
            upper.wire_type()
        } else {
            lower.wire_type()
        };

        let via = connect.make_db_via(tech, lower.rect(), upper.rect());
        let center = self.area.center();
        debug!("Writing via at {}", self.report_text(tech));
        let shapes = via.generate(block, wire, shape_type, center.x, center.y)?;

        if via.requires_patch() {
            for (layer, rects) in [(connect.lower(), &shapes.bottom), (connect.upper(), &shapes.top)] {
                if rects.len() < 2 {
                    continue;
                }
                if let Some(rect) = rects.bbox().rect() {
                    block.add_sbox(
                        wire,
                        SBox::Rect {
                            layer,
                            rect,
                            shape_type,
                        },
                    )?;
                }
            }
        }
        Ok(())
    }

    pub fn display_text(&self, tech: &Tech, block: &Block) -> String {
        let net = self
            .net
            .and_then(|net| block.net(net).ok())
            .map(|net| net.name.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "{net}:{}-{}",
            tech.layer_name(self.lower_layer()),
            tech.layer_name(self.upper_layer())
        )
    }

    pub fn report_text(&self, tech: &Tech) -> String {
        format!(
            "{} from {} to {}",
            rect_text(&self.area, tech.dbu_per_micron()),
            tech.layer_name(self.lower_layer()),
            tech.layer_name(self.upper_layer())
        )
    }

    /// A new via over the same area and shapes.
    pub fn copy(&self) -> Self {
        self.clone()
    }
}
