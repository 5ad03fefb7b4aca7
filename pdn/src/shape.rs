//! Power grid wire segments and the obstruction halos they carry.
//!
//! A [`Shape`] is one rectangle on one routing layer. Besides its drawn
//! rectangle it tracks the region other geometry must keep out of, which is
//! derived from the layer's spacing, spacing table and end-of-line rules, and
//! the terminals and vias it connects to.
//!
//! Shapes are shared through [`ShapePtr`](crate::index::ShapePtr)s. Operations that change the
//! drawn rectangle of an indexed shape return new shapes instead of mutating
//! it, and the caller swaps them into the index with [`ShapeTree::replace`].

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use arcstr::ArcStr;
use pdngeom::bbox::BoundBox;
use pdngeom::polygon::Polygon90Set;
use pdngeom::{Dir, Rect};

use crate::db::{BPin, Block, NetKey, PinBox, PlacementStatus, Row, SBox, SWireKey, WireShapeType};
use crate::error::{with_err_context, ErrorContext, ErrorSource, Result};
use crate::grid::GridComponent;
use crate::index::{ShapeTree, ShapeTreeMap, ViaPtr};
use crate::log::*;
use crate::tech::{LayerKey, Tech};
use crate::via::Via;

/// What a shape represents to the grid builder.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug)]
pub enum ShapeType {
    /// A wire planned by the grid.
    #[default]
    Shape,
    /// Keep-out region of another grid.
    GridObs,
    /// Keep-out region of a placed block.
    BlockObs,
    Obs,
    /// Existing geometry that must not be changed.
    Fixed,
}

/// Extra state carried by specialized shapes.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum ShapeKind {
    #[default]
    Plain,
    /// A standard cell rail, with the rows it powers.
    FollowPin { rows: BTreeSet<Row> },
}

#[derive(Debug)]
pub struct Shape {
    layer: Option<LayerKey>,
    net: Option<NetKey>,
    rect: Rect,
    obs: Rect,
    wire_type: WireShapeType,
    shape_type: ShapeType,
    iterm_connections: BTreeSet<Rect>,
    bterm_connections: BTreeSet<Rect>,
    vias: Vec<Weak<RefCell<Via>>>,
    grid_component: Weak<GridComponent>,
    kind: ShapeKind,
}

impl Shape {
    /// Creates a wire on `layer` with its obstruction computed.
    pub fn new(
        tech: &Tech,
        layer: LayerKey,
        net: Option<NetKey>,
        rect: Rect,
        wire_type: WireShapeType,
    ) -> Self {
        let mut shape = Self {
            layer: Some(layer),
            net,
            rect,
            obs: rect,
            wire_type,
            shape_type: ShapeType::Shape,
            iterm_connections: BTreeSet::new(),
            bterm_connections: BTreeSet::new(),
            vias: Vec::new(),
            grid_component: Weak::new(),
            kind: ShapeKind::Plain,
        };
        shape.generate_obstruction(tech);
        shape
    }

    /// Creates a keep-out region whose obstruction is the rectangle itself.
    ///
    /// Obstructions without a layer block every layer.
    pub fn new_obstruction(layer: Option<LayerKey>, rect: Rect, shape_type: ShapeType) -> Self {
        Self {
            layer,
            net: None,
            rect,
            obs: rect,
            wire_type: WireShapeType::None,
            shape_type,
            iterm_connections: BTreeSet::new(),
            bterm_connections: BTreeSet::new(),
            vias: Vec::new(),
            grid_component: Weak::new(),
            kind: ShapeKind::Plain,
        }
    }

    /// Creates a follow-pin rail powering `rows`.
    pub fn new_follow_pin(
        tech: &Tech,
        layer: LayerKey,
        net: Option<NetKey>,
        rect: Rect,
        rows: BTreeSet<Row>,
    ) -> Self {
        let mut shape = Self::new(tech, layer, net, rect, WireShapeType::FollowPin);
        shape.kind = ShapeKind::FollowPin { rows };
        shape
    }

    /// Copies the shape without its vias.
    pub fn copy(&self) -> Self {
        Self {
            layer: self.layer,
            net: self.net,
            rect: self.rect,
            obs: self.obs,
            wire_type: self.wire_type,
            shape_type: self.shape_type,
            iterm_connections: self.iterm_connections.clone(),
            bterm_connections: self.bterm_connections.clone(),
            vias: Vec::new(),
            grid_component: self.grid_component.clone(),
            kind: self.kind.clone(),
        }
    }

    #[inline]
    pub fn layer(&self) -> Option<LayerKey> {
        self.layer
    }

    #[inline]
    pub fn net(&self) -> Option<NetKey> {
        self.net
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Replaces the drawn rectangle and recomputes the obstruction.
    pub fn set_rect(&mut self, rect: Rect, tech: &Tech) {
        self.rect = rect;
        self.generate_obstruction(tech);
    }

    #[inline]
    pub fn obstruction(&self) -> Rect {
        self.obs
    }

    /// Overrides the computed obstruction.
    pub fn set_obstruction(&mut self, obs: Rect) {
        self.obs = obs;
    }

    #[inline]
    pub fn wire_type(&self) -> WireShapeType {
        self.wire_type
    }

    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    pub fn set_shape_type(&mut self, shape_type: ShapeType) {
        self.shape_type = shape_type;
    }

    #[inline]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    pub fn is_follow_pin(&self) -> bool {
        matches!(self.kind, ShapeKind::FollowPin { .. })
    }

    /// The rows powered by a follow-pin rail; empty for other shapes.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        let rows = match &self.kind {
            ShapeKind::FollowPin { rows } => Some(rows.iter()),
            ShapeKind::Plain => None,
        };
        rows.into_iter().flatten()
    }

    pub fn grid_component(&self) -> Option<Rc<GridComponent>> {
        self.grid_component.upgrade()
    }

    pub fn set_grid_component(&mut self, component: &Rc<GridComponent>) {
        self.grid_component = Rc::downgrade(component);
    }

    pub fn is_horizontal(&self) -> bool {
        self.rect.width() > self.rect.height()
    }

    pub fn is_vertical(&self) -> bool {
        self.rect.width() < self.rect.height()
    }

    pub fn is_square(&self) -> bool {
        self.rect.width() == self.rect.height()
    }

    /// The direction the shape runs in, or [`None`] for squares.
    pub fn orientation(&self) -> Option<Dir> {
        if self.is_horizontal() {
            Some(Dir::Horiz)
        } else if self.is_vertical() {
            Some(Dir::Vert)
        } else {
            None
        }
    }

    #[inline]
    pub fn width(&self) -> i64 {
        self.rect.min_dim()
    }

    #[inline]
    pub fn length(&self) -> i64 {
        self.rect.max_dim()
    }

    /// Returns false if the shape violates its layer's minimum area rule.
    pub fn is_valid(&self, tech: &Tech) -> bool {
        let Some(layer) = self.layer.and_then(|key| tech.get(key)) else {
            return true;
        };
        match layer.area() {
            Some(area) => self.rect.area() >= area,
            None => true,
        }
    }

    /// Returns true if the shape runs against its layer's preferred direction.
    pub fn is_wrong_way(&self, tech: &Tech) -> bool {
        let dir = self
            .layer
            .and_then(|key| tech.get(key))
            .and_then(|layer| layer.direction());
        match (dir, self.orientation()) {
            (Some(dir), Some(orientation)) => dir != orientation,
            _ => false,
        }
    }

    /// Recomputes the obstruction from the layer's spacing rules.
    pub fn generate_obstruction(&mut self, tech: &Tech) {
        let Some(layer) = self.layer.and_then(|key| tech.get(key)) else {
            self.obs = self.rect;
            return;
        };
        let width = self.width();
        let length = self.length();

        let mut obs = self.rect.expand(layer.spacing(width, length));

        let wrong_way = self.is_wrong_way(tech);
        for rule in layer.spacing_table_prl_rules() {
            if rule.wrong_direction && !wrong_way {
                continue;
            }
            obs = obs.merge(&self.rect.expand(rule.spacing(width, length)));
        }

        let long_axis = if self.is_horizontal() {
            Dir::Horiz
        } else {
            Dir::Vert
        };
        for rule in layer.spacing_eol_rules() {
            if width > rule.eol_width {
                continue;
            }
            obs = obs.merge(&self.rect.expand_dir(long_axis, rule.eol_space));
        }

        self.obs = obs;
    }

    /// Grows this shape to cover `other` and takes over its connections.
    pub fn merge(&mut self, other: &Shape, tech: &Tech) {
        self.rect = self.rect.merge(&other.rect);
        self.iterm_connections
            .extend(other.iterm_connections.iter().copied());
        self.bterm_connections
            .extend(other.bterm_connections.iter().copied());
        if let (ShapeKind::FollowPin { rows }, ShapeKind::FollowPin { rows: others }) =
            (&mut self.kind, &other.kind)
        {
            rows.extend(others.iter().cloned());
        }
        self.generate_obstruction(tech);
    }

    /// Drops connections that no longer touch the drawn rectangle.
    pub fn update_term_connections(&mut self) {
        let rect = self.rect;
        self.iterm_connections.retain(|term| rect.overlaps(term));
        self.bterm_connections.retain(|term| rect.overlaps(term));
        if let ShapeKind::FollowPin { rows } = &mut self.kind {
            rows.retain(|row| rect.overlaps(&row.bbox));
        }
    }

    /// Removes the obstructions in `obstructions` from this shape.
    ///
    /// Obstructions on other layers are ignored, and follow-pin rails ignore
    /// the obstructions of other grids. Returns [`None`] if nothing
    /// intersects the shape. Otherwise returns the pieces left over that keep
    /// the full width of the shape, which is empty if the shape was consumed.
    pub fn cut(&self, obstructions: &ShapeTree, tech: &Tech) -> Option<Vec<Shape>> {
        let orientation = self.orientation();
        let mut violations = Polygon90Set::new();
        let mut found = false;
        for entry in obstructions.query(&self.rect) {
            let other = entry.value().borrow();
            if other.layer.is_some() && other.layer != self.layer {
                continue;
            }
            if self.is_follow_pin() && other.shape_type == ShapeType::GridObs {
                continue;
            }
            found = true;

            let obs = other.obstruction();
            // span the full width of the shape
            let obs = match orientation {
                Some(Dir::Horiz) => obs.with_span(obs.vspan().union(self.rect.vspan()), Dir::Vert),
                _ => obs.with_span(obs.hspan().union(self.rect.hspan()), Dir::Horiz),
            };
            violations.insert(obs);
        }
        if !found {
            return None;
        }

        let mut remainder = Polygon90Set::from_rect(self.rect);
        remainder.difference(&violations);

        let replacements = remainder
            .rectangles()
            .into_iter()
            .filter(|rect| match orientation {
                Some(Dir::Horiz) => rect.height() == self.rect.height(),
                _ => rect.width() == self.rect.width(),
            })
            .map(|rect| {
                let mut shape = self.copy();
                shape.rect = rect;
                shape.update_term_connections();
                shape.generate_obstruction(tech);
                shape
            })
            .collect();
        Some(replacements)
    }

    /// Extends the shape along its own direction until it spans `rect`.
    ///
    /// Returns [`None`] for squares, when the shape already spans `rect`,
    /// or when the extension would run into an entry of `obstructions`
    /// other than this shape.
    pub fn extend_to(&self, rect: &Rect, obstructions: &ShapeTree, tech: &Tech) -> Option<Shape> {
        let dir = self.orientation()?;
        let extended = self
            .rect
            .with_span(self.rect.span(dir).union(rect.span(dir)), dir);
        if extended == self.rect {
            return None;
        }

        let blocked = obstructions
            .query(&extended)
            .any(|entry| !std::ptr::eq(entry.value().as_ptr(), self));
        if blocked {
            return None;
        }

        let mut shape = self.copy();
        shape.rect = extended;
        shape.generate_obstruction(tech);
        Some(shape)
    }

    /// The smallest rectangle that still reaches every connection.
    ///
    /// Follow-pin rails keep their full width and still span all of their rows.
    pub fn minimum_rect(&self) -> Option<Rect> {
        let mut bbox = self.iterm_connections.bbox().union(self.bterm_connections.bbox());
        for via in self.vias() {
            bbox = bbox.union(via.borrow().area().bbox());
        }

        let ShapeKind::FollowPin { rows } = &self.kind else {
            return bbox.rect();
        };
        let dir = if self.is_horizontal() {
            Dir::Horiz
        } else {
            Dir::Vert
        };
        let span = rows
            .iter()
            .map(|row| row.bbox.span(dir))
            .chain(bbox.rect().map(|rect| rect.span(dir)))
            .reduce(|a, b| a.union(b))?;
        Some(self.rect.with_span(span, dir))
    }

    pub fn is_modifiable(&self) -> bool {
        self.shape_type == ShapeType::Shape
    }

    /// Returns true for modifiable shapes that connect to at most one thing.
    pub fn is_removable(&self) -> bool {
        self.is_modifiable() && self.number_of_connections() < 2
    }

    pub fn number_of_connections(&self) -> usize {
        self.vias().count() + self.iterm_connections.len() + self.bterm_connections.len()
    }

    /// Vias landing on this shape from below.
    pub fn number_of_connections_below(&self) -> usize {
        self.vias()
            .filter(|via| via.borrow().upper_layer() == self.layer)
            .count()
    }

    /// Vias leaving this shape upwards.
    pub fn number_of_connections_above(&self) -> usize {
        self.vias()
            .filter(|via| via.borrow().lower_layer() == self.layer)
            .count()
    }

    pub fn iterm_connections(&self) -> &BTreeSet<Rect> {
        &self.iterm_connections
    }

    pub fn add_iterm_connection(&mut self, rect: Rect) {
        self.iterm_connections.insert(rect);
    }

    pub fn remove_iterm_connection(&mut self, rect: &Rect) -> bool {
        self.iterm_connections.remove(rect)
    }

    pub fn bterm_connections(&self) -> &BTreeSet<Rect> {
        &self.bterm_connections
    }

    pub fn add_bterm_connection(&mut self, rect: Rect) {
        self.bterm_connections.insert(rect);
    }

    pub fn remove_bterm_connection(&mut self, rect: &Rect) -> bool {
        self.bterm_connections.remove(rect)
    }

    /// The live vias touching this shape.
    pub fn vias(&self) -> impl Iterator<Item = ViaPtr> + '_ {
        self.vias.iter().filter_map(Weak::upgrade)
    }

    pub fn add_via(&mut self, via: &ViaPtr) {
        if !self.vias.iter().any(|v| v.as_ptr() == Rc::as_ptr(via)) {
            self.vias.push(Rc::downgrade(via));
        }
    }

    pub fn remove_via(&mut self, via: &ViaPtr) {
        self.vias.retain(|v| v.as_ptr() != Rc::as_ptr(via));
    }

    pub fn has_vias(&self) -> bool {
        self.vias().next().is_some()
    }

    pub fn clear_vias(&mut self) {
        self.vias.clear();
    }

    /// Writes the shape to `wire`, optionally exposing it as a boundary pin of its net.
    ///
    /// Pins are the shape itself when `make_rect_as_pin` is set, plus each
    /// boundary terminal connection.
    pub fn write_to_db(
        &self,
        block: &mut Block,
        wire: SWireKey,
        add_pins: bool,
        make_rect_as_pin: bool,
        tech: &Tech,
    ) -> Result<()> {
        debug!(
            "Adding shape {} with pins {} and rect as pin {}",
            self.report_text(tech),
            add_pins,
            make_rect_as_pin
        );
        with_err_context(
            self.write_to_db_inner(block, wire, add_pins, make_rect_as_pin),
            || ErrorContext::WriteShape(self.report_text(tech)),
        )
    }

    fn write_to_db_inner(
        &self,
        block: &mut Block,
        wire: SWireKey,
        add_pins: bool,
        make_rect_as_pin: bool,
    ) -> Result<()> {
        let layer = self
            .layer
            .ok_or_else(|| ErrorSource::InvalidArgs("shape has no layer".to_string()))?;
        block.add_sbox(
            wire,
            SBox::Rect {
                layer,
                rect: self.rect,
                shape_type: self.wire_type,
            },
        )?;

        if !add_pins {
            return Ok(());
        }
        let net = self
            .net
            .ok_or_else(|| ErrorSource::MissingNet("cannot add pins to a shape without a net".to_string()))?;
        if make_rect_as_pin {
            add_bpin(block, net, layer, self.rect)?;
        }
        for bterm in self.bterm_connections.iter() {
            add_bpin(block, net, layer, *bterm)?;
        }
        Ok(())
    }

    /// Reads the special wires of `net` back into per-layer shape indexes.
    pub fn populate_map_from_db(block: &Block, net: NetKey, tech: &Tech) -> Result<ShapeTreeMap> {
        let mut map = ShapeTreeMap::new();
        for sbox in block.sboxes(net)? {
            let SBox::Rect {
                layer,
                rect,
                shape_type,
            } = sbox
            else {
                continue;
            };
            let shape = Shape::new(tech, *layer, Some(net), *rect, *shape_type);
            map.entry(*layer)
                .or_default()
                .insert(Rc::new(RefCell::new(shape)));
        }
        Ok(map)
    }

    /// `net:layer:component:grid`, or `net:layer:none` for shapes outside a grid.
    pub fn display_text(&self, tech: &Tech, block: &Block) -> String {
        let net: ArcStr = self
            .net
            .and_then(|net| block.net(net).ok())
            .map(|net| net.name.clone())
            .unwrap_or_else(|| arcstr::literal!("none"));
        let layer = tech.layer_name(self.layer);
        match self.grid_component() {
            Some(component) => format!(
                "{net}:{layer}:{}:{}",
                component.kind(),
                component.grid_name()
            ),
            None => format!("{net}:{layer}:none"),
        }
    }

    pub fn report_text(&self, tech: &Tech) -> String {
        format!(
            "{} on {}",
            rect_text(&self.rect, tech.dbu_per_micron()),
            tech.layer_name(self.layer)
        )
    }
}

/// Formats a rectangle in microns.
pub fn rect_text(rect: &Rect, dbu_per_micron: i64) -> String {
    let dbu = dbu_per_micron as f64;
    format!(
        "({:.4}, {:.4}) - ({:.4}, {:.4})",
        rect.left() as f64 / dbu,
        rect.bottom() as f64 / dbu,
        rect.right() as f64 / dbu,
        rect.top() as f64 / dbu
    )
}

/// Adds `rect` to the first pin of the net's boundary terminal, creating both as needed.
fn add_bpin(block: &mut Block, net: NetKey, layer: LayerKey, rect: Rect) -> Result<()> {
    let existing = block.net(net)?.bterms().first().copied();
    let bterm = match existing {
        Some(bterm) => bterm,
        None => {
            let name = block.net(net)?.name.clone();
            let key = block.create_bterm(net, name)?;
            if let Some(bterm) = block.bterm_mut(key) {
                bterm.io_type = crate::db::IoType::Inout;
                bterm.special = true;
            }
            key
        }
    };
    let Some(bterm) = block.bterm_mut(bterm) else {
        return Ok(());
    };

    let exists = bterm
        .pins
        .iter()
        .flat_map(|pin| pin.boxes.iter())
        .any(|pin_box| pin_box.layer == layer && pin_box.rect == rect);
    if exists {
        return Ok(());
    }

    if bterm.pins.is_empty() {
        bterm.pins.push(BPin {
            status: PlacementStatus::Firm,
            boxes: Vec::new(),
        });
    }
    bterm.pins[0].boxes.push(PinBox { layer, rect });
    Ok(())
}
