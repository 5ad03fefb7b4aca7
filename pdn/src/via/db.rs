//! Via designs that can be stamped into a block.
//!
//! A [`DbVia`] is the materialized form of a sized [`ViaGenerator`](super::generator::ViaGenerator).
//! Generating it at a point writes special-wire boxes into the block and
//! returns the metal it drew on the bottom and top layers.

use std::collections::BTreeSet;

use arcstr::ArcStr;
use enum_dispatch::enum_dispatch;
use pdngeom::bbox::BoundBox;
use pdngeom::{Point, Rect};

use crate::db::{Block, SBox, SWireKey, ViaDef, WireShapeType};
use crate::error::Result;
use crate::log::*;
use crate::shape::rect_text;
use crate::tech::rules::TrackSnap;
use crate::tech::{LayerKey, TechVia, ViaLayerGeometry};

/// Metal drawn by a via on its bottom and top layers.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ViaLayerShape {
    pub bottom: BTreeSet<Rect>,
    pub top: BTreeSet<Rect>,
}

impl ViaLayerShape {
    pub fn combine(&mut self, other: ViaLayerShape) {
        self.bottom.extend(other.bottom);
        self.top.extend(other.top);
    }

    pub fn is_empty(&self) -> bool {
        self.bottom.is_empty() && self.top.is_empty()
    }
}

/// Stamps a via design into a block.
#[enum_dispatch]
pub trait GenerateVia {
    /// Writes the via centered at `(x, y)` to `wire` and returns the metal it drew.
    fn generate(
        &self,
        block: &mut Block,
        wire: SWireKey,
        shape_type: WireShapeType,
        x: i64,
        y: i64,
    ) -> Result<ViaLayerShape>;

    /// Whether the metal drawn on each layer must be joined by a patch.
    fn requires_patch(&self) -> bool {
        false
    }
}

/// A via made of a single arrangement of cuts.
#[enum_dispatch]
pub trait BaseVia {
    /// The extent of the via around its origin, with or without the metal enclosure.
    fn via_rect(&self, include_enclosure: bool) -> Rect;
}

#[enum_dispatch(GenerateVia)]
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DbVia {
    Tech(DbTechVia),
    Generate(DbGenerateVia),
    SplitCut(DbSplitCutVia),
    Array(DbArrayVia),
    Stacked(DbGenerateStackedVia),
    Dummy(DbGenerateDummyVia),
}

#[enum_dispatch(GenerateVia, BaseVia)]
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DbBaseVia {
    Tech(DbTechVia),
    Generate(DbGenerateVia),
}

impl From<DbBaseVia> for DbVia {
    fn from(value: DbBaseVia) -> Self {
        match value {
            DbBaseVia::Tech(via) => Self::Tech(via),
            DbBaseVia::Generate(via) => Self::Generate(via),
        }
    }
}

/// Centers of `count` items spaced `pitch` apart around `center`.
fn centers(center: i64, count: usize, pitch: i64) -> impl Iterator<Item = i64> {
    let start = center - (count.saturating_sub(1) as i64 * pitch) / 2;
    (0..count).map(move |i| start + i as i64 * pitch)
}

fn translated(rects: &[Rect], offset: Point) -> impl Iterator<Item = Rect> + '_ {
    rects.iter().map(move |rect| rect.translate(offset))
}

/// A fixed technology via, repeated on a grid.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DbTechVia {
    via: TechVia,
    rows: usize,
    row_pitch: i64,
    cols: usize,
    col_pitch: i64,
    via_rect: Rect,
    enc_rect: Rect,
}

impl DbTechVia {
    pub fn new(via: TechVia, rows: usize, row_pitch: i64, cols: usize, col_pitch: i64) -> Self {
        let via_rect = via.cut.bbox().unwrap_or_default();
        let enc_rect = match (via.bottom.bbox(), via.top.bbox()) {
            (Some(bottom), Some(top)) => bottom.merge(&top),
            (Some(rect), None) | (None, Some(rect)) => rect,
            (None, None) => via_rect,
        };
        Self {
            via,
            rows,
            row_pitch,
            cols,
            col_pitch,
            via_rect,
            enc_rect,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

impl GenerateVia for DbTechVia {
    fn generate(
        &self,
        block: &mut Block,
        wire: SWireKey,
        shape_type: WireShapeType,
        x: i64,
        y: i64,
    ) -> Result<ViaLayerShape> {
        let key = block.find_or_create_via(&self.via.name, || ViaDef {
            name: self.via.name.clone(),
            bottom: self.via.bottom.clone(),
            cut: self.via.cut.clone(),
            top: self.via.top.clone(),
        });

        let mut shapes = ViaLayerShape::default();
        for cy in centers(y, self.rows, self.row_pitch) {
            for cx in centers(x, self.cols, self.col_pitch) {
                let origin = Point::new(cx, cy);
                block.add_sbox(
                    wire,
                    SBox::Via {
                        via: key,
                        origin,
                        shape_type,
                    },
                )?;
                shapes.bottom.extend(translated(&self.via.bottom.rects, origin));
                shapes.top.extend(translated(&self.via.top.rects, origin));
            }
        }
        Ok(shapes)
    }

    fn requires_patch(&self) -> bool {
        self.rows > 1 || self.cols > 1
    }
}

impl BaseVia for DbTechVia {
    fn via_rect(&self, include_enclosure: bool) -> Rect {
        let rect = if include_enclosure {
            self.enc_rect
        } else {
            self.via_rect
        };
        let dx = self.cols.saturating_sub(1) as i64 * self.col_pitch;
        let dy = self.rows.saturating_sub(1) as i64 * self.row_pitch;
        Rect::from_coords(
            rect.left() - dx / 2,
            rect.bottom() - dy / 2,
            rect.right() + dx - dx / 2,
            rect.top() + dy - dy / 2,
        )
    }
}

/// Layers and enclosures of a rule-generated via.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct GenerateViaLayers {
    pub bottom: LayerKey,
    pub cut: LayerKey,
    pub top: LayerKey,
    pub bottom_enclosure: (i64, i64),
    pub top_enclosure: (i64, i64),
}

/// A block via built from a via generate rule.
///
/// The block via definition is created on first use and shared by name.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DbGenerateVia {
    name: ArcStr,
    cuts: Vec<Rect>,
    cut_rect: Rect,
    bottom_rect: Rect,
    top_rect: Rect,
    layers: GenerateViaLayers,
}

impl DbGenerateVia {
    /// Lays out `rows` by `cols` copies of `cut` around the origin.
    pub fn new(
        rule_name: &str,
        cut: Rect,
        rows: usize,
        cols: usize,
        pitch_x: i64,
        pitch_y: i64,
        layers: GenerateViaLayers,
    ) -> Self {
        let (bex, bey) = layers.bottom_enclosure;
        let (tex, tey) = layers.top_enclosure;
        let name = arcstr::format!(
            "{rule_name}_{rows}x{cols}_{pitch_x}_{pitch_y}_{bex}_{bey}_{tex}_{tey}"
        );

        let cut = cut.centered_at(Point::zero());
        let mut cuts = Vec::with_capacity(rows * cols);
        for cy in centers(0, rows, pitch_y) {
            for cx in centers(0, cols, pitch_x) {
                cuts.push(cut.centered_at(Point::new(cx, cy)));
            }
        }
        let cut_rect = cuts[..].bbox().rect().unwrap_or(cut);

        Self {
            name,
            cuts,
            cut_rect,
            bottom_rect: cut_rect.expand_xy(bex, bey),
            top_rect: cut_rect.expand_xy(tex, tey),
            layers,
        }
    }

    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    pub fn cuts(&self) -> usize {
        self.cuts.len()
    }

    fn via_def(&self) -> ViaDef {
        ViaDef {
            name: self.name.clone(),
            bottom: ViaLayerGeometry {
                layer: self.layers.bottom,
                rects: vec![self.bottom_rect],
            },
            cut: ViaLayerGeometry {
                layer: self.layers.cut,
                rects: self.cuts.clone(),
            },
            top: ViaLayerGeometry {
                layer: self.layers.top,
                rects: vec![self.top_rect],
            },
        }
    }
}

impl GenerateVia for DbGenerateVia {
    fn generate(
        &self,
        block: &mut Block,
        wire: SWireKey,
        shape_type: WireShapeType,
        x: i64,
        y: i64,
    ) -> Result<ViaLayerShape> {
        let key = block.find_or_create_via(&self.name, || self.via_def());
        let origin = Point::new(x, y);
        block.add_sbox(
            wire,
            SBox::Via {
                via: key,
                origin,
                shape_type,
            },
        )?;
        Ok(ViaLayerShape {
            bottom: BTreeSet::from([self.bottom_rect.translate(origin)]),
            top: BTreeSet::from([self.top_rect.translate(origin)]),
        })
    }
}

impl BaseVia for DbGenerateVia {
    fn via_rect(&self, include_enclosure: bool) -> Rect {
        if include_enclosure {
            self.bottom_rect.merge(&self.top_rect)
        } else {
            self.cut_rect
        }
    }
}

/// Single-cut vias placed independently, each snapped to the routing tracks.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DbSplitCutVia {
    via: DbBaseVia,
    rows: usize,
    row_pitch: i64,
    cols: usize,
    col_pitch: i64,
    bottom: Option<TrackSnap>,
    top: Option<TrackSnap>,
}

impl DbSplitCutVia {
    pub fn new(
        via: DbBaseVia,
        rows: usize,
        row_pitch: i64,
        cols: usize,
        col_pitch: i64,
        bottom: Option<TrackSnap>,
        top: Option<TrackSnap>,
    ) -> Self {
        Self {
            via,
            rows,
            row_pitch,
            cols,
            col_pitch,
            bottom,
            top,
        }
    }
}

impl GenerateVia for DbSplitCutVia {
    fn generate(
        &self,
        block: &mut Block,
        wire: SWireKey,
        shape_type: WireShapeType,
        x: i64,
        y: i64,
    ) -> Result<ViaLayerShape> {
        let mut shapes = ViaLayerShape::default();
        for cy in centers(y, self.rows, self.row_pitch) {
            for cx in centers(x, self.cols, self.col_pitch) {
                let mut p = Point::new(cx, cy);
                if let Some(snap) = self.bottom {
                    p = snap.snap(p);
                }
                if let Some(snap) = self.top {
                    p = snap.snap(p);
                }
                shapes.combine(self.via.generate(block, wire, shape_type, p.x, p.y)?);
            }
        }
        Ok(shapes)
    }
}

/// Groups of cuts separated by array spacing.
///
/// The last column and row of groups may hold fewer cuts than the core groups.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DbArrayVia {
    core: DbBaseVia,
    end_of_row: Option<DbBaseVia>,
    end_of_column: Option<DbBaseVia>,
    corner: Option<DbBaseVia>,
    rows: usize,
    cols: usize,
    array_spacing_x: i64,
    array_spacing_y: i64,
}

impl DbArrayVia {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        core: DbBaseVia,
        end_of_row: Option<DbBaseVia>,
        end_of_column: Option<DbBaseVia>,
        corner: Option<DbBaseVia>,
        rows: usize,
        cols: usize,
        array_spacing_x: i64,
        array_spacing_y: i64,
    ) -> Self {
        Self {
            core,
            end_of_row,
            end_of_column,
            corner,
            rows,
            cols,
            array_spacing_x,
            array_spacing_y,
        }
    }

    /// Left edges (or bottom edges) of the group columns (or rows), plus their widths.
    fn slots(start: i64, count: usize, core: i64, end: Option<i64>, spacing: i64) -> Vec<(i64, i64)> {
        let mut slots: Vec<(i64, i64)> = (0..count)
            .map(|i| (start + i as i64 * (core + spacing), core))
            .collect();
        if let Some(end) = end {
            slots.push((start + count as i64 * (core + spacing), end));
        }
        slots
    }

    fn total(count: usize, core: i64, end: Option<i64>, spacing: i64) -> i64 {
        let groups = count as i64 * core + count.saturating_sub(1) as i64 * spacing;
        groups + end.map(|end| spacing + end).unwrap_or_default()
    }
}

impl GenerateVia for DbArrayVia {
    fn generate(
        &self,
        block: &mut Block,
        wire: SWireKey,
        shape_type: WireShapeType,
        x: i64,
        y: i64,
    ) -> Result<ViaLayerShape> {
        let core = self.core.via_rect(false);
        let end_width = self.end_of_row.as_ref().map(|via| via.via_rect(false).width());
        let end_height = self
            .end_of_column
            .as_ref()
            .map(|via| via.via_rect(false).height());

        let width = Self::total(self.cols, core.width(), end_width, self.array_spacing_x);
        let height = Self::total(self.rows, core.height(), end_height, self.array_spacing_y);
        let columns = Self::slots(
            x - width / 2,
            self.cols,
            core.width(),
            end_width,
            self.array_spacing_x,
        );
        let rows = Self::slots(
            y - height / 2,
            self.rows,
            core.height(),
            end_height,
            self.array_spacing_y,
        );

        let mut shapes = ViaLayerShape::default();
        for (row, &(bottom, h)) in rows.iter().enumerate() {
            let end_row = row == self.rows;
            for (col, &(left, w)) in columns.iter().enumerate() {
                let end_col = col == self.cols;
                let via = match (end_row, end_col) {
                    (false, false) => Some(&self.core),
                    (false, true) => self.end_of_row.as_ref(),
                    (true, false) => self.end_of_column.as_ref(),
                    (true, true) => self.corner.as_ref(),
                };
                let Some(via) = via else {
                    continue;
                };
                let center = Rect::from_coords(left, bottom, left + w, bottom + h).center();
                shapes.combine(via.generate(block, wire, shape_type, center.x, center.y)?);
            }
        }
        Ok(shapes)
    }

    fn requires_patch(&self) -> bool {
        true
    }
}

/// A routing layer crossed by a stacked via.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct StackLayer {
    pub layer: LayerKey,
    /// Vias above this layer are moved onto its tracks and the layer is patched.
    pub ongrid: bool,
    pub snap: Option<TrackSnap>,
}

/// Vias connecting non-adjacent layers, one per cut layer from the bottom up.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DbGenerateStackedVia {
    vias: Vec<DbVia>,
    layers: Vec<StackLayer>,
}

impl DbGenerateStackedVia {
    /// `layers` are the routing layers between consecutive `vias`.
    pub fn new(vias: Vec<DbVia>, layers: Vec<StackLayer>) -> Self {
        debug_assert_eq!(vias.len(), layers.len() + 1);
        Self { vias, layers }
    }

    pub fn vias(&self) -> &[DbVia] {
        &self.vias
    }
}

impl GenerateVia for DbGenerateStackedVia {
    fn generate(
        &self,
        block: &mut Block,
        wire: SWireKey,
        shape_type: WireShapeType,
        x: i64,
        y: i64,
    ) -> Result<ViaLayerShape> {
        let mut shapes = ViaLayerShape::default();
        let mut p = Point::new(x, y);
        let mut below = BTreeSet::new();
        let last = self.vias.len().saturating_sub(1);

        for (i, via) in self.vias.iter().enumerate() {
            let layer = i.checked_sub(1).and_then(|i| self.layers.get(i));
            if let Some(snap) = layer.and_then(|layer| layer.snap) {
                p = snap.snap(p);
            }

            let via_shapes = via.generate(block, wire, shape_type, p.x, p.y)?;

            if let Some(layer) = layer.filter(|layer| layer.ongrid) {
                let patch = below.bbox().union(via_shapes.bottom.bbox());
                if let Some(rect) = patch.rect() {
                    block.add_sbox(
                        wire,
                        SBox::Rect {
                            layer: layer.layer,
                            rect,
                            shape_type,
                        },
                    )?;
                }
            }
            if i == 0 {
                shapes.bottom = via_shapes.bottom.clone();
            }
            if i == last {
                shapes.top = via_shapes.top.clone();
            }
            below = via_shapes.top;
        }
        Ok(shapes)
    }
}

/// Stands in for a via that could not be built; draws nothing.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DbGenerateDummyVia {
    rect: Rect,
    bottom: ArcStr,
    top: ArcStr,
    dbu_per_micron: i64,
}

impl DbGenerateDummyVia {
    pub fn new(rect: Rect, bottom: ArcStr, top: ArcStr, dbu_per_micron: i64) -> Self {
        Self {
            rect,
            bottom,
            top,
            dbu_per_micron,
        }
    }
}

impl GenerateVia for DbGenerateDummyVia {
    fn generate(
        &self,
        _block: &mut Block,
        _wire: SWireKey,
        _shape_type: WireShapeType,
        _x: i64,
        _y: i64,
    ) -> Result<ViaLayerShape> {
        warn!(
            "No via inserted between {} and {} at {}",
            self.bottom,
            self.top,
            rect_text(&self.rect, self.dbu_per_micron)
        );
        Ok(ViaLayerShape::default())
    }
}
