//! Technology layers and the design rules attached to them.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;

use arcstr::ArcStr;
use derive_builder::Builder;
use pdngeom::bbox::BoundBox;
use pdngeom::{Dir, Rect, Span};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use self::config::TechConfig;
use self::rules::*;
use crate::error::{with_err_context, ErrorContext, ErrorSource, Result};

pub mod config;
pub mod rules;

new_key_type! {
    /// A unique identifier for a layer in a technology.
    pub struct LayerKey;
}

/// An enumeration of layer types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Routing,
    Cut,
    Masterslice,
    #[default]
    Other,
}

/// Metadata and design rules associated with a layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Builder)]
#[builder(pattern = "owned")]
pub struct TechLayerInfo {
    /// The layer name.
    #[builder(setter(into))]
    pub name: ArcStr,
    /// The type of the layer.
    #[serde(rename = "type", default)]
    #[builder(default)]
    pub layer_type: LayerType,
    /// The preferred routing direction.
    #[serde(default)]
    #[builder(setter(strip_option), default)]
    pub direction: Option<Dir>,
    /// The default wire width.
    #[serde(default)]
    #[builder(default)]
    pub width: i64,
    /// The minimum area of a shape on this layer.
    #[serde(default)]
    #[builder(setter(strip_option), default)]
    pub area: Option<i64>,
    #[serde(default)]
    #[builder(default)]
    pub spacing: Vec<SpacingRule>,
    #[serde(default)]
    #[builder(default)]
    pub spacing_table_prl: Vec<PrlSpacingRule>,
    #[serde(default)]
    #[builder(default)]
    pub spacing_eol: Vec<EolRule>,
    #[serde(default)]
    #[builder(default)]
    pub cut_classes: Vec<CutClass>,
    #[serde(default)]
    #[builder(default)]
    pub cut_spacing: Vec<CutSpacingRule>,
    #[serde(default)]
    #[builder(default)]
    pub array_spacing: Vec<ArraySpacingRule>,
    #[serde(default)]
    #[builder(default)]
    pub cut_enclosure: Vec<CutEnclosureRule>,
    #[serde(default)]
    #[builder(default)]
    pub min_cut: Vec<MinCutRule>,
    /// Routing tracks used to snap vias.
    #[serde(default)]
    #[builder(setter(strip_option), default)]
    pub tracks: Option<TrackGrid>,
}

impl TechLayerInfo {
    /// Creates a new [`TechLayerInfoBuilder`].
    #[inline]
    pub fn builder() -> TechLayerInfoBuilder {
        TechLayerInfoBuilder::default()
    }
}

/// A layer in a technology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechLayer {
    id: LayerKey,
    level: usize,
    info: TechLayerInfo,
}

impl TechLayer {
    #[inline]
    pub fn id(&self) -> LayerKey {
        self.id
    }

    /// Position of the layer in the stack, counting from the bottom.
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.info.name
    }

    #[inline]
    pub fn info(&self) -> &TechLayerInfo {
        &self.info
    }

    #[inline]
    pub fn layer_type(&self) -> LayerType {
        self.info.layer_type
    }

    #[inline]
    pub fn is_routing(&self) -> bool {
        self.info.layer_type == LayerType::Routing
    }

    #[inline]
    pub fn direction(&self) -> Option<Dir> {
        self.info.direction
    }

    #[inline]
    pub fn width(&self) -> i64 {
        self.info.width
    }

    pub fn has_area(&self) -> bool {
        self.info.area.is_some()
    }

    pub fn area(&self) -> Option<i64> {
        self.info.area
    }

    /// The spacing required around a shape of the given width and length.
    pub fn spacing(&self, width: i64, length: i64) -> i64 {
        self.info
            .spacing
            .iter()
            .filter(|rule| rule.applies(width, length))
            .map(|rule| rule.spacing)
            .max()
            .unwrap_or_default()
    }

    pub fn spacing_table_prl_rules(&self) -> &[PrlSpacingRule] {
        &self.info.spacing_table_prl
    }

    pub fn spacing_eol_rules(&self) -> &[EolRule] {
        &self.info.spacing_eol
    }

    /// Finds the cut class with the dimensions of `cut`.
    pub fn cut_class(&self, cut: &Rect) -> Option<&CutClass> {
        self.info.cut_classes.iter().find(|class| class.matches(cut))
    }

    /// The cut spacing rule for the given cut class.
    ///
    /// Falls back to the largest class-less rule.
    pub fn cut_spacing_rule(&self, cut_class: Option<&str>) -> Option<&CutSpacingRule> {
        if let Some(class) = cut_class {
            let rule = self
                .info
                .cut_spacing
                .iter()
                .find(|rule| rule.cut_class.as_deref() == Some(class));
            if rule.is_some() {
                return rule;
            }
        }
        self.info
            .cut_spacing
            .iter()
            .filter(|rule| rule.cut_class.is_none())
            .max_by_key(|rule| rule.spacing)
    }

    /// Array spacing rules that apply to cuts of the given class.
    pub fn array_spacing_rules<'a>(
        &'a self,
        cut_class: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ArraySpacingRule> + 'a {
        self.info
            .array_spacing
            .iter()
            .filter(move |rule| class_applies(rule.cut_class.as_deref(), cut_class))
    }

    /// The enclosure rules of this cut layer that constrain metal of the given width.
    ///
    /// Only the rules with the largest applicable width threshold are returned.
    pub fn cut_minimum_enclosure_rules(
        &self,
        cut_class: Option<&str>,
        width: i64,
        above: bool,
    ) -> Vec<&CutEnclosureRule> {
        let rules: Vec<_> = self
            .info
            .cut_enclosure
            .iter()
            .filter(|rule| {
                rule.side.applies(above)
                    && width >= rule.min_width
                    && class_applies(rule.cut_class.as_deref(), cut_class)
            })
            .collect();
        let threshold = rules.iter().map(|rule| rule.min_width).max();
        rules
            .into_iter()
            .filter(|rule| Some(rule.min_width) == threshold)
            .collect()
    }

    pub fn min_cut_rules(&self) -> &[MinCutRule] {
        &self.info.min_cut
    }

    /// The track snapper of this layer, if it has tracks.
    pub fn track_snap(&self) -> Option<TrackSnap> {
        self.info.tracks.map(|grid| TrackSnap {
            dir: self.info.direction,
            grid,
        })
    }
}

pub(crate) fn class_applies(rule_class: Option<&str>, cut_class: Option<&str>) -> bool {
    match rule_class {
        None => true,
        Some(class) => cut_class == Some(class),
    }
}

/// One metal layer of a via generate rule.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ViaLayerRule {
    pub layer: LayerKey,
    /// Overhangs beyond the cut array. The first applies along the layer's preferred direction.
    pub enclosure: (i64, i64),
    /// The range of metal widths the rule accepts.
    pub width: Option<Span>,
}

impl ViaLayerRule {
    /// Returns the (x, y) enclosure on a layer with the given preferred direction.
    pub fn enclosure_xy(&self, dir: Option<Dir>) -> (i64, i64) {
        let (along, across) = self.enclosure;
        match dir {
            Some(Dir::Vert) => (across, along),
            _ => (along, across),
        }
    }

    pub fn is_valid_for_width(&self, width: i64) -> bool {
        match self.width {
            Some(range) => range.start() <= width && width <= range.stop(),
            None => true,
        }
    }
}

/// The cut layer of a via generate rule.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ViaCutRule {
    pub layer: LayerKey,
    /// A single cut centered on the origin.
    pub rect: Rect,
    /// Center to center cut pitch in x and y.
    pub spacing: (i64, i64),
}

/// A rule for generating vias of any size between two routing layers.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ViaGenerateRule {
    pub name: ArcStr,
    pub bottom: ViaLayerRule,
    pub cut: ViaCutRule,
    pub top: ViaLayerRule,
}

/// Geometry of a fixed via on one layer, relative to the via origin.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ViaLayerGeometry {
    pub layer: LayerKey,
    pub rects: Vec<Rect>,
}

impl ViaLayerGeometry {
    /// The bounding box of all rectangles on this layer.
    pub fn bbox(&self) -> Option<Rect> {
        self.rects.as_slice().bbox().rect()
    }
}

/// A fixed via defined by the technology.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TechVia {
    pub name: ArcStr,
    pub bottom: ViaLayerGeometry,
    pub cut: ViaLayerGeometry,
    pub top: ViaLayerGeometry,
}

impl TechVia {
    /// The number of cuts in the via.
    pub fn cuts(&self) -> usize {
        self.cut.rects.len()
    }
}

/// A technology: an ordered layer stack with design rules, via rules and fixed vias.
#[derive(Debug, Clone, Default)]
pub struct Tech {
    dbu_per_micron: i64,
    manufacturing_grid: i64,
    layers: SlotMap<LayerKey, TechLayer>,
    order: Vec<LayerKey>,
    names: HashMap<ArcStr, LayerKey>,
    via_rules: Vec<ViaGenerateRule>,
    vias: Vec<TechVia>,
}

impl Tech {
    /// Creates an empty technology.
    pub fn new(dbu_per_micron: i64, manufacturing_grid: i64) -> Self {
        Self {
            dbu_per_micron,
            manufacturing_grid,
            ..Default::default()
        }
    }

    /// Loads a technology from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: TechConfig = with_err_context(toml::from_str(s), || ErrorContext::LoadTech)?;
        with_err_context(Self::from_config(config), || ErrorContext::LoadTech)
    }

    /// Loads a technology from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = with_err_context(std::fs::read_to_string(path), || {
            ErrorContext::ReadFile(path.to_path_buf())
        })?;
        Self::from_toml(&s)
    }

    #[inline]
    pub fn dbu_per_micron(&self) -> i64 {
        self.dbu_per_micron
    }

    #[inline]
    pub fn manufacturing_grid(&self) -> i64 {
        self.manufacturing_grid
    }

    /// Adds a layer on top of the current stack.
    pub fn add_layer(&mut self, info: TechLayerInfo) -> LayerKey {
        let name = info.name.clone();
        let level = self.order.len();
        let key = self
            .layers
            .insert_with_key(|id| TechLayer { id, level, info });
        self.order.push(key);
        self.names.insert(name, key);
        key
    }

    pub fn add_via_rule(&mut self, rule: ViaGenerateRule) {
        self.via_rules.push(rule);
    }

    pub fn add_via(&mut self, via: TechVia) {
        self.vias.push(via);
    }

    /// Gets the layer with key `key`.
    ///
    /// # Panics
    ///
    /// Panics if the key does not belong to this technology.
    #[inline]
    pub fn layer(&self, key: LayerKey) -> &TechLayer {
        &self.layers[key]
    }

    pub fn get(&self, key: LayerKey) -> Option<&TechLayer> {
        self.layers.get(key)
    }

    /// Gets the key of the layer named `name`.
    pub fn layer_key<Q>(&self, name: &Q) -> Result<LayerKey>
    where
        Q: Hash + Eq + ?Sized + std::fmt::Display,
        ArcStr: Borrow<Q>,
    {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ErrorSource::LayerNotFound(name.to_string()).into())
    }

    pub fn layer_by_name<Q>(&self, name: &Q) -> Result<&TechLayer>
    where
        Q: Hash + Eq + ?Sized + std::fmt::Display,
        ArcStr: Borrow<Q>,
    {
        Ok(self.layer(self.layer_key(name)?))
    }

    /// The layer name, or `"none"` for layer-agnostic geometry.
    pub fn layer_name(&self, key: Option<LayerKey>) -> ArcStr {
        key.and_then(|key| self.get(key))
            .map(|layer| layer.name().clone())
            .unwrap_or_else(|| arcstr::literal!("none"))
    }

    /// Iterates over the layers from the bottom of the stack up.
    pub fn layers(&self) -> impl Iterator<Item = &TechLayer> {
        self.order.iter().map(|key| &self.layers[*key])
    }

    /// The routing layers strictly between `lower` and `upper`.
    pub fn routing_layers_between(&self, lower: LayerKey, upper: LayerKey) -> Vec<LayerKey> {
        let lo = self.layer(lower).level();
        let hi = self.layer(upper).level();
        self.order
            .iter()
            .copied()
            .filter(|key| {
                let layer = self.layer(*key);
                layer.is_routing() && lo < layer.level() && layer.level() < hi
            })
            .collect()
    }

    /// The routing layer directly above `layer`.
    pub fn routing_layer_above(&self, layer: LayerKey) -> Option<LayerKey> {
        let level = self.layer(layer).level();
        self.layers()
            .find(|l| l.is_routing() && l.level() > level)
            .map(TechLayer::id)
    }

    pub fn via_rules(&self) -> &[ViaGenerateRule] {
        &self.via_rules
    }

    pub fn vias(&self) -> &[TechVia] {
        &self.vias
    }

    /// Converts database units to microns.
    pub fn to_microns(&self, value: i64) -> f64 {
        value as f64 / self.dbu_per_micron as f64
    }
}
