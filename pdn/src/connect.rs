//! Connections between two routing layers.
//!
//! A [`Connect`] picks, for every cut layer between its lower and upper
//! layer, the via definition that places the most cuts where two shapes
//! cross, and stacks the results into a single [`DbVia`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use arcstr::ArcStr;
use itertools::Itertools;
use pdngeom::{Dir, Rect};
use serde::{Deserialize, Serialize};

use crate::db::NetKey;
use crate::error::{with_err_context, ErrorContext, ErrorSource, Result};
use crate::index::{ShapePtr, ViaPtr};
use crate::log::{Log, *};
use crate::shape::rect_text;
use crate::tech::{LayerKey, Tech};
use crate::via::db::{DbGenerateDummyVia, DbGenerateStackedVia, DbVia, StackLayer};
use crate::via::generator::ViaGenerator;
use crate::via::Via;

/// Tuning for the vias a [`Connect`] builds.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Caps the rows of each via; zero means no limit.
    pub max_rows: usize,
    /// Caps the columns of each via; zero means no limit.
    pub max_columns: usize,
    /// Minimum cut pitch, by cut layer name.
    pub cut_pitch: BTreeMap<ArcStr, i64>,
    /// Routing layers whose vias are split into single cuts on the layer's
    /// tracks, with the pitch to place them at.
    pub split_cuts: BTreeMap<ArcStr, i64>,
    /// Intermediate layers of stacked vias kept on their tracks.
    pub ongrid: BTreeSet<ArcStr>,
}

impl ConnectConfig {
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// The via chosen for one cut layer.
struct ViaReport {
    name: ArcStr,
    lower: ArcStr,
    upper: ArcStr,
    rows: usize,
    columns: usize,
    cuts: usize,
    min_enclosure: bool,
}

impl Log for ViaReport {
    fn log(&self) {
        debug!(
            "Selected {} between {} and {}: {}x{} ({} cuts){}",
            self.name,
            self.lower,
            self.upper,
            self.rows,
            self.columns,
            self.cuts,
            if self.min_enclosure {
                " using minimum enclosures"
            } else {
                ""
            }
        );
    }
}

/// Plans vias from a lower routing layer to an upper routing layer.
#[derive(Debug, Clone)]
pub struct Connect {
    lower: LayerKey,
    upper: LayerKey,
    intermediate: Vec<LayerKey>,
    config: ConnectConfig,
}

impl Connect {
    pub fn new(tech: &Tech, lower: &str, upper: &str, config: ConnectConfig) -> Result<Self> {
        with_err_context(Self::new_inner(tech, lower, upper, config), || {
            ErrorContext::ConnectLayers {
                lower: ArcStr::from(lower),
                upper: ArcStr::from(upper),
            }
        })
    }

    fn new_inner(tech: &Tech, lower: &str, upper: &str, config: ConnectConfig) -> Result<Self> {
        let lower = tech.layer_key(lower)?;
        let upper = tech.layer_key(upper)?;
        for key in [lower, upper] {
            let layer = tech.layer(key);
            if !layer.is_routing() {
                return Err(ErrorSource::InvalidArgs(format!(
                    "{} is not a routing layer",
                    layer.name()
                ))
                .into());
            }
        }
        if tech.layer(lower).level() >= tech.layer(upper).level() {
            return Err(ErrorSource::InvalidArgs(format!(
                "{} is not below {}",
                tech.layer(lower).name(),
                tech.layer(upper).name()
            ))
            .into());
        }
        Ok(Self {
            lower,
            upper,
            intermediate: tech.routing_layers_between(lower, upper),
            config,
        })
    }

    #[inline]
    pub fn lower(&self) -> LayerKey {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> LayerKey {
        self.upper
    }

    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    /// The routing layers strictly between the lower and upper layers.
    pub fn intermediate_layers(&self) -> &[LayerKey] {
        &self.intermediate
    }

    /// Adjacent routing layer pairs, from the bottom up.
    pub fn layer_pairs(&self) -> Vec<(LayerKey, LayerKey)> {
        std::iter::once(self.lower)
            .chain(self.intermediate.iter().copied())
            .chain(std::iter::once(self.upper))
            .tuple_windows()
            .collect()
    }

    /// Every via definition able to connect `lower` to `upper` over the
    /// given rectangles, in definition order with generate rules first.
    pub fn generators<'a>(
        &self,
        tech: &'a Tech,
        lower_rect: Rect,
        upper_rect: Rect,
        lower: LayerKey,
        upper: LayerKey,
    ) -> Vec<ViaGenerator<'a>> {
        let rules = tech
            .via_rules()
            .iter()
            .map(|rule| ViaGenerator::from_rule(tech, rule, lower_rect, upper_rect));
        let vias = tech
            .vias()
            .iter()
            .map(|via| ViaGenerator::from_tech_via(tech, via, lower_rect, upper_rect));
        rules
            .chain(vias)
            .filter(|generator| generator.is_setup_valid(lower, upper))
            .map(|mut generator| {
                self.configure(tech, &mut generator);
                generator
            })
            .collect()
    }

    fn configure(&self, tech: &Tech, generator: &mut ViaGenerator<'_>) {
        generator.set_max_rows(self.config.max_rows);
        generator.set_max_columns(self.config.max_columns);

        let cut_layer = tech.layer(generator.cut_layer());
        if let Some(&pitch) = self.config.cut_pitch.get(cut_layer.name()) {
            generator.set_cut_pitch_x(pitch);
            generator.set_cut_pitch_y(pitch);
        }

        let split = |layer: LayerKey| {
            self.config
                .split_cuts
                .get(tech.layer(layer).name())
                .map(|&pitch| (layer, pitch))
        };
        let bottom = split(generator.bottom_layer());
        let top = split(generator.top_layer());
        for (layer, pitch) in bottom.into_iter().chain(top) {
            match tech.layer(layer).direction() {
                Some(Dir::Horiz) => generator.set_cut_pitch_y(pitch),
                Some(Dir::Vert) => generator.set_cut_pitch_x(pitch),
                None => {
                    generator.set_cut_pitch_x(pitch);
                    generator.set_cut_pitch_y(pitch);
                }
            }
        }
        generator.set_split_cut_array(bottom.is_some(), top.is_some());
    }

    /// The legal via with the most cuts between one pair of adjacent layers.
    ///
    /// Vias are first sized with the enclosures of their definitions, then
    /// with the cut layer's minimum enclosures. Ties go to the larger cut
    /// area, then to the earlier definition.
    pub fn best_via(
        &self,
        tech: &Tech,
        lower_rect: Rect,
        upper_rect: Rect,
        lower: LayerKey,
        upper: LayerKey,
    ) -> Option<DbVia> {
        for use_min_enclosure in [false, true] {
            let mut candidates = self.generators(tech, lower_rect, upper_rect, lower, upper);
            for generator in candidates.iter_mut() {
                generator.determine_rows_and_columns(use_min_enclosure, use_min_enclosure);
            }
            let best = candidates
                .iter()
                .enumerate()
                .filter(|(_, generator)| generator.check_constraints())
                .max_by(|(i, a), (j, b)| {
                    a.total_cuts()
                        .cmp(&b.total_cuts())
                        .then(a.cut_area().cmp(&b.cut_area()))
                        .then(j.cmp(i))
                });
            if let Some((_, generator)) = best {
                ViaReport {
                    name: generator.name().clone(),
                    lower: tech.layer_name(Some(lower)),
                    upper: tech.layer_name(Some(upper)),
                    rows: generator.rows(),
                    columns: generator.columns(),
                    cuts: generator.total_cuts(),
                    min_enclosure: use_min_enclosure,
                }
                .log();
                return Some(generator.generate());
            }
        }
        None
    }

    /// Builds the via connecting `lower_rect` on the lower layer to
    /// `upper_rect` on the upper layer, stacked through every intermediate layer.
    ///
    /// Falls back to a dummy via, which draws nothing, if any cut layer has no legal via.
    pub fn make_db_via(&self, tech: &Tech, lower_rect: Rect, upper_rect: Rect) -> DbVia {
        let area = lower_rect.intersection(&upper_rect);
        let dummy = || -> DbVia {
            DbGenerateDummyVia::new(
                area.unwrap_or(lower_rect),
                tech.layer_name(Some(self.lower)),
                tech.layer_name(Some(self.upper)),
                tech.dbu_per_micron(),
            )
            .into()
        };
        let Some(area) = area else {
            return dummy();
        };

        let pairs = self.layer_pairs();
        let last = pairs.len().saturating_sub(1);
        let mut vias = Vec::with_capacity(pairs.len());
        for (i, (lower, upper)) in pairs.into_iter().enumerate() {
            let bottom = if i == 0 { lower_rect } else { area };
            let top = if i == last { upper_rect } else { area };
            match self.best_via(tech, bottom, top, lower, upper) {
                Some(via) => vias.push(via),
                None => {
                    debug!(
                        "No via between {} and {} at {}",
                        tech.layer_name(Some(lower)),
                        tech.layer_name(Some(upper)),
                        rect_text(&area, tech.dbu_per_micron())
                    );
                    return dummy();
                }
            }
        }

        let vias = match <[DbVia; 1]>::try_from(vias) {
            Ok([via]) => return via,
            Err(vias) => vias,
        };
        let layers = self
            .intermediate
            .iter()
            .map(|&layer| {
                let ongrid = self.config.ongrid.contains(tech.layer(layer).name());
                StackLayer {
                    layer,
                    ongrid,
                    snap: if ongrid {
                        tech.layer(layer).track_snap()
                    } else {
                        None
                    },
                }
            })
            .collect();
        DbGenerateStackedVia::new(vias, layers).into()
    }

    /// Connects two shapes where they cross, registering the via on both.
    ///
    /// Returns `None` if the shapes do not overlap.
    pub fn make_via(
        self: &Rc<Self>,
        net: Option<NetKey>,
        lower: &ShapePtr,
        upper: &ShapePtr,
    ) -> Option<ViaPtr> {
        let area = lower
            .borrow()
            .rect()
            .intersection(&upper.borrow().rect())
            .filter(|rect| rect.width() > 0 && rect.height() > 0)?;
        let via = Rc::new(RefCell::new(Via::new(
            Rc::downgrade(self),
            net,
            area,
            lower.clone(),
            upper.clone(),
        )));
        lower.borrow_mut().add_via(&via);
        upper.borrow_mut().add_via(&via);
        Some(via)
    }
}
