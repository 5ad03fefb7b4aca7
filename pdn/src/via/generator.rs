//! Via sizing.
//!
//! A [`ViaGenerator`] works out how many cuts of a via definition fit where
//! a lower and an upper shape cross, subject to cut pitch, enclosure,
//! array spacing and minimum cut rules. A generator is checked with
//! [`ViaGenerator::is_setup_valid`] and [`ViaGenerator::check_constraints`]
//! before it is turned into a [`DbVia`].

use arcstr::ArcStr;
use pdngeom::{Dir, Rect};

use super::db::{
    DbArrayVia, DbBaseVia, DbGenerateVia, DbSplitCutVia, DbTechVia, DbVia, GenerateViaLayers,
};
use crate::tech::{class_applies, LayerKey, Tech, TechVia, ViaGenerateRule};

/// The via definition a generator sizes.
#[derive(Debug, Clone, Copy)]
pub enum ViaSource<'a> {
    /// A rule that builds vias of any size.
    Generate(&'a ViaGenerateRule),
    /// A fixed via, repeated as a whole.
    Tech(&'a TechVia),
}

/// How cuts are grouped along one axis.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
struct AxisGroups {
    per_group: usize,
    groups: usize,
    end: usize,
    spacing: i64,
    pitch: i64,
}

impl AxisGroups {
    fn single(cuts: usize, pitch: i64) -> Self {
        Self {
            per_group: cuts,
            groups: 1,
            end: 0,
            spacing: 0,
            pitch,
        }
    }

    fn total(&self) -> usize {
        self.per_group * self.groups + self.end
    }
}

fn fit_cuts(length: i64, cut: i64, pitch: i64) -> usize {
    if cut <= 0 || length < cut {
        0
    } else if pitch <= 0 {
        1
    } else {
        ((length - cut) / pitch + 1) as usize
    }
}

/// The smaller overhang of `outer` beyond `cut` on each axis.
fn enclosure_of(outer: Option<Rect>, cut: Rect) -> (i64, i64) {
    outer
        .map(|outer| {
            (
                (cut.left() - outer.left()).min(outer.right() - cut.right()),
                (cut.bottom() - outer.bottom()).min(outer.top() - cut.top()),
            )
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct ViaGenerator<'a> {
    tech: &'a Tech,
    source: ViaSource<'a>,
    bottom: LayerKey,
    cut_layer: LayerKey,
    top: LayerKey,

    lower_rect: Rect,
    upper_rect: Rect,
    intersection: Option<Rect>,

    cut: Rect,
    cut_class: Option<ArcStr>,
    cuts_per_via: usize,
    cut_pitch_x: i64,
    cut_pitch_y: i64,

    max_rows: usize,
    max_cols: usize,

    core_rows: usize,
    core_cols: usize,
    end_rows: usize,
    end_cols: usize,

    split_bottom: bool,
    split_top: bool,

    array_spacing_x: i64,
    array_spacing_y: i64,
    array_cores_x: usize,
    array_cores_y: usize,

    bottom_enclosure: (i64, i64),
    top_enclosure: (i64, i64),
}

impl<'a> ViaGenerator<'a> {
    fn new(
        tech: &'a Tech,
        source: ViaSource<'a>,
        layers: (LayerKey, LayerKey, LayerKey),
        cut: Rect,
        lower_rect: Rect,
        upper_rect: Rect,
    ) -> Self {
        let (bottom, cut_layer, top) = layers;
        let intersection = lower_rect
            .intersection(&upper_rect)
            .filter(|rect| rect.width() > 0 && rect.height() > 0);
        Self {
            tech,
            source,
            bottom,
            cut_layer,
            top,
            lower_rect,
            upper_rect,
            intersection,
            cut,
            cut_class: None,
            cuts_per_via: 1,
            cut_pitch_x: 0,
            cut_pitch_y: 0,
            max_rows: 0,
            max_cols: 0,
            core_rows: 0,
            core_cols: 0,
            end_rows: 0,
            end_cols: 0,
            split_bottom: false,
            split_top: false,
            array_spacing_x: 0,
            array_spacing_y: 0,
            array_cores_x: 1,
            array_cores_y: 1,
            bottom_enclosure: (0, 0),
            top_enclosure: (0, 0),
        }
    }

    /// Sizes vias built by a via generate rule.
    pub fn from_rule(
        tech: &'a Tech,
        rule: &'a ViaGenerateRule,
        lower_rect: Rect,
        upper_rect: Rect,
    ) -> Self {
        let layers = (rule.bottom.layer, rule.cut.layer, rule.top.layer);
        let mut generator = Self::new(
            tech,
            ViaSource::Generate(rule),
            layers,
            rule.cut.rect,
            lower_rect,
            upper_rect,
        );
        generator.cut_class = tech
            .layer(rule.cut.layer)
            .cut_class(&rule.cut.rect)
            .map(|class| class.name.clone());
        (generator.cut_pitch_x, generator.cut_pitch_y) = rule.cut.spacing;
        generator.bottom_enclosure = rule
            .bottom
            .enclosure_xy(tech.layer(rule.bottom.layer).direction());
        generator.top_enclosure = rule.top.enclosure_xy(tech.layer(rule.top.layer).direction());
        generator
    }

    /// Sizes arrays of a fixed technology via.
    pub fn from_tech_via(
        tech: &'a Tech,
        via: &'a TechVia,
        lower_rect: Rect,
        upper_rect: Rect,
    ) -> Self {
        let cut = via.cut.bbox().unwrap_or_default();
        let layers = (via.bottom.layer, via.cut.layer, via.top.layer);
        let mut generator = Self::new(
            tech,
            ViaSource::Tech(via),
            layers,
            cut,
            lower_rect,
            upper_rect,
        );

        let cut_layer = tech.layer(via.cut.layer);
        let single = via.cut.rects.first().copied().unwrap_or(cut);
        let cut_class = cut_layer.cut_class(&single).map(|class| class.name.clone());
        let spacing = cut_layer.cut_spacing_rule(cut_class.as_deref());
        generator.cut_pitch_x = spacing.map_or(cut.width(), |rule| rule.pitch(cut.width()));
        generator.cut_pitch_y = spacing.map_or(cut.height(), |rule| rule.pitch(cut.height()));
        generator.cut_class = cut_class;
        generator.cuts_per_via = via.cuts();
        generator.bottom_enclosure = enclosure_of(via.bottom.bbox(), cut);
        generator.top_enclosure = enclosure_of(via.top.bbox(), cut);
        generator
    }

    /// The name of the rule or via being sized.
    pub fn name(&self) -> &ArcStr {
        match self.source {
            ViaSource::Generate(rule) => &rule.name,
            ViaSource::Tech(via) => &via.name,
        }
    }

    pub fn source(&self) -> ViaSource<'a> {
        self.source
    }

    pub fn bottom_layer(&self) -> LayerKey {
        self.bottom
    }

    pub fn cut_layer(&self) -> LayerKey {
        self.cut_layer
    }

    pub fn top_layer(&self) -> LayerKey {
        self.top
    }

    pub fn lower_rect(&self) -> Rect {
        self.lower_rect
    }

    pub fn upper_rect(&self) -> Rect {
        self.upper_rect
    }

    pub fn intersection_rect(&self) -> Option<Rect> {
        self.intersection
    }

    /// A single cut, or the cut bounding box of a fixed via.
    pub fn cut(&self) -> Rect {
        self.cut
    }

    pub fn cut_class(&self) -> Option<&ArcStr> {
        self.cut_class.as_ref()
    }

    /// The area of metal cut by one via.
    pub fn cut_area(&self) -> i64 {
        match self.source {
            ViaSource::Generate(_) => self.cut.area(),
            ViaSource::Tech(via) => via.cut.rects.iter().map(Rect::area).sum(),
        }
    }

    pub fn cut_pitch_x(&self) -> i64 {
        self.cut_pitch_x
    }

    pub fn cut_pitch_y(&self) -> i64 {
        self.cut_pitch_y
    }

    /// Widens the horizontal cut pitch to `pitch`; smaller pitches are ignored.
    pub fn set_cut_pitch_x(&mut self, pitch: i64) {
        self.cut_pitch_x = self.cut_pitch_x.max(pitch);
    }

    /// Widens the vertical cut pitch to `pitch`; smaller pitches are ignored.
    pub fn set_cut_pitch_y(&mut self, pitch: i64) {
        self.cut_pitch_y = self.cut_pitch_y.max(pitch);
    }

    /// Caps the number of rows; zero means no limit.
    pub fn set_max_rows(&mut self, rows: usize) {
        self.max_rows = rows;
    }

    /// Caps the number of columns; zero means no limit.
    pub fn set_max_columns(&mut self, cols: usize) {
        self.max_cols = cols;
    }

    /// Builds the via from independent single cuts snapped to the tracks
    /// of the bottom and/or top layer.
    pub fn set_split_cut_array(&mut self, split_bottom: bool, split_top: bool) {
        self.split_bottom = split_bottom;
        self.split_top = split_top;
    }

    pub fn is_split_cut_array(&self) -> bool {
        self.split_bottom || self.split_top
    }

    /// Whether the cuts are split into groups by an array spacing rule.
    pub fn is_cut_array(&self) -> bool {
        !self.is_split_cut_array()
            && (self.array_cores_x > 1
                || self.array_cores_y > 1
                || self.end_rows > 0
                || self.end_cols > 0)
    }

    pub fn bottom_enclosure(&self) -> (i64, i64) {
        self.bottom_enclosure
    }

    pub fn top_enclosure(&self) -> (i64, i64) {
        self.top_enclosure
    }

    pub fn core_rows(&self) -> usize {
        self.core_rows
    }

    pub fn core_columns(&self) -> usize {
        self.core_cols
    }

    pub fn end_rows(&self) -> usize {
        self.end_rows
    }

    pub fn end_columns(&self) -> usize {
        self.end_cols
    }

    pub fn array_cores_x(&self) -> usize {
        self.array_cores_x
    }

    pub fn array_cores_y(&self) -> usize {
        self.array_cores_y
    }

    pub fn array_spacing_x(&self) -> i64 {
        self.array_spacing_x
    }

    pub fn array_spacing_y(&self) -> i64 {
        self.array_spacing_y
    }

    pub fn rows(&self) -> usize {
        self.array_cores_y * self.core_rows + self.end_rows
    }

    pub fn columns(&self) -> usize {
        self.array_cores_x * self.core_cols + self.end_cols
    }

    pub fn total_cuts(&self) -> usize {
        self.rows() * self.columns() * self.cuts_per_via
    }

    /// Returns true if this via definition can connect `lower` to `upper`
    /// where the two shapes cross.
    pub fn is_setup_valid(&self, lower: LayerKey, upper: LayerKey) -> bool {
        if self.bottom != lower || self.top != upper || self.intersection.is_none() {
            return false;
        }
        match self.source {
            ViaSource::Generate(rule) => {
                rule.bottom.is_valid_for_width(self.lower_rect.min_dim())
                    && rule.top.is_valid_for_width(self.upper_rect.min_dim())
            }
            ViaSource::Tech(via) => self.fits_shapes(via),
        }
    }

    fn fits_shapes(&self, via: &TechVia) -> bool {
        let Some(center) = self.intersection.map(|rect| rect.center()) else {
            return false;
        };
        let fits = |shape: &Rect, metal: Option<Rect>| match metal {
            Some(metal) => self.mostly_contains(shape, &metal.translate(center)),
            None => true,
        };
        fits(&self.lower_rect, via.bottom.bbox()) && fits(&self.upper_rect, via.top.bbox())
    }

    /// Containment allowing `small` to stick out by one manufacturing grid on each side.
    fn mostly_contains(&self, full: &Rect, small: &Rect) -> bool {
        full.expand(self.tech.manufacturing_grid()).contains(small)
    }

    /// The smallest legal enclosure of the cut layer for metal shaped like `shape`,
    /// with the larger overhang along the shape.
    fn minimum_enclosure(&self, shape: &Rect, above: bool) -> Option<(i64, i64)> {
        let rule = self
            .tech
            .layer(self.cut_layer)
            .cut_minimum_enclosure_rules(self.cut_class.as_deref(), shape.min_dim(), above)
            .into_iter()
            .min_by_key(|rule| rule.overhang1 + rule.overhang2)?;
        if shape.width() >= shape.height() {
            Some((rule.larger(), rule.smaller()))
        } else {
            Some((rule.smaller(), rule.larger()))
        }
    }

    fn available(&self, dir: Dir) -> i64 {
        let (bottom, top) = match dir {
            Dir::Horiz => (self.bottom_enclosure.0, self.top_enclosure.0),
            Dir::Vert => (self.bottom_enclosure.1, self.top_enclosure.1),
        };
        let lower = self.lower_rect.span(dir).shrink_all(bottom);
        let upper = self.upper_rect.span(dir).shrink_all(top);
        match (lower, upper) {
            (Some(lower), Some(upper)) => lower
                .intersection(&upper)
                .map(|span| span.length())
                .unwrap_or_default(),
            _ => 0,
        }
    }

    fn cut_size(&self, dir: Dir) -> i64 {
        self.cut.length(dir)
    }

    fn pitch(&self, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.cut_pitch_x,
            Dir::Vert => self.cut_pitch_y,
        }
    }

    fn cuts_along(&self, dir: Dir) -> usize {
        let cuts = fit_cuts(self.available(dir), self.cut_size(dir), self.pitch(dir));
        let max = match dir {
            Dir::Horiz => self.max_cols,
            Dir::Vert => self.max_rows,
        };
        if max > 0 {
            cuts.min(max)
        } else {
            cuts
        }
    }

    /// Sizes the via, optionally replacing the via definition's enclosures
    /// with the cut layer's minimum enclosure rules.
    pub fn determine_rows_and_columns(
        &mut self,
        use_bottom_min_enclosure: bool,
        use_top_min_enclosure: bool,
    ) {
        if use_bottom_min_enclosure {
            if let Some(enclosure) = self.minimum_enclosure(&self.lower_rect, false) {
                self.bottom_enclosure = enclosure;
            }
        }
        if use_top_min_enclosure {
            if let Some(enclosure) = self.minimum_enclosure(&self.upper_rect, true) {
                self.top_enclosure = enclosure;
            }
        }

        self.core_cols = self.cuts_along(Dir::Horiz);
        self.core_rows = self.cuts_along(Dir::Vert);
        self.end_rows = 0;
        self.end_cols = 0;
        self.array_cores_x = 1;
        self.array_cores_y = 1;
        self.array_spacing_x = 0;
        self.array_spacing_y = 0;

        if self.core_rows == 0 || self.core_cols == 0 || self.is_split_cut_array() {
            return;
        }
        self.determine_array();
    }

    /// Groups the cuts with the array spacing rule that keeps the most cuts.
    fn determine_array(&mut self) {
        let (rows, cols) = (self.core_rows, self.core_cols);
        let width = self.lower_rect.min_dim().min(self.upper_rect.min_dim());
        let cut_layer = self.tech.layer(self.cut_layer);

        let mut best: Option<(usize, AxisGroups, AxisGroups)> = None;
        for rule in cut_layer.array_spacing_rules(self.cut_class.as_deref()) {
            if rule.width.map_or(false, |min| width < min) {
                continue;
            }
            for entry in rule.array_cuts.iter() {
                let group = entry.cuts;
                if group == 0 || rows <= group || cols <= group {
                    continue;
                }
                let grouped = |dir| {
                    let limit = match dir {
                        Dir::Horiz => cols,
                        Dir::Vert => rows,
                    };
                    self.group_axis(dir, group, limit, rule.cut_spacing, entry.spacing)
                };
                let axes = if !rule.long_array {
                    (grouped(Dir::Horiz), grouped(Dir::Vert))
                } else if cols >= rows {
                    (Some(AxisGroups::single(cols, self.cut_pitch_x)), grouped(Dir::Vert))
                } else {
                    (grouped(Dir::Horiz), Some(AxisGroups::single(rows, self.cut_pitch_y)))
                };
                let (Some(x), Some(y)) = axes else {
                    continue;
                };
                let total = x.total() * y.total();
                if best.map_or(true, |(cuts, _, _)| total > cuts) {
                    best = Some((total, x, y));
                }
            }
        }

        let Some((_, x, y)) = best else {
            return;
        };
        self.core_cols = x.per_group;
        self.array_cores_x = x.groups;
        self.end_cols = x.end;
        self.array_spacing_x = x.spacing;
        self.cut_pitch_x = x.pitch;
        self.core_rows = y.per_group;
        self.array_cores_y = y.groups;
        self.end_rows = y.end;
        self.array_spacing_y = y.spacing;
        self.cut_pitch_y = y.pitch;
    }

    /// Fits groups of `group` cuts separated by `spacing` along `dir`,
    /// with a partial group at the end if there is room.
    ///
    /// At most `limit` cuts are placed along the axis.
    fn group_axis(
        &self,
        dir: Dir,
        group: usize,
        limit: usize,
        cut_spacing: i64,
        spacing: i64,
    ) -> Option<AxisGroups> {
        let cut = self.cut_size(dir);
        let pitch = self.pitch(dir).max(cut + cut_spacing);
        let length = self.available(dir);
        let group_width = cut + (group as i64 - 1) * pitch;
        let groups = (length + spacing) / (group_width + spacing);
        if groups <= 0 {
            return None;
        }
        let leftover = length - (groups * group_width + (groups - 1) * spacing);
        let end = if leftover >= spacing + cut {
            ((leftover - spacing - cut) / pitch + 1).min(group as i64 - 1)
        } else {
            0
        };

        let (groups, end) = (groups as usize, end as usize);
        let capped = groups.min(limit / group);
        if capped == 0 {
            return None;
        }
        // a dropped group frees room for a partial one
        let end = if capped < groups {
            (limit - capped * group).min(group - 1)
        } else {
            end.min(limit - capped * group)
        };
        Some(AxisGroups {
            per_group: group,
            groups: capped,
            end,
            spacing,
            pitch,
        })
    }

    /// Checks the sized via against minimum cut and minimum enclosure rules.
    pub fn check_constraints(&self) -> bool {
        self.rows() > 0 && self.columns() > 0 && self.check_min_cuts() && self.check_min_enclosure()
    }

    fn check_min_cuts(&self) -> bool {
        let cuts = self.total_cuts();
        [(self.bottom, self.lower_rect), (self.top, self.upper_rect)]
            .into_iter()
            .all(|(layer, rect)| {
                let width = rect.min_dim();
                self.tech.layer(layer).min_cut_rules().iter().all(|rule| {
                    width < rule.width
                        || !class_applies(rule.cut_class.as_deref(), self.cut_class.as_deref())
                        || cuts >= rule.cuts
                })
            })
    }

    fn check_min_enclosure(&self) -> bool {
        let cut_layer = self.tech.layer(self.cut_layer);
        [
            (self.lower_rect, self.bottom_enclosure, false),
            (self.upper_rect, self.top_enclosure, true),
        ]
        .into_iter()
        .all(|(rect, (x, y), above)| {
            let rules = cut_layer.cut_minimum_enclosure_rules(
                self.cut_class.as_deref(),
                rect.min_dim(),
                above,
            );
            rules.is_empty() || rules.iter().any(|rule| rule.is_met_by(x, y))
        })
    }

    /// Builds a single arrangement of cuts of this via definition.
    pub fn make_base_via(
        &self,
        rows: usize,
        row_pitch: i64,
        cols: usize,
        col_pitch: i64,
    ) -> DbBaseVia {
        match self.source {
            ViaSource::Generate(rule) => DbGenerateVia::new(
                &rule.name,
                self.cut,
                rows,
                cols,
                col_pitch,
                row_pitch,
                GenerateViaLayers {
                    bottom: self.bottom,
                    cut: self.cut_layer,
                    top: self.top,
                    bottom_enclosure: self.bottom_enclosure,
                    top_enclosure: self.top_enclosure,
                },
            )
            .into(),
            ViaSource::Tech(via) => DbTechVia::new(via.clone(), rows, row_pitch, cols, col_pitch).into(),
        }
    }

    /// Materializes the sized via.
    pub fn generate(&self) -> DbVia {
        let (px, py) = (self.cut_pitch_x, self.cut_pitch_y);
        if self.is_split_cut_array() {
            let snap = |split: bool, layer: LayerKey| {
                if split {
                    self.tech.layer(layer).track_snap()
                } else {
                    None
                }
            };
            DbSplitCutVia::new(
                self.make_base_via(1, 0, 1, 0),
                self.rows(),
                py,
                self.columns(),
                px,
                snap(self.split_bottom, self.bottom),
                snap(self.split_top, self.top),
            )
            .into()
        } else if self.is_cut_array() {
            let (rows, cols) = (self.core_rows, self.core_cols);
            let (end_rows, end_cols) = (self.end_rows, self.end_cols);
            let end_of_row = (end_cols > 0).then(|| self.make_base_via(rows, py, end_cols, px));
            let end_of_column = (end_rows > 0).then(|| self.make_base_via(end_rows, py, cols, px));
            let corner = (end_rows > 0 && end_cols > 0)
                .then(|| self.make_base_via(end_rows, py, end_cols, px));
            DbArrayVia::new(
                self.make_base_via(rows, py, cols, px),
                end_of_row,
                end_of_column,
                corner,
                self.array_cores_y,
                self.array_cores_x,
                self.array_spacing_x,
                self.array_spacing_y,
            )
            .into()
        } else {
            self.make_base_via(self.rows(), py, self.columns(), px)
                .into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TECH: &str = include_str!("../../tests/data/tech.toml");

    fn generator<'a>(tech: &'a Tech, rule: &str, lower: Rect, upper: Rect) -> ViaGenerator<'a> {
        let rule = tech
            .via_rules()
            .iter()
            .find(|r| r.name.as_str() == rule)
            .unwrap();
        ViaGenerator::from_rule(tech, rule, lower, upper)
    }

    #[test]
    fn two_by_two_cuts_fit() {
        let tech = Tech::from_toml(TECH).unwrap();
        let mut via = generator(
            &tech,
            "M1M2_GEN",
            Rect::from_coords(0, 0, 100, 20),
            Rect::from_coords(40, -40, 60, 60),
        );
        let (m1, m2) = (tech.layer_key("m1").unwrap(), tech.layer_key("m2").unwrap());
        assert!(via.is_setup_valid(m1, m2));
        assert!(!via.is_setup_valid(m2, m1));

        via.determine_rows_and_columns(false, false);
        assert_eq!((via.rows(), via.columns()), (2, 2));
        assert_eq!(via.total_cuts(), 4);
        assert_eq!(via.cut_class().map(ArcStr::as_str), Some("VA"));
        assert!(via.check_constraints());
        assert!(!via.is_cut_array());
        assert!(matches!(via.generate(), DbVia::Generate(_)));
    }

    #[test]
    fn single_cut_fit() {
        let tech = Tech::from_toml(TECH).unwrap();
        let mut via = generator(
            &tech,
            "M1M2_GEN",
            Rect::from_coords(0, 0, 100, 8),
            Rect::from_coords(40, -40, 48, 60),
        );
        via.determine_rows_and_columns(false, false);
        assert_eq!((via.rows(), via.columns()), (1, 1));
        assert!(via.check_constraints());
    }

    #[test]
    fn narrow_metal_needs_minimum_enclosure() {
        let tech = Tech::from_toml(TECH).unwrap();
        let mut via = generator(
            &tech,
            "M1M2_GEN",
            Rect::from_coords(0, 0, 100, 6),
            Rect::from_coords(40, -40, 60, 60),
        );
        via.determine_rows_and_columns(false, false);
        assert_eq!(via.rows(), 0);
        assert!(!via.check_constraints());

        via.determine_rows_and_columns(true, true);
        assert_eq!(via.bottom_enclosure(), (2, 0));
        assert_eq!(via.top_enclosure(), (0, 2));
        assert_eq!((via.rows(), via.columns()), (1, 3));
        assert!(via.check_constraints());
    }

    #[test]
    fn max_rows_and_columns_cap_the_array() {
        let tech = Tech::from_toml(TECH).unwrap();
        let mut via = generator(
            &tech,
            "M1M2_GEN",
            Rect::from_coords(0, 0, 100, 60),
            Rect::from_coords(0, -40, 60, 100),
        );
        via.determine_rows_and_columns(false, false);
        assert_eq!((via.rows(), via.columns()), (7, 7));

        via.set_max_rows(2);
        via.set_max_columns(3);
        via.determine_rows_and_columns(false, false);
        assert_eq!((via.rows(), via.columns()), (2, 3));
    }

    #[test]
    fn configured_pitch_only_widens() {
        let tech = Tech::from_toml(TECH).unwrap();
        let mut via = generator(
            &tech,
            "M1M2_GEN",
            Rect::from_coords(0, 0, 100, 20),
            Rect::from_coords(40, -40, 60, 60),
        );
        via.set_cut_pitch_x(4);
        assert_eq!(via.cut_pitch_x(), 8);
        via.set_cut_pitch_x(12);
        via.determine_rows_and_columns(false, false);
        assert_eq!(via.columns(), 2);
        assert_eq!(via.cut_pitch_x(), 12);
    }

    #[test]
    fn rule_width_range_limits_setup() {
        let tech = Tech::from_toml(TECH).unwrap();
        let (m3, m4) = (tech.layer_key("m3").unwrap(), tech.layer_key("m4").unwrap());
        let narrow = generator(
            &tech,
            "M3M4_GEN",
            Rect::from_coords(0, 0, 100, 40),
            Rect::from_coords(40, -100, 60, 100),
        );
        assert!(narrow.is_setup_valid(m3, m4));
        let wide = generator(
            &tech,
            "M3M4_GEN",
            Rect::from_coords(0, 0, 3000, 40),
            Rect::from_coords(0, -2000, 2000, 2000),
        );
        assert!(!wide.is_setup_valid(m3, m4));
        let apart = generator(
            &tech,
            "M3M4_GEN",
            Rect::from_coords(0, 0, 100, 40),
            Rect::from_coords(200, -100, 220, 100),
        );
        assert!(!apart.is_setup_valid(m3, m4));
    }

    #[test]
    fn tech_via_pitch_and_fit() {
        let tech = Tech::from_toml(TECH).unwrap();
        let (m1, m2) = (tech.layer_key("m1").unwrap(), tech.layer_key("m2").unwrap());
        let fixed = &tech.vias()[0];

        let mut via = ViaGenerator::from_tech_via(
            &tech,
            fixed,
            Rect::from_coords(0, 0, 100, 20),
            Rect::from_coords(40, -40, 60, 60),
        );
        assert_eq!((via.cut_pitch_x(), via.cut_pitch_y()), (8, 8));
        assert_eq!(via.bottom_enclosure(), (2, 2));
        assert!(via.is_setup_valid(m1, m2));
        via.determine_rows_and_columns(false, false);
        assert_eq!(via.total_cuts(), 4);
        assert!(matches!(via.generate(), DbVia::Tech(_)));

        let thin = ViaGenerator::from_tech_via(
            &tech,
            fixed,
            Rect::from_coords(0, 0, 100, 5),
            Rect::from_coords(40, -40, 60, 60),
        );
        assert!(!thin.is_setup_valid(m1, m2));
    }
}
