//! Design rules attached to technology layers.

use arcstr::ArcStr;
use pdngeom::{snap_to_grid, Dir, Point, Rect};
use serde::{Deserialize, Serialize};

/// A width and length dependent spacing rule.
///
/// Applies to shapes at least `min_width` wide and `min_length` long.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpacingRule {
    pub spacing: i64,
    #[serde(default)]
    pub min_width: i64,
    #[serde(default)]
    pub min_length: i64,
}

impl SpacingRule {
    pub fn applies(&self, width: i64, length: i64) -> bool {
        width >= self.min_width && length >= self.min_length
    }
}

/// A parallel run length spacing table.
///
/// `spacings[i][j]` is the spacing for shapes at least `widths[i]` wide
/// running in parallel for at least `lengths[j]`.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PrlSpacingRule {
    pub widths: Vec<i64>,
    pub lengths: Vec<i64>,
    pub spacings: Vec<Vec<i64>>,
    /// Only applies to shapes running against the preferred direction.
    #[serde(default)]
    pub wrong_direction: bool,
}

impl PrlSpacingRule {
    /// Looks up the spacing required for a shape of the given width and length.
    pub fn spacing(&self, width: i64, length: i64) -> i64 {
        let row = table_index(&self.widths, width);
        let col = table_index(&self.lengths, length);
        self.spacings
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or_default()
    }
}

fn table_index(thresholds: &[i64], value: i64) -> usize {
    thresholds
        .iter()
        .rposition(|&t| value >= t)
        .unwrap_or_default()
}

/// An end-of-line spacing rule.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EolRule {
    /// Wires at most this wide are subject to the rule.
    pub eol_width: i64,
    /// Required space beyond the line end.
    pub eol_space: i64,
}

/// A named cut size on a cut layer.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CutClass {
    pub name: ArcStr,
    pub width: i64,
    pub length: i64,
}

impl CutClass {
    /// Returns true if the cut has this class's dimensions, in either orientation.
    pub fn matches(&self, cut: &Rect) -> bool {
        (cut.width() == self.width && cut.height() == self.length)
            || (cut.width() == self.length && cut.height() == self.width)
    }
}

/// Minimum spacing between cuts.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CutSpacingRule {
    pub spacing: i64,
    #[serde(default)]
    pub cut_class: Option<ArcStr>,
    /// The spacing is measured between cut centers rather than edges.
    #[serde(default)]
    pub center_to_center: bool,
}

impl CutSpacingRule {
    /// The pitch of cuts of size `cut` under this rule.
    pub fn pitch(&self, cut: i64) -> i64 {
        if self.center_to_center {
            self.spacing.max(cut)
        } else {
            cut + self.spacing
        }
    }
}

/// One group size and its separation in an array spacing rule.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArrayCuts {
    pub cuts: usize,
    pub spacing: i64,
}

/// Requires large cut arrays to be split into groups.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArraySpacingRule {
    #[serde(default)]
    pub cut_class: Option<ArcStr>,
    /// Groups may extend without limit along their longer side.
    #[serde(default)]
    pub long_array: bool,
    /// Only applies to vias on metal at least this wide.
    #[serde(default)]
    pub width: Option<i64>,
    /// Edge spacing between cuts within a group.
    pub cut_spacing: i64,
    pub array_cuts: Vec<ArrayCuts>,
}

/// Which side of a cut layer an enclosure rule constrains.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnclosureSide {
    Above,
    Below,
    #[default]
    Both,
}

impl EnclosureSide {
    pub fn applies(&self, above: bool) -> bool {
        match self {
            Self::Above => above,
            Self::Below => !above,
            Self::Both => true,
        }
    }
}

/// Minimum metal overhang of a cut.
///
/// The two overhangs are measured on opposite sides and may be used in either orientation.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CutEnclosureRule {
    #[serde(default)]
    pub cut_class: Option<ArcStr>,
    #[serde(default)]
    pub side: EnclosureSide,
    pub overhang1: i64,
    pub overhang2: i64,
    /// Only applies to metal at least this wide.
    #[serde(default)]
    pub min_width: i64,
}

impl CutEnclosureRule {
    /// Returns true if the enclosure `(x, y)` satisfies the rule in some orientation.
    pub fn is_met_by(&self, x: i64, y: i64) -> bool {
        (x >= self.overhang1 && y >= self.overhang2) || (x >= self.overhang2 && y >= self.overhang1)
    }

    pub fn larger(&self) -> i64 {
        self.overhang1.max(self.overhang2)
    }

    pub fn smaller(&self) -> i64 {
        self.overhang1.min(self.overhang2)
    }
}

/// Minimum number of cuts required for a via landing on wide metal.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MinCutRule {
    pub cuts: usize,
    pub width: i64,
    #[serde(default)]
    pub cut_class: Option<ArcStr>,
}

/// Routing tracks of a layer.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TrackGrid {
    pub pitch: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Snaps points onto the tracks of a routing layer.
///
/// Tracks of a horizontal layer constrain y coordinates, tracks of a vertical
/// layer constrain x coordinates. Layers without a preferred direction snap both.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct TrackSnap {
    pub dir: Option<Dir>,
    pub grid: TrackGrid,
}

impl TrackSnap {
    pub fn snap(&self, p: Point) -> Point {
        let snap = |v| snap_to_grid(v, self.grid.pitch, self.grid.offset);
        match self.dir {
            Some(Dir::Horiz) => Point::new(p.x, snap(p.y)),
            Some(Dir::Vert) => Point::new(snap(p.x), p.y),
            None => Point::new(snap(p.x), snap(p.y)),
        }
    }
}
