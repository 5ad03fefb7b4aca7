//! TOML technology descriptions.

use arcstr::ArcStr;
use pdngeom::{Rect, Span};
use serde::{Deserialize, Serialize};

use super::*;

/// The serialized form of a [`Tech`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechConfig {
    pub dbu_per_micron: i64,
    #[serde(default = "default_manufacturing_grid")]
    pub manufacturing_grid: i64,
    /// Layers, from the bottom of the stack up.
    pub layers: Vec<TechLayerInfo>,
    #[serde(default)]
    pub via_rules: Vec<ViaRuleConfig>,
    #[serde(default)]
    pub vias: Vec<TechViaConfig>,
}

fn default_manufacturing_grid() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViaLayerRuleConfig {
    pub layer: ArcStr,
    pub enclosure: [i64; 2],
    #[serde(default)]
    pub width: Option<[i64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViaCutRuleConfig {
    pub layer: ArcStr,
    pub size: [i64; 2],
    pub spacing: [i64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViaRuleConfig {
    pub name: ArcStr,
    pub bottom: ViaLayerRuleConfig,
    pub cut: ViaCutRuleConfig,
    pub top: ViaLayerRuleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViaLayerGeometryConfig {
    pub layer: ArcStr,
    /// Rectangles as `[xlo, ylo, xhi, yhi]`.
    pub rects: Vec<[i64; 4]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechViaConfig {
    pub name: ArcStr,
    pub bottom: ViaLayerGeometryConfig,
    pub cut: ViaLayerGeometryConfig,
    pub top: ViaLayerGeometryConfig,
}

impl Tech {
    /// Builds a technology from its serialized form.
    ///
    /// Via rules and fixed vias must reference existing layers,
    /// and must go from a routing layer through a cut layer to a higher routing layer.
    pub fn from_config(config: TechConfig) -> Result<Self> {
        if config.dbu_per_micron <= 0 || config.manufacturing_grid <= 0 {
            return Err(ErrorSource::InvalidTech(format!(
                "units must be positive (dbu per micron {}, manufacturing grid {})",
                config.dbu_per_micron, config.manufacturing_grid
            ))
            .into());
        }

        let mut tech = Tech::new(config.dbu_per_micron, config.manufacturing_grid);
        for info in config.layers {
            if let Some(tracks) = info.tracks.filter(|tracks| tracks.pitch <= 0) {
                return Err(ErrorSource::InvalidTech(format!(
                    "layer {} has non-positive track pitch {}",
                    info.name, tracks.pitch
                ))
                .into());
            }
            tech.add_layer(info);
        }

        for rule in config.via_rules {
            let bottom = tech.via_layer_rule(&rule.bottom)?;
            let cut = ViaCutRule {
                layer: tech.layer_key(&rule.cut.layer)?,
                rect: Rect::from_center(
                    pdngeom::Point::zero(),
                    rule.cut.size[0],
                    rule.cut.size[1],
                ),
                spacing: (rule.cut.spacing[0], rule.cut.spacing[1]),
            };
            let top = tech.via_layer_rule(&rule.top)?;
            tech.check_stack(&rule.name, bottom.layer, cut.layer, top.layer)?;
            tech.add_via_rule(ViaGenerateRule {
                name: rule.name,
                bottom,
                cut,
                top,
            });
        }

        for via in config.vias {
            let bottom = tech.via_layer_geometry(&via.bottom)?;
            let cut = tech.via_layer_geometry(&via.cut)?;
            let top = tech.via_layer_geometry(&via.top)?;
            tech.check_stack(&via.name, bottom.layer, cut.layer, top.layer)?;
            if cut.rects.is_empty() {
                return Err(
                    ErrorSource::InvalidTech(format!("via {} has no cuts", via.name)).into(),
                );
            }
            tech.add_via(TechVia {
                name: via.name,
                bottom,
                cut,
                top,
            });
        }

        Ok(tech)
    }

    fn via_layer_rule(&self, config: &ViaLayerRuleConfig) -> Result<ViaLayerRule> {
        Ok(ViaLayerRule {
            layer: self.layer_key(&config.layer)?,
            enclosure: (config.enclosure[0], config.enclosure[1]),
            width: config.width.map(|[lo, hi]| Span::new(lo, hi)),
        })
    }

    fn via_layer_geometry(&self, config: &ViaLayerGeometryConfig) -> Result<ViaLayerGeometry> {
        Ok(ViaLayerGeometry {
            layer: self.layer_key(&config.layer)?,
            rects: config
                .rects
                .iter()
                .map(|&[xlo, ylo, xhi, yhi]| Rect::from_coords(xlo, ylo, xhi, yhi))
                .collect(),
        })
    }

    fn check_stack(
        &self,
        name: &str,
        bottom: LayerKey,
        cut: LayerKey,
        top: LayerKey,
    ) -> Result<()> {
        let (bottom, cut, top) = (self.layer(bottom), self.layer(cut), self.layer(top));
        let ordered = bottom.level() < cut.level() && cut.level() < top.level();
        let typed = bottom.is_routing()
            && cut.layer_type() == LayerType::Cut
            && top.is_routing();
        if ordered && typed {
            Ok(())
        } else {
            Err(ErrorSource::InvalidTech(format!(
                "via {name} must connect a routing layer through a cut layer to a higher routing layer"
            ))
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use pdngeom::Dir;

    use super::*;

    const TECH: &str = r#"
dbu_per_micron = 1000
manufacturing_grid = 5

[[layers]]
name = "m1"
type = "routing"
direction = "horizontal"
width = 140
area = 20000
spacing = [{ spacing = 140 }]
spacing_eol = [{ eol_width = 150, eol_space = 70 }]
tracks = { pitch = 280, offset = 140 }

[[layers]]
name = "v1"
type = "cut"
cut_classes = [{ name = "VA", width = 140, length = 140 }]
cut_spacing = [{ spacing = 160 }]

[[layers]]
name = "m2"
type = "routing"
direction = "vertical"
width = 140

[[via_rules]]
name = "M1M2"
bottom = { layer = "m1", enclosure = [50, 0] }
cut = { layer = "v1", size = [140, 140], spacing = [300, 300] }
top = { layer = "m2", enclosure = [50, 0], width = [0, 10000] }

[[vias]]
name = "M1M2_PR"
bottom = { layer = "m1", rects = [[-120, -70, 120, 70]] }
cut = { layer = "v1", rects = [[-70, -70, 70, 70]] }
top = { layer = "m2", rects = [[-70, -120, 70, 120]] }
"#;

    #[test]
    fn parse_tech_toml() {
        let tech = Tech::from_toml(TECH).unwrap();
        assert_eq!(tech.dbu_per_micron(), 1000);
        assert_eq!(tech.manufacturing_grid(), 5);

        let m1 = tech.layer_by_name("m1").unwrap();
        assert_eq!(m1.direction(), Some(Dir::Horiz));
        assert_eq!(m1.area(), Some(20000));
        assert_eq!(m1.spacing(140, 1000), 140);
        assert_eq!(m1.spacing_eol_rules().len(), 1);

        let rule = &tech.via_rules()[0];
        assert_eq!(rule.cut.rect, Rect::from_coords(-70, -70, 70, 70));
        assert_eq!(rule.top.width, Some(Span::new(0, 10000)));
        assert_eq!(tech.vias()[0].cuts(), 1);
    }

    #[test]
    fn via_rule_with_unknown_layer_fails() {
        let bad = TECH.replace(r#"layer = "m2", enclosure"#, r#"layer = "m7", enclosure"#);
        let err = Tech::from_toml(&bad).unwrap_err();
        assert!(matches!(err.source(), ErrorSource::LayerNotFound(_)));
    }

    #[test]
    fn inverted_via_rule_fails() {
        let bad = TECH
            .replace(r#"bottom = { layer = "m1", enclosure"#, r#"bottom = { layer = "mx", enclosure"#)
            .replace(r#"top = { layer = "m2", enclosure"#, r#"top = { layer = "m1", enclosure"#)
            .replace(r#"bottom = { layer = "mx", enclosure"#, r#"bottom = { layer = "m2", enclosure"#);
        let err = Tech::from_toml(&bad).unwrap_err();
        assert!(matches!(err.source(), ErrorSource::InvalidTech(_)));
    }

    #[test]
    fn zero_track_pitch_fails() {
        let bad = TECH.replace("pitch = 280", "pitch = 0");
        let err = Tech::from_toml(&bad).unwrap_err();
        assert!(matches!(err.source(), ErrorSource::InvalidTech(_)));

        let negative = TECH.replace("pitch = 280", "pitch = -280");
        assert!(Tech::from_toml(&negative).is_err());
    }
}
