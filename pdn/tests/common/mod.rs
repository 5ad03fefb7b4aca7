#![allow(dead_code)]

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use pdn::db::{Block, NetKey, SBox, SWireKey, SigType, WireShapeType};
use pdn::index::ShapePtr;
use pdn::tech::LayerKey;
use pdn::{Shape, Tech};
use pdngeom::Rect;

pub const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");

pub fn tech_path() -> PathBuf {
    PathBuf::from(DATA_DIR).join("tech.toml")
}

pub fn setup_tech() -> Tech {
    Tech::from_toml_file(tech_path()).expect("failed to load test technology")
}

pub fn layer(tech: &Tech, name: &str) -> LayerKey {
    tech.layer_key(name).expect("missing test layer")
}

/// A block with a single power net and one special wire on it.
pub fn setup_block() -> (Block, NetKey, SWireKey) {
    let mut block = Block::new("top");
    let vdd = block.create_net("VDD", SigType::Power);
    let wire = block.create_swire(vdd).expect("failed to create wire");
    (block, vdd, wire)
}

pub fn stripe(tech: &Tech, name: &str, net: Option<NetKey>, rect: Rect) -> ShapePtr {
    Rc::new(RefCell::new(Shape::new(
        tech,
        layer(tech, name),
        net,
        rect,
        WireShapeType::Stripe,
    )))
}

/// The rectangles drawn on `layer` by the special wires of `net`.
pub fn drawn_rects(block: &Block, net: NetKey, layer: LayerKey) -> Vec<Rect> {
    block
        .sboxes(net)
        .expect("missing net")
        .filter_map(|sbox| match sbox {
            SBox::Rect {
                layer: l, rect, ..
            } if *l == layer => Some(*rect),
            _ => None,
        })
        .collect()
}

pub fn via_count(block: &Block, net: NetKey) -> usize {
    block
        .sboxes(net)
        .expect("missing net")
        .filter(|sbox| matches!(sbox, SBox::Via { .. }))
        .count()
}
