//! An in-memory layout block: nets, special wires, boundary terminals and rows.
//!
//! This is the persistence target of power grid generation. Shapes are written
//! as special-wire boxes, vias are written as placements of block via
//! definitions, and boundary pins are attached to the net's terminal.

use std::collections::HashMap;

use arcstr::ArcStr;
use pdngeom::{Point, Rect};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::error::{ErrorSource, Result};
use crate::tech::{LayerKey, ViaLayerGeometry};

new_key_type! {
    /// A unique identifier for a net in a block.
    pub struct NetKey;
    /// A unique identifier for a special wire in a block.
    pub struct SWireKey;
    /// A unique identifier for a boundary terminal in a block.
    pub struct BTermKey;
    /// A unique identifier for a via definition in a block.
    pub struct BlockViaKey;
}

/// The signal carried by a net.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug, Serialize, Deserialize)]
pub enum SigType {
    #[default]
    Signal,
    Power,
    Ground,
    Clock,
    Analog,
}

/// The direction of a boundary terminal.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug, Serialize, Deserialize)]
pub enum IoType {
    Input,
    Output,
    #[default]
    Inout,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug, Serialize, Deserialize)]
pub enum PlacementStatus {
    #[default]
    None,
    Placed,
    Firm,
    Fixed,
}

/// The role of a special wire segment.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Debug, Serialize, Deserialize)]
pub enum WireShapeType {
    #[default]
    None,
    Ring,
    Padring,
    BlockRing,
    Stripe,
    FollowPin,
    IoWire,
    CoreWire,
    BlockWire,
    BlockageWire,
    FillWire,
    Drcfill,
}

/// A net in a block.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Net {
    pub name: ArcStr,
    pub sig_type: SigType,
    swires: Vec<SWireKey>,
    bterms: Vec<BTermKey>,
}

impl Net {
    pub fn swires(&self) -> &[SWireKey] {
        &self.swires
    }

    pub fn bterms(&self) -> &[BTermKey] {
        &self.bterms
    }
}

/// One element of a special wire.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SBox {
    Rect {
        layer: LayerKey,
        rect: Rect,
        shape_type: WireShapeType,
    },
    Via {
        via: BlockViaKey,
        origin: Point,
        shape_type: WireShapeType,
    },
}

impl SBox {
    pub fn shape_type(&self) -> WireShapeType {
        match self {
            Self::Rect { shape_type, .. } | Self::Via { shape_type, .. } => *shape_type,
        }
    }
}

/// A special (power) wire of a net.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SWire {
    pub net: NetKey,
    boxes: Vec<SBox>,
}

impl SWire {
    pub fn boxes(&self) -> &[SBox] {
        &self.boxes
    }
}

/// A via definition local to a block, with geometry relative to its origin.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ViaDef {
    pub name: ArcStr,
    pub bottom: ViaLayerGeometry,
    pub cut: ViaLayerGeometry,
    pub top: ViaLayerGeometry,
}

/// A rectangle on a boundary pin.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PinBox {
    pub layer: LayerKey,
    pub rect: Rect,
}

/// A physical pin of a boundary terminal.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BPin {
    pub status: PlacementStatus,
    pub boxes: Vec<PinBox>,
}

/// A boundary terminal of a block.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BTerm {
    pub name: ArcStr,
    pub net: NetKey,
    pub sig_type: SigType,
    pub io_type: IoType,
    pub special: bool,
    pub pins: Vec<BPin>,
}

/// A standard cell placement row.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Row {
    pub name: ArcStr,
    pub bbox: Rect,
}

impl Row {
    pub fn new(name: impl Into<ArcStr>, bbox: Rect) -> Self {
        Self {
            name: name.into(),
            bbox,
        }
    }
}

/// A layout block.
#[derive(Debug, Clone, Default)]
pub struct Block {
    name: ArcStr,
    nets: SlotMap<NetKey, Net>,
    net_names: HashMap<ArcStr, NetKey>,
    swires: SlotMap<SWireKey, SWire>,
    bterms: SlotMap<BTermKey, BTerm>,
    vias: SlotMap<BlockViaKey, ViaDef>,
    via_names: HashMap<ArcStr, BlockViaKey>,
    rows: Vec<Row>,
}

impl Block {
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Creates a net, or returns the existing net with the same name.
    pub fn create_net(&mut self, name: impl Into<ArcStr>, sig_type: SigType) -> NetKey {
        let name = name.into();
        if let Some(key) = self.net_names.get(&name) {
            return *key;
        }
        let key = self.nets.insert(Net {
            name: name.clone(),
            sig_type,
            swires: Vec::new(),
            bterms: Vec::new(),
        });
        self.net_names.insert(name, key);
        key
    }

    pub fn find_net(&self, name: &str) -> Option<NetKey> {
        self.net_names.get(name).copied()
    }

    pub fn net(&self, key: NetKey) -> Result<&Net> {
        self.nets
            .get(key)
            .ok_or_else(|| ErrorSource::MissingNet(format!("{key:?}")).into())
    }

    /// Creates an empty special wire on `net`.
    pub fn create_swire(&mut self, net: NetKey) -> Result<SWireKey> {
        if !self.nets.contains_key(net) {
            return Err(ErrorSource::MissingNet(format!("{net:?}")).into());
        }
        let key = self.swires.insert(SWire {
            net,
            boxes: Vec::new(),
        });
        self.nets[net].swires.push(key);
        Ok(key)
    }

    pub fn swire(&self, key: SWireKey) -> Result<&SWire> {
        self.swires
            .get(key)
            .ok_or_else(|| ErrorSource::MissingWire(format!("{key:?}")).into())
    }

    pub fn add_sbox(&mut self, wire: SWireKey, sbox: SBox) -> Result<()> {
        let swire = self
            .swires
            .get_mut(wire)
            .ok_or_else(|| ErrorSource::MissingWire(format!("{wire:?}")))?;
        swire.boxes.push(sbox);
        Ok(())
    }

    /// Iterates over every special-wire box of `net`.
    pub fn sboxes(&self, net: NetKey) -> Result<impl Iterator<Item = &SBox>> {
        let net = self.net(net)?;
        Ok(net
            .swires
            .iter()
            .filter_map(|key| self.swires.get(*key))
            .flat_map(|swire| swire.boxes.iter()))
    }

    /// Creates a boundary terminal on `net`.
    pub fn create_bterm(&mut self, net: NetKey, name: impl Into<ArcStr>) -> Result<BTermKey> {
        let sig_type = self.net(net)?.sig_type;
        let key = self.bterms.insert(BTerm {
            name: name.into(),
            net,
            sig_type,
            io_type: IoType::default(),
            special: false,
            pins: Vec::new(),
        });
        self.nets[net].bterms.push(key);
        Ok(key)
    }

    pub fn bterm(&self, key: BTermKey) -> Option<&BTerm> {
        self.bterms.get(key)
    }

    pub fn bterm_mut(&mut self, key: BTermKey) -> Option<&mut BTerm> {
        self.bterms.get_mut(key)
    }

    /// Finds the via definition named `name`.
    pub fn find_via(&self, name: &str) -> Option<BlockViaKey> {
        self.via_names.get(name).copied()
    }

    /// Returns the via definition named `name`, creating it with `make` if it does not exist.
    pub fn find_or_create_via(
        &mut self,
        name: &ArcStr,
        make: impl FnOnce() -> ViaDef,
    ) -> BlockViaKey {
        if let Some(key) = self.via_names.get(name) {
            return *key;
        }
        let key = self.vias.insert(make());
        self.via_names.insert(name.clone(), key);
        key
    }

    pub fn via(&self, key: BlockViaKey) -> Option<&ViaDef> {
        self.vias.get(key)
    }

    pub fn via_count(&self) -> usize {
        self.vias.len()
    }

    pub fn add_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}
