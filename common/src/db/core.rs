use crate::db::delay::Delay;
use crate::db::indices::*;
use crate::geom::coord::Loc;
use crate::util::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("device serialization error: {reason}")]
    Serialization { reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BelCategory {
    Logic,
    Routing,
    SitePort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinDir {
    Input,
    Output,
    Inout,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeWireData {
    pub name: String,
    /// Index into the owning tile type's `sites` when this is site wiring.
    pub site: Option<u32>,
    pub delay: Delay,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileTypeData {
    pub name: String,
    pub wires: Vec<TypeWireData>,
    pub sites: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileData {
    pub name: String,
    pub tile_type: TileTypeId,
    pub loc: Loc,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeData {
    pub tile_wires: Vec<TileWire>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipData {
    /// Tile the pip is located in.
    pub tile: TileId,
    /// `None` marks a pseudo endpoint with no backing wire.
    pub src: Option<TileWire>,
    pub dst: Option<TileWire>,
    pub delay: Delay,
    pub synthetic: bool,
    pub site_port: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BelPin {
    pub name: String,
    pub wire_index: Option<u32>,
    pub dir: PinDir,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BelData {
    pub name: String,
    pub tile: TileId,
    pub site: u32,
    pub category: BelCategory,
    pub pins: Vec<BelPin>,
}

/// Routing database of one device: tile types, tile instances, nodes, pips
/// and bels. Lookup indices are derived data and are rebuilt after loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeviceDb {
    pub name: String,
    pub tile_types: Vec<TileTypeData>,
    pub tiles: Vec<TileData>,
    pub nodes: Vec<NodeData>,
    pub pips: Vec<PipData>,
    pub bels: Vec<BelData>,

    #[serde(skip)]
    node_of: HashMap<TileWire, NodeId>,
    #[serde(skip)]
    downhill: HashMap<WireId, Vec<PipId>>,
    #[serde(skip)]
    uphill: HashMap<WireId, Vec<PipId>>,
    #[serde(skip)]
    tile_name_map: HashMap<String, TileId>,
}

impl DeviceDb {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }
    pub fn num_tile_types(&self) -> usize {
        self.tile_types.len()
    }

    pub fn add_tile_type(&mut self, name: &str) -> TileTypeId {
        let id = TileTypeId::new(self.tile_types.len());
        self.tile_types.push(TileTypeData {
            name: name.to_string(),
            wires: Vec::new(),
            sites: Vec::new(),
        });
        id
    }

    pub fn add_site(&mut self, tile_type: TileTypeId, name: &str) -> u32 {
        let sites = &mut self.tile_types[tile_type.index()].sites;
        sites.push(name.to_string());
        (sites.len() - 1) as u32
    }

    pub fn add_type_wire(
        &mut self,
        tile_type: TileTypeId,
        name: &str,
        site: Option<u32>,
        delay: Delay,
    ) -> u32 {
        let wires = &mut self.tile_types[tile_type.index()].wires;
        wires.push(TypeWireData {
            name: name.to_string(),
            site,
            delay,
        });
        (wires.len() - 1) as u32
    }

    pub fn add_tile(&mut self, name: String, tile_type: TileTypeId, loc: Loc) -> TileId {
        let id = TileId::new(self.tiles.len());
        self.tile_name_map.insert(name.clone(), id);
        self.tiles.push(TileData {
            name,
            tile_type,
            loc,
        });
        id
    }

    /// Joins tile wires into one node. Nodes must be added before any pip
    /// touching their wires.
    pub fn add_node(&mut self, tile_wires: Vec<TileWire>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        for tw in &tile_wires {
            self.node_of.insert(*tw, id);
        }
        self.nodes.push(NodeData { tile_wires });
        id
    }

    pub fn add_pip(
        &mut self,
        tile: TileId,
        src: Option<TileWire>,
        dst: Option<TileWire>,
        delay: Delay,
        synthetic: bool,
        site_port: bool,
    ) -> PipId {
        let id = PipId::new(self.pips.len());
        self.pips.push(PipData {
            tile,
            src,
            dst,
            delay,
            synthetic,
            site_port,
        });
        self.index_pip(id);
        id
    }

    pub fn add_bel(
        &mut self,
        name: &str,
        tile: TileId,
        site: u32,
        category: BelCategory,
        pins: Vec<BelPin>,
    ) -> BelId {
        let id = BelId::new(self.bels.len());
        self.bels.push(BelData {
            name: name.to_string(),
            tile,
            site,
            category,
            pins,
        });
        id
    }

    fn index_pip(&mut self, pip: PipId) {
        if let Some(src) = self.pip_src_wire(pip) {
            self.downhill.entry(src).or_default().push(pip);
        }
        if let Some(dst) = self.pip_dst_wire(pip) {
            self.uphill.entry(dst).or_default().push(pip);
        }
    }

    /// Recomputes every derived lookup table from the primary vectors.
    pub fn rebuild_indices(&mut self) {
        self.node_of.clear();
        self.downhill.clear();
        self.uphill.clear();
        self.tile_name_map.clear();

        for (i, node) in self.nodes.iter().enumerate() {
            for tw in &node.tile_wires {
                self.node_of.insert(*tw, NodeId::new(i));
            }
        }
        for (i, tile) in self.tiles.iter().enumerate() {
            self.tile_name_map.insert(tile.name.clone(), TileId::new(i));
        }
        for i in 0..self.pips.len() {
            self.index_pip(PipId::new(i));
        }
    }

    #[inline]
    pub fn tile_type_of(&self, tile: TileId) -> TileTypeId {
        self.tiles[tile.index()].tile_type
    }

    #[inline]
    pub fn tile_loc(&self, tile: TileId) -> Loc {
        self.tiles[tile.index()].loc
    }

    pub fn type_wire_data(&self, tw: TileWire) -> &TypeWireData {
        let ty = self.tile_type_of(tw.tile);
        &self.tile_types[ty.index()].wires[tw.index as usize]
    }

    pub fn canonical_wire(&self, tile: TileId, index: u32) -> WireId {
        let tw = TileWire::new(tile, index);
        match self.node_of.get(&tw) {
            Some(&node) => WireId::Node(node),
            None => WireId::Tile(tw),
        }
    }

    /// The tile wire standing in for `wire` in type and location lookups:
    /// the wire itself, or the first tile wire of its node.
    #[inline]
    pub fn representative(&self, wire: WireId) -> TileWire {
        match wire {
            WireId::Tile(tw) => tw,
            WireId::Node(node) => self.nodes[node.index()].tile_wires[0],
        }
    }

    pub fn constituents(&self, wire: WireId) -> Vec<TileWire> {
        match wire {
            WireId::Tile(tw) => vec![tw],
            WireId::Node(node) => self.nodes[node.index()].tile_wires.clone(),
        }
    }

    pub fn wire_site(&self, wire: WireId) -> Option<SiteRef> {
        let tw = self.representative(wire);
        self.type_wire_data(tw).site.map(|site| SiteRef {
            tile: tw.tile,
            site,
        })
    }

    pub fn wire_delay(&self, wire: WireId) -> Delay {
        self.type_wire_data(self.representative(wire)).delay
    }

    pub fn pips_downhill(&self, wire: WireId) -> &[PipId] {
        self.downhill.get(&wire).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pips_uphill(&self, wire: WireId) -> &[PipId] {
        self.uphill.get(&wire).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pip_src_wire(&self, pip: PipId) -> Option<WireId> {
        self.pips[pip.index()]
            .src
            .map(|tw| self.canonical_wire(tw.tile, tw.index))
    }

    pub fn pip_dst_wire(&self, pip: PipId) -> Option<WireId> {
        self.pips[pip.index()]
            .dst
            .map(|tw| self.canonical_wire(tw.tile, tw.index))
    }

    pub fn bel_pin_wire(&self, bel: BelId, pin: &BelPin) -> Option<WireId> {
        let tile = self.bels[bel.index()].tile;
        pin.wire_index.map(|i| self.canonical_wire(tile, i))
    }

    pub fn find_tile(&self, name: &str) -> Option<TileId> {
        self.tile_name_map.get(name).copied()
    }

    /// Resolves `TILE/WIRE` to a canonical wire.
    pub fn find_wire(&self, name: &str) -> Option<WireId> {
        let (tile_name, wire_name) = name.split_once('/')?;
        let tile = self.find_tile(tile_name)?;
        let ty = &self.tile_types[self.tile_type_of(tile).index()];
        let index = ty.wires.iter().position(|w| w.name == wire_name)?;
        Some(self.canonical_wire(tile, index as u32))
    }

    pub fn wire_name(&self, wire: WireId) -> String {
        let tw = self.representative(wire);
        format!(
            "{}/{}",
            self.tiles[tw.tile.index()].name,
            self.type_wire_data(tw).name
        )
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DeviceError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            DeviceError::Serialization {
                reason: e.to_string(),
            }
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeviceError> {
        let (mut db, _): (DeviceDb, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard()).map_err(
                |e| DeviceError::Serialization {
                    reason: e.to_string(),
                },
            )?;
        db.rebuild_indices();
        Ok(db)
    }

    /// Hash of the serialized primary data. Derived indices are skipped by
    /// serde, so equal databases hash equal regardless of map ordering.
    pub fn content_hash(&self) -> Result<ContentHash, DeviceError> {
        Ok(ContentHash::from_bytes(&self.to_bytes()?))
    }

    pub fn save(&self, path: &Path) -> Result<(), DeviceError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| DeviceError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn load(path: &Path) -> Result<Self, DeviceError> {
        let bytes = std::fs::read(path).map_err(|e| DeviceError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_bytes(&bytes)
    }
}
