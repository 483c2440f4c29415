use super::RoutingGraph;
use fabric_common::db::core::{BelCategory, DeviceDb, PinDir};
use fabric_common::db::delay::Delay;
use fabric_common::db::indices::{BelId, PipId, SiteRef, TileId, TileTypeId, TileWire, WireId};
use fabric_common::geom::coord::Loc;
use fabric_common::util::hash::ContentHash;

/// A `DeviceDb` paired with its content hash, computed once up front.
pub struct DeviceGraph<'a> {
    db: &'a DeviceDb,
    hash: ContentHash,
}

impl<'a> DeviceGraph<'a> {
    pub fn new(db: &'a DeviceDb) -> Result<Self, fabric_common::db::core::DeviceError> {
        let hash = db.content_hash()?;
        Ok(Self { db, hash })
    }

    pub fn db(&self) -> &DeviceDb {
        self.db
    }
}

impl RoutingGraph for DeviceGraph<'_> {
    fn num_tile_types(&self) -> usize {
        self.db.num_tile_types()
    }

    fn num_tiles(&self) -> usize {
        self.db.num_tiles()
    }

    fn num_bels(&self) -> usize {
        self.db.bels.len()
    }

    #[inline]
    fn tile_type(&self, tile: TileId) -> TileTypeId {
        self.db.tile_type_of(tile)
    }

    #[inline]
    fn tile_location(&self, tile: TileId) -> Loc {
        self.db.tile_loc(tile)
    }

    fn tile_type_wire_count(&self, tile_type: TileTypeId) -> usize {
        self.db.tile_types[tile_type.index()].wires.len()
    }

    fn is_site_type_wire(&self, tile_type: TileTypeId, index: u32) -> bool {
        self.db.tile_types[tile_type.index()].wires[index as usize]
            .site
            .is_some()
    }

    #[inline]
    fn canonical_wire(&self, tile: TileId, index: u32) -> WireId {
        self.db.canonical_wire(tile, index)
    }

    #[inline]
    fn representative_tile_wire(&self, wire: WireId) -> TileWire {
        self.db.representative(wire)
    }

    fn constituent_tile_wires(&self, wire: WireId) -> Vec<TileWire> {
        self.db.constituents(wire)
    }

    fn wire_site(&self, wire: WireId) -> Option<SiteRef> {
        self.db.wire_site(wire)
    }

    fn wire_delay(&self, wire: WireId) -> Delay {
        self.db.wire_delay(wire)
    }

    #[inline]
    fn pips_downhill(&self, wire: WireId) -> &[PipId] {
        self.db.pips_downhill(wire)
    }

    #[inline]
    fn pips_uphill(&self, wire: WireId) -> &[PipId] {
        self.db.pips_uphill(wire)
    }

    fn pip_src_wire(&self, pip: PipId) -> Option<WireId> {
        self.db.pip_src_wire(pip)
    }

    fn pip_dst_wire(&self, pip: PipId) -> Option<WireId> {
        self.db.pip_dst_wire(pip)
    }

    fn pip_src_tile_wire(&self, pip: PipId) -> Option<TileWire> {
        self.db.pips[pip.index()].src
    }

    fn pip_dst_tile_wire(&self, pip: PipId) -> Option<TileWire> {
        self.db.pips[pip.index()].dst
    }

    #[inline]
    fn pip_delay(&self, pip: PipId) -> Delay {
        self.db.pips[pip.index()].delay
    }

    #[inline]
    fn pip_is_synthetic(&self, pip: PipId) -> bool {
        self.db.pips[pip.index()].synthetic
    }

    #[inline]
    fn pip_is_site_port(&self, pip: PipId) -> bool {
        self.db.pips[pip.index()].site_port
    }

    fn pip_location(&self, pip: PipId) -> Loc {
        self.db.tile_loc(self.db.pips[pip.index()].tile)
    }

    fn bel_category(&self, bel: BelId) -> BelCategory {
        self.db.bels[bel.index()].category
    }

    fn bel_pin_wires(&self, bel: BelId) -> Vec<(WireId, PinDir)> {
        self.db.bels[bel.index()]
            .pins
            .iter()
            .filter_map(|pin| Some((self.db.bel_pin_wire(bel, pin)?, pin.dir)))
            .collect()
    }

    fn tile_type_name(&self, tile_type: TileTypeId) -> &str {
        &self.db.tile_types[tile_type.index()].name
    }

    fn type_wire_name(&self, tile_type: TileTypeId, index: u32) -> &str {
        &self.db.tile_types[tile_type.index()].wires[index as usize].name
    }

    fn wire_name(&self, wire: WireId) -> String {
        self.db.wire_name(wire)
    }

    fn database_hash(&self) -> ContentHash {
        self.hash
    }
}
