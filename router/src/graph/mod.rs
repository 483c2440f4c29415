pub mod device;

pub use device::DeviceGraph;

use fabric_common::db::core::{BelCategory, PinDir};
use fabric_common::db::delay::Delay;
use fabric_common::db::indices::{BelId, PipId, SiteRef, TileId, TileTypeId, TileWire, WireId};
use fabric_common::geom::coord::Loc;
use fabric_common::util::hash::ContentHash;

/// Read-only view of a device routing graph, as consumed by the lookahead.
pub trait RoutingGraph: Sync + Send {
    fn num_tile_types(&self) -> usize;
    fn num_tiles(&self) -> usize;
    fn num_bels(&self) -> usize;

    fn tile_type(&self, tile: TileId) -> TileTypeId;
    fn tile_location(&self, tile: TileId) -> Loc;
    fn tile_type_wire_count(&self, tile_type: TileTypeId) -> usize;
    /// Whether wire `index` of `tile_type` belongs to a site.
    fn is_site_type_wire(&self, tile_type: TileTypeId, index: u32) -> bool;

    fn canonical_wire(&self, tile: TileId, index: u32) -> WireId;
    /// Tile wire used for type and location lookups of `wire`.
    fn representative_tile_wire(&self, wire: WireId) -> TileWire;
    /// Every tile wire `wire` spans.
    fn constituent_tile_wires(&self, wire: WireId) -> Vec<TileWire>;
    fn wire_site(&self, wire: WireId) -> Option<SiteRef>;
    fn wire_delay(&self, wire: WireId) -> Delay;

    fn pips_downhill(&self, wire: WireId) -> &[PipId];
    fn pips_uphill(&self, wire: WireId) -> &[PipId];
    fn pip_src_wire(&self, pip: PipId) -> Option<WireId>;
    fn pip_dst_wire(&self, pip: PipId) -> Option<WireId>;
    /// Pip endpoints as tile wires of the pip, without node canonicalisation.
    fn pip_src_tile_wire(&self, pip: PipId) -> Option<TileWire>;
    fn pip_dst_tile_wire(&self, pip: PipId) -> Option<TileWire>;
    fn pip_delay(&self, pip: PipId) -> Delay;
    fn pip_is_synthetic(&self, pip: PipId) -> bool;
    fn pip_is_site_port(&self, pip: PipId) -> bool;
    fn pip_location(&self, pip: PipId) -> Loc;

    fn bel_category(&self, bel: BelId) -> BelCategory;
    /// `(wire, direction)` for every pin of `bel` that has a wire.
    fn bel_pin_wires(&self, bel: BelId) -> Vec<(WireId, PinDir)>;

    fn tile_type_name(&self, tile_type: TileTypeId) -> &str;
    fn type_wire_name(&self, tile_type: TileTypeId, index: u32) -> &str;
    fn wire_name(&self, wire: WireId) -> String;

    fn database_hash(&self) -> ContentHash;

    fn wire_tile(&self, wire: WireId) -> TileId {
        self.representative_tile_wire(wire).tile
    }

    fn wire_location(&self, wire: WireId) -> Loc {
        self.tile_location(self.wire_tile(wire))
    }

    fn is_wire_in_site(&self, wire: WireId) -> bool {
        self.wire_site(wire).is_some()
    }

    fn is_same_site(&self, a: WireId, b: WireId) -> bool {
        match (self.wire_site(a), self.wire_site(b)) {
            (Some(sa), Some(sb)) => sa == sb,
            _ => false,
        }
    }

    /// Cost of taking `pip`: pip delay plus the intrinsic delay of the wire
    /// it drives.
    fn step_delay(&self, pip: PipId, to: WireId) -> Delay {
        self.pip_delay(pip).saturating_add(self.wire_delay(to))
    }
}
