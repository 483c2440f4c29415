use crate::graph::RoutingGraph;
use fabric_common::db::indices::{TileTypeId, TileWire, WireId};
use serde::{Deserialize, Serialize};

/// A wire generalized over every instance of its tile type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeWireId {
    pub tile_type: TileTypeId,
    pub index: u32,
}

impl TypeWireId {
    pub fn new(tile_type: TileTypeId, index: u32) -> Self {
        Self { tile_type, index }
    }

    pub fn of<G: RoutingGraph + ?Sized>(graph: &G, wire: WireId) -> Self {
        Self::of_tile_wire(graph, graph.representative_tile_wire(wire))
    }

    pub fn of_tile_wire<G: RoutingGraph + ?Sized>(graph: &G, tw: TileWire) -> Self {
        Self::new(graph.tile_type(tw.tile), tw.index)
    }

    pub fn is_site_wire<G: RoutingGraph + ?Sized>(&self, graph: &G) -> bool {
        graph.is_site_type_wire(self.tile_type, self.index)
    }

    pub fn name<G: RoutingGraph + ?Sized>(&self, graph: &G) -> String {
        format!(
            "{}/{}",
            graph.tile_type_name(self.tile_type),
            graph.type_wire_name(self.tile_type, self.index)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeWirePair {
    pub src: TypeWireId,
    pub dst: TypeWireId,
}

impl TypeWirePair {
    pub fn new(src: TypeWireId, dst: TypeWireId) -> Self {
        Self { src, dst }
    }

    pub fn of<G: RoutingGraph + ?Sized>(graph: &G, src: WireId, dst: WireId) -> Self {
        Self::new(TypeWireId::of(graph, src), TypeWireId::of(graph, dst))
    }
}

/// Every tile-type wire a routable wire spans, sorted. Two wires with equal
/// sets are treated as the same wire class during exploration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeWireSet(Vec<TypeWireId>);

impl TypeWireSet {
    pub fn of<G: RoutingGraph + ?Sized>(graph: &G, wire: WireId) -> Self {
        let mut types: Vec<TypeWireId> = graph
            .constituent_tile_wires(wire)
            .into_iter()
            .map(|tw| TypeWireId::of_tile_wire(graph, tw))
            .collect();
        types.sort_unstable();
        types.dedup();
        Self(types)
    }

    pub fn types(&self) -> &[TypeWireId] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DeviceGraph;
    use fabric_common::db::core::DeviceDb;
    use fabric_common::db::delay::Delay;
    use fabric_common::db::indices::TileId;
    use fabric_common::geom::coord::Loc;

    fn node_db() -> DeviceDb {
        let mut db = DeviceDb::new("nodes");
        let a = db.add_tile_type("A");
        let b = db.add_tile_type("B");
        db.add_type_wire(a, "L", None, Delay::ZERO);
        db.add_type_wire(a, "E", None, Delay::ZERO);
        db.add_type_wire(b, "W", None, Delay::ZERO);
        let t0 = db.add_tile("A_0".to_string(), a, Loc::new(0, 0));
        let t1 = db.add_tile("B_1".to_string(), b, Loc::new(1, 0));
        db.add_tile("A_2".to_string(), a, Loc::new(2, 0));
        db.add_node(vec![TileWire::new(t1, 0), TileWire::new(t0, 1)]);
        db
    }

    #[test]
    fn tile_wire_maps_to_its_type() {
        let db = node_db();
        let g = DeviceGraph::new(&db).unwrap();
        let w = g.canonical_wire(TileId(2), 0);
        assert_eq!(TypeWireId::of(&g, w), TypeWireId::new(TileTypeId(0), 0));
        assert_eq!(TypeWireId::of(&g, w).name(&g), "A/L");
    }

    #[test]
    fn node_uses_first_constituent() {
        let db = node_db();
        let g = DeviceGraph::new(&db).unwrap();
        let node = g.canonical_wire(TileId(0), 1);
        assert_eq!(TypeWireId::of(&g, node), TypeWireId::new(TileTypeId(1), 0));
    }

    #[test]
    fn wire_set_is_order_independent() {
        let mut db = node_db();
        // same constituents as node 0, listed the other way round
        let t3 = db.add_tile("A_3".to_string(), TileTypeId(0), Loc::new(3, 0));
        let t4 = db.add_tile("B_4".to_string(), TileTypeId(1), Loc::new(4, 0));
        db.add_node(vec![TileWire::new(t3, 1), TileWire::new(t4, 0)]);
        let g = DeviceGraph::new(&db).unwrap();

        let first = TypeWireSet::of(&g, g.canonical_wire(TileId(0), 1));
        let second = TypeWireSet::of(&g, g.canonical_wire(t3, 1));
        assert_eq!(first, second);
        assert_eq!(first.types().len(), 2);
        assert_ne!(
            TypeWireId::of(&g, g.canonical_wire(TileId(0), 1)),
            TypeWireId::of(&g, g.canonical_wire(t3, 1))
        );
    }
}
