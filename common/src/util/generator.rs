use crate::db::core::{BelCategory, BelPin, DeviceDb, PinDir};
use crate::db::delay::Delay;
use crate::db::indices::{TileId, TileTypeId, TileWire};
use crate::geom::coord::Loc;

/// Shape of a generated grid device.
///
/// Tiles in `driver_column` are of type `X` (a driver site whose output pin
/// exits onto the tile's routing wire), tiles in `sink_column` are of type `B`
/// (the routing wire enters a sink site) and every other tile is a general
/// routing tile `G`. Every tile owns one routing wire `R` connected to the
/// four neighbouring `R` wires through pips of `pip_delay`. `G` tiles also
/// carry a pass-through wire `FEED` with a single pip back onto `R`.
///
/// With `long_wire_span` set, every tile also carries `LE` and `LW`. The
/// `LE` wire of tile `(x, y)` and the `LW` wire of `(x + span, y)` form one
/// node, driven from `R` at its west end and driving `R` at its east end.
#[derive(Clone, Debug)]
pub struct GridLayout {
    pub width: i32,
    pub height: i32,
    pub pip_delay: Delay,
    pub driver_column: i32,
    pub sink_column: i32,
    /// Drops every pip between column `c` and `c + 1`, splitting the fabric
    /// into two disconnected islands.
    pub cut_after_column: Option<i32>,
    pub long_wire_span: Option<i32>,
}

impl GridLayout {
    pub fn new(width: i32, height: i32, pip_delay: Delay) -> Self {
        Self {
            width,
            height,
            pip_delay,
            driver_column: 1.min(width - 1),
            sink_column: width - 1,
            cut_after_column: None,
            long_wire_span: None,
        }
    }
}

pub const ROUTING_WIRE: &str = "R";
pub const FEED_WIRE: &str = "FEED";
pub const DRIVER_PIN_WIRE: &str = "O";
pub const SINK_PIN_WIRE: &str = "I";
pub const LONG_EAST_WIRE: &str = "LE";
pub const LONG_WEST_WIRE: &str = "LW";

/// Adds the `LE`/`LW` pair to a tile type, returning their indices.
fn add_long_wires(db: &mut DeviceDb, tile_type: TileTypeId) -> (u32, u32) {
    (
        db.add_type_wire(tile_type, LONG_EAST_WIRE, None, Delay::ZERO),
        db.add_type_wire(tile_type, LONG_WEST_WIRE, None, Delay::ZERO),
    )
}

pub fn generate_grid_device(layout: &GridLayout) -> DeviceDb {
    let mut db = DeviceDb::new(&format!("grid{}x{}", layout.width, layout.height));

    log::info!(
        "Generating grid device: {}x{} tiles, pip delay {}, drivers at x={}, sinks at x={}",
        layout.width,
        layout.height,
        layout.pip_delay,
        layout.driver_column,
        layout.sink_column
    );

    let x_type = db.add_tile_type("X");
    let x_site = db.add_site(x_type, "DRIVER");
    let x_r = db.add_type_wire(x_type, ROUTING_WIRE, None, Delay::ZERO);
    let x_o = db.add_type_wire(x_type, DRIVER_PIN_WIRE, Some(x_site), Delay::ZERO);

    let g_type = db.add_tile_type("G");
    let g_r = db.add_type_wire(g_type, ROUTING_WIRE, None, Delay::ZERO);
    let g_feed = db.add_type_wire(g_type, FEED_WIRE, None, Delay::ZERO);

    let b_type = db.add_tile_type("B");
    let b_site = db.add_site(b_type, "SINK");
    let b_r = db.add_type_wire(b_type, ROUTING_WIRE, None, Delay::ZERO);
    let b_i = db.add_type_wire(b_type, SINK_PIN_WIRE, Some(b_site), Delay::ZERO);

    // per tile type, indexed like `db.tile_types`
    let long_wires: Vec<(u32, u32)> = match layout.long_wire_span {
        Some(_) => [x_type, g_type, b_type]
            .into_iter()
            .map(|ty| add_long_wires(&mut db, ty))
            .collect(),
        None => Vec::new(),
    };

    let mut grid: Vec<TileId> = Vec::with_capacity((layout.width * layout.height) as usize);
    for y in 0..layout.height {
        for x in 0..layout.width {
            let (ty, prefix) = if x == layout.driver_column {
                (x_type, "X")
            } else if x == layout.sink_column {
                (b_type, "B")
            } else {
                (g_type, "G")
            };
            grid.push(db.add_tile(format!("{}_X{}Y{}", prefix, x, y), ty, Loc::new(x, y)));
        }
    }
    let tile_at = |x: i32, y: i32| grid[(y * layout.width + x) as usize];
    let crosses_cut = |a: i32, b: i32| {
        layout
            .cut_after_column
            .is_some_and(|cut| a.min(b) <= cut && a.max(b) > cut)
    };

    // nodes first, so the pips below resolve onto them
    let mut long_spans = Vec::new();
    if let Some(span) = layout.long_wire_span.filter(|&s| s > 0) {
        for y in 0..layout.height {
            for x in 0..layout.width - span {
                if crosses_cut(x, x + span) {
                    continue;
                }
                let west = tile_at(x, y);
                let east = tile_at(x + span, y);
                let (le, _) = long_wires[db.tile_type_of(west).index()];
                let (_, lw) = long_wires[db.tile_type_of(east).index()];
                db.add_node(vec![TileWire::new(west, le), TileWire::new(east, lw)]);
                long_spans.push((TileWire::new(west, le), TileWire::new(east, lw)));
            }
        }
    }

    for y in 0..layout.height {
        for x in 0..layout.width {
            let tile = tile_at(x, y);
            let r = TileWire::new(tile, 0);
            debug_assert!(x_r == 0 && g_r == 0 && b_r == 0);

            for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= layout.width || ny >= layout.height {
                    continue;
                }
                if crosses_cut(x, nx) {
                    continue;
                }
                let neighbor = TileWire::new(tile_at(nx, ny), 0);
                db.add_pip(tile, Some(r), Some(neighbor), layout.pip_delay, false, false);
            }

            if x == layout.driver_column {
                let o = TileWire::new(tile, x_o);
                db.add_pip(tile, Some(o), Some(r), Delay::ZERO, false, true);
                db.add_bel(
                    "DRV",
                    tile,
                    x_site,
                    BelCategory::Logic,
                    vec![BelPin {
                        name: "Q".to_string(),
                        wire_index: Some(x_o),
                        dir: PinDir::Output,
                    }],
                );
            } else if x == layout.sink_column {
                let i = TileWire::new(tile, b_i);
                db.add_pip(tile, Some(r), Some(i), Delay::ZERO, false, true);
                db.add_bel(
                    "SNK",
                    tile,
                    b_site,
                    BelCategory::Logic,
                    vec![BelPin {
                        name: "D".to_string(),
                        wire_index: Some(b_i),
                        dir: PinDir::Input,
                    }],
                );
            } else {
                let feed = TileWire::new(tile, g_feed);
                db.add_pip(tile, Some(r), Some(feed), layout.pip_delay, false, false);
                db.add_pip(tile, Some(feed), Some(r), Delay::ZERO, false, false);
            }
        }
    }

    for (le, lw) in long_spans {
        let west_r = TileWire::new(le.tile, 0);
        let east_r = TileWire::new(lw.tile, 0);
        db.add_pip(le.tile, Some(west_r), Some(le), layout.pip_delay, false, false);
        db.add_pip(lw.tile, Some(lw), Some(east_r), Delay::ZERO, false, false);
    }

    log::info!(
        "Generated {} tiles, {} nodes, {} pips, {} bels",
        db.tiles.len(),
        db.nodes.len(),
        db.pips.len(),
        db.bels.len()
    );
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_types_follow_columns() {
        let db = generate_grid_device(&GridLayout::new(5, 5, Delay::new(1)));
        assert_eq!(db.num_tiles(), 25);
        let names: Vec<&str> = db.tile_types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["X", "G", "B"]);
        let t = db.find_tile("X_X1Y3").unwrap();
        assert_eq!(db.tile_types[db.tile_type_of(t).index()].name, "X");
        assert!(db.find_tile("B_X4Y0").is_some());
        assert!(db.find_tile("G_X0Y0").is_some());
    }

    #[test]
    fn corner_routing_wire_has_two_neighbors() {
        let db = generate_grid_device(&GridLayout::new(5, 5, Delay::new(1)));
        let corner = db.find_wire("G_X0Y0/R").unwrap();
        // two neighbours plus the FEED pip
        assert_eq!(db.pips_downhill(corner).len(), 3);
        let sink = db.find_wire("B_X4Y2/R").unwrap();
        // three neighbours plus the site entrance
        assert_eq!(db.pips_downhill(sink).len(), 4);
        assert_eq!(db.pips_uphill(sink).len(), 3);
    }

    #[test]
    fn cut_disconnects_columns() {
        let mut layout = GridLayout::new(5, 5, Delay::new(1));
        layout.cut_after_column = Some(2);
        let db = generate_grid_device(&layout);
        let w = db.find_wire("G_X2Y2/R").unwrap();
        let east = db.find_wire("G_X3Y2/R").unwrap();
        assert!(
            db.pips_downhill(w)
                .iter()
                .all(|&p| db.pip_dst_wire(p) != Some(east))
        );
    }

    #[test]
    fn long_wires_join_tiles_into_nodes() {
        let mut layout = GridLayout::new(5, 5, Delay::new(1));
        layout.long_wire_span = Some(3);
        let db = generate_grid_device(&layout);
        // (0 -> 3) and (1 -> 4) in every row
        assert_eq!(db.nodes.len(), 10);

        let west = db.find_wire("X_X1Y2/LE").unwrap();
        assert_eq!(db.find_wire("B_X4Y2/LW"), Some(west));
        assert_eq!(db.tile_loc(db.representative(west).tile), Loc::new(1, 2));
        assert_eq!(db.constituents(west).len(), 2);
        assert_eq!(db.pips_uphill(west).len(), 1);
        assert_eq!(db.pips_downhill(west).len(), 1);

        // X sits in column 1, nothing spans three tiles west of it
        let lone = db.find_wire("X_X1Y2/LW").unwrap();
        assert_eq!(db.constituents(lone).len(), 1);
        assert!(db.pips_downhill(lone).is_empty());
        assert!(crate::util::check::check_device(&db).is_ok());
    }
}
