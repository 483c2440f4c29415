use crate::db::core::{DeviceDb, PinDir};
use crate::db::indices::TileWire;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

fn tile_wire_valid(db: &DeviceDb, tw: TileWire) -> bool {
    if tw.tile.index() >= db.tiles.len() {
        return false;
    }
    let ty = db.tiles[tw.tile.index()].tile_type;
    (tw.index as usize) < db.tile_types[ty.index()].wires.len()
}

/// Verifies the structural contract the lookahead builder relies on. Every
/// violation is logged; the first failure category is returned.
pub fn check_device(db: &DeviceDb) -> Result<(), String> {
    log::info!("Starting Device Verification...");
    let valid = AtomicBool::new(true);

    db.tiles.par_iter().for_each(|tile| {
        if tile.tile_type.index() >= db.tile_types.len() {
            log::error!("FAIL: Tile '{}' has unknown tile type.", tile.name);
            valid.store(false, Ordering::Relaxed);
        }
    });
    if !valid.load(Ordering::Relaxed) {
        return Err("Tile type references are broken.".to_string());
    }

    for ty in &db.tile_types {
        for wire in &ty.wires {
            if let Some(site) = wire.site
                && site as usize >= ty.sites.len()
            {
                log::error!(
                    "FAIL: Wire '{}/{}' references missing site {}.",
                    ty.name,
                    wire.name,
                    site
                );
                valid.store(false, Ordering::Relaxed);
            }
        }
    }
    if !valid.load(Ordering::Relaxed) {
        return Err("Site wire references are broken.".to_string());
    }

    db.nodes.par_iter().enumerate().for_each(|(i, node)| {
        if node.tile_wires.is_empty() {
            log::error!("FAIL: Node {} has no tile wires.", i);
            valid.store(false, Ordering::Relaxed);
        }
        for &tw in &node.tile_wires {
            if !tile_wire_valid(db, tw) {
                log::error!("FAIL: Node {} references invalid tile wire {:?}.", i, tw);
                valid.store(false, Ordering::Relaxed);
            }
        }
    });
    if !valid.load(Ordering::Relaxed) {
        return Err("Node tile wires are broken.".to_string());
    }

    db.pips.par_iter().enumerate().for_each(|(i, pip)| {
        if pip.tile.index() >= db.tiles.len() {
            log::error!("FAIL: Pip {} located in missing tile.", i);
            valid.store(false, Ordering::Relaxed);
            return;
        }
        for tw in [pip.src, pip.dst].into_iter().flatten() {
            if !tile_wire_valid(db, tw) {
                log::error!("FAIL: Pip {} references invalid tile wire {:?}.", i, tw);
                valid.store(false, Ordering::Relaxed);
                return;
            }
        }
        if pip.site_port {
            let touches_site = [pip.src, pip.dst]
                .into_iter()
                .flatten()
                .any(|tw| db.type_wire_data(tw).site.is_some());
            if !touches_site {
                log::error!("FAIL: Site port pip {} does not touch any site wire.", i);
                valid.store(false, Ordering::Relaxed);
            }
        }
    });
    if !valid.load(Ordering::Relaxed) {
        return Err("Pip endpoints are broken.".to_string());
    }

    for bel in &db.bels {
        for pin in &bel.pins {
            let Some(index) = pin.wire_index else {
                continue;
            };
            if !tile_wire_valid(db, TileWire::new(bel.tile, index)) {
                log::error!(
                    "FAIL: Bel '{}' pin '{}' references invalid wire {}.",
                    bel.name,
                    pin.name,
                    index
                );
                valid.store(false, Ordering::Relaxed);
            } else if pin.dir == PinDir::Inout {
                log::warn!(
                    "Bel '{}' pin '{}' is bidirectional and will not seed site costs.",
                    bel.name,
                    pin.name
                );
            }
        }
    }
    if !valid.load(Ordering::Relaxed) {
        return Err("Bel pin wires are broken.".to_string());
    }

    log::info!(
        "Device '{}' verified: {} tile types, {} tiles, {} nodes, {} pips, {} bels.",
        db.name,
        db.tile_types.len(),
        db.tiles.len(),
        db.nodes.len(),
        db.pips.len(),
        db.bels.len()
    );
    Ok(())
}
