use super::explore::{
    ChainDirection, ExploreBounds, PipAndCost, expand_input, expand_output,
    expand_routing_graph_from_wire, follow_pip_chain,
};
use super::{InputSiteWireCost, Lookahead, OutputSiteWireCost, SampleStore};
use crate::cost_map::CostMapBuilder;
use crate::error::LookaheadError;
use crate::graph::RoutingGraph;
use crate::sampler::Sampler;
use crate::type_wire::{TypeWireId, TypeWireSet};
use fabric_common::db::core::{BelCategory, PinDir};
use fabric_common::db::indices::{BelId, TileId, TileTypeId, WireId};
use fabric_common::util::config::LookaheadConfig;
use fabric_common::util::profiler::ScopedTimer;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Private results of expanding one tile type.
#[derive(Default)]
struct TileTypeExpansion {
    storage: SampleStore,
    explored: HashSet<TypeWireSet>,
    deferred: BTreeSet<TypeWireId>,
}

struct SiteWireClasses {
    inputs: BTreeSet<TypeWireId>,
    outputs: BTreeSet<TypeWireId>,
    input_site_ports: BTreeSet<TypeWireId>,
}

fn classify_site_wires<G: RoutingGraph + ?Sized>(graph: &G) -> SiteWireClasses {
    let mut classes = SiteWireClasses {
        inputs: BTreeSet::new(),
        outputs: BTreeSet::new(),
        input_site_ports: BTreeSet::new(),
    };
    for bel in (0..graph.num_bels()).map(BelId::new) {
        let category = graph.bel_category(bel);
        for (wire, dir) in graph.bel_pin_wires(bel) {
            let ty = TypeWireId::of(graph, wire);
            match (category, dir) {
                (BelCategory::Logic, PinDir::Input) => {
                    classes.inputs.insert(ty);
                }
                (BelCategory::Logic, PinDir::Output) => {
                    classes.outputs.insert(ty);
                }
                (BelCategory::SitePort, PinDir::Output) => {
                    classes.input_site_ports.insert(ty);
                }
                _ => {}
            }
        }
    }
    classes
}

/// One sampler per tile type, over the locations of its instances and
/// remapped to absolute tile indices.
fn build_tile_samplers<G: RoutingGraph + ?Sized>(graph: &G, target: usize) -> Vec<Sampler> {
    let mut tiles_of_type: Vec<(Vec<usize>, Vec<(i32, i32)>)> =
        vec![(Vec::new(), Vec::new()); graph.num_tile_types()];
    for tile in 0..graph.num_tiles() {
        let id = TileId::new(tile);
        let loc = graph.tile_location(id);
        let (ids, xys) = &mut tiles_of_type[graph.tile_type(id).index()];
        ids.push(tile);
        xys.push((loc.x, loc.y));
    }

    tiles_of_type
        .into_iter()
        .map(|(ids, xys)| {
            let mut sampler = Sampler::divide_samples(target, &xys);
            sampler.remap(&ids);
            sampler
        })
        .collect()
}

/// Canonical wire `index` in one sampled instance per region.
fn sampled_wires<G: RoutingGraph + ?Sized>(
    graph: &G,
    sampler: &Sampler,
    wire_type: TypeWireId,
    rng: &mut StdRng,
) -> Result<Vec<WireId>, LookaheadError> {
    (0..sampler.number_of_regions())
        .map(|region| -> Result<WireId, LookaheadError> {
            let tile = TileId::new(sampler.get_sample_from_region(region, rng)?);
            debug_assert_eq!(graph.tile_type(tile), wire_type.tile_type);
            Ok(graph.canonical_wire(tile, wire_type.index))
        })
        .collect()
}

fn expand_tile_type<G: RoutingGraph + ?Sized>(
    graph: &G,
    tile_type: TileTypeId,
    sampler: &Sampler,
    mut rng: StdRng,
    bounds: &ExploreBounds,
) -> Result<TileTypeExpansion, LookaheadError> {
    log::debug!(
        "Expanding all wires in type {}",
        graph.tile_type_name(tile_type)
    );

    let mut result = TileTypeExpansion::default();
    let mut best_path: HashMap<WireId, PipAndCost> = HashMap::new();
    for index in 0..graph.tile_type_wire_count(tile_type) as u32 {
        let wire_type = TypeWireId::new(tile_type, index);
        if wire_type.is_site_wire(graph) {
            continue;
        }

        let mut new_explored = Vec::new();
        for wire in sampled_wires(graph, sampler, wire_type, &mut rng)? {
            // single-output wires are usually reached through their driver
            if graph.pips_downhill(wire).len() <= 1 {
                result.deferred.insert(wire_type);
                continue;
            }
            new_explored.push(TypeWireSet::of(graph, wire));
            expand_routing_graph_from_wire(graph, wire, bounds, &mut best_path, &mut result.storage)?;
        }
        result.explored.extend(new_explored);
    }

    log::debug!(
        "Expanded type {}: {} wire sets explored, {} deferred, {} type pairs",
        graph.tile_type_name(tile_type),
        result.explored.len(),
        result.deferred.len(),
        result.storage.len()
    );
    Ok(result)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DeferredStats {
    merged: usize,
    dead_ends: usize,
    explored: usize,
}

/// Revisits deferred wire types: those whose chain ends on an explored wire
/// class are covered already, the rest are explored now.
fn expand_deferred<G: RoutingGraph + ?Sized>(
    graph: &G,
    deferred: &BTreeSet<TypeWireId>,
    samplers: &[Sampler],
    rng: &mut StdRng,
    bounds: &ExploreBounds,
    explored: &mut HashSet<TypeWireSet>,
    storage: &mut SampleStore,
) -> Result<DeferredStats, LookaheadError> {
    let mut stats = DeferredStats::default();
    let mut best_path = HashMap::new();

    for &wire_type in deferred {
        log::trace!(
            "Expanding deferred wire {} (seen {} types)",
            wire_type.name(graph),
            explored.len()
        );
        let sampler = &samplers[wire_type.tile_type.index()];

        let mut new_explored = Vec::new();
        for wire in sampled_wires(graph, sampler, wire_type, rng)? {
            let wire_set = TypeWireSet::of(graph, wire);
            if explored.contains(&wire_set) {
                stats.merged += 1;
                continue;
            }

            let Some((routing_wire, _)) =
                follow_pip_chain(graph, wire, None, ChainDirection::Downhill)
            else {
                stats.dead_ends += 1;
                continue;
            };
            if explored.contains(&TypeWireSet::of(graph, routing_wire)) {
                stats.merged += 1;
                continue;
            }

            stats.explored += 1;
            new_explored.push(wire_set);
            expand_routing_graph_from_wire(graph, wire, bounds, &mut best_path, storage)?;
        }
        explored.extend(new_explored);
    }
    Ok(stats)
}

pub fn write_lookahead_csv<G: RoutingGraph + ?Sized>(
    graph: &G,
    storage: &SampleStore,
    path: &Path,
) -> Result<(), LookaheadError> {
    let io_err = |e| LookaheadError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let file = std::fs::File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "src_type,src_wire,dest_type,dest_wire,delta_x,delta_y,delay").map_err(io_err)?;
    for (pair, dx, dy, delay) in storage.sorted_rows() {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            graph.tile_type_name(pair.src.tile_type),
            graph.type_wire_name(pair.src.tile_type, pair.src.index),
            graph.tile_type_name(pair.dst.tile_type),
            graph.type_wire_name(pair.dst.tile_type, pair.dst.index),
            dx,
            dy,
            delay
        )
        .map_err(io_err)?;
    }
    out.flush().map_err(io_err)
}

impl Lookahead {
    /// Samples the routing graph and builds every cost table.
    pub fn build<G: RoutingGraph + ?Sized>(
        graph: &G,
        config: &LookaheadConfig,
        rng: &mut StdRng,
    ) -> Result<Self, LookaheadError> {
        let _timer = ScopedTimer::new("build_lookahead");
        log::info!("Building lookahead, first gathering input and output site wires");

        let classes = classify_site_wires(graph);
        log::info!(
            "Have {} input and {} output site wire types, {} input site ports. Creating tile type samplers",
            classes.inputs.len(),
            classes.outputs.len(),
            classes.input_site_ports.len()
        );
        let samplers = build_tile_samplers(graph, config.samples_per_region);
        let sampler_of = |ty: TypeWireId| &samplers[ty.tile_type.index()];

        log::info!("Expanding input site wires");
        let mut input_site_wires = BTreeMap::new();
        for &input in &classes.inputs {
            let mut costs = HashMap::new();
            for wire in sampled_wires(graph, sampler_of(input), input, rng)? {
                expand_input(graph, wire, &mut costs);
            }
            let mut costs: Vec<InputSiteWireCost> = costs
                .into_iter()
                .map(|(route_to, cost)| InputSiteWireCost { route_to, cost })
                .collect();
            costs.sort_unstable_by_key(|c| (c.cost, c.route_to));
            input_site_wires.insert(input, costs);
        }

        log::info!("Expanding output site wires");
        let mut output_site_wires = BTreeMap::new();
        let mut site_to_site_cost = HashMap::new();
        for &output in &classes.outputs {
            let mut best: Option<OutputSiteWireCost> = None;
            for wire in sampled_wires(graph, sampler_of(output), output, rng)? {
                expand_output(graph, wire, Some(&mut best), &mut site_to_site_cost)?;
            }
            match best {
                Some(best) => {
                    output_site_wires.insert(output, best);
                }
                None => log::debug!("Output site wire {} never leaves its site", output.name(graph)),
            }
        }
        for &port in &classes.input_site_ports {
            for wire in sampled_wires(graph, sampler_of(port), port, rng)? {
                expand_output(graph, wire, None, &mut site_to_site_cost)?;
            }
        }

        log::info!(
            "Expanding all wire types ({})",
            if config.parallel { "parallel" } else { "serial" }
        );
        let bounds = ExploreBounds {
            max_dist: config.max_explore_dist,
            max_depth: config.max_explore_depth,
        };
        let tile_types: Vec<TileTypeId> =
            (0..graph.num_tile_types()).map(TileTypeId::new).collect();
        let base_rng = rng.clone();
        let expand = |&tile_type: &TileTypeId| {
            expand_tile_type(
                graph,
                tile_type,
                &samplers[tile_type.index()],
                base_rng.clone(),
                &bounds,
            )
        };
        let expansions: Vec<TileTypeExpansion> = {
            let _timer = ScopedTimer::new("expand_tile_types");
            if config.parallel {
                tile_types
                    .par_iter()
                    .map(expand)
                    .collect::<Result<Vec<_>, LookaheadError>>()?
            } else {
                tile_types
                    .iter()
                    .map(expand)
                    .collect::<Result<Vec<_>, LookaheadError>>()?
            }
        };

        let mut storage = SampleStore::new();
        let mut explored = HashSet::new();
        let mut deferred = BTreeSet::new();
        for expansion in expansions {
            storage.merge(expansion.storage);
            explored.extend(expansion.explored);
            deferred.extend(expansion.deferred);
        }
        log::info!(
            "Explored {} wire sets, {} wire types deferred",
            explored.len(),
            deferred.len()
        );

        let stats = expand_deferred(
            graph,
            &deferred,
            &samplers,
            rng,
            &bounds,
            &mut explored,
            &mut storage,
        )?;
        log::info!(
            "Deferred wires: {} merged, {} dead ends, {} explored",
            stats.merged,
            stats.dead_ends,
            stats.explored
        );

        if let Some(csv) = &config.csv_dump {
            write_lookahead_csv(graph, &storage, Path::new(csv))?;
            log::info!("Wrote {} lookahead samples to {}", storage.num_samples(), csv);
        }

        let builder = CostMapBuilder::new();
        let buckets: Vec<_> = storage.pairs().collect();
        if config.parallel {
            buckets
                .par_iter()
                .for_each(|&(pair, delays)| builder.set_cost_map(graph, *pair, delays));
        } else {
            for &(pair, delays) in &buckets {
                builder.set_cost_map(graph, *pair, delays);
            }
        }
        let cost_map = builder.finish();

        log::info!(
            "Lookahead built: {} cost map entries, {} input site wires, {} output site wires, {} site to site pairs",
            cost_map.len(),
            input_site_wires.len(),
            output_site_wires.len(),
            site_to_site_cost.len()
        );

        Ok(Self {
            input_site_wires,
            output_site_wires,
            site_to_site_cost,
            cost_map,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DeviceGraph;
    use fabric_common::db::core::{BelPin, DeviceDb};
    use fabric_common::db::delay::Delay;
    use fabric_common::db::indices::TileWire;
    use fabric_common::geom::coord::Loc;
    use fabric_common::util::generator::{GridLayout, generate_grid_device};
    use rand::SeedableRng;

    #[test]
    fn bel_pins_are_classified() {
        let db = generate_grid_device(&GridLayout::new(5, 5, Delay::new(1)));
        let g = DeviceGraph::new(&db).unwrap();
        let classes = classify_site_wires(&g);
        let names = |set: &BTreeSet<TypeWireId>| -> Vec<String> {
            set.iter().map(|t| t.name(&g)).collect()
        };
        assert_eq!(names(&classes.inputs), vec!["B/I"]);
        assert_eq!(names(&classes.outputs), vec!["X/O"]);
        assert!(classes.input_site_ports.is_empty());
    }

    #[test]
    fn samplers_cover_every_instance() {
        let db = generate_grid_device(&GridLayout::new(6, 4, Delay::new(1)));
        let g = DeviceGraph::new(&db).unwrap();
        let samplers = build_tile_samplers(&g, 4);
        assert_eq!(samplers.len(), g.num_tile_types());
        let mut covered = 0;
        for (ty, sampler) in samplers.iter().enumerate() {
            for r in 0..sampler.number_of_regions() {
                for &tile in sampler.region(r) {
                    assert_eq!(g.tile_type(TileId::new(tile)).index(), ty);
                    covered += 1;
                }
            }
        }
        assert_eq!(covered, g.num_tiles());
    }

    /// A site entered through a site-port bel whose pin wire feeds two more
    /// site wires before leaving onto routing wire `R`.
    fn site_port_db() -> DeviceDb {
        let mut db = DeviceDb::new("siteport");
        let ty = db.add_tile_type("S");
        let site = db.add_site(ty, "SLICE");
        let pin = db.add_type_wire(ty, "PIN", Some(site), Delay::ZERO);
        let a = db.add_type_wire(ty, "A", Some(site), Delay::new(1));
        let b = db.add_type_wire(ty, "B", Some(site), Delay::ZERO);
        let r = db.add_type_wire(ty, "R", None, Delay::ZERO);
        let t = db.add_tile("S_0".to_string(), ty, Loc::new(0, 0));
        let tw = |i| Some(TileWire::new(t, i));
        db.add_pip(t, tw(pin), tw(a), Delay::new(2), false, false);
        db.add_pip(t, tw(a), tw(b), Delay::new(3), false, false);
        db.add_pip(t, tw(b), tw(r), Delay::ZERO, false, true);
        db.add_bel(
            "PORT",
            t,
            site,
            BelCategory::SitePort,
            vec![BelPin {
                name: "P".to_string(),
                wire_index: Some(pin),
                dir: PinDir::Output,
            }],
        );
        db
    }

    #[test]
    fn site_port_output_feeds_site_to_site_table() {
        let db = site_port_db();
        let g = DeviceGraph::new(&db).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let lookahead = Lookahead::build(&g, &LookaheadConfig::default(), &mut rng).unwrap();

        let ty = |name: &str| TypeWireId::of(&g, db.find_wire(name).unwrap());
        let cost = |src: &str, dst: &str| {
            let pair = crate::type_wire::TypeWirePair::new(ty(src), ty(dst));
            lookahead.site_to_site_cost().get(&pair).copied()
        };
        // pip 2 plus the delay of wire A
        assert_eq!(cost("S_0/PIN", "S_0/A"), Some(Delay::new(3)));
        assert_eq!(cost("S_0/A", "S_0/B"), Some(Delay::new(3)));
        assert_eq!(cost("S_0/PIN", "S_0/B"), Some(Delay::new(6)));
        assert_eq!(cost("S_0/PIN", "S_0/R"), None);
        assert!(lookahead.output_site_wires().is_empty());
    }

    fn bounds() -> ExploreBounds {
        let config = LookaheadConfig::default();
        ExploreBounds {
            max_dist: config.max_explore_dist,
            max_depth: config.max_explore_depth,
        }
    }

    #[test]
    fn deferred_wire_is_explored_when_its_chain_is_new() {
        let db = generate_grid_device(&GridLayout::new(5, 5, Delay::new(1)));
        let g = DeviceGraph::new(&db).unwrap();
        let samplers = build_tile_samplers(&g, 4);
        let feed_wire = db.find_wire("G_X2Y2/FEED").unwrap();
        let feed = TypeWireId::of(&g, feed_wire);
        let regions = samplers[feed.tile_type.index()].number_of_regions();

        let mut explored = HashSet::new();
        let mut storage = SampleStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let stats = expand_deferred(
            &g,
            &BTreeSet::from([feed]),
            &samplers,
            &mut rng,
            &bounds(),
            &mut explored,
            &mut storage,
        )
        .unwrap();

        assert_eq!(
            stats,
            DeferredStats {
                merged: 0,
                dead_ends: 0,
                explored: regions,
            }
        );
        // one wire class however many instances were sampled
        assert_eq!(explored, HashSet::from([TypeWireSet::of(&g, feed_wire)]));
        assert!(!storage.is_empty());
    }

    #[test]
    fn deferred_wire_merges_into_explored_routing_wire() {
        let db = generate_grid_device(&GridLayout::new(5, 5, Delay::new(1)));
        let g = DeviceGraph::new(&db).unwrap();
        let samplers = build_tile_samplers(&g, 4);
        let feed = TypeWireId::of(&g, db.find_wire("G_X2Y2/FEED").unwrap());
        let regions = samplers[feed.tile_type.index()].number_of_regions();

        let routing = TypeWireSet::of(&g, db.find_wire("G_X0Y0/R").unwrap());
        let mut explored = HashSet::from([routing]);
        let mut storage = SampleStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let stats = expand_deferred(
            &g,
            &BTreeSet::from([feed]),
            &samplers,
            &mut rng,
            &bounds(),
            &mut explored,
            &mut storage,
        )
        .unwrap();

        assert_eq!(
            stats,
            DeferredStats {
                merged: regions,
                dead_ends: 0,
                explored: 0,
            }
        );
        assert_eq!(explored.len(), 1);
        assert!(storage.is_empty());
    }

    #[test]
    fn deferred_node_wires_merge_or_dead_end() {
        let mut layout = GridLayout::new(5, 5, Delay::new(1));
        layout.long_wire_span = Some(3);
        let db = generate_grid_device(&layout);
        let g = DeviceGraph::new(&db).unwrap();
        let samplers = build_tile_samplers(&g, 4);

        // X_X1Y*/LE spans to the sink column, X_X1Y*/LW is never joined
        let east = TypeWireId::of(&g, db.find_wire("X_X1Y2/LE").unwrap());
        let west = TypeWireId::of(&g, db.find_wire("X_X1Y2/LW").unwrap());
        let regions = samplers[east.tile_type.index()].number_of_regions();

        let sink_routing = TypeWireSet::of(&g, db.find_wire("B_X4Y2/R").unwrap());
        let mut explored = HashSet::from([sink_routing]);
        let mut storage = SampleStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let stats = expand_deferred(
            &g,
            &BTreeSet::from([east, west]),
            &samplers,
            &mut rng,
            &bounds(),
            &mut explored,
            &mut storage,
        )
        .unwrap();

        assert_eq!(
            stats,
            DeferredStats {
                merged: regions,
                dead_ends: regions,
                explored: 0,
            }
        );
        assert!(storage.is_empty());
    }
}
