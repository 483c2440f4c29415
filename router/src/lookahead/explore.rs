use super::OutputSiteWireCost;
use crate::error::LookaheadError;
use crate::graph::RoutingGraph;
use crate::type_wire::{TypeWireId, TypeWirePair};
use fabric_common::db::delay::Delay;
use fabric_common::db::indices::{PipId, WireId};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Cycles of single-pip wires are treated as dead ends after this many steps.
const MAX_CHAIN_STEPS: usize = 4096;

#[derive(Clone, Copy, Debug)]
pub struct PipAndCost {
    pub upstream_pip: PipId,
    pub cost_from_src: Delay,
    pub depth: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct ExploreBounds {
    /// Pips at or beyond this tile distance from the start are not expanded.
    pub max_dist: i32,
    pub max_depth: u32,
}

/// Minimum observed delay per wire-type pair and tile offset.
#[derive(Clone, Debug, Default)]
pub struct SampleStore {
    samples: HashMap<TypeWirePair, HashMap<(i32, i32), Delay>>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pair: TypeWirePair, offset: (i32, i32), delay: Delay) {
        self.samples
            .entry(pair)
            .or_default()
            .entry(offset)
            .and_modify(|d| *d = (*d).min(delay))
            .or_insert(delay);
    }

    /// Folds `other` into `self`, keeping the minimum on collisions.
    pub fn merge(&mut self, other: SampleStore) {
        for (pair, offsets) in other.samples {
            for (offset, delay) in offsets {
                self.record(pair, offset, delay);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.values().map(HashMap::len).sum()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&TypeWirePair, &HashMap<(i32, i32), Delay>)> {
        self.samples.iter()
    }

    /// Every sample as `(pair, dx, dy, delay)`, sorted.
    pub fn sorted_rows(&self) -> Vec<(TypeWirePair, i32, i32, Delay)> {
        let mut rows: Vec<_> = self
            .samples
            .iter()
            .flat_map(|(&pair, offsets)| {
                offsets
                    .iter()
                    .map(move |(&(dx, dy), &delay)| (pair, dx, dy, delay))
            })
            .collect();
        rows.sort_unstable();
        rows
    }
}

fn record_min<K: std::hash::Hash + Eq>(map: &mut HashMap<K, Delay>, key: K, cost: Delay) {
    map.entry(key)
        .and_modify(|d| *d = (*d).min(cost))
        .or_insert(cost);
}

/// Backward search from an input site wire to the site-port pips that feed
/// it, recording the cheapest local source wire type of each.
pub fn expand_input<G: RoutingGraph + ?Sized>(
    graph: &G,
    input_wire: WireId,
    input_costs: &mut HashMap<TypeWireId, Delay>,
) {
    let mut seen = HashSet::new();
    let mut to_expand = PriorityQueue::new();
    to_expand.push(input_wire, Reverse(Delay::ZERO));

    while let Some((wire, Reverse(cost))) = to_expand.pop() {
        if !seen.insert(wire) {
            continue;
        }

        for &pip in graph.pips_uphill(wire) {
            if graph.pip_is_synthetic(pip) {
                continue;
            }
            let Some(new_wire) = graph.pip_src_wire(pip) else {
                continue;
            };
            let next_cost = cost.saturating_add(graph.step_delay(pip, new_wire));

            if graph.pip_is_site_port(pip) {
                // the pip's own tile wire, not the node it belongs to
                if let Some(tw) = graph.pip_src_tile_wire(pip) {
                    record_min(input_costs, TypeWireId::of_tile_wire(graph, tw), next_cost);
                }
            } else if !seen.contains(&new_wire) {
                to_expand.push_increase(new_wire, Reverse(next_cost));
            }
        }
    }
}

/// Forward search from an output site wire (or input site port). Records the
/// cheapest site exit into `output_cost` when given, and every best-path
/// segment into `site_to_site_cost`.
pub fn expand_output<G: RoutingGraph + ?Sized>(
    graph: &G,
    output_wire: WireId,
    mut output_cost: Option<&mut Option<OutputSiteWireCost>>,
    site_to_site_cost: &mut HashMap<TypeWirePair, Delay>,
) -> Result<(), LookaheadError> {
    let mut seen = HashSet::new();
    let mut to_expand = PriorityQueue::new();
    let mut best_path: HashMap<WireId, PipAndCost> = HashMap::new();
    to_expand.push(output_wire, Reverse(Delay::ZERO));

    while let Some((wire, Reverse(cost))) = to_expand.pop() {
        if !seen.insert(wire) {
            continue;
        }

        for &pip in graph.pips_downhill(wire) {
            if graph.pip_is_synthetic(pip) {
                continue;
            }
            let Some(new_wire) = graph.pip_dst_wire(pip) else {
                continue;
            };
            let next_cost = cost.saturating_add(graph.step_delay(pip, new_wire));

            if graph.pip_is_site_port(pip) {
                if let Some(best) = output_cost.as_deref_mut()
                    && let Some(tw) = graph.pip_dst_tile_wire(pip)
                    && best.is_none_or(|b| next_cost < b.cost)
                {
                    *best = Some(OutputSiteWireCost {
                        cheapest_route_from: TypeWireId::of_tile_wire(graph, tw),
                        cost: next_cost,
                    });
                }
                continue;
            }

            if !seen.contains(&new_wire) {
                to_expand.push_increase(new_wire, Reverse(next_cost));
            }
            let candidate = PipAndCost {
                upstream_pip: pip,
                cost_from_src: next_cost,
                depth: 0,
            };
            match best_path.entry(new_wire) {
                Entry::Vacant(e) => {
                    e.insert(candidate);
                }
                Entry::Occupied(mut e) if e.get().cost_from_src > next_cost => {
                    e.insert(candidate);
                }
                Entry::Occupied(_) => {}
            }
        }
    }

    update_site_to_site_costs(graph, output_wire, &best_path, site_to_site_cost)
}

/// For every wire on the best-path tree rooted at `first_wire`, records the
/// delta cost from each of its ancestors.
fn update_site_to_site_costs<G: RoutingGraph + ?Sized>(
    graph: &G,
    first_wire: WireId,
    best_path: &HashMap<WireId, PipAndCost>,
    site_to_site_cost: &mut HashMap<TypeWirePair, Delay>,
) -> Result<(), LookaheadError> {
    for (&last_wire, &last) in best_path {
        if last_wire == first_wire {
            continue;
        }
        let dst = TypeWireId::of(graph, last_wire);
        let mut pip_and_cost = last;
        let mut steps = 0;
        loop {
            let pip = pip_and_cost.upstream_pip;
            let cursor = graph
                .pip_src_wire(pip)
                .ok_or(LookaheadError::DanglingPip { pip, end: "source" })?;

            let mut cost = last.cost_from_src;
            if cursor != first_wire {
                pip_and_cost = *best_path
                    .get(&cursor)
                    .ok_or(LookaheadError::MissingPath { wire: cursor })?;
                cost = cost.saturating_sub(pip_and_cost.cost_from_src);
            }
            record_min(
                site_to_site_cost,
                TypeWirePair::new(TypeWireId::of(graph, cursor), dst),
                cost,
            );

            if cursor == first_wire {
                break;
            }
            steps += 1;
            if steps > best_path.len() {
                return Err(LookaheadError::RoutingLoop {
                    wire: graph.wire_name(last_wire),
                });
            }
        }
    }
    Ok(())
}

/// Walks the best path from `sink_wire` back to `src_wire`, recording the
/// cost from the source to every wire once the walk has left the sink's
/// single-input feed.
fn update_results<G: RoutingGraph + ?Sized>(
    graph: &G,
    best_path: &HashMap<WireId, PipAndCost>,
    src_wire: WireId,
    sink_wire: WireId,
    store: &mut SampleStore,
) -> Result<(), LookaheadError> {
    let src_type = TypeWireId::of(graph, src_wire);
    let src_loc = graph.wire_location(src_wire);

    // the first couple of wires before a site pip carry no routing choice
    let mut out_of_infeed = false;
    let mut seen = HashSet::new();
    let mut cursor = sink_wire;
    while cursor != src_wire {
        if !seen.insert(cursor) {
            return Err(LookaheadError::RoutingLoop {
                wire: graph.wire_name(cursor),
            });
        }

        if !out_of_infeed && graph.pips_uphill(cursor).len() > 1 {
            out_of_infeed = true;
        }

        let pip_and_cost = best_path
            .get(&cursor)
            .ok_or(LookaheadError::MissingPath { wire: cursor })?;
        if out_of_infeed {
            let pair = TypeWirePair::new(src_type, TypeWireId::of(graph, cursor));
            let offset = src_loc.delta_to(graph.wire_location(cursor));
            store.record(pair, offset, pip_and_cost.cost_from_src);
        }

        let pip = pip_and_cost.upstream_pip;
        cursor = graph
            .pip_src_wire(pip)
            .ok_or(LookaheadError::DanglingPip { pip, end: "source" })?;
    }
    Ok(())
}

/// Bounded forward search from `first_wire`. Every wire that can enter a
/// site contributes the path leading to it to `store`.
pub fn expand_routing_graph_from_wire<G: RoutingGraph + ?Sized>(
    graph: &G,
    first_wire: WireId,
    bounds: &ExploreBounds,
    best_path: &mut HashMap<WireId, PipAndCost>,
    store: &mut SampleStore,
) -> Result<(), LookaheadError> {
    let src = graph.wire_location(first_wire);
    let mut seen = HashSet::new();
    let mut to_expand = PriorityQueue::new();
    best_path.clear();
    to_expand.push(first_wire, Reverse(Delay::ZERO));

    while let Some((wire, Reverse(cost))) = to_expand.pop() {
        if !seen.insert(wire) {
            continue;
        }
        let depth = if wire == first_wire {
            0
        } else {
            best_path.get(&wire).map_or(0, |p| p.depth)
        };

        let mut has_site_pip = false;
        for &pip in graph.pips_downhill(wire) {
            if graph.pip_is_synthetic(pip) {
                continue;
            }
            // not expanded, but the path up to it is recorded below
            if graph.pip_is_site_port(pip) {
                has_site_pip = true;
                continue;
            }
            let Some(new_wire) = graph.pip_dst_wire(pip) else {
                continue;
            };

            let next = PipAndCost {
                upstream_pip: pip,
                cost_from_src: cost.saturating_add(graph.step_delay(pip, new_wire)),
                depth: depth + 1,
            };
            let is_best_path = match best_path.entry(new_wire) {
                Entry::Vacant(e) => {
                    e.insert(next);
                    true
                }
                Entry::Occupied(mut e) if e.get().cost_from_src > next.cost_from_src => {
                    e.insert(next);
                    true
                }
                Entry::Occupied(_) => false,
            };

            let loc = graph.pip_location(pip);
            if is_best_path
                && (loc.x - src.x).abs() < bounds.max_dist
                && (loc.y - src.y).abs() < bounds.max_dist
                && next.depth < bounds.max_depth
            {
                to_expand.push_increase(new_wire, Reverse(next.cost_from_src));
            }
        }

        if has_site_pip {
            update_results(graph, best_path, first_wire, wire, store)?;
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainDirection {
    Downhill,
    Uphill,
}

/// Follows `wire` through wires with exactly one pip in `direction` until a
/// branch point or `target`. Returns the wire reached and the delay spent,
/// or `None` on a dead end.
pub fn follow_pip_chain<G: RoutingGraph + ?Sized>(
    graph: &G,
    wire: WireId,
    target: Option<WireId>,
    direction: ChainDirection,
) -> Option<(WireId, Delay)> {
    let mut delay = Delay::ZERO;
    let mut cursor = wire;
    for _ in 0..MAX_CHAIN_STEPS {
        if Some(cursor) == target {
            return Some((cursor, delay));
        }
        let pips = match direction {
            ChainDirection::Downhill => graph.pips_downhill(cursor),
            ChainDirection::Uphill => graph.pips_uphill(cursor),
        };
        let pip = match pips {
            [] => return None,
            [pip] => *pip,
            _ => return Some((cursor, delay)),
        };
        let next = match direction {
            ChainDirection::Downhill => graph.pip_dst_wire(pip)?,
            ChainDirection::Uphill => graph.pip_src_wire(pip)?,
        };
        delay = delay.saturating_add(graph.step_delay(pip, next));
        cursor = next;
    }
    log::trace!("Pip chain from {} does not terminate", graph.wire_name(wire));
    None
}
