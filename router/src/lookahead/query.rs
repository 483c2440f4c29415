use super::explore::{ChainDirection, follow_pip_chain};
use super::{InputSiteWireCost, Lookahead};
use crate::graph::RoutingGraph;
use crate::type_wire::{TypeWireId, TypeWirePair};
use fabric_common::db::delay::Delay;
use fabric_common::db::indices::WireId;

impl Lookahead {
    /// Approximate delay from `src` to `dst`.
    ///
    /// `None` means the model sees no way to get there: a dead-end source,
    /// a site wire that cannot reach general routing, or a wire-type pair
    /// that was never sampled. Routers usually treat it as very expensive.
    pub fn estimate_delay<G: RoutingGraph + ?Sized>(
        &self,
        graph: &G,
        src: WireId,
        dst: WireId,
    ) -> Option<Delay> {
        if src == dst {
            return Some(Delay::ZERO);
        }

        let orig_src = src;
        let Some((mut src, mut delay)) =
            follow_pip_chain(graph, src, Some(dst), ChainDirection::Downhill)
        else {
            log::trace!("Source {} is a dead end", graph.wire_name(orig_src));
            return None;
        };
        if src == dst {
            return Some(delay);
        }

        if graph.is_same_site(src, dst)
            && let Some(&cost) = self.site_to_site_cost.get(&TypeWirePair::of(graph, src, dst))
        {
            log::trace!(
                "Found site to site direct path {} -> {}",
                graph.wire_name(src),
                graph.wire_name(dst)
            );
            return Some(delay.saturating_add(cost));
        }

        // general routing is needed from here on, or dst is unreachable
        if let Some(exit) = self.output_site_wires.get(&TypeWireId::of(graph, src)) {
            delay = delay.saturating_add(exit.cost);
            src = graph.canonical_wire(graph.wire_tile(src), exit.cheapest_route_from.index);
        }
        if graph.is_wire_in_site(src) {
            log::trace!(
                "Failed to reach routing network for src {}, got to {}",
                graph.wire_name(orig_src),
                graph.wire_name(src)
            );
            return None;
        }
        if src == dst {
            return Some(delay);
        }

        match self.input_site_wires.get(&TypeWireId::of(graph, dst)) {
            None => {
                if graph.is_wire_in_site(dst) {
                    log::trace!("Failed to reach routing network for dst {}", graph.wire_name(dst));
                    return None;
                }
                self.routed_delay(graph, src, dst, delay)
            }
            Some(candidates) => candidates
                .iter()
                .filter_map(|candidate| self.candidate_delay(graph, src, dst, delay, candidate))
                .min(),
        }
    }

    /// Delay through the general routing fabric to `dst`, which must not be
    /// a site wire.
    fn routed_delay<G: RoutingGraph + ?Sized>(
        &self,
        graph: &G,
        src: WireId,
        dst: WireId,
        delay: Delay,
    ) -> Option<Delay> {
        let (dst, chain_delay) = follow_pip_chain(graph, dst, None, ChainDirection::Uphill)?;
        let delay = delay.saturating_add(chain_delay);
        if src == dst {
            return Some(delay);
        }
        let from_map = self.cost_map.get_delay(graph, src, dst)?;
        Some(delay.saturating_add(from_map))
    }

    fn candidate_delay<G: RoutingGraph + ?Sized>(
        &self,
        graph: &G,
        src: WireId,
        orig_dst: WireId,
        base_delay: Delay,
        input_cost: &InputSiteWireCost,
    ) -> Option<Delay> {
        let delay = base_delay.saturating_add(input_cost.cost);
        let dst = graph.canonical_wire(graph.wire_tile(orig_dst), input_cost.route_to.index);
        if dst == src {
            return Some(delay);
        }
        if graph.is_wire_in_site(dst) {
            return None;
        }
        let total = self.routed_delay(graph, src, dst, delay);
        log::trace!(
            "Possible delay {} -> {} via {}: {:?}",
            graph.wire_name(src),
            graph.wire_name(orig_dst),
            graph.wire_name(dst),
            total
        );
        total
    }
}
