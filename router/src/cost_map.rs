use crate::graph::RoutingGraph;
use crate::type_wire::TypeWirePair;
use dashmap::DashMap;
use fabric_common::db::delay::Delay;
use fabric_common::db::indices::WireId;
use fabric_common::geom::coord::Loc;
use fabric_common::geom::rect::BoundingBox;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Smallest per-tile penalty applied when filling or extrapolating.
pub const PENALTY_MIN: Delay = Delay(1);

fn penalize(entry: Delay, distance: u32, penalty: Delay) -> Delay {
    entry.saturating_add(penalty.max(PENALTY_MIN).saturating_mul(distance))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillOutcome {
    /// No cell was missing.
    Complete,
    /// Every hole was filled; the farthest donor was `max_distance` away.
    Filled { max_distance: u32 },
    /// The matrix holds no known cell, so nothing could be filled.
    Empty,
}

/// Delay matrix for one wire-type pair, indexed by tile offset.
///
/// Cells are stored x-major. `origin` is the index of offset `(0, 0)`, so
/// offset `(dx, dy)` lives at `(origin.0 + dx, origin.1 + dy)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostMapEntry {
    x_dim: usize,
    y_dim: usize,
    origin: (i32, i32),
    penalty: Delay,
    data: Vec<Option<Delay>>,
}

impl CostMapEntry {
    /// Builds a filled matrix from the minimum observed delay per offset.
    pub fn from_samples(delays: &HashMap<(i32, i32), Delay>) -> (Self, FillOutcome) {
        let mut origin = (0, 0);
        let mut max_offset = (0, 0);
        for &(dx, dy) in delays.keys() {
            origin.0 = origin.0.max(-dx);
            origin.1 = origin.1.max(-dy);
            max_offset.0 = max_offset.0.max(dx);
            max_offset.1 = max_offset.1.max(dy);
        }

        let x_dim = (origin.0 + max_offset.0 + 1) as usize;
        let y_dim = (origin.1 + max_offset.1 + 1) as usize;
        let mut entry = Self {
            x_dim,
            y_dim,
            origin,
            penalty: Delay::ZERO,
            data: vec![None; x_dim * y_dim],
        };

        let bounds = entry.bounds();
        for (&(dx, dy), &delay) in delays {
            let (ix, iy) = (origin.0 + dx, origin.1 + dy);
            assert!(
                bounds.contains(ix, iy),
                "offset ({}, {}) outside {}x{} matrix",
                dx,
                dy,
                x_dim,
                y_dim
            );
            entry.data[ix as usize * y_dim + iy as usize] = Some(delay);
        }

        entry.penalty = entry.compute_penalty();
        let outcome = entry.fill_holes();
        (entry, outcome)
    }

    pub fn x_dim(&self) -> usize {
        self.x_dim
    }

    pub fn y_dim(&self) -> usize {
        self.y_dim
    }

    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    pub fn penalty(&self) -> Delay {
        self.penalty
    }

    pub fn cells(&self) -> &[Option<Delay>] {
        &self.data
    }

    /// Index-space bounds of the matrix.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(0, 0, self.x_dim as i32 - 1, self.y_dim as i32 - 1)
    }

    #[inline]
    fn cell(&self, ix: i32, iy: i32) -> Option<Delay> {
        self.data[ix as usize * self.y_dim + iy as usize]
    }

    /// `(max - min) / max(1, distance between them)` over known cells.
    fn compute_penalty(&self) -> Delay {
        let mut min: Option<(Delay, (i32, i32))> = None;
        let mut max: Option<(Delay, (i32, i32))> = None;
        for ix in 0..self.x_dim as i32 {
            for iy in 0..self.y_dim as i32 {
                let Some(d) = self.cell(ix, iy) else {
                    continue;
                };
                if min.is_none_or(|(m, _)| d < m) {
                    min = Some((d, (ix, iy)));
                }
                if max.is_none_or(|(m, _)| d > m) {
                    max = Some((d, (ix, iy)));
                }
            }
        }
        match (min, max) {
            (Some((lo, lo_at)), Some((hi, hi_at))) => {
                let distance = Loc::from(hi_at).manhattan(Loc::from(lo_at)).max(1);
                Delay::new(hi.saturating_sub(lo).ps() / distance)
            }
            _ => Delay::ZERO,
        }
    }

    /// Ring-by-ring search for the cheapest known cell nearest `(cx, cy)`.
    /// Returns the donor value and its ring distance.
    fn nearby_cost_entry(&self, cx: i32, cy: i32) -> Option<(Delay, u32)> {
        let bounds = self.bounds();
        if !bounds.contains(cx, cy) {
            return None;
        }
        if let Some(d) = self.cell(cx, cy) {
            return Some((d, 0));
        }

        let mut n = 0i32;
        let mut in_bounds = true;
        while in_bounds {
            n += 1;
            in_bounds = false;
            let mut min_entry: Option<Delay> = None;
            for ox in -n..=n {
                let x = cx + ox;
                let oy = n - ox.abs();
                for y in [cy + oy, cy - oy] {
                    if bounds.contains(x, y) {
                        in_bounds = true;
                        if let Some(d) = self.cell(x, y) {
                            min_entry = Some(min_entry.map_or(d, |m| m.min(d)));
                        }
                    }
                }
            }
            if let Some(d) = min_entry {
                return Some((d, n as u32));
            }
        }
        None
    }

    /// Fills every empty cell from its nearest known neighbour plus the
    /// distance penalty. Donors are read from the matrix as it was before
    /// the call.
    pub fn fill_holes(&mut self) -> FillOutcome {
        let mut missing = Vec::new();
        let mut max_fill = 0;
        for ix in 0..self.x_dim as i32 {
            for iy in 0..self.y_dim as i32 {
                if self.cell(ix, iy).is_some() {
                    continue;
                }
                match self.nearby_cost_entry(ix, iy) {
                    Some((filler, distance)) => {
                        missing.push((ix, iy, penalize(filler, distance, self.penalty)));
                        max_fill = max_fill.max(distance);
                    }
                    None => return FillOutcome::Empty,
                }
            }
        }

        if missing.is_empty() {
            return FillOutcome::Complete;
        }
        for (ix, iy, delay) in missing {
            self.data[ix as usize * self.y_dim + iy as usize] = Some(delay);
        }
        FillOutcome::Filled {
            max_distance: max_fill,
        }
    }

    /// Delay at tile offset `(dx, dy)`. Offsets outside the matrix are
    /// clamped to its edge and charged the penalty per tile of overshoot.
    pub fn lookup(&self, dx: i32, dy: i32) -> Option<Delay> {
        let off = (self.origin.0 + dx, self.origin.1 + dy);
        let closest = self.bounds().clamp(off.0, off.1);
        let cost = self.cell(closest.0, closest.1)?;
        let overshoot = Loc::from(off).manhattan(Loc::from(closest));
        Some(penalize(cost, overshoot, self.penalty))
    }
}

/// Frozen wire-type-pair to delay-matrix table. Read-only, so queries never
/// lock.
#[derive(Clone, Debug, Default)]
pub struct CostMap {
    entries: HashMap<TypeWirePair, CostMapEntry>,
}

impl CostMap {
    pub fn from_entries(entries: impl IntoIterator<Item = (TypeWirePair, CostMapEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, pair: &TypeWirePair) -> Option<&CostMapEntry> {
        self.entries.get(pair)
    }

    /// Entries ordered by key, for stable output.
    pub fn sorted_entries(&self) -> Vec<(&TypeWirePair, &CostMapEntry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_unstable_by_key(|(pair, _)| **pair);
        entries
    }

    pub fn delay_at(&self, pair: &TypeWirePair, dx: i32, dy: i32) -> Option<Delay> {
        self.entries.get(pair)?.lookup(dx, dy)
    }

    /// Estimated delay from `src` to `dst`, or `None` when their type pair
    /// was never sampled.
    pub fn get_delay<G: RoutingGraph + ?Sized>(
        &self,
        graph: &G,
        src: WireId,
        dst: WireId,
    ) -> Option<Delay> {
        let pair = TypeWirePair::of(graph, src, dst);
        let (dx, dy) = graph.wire_location(src).delta_to(graph.wire_location(dst));
        let delay = self.delay_at(&pair, dx, dy);
        if delay.is_none() {
            log::trace!(
                "Delay matrix is missing {} -> {}",
                pair.src.name(graph),
                pair.dst.name(graph)
            );
        }
        delay
    }
}

/// Concurrent staging area for cost-map entries while they are built.
#[derive(Default)]
pub struct CostMapBuilder {
    entries: DashMap<TypeWirePair, CostMapEntry>,
}

impl CostMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cost_map<G: RoutingGraph + ?Sized>(
        &self,
        graph: &G,
        pair: TypeWirePair,
        delays: &HashMap<(i32, i32), Delay>,
    ) {
        let (entry, outcome) = CostMapEntry::from_samples(delays);
        match outcome {
            FillOutcome::Empty => log::warn!(
                "Couldn't fill holes in the cost matrix {} -> {} {} x {} bounding box",
                pair.src.name(graph),
                pair.dst.name(graph),
                entry.x_dim(),
                entry.y_dim()
            ),
            FillOutcome::Filled { max_distance } => log::trace!(
                "At {} -> {}: max_fill = {}, penalty = {}",
                pair.src.name(graph),
                pair.dst.name(graph),
                max_distance,
                entry.penalty()
            ),
            FillOutcome::Complete => {}
        }
        let previous = self.entries.insert(pair, entry);
        assert!(previous.is_none(), "cost map set twice for {:?}", pair);
    }

    pub fn finish(self) -> CostMap {
        CostMap::from_entries(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(points: &[((i32, i32), u32)]) -> HashMap<(i32, i32), Delay> {
        points.iter().map(|&(o, d)| (o, Delay::new(d))).collect()
    }

    fn ramp() -> HashMap<(i32, i32), Delay> {
        samples(&[((0, 0), 2), ((1, 0), 3), ((3, 0), 5), ((0, 2), 6), ((-2, -1), 9)])
    }

    #[test]
    fn sampled_offsets_read_back_exactly() {
        let input = ramp();
        let (entry, _) = CostMapEntry::from_samples(&input);
        for (&(dx, dy), &d) in &input {
            assert_eq!(entry.lookup(dx, dy), Some(d), "offset ({}, {})", dx, dy);
        }
    }

    #[test]
    fn matrix_covers_origin_and_all_offsets() {
        let (entry, _) = CostMapEntry::from_samples(&ramp());
        assert_eq!(entry.origin(), (2, 1));
        assert_eq!(entry.x_dim(), 6);
        assert_eq!(entry.y_dim(), 4);
        assert!(entry.cells().iter().all(Option::is_some));
    }

    #[test]
    fn lookup_is_deterministic() {
        let (entry, _) = CostMapEntry::from_samples(&ramp());
        for dx in -6..6 {
            for dy in -6..6 {
                assert_eq!(entry.lookup(dx, dy), entry.lookup(dx, dy));
            }
        }
    }

    #[test]
    fn extrapolation_never_drops_below_edge() {
        let (entry, _) = CostMapEntry::from_samples(&ramp());
        let edge = entry.lookup(3, 0).unwrap();
        let mut prev = edge;
        for dx in 4..12 {
            let d = entry.lookup(dx, 0).unwrap();
            assert!(d >= prev);
            prev = d;
        }
        assert!(entry.lookup(3, 5).unwrap() >= entry.lookup(3, 2).unwrap());
        assert!(entry.lookup(-7, -7).unwrap() >= entry.lookup(-2, -1).unwrap());
    }

    #[test]
    fn penalty_floor_applies_outside_bounds() {
        // flat map: penalty computes to zero
        let (entry, _) = CostMapEntry::from_samples(&samples(&[((0, 0), 4), ((1, 0), 4)]));
        assert_eq!(entry.penalty(), Delay::ZERO);
        assert_eq!(entry.lookup(1, 0), Some(Delay::new(4)));
        assert_eq!(entry.lookup(4, 0), Some(Delay::new(7)));
    }

    #[test]
    fn penalty_is_slope_between_extremes() {
        let (entry, _) = CostMapEntry::from_samples(&samples(&[((0, 0), 1), ((4, 0), 9)]));
        assert_eq!(entry.penalty(), Delay::new(2));
        // holes at dx 1..3 fill from the nearest sample
        assert_eq!(entry.lookup(1, 0), Some(Delay::new(3)));
        assert_eq!(entry.lookup(3, 0), Some(Delay::new(11)));
    }

    #[test]
    fn fill_holes_is_idempotent() {
        let (mut entry, outcome) = CostMapEntry::from_samples(&ramp());
        assert!(matches!(outcome, FillOutcome::Filled { .. }));
        let before = entry.clone();
        assert_eq!(entry.fill_holes(), FillOutcome::Complete);
        assert_eq!(entry, before);
    }

    #[test]
    fn empty_samples_leave_matrix_unfilled() {
        let (entry, outcome) = CostMapEntry::from_samples(&HashMap::new());
        assert_eq!(outcome, FillOutcome::Empty);
        assert_eq!(entry.lookup(0, 0), None);
    }

    #[test]
    fn set_cost_map_reads_back_through_wires() {
        use crate::graph::DeviceGraph;
        use fabric_common::util::generator::{GridLayout, generate_grid_device};

        let db = generate_grid_device(&GridLayout::new(5, 5, Delay::new(1)));
        let g = DeviceGraph::new(&db).unwrap();
        let wire = |name: &str| db.find_wire(name).unwrap();
        let driver = wire("X_X1Y2/R");
        let sink = wire("B_X4Y2/R");
        let pair = TypeWirePair::of(&g, driver, sink);

        let builder = CostMapBuilder::new();
        builder.set_cost_map(&g, pair, &samples(&[((3, 0), 3), ((3, 1), 4), ((3, -2), 5)]));
        let map = builder.finish();

        assert_eq!(map.len(), 1);
        assert_eq!(map.get_delay(&g, driver, sink), Some(Delay::new(3)));
        assert_eq!(map.get_delay(&g, driver, wire("B_X4Y3/R")), Some(Delay::new(4)));
        assert_eq!(map.get_delay(&g, wire("X_X1Y4/R"), sink), Some(Delay::new(5)));
        // any instance of the two tile types shares the entry
        assert_eq!(
            map.get_delay(&g, wire("X_X1Y0/R"), wire("B_X4Y0/R")),
            Some(Delay::new(3))
        );
        assert_eq!(map.get_delay(&g, sink, driver), None);
    }

    #[test]
    #[should_panic(expected = "cost map set twice")]
    fn setting_a_pair_twice_panics() {
        use crate::graph::DeviceGraph;
        use fabric_common::util::generator::{GridLayout, generate_grid_device};

        let db = generate_grid_device(&GridLayout::new(3, 3, Delay::new(1)));
        let g = DeviceGraph::new(&db).unwrap();
        let r = db.find_wire("G_X0Y0/R").unwrap();
        let pair = TypeWirePair::of(&g, r, r);
        let builder = CostMapBuilder::new();
        builder.set_cost_map(&g, pair, &ramp());
        builder.set_cost_map(&g, pair, &ramp());
    }
}
