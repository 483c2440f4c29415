//! Precomputed delay estimates for router guidance.
//!
//! A [`Lookahead`] is built once per device by sampling the routing graph
//! ([`Lookahead::build`]) or restored from a snapshot ([`Lookahead::init`]),
//! and is read-only afterwards. [`Lookahead::estimate_delay`] then answers
//! two-point queries without searching.

pub mod build;
pub mod explore;
pub mod query;
pub mod storage;

use crate::cost_map::CostMap;
use crate::type_wire::{TypeWireId, TypeWirePair};
use fabric_common::db::delay::Delay;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub use explore::SampleStore;

/// Cheapest general-routing wire feeding an input site wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSiteWireCost {
    pub route_to: TypeWireId,
    pub cost: Delay,
}

/// Cheapest general-routing wire an output site wire drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSiteWireCost {
    pub cheapest_route_from: TypeWireId,
    pub cost: Delay,
}

#[derive(Clone, Debug, Default)]
pub struct Lookahead {
    input_site_wires: BTreeMap<TypeWireId, Vec<InputSiteWireCost>>,
    output_site_wires: BTreeMap<TypeWireId, OutputSiteWireCost>,
    site_to_site_cost: HashMap<TypeWirePair, Delay>,
    cost_map: CostMap,
}

impl Lookahead {
    pub fn cost_map(&self) -> &CostMap {
        &self.cost_map
    }

    pub fn input_site_wires(&self) -> &BTreeMap<TypeWireId, Vec<InputSiteWireCost>> {
        &self.input_site_wires
    }

    pub fn output_site_wires(&self) -> &BTreeMap<TypeWireId, OutputSiteWireCost> {
        &self.output_site_wires
    }

    pub fn site_to_site_cost(&self) -> &HashMap<TypeWirePair, Delay> {
        &self.site_to_site_cost
    }
}
