//! Lookahead snapshots.
//!
//! A snapshot is a little-endian `u32` header length, a bincode header
//! (magic, format version, database hash, payload checksum) and the bincode
//! payload. Any mismatch in the header reads back as a cache miss.

use super::{InputSiteWireCost, Lookahead, OutputSiteWireCost};
use crate::cost_map::{CostMap, CostMapEntry};
use crate::error::LookaheadError;
use crate::graph::RoutingGraph;
use crate::type_wire::{TypeWireId, TypeWirePair};
use fabric_common::db::delay::Delay;
use fabric_common::util::config::LookaheadConfig;
use fabric_common::util::hash::ContentHash;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

const SNAPSHOT_MAGIC: [u8; 4] = *b"FLKA";

/// Bump on any change to the header or payload layout.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotHeader {
    magic: [u8; 4],
    format_version: u32,
    database_hash: ContentHash,
    checksum: ContentHash,
}

#[derive(Serialize, Deserialize)]
struct SnapshotPayload {
    input_site_wires: Vec<(TypeWireId, Vec<InputSiteWireCost>)>,
    output_site_wires: Vec<(TypeWireId, OutputSiteWireCost)>,
    site_to_site_cost: Vec<(TypeWirePair, Delay)>,
    cost_map: Vec<(TypeWirePair, CostMapEntry)>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LookaheadError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(|e| {
        LookaheadError::Serialization {
            reason: e.to_string(),
        }
    })
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .ok()
        .map(|(value, _)| value)
}

impl Lookahead {
    pub fn to_bytes(&self, database_hash: ContentHash) -> Result<Vec<u8>, LookaheadError> {
        let mut site_to_site_cost: Vec<_> = self
            .site_to_site_cost
            .iter()
            .map(|(&pair, &cost)| (pair, cost))
            .collect();
        site_to_site_cost.sort_unstable();

        let payload = SnapshotPayload {
            input_site_wires: self
                .input_site_wires
                .iter()
                .map(|(&k, v)| (k, v.clone()))
                .collect(),
            output_site_wires: self
                .output_site_wires
                .iter()
                .map(|(&k, &v)| (k, v))
                .collect(),
            site_to_site_cost,
            cost_map: self
                .cost_map
                .sorted_entries()
                .into_iter()
                .map(|(&pair, entry)| (pair, entry.clone()))
                .collect(),
        };
        let payload = encode(&payload)?;

        let header = SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            format_version: SNAPSHOT_FORMAT_VERSION,
            database_hash,
            checksum: ContentHash::from_bytes(&payload),
        };
        let header = encode(&header)?;

        let mut output = Vec::with_capacity(4 + header.len() + payload.len());
        output.extend_from_slice(&(header.len() as u32).to_le_bytes());
        output.extend_from_slice(&header);
        output.extend_from_slice(&payload);
        Ok(output)
    }

    /// Decodes a snapshot taken against `database_hash`. Returns `None` when
    /// the bytes are truncated, corrupt, from another format version or from
    /// another device database.
    pub fn from_bytes(raw: &[u8], database_hash: ContentHash) -> Option<Self> {
        let header_len = u32::from_le_bytes(raw.get(..4)?.try_into().ok()?) as usize;
        let header: SnapshotHeader = decode(raw.get(4..4 + header_len)?)?;
        if header.magic != SNAPSHOT_MAGIC || header.format_version != SNAPSHOT_FORMAT_VERSION {
            return None;
        }
        if header.database_hash != database_hash {
            log::debug!(
                "Lookahead snapshot was taken for database {}, expected {}",
                header.database_hash,
                database_hash
            );
            return None;
        }

        let payload = &raw[4 + header_len..];
        if ContentHash::from_bytes(payload) != header.checksum {
            return None;
        }
        let payload: SnapshotPayload = decode(payload)?;

        Some(Self {
            input_site_wires: payload.input_site_wires.into_iter().collect(),
            output_site_wires: payload.output_site_wires.into_iter().collect(),
            site_to_site_cost: payload.site_to_site_cost.into_iter().collect(),
            cost_map: CostMap::from_entries(payload.cost_map),
        })
    }

    /// Writes the snapshot next to `path` and moves it into place, so readers
    /// never see a partial file.
    pub fn write(&self, path: &Path, database_hash: ContentHash) -> Result<(), LookaheadError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| LookaheadError::Io { path, source }
        };
        let bytes = self.to_bytes(database_hash)?;

        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(io_err(dir))?;
        }
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = Path::new(&temp);

        log::info!("Writing lookahead to {}", temp.display());
        std::fs::write(temp, &bytes).map_err(io_err(temp))?;
        std::fs::rename(temp, path).map_err(io_err(path))
    }

    /// Reads a snapshot from `path`. A missing file is an error; a stale or
    /// corrupt one is `Ok(None)`.
    pub fn read(path: &Path, database_hash: ContentHash) -> Result<Option<Self>, LookaheadError> {
        let raw = std::fs::read(path).map_err(|source| LookaheadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_bytes(&raw, database_hash))
    }

    /// Loads the snapshot at `cache` if it matches the graph, otherwise
    /// builds the lookahead and, unless disabled, writes it back.
    pub fn init<G: RoutingGraph + ?Sized>(
        graph: &G,
        config: &LookaheadConfig,
        cache: &Path,
        rng: &mut StdRng,
    ) -> Result<Self, LookaheadError> {
        let database_hash = graph.database_hash();

        if config.rebuild {
            log::info!("Lookahead rebuild requested");
        } else {
            match Self::read(cache, database_hash) {
                Ok(Some(lookahead)) => {
                    log::info!("Loaded lookahead from {}", cache.display());
                    return Ok(lookahead);
                }
                Ok(None) => log::info!("Lookahead at {} is stale, rebuilding", cache.display()),
                Err(e) => log::info!("No lookahead loaded ({}), building", e),
            }
        }

        let lookahead = Self::build(graph, config, rng)?;
        if config.write_cache {
            lookahead.write(cache, database_hash)?;
        }
        Ok(lookahead)
    }
}
