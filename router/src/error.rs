use fabric_common::db::indices::{PipId, WireId};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LookaheadError {
    #[error("sample region {region} out of range ({count} regions)")]
    RegionOutOfRange { region: usize, count: usize },

    #[error("pip {pip:?} on a recorded path has no {end} wire")]
    DanglingPip { pip: PipId, end: &'static str },

    #[error("routing loop while walking back from {wire}")]
    RoutingLoop { wire: String },

    #[error("best path to {wire:?} is missing")]
    MissingPath { wire: WireId },

    #[error("lookahead I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("lookahead serialization error: {reason}")]
    Serialization { reason: String },
}
