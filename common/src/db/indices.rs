use serde::{Deserialize, Serialize};
use std::fmt::Debug;

macro_rules! define_index {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline(always)]
            pub fn new(id: usize) -> Self {
                Self(id as u32)
            }
            #[inline(always)]
            pub fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_index!(TileTypeId);
define_index!(TileId);
define_index!(NodeId);
define_index!(PipId);
define_index!(BelId);

/// A wire local to one tile instance: `index` is the wire's position in the
/// tile type's wire list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileWire {
    pub tile: TileId,
    pub index: u32,
}

impl TileWire {
    pub fn new(tile: TileId, index: u32) -> Self {
        Self { tile, index }
    }
}

/// A routable wire. Tile wires that belong to a node are always addressed
/// through the node so that every electrically shared wire has one id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WireId {
    Tile(TileWire),
    Node(NodeId),
}

/// A site inside one tile instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SiteRef {
    pub tile: TileId,
    pub site: u32,
}
