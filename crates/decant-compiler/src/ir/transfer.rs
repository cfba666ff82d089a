//! Transfer-side IR payloads
//!
//! The request as handed to the compiler, and the intermediate block
//! and per-channel shapes it lowers through. Every entry owns its
//! volumes outright: committing a chunk mutates this entry and nothing
//! else, so two instructions can never disagree about a running total.

use serde::{Deserialize, Serialize};

use decant_model::{ChannelParams, Volume};

/// One logical transfer: volume of a liquid class between two wells.
///
/// `from_volume` is the source well volume before this transfer runs;
/// `to_volume` is the destination's running total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub what: String,
    pub pos_from: String,
    pub pos_to: String,
    pub well_from: String,
    pub well_to: String,
    pub plate_from: String,
    pub plate_to: String,
    pub volume: Volume,
    pub from_volume: Volume,
    #[serde(default)]
    pub to_volume: Volume,
}

impl TransferEntry {
    /// A copy of this entry carrying `volume` instead of its own.
    pub fn with_volume(&self, volume: Volume) -> TransferEntry {
        let mut copy = self.clone();
        copy.volume = volume;
        copy
    }
}

/// The top-level request: an ordered sequence of logical transfers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub entries: Vec<TransferEntry>,
}

impl Transfer {
    /// True when every entry's remaining volume is at or below the
    /// nanolitre floor.
    pub fn is_exhausted(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.volume.as_microlitres() <= 1e-3)
    }
}

/// Entries to run one at a time on a single channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBlock {
    pub entries: Vec<TransferEntry>,
    pub channel: ChannelParams,
}

/// Parallel sets to run `multi` channels at a stroke, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiChannelBlock {
    pub sets: Vec<Vec<TransferEntry>>,
    pub multi: usize,
    pub channel: ChannelParams,
}

/// One committed chunk on one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleTransfer {
    pub entry: TransferEntry,
    pub channel: ChannelParams,
}

/// One committed chunk across all channels of a head; per-channel
/// volumes are equal by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiTransfer {
    pub entries: Vec<TransferEntry>,
    pub multi: usize,
    pub channel: ChannelParams,
}

/// Shared payload of the suck/blow/reset macros: the channel group and
/// the entries it acts on (one per channel).
#[derive(Debug, Clone, PartialEq)]
pub struct PipetteOp {
    pub entries: Vec<TransferEntry>,
    pub channel: ChannelParams,
    pub multi: usize,
    /// Carried through to `Aspirate`; no lowering path sets it yet.
    pub overstroke: bool,
}

impl PipetteOp {
    pub fn whats(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.what.clone()).collect()
    }

    pub fn volumes(&self) -> Vec<Volume> {
        self.entries.iter().map(|e| e.volume).collect()
    }

    pub fn from_positions(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.pos_from.clone()).collect()
    }

    pub fn from_wells(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.well_from.clone()).collect()
    }

    pub fn from_plate_types(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.plate_from.clone()).collect()
    }

    pub fn from_volumes(&self) -> Vec<Volume> {
        self.entries.iter().map(|e| e.from_volume).collect()
    }

    pub fn to_positions(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.pos_to.clone()).collect()
    }

    pub fn to_wells(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.well_to.clone()).collect()
    }

    pub fn to_plate_types(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.plate_to.clone()).collect()
    }

    pub fn to_volumes(&self) -> Vec<Volume> {
        self.entries.iter().map(|e| e.to_volume).collect()
    }
}
