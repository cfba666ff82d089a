//! Model errors

use thiserror::Error;

use crate::units::Volume;

/// Model result type
pub type Result<T> = std::result::Result<T, Error>;

/// Hardware-model errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("unrecognised volume unit in {0:?}")]
    InconsistentUnits(String),

    #[error("volume arithmetic below zero: {have} - {take}")]
    NegativeVolume { have: Volume, take: Volume },

    #[error("invalid well coordinate {0:?}")]
    InvalidCoords(String),

    #[error("well {well} over capacity: adding {adding} to {held} with residual {residual} exceeds {capacity}")]
    WellOverflow {
        well: String,
        adding: Volume,
        held: Volume,
        residual: Volume,
        capacity: Volume,
    },

    #[error("well {well} cannot supply {requested}, holds {available}")]
    WellUnderflow {
        well: String,
        requested: Volume,
        available: Volume,
    },

    #[error("no head can aspirate {0}")]
    NoHeadAvailable(Volume),

    #[error("no tip type can hold {0}")]
    NoTipTypeAvailable(Volume),

    #[error("head {head} needs an adaptor change for {volume} (adaptor minimum {minimum})")]
    AdaptorChangeRequired {
        head: String,
        volume: Volume,
        minimum: Volume,
    },

    #[error("no tip box holds {multi} contiguous clean {tip_type:?} tips")]
    TipsExhausted { tip_type: String, multi: usize },

    #[error("tip waste full: {contents} of {capacity} used, {adding} more requested")]
    TipWasteFull {
        contents: usize,
        capacity: usize,
        adding: usize,
    },

    #[error("unknown deck position {0:?}")]
    UnknownPosition(String),
}
