//! Decant hardware model
//!
//! Data model shared by the liquid-handling compiler: volumes and flow
//! rates, plate geometry, and the hardware deck (heads, adaptors, tips,
//! tip boxes, tip waste, plates and wells).

pub mod channel;
pub mod coords;
pub mod deck;
pub mod error;
pub mod head;
pub mod plate;
pub mod tip;
pub mod units;

pub use channel::ChannelParams;
pub use coords::{Orientation, WellCoords};
pub use deck::{Deck, TipAllocation};
pub use error::{Error, Result};
pub use head::{Adaptor, Head};
pub use plate::{Component, Plate, Well, WellIndex};
pub use tip::{Tip, TipBox, TipType, TipWaste};
pub use units::{FlowRate, Volume, VolumeUnit};
