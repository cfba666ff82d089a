//! Channel parameters
//!
//! One set per pipetting pathway: the volume and speed envelope, the
//! channel count and layout, and the head the channels belong to.

use serde::{Deserialize, Serialize};

use crate::coords::Orientation;
use crate::tip::TipType;
use crate::units::{FlowRate, Volume};

/// Capabilities of a pipetting channel group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    pub name: String,
    pub min_vol: Volume,
    pub max_vol: Volume,
    pub min_speed: FlowRate,
    pub max_speed: FlowRate,
    /// Number of independently addressable channels.
    pub multi: usize,
    /// Whether channels can aspirate different volumes in one stroke.
    pub independent: bool,
    pub orientation: Orientation,
    /// Index of the owning head.
    pub head: usize,
}

impl ChannelParams {
    /// The envelope narrowed to what a loaded tip can actually hold:
    /// min/max tighten to the intersection of channel and tip.
    pub fn merge_with_tip(&self, tip: &TipType) -> ChannelParams {
        let mut merged = self.clone();
        if tip.min_vol > merged.min_vol {
            merged.min_vol = tip.min_vol;
        }
        if tip.max_vol < merged.max_vol {
            merged.max_vol = tip.max_vol;
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ChannelParams {
        ChannelParams {
            name: "LVHead".to_string(),
            min_vol: Volume::microlitres(0.5),
            max_vol: Volume::microlitres(200.0),
            min_speed: FlowRate(0.1),
            max_speed: FlowRate(10.0),
            multi: 8,
            independent: false,
            orientation: Orientation::Vertical,
            head: 0,
        }
    }

    #[test]
    fn test_merge_tightens_both_bounds() {
        let tip = TipType {
            manufacturer: "Gilson".to_string(),
            name: "Gilson50".to_string(),
            min_vol: Volume::microlitres(1.0),
            max_vol: Volume::microlitres(50.0),
        };
        let merged = channel().merge_with_tip(&tip);
        assert_eq!(merged.min_vol, Volume::microlitres(1.0));
        assert_eq!(merged.max_vol, Volume::microlitres(50.0));
        assert_eq!(merged.multi, 8);
    }

    #[test]
    fn test_merge_keeps_tighter_channel_bounds() {
        let tip = TipType {
            manufacturer: "Gilson".to_string(),
            name: "Gilson1000".to_string(),
            min_vol: Volume::microlitres(0.1),
            max_vol: Volume::microlitres(1000.0),
        };
        let merged = channel().merge_with_tip(&tip);
        assert_eq!(merged.min_vol, Volume::microlitres(0.5));
        assert_eq!(merged.max_vol, Volume::microlitres(200.0));
    }
}
