//! Heads and adaptors
//!
//! A head carries one optional adaptor; the adaptor carries the tips.
//! The effective channel envelope is the head's parameters narrowed by
//! whatever tip type is currently loaded.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelParams;
use crate::tip::TipType;

/// Tip-carrying addendum mounted on a head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adaptor {
    pub name: String,
    pub manufacturer: String,
    pub params: ChannelParams,
    #[serde(default)]
    pub tips_loaded: usize,
    #[serde(default)]
    pub tip_type_loaded: Option<TipType>,
}

impl Adaptor {
    /// Mount `n` tips. Refused while tips are already loaded.
    pub fn load_tips(&mut self, n: usize, tip_type: TipType) -> bool {
        if self.tips_loaded > 0 {
            return false;
        }
        self.tips_loaded = n;
        self.tip_type_loaded = Some(tip_type);
        true
    }

    /// Eject whatever is loaded.
    pub fn unload_tips(&mut self) -> bool {
        if self.tips_loaded == 0 {
            return false;
        }
        self.tips_loaded = 0;
        self.tip_type_loaded = None;
        true
    }

    /// Channel envelope as narrowed by the loaded tips.
    pub fn params(&self) -> ChannelParams {
        match &self.tip_type_loaded {
            Some(tip) => self.params.merge_with_tip(tip),
            None => self.params.clone(),
        }
    }
}

/// A pipetting manifold on the robot arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Head {
    pub name: String,
    pub manufacturer: String,
    pub params: ChannelParams,
    #[serde(default)]
    pub adaptor: Option<Adaptor>,
}

impl Head {
    /// The envelope a transfer actually sees: the adaptor's view when
    /// one is mounted, the bare head parameters otherwise.
    pub fn effective_params(&self) -> ChannelParams {
        match &self.adaptor {
            Some(adaptor) => adaptor.params(),
            None => self.params.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Orientation;
    use crate::units::{FlowRate, Volume};

    fn params(min: f64, max: f64) -> ChannelParams {
        ChannelParams {
            name: "head0".to_string(),
            min_vol: Volume::microlitres(min),
            max_vol: Volume::microlitres(max),
            min_speed: FlowRate(0.1),
            max_speed: FlowRate(10.0),
            multi: 1,
            independent: false,
            orientation: Orientation::Vertical,
            head: 0,
        }
    }

    fn tip() -> TipType {
        TipType {
            manufacturer: "Gilson".to_string(),
            name: "Gilson20".to_string(),
            min_vol: Volume::microlitres(1.0),
            max_vol: Volume::microlitres(20.0),
        }
    }

    #[test]
    fn test_adaptor_tip_cycle() {
        let mut adaptor = Adaptor {
            name: "LVAdaptor".to_string(),
            manufacturer: "Gilson".to_string(),
            params: params(0.5, 250.0),
            tips_loaded: 0,
            tip_type_loaded: None,
        };
        assert!(adaptor.load_tips(1, tip()));
        assert!(!adaptor.load_tips(1, tip()), "double load refused");
        assert_eq!(adaptor.params().max_vol, Volume::microlitres(20.0));
        assert!(adaptor.unload_tips());
        assert!(!adaptor.unload_tips());
        assert_eq!(adaptor.params().max_vol, Volume::microlitres(250.0));
    }

    #[test]
    fn test_effective_params_without_adaptor() {
        let head = Head {
            name: "head0".to_string(),
            manufacturer: "Gilson".to_string(),
            params: params(0.5, 250.0),
            adaptor: None,
        };
        assert_eq!(head.effective_params(), params(0.5, 250.0));
    }
}
