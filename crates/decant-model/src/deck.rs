//! The deck: everything the robot can reach
//!
//! Loaded heads in preference order, the tip-type catalogue, tip boxes
//! and the tip waste at named positions, and plates at named positions.
//! Channel and tip selection live here, as does the well-level volume
//! bookkeeping for transfers the compiler commits.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::channel::ChannelParams;
use crate::error::{Error, Result};
use crate::head::Head;
use crate::plate::{Component, Plate};
use crate::tip::{TipBox, TipType, TipWaste};
use crate::units::Volume;
use crate::coords::WellCoords;

/// Result of a tip-box or tip-waste allocation: one entry per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TipAllocation {
    pub wells: Vec<String>,
    pub positions: Vec<String>,
    pub holder_types: Vec<String>,
}

/// The hardware profile a compile runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DeckSpec")]
pub struct Deck {
    /// Heads in selection-preference order.
    pub heads: Vec<Head>,
    /// Tip types available on this deck.
    pub tip_types: Vec<TipType>,
    #[serde(skip)]
    tip_boxes: Vec<(String, TipBox)>,
    #[serde(skip)]
    tip_waste: Option<(String, TipWaste)>,
    #[serde(skip)]
    plates: IndexMap<String, Plate>,
}

impl Deck {
    pub fn new(heads: Vec<Head>, tip_types: Vec<TipType>) -> Self {
        Deck {
            heads,
            tip_types,
            tip_boxes: Vec::new(),
            tip_waste: None,
            plates: IndexMap::new(),
        }
    }

    pub fn add_tip_box(&mut self, position: &str, tip_box: TipBox) {
        self.tip_boxes.push((position.to_string(), tip_box));
    }

    pub fn set_tip_waste(&mut self, position: &str, waste: TipWaste) {
        self.tip_waste = Some((position.to_string(), waste));
    }

    pub fn add_plate(&mut self, position: &str, plate: Plate) {
        self.plates.insert(position.to_string(), plate);
    }

    pub fn plate(&self, position: &str) -> Option<&Plate> {
        self.plates.get(position)
    }

    /// Pick the head and tip type for a requested volume.
    ///
    /// The first head whose channel minimum sits at or below the volume
    /// wins; the tip type minimises `volume - tip.min_vol` among tips
    /// that can hold the volume. A head whose mounted adaptor cannot go
    /// that low needs an adaptor change, which the compiler reports
    /// rather than performs.
    pub fn choose_channel(&self, volume: Volume) -> Result<(ChannelParams, String)> {
        let head = self
            .heads
            .iter()
            .find(|h| h.params.min_vol <= volume)
            .ok_or(Error::NoHeadAvailable(volume))?;

        if let Some(adaptor) = &head.adaptor {
            if adaptor.params.min_vol > volume {
                return Err(Error::AdaptorChangeRequired {
                    head: head.name.clone(),
                    volume,
                    minimum: adaptor.params.min_vol,
                });
            }
        }

        let mut tip_type: Option<&TipType> = None;
        let mut closest = f64::INFINITY;
        for tip in &self.tip_types {
            let gap = volume.as_microlitres() - tip.min_vol.as_microlitres();
            if gap >= 0.0 && gap < closest {
                tip_type = Some(tip);
                closest = gap;
            }
        }
        let tip_type = tip_type.ok_or(Error::NoTipTypeAvailable(volume))?;

        trace!(head = %head.name, tip = %tip_type.name, %volume, "channel chosen");
        Ok((head.effective_params(), tip_type.name.clone()))
    }

    /// Allocate `multi` clean tips of `tip_type` along the channel
    /// orientation and mark them taken.
    ///
    /// `mirror` is accepted for interface parity with mirrored-head
    /// layouts; no deck in this model mirrors.
    pub fn get_clean_tips(
        &mut self,
        tip_type: &str,
        channel: &ChannelParams,
        mirror: bool,
        multi: usize,
    ) -> Result<TipAllocation> {
        let _ = mirror;
        for (position, tip_box) in &mut self.tip_boxes {
            if tip_box.tip_type.name != tip_type {
                continue;
            }
            if let Some(run) = tip_box.take_clean(channel.orientation, multi) {
                debug!(%position, tip_type, multi, "tips taken");
                return Ok(TipAllocation {
                    wells: run.iter().map(WellCoords::to_string).collect(),
                    positions: vec![position.clone(); multi],
                    holder_types: vec![tip_box.box_type.clone(); multi],
                });
            }
        }
        Err(Error::TipsExhausted {
            tip_type: tip_type.to_string(),
            multi,
        })
    }

    /// Reserve space in the tip waste for `multi` dirty tips.
    pub fn drop_dirty_tips(&mut self, channel: &ChannelParams, multi: usize) -> Result<TipAllocation> {
        let _ = channel;
        let (position, waste) = self
            .tip_waste
            .as_mut()
            .ok_or_else(|| Error::UnknownPosition("tip waste".to_string()))?;
        waste.dispose(multi)?;
        debug!(position = %position, multi, occupancy = waste.contents, "tips dropped");
        Ok(TipAllocation {
            wells: vec!["A1".to_string(); multi],
            positions: vec![position.clone(); multi],
            holder_types: vec![waste.waste_type.clone(); multi],
        })
    }

    /// Move a committed volume between tracked wells.
    ///
    /// The transfer request carries its own running totals; the deck
    /// only mirrors the movement onto plates it actually models, and
    /// quietly ignores positions it does not.
    pub fn apply_transfer(
        &mut self,
        what: &str,
        pos_from: &str,
        well_from: &str,
        pos_to: &str,
        well_to: &str,
        volume: Volume,
    ) -> Result<()> {
        let component = match self.plates.get_mut(pos_from) {
            Some(plate) => {
                let coords: WellCoords = well_from.parse()?;
                match plate.well_mut(coords) {
                    Some(well) => Some(well.sample(volume)?),
                    None => None,
                }
            }
            None => {
                trace!(position = pos_from, "source position not tracked");
                None
            }
        };

        if let Some(plate) = self.plates.get_mut(pos_to) {
            let coords: WellCoords = well_to.parse()?;
            if let Some(well) = plate.well_mut(coords) {
                let component = component.unwrap_or_else(|| Component::new(what, volume));
                well.add(component)?;
            }
        } else {
            trace!(position = pos_to, "destination position not tracked");
        }
        Ok(())
    }
}

/// Serialized deck description.
#[derive(Debug, Clone, Deserialize)]
struct DeckSpec {
    heads: Vec<Head>,
    tip_types: Vec<TipType>,
    #[serde(default)]
    tip_boxes: Vec<TipBoxSpec>,
    #[serde(default)]
    tip_waste: Option<TipWasteSpec>,
    #[serde(default)]
    plates: Vec<PlateSpecAt>,
}

#[derive(Debug, Clone, Deserialize)]
struct TipBoxSpec {
    position: String,
    box_type: String,
    manufacturer: String,
    rows: usize,
    cols: usize,
    tip_type: TipType,
}

#[derive(Debug, Clone, Deserialize)]
struct TipWasteSpec {
    position: String,
    waste_type: String,
    capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct PlateSpecAt {
    position: String,
    #[serde(flatten)]
    plate: Plate,
    #[serde(default)]
    contents: Vec<WellContentSpec>,
}

/// Liquid present in a well before the run starts.
#[derive(Debug, Clone, Deserialize)]
struct WellContentSpec {
    well: WellCoords,
    what: String,
    volume: Volume,
}

impl TryFrom<DeckSpec> for Deck {
    type Error = Error;

    fn try_from(spec: DeckSpec) -> Result<Deck> {
        let mut deck = Deck::new(spec.heads, spec.tip_types);
        for tb in spec.tip_boxes {
            deck.add_tip_box(
                &tb.position,
                TipBox::new(&tb.box_type, &tb.manufacturer, tb.rows, tb.cols, tb.tip_type),
            );
        }
        if let Some(tw) = spec.tip_waste {
            deck.set_tip_waste(&tw.position, TipWaste::new(&tw.waste_type, tw.capacity));
        }
        for p in spec.plates {
            let mut plate = p.plate;
            for content in p.contents {
                let well = plate
                    .well_mut(content.well)
                    .ok_or_else(|| Error::UnknownPosition(format!("{}:{}", p.position, content.well)))?;
                well.add(Component::new(&content.what, content.volume))?;
            }
            deck.add_plate(&p.position, plate);
        }
        Ok(deck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Orientation;
    use crate::units::FlowRate;

    fn channel(name: &str, min: f64, max: f64, multi: usize, head: usize) -> ChannelParams {
        ChannelParams {
            name: name.to_string(),
            min_vol: Volume::microlitres(min),
            max_vol: Volume::microlitres(max),
            min_speed: FlowRate(0.1),
            max_speed: FlowRate(10.0),
            multi,
            independent: false,
            orientation: Orientation::Vertical,
            head,
        }
    }

    fn head(name: &str, min: f64, max: f64, multi: usize, index: usize) -> Head {
        Head {
            name: name.to_string(),
            manufacturer: "Gilson".to_string(),
            params: channel(name, min, max, multi, index),
            adaptor: None,
        }
    }

    fn tip(name: &str, min: f64, max: f64) -> TipType {
        TipType {
            manufacturer: "Gilson".to_string(),
            name: name.to_string(),
            min_vol: Volume::microlitres(min),
            max_vol: Volume::microlitres(max),
        }
    }

    fn deck() -> Deck {
        let mut deck = Deck::new(
            vec![
                head("LVHead", 0.5, 50.0, 8, 0),
                head("HVHead", 20.0, 1000.0, 8, 1),
            ],
            vec![tip("Gilson20", 0.5, 20.0), tip("Gilson200", 10.0, 200.0)],
        );
        deck.add_tip_box(
            "tipbox_1",
            TipBox::new("DL10 Tip Rack", "Gilson", 8, 12, tip("Gilson20", 0.5, 20.0)),
        );
        deck.set_tip_waste("tipwaste", TipWaste::new("TipwasteBox", 700));
        deck
    }

    #[test]
    fn test_choose_channel_first_head_wins() {
        let d = deck();
        let (params, tip_type) = d.choose_channel(Volume::microlitres(15.0)).unwrap();
        assert_eq!(params.head, 0);
        // 15 - 10 beats 15 - 0.5
        assert_eq!(tip_type, "Gilson200");
    }

    #[test]
    fn test_choose_channel_tip_minimises_gap() {
        let d = deck();
        let (_, tip_type) = d.choose_channel(Volume::microlitres(5.0)).unwrap();
        assert_eq!(tip_type, "Gilson20");
    }

    #[test]
    fn test_choose_channel_no_head() {
        let d = deck();
        assert!(matches!(
            d.choose_channel(Volume::microlitres(0.1)),
            Err(Error::NoHeadAvailable(_))
        ));
    }

    #[test]
    fn test_choose_channel_no_tip() {
        let mut d = deck();
        d.tip_types = vec![tip("Gilson200", 10.0, 200.0)];
        assert!(matches!(
            d.choose_channel(Volume::microlitres(5.0)),
            Err(Error::NoTipTypeAvailable(_))
        ));
    }

    #[test]
    fn test_choose_channel_adaptor_gate() {
        let mut d = deck();
        d.heads[0].adaptor = Some(crate::head::Adaptor {
            name: "HVAdaptor".to_string(),
            manufacturer: "Gilson".to_string(),
            params: channel("HVAdaptor", 10.0, 1000.0, 8, 0),
            tips_loaded: 0,
            tip_type_loaded: None,
        });
        assert!(matches!(
            d.choose_channel(Volume::microlitres(5.0)),
            Err(Error::AdaptorChangeRequired { .. })
        ));
    }

    #[test]
    fn test_get_clean_tips_marks_taken() {
        let mut d = deck();
        let chan = channel("LVHead", 0.5, 50.0, 8, 0);
        let alloc = d.get_clean_tips("Gilson20", &chan, false, 8).unwrap();
        assert_eq!(alloc.wells.len(), 8);
        assert_eq!(alloc.wells[0], "A1");
        assert_eq!(alloc.positions[0], "tipbox_1");

        let next = d.get_clean_tips("Gilson20", &chan, false, 8).unwrap();
        assert_eq!(next.wells[0], "A2", "column 1 was consumed");
    }

    #[test]
    fn test_get_clean_tips_unknown_type() {
        let mut d = deck();
        let chan = channel("LVHead", 0.5, 50.0, 8, 0);
        assert!(matches!(
            d.get_clean_tips("Gilson1000", &chan, false, 1),
            Err(Error::TipsExhausted { .. })
        ));
    }

    #[test]
    fn test_drop_dirty_tips_counts_occupancy() {
        let mut d = deck();
        let chan = channel("LVHead", 0.5, 50.0, 8, 0);
        let alloc = d.drop_dirty_tips(&chan, 8).unwrap();
        assert_eq!(alloc.positions[0], "tipwaste");
        for _ in 0..86 {
            d.drop_dirty_tips(&chan, 8).unwrap();
        }
        // 87 * 8 = 696 of 700 used
        assert!(matches!(
            d.drop_dirty_tips(&chan, 8),
            Err(Error::TipWasteFull { .. })
        ));
    }

    #[test]
    fn test_apply_transfer_tracked_and_untracked() {
        let mut d = deck();
        let mut src = Plate::new(
            "pcrplate",
            "AB",
            8,
            12,
            Volume::microlitres(200.0),
            Volume::microlitres(5.0),
        );
        src.well_mut("A1".parse().unwrap())
            .unwrap()
            .add(Component::new("water", Volume::microlitres(100.0)))
            .unwrap();
        d.add_plate("position_1", src);
        d.add_plate(
            "position_2",
            Plate::new(
                "pcrplate",
                "AB",
                8,
                12,
                Volume::microlitres(200.0),
                Volume::microlitres(5.0),
            ),
        );

        d.apply_transfer("water", "position_1", "A1", "position_2", "B2", Volume::microlitres(10.0))
            .unwrap();
        let src_well = d.plate("position_1").unwrap().well("A1".parse().unwrap()).unwrap();
        let dst_well = d.plate("position_2").unwrap().well("B2".parse().unwrap()).unwrap();
        assert_eq!(src_well.current_volume(), Volume::microlitres(90.0));
        assert_eq!(dst_well.current_volume(), Volume::microlitres(10.0));

        // untracked positions are ignored, not an error
        d.apply_transfer("water", "nowhere", "A1", "elsewhere", "A1", Volume::microlitres(5.0))
            .unwrap();
    }

    #[test]
    fn test_deck_deserialize() {
        let json = r#"{
            "heads": [{
                "name": "LVHead",
                "manufacturer": "Gilson",
                "params": {
                    "name": "LVHead",
                    "min_vol": "0.5ul",
                    "max_vol": "50ul",
                    "min_speed": 0.1,
                    "max_speed": 10.0,
                    "multi": 8,
                    "independent": false,
                    "orientation": "vertical",
                    "head": 0
                }
            }],
            "tip_types": [{
                "manufacturer": "Gilson",
                "name": "Gilson20",
                "min_vol": "0.5ul",
                "max_vol": "20ul"
            }],
            "tip_boxes": [{
                "position": "tipbox_1",
                "box_type": "DL10 Tip Rack",
                "manufacturer": "Gilson",
                "rows": 8,
                "cols": 12,
                "tip_type": {
                    "manufacturer": "Gilson",
                    "name": "Gilson20",
                    "min_vol": "0.5ul",
                    "max_vol": "20ul"
                }
            }],
            "tip_waste": {"position": "tipwaste", "waste_type": "TipwasteBox", "capacity": 700},
            "plates": [{
                "position": "position_1",
                "plate_type": "pcrplate",
                "manufacturer": "AB",
                "rows": 8,
                "cols": 12,
                "well_capacity": "200ul",
                "well_residual": "5ul",
                "contents": [
                    {"well": "A1", "what": "water", "volume": "150ul"}
                ]
            }]
        }"#;
        let deck: Deck = serde_json::from_str(json).unwrap();
        assert_eq!(deck.heads.len(), 1);
        assert!(deck.choose_channel(Volume::microlitres(5.0)).is_ok());
        let well = deck
            .plate("position_1")
            .unwrap()
            .well("A1".parse().unwrap())
            .unwrap();
        assert_eq!(well.current_volume(), Volume::microlitres(150.0));
        assert_eq!(well.contents()[0].name, "water");
    }

    #[test]
    fn test_deck_deserialize_rejects_overfilled_wells() {
        let json = r#"{
            "heads": [],
            "tip_types": [],
            "plates": [{
                "position": "position_1",
                "plate_type": "pcrplate",
                "manufacturer": "AB",
                "rows": 8,
                "cols": 12,
                "well_capacity": "200ul",
                "well_residual": "5ul",
                "contents": [
                    {"well": "A1", "what": "water", "volume": "300ul"}
                ]
            }]
        }"#;
        assert!(serde_json::from_str::<Deck>(json).is_err());
    }
}
