//! Plates, wells and components
//!
//! The plate owns its wells in an index arena; a well refers to its
//! plate, and a component to its well, only through indices. Each
//! component is owned by exactly one well at a time, and sampling
//! splits off a new component that owns the drawn volume.

use serde::{Deserialize, Serialize};

use crate::coords::WellCoords;
use crate::error::{Error, Result};
use crate::units::Volume;

/// Index of a well within its plate's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WellIndex(pub usize);

/// A named liquid held in a well.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub volume: Volume,
    pub concentration: f64,
    pub stock_concentration: f64,
    /// Back-reference into the owning plate's well arena.
    pub well: Option<WellIndex>,
}

impl Component {
    pub fn new(name: &str, volume: Volume) -> Self {
        Component {
            name: name.to_string(),
            volume,
            concentration: 0.0,
            stock_concentration: 0.0,
            well: None,
        }
    }

    /// Draw `volume` out of this component. The returned component owns
    /// the drawn volume and belongs to no well yet.
    pub fn sample(&mut self, volume: Volume) -> Result<Component> {
        self.volume = self.volume.checked_sub(volume)?;
        let mut drawn = self.clone();
        drawn.volume = volume;
        drawn.well = None;
        Ok(drawn)
    }
}

/// One reservoir within a plate.
#[derive(Debug, Clone)]
pub struct Well {
    pub index: WellIndex,
    pub coords: WellCoords,
    pub capacity: Volume,
    /// Dead volume that can never be recovered by a tip.
    pub residual: Volume,
    contents: Vec<Component>,
}

impl Well {
    pub fn new(index: WellIndex, coords: WellCoords, capacity: Volume, residual: Volume) -> Self {
        Well {
            index,
            coords,
            capacity,
            residual,
            contents: Vec::new(),
        }
    }

    pub fn contents(&self) -> &[Component] {
        &self.contents
    }

    /// Total liquid currently held.
    pub fn current_volume(&self) -> Volume {
        self.contents
            .iter()
            .fold(Volume::ZERO, |acc, c| acc + c.volume)
    }

    /// Usable capacity: total capacity minus the residual dead volume.
    pub fn working_volume(&self) -> Volume {
        self.capacity.checked_sub(self.residual).unwrap_or(Volume::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.current_volume().as_microlitres() <= 1e-6
    }

    /// Add a component, taking ownership. The well invariant
    /// `contents + residual <= capacity` is enforced here.
    pub fn add(&mut self, mut component: Component) -> Result<()> {
        let held = self.current_volume();
        if held + component.volume + self.residual > self.capacity {
            return Err(Error::WellOverflow {
                well: self.coords.to_string(),
                adding: component.volume,
                held,
                residual: self.residual,
                capacity: self.capacity,
            });
        }
        component.well = Some(self.index);
        // merge into an existing component of the same liquid
        if let Some(existing) = self.contents.iter_mut().find(|c| c.name == component.name) {
            existing.volume += component.volume;
        } else {
            self.contents.push(component);
        }
        Ok(())
    }

    /// Draw `volume` from the front of the contents.
    ///
    /// When the front component holds less than requested the whole
    /// component is handed back; contents are ordered and cannot be
    /// unmixed.
    pub fn sample(&mut self, volume: Volume) -> Result<Component> {
        if self.contents.is_empty() {
            return Err(Error::WellUnderflow {
                well: self.coords.to_string(),
                requested: volume,
                available: Volume::ZERO,
            });
        }
        if self.contents[0].volume > volume {
            self.contents[0].sample(volume)
        } else {
            let mut whole = self.contents.remove(0);
            whole.well = None;
            Ok(whole)
        }
    }
}

/// A gridded labware item holding wells.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PlateSpec", into = "PlateSpec")]
pub struct Plate {
    pub plate_type: String,
    pub manufacturer: String,
    pub rows: usize,
    pub cols: usize,
    pub well_capacity: Volume,
    pub well_residual: Volume,
    wells: Vec<Well>,
}

impl Plate {
    pub fn new(
        plate_type: &str,
        manufacturer: &str,
        rows: usize,
        cols: usize,
        well_capacity: Volume,
        well_residual: Volume,
    ) -> Self {
        let wells = (0..rows * cols)
            .map(|i| {
                Well::new(
                    WellIndex(i),
                    WellCoords::new(i / cols, i % cols),
                    well_capacity,
                    well_residual,
                )
            })
            .collect();
        Plate {
            plate_type: plate_type.to_string(),
            manufacturer: manufacturer.to_string(),
            rows,
            cols,
            well_capacity,
            well_residual,
            wells,
        }
    }

    pub fn well_index(&self, coords: WellCoords) -> Option<WellIndex> {
        if coords.row < self.rows && coords.col < self.cols {
            Some(WellIndex(coords.row * self.cols + coords.col))
        } else {
            None
        }
    }

    pub fn well(&self, coords: WellCoords) -> Option<&Well> {
        self.well_index(coords).map(|i| &self.wells[i.0])
    }

    pub fn well_mut(&mut self, coords: WellCoords) -> Option<&mut Well> {
        self.well_index(coords).map(|i| &mut self.wells[i.0])
    }
}

/// Serialized shape of a plate; wells are rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlateSpec {
    plate_type: String,
    manufacturer: String,
    rows: usize,
    cols: usize,
    well_capacity: Volume,
    well_residual: Volume,
}

impl From<PlateSpec> for Plate {
    fn from(spec: PlateSpec) -> Plate {
        Plate::new(
            &spec.plate_type,
            &spec.manufacturer,
            spec.rows,
            spec.cols,
            spec.well_capacity,
            spec.well_residual,
        )
    }
}

impl From<Plate> for PlateSpec {
    fn from(plate: Plate) -> PlateSpec {
        PlateSpec {
            plate_type: plate.plate_type,
            manufacturer: plate.manufacturer,
            rows: plate.rows,
            cols: plate.cols,
            well_capacity: plate.well_capacity,
            well_residual: plate.well_residual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate() -> Plate {
        Plate::new(
            "pcrplate",
            "Applied Biosystems",
            8,
            12,
            Volume::microlitres(200.0),
            Volume::microlitres(5.0),
        )
    }

    #[test]
    fn test_arena_indexing() {
        let p = plate();
        let b2: WellCoords = "B2".parse().unwrap();
        assert_eq!(p.well_index(b2), Some(WellIndex(13)));
        assert_eq!(p.well(b2).unwrap().coords, b2);
        assert!(p.well_index(WellCoords::new(8, 0)).is_none());
    }

    #[test]
    fn test_well_add_and_capacity_invariant() {
        let mut p = plate();
        let a1 = "A1".parse().unwrap();
        let well = p.well_mut(a1).unwrap();
        well.add(Component::new("water", Volume::microlitres(150.0))).unwrap();
        assert_eq!(well.current_volume(), Volume::microlitres(150.0));
        assert_eq!(well.working_volume(), Volume::microlitres(195.0));
        // 150 + 50 + residual 5 > 200
        assert!(matches!(
            well.add(Component::new("water", Volume::microlitres(50.0))),
            Err(Error::WellOverflow { .. })
        ));
        well.add(Component::new("water", Volume::microlitres(45.0))).unwrap();
        assert_eq!(well.contents().len(), 1, "same liquid merges");
    }

    #[test]
    fn test_well_sample_splits_ownership() {
        let mut p = plate();
        let a1 = "A1".parse().unwrap();
        let well = p.well_mut(a1).unwrap();
        well.add(Component::new("glycerol", Volume::microlitres(100.0))).unwrap();

        let drawn = well.sample(Volume::microlitres(30.0)).unwrap();
        assert_eq!(drawn.volume, Volume::microlitres(30.0));
        assert_eq!(drawn.well, None);
        assert_eq!(well.current_volume(), Volume::microlitres(70.0));
        assert_eq!(well.contents()[0].well, Some(well.index));
    }

    #[test]
    fn test_well_sample_empty_fails() {
        let mut p = plate();
        let well = p.well_mut("A1".parse().unwrap()).unwrap();
        assert!(matches!(
            well.sample(Volume::microlitres(1.0)),
            Err(Error::WellUnderflow { .. })
        ));
    }

    #[test]
    fn test_component_sample() {
        let mut c = Component::new("water", Volume::microlitres(10.0));
        let s = c.sample(Volume::microlitres(4.0)).unwrap();
        assert_eq!(s.volume, Volume::microlitres(4.0));
        assert_eq!(c.volume, Volume::microlitres(6.0));
        assert!(c.sample(Volume::microlitres(7.0)).is_err());
    }
}
