//! Tips, tip boxes and the tip waste
//!
//! A tip is either clean in its box, loaded on a head, or dirty in the
//! waste. Boxes hand out contiguous runs of clean tips along the
//! channel orientation; the waste is a bounded sink.

use serde::{Deserialize, Serialize};

use crate::coords::{Orientation, WellCoords};
use crate::error::{Error, Result};
use crate::units::Volume;

/// A disposable tip model: the volume band it can conduct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipType {
    pub manufacturer: String,
    pub name: String,
    pub min_vol: Volume,
    pub max_vol: Volume,
}

/// One physical tip in a box or on a head.
#[derive(Debug, Clone, PartialEq)]
pub struct Tip {
    pub type_name: String,
    pub dirty: bool,
}

/// A rows x cols box of tips of a single type.
#[derive(Debug, Clone)]
pub struct TipBox {
    pub box_type: String,
    pub manufacturer: String,
    pub rows: usize,
    pub cols: usize,
    pub tip_type: TipType,
    tips: Vec<Option<Tip>>,
}

impl TipBox {
    /// A full box of clean tips.
    pub fn new(box_type: &str, manufacturer: &str, rows: usize, cols: usize, tip_type: TipType) -> Self {
        let tip = Tip {
            type_name: tip_type.name.clone(),
            dirty: false,
        };
        TipBox {
            box_type: box_type.to_string(),
            manufacturer: manufacturer.to_string(),
            rows,
            cols,
            tip_type,
            tips: vec![Some(tip); rows * cols],
        }
    }

    fn slot(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn tip_at(&self, coords: WellCoords) -> Option<&Tip> {
        self.tips.get(self.slot(coords.row, coords.col))?.as_ref()
    }

    pub fn tips_remaining(&self) -> usize {
        self.tips.iter().filter(|t| t.is_some()).count()
    }

    fn is_clean(&self, row: usize, col: usize) -> bool {
        matches!(self.tips[self.slot(row, col)], Some(ref t) if !t.dirty)
    }

    /// Remove and return the coordinates of the first contiguous run of
    /// `multi` clean tips along `orientation`, or `None` if no lane has
    /// such a run.
    pub fn take_clean(&mut self, orientation: Orientation, multi: usize) -> Option<Vec<WellCoords>> {
        let (lanes, depth) = match orientation {
            Orientation::Vertical => (self.cols, self.rows),
            Orientation::Horizontal => (self.rows, self.cols),
        };
        if multi > depth {
            return None;
        }

        for lane in 0..lanes {
            for start in 0..=(depth - multi) {
                let run: Vec<WellCoords> = (start..start + multi)
                    .map(|i| match orientation {
                        Orientation::Vertical => WellCoords::new(i, lane),
                        Orientation::Horizontal => WellCoords::new(lane, i),
                    })
                    .collect();
                if run.iter().all(|wc| self.is_clean(wc.row, wc.col)) {
                    for wc in &run {
                        let slot = self.slot(wc.row, wc.col);
                        self.tips[slot] = None;
                    }
                    return Some(run);
                }
            }
        }
        None
    }
}

/// Bounded-capacity sink for dirty tips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipWaste {
    pub waste_type: String,
    pub capacity: usize,
    #[serde(default)]
    pub contents: usize,
}

impl TipWaste {
    pub fn new(waste_type: &str, capacity: usize) -> Self {
        TipWaste {
            waste_type: waste_type.to_string(),
            capacity,
            contents: 0,
        }
    }

    /// Accept `n` dirty tips, failing when the bin would overflow.
    pub fn dispose(&mut self, n: usize) -> Result<()> {
        if self.capacity - self.contents < n {
            return Err(Error::TipWasteFull {
                contents: self.contents,
                capacity: self.capacity,
                adding: n,
            });
        }
        self.contents += n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tip_type() -> TipType {
        TipType {
            manufacturer: "Gilson".to_string(),
            name: "Gilson20".to_string(),
            min_vol: Volume::microlitres(0.5),
            max_vol: Volume::microlitres(20.0),
        }
    }

    #[test]
    fn test_take_clean_vertical_walks_columns() {
        let mut tb = TipBox::new("DL10 Tip Rack", "Gilson", 8, 12, tip_type());
        let first = tb.take_clean(Orientation::Vertical, 8).unwrap();
        assert_eq!(first.len(), 8);
        assert!(first.iter().all(|wc| wc.col == 0));
        assert_eq!(first[0], WellCoords::new(0, 0));

        // first column is spent, the next request moves to column 1
        let second = tb.take_clean(Orientation::Vertical, 8).unwrap();
        assert!(second.iter().all(|wc| wc.col == 1));
        assert_eq!(tb.tips_remaining(), 8 * 12 - 16);
    }

    #[test]
    fn test_take_clean_horizontal() {
        let mut tb = TipBox::new("DL10 Tip Rack", "Gilson", 8, 12, tip_type());
        let run = tb.take_clean(Orientation::Horizontal, 12).unwrap();
        assert!(run.iter().all(|wc| wc.row == 0));
        assert_eq!(run.last().unwrap(), &WellCoords::new(0, 11));
    }

    #[test]
    fn test_take_clean_skips_broken_runs() {
        let mut tb = TipBox::new("DL10 Tip Rack", "Gilson", 8, 2, tip_type());
        // burn a hole mid-column: singles leave rows 0..3 free in col 0
        for _ in 0..4 {
            tb.take_clean(Orientation::Vertical, 1).unwrap();
        }
        let run = tb.take_clean(Orientation::Vertical, 8).unwrap();
        assert!(run.iter().all(|wc| wc.col == 1), "col 0 has only 4 left");
    }

    #[test]
    fn test_take_clean_exhaustion() {
        let mut tb = TipBox::new("DL10 Tip Rack", "Gilson", 4, 1, tip_type());
        assert!(tb.take_clean(Orientation::Vertical, 8).is_none());
        assert!(tb.take_clean(Orientation::Vertical, 4).is_some());
        assert!(tb.take_clean(Orientation::Vertical, 1).is_none());
    }

    #[test]
    fn test_waste_capacity() {
        let mut waste = TipWaste::new("TipwasteBox", 6);
        waste.dispose(4).unwrap();
        assert_eq!(waste.contents, 4);
        assert!(matches!(
            waste.dispose(3),
            Err(Error::TipWasteFull {
                contents: 4,
                capacity: 6,
                adding: 3
            })
        ));
        waste.dispose(2).unwrap();
    }
}
