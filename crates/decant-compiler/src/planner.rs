//! Transfer planning
//!
//! Volume splitting against a channel envelope, and detection of the
//! transfer subsets a multi-channel head can run in one stroke.

use indexmap::IndexMap;

use decant_model::{ChannelParams, Volume, WellCoords};

use crate::error::{Error, Result};
use crate::ir::transfer::Transfer;

/// Split a volume into equal chunks that each fit the channel.
///
/// A volume at or below the maximum goes out whole. Above it, the
/// count is `floor(v / max) + 1` and every chunk is `v / n`: equal
/// chunks stay well inside the channel's resolution, unlike max-sized
/// chunks plus a small tail.
pub fn split_volumes(volume: Volume, min: Volume, max: Volume) -> Result<Vec<Volume>> {
    let v = volume.as_microlitres();
    if v < min.as_microlitres() {
        return Err(Error::VolumeBelowMinimum { volume, min });
    }
    if v <= max.as_microlitres() {
        return Ok(vec![volume]);
    }
    let n = (v / max.as_microlitres()).floor() + 1.0;
    Ok((0..n as usize)
        .map(|_| Volume::microlitres(v / n))
        .collect())
}

/// Group transfer entries into parallel-eligible sets.
///
/// Entries land in the same group when their source wells share a lane
/// (column for vertical channels, row for horizontal) and their
/// destination wells do too. A group is eligible only when its size
/// equals the channel count exactly. Groups come back in the order
/// their first member appears in the request. A single-channel head
/// has no parallelism.
pub fn parallel_sets(transfer: &Transfer, channel: &ChannelParams) -> Result<Vec<Vec<usize>>> {
    if channel.multi <= 1 {
        return Ok(Vec::new());
    }

    let mut groups: IndexMap<(usize, usize), Vec<usize>> = IndexMap::new();
    for (i, entry) in transfer.entries.iter().enumerate() {
        let from: WellCoords = entry.well_from.parse()?;
        let to: WellCoords = entry.well_to.parse()?;
        groups
            .entry((from.lane(channel.orientation), to.lane(channel.orientation)))
            .or_default()
            .push(i);
    }

    Ok(groups
        .into_values()
        .filter(|set| set.len() == channel.multi)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::transfer::TransferEntry;
    use decant_model::{FlowRate, Orientation};

    fn channel(multi: usize, orientation: Orientation) -> ChannelParams {
        ChannelParams {
            name: "head0".to_string(),
            min_vol: Volume::microlitres(1.0),
            max_vol: Volume::microlitres(50.0),
            min_speed: FlowRate(0.1),
            max_speed: FlowRate(10.0),
            multi,
            independent: false,
            orientation,
            head: 0,
        }
    }

    fn entry(well_from: &str, well_to: &str, vol: f64) -> TransferEntry {
        TransferEntry {
            what: "water".to_string(),
            pos_from: "position_1".to_string(),
            pos_to: "position_2".to_string(),
            well_from: well_from.to_string(),
            well_to: well_to.to_string(),
            plate_from: "pcrplate".to_string(),
            plate_to: "pcrplate".to_string(),
            volume: Volume::microlitres(vol),
            from_volume: Volume::microlitres(100.0),
            to_volume: Volume::ZERO,
        }
    }

    #[test]
    fn test_split_whole_when_at_or_below_max() {
        let v = split_volumes(
            Volume::microlitres(50.0),
            Volume::microlitres(1.0),
            Volume::microlitres(50.0),
        )
        .unwrap();
        assert_eq!(v, vec![Volume::microlitres(50.0)]);
    }

    #[test]
    fn test_split_equal_chunks() {
        // floor(120/50) + 1 = 3
        let v = split_volumes(
            Volume::microlitres(120.0),
            Volume::microlitres(1.0),
            Volume::microlitres(50.0),
        )
        .unwrap();
        assert_eq!(v, vec![Volume::microlitres(40.0); 3]);
    }

    #[test]
    fn test_split_below_minimum_faults() {
        assert!(matches!(
            split_volumes(
                Volume::microlitres(0.1),
                Volume::microlitres(1.0),
                Volume::microlitres(50.0),
            ),
            Err(Error::VolumeBelowMinimum { .. })
        ));
    }

    #[test]
    fn test_split_chunks_respect_bounds() {
        for total in [51.0, 99.0, 100.0, 101.0, 333.3, 1000.0] {
            let chunks = split_volumes(
                Volume::microlitres(total),
                Volume::microlitres(1.0),
                Volume::microlitres(50.0),
            )
            .unwrap();
            let sum: f64 = chunks.iter().map(|v| v.as_microlitres()).sum();
            assert!((sum - total).abs() < 1e-9);
            for c in &chunks {
                assert!(c.as_microlitres() <= 50.0 + 1e-9, "{total}: chunk {c}");
                assert!(c.as_microlitres() >= 1.0, "{total}: chunk {c}");
            }
        }
    }

    #[test]
    fn test_parallel_sets_vertical_column() {
        // A1..H1 -> A2..H2: one eligible set of eight
        let entries: Vec<TransferEntry> = (0..8)
            .map(|row| {
                let from = WellCoords::new(row, 0).to_string();
                let to = WellCoords::new(row, 1).to_string();
                entry(&from, &to, 20.0)
            })
            .collect();
        let t = Transfer { entries };
        let sets = parallel_sets(&t, &channel(8, Orientation::Vertical)).unwrap();
        assert_eq!(sets, vec![vec![0, 1, 2, 3, 4, 5, 6, 7]]);
    }

    #[test]
    fn test_parallel_sets_require_exact_size() {
        let entries: Vec<TransferEntry> = (0..7)
            .map(|row| {
                let from = WellCoords::new(row, 0).to_string();
                let to = WellCoords::new(row, 1).to_string();
                entry(&from, &to, 20.0)
            })
            .collect();
        let t = Transfer { entries };
        assert!(parallel_sets(&t, &channel(8, Orientation::Vertical))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parallel_sets_split_by_destination_lane() {
        // same source column but destinations straddle two columns
        let entries: Vec<TransferEntry> = (0..8)
            .map(|row| {
                let from = WellCoords::new(row, 0).to_string();
                let to = WellCoords::new(row, if row < 4 { 1 } else { 2 }).to_string();
                entry(&from, &to, 20.0)
            })
            .collect();
        let t = Transfer { entries };
        assert!(parallel_sets(&t, &channel(8, Orientation::Vertical))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parallel_sets_horizontal_uses_rows() {
        let entries: Vec<TransferEntry> = (0..12)
            .map(|col| {
                let from = WellCoords::new(0, col).to_string();
                let to = WellCoords::new(1, col).to_string();
                entry(&from, &to, 20.0)
            })
            .collect();
        let t = Transfer { entries };
        let sets = parallel_sets(&t, &channel(12, Orientation::Horizontal)).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].len(), 12);
    }

    #[test]
    fn test_single_channel_disables_parallelism() {
        let t = Transfer {
            entries: vec![entry("A1", "A2", 20.0)],
        };
        assert!(parallel_sets(&t, &channel(1, Orientation::Vertical))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_sets_in_first_encountered_order() {
        // two eligible pairs, interleaved; first-seen pair comes first
        let entries = vec![
            entry("A1", "A2", 10.0), // lane pair (0,1)
            entry("A3", "A4", 10.0), // lane pair (2,3)
            entry("B1", "B2", 10.0),
            entry("B3", "B4", 10.0),
        ];
        let t = Transfer { entries };
        let sets = parallel_sets(&t, &channel(2, Orientation::Vertical)).unwrap();
        assert_eq!(sets, vec![vec![0, 2], vec![1, 3]]);
    }
}
