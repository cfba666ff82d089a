//! Block lowering
//!
//! `Transfer` folds into a multi-channel block (when policy allows and
//! the geometry lines up) plus a single-channel block for the rest.
//! Blocks then expand into per-channel transfers with tip acquisition,
//! reuse accounting and replacement woven in between.

use tracing::debug;

use decant_model::{ChannelParams, Deck, Volume};

use crate::error::Result;
use crate::ir::ops::{MoveOp, TipsMoveOp, TipsOp};
use crate::ir::transfer::{
    ChannelBlock, MultiChannelBlock, MultiTransfer, SingleTransfer, Transfer, TransferEntry,
};
use crate::ir::Instruction;
use crate::planner;
use crate::policy::Policy;

/// Remaining volumes at or below this are treated as already done.
const REMAINDER_FLOOR: f64 = 1e-3; // microlitres

/// Channel selection with the request-level reading of "no head": when
/// heads exist but the volume sits under every minimum, the request is
/// below minimum, not the deck incomplete.
fn choose_channel(deck: &Deck, volume: Volume) -> Result<(ChannelParams, String)> {
    match deck.choose_channel(volume) {
        Err(decant_model::Error::NoHeadAvailable(v)) if !deck.heads.is_empty() => {
            let min = deck
                .heads
                .iter()
                .map(|h| h.params.min_vol)
                .reduce(|a, b| if b < a { b } else { a })
                .unwrap_or(Volume::ZERO);
            Err(crate::Error::VolumeBelowMinimum { volume: v, min })
        }
        other => other.map_err(Into::into),
    }
}

/// Fold a transfer into blocks under the `CAN_MULTI` policy switch.
pub fn lower_transfer(
    t: &mut Transfer,
    policy: &Policy,
    deck: &mut Deck,
) -> Result<Vec<Instruction>> {
    let mut out = Vec::new();
    if t.entries.is_empty() {
        return Ok(out);
    }

    let can_multi = policy.get_bool("CAN_MULTI").unwrap_or(false);
    if can_multi {
        if let Some(head) = deck.heads.first() {
            let channel = head.effective_params();
            let sets = planner::parallel_sets(t, &channel)?;
            let mut rows: Vec<Vec<TransferEntry>> = Vec::new();
            for set in sets {
                // every channel aspirates the smallest volume in the
                // set; remainders stay behind for the single block
                let volume = match set
                    .iter()
                    .map(|&i| t.entries[i].volume)
                    .reduce(|a, b| if b < a { b } else { a })
                {
                    Some(v) if v.as_microlitres() > REMAINDER_FLOOR => v,
                    _ => continue,
                };

                let mut row = Vec::with_capacity(set.len());
                for &i in &set {
                    let entry = &mut t.entries[i];
                    row.push(entry.with_volume(volume));
                    entry.volume = entry.volume.checked_sub(volume)?;
                    entry.from_volume = entry.from_volume.checked_sub(volume)?;
                    entry.to_volume += volume;
                }
                rows.push(row);
            }
            if !rows.is_empty() {
                debug!(sets = rows.len(), multi = channel.multi, "parallel sets found");
                out.push(Instruction::MultiChannelBlock(MultiChannelBlock {
                    sets: rows,
                    multi: channel.multi,
                    channel,
                }));
            }
        }
    }

    // mop up whatever still has volume on it
    let mut singles = Vec::new();
    for entry in &mut t.entries {
        if entry.volume.as_microlitres() <= REMAINDER_FLOOR {
            continue;
        }
        singles.push(entry.clone());
        entry.from_volume = entry.from_volume.checked_sub(entry.volume)?;
        entry.to_volume += entry.volume;
        entry.volume = Volume::ZERO;
    }
    if !singles.is_empty() {
        if let Some(head) = deck.heads.first() {
            out.push(Instruction::SingleChannelBlock(ChannelBlock {
                entries: singles,
                channel: head.effective_params(),
            }));
        } else {
            return Err(decant_model::Error::NoHeadAvailable(singles[0].volume).into());
        }
    }
    Ok(out)
}

/// Expand a single-channel block entry by entry, chunk by chunk.
pub fn lower_single_block(
    b: &mut ChannelBlock,
    policy: &Policy,
    deck: &mut Deck,
) -> Result<Vec<Instruction>> {
    let Some(first) = b.entries.first() else {
        return Ok(Vec::new());
    };
    let reuse_limit = policy.get_int("TIP_REUSE_LIMIT").unwrap_or(i64::MAX);

    let (mut channel, mut tip_type) =
        choose_channel(deck, first.volume).map_err(|e| e.at_transfer(0))?;
    let mut out = vec![get_tips(deck, &tip_type, &channel, 1)?];
    let mut tip_uses: i64 = 0;

    for (index, entry) in b.entries.iter_mut().enumerate() {
        let (new_channel, new_tip_type) =
            choose_channel(deck, entry.volume).map_err(|e| e.at_transfer(index))?;
        let chunks = planner::split_volumes(entry.volume, new_channel.min_vol, new_channel.max_vol)
            .map_err(|e| e.at_transfer(index))?;

        for volume in chunks {
            if tip_uses >= reuse_limit || new_channel != channel || new_tip_type != tip_type {
                out.push(drop_tips(deck, &channel, 1)?);
                out.push(get_tips(deck, &new_tip_type, &new_channel, 1)?);
                channel = new_channel.clone();
                tip_type = new_tip_type.clone();
                tip_uses = 0;
            }

            out.push(Instruction::SingleChannelTransfer(SingleTransfer {
                entry: entry.with_volume(volume),
                channel: channel.clone(),
            }));

            deck.apply_transfer(
                &entry.what,
                &entry.pos_from,
                &entry.well_from,
                &entry.pos_to,
                &entry.well_to,
                volume,
            )
            .map_err(|e| crate::Error::from(e).at_transfer(index))?;
            entry.from_volume = entry
                .from_volume
                .checked_sub(volume)
                .map_err(|e| crate::Error::from(e).at_transfer(index))?;
            entry.to_volume += volume;
            tip_uses += 1;
        }
    }

    out.push(drop_tips(deck, &channel, 1)?);
    Ok(out)
}

/// Expand a multi-channel block set by set.
///
/// Split bounds come from the channel chosen for each set's first
/// entry; the planner's min-of-set volume choice makes every entry in
/// the set identical, so the bounds hold across the stroke.
pub fn lower_multi_block(
    b: &mut MultiChannelBlock,
    policy: &Policy,
    deck: &mut Deck,
) -> Result<Vec<Instruction>> {
    let Some(first) = b.sets.first().and_then(|s| s.first()) else {
        return Ok(Vec::new());
    };
    let reuse_limit = policy.get_int("TIP_REUSE_LIMIT").unwrap_or(i64::MAX);
    let multi = b.multi;

    let (mut channel, mut tip_type) =
        choose_channel(deck, first.volume).map_err(|e| e.at_transfer(0))?;
    let mut out = vec![get_tips(deck, &tip_type, &channel, multi)?];
    let mut tip_uses: i64 = 0;

    for (index, set) in b.sets.iter_mut().enumerate() {
        let Some(set_first) = set.first() else {
            continue;
        };
        let (new_channel, new_tip_type) =
            choose_channel(deck, set_first.volume).map_err(|e| e.at_transfer(index))?;
        let chunks =
            planner::split_volumes(set_first.volume, new_channel.min_vol, new_channel.max_vol)
                .map_err(|e| e.at_transfer(index))?;

        for volume in chunks {
            if tip_uses >= reuse_limit || new_channel != channel || new_tip_type != tip_type {
                out.push(drop_tips(deck, &channel, multi)?);
                out.push(get_tips(deck, &new_tip_type, &new_channel, multi)?);
                channel = new_channel.clone();
                tip_type = new_tip_type.clone();
                tip_uses = 0;
            }

            out.push(Instruction::MultiChannelTransfer(MultiTransfer {
                entries: set.iter().map(|e| e.with_volume(volume)).collect(),
                multi,
                channel: channel.clone(),
            }));

            for entry in set.iter_mut() {
                deck.apply_transfer(
                    &entry.what,
                    &entry.pos_from,
                    &entry.well_from,
                    &entry.pos_to,
                    &entry.well_to,
                    volume,
                )
                .map_err(|e| crate::Error::from(e).at_transfer(index))?;
                entry.from_volume = entry
                    .from_volume
                    .checked_sub(volume)
                    .map_err(|e| crate::Error::from(e).at_transfer(index))?;
                entry.to_volume += volume;
            }
            tip_uses += 1;
        }
    }

    out.push(drop_tips(deck, &channel, multi)?);
    Ok(out)
}

/// Allocate clean tips and wrap the result as a load-tips-move.
fn get_tips(
    deck: &mut Deck,
    tip_type: &str,
    channel: &ChannelParams,
    multi: usize,
) -> Result<Instruction> {
    let alloc = deck.get_clean_tips(tip_type, channel, false, multi)?;
    Ok(Instruction::LoadTipsMove(TipsMoveOp {
        head: channel.head,
        wells: alloc.wells,
        positions: alloc.positions,
        holder_types: alloc.holder_types,
        multi,
    }))
}

/// Reserve waste space and wrap the result as an unload-tips-move.
fn drop_tips(deck: &mut Deck, channel: &ChannelParams, multi: usize) -> Result<Instruction> {
    let alloc = deck.drop_dirty_tips(channel, multi)?;
    Ok(Instruction::UnloadTipsMove(TipsMoveOp {
        head: channel.head,
        wells: alloc.wells,
        positions: alloc.positions,
        holder_types: alloc.holder_types,
        multi,
    }))
}

/// Load-tips-move splits into the approach move and the load itself.
pub fn lower_load_tips_move(m: &TipsMoveOp) -> Vec<Instruction> {
    vec![
        Instruction::Move(MoveOp {
            head: m.head,
            positions: m.positions.clone(),
            wells: m.wells.clone(),
            plate_types: m.holder_types.clone(),
            well_volumes: Vec::new(),
            references: vec![0; m.multi],
            offset_x: vec![0.0; m.multi],
            offset_y: vec![0.0; m.multi],
            offset_z: vec![0.0; m.multi],
        }),
        Instruction::LoadTips(TipsOp {
            head: m.head,
            channels: (0..m.multi as i32).collect(),
            tip_types: m.holder_types.clone(),
            holder_types: m.holder_types.clone(),
            positions: m.positions.clone(),
            wells: m.wells.clone(),
            multi: m.multi,
        }),
    ]
}

/// Unload-tips-move splits into the approach move and the unload.
pub fn lower_unload_tips_move(m: &TipsMoveOp) -> Vec<Instruction> {
    vec![
        Instruction::Move(MoveOp {
            head: m.head,
            positions: m.positions.clone(),
            wells: m.wells.clone(),
            plate_types: m.holder_types.clone(),
            well_volumes: Vec::new(),
            references: vec![0; m.multi],
            offset_x: vec![0.0; m.multi],
            offset_y: vec![0.0; m.multi],
            offset_z: vec![0.0; m.multi],
        }),
        Instruction::UnloadTips(TipsOp {
            head: m.head,
            channels: (0..m.multi as i32).collect(),
            tip_types: m.holder_types.clone(),
            holder_types: m.holder_types.clone(),
            positions: m.positions.clone(),
            wells: m.wells.clone(),
            multi: m.multi,
        }),
    ]
}
