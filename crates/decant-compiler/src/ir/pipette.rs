//! Per-move lowering
//!
//! A per-channel transfer becomes a suck, a blow and a piston reset;
//! each of those expands into moves, speed changes, mixes, waits and
//! the aspirate/dispense/blowout primitives according to the effective
//! policy.

use indexmap::IndexMap;

use decant_model::{Volume, VolumeUnit};

use crate::ir::ops::{AspirateOp, BlowoutOp, DispenseOp, Drive, MixOp, MoveMixOp, MoveOp};
use crate::ir::transfer::{MultiTransfer, PipetteOp, SingleTransfer};
use crate::ir::Instruction;
use crate::policy::{Policy, PolicyValue};

/// Clearance above the well top for slow-entry approach moves.
const WELL_TOP_OFFSET: f64 = 5.0;

// Fallbacks for options the default policy leaves unset.
const DEFAULT_ASP_Z_OFFSET: f64 = 0.5;
const DEFAULT_DSP_Z_OFFSET: f64 = 0.5;
const DEFAULT_DSP_REFERENCE: i64 = 0;
const DEFAULT_Z_SPEED: f64 = 120.0;
const DEFAULT_PIPETTE_SPEED: f64 = 3.0;
const DEFAULT_BLOWOUT_REFERENCE: i64 = 1;
const DEFAULT_BLOWOUT_OFFSET: f64 = 0.0;
const DEFAULT_PTZ_REFERENCE: i64 = 1;
const DEFAULT_PTZ_OFFSET: f64 = 0.0;
const DEFAULT_TOUCH_OFFSET: f64 = 0.5;

pub fn lower_single_transfer(t: &SingleTransfer) -> Vec<Instruction> {
    let op = PipetteOp {
        entries: vec![t.entry.clone()],
        channel: t.channel.clone(),
        multi: 1,
        overstroke: false,
    };
    vec![
        Instruction::Suck(op.clone()),
        Instruction::Blow(op.clone()),
        Instruction::Reset(op),
    ]
}

pub fn lower_multi_transfer(t: &MultiTransfer) -> Vec<Instruction> {
    let op = PipetteOp {
        entries: t.entries.clone(),
        channel: t.channel.clone(),
        multi: t.multi,
        overstroke: false,
    };
    vec![
        Instruction::Suck(op.clone()),
        Instruction::Blow(op.clone()),
        Instruction::Reset(op),
    ]
}

fn move_to_source(p: &PipetteOp, reference: i64, offset_z: f64) -> Instruction {
    Instruction::Move(MoveOp {
        head: p.channel.head,
        positions: p.from_positions(),
        wells: p.from_wells(),
        plate_types: p.from_plate_types(),
        well_volumes: p.from_volumes(),
        references: vec![reference as i32; p.multi],
        offset_x: vec![0.0; p.multi],
        offset_y: vec![0.0; p.multi],
        offset_z: vec![offset_z; p.multi],
    })
}

fn move_to_dest(p: &PipetteOp, reference: i64, offset_z: f64) -> Instruction {
    Instruction::Move(MoveOp {
        head: p.channel.head,
        positions: p.to_positions(),
        wells: p.to_wells(),
        plate_types: p.to_plate_types(),
        well_volumes: p.to_volumes(),
        references: vec![reference as i32; p.multi],
        offset_x: vec![0.0; p.multi],
        offset_y: vec![0.0; p.multi],
        offset_z: vec![offset_z; p.multi],
    })
}

fn set_drive_z(speed: f64) -> Instruction {
    Instruction::SetDriveSpeed {
        drive: Drive::Z,
        speed,
    }
}

/// The aspirate macro.
pub fn lower_suck(p: &PipetteOp, policy: &Policy) -> Vec<Instruction> {
    let mut out = Vec::new();
    let asp_z = policy.get_f64("ASPZOFFSET").unwrap_or(DEFAULT_ASP_Z_OFFSET);

    // slow entry: pause at the well top, creep in, restore the drive
    match policy.get_f64("ASPENTRYSPEED") {
        Some(entry_speed) => {
            out.push(move_to_source(p, 1, WELL_TOP_OFFSET));
            out.push(set_drive_z(entry_speed));
            out.push(move_to_source(p, 0, asp_z));
            out.push(set_drive_z(
                policy.get_f64("DEFAULTZSPEED").unwrap_or(DEFAULT_Z_SPEED),
            ));
        }
        None => out.push(move_to_source(p, 0, asp_z)),
    }

    if let Some(cycles) = policy.get_int("PRE_MIX") {
        let volumes = match policy.get_volume("PRE_MIX_VOL") {
            Some(v) => vec![v; p.multi],
            None => p.volumes(),
        };
        out.push(Instruction::MoveMix(MoveMixOp {
            head: p.channel.head,
            positions: p.from_positions(),
            wells: p.from_wells(),
            plate_types: p.from_plate_types(),
            volumes,
            well_volumes: p.from_volumes(),
            cycles: vec![cycles as u32; p.multi],
            multi: p.multi,
        }));
    }

    let asp_speed = policy.get_f64("ASPSPEED");
    if let Some(speed) = asp_speed {
        out.push(Instruction::SetPipetteSpeed {
            head: p.channel.head,
            channel: -1,
            speed,
        });
    }

    out.push(Instruction::Aspirate(AspirateOp {
        head: p.channel.head,
        volumes: p.volumes(),
        overstroke: p.overstroke,
        multi: p.multi,
        plate_types: p.from_plate_types(),
        what: p.whats(),
        level_follow: vec![false; p.multi],
    }));

    if asp_speed.is_some() {
        out.push(Instruction::SetPipetteSpeed {
            head: p.channel.head,
            channel: -1,
            speed: policy
                .get_f64("DEFAULTPIPETTESPEED")
                .unwrap_or(DEFAULT_PIPETTE_SPEED),
        });
    }

    if let Some(seconds) = policy.get_f64("ASP_WAIT") {
        out.push(Instruction::Wait { seconds });
    }

    out
}

/// The dispense macro: the structural mirror of `lower_suck`, plus the
/// optional post-mix and touch-off steps.
pub fn lower_blow(p: &PipetteOp, policy: &Policy) -> Vec<Instruction> {
    let mut out = Vec::new();
    let dsp_reference = policy
        .get_int("DSPREFERENCE")
        .unwrap_or(DEFAULT_DSP_REFERENCE);
    let dsp_z = policy.get_f64("DSPZOFFSET").unwrap_or(DEFAULT_DSP_Z_OFFSET);

    match policy.get_f64("DSPENTRYSPEED") {
        Some(entry_speed) => {
            out.push(move_to_dest(p, 1, WELL_TOP_OFFSET));
            out.push(set_drive_z(entry_speed));
            out.push(move_to_dest(p, dsp_reference, dsp_z));
            out.push(set_drive_z(
                policy.get_f64("DEFAULTZSPEED").unwrap_or(DEFAULT_Z_SPEED),
            ));
        }
        None => out.push(move_to_dest(p, dsp_reference, dsp_z)),
    }

    let dsp_speed = policy.get_f64("DSPSPEED");
    if let Some(speed) = dsp_speed {
        out.push(Instruction::SetPipetteSpeed {
            head: p.channel.head,
            channel: -1,
            speed,
        });
    }

    out.push(Instruction::Dispense(DispenseOp {
        head: p.channel.head,
        volumes: p.volumes(),
        multi: p.multi,
        plate_types: p.to_plate_types(),
        what: p.whats(),
        level_follow: vec![false; p.multi],
    }));

    if dsp_speed.is_some() {
        out.push(Instruction::SetPipetteSpeed {
            head: p.channel.head,
            channel: -1,
            speed: policy
                .get_f64("DEFAULTPIPETTESPEED")
                .unwrap_or(DEFAULT_PIPETTE_SPEED),
        });
    }

    if let Some(seconds) = policy.get_f64("DSP_WAIT") {
        out.push(Instruction::Wait { seconds });
    }

    if let Some(cycles) = policy.get_int("POST_MIX") {
        let volumes = match policy.get_volume("POST_MIX_VOL") {
            Some(v) => vec![v; p.multi],
            None => p.volumes(),
        };
        out.push(Instruction::MoveMix(MoveMixOp {
            head: p.channel.head,
            positions: p.to_positions(),
            wells: p.to_wells(),
            plate_types: p.to_plate_types(),
            volumes,
            well_volumes: p.to_volumes(),
            cycles: vec![cycles as u32; p.multi],
            multi: p.multi,
        }));
    }

    if policy.get_bool("TOUCHOFF").unwrap_or(false) {
        let touch_offset = policy.get_f64("TOUCHOFFSET").unwrap_or(DEFAULT_TOUCH_OFFSET);
        out.push(move_to_dest(p, 0, touch_offset));
    }

    out
}

/// The piston-reset macro: blow out above the destination, then park
/// the pistons.
pub fn lower_reset(p: &PipetteOp, policy: &Policy) -> Vec<Instruction> {
    // unit-tagged values win; bare numbers take their unit from
    // BLOWOUTVOLUMEUNIT, defaulting to microlitres
    let blowout_volume = match policy.get("BLOWOUTVOLUME") {
        Some(PolicyValue::Volume(v)) => *v,
        Some(other) => match other.as_f64() {
            Some(raw) => {
                let unit = policy
                    .get_str("BLOWOUTVOLUMEUNIT")
                    .and_then(|u| VolumeUnit::parse(u).ok())
                    .unwrap_or(VolumeUnit::Microlitre);
                Volume::new(raw, unit)
            }
            None => Volume::ZERO,
        },
        None => Volume::ZERO,
    };

    vec![
        move_to_dest(
            p,
            policy
                .get_int("BLOWOUTREFERENCE")
                .unwrap_or(DEFAULT_BLOWOUT_REFERENCE),
            policy
                .get_f64("BLOWOUTOFFSET")
                .unwrap_or(DEFAULT_BLOWOUT_OFFSET),
        ),
        Instruction::Blowout(BlowoutOp {
            head: p.channel.head,
            volume: blowout_volume,
            multi: p.entries.len(),
            plate_types: p.to_plate_types(),
            what: p.whats(),
        }),
        move_to_dest(
            p,
            policy.get_int("PTZREFERENCE").unwrap_or(DEFAULT_PTZ_REFERENCE),
            policy.get_f64("PTZOFFSET").unwrap_or(DEFAULT_PTZ_OFFSET),
        ),
        Instruction::ResetPistons {
            head: p.channel.head,
            channel: -1,
        },
    ]
}

/// Move-mix splits into the approach move and the mix cycles.
pub fn lower_move_mix(m: &MoveMixOp) -> Vec<Instruction> {
    vec![
        Instruction::Move(MoveOp {
            head: m.head,
            positions: m.positions.clone(),
            wells: m.wells.clone(),
            plate_types: m.plate_types.clone(),
            well_volumes: m.well_volumes.clone(),
            references: vec![0; m.multi],
            offset_x: vec![0.0; m.multi],
            offset_y: vec![0.0; m.multi],
            offset_z: vec![0.5; m.multi],
        }),
        Instruction::Mix(MixOp {
            head: m.head,
            volumes: m.volumes.clone(),
            well_volumes: m.well_volumes.clone(),
            plate_types: m.plate_types.clone(),
            cycles: m.cycles.clone(),
            multi: m.multi,
            extra: IndexMap::new(),
        }),
    ]
}
