//! Instruction IR
//!
//! One tagged union across every lowering level, from the incoming
//! `Transfer` down to the primitives that map straight onto driver
//! calls. Each variant answers `kind()`, the uniform `parameter()`
//! lookup the policy engine matches against, and `lower()`, which
//! expands one level and returns nothing for terminals.

pub mod block;
pub mod ops;
pub mod pipette;
pub mod transfer;

use decant_model::{Deck, Volume};

use crate::driver::Driver;
use crate::error::Result;
use crate::param::ParamValue;
use crate::policy::RuleSet;

use self::ops::{
    AspirateOp, BlowoutOp, DispenseOp, Drive, MixOp, MoveMixOp, MoveOp, TipsMoveOp, TipsOp,
};
use self::transfer::{
    ChannelBlock, MultiChannelBlock, MultiTransfer, PipetteOp, SingleTransfer, Transfer,
    TransferEntry,
};

/// Stable tag per instruction variant.
///
/// # Invariant
///
/// Discriminants and the `code()` strings are wire-stable: consumers
/// route and log on them, so the order here never changes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Transfer = 0,
    SingleChannelBlock = 1,
    MultiChannelBlock = 2,
    SingleChannelTransfer = 3,
    MultiChannelTransfer = 4,
    Suck = 5,
    Blow = 6,
    Reset = 7,
    Aspirate = 8,
    Dispense = 9,
    Blowout = 10,
    Mix = 11,
    MoveMix = 12,
    Move = 13,
    MoveRaw = 14,
    LoadTips = 15,
    UnloadTips = 16,
    LoadTipsMove = 17,
    UnloadTipsMove = 18,
    SetPipetteSpeed = 19,
    SetDriveSpeed = 20,
    ResetPistons = 21,
    Wait = 22,
    Initialize = 23,
    Finalize = 24,
    StateChange = 25,
    ChangeAdaptor = 26,
    LightsOn = 27,
    LightsOff = 28,
    Open = 29,
    Close = 30,
    LoadAdaptor = 31,
    UnloadAdaptor = 32,
    Message = 33,
}

impl InstructionKind {
    /// Canonical three-letter code used in logs and routing.
    pub fn code(self) -> &'static str {
        match self {
            InstructionKind::Transfer => "TFR",
            InstructionKind::SingleChannelBlock => "SCB",
            InstructionKind::MultiChannelBlock => "MCB",
            InstructionKind::SingleChannelTransfer => "SCT",
            InstructionKind::MultiChannelTransfer => "MCT",
            InstructionKind::Suck => "SUK",
            InstructionKind::Blow => "BLW",
            InstructionKind::Reset => "RST",
            InstructionKind::Aspirate => "ASP",
            InstructionKind::Dispense => "DSP",
            InstructionKind::Blowout => "BLO",
            InstructionKind::Mix => "MIX",
            InstructionKind::MoveMix => "MMX",
            InstructionKind::Move => "MOV",
            InstructionKind::MoveRaw => "MRW",
            InstructionKind::LoadTips => "LOD",
            InstructionKind::UnloadTips => "ULD",
            InstructionKind::LoadTipsMove => "LDT",
            InstructionKind::UnloadTipsMove => "UDT",
            InstructionKind::SetPipetteSpeed => "SPS",
            InstructionKind::SetDriveSpeed => "SDS",
            InstructionKind::ResetPistons => "PTZ",
            InstructionKind::Wait => "WAI",
            InstructionKind::Initialize => "INI",
            InstructionKind::Finalize => "FIN",
            InstructionKind::StateChange => "CCC",
            InstructionKind::ChangeAdaptor => "CHA",
            InstructionKind::LightsOn => "LON",
            InstructionKind::LightsOff => "LOF",
            InstructionKind::Open => "OPN",
            InstructionKind::Close => "CLS",
            InstructionKind::LoadAdaptor => "LAD",
            InstructionKind::UnloadAdaptor => "UAD",
            InstructionKind::Message => "MESSAGE",
        }
    }
}

/// A robot instruction at any lowering level.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Transfer(Transfer),
    SingleChannelBlock(ChannelBlock),
    MultiChannelBlock(MultiChannelBlock),
    SingleChannelTransfer(SingleTransfer),
    MultiChannelTransfer(MultiTransfer),
    Suck(PipetteOp),
    Blow(PipetteOp),
    Reset(PipetteOp),
    Aspirate(AspirateOp),
    Dispense(DispenseOp),
    Blowout(BlowoutOp),
    Mix(MixOp),
    MoveMix(MoveMixOp),
    Move(MoveOp),
    MoveRaw,
    LoadTips(TipsOp),
    UnloadTips(TipsOp),
    LoadTipsMove(TipsMoveOp),
    UnloadTipsMove(TipsMoveOp),
    SetPipetteSpeed {
        head: usize,
        /// -1 addresses every channel.
        channel: i32,
        speed: f64,
    },
    SetDriveSpeed {
        drive: Drive,
        speed: f64,
    },
    ResetPistons {
        head: usize,
        channel: i32,
    },
    Wait {
        seconds: f64,
    },
    Initialize,
    Finalize,
    StateChange,
    ChangeAdaptor {
        head: usize,
        drop_position: String,
        get_position: String,
        old_adaptor: String,
        new_adaptor: String,
    },
    LightsOn,
    LightsOff,
    Open,
    Close,
    LoadAdaptor,
    UnloadAdaptor,
    Message {
        text: String,
    },
}

fn str_vec<'a, I: Iterator<Item = &'a TransferEntry>>(
    entries: I,
    f: fn(&TransferEntry) -> &String,
) -> ParamValue {
    ParamValue::StrVec(entries.map(|e| f(e).clone()).collect())
}

fn vol_vec<'a, I: Iterator<Item = &'a TransferEntry>>(
    entries: I,
    f: fn(&TransferEntry) -> Volume,
) -> ParamValue {
    ParamValue::VolumeVec(entries.map(f).collect())
}

impl Instruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Transfer(_) => InstructionKind::Transfer,
            Instruction::SingleChannelBlock(_) => InstructionKind::SingleChannelBlock,
            Instruction::MultiChannelBlock(_) => InstructionKind::MultiChannelBlock,
            Instruction::SingleChannelTransfer(_) => InstructionKind::SingleChannelTransfer,
            Instruction::MultiChannelTransfer(_) => InstructionKind::MultiChannelTransfer,
            Instruction::Suck(_) => InstructionKind::Suck,
            Instruction::Blow(_) => InstructionKind::Blow,
            Instruction::Reset(_) => InstructionKind::Reset,
            Instruction::Aspirate(_) => InstructionKind::Aspirate,
            Instruction::Dispense(_) => InstructionKind::Dispense,
            Instruction::Blowout(_) => InstructionKind::Blowout,
            Instruction::Mix(_) => InstructionKind::Mix,
            Instruction::MoveMix(_) => InstructionKind::MoveMix,
            Instruction::Move(_) => InstructionKind::Move,
            Instruction::MoveRaw => InstructionKind::MoveRaw,
            Instruction::LoadTips(_) => InstructionKind::LoadTips,
            Instruction::UnloadTips(_) => InstructionKind::UnloadTips,
            Instruction::LoadTipsMove(_) => InstructionKind::LoadTipsMove,
            Instruction::UnloadTipsMove(_) => InstructionKind::UnloadTipsMove,
            Instruction::SetPipetteSpeed { .. } => InstructionKind::SetPipetteSpeed,
            Instruction::SetDriveSpeed { .. } => InstructionKind::SetDriveSpeed,
            Instruction::ResetPistons { .. } => InstructionKind::ResetPistons,
            Instruction::Wait { .. } => InstructionKind::Wait,
            Instruction::Initialize => InstructionKind::Initialize,
            Instruction::Finalize => InstructionKind::Finalize,
            Instruction::StateChange => InstructionKind::StateChange,
            Instruction::ChangeAdaptor { .. } => InstructionKind::ChangeAdaptor,
            Instruction::LightsOn => InstructionKind::LightsOn,
            Instruction::LightsOff => InstructionKind::LightsOff,
            Instruction::Open => InstructionKind::Open,
            Instruction::Close => InstructionKind::Close,
            Instruction::LoadAdaptor => InstructionKind::LoadAdaptor,
            Instruction::UnloadAdaptor => InstructionKind::UnloadAdaptor,
            Instruction::Message { .. } => InstructionKind::Message,
        }
    }

    /// True for instructions that translate 1:1 onto driver calls.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Instruction::Aspirate(_)
                | Instruction::Dispense(_)
                | Instruction::Blowout(_)
                | Instruction::Mix(_)
                | Instruction::Move(_)
                | Instruction::LoadTips(_)
                | Instruction::UnloadTips(_)
                | Instruction::SetPipetteSpeed { .. }
                | Instruction::SetDriveSpeed { .. }
                | Instruction::ResetPistons { .. }
                | Instruction::Wait { .. }
                | Instruction::Initialize
                | Instruction::Finalize
        )
    }

    /// Uniform typed parameter lookup. Unknown names yield `Absent`.
    pub fn parameter(&self, name: &str) -> ParamValue {
        if name == "INSTRUCTIONTYPE" {
            return ParamValue::Kind(self.kind());
        }
        match self {
            Instruction::Transfer(t) => match name {
                "LIQUIDCLASS" => str_vec(t.entries.iter(), |e| &e.what),
                "VOLUME" => vol_vec(t.entries.iter(), |e| e.volume),
                "FROMPLATETYPE" => str_vec(t.entries.iter(), |e| &e.plate_from),
                "TOPLATETYPE" => str_vec(t.entries.iter(), |e| &e.plate_to),
                "WELLFROMVOLUME" => vol_vec(t.entries.iter(), |e| e.from_volume),
                "WELLTOVOLUME" => vol_vec(t.entries.iter(), |e| e.to_volume),
                "POSFROM" => str_vec(t.entries.iter(), |e| &e.pos_from),
                "POSTO" => str_vec(t.entries.iter(), |e| &e.pos_to),
                "WELLFROM" => str_vec(t.entries.iter(), |e| &e.well_from),
                "WELLTO" => str_vec(t.entries.iter(), |e| &e.well_to),
                _ => ParamValue::Absent,
            },
            Instruction::SingleChannelBlock(b) => match name {
                "LIQUIDCLASS" => str_vec(b.entries.iter(), |e| &e.what),
                "VOLUME" => vol_vec(b.entries.iter(), |e| e.volume),
                "FROMPLATETYPE" => str_vec(b.entries.iter(), |e| &e.plate_from),
                "TOPLATETYPE" => str_vec(b.entries.iter(), |e| &e.plate_to),
                "WELLFROMVOLUME" => vol_vec(b.entries.iter(), |e| e.from_volume),
                "WELLTOVOLUME" => vol_vec(b.entries.iter(), |e| e.to_volume),
                "POSFROM" => str_vec(b.entries.iter(), |e| &e.pos_from),
                "POSTO" => str_vec(b.entries.iter(), |e| &e.pos_to),
                "WELLFROM" => str_vec(b.entries.iter(), |e| &e.well_from),
                "WELLTO" => str_vec(b.entries.iter(), |e| &e.well_to),
                "PARAMS" => ParamValue::Channel(b.channel.clone()),
                "PLATFORM" => ParamValue::Str(b.channel.name.clone()),
                _ => ParamValue::Absent,
            },
            Instruction::MultiChannelBlock(b) => {
                let all = || b.sets.iter().flatten();
                match name {
                    "LIQUIDCLASS" => str_vec(all(), |e| &e.what),
                    "VOLUME" => vol_vec(all(), |e| e.volume),
                    "FROMPLATETYPE" => str_vec(all(), |e| &e.plate_from),
                    "TOPLATETYPE" => str_vec(all(), |e| &e.plate_to),
                    "WELLFROMVOLUME" => vol_vec(all(), |e| e.from_volume),
                    "WELLTOVOLUME" => vol_vec(all(), |e| e.to_volume),
                    "POSFROM" => str_vec(all(), |e| &e.pos_from),
                    "POSTO" => str_vec(all(), |e| &e.pos_to),
                    "WELLFROM" => str_vec(all(), |e| &e.well_from),
                    "WELLTO" => str_vec(all(), |e| &e.well_to),
                    "PARAMS" => ParamValue::Channel(b.channel.clone()),
                    "PLATFORM" => ParamValue::Str(b.channel.name.clone()),
                    "MULTI" => ParamValue::Int(b.multi as i64),
                    _ => ParamValue::Absent,
                }
            }
            Instruction::SingleChannelTransfer(t) => match name {
                "LIQUIDCLASS" => ParamValue::Str(t.entry.what.clone()),
                "VOLUME" => ParamValue::Volume(t.entry.volume),
                "FROMPLATETYPE" => ParamValue::Str(t.entry.plate_from.clone()),
                "TOPLATETYPE" => ParamValue::Str(t.entry.plate_to.clone()),
                "WELLFROMVOLUME" => ParamValue::Volume(t.entry.from_volume),
                "WELLTOVOLUME" => ParamValue::Volume(t.entry.to_volume),
                "POSFROM" => ParamValue::Str(t.entry.pos_from.clone()),
                "POSTO" => ParamValue::Str(t.entry.pos_to.clone()),
                "WELLFROM" => ParamValue::Str(t.entry.well_from.clone()),
                "WELLTO" => ParamValue::Str(t.entry.well_to.clone()),
                "PARAMS" => ParamValue::Channel(t.channel.clone()),
                "PLATFORM" => ParamValue::Str(t.channel.name.clone()),
                "HEAD" => ParamValue::Int(t.channel.head as i64),
                _ => ParamValue::Absent,
            },
            Instruction::MultiChannelTransfer(t) => match name {
                "LIQUIDCLASS" => str_vec(t.entries.iter(), |e| &e.what),
                "VOLUME" => vol_vec(t.entries.iter(), |e| e.volume),
                "FROMPLATETYPE" => str_vec(t.entries.iter(), |e| &e.plate_from),
                "TOPLATETYPE" => str_vec(t.entries.iter(), |e| &e.plate_to),
                "WELLFROMVOLUME" => vol_vec(t.entries.iter(), |e| e.from_volume),
                "WELLTOVOLUME" => vol_vec(t.entries.iter(), |e| e.to_volume),
                "POSFROM" => str_vec(t.entries.iter(), |e| &e.pos_from),
                "POSTO" => str_vec(t.entries.iter(), |e| &e.pos_to),
                "WELLFROM" => str_vec(t.entries.iter(), |e| &e.well_from),
                "WELLTO" => str_vec(t.entries.iter(), |e| &e.well_to),
                "PARAMS" => ParamValue::Channel(t.channel.clone()),
                "PLATFORM" => ParamValue::Str(t.channel.name.clone()),
                "MULTI" => ParamValue::Int(t.multi as i64),
                "HEAD" => ParamValue::Int(t.channel.head as i64),
                _ => ParamValue::Absent,
            },
            Instruction::Suck(p) => match name {
                "LIQUIDCLASS" => ParamValue::StrVec(p.whats()),
                "VOLUME" => ParamValue::VolumeVec(p.volumes()),
                "FROMPLATETYPE" => ParamValue::StrVec(p.from_plate_types()),
                "WELLFROMVOLUME" => ParamValue::VolumeVec(p.from_volumes()),
                "POSFROM" => ParamValue::StrVec(p.from_positions()),
                "WELLFROM" => ParamValue::StrVec(p.from_wells()),
                "PARAMS" => ParamValue::Channel(p.channel.clone()),
                "PLATFORM" => ParamValue::Str(p.channel.name.clone()),
                "HEAD" => ParamValue::Int(p.channel.head as i64),
                "MULTI" => ParamValue::Int(p.multi as i64),
                "OVERSTROKE" => ParamValue::Bool(p.overstroke),
                _ => ParamValue::Absent,
            },
            Instruction::Blow(p) => match name {
                "LIQUIDCLASS" => ParamValue::StrVec(p.whats()),
                "VOLUME" => ParamValue::VolumeVec(p.volumes()),
                "TOPLATETYPE" => ParamValue::StrVec(p.to_plate_types()),
                "WELLTOVOLUME" => ParamValue::VolumeVec(p.to_volumes()),
                "POSTO" => ParamValue::StrVec(p.to_positions()),
                "WELLTO" => ParamValue::StrVec(p.to_wells()),
                "PARAMS" => ParamValue::Channel(p.channel.clone()),
                "PLATFORM" => ParamValue::Str(p.channel.name.clone()),
                "HEAD" => ParamValue::Int(p.channel.head as i64),
                "MULTI" => ParamValue::Int(p.multi as i64),
                _ => ParamValue::Absent,
            },
            Instruction::Reset(p) => match name {
                "LIQUIDCLASS" => ParamValue::StrVec(p.whats()),
                "VOLUME" => ParamValue::VolumeVec(p.volumes()),
                "FROMPLATETYPE" => ParamValue::StrVec(p.from_plate_types()),
                "TOPLATETYPE" => ParamValue::StrVec(p.to_plate_types()),
                "WELLFROMVOLUME" => ParamValue::VolumeVec(p.from_volumes()),
                "WELLTOVOLUME" => ParamValue::VolumeVec(p.to_volumes()),
                "POSFROM" => ParamValue::StrVec(p.from_positions()),
                "POSTO" => ParamValue::StrVec(p.to_positions()),
                "WELLFROM" => ParamValue::StrVec(p.from_wells()),
                "WELLTO" => ParamValue::StrVec(p.to_wells()),
                "PARAMS" => ParamValue::Channel(p.channel.clone()),
                "PLATFORM" => ParamValue::Str(p.channel.name.clone()),
                _ => ParamValue::Absent,
            },
            Instruction::Aspirate(a) => match name {
                "VOLUME" => ParamValue::VolumeVec(a.volumes.clone()),
                "HEAD" => ParamValue::Int(a.head as i64),
                "MULTI" => ParamValue::Int(a.multi as i64),
                "OVERSTROKE" => ParamValue::Bool(a.overstroke),
                "LIQUIDCLASS" => ParamValue::StrVec(a.what.clone()),
                "FROMPLATETYPE" => ParamValue::StrVec(a.plate_types.clone()),
                _ => ParamValue::Absent,
            },
            Instruction::Dispense(d) => match name {
                "VOLUME" => ParamValue::VolumeVec(d.volumes.clone()),
                "HEAD" => ParamValue::Int(d.head as i64),
                "MULTI" => ParamValue::Int(d.multi as i64),
                "LIQUIDCLASS" => ParamValue::StrVec(d.what.clone()),
                "TOPLATETYPE" => ParamValue::StrVec(d.plate_types.clone()),
                _ => ParamValue::Absent,
            },
            Instruction::Blowout(b) => match name {
                "VOLUME" => ParamValue::Volume(b.volume),
                "HEAD" => ParamValue::Int(b.head as i64),
                "MULTI" => ParamValue::Int(b.multi as i64),
                "LIQUIDCLASS" => ParamValue::StrVec(b.what.clone()),
                "TOPLATETYPE" => ParamValue::StrVec(b.plate_types.clone()),
                _ => ParamValue::Absent,
            },
            Instruction::Mix(m) => match name {
                "VOLUME" => ParamValue::VolumeVec(m.volumes.clone()),
                "WELLTOVOLUME" => ParamValue::VolumeVec(m.well_volumes.clone()),
                "TOPLATETYPE" => ParamValue::StrVec(m.plate_types.clone()),
                "CYCLES" => ParamValue::IntVec(m.cycles.iter().map(|c| *c as i64).collect()),
                "HEAD" => ParamValue::Int(m.head as i64),
                "MULTI" => ParamValue::Int(m.multi as i64),
                _ => ParamValue::Absent,
            },
            Instruction::MoveMix(m) => match name {
                "VOLUME" => ParamValue::VolumeVec(m.volumes.clone()),
                "WELLTOVOLUME" => ParamValue::VolumeVec(m.well_volumes.clone()),
                "TOPLATETYPE" => ParamValue::StrVec(m.plate_types.clone()),
                "POSTO" => ParamValue::StrVec(m.positions.clone()),
                "WELLTO" => ParamValue::StrVec(m.wells.clone()),
                "CYCLES" => ParamValue::IntVec(m.cycles.iter().map(|c| *c as i64).collect()),
                "HEAD" => ParamValue::Int(m.head as i64),
                "MULTI" => ParamValue::Int(m.multi as i64),
                _ => ParamValue::Absent,
            },
            Instruction::Move(m) => match name {
                "HEAD" => ParamValue::Int(m.head as i64),
                "TOPLATETYPE" => ParamValue::StrVec(m.plate_types.clone()),
                "POSTO" => ParamValue::StrVec(m.positions.clone()),
                "WELLTO" => ParamValue::StrVec(m.wells.clone()),
                "WELLTOVOLUME" => ParamValue::VolumeVec(m.well_volumes.clone()),
                "REFERENCE" => ParamValue::IntVec(m.references.iter().map(|r| *r as i64).collect()),
                "OFFSETX" => ParamValue::FloatVec(m.offset_x.clone()),
                "OFFSETY" => ParamValue::FloatVec(m.offset_y.clone()),
                "OFFSETZ" => ParamValue::FloatVec(m.offset_z.clone()),
                _ => ParamValue::Absent,
            },
            Instruction::LoadTips(t) => match name {
                "HEAD" => ParamValue::Int(t.head as i64),
                "CHANNEL" => ParamValue::IntVec(t.channels.iter().map(|c| *c as i64).collect()),
                "TIPTYPE" => ParamValue::StrVec(t.tip_types.clone()),
                "FROMPLATETYPE" => ParamValue::StrVec(t.holder_types.clone()),
                "POSFROM" => ParamValue::StrVec(t.positions.clone()),
                "WELLFROM" => ParamValue::StrVec(t.wells.clone()),
                "MULTI" => ParamValue::Int(t.multi as i64),
                _ => ParamValue::Absent,
            },
            Instruction::UnloadTips(t) => match name {
                "HEAD" => ParamValue::Int(t.head as i64),
                "CHANNEL" => ParamValue::IntVec(t.channels.iter().map(|c| *c as i64).collect()),
                "TIPTYPE" => ParamValue::StrVec(t.tip_types.clone()),
                "TOPLATETYPE" => ParamValue::StrVec(t.holder_types.clone()),
                "POSTO" => ParamValue::StrVec(t.positions.clone()),
                "WELLTO" => ParamValue::StrVec(t.wells.clone()),
                "MULTI" => ParamValue::Int(t.multi as i64),
                _ => ParamValue::Absent,
            },
            Instruction::LoadTipsMove(m) => match name {
                "HEAD" => ParamValue::Int(m.head as i64),
                "FROMPLATETYPE" => ParamValue::StrVec(m.holder_types.clone()),
                "POSFROM" => ParamValue::StrVec(m.positions.clone()),
                "WELLFROM" => ParamValue::StrVec(m.wells.clone()),
                "MULTI" => ParamValue::Int(m.multi as i64),
                _ => ParamValue::Absent,
            },
            Instruction::UnloadTipsMove(m) => match name {
                "HEAD" => ParamValue::Int(m.head as i64),
                "TOPLATETYPE" => ParamValue::StrVec(m.holder_types.clone()),
                "POSTO" => ParamValue::StrVec(m.positions.clone()),
                "WELLTO" => ParamValue::StrVec(m.wells.clone()),
                "MULTI" => ParamValue::Int(m.multi as i64),
                _ => ParamValue::Absent,
            },
            Instruction::SetPipetteSpeed {
                head,
                channel,
                speed,
            } => match name {
                "HEAD" => ParamValue::Int(*head as i64),
                "CHANNEL" => ParamValue::Int(*channel as i64),
                "SPEED" => ParamValue::Float(*speed),
                _ => ParamValue::Absent,
            },
            Instruction::SetDriveSpeed { drive, speed } => match name {
                "DRIVE" => ParamValue::Str(drive.to_string()),
                "SPEED" => ParamValue::Float(*speed),
                _ => ParamValue::Absent,
            },
            Instruction::ResetPistons { head, channel } => match name {
                "HEAD" => ParamValue::Int(*head as i64),
                "CHANNEL" => ParamValue::Int(*channel as i64),
                _ => ParamValue::Absent,
            },
            Instruction::Wait { seconds } => match name {
                "TIME" => ParamValue::Float(*seconds),
                _ => ParamValue::Absent,
            },
            Instruction::ChangeAdaptor {
                head,
                drop_position,
                get_position,
                ..
            } => match name {
                "HEAD" => ParamValue::Int(*head as i64),
                "POSFROM" => ParamValue::Str(drop_position.clone()),
                "POSTO" => ParamValue::Str(get_position.clone()),
                _ => ParamValue::Absent,
            },
            _ => ParamValue::Absent,
        }
    }

    /// Expand one lowering level.
    ///
    /// Terminals and placeholder lifecycle variants return an empty
    /// sequence. The deck is threaded mutably: tip acquisition and the
    /// well bookkeeping happen while blocks expand.
    pub fn lower(&mut self, rules: &RuleSet, deck: &mut Deck) -> Result<Vec<Instruction>> {
        if matches!(
            self,
            Instruction::Transfer(_)
                | Instruction::SingleChannelBlock(_)
                | Instruction::MultiChannelBlock(_)
                | Instruction::Suck(_)
                | Instruction::Blow(_)
                | Instruction::Reset(_)
        ) {
            let policy = rules.policy_for(self)?;
            return match self {
                Instruction::Transfer(t) => block::lower_transfer(t, &policy, deck),
                Instruction::SingleChannelBlock(b) => block::lower_single_block(b, &policy, deck),
                Instruction::MultiChannelBlock(b) => block::lower_multi_block(b, &policy, deck),
                Instruction::Suck(p) => Ok(pipette::lower_suck(p, &policy)),
                Instruction::Blow(p) => Ok(pipette::lower_blow(p, &policy)),
                Instruction::Reset(p) => Ok(pipette::lower_reset(p, &policy)),
                _ => Ok(Vec::new()),
            };
        }

        match self {
            Instruction::SingleChannelTransfer(t) => Ok(pipette::lower_single_transfer(t)),
            Instruction::MultiChannelTransfer(t) => Ok(pipette::lower_multi_transfer(t)),
            Instruction::LoadTipsMove(m) => Ok(block::lower_load_tips_move(m)),
            Instruction::UnloadTipsMove(m) => Ok(block::lower_unload_tips_move(m)),
            Instruction::MoveMix(m) => Ok(pipette::lower_move_mix(m)),
            _ => Ok(Vec::new()),
        }
    }

    /// Emit a terminal onto the driver. Volumes convert to microlitres
    /// at this boundary; non-terminals emit nothing.
    pub fn emit(&self, driver: &mut dyn Driver) {
        fn ul(volumes: &[Volume]) -> Vec<f64> {
            volumes.iter().map(|v| v.as_microlitres()).collect()
        }

        match self {
            Instruction::Aspirate(a) => driver.aspirate(
                &ul(&a.volumes),
                &vec![a.overstroke; a.multi],
                a.head,
                a.multi,
                &a.plate_types,
                &a.what,
                &a.level_follow,
            ),
            Instruction::Dispense(d) => driver.dispense(
                &ul(&d.volumes),
                &vec![false; d.multi],
                d.head,
                d.multi,
                &d.plate_types,
                &d.what,
                &d.level_follow,
            ),
            // a blowout is a dispense with the blowout flag up on every
            // channel
            Instruction::Blowout(b) => driver.dispense(
                &vec![b.volume.as_microlitres(); b.multi],
                &vec![true; b.multi],
                b.head,
                b.multi,
                &b.plate_types,
                &b.what,
                &vec![false; b.multi],
            ),
            Instruction::Mix(m) => driver.mix(
                m.head,
                &ul(&m.volumes),
                &ul(&m.well_volumes),
                &m.plate_types,
                &m.cycles,
                m.multi,
                &m.extra,
            ),
            Instruction::Move(m) => driver.move_to(
                &m.positions,
                &m.wells,
                &m.references,
                &m.offset_x,
                &m.offset_y,
                &m.offset_z,
                &m.plate_types,
                m.head,
            ),
            Instruction::LoadTips(t) => {
                driver.load_tips(&t.channels, t.head, t.multi, &t.holder_types, &t.positions, &t.wells)
            }
            Instruction::UnloadTips(t) => {
                driver.unload_tips(&t.channels, t.head, t.multi, &t.holder_types, &t.positions, &t.wells)
            }
            Instruction::SetPipetteSpeed {
                head,
                channel,
                speed,
            } => driver.set_pipette_speed(*head, *channel, *speed),
            Instruction::SetDriveSpeed { drive, speed } => driver.set_drive_speed(*drive, *speed),
            Instruction::ResetPistons { head, channel } => driver.reset_pistons(*head, *channel),
            Instruction::Wait { seconds } => driver.wait(*seconds),
            Instruction::Initialize => driver.initialize(),
            Instruction::Finalize => driver.finalize(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_encoding_is_stable() {
        assert_eq!(InstructionKind::Transfer as u8, 0);
        assert_eq!(InstructionKind::MultiChannelTransfer as u8, 4);
        assert_eq!(InstructionKind::Aspirate as u8, 8);
        assert_eq!(InstructionKind::ResetPistons as u8, 21);
        assert_eq!(InstructionKind::Finalize as u8, 24);
        assert_eq!(InstructionKind::Message as u8, 33);
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(InstructionKind::Transfer.code(), "TFR");
        assert_eq!(InstructionKind::Suck.code(), "SUK");
        assert_eq!(InstructionKind::ResetPistons.code(), "PTZ");
        assert_eq!(InstructionKind::MoveMix.code(), "MMX");
        assert_eq!(InstructionKind::Mix.code(), "MIX");
    }

    #[test]
    fn test_unknown_parameter_is_absent() {
        let ins = Instruction::Wait { seconds: 1.0 };
        assert!(ins.parameter("LIQUIDCLASS").is_absent());
        assert!(ins.parameter("NO_SUCH_NAME").is_absent());
        assert_eq!(ins.parameter("TIME"), ParamValue::Float(1.0));
    }

    #[test]
    fn test_instructiontype_parameter() {
        let ins = Instruction::Initialize;
        assert_eq!(
            ins.parameter("INSTRUCTIONTYPE"),
            ParamValue::Kind(InstructionKind::Initialize)
        );
    }

    #[test]
    fn test_terminals() {
        assert!(Instruction::Initialize.is_terminal());
        assert!(Instruction::Wait { seconds: 0.5 }.is_terminal());
        assert!(!Instruction::MoveRaw.is_terminal());
        assert!(!Instruction::LightsOn.is_terminal());
        assert!(!Instruction::Transfer(Transfer::default()).is_terminal());
    }
}
