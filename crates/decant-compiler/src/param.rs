//! Instruction parameter values
//!
//! `Instruction::parameter` answers a fixed vocabulary of names with
//! one of these typed values. The policy-engine condition evaluator is
//! the only consumer that treats them generically; everything else uses
//! the typed payloads directly.

use decant_model::{ChannelParams, Volume};

use crate::ir::InstructionKind;

/// A typed parameter value, or `Absent` for unrecognised names.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    StrVec(Vec<String>),
    Volume(Volume),
    VolumeVec(Vec<Volume>),
    Float(f64),
    FloatVec(Vec<f64>),
    Int(i64),
    IntVec(Vec<i64>),
    Bool(bool),
    Channel(ChannelParams),
    Kind(InstructionKind),
    Absent,
}

impl ParamValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, ParamValue::Absent)
    }
}
