//! Terminal instruction payloads
//!
//! These map 1:1 onto driver calls; fields are already in the shape the
//! driver wants, apart from volumes, which stay unit-tagged until the
//! boundary.

use std::fmt;

use indexmap::IndexMap;

use decant_model::Volume;

/// Gantry axis selector for drive-speed changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    X,
    Y,
    Z,
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drive::X => write!(f, "X"),
            Drive::Y => write!(f, "Y"),
            Drive::Z => write!(f, "Z"),
        }
    }
}

/// Arm movement to a (position, well, reference, offset) per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOp {
    pub head: usize,
    pub positions: Vec<String>,
    pub wells: Vec<String>,
    pub plate_types: Vec<String>,
    /// Liquid level in the target wells, for level-following hardware.
    pub well_volumes: Vec<Volume>,
    /// 0 = well bottom, 1 = well top.
    pub references: Vec<i32>,
    pub offset_x: Vec<f64>,
    pub offset_y: Vec<f64>,
    pub offset_z: Vec<f64>,
}

/// Draw liquid into the loaded tips.
#[derive(Debug, Clone, PartialEq)]
pub struct AspirateOp {
    pub head: usize,
    pub volumes: Vec<Volume>,
    pub overstroke: bool,
    pub multi: usize,
    pub plate_types: Vec<String>,
    pub what: Vec<String>,
    pub level_follow: Vec<bool>,
}

/// Expel liquid from the loaded tips.
#[derive(Debug, Clone, PartialEq)]
pub struct DispenseOp {
    pub head: usize,
    pub volumes: Vec<Volume>,
    pub multi: usize,
    pub plate_types: Vec<String>,
    pub what: Vec<String>,
    pub level_follow: Vec<bool>,
}

/// Push the pistons past rest to clear residue; one volume for every
/// channel.
#[derive(Debug, Clone, PartialEq)]
pub struct BlowoutOp {
    pub head: usize,
    pub volume: Volume,
    pub multi: usize,
    pub plate_types: Vec<String>,
    pub what: Vec<String>,
}

/// In-well mixing cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct MixOp {
    pub head: usize,
    pub volumes: Vec<Volume>,
    pub well_volumes: Vec<Volume>,
    pub plate_types: Vec<String>,
    pub cycles: Vec<u32>,
    pub multi: usize,
    pub extra: IndexMap<String, String>,
}

/// Move plus mix, not yet split apart.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveMixOp {
    pub head: usize,
    pub positions: Vec<String>,
    pub wells: Vec<String>,
    pub plate_types: Vec<String>,
    pub volumes: Vec<Volume>,
    pub well_volumes: Vec<Volume>,
    pub cycles: Vec<u32>,
    pub multi: usize,
}

/// Load or unload tips at coordinates already fixed by the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct TipsOp {
    pub head: usize,
    pub channels: Vec<i32>,
    pub tip_types: Vec<String>,
    pub holder_types: Vec<String>,
    pub positions: Vec<String>,
    pub wells: Vec<String>,
    pub multi: usize,
}

/// Tip load/unload still carrying its approach move.
#[derive(Debug, Clone, PartialEq)]
pub struct TipsMoveOp {
    pub head: usize,
    pub wells: Vec<String>,
    pub positions: Vec<String>,
    pub holder_types: Vec<String>,
    pub multi: usize,
}
