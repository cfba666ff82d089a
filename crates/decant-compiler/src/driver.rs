//! Driver interface
//!
//! The backend robot driver satisfies this trait; terminals call it
//! 1:1. Volumes arrive in microlitres, `channel = -1` addresses every
//! channel on a head.

use indexmap::IndexMap;

use crate::ir::ops::Drive;

/// The robot-side consumer of the emitted primitive sequence.
///
/// Primitive order is load-bearing: pipette actions have side effects
/// on well volumes, so implementations must execute calls in the order
/// they arrive.
#[allow(clippy::too_many_arguments)]
pub trait Driver {
    fn aspirate(
        &mut self,
        volumes_ul: &[f64],
        overstroke: &[bool],
        head: usize,
        multi: usize,
        plate_types: &[String],
        liquid_classes: &[String],
        level_follow: &[bool],
    );

    fn dispense(
        &mut self,
        volumes_ul: &[f64],
        blowout: &[bool],
        head: usize,
        multi: usize,
        plate_types: &[String],
        liquid_classes: &[String],
        level_follow: &[bool],
    );

    fn move_to(
        &mut self,
        positions: &[String],
        wells: &[String],
        references: &[i32],
        offset_x: &[f64],
        offset_y: &[f64],
        offset_z: &[f64],
        plate_types: &[String],
        head: usize,
    );

    fn load_tips(
        &mut self,
        channels: &[i32],
        head: usize,
        multi: usize,
        holder_types: &[String],
        positions: &[String],
        wells: &[String],
    );

    fn unload_tips(
        &mut self,
        channels: &[i32],
        head: usize,
        multi: usize,
        holder_types: &[String],
        positions: &[String],
        wells: &[String],
    );

    fn mix(
        &mut self,
        head: usize,
        volumes_ul: &[f64],
        working_volumes_ul: &[f64],
        plate_types: &[String],
        cycles: &[u32],
        multi: usize,
        extra: &IndexMap<String, String>,
    );

    fn wait(&mut self, seconds: f64);

    fn set_pipette_speed(&mut self, head: usize, channel: i32, speed: f64);

    fn set_drive_speed(&mut self, drive: Drive, speed: f64);

    fn reset_pistons(&mut self, head: usize, channel: i32);

    fn initialize(&mut self);

    fn finalize(&mut self);
}

/// Records every driver call as one formatted script line.
#[derive(Debug, Default)]
pub struct ScriptDriver {
    lines: Vec<String>,
}

impl ScriptDriver {
    pub fn new() -> Self {
        ScriptDriver::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_script(self) -> String {
        self.lines.join("\n")
    }
}

fn fmt_f64s(values: &[f64]) -> String {
    let inner: Vec<String> = values.iter().map(|v| format!("{v}")).collect();
    format!("[{}]", inner.join(","))
}

fn fmt_strs(values: &[String]) -> String {
    format!("[{}]", values.join(","))
}

impl Driver for ScriptDriver {
    fn aspirate(
        &mut self,
        volumes_ul: &[f64],
        overstroke: &[bool],
        head: usize,
        multi: usize,
        plate_types: &[String],
        liquid_classes: &[String],
        _level_follow: &[bool],
    ) {
        self.lines.push(format!(
            "aspirate head={head} multi={multi} vol={} overstroke={} plate={} what={}",
            fmt_f64s(volumes_ul),
            overstroke.iter().any(|b| *b),
            fmt_strs(plate_types),
            fmt_strs(liquid_classes),
        ));
    }

    fn dispense(
        &mut self,
        volumes_ul: &[f64],
        blowout: &[bool],
        head: usize,
        multi: usize,
        plate_types: &[String],
        liquid_classes: &[String],
        _level_follow: &[bool],
    ) {
        let verb = if blowout.iter().all(|b| *b) && !blowout.is_empty() {
            "blowout"
        } else {
            "dispense"
        };
        self.lines.push(format!(
            "{verb} head={head} multi={multi} vol={} plate={} what={}",
            fmt_f64s(volumes_ul),
            fmt_strs(plate_types),
            fmt_strs(liquid_classes),
        ));
    }

    fn move_to(
        &mut self,
        positions: &[String],
        wells: &[String],
        references: &[i32],
        _offset_x: &[f64],
        _offset_y: &[f64],
        offset_z: &[f64],
        _plate_types: &[String],
        head: usize,
    ) {
        let refs: Vec<String> = references.iter().map(|r| r.to_string()).collect();
        self.lines.push(format!(
            "move head={head} pos={} well={} ref=[{}] zoff={}",
            fmt_strs(positions),
            fmt_strs(wells),
            refs.join(","),
            fmt_f64s(offset_z),
        ));
    }

    fn load_tips(
        &mut self,
        _channels: &[i32],
        head: usize,
        multi: usize,
        holder_types: &[String],
        positions: &[String],
        wells: &[String],
    ) {
        self.lines.push(format!(
            "load_tips head={head} multi={multi} holder={} pos={} well={}",
            fmt_strs(holder_types),
            fmt_strs(positions),
            fmt_strs(wells),
        ));
    }

    fn unload_tips(
        &mut self,
        _channels: &[i32],
        head: usize,
        multi: usize,
        holder_types: &[String],
        positions: &[String],
        wells: &[String],
    ) {
        self.lines.push(format!(
            "unload_tips head={head} multi={multi} holder={} pos={} well={}",
            fmt_strs(holder_types),
            fmt_strs(positions),
            fmt_strs(wells),
        ));
    }

    fn mix(
        &mut self,
        head: usize,
        volumes_ul: &[f64],
        working_volumes_ul: &[f64],
        _plate_types: &[String],
        cycles: &[u32],
        multi: usize,
        _extra: &IndexMap<String, String>,
    ) {
        let cyc: Vec<String> = cycles.iter().map(|c| c.to_string()).collect();
        self.lines.push(format!(
            "mix head={head} multi={multi} vol={} working={} cycles=[{}]",
            fmt_f64s(volumes_ul),
            fmt_f64s(working_volumes_ul),
            cyc.join(","),
        ));
    }

    fn wait(&mut self, seconds: f64) {
        self.lines.push(format!("wait {seconds}s"));
    }

    fn set_pipette_speed(&mut self, head: usize, channel: i32, speed: f64) {
        self.lines
            .push(format!("set_pipette_speed head={head} channel={channel} speed={speed}"));
    }

    fn set_drive_speed(&mut self, drive: Drive, speed: f64) {
        self.lines.push(format!("set_drive_speed drive={drive} speed={speed}"));
    }

    fn reset_pistons(&mut self, head: usize, channel: i32) {
        self.lines
            .push(format!("reset_pistons head={head} channel={channel}"));
    }

    fn initialize(&mut self) {
        self.lines.push("initialize".to_string());
    }

    fn finalize(&mut self) {
        self.lines.push("finalize".to_string());
    }
}
