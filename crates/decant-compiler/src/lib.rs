//! Decant compiler
//!
//! Lowers "transfer volume V of liquid class C from (plate, well) to
//! (plate, well)" requests into the ordered primitive actions a
//! pipetting robot executes. Lowering is parameterised by a hardware
//! deck ([`decant_model::Deck`]) and a policy rule set that picks
//! per-operation parameters (speeds, z-offsets, mix cycles, tip reuse).
//!
//! The pipeline expands one instruction level at a time:
//!
//! ```text
//! Transfer -> blocks -> per-channel transfers -> suck/blow/reset -> primitives
//! ```
//!
//! Primitives map 1:1 onto the [`driver::Driver`] interface.

pub mod compile;
pub mod driver;
pub mod error;
pub mod ir;
pub mod param;
pub mod planner;
pub mod policy;
pub mod sink;

pub use compile::Compiler;
pub use driver::{Driver, ScriptDriver};
pub use error::{Error, Result};
pub use ir::{Instruction, InstructionKind};
pub use ir::transfer::{Transfer, TransferEntry};
pub use param::ParamValue;
pub use policy::{Policy, PolicyValue, RuleSet};
pub use sink::{Level, LogSink, NullSink, TracingSink};
