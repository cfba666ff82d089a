//! Compiler entry point
//!
//! Owns the rule set, the deck and the log sink, and drives the
//! depth-first expansion from a `Transfer` down to the terminal
//! primitive sequence.

use tracing::{instrument, trace};

use decant_model::Deck;

use crate::driver::Driver;
use crate::error::Result;
use crate::ir::transfer::Transfer;
use crate::ir::Instruction;
use crate::sink::{Level, LogSink, NullSink};
use crate::policy::RuleSet;

/// Lowers transfer requests against one deck and one rule set.
///
/// Lowering is a pure tree expansion with no suspension points; the
/// compiler owns the in-flight transfer and mutates deck state (tip
/// boxes, waste, tracked wells) sequentially as instructions come out.
pub struct Compiler {
    rules: RuleSet,
    deck: Deck,
    sink: Box<dyn LogSink>,
}

impl Compiler {
    pub fn new(rules: RuleSet, deck: Deck) -> Self {
        Compiler {
            rules,
            deck,
            sink: Box::new(NullSink),
        }
    }

    /// Replace the default no-op sink.
    pub fn with_sink(mut self, sink: Box<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// Lower a transfer to its flat terminal sequence.
    ///
    /// The emitted order is the execution order; a request whose
    /// volumes are already all zero produces an empty sequence.
    #[instrument(skip_all, fields(transfers = transfer.entries.len()))]
    pub fn compile(&mut self, transfer: Transfer) -> Result<Vec<Instruction>> {
        let requested = transfer.entries.len();
        let mut program = Vec::new();
        let result = self.expand(Instruction::Transfer(transfer), &mut program);
        match result {
            Ok(()) => {
                self.sink.log(
                    Level::Info,
                    "compiler",
                    &format!(
                        "lowered {requested} transfers into {} primitives",
                        program.len()
                    ),
                );
                Ok(program)
            }
            Err(e) => {
                self.sink.log(Level::Error, "compiler", &e.to_string());
                Err(e)
            }
        }
    }

    /// `compile` wrapped in the robot lifecycle brackets.
    pub fn compile_program(&mut self, transfer: Transfer) -> Result<Vec<Instruction>> {
        let mut program = vec![Instruction::Initialize];
        program.extend(self.compile(transfer)?);
        program.push(Instruction::Finalize);
        Ok(program)
    }

    fn expand(&mut self, mut instruction: Instruction, out: &mut Vec<Instruction>) -> Result<()> {
        if instruction.is_terminal() {
            out.push(instruction);
            return Ok(());
        }
        trace!(kind = instruction.kind().code(), "lowering");
        let children = instruction.lower(&self.rules, &mut self.deck)?;
        for child in children {
            self.expand(child, out)?;
        }
        Ok(())
    }

    /// Emit an already-compiled program onto a driver, in order.
    pub fn emit(&self, program: &[Instruction], driver: &mut dyn Driver) {
        for instruction in program {
            instruction.emit(driver);
        }
    }
}
