//! Pre-resolved instructions consumed by the forward transfer.
//!
//! Bytecode loading and register allocation are the driver's concern; the
//! core sees one variant per transfer category, with registers resolved to
//! memory locations through the per-instruction aliasing oracle.

use sift_core::types::collections::FxHashMap;
use sift_core::types::{LiteralId, TypeId};

/// A virtual register of the method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Register(pub u32);

/// Stable index of an instruction within its method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionIndex(pub u32);

/// An invoke instruction with its pre-resolved call-site facts.
#[derive(Debug, Clone, Default)]
pub struct InvokeInstruction {
    /// Argument registers by position; the receiver is position 0 for
    /// instance calls.
    pub arguments: Vec<Register>,
    /// Constant string arguments by position, for via-value-of features and
    /// `[<Argument(i)>]` path indirection.
    pub constant_arguments: FxHashMap<u8, LiteralId>,
    /// Statically known register types by position, for via-type-of
    /// features.
    pub register_types: FxHashMap<u8, TypeId>,
}

/// One pre-resolved instruction.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Any other result-producing instruction: the result is untainted.
    Default,
    /// `check-cast`: carries taint through, tagging allow-listed cast types.
    CheckCast { source: Register, cast_type: TypeId },
    /// Instance field read; the field resolves through the call graph.
    ReadInstanceField { object: Register },
    /// Static field read; the field resolves through the call graph.
    ReadStaticField,
    /// Parameter load at method entry.
    LoadParameter { index: u8 },
    /// Register move; aliasing already captured the flow.
    Move { source: Register },
    /// Result move; aliasing already captured the flow.
    MoveResult,
    /// Array read; aliasing already captured the flow.
    ArrayGet { array: Register },
    /// Array write.
    ArrayPut { source: Register, array: Register },
    /// Array allocation from element values.
    NewArray { sources: Vec<Register> },
    /// Unary/binary numerical operation over the source registers.
    NumericalOp { sources: Vec<Register> },
    /// String literal load.
    ConstString { literal: LiteralId },
    /// Instance or static field write; the field resolves through the call
    /// graph and the target memory locations come from the oracle's result
    /// locations.
    WriteField { source: Register },
    /// Method return.
    Return { source: Option<Register> },
    /// Method call.
    Invoke(InvokeInstruction),
}
