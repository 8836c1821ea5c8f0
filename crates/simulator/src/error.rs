use sim_value::{RegionId, Value};

use crate::{config, image, mem};

/// Simulation result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding or simulating an instruction.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A value operation failed.
    #[error(transparent)]
    Value(#[from] sim_value::Error),

    /// Error occurred while accessing a memory region.
    #[error(transparent)]
    Memory(#[from] mem::Error),

    #[error(transparent)]
    Config(#[from] config::Error),

    #[error(transparent)]
    Image(#[from] image::Error),

    /// The instruction violates an invariant described by the error kind.
    #[error("illegal instruction {mnemonic}: {kind}")]
    IllegalInstruction {
        mnemonic: String,
        kind: IllegalInstructionKind,
    },

    /// The annotation data recorded for an instruction does not have the expected shape.
    #[error("annotation data for {mnemonic} is missing {field}[{index}]")]
    MissingAnnotationData {
        mnemonic: String,
        field: &'static str,
        index: usize,
    },

    /// A computation cannot be carried out on symbolic operands and the result cannot be
    /// represented as a symbol.
    #[error("cannot compute {expression} at {iaddr:#x}")]
    SymbolicEscalation { iaddr: u64, expression: String },

    /// The condition of a control flow instruction cannot be decided.
    #[error("unresolvable branch at {iaddr:#x} ({reason}): {condition}")]
    UnresolvableBranch {
        iaddr: u64,
        condition: String,
        reason: Unresolved,
    },

    /// A trap instruction fired.
    #[error("trap at {iaddr:#x}: {lhs} == {rhs}")]
    Trap { iaddr: u64, lhs: Value, rhs: Value },

    /// The instruction has no dynamic semantics.
    #[error("{mnemonic} at {iaddr:#x} is not simulatable")]
    NotSimulatable { iaddr: u64, mnemonic: String },

    /// An operand of the wrong kind was supplied to an operation at runtime.
    #[error("operand {operand} at {iaddr:#x} is not {expected}")]
    InvalidOperand {
        iaddr: u64,
        operand: String,
        expected: &'static str,
    },

    /// An address refers to a region unknown to the simulation state.
    #[error("unknown memory region {region}")]
    UnknownRegion { region: RegionId },
}

impl Error {
    /// Classify the error for the driver.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Value(sim_value::Error::Unresolved { .. }) => ErrorClass::SymbolicEscalation,
            Error::Value(sim_value::Error::Conversion { .. }) => ErrorClass::Structural,
            Error::Memory(err) => err.class(),
            Error::Config(_) | Error::Image(_) => ErrorClass::Structural,
            Error::IllegalInstruction { .. } | Error::MissingAnnotationData { .. } => {
                ErrorClass::Structural
            }
            Error::InvalidOperand { .. } => ErrorClass::Structural,
            Error::SymbolicEscalation { .. } => ErrorClass::SymbolicEscalation,
            Error::UnresolvableBranch { .. } => ErrorClass::UnresolvableBranch,
            Error::Trap { .. } => ErrorClass::Trap,
            Error::NotSimulatable { .. } => ErrorClass::NotSimulatable,
            Error::UnknownRegion { .. } => ErrorClass::InvalidRegion,
        }
    }
}

/// Coarse classification of errors used to decide whether a run can continue.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A data flow computation could not be resolved.
    SymbolicEscalation,

    /// A branch condition could not be decided.
    UnresolvableBranch,

    /// Memory that was never written was read.
    UninitializedAccess,

    /// Access to a freed, out of bounds or foreign memory region.
    InvalidRegion,

    /// Malformed instruction, operand or input data.
    Structural,

    /// A trap instruction fired.
    Trap,

    /// The instruction has no dynamic semantics.
    NotSimulatable,
}

impl ErrorClass {
    /// Fatal errors end the run. The next instruction address is not known after an
    /// unresolvable branch or a trap.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorClass::UnresolvableBranch | ErrorClass::Structural | ErrorClass::Trap
        )
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ErrorClass::SymbolicEscalation => "symbolic escalation",
            ErrorClass::UnresolvableBranch => "unresolvable branch",
            ErrorClass::UninitializedAccess => "uninitialized access",
            ErrorClass::InvalidRegion => "invalid region",
            ErrorClass::Structural => "structural",
            ErrorClass::Trap => "trap",
            ErrorClass::NotSimulatable => "not simulatable",
        };
        f.write_str(text)
    }
}

/// Reason a branch condition could not be decided.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Unresolved {
    /// Not enough is known about the operands.
    Unknown,

    /// The comparison has no meaning for the operand kinds, such as a stream handle compared
    /// against a nonzero number.
    NotApplicable,
}

impl std::fmt::Display for Unresolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unresolved::Unknown => write!(f, "unknown"),
            Unresolved::NotApplicable => write!(f, "not applicable"),
        }
    }
}

#[derive(Debug)]
pub enum IllegalInstructionKind {
    /// The mnemonic is not known for the architecture.
    UnknownMnemonic,
    OperandMissing(usize),
    OperandNotPermitted(usize),
    InvalidOperandKind(usize),
}

impl std::fmt::Display for IllegalInstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IllegalInstructionKind::UnknownMnemonic => write!(f, "unknown mnemonic"),
            IllegalInstructionKind::OperandMissing(index) => {
                write!(f, "operand {index} missing")
            }
            IllegalInstructionKind::OperandNotPermitted(index) => {
                write!(f, "operand {index} not permitted")
            }
            IllegalInstructionKind::InvalidOperandKind(index) => {
                write!(f, "operand {index} has an invalid kind")
            }
        }
    }
}
