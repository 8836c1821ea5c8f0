//! Instruction-level simulator for pre-decoded machine code. Instructions of the ARM, MIPS and
//! x86 instruction sets are executed against a [state::SimulationState] made of registers and
//! typed memory regions. Values flowing through the simulation come from the [sim_value] crate
//! and may be concrete, addresses into a region, or symbolic.
//!
//! ### Memory
//!
//! Memory is split by region. The stack is addressed relative to the initial stack pointer,
//! global data is backed by the static image of the binary, and every dynamically allocated
//! buffer gets its own base region. Reading a byte that was never written is reported through
//! the [diagnostics::DiagnosticLog] instead of failing the run.
//!
//! ### Driver
//!
//! The [driver::Driver] steps instructions in program counter order and classifies failures
//! using [error::ErrorClass]. Non-fatal failures skip the instruction; fatal failures stop the
//! run.

/// Instruction set specific opcode semantics.
pub mod arch;

/// Settings for a simulation run, loaded from JSON.
pub mod config;

pub mod diagnostics;

/// Execution loop over a map of decoded instructions.
pub mod driver;

pub mod error;

/// Static image of the simulated binary.
pub mod image;

/// Decoded instructions, annotation and dispatch to the architecture semantics.
pub mod instruction;

/// Byte-granular memory regions.
pub mod mem;

pub mod operand;

pub mod register;

/// Registers, memory and program counter of a simulation.
pub mod state;

pub use error::{Error, ErrorClass, Result};

#[cfg(test)]
mod test_fixture;

#[cfg(test)]
mod tests;
