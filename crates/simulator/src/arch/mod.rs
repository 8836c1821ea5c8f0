use serde::{Deserialize, Serialize};

use crate::register::{ArmRegister, MipsRegister, Register, X86Register};

/// ARM (A32) opcode semantics.
pub mod arm;

/// MIPS32 opcode semantics.
pub mod mips;

/// x86 (32-bit) opcode semantics.
pub mod x86;

/// Instruction set of the simulated program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Mips,
    Arm,
    X86,
}

impl Architecture {
    /// Length of an instruction when the decoder does not supply one. x86 callers are expected
    /// to set the real encoded length.
    pub fn default_instruction_length(&self) -> u64 {
        match self {
            Architecture::Mips | Architecture::Arm => 4,
            Architecture::X86 => 1,
        }
    }

    /// Distance between an instruction and the value it observes when reading the program
    /// counter register.
    pub fn program_counter_read_offset(&self) -> u64 {
        match self {
            Architecture::Arm => 8,
            Architecture::Mips | Architecture::X86 => 0,
        }
    }

    /// Whether control transfers take effect after the following instruction.
    pub fn has_delay_slots(&self) -> bool {
        matches!(self, Architecture::Mips)
    }

    pub fn stack_pointer(&self) -> Register {
        match self {
            Architecture::Mips => MipsRegister::Sp.into(),
            Architecture::Arm => ArmRegister::Sp.into(),
            Architecture::X86 => X86Register::Esp.into(),
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Architecture::Mips => write!(f, "mips"),
            Architecture::Arm => write!(f, "arm"),
            Architecture::X86 => write!(f, "x86"),
        }
    }
}
