use std::collections::BTreeMap;

use crate::arch::Architecture;
use crate::config::Endianness;
use crate::image::{Section, SectionImage};
use crate::instruction::Instruction;
use crate::operand::Operand;
use crate::register::{ArmRegister, MipsRegister, Register, X86Register};
use crate::state::SimulationState;
use crate::Result;

/// Address of the first instruction of every fixture program.
pub const START: u64 = 0x1000;

/// Start of the `.data` section of [data_image].
pub const DATA: u64 = 0x400100;

/// An image with a single 16 byte data section holding `0x00112233` followed by `0x44556677`
/// and eight bytes of zero.
pub fn data_image() -> SectionImage {
    let mut data = vec![0x33, 0x22, 0x11, 0x00, 0x77, 0x66, 0x55, 0x44];
    data.resize(16, 0);
    SectionImage::new([Section::new(".data", DATA, data)])
}

pub fn state(arch: Architecture) -> SimulationState {
    SimulationState::new(arch, Endianness::Little, data_image(), START)
}

pub fn big_endian_state(arch: Architecture) -> SimulationState {
    SimulationState::new(arch, Endianness::Big, data_image(), START)
}

pub fn mips(register: MipsRegister) -> Register {
    register.into()
}

pub fn arm(register: ArmRegister) -> Register {
    register.into()
}

pub fn x86(register: X86Register) -> Register {
    register.into()
}

/// Decode a sequence of instructions placed back to back from [START].
pub fn program(
    arch: Architecture,
    instructions: impl IntoIterator<Item = (&'static str, Vec<Operand>)>,
) -> Result<BTreeMap<u64, Instruction>> {
    let mut address = START;
    let mut program = BTreeMap::new();
    for (mnemonic, operands) in instructions {
        let instruction = Instruction::decode(arch, mnemonic, operands)?;
        let length = instruction.length();
        program.insert(address, instruction);
        address += length;
    }

    Ok(program)
}

/// Simulate the instruction at the program counter of `state`.
pub fn step(state: &mut SimulationState, program: &BTreeMap<u64, Instruction>) -> Result<String> {
    let instruction = &program[&state.program_counter()];
    state.step(instruction)
}
