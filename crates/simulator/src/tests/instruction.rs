use sim_value::Width;

use crate::arch::mips::MipsOp;
use crate::arch::Architecture;
use crate::error::{Error, ErrorClass, IllegalInstructionKind, Result};
use crate::instruction::{Instruction, Opcode};
use crate::operand::Operand;
use crate::register::{ArmRegister, MipsRegister, Register, X86Register};

fn illegal_kind(result: Result<Instruction>) -> IllegalInstructionKind {
    match result {
        Err(Error::IllegalInstruction { kind, .. }) => kind,
        other => panic!("expected an illegal instruction, got {other:?}"),
    }
}

#[test]
fn decode_selects_opcode() -> Result<()> {
    let instruction = Instruction::decode(
        Architecture::Mips,
        "ADDU",
        vec![
            Operand::register(MipsRegister::V0),
            Operand::register(MipsRegister::A0),
            Operand::register(MipsRegister::A1),
        ],
    )?;

    assert_eq!(instruction.opcode(), Opcode::Mips(MipsOp::Addu));
    assert_eq!(instruction.length(), 4);
    assert!(instruction.is_simulatable());
    assert_eq!(instruction.to_string(), "ADDU v0, a0, a1");
    Ok(())
}

#[test]
fn unknown_mnemonic() {
    let kind = illegal_kind(Instruction::decode(Architecture::Mips, "frobnicate", vec![]));
    assert!(matches!(kind, IllegalInstructionKind::UnknownMnemonic));
}

#[test]
fn missing_operand() {
    let kind = illegal_kind(Instruction::decode(
        Architecture::Mips,
        "addiu",
        vec![Operand::register(MipsRegister::V0)],
    ));
    assert!(matches!(kind, IllegalInstructionKind::OperandMissing(1)));
}

#[test]
fn extra_operand() {
    let kind = illegal_kind(Instruction::decode(
        Architecture::X86,
        "nop",
        vec![Operand::imm(0)],
    ));
    assert!(matches!(kind, IllegalInstructionKind::OperandNotPermitted(0)));
}

#[test]
fn wrong_operand_kind() {
    let kind = illegal_kind(Instruction::decode(
        Architecture::Arm,
        "LDR",
        vec![Operand::register(ArmRegister::R0), Operand::imm(4)],
    ));
    assert!(matches!(kind, IllegalInstructionKind::InvalidOperandKind(1)));

    let kind = illegal_kind(Instruction::decode(
        Architecture::X86,
        "mov",
        vec![Operand::imm(1), Operand::register(X86Register::Eax)],
    ));
    assert!(matches!(kind, IllegalInstructionKind::InvalidOperandKind(0)));
}

#[test]
fn illegal_instructions_are_structural() {
    let err = Instruction::decode(Architecture::Arm, "MUL", vec![])
        .expect_err("MUL is not supported");
    assert_eq!(err.class(), ErrorClass::Structural);
    assert!(err.class().is_fatal());
    assert_eq!(err.to_string(), "illegal instruction MUL: unknown mnemonic");
}

#[test]
fn operand_display() {
    assert_eq!(Operand::indirect(MipsRegister::Sp, 8).to_string(), "0x8(sp)");
    assert_eq!(Operand::indirect(MipsRegister::Sp, -8).to_string(), "-0x8(sp)");
    assert_eq!(Operand::absolute(0x2000).to_string(), "0x2000");
    assert_eq!(Operand::simm(-1).to_string(), "0xffffffff");
    assert_eq!(
        Operand::register_list([ArmRegister::R4, ArmRegister::Lr]).to_string(),
        "{r4, lr}"
    );
}

#[test]
fn operand_sizes() {
    let operand = Operand::indirect(MipsRegister::Sp, 0).with_size(Width::W8);
    assert_eq!(operand.size(), Some(Width::W8));
    assert_eq!(Operand::register_list([ArmRegister::R0]).size(), None);
    assert_eq!(Operand::imm(1).with_size(Width::W8).size(), Some(Width::W32));
}

#[test]
fn register_names() {
    assert_eq!(
        Register::parse(Architecture::Mips, "$sp"),
        Some(MipsRegister::Sp.into())
    );
    assert_eq!(
        Register::parse(Architecture::Mips, "29"),
        Some(MipsRegister::Sp.into())
    );
    assert_eq!(
        Register::parse(Architecture::Arm, "LR"),
        Some(ArmRegister::Lr.into())
    );
    assert_eq!(Register::parse(Architecture::X86, "sp"), None);
    assert_eq!(Register::parse(Architecture::Mips, "32"), None);
}
