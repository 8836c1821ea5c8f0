use sim_value::{BinaryOp, Literal, Value, Width};

use crate::error::{Error, Result};
use crate::instruction::{
    assignment, branch, decide, decide_equal, jump_target, simulate_binary, InstrXData,
    Instruction, OperandKind, OrSymbol,
};
use crate::operand::Operand;
use crate::register::RegisterInfo;
use crate::state::{Location, SimulationState};

use OperandKind::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MipsOp {
    Addu,
    Addiu,
    And,
    Or,
    Xor,
    Lui,
    Sllv,
    Sltiu,
    Teq,
    Sb,
    Sw,
    Lw,
    Lwr,
    Beq,
    Bne,
    Bgezl,
    Bltzl,
    J,
    Jr,
    Nop,
    Syscall,
}

impl MipsOp {
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let op = match mnemonic.to_ascii_lowercase().as_str() {
            "addu" => MipsOp::Addu,
            "addiu" => MipsOp::Addiu,
            "and" => MipsOp::And,
            "or" => MipsOp::Or,
            "xor" => MipsOp::Xor,
            "lui" => MipsOp::Lui,
            "sllv" => MipsOp::Sllv,
            "sltiu" => MipsOp::Sltiu,
            "teq" => MipsOp::Teq,
            "sb" => MipsOp::Sb,
            "sw" => MipsOp::Sw,
            "lw" => MipsOp::Lw,
            "lwr" => MipsOp::Lwr,
            "beq" => MipsOp::Beq,
            "bne" => MipsOp::Bne,
            "bgezl" => MipsOp::Bgezl,
            "bltzl" => MipsOp::Bltzl,
            "j" => MipsOp::J,
            "jr" => MipsOp::Jr,
            "nop" => MipsOp::Nop,
            "syscall" => MipsOp::Syscall,
            _ => return None,
        };

        Some(op)
    }

    /// Operand kinds in assembly order.
    pub fn signature(&self) -> &'static [OperandKind] {
        match self {
            MipsOp::Addu | MipsOp::And | MipsOp::Or | MipsOp::Xor | MipsOp::Sllv => {
                &[Register, Register, Register]
            }
            MipsOp::Addiu | MipsOp::Sltiu => &[Register, Register, Immediate],
            MipsOp::Lui => &[Register, Immediate],
            MipsOp::Teq => &[Register, Register],
            MipsOp::Sb | MipsOp::Sw | MipsOp::Lw | MipsOp::Lwr => &[Register, Memory],
            MipsOp::Beq | MipsOp::Bne => &[Register, Register, Target],
            MipsOp::Bgezl | MipsOp::Bltzl => &[Register, Target],
            MipsOp::J => &[Target],
            MipsOp::Jr => &[Register],
            MipsOp::Nop | MipsOp::Syscall => &[],
        }
    }

    pub fn is_simulatable(&self) -> bool {
        !matches!(self, MipsOp::Syscall)
    }
}

pub(crate) fn annotation(op: MipsOp, instr: &Instruction, xdata: &InstrXData) -> Result<String> {
    let text = match op {
        MipsOp::Addu | MipsOp::Addiu | MipsOp::And | MipsOp::Or | MipsOp::Xor | MipsOp::Sllv => {
            format!(
                "{} := {}",
                xdata.var(instr, 0)?,
                xdata.simplified(instr, 2, 3)?
            )
        }
        MipsOp::Lui | MipsOp::Lw | MipsOp::Lwr => {
            format!("{} := {}", xdata.var(instr, 0)?, xdata.xpr(instr, 0)?)
        }
        MipsOp::Sltiu => format!(
            "{} := 1 if {} else 0",
            xdata.var(instr, 0)?,
            xdata.simplified(instr, 2, 3)?
        ),
        MipsOp::Teq => format!(
            "trap if {} == {} ({})",
            xdata.xpr(instr, 0)?,
            xdata.xpr(instr, 1)?,
            xdata.simplified(instr, 2, 3)?
        ),
        MipsOp::Sb | MipsOp::Sw => format!(
            "{} := {}",
            xdata.var(instr, 0)?,
            xdata.simplified(instr, 0, 1)?
        ),
        MipsOp::Beq | MipsOp::Bne => format!(
            "if {} then goto {:#x}",
            xdata.simplified(instr, 2, 3)?,
            instr.target(2)?
        ),
        MipsOp::Bgezl | MipsOp::Bltzl => format!(
            "if {} then goto {:#x}",
            xdata.simplified(instr, 1, 2)?,
            instr.target(1)?
        ),
        MipsOp::J => format!("goto {:#x}", instr.target(0)?),
        MipsOp::Jr if is_return(instr.operand(0)) => "return".to_string(),
        MipsOp::Jr => format!("goto {}", xdata.xpr(instr, 0)?),
        MipsOp::Nop => "nop".to_string(),
        MipsOp::Syscall => "syscall".to_string(),
    };

    Ok(text)
}

fn is_return(operand: &Operand) -> bool {
    operand
        .as_register()
        .is_some_and(|register| register.is_return_address())
}

pub(crate) fn simulate(
    op: MipsOp,
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
) -> Result<String> {
    let trace = match op {
        MipsOp::Addu | MipsOp::Addiu => arithmetic(instr, iaddr, state, BinaryOp::Add)?,
        MipsOp::And => arithmetic(instr, iaddr, state, BinaryOp::And)?,
        MipsOp::Or => arithmetic(instr, iaddr, state, BinaryOp::Or)?,
        MipsOp::Xor => arithmetic(instr, iaddr, state, BinaryOp::Xor)?,
        MipsOp::Lui => {
            let immediate = state.get_rhs(iaddr, instr.operand(1))?;
            let result = immediate.shift_left(&Value::literal(16, Width::W32))?;
            let location = state.set(iaddr, instr.operand(0), result.clone())?;
            state.increment_program_counter(instr.length());
            assignment(&location, &result)
        }
        MipsOp::Sllv => shift_left_variable(instr, iaddr, state)?,
        MipsOp::Sltiu => set_less_than_unsigned(instr, iaddr, state)?,
        MipsOp::Teq => return trap_if_equal(instr, iaddr, state),
        MipsOp::Sb => store(instr, iaddr, state, Width::W8)?,
        MipsOp::Sw => store(instr, iaddr, state, Width::W32)?,
        MipsOp::Lw => {
            let source = instr.operand(1).clone().with_size(Width::W32);
            let value = state.get_rhs(iaddr, &source)?;
            let location = state.set(iaddr, instr.operand(0), value.clone())?;
            state.increment_program_counter(instr.length());
            assignment(&location, &value)
        }
        MipsOp::Lwr => load_word_right(instr, iaddr, state)?,
        MipsOp::Beq | MipsOp::Bne => {
            let lhs = state.get_rhs(iaddr, instr.operand(0))?;
            let rhs = state.get_rhs(iaddr, instr.operand(1))?;
            let equal = decide_equal(iaddr, &lhs, &rhs)?;
            let (taken, relation) = match op {
                MipsOp::Beq => (equal, "=="),
                _ => (!equal, "!="),
            };
            delayed_branch(instr, iaddr, state, 2, taken, &format!("{lhs} {relation} {rhs}"))?
        }
        MipsOp::Bgezl | MipsOp::Bltzl => {
            let value = state.get_rhs(iaddr, instr.operand(0))?;
            let (condition, result) = match op {
                MipsOp::Bgezl => (format!("{value} >= 0"), value.is_non_negative()),
                _ => (format!("{value} < 0"), value.is_negative()),
            };
            let taken = decide(iaddr, &condition, &result)?;
            branch_likely(instr, iaddr, state, taken, &condition)?
        }
        MipsOp::J => {
            let target = instr.target(0)?;
            state.increment_program_counter(instr.length());
            state.set_delayed_program_counter(target);
            format!("goto {target:#x}")
        }
        MipsOp::Jr => {
            let value = state.get_rhs(iaddr, instr.operand(0))?;
            let target = jump_target(iaddr, &value)?;
            state.increment_program_counter(instr.length());
            state.set_delayed_program_counter(target);
            format!("goto {target:#x}")
        }
        MipsOp::Nop => {
            state.increment_program_counter(instr.length());
            "nop".to_string()
        }
        MipsOp::Syscall => return Err(instr.not_simulatable(iaddr)),
    };

    Ok(trace)
}

fn arithmetic(
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
    op: BinaryOp,
) -> Result<String> {
    let (location, result) = simulate_binary(instr, iaddr, state, op, [0, 1, 2])?;
    state.increment_program_counter(instr.length());
    Ok(assignment(&location, &result))
}

/// `sllv rd, rt, rs`: the shift amount is the low five bits of `rs` and must be concrete.
fn shift_left_variable(instr: &Instruction, iaddr: u64, state: &mut SimulationState) -> Result<String> {
    let value = state.get_rhs(iaddr, instr.operand(1))?;
    let amount = state.get_rhs(iaddr, instr.operand(2))?;

    let Some(amount) = amount.as_literal() else {
        return Err(Error::SymbolicEscalation {
            iaddr,
            expression: format!("{value} << {amount}"),
        });
    };

    let amount = Value::Literal(amount & Literal::new(0x1f, Width::W32));
    let result = value.shift_left(&amount).or_symbol(Width::W32)?;
    let location = state.set(iaddr, instr.operand(0), result.clone())?;
    state.increment_program_counter(instr.length());
    Ok(assignment(&location, &result))
}

fn set_less_than_unsigned(
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
) -> Result<String> {
    let value = state.get_rhs(iaddr, instr.operand(1))?;
    let immediate = state.get_rhs(iaddr, instr.operand(2))?;

    let comparison = value.unsigned_less_than(&immediate);
    let result = if comparison.is_defined() {
        comparison
    } else {
        Value::symbol(format!("{value} < {immediate}"), Width::W32)
    };

    let location = state.set(iaddr, instr.operand(0), result.clone())?;
    state.increment_program_counter(instr.length());
    Ok(assignment(&location, &result))
}

fn trap_if_equal(instr: &Instruction, iaddr: u64, state: &mut SimulationState) -> Result<String> {
    let lhs = state.get_rhs(iaddr, instr.operand(0))?;
    let rhs = state.get_rhs(iaddr, instr.operand(1))?;

    match lhs.equals(&rhs).as_bool() {
        Some(true) => Err(Error::Trap { iaddr, lhs, rhs }),
        Some(false) => {
            state.increment_program_counter(instr.length());
            Ok(format!("trap if equal: {lhs}, {rhs}"))
        }
        None if lhs.is_symbol() || rhs.is_symbol() => Err(Error::SymbolicEscalation {
            iaddr,
            expression: format!("{lhs} == {rhs}"),
        }),
        None => {
            state.increment_program_counter(instr.length());
            Ok("trap if equal: ?".to_string())
        }
    }
}

fn store(
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
    width: Width,
) -> Result<String> {
    let value = state.get_rhs(iaddr, instr.operand(0))?.truncate(width)?;
    let destination = instr.operand(1).clone().with_size(width);
    let location = state.set(iaddr, &destination, value.clone())?;
    state.increment_program_counter(instr.length());
    Ok(assignment(&location, &value))
}

/// Byte positions (significance, displacement from the source address) merged into the
/// destination register for each source alignment. `None` loads the whole word.
fn load_word_right_bytes(alignment: usize, big_endian: bool) -> Option<&'static [(usize, i64)]> {
    match (big_endian, alignment) {
        (true, 0) => Some(&[(0, 0)]),
        (true, 1) => Some(&[(0, 0), (1, -1)]),
        (true, 2) => Some(&[(0, 0), (1, -1), (2, -2)]),
        (false, 1) => Some(&[(0, 0), (1, -1), (2, -2)]),
        (false, 2) => Some(&[(0, 0), (1, -1)]),
        (false, 3) => Some(&[(3, 0)]),
        _ => None,
    }
}

/// `lwr rt, offset(base)`: merge the bytes up to the word boundary into `rt`.
fn load_word_right(instr: &Instruction, iaddr: u64, state: &mut SimulationState) -> Result<String> {
    let source = instr.operand(1).clone().with_size(Width::W32);
    let Location::Memory(address) = state.get_lhs(iaddr, &source)? else {
        return Err(Error::InvalidOperand {
            iaddr,
            operand: source.to_string(),
            expected: "a memory location",
        });
    };

    let result = match load_word_right_bytes(address.alignment(), state.is_big_endian()) {
        None => state.read_memory(iaddr, &address, Width::W32)?,
        Some(positions) => {
            let current = state.get_rhs(iaddr, instr.operand(0))?;
            let mut merged = current.as_literal();
            for (significance, displacement) in positions {
                let byte = state.read_memory(iaddr, &address.add_offset(*displacement), Width::W8)?;
                merged = match (merged, byte.as_literal()) {
                    (Some(word), Some(byte)) => Some(word.with_byte(*significance, byte.bits() as u8)),
                    _ => None,
                };
            }

            match merged {
                Some(word) => Value::Literal(word),
                None => Value::symbol(format!("lwr({current}, {address})"), Width::W32),
            }
        }
    };

    let location = state.set(iaddr, instr.operand(0), result.clone())?;
    state.increment_program_counter(instr.length());
    Ok(assignment(&location, &result))
}

/// Resolve a branch with a delay slot: the slot always executes, then control moves to the
/// target or past the slot.
fn delayed_branch(
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
    target_index: usize,
    taken: bool,
    condition: &str,
) -> Result<String> {
    let true_target = instr.target(target_index)?;
    let false_target = iaddr.wrapping_add(2 * instr.length());

    state.increment_program_counter(instr.length());
    state.set_delayed_program_counter(if taken { true_target } else { false_target });
    Ok(branch(condition, taken, true_target, false_target))
}

/// Resolve a branch-likely instruction. When the branch is not taken the delay slot is annulled.
fn branch_likely(
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
    taken: bool,
    condition: &str,
) -> Result<String> {
    let true_target = instr.target(1)?;
    let false_target = iaddr.wrapping_add(2 * instr.length());

    if taken {
        state.increment_program_counter(instr.length());
        state.set_delayed_program_counter(true_target);
    } else {
        state.set_program_counter(false_target);
    }

    Ok(branch(condition, taken, true_target, false_target))
}
