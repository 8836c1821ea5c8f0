use sim_value::{Address, BinaryOp, Value, Width};

use crate::error::{Error, Result};
use crate::instruction::{
    assignment, jump_target, simulate_binary, InstrXData, Instruction, OperandKind,
};
use crate::state::{Location, SimulationState};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum X86Op {
    Mov,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Lea,
    Push,
    Pop,
    Jmp,
    Nop,
    Int,
}

impl X86Op {
    const MNEMONICS: &'static [(&'static str, X86Op)] = &[
        ("mov", X86Op::Mov),
        ("add", X86Op::Add),
        ("sub", X86Op::Sub),
        ("and", X86Op::And),
        ("or", X86Op::Or),
        ("xor", X86Op::Xor),
        ("lea", X86Op::Lea),
        ("push", X86Op::Push),
        ("pop", X86Op::Pop),
        ("jmp", X86Op::Jmp),
        ("nop", X86Op::Nop),
        ("int", X86Op::Int),
    ];

    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::MNEMONICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(mnemonic))
            .map(|(_, op)| *op)
    }

    pub fn signature(&self) -> &'static [OperandKind] {
        use OperandKind as Kind;
        match self {
            X86Op::Mov | X86Op::Add | X86Op::Sub | X86Op::And | X86Op::Or | X86Op::Xor => {
                &[Kind::RegisterOrMemory, Kind::Source]
            }
            X86Op::Lea => &[Kind::Register, Kind::Memory],
            X86Op::Push => &[Kind::Source],
            X86Op::Pop => &[Kind::RegisterOrMemory],
            X86Op::Jmp => &[Kind::TargetOrRegister],
            X86Op::Nop => &[],
            X86Op::Int => &[Kind::Immediate],
        }
    }

    pub fn is_simulatable(&self) -> bool {
        !matches!(self, X86Op::Int)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        match self {
            X86Op::Add => Some(BinaryOp::Add),
            X86Op::Sub => Some(BinaryOp::Subtract),
            X86Op::And => Some(BinaryOp::And),
            X86Op::Or => Some(BinaryOp::Or),
            X86Op::Xor => Some(BinaryOp::Xor),
            _ => None,
        }
    }
}

pub(crate) fn annotation(op: X86Op, instr: &Instruction, xdata: &InstrXData) -> Result<String> {
    let text = match op {
        X86Op::Mov | X86Op::Lea | X86Op::Pop => {
            format!("{} := {}", xdata.var(instr, 0)?, xdata.xpr(instr, 0)?)
        }
        X86Op::Add | X86Op::Sub | X86Op::And | X86Op::Or | X86Op::Xor => format!(
            "{} := {}",
            xdata.var(instr, 0)?,
            xdata.simplified(instr, 2, 3)?
        ),
        X86Op::Push => format!("{} := {}", xdata.var(instr, 1)?, xdata.xpr(instr, 0)?),
        X86Op::Jmp => match instr.operand(0).absolute_address() {
            Some(target) => format!("goto {target:#x}"),
            None => format!("goto {}", xdata.xpr(instr, 0)?),
        },
        X86Op::Nop => "nop".to_string(),
        X86Op::Int => format!("int {}", instr.operand(0)),
    };

    Ok(text)
}

pub(crate) fn simulate(
    op: X86Op,
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
) -> Result<String> {
    if let Some(binary) = op.binary_op() {
        let (location, value) = simulate_binary(instr, iaddr, state, binary, [0, 0, 1])?;
        state.increment_program_counter(instr.length());
        return Ok(assignment(&location, &value));
    }

    match op {
        X86Op::Mov => {
            let value = state.get_rhs(iaddr, instr.operand(1))?;
            let location = state.set(iaddr, instr.operand(0), value.clone())?;
            state.increment_program_counter(instr.length());
            Ok(assignment(&location, &value))
        }
        X86Op::Lea => {
            let value = state.effective_address(iaddr, instr.operand(1))?;
            let location = state.set(iaddr, instr.operand(0), value.clone())?;
            state.increment_program_counter(instr.length());
            Ok(assignment(&location, &value))
        }
        X86Op::Push => push(instr, iaddr, state),
        X86Op::Pop => pop(instr, iaddr, state),
        X86Op::Jmp => {
            let target = match instr.operand(0).absolute_address() {
                Some(target) => target,
                None => {
                    let value = state.get_rhs(iaddr, instr.operand(0))?;
                    jump_target(iaddr, &value)?
                }
            };
            state.set_program_counter(target);
            Ok(format!("goto {target:#x}"))
        }
        X86Op::Nop => {
            state.increment_program_counter(instr.length());
            Ok("nop".to_string())
        }
        _ => Err(instr.not_simulatable(iaddr)),
    }
}

fn stack_top(iaddr: u64, sp: &Value) -> Result<Address> {
    match sp {
        Value::Address(address) => Ok(address.clone()),
        other => Err(Error::SymbolicEscalation {
            iaddr,
            expression: format!("[{other}]"),
        }),
    }
}

fn push(instr: &Instruction, iaddr: u64, state: &mut SimulationState) -> Result<String> {
    let value = state.get_rhs(iaddr, instr.operand(0))?;
    let stack_pointer = state.architecture().stack_pointer();
    let sp = state
        .register_value(stack_pointer)
        .subtract(&Value::literal(4, Width::W32))?;

    let location = Location::Memory(stack_top(iaddr, &sp)?);
    state.write_location(iaddr, &location, value.clone())?;
    state.set_register(stack_pointer, sp.clone());
    state.increment_program_counter(instr.length());

    Ok(format!(
        "{}; {}",
        assignment(&Location::Register(stack_pointer), &sp),
        assignment(&location, &value)
    ))
}

fn pop(instr: &Instruction, iaddr: u64, state: &mut SimulationState) -> Result<String> {
    let stack_pointer = state.architecture().stack_pointer();
    let sp = state.register_value(stack_pointer);

    let top = stack_top(iaddr, &sp)?;
    let value = state.read_memory(iaddr, &top, Width::W32)?;
    let new_sp = sp.add(&Value::literal(4, Width::W32))?;
    state.set_register(stack_pointer, new_sp.clone());

    // A destination relative to the stack pointer sees the incremented value
    let destination = match state.set(iaddr, instr.operand(0), value.clone()) {
        Ok(destination) => destination,
        Err(err) => {
            state.set_register(stack_pointer, sp);
            return Err(err);
        }
    };
    state.increment_program_counter(instr.length());

    Ok(format!(
        "{}; {}",
        assignment(&destination, &value),
        assignment(&Location::Register(stack_pointer), &new_sp)
    ))
}
