use sim_value::{Address, BinaryOp, Value, Width};

use crate::error::{Error, Result, Unresolved};
use crate::instruction::{
    assignment, jump_target, InstrXData, Instruction, OperandKind, OrSymbol,
};
use crate::operand::Operand;
use crate::register::{Register, RegisterInfo};
use crate::state::{Location, SimulationState};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArmOp {
    Mov,
    Add,
    Sub,
    And,
    Orr,
    Ldr,
    Ldrh,
    Str,
    Push,
    Pop,
    B,
    Bx,
    Svc,
}

/// Condition code suffix of an ARM instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    Eq,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
}

impl Condition {
    const ALL: &'static [(&'static str, Condition)] = &[
        ("EQ", Condition::Eq),
        ("NE", Condition::Ne),
        ("CS", Condition::Cs),
        ("HS", Condition::Cs),
        ("CC", Condition::Cc),
        ("LO", Condition::Cc),
        ("MI", Condition::Mi),
        ("PL", Condition::Pl),
        ("VS", Condition::Vs),
        ("VC", Condition::Vc),
        ("HI", Condition::Hi),
        ("LS", Condition::Ls),
        ("GE", Condition::Ge),
        ("LT", Condition::Lt),
        ("GT", Condition::Gt),
        ("LE", Condition::Le),
        ("AL", Condition::Al),
    ];

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        if suffix.is_empty() {
            return Some(Condition::Al);
        }

        Self::ALL
            .iter()
            .find(|(text, _)| text.eq_ignore_ascii_case(suffix))
            .map(|(_, condition)| *condition)
    }

    pub fn suffix(&self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, condition)| condition == self)
            .map(|(text, _)| *text)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

impl ArmOp {
    /// Longest names first so that `BX` is not read as `B` with an `X` suffix.
    const MNEMONICS: &'static [(&'static str, ArmOp)] = &[
        ("PUSH", ArmOp::Push),
        ("LDRH", ArmOp::Ldrh),
        ("MOV", ArmOp::Mov),
        ("ADD", ArmOp::Add),
        ("SUB", ArmOp::Sub),
        ("AND", ArmOp::And),
        ("ORR", ArmOp::Orr),
        ("LDR", ArmOp::Ldr),
        ("STR", ArmOp::Str),
        ("POP", ArmOp::Pop),
        ("SVC", ArmOp::Svc),
        ("BX", ArmOp::Bx),
        ("B", ArmOp::B),
    ];

    /// Split a mnemonic such as `BNE` into its operation and condition.
    pub fn from_mnemonic(mnemonic: &str) -> Option<(Self, Condition)> {
        let upper = mnemonic.to_ascii_uppercase();
        Self::MNEMONICS.iter().find_map(|(name, op)| {
            let suffix = upper.strip_prefix(name)?;
            Condition::from_suffix(suffix).map(|condition| (*op, condition))
        })
    }

    pub fn name(&self) -> &'static str {
        Self::MNEMONICS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn signature(&self) -> &'static [OperandKind] {
        use OperandKind as Kind;
        match self {
            ArmOp::Mov => &[Kind::Register, Kind::RegisterOrImmediate],
            ArmOp::Add | ArmOp::Sub | ArmOp::And | ArmOp::Orr => {
                &[Kind::Register, Kind::Register, Kind::RegisterOrImmediate]
            }
            ArmOp::Ldr | ArmOp::Ldrh | ArmOp::Str => &[Kind::Register, Kind::Memory],
            ArmOp::Push | ArmOp::Pop => &[Kind::RegisterList],
            ArmOp::B => &[Kind::Target],
            ArmOp::Bx => &[Kind::Register],
            ArmOp::Svc => &[Kind::Immediate],
        }
    }

    pub fn is_simulatable(&self) -> bool {
        !matches!(self, ArmOp::Svc)
    }
}

pub(crate) fn annotation(
    op: ArmOp,
    condition: Condition,
    instr: &Instruction,
    xdata: &InstrXData,
) -> Result<String> {
    let text = match op {
        ArmOp::Mov => format!("{} := {}", xdata.var(instr, 0)?, xdata.xpr(instr, 0)?),
        ArmOp::Add | ArmOp::Sub | ArmOp::And | ArmOp::Orr => format!(
            "{} := {}",
            xdata.var(instr, 0)?,
            xdata.simplified(instr, 2, 3)?
        ),
        ArmOp::Ldr | ArmOp::Ldrh => format!("{} := {}", xdata.var(instr, 0)?, xdata.xpr(instr, 1)?),
        ArmOp::Str => format!("{} := {}", xdata.var(instr, 0)?, xdata.xpr(instr, 0)?),
        ArmOp::Push | ArmOp::Pop => xdata
            .vars
            .iter()
            .zip(&xdata.xprs)
            .map(|(var, xpr)| format!("{var} := {xpr}"))
            .collect::<Vec<_>>()
            .join("; "),
        ArmOp::B => format!("goto {:#x}", instr.target(0)?),
        ArmOp::Bx if returns(instr.operand(0)) => "return".to_string(),
        ArmOp::Bx => format!("goto {}", xdata.xpr(instr, 0)?),
        ArmOp::Svc => format!("svc {}", instr.operand(0)),
    };

    if condition == Condition::Al {
        Ok(text)
    } else {
        Ok(format!("if {condition} then {text}"))
    }
}

fn returns(operand: &Operand) -> bool {
    operand
        .as_register()
        .is_some_and(|register| register.is_return_address())
}

pub(crate) fn simulate(
    op: ArmOp,
    condition: Condition,
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
) -> Result<String> {
    if op == ArmOp::Svc {
        return Err(instr.not_simulatable(iaddr));
    }

    // Flags are not modelled. A conditional transfer of control has no known successor, other
    // conditional instructions leave a symbolic choice in their destination.
    if condition != Condition::Al {
        match op {
            ArmOp::B | ArmOp::Bx => return Err(unresolvable(instr, iaddr, condition)),
            ArmOp::Pop if register_list(instr).iter().any(|r| r.is_program_counter()) => {
                return Err(unresolvable(instr, iaddr, condition))
            }
            ArmOp::Push | ArmOp::Pop => {
                return Err(Error::SymbolicEscalation {
                    iaddr,
                    expression: format!("if {condition} then {instr}"),
                })
            }
            _ => {}
        }
    }

    match op {
        ArmOp::Mov => {
            let value = state.get_rhs(iaddr, instr.operand(1))?;
            write_register(instr, iaddr, state, condition, value)
        }
        ArmOp::Add => data_processing(instr, iaddr, state, condition, BinaryOp::Add),
        ArmOp::Sub => data_processing(instr, iaddr, state, condition, BinaryOp::Subtract),
        ArmOp::And => data_processing(instr, iaddr, state, condition, BinaryOp::And),
        ArmOp::Orr => data_processing(instr, iaddr, state, condition, BinaryOp::Or),
        ArmOp::Ldr => {
            let source = instr.operand(1).clone().with_size(Width::W32);
            let value = state.get_rhs(iaddr, &source)?;
            write_register(instr, iaddr, state, condition, value)
        }
        ArmOp::Ldrh => {
            let source = instr.operand(1).clone().with_size(Width::W16);
            let value = state.get_rhs(iaddr, &source)?.zero_extend(Width::W32)?;
            write_register(instr, iaddr, state, condition, value)
        }
        ArmOp::Str => {
            let value = state.get_rhs(iaddr, instr.operand(0))?;
            let destination = instr.operand(1).clone().with_size(Width::W32);
            let value = select(iaddr, state, condition, &destination, value)?;
            let location = state.set(iaddr, &destination, value.clone())?;
            state.increment_program_counter(instr.length());
            Ok(assignment(&location, &value))
        }
        ArmOp::Push => push(instr, iaddr, state),
        ArmOp::Pop => pop(instr, iaddr, state),
        ArmOp::B => {
            let target = instr.target(0)?;
            state.set_program_counter(target);
            Ok(format!("goto {target:#x}"))
        }
        ArmOp::Bx => {
            let value = state.get_rhs(iaddr, instr.operand(0))?;
            // The low bit selects the Thumb state
            let target = jump_target(iaddr, &value)? & !1;
            state.set_program_counter(target);
            Ok(format!("goto {target:#x}"))
        }
        ArmOp::Svc => Err(instr.not_simulatable(iaddr)),
    }
}

fn unresolvable(instr: &Instruction, iaddr: u64, condition: Condition) -> Error {
    Error::UnresolvableBranch {
        iaddr,
        condition: format!("{} condition {condition}", instr.mnemonic()),
        reason: Unresolved::Unknown,
    }
}

/// Value left in `destination` when `value` is written under `condition`. Without flags a
/// condition other than `AL` yields `COND ? value : previous`.
fn select(
    iaddr: u64,
    state: &mut SimulationState,
    condition: Condition,
    destination: &Operand,
    value: Value,
) -> Result<Value> {
    if condition == Condition::Al {
        return Ok(value);
    }

    let previous = state.get_rhs(iaddr, destination)?;
    let width = value.width().unwrap_or(Width::W32);
    Ok(Value::symbol(format!("{condition} ? {value} : {previous}"), width))
}

fn data_processing(
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
    condition: Condition,
    op: BinaryOp,
) -> Result<String> {
    let lhs = state.get_rhs(iaddr, instr.operand(1))?;
    let rhs = state.get_rhs(iaddr, instr.operand(2))?;
    let result = lhs.binary(op, &rhs).or_symbol(Width::W32)?;
    write_register(instr, iaddr, state, condition, result)
}

/// Write the destination register. Writing `pc` transfers control.
fn write_register(
    instr: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
    condition: Condition,
    value: Value,
) -> Result<String> {
    let destination = instr.operand(0);
    if destination
        .as_register()
        .is_some_and(|register| register.is_program_counter())
    {
        if condition != Condition::Al {
            return Err(unresolvable(instr, iaddr, condition));
        }

        let target = jump_target(iaddr, &value)?;
        state.set_program_counter(target);
        return Ok(format!("goto {target:#x}"));
    }

    let value = select(iaddr, state, condition, destination, value)?;
    let location = state.set(iaddr, destination, value.clone())?;
    state.increment_program_counter(instr.length());
    Ok(assignment(&location, &value))
}

fn register_list(instr: &Instruction) -> Vec<Register> {
    let mut registers = match instr.operand(0) {
        Operand::RegisterList(registers) => registers.clone(),
        _ => Vec::new(),
    };

    // Lowest numbered register is stored at the lowest address
    registers.sort();
    registers
}

fn stack_slot(iaddr: u64, sp: &Value, index: usize) -> Result<Address> {
    let slot = sp.add(&Value::literal(4 * index as u64, Width::W32))?;
    match slot {
        Value::Address(address) => Ok(address),
        other => Err(Error::SymbolicEscalation {
            iaddr,
            expression: format!("[{other}]"),
        }),
    }
}

fn push(instr: &Instruction, iaddr: u64, state: &mut SimulationState) -> Result<String> {
    let registers = register_list(instr);
    let stack_pointer = state.architecture().stack_pointer();
    let sp = state.register_value(stack_pointer);
    let size = Value::literal(4 * registers.len() as u64, Width::W32);
    let new_sp = sp.subtract(&size)?;

    // Resolve every slot before the first store
    let stores = registers
        .iter()
        .enumerate()
        .map(|(index, register)| -> Result<(Location, Value)> {
            let value = state.get_rhs(iaddr, &Operand::Register(*register))?;
            let location = Location::Memory(stack_slot(iaddr, &new_sp, index)?);
            Ok((location, value))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut effects = Vec::with_capacity(stores.len() + 1);
    for (location, value) in stores {
        state.write_location(iaddr, &location, value.clone())?;
        effects.push(assignment(&location, &value));
    }

    state.set_register(stack_pointer, new_sp.clone());
    effects.push(assignment(&Location::Register(stack_pointer), &new_sp));
    state.increment_program_counter(instr.length());
    Ok(effects.join("; "))
}

fn pop(instr: &Instruction, iaddr: u64, state: &mut SimulationState) -> Result<String> {
    let registers = register_list(instr);
    let stack_pointer = state.architecture().stack_pointer();
    let sp = state.register_value(stack_pointer);

    // Read every slot and the return target before any register changes
    let mut loaded = Vec::with_capacity(registers.len());
    let mut target = None;
    for (index, register) in registers.iter().enumerate() {
        let address = stack_slot(iaddr, &sp, index)?;
        let value = state.read_memory(iaddr, &address, Width::W32)?;

        if register.is_program_counter() {
            target = Some(jump_target(iaddr, &value)? & !1);
        } else {
            loaded.push((*register, value));
        }
    }

    let size = Value::literal(4 * registers.len() as u64, Width::W32);
    let new_sp = sp.add(&size)?;

    let mut effects = Vec::with_capacity(loaded.len() + 2);
    for (register, value) in loaded {
        state.set_register(register, value.clone());
        effects.push(assignment(&Location::Register(register), &value));
    }

    state.set_register(stack_pointer, new_sp.clone());
    effects.push(assignment(&Location::Register(stack_pointer), &new_sp));

    match target {
        Some(target) => {
            state.set_program_counter(target);
            effects.push(format!("goto {target:#x}"));
        }
        None => state.increment_program_counter(instr.length()),
    }

    Ok(effects.join("; "))
}
