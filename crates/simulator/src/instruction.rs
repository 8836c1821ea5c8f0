use sim_value::{Value, Width};

use crate::arch::arm::{self, ArmOp, Condition};
use crate::arch::mips::{self, MipsOp};
use crate::arch::x86::{self, X86Op};
use crate::arch::Architecture;
use crate::error::{Error, IllegalInstructionKind, Result, Unresolved};
use crate::operand::Operand;
use crate::state::{Location, SimulationState};

/// Operand and expression text recorded for an instruction by an earlier analysis. Used to
/// render annotations without simulating.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstrXData {
    /// Text of the variables written by the instruction.
    pub vars: Vec<String>,

    /// Text of the expressions read or computed by the instruction.
    pub xprs: Vec<String>,

    /// Identifiers of `vars` followed by `xprs`. Equal identifiers denote equal expressions.
    pub args: Vec<i64>,
}

impl InstrXData {
    pub fn new(
        vars: impl IntoIterator<Item = impl Into<String>>,
        xprs: impl IntoIterator<Item = impl Into<String>>,
        args: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
            xprs: xprs.into_iter().map(Into::into).collect(),
            args: args.into_iter().collect(),
        }
    }

    pub(crate) fn var(&self, instruction: &Instruction, index: usize) -> Result<&str> {
        self.vars
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| missing(instruction, "vars", index))
    }

    pub(crate) fn xpr(&self, instruction: &Instruction, index: usize) -> Result<&str> {
        self.xprs
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| missing(instruction, "xprs", index))
    }

    /// Render a syntactic expression and its simplified form as `x`, or `x (= y)` when the two
    /// differ. Without identifiers the texts are compared.
    pub(crate) fn simplified(
        &self,
        instruction: &Instruction,
        syntactic: usize,
        simplified: usize,
    ) -> Result<String> {
        let x = self.xpr(instruction, syntactic)?;
        let y = self.xpr(instruction, simplified)?;

        let same = if self.args.is_empty() {
            x == y
        } else {
            let id = |index: usize| {
                self.args
                    .get(self.vars.len() + index)
                    .ok_or_else(|| missing(instruction, "args", self.vars.len() + index))
            };
            id(syntactic)? == id(simplified)?
        };

        if same {
            Ok(x.to_string())
        } else {
            Ok(format!("{x} (= {y})"))
        }
    }
}

fn missing(instruction: &Instruction, field: &'static str, index: usize) -> Error {
    Error::MissingAnnotationData {
        mnemonic: instruction.mnemonic().to_string(),
        field,
        index,
    }
}

/// Kinds of operand accepted at a position of an instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandKind {
    Register,
    Immediate,
    Memory,
    /// A fixed code address.
    Target,
    RegisterList,
    RegisterOrImmediate,
    RegisterOrMemory,
    /// A register, an immediate or memory.
    Source,
    TargetOrRegister,
}

impl OperandKind {
    pub fn accepts(&self, operand: &Operand) -> bool {
        match self {
            OperandKind::Register => operand.is_register(),
            OperandKind::Immediate => operand.is_immediate(),
            OperandKind::Memory => operand.is_memory(),
            OperandKind::Target => operand.absolute_address().is_some(),
            OperandKind::RegisterList => matches!(operand, Operand::RegisterList(_)),
            OperandKind::RegisterOrImmediate => operand.is_register() || operand.is_immediate(),
            OperandKind::RegisterOrMemory => operand.is_register() || operand.is_memory(),
            OperandKind::Source => {
                operand.is_register() || operand.is_immediate() || operand.is_memory()
            }
            OperandKind::TargetOrRegister => {
                operand.is_register() || operand.absolute_address().is_some()
            }
        }
    }
}

/// Semantics selected for an instruction at decode time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Mips(MipsOp),
    Arm(ArmOp, Condition),
    X86(X86Op),
}

impl Opcode {
    fn signature(&self) -> &'static [OperandKind] {
        match self {
            Opcode::Mips(op) => op.signature(),
            Opcode::Arm(op, _) => op.signature(),
            Opcode::X86(op) => op.signature(),
        }
    }

    pub fn is_simulatable(&self) -> bool {
        match self {
            Opcode::Mips(op) => op.is_simulatable(),
            Opcode::Arm(op, _) => op.is_simulatable(),
            Opcode::X86(op) => op.is_simulatable(),
        }
    }
}

/// A decoded machine instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    arch: Architecture,
    mnemonic: String,
    operands: Vec<Operand>,
    length: u64,
    opcode: Opcode,
}

impl Instruction {
    /// Select the semantics for `mnemonic` and check the operands against them.
    pub fn decode(arch: Architecture, mnemonic: &str, operands: Vec<Operand>) -> Result<Self> {
        let opcode = match arch {
            Architecture::Mips => MipsOp::from_mnemonic(mnemonic).map(Opcode::Mips),
            Architecture::Arm => {
                ArmOp::from_mnemonic(mnemonic).map(|(op, condition)| Opcode::Arm(op, condition))
            }
            Architecture::X86 => X86Op::from_mnemonic(mnemonic).map(Opcode::X86),
        }
        .ok_or_else(|| Error::IllegalInstruction {
            mnemonic: mnemonic.to_string(),
            kind: IllegalInstructionKind::UnknownMnemonic,
        })?;

        let instruction = Self {
            arch,
            mnemonic: mnemonic.to_string(),
            operands,
            length: arch.default_instruction_length(),
            opcode,
        };

        let signature = opcode.signature();
        instruction.require_num_operands(signature.len())?;
        instruction.require_operand_kinds(signature)?;

        Ok(instruction)
    }

    /// Set the encoded length of the instruction in bytes.
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = length;
        self
    }

    pub fn architecture(&self) -> Architecture {
        self.arch
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Operand at `index`. Decoding guarantees every index of the opcode signature exists.
    pub fn operand(&self, index: usize) -> &Operand {
        &self.operands[index]
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn is_simulatable(&self) -> bool {
        self.opcode.is_simulatable()
    }

    /// Render recorded analysis results for this instruction.
    pub fn annotation(&self, xdata: &InstrXData) -> Result<String> {
        match self.opcode {
            Opcode::Mips(op) => mips::annotation(op, self, xdata),
            Opcode::Arm(op, condition) => arm::annotation(op, condition, self, xdata),
            Opcode::X86(op) => x86::annotation(op, self, xdata),
        }
    }

    /// Execute the instruction located at `iaddr` against the state and describe the effect.
    pub fn simulate(&self, iaddr: u64, state: &mut SimulationState) -> Result<String> {
        match self.opcode {
            Opcode::Mips(op) => mips::simulate(op, self, iaddr, state),
            Opcode::Arm(op, condition) => arm::simulate(op, condition, self, iaddr, state),
            Opcode::X86(op) => x86::simulate(op, self, iaddr, state),
        }
    }

    pub(crate) fn not_simulatable(&self, iaddr: u64) -> Error {
        Error::NotSimulatable {
            iaddr,
            mnemonic: self.mnemonic.clone(),
        }
    }

    /// The fixed target of the operand at `index`.
    pub(crate) fn target(&self, index: usize) -> Result<u64> {
        let operand = self.operand(index);
        operand
            .absolute_address()
            .ok_or_else(|| self.illegal(IllegalInstructionKind::InvalidOperandKind(index)))
    }

    fn illegal(&self, kind: IllegalInstructionKind) -> Error {
        Error::IllegalInstruction {
            mnemonic: self.mnemonic.clone(),
            kind,
        }
    }

    /// Require the instruction to have exactly `num_operands` operands.
    fn require_num_operands(&self, num_operands: usize) -> Result<()> {
        match self.operands.len().cmp(&num_operands) {
            std::cmp::Ordering::Less => Err(self.illegal(IllegalInstructionKind::OperandMissing(
                self.operands.len(),
            ))),
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Greater => Err(self.illegal(
                IllegalInstructionKind::OperandNotPermitted(num_operands),
            )),
        }
    }

    fn require_operand_kinds(&self, signature: &[OperandKind]) -> Result<()> {
        for (index, (kind, operand)) in signature.iter().zip(&self.operands).enumerate() {
            if !kind.accepts(operand) {
                return Err(self.illegal(IllegalInstructionKind::InvalidOperandKind(index)));
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, operand) in self.operands.iter().enumerate() {
            let separator = if i == 0 { " " } else { ", " };
            write!(f, "{separator}{operand}")?;
        }

        Ok(())
    }
}

/// Convert an unresolved data flow computation into a symbol named after the expression.
pub(crate) trait OrSymbol {
    fn or_symbol(self, width: Width) -> Result<Value>;
}

impl OrSymbol for sim_value::Result<Value> {
    fn or_symbol(self, width: Width) -> Result<Value> {
        match self {
            Ok(value) => Ok(value),
            Err(sim_value::Error::Unresolved { expression }) => Ok(Value::symbol(expression, width)),
            Err(err) => Err(err.into()),
        }
    }
}

/// Trace line of an assignment.
pub(crate) fn assignment(location: &Location, value: &Value) -> String {
    format!("{location} := {value}")
}

/// Trace line of a resolved conditional branch.
pub(crate) fn branch(condition: &str, taken: bool, true_target: u64, false_target: u64) -> String {
    let outcome = if taken { "taken" } else { "not taken" };
    format!("if {condition} then goto {true_target:#x} else goto {false_target:#x} ({outcome})")
}

/// Decide a branch condition. Undecidable conditions are errors.
pub(crate) fn decide(iaddr: u64, condition: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| Error::UnresolvableBranch {
        iaddr,
        condition: condition.to_string(),
        reason: Unresolved::Unknown,
    })
}

/// Decide whether two values are equal for a branch. Comparing a stream handle against a
/// nonzero number is reported as not applicable rather than unknown.
pub(crate) fn decide_equal(iaddr: u64, lhs: &Value, rhs: &Value) -> Result<bool> {
    let condition = format!("{lhs} == {rhs}");
    let result = lhs.equals(rhs);
    if result.is_defined() {
        return decide(iaddr, &condition, &result);
    }

    let file_pointer_against_literal = (lhs.is_file_pointer() && rhs.is_literal())
        || (rhs.is_file_pointer() && lhs.is_literal());
    let reason = if file_pointer_against_literal {
        Unresolved::NotApplicable
    } else {
        Unresolved::Unknown
    };

    Err(Error::UnresolvableBranch {
        iaddr,
        condition,
        reason,
    })
}

/// Resolve a computed jump destination to a code address.
pub(crate) fn jump_target(iaddr: u64, value: &Value) -> Result<u64> {
    match value {
        Value::Literal(literal) => Ok(literal.bits()),
        Value::Address(address) if address.region() == &sim_value::RegionId::Global => {
            Ok(address.offset() as u64)
        }
        _ => Err(Error::UnresolvableBranch {
            iaddr,
            condition: format!("goto {value}"),
            reason: Unresolved::Unknown,
        }),
    }
}

/// Compute `lhs op rhs` from the operands at the given indices and store the result.
pub(crate) fn simulate_binary(
    instruction: &Instruction,
    iaddr: u64,
    state: &mut SimulationState,
    op: sim_value::BinaryOp,
    operands: [usize; 3],
) -> Result<(Location, Value)> {
    let [dst, lhs, rhs] = operands;
    let lhs = state.get_rhs(iaddr, instruction.operand(lhs))?;
    let rhs = state.get_rhs(iaddr, instruction.operand(rhs))?;
    let width = lhs.width().unwrap_or(Width::W32);
    let result = lhs.binary(op, &rhs).or_symbol(width)?;
    let location = state.set(iaddr, instruction.operand(dst), result.clone())?;
    Ok((location, result))
}
