use sim_value::{Literal, Width};

use crate::register::Register;

/// An operand of a decoded instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Register(Register),

    /// Immediate value, already sign or zero extended by the decoder.
    Immediate(Literal),

    /// A fixed address. Used both for direct references to global memory and for branch targets.
    Absolute { address: u64, size: Width },

    /// Memory at a signed displacement from the value of a base register.
    Indirect {
        base: Register,
        offset: i64,
        size: Width,
    },

    RegisterList(Vec<Register>),
}

impl Operand {
    pub fn register(register: impl Into<Register>) -> Self {
        Operand::Register(register.into())
    }

    /// 32-bit immediate.
    pub fn imm(value: u32) -> Self {
        Operand::Immediate(value.into())
    }

    /// 32-bit immediate from a signed value.
    pub fn simm(value: i32) -> Self {
        Operand::Immediate(Literal::new(value as u32 as u64, Width::W32))
    }

    pub fn absolute(address: u64) -> Self {
        Operand::Absolute {
            address,
            size: Width::W32,
        }
    }

    /// A word of memory at `offset` from `base`.
    pub fn indirect(base: impl Into<Register>, offset: i64) -> Self {
        Operand::Indirect {
            base: base.into(),
            offset,
            size: Width::W32,
        }
    }

    pub fn register_list(registers: impl IntoIterator<Item = impl Into<Register>>) -> Self {
        Operand::RegisterList(registers.into_iter().map(Into::into).collect())
    }

    /// Set the access size of a memory operand. Other operands are returned unchanged.
    pub fn with_size(self, width: Width) -> Self {
        match self {
            Operand::Absolute { address, .. } => Operand::Absolute {
                address,
                size: width,
            },
            Operand::Indirect { base, offset, .. } => Operand::Indirect {
                base,
                offset,
                size: width,
            },
            operand => operand,
        }
    }

    pub fn is_register(&self) -> bool {
        matches!(self, Operand::Register(_))
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, Operand::Immediate(_))
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Absolute { .. } | Operand::Indirect { .. })
    }

    pub fn as_register(&self) -> Option<Register> {
        match self {
            Operand::Register(register) => Some(*register),
            _ => None,
        }
    }

    /// The target of a control flow operand.
    pub fn absolute_address(&self) -> Option<u64> {
        match self {
            Operand::Absolute { address, .. } => Some(*address),
            _ => None,
        }
    }

    /// Width of the data accessed through the operand. Register lists have no single width.
    pub fn size(&self) -> Option<Width> {
        match self {
            Operand::Register(_) => Some(Width::W32),
            Operand::Immediate(literal) => Some(literal.width()),
            Operand::Absolute { size, .. } | Operand::Indirect { size, .. } => Some(*size),
            Operand::RegisterList(_) => None,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Register(register) => write!(f, "{register}"),
            Operand::Immediate(literal) => write!(f, "{literal}"),
            Operand::Absolute { address, .. } => write!(f, "{address:#x}"),
            Operand::Indirect { base, offset, .. } => {
                let sign = if *offset < 0 { "-" } else { "" };
                write!(f, "{sign}{:#x}({base})", offset.unsigned_abs())
            }
            Operand::RegisterList(registers) => {
                let names = registers
                    .iter()
                    .map(Register::name)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{names}}}")
            }
        }
    }
}

impl From<Register> for Operand {
    fn from(register: Register) -> Self {
        Operand::Register(register)
    }
}
