use crate::arch::Architecture;

/// Role flags shared by the registers of every architecture.
pub trait RegisterInfo {
    fn is_stack_pointer(&self) -> bool;

    /// Position of the register in the calling convention argument list.
    fn argument_index(&self) -> Option<usize> {
        None
    }

    fn is_argument_register(&self) -> bool {
        self.argument_index().is_some()
    }

    fn is_floating_point(&self) -> bool {
        false
    }

    fn is_return_address(&self) -> bool {
        false
    }

    fn is_program_counter(&self) -> bool {
        false
    }

    /// Reads always produce zero and writes are discarded.
    fn is_hardwired_zero(&self) -> bool {
        false
    }
}

macro_rules! register_set {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|register| register.name().eq_ignore_ascii_case(name))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

register_set!(
    /// MIPS32 general purpose and floating point registers.
    MipsRegister {
        Zero => "zero", At => "at", V0 => "v0", V1 => "v1",
        A0 => "a0", A1 => "a1", A2 => "a2", A3 => "a3",
        T0 => "t0", T1 => "t1", T2 => "t2", T3 => "t3",
        T4 => "t4", T5 => "t5", T6 => "t6", T7 => "t7",
        S0 => "s0", S1 => "s1", S2 => "s2", S3 => "s3",
        S4 => "s4", S5 => "s5", S6 => "s6", S7 => "s7",
        T8 => "t8", T9 => "t9", K0 => "k0", K1 => "k1",
        Gp => "gp", Sp => "sp", Fp => "fp", Ra => "ra",
        Hi => "hi", Lo => "lo",
        F0 => "f0", F1 => "f1", F2 => "f2", F3 => "f3",
        F4 => "f4", F5 => "f5", F6 => "f6", F7 => "f7",
        F8 => "f8", F9 => "f9", F10 => "f10", F11 => "f11",
        F12 => "f12", F13 => "f13", F14 => "f14", F15 => "f15",
        F16 => "f16", F17 => "f17", F18 => "f18", F19 => "f19",
        F20 => "f20", F21 => "f21", F22 => "f22", F23 => "f23",
        F24 => "f24", F25 => "f25", F26 => "f26", F27 => "f27",
        F28 => "f28", F29 => "f29", F30 => "f30", F31 => "f31",
    }
);

impl MipsRegister {
    /// Register with the given hardware number, such as `29` for `sp`.
    pub fn from_number(number: usize) -> Option<Self> {
        Self::ALL.get(number).copied().filter(|register| {
            !register.is_floating_point() && !matches!(register, Self::Hi | Self::Lo)
        })
    }
}

impl RegisterInfo for MipsRegister {
    fn is_stack_pointer(&self) -> bool {
        matches!(self, MipsRegister::Sp)
    }

    fn argument_index(&self) -> Option<usize> {
        match self {
            MipsRegister::A0 => Some(0),
            MipsRegister::A1 => Some(1),
            MipsRegister::A2 => Some(2),
            MipsRegister::A3 => Some(3),
            _ => None,
        }
    }

    fn is_floating_point(&self) -> bool {
        *self >= MipsRegister::F0
    }

    fn is_return_address(&self) -> bool {
        matches!(self, MipsRegister::Ra)
    }

    fn is_hardwired_zero(&self) -> bool {
        matches!(self, MipsRegister::Zero)
    }
}

register_set!(
    /// ARM (A32) core registers.
    ArmRegister {
        R0 => "r0", R1 => "r1", R2 => "r2", R3 => "r3",
        R4 => "r4", R5 => "r5", R6 => "r6", R7 => "r7",
        R8 => "r8", R9 => "r9", R10 => "r10", R11 => "r11",
        R12 => "r12", Sp => "sp", Lr => "lr", Pc => "pc",
        S0 => "s0", S1 => "s1", S2 => "s2", S3 => "s3",
        D0 => "d0", D1 => "d1", D2 => "d2", D3 => "d3",
    }
);

impl RegisterInfo for ArmRegister {
    fn is_stack_pointer(&self) -> bool {
        matches!(self, ArmRegister::Sp)
    }

    fn argument_index(&self) -> Option<usize> {
        match self {
            ArmRegister::R0 => Some(0),
            ArmRegister::R1 => Some(1),
            ArmRegister::R2 => Some(2),
            ArmRegister::R3 => Some(3),
            _ => None,
        }
    }

    fn is_floating_point(&self) -> bool {
        *self >= ArmRegister::S0
    }

    fn is_return_address(&self) -> bool {
        matches!(self, ArmRegister::Lr)
    }

    fn is_program_counter(&self) -> bool {
        matches!(self, ArmRegister::Pc)
    }
}

register_set!(
    /// x86 32-bit general purpose registers.
    X86Register {
        Eax => "eax", Ecx => "ecx", Edx => "edx", Ebx => "ebx",
        Esp => "esp", Ebp => "ebp", Esi => "esi", Edi => "edi",
        Eip => "eip",
    }
);

impl RegisterInfo for X86Register {
    fn is_stack_pointer(&self) -> bool {
        matches!(self, X86Register::Esp)
    }

    fn is_program_counter(&self) -> bool {
        matches!(self, X86Register::Eip)
    }
}

/// A register of any supported architecture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    Mips(MipsRegister),
    Arm(ArmRegister),
    X86(X86Register),
}

impl Register {
    /// Look up a register by name. MIPS names may carry a `$` prefix.
    pub fn parse(arch: Architecture, name: &str) -> Option<Self> {
        match arch {
            Architecture::Mips => {
                let name = name.strip_prefix('$').unwrap_or(name);
                MipsRegister::from_name(name)
                    .or_else(|| name.parse().ok().and_then(MipsRegister::from_number))
                    .map(Register::Mips)
            }
            Architecture::Arm => ArmRegister::from_name(name).map(Register::Arm),
            Architecture::X86 => X86Register::from_name(name).map(Register::X86),
        }
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            Register::Mips(_) => Architecture::Mips,
            Register::Arm(_) => Architecture::Arm,
            Register::X86(_) => Architecture::X86,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Register::Mips(register) => register.name(),
            Register::Arm(register) => register.name(),
            Register::X86(register) => register.name(),
        }
    }

    fn info(&self) -> &dyn RegisterInfo {
        match self {
            Register::Mips(register) => register,
            Register::Arm(register) => register,
            Register::X86(register) => register,
        }
    }
}

impl RegisterInfo for Register {
    fn is_stack_pointer(&self) -> bool {
        self.info().is_stack_pointer()
    }

    fn argument_index(&self) -> Option<usize> {
        self.info().argument_index()
    }

    fn is_floating_point(&self) -> bool {
        self.info().is_floating_point()
    }

    fn is_return_address(&self) -> bool {
        self.info().is_return_address()
    }

    fn is_program_counter(&self) -> bool {
        self.info().is_program_counter()
    }

    fn is_hardwired_zero(&self) -> bool {
        self.info().is_hardwired_zero()
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<MipsRegister> for Register {
    fn from(register: MipsRegister) -> Self {
        Register::Mips(register)
    }
}

impl From<ArmRegister> for Register {
    fn from(register: ArmRegister) -> Self {
        Register::Arm(register)
    }
}

impl From<X86Register> for Register {
    fn from(register: X86Register) -> Self {
        Register::X86(register)
    }
}
