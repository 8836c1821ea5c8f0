use std::collections::BTreeMap;

use sim_value::{Address, RegionId, Value, Width};

use crate::arch::Architecture;
use crate::config::{Endianness, SimulatorConfig};
use crate::diagnostics::DiagnosticLog;
use crate::error::{Error, Result};
use crate::image::StaticImage;
use crate::instruction::Instruction;
use crate::mem::{self, BaseMemory, EnvironmentStrings, GlobalMemory, MemoryRegion, StackMemory};
use crate::operand::Operand;
use crate::register::{Register, RegisterInfo};

/// A register or memory location written by an instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Register(Register),
    Memory(Address),
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Register(register) => write!(f, "{register}"),
            Location::Memory(address) => write!(f, "[{address}]"),
        }
    }
}

/// Machine state of a single simulation run: registers, memory regions and the program counter.
#[derive(Debug)]
pub struct SimulationState {
    arch: Architecture,
    endianness: Endianness,
    registers: BTreeMap<Register, Value>,
    stack: StackMemory,
    global: GlobalMemory,
    bases: BTreeMap<String, BaseMemory>,
    program_counter: u64,
    delayed_program_counter: Option<u64>,
    diagnostics: DiagnosticLog,
}

impl SimulationState {
    pub fn new(
        arch: Architecture,
        endianness: Endianness,
        image: impl StaticImage + 'static,
        start: u64,
    ) -> Self {
        Self {
            arch,
            endianness,
            registers: Default::default(),
            stack: StackMemory::new(endianness),
            global: GlobalMemory::new(endianness, image),
            bases: Default::default(),
            program_counter: start,
            delayed_program_counter: None,
            diagnostics: Default::default(),
        }
    }

    pub fn from_config(
        config: &SimulatorConfig,
        image: impl StaticImage + 'static,
        start: u64,
    ) -> Self {
        let mut state = Self::new(config.arch, config.endianness, image, start)
            .with_patched_globals(config.patched_globals.clone());
        if !config.environment.is_empty() {
            state.stack = StackMemory::new(config.endianness)
                .with_environment(EnvironmentStrings::new(config.environment.iter()));
        }

        state
    }

    pub fn with_patched_globals(mut self, patches: BTreeMap<String, String>) -> Self {
        self.global = self.global.with_patched_globals(patches);
        self
    }

    pub fn with_stack_environment(
        mut self,
        environment: impl mem::StackEnvironment + 'static,
    ) -> Self {
        self.stack = StackMemory::new(self.endianness).with_environment(environment);
        self
    }

    pub fn architecture(&self) -> Architecture {
        self.arch
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn is_big_endian(&self) -> bool {
        self.endianness.is_big()
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn add_diagnostic(&mut self, category: &'static str, message: impl Into<String>) {
        self.diagnostics.add(category, message);
    }

    pub fn stack_memory(&self) -> &StackMemory {
        &self.stack
    }

    pub fn global_memory(&self) -> &GlobalMemory {
        &self.global
    }

    pub fn base_memory(&self, name: &str) -> Option<&BaseMemory> {
        self.bases.get(name)
    }

    /// Simulate the instruction at the current program counter.
    pub fn step(&mut self, instruction: &Instruction) -> Result<String> {
        let iaddr = self.program_counter;
        instruction.simulate(iaddr, self)
    }

    // Program counter

    pub fn program_counter(&self) -> u64 {
        self.program_counter
    }

    pub fn delayed_program_counter(&self) -> Option<u64> {
        self.delayed_program_counter
    }

    /// Advance past an instruction of `length` bytes. A pending delayed target replaces the
    /// fallthrough address.
    pub fn increment_program_counter(&mut self, length: u64) {
        self.program_counter = match self.delayed_program_counter.take() {
            Some(target) => target,
            None => self.program_counter.wrapping_add(length),
        };
    }

    /// Jump immediately, discarding any pending delayed target.
    pub fn set_program_counter(&mut self, target: u64) {
        self.delayed_program_counter = None;
        self.program_counter = target;
    }

    /// Jump after the next instruction completes.
    pub fn set_delayed_program_counter(&mut self, target: u64) {
        self.delayed_program_counter = Some(target);
    }

    // Registers

    /// Current value of a register. Registers never written hold their initial value.
    pub fn register_value(&self, register: Register) -> Value {
        if register.is_hardwired_zero() {
            return Value::literal(0, Width::W32);
        }

        self.registers
            .get(&register)
            .cloned()
            .unwrap_or_else(|| initial_register_value(register))
    }

    pub fn set_register(&mut self, register: Register, value: Value) {
        if !register.is_hardwired_zero() {
            self.registers.insert(register, value);
        }
    }

    // Memory

    /// Create a dynamically allocated region and return its start address.
    pub fn allocate_base(&mut self, name: impl Into<String>, buffer_size: Option<usize>) -> Address {
        let name = name.into();
        let memory = BaseMemory::new(name.clone(), self.endianness, buffer_size);
        self.add_diagnostic("base memory", format!("allocated {name}"));
        self.bases.insert(name.clone(), memory);
        Address::base(name, 0)
    }

    pub fn free_base(&mut self, name: &str) -> Result<()> {
        let memory = self.bases.get_mut(name).ok_or_else(|| Error::UnknownRegion {
            region: RegionId::Base(name.to_string()),
        })?;
        memory.free();
        self.diagnostics.add("base memory", format!("freed {name}"));
        Ok(())
    }

    fn region(&mut self, address: &Address) -> Result<&mut dyn MemoryRegion> {
        match address.region() {
            RegionId::Stack => Ok(&mut self.stack as &mut dyn MemoryRegion),
            RegionId::Global => Ok(&mut self.global as &mut dyn MemoryRegion),
            RegionId::Base(name) => match self.bases.get_mut(name) {
                Some(memory) => Ok(memory as &mut dyn MemoryRegion),
                None => Err(Error::UnknownRegion {
                    region: address.region().clone(),
                }),
            },
            RegionId::File(_) | RegionId::Constant(_) => Err(mem::Error::NotDereferenceable {
                address: address.clone(),
            }
            .into()),
        }
    }

    /// Read `size` from memory at `address`.
    pub fn read_memory(&mut self, iaddr: u64, address: &Address, size: Width) -> Result<Value> {
        if let RegionId::Constant(text) = address.region() {
            return Ok(mem::read_constant(
                text,
                address,
                size.bytes(),
                self.endianness,
            )?);
        }

        let mut log = std::mem::take(&mut self.diagnostics);
        let result = self
            .region(address)
            .and_then(|region| Ok(region.get(&mut log, iaddr, address, size.bytes())?));
        self.diagnostics = log;
        result
    }

    /// Write `value` to memory at `address` and describe the effect.
    pub fn write_memory(&mut self, iaddr: u64, address: &Address, value: &Value) -> Result<String> {
        let mut log = std::mem::take(&mut self.diagnostics);
        let result = self
            .region(address)
            .and_then(|region| Ok(region.set(&mut log, iaddr, address, value)?));
        self.diagnostics = log;
        result
    }

    // Operands

    /// Value an operand evaluates to when used as a source.
    pub fn get_rhs(&mut self, iaddr: u64, operand: &Operand) -> Result<Value> {
        match operand {
            Operand::Register(register) if register.is_program_counter() => Ok(Value::literal(
                iaddr.wrapping_add(self.arch.program_counter_read_offset()),
                Width::W32,
            )),
            Operand::Register(register) => Ok(self.register_value(*register)),
            Operand::Immediate(literal) => Ok(Value::Literal(*literal)),
            Operand::Absolute { address, size } => {
                self.read_memory(iaddr, &Address::global(*address), *size)
            }
            Operand::Indirect { size, .. } => match self.effective_address(iaddr, operand)? {
                Value::Address(address) => self.read_memory(iaddr, &address, *size),
                unknown => Ok(Value::symbol(format!("[{unknown}]"), *size)),
            },
            Operand::RegisterList(_) => Err(invalid_operand(iaddr, operand, "a value")),
        }
    }

    /// Location an operand designates when used as a destination.
    pub fn get_lhs(&mut self, iaddr: u64, operand: &Operand) -> Result<Location> {
        match operand {
            Operand::Register(register) => Ok(Location::Register(*register)),
            Operand::Absolute { address, .. } => Ok(Location::Memory(Address::global(*address))),
            Operand::Indirect { .. } => match self.effective_address(iaddr, operand)? {
                Value::Address(address) => Ok(Location::Memory(address)),
                unknown => Err(Error::SymbolicEscalation {
                    iaddr,
                    expression: format!("[{unknown}]"),
                }),
            },
            Operand::Immediate(_) | Operand::RegisterList(_) => {
                Err(invalid_operand(iaddr, operand, "a location"))
            }
        }
    }

    /// Address computed by a memory operand, without accessing memory. Literal results are
    /// treated as global addresses.
    pub fn effective_address(&mut self, iaddr: u64, operand: &Operand) -> Result<Value> {
        match operand {
            Operand::Absolute { address, .. } => Ok(Value::Address(Address::global(*address))),
            Operand::Indirect { base, offset, .. } => {
                let base_value = self.get_rhs(iaddr, &Operand::Register(*base))?;
                let displaced = match &base_value {
                    Value::Address(address) => Value::Address(address.add_offset(*offset)),
                    Value::Literal(literal) => Value::Address(Address::global(
                        (literal.bits() as i64).wrapping_add(*offset) as u64 & Width::W32.mask(),
                    )),
                    Value::Symbol(symbol) if *offset == 0 => Value::Symbol(symbol.clone()),
                    other => Value::symbol(format!("{other} + {offset:#x}"), Width::W32),
                };
                Ok(displaced)
            }
            _ => Err(invalid_operand(iaddr, operand, "a memory operand")),
        }
    }

    /// Store `value` into a location.
    pub fn write_location(&mut self, iaddr: u64, location: &Location, value: Value) -> Result<()> {
        match location {
            Location::Register(register) => {
                self.set_register(*register, value);
                Ok(())
            }
            Location::Memory(address) => {
                self.write_memory(iaddr, address, &value)?;
                Ok(())
            }
        }
    }

    /// Store `value` into the location designated by `operand`.
    pub fn set(&mut self, iaddr: u64, operand: &Operand, value: Value) -> Result<Location> {
        let location = self.get_lhs(iaddr, operand)?;
        let value = match operand {
            Operand::Indirect { size, .. } | Operand::Absolute { size, .. } => value.truncate(*size)?,
            _ => value,
        };
        self.write_location(iaddr, &location, value)?;
        Ok(location)
    }
}

/// Value of a register before it is first written.
fn initial_register_value(register: Register) -> Value {
    if register.is_stack_pointer() {
        Value::Address(Address::stack(0))
    } else {
        Value::symbol(format!("{register}_in"), Width::W32)
    }
}

fn invalid_operand(iaddr: u64, operand: &Operand, expected: &'static str) -> Error {
    Error::InvalidOperand {
        iaddr,
        operand: operand.to_string(),
        expected,
    }
}
