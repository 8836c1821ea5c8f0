use crate::{BinaryOp, Error, IntegerOps, Literal, Result, Width};

/// Identifies the memory region an [Address] points into.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionId {
    /// The stack of the simulated process.
    Stack,

    /// Global data backed by the static image.
    Global,

    /// A dynamically allocated buffer identified by name.
    Base(String),

    /// An opaque stream handle, such as the result of opening a file. Never dereferenced.
    File(String),

    /// Constant data such as a string literal. The id carries the constant text.
    Constant(String),
}

impl RegionId {
    /// Whether memory behind this region is modelled byte by byte.
    pub fn is_memory(&self) -> bool {
        matches!(self, RegionId::Stack | RegionId::Global | RegionId::Base(_))
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionId::Stack => write!(f, "stack"),
            RegionId::Global => write!(f, "global"),
            RegionId::Base(name) => write!(f, "{name}"),
            RegionId::File(name) => write!(f, "file:{name}"),
            RegionId::Constant(text) => write!(f, "{text:?}"),
        }
    }
}

/// An offset into a specific memory region.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    region: RegionId,
    offset: i64,
    width: Width,
}

impl Address {
    /// Width of addresses created by the convenience constructors.
    pub const DEFAULT_WIDTH: Width = Width::W32;

    pub fn new(region: RegionId, offset: i64, width: Width) -> Self {
        Self {
            region,
            offset,
            width,
        }
    }

    pub fn stack(offset: i64) -> Self {
        Self::new(RegionId::Stack, offset, Self::DEFAULT_WIDTH)
    }

    pub fn global(offset: u64) -> Self {
        Self::new(RegionId::Global, offset as i64, Self::DEFAULT_WIDTH)
    }

    pub fn base(name: impl Into<String>, offset: i64) -> Self {
        Self::new(RegionId::Base(name.into()), offset, Self::DEFAULT_WIDTH)
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(RegionId::File(name.into()), 0, Self::DEFAULT_WIDTH)
    }

    pub fn constant_string(text: impl Into<String>) -> Self {
        Self::new(RegionId::Constant(text.into()), 0, Self::DEFAULT_WIDTH)
    }

    pub fn region(&self) -> &RegionId {
        &self.region
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn with_width(self, width: Width) -> Self {
        Self { width, ..self }
    }

    /// Address at a signed displacement within the same region.
    pub fn add_offset(&self, displacement: i64) -> Self {
        Self {
            region: self.region.clone(),
            offset: self.offset.wrapping_add(displacement),
            width: self.width,
        }
    }

    /// Position of the address within an aligned 4-byte word.
    pub fn alignment(&self) -> usize {
        self.offset.rem_euclid(4) as usize
    }

    pub fn is_string_address(&self) -> bool {
        matches!(self.region, RegionId::Constant(_))
    }

    pub fn is_file_pointer(&self) -> bool {
        matches!(self.region, RegionId::File(_))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let magnitude = self.offset.unsigned_abs();
        let sign = if self.offset < 0 { "-" } else { "" };
        match &self.region {
            RegionId::Global => write!(f, "{sign}{magnitude:#x}"),
            RegionId::File(_) => write!(f, "{}", self.region),
            RegionId::Constant(_) if self.offset == 0 => write!(f, "&{}", self.region),
            RegionId::Constant(_) => write!(f, "&{}+{sign}{magnitude:#x}", self.region),
            _ => write!(f, "{}:{sign}{magnitude:#x}", self.region),
        }
    }
}

/// A value whose bits are unknown. The name records how it was derived from known operands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    name: String,
    width: Width,
}

impl Symbol {
    pub fn new(name: impl Into<String>, width: Width) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> Width {
        self.width
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Content of a register or memory location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Literal(Literal),
    Address(Address),
    Symbol(Symbol),

    /// Result of a comparison that could not be decided.
    UndefinedBoolean,
}

impl Value {
    pub const TRUE: Value = Value::Literal(Literal::new(1, Width::W32));
    pub const FALSE: Value = Value::Literal(Literal::new(0, Width::W32));

    pub fn literal(bits: u64, width: Width) -> Self {
        Value::Literal(Literal::new(bits, width))
    }

    pub fn symbol(name: impl Into<String>, width: Width) -> Self {
        Value::Symbol(Symbol::new(name, width))
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Value::Literal(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn is_address(&self) -> bool {
        matches!(self, Value::Address(_))
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Value::UndefinedBoolean)
    }

    pub fn is_string_address(&self) -> bool {
        matches!(self, Value::Address(address) if address.is_string_address())
    }

    pub fn is_file_pointer(&self) -> bool {
        matches!(self, Value::Address(address) if address.is_file_pointer())
    }

    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Value::Literal(literal) => Some(*literal),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Value::Address(address) => Some(address),
            _ => None,
        }
    }

    /// Truth value of a decided condition. Any nonzero literal is true.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_literal().map(|literal| literal.bits() != 0)
    }

    /// Width of the value, if it has one. The undefined boolean has no width.
    pub fn width(&self) -> Option<Width> {
        match self {
            Value::Literal(literal) => Some(literal.width()),
            Value::Address(address) => Some(address.width()),
            Value::Symbol(symbol) => Some(symbol.width()),
            Value::UndefinedBoolean => None,
        }
    }

    pub fn num_bytes(&self) -> Option<usize> {
        self.width().map(Width::bytes)
    }

    pub fn and(&self, rhs: &Value) -> Result<Value> {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(&self, rhs: &Value) -> Result<Value> {
        self.binary(BinaryOp::Or, rhs)
    }

    pub fn xor(&self, rhs: &Value) -> Result<Value> {
        self.binary(BinaryOp::Xor, rhs)
    }

    pub fn add(&self, rhs: &Value) -> Result<Value> {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn subtract(&self, rhs: &Value) -> Result<Value> {
        self.binary(BinaryOp::Subtract, rhs)
    }

    pub fn shift_left(&self, amount: &Value) -> Result<Value> {
        self.binary(BinaryOp::ShiftLeft, amount)
    }

    pub fn unsigned_shift_right(&self, amount: &Value) -> Result<Value> {
        self.binary(BinaryOp::UnsignedShiftRight, amount)
    }

    pub fn signed_shift_right(&self, amount: &Value) -> Result<Value> {
        self.binary(BinaryOp::SignedShiftRight, amount)
    }

    /// Apply a binary operator. Two literals compute concretely; a literal combined with a
    /// symbol yields a new symbol naming the operation; address arithmetic stays within the
    /// address region. Every other combination is unresolved and left to the caller.
    pub fn binary(&self, op: BinaryOp, rhs: &Value) -> Result<Value> {
        match (self, rhs) {
            (Value::Literal(lhs), Value::Literal(rhs)) => Ok(Value::Literal(op.apply(*lhs, *rhs))),
            (Value::Address(address), Value::Literal(literal)) => match op {
                BinaryOp::Add => Ok(Value::Address(address.add_offset(literal.signed_value()))),
                BinaryOp::Subtract => Ok(Value::Address(
                    address.add_offset(literal.signed_value().wrapping_neg()),
                )),
                _ => Err(self.unresolved(op, rhs)),
            },
            (Value::Literal(literal), Value::Address(address)) if op == BinaryOp::Add => {
                Ok(Value::Address(address.add_offset(literal.signed_value())))
            }
            (Value::Address(lhs), Value::Address(rhs_address))
                if op == BinaryOp::Subtract && lhs.region() == rhs_address.region() =>
            {
                Ok(Value::literal(
                    lhs.offset().wrapping_sub(rhs_address.offset()) as u64,
                    lhs.width(),
                ))
            }
            (Value::Symbol(symbol), Value::Literal(literal)) => Ok(Value::symbol(
                format!("{symbol} {op} {literal}"),
                symbol.width(),
            )),
            (Value::Literal(literal), Value::Symbol(symbol)) => {
                let name = if op.is_commutative() {
                    format!("{symbol} {op} {literal}")
                } else {
                    format!("{literal} {op} {symbol}")
                };
                Ok(Value::symbol(name, literal.width()))
            }
            _ => Err(self.unresolved(op, rhs)),
        }
    }

    fn unresolved(&self, op: BinaryOp, rhs: &Value) -> Error {
        Error::Unresolved {
            expression: format!("{self} {op} {rhs}"),
        }
    }

    /// Bitwise negation. Symbols are negated textually.
    pub fn not(&self) -> Result<Value> {
        match self {
            Value::Literal(literal) => Ok(Value::Literal(!*literal)),
            Value::Symbol(symbol) => Ok(Value::symbol(format!("~{symbol}"), symbol.width())),
            _ => Err(Error::Unresolved {
                expression: format!("~{self}"),
            }),
        }
    }

    /// Equality test. Undecidable comparisons produce [Value::UndefinedBoolean].
    pub fn equals(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Literal(lhs), Value::Literal(rhs)) => Value::from_bool(lhs.equals(*rhs)),
            (Value::Address(lhs), Value::Address(rhs)) if lhs.region() == rhs.region() => {
                Value::from_bool(lhs.offset() == rhs.offset())
            }
            (Value::Address(address), Value::Literal(literal))
            | (Value::Literal(literal), Value::Address(address)) => {
                // Constant data is never at address zero, nor is any modelled region
                if address.is_string_address() || literal.bits() == 0 {
                    Value::FALSE
                } else {
                    Value::UndefinedBoolean
                }
            }
            _ => Value::UndefinedBoolean,
        }
    }

    pub fn not_equals(&self, rhs: &Value) -> Value {
        self.equals(rhs).negate()
    }

    pub fn unsigned_less_than(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Literal(lhs), Value::Literal(rhs)) => {
                Value::from_bool(lhs.unsigned_less_than(*rhs))
            }
            (Value::Address(lhs), Value::Address(rhs)) if lhs.region() == rhs.region() => {
                Value::from_bool(lhs.offset() < rhs.offset())
            }
            _ => Value::UndefinedBoolean,
        }
    }

    pub fn signed_less_than(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Literal(lhs), Value::Literal(rhs)) => {
                Value::from_bool(lhs.signed_less_than(*rhs))
            }
            (Value::Address(lhs), Value::Address(rhs)) if lhs.region() == rhs.region() => {
                Value::from_bool(lhs.offset() < rhs.offset())
            }
            _ => Value::UndefinedBoolean,
        }
    }

    /// Whether the value, interpreted as a signed integer, is at least zero.
    pub fn is_non_negative(&self) -> Value {
        match self {
            Value::Literal(literal) => Value::from_bool(literal.signed_value() >= 0),
            _ => Value::UndefinedBoolean,
        }
    }

    pub fn is_negative(&self) -> Value {
        self.is_non_negative().negate()
    }

    /// Logical negation of a decided condition. The undefined boolean stays undefined.
    pub fn negate(&self) -> Value {
        match self.as_bool() {
            Some(value) => Value::from_bool(!value),
            None => Value::UndefinedBoolean,
        }
    }

    pub fn zero_extend(&self, width: Width) -> Result<Value> {
        match self {
            Value::Literal(literal) => Ok(Value::Literal(literal.zero_extend(width))),
            Value::Symbol(symbol) => Ok(Value::symbol(symbol.name(), width)),
            _ => Err(Error::Unresolved {
                expression: format!("zext{width}({self})"),
            }),
        }
    }

    pub fn sign_extend(&self, width: Width) -> Result<Value> {
        match self {
            Value::Literal(literal) => Ok(Value::Literal(literal.sign_extend(width))),
            Value::Symbol(symbol) => Ok(Value::symbol(symbol.name(), width)),
            _ => Err(Error::Unresolved {
                expression: format!("sext{width}({self})"),
            }),
        }
    }

    /// Keep the least significant bits fitting `width`. Truncated symbols and addresses become
    /// symbols naming the truncation.
    pub fn truncate(&self, width: Width) -> Result<Value> {
        match self {
            Value::Literal(literal) => Ok(Value::Literal(literal.truncate(width))),
            Value::Symbol(symbol) if symbol.width() <= width => Ok(self.clone()),
            Value::Address(address) if address.width() <= width => Ok(self.clone()),
            Value::Symbol(_) | Value::Address(_) => {
                Ok(Value::symbol(format!("lsb{width}({self})"), width))
            }
            Value::UndefinedBoolean => Err(Error::Unresolved {
                expression: format!("lsb{width}({self})"),
            }),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Literal(literal) => write!(f, "{literal}"),
            Value::Address(address) => write!(f, "{address}"),
            Value::Symbol(symbol) => write!(f, "{symbol}"),
            Value::UndefinedBoolean => write!(f, "?"),
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Value::Literal(literal)
    }
}

impl From<Address> for Value {
    fn from(address: Address) -> Self {
        Value::Address(address)
    }
}

impl From<Symbol> for Value {
    fn from(symbol: Symbol) -> Self {
        Value::Symbol(symbol)
    }
}

impl TryFrom<Value> for Literal {
    type Error = Error;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        value.as_literal().ok_or_else(|| Error::Conversion {
            value: value.to_string(),
            target: "Literal",
        })
    }
}
