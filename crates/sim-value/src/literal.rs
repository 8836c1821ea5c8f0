use crate::{Error, IntegerOps};

/// Number of bits held by a value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub const fn bits(self) -> u32 {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }

    pub const fn bytes(self) -> usize {
        (self.bits() / u8::BITS) as usize
    }

    /// Mask selecting the valid bits of a value of this width.
    pub const fn mask(self) -> u64 {
        u64::MAX >> (u64::BITS - self.bits())
    }

    /// The width occupying exactly `num_bytes` bytes, if one exists.
    pub fn from_bytes(num_bytes: usize) -> Option<Self> {
        match num_bytes {
            1 => Some(Width::W8),
            2 => Some(Width::W16),
            4 => Some(Width::W32),
            8 => Some(Width::W64),
            _ => None,
        }
    }
}

impl std::fmt::Display for Width {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// A concrete value with a declared bit width. Bits beyond the width are always zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    bits: u64,
    width: Width,
}

impl Literal {
    pub const fn new(bits: u64, width: Width) -> Self {
        Self {
            bits: bits & width.mask(),
            width,
        }
    }

    pub const fn zero(width: Width) -> Self {
        Self::new(0, width)
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn num_bytes(&self) -> usize {
        self.width.bytes()
    }

    /// The bits interpreted as a twos complement integer of this width.
    pub fn signed_value(&self) -> i64 {
        let unused = u64::BITS - self.width.bits();
        ((self.bits << unused) as i64) >> unused
    }

    fn map(&self, f: impl Fn(u64) -> u64) -> Self {
        Self::new(f(self.bits), self.width)
    }

    /// Byte of the given significance, where `0` is the least significant byte.
    pub fn byte(&self, index: usize) -> u8 {
        if index >= self.num_bytes() {
            return 0;
        }

        (self.bits >> (index * 8)) as u8
    }

    /// Replace the byte of the given significance. Indices beyond the width are ignored.
    pub fn with_byte(self, index: usize, byte: u8) -> Self {
        if index >= self.num_bytes() {
            return self;
        }

        let shift = index * 8;
        self.map(|bits| (bits & !(0xff << shift)) | (u64::from(byte) << shift))
    }

    /// Build a literal from bytes ordered least significant first. The number of bytes must match
    /// one of the supported widths.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        let width = Width::from_bytes(bytes.len())?;
        let bits = bytes
            .iter()
            .rev()
            .fold(0u64, |bits, &byte| (bits << 8) | u64::from(byte));
        Some(Self::new(bits, width))
    }

    /// Bytes of the value ordered least significant first.
    pub fn into_le_bytes(self) -> impl ExactSizeIterator<Item = u8> {
        self.bits.to_le_bytes().into_iter().take(self.num_bytes())
    }

    pub fn zero_extend(self, width: Width) -> Self {
        Self::new(self.bits, width)
    }

    pub fn sign_extend(self, width: Width) -> Self {
        Self::new(self.signed_value() as u64, width)
    }

    /// Reduce to the least significant bits fitting `width`.
    pub fn truncate(self, width: Width) -> Self {
        Self::new(self.bits, width)
    }

    /// Reinterpret `rhs` at the width of `self`.
    fn coerce(&self, rhs: Literal) -> u64 {
        rhs.bits & self.width.mask()
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.bits)
    }
}

impl std::ops::BitAnd for Literal {
    type Output = Literal;

    fn bitand(self, rhs: Self) -> Self::Output {
        let rhs = self.coerce(rhs);
        self.map(|bits| bits & rhs)
    }
}

impl std::ops::BitOr for Literal {
    type Output = Literal;

    fn bitor(self, rhs: Self) -> Self::Output {
        let rhs = self.coerce(rhs);
        self.map(|bits| bits | rhs)
    }
}

impl std::ops::BitXor for Literal {
    type Output = Literal;

    fn bitxor(self, rhs: Self) -> Self::Output {
        let rhs = self.coerce(rhs);
        self.map(|bits| bits ^ rhs)
    }
}

impl std::ops::Not for Literal {
    type Output = Literal;

    fn not(self) -> Self::Output {
        self.map(|bits| !bits)
    }
}

impl IntegerOps for Literal {
    fn add(self, rhs: Self) -> Self {
        let rhs = self.coerce(rhs);
        self.map(|bits| bits.wrapping_add(rhs))
    }

    fn subtract(self, rhs: Self) -> Self {
        let rhs = self.coerce(rhs);
        self.map(|bits| bits.wrapping_sub(rhs))
    }

    fn shift_left(self, amount: u32) -> Self {
        if amount >= self.width.bits() {
            return Self::zero(self.width);
        }

        self.map(|bits| bits << amount)
    }

    fn unsigned_shift_right(self, amount: u32) -> Self {
        if amount >= self.width.bits() {
            return Self::zero(self.width);
        }

        self.map(|bits| bits >> amount)
    }

    fn signed_shift_right(self, amount: u32) -> Self {
        let amount = amount.min(self.width.bits() - 1);
        Self::new((self.signed_value() >> amount) as u64, self.width)
    }

    // Bits beyond the width are zero, so comparing them compares the zero extended values
    fn equals(self, rhs: Self) -> bool {
        self.bits == rhs.bits
    }

    fn unsigned_less_than(self, rhs: Self) -> bool {
        self.bits < rhs.bits
    }

    fn signed_less_than(self, rhs: Self) -> bool {
        self.signed_value() < rhs.signed_value()
    }
}

macro_rules! impl_from_value {
    ($type:ty, $width:expr) => {
        impl From<$type> for Literal {
            fn from(value: $type) -> Self {
                Literal::new(value.into(), $width)
            }
        }

        impl TryFrom<Literal> for $type {
            type Error = Error;

            fn try_from(value: Literal) -> Result<Self, Self::Error> {
                <$type>::try_from(value.bits()).map_err(|_| Error::Conversion {
                    value: value.to_string(),
                    target: stringify!($type),
                })
            }
        }
    };
}

impl_from_value!(u64, Width::W64);
impl_from_value!(u32, Width::W32);
impl_from_value!(u16, Width::W16);
impl_from_value!(u8, Width::W8);
