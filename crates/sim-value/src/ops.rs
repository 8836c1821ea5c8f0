use crate::Literal;

/// Bitwise operations supported by simulated values.
pub trait BitwiseOps {
    /// Logical-And on the bits of both operands. The result has the width of `self`.
    fn and(self, rhs: Self) -> Self;

    /// Flip every bit of the operand.
    fn not(self) -> Self;

    /// Logical-Or on the bits of both operands. The result has the width of `self`.
    fn or(self, rhs: Self) -> Self;

    /// Exclusive-Or on the bits of both operands. The result has the width of `self`.
    fn xor(self, rhs: Self) -> Self;
}

impl<T> BitwiseOps for T
where
    T: std::ops::BitAnd<Output = T>
        + std::ops::BitOr<Output = T>
        + std::ops::BitXor<Output = T>
        + std::ops::Not<Output = T>,
{
    fn and(self, other: Self) -> Self {
        self & other
    }

    fn not(self) -> Self {
        !self
    }

    fn or(self, other: Self) -> Self {
        self | other
    }

    fn xor(self, other: Self) -> Self {
        self ^ other
    }
}

/// Integer operations over concrete values. All arithmetic wraps at the width of `self`; the right
/// hand side is reinterpreted at that width before the operation is applied. Comparisons extend
/// the narrower operand instead, so operands of different widths compare by numeric value.
pub trait IntegerOps: BitwiseOps + Sized {
    /// Twos complement addition modulo the width.
    fn add(self, rhs: Self) -> Self;

    /// Twos complement subtraction modulo the width.
    fn subtract(self, rhs: Self) -> Self;

    /// Shift left by `amount` bits. Shifting by the width or more yields zero.
    fn shift_left(self, amount: u32) -> Self;

    /// Logical shift right by `amount` bits. Shifting by the width or more yields zero.
    fn unsigned_shift_right(self, amount: u32) -> Self;

    /// Arithmetic shift right by `amount` bits. Vacated bits are filled with the sign bit.
    fn signed_shift_right(self, amount: u32) -> Self;

    fn equals(self, rhs: Self) -> bool;

    fn unsigned_less_than(self, rhs: Self) -> bool;

    fn signed_less_than(self, rhs: Self) -> bool;
}

/// Operators that combine two values into a new value of the same kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Add,
    Subtract,
    ShiftLeft,
    UnsignedShiftRight,
    SignedShiftRight,
}

impl BinaryOp {
    /// Operator text used when rendering expressions.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::UnsignedShiftRight => ">>",
            BinaryOp::SignedShiftRight => "s>>",
        }
    }

    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Add
        )
    }

    /// Apply the operator to two concrete values.
    pub fn apply(&self, lhs: Literal, rhs: Literal) -> Literal {
        let amount = || u32::try_from(rhs.bits()).unwrap_or(u32::MAX);
        match self {
            BinaryOp::And => lhs.and(rhs),
            BinaryOp::Or => lhs.or(rhs),
            BinaryOp::Xor => lhs.xor(rhs),
            BinaryOp::Add => lhs.add(rhs),
            BinaryOp::Subtract => lhs.subtract(rhs),
            BinaryOp::ShiftLeft => lhs.shift_left(amount()),
            BinaryOp::UnsignedShiftRight => lhs.unsigned_shift_right(amount()),
            BinaryOp::SignedShiftRight => lhs.signed_shift_right(amount()),
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}
