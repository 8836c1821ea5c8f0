//! Values manipulated by the instruction simulator. A [Value] is either a concrete [Literal] of a
//! fixed [Width], an [Address] into a named memory region, a [Symbol] whose bits are unknown but
//! whose relation to known operands is preserved as text, or the undefined boolean produced by a
//! comparison that cannot be decided.
//!
//! Values are immutable. Every operation returns a fresh value.

mod literal;
mod ops;
mod value;

pub use literal::*;
pub use ops::*;
pub use value::*;

/// Value result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by value operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Neither operand is concrete enough to compute the operation. The expression is the textual
    /// form of the attempted computation and is suitable as the name of a symbolic result.
    #[error("unable to compute {expression}")]
    Unresolved { expression: String },

    /// The value cannot be represented as the requested type.
    #[error("value {value} cannot be converted to {target}")]
    Conversion { value: String, target: &'static str },
}
