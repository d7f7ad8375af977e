//! The intermediate form between the symbolic interpreter and the
//! statement synthesizer: one source line lowers to a short list of
//! operations, which the synthesizer pattern-matches as a tuple.

use crate::error::{Error, Result};

/// Array shape carried by a `Store` when the stored value is an array
/// literal rather than a plain expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayShape {
    pub cpp_type: String,
    pub size: usize,
    pub position: u32,
    pub populate: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreOp {
    pub slot: u16,
    /// Declared type, present only when the slot's type changes in the
    /// current scope (first assignment or shadowing).
    pub cpp_type: Option<String>,
    pub value: Option<String>,
    pub array: Option<ArrayShape>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CondOp {
    pub left: String,
    /// Already inverted relative to the opcode: the branch jumps past the
    /// body when the high-level condition is false.
    pub op: &'static str,
    pub right: String,
    /// Absolute bytecode offset of the branch target.
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Store(StoreOp),
    Cond(CondOp),
    Inc { slot: u16, constant: i32 },
    Jump { target: u32 },
    IndexedStore {
        array: String,
        index: String,
        value: String,
    },
    Return { value: Option<String> },
    /// A fully rendered statement.
    Call { code: String },
}

/// Inverts a rendered comparison operator.
pub fn invert_binop(op: &str) -> Result<&'static str> {
    Ok(match op {
        "!=" => "==",
        "==" => "!=",
        ">=" => "<",
        "<" => ">=",
        "<=" => ">",
        ">" => "<=",
        other => return Err(Error::BadBinaryOperator(other.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_inversion() {
        assert_eq!(invert_binop("==").unwrap(), "!=");
        assert_eq!(invert_binop("<").unwrap(), ">=");
        assert_eq!(invert_binop(">=").unwrap(), "<");
        assert!(invert_binop("+").is_err());
    }
}
