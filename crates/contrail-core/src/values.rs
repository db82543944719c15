use num_bigint::BigInt;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An instruction operand. Locals are named registers; the VM gives every
/// local an unbounded integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Local(String),
    Constant(Constant),
}

impl Value {
    pub fn local(name: impl Into<String>) -> Self {
        Value::Local(name.into())
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Value::Constant(Constant::Int(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Value::Constant(Constant::Bool(value))
    }

    pub fn zero() -> Self {
        Value::int(0)
    }

    pub fn one() -> Self {
        Value::int(1)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Constant(_))
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Value::Constant(c) => Some(c),
            Value::Local(_) => None,
        }
    }

    pub fn as_local(&self) -> Option<&str> {
        match self {
            Value::Local(name) => Some(name),
            Value::Constant(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Local(name) => write!(f, "%{}", name),
            Value::Constant(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Bool(bool),
    Int(BigInt),
}

impl Constant {
    pub fn as_bigint(&self) -> BigInt {
        match self {
            Constant::Bool(true) => BigInt::one(),
            Constant::Bool(false) => BigInt::zero(),
            Constant::Int(v) => v.clone(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Constant::Bool(b) => !b,
            Constant::Int(v) => v.is_zero(),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(v) => write!(f, "{}", v),
        }
    }
}
