use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use crate::ast::BinaryOp;
use crate::eval::error::EvalError;
use crate::number::{ArithOp, ArithmeticError, Number};

/// A dynamic value manipulated by method bodies and stored in state variables.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Number(Number),
    String(SmolStr),
    Bool(bool),
    None,
}

#[derive(Error, Debug, PartialEq)]
#[error("Unsupported value {0}, only scalars and null are allowed")]
pub struct ValueConversionError(String);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(SmolStr::new(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(SmolStr::from(s))
    }
}

impl From<SmolStr> for Value {
    fn from(s: SmolStr) -> Self {
        Value::String(s)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n.into())
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ValueConversionError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Ok(Value::None),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::String(s) => Ok(s.into()),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::from)
                .or_else(|| n.as_f64().map(Value::from))
                .ok_or_else(|| ValueConversionError(n.to_string())),
            other => Err(ValueConversionError(other.to_string())),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(Number::Int(i)) => i.into(),
            Value::Number(Number::Float(f)) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Bool(b) => b.into(),
            Value::None => serde_json::Value::Null,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::None => write!(f, "None"),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            _ => write!(f, "{}", self),
        }
    }
}

impl Value {
    pub const NONE: Value = Self::None;
    pub const TRUE: Value = Self::Bool(true);
    pub const FALSE: Value = Self::Bool(false);

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the value's tag, used in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(Number::Int(_)) => "int",
            Value::Number(Number::Float(_)) => "float",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::None => "none",
        }
    }

    /// Applies a binary operator to two already evaluated operands.
    pub fn binary(&self, op: BinaryOp, rhs: &Value) -> Result<Value, EvalError> {
        match op {
            BinaryOp::Add => self.arith(op, ArithOp::Add, rhs),
            BinaryOp::Sub => self.arith(op, ArithOp::Sub, rhs),
            BinaryOp::Mul => self.arith(op, ArithOp::Mul, rhs),
            BinaryOp::Div => self.arith(op, ArithOp::Div, rhs),
            BinaryOp::And | BinaryOp::Or => match (self, rhs) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinaryOp::And {
                    *a && *b
                } else {
                    *a || *b
                })),
                _ => Err(self.mismatch(op, rhs)),
            },
            BinaryOp::Equals => self.equals(rhs).map(Value::Bool),
            BinaryOp::Lt => self.compare(op, rhs).map(|o| Value::Bool(o == Ordering::Less)),
            BinaryOp::Gt => self.compare(op, rhs).map(|o| Value::Bool(o == Ordering::Greater)),
            BinaryOp::Lte => self.compare(op, rhs).map(|o| Value::Bool(o != Ordering::Greater)),
            BinaryOp::Gte => self.compare(op, rhs).map(|o| Value::Bool(o != Ordering::Less)),
        }
    }

    /// Logical negation; only defined for booleans.
    pub fn not(&self) -> Result<Value, EvalError> {
        match self {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            _ => Err(EvalError::UnaryTypeMismatch {
                op: "!".into(),
                operand: self.type_name(),
            }),
        }
    }

    fn arith(&self, op: BinaryOp, arith: ArithOp, rhs: &Value) -> Result<Value, EvalError> {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => {
                a.apply(arith, *b).map(Value::Number).map_err(|e| match e {
                    ArithmeticError::DivisionByZero => EvalError::DivisionByZero,
                    ArithmeticError::Overflow => EvalError::Overflow(arith),
                })
            }
            _ => Err(self.mismatch(op, rhs)),
        }
    }

    fn equals(&self, rhs: &Value) -> Result<bool, EvalError> {
        match (self, rhs) {
            (Value::None, other) | (other, Value::None) => Ok(other.is_none()),
            (Value::Number(a), Value::Number(b)) => Ok(a == b),
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            _ => Err(self.mismatch(BinaryOp::Equals, rhs)),
        }
    }

    fn compare(&self, op: BinaryOp, rhs: &Value) -> Result<Ordering, EvalError> {
        match (self, rhs) {
            // NaN compares as unordered, which makes every relational test false.
            (Value::Number(a), Value::Number(b)) => Ok(a.partial_cmp(b).unwrap_or(match op {
                BinaryOp::Lt | BinaryOp::Lte => Ordering::Greater,
                _ => Ordering::Less,
            })),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            _ => Err(self.mismatch(op, rhs)),
        }
    }

    fn mismatch(&self, op: BinaryOp, rhs: &Value) -> EvalError {
        EvalError::TypeMismatch {
            op: op.to_string().into(),
            left: self.type_name(),
            right: rhs.type_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Value::from(20), BinaryOp::Add, Value::from(25), Value::from(45))]
    #[case(Value::from(1.5), BinaryOp::Mul, Value::from(2), Value::from(3.0))]
    #[case(Value::from(1), BinaryOp::Equals, Value::from(1.0), Value::TRUE)]
    #[case(Value::from("a"), BinaryOp::Equals, Value::from("b"), Value::FALSE)]
    #[case(Value::None, BinaryOp::Equals, Value::None, Value::TRUE)]
    #[case(Value::None, BinaryOp::Equals, Value::from(1), Value::FALSE)]
    #[case(Value::from("r1"), BinaryOp::Equals, Value::None, Value::FALSE)]
    #[case(Value::from(2.5), BinaryOp::Gte, Value::from(1), Value::TRUE)]
    #[case(Value::from(1), BinaryOp::Gte, Value::from(2.5), Value::FALSE)]
    #[case(Value::from(1), BinaryOp::Lte, Value::from(2.5), Value::TRUE)]
    #[case(Value::from("abc"), BinaryOp::Lt, Value::from("abd"), Value::TRUE)]
    #[case(Value::TRUE, BinaryOp::And, Value::FALSE, Value::FALSE)]
    #[case(Value::FALSE, BinaryOp::Or, Value::TRUE, Value::TRUE)]
    fn test_binary(
        #[case] lhs: Value,
        #[case] op: BinaryOp,
        #[case] rhs: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(lhs.binary(op, &rhs), Ok(expected));
    }

    #[rstest]
    #[case(Value::from("a"), BinaryOp::Add, Value::from(1))]
    #[case(Value::TRUE, BinaryOp::Sub, Value::TRUE)]
    #[case(Value::from(1), BinaryOp::Equals, Value::from("1"))]
    #[case(Value::TRUE, BinaryOp::Lt, Value::FALSE)]
    #[case(Value::from(1), BinaryOp::And, Value::TRUE)]
    #[case(Value::None, BinaryOp::Gt, Value::None)]
    fn test_binary_type_mismatch(#[case] lhs: Value, #[case] op: BinaryOp, #[case] rhs: Value) {
        assert!(matches!(
            lhs.binary(op, &rhs),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            Value::from(1).binary(BinaryOp::Div, &Value::from(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_not() {
        assert_eq!(Value::TRUE.not(), Ok(Value::FALSE));
        assert!(matches!(
            Value::from(1).not(),
            Err(EvalError::UnaryTypeMismatch { operand: "int", .. })
        ));
    }

    #[rstest]
    #[case(serde_json::json!(null), Value::None)]
    #[case(serde_json::json!(3), Value::from(3))]
    #[case(serde_json::json!(3.5), Value::from(3.5))]
    #[case(serde_json::json!("d1"), Value::from("d1"))]
    #[case(serde_json::json!(true), Value::TRUE)]
    fn test_from_json(#[case] json: serde_json::Value, #[case] expected: Value) {
        let value: Value = serde_json::from_value(json).unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn test_from_json_rejects_arrays() {
        assert!(serde_json::from_value::<Value>(serde_json::json!([1, 2])).is_err());
    }

    #[rstest]
    #[case(Value::from(42), "42")]
    #[case(Value::from("hello"), "hello")]
    #[case(Value::TRUE, "true")]
    #[case(Value::None, "None")]
    fn test_display(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }
}
