use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

/// Numeric payload of a [`crate::Value`].
///
/// Integers and floats form one numeric family: they compare with each other by
/// value, and mixing them in arithmetic promotes the result to a float.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("Divided by 0")]
    DivisionByZero,
    #[error("Integer overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        };
        write!(f, "{}", symbol)
    }
}

impl Number {
    /// Returns the value as an `f64`, converting integers.
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }

    /// Returns `true` if the number is stored as an integer.
    pub fn is_int(&self) -> bool {
        matches!(self, Number::Int(_))
    }

    /// Returns `true` if the number is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Number::Int(i) => *i == 0,
            Number::Float(f) => *f == 0.0,
        }
    }

    /// Applies an arithmetic operator.
    ///
    /// Integer operands stay integers (checked for overflow, division floors);
    /// any float operand yields a float.
    pub fn apply(self, op: ArithOp, rhs: Number) -> Result<Number, ArithmeticError> {
        if rhs.is_zero() && op == ArithOp::Div {
            return Err(ArithmeticError::DivisionByZero);
        }

        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => {
                let result = match op {
                    ArithOp::Add => a.checked_add(b),
                    ArithOp::Sub => a.checked_sub(b),
                    ArithOp::Mul => a.checked_mul(b),
                    ArithOp::Div => floor_div(a, b),
                };
                result.map(Number::Int).ok_or(ArithmeticError::Overflow)
            }
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                Ok(Number::Float(match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                }))
            }
        }
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::Int(0)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Int(value as i64)
    }
}

impl From<usize> for Number {
    fn from(value: usize) -> Self {
        Number::Int(value as i64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{:.1}", v),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

/// The integer a float denotes exactly, if any.
fn exact_int(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-TWO_POW_63..TWO_POW_63).contains(&f)).then_some(f as i64)
}

fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if let Some(j) = exact_int(f) {
        return Some(i.cmp(&j));
    }
    if f >= TWO_POW_63 {
        return Some(Ordering::Less);
    }
    if f < -TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    // fractional and in range: `i` lies strictly on one side of `f`
    Some(if i <= f.floor() as i64 {
        Ordering::Less
    } else {
        Ordering::Greater
    })
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a == b,
            (Number::Int(i), Number::Float(f)) | (Number::Float(f), Number::Int(i)) => {
                exact_int(*f) == Some(*i)
            }
        }
    }
}

// NaN is never equal to itself, so a NaN-keyed tuple can be written but never read back.
impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Number::Int(i) => i.hash(state),
            Number::Float(f) => match exact_int(*f) {
                Some(i) => i.hash(state),
                None => f.to_bits().hash(state),
            },
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            (Number::Float(a), Number::Float(b)) => a.partial_cmp(b),
            (Number::Int(i), Number::Float(f)) => cmp_int_float(*i, *f),
            (Number::Float(f), Number::Int(i)) => cmp_int_float(*i, *f).map(Ordering::reverse),
        }
    }
}
