use itertools::Itertools;
use smol_str::SmolStr;
use thiserror::Error;

use super::RunState;
use crate::Ident;
use crate::number::ArithOp;
use crate::state::Args;

type TypeName = &'static str;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error(r#"Invalid types for "{op}", got {left} and {right}"#)]
    TypeMismatch {
        op: SmolStr,
        left: TypeName,
        right: TypeName,
    },
    #[error(r#"Invalid type for "{op}", got {operand}"#)]
    UnaryTypeMismatch { op: SmolStr, operand: TypeName },
    #[error("Divided by 0")]
    DivisionByZero,
    #[error(r#"Integer overflow in "{0}""#)]
    Overflow(ArithOp),
    #[error(r#"Undefined variable "{0}""#)]
    UndefinedVariable(Ident),
    #[error(r#"State variable "{}" has no value for ({})"#, name, key.iter().join(", "))]
    StateVariableNotFound { name: Ident, key: Args },
    #[error(r#"Cannot write state variable "{0}" from a read-only context"#)]
    ReadOnlyState(Ident),
    #[error("Method declared failure")]
    MethodDeclaredFailure,
    #[error("Loop exceeded {0} iterations")]
    LoopBudgetExceeded(u64),
    #[error("Cannot {action} a run that is {state}")]
    InvalidResume {
        action: &'static str,
        state: RunState,
    },
}

impl EvalError {
    /// Returns `true` for errors caused by the driver rather than the method body.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, EvalError::InvalidResume { .. })
    }
}
