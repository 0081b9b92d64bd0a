//! `rae-lang` provides the value model and the resumable interpreter used by
//! hierarchical refinement methods.
//!
//! A method body is an instruction tree ([`Node`]). An [`Interpreter`] runs it
//! against a local [`Env`] and world state, and stops at every task or command
//! invocation so the caller can refine that invocation before resuming.
//!
//! ## Examples
//!
//! ```rust
//! use rae_lang::{Env, Interpreter, Node, Options, Outcome, StateVariables, Symbols, Value};
//!
//! let mut state = StateVariables::new();
//! state.set("loc", ["r1"], "d1");
//!
//! let body = Node::seq([
//!     Node::call("move", vec![Node::literal("r1"), Node::literal("d2")]),
//!     Node::call("loc", vec![Node::literal("r1")]),
//! ]);
//! let body = rae_lang::resolve(&body, &Symbols::new().with_commands(["move"]));
//!
//! let mut run = Interpreter::new(body, Env::new(), Options::default());
//! assert!(matches!(run.step(&mut state), Ok(Outcome::Suspended(_))));
//!
//! state.set("loc", ["r1"], "d2");
//! run.resume(Value::TRUE).unwrap();
//! assert_eq!(run.step(&mut state), Ok(Outcome::Finished(Value::from("d2"))));
//! ```
mod ast;
mod env;
mod eval;
mod number;
mod state;
mod value;

pub use ast::resolver::resolve;
pub use ast::{ArgExprs, BinaryOp, Branch, DecisionPoint, Invocation, Node, Resolver, Symbols};
pub use env::Env;
pub use eval::error::EvalError;
pub use eval::{BoolEval, Interpreter, Options, Outcome, RunState, evaluate};
pub use number::{ArithOp, ArithmeticError, Number};
pub use state::{Args, ReadOnlyState, Relation, StateStore, StateVariables};
pub use value::{Value, ValueConversionError};

pub type Ident = smol_str::SmolStr;
pub type Shared<T> = std::sync::Arc<T>;
