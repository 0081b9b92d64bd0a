use std::fmt::{self, Display, Formatter};
use std::vec;

use serde::{Deserialize, Serialize};

use crate::ast::{ArgExprs, BinaryOp, Branch, DecisionPoint, Invocation, Node};
use crate::env::Env;
use crate::state::{Args, StateStore};
use crate::{Ident, Shared, Value};

pub mod error;

use error::EvalError;

/// How `And`/`Or` treat their right operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolEval {
    /// Both operands are always evaluated.
    #[default]
    Strict,
    /// The right operand is skipped once the left one decides the result.
    ShortCircuit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub bool_eval: BoolEval,
    /// Maximum number of iterations of a single `While`. Unbounded when `None`.
    pub max_loop_iterations: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Ready,
    Evaluating,
    Suspended,
    Finished,
    Failed,
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Ready => "ready",
            RunState::Evaluating => "evaluating",
            RunState::Suspended => "suspended",
            RunState::Finished => "finished",
            RunState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Result of driving a run until it stops.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Finished(Value),
    Suspended(DecisionPoint),
}

#[derive(Debug, Clone)]
enum ArgsTarget {
    StateRead(Ident),
    StateWrite(Ident, Shared<Node>),
    Task(Ident),
    Command(Ident),
}

/// Pending work saved while a sub-expression is evaluated.
#[derive(Debug, Clone)]
enum Frame {
    SeqRest(Shared<Node>),
    WhileCond {
        cond: Shared<Node>,
        body: Shared<Node>,
        iterations: u64,
    },
    WhileBody {
        cond: Shared<Node>,
        body: Shared<Node>,
        iterations: u64,
    },
    IfCond {
        block: Shared<Node>,
        rest: vec::IntoIter<Branch>,
    },
    BinaryLhs(BinaryOp, Shared<Node>),
    BinaryRhs(BinaryOp, Value),
    Not,
    LocalWrite(Ident),
    Args {
        target: ArgsTarget,
        pending: vec::IntoIter<Shared<Node>>,
        values: Args,
    },
    StateWriteValue(Ident, Args),
}

enum Control {
    Eval(Shared<Node>),
    Return(Value),
    Suspend(DecisionPoint),
}

/// A resumable run of one instruction tree.
///
/// The run keeps its continuation on an explicit frame stack, so it can stop at
/// a task or command invocation and be resumed later with the value that
/// invocation evaluates to.
#[derive(Debug, Clone)]
pub struct Interpreter {
    body: Shared<Node>,
    env: Env,
    options: Options,
    state: RunState,
    stack: Vec<Frame>,
    resumed: Option<Value>,
}

impl Interpreter {
    pub fn new(body: Shared<Node>, env: Env, options: Options) -> Self {
        Self {
            body,
            env,
            options,
            state: RunState::Ready,
            stack: Vec::new(),
            resumed: None,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn into_env(self) -> Env {
        self.env
    }

    /// Supplies the value of the invocation the run is suspended on.
    pub fn resume(&mut self, value: Value) -> Result<(), EvalError> {
        if self.state != RunState::Suspended {
            return Err(EvalError::InvalidResume {
                action: "resume",
                state: self.state,
            });
        }

        self.resumed = Some(value);
        self.state = RunState::Evaluating;
        Ok(())
    }

    /// Evaluates until the body finishes or reaches the next decision point.
    pub fn step<S: StateStore + ?Sized>(&mut self, state: &mut S) -> Result<Outcome, EvalError> {
        let control = match (self.state, self.resumed.take()) {
            (RunState::Ready, _) => Control::Eval(Shared::clone(&self.body)),
            (RunState::Evaluating, Some(value)) => Control::Return(value),
            (current, _) => {
                return Err(EvalError::InvalidResume {
                    action: "step",
                    state: current,
                });
            }
        };
        self.state = RunState::Evaluating;

        match self.drive(control, state) {
            Ok(outcome) => {
                self.state = match outcome {
                    Outcome::Finished(_) => RunState::Finished,
                    Outcome::Suspended(_) => RunState::Suspended,
                };
                Ok(outcome)
            }
            Err(e) => {
                self.state = RunState::Failed;
                self.stack.clear();
                Err(e)
            }
        }
    }

    fn drive<S: StateStore + ?Sized>(
        &mut self,
        mut control: Control,
        state: &mut S,
    ) -> Result<Outcome, EvalError> {
        loop {
            control = match control {
                Control::Eval(node) => self.eval_node(&node, state)?,
                Control::Return(value) => match self.stack.pop() {
                    Some(frame) => self.apply_frame(frame, value, state)?,
                    None => return Ok(Outcome::Finished(value)),
                },
                Control::Suspend(decision_point) => return Ok(Outcome::Suspended(decision_point)),
            };
        }
    }

    fn eval_node<S: StateStore + ?Sized>(
        &mut self,
        node: &Shared<Node>,
        state: &mut S,
    ) -> Result<Control, EvalError> {
        match &**node {
            Node::Noop => Ok(Control::Return(Value::NONE)),
            Node::Fail => Err(EvalError::MethodDeclaredFailure),
            Node::Literal(value) => Ok(Control::Return(value.clone())),
            Node::Seq(first, rest) => {
                self.stack.push(Frame::SeqRest(Shared::clone(rest)));
                Ok(Control::Eval(Shared::clone(first)))
            }
            Node::While(cond, body) => {
                self.stack.push(Frame::WhileCond {
                    cond: Shared::clone(cond),
                    body: Shared::clone(body),
                    iterations: 0,
                });
                Ok(Control::Eval(Shared::clone(cond)))
            }
            Node::If(branches) => Ok(self.next_branch(branches.clone().into_iter())),
            Node::Binary(op, lhs, rhs) => {
                self.stack.push(Frame::BinaryLhs(*op, Shared::clone(rhs)));
                Ok(Control::Eval(Shared::clone(lhs)))
            }
            Node::Not(operand) => {
                self.stack.push(Frame::Not);
                Ok(Control::Eval(Shared::clone(operand)))
            }
            Node::LocalVarRead(name) => self.env.resolve(name).map(Control::Return),
            Node::LocalVarWrite(name, value) => {
                self.stack.push(Frame::LocalWrite(name.clone()));
                Ok(Control::Eval(Shared::clone(value)))
            }
            Node::StateVarRead(name, args) => {
                self.eval_args(ArgsTarget::StateRead(name.clone()), args, state)
            }
            Node::StateVarWrite(name, args, value) => self.eval_args(
                ArgsTarget::StateWrite(name.clone(), Shared::clone(value)),
                args,
                state,
            ),
            Node::TaskInvoke(name, args) => {
                self.eval_args(ArgsTarget::Task(name.clone()), args, state)
            }
            Node::CommandInvoke(name, args) => {
                self.eval_args(ArgsTarget::Command(name.clone()), args, state)
            }
        }
    }

    fn apply_frame<S: StateStore + ?Sized>(
        &mut self,
        frame: Frame,
        value: Value,
        state: &mut S,
    ) -> Result<Control, EvalError> {
        match frame {
            Frame::SeqRest(rest) => Ok(Control::Eval(rest)),
            Frame::WhileCond {
                cond,
                body,
                iterations,
            } => {
                if !expect_bool("while", &value)? {
                    return Ok(Control::Return(Value::NONE));
                }

                if let Some(max) = self.options.max_loop_iterations {
                    if iterations >= max {
                        return Err(EvalError::LoopBudgetExceeded(max));
                    }
                }

                self.stack.push(Frame::WhileBody {
                    cond,
                    body: Shared::clone(&body),
                    iterations: iterations + 1,
                });
                Ok(Control::Eval(body))
            }
            Frame::WhileBody {
                cond,
                body,
                iterations,
            } => {
                self.stack.push(Frame::WhileCond {
                    cond: Shared::clone(&cond),
                    body,
                    iterations,
                });
                Ok(Control::Eval(cond))
            }
            Frame::IfCond { block, rest } => {
                if expect_bool("if", &value)? {
                    Ok(Control::Eval(block))
                } else {
                    Ok(self.next_branch(rest))
                }
            }
            Frame::BinaryLhs(op, rhs) => {
                if self.options.bool_eval == BoolEval::ShortCircuit {
                    match (op, &value) {
                        (BinaryOp::And, Value::Bool(false)) => return Ok(Control::Return(Value::FALSE)),
                        (BinaryOp::Or, Value::Bool(true)) => return Ok(Control::Return(Value::TRUE)),
                        _ => {}
                    }
                }

                self.stack.push(Frame::BinaryRhs(op, value));
                Ok(Control::Eval(rhs))
            }
            Frame::BinaryRhs(op, lhs) => lhs.binary(op, &value).map(Control::Return),
            Frame::Not => value.not().map(Control::Return),
            Frame::LocalWrite(name) => {
                self.env.define(name, value.clone());
                Ok(Control::Return(value))
            }
            Frame::Args {
                target,
                mut pending,
                mut values,
            } => {
                values.push(value);
                match pending.next() {
                    Some(next) => {
                        self.stack.push(Frame::Args {
                            target,
                            pending,
                            values,
                        });
                        Ok(Control::Eval(next))
                    }
                    None => self.finish_args(target, values, state),
                }
            }
            Frame::StateWriteValue(name, args) => {
                state.write(name, args, value.clone())?;
                Ok(Control::Return(value))
            }
        }
    }

    fn next_branch(&mut self, mut rest: vec::IntoIter<Branch>) -> Control {
        match rest.next() {
            Some((cond, block)) => {
                self.stack.push(Frame::IfCond { block, rest });
                Control::Eval(cond)
            }
            None => Control::Return(Value::NONE),
        }
    }

    fn eval_args<S: StateStore + ?Sized>(
        &mut self,
        target: ArgsTarget,
        args: &ArgExprs,
        state: &mut S,
    ) -> Result<Control, EvalError> {
        let mut pending = args.clone().into_iter();
        match pending.next() {
            Some(first) => {
                self.stack.push(Frame::Args {
                    target,
                    pending,
                    values: Args::new(),
                });
                Ok(Control::Eval(first))
            }
            None => self.finish_args(target, Args::new(), state),
        }
    }

    fn finish_args<S: StateStore + ?Sized>(
        &mut self,
        target: ArgsTarget,
        args: Args,
        state: &mut S,
    ) -> Result<Control, EvalError> {
        match target {
            ArgsTarget::StateRead(name) => state.read(&name, &args).map(Control::Return),
            ArgsTarget::StateWrite(name, value) => {
                self.stack.push(Frame::StateWriteValue(name, args));
                Ok(Control::Eval(value))
            }
            ArgsTarget::Task(name) => Ok(Control::Suspend(DecisionPoint::Task(Invocation {
                name,
                args,
            }))),
            ArgsTarget::Command(name) => Ok(Control::Suspend(DecisionPoint::Command(
                Invocation { name, args },
            ))),
        }
    }
}

fn expect_bool(op: &str, value: &Value) -> Result<bool, EvalError> {
    value.as_bool().ok_or_else(|| EvalError::UnaryTypeMismatch {
        op: op.into(),
        operand: value.type_name(),
    })
}

/// Evaluates `node` until it finishes or reaches its first decision point.
///
/// Returns the outcome together with the environment left by the run.
pub fn evaluate<S: StateStore + ?Sized>(
    node: &Shared<Node>,
    env: Env,
    state: &mut S,
) -> Result<(Outcome, Env), EvalError> {
    let mut interpreter = Interpreter::new(Shared::clone(node), env, Options::default());
    let outcome = interpreter.step(state)?;
    Ok((outcome, interpreter.into_env()))
}
