use std::fmt::{self, Display, Formatter};

use crate::{Ident, Shared, Value};

pub type ArgExprs = Vec<Shared<Node>>;
/// `(condition, block)` pair of an `If`.
pub type Branch = (Shared<Node>, Shared<Node>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Equals,
    Lt,
    Gt,
    Lte,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Equals => "==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Lte => "<=",
            BinaryOp::Gte => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        write!(f, "{}", symbol)
    }
}

/// Instruction tree of a method body or precondition.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Noop,
    Seq(Shared<Node>, Shared<Node>),
    While(Shared<Node>, Shared<Node>),
    If(Vec<Branch>),
    Binary(BinaryOp, Shared<Node>, Shared<Node>),
    Not(Shared<Node>),
    Literal(Value),
    LocalVarRead(Ident),
    LocalVarWrite(Ident, Shared<Node>),
    StateVarRead(Ident, ArgExprs),
    StateVarWrite(Ident, ArgExprs, Shared<Node>),
    TaskInvoke(Ident, ArgExprs),
    CommandInvoke(Ident, ArgExprs),
    Fail,
}

impl Node {
    pub fn noop() -> Shared<Node> {
        Shared::new(Node::Noop)
    }

    pub fn fail() -> Shared<Node> {
        Shared::new(Node::Fail)
    }

    pub fn literal(value: impl Into<Value>) -> Shared<Node> {
        Shared::new(Node::Literal(value.into()))
    }

    /// Chains `nodes` into right-nested `Seq`s. An empty sequence is `Noop`.
    pub fn seq(nodes: impl IntoIterator<Item = Shared<Node>>) -> Shared<Node> {
        let nodes: Vec<_> = nodes.into_iter().collect();
        nodes
            .into_iter()
            .rev()
            .reduce(|rest, first| Shared::new(Node::Seq(first, rest)))
            .unwrap_or_else(Node::noop)
    }

    pub fn while_loop(cond: Shared<Node>, body: Shared<Node>) -> Shared<Node> {
        Shared::new(Node::While(cond, body))
    }

    pub fn if_then(cond: Shared<Node>, block: Shared<Node>) -> Shared<Node> {
        Shared::new(Node::If(vec![(cond, block)]))
    }

    /// Builds an `if / elsif / else` chain; `else` becomes a trailing `True` branch.
    pub fn if_else(branches: Vec<Branch>, otherwise: Option<Shared<Node>>) -> Shared<Node> {
        let mut branches = branches;
        if let Some(block) = otherwise {
            branches.push((Node::literal(true), block));
        }
        Shared::new(Node::If(branches))
    }

    pub fn binary(op: BinaryOp, lhs: Shared<Node>, rhs: Shared<Node>) -> Shared<Node> {
        Shared::new(Node::Binary(op, lhs, rhs))
    }

    pub fn not(operand: Shared<Node>) -> Shared<Node> {
        Shared::new(Node::Not(operand))
    }

    pub fn local(name: impl Into<Ident>) -> Shared<Node> {
        Shared::new(Node::LocalVarRead(name.into()))
    }

    pub fn assign(name: impl Into<Ident>, value: Shared<Node>) -> Shared<Node> {
        Shared::new(Node::LocalVarWrite(name.into(), value))
    }

    /// State-variable read, or a task/command call before [`crate::resolve`] runs.
    pub fn call(name: impl Into<Ident>, args: ArgExprs) -> Shared<Node> {
        Shared::new(Node::StateVarRead(name.into(), args))
    }

    pub fn set_state(name: impl Into<Ident>, args: ArgExprs, value: Shared<Node>) -> Shared<Node> {
        Shared::new(Node::StateVarWrite(name.into(), args, value))
    }

    pub fn task(name: impl Into<Ident>, args: ArgExprs) -> Shared<Node> {
        Shared::new(Node::TaskInvoke(name.into(), args))
    }

    pub fn command(name: impl Into<Ident>, args: ArgExprs) -> Shared<Node> {
        Shared::new(Node::CommandInvoke(name.into(), args))
    }

    pub fn equals(lhs: Shared<Node>, rhs: Shared<Node>) -> Shared<Node> {
        Node::binary(BinaryOp::Equals, lhs, rhs)
    }

    pub fn and(lhs: Shared<Node>, rhs: Shared<Node>) -> Shared<Node> {
        Node::binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(lhs: Shared<Node>, rhs: Shared<Node>) -> Shared<Node> {
        Node::binary(BinaryOp::Or, lhs, rhs)
    }

    /// Returns `true` if the tree contains a task or command invocation.
    pub fn has_decision_points(&self) -> bool {
        match self {
            Node::TaskInvoke(..) | Node::CommandInvoke(..) => true,
            Node::Noop | Node::Fail | Node::Literal(_) | Node::LocalVarRead(_) => false,
            Node::Seq(a, b) | Node::While(a, b) | Node::Binary(_, a, b) => {
                a.has_decision_points() || b.has_decision_points()
            }
            Node::If(branches) => branches
                .iter()
                .any(|(cond, block)| cond.has_decision_points() || block.has_decision_points()),
            Node::Not(a) | Node::LocalVarWrite(_, a) => a.has_decision_points(),
            Node::StateVarRead(_, args) => args.iter().any(|a| a.has_decision_points()),
            Node::StateVarWrite(_, args, value) => {
                value.has_decision_points() || args.iter().any(|a| a.has_decision_points())
            }
        }
    }
}
