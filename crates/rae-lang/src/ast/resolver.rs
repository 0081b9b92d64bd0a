//! Call-site resolution.
//!
//! Method bodies may be built with a single call syntax for state-variable
//! reads, task calls and command calls. [`Resolver`] rewrites those reads into
//! [`Node::TaskInvoke`] or [`Node::CommandInvoke`] once the task and command
//! names are known, so the interpreter never needs a name lookup.

use rustc_hash::FxHashSet;

use super::node::{ArgExprs, Node};
use crate::{Ident, Shared};

/// Task and command names visible to a method body.
#[derive(Debug, Clone, Default)]
pub struct Symbols {
    tasks: FxHashSet<Ident>,
    commands: FxHashSet<Ident>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks<I, T>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Ident>,
    {
        self.tasks.extend(tasks.into_iter().map(Into::into));
        self
    }

    pub fn with_commands<I, T>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Ident>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn add_task(&mut self, name: impl Into<Ident>) {
        self.tasks.insert(name.into());
    }

    pub fn add_command(&mut self, name: impl Into<Ident>) {
        self.commands.insert(name.into());
    }

    pub fn is_task(&self, name: &str) -> bool {
        self.tasks.contains(name)
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.commands.contains(name)
    }
}

/// Rewrites ambiguous call sites of an instruction tree.
///
/// A name registered as both a task and a command resolves to the task.
pub struct Resolver<'a> {
    symbols: &'a Symbols,
    rewritten: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(symbols: &'a Symbols) -> Self {
        Self {
            symbols,
            rewritten: 0,
        }
    }

    /// Number of call sites rewritten so far.
    pub fn rewritten(&self) -> usize {
        self.rewritten
    }

    pub fn resolve(&mut self, node: &Shared<Node>) -> Shared<Node> {
        match &**node {
            Node::Noop
            | Node::Fail
            | Node::Literal(_)
            | Node::LocalVarRead(_) => Shared::clone(node),
            Node::Seq(first, rest) => Shared::new(Node::Seq(self.resolve(first), self.resolve(rest))),
            Node::While(cond, body) => {
                Shared::new(Node::While(self.resolve(cond), self.resolve(body)))
            }
            Node::If(branches) => Shared::new(Node::If(
                branches
                    .iter()
                    .map(|(cond, block)| (self.resolve(cond), self.resolve(block)))
                    .collect(),
            )),
            Node::Binary(op, lhs, rhs) => {
                Shared::new(Node::Binary(*op, self.resolve(lhs), self.resolve(rhs)))
            }
            Node::Not(operand) => Shared::new(Node::Not(self.resolve(operand))),
            Node::LocalVarWrite(name, value) => {
                Shared::new(Node::LocalVarWrite(name.clone(), self.resolve(value)))
            }
            Node::StateVarRead(name, args) => {
                let args = self.resolve_args(args);
                if self.symbols.is_task(name) {
                    self.rewritten += 1;
                    Shared::new(Node::TaskInvoke(name.clone(), args))
                } else if self.symbols.is_command(name) {
                    self.rewritten += 1;
                    Shared::new(Node::CommandInvoke(name.clone(), args))
                } else {
                    Shared::new(Node::StateVarRead(name.clone(), args))
                }
            }
            Node::StateVarWrite(name, args, value) => Shared::new(Node::StateVarWrite(
                name.clone(),
                self.resolve_args(args),
                self.resolve(value),
            )),
            Node::TaskInvoke(name, args) => {
                Shared::new(Node::TaskInvoke(name.clone(), self.resolve_args(args)))
            }
            Node::CommandInvoke(name, args) => {
                Shared::new(Node::CommandInvoke(name.clone(), self.resolve_args(args)))
            }
        }
    }

    fn resolve_args(&mut self, args: &ArgExprs) -> ArgExprs {
        args.iter().map(|arg| self.resolve(arg)).collect()
    }
}

/// Resolves call sites of `node` against `symbols`.
pub fn resolve(node: &Shared<Node>, symbols: &Symbols) -> Shared<Node> {
    Resolver::new(symbols).resolve(node)
}
