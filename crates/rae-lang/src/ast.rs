use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::Ident;
use crate::state::Args;

pub mod node;
pub mod resolver;

pub use node::{ArgExprs, BinaryOp, Branch, Node};
pub use resolver::{Resolver, Symbols};

/// A task or command applied to concrete arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Invocation {
    pub name: Ident,
    pub args: Args,
}

impl Invocation {
    pub fn new<I>(name: impl Into<Ident>, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<crate::Value>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.iter().join(", "))
    }
}

/// Where an interpreter run hands control back to its driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DecisionPoint {
    Task(Invocation),
    Command(Invocation),
}

impl DecisionPoint {
    pub fn invocation(&self) -> &Invocation {
        match self {
            DecisionPoint::Task(invocation) | DecisionPoint::Command(invocation) => invocation,
        }
    }

    pub fn into_invocation(self) -> Invocation {
        match self {
            DecisionPoint::Task(invocation) | DecisionPoint::Command(invocation) => invocation,
        }
    }
}

impl Display for DecisionPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecisionPoint::Task(invocation) => write!(f, "task {}", invocation),
            DecisionPoint::Command(invocation) => write!(f, "command {}", invocation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_invocation_display() {
        let invocation = Invocation::new("move", ["r1", "d2"]);
        assert_eq!(invocation.to_string(), "move(r1, d2)");
        assert_eq!(invocation.arity(), 2);
        assert_eq!(Invocation::new("idle", Vec::<Value>::new()).to_string(), "idle()");
    }

    #[test]
    fn test_decision_point_invocation() {
        let dp = DecisionPoint::Command(Invocation::new("load", ["r1", "c1"]));
        assert_eq!(dp.invocation().name, "load");
        assert_eq!(dp.to_string(), "command load(r1, c1)");
    }
}
