use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::Ident;
use crate::eval::error::EvalError;
use crate::value::Value;

/// Argument tuple keying one entry of a state-variable relation.
pub type Args = SmallVec<[Value; 4]>;

/// One state variable: argument tuple to value.
pub type Relation = FxHashMap<Args, Value>;

/// Read/write access to world state used by the interpreter.
pub trait StateStore {
    fn read(&self, name: &Ident, args: &[Value]) -> Result<Value, EvalError>;
    fn write(&mut self, name: Ident, args: Args, value: Value) -> Result<(), EvalError>;
}

/// World state: state-variable name to relation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateVariables {
    relations: FxHashMap<Ident, Relation>,
}

impl StateVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str, args: &[Value]) -> Option<&Value> {
        self.relations.get(name).and_then(|relation| relation.get(args))
    }

    pub fn set<I>(&mut self, name: impl Into<Ident>, args: I, value: impl Into<Value>)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.relations
            .entry(name.into())
            .or_default()
            .insert(args.into_iter().map(Into::into).collect(), value.into());
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn contains(&self, name: &str, args: &[Value]) -> bool {
        self.get(name, args).is_some()
    }

    /// Iterates over every `(name, args, value)` entry in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Ident, &Args, &Value)> {
        self.relations
            .iter()
            .flat_map(|(name, relation)| relation.iter().map(move |(args, v)| (name, args, v)))
    }

    /// Total number of stored tuples across all relations.
    pub fn len(&self) -> usize {
        self.relations.values().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateStore for StateVariables {
    fn read(&self, name: &Ident, args: &[Value]) -> Result<Value, EvalError> {
        self.get(name, args)
            .cloned()
            .ok_or_else(|| EvalError::StateVariableNotFound {
                name: name.clone(),
                key: args.iter().cloned().collect(),
            })
    }

    fn write(&mut self, name: Ident, args: Args, value: Value) -> Result<(), EvalError> {
        self.relations.entry(name).or_default().insert(args, value);
        Ok(())
    }
}

/// Shared view over [`StateVariables`] that rejects writes.
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlyState<'a>(pub &'a StateVariables);

impl StateStore for ReadOnlyState<'_> {
    fn read(&self, name: &Ident, args: &[Value]) -> Result<Value, EvalError> {
        self.0.read(name, args)
    }

    fn write(&mut self, name: Ident, _args: Args, _value: Value) -> Result<(), EvalError> {
        Err(EvalError::ReadOnlyState(name))
    }
}
