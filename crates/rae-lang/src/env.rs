use rustc_hash::FxHashMap;

use crate::Ident;
use crate::eval::error::EvalError;
use crate::value::Value;

/// Method-local variables of one interpreter run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Env {
    context: FxHashMap<Ident, Value>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn define(&mut self, ident: Ident, value: Value) {
        self.context.insert(ident, value);
    }

    #[inline(always)]
    pub fn resolve(&self, ident: &Ident) -> Result<Value, EvalError> {
        self.context
            .get(ident)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(ident.clone()))
    }

    pub fn contains(&self, ident: &Ident) -> bool {
        self.context.contains_key(ident)
    }

    pub fn len(&self) -> usize {
        self.context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

impl<K: Into<Ident>, V: Into<Value>> FromIterator<(K, V)> for Env {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            context: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
