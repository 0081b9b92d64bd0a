use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use rae_lang::{
    Env, Ident, Interpreter, Invocation, Options, Outcome, ReadOnlyState, StateVariables, Value,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::domain::{Domain, Method, Precondition};
use crate::error::{EngineError, Result};

/// Parameter values of one method instance, in method parameter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Binding(SmallVec<[(Ident, Value); 4]>);

impl Binding {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ident, &Value)> {
        self.0.iter().map(|(n, v)| (n, v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Local environment a method body or precondition starts with.
    pub fn to_env(&self) -> Env {
        self.0.iter().cloned().collect()
    }
}

impl<K: Into<Ident>, V: Into<Value>> FromIterator<(K, V)> for Binding {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0.iter().map(|(n, v)| format!("{}={}", n, v)).join(", ")
        )
    }
}

/// A method together with a binding for which its precondition held.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub method: Ident,
    pub binding: Binding,
}

impl Display for Candidate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.method, self.binding)
    }
}

/// Order in which methods of a task are considered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CandidateOrder {
    #[default]
    Declaration,
    /// Methods are shuffled with an RNG seeded once per generator.
    Shuffled { seed: u64 },
}

/// Enumerates applicable method instances for task invocations.
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    options: Options,
    rng: Option<StdRng>,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self::new(CandidateOrder::Declaration, Options::default())
    }
}

impl CandidateGenerator {
    /// `options` apply to precondition expressions.
    pub fn new(order: CandidateOrder, options: Options) -> Self {
        let rng = match order {
            CandidateOrder::Declaration => None,
            CandidateOrder::Shuffled { seed } => Some(StdRng::seed_from_u64(seed)),
        };
        Self { options, rng }
    }

    /// Returns every `(method, binding)` of `invocation` whose precondition
    /// holds in `state`.
    ///
    /// Candidates come in method order, then in odometer order of the free
    /// parameters (the last one varies fastest). An argument count that does
    /// not match the task signature is an [`EngineError::ArityMismatch`].
    pub fn generate(
        &mut self,
        domain: &Domain,
        invocation: &Invocation,
        state: &StateVariables,
    ) -> Result<Vec<Candidate>> {
        let Some(task) = domain.task(&invocation.name) else {
            tracing::debug!(task = %invocation, "no such task");
            return Ok(Vec::new());
        };

        if task.arity() != invocation.arity() {
            return Err(EngineError::ArityMismatch {
                task: invocation.name.clone(),
                expected: task.arity(),
                got: invocation.arity(),
            });
        }

        let mut methods = domain.methods_for(&invocation.name).collect_vec();
        if let Some(rng) = self.rng.as_mut() {
            methods.shuffle(rng);
        }

        let mut candidates = Vec::new();
        for method in methods {
            self.instantiate(domain, method, &task.params, invocation, state, &mut candidates);
        }

        tracing::debug!(
            task = %invocation,
            candidates = candidates.len(),
            "generated candidates"
        );
        Ok(candidates)
    }

    fn instantiate(
        &self,
        domain: &Domain,
        method: &Method,
        task_params: &[Ident],
        invocation: &Invocation,
        state: &StateVariables,
        out: &mut Vec<Candidate>,
    ) {
        let bound = |param: &Ident| {
            task_params
                .iter()
                .position(|p| p == param)
                .map(|i| invocation.args[i].clone())
        };
        let free = method.params.iter().filter(|p| bound(p).is_none()).count();

        let assignments: Box<dyn Iterator<Item = Vec<Value>>> = if free == 0 {
            Box::new(std::iter::once(Vec::new()))
        } else {
            Box::new(
                (0..free)
                    .map(|_| domain.objects().iter().cloned())
                    .multi_cartesian_product(),
            )
        };

        for assignment in assignments {
            let mut free_values = assignment.into_iter();
            let binding: Binding = method
                .params
                .iter()
                .map(|param| {
                    let value = bound(param).or_else(|| free_values.next()).unwrap_or(Value::NONE);
                    (param.clone(), value)
                })
                .collect();

            if self.holds(method, &binding, state) {
                out.push(Candidate {
                    method: method.name.clone(),
                    binding,
                });
            }
        }
    }

    fn holds(&self, method: &Method, binding: &Binding, state: &StateVariables) -> bool {
        let result = match &method.precondition {
            Precondition::Always => return true,
            Precondition::Native(f) => f(state, binding),
            Precondition::Expr(node) => {
                let mut run = Interpreter::new(node.clone(), binding.to_env(), self.options.clone());
                match run.step(&mut ReadOnlyState(state)) {
                    Ok(Outcome::Finished(value)) => match value.as_bool() {
                        Some(b) => Ok(b),
                        None => {
                            tracing::debug!(
                                method = %method.name,
                                %binding,
                                value = %value,
                                "precondition is not boolean"
                            );
                            Ok(false)
                        }
                    },
                    Ok(Outcome::Suspended(dp)) => {
                        tracing::debug!(method = %method.name, %binding, decision_point = %dp, "precondition suspended");
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            }
        };

        result.unwrap_or_else(|e| {
            tracing::debug!(method = %method.name, %binding, error = %e, "precondition failed");
            false
        })
    }
}

/// Candidates of `invocation` in declaration order with default interpreter options.
pub fn get_candidates(
    domain: &Domain,
    invocation: &Invocation,
    state: &StateVariables,
) -> Result<Vec<Candidate>> {
    CandidateGenerator::default().generate(domain, invocation, state)
}
