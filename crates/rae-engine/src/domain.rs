//! Method, task and command tables plus the static description of a world.
//!
//! A [`Domain`] is assembled once through [`DomainBuilder`] and is read-only
//! afterwards. Building resolves every method body against the declared task
//! and command names.

use std::fmt::{self, Debug, Formatter};

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use rae_lang::{Ident, Invocation, Node, Shared, StateVariables, Symbols, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::candidate::Binding;
use crate::error::DomainError;

/// Declared name and parameter list of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSignature {
    pub name: Ident,
    pub params: Vec<Ident>,
}

impl TaskSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

pub type NativePrecondition =
    dyn Fn(&StateVariables, &Binding) -> Result<bool, rae_lang::EvalError> + Send + Sync;

/// Gate deciding whether a method instance may be chosen.
#[derive(Clone, Default)]
pub enum Precondition {
    #[default]
    Always,
    /// Boolean expression evaluated with the binding as its local environment.
    Expr(Shared<Node>),
    Native(Shared<NativePrecondition>),
}

impl Debug for Precondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::Always => write!(f, "Always"),
            Precondition::Expr(node) => f.debug_tuple("Expr").field(node).finish(),
            Precondition::Native(_) => write!(f, "Native(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: Ident,
    pub task: Ident,
    pub params: Vec<Ident>,
    pub precondition: Precondition,
    pub body: Shared<Node>,
}

impl Method {
    pub fn new<I, T>(name: impl Into<Ident>, task: impl Into<Ident>, params: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Ident>,
    {
        Self {
            name: name.into(),
            task: task.into(),
            params: params.into_iter().map(Into::into).collect(),
            precondition: Precondition::Always,
            body: Node::noop(),
        }
    }

    pub fn with_precondition(mut self, precondition: Shared<Node>) -> Self {
        self.precondition = Precondition::Expr(precondition);
        self
    }

    pub fn with_native_precondition<F>(mut self, precondition: F) -> Self
    where
        F: Fn(&StateVariables, &Binding) -> Result<bool, rae_lang::EvalError> + Send + Sync + 'static,
    {
        self.precondition = Precondition::Native(Shared::new(precondition));
        self
    }

    pub fn with_body(mut self, body: Shared<Node>) -> Self {
        self.body = body;
        self
    }
}

/// A primitive action with real effects on the state.
pub trait Command: Send + Sync {
    /// Executes the command, returning `false` on failure.
    fn execute(&self, state: &mut StateVariables, args: &[Value]) -> bool;
}

impl<F> Command for F
where
    F: Fn(&mut StateVariables, &[Value]) -> bool + Send + Sync,
{
    fn execute(&self, state: &mut StateVariables, args: &[Value]) -> bool {
        self(state, args)
    }
}

/// A state-variable assignment `name(args) = value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: Ident,
    #[serde(default)]
    pub args: Vec<Value>,
    pub value: Value,
}

/// A rigid relation fact `name(args)`, stored as `name(args) = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub name: Ident,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Data part of a domain, as handed over by an external loader.
///
/// ```json
/// {
///   "objects": { "robots": ["r1"], "docks": ["d1", "d2"] },
///   "rigid": [{ "name": "adjacent", "args": ["d1", "d2"] }],
///   "initial": [{ "name": "loc", "args": ["r1"], "value": "d1" }],
///   "goal": [{ "name": "loc", "args": ["r1"], "value": "d2" }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainDescription {
    pub objects: IndexMap<Ident, Vec<Value>>,
    pub rigid: Vec<Fact>,
    pub initial: Vec<Assignment>,
    pub goal: Vec<Assignment>,
}

impl DomainDescription {
    pub fn from_json_str(json: &str) -> Result<Self, DomainError> {
        serde_json::from_str(json).map_err(|e| DomainError::InvalidDescription(e.to_string()))
    }
}

/// Every object atom of the domain, de-duplicated, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectUniverse(IndexSet<Value>);

impl ObjectUniverse {
    pub fn iter(&self) -> impl Iterator<Item = &Value> + Clone {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }
}

impl FromIterator<Value> for ObjectUniverse {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub struct Domain {
    methods: Vec<Shared<Method>>,
    method_index: FxHashMap<Ident, usize>,
    methods_by_task: FxHashMap<Ident, Vec<usize>>,
    tasks: IndexMap<Ident, TaskSignature>,
    commands: IndexMap<Ident, Shared<dyn Command>>,
    objects: IndexMap<Ident, Vec<Value>>,
    universe: ObjectUniverse,
    initial_state: StateVariables,
    goal: Vec<Assignment>,
}

impl Debug for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("tasks", &self.tasks.keys().collect_vec())
            .field("methods", &self.methods.iter().map(|m| &m.name).collect_vec())
            .field("commands", &self.commands.keys().collect_vec())
            .field("objects", &self.universe.len())
            .finish()
    }
}

impl Domain {
    pub fn builder() -> DomainBuilder {
        DomainBuilder::default()
    }

    pub fn task(&self, name: &str) -> Option<&TaskSignature> {
        self.tasks.get(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskSignature> {
        self.tasks.values()
    }

    pub fn method(&self, name: &str) -> Option<&Shared<Method>> {
        self.method_index.get(name).map(|&i| &self.methods[i])
    }

    /// Methods refining `task`, in declaration order.
    pub fn methods_for<'a>(&'a self, task: &str) -> impl Iterator<Item = &'a Shared<Method>> + 'a {
        self.methods_by_task
            .get(task)
            .into_iter()
            .flatten()
            .map(move |&i| &self.methods[i])
    }

    pub fn command(&self, name: &str) -> Option<&Shared<dyn Command>> {
        self.commands.get(name)
    }

    pub fn objects(&self) -> &ObjectUniverse {
        &self.universe
    }

    /// Atoms of one named object set.
    pub fn object_set(&self, name: &str) -> Option<&[Value]> {
        self.objects.get(name).map(Vec::as_slice)
    }

    /// State built from rigid facts and initial assignments.
    pub fn initial_state(&self) -> StateVariables {
        self.initial_state.clone()
    }

    pub fn goal(&self) -> &[Assignment] {
        &self.goal
    }

    /// Returns `true` if every goal assignment holds in `state`.
    pub fn goal_satisfied(&self, state: &StateVariables) -> bool {
        self.goal
            .iter()
            .all(|a| state.get(&a.name, &a.args) == Some(&a.value))
    }

    /// Goal assignments that do not hold in `state`, as `name(args)`.
    pub fn unmet_goals<'a>(&'a self, state: &'a StateVariables) -> impl Iterator<Item = Invocation> + 'a {
        self.goal
            .iter()
            .filter(move |a| state.get(&a.name, &a.args) != Some(&a.value))
            .map(|a| Invocation::new(a.name.clone(), a.args.iter().cloned()))
    }
}

#[derive(Default)]
pub struct DomainBuilder {
    tasks: Vec<TaskSignature>,
    methods: Vec<Method>,
    commands: Vec<(Ident, Shared<dyn Command>)>,
    description: DomainDescription,
}

impl DomainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task<I, T>(mut self, name: impl Into<Ident>, params: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Ident>,
    {
        self.tasks.push(TaskSignature {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn command(mut self, name: impl Into<Ident>, command: impl Command + 'static) -> Self {
        let command: Shared<dyn Command> = Shared::new(command);
        self.commands.push((name.into(), command));
        self
    }

    /// Merges a loader-provided description into the one being built.
    pub fn description(mut self, description: DomainDescription) -> Self {
        for (set, atoms) in description.objects {
            self.description.objects.entry(set).or_default().extend(atoms);
        }
        self.description.rigid.extend(description.rigid);
        self.description.initial.extend(description.initial);
        self.description.goal.extend(description.goal);
        self
    }

    pub fn objects<I, T>(mut self, set: impl Into<Ident>, atoms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.description
            .objects
            .entry(set.into())
            .or_default()
            .extend(atoms.into_iter().map(Into::into));
        self
    }

    pub fn rigid<I, T>(mut self, name: impl Into<Ident>, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.description.rigid.push(Fact {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn initial<I, T>(mut self, name: impl Into<Ident>, args: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.description.initial.push(Assignment {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            value: value.into(),
        });
        self
    }

    pub fn goal<I, T>(mut self, name: impl Into<Ident>, args: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.description.goal.push(Assignment {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            value: value.into(),
        });
        self
    }

    pub fn build(self) -> Result<Domain, DomainError> {
        let mut tasks = IndexMap::with_capacity(self.tasks.len());
        for task in self.tasks {
            check_unique_params(&task.name, &task.params)?;
            if tasks.contains_key(&task.name) {
                return Err(DomainError::DuplicateTask(task.name));
            }
            tasks.insert(task.name.clone(), task);
        }

        let mut commands: IndexMap<Ident, Shared<dyn Command>> = IndexMap::default();
        for (name, command) in self.commands {
            if commands.contains_key(&name) {
                return Err(DomainError::DuplicateCommand(name));
            }
            commands.insert(name, command);
        }

        let symbols = Symbols::new()
            .with_tasks(tasks.keys().cloned())
            .with_commands(commands.keys().cloned());

        let mut methods = Vec::with_capacity(self.methods.len());
        let mut method_index = FxHashMap::default();
        let mut methods_by_task: FxHashMap<Ident, Vec<usize>> = FxHashMap::default();

        for mut method in self.methods {
            check_unique_params(&method.name, &method.params)?;
            let signature = tasks.get(&method.task).ok_or_else(|| DomainError::UnknownTask {
                method: method.name.clone(),
                task: method.task.clone(),
            })?;
            if let Some(param) = signature.params.iter().find(|p| !method.params.contains(p)) {
                return Err(DomainError::TaskParameterNotInMethod {
                    method: method.name.clone(),
                    task: method.task.clone(),
                    param: param.clone(),
                });
            }
            if method_index.contains_key(&method.name) {
                return Err(DomainError::DuplicateMethod(method.name));
            }

            method.body = rae_lang::resolve(&method.body, &symbols);
            if let Precondition::Expr(node) = &method.precondition {
                method.precondition = Precondition::Expr(rae_lang::resolve(node, &symbols));
            }

            let index = methods.len();
            method_index.insert(method.name.clone(), index);
            methods_by_task.entry(method.task.clone()).or_default().push(index);
            methods.push(Shared::new(method));
        }

        let description = self.description;
        let universe = description.objects.values().flatten().cloned().collect();
        let mut initial_state = StateVariables::new();
        for fact in &description.rigid {
            initial_state.set(fact.name.clone(), fact.args.iter().cloned(), true);
        }
        for assignment in &description.initial {
            initial_state.set(
                assignment.name.clone(),
                assignment.args.iter().cloned(),
                assignment.value.clone(),
            );
        }

        tracing::debug!(
            tasks = tasks.len(),
            methods = methods.len(),
            commands = commands.len(),
            objects = description.objects.len(),
            "domain built"
        );

        Ok(Domain {
            methods,
            method_index,
            methods_by_task,
            tasks,
            commands,
            objects: description.objects,
            universe,
            initial_state,
            goal: description.goal,
        })
    }
}

fn check_unique_params(owner: &Ident, params: &[Ident]) -> Result<(), DomainError> {
    let mut seen = FxHashSet::default();
    match params.iter().find(|p| !seen.insert(*p)) {
        Some(param) => Err(DomainError::DuplicateParameter {
            owner: owner.clone(),
            param: param.clone(),
        }),
        None => Ok(()),
    }
}
