//! Offline depth-first refinement planner.
//!
//! The planner simulates method bodies against a working copy of the state,
//! executing commands for their effects and recursing into subtasks. A failed
//! method instance restores the state it started from before the next
//! candidate is tried.

use std::fmt::{self, Display, Formatter};

use rae_lang::{DecisionPoint, Interpreter, Invocation, Options, Outcome, StateVariables, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, CandidateGenerator};
use crate::config::Config;
use crate::domain::Domain;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Deepest subtask nesting explored. The top-level task has depth 0.
    pub max_depth: Option<usize>,
    /// Reuses results for an invocation seen before from an identical state.
    /// Only sound for deterministic commands.
    pub memoize: bool,
}

/// A decomposition of one task into commands and sub-plans.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub task: Invocation,
    pub method: Candidate,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Command(Invocation),
    Subplan(Plan),
}

impl Plan {
    /// Commands of the plan in execution order, sub-plans flattened.
    pub fn commands(&self) -> Vec<&Invocation> {
        let mut commands = Vec::new();
        self.collect_commands(&mut commands);
        commands
    }

    fn collect_commands<'a>(&'a self, out: &mut Vec<&'a Invocation>) {
        for step in &self.steps {
            match step {
                PlanStep::Command(command) => out.push(command),
                PlanStep::Subplan(plan) => plan.collect_commands(out),
            }
        }
    }

    /// Number of commands, sub-plans included.
    pub fn len(&self) -> usize {
        self.steps
            .iter()
            .map(|step| match step {
                PlanStep::Command(_) => 1,
                PlanStep::Subplan(plan) => plan.len(),
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fmt_indented(&self, f: &mut Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{} via {}", "", self.task, self.method, indent = indent)?;
        for step in &self.steps {
            match step {
                PlanStep::Command(command) => {
                    writeln!(f, "{:indent$}{}", "", command, indent = indent + 2)?
                }
                PlanStep::Subplan(plan) => plan.fmt_indented(f, indent + 2)?,
            }
        }
        Ok(())
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Counters of one planner instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlannerStats {
    pub expansions: usize,
    pub backtracks: usize,
    pub memo_hits: usize,
}

#[derive(Debug, Clone)]
struct MemoEntry {
    depth: usize,
    before: StateVariables,
    result: Option<(Plan, StateVariables)>,
}

impl MemoEntry {
    fn reusable_at(&self, depth: usize, bounded: bool) -> bool {
        match (&self.result, bounded) {
            (_, false) => true,
            (Some(_), true) => depth <= self.depth,
            (None, true) => depth >= self.depth,
        }
    }
}

#[derive(Debug)]
pub struct Planner<'a> {
    domain: &'a Domain,
    config: PlannerConfig,
    options: Options,
    generator: CandidateGenerator,
    memo: FxHashMap<Invocation, Vec<MemoEntry>>,
    stats: PlannerStats,
}

impl<'a> Planner<'a> {
    pub fn new(domain: &'a Domain, config: &Config) -> Self {
        Self {
            domain,
            config: config.planner,
            options: config.interpreter.clone(),
            generator: CandidateGenerator::new(config.candidate_order, config.interpreter.clone()),
            memo: FxHashMap::default(),
            stats: PlannerStats::default(),
        }
    }

    pub fn stats(&self) -> PlannerStats {
        self.stats
    }

    /// Searches for a decomposition of `task` starting from `state`.
    ///
    /// On success `state` holds the effects of the returned plan. On `None`
    /// or an error it is left exactly as it was passed in. An invocation with
    /// the wrong number of arguments anywhere in the search is returned as an
    /// error.
    pub fn plan(&mut self, state: &mut StateVariables, task: &Invocation) -> Result<Option<Plan>> {
        self.plan_task(state, task, 0)
    }

    fn plan_task(
        &mut self,
        state: &mut StateVariables,
        task: &Invocation,
        depth: usize,
    ) -> Result<Option<Plan>> {
        let _span = tracing::debug_span!("decompose", task = %task, depth).entered();

        if let Some(max_depth) = self.config.max_depth {
            if depth > max_depth {
                tracing::debug!(max_depth, "depth bound reached");
                return Ok(None);
            }
        }

        if self.config.memoize {
            if let Some(result) = self.recall(task, state, depth) {
                self.stats.memo_hits += 1;
                tracing::trace!(found = result.is_some(), "memo hit");
                return Ok(result.map(|(plan, after)| {
                    *state = after;
                    plan
                }));
            }
        }

        let before = self.config.memoize.then(|| state.clone());
        let result = self.search(state, task, depth)?;

        if let Some(before) = before {
            self.memo.entry(task.clone()).or_default().push(MemoEntry {
                depth,
                before,
                result: result.as_ref().map(|plan| (plan.clone(), state.clone())),
            });
        }

        Ok(result)
    }

    fn recall(
        &self,
        task: &Invocation,
        state: &StateVariables,
        depth: usize,
    ) -> Option<Option<(Plan, StateVariables)>> {
        let bounded = self.config.max_depth.is_some();
        self.memo
            .get(task)?
            .iter()
            .find(|entry| entry.before == *state && entry.reusable_at(depth, bounded))
            .map(|entry| entry.result.clone())
    }

    fn search(
        &mut self,
        state: &mut StateVariables,
        task: &Invocation,
        depth: usize,
    ) -> Result<Option<Plan>> {
        self.stats.expansions += 1;
        let candidates = self.generator.generate(self.domain, task, state)?;

        for candidate in candidates {
            let snapshot = state.clone();
            match self.attempt(state, &candidate, depth) {
                Ok(Some(steps)) => {
                    tracing::debug!(method = %candidate, "decomposed");
                    return Ok(Some(Plan {
                        task: task.clone(),
                        method: candidate,
                        steps,
                    }));
                }
                Ok(None) => {
                    *state = snapshot;
                    self.stats.backtracks += 1;
                    tracing::debug!(method = %candidate, "backtracking");
                }
                Err(e) => {
                    *state = snapshot;
                    return Err(e);
                }
            }
        }

        Ok(None)
    }

    fn attempt(
        &mut self,
        state: &mut StateVariables,
        candidate: &Candidate,
        depth: usize,
    ) -> Result<Option<Vec<PlanStep>>> {
        let Some(method) = self.domain.method(&candidate.method) else {
            return Ok(None);
        };
        let mut run = Interpreter::new(
            method.body.clone(),
            candidate.binding.to_env(),
            self.options.clone(),
        );
        let mut steps = Vec::new();

        loop {
            let outcome = match run.step(state) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::debug!(method = %candidate, error = %e, "method failed");
                    return Ok(None);
                }
            };

            match outcome {
                Outcome::Finished(_) => return Ok(Some(steps)),
                Outcome::Suspended(DecisionPoint::Command(command)) => {
                    let succeeded = match self.domain.command(&command.name) {
                        Some(c) => c.execute(state, &command.args),
                        None => {
                            tracing::warn!(%command, "unknown command");
                            false
                        }
                    };
                    if !succeeded {
                        tracing::debug!(%command, "command failed");
                        return Ok(None);
                    }
                    steps.push(PlanStep::Command(command));
                }
                Outcome::Suspended(DecisionPoint::Task(subtask)) => {
                    match self.plan_task(state, &subtask, depth + 1)? {
                        Some(plan) => steps.push(PlanStep::Subplan(plan)),
                        None => return Ok(None),
                    }
                }
            }

            run.resume(Value::TRUE)?;
        }
    }
}

/// Plans `task` from `state` with a fresh [`Planner`].
pub fn plan(
    domain: &Domain,
    state: &mut StateVariables,
    task: &Invocation,
    config: &Config,
) -> Result<Option<Plan>> {
    Planner::new(domain, config).plan(state, task)
}

#[cfg(test)]
mod tests {
    use rae_lang::{BinaryOp, Ident, Node, Shared};
    use rstest::rstest;

    use super::*;
    use crate::domain::Method;
    use crate::error::EngineError;

    fn counter() -> Shared<Node> {
        Node::call("n", vec![])
    }

    fn increment(state: &mut StateVariables, _: &[Value]) -> bool {
        match state.get("n", &[]).map(|n| n.binary(BinaryOp::Add, &Value::from(1))) {
            Some(Ok(next)) => {
                state.set("n", Vec::<Value>::new(), next);
                true
            }
            _ => false,
        }
    }

    fn state(n: i64) -> StateVariables {
        let mut state = StateVariables::new();
        state.set("n", Vec::<Value>::new(), n);
        state
    }

    /// `walk` increments `n` once per level until it reaches 3.
    fn walk_domain() -> Domain {
        Domain::builder()
            .task("walk", Vec::<Ident>::new())
            .command("inc", increment)
            .method(
                Method::new("m_step", "walk", Vec::<Ident>::new())
                    .with_precondition(Node::binary(BinaryOp::Lt, counter(), Node::literal(3)))
                    .with_body(Node::seq([Node::call("inc", vec![]), Node::call("walk", vec![])])),
            )
            .method(
                Method::new("m_done", "walk", Vec::<Ident>::new())
                    .with_precondition(Node::equals(counter(), Node::literal(3))),
            )
            .build()
            .unwrap()
    }

    fn walk() -> Invocation {
        Invocation::new("walk", Vec::<Value>::new())
    }

    #[test]
    fn test_recursive_plan() {
        let domain = walk_domain();
        let mut state = state(0);
        let plan = plan(&domain, &mut state, &walk(), &Config::default())
            .unwrap()
            .unwrap();

        assert_eq!(plan.len(), 3);
        assert!(plan.commands().iter().all(|c| c.name == "inc"));
        assert_eq!(state.get("n", &[]), Some(&Value::from(3)));
        assert_eq!(
            plan.to_string(),
            "walk() via m_step()\n  inc()\n  walk() via m_step()\n    inc()\n    walk() via m_step()\n      inc()\n      walk() via m_done()\n"
        );
    }

    #[rstest]
    #[case::too_shallow(Some(2), false)]
    #[case::exact(Some(3), true)]
    #[case::unbounded(None, true)]
    fn test_max_depth(#[case] max_depth: Option<usize>, #[case] found: bool) {
        let domain = walk_domain();
        let config = Config {
            planner: PlannerConfig {
                max_depth,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut state = state(0);
        let plan = plan(&domain, &mut state, &walk(), &config).unwrap();

        assert_eq!(plan.is_some(), found);
        let expected = if found { 3 } else { 0 };
        assert_eq!(state.get("n", &[]), Some(&Value::from(expected)));
    }

    #[test]
    fn test_failed_method_rolls_back() {
        let domain = Domain::builder()
            .task("top", Vec::<Ident>::new())
            .command("inc", increment)
            .method(
                Method::new("m_greedy", "top", Vec::<Ident>::new()).with_body(Node::seq([
                    Node::call("inc", vec![]),
                    Node::call("inc", vec![]),
                    Node::fail(),
                ])),
            )
            .method(
                Method::new("m_modest", "top", Vec::<Ident>::new())
                    .with_body(Node::call("inc", vec![])),
            )
            .build()
            .unwrap();
        let mut planner = Planner::new(&domain, &Config::default());
        let mut state = state(0);
        let plan = planner
            .plan(&mut state, &Invocation::new("top", Vec::<Value>::new()))
            .unwrap()
            .unwrap();

        assert_eq!(plan.method.method, "m_modest");
        assert_eq!(plan.len(), 1);
        assert_eq!(state.get("n", &[]), Some(&Value::from(1)));
        assert_eq!(planner.stats().backtracks, 1);
    }

    #[test]
    fn test_memo_reuses_subplans() {
        let domain = Domain::builder()
            .task("top", Vec::<Ident>::new())
            .task("sub", Vec::<Ident>::new())
            .command("inc", increment)
            .method(
                Method::new("m_first", "top", Vec::<Ident>::new())
                    .with_body(Node::seq([Node::call("sub", vec![]), Node::fail()])),
            )
            .method(
                Method::new("m_second", "top", Vec::<Ident>::new())
                    .with_body(Node::call("sub", vec![])),
            )
            .method(
                Method::new("m_sub", "sub", Vec::<Ident>::new())
                    .with_body(Node::seq([Node::call("inc", vec![]), Node::call("inc", vec![])])),
            )
            .build()
            .unwrap();
        let top = Invocation::new("top", Vec::<Value>::new());

        let run = |memoize| {
            let config = Config {
                planner: PlannerConfig {
                    memoize,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut planner = Planner::new(&domain, &config);
            let mut state = state(0);
            let plan = planner.plan(&mut state, &top).unwrap();
            (plan, state, planner.stats())
        };

        let (plain, plain_state, plain_stats) = run(false);
        let (memo, memo_state, memo_stats) = run(true);

        assert_eq!(plain, memo);
        assert_eq!(plain_state, memo_state);
        assert_eq!(memo_state.get("n", &[]), Some(&Value::from(2)));
        assert_eq!(plain_stats.memo_hits, 0);
        assert_eq!(memo_stats.memo_hits, 1);
        assert!(memo_stats.expansions < plain_stats.expansions);
    }

    #[test]
    fn test_nested_arity_mismatch_is_error() {
        let domain = Domain::builder()
            .task("top", Vec::<Ident>::new())
            .task("sub", ["x"])
            .method(
                Method::new("m_top", "top", Vec::<Ident>::new())
                    .with_body(Node::call("sub", vec![])),
            )
            .method(Method::new("m_sub", "sub", ["x"]))
            .build()
            .unwrap();
        let mut state = StateVariables::new();

        assert_eq!(
            plan(
                &domain,
                &mut state,
                &Invocation::new("top", Vec::<Value>::new()),
                &Config::default()
            ),
            Err(EngineError::ArityMismatch {
                task: "sub".into(),
                expected: 1,
                got: 0
            })
        );
    }

    #[test]
    fn test_arity_mismatch_restores_state() {
        let domain = Domain::builder()
            .task("top", Vec::<Ident>::new())
            .task("sub", ["x"])
            .command("mark", |state: &mut StateVariables, _: &[Value]| {
                state.set("marked", Vec::<Value>::new(), true);
                true
            })
            .command("inc", increment)
            .method(
                Method::new("m_top", "top", Vec::<Ident>::new()).with_body(Node::seq([
                    Node::call("mark", vec![]),
                    Node::call("inc", vec![]),
                    Node::call("sub", vec![]),
                ])),
            )
            .method(Method::new("m_sub", "sub", ["x"]))
            .build()
            .unwrap();
        let mut state = state(0);
        let before = state.clone();

        let result = plan(
            &domain,
            &mut state,
            &Invocation::new("top", Vec::<Value>::new()),
            &Config::default(),
        );

        assert!(matches!(result, Err(EngineError::ArityMismatch { .. })));
        assert_eq!(state, before);
        assert_eq!(state.get("marked", &[]), None);
    }
}
