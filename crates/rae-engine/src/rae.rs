//! Online refinement engine.
//!
//! Every submitted task gets its own stack of frames on the agenda. One tick
//! advances each stack by a single interpreter step: to the next command, the
//! next subtask or the end of the current method. Commands change the shared
//! state immediately and are never undone. When a method instance fails, the
//! stack retries the same task with another method instance it has not tried
//! yet and walks up to the parent task once none is left.

use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};

use indexmap::IndexSet;
use rae_lang::{
    DecisionPoint, Interpreter, Invocation, Options, Outcome, Shared, StateVariables, Value,
};
use rustc_hash::FxHashSet;

use crate::candidate::{Candidate, CandidateGenerator};
use crate::config::Config;
use crate::domain::Domain;
use crate::error::{EngineError, Result};

/// Stable identity of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The invocation itself was malformed.
    Usage(EngineError),
    /// No method instance was applicable when the task arrived.
    NoApplicableMethod,
    /// Every method instance of the top-level task failed.
    Exhausted,
    Cancelled,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Usage(e) => write!(f, "usage error: {}", e),
            FailureReason::NoApplicableMethod => write!(f, "no applicable method"),
            FailureReason::Exhausted => write!(f, "all methods failed"),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Succeeded,
    Failed(FailureReason),
    /// Folded into an identical task that had not started yet.
    Merged(TaskId),
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed(reason) => write!(f, "failed: {}", reason),
            TaskStatus::Merged(id) => write!(f, "merged into {}", id),
        }
    }
}

/// Final status of a submitted task and the tick it was decided in.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub id: TaskId,
    pub invocation: Invocation,
    pub status: TaskStatus,
    pub tick: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    pub task: TaskId,
    pub command: Invocation,
    pub succeeded: bool,
}

/// Everything a finished [`Rae`] run leaves behind.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub reports: Vec<TaskReport>,
    pub commands: Vec<ExecutedCommand>,
    pub ticks: u64,
    pub state: StateVariables,
}

impl RunReport {
    pub fn status(&self, id: TaskId) -> Option<&TaskStatus> {
        self.reports.iter().find(|r| r.id == id).map(|r| &r.status)
    }
}

#[derive(Debug)]
struct TaskFrame {
    invocation: Invocation,
    candidate: Candidate,
    run: Option<Interpreter>,
    tried: IndexSet<Candidate>,
}

impl TaskFrame {
    fn new(invocation: Invocation, candidate: Candidate) -> Self {
        Self {
            invocation,
            candidate,
            run: None,
            tried: IndexSet::new(),
        }
    }
}

#[derive(Debug)]
struct TaskStack {
    id: TaskId,
    root: Invocation,
    frames: Vec<TaskFrame>,
}

impl TaskStack {
    fn is_unstarted(&self, invocation: &Invocation, candidate: &Candidate) -> bool {
        match self.frames.as_slice() {
            [frame] => {
                frame.run.is_none() && frame.invocation == *invocation && frame.candidate == *candidate
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct Rae {
    domain: Shared<Domain>,
    state: StateVariables,
    options: Options,
    generator: CandidateGenerator,
    agenda: Vec<TaskStack>,
    pending: VecDeque<(TaskId, Invocation)>,
    cancelled: FxHashSet<TaskId>,
    next_id: u64,
    ticks: u64,
    max_ticks: Option<u64>,
    reports: Vec<TaskReport>,
    commands: Vec<ExecutedCommand>,
}

impl Rae {
    pub fn new(domain: impl Into<Shared<Domain>>, state: StateVariables, config: &Config) -> Self {
        Self {
            domain: domain.into(),
            state,
            options: config.interpreter.clone(),
            generator: CandidateGenerator::new(config.candidate_order, config.interpreter.clone()),
            agenda: Vec::new(),
            pending: VecDeque::new(),
            cancelled: FxHashSet::default(),
            next_id: 0,
            ticks: 0,
            max_ticks: config.max_ticks,
            reports: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Queues a task; it enters the agenda on the next tick.
    pub fn submit(&mut self, invocation: Invocation) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        tracing::debug!(task = %id, %invocation, "submitted");
        self.pending.push_back((id, invocation));
        id
    }

    /// Marks a queued or running task for removal on the next tick.
    ///
    /// Returns `false` if the task already finished or never existed.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let active = self.pending.iter().any(|(p, _)| *p == id)
            || self.agenda.iter().any(|stack| stack.id == id);
        if active {
            self.cancelled.insert(id);
        }
        active
    }

    /// Admits pending tasks, drops cancelled ones and advances every stack once.
    ///
    /// Returns the reports of tasks decided in this tick.
    pub fn tick(&mut self) -> Vec<TaskReport> {
        self.ticks += 1;
        let _span = tracing::debug_span!("tick", tick = self.ticks).entered();
        let mut reports = Vec::new();

        self.admit_pending(&mut reports);
        self.drop_cancelled(&mut reports);

        for mut stack in std::mem::take(&mut self.agenda) {
            match self.progress(&mut stack) {
                None => self.agenda.push(stack),
                Some(status) => reports.push(self.report(stack.id, stack.root, status)),
            }
        }

        self.reports.extend(reports.iter().cloned());
        reports
    }

    /// Ticks until no task is left.
    ///
    /// Fails with [`EngineError::TickBudgetExceeded`] once the total number of
    /// ticks reaches the configured `max_ticks` with work remaining.
    pub fn run(&mut self) -> Result<()> {
        while !self.is_idle() {
            if let Some(max_ticks) = self.max_ticks {
                if self.ticks >= max_ticks {
                    let pending = self.agenda.len() + self.pending.len();
                    tracing::warn!(max_ticks, pending, "tick budget exhausted");
                    return Err(EngineError::TickBudgetExceeded { max_ticks, pending });
                }
            }
            self.tick();
        }
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.agenda.is_empty() && self.pending.is_empty()
    }

    pub fn state(&self) -> &StateVariables {
        &self.state
    }

    /// Injects an external change to the world between ticks.
    pub fn state_mut(&mut self) -> &mut StateVariables {
        &mut self.state
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn reports(&self) -> &[TaskReport] {
        &self.reports
    }

    pub fn status(&self, id: TaskId) -> Option<&TaskStatus> {
        self.reports.iter().find(|r| r.id == id).map(|r| &r.status)
    }

    pub fn commands(&self) -> &[ExecutedCommand] {
        &self.commands
    }

    /// Drains the reports logged so far. [`Rae::status`] only sees reports
    /// logged after the last drain.
    pub fn take_reports(&mut self) -> Vec<TaskReport> {
        std::mem::take(&mut self.reports)
    }

    /// Drains the command log.
    pub fn take_commands(&mut self) -> Vec<ExecutedCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn into_report(self) -> RunReport {
        RunReport {
            reports: self.reports,
            commands: self.commands,
            ticks: self.ticks,
            state: self.state,
        }
    }

    fn admit_pending(&mut self, reports: &mut Vec<TaskReport>) {
        while let Some((id, invocation)) = self.pending.pop_front() {
            if self.cancelled.remove(&id) {
                reports.push(self.report(id, invocation, TaskStatus::Failed(FailureReason::Cancelled)));
                continue;
            }

            let candidates = match self.generator.generate(&self.domain, &invocation, &self.state) {
                Ok(candidates) => candidates,
                Err(e) => {
                    reports.push(self.report(id, invocation, TaskStatus::Failed(FailureReason::Usage(e))));
                    continue;
                }
            };

            let Some(candidate) = candidates.into_iter().next() else {
                reports.push(self.report(
                    id,
                    invocation,
                    TaskStatus::Failed(FailureReason::NoApplicableMethod),
                ));
                continue;
            };

            let duplicate = self
                .agenda
                .iter()
                .find(|stack| stack.is_unstarted(&invocation, &candidate))
                .map(|stack| stack.id);
            match duplicate {
                Some(existing) => {
                    reports.push(self.report(id, invocation, TaskStatus::Merged(existing)));
                }
                None => self.agenda.push(TaskStack {
                    id,
                    root: invocation.clone(),
                    frames: vec![TaskFrame::new(invocation, candidate)],
                }),
            }
        }
    }

    fn drop_cancelled(&mut self, reports: &mut Vec<TaskReport>) {
        if self.cancelled.is_empty() {
            return;
        }

        let (cancelled, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.agenda)
            .into_iter()
            .partition(|stack| self.cancelled.contains(&stack.id));
        self.agenda = kept;

        for stack in cancelled {
            self.cancelled.remove(&stack.id);
            reports.push(self.report(stack.id, stack.root, TaskStatus::Failed(FailureReason::Cancelled)));
        }
    }

    /// Advances `stack` by one step. `None` means the stack stays on the agenda.
    fn progress(&mut self, stack: &mut TaskStack) -> Option<TaskStatus> {
        let id = stack.id;
        let frame = stack.frames.last_mut()?;

        if frame.run.is_none() {
            let Some(method) = self.domain.method(&frame.candidate.method) else {
                return self.retry(stack);
            };
            tracing::debug!(task = %id, invocation = %frame.invocation, method = %frame.candidate, "starting method");
            frame.run = Some(Interpreter::new(
                Shared::clone(&method.body),
                frame.candidate.binding.to_env(),
                self.options.clone(),
            ));
        }

        let outcome = match frame.run.as_mut() {
            Some(run) => run.step(&mut self.state),
            None => return self.retry(stack),
        };
        tracing::trace!(task = %id, ?outcome, "stepped");

        match outcome {
            Ok(Outcome::Finished(_)) => {
                stack.frames.pop();
                if stack.frames.is_empty() {
                    Some(TaskStatus::Succeeded)
                } else {
                    self.resume_top(stack)
                }
            }
            Ok(Outcome::Suspended(DecisionPoint::Command(command))) => {
                let Some(handler) = self.domain.command(&command.name) else {
                    tracing::warn!(task = %id, %command, "unknown command");
                    return self.retry(stack);
                };
                let succeeded = handler.execute(&mut self.state, &command.args);
                tracing::debug!(task = %id, %command, succeeded, "executed command");
                self.commands.push(ExecutedCommand {
                    task: id,
                    command,
                    succeeded,
                });

                if succeeded {
                    self.resume_top(stack)
                } else {
                    self.retry(stack)
                }
            }
            Ok(Outcome::Suspended(DecisionPoint::Task(subtask))) => {
                let candidates = match self.generator.generate(&self.domain, &subtask, &self.state) {
                    Ok(candidates) => candidates,
                    Err(e) => return Some(TaskStatus::Failed(FailureReason::Usage(e))),
                };
                match candidates.into_iter().next() {
                    Some(candidate) => {
                        stack.frames.push(TaskFrame::new(subtask, candidate));
                        None
                    }
                    None => {
                        tracing::debug!(task = %id, %subtask, "no applicable method for subtask");
                        self.retry(stack)
                    }
                }
            }
            Err(e) => {
                tracing::debug!(task = %id, error = %e, "method failed");
                self.retry(stack)
            }
        }
    }

    /// Reports the success of a child frame to the frame below it.
    fn resume_top(&mut self, stack: &mut TaskStack) -> Option<TaskStatus> {
        let resumed = stack
            .frames
            .last_mut()
            .and_then(|frame| frame.run.as_mut())
            .map(|run| run.resume(Value::TRUE));

        match resumed {
            Some(Ok(())) => None,
            Some(Err(e)) => {
                tracing::debug!(task = %stack.id, error = %e, "resume failed");
                self.retry(stack)
            }
            None => self.retry(stack),
        }
    }

    /// Replaces the failing top frame with an untried method instance of the
    /// same task, walking up the stack while none is left.
    fn retry(&mut self, stack: &mut TaskStack) -> Option<TaskStatus> {
        while let Some(failed) = stack.frames.pop() {
            let TaskFrame {
                invocation,
                candidate,
                mut tried,
                ..
            } = failed;
            tried.insert(candidate);

            let candidates = match self.generator.generate(&self.domain, &invocation, &self.state) {
                Ok(candidates) => candidates,
                Err(e) => return Some(TaskStatus::Failed(FailureReason::Usage(e))),
            };

            match candidates.into_iter().find(|c| !tried.contains(c)) {
                Some(next) => {
                    tracing::debug!(task = %stack.id, %invocation, method = %next, "retrying");
                    stack.frames.push(TaskFrame {
                        invocation,
                        candidate: next,
                        run: None,
                        tried,
                    });
                    return None;
                }
                None => {
                    tracing::debug!(task = %stack.id, %invocation, tried = tried.len(), "no untried method left");
                }
            }
        }

        Some(TaskStatus::Failed(FailureReason::Exhausted))
    }

    fn report(&self, id: TaskId, invocation: Invocation, status: TaskStatus) -> TaskReport {
        match &status {
            TaskStatus::Succeeded | TaskStatus::Merged(_) => {
                tracing::info!(task = %id, %invocation, %status, "task finished")
            }
            TaskStatus::Failed(_) => tracing::info!(task = %id, %invocation, %status, "task failed"),
        }

        TaskReport {
            id,
            invocation,
            status,
            tick: self.ticks,
        }
    }
}

/// Runs a single task to completion on a fresh engine.
pub fn run(
    domain: impl Into<Shared<Domain>>,
    state: StateVariables,
    invocation: Invocation,
    config: &Config,
) -> Result<RunReport> {
    let mut rae = Rae::new(domain, state, config);
    rae.submit(invocation);
    rae.run()?;
    Ok(rae.into_report())
}
