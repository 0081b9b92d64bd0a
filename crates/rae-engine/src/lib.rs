//! `rae-engine` refines hierarchical tasks into commands, either online while
//! acting ([`Rae`]) or offline by simulated search ([`Planner`]).
//!
//! A [`Domain`] declares tasks, the methods that refine them and the commands
//! that act on the world. Method bodies are `rae-lang` instruction trees.
//!
//! ## Examples
//!
//! ```rust
//! use rae_engine::{Config, Domain, Method, TaskStatus};
//! use rae_lang::{Invocation, Node, StateVariables, Value};
//!
//! let domain = Domain::builder()
//!     .task("go", ["to"])
//!     .command("move", |state: &mut StateVariables, args: &[Value]| {
//!         state.set("at", Vec::<Value>::new(), args[0].clone());
//!         true
//!     })
//!     .method(
//!         Method::new("m_go", "go", ["to"])
//!             .with_body(Node::call("move", vec![Node::local("to")])),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let go = Invocation::new("go", ["home"]);
//!
//! let mut state = StateVariables::new();
//! let plan = rae_engine::plan(&domain, &mut state, &go, &Config::default())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(plan.commands().len(), 1);
//!
//! let report = rae_engine::run(domain, StateVariables::new(), go, &Config::default()).unwrap();
//! assert_eq!(report.reports[0].status, TaskStatus::Succeeded);
//! assert_eq!(report.state.get("at", &[]), Some(&Value::from("home")));
//! ```
pub mod candidate;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod planner;
pub mod rae;

pub use candidate::{Binding, Candidate, CandidateGenerator, CandidateOrder, get_candidates};
pub use config::{Config, LogConfig, LogFormat};
pub use domain::{
    Assignment, Command, Domain, DomainBuilder, DomainDescription, Fact, Method, ObjectUniverse,
    Precondition, TaskSignature,
};
pub use error::{ConfigError, DomainError, EngineError, Result};
pub use planner::{Plan, PlanStep, Planner, PlannerConfig, PlannerStats, plan};
pub use rae::{
    ExecutedCommand, FailureReason, Rae, RunReport, TaskId, TaskReport, TaskStatus, run,
};
