use miette::Diagnostic;
use rae_lang::{EvalError, Ident};
use thiserror::Error;

/// Problems detected while assembling a [`crate::Domain`].
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error(r#"Task "{0}" is declared twice"#)]
    #[diagnostic(code(rae::domain::duplicate_task))]
    DuplicateTask(Ident),
    #[error(r#"Method "{0}" is declared twice"#)]
    #[diagnostic(code(rae::domain::duplicate_method))]
    DuplicateMethod(Ident),
    #[error(r#"Command "{0}" is declared twice"#)]
    #[diagnostic(code(rae::domain::duplicate_command))]
    DuplicateCommand(Ident),
    #[error(r#"Method "{method}" refines unknown task "{task}""#)]
    #[diagnostic(code(rae::domain::unknown_task), help("declare the task before building the domain"))]
    UnknownTask { method: Ident, task: Ident },
    #[error(r#"Parameter "{param}" of task "{task}" is not a parameter of method "{method}""#)]
    #[diagnostic(
        code(rae::domain::unbound_parameter),
        help("every task parameter must appear in the parameter list of its methods")
    )]
    TaskParameterNotInMethod {
        method: Ident,
        task: Ident,
        param: Ident,
    },
    #[error(r#"Parameter "{param}" is declared twice in "{owner}""#)]
    #[diagnostic(code(rae::domain::duplicate_parameter))]
    DuplicateParameter { owner: Ident, param: Ident },
    #[error("Invalid domain description: {0}")]
    #[diagnostic(code(rae::domain::invalid_description))]
    InvalidDescription(String),
}

/// Problems reading configuration from TOML or the environment.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    #[diagnostic(code(rae::config::io))]
    Io { path: String, message: String },
    #[error("Invalid config: {0}")]
    #[diagnostic(code(rae::config::parse))]
    Parse(String),
    #[error("Invalid value {value:?} for {name}")]
    #[diagnostic(code(rae::config::invalid_value))]
    InvalidValue {
        name: &'static str,
        value: String,
        #[help]
        expected: &'static str,
    },
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(r#"Invalid number of arguments for task "{task}", expected {expected}, got {got}"#)]
    #[diagnostic(
        code(rae::usage::arity),
        help("the invocation must supply one argument per declared task parameter")
    )]
    ArityMismatch {
        task: Ident,
        expected: usize,
        got: usize,
    },
    #[error("Tick budget of {max_ticks} exhausted with {pending} task(s) unfinished")]
    #[diagnostic(code(rae::budget::ticks), help("raise max_ticks or inspect the task reports"))]
    TickBudgetExceeded { max_ticks: u64, pending: usize },
    #[error("Interpreter misuse: {0}")]
    #[diagnostic(code(rae::interpreter))]
    Interpreter(#[from] EvalError),
    #[error("Failed to install logging: {0}")]
    #[diagnostic(code(rae::logging))]
    Logging(String),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Returns `true` for errors that end a single invocation rather than a whole run.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, EngineError::ArityMismatch { .. })
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
