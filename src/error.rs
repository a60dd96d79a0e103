use std::fmt::Write;
use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised while evaluating an expression.
///
/// Every error coming out of an operator function ends up here, whatever its
/// original type. The cause is kept as `source`, and each operator the error
/// travels through may push a line of context.
#[derive(Error, Debug)]
#[error("{}", render(.message, .context))]
pub struct EvaluationError {
    message: String,
    context: Vec<String>,
    #[source]
    source: Option<BoxedCause>,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            source: None,
        }
    }

    /// Wraps an operator failure. An `EvaluationError` already travelling inside
    /// the `anyhow` chain is unwrapped instead of nested.
    pub fn from_cause(cause: anyhow::Error) -> Self {
        match cause.downcast::<EvaluationError>() {
            Ok(inner) => inner,
            Err(other) => Self {
                message: other.to_string(),
                context: Vec::new(),
                source: Some(other.into()),
            },
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }
}

fn render(message: &str, context: &[String]) -> String {
    let mut out = message.to_string();
    for line in context {
        let _ = write!(out, " ({})", line);
    }
    out
}

#[derive(Error, Debug)]
pub enum GamlError {
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Unknown operator: {name} with {arity} argument(s)")]
    OperatorNotFound { name: String, arity: usize },

    #[error("Compilation error: {0}")]
    Compilation(String),

    #[error("Fitness evaluation failed for {solution}: {source}")]
    Fitness {
        solution: String,
        #[source]
        source: BoxedCause,
    },

    #[error("Exploration error: {0}")]
    Exploration(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GamlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_rendered_in_order() {
        let err = EvaluationError::new("division by zero")
            .with_context("when applying the / operator on 0")
            .with_context("when applying the - operator on 1 / 0");
        assert_eq!(
            err.to_string(),
            "division by zero (when applying the / operator on 0) (when applying the - operator on 1 / 0)"
        );
    }

    #[test]
    fn test_from_cause_does_not_nest_evaluation_errors() {
        let inner = EvaluationError::new("boom").with_context("first");
        let wrapped = EvaluationError::from_cause(anyhow::Error::new(inner));
        assert_eq!(wrapped.message(), "boom");
        assert_eq!(wrapped.context(), &["first".to_string()]);
    }

    #[test]
    fn test_from_cause_keeps_original_error_as_source() {
        let wrapped = EvaluationError::from_cause(anyhow::anyhow!("bad value"));
        assert_eq!(wrapped.message(), "bad value");
        assert!(std::error::Error::source(&wrapped).is_some());
    }
}
