use anyhow::{bail, Result};

use crate::engines::evaluation::{diagnostics::DiagnosticCollector, Expression, Scope};
use crate::types::Value;

/// Argument handed to an operator function.
///
/// Lazy positions receive the unevaluated expression; the function decides
/// when (and whether) to evaluate it.
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    Value(&'a Value),
    Lazy(&'a Expression),
}

impl<'a> Arg<'a> {
    pub fn value(&self) -> Result<&'a Value> {
        match *self {
            Arg::Value(value) => Ok(value),
            Arg::Lazy(expr) => bail!("argument {} was not evaluated", expr.serialize()),
        }
    }

    pub fn expression(&self) -> Result<&'a Expression> {
        match *self {
            Arg::Lazy(expr) => Ok(expr),
            Arg::Value(value) => bail!("argument {} is not an expression", value),
        }
    }

    /// Value of the argument, evaluating it first when it was passed lazily.
    pub fn resolve(&self, scope: &mut Scope) -> Result<Value> {
        match *self {
            Arg::Value(value) => Ok(value.clone()),
            Arg::Lazy(expr) => Ok(expr.value(scope)?),
        }
    }

    /// Text used in error context.
    pub fn describe(&self) -> String {
        match self {
            Arg::Value(value) => value.to_string(),
            Arg::Lazy(expr) => expr.serialize(),
        }
    }
}

/// The computation an operator prototype is bound to.
pub trait OperatorFunction: Send + Sync {
    fn call(&self, scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value>;
}

impl<F> OperatorFunction for F
where
    F: Fn(&mut Scope, &[Arg<'_>]) -> Result<Value> + Send + Sync,
{
    fn call(&self, scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
        self(scope, args)
    }
}

/// Construction-time check run before an operator node is built. Returning
/// `false` rejects the application; the validator reports why.
pub trait SemanticValidator: Send + Sync {
    fn validate(
        &self,
        operator: &str,
        args: &[Expression],
        diagnostics: &mut dyn DiagnosticCollector,
    ) -> bool;
}

impl<F> SemanticValidator for F
where
    F: Fn(&str, &[Expression], &mut dyn DiagnosticCollector) -> bool + Send + Sync,
{
    fn validate(
        &self,
        operator: &str,
        args: &[Expression],
        diagnostics: &mut dyn DiagnosticCollector,
    ) -> bool {
        self(operator, args, diagnostics)
    }
}
