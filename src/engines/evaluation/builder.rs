use std::sync::Arc;

use super::diagnostics::{DiagnosticCollector, IssueCode};
use super::expression::{Expression, FieldAccess, OperatorNode};
use super::scope::Scope;
use crate::config::CompilerConfig;
use crate::functions::prototype::{OperatorKind, OperatorPrototype};
use crate::functions::registry::OperatorRegistry;
use crate::types::{GamlType, Value};

/// Turns prototypes and argument trees into expression nodes.
///
/// Construction reports problems to a [`DiagnosticCollector`] and returns
/// `None` for the rejected node instead of failing the whole compilation.
pub struct ExpressionBuilder {
    registry: Arc<OperatorRegistry>,
    config: CompilerConfig,
}

impl ExpressionBuilder {
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self::with_config(registry, CompilerConfig::default())
    }

    pub fn with_config(registry: Arc<OperatorRegistry>, config: CompilerConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    pub fn constant(&self, value: Value) -> Expression {
        Expression::constant(value)
    }

    pub fn variable(&self, name: &str, ty: GamlType) -> Expression {
        Expression::variable(name, ty)
    }

    /// Looks up `name` for the number of arguments given and builds the node.
    pub fn operator(
        &self,
        name: &str,
        args: Vec<Expression>,
        diagnostics: &mut dyn DiagnosticCollector,
    ) -> Option<Expression> {
        match self.registry.lookup(name, args.len()) {
            Ok(prototype) => self.create(prototype, args, diagnostics),
            Err(e) => {
                diagnostics.error(&e.to_string(), IssueCode::UnknownOperator);
                None
            }
        }
    }

    /// `expr as ty`, through the registered cast operator.
    pub fn cast(
        &self,
        expr: Expression,
        ty: GamlType,
        diagnostics: &mut dyn DiagnosticCollector,
    ) -> Option<Expression> {
        let Some(prototype) = self.registry.cast() else {
            diagnostics.error("No cast operator is registered", IssueCode::UnknownOperator);
            return None;
        };
        self.create(prototype, vec![expr, Expression::constant(Value::Type(ty))], diagnostics)
    }

    /// Builds the node for `prototype` applied to `args`.
    ///
    /// The semantic validator runs first; a rejection yields `None`. Nodes
    /// whose prototype and arguments are all constant are folded into a
    /// constant when optimization is on.
    pub fn create(
        &self,
        prototype: Arc<OperatorPrototype>,
        args: Vec<Expression>,
        diagnostics: &mut dyn DiagnosticCollector,
    ) -> Option<Expression> {
        if args.len() != prototype.arity() {
            diagnostics.error(
                &format!(
                    "Operator {} expects {} argument(s), got {}",
                    prototype.name,
                    prototype.arity(),
                    args.len()
                ),
                IssueCode::General,
            );
            return None;
        }
        if !prototype.validate(&args, diagnostics) {
            return None;
        }
        if self.config.check_expected_types {
            if let Some(first) = args.first() {
                prototype.verify_expected_types(&first.gaml_type().content_type(), diagnostics);
            }
        }

        let expr = match (args.len(), prototype.kind) {
            (1, OperatorKind::VarOrField) => Expression::TypeField(OperatorNode::new(prototype, args)),
            (1, OperatorKind::Function) => Expression::Unary(OperatorNode::new(prototype, args)),
            (2, OperatorKind::VarOrField) => {
                let mut args = args.into_iter();
                let (Some(owner), Some(field)) = (args.next(), args.next()) else {
                    return None;
                };
                let Some(field) = field.as_variable().cloned() else {
                    diagnostics.error(
                        &format!("{} is not a valid field name", field.serialize()),
                        IssueCode::General,
                    );
                    return None;
                };
                Expression::BinaryField(FieldAccess::new(prototype, owner, field))
            }
            (2, OperatorKind::Function) => Expression::Binary(OperatorNode::new(prototype, args)),
            _ => Expression::NAry(OperatorNode::new(prototype, args)),
        };

        if self.config.constant_optimization && expr.is_const() {
            return self.fold(expr, diagnostics);
        }
        Some(expr)
    }

    fn fold(&self, expr: Expression, diagnostics: &mut dyn DiagnosticCollector) -> Option<Expression> {
        let mut scope = Scope::with_seed(0);
        match expr.value(&mut scope) {
            Ok(value) => {
                log::trace!("folded {} into {}", expr.serialize(), value);
                Some(Expression::typed_constant(value, expr.gaml_type().clone()))
            }
            Err(e) => {
                diagnostics.error(
                    &format!("This code is not functional: {}", e),
                    IssueCode::NotFunctional,
                );
                None
            }
        }
    }
}
