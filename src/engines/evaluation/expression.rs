//! Expression trees and their evaluation.
//!
//! Nodes own their children, so a tree is acyclic and can be shared between
//! threads once built. Every node computes its static type when it is created
//! and never changes it; rebinding against a scope builds a new tree.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::scope::Scope;
use super::type_inference::infer_type;
use crate::error::EvaluationError;
use crate::functions::prototype::{has_no_mandatory_parenthesis, is_infix_binary, OperatorPrototype};
use crate::functions::traits::Arg;
use crate::types::{BaseType, GamlType, Value};

#[derive(Debug, Clone)]
pub struct Constant {
    value: Value,
    ty: GamlType,
}

#[derive(Debug, Clone)]
pub struct VariableRef {
    name: String,
    ty: GamlType,
}

impl VariableRef {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Application of a prototype to its arguments. Unary, binary and n-ary
/// nodes share this layout and differ by how they are dispatched and printed.
#[derive(Debug, Clone)]
pub struct OperatorNode {
    prototype: Arc<OperatorPrototype>,
    args: Vec<Expression>,
    ty: GamlType,
}

impl OperatorNode {
    pub(crate) fn new(prototype: Arc<OperatorPrototype>, args: Vec<Expression>) -> Self {
        let ty = infer_type(&prototype, &args);
        Self {
            prototype,
            args,
            ty,
        }
    }

    pub fn prototype(&self) -> &Arc<OperatorPrototype> {
        &self.prototype
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    fn is_const(&self) -> bool {
        self.prototype.can_be_const && self.args.iter().all(Expression::is_const)
    }

    fn is_context_independent(&self) -> bool {
        !self.prototype.context_dependent
            && self.args.iter().all(Expression::is_context_independent)
    }

    /// Evaluates eager arguments, passes lazy ones through, and calls the
    /// operator. Failures inside the operator are wrapped with the operator
    /// name and its arguments. An int result of a node typed float is
    /// widened to float.
    fn apply(&self, scope: &mut Scope) -> Result<Value, EvaluationError> {
        let mut evaluated = Vec::with_capacity(self.args.len());
        for (index, arg) in self.args.iter().enumerate() {
            if self.prototype.is_lazy(index) {
                evaluated.push(None);
            } else {
                evaluated.push(Some(arg.value(scope)?));
            }
        }
        let call_args: Vec<Arg<'_>> = self
            .args
            .iter()
            .zip(&evaluated)
            .map(|(expr, value)| match value {
                Some(value) => Arg::Value(value),
                None => Arg::Lazy(expr),
            })
            .collect();

        let value = self.prototype.call(scope, &call_args).map_err(|cause| {
            let described: Vec<String> = call_args.iter().map(Arg::describe).collect();
            EvaluationError::from_cause(cause).with_context(format!(
                "when applying the {} operator on {}",
                self.prototype.name,
                described.join(" and ")
            ))
        })?;
        Ok(match value {
            Value::Int(i) if self.ty.base() == BaseType::Float => Value::Float(i as f64),
            other => other,
        })
    }

    fn rebuilt(&self, args: Vec<Expression>) -> Self {
        Self::new(Arc::clone(&self.prototype), args)
    }
}

/// `owner.field`, where the field is named by a variable reference. Reads go
/// through the prototype; writes update the owner in place.
#[derive(Debug, Clone)]
pub struct FieldAccess {
    prototype: Arc<OperatorPrototype>,
    owner: Box<Expression>,
    field: VariableRef,
    ty: GamlType,
}

impl FieldAccess {
    pub(crate) fn new(prototype: Arc<OperatorPrototype>, owner: Expression, field: VariableRef) -> Self {
        let args = [owner, Expression::Variable(field.clone())];
        let ty = infer_type(&prototype, &args);
        let [owner, _] = args;
        Self {
            prototype,
            owner: Box::new(owner),
            field,
            ty,
        }
    }

    pub fn owner(&self) -> &Expression {
        &self.owner
    }

    pub fn field(&self) -> &str {
        &self.field.name
    }

    fn value(&self, scope: &mut Scope) -> Result<Value, EvaluationError> {
        let owner = self.owner.value(scope)?;
        let field = Value::String(self.field.name.clone());
        self.prototype
            .call(scope, &[Arg::Value(&owner), Arg::Value(&field)])
            .map_err(|cause| {
                EvaluationError::from_cause(cause).with_context(format!(
                    "when reading the field {} of {}",
                    self.field.name, owner
                ))
            })
    }
}

#[derive(Debug, Clone)]
pub enum Expression {
    Constant(Constant),
    Variable(VariableRef),
    /// Unary field of a typed value (`pair.key`).
    TypeField(OperatorNode),
    Unary(OperatorNode),
    Binary(OperatorNode),
    BinaryField(FieldAccess),
    NAry(OperatorNode),
}

impl Expression {
    pub fn constant(value: Value) -> Self {
        let ty = value.gaml_type();
        Expression::Constant(Constant { value, ty })
    }

    /// A constant whose static type is imposed rather than read from the value.
    pub fn typed_constant(value: Value, ty: GamlType) -> Self {
        Expression::Constant(Constant { value, ty })
    }

    pub fn variable(name: &str, ty: GamlType) -> Self {
        Expression::Variable(VariableRef {
            name: name.to_string(),
            ty,
        })
    }

    pub fn gaml_type(&self) -> &GamlType {
        match self {
            Expression::Constant(c) => &c.ty,
            Expression::Variable(v) => &v.ty,
            Expression::BinaryField(f) => &f.ty,
            Expression::TypeField(op)
            | Expression::Unary(op)
            | Expression::Binary(op)
            | Expression::NAry(op) => &op.ty,
        }
    }

    /// Type an expression stands for when used as a type argument (`x as int`).
    pub fn denoted_type(&self) -> GamlType {
        match self {
            Expression::Constant(Constant {
                value: Value::Type(ty),
                ..
            }) => ty.clone(),
            other => other.gaml_type().clone(),
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Expression::Constant(c) => Some(&c.value),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableRef> {
        match self {
            Expression::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn operator(&self) -> Option<&OperatorNode> {
        match self {
            Expression::TypeField(op)
            | Expression::Unary(op)
            | Expression::Binary(op)
            | Expression::NAry(op) => Some(op),
            _ => None,
        }
    }

    pub fn prototype(&self) -> Option<&Arc<OperatorPrototype>> {
        match self {
            Expression::BinaryField(f) => Some(&f.prototype),
            other => other.operator().map(OperatorNode::prototype),
        }
    }

    pub fn is_operator(&self) -> bool {
        self.prototype().is_some()
    }

    /// Operator name, variable name, or the literal text of a constant.
    pub fn name(&self) -> String {
        match self {
            Expression::Constant(c) => c.value.to_string(),
            Expression::Variable(v) => v.name.clone(),
            Expression::BinaryField(f) => f.prototype.name.clone(),
            Expression::TypeField(op)
            | Expression::Unary(op)
            | Expression::Binary(op)
            | Expression::NAry(op) => op.prototype.name.clone(),
        }
    }

    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Constant(_) | Expression::Variable(_) => Vec::new(),
            Expression::BinaryField(f) => vec![f.owner.as_ref()],
            Expression::TypeField(op)
            | Expression::Unary(op)
            | Expression::Binary(op)
            | Expression::NAry(op) => op.args.iter().collect(),
        }
    }

    /// True when the prototype allows folding and every child is constant.
    pub fn is_const(&self) -> bool {
        match self {
            Expression::Constant(_) => true,
            Expression::Variable(_) | Expression::BinaryField(_) => false,
            Expression::TypeField(op)
            | Expression::Unary(op)
            | Expression::Binary(op)
            | Expression::NAry(op) => op.is_const(),
        }
    }

    /// True when evaluation needs nothing from the scope.
    pub fn is_context_independent(&self) -> bool {
        match self {
            Expression::Constant(_) => true,
            Expression::Variable(_) => false,
            Expression::BinaryField(f) => f.owner.is_context_independent(),
            Expression::TypeField(op)
            | Expression::Unary(op)
            | Expression::Binary(op)
            | Expression::NAry(op) => op.is_context_independent(),
        }
    }

    pub fn value(&self, scope: &mut Scope) -> Result<Value, EvaluationError> {
        match self {
            Expression::Constant(c) => Ok(c.value.clone()),
            Expression::Variable(v) => scope
                .get_var(&v.name)
                .cloned()
                .ok_or_else(|| EvaluationError::new(format!("Unknown variable {}", v.name))),
            Expression::BinaryField(f) => f.value(scope),
            Expression::TypeField(op)
            | Expression::Unary(op)
            | Expression::Binary(op)
            | Expression::NAry(op) => op.apply(scope),
        }
    }

    /// Writes `value` through a settable reference: a variable, or a field of
    /// a map held by a variable.
    pub fn assign(&self, scope: &mut Scope, value: Value) -> Result<(), EvaluationError> {
        match self {
            Expression::Variable(v) => {
                scope.set_var(&v.name, value);
                Ok(())
            }
            Expression::BinaryField(f) => {
                let owner = f.owner.as_variable().ok_or_else(|| {
                    EvaluationError::new(format!("Cannot assign to {}", self.serialize()))
                })?;
                let target = scope.get_var_mut(&owner.name).ok_or_else(|| {
                    EvaluationError::new(format!("Unknown variable {}", owner.name))
                })?;
                if target.map_put(Value::String(f.field.name.clone()), value) {
                    Ok(())
                } else {
                    Err(EvaluationError::new(format!(
                        "Cannot set the field {} of {}",
                        f.field.name, owner.name
                    )))
                }
            }
            _ => Err(EvaluationError::new(format!(
                "Cannot assign to {}",
                self.serialize()
            ))),
        }
    }

    /// Calls `visitor` on each direct child that is itself an operator.
    pub fn visit_suboperators(&self, visitor: &mut dyn FnMut(&Expression)) {
        for child in self.children() {
            if child.is_operator() {
                visitor(child);
            }
        }
    }

    /// Whether this node or any descendant matches. Stops at the first match.
    pub fn find_any(&self, predicate: &dyn Fn(&Expression) -> bool) -> bool {
        if predicate(self) {
            return true;
        }
        self.children().into_iter().any(|child| child.find_any(predicate))
    }

    /// Attributes read by this expression, explicitly or through the implicit
    /// dependencies of its operators.
    pub fn collect_used_vars(&self, is_attribute: &dyn Fn(&str) -> bool, result: &mut BTreeSet<String>) {
        if let Expression::Variable(v) = self {
            if is_attribute(&v.name) {
                result.insert(v.name.clone());
            }
        }
        if let Some(prototype) = self.prototype() {
            prototype.collect_implicit_vars(is_attribute, result);
        }
        for child in self.children() {
            child.collect_used_vars(is_attribute, result);
        }
    }

    /// New tree where temporaries bound in `scope` are replaced by their
    /// values. The original tree is left as it is.
    pub fn resolve_against(&self, scope: &Scope) -> Expression {
        match self {
            Expression::Constant(_) => self.clone(),
            Expression::Variable(v) => match scope.get_temp(&v.name) {
                Some(value) => Expression::typed_constant(value.clone(), v.ty.clone()),
                None => self.clone(),
            },
            Expression::BinaryField(f) => Expression::BinaryField(FieldAccess::new(
                Arc::clone(&f.prototype),
                f.owner.resolve_against(scope),
                f.field.clone(),
            )),
            Expression::TypeField(op) => Expression::TypeField(op.rebuilt(resolve_all(&op.args, scope))),
            Expression::Unary(op) => Expression::Unary(op.rebuilt(resolve_all(&op.args, scope))),
            Expression::Binary(op) => Expression::Binary(op.rebuilt(resolve_all(&op.args, scope))),
            Expression::NAry(op) => Expression::NAry(op.rebuilt(resolve_all(&op.args, scope))),
        }
    }

    fn should_be_parenthesized(&self) -> bool {
        matches!(self, Expression::Binary(op) if is_infix_binary(&op.prototype.name))
    }

    fn parenthesized(&self) -> String {
        if self.should_be_parenthesized() {
            format!("({})", self.serialize())
        } else {
            self.serialize()
        }
    }

    /// Source-like rendering used by diagnostics and tooling.
    pub fn serialize(&self) -> String {
        match self {
            Expression::Constant(c) => c.value.to_string(),
            Expression::Variable(v) => v.name.clone(),
            Expression::BinaryField(f) => format!("{}.{}", f.owner.parenthesized(), f.field.name),
            Expression::TypeField(op) => {
                format!("{}.{}", op.args[0].parenthesized(), op.prototype.name)
            }
            Expression::Unary(op) => {
                let name = &op.prototype.name;
                if has_no_mandatory_parenthesis(name) {
                    let child = op.args[0].parenthesized();
                    if child.starts_with(name.as_str()) {
                        format!("{}({})", name, child)
                    } else {
                        format!("{}{}", name, child)
                    }
                } else {
                    format!("{}({})", name, op.args[0].serialize())
                }
            }
            Expression::Binary(op) => {
                let name = &op.prototype.name;
                if is_infix_binary(name) {
                    format!(
                        "{} {} {}",
                        op.args[0].parenthesized(),
                        name,
                        op.args[1].parenthesized()
                    )
                } else {
                    format!("{}({}, {})", name, op.args[0].serialize(), op.args[1].serialize())
                }
            }
            Expression::NAry(op) => {
                let args: Vec<String> = op.args.iter().map(Expression::serialize).collect();
                format!("{}({})", op.prototype.name, args.join(", "))
            }
        }
    }

    /// One-line description, e.g. `operator -(int) returns int`.
    pub fn title(&self) -> String {
        match self {
            Expression::Constant(c) => format!("constant {} of type {}", c.value, c.ty),
            Expression::Variable(v) => format!("variable {} of type {}", v.name, v.ty),
            _ => {
                let args: Vec<String> = self
                    .children()
                    .iter()
                    .map(|c| c.gaml_type().to_string())
                    .collect();
                format!(
                    "operator {}({}) returns {}",
                    self.name(),
                    args.join(", "),
                    self.gaml_type()
                )
            }
        }
    }
}

fn resolve_all(args: &[Expression], scope: &Scope) -> Vec<Expression> {
    args.iter().map(|arg| arg.resolve_against(scope)).collect()
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize())
    }
}
