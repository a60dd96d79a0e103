use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::traits::{Arg, OperatorFunction, SemanticValidator};
use crate::engines::evaluation::diagnostics::{DiagnosticCollector, IssueCode};
use crate::engines::evaluation::type_inference::TypeRule;
use crate::engines::evaluation::{Expression, Scope};
use crate::types::{GamlType, Value};

/// Prefix operators rendered without mandatory parentheses (`-x`, `!b`).
pub const NO_MANDATORY_PARENTHESIS: &[&str] = &["-", "!"];

/// Binary operators rendered infix (`a + b`).
pub const BINARIES: &[&str] = &[
    "=", "+", "-", "/", "*", "^", "<", ">", "<=", ">=", "?", "!=", ":", ".", "where", "select",
    "collect", "first_with", "last_with", "in", "among", "contains", "contains_any",
    "contains_all", "min_of", "max_of", "with_max_of", "with_min_of", "sort_by", "accumulate",
    "or", "and", "at", "is", "group_by", "index_of", "last_index_of", "index_by", "count", "sort",
    "::", "as_map", "as",
];

/// Operators whose right-hand argument is evaluated once per element.
pub const ITERATORS: &[&str] = &[
    "where", "select", "collect", "first_with", "last_with", "count", "accumulate", "sort_by",
    "min_of", "max_of", "with_max_of", "with_min_of", "group_by", "index_by", "as_map",
];

pub fn has_no_mandatory_parenthesis(name: &str) -> bool {
    NO_MANDATORY_PARENTHESIS.contains(&name)
}

pub fn is_infix_binary(name: &str) -> bool {
    BINARIES.contains(&name)
}

/// How an argument reaches the operator function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgStrategy {
    Eager,
    Lazy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorKind {
    /// Calls a function on its arguments.
    Function,
    /// Reads a field or attribute (`owner.name`).
    VarOrField,
}

/// Immutable descriptor of one operator signature.
pub struct OperatorPrototype {
    pub name: String,
    pub signature: Vec<GamlType>,
    pub arg_strategies: Vec<ArgStrategy>,
    pub return_type: GamlType,
    pub type_rule: TypeRule,
    pub content_type_rule: TypeRule,
    pub key_type_rule: TypeRule,
    pub content_content_type_rule: TypeRule,
    pub expected_content_types: Vec<GamlType>,
    pub can_be_const: bool,
    pub context_dependent: bool,
    pub kind: OperatorKind,
    pub iterator: bool,
    pub implicit_dependencies: Vec<String>,
    pub category: String,
    pub documentation: Option<String>,
    validator: Option<Arc<dyn SemanticValidator>>,
    function: Arc<dyn OperatorFunction>,
}

impl OperatorPrototype {
    pub fn builder<F>(name: &str, function: F) -> PrototypeBuilder
    where
        F: Fn(&mut Scope, &[Arg<'_>]) -> Result<Value> + Send + Sync + 'static,
    {
        PrototypeBuilder::new(name, Arc::new(function))
    }

    pub fn arity(&self) -> usize {
        self.signature.len()
    }

    pub fn is_lazy(&self, index: usize) -> bool {
        self.arg_strategies.get(index) == Some(&ArgStrategy::Lazy)
    }

    pub fn is_var_or_field(&self) -> bool {
        self.kind == OperatorKind::VarOrField
    }

    pub fn call(&self, scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
        self.function.call(scope, args)
    }

    pub fn validate(&self, args: &[Expression], diagnostics: &mut dyn DiagnosticCollector) -> bool {
        match &self.validator {
            Some(validator) => validator.validate(&self.name, args, diagnostics),
            None => true,
        }
    }

    /// Checks the content type of the first argument against the declared
    /// expected content types.
    pub fn verify_expected_types(
        &self,
        argument_type: &GamlType,
        diagnostics: &mut dyn DiagnosticCollector,
    ) {
        if self.expected_content_types.is_empty() {
            return;
        }
        if self.expected_content_types.len() == 1 && self.iterator {
            let expected = &self.expected_content_types[0];
            if !argument_type.is_translatable_into(expected) {
                diagnostics.warning(
                    &format!("Operator {} expects an argument of type {}", self.name, expected),
                    IssueCode::ShouldCast,
                );
            }
        } else if self.arity() == 1 {
            let accepted = self
                .expected_content_types
                .iter()
                .any(|expected| argument_type.is_translatable_into(expected));
            if !accepted {
                diagnostics.error(
                    &format!(
                        "Operator {} does not accept arguments of type {}",
                        self.name, argument_type
                    ),
                    IssueCode::WrongType,
                );
            }
        }
    }

    /// Attributes this operator reads without naming them.
    pub fn collect_implicit_vars(
        &self,
        is_attribute: &dyn Fn(&str) -> bool,
        result: &mut BTreeSet<String>,
    ) {
        for dependency in &self.implicit_dependencies {
            if is_attribute(dependency) {
                result.insert(dependency.clone());
            }
        }
    }

    /// Usage pattern as shown in documentation, e.g. `int + int` or `abs(float)`.
    pub fn pattern(&self) -> String {
        let args: Vec<String> = self.signature.iter().map(|t| t.to_string()).collect();
        match self.arity() {
            2 if is_infix_binary(&self.name) => format!("{} {} {}", args[0], self.name, args[1]),
            1 if has_no_mandatory_parenthesis(&self.name) => format!("{}{}", self.name, args[0]),
            _ => format!("{}({})", self.name, args.join(", ")),
        }
    }

    pub fn title(&self) -> String {
        match self.kind {
            OperatorKind::VarOrField => format!(
                "field {} of type {}, for values of type {}",
                self.name,
                self.return_type,
                self.signature
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            ),
            OperatorKind::Function => {
                format!("operator {}, returns {}", self.pattern(), self.return_type)
            }
        }
    }
}

impl fmt::Debug for OperatorPrototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorPrototype")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("arg_strategies", &self.arg_strategies)
            .field("return_type", &self.return_type)
            .field("kind", &self.kind)
            .field("can_be_const", &self.can_be_const)
            .finish_non_exhaustive()
    }
}

pub struct PrototypeBuilder {
    prototype: OperatorPrototype,
}

impl PrototypeBuilder {
    fn new(name: &str, function: Arc<dyn OperatorFunction>) -> Self {
        Self {
            prototype: OperatorPrototype {
                name: name.to_string(),
                signature: Vec::new(),
                arg_strategies: Vec::new(),
                return_type: GamlType::no_type(),
                type_rule: TypeRule::NONE,
                content_type_rule: TypeRule::NONE,
                key_type_rule: TypeRule::NONE,
                content_content_type_rule: TypeRule::NONE,
                expected_content_types: Vec::new(),
                can_be_const: true,
                context_dependent: false,
                kind: OperatorKind::Function,
                iterator: ITERATORS.contains(&name),
                implicit_dependencies: Vec::new(),
                category: "Other".to_string(),
                documentation: None,
                validator: None,
                function,
            },
        }
    }

    /// Declares the argument types; every argument starts out eager.
    pub fn signature(mut self, types: Vec<GamlType>) -> Self {
        self.prototype.arg_strategies = vec![ArgStrategy::Eager; types.len()];
        self.prototype.signature = types;
        self
    }

    pub fn lazy(mut self, index: usize) -> Self {
        if let Some(strategy) = self.prototype.arg_strategies.get_mut(index) {
            *strategy = ArgStrategy::Lazy;
        }
        self
    }

    pub fn returns(mut self, return_type: GamlType) -> Self {
        self.prototype.return_type = return_type;
        self
    }

    pub fn type_rule(mut self, rule: TypeRule) -> Self {
        self.prototype.type_rule = rule;
        self
    }

    pub fn content_type_rule(mut self, rule: TypeRule) -> Self {
        self.prototype.content_type_rule = rule;
        self
    }

    pub fn key_type_rule(mut self, rule: TypeRule) -> Self {
        self.prototype.key_type_rule = rule;
        self
    }

    pub fn content_content_type_rule(mut self, rule: TypeRule) -> Self {
        self.prototype.content_content_type_rule = rule;
        self
    }

    pub fn expected_content_types(mut self, types: Vec<GamlType>) -> Self {
        self.prototype.expected_content_types = types;
        self
    }

    pub fn not_const(mut self) -> Self {
        self.prototype.can_be_const = false;
        self
    }

    /// Marks operators that read the evaluation scope (random stream, time).
    pub fn context_dependent(mut self) -> Self {
        self.prototype.context_dependent = true;
        self.prototype.can_be_const = false;
        self
    }

    pub fn field(mut self) -> Self {
        self.prototype.kind = OperatorKind::VarOrField;
        self
    }

    pub fn depends_on(mut self, names: &[&str]) -> Self {
        self.prototype.implicit_dependencies = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.prototype.category = category.to_string();
        self
    }

    pub fn doc(mut self, documentation: &str) -> Self {
        self.prototype.documentation = Some(documentation.to_string());
        self
    }

    pub fn validator<V>(mut self, validator: V) -> Self
    where
        V: Fn(&str, &[Expression], &mut dyn DiagnosticCollector) -> bool + Send + Sync + 'static,
    {
        self.prototype.validator = Some(Arc::new(validator));
        self
    }

    pub fn build(self) -> OperatorPrototype {
        self.prototype
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
        Ok(args[0].value()?.clone())
    }

    #[test]
    fn test_signature_defaults_to_eager() {
        let proto = OperatorPrototype::builder("and", identity)
            .signature(vec![GamlType::bool(), GamlType::bool()])
            .lazy(1)
            .build();
        assert_eq!(proto.arity(), 2);
        assert!(!proto.is_lazy(0));
        assert!(proto.is_lazy(1));
        assert!(!proto.is_lazy(5));
    }

    #[test]
    fn test_iterator_flag_follows_name() {
        let proto = OperatorPrototype::builder("where", identity)
            .signature(vec![GamlType::list(GamlType::no_type()), GamlType::bool()])
            .build();
        assert!(proto.iterator);
    }

    #[test]
    fn test_patterns() {
        let plus = OperatorPrototype::builder("+", identity)
            .signature(vec![GamlType::int(), GamlType::int()])
            .build();
        let neg = OperatorPrototype::builder("-", identity)
            .signature(vec![GamlType::int()])
            .build();
        let abs = OperatorPrototype::builder("abs", identity)
            .signature(vec![GamlType::float()])
            .build();
        assert_eq!(plus.pattern(), "int + int");
        assert_eq!(neg.pattern(), "-int");
        assert_eq!(abs.pattern(), "abs(float)");
    }

    #[test]
    fn test_context_dependent_is_never_const() {
        let proto = OperatorPrototype::builder("rnd", identity)
            .signature(vec![GamlType::int()])
            .context_dependent()
            .build();
        assert!(!proto.can_be_const);
    }
}
