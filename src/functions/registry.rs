use std::collections::HashMap;
use std::sync::Arc;

use super::primitives;
use super::prototype::OperatorPrototype;
use crate::error::{GamlError, Result};
use crate::types::GamlType;

/// Operators the builder needs to reach directly, whatever their name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownOperator {
    Cast,
}

/// Prototypes indexed by name and arity.
///
/// Registering a name/arity pair twice keeps the last prototype.
pub struct OperatorRegistry {
    operators: HashMap<String, HashMap<usize, Arc<OperatorPrototype>>>,
    well_known: HashMap<WellKnownOperator, Arc<OperatorPrototype>>,
}

impl OperatorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
            well_known: HashMap::new(),
        }
    }

    /// Registry holding the built-in operator library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        primitives::register_builtins(&mut registry);
        registry
    }

    pub fn register(&mut self, prototype: OperatorPrototype) -> Arc<OperatorPrototype> {
        let prototype = Arc::new(prototype);
        if prototype.name == "as" && prototype.arity() == 2 {
            self.well_known
                .insert(WellKnownOperator::Cast, Arc::clone(&prototype));
        }
        let previous = self
            .operators
            .entry(prototype.name.clone())
            .or_default()
            .insert(prototype.arity(), Arc::clone(&prototype));
        if previous.is_some() {
            log::debug!(
                "operator {} with {} argument(s) replaced",
                prototype.name,
                prototype.arity()
            );
        }
        prototype
    }

    pub fn get(&self, name: &str, arity: usize) -> Option<Arc<OperatorPrototype>> {
        self.operators
            .get(name)
            .and_then(|by_arity| by_arity.get(&arity))
            .cloned()
    }

    pub fn lookup(&self, name: &str, arity: usize) -> Result<Arc<OperatorPrototype>> {
        self.get(name, arity).ok_or_else(|| GamlError::OperatorNotFound {
            name: name.to_string(),
            arity,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn arities(&self, name: &str) -> Vec<usize> {
        let mut arities: Vec<usize> = self
            .operators
            .get(name)
            .map(|by_arity| by_arity.keys().copied().collect())
            .unwrap_or_default();
        arities.sort_unstable();
        arities
    }

    pub fn well_known(&self, role: WellKnownOperator) -> Option<Arc<OperatorPrototype>> {
        self.well_known.get(&role).cloned()
    }

    pub fn set_well_known(&mut self, role: WellKnownOperator, prototype: Arc<OperatorPrototype>) {
        self.well_known.insert(role, prototype);
    }

    pub fn cast(&self) -> Option<Arc<OperatorPrototype>> {
        self.well_known(WellKnownOperator::Cast)
    }

    pub fn category(&self, name: &str, arity: usize) -> Option<String> {
        self.get(name, arity).map(|p| p.category.clone())
    }

    pub fn documentation(&self, name: &str, arity: usize) -> Option<String> {
        self.get(name, arity).and_then(|p| p.documentation.clone())
    }

    pub fn prototypes(&self) -> impl Iterator<Item = &Arc<OperatorPrototype>> {
        self.operators.values().flat_map(|by_arity| by_arity.values())
    }

    pub fn get_by_return_type(&self, ty: &GamlType) -> Vec<Arc<OperatorPrototype>> {
        self.prototypes()
            .filter(|p| p.return_type.base() == ty.base())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.operators.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::evaluation::Scope;
    use crate::functions::traits::Arg;
    use crate::types::Value;

    fn constant_one(_scope: &mut Scope, _args: &[Arg<'_>]) -> anyhow::Result<Value> {
        Ok(Value::Int(1))
    }

    fn constant_two(_scope: &mut Scope, _args: &[Arg<'_>]) -> anyhow::Result<Value> {
        Ok(Value::Int(2))
    }

    #[test]
    fn test_registry_creation() {
        let registry = OperatorRegistry::with_builtins();
        assert!(!registry.is_empty());
        assert!(registry.get("+", 2).is_some());
        assert!(registry.get("-", 1).is_some());
        assert!(registry.cast().is_some());
    }

    #[test]
    fn test_lookup_is_by_name_and_arity() {
        let registry = OperatorRegistry::with_builtins();
        assert_eq!(registry.arities("-"), vec![1, 2]);
        let err = registry.lookup("-", 3).unwrap_err();
        assert!(matches!(err, GamlError::OperatorNotFound { arity: 3, .. }));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = OperatorRegistry::new();
        registry.register(
            OperatorPrototype::builder("f", constant_one)
                .signature(vec![GamlType::int()])
                .build(),
        );
        registry.register(
            OperatorPrototype::builder("f", constant_two)
                .signature(vec![GamlType::int()])
                .category("Test")
                .build(),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.category("f", 1).as_deref(), Some("Test"));
    }

    #[test]
    fn test_get_by_return_type() {
        let registry = OperatorRegistry::with_builtins();
        let booleans = registry.get_by_return_type(&GamlType::bool());
        assert!(booleans.iter().any(|p| p.name == "and"));
        assert!(booleans.iter().all(|p| p.return_type == GamlType::bool()));
    }
}
