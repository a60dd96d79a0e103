use serde::Serialize;
use std::collections::BTreeMap;

use super::registry::OperatorRegistry;

/// Documentation view of the registered operators.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorManifest {
    pub categories: BTreeMap<String, Vec<OperatorEntry>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperatorEntry {
    pub name: String,
    pub arity: usize,
    pub pattern: String,
    pub title: String,
    pub lazy_arguments: Vec<usize>,
    pub can_be_const: bool,
    pub documentation: Option<String>,
}

impl OperatorManifest {
    pub fn from_registry(registry: &OperatorRegistry) -> Self {
        let mut categories: BTreeMap<String, Vec<OperatorEntry>> = BTreeMap::new();
        for prototype in registry.prototypes() {
            categories
                .entry(prototype.category.clone())
                .or_default()
                .push(OperatorEntry {
                    name: prototype.name.clone(),
                    arity: prototype.arity(),
                    pattern: prototype.pattern(),
                    title: prototype.title(),
                    lazy_arguments: (0..prototype.arity())
                        .filter(|&i| prototype.is_lazy(i))
                        .collect(),
                    can_be_const: prototype.can_be_const,
                    documentation: prototype.documentation.clone(),
                });
        }
        for entries in categories.values_mut() {
            entries.sort_by(|a, b| a.name.cmp(&b.name).then(a.arity.cmp(&b.arity)));
        }
        Self { categories }
    }

    pub fn get_all_available(&self) -> Vec<&OperatorEntry> {
        self.categories.values().flatten().collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_groups_by_category() {
        let registry = OperatorRegistry::with_builtins();
        let manifest = OperatorManifest::from_registry(&registry);
        assert_eq!(manifest.get_all_available().len(), registry.len());

        let logic = &manifest.categories["Logical"];
        let and = logic.iter().find(|e| e.name == "and").unwrap();
        assert_eq!(and.lazy_arguments, vec![1]);
        assert_eq!(and.pattern, "bool and bool");
    }

    #[test]
    fn test_manifest_serializes() {
        let manifest = OperatorManifest::from_registry(&OperatorRegistry::with_builtins());
        let json = manifest.to_json().unwrap();
        assert!(json.contains("\"Arithmetic\""));
    }
}
