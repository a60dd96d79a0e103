use super::traits::{check_probability, ConfigManifest, ConfigSection, FieldManifest};
use crate::engines::exploration::fitness::OptimizationDirection;
use crate::engines::exploration::genetic_algorithm::LocalSearchConfig;
use crate::engines::exploration::operators::SelectionMethod;
use crate::error::GamlError;
use serde::{Deserialize, Serialize};

/// Parameters of the genetic exploration method. Field names follow the
/// facets of the `genetic` batch method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    /// Size of the population kept after selection.
    pub pop_dim: usize,
    pub crossover_prob: f64,
    pub mutation_prob: f64,
    /// Number of random populations used to build the initial one. Stored,
    /// not used by the generational loop.
    pub nb_prelim_gen: usize,
    pub max_gen: usize,
    /// Hill-climb every chromosome after evaluation.
    pub improve_sol: bool,
    /// Roulette selection instead of keeping the best.
    pub stochastic_sel: bool,
    pub direction: OptimizationDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub parallel_evaluation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_search_max_steps: Option<usize>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            pop_dim: 3,
            crossover_prob: 0.7,
            mutation_prob: 0.1,
            nb_prelim_gen: 1,
            max_gen: 20,
            improve_sol: false,
            stochastic_sel: false,
            direction: OptimizationDirection::Maximize,
            seed: None,
            parallel_evaluation: false,
            local_search_max_steps: None,
        }
    }
}

impl GeneticConfig {
    pub fn selection(&self) -> SelectionMethod {
        if self.stochastic_sel {
            SelectionMethod::Roulette
        } else {
            SelectionMethod::Best
        }
    }

    pub fn local_search(&self) -> Option<LocalSearchConfig> {
        self.improve_sol.then_some(LocalSearchConfig {
            max_steps: self.local_search_max_steps,
        })
    }
}

impl ConfigSection for GeneticConfig {
    fn section_name() -> &'static str {
        "genetic"
    }

    fn validate(&self) -> Result<(), GamlError> {
        if self.pop_dim == 0 {
            return Err(GamlError::Configuration(
                "pop_dim must be at least 1".to_string(),
            ));
        }
        check_probability("crossover_prob", self.crossover_prob)?;
        check_probability("mutation_prob", self.mutation_prob)?;
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: "Genetic".to_string(),
            fields: vec![
                FieldManifest::new(
                    "mutation_prob",
                    "float",
                    serde_json::json!(0.1),
                    "Mutation probability",
                )
                .range(0.0, 1.0),
                FieldManifest::new(
                    "crossover_prob",
                    "float",
                    serde_json::json!(0.7),
                    "Crossover probability",
                )
                .range(0.0, 1.0),
                FieldManifest::new(
                    "pop_dim",
                    "integer",
                    serde_json::json!(3),
                    "Population dimension",
                )
                .range(1.0, 10000.0),
                FieldManifest::new(
                    "nb_prelim_gen",
                    "integer",
                    serde_json::json!(1),
                    "Preliminary number of generations",
                ),
                FieldManifest::new(
                    "max_gen",
                    "integer",
                    serde_json::json!(20),
                    "Max. number of generations",
                ),
                FieldManifest::new(
                    "improve_sol",
                    "boolean",
                    serde_json::json!(false),
                    "Improve each solution with a hill climbing search",
                ),
                FieldManifest::new(
                    "stochastic_sel",
                    "boolean",
                    serde_json::json!(false),
                    "Use roulette selection rather than keeping the best solutions",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_genetic_method() {
        let config = GeneticConfig::default();
        assert_eq!(config.pop_dim, 3);
        assert_eq!(config.crossover_prob, 0.7);
        assert_eq!(config.mutation_prob, 0.1);
        assert_eq!(config.nb_prelim_gen, 1);
        assert_eq!(config.max_gen, 20);
        assert_eq!(config.selection(), SelectionMethod::Best);
        assert!(config.local_search().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_probabilities_are_checked() {
        let config = GeneticConfig {
            mutation_prob: 1.5,
            ..GeneticConfig::default()
        };
        assert!(matches!(config.validate(), Err(GamlError::Configuration(_))));
    }

    #[test]
    fn test_manifest_lists_method_parameters() {
        let manifest = GeneticConfig::default().to_manifest();
        let names: Vec<&str> = manifest.fields.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"pop_dim"));
        assert!(names.contains(&"nb_prelim_gen"));
        assert_eq!(manifest.fields[0].max, Some(1.0));
    }
}
