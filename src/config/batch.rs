use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::GamlError;
use serde::{Deserialize, Serialize};

/// How the scores of the replications of one solution are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Mean,
    Min,
    Max,
}

impl Aggregation {
    /// `None` for an empty slice.
    pub fn apply(&self, scores: &[f64]) -> Option<f64> {
        if scores.is_empty() {
            return None;
        }
        Some(match self {
            Aggregation::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            Aggregation::Min => scores.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Simulations run for each solution.
    pub repeat: usize,
    pub aggregation: Aggregation,
    pub parallel_replications: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            repeat: 1,
            aggregation: Aggregation::Mean,
            parallel_replications: true,
        }
    }
}

impl ConfigSection for BatchConfig {
    fn section_name() -> &'static str {
        "batch"
    }

    fn validate(&self) -> Result<(), GamlError> {
        if self.repeat == 0 {
            return Err(GamlError::Configuration(
                "repeat must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: "Batch".to_string(),
            fields: vec![
                FieldManifest::new(
                    "repeat",
                    "integer",
                    serde_json::json!(1),
                    "Number of simulations run for each solution",
                )
                .range(1.0, 10000.0),
                FieldManifest::new(
                    "aggregation",
                    "enum",
                    serde_json::json!("mean"),
                    "Combination of replication scores: mean, min or max",
                ),
                FieldManifest::new(
                    "parallel_replications",
                    "boolean",
                    serde_json::json!(true),
                    "Run the replications of a solution in parallel",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation() {
        let scores = [2.0, 4.0, 9.0];
        assert_eq!(Aggregation::Mean.apply(&scores), Some(5.0));
        assert_eq!(Aggregation::Min.apply(&scores), Some(2.0));
        assert_eq!(Aggregation::Max.apply(&scores), Some(9.0));
        assert_eq!(Aggregation::Max.apply(&[]), None);
    }

    #[test]
    fn test_zero_repeat_is_rejected() {
        let config = BatchConfig {
            repeat: 0,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
