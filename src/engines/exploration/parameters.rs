use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GamlError, Result};
use crate::types::{GamlType, Value};

/// Values an explorable parameter may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterDomain {
    Int { min: i64, max: i64, step: i64 },
    Float { min: f64, max: f64, step: f64 },
    Bool,
    Among { values: Vec<Value> },
}

/// A model parameter the exploration is allowed to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorableParameter {
    pub name: String,
    pub domain: ParameterDomain,
}

impl ExplorableParameter {
    pub fn int(name: &str, min: i64, max: i64, step: i64) -> Self {
        Self::new(name, ParameterDomain::Int { min, max, step })
    }

    pub fn float(name: &str, min: f64, max: f64, step: f64) -> Self {
        Self::new(name, ParameterDomain::Float { min, max, step })
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, ParameterDomain::Bool)
    }

    pub fn among(name: &str, values: Vec<Value>) -> Self {
        Self::new(name, ParameterDomain::Among { values })
    }

    pub fn new(name: &str, domain: ParameterDomain) -> Self {
        Self {
            name: name.to_string(),
            domain,
        }
    }

    pub fn gaml_type(&self) -> GamlType {
        match &self.domain {
            ParameterDomain::Int { .. } => GamlType::int(),
            ParameterDomain::Float { .. } => GamlType::float(),
            ParameterDomain::Bool => GamlType::bool(),
            ParameterDomain::Among { values } => Value::List(values.clone()).gaml_type().content_type(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let problem = match &self.domain {
            ParameterDomain::Int { min, max, step }
                if min > max || *step <= 0 || max.checked_sub(*min).is_none() =>
            {
                Some(format!("invalid int range [{}, {}] step {}", min, max, step))
            }
            ParameterDomain::Float { min, max, step }
                if !(min <= max) || !step.is_finite() || *step <= 0.0 =>
            {
                Some(format!("invalid float range [{}, {}] step {}", min, max, step))
            }
            ParameterDomain::Among { values } if values.is_empty() => {
                Some("empty list of values".to_string())
            }
            _ => None,
        };
        match problem {
            Some(problem) => Err(GamlError::Exploration(format!(
                "Parameter {}: {}",
                self.name, problem
            ))),
            None => Ok(()),
        }
    }

    /// Uniform draw on the grid of the domain.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Value {
        match &self.domain {
            ParameterDomain::Int { min, max, step } => {
                let steps = max.checked_sub(*min).unwrap_or(0).max(0) / step.max(&1);
                Value::Int(min + step * rng.gen_range(0..=steps))
            }
            ParameterDomain::Float { min, max, step } => {
                let steps = ((max - min) / step).floor() as i64;
                Value::Float(min + step * rng.gen_range(0..=steps) as f64)
            }
            ParameterDomain::Bool => Value::Bool(rng.gen()),
            ParameterDomain::Among { values } => values.choose(rng).cloned().unwrap_or(Value::Nil),
        }
    }

    /// Values one step away from `current` that stay inside the domain.
    pub fn neighbor_values(&self, current: &Value) -> Vec<Value> {
        match (&self.domain, current) {
            (ParameterDomain::Int { min, max, step }, Value::Int(v)) => {
                [v.checked_sub(*step), v.checked_add(*step)]
                    .into_iter()
                    .flatten()
                    .filter(|n| (*min..=*max).contains(n))
                    .map(Value::Int)
                    .collect()
            }
            (ParameterDomain::Float { min, max, step }, Value::Float(v)) => {
                // Neighbors stay on the min + k * step grid used by sampling.
                let index = ((v - min) / step).round();
                [index - 1.0, index + 1.0]
                    .into_iter()
                    .map(|k| min + step * k)
                    .filter(|n| (*min..=*max).contains(n))
                    .map(Value::Float)
                    .collect()
            }
            (ParameterDomain::Bool, Value::Bool(b)) => vec![Value::Bool(!b)],
            (ParameterDomain::Among { values }, value) => {
                match values.iter().position(|v| v == value) {
                    Some(i) => {
                        let mut neighbors = Vec::new();
                        if i > 0 {
                            neighbors.push(values[i - 1].clone());
                        }
                        if let Some(next) = values.get(i + 1) {
                            neighbors.push(next.clone());
                        }
                        neighbors
                    }
                    None => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_int_samples_stay_on_grid() {
        let param = ExplorableParameter::int("x", -4, 6, 2);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let Value::Int(v) = param.sample(&mut rng) else {
                panic!("int domain must sample ints");
            };
            assert!((-4..=6).contains(&v));
            assert_eq!((v + 4) % 2, 0);
        }
    }

    #[test]
    fn test_neighbors_respect_bounds() {
        let param = ExplorableParameter::int("x", 0, 3, 1);
        assert_eq!(param.neighbor_values(&Value::Int(0)), vec![Value::Int(1)]);
        assert_eq!(
            param.neighbor_values(&Value::Int(2)),
            vec![Value::Int(1), Value::Int(3)]
        );
        assert!(param.neighbor_values(&Value::String("x".into())).is_empty());
    }

    #[test]
    fn test_extreme_int_domains() {
        assert!(ExplorableParameter::int("x", i64::MIN, i64::MAX, 1).validate().is_err());

        let param = ExplorableParameter::int("x", i64::MAX - 2, i64::MAX, 1);
        assert!(param.validate().is_ok());
        assert_eq!(
            param.neighbor_values(&Value::Int(i64::MAX)),
            vec![Value::Int(i64::MAX - 1)]
        );
        let mut rng = StdRng::seed_from_u64(3);
        let Value::Int(v) = param.sample(&mut rng) else {
            panic!("int domain must sample ints");
        };
        assert!(v >= i64::MAX - 2);
    }

    #[test]
    fn test_float_neighbors_stay_on_the_grid() {
        let param = ExplorableParameter::float("rate", 0.0, 1.0, 0.1);
        let mut current = Value::Float(0.0);
        for _ in 0..3 {
            let next = param.neighbor_values(&current).into_iter().last().unwrap();
            current = next;
        }
        assert_eq!(current, Value::Float(0.1 * 3.0));

        let neighbors = param.neighbor_values(&Value::Float(0.1 + 0.2));
        assert_eq!(neighbors, vec![Value::Float(0.1 * 2.0), Value::Float(0.1 * 4.0)]);
    }

    #[test]
    fn test_among_neighbors_are_adjacent_values() {
        let values = vec![Value::Int(10), Value::Int(20), Value::Int(30)];
        let param = ExplorableParameter::among("p", values);
        assert_eq!(
            param.neighbor_values(&Value::Int(30)),
            vec![Value::Int(20)]
        );
        assert_eq!(param.gaml_type(), GamlType::int());
    }

    #[test]
    fn test_invalid_domains_are_rejected() {
        assert!(ExplorableParameter::int("x", 3, 1, 1).validate().is_err());
        assert!(ExplorableParameter::float("y", 0.0, 1.0, 0.0).validate().is_err());
        assert!(ExplorableParameter::among("z", Vec::new()).validate().is_err());
        assert!(ExplorableParameter::bool("b").validate().is_ok());
    }

    #[test]
    fn test_domain_deserializes_from_tagged_form() {
        let json = r#"{"name": "rate", "domain": {"kind": "float", "min": 0.0, "max": 1.0, "step": 0.1}}"#;
        let param: ExplorableParameter = serde_json::from_str(json).unwrap();
        assert_eq!(param, ExplorableParameter::float("rate", 0.0, 1.0, 0.1));
    }
}
