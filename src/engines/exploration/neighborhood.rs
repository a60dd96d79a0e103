use super::parameters::ExplorableParameter;
use super::solution::Solution;

/// Candidate solutions adjacent to a given one, for local search.
///
/// An empty list means there is nowhere left to go. `None` entries are
/// candidates that could not be built; callers skip them.
pub trait Neighborhood: Send + Sync {
    fn neighbors(&self, solution: &Solution) -> Vec<Option<Solution>>;
}

/// Neighbors that differ from the solution by one step of one parameter.
pub struct OneVariableNeighborhood {
    parameters: Vec<ExplorableParameter>,
}

impl OneVariableNeighborhood {
    pub fn new(parameters: Vec<ExplorableParameter>) -> Self {
        Self { parameters }
    }
}

impl Neighborhood for OneVariableNeighborhood {
    fn neighbors(&self, solution: &Solution) -> Vec<Option<Solution>> {
        let mut neighbors = Vec::new();
        for parameter in &self.parameters {
            match solution.get(&parameter.name) {
                Some(current) => neighbors.extend(
                    parameter
                        .neighbor_values(current)
                        .into_iter()
                        .map(|value| Some(solution.with(&parameter.name, value))),
                ),
                None => neighbors.push(None),
            }
        }
        neighbors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_one_variable_neighbors() {
        let neighborhood = OneVariableNeighborhood::new(vec![
            ExplorableParameter::int("x", 0, 5, 1),
            ExplorableParameter::bool("flag"),
        ]);
        let solution = Solution::from_pairs([("x", Value::Int(0)), ("flag", Value::Bool(true))]);
        let neighbors: Vec<Solution> = neighborhood.neighbors(&solution).into_iter().flatten().collect();
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.contains(&solution.with("x", Value::Int(1))));
        assert!(neighbors.contains(&solution.with("flag", Value::Bool(false))));
    }

    #[test]
    fn test_missing_parameter_gives_a_none_entry() {
        let neighborhood = OneVariableNeighborhood::new(vec![ExplorableParameter::int("x", 0, 5, 1)]);
        let neighbors = neighborhood.neighbors(&Solution::new());
        assert_eq!(neighbors, vec![None]);
    }

    #[test]
    fn test_no_parameters_means_no_neighbors() {
        let neighborhood = OneVariableNeighborhood::new(Vec::new());
        assert!(neighborhood.neighbors(&Solution::new()).is_empty());
    }
}
