use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use super::parameters::ExplorableParameter;
use super::solution::Solution;
use crate::types::Value;

/// Candidate of the genetic search: one gene per explorable parameter, in
/// parameter order, and the fitness once it is known.
///
/// Equality and hashing only look at the genes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chromosome {
    genes: Vec<Value>,
    fitness: Option<f64>,
}

impl Chromosome {
    pub fn new(genes: Vec<Value>) -> Self {
        Self {
            genes,
            fitness: None,
        }
    }

    /// Missing parameters get a `nil` gene.
    pub fn from_solution(solution: &Solution, parameters: &[ExplorableParameter]) -> Self {
        Self::new(
            parameters
                .iter()
                .map(|p| solution.get(&p.name).cloned().unwrap_or(Value::Nil))
                .collect(),
        )
    }

    pub fn to_solution(&self, parameters: &[ExplorableParameter]) -> Solution {
        Solution::from_pairs(
            parameters
                .iter()
                .zip(&self.genes)
                .map(|(p, gene)| (p.name.clone(), gene.clone())),
        )
    }

    /// Replaces the genes by the values of `solution`.
    pub fn update(&mut self, solution: &Solution, parameters: &[ExplorableParameter]) {
        for (gene, parameter) in self.genes.iter_mut().zip(parameters) {
            if let Some(value) = solution.get(&parameter.name) {
                *gene = value.clone();
            }
        }
    }

    pub fn genes(&self) -> &[Value] {
        &self.genes
    }

    pub fn genes_mut(&mut self) -> &mut Vec<Value> {
        &mut self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }
}

impl PartialEq for Chromosome {
    fn eq(&self, other: &Self) -> bool {
        self.genes == other.genes
    }
}

impl Eq for Chromosome {}

impl Hash for Chromosome {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.genes.hash(state);
    }
}
