use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::chromosome::Chromosome;
use super::fitness::OptimizationDirection;
use super::parameters::ExplorableParameter;

/// Random initial population of at most `size` distinct chromosomes.
/// Small domains may yield fewer.
pub fn initialize_uniform<R: Rng>(
    parameters: &[ExplorableParameter],
    size: usize,
    rng: &mut R,
) -> Vec<Chromosome> {
    let mut seen = HashSet::new();
    let mut population = Vec::with_capacity(size);
    let max_attempts = size.saturating_mul(10).max(1);
    for _ in 0..max_attempts {
        if population.len() >= size {
            break;
        }
        let chromosome = random_chromosome(parameters, rng);
        if seen.insert(chromosome.clone()) {
            population.push(chromosome);
        }
    }
    population
}

pub fn random_chromosome<R: Rng>(parameters: &[ExplorableParameter], rng: &mut R) -> Chromosome {
    Chromosome::new(parameters.iter().map(|p| p.sample(rng)).collect())
}

/// Single-point crossover: swap gene segments after a random cut.
/// Chromosomes with fewer than two genes have no cut point and give no offspring.
pub fn crossover_one_point<R: Rng>(
    parent1: &Chromosome,
    parent2: &Chromosome,
    rng: &mut R,
) -> Vec<Chromosome> {
    let len = parent1.len().min(parent2.len());
    if len < 2 {
        return Vec::new();
    }

    let point = rng.gen_range(1..len);

    let mut child1 = parent1.genes().to_vec();
    let mut child2 = parent2.genes().to_vec();

    child1[point..len].clone_from_slice(&parent2.genes()[point..len]);
    child2[point..len].clone_from_slice(&parent1.genes()[point..len]);

    vec![Chromosome::new(child1), Chromosome::new(child2)]
}

/// Mutation: resample one randomly chosen gene within its domain.
pub fn mutate_one_var<R: Rng>(
    chromosome: &Chromosome,
    parameters: &[ExplorableParameter],
    rng: &mut R,
) -> Chromosome {
    let mut mutant = Chromosome::new(chromosome.genes().to_vec());
    let len = parameters.len().min(mutant.len());
    if len == 0 {
        return mutant;
    }
    let index = rng.gen_range(0..len);
    mutant.genes_mut()[index] = parameters[index].sample(rng);
    mutant
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMethod {
    /// Keep the `size` best chromosomes.
    Best,
    /// Draw `size` chromosomes without replacement, with a probability
    /// proportional to their fitness.
    Roulette,
}

impl SelectionMethod {
    /// Reduces `population` to at most `size` of its members.
    pub fn select<R: Rng>(
        &self,
        population: Vec<Chromosome>,
        size: usize,
        direction: OptimizationDirection,
        rng: &mut R,
    ) -> Vec<Chromosome> {
        if population.len() <= size {
            return population;
        }
        match self {
            SelectionMethod::Best => best_selection(population, size, direction),
            SelectionMethod::Roulette => roulette_selection(population, size, direction, rng),
        }
    }
}

fn best_selection(
    mut population: Vec<Chromosome>,
    size: usize,
    direction: OptimizationDirection,
) -> Vec<Chromosome> {
    population.sort_by(|a, b| direction.compare_best_first(a.fitness(), b.fitness()));
    population.truncate(size);
    population
}

/// Roulette wheel selection on weights shifted so that the worst member keeps
/// a small positive chance.
fn roulette_selection<R: Rng>(
    mut population: Vec<Chromosome>,
    size: usize,
    direction: OptimizationDirection,
    rng: &mut R,
) -> Vec<Chromosome> {
    let scores: Vec<f64> = population
        .iter()
        .map(|c| c.fitness().unwrap_or(direction.worst()))
        .map(|f| match direction {
            OptimizationDirection::Maximize => f,
            OptimizationDirection::Minimize => -f,
        })
        .collect();
    let finite_min = scores
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(f64::INFINITY, f64::min);
    let floor = if finite_min.is_finite() { finite_min } else { 0.0 };
    let mut weights: Vec<f64> = scores
        .iter()
        .map(|s| if s.is_finite() { s - floor + 1e-9 } else { 1e-9 })
        .collect();

    let mut selected = Vec::with_capacity(size);
    while selected.len() < size && !population.is_empty() {
        let total_weight: f64 = weights.iter().sum();
        let mut spin = rng.gen::<f64>() * total_weight;
        let mut chosen = population.len() - 1;
        for (i, weight) in weights.iter().enumerate() {
            spin -= weight;
            if spin <= 0.0 {
                chosen = i;
                break;
            }
        }
        weights.swap_remove(chosen);
        selected.push(population.swap_remove(chosen));
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scored(x: i64, fitness: f64) -> Chromosome {
        let mut c = Chromosome::new(vec![Value::Int(x)]);
        c.set_fitness(fitness);
        c
    }

    #[test]
    fn test_crossover_swaps_tails() {
        let mut rng = StdRng::seed_from_u64(5);
        let a = Chromosome::new(vec![Value::Int(0), Value::Int(0)]);
        let b = Chromosome::new(vec![Value::Int(1), Value::Int(1)]);
        let children = crossover_one_point(&a, &b, &mut rng);
        assert_eq!(children[0].genes(), &[Value::Int(0), Value::Int(1)]);
        assert_eq!(children[1].genes(), &[Value::Int(1), Value::Int(0)]);
    }

    #[test]
    fn test_single_gene_crossover_has_no_offspring() {
        let mut rng = StdRng::seed_from_u64(5);
        let a = Chromosome::new(vec![Value::Int(0)]);
        assert!(crossover_one_point(&a, &a, &mut rng).is_empty());
    }

    #[test]
    fn test_mutation_changes_at_most_one_gene() {
        let params = vec![
            ExplorableParameter::int("x", 0, 100, 1),
            ExplorableParameter::int("y", 0, 100, 1),
        ];
        let mut rng = StdRng::seed_from_u64(9);
        let original = Chromosome::new(vec![Value::Int(50), Value::Int(50)]);
        for _ in 0..20 {
            let mutant = mutate_one_var(&original, &params, &mut rng);
            let changed = mutant
                .genes()
                .iter()
                .zip(original.genes())
                .filter(|(a, b)| a != b)
                .count();
            assert!(changed <= 1);
        }
    }

    #[test]
    fn test_initial_population_is_distinct() {
        let params = vec![ExplorableParameter::int("x", 0, 1, 1)];
        let mut rng = StdRng::seed_from_u64(2);
        let population = initialize_uniform(&params, 10, &mut rng);
        assert!(population.len() <= 2);
        let unique: HashSet<_> = population.iter().cloned().collect();
        assert_eq!(unique.len(), population.len());
    }

    #[test]
    fn test_best_selection_keeps_the_best() {
        let population = vec![scored(1, 1.0), scored(2, 5.0), scored(3, 3.0)];
        let mut rng = StdRng::seed_from_u64(1);
        let kept = SelectionMethod::Best.select(
            population.clone(),
            2,
            OptimizationDirection::Maximize,
            &mut rng,
        );
        assert_eq!(kept, vec![scored(2, 5.0), scored(3, 3.0)]);

        let kept = SelectionMethod::Best.select(
            population,
            1,
            OptimizationDirection::Minimize,
            &mut rng,
        );
        assert_eq!(kept, vec![scored(1, 1.0)]);
    }

    #[test]
    fn test_roulette_returns_distinct_members_of_the_pool() {
        let population: Vec<Chromosome> = (0..8).map(|i| scored(i, -(i as f64))).collect();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            let kept = SelectionMethod::Roulette.select(
                population.clone(),
                3,
                OptimizationDirection::Maximize,
                &mut rng,
            );
            assert_eq!(kept.len(), 3);
            let unique: HashSet<_> = kept.iter().cloned().collect();
            assert_eq!(unique.len(), 3);
            assert!(kept.iter().all(|c| population.contains(c)));
        }
    }

    #[test]
    fn test_small_population_is_returned_whole() {
        let population = vec![scored(1, 1.0)];
        let mut rng = StdRng::seed_from_u64(1);
        let kept = SelectionMethod::Roulette.select(
            population.clone(),
            4,
            OptimizationDirection::Maximize,
            &mut rng,
        );
        assert_eq!(kept, population);
    }
}
