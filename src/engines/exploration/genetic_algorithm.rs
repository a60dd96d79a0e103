use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::chromosome::Chromosome;
use super::fitness::{FitnessCache, FitnessEvaluator, OptimizationDirection};
use super::neighborhood::{Neighborhood, OneVariableNeighborhood};
use super::operators::{crossover_one_point, initialize_uniform, mutate_one_var, SelectionMethod};
use super::parameters::ExplorableParameter;
use super::progress::ProgressCallback;
use super::solution::Solution;
use crate::config::{ConfigSection, GeneticConfig};
use crate::error::{GamlError, Result};

/// Hill climbing applied to every chromosome after evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSearchConfig {
    /// Improvement steps allowed per chromosome. `None` climbs until no
    /// neighbor is better.
    pub max_steps: Option<usize>,
}

/// Outcome of one exploration run.
#[derive(Debug, Clone, Serialize)]
pub struct ExplorationResult {
    /// Best solution over every tested solution, not only the final population.
    pub best_solution: Option<Solution>,
    pub best_fitness: Option<f64>,
    pub population: Vec<Chromosome>,
    pub generations_completed: usize,
    /// Calls made to the fitness evaluator.
    pub evaluations: usize,
    pub tested_solutions: usize,
    pub interrupted: bool,
}

/// Generational genetic search over the explorable parameters.
pub struct GeneticAlgorithm {
    config: GeneticConfig,
    parameters: Vec<ExplorableParameter>,
    selection: SelectionMethod,
    local_search: Option<LocalSearchConfig>,
    neighborhood: Box<dyn Neighborhood>,
    rng: StdRng,
    interrupted: Arc<AtomicBool>,
}

impl GeneticAlgorithm {
    pub fn new(config: GeneticConfig, parameters: Vec<ExplorableParameter>) -> Result<Self> {
        config.validate()?;
        for parameter in &parameters {
            parameter.validate()?;
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            selection: config.selection(),
            local_search: config.local_search(),
            neighborhood: Box::new(OneVariableNeighborhood::new(parameters.clone())),
            config,
            parameters,
            rng,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_neighborhood(mut self, neighborhood: Box<dyn Neighborhood>) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    pub fn with_local_search(mut self, local_search: Option<LocalSearchConfig>) -> Self {
        self.local_search = local_search;
        self
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    pub fn parameters(&self) -> &[ExplorableParameter] {
        &self.parameters
    }

    /// Flag checked between phases; setting it stops the run early.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Uses a flag owned elsewhere, such as the one of an evaluation scope.
    pub fn share_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.interrupted = flag;
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn direction(&self) -> OptimizationDirection {
        self.config.direction
    }

    /// Runs from a random initial population of `pop_dim` chromosomes.
    pub fn run<E, C>(&mut self, evaluator: &E, callback: C) -> Result<ExplorationResult>
    where
        E: FitnessEvaluator + ?Sized,
        C: ProgressCallback,
    {
        let population = initialize_uniform(&self.parameters, self.config.pop_dim, &mut self.rng);
        self.run_from(population, evaluator, callback)
    }

    /// Runs `max_gen` generations from the given population.
    pub fn run_from<E, C>(
        &mut self,
        initial: Vec<Chromosome>,
        evaluator: &E,
        mut callback: C,
    ) -> Result<ExplorationResult>
    where
        E: FitnessEvaluator + ?Sized,
        C: ProgressCallback,
    {
        if let Some(bad) = initial.iter().find(|c| c.len() != self.parameters.len()) {
            return Err(GamlError::Exploration(format!(
                "Chromosome with {} genes for {} parameters",
                bad.len(),
                self.parameters.len()
            )));
        }

        let cache = FitnessCache::new();
        let mut population = initial;
        let mut generations_completed = 0;
        let mut interrupted = false;

        for generation in 0..self.config.max_gen {
            if self.is_interrupted() {
                interrupted = true;
                break;
            }
            callback.on_generation_start(generation);

            self.crossover(&mut population);
            self.mutate(&mut population);
            self.evaluate_population(&mut population, &cache, evaluator, &mut callback)?;

            if self.is_interrupted() {
                interrupted = true;
                break;
            }

            if let Some(local_search) = self.local_search {
                for chromosome in population.iter_mut() {
                    self.improve(chromosome, local_search, &cache, evaluator)?;
                }
            }

            population = deduplicate(population);
            population = self.selection.select(
                population,
                self.config.pop_dim,
                self.direction(),
                &mut self.rng,
            );

            generations_completed += 1;
            let best = cache.best(self.direction()).map(|(_, f)| f);
            log::debug!(
                "generation {}: population {}, tested {}, best {:?}",
                generation + 1,
                population.len(),
                cache.len(),
                best
            );
            callback.on_generation_complete(generation, best, cache.len());
        }

        let best = cache.best(self.direction());
        if let Some((solution, fitness)) = &best {
            log::info!(
                "Exploration finished after {} generation(s): best {} with fitness {}",
                generations_completed,
                solution,
                fitness
            );
        }
        Ok(ExplorationResult {
            best_fitness: best.as_ref().map(|(_, f)| *f),
            best_solution: best.map(|(s, _)| s),
            population,
            generations_completed,
            evaluations: cache.evaluations(),
            tested_solutions: cache.len(),
            interrupted,
        })
    }

    /// Each member, with probability `crossover_prob`, is crossed with another
    /// random member. Offspring are deduplicated before they join.
    fn crossover(&mut self, population: &mut Vec<Chromosome>) {
        if self.parameters.is_empty() || population.is_empty() {
            return;
        }
        let mut seen = HashSet::new();
        let mut children = Vec::new();
        for i in 0..population.len() {
            if self.rng.gen::<f64>() >= self.config.crossover_prob {
                continue;
            }
            let partner = self.random_partner(i, population.len());
            for child in crossover_one_point(&population[i], &population[partner], &mut self.rng) {
                if seen.insert(child.clone()) {
                    children.push(child);
                }
            }
        }
        population.extend(children);
    }

    /// Uniformly random index other than `i`, or `i` itself in a population of one.
    fn random_partner(&mut self, i: usize, len: usize) -> usize {
        if len < 2 {
            return i;
        }
        let other = self.rng.gen_range(0..len - 1);
        if other >= i {
            other + 1
        } else {
            other
        }
    }

    fn mutate(&mut self, population: &mut Vec<Chromosome>) {
        if self.parameters.is_empty() {
            return;
        }
        let mut seen = HashSet::new();
        let mut mutants = Vec::new();
        for chromosome in population.iter() {
            if self.rng.gen::<f64>() < self.config.mutation_prob {
                let mutant = mutate_one_var(chromosome, &self.parameters, &mut self.rng);
                if seen.insert(mutant.clone()) {
                    mutants.push(mutant);
                }
            }
        }
        population.extend(mutants);
    }

    fn evaluate_population<E, C>(
        &self,
        population: &mut [Chromosome],
        cache: &FitnessCache,
        evaluator: &E,
        callback: &mut C,
    ) -> Result<()>
    where
        E: FitnessEvaluator + ?Sized,
        C: ProgressCallback,
    {
        let total = population.len();
        if self.config.parallel_evaluation {
            let solutions: Vec<Solution> = population
                .iter()
                .map(|c| c.to_solution(&self.parameters))
                .collect();
            let fitnesses = solutions
                .par_iter()
                .map(|solution| cache.get_or_evaluate(solution, evaluator))
                .collect::<Result<Vec<f64>>>()?;
            for (i, (chromosome, fitness)) in population.iter_mut().zip(fitnesses).enumerate() {
                chromosome.set_fitness(fitness);
                callback.on_solution_evaluated(i + 1, total);
            }
        } else {
            for (i, chromosome) in population.iter_mut().enumerate() {
                let solution = chromosome.to_solution(&self.parameters);
                chromosome.set_fitness(cache.get_or_evaluate(&solution, evaluator)?);
                callback.on_solution_evaluated(i + 1, total);
            }
        }
        Ok(())
    }

    /// Hill climbing from the chromosome's solution: move to the best strictly
    /// better neighbor until none is better, the neighborhood is empty, or the
    /// step budget runs out.
    fn improve<E>(
        &self,
        chromosome: &mut Chromosome,
        local_search: LocalSearchConfig,
        cache: &FitnessCache,
        evaluator: &E,
    ) -> Result<()>
    where
        E: FitnessEvaluator + ?Sized,
    {
        let mut best_solution = chromosome.to_solution(&self.parameters);
        let mut best_fitness = match chromosome.fitness() {
            Some(fitness) => fitness,
            None => cache.get_or_evaluate(&best_solution, evaluator)?,
        };
        let mut steps = 0;

        loop {
            if local_search.max_steps.is_some_and(|max| steps >= max) {
                break;
            }
            let neighbors = self.neighborhood.neighbors(&best_solution);
            if neighbors.is_empty() {
                break;
            }
            let mut improved = false;
            for neighbor in neighbors.into_iter().flatten() {
                let fitness = cache.get_or_evaluate(&neighbor, evaluator)?;
                if self.direction().is_better(fitness, best_fitness) {
                    best_solution = neighbor;
                    best_fitness = fitness;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
            steps += 1;
        }

        chromosome.update(&best_solution, &self.parameters);
        chromosome.set_fitness(best_fitness);
        Ok(())
    }
}

/// Keeps the first occurrence of each gene vector.
fn deduplicate(population: Vec<Chromosome>) -> Vec<Chromosome> {
    let mut seen = HashSet::new();
    population
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::exploration::progress::SilentProgress;
    use crate::types::Value;

    fn pair(x: i64, y: i64) -> Chromosome {
        Chromosome::new(vec![Value::Int(x), Value::Int(y)])
    }

    fn sum(solution: &Solution) -> anyhow::Result<f64> {
        let mut total = 0.0;
        for (_, value) in solution.iter() {
            total += value.as_float()?;
        }
        Ok(total)
    }

    #[test]
    fn test_deduplicate_keeps_first() {
        let mut first = pair(1, 1);
        first.set_fitness(2.0);
        let population = deduplicate(vec![first.clone(), pair(1, 1), pair(2, 2)]);
        assert_eq!(population.len(), 2);
        assert_eq!(population[0].fitness(), Some(2.0));
    }

    #[test]
    fn test_partner_is_never_self() {
        let config = GeneticConfig {
            seed: Some(3),
            ..GeneticConfig::default()
        };
        let mut ga = GeneticAlgorithm::new(config, Vec::new()).unwrap();
        for _ in 0..50 {
            let partner = ga.random_partner(2, 4);
            assert!(partner < 4 && partner != 2);
        }
        assert_eq!(ga.random_partner(0, 1), 0);
    }

    #[test]
    fn test_zero_generations_tests_nothing() {
        let config = GeneticConfig {
            max_gen: 0,
            seed: Some(1),
            ..GeneticConfig::default()
        };
        let params = vec![ExplorableParameter::int("x", 0, 3, 1), ExplorableParameter::int("y", 0, 3, 1)];
        let mut ga = GeneticAlgorithm::new(config, params).unwrap();
        let result = ga.run(&sum, SilentProgress).unwrap();
        assert!(result.best_solution.is_none());
        assert_eq!(result.evaluations, 0);
    }

    #[test]
    fn test_wrong_gene_count_is_rejected() {
        let params = vec![ExplorableParameter::int("x", 0, 3, 1)];
        let mut ga = GeneticAlgorithm::new(GeneticConfig::default(), params).unwrap();
        let err = ga.run_from(vec![pair(0, 0)], &sum, SilentProgress).unwrap_err();
        assert!(matches!(err, GamlError::Exploration(_)));
    }
}
