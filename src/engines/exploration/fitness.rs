use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::solution::Solution;
use crate::config::{Aggregation, BatchConfig};
use crate::engines::evaluation::{Expression, Scope};
use crate::error::{GamlError, Result};

/// Whether the fitness should be maximized or minimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationDirection {
    Maximize,
    Minimize,
}

impl OptimizationDirection {
    /// Strictly better; ties are not an improvement.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            OptimizationDirection::Maximize => candidate > incumbent,
            OptimizationDirection::Minimize => candidate < incumbent,
        }
    }

    pub fn worst(&self) -> f64 {
        match self {
            OptimizationDirection::Maximize => f64::NEG_INFINITY,
            OptimizationDirection::Minimize => f64::INFINITY,
        }
    }

    /// Ordering that puts the better fitness first; unknown fitness goes last.
    pub fn compare_best_first(&self, a: Option<f64>, b: Option<f64>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => {
                let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
                match self {
                    OptimizationDirection::Maximize => ordering.reverse(),
                    OptimizationDirection::Minimize => ordering,
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Scores one solution, typically by running simulations. May block and may fail.
pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(&self, solution: &Solution) -> anyhow::Result<f64>;
}

impl<F> FitnessEvaluator for F
where
    F: Fn(&Solution) -> anyhow::Result<f64> + Send + Sync,
{
    fn evaluate(&self, solution: &Solution) -> anyhow::Result<f64> {
        self(solution)
    }
}

type Slot = Arc<Mutex<Option<f64>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fitness of every solution tested during one run.
///
/// Each solution has its own slot lock, so concurrent requests for the same
/// solution run the evaluator once and the others wait for the result.
#[derive(Default)]
pub struct FitnessCache {
    slots: Mutex<HashMap<Solution, Slot>>,
    evaluations: AtomicUsize,
}

impl FitnessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, solution: &Solution) -> Option<f64> {
        let slot = lock(&self.slots).get(solution).cloned()?;
        let value = *lock(&slot);
        value
    }

    pub fn contains(&self, solution: &Solution) -> bool {
        self.get(solution).is_some()
    }

    /// Cached fitness of `solution`, computed with `evaluator` on a miss.
    pub fn get_or_evaluate<E>(&self, solution: &Solution, evaluator: &E) -> Result<f64>
    where
        E: FitnessEvaluator + ?Sized,
    {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(solution.clone()).or_default())
        };
        let mut value = lock(&slot);
        if let Some(fitness) = *value {
            return Ok(fitness);
        }
        let fitness = evaluator
            .evaluate(solution)
            .map_err(|e| GamlError::Fitness {
                solution: solution.to_string(),
                source: e.into(),
            })?;
        self.evaluations.fetch_add(1, AtomicOrdering::SeqCst);
        log::trace!("fitness of {} = {}", solution, fitness);
        *value = Some(fitness);
        Ok(fitness)
    }

    /// Number of evaluator calls that succeeded.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(AtomicOrdering::SeqCst)
    }

    /// Solutions with a known fitness.
    pub fn tested(&self) -> Vec<(Solution, f64)> {
        let slots = lock(&self.slots);
        slots
            .iter()
            .filter_map(|(solution, slot)| {
                let fitness = *lock(slot);
                fitness.map(|f| (solution.clone(), f))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tested().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best tested solution for `direction`. Ties go to the solution that
    /// prints first, so the answer does not depend on hashing order.
    pub fn best(&self, direction: OptimizationDirection) -> Option<(Solution, f64)> {
        let mut best: Option<(Solution, f64)> = None;
        for (solution, fitness) in self.tested() {
            let replace = match &best {
                None => true,
                Some((incumbent, best_fitness)) => {
                    direction.is_better(fitness, *best_fitness)
                        || (fitness == *best_fitness
                            && solution.to_string() < incumbent.to_string())
                }
            };
            if replace {
                best = Some((solution, fitness));
            }
        }
        best
    }
}

/// Runs one replication of a simulation for a solution and returns its score.
pub trait SimulationRunner: Send + Sync {
    fn run(&self, solution: &Solution, replication: usize) -> anyhow::Result<f64>;
}

impl<F> SimulationRunner for F
where
    F: Fn(&Solution, usize) -> anyhow::Result<f64> + Send + Sync,
{
    fn run(&self, solution: &Solution, replication: usize) -> anyhow::Result<f64> {
        self(solution, replication)
    }
}

/// Fitness as the aggregate of several replications of the simulation.
pub struct ReplicatedFitness<S> {
    runner: S,
    repeat: usize,
    aggregation: Aggregation,
    parallel: bool,
}

impl<S: SimulationRunner> ReplicatedFitness<S> {
    pub fn new(runner: S, config: &BatchConfig) -> Self {
        Self {
            runner,
            repeat: config.repeat.max(1),
            aggregation: config.aggregation,
            parallel: config.parallel_replications,
        }
    }
}

impl<S: SimulationRunner> FitnessEvaluator for ReplicatedFitness<S> {
    fn evaluate(&self, solution: &Solution) -> anyhow::Result<f64> {
        let scores: Vec<f64> = if self.parallel {
            (0..self.repeat)
                .into_par_iter()
                .map(|replication| self.runner.run(solution, replication))
                .collect::<anyhow::Result<_>>()?
        } else {
            (0..self.repeat)
                .map(|replication| self.runner.run(solution, replication))
                .collect::<anyhow::Result<_>>()?
        };
        self.aggregation
            .apply(&scores)
            .ok_or_else(|| anyhow::anyhow!("no replication was run for {}", solution))
    }
}

/// Fitness given by an expression over the parameters, evaluated in a fresh
/// scope where each parameter of the solution is a variable.
pub struct ExpressionFitness {
    expression: Expression,
    seed: Option<u64>,
}

impl ExpressionFitness {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression,
            seed: None,
        }
    }

    /// Seeds the random stream of every evaluation scope.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

impl FitnessEvaluator for ExpressionFitness {
    fn evaluate(&self, solution: &Solution) -> anyhow::Result<f64> {
        let mut scope = match self.seed {
            Some(seed) => Scope::with_seed(seed),
            None => Scope::new(),
        };
        for (name, value) in solution.iter() {
            scope.set_var(name, value.clone());
        }
        let value = self.expression.value(&mut scope)?;
        Ok(value.as_float()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn solution(x: i64) -> Solution {
        Solution::from_pairs([("x", Value::Int(x))])
    }

    #[test]
    fn test_cache_evaluates_once_per_solution() {
        let cache = FitnessCache::new();
        let evaluator = |s: &Solution| -> anyhow::Result<f64> { Ok(s.get("x").unwrap().as_float()?) };
        assert_eq!(cache.get_or_evaluate(&solution(2), &evaluator).unwrap(), 2.0);
        assert_eq!(cache.get_or_evaluate(&solution(2), &evaluator).unwrap(), 2.0);
        assert_eq!(cache.evaluations(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_evaluation_is_not_cached() {
        let cache = FitnessCache::new();
        let failing = |_: &Solution| -> anyhow::Result<f64> { anyhow::bail!("simulation crashed") };
        let err = cache.get_or_evaluate(&solution(1), &failing).unwrap_err();
        assert!(matches!(err, GamlError::Fitness { .. }));
        assert!(!cache.contains(&solution(1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_best_follows_direction() {
        let cache = FitnessCache::new();
        let evaluator = |s: &Solution| -> anyhow::Result<f64> { Ok(s.get("x").unwrap().as_float()?) };
        for x in [3, -1, 7] {
            cache.get_or_evaluate(&solution(x), &evaluator).unwrap();
        }
        assert_eq!(cache.best(OptimizationDirection::Maximize).unwrap().1, 7.0);
        assert_eq!(cache.best(OptimizationDirection::Minimize).unwrap().1, -1.0);
    }

    #[test]
    fn test_replications_are_aggregated() {
        let runner = |_: &Solution, replication: usize| -> anyhow::Result<f64> { Ok(replication as f64) };
        let config = BatchConfig {
            repeat: 4,
            aggregation: Aggregation::Max,
            parallel_replications: true,
        };
        let fitness = ReplicatedFitness::new(runner, &config);
        assert_eq!(fitness.evaluate(&solution(0)).unwrap(), 3.0);
    }

    #[test]
    fn test_compare_best_first() {
        let max = OptimizationDirection::Maximize;
        assert_eq!(max.compare_best_first(Some(2.0), Some(1.0)), Ordering::Less);
        assert_eq!(max.compare_best_first(None, Some(1.0)), Ordering::Greater);
        assert!(OptimizationDirection::Minimize.is_better(1.0, 2.0));
        assert!(!max.is_better(2.0, 2.0));
    }
}
