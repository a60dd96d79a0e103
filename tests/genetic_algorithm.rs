use gamlcore::config::{Aggregation, BatchConfig, GeneticConfig};
use gamlcore::engines::exploration::progress::ProgressMessage;
use gamlcore::engines::exploration::{
    ChannelProgressCallback, Chromosome, ExplorableParameter, GeneticAlgorithm,
    OptimizationDirection, ReplicatedFitness, SilentProgress, Solution,
};
use gamlcore::types::Value;
use gamlcore::GamlError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

fn grid(max: i64) -> Vec<ExplorableParameter> {
    vec![
        ExplorableParameter::int("x", 0, max, 1),
        ExplorableParameter::int("y", 0, max, 1),
    ]
}

fn diagonal() -> Vec<Chromosome> {
    (0..4)
        .map(|i| Chromosome::new(vec![Value::Int(i), Value::Int(i)]))
        .collect()
}

fn sum(solution: &Solution) -> anyhow::Result<f64> {
    let mut total = 0.0;
    for (_, value) in solution.iter() {
        total += value.as_float()?;
    }
    Ok(total)
}

fn config(max_gen: usize) -> GeneticConfig {
    GeneticConfig {
        pop_dim: 4,
        crossover_prob: 1.0,
        mutation_prob: 0.0,
        max_gen,
        seed: Some(17),
        ..GeneticConfig::default()
    }
}

#[test]
fn test_one_generation_finds_the_diagonal_corner() {
    let mut ga = GeneticAlgorithm::new(config(1), grid(3)).unwrap();
    let result = ga.run_from(diagonal(), &sum, SilentProgress).unwrap();

    assert_eq!(result.generations_completed, 1);
    assert!(!result.interrupted);
    assert_eq!(result.best_fitness, Some(6.0));
    assert_eq!(
        result.best_solution.unwrap(),
        Solution::from_pairs([("x", Value::Int(3)), ("y", Value::Int(3))])
    );
    assert!(result.population.len() <= 4);
    assert!(result.population.iter().all(|c| c.fitness().is_some()));
}

#[test]
fn test_each_solution_is_evaluated_once() {
    let calls = AtomicUsize::new(0);
    let counting = |solution: &Solution| -> anyhow::Result<f64> {
        calls.fetch_add(1, Ordering::SeqCst);
        sum(solution)
    };
    let mut ga = GeneticAlgorithm::new(config(5), grid(3)).unwrap();
    let result = ga.run_from(diagonal(), &counting, SilentProgress).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), result.evaluations);
    assert_eq!(result.evaluations, result.tested_solutions);
    // The 4x4 grid bounds the number of distinct solutions.
    assert!(result.tested_solutions <= 16);
}

#[test]
fn test_evaluation_failure_stops_the_run() {
    let failing = |solution: &Solution| -> anyhow::Result<f64> {
        if solution.get("x") == Some(&Value::Int(2)) {
            anyhow::bail!("simulation crashed");
        }
        sum(solution)
    };
    let mut ga = GeneticAlgorithm::new(config(3), grid(3)).unwrap();
    let err = ga.run_from(diagonal(), &failing, SilentProgress).unwrap_err();
    assert!(matches!(err, GamlError::Fitness { .. }));
    assert!(err.to_string().contains("simulation crashed"));
}

#[test]
fn test_interrupted_run_returns_partial_result() {
    let mut ga = GeneticAlgorithm::new(config(10), grid(3)).unwrap();
    ga.interrupt_handle().store(true, Ordering::SeqCst);
    let result = ga.run_from(diagonal(), &sum, SilentProgress).unwrap();

    assert!(result.interrupted);
    assert_eq!(result.generations_completed, 0);
    assert_eq!(result.evaluations, 0);
    assert!(result.best_solution.is_none());
}

#[test]
fn test_local_search_climbs_to_the_optimum() {
    let peak = |solution: &Solution| -> anyhow::Result<f64> {
        let x = solution.get("x").map(Value::as_float).transpose()?.unwrap_or(0.0);
        Ok(-(x - 15.0) * (x - 15.0))
    };
    let config = GeneticConfig {
        pop_dim: 2,
        crossover_prob: 0.0,
        mutation_prob: 0.0,
        max_gen: 1,
        improve_sol: true,
        seed: Some(4),
        ..GeneticConfig::default()
    };
    let params = vec![ExplorableParameter::int("x", 0, 20, 1)];
    let initial = vec![Chromosome::new(vec![Value::Int(0)])];
    let mut ga = GeneticAlgorithm::new(config, params).unwrap();
    let result = ga.run_from(initial, &peak, SilentProgress).unwrap();

    assert_eq!(result.best_fitness, Some(0.0));
    assert_eq!(result.population[0].genes(), &[Value::Int(15)]);
}

#[test]
fn test_local_search_respects_the_step_budget() {
    let peak = |solution: &Solution| -> anyhow::Result<f64> {
        let x = solution.get("x").map(Value::as_float).transpose()?.unwrap_or(0.0);
        Ok(x)
    };
    let config = GeneticConfig {
        pop_dim: 1,
        crossover_prob: 0.0,
        mutation_prob: 0.0,
        max_gen: 1,
        improve_sol: true,
        local_search_max_steps: Some(3),
        seed: Some(4),
        ..GeneticConfig::default()
    };
    let params = vec![ExplorableParameter::int("x", 0, 20, 1)];
    let mut ga = GeneticAlgorithm::new(config, params).unwrap();
    let result = ga
        .run_from(vec![Chromosome::new(vec![Value::Int(0)])], &peak, SilentProgress)
        .unwrap();
    assert_eq!(result.population[0].genes(), &[Value::Int(3)]);
}

#[test]
fn test_minimization() {
    let config = GeneticConfig {
        direction: OptimizationDirection::Minimize,
        ..config(2)
    };
    let mut ga = GeneticAlgorithm::new(config, grid(3)).unwrap();
    let result = ga.run_from(diagonal(), &sum, SilentProgress).unwrap();
    assert_eq!(result.best_fitness, Some(0.0));
}

#[test]
fn test_parallel_evaluation_matches_sequential() {
    let run = |parallel: bool| {
        let config = GeneticConfig {
            parallel_evaluation: parallel,
            mutation_prob: 0.3,
            ..config(4)
        };
        let mut ga = GeneticAlgorithm::new(config, grid(5)).unwrap();
        ga.run(&sum, SilentProgress).unwrap()
    };
    let sequential = run(false);
    let parallel = run(true);
    assert_eq!(sequential.best_fitness, parallel.best_fitness);
    assert_eq!(sequential.tested_solutions, parallel.tested_solutions);
}

#[test]
fn test_replicated_fitness_drives_the_search() {
    let runner = |solution: &Solution, replication: usize| -> anyhow::Result<f64> {
        Ok(sum(solution)? + replication as f64)
    };
    let batch = BatchConfig {
        repeat: 3,
        aggregation: Aggregation::Mean,
        parallel_replications: true,
    };
    let fitness = ReplicatedFitness::new(runner, &batch);
    let mut ga = GeneticAlgorithm::new(config(1), grid(3)).unwrap();
    let result = ga.run_from(diagonal(), &fitness, SilentProgress).unwrap();
    assert_eq!(result.best_fitness, Some(7.0));
}

#[test]
fn test_progress_is_reported_per_generation() {
    let (sender, receiver) = mpsc::channel();
    let mut ga = GeneticAlgorithm::new(config(3), grid(3)).unwrap();
    ga.run_from(diagonal(), &sum, ChannelProgressCallback::new(sender))
        .unwrap();

    let messages: Vec<ProgressMessage> = receiver.try_iter().collect();
    let starts = messages
        .iter()
        .filter(|m| matches!(m, ProgressMessage::GenerationStart(_)))
        .count();
    assert_eq!(starts, 3);
    match messages.last() {
        Some(ProgressMessage::GenerationComplete {
            generation,
            best_fitness,
            ..
        }) => {
            assert_eq!(*generation, 2);
            assert_eq!(*best_fitness, Some(6.0));
        }
        other => panic!("unexpected last message {:?}", other),
    }
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let bad = GeneticConfig {
        crossover_prob: 1.5,
        ..GeneticConfig::default()
    };
    assert!(matches!(
        GeneticAlgorithm::new(bad, grid(3)),
        Err(GamlError::Configuration(_))
    ));
    let reversed = vec![ExplorableParameter::int("x", 5, 0, 1)];
    assert!(GeneticAlgorithm::new(GeneticConfig::default(), reversed).is_err());
}
