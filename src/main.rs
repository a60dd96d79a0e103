use std::sync::Arc;

use anyhow::{anyhow, Context};
use gamlcore::config::ConfigManager;
use gamlcore::engines::evaluation::{Diagnostics, Expression, ExpressionBuilder};
use gamlcore::engines::exploration::{
    ConsoleProgressCallback, ExplorableParameter, ExpressionFitness, GeneticAlgorithm,
};
use gamlcore::functions::OperatorRegistry;
use gamlcore::types::{GamlType, Value};

/// Builds `-((x - a) * (x - a))` for one parameter.
fn squared_distance(
    builder: &ExpressionBuilder,
    name: &str,
    target: i64,
    diagnostics: &mut Diagnostics,
) -> Option<Expression> {
    let delta = builder.operator(
        "-",
        vec![
            builder.variable(name, GamlType::int()),
            builder.constant(Value::Int(target)),
        ],
        diagnostics,
    )?;
    let square = builder.operator("*", vec![delta.clone(), delta], diagnostics)?;
    builder.operator("-", vec![square], diagnostics)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let manager = ConfigManager::new();
    match std::env::args().nth(1) {
        Some(path) => manager
            .load_from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => manager.load_from_env()?,
    }
    let config = manager.get()?;

    let registry = Arc::new(OperatorRegistry::with_builtins());
    let builder = ExpressionBuilder::with_config(registry, config.compiler.clone());
    let mut diagnostics = Diagnostics::new();

    let fitness = squared_distance(&builder, "x", 3, &mut diagnostics)
        .zip(squared_distance(&builder, "y", -1, &mut diagnostics))
        .and_then(|(x, y)| builder.operator("+", vec![x, y], &mut diagnostics));
    for diagnostic in diagnostics.items() {
        log::warn!("{:?}: {}", diagnostic.code, diagnostic.message);
    }
    let fitness = fitness.ok_or_else(|| anyhow!("the fitness expression did not compile"))?;
    log::info!("Maximizing {}", fitness);

    let parameters = vec![
        ExplorableParameter::int("x", -10, 10, 1),
        ExplorableParameter::int("y", -10, 10, 1),
    ];
    let mut ga = GeneticAlgorithm::new(config.genetic.clone(), parameters)?;
    let result = ga.run(&ExpressionFitness::new(fitness), ConsoleProgressCallback)?;

    match (&result.best_solution, result.best_fitness) {
        (Some(solution), Some(fitness)) => log::info!(
            "Best solution {} with fitness {} ({} solutions tested)",
            solution,
            fitness,
            result.tested_solutions
        ),
        _ => log::info!("No solution was tested"),
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
