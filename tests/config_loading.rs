use gamlcore::config::{Aggregation, ConfigManager};
use gamlcore::engines::exploration::OptimizationDirection;
use gamlcore::GamlError;
use std::fs;
use std::path::PathBuf;

// Environment overrides apply to every load, so only the env test touches
// `batch.repeat`.

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("gamlcore_{}_{}", std::process::id(), name));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_toml() {
    let path = temp_file(
        "genetic.toml",
        r#"
[genetic]
pop_dim = 10
crossover_prob = 0.5
max_gen = 50
improve_sol = true
direction = "minimize"
seed = 42
"#,
    );
    let manager = ConfigManager::new();
    manager.load_from_file(&path).unwrap();
    let config = manager.get().unwrap();

    assert_eq!(config.genetic.pop_dim, 10);
    assert_eq!(config.genetic.crossover_prob, 0.5);
    assert_eq!(config.genetic.max_gen, 50);
    assert_eq!(config.genetic.mutation_prob, 0.1);
    assert_eq!(config.genetic.direction, OptimizationDirection::Minimize);
    assert_eq!(config.genetic.seed, Some(42));
    assert!(config.genetic.local_search().is_some());
    assert!(config.compiler.constant_optimization);
    fs::remove_file(path).ok();
}

#[test]
fn test_load_json() {
    let path = temp_file(
        "compiler.json",
        r#"{ "compiler": { "constant_optimization": false }, "batch": { "aggregation": "max" } }"#,
    );
    let manager = ConfigManager::new();
    manager.load_from_file(&path).unwrap();
    let config = manager.get().unwrap();

    assert!(!config.compiler.constant_optimization);
    assert!(config.compiler.check_expected_types);
    assert_eq!(config.batch.aggregation, Aggregation::Max);
    fs::remove_file(path).ok();
}

#[test]
fn test_invalid_file_is_rejected_and_previous_config_kept() {
    let path = temp_file("invalid.toml", "[genetic]\nmutation_prob = 2.0\n");
    let manager = ConfigManager::new();
    let err = manager.load_from_file(&path).unwrap_err();
    assert!(matches!(err, GamlError::Configuration(_)));
    assert_eq!(manager.get().unwrap().genetic.mutation_prob, 0.1);
    fs::remove_file(path).ok();
}

#[test]
fn test_save_and_reload() {
    let manager = ConfigManager::new();
    manager
        .update(|config| {
            config.genetic.pop_dim = 7;
            config.genetic.stochastic_sel = true;
            config.compiler.check_expected_types = false;
        })
        .unwrap();

    let path = std::env::temp_dir().join(format!("gamlcore_{}_saved.toml", std::process::id()));
    manager.save_to_file(&path).unwrap();

    let reloaded = ConfigManager::new();
    reloaded.load_from_file(&path).unwrap();
    let config = reloaded.get().unwrap();
    assert_eq!(config.genetic.pop_dim, 7);
    assert!(config.genetic.stochastic_sel);
    assert!(!config.compiler.check_expected_types);
    assert_eq!(config.genetic.seed, None);
    fs::remove_file(path).ok();
}

#[test]
fn test_update_rejects_invalid_values() {
    let manager = ConfigManager::new();
    let result = manager.update(|config| config.genetic.pop_dim = 0);
    assert!(result.is_err());
    assert_eq!(manager.get().unwrap().genetic.pop_dim, 3);
}

#[test]
fn test_environment_overrides() {
    std::env::set_var("GAML_BATCH__REPEAT", "5");
    let manager = ConfigManager::new();
    let loaded = manager.load_from_env();
    std::env::remove_var("GAML_BATCH__REPEAT");

    loaded.unwrap();
    assert_eq!(manager.get().unwrap().batch.repeat, 5);
}
