pub mod chromosome;
pub mod fitness;
pub mod genetic_algorithm;
pub mod neighborhood;
pub mod operators;
pub mod parameters;
pub mod progress;
pub mod solution;

pub use chromosome::Chromosome;
pub use fitness::{
    ExpressionFitness, FitnessCache, FitnessEvaluator, OptimizationDirection, ReplicatedFitness,
    SimulationRunner,
};
pub use genetic_algorithm::{ExplorationResult, GeneticAlgorithm, LocalSearchConfig};
pub use neighborhood::{Neighborhood, OneVariableNeighborhood};
pub use operators::SelectionMethod;
pub use parameters::{ExplorableParameter, ParameterDomain};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, ProgressCallback, SilentProgress};
pub use solution::Solution;
