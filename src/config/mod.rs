pub mod batch;
pub mod compiler;
pub mod exploration;
pub mod manager;
pub mod traits;

pub use batch::{Aggregation, BatchConfig};
pub use compiler::CompilerConfig;
pub use exploration::GeneticConfig;
pub use manager::{AppConfig, ConfigManager};
pub use traits::{ConfigManifest, ConfigSection, FieldManifest};
