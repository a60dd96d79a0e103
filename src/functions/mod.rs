pub mod manifest;
pub mod primitives;
pub mod prototype;
pub mod registry;
pub mod traits;

pub use manifest::OperatorManifest;
pub use prototype::{ArgStrategy, OperatorKind, OperatorPrototype, PrototypeBuilder};
pub use registry::{OperatorRegistry, WellKnownOperator};
pub use traits::{Arg, OperatorFunction, SemanticValidator};
