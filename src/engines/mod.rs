pub mod evaluation;
pub mod exploration;
