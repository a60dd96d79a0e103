pub mod builder;
pub mod diagnostics;
pub mod expression;
pub mod scope;
pub mod type_inference;

pub use builder::ExpressionBuilder;
pub use diagnostics::{Diagnostic, Diagnostics, IssueCode, Severity};
pub use expression::Expression;
pub use scope::Scope;
pub use type_inference::{infer_type, TypeProvider, TypeRule};
