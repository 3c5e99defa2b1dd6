//! Query module
//!
//! Literal encoding, the filter expression algebra and the fluent query builder

pub mod builder;
pub mod filter;
pub mod literal;

pub use builder::{ODataRequest, Query, QueryBuildError};
pub use filter::{CompareOp, FilterExpr, FunctionArg, F};
pub use literal::Literal;
