//! Plan compilation.
//!
//! Turns the abstract steps proposed by the language model into a
//! [`Plan`](crate::model::Plan) of typed, executable steps:
//!
//! 1. Order: abstract steps are sorted by their `order`.
//! 2. Translate: each known action becomes one typed step with a T-SQL
//!    template (or an introspection marker); unknown actions are dropped.
//! 3. Repair: an empty result becomes the fallback plan, and missing
//!    exploration or final steps are synthesized.
//! 4. Renumber: orders become `1..=n`.

mod compiler;
pub mod sql;

pub use compiler::{CompilerConfig, PlanCompiler};
