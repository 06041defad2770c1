//! Control-flow commands.
//!
//! These own nested command chains and decide which records reach them:
//!
//! - [`pipe::Pipe`] - sequential chain (also the root of every morphline)
//! - [`if_then_else::IfThenElse`] - conditional routing
//! - [`try_rules::TryRules`] - ordered fallback
//! - [`for_each::ForEach`] - per-value iteration
//! - [`not::Not`] - predicate inversion

pub mod for_each;
pub mod if_then_else;
pub mod not;
pub mod pipe;
pub mod try_rules;

use crate::registry::Registry;

/// Module path the control-flow builders are registered under.
pub const MODULE: &str = "morphline::flow";

pub fn register_builtins(registry: &Registry) {
    registry.register(MODULE, pipe::PipeBuilder);
    registry.register(MODULE, if_then_else::IfThenElseBuilder);
    registry.register(MODULE, try_rules::TryRulesBuilder);
    registry.register(MODULE, for_each::ForEachBuilder);
    registry.register(MODULE, not::NotBuilder);
}
