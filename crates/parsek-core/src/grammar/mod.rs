//! Clause IR and grammar construction.
//!
//! See [`types`] for the [`Clause`]/[`ClauseKind`] arena and the
//! [`GrammarBuilder`] that normalizes a tree of [`Expr`] into a frozen
//! [`Grammar`].

mod types;

#[cfg(test)]
mod types_tests;

pub use types::{
    ActionToken, CaptureName, ClauseId, ClauseKind, Expr, Grammar, GrammarBuilder, GrammarError,
    RuleName,
};
