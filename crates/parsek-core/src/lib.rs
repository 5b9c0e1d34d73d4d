#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Clause IR, grammars, and match results for the parsek PEG toolkit.
//!
//! A [`Grammar`](grammar::Grammar) is an immutable arena of [`ClauseKind`](grammar::ClauseKind)
//! nodes built through [`GrammarBuilder`](grammar::GrammarBuilder). This crate owns the
//! data model only: constructing and inspecting grammars, and the `Match`/`Failure`
//! shapes a parse produces. Running a grammar against input lives in `parsek-engine`;
//! reading and writing grammar text lives in `parsek-meta`.

pub mod grammar;
mod interner;
pub mod matching;

pub use grammar::{
    ActionToken, CaptureName, ClauseId, ClauseKind, Expr, Grammar, GrammarBuilder, GrammarError,
    RuleName,
};
pub use interner::{Interner, Symbol};
pub use matching::{Binding, CaptureValue, Failure, Match, Position};
